use std::io;
use std::time::Duration;

use crossterm::event::KeyEventKind;
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::prelude::*;

use waystation::app::App;
use waystation::config::Config;
use waystation::db::Repository;
use waystation::error::Result;
use waystation::services::open_in_editor;
use waystation::tui::{draw, handle_key_event};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging (only show warnings and errors by default)
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    // Parse command line arguments
    let args: Vec<String> = std::env::args().skip(1).collect();

    // Load configuration
    let config = Config::load()?;

    // Check for --history flag (headless)
    if args.first().map(String::as_str) == Some("--history") {
        return print_history(&config).await;
    }

    let (pattern, paths) = match args.split_first() {
        Some((pattern, paths)) => (Some(pattern.clone()), paths.to_vec()),
        None => (None, Vec::new()),
    };

    // Initialize app
    let mut app = App::new(&config, paths).await?;
    if let Some(pattern) = pattern {
        app.start_search(pattern);
    }

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Run the app
    let result = run_app(&mut terminal, &mut app).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    if let Err(e) = result {
        eprintln!("Error: {}", e);
    }

    Ok(())
}

async fn print_history(config: &Config) -> Result<()> {
    let repository = Repository::new(&config.db_path).await?;
    let history = repository.get_flow_history(config.history_limit).await?;

    if history.is_empty() {
        println!("No flow history");
        return Ok(());
    }

    for entry in history {
        let when = entry
            .created_at
            .with_timezone(&chrono::Local)
            .format("%Y-%m-%d %H:%M:%S");
        match entry.description {
            Some(description) => println!("{when}  {}  ({description})", entry.name),
            None => println!("{when}  {}", entry.name),
        }
    }
    Ok(())
}

async fn run_app<B: Backend>(terminal: &mut Terminal<B>, app: &mut App) -> Result<()> {
    loop {
        terminal.draw(|frame| draw(frame, app))?;

        // Poll for a finished search
        app.poll_search_result().await;

        // Poll for events with timeout to allow async operations
        if event::poll(Duration::from_millis(100))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    if let Some(action) =
                        handle_key_event(key, app.input_active(), app.show_help)
                    {
                        match app.handle_action(action).await {
                            Ok(true) => return Ok(()),
                            Ok(false) => {}
                            Err(e) if e.is_recoverable() => app.status = Some(e.to_string()),
                            Err(e) => return Err(e),
                        }
                        if let Some((path, line_no)) = app.take_editor_request() {
                            if let Err(e) = run_editor(terminal, &path, line_no) {
                                if !e.is_recoverable() {
                                    return Err(e);
                                }
                                app.status = Some(e.to_string());
                            }
                        }
                    }
                }
            }
        }
    }
}

/// Hands the terminal to `$EDITOR` and takes it back afterwards, even when the
/// editor could not be started.
fn run_editor<B: Backend>(terminal: &mut Terminal<B>, path: &str, line_no: Option<i64>) -> Result<()> {
    disable_raw_mode()?;
    execute!(io::stdout(), LeaveAlternateScreen, DisableMouseCapture)?;

    let result = open_in_editor(path, line_no);

    enable_raw_mode()?;
    execute!(io::stdout(), EnterAlternateScreen, EnableMouseCapture)?;
    terminal.clear()?;
    result
}
