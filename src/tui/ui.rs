use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap},
    Frame,
};

use crate::app::{App, View};

pub fn draw(frame: &mut Frame, app: &App) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header
            Constraint::Min(0),    // Body
            Constraint::Length(1), // Status line
        ])
        .split(frame.area());

    // Body: 1/2 list, 1/2 preview
    let body = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Ratio(1, 2), Constraint::Ratio(1, 2)])
        .split(rows[1]);

    render_header(frame, app, rows[0]);
    match app.view {
        View::Search => render_hits(frame, app, body[0]),
        View::Flows => render_flows(frame, app, body[0]),
        View::Steps => render_steps(frame, app, body[0]),
    }
    render_preview(frame, app, body[1]);
    render_status(frame, app, rows[2]);

    if app.input_active() {
        render_input(frame, app);
    }

    if app.show_help {
        render_help(frame);
    }
}

fn render_header(frame: &mut Frame, app: &App, area: Rect) {
    let tabs: Vec<Span> = [View::Search, View::Flows, View::Steps]
        .iter()
        .enumerate()
        .map(|(i, view)| {
            let style = if *view == app.view {
                Style::default().fg(Color::Black).bg(Color::Cyan)
            } else {
                Style::default().fg(Color::DarkGray)
            };
            Span::styled(format!(" {}:{} ", i + 1, view.label()), style)
        })
        .collect();

    let active = match &app.active_flow {
        Some(flow) => Span::styled(
            format!(" Active: {} ", flow.name),
            Style::default().fg(Color::Green),
        ),
        None => Span::styled(" No active flow ", Style::default().fg(Color::Yellow)),
    };

    let block = Block::default()
        .title(" Waystation ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan));

    let inner = block.inner(area);
    frame.render_widget(block, area);

    let mut spans = tabs;
    spans.push(Span::raw(" | "));
    spans.push(active);
    frame.render_widget(Paragraph::new(Line::from(spans)), inner);
}

fn render_list(frame: &mut Frame, area: Rect, title: String, items: Vec<ListItem>, selected: usize) {
    let list = List::new(items)
        .block(Block::default().title(title).borders(Borders::ALL))
        .highlight_style(
            Style::default()
                .bg(Color::DarkGray)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("> ");

    let mut state = ListState::default();
    state.select(Some(selected));

    frame.render_stateful_widget(list, area, &mut state);
}

fn location(file_name: &str, line_no: Option<i64>) -> String {
    match line_no {
        Some(n) => format!("{file_name}:{n} "),
        None => format!("{file_name} "),
    }
}

fn render_hits(frame: &mut Frame, app: &App, area: Rect) {
    let items: Vec<ListItem> = app
        .hits
        .iter()
        .map(|hit| {
            ListItem::new(Line::from(vec![
                Span::styled(
                    location(&hit.file_name, hit.line_no),
                    Style::default().fg(Color::Blue),
                ),
                Span::raw(hit.line.trim().to_string()),
            ]))
        })
        .collect();

    let title = if app.pattern.is_empty() {
        " Hits ".to_string()
    } else {
        format!(" Hits for {} ({}) ", app.pattern, app.hits.len())
    };
    render_list(frame, area, title, items, app.hit_index);
}

fn render_flows(frame: &mut Frame, app: &App, area: Rect) {
    let active_id = app.active_flow.as_ref().map(|f| f.id);

    let items: Vec<ListItem> = app
        .flows
        .iter()
        .map(|flow| {
            let marker = if Some(flow.id) == active_id { "* " } else { "  " };
            let count = app.flow_counts.get(&flow.id).copied().unwrap_or(0);
            ListItem::new(Line::from(vec![
                Span::styled(marker, Style::default().fg(Color::Green)),
                Span::raw(flow.name.clone()),
                Span::styled(format!(" ({count})"), Style::default().fg(Color::DarkGray)),
            ]))
        })
        .collect();

    render_list(frame, area, " Flows ".to_string(), items, app.flow_index);
}

fn render_steps(frame: &mut Frame, app: &App, area: Rect) {
    let items: Vec<ListItem> = app
        .steps
        .iter()
        .enumerate()
        .map(|(i, step)| {
            let mut lines = vec![Line::from(vec![
                Span::styled(format!("{:>3}. ", i + 1), Style::default().fg(Color::DarkGray)),
                Span::styled(
                    location(&step.matched.file_name, step.matched.line_no),
                    Style::default().fg(Color::Blue),
                ),
                Span::raw(step.matched.line.trim().to_string()),
            ])];
            if let Some(note) = &step.note {
                lines.push(Line::styled(
                    format!("     # {}", note.note),
                    Style::default().fg(Color::Magenta),
                ));
            }
            ListItem::new(lines)
        })
        .collect();

    let title = match &app.active_flow {
        Some(flow) => format!(" {} ", flow.name),
        None => " Steps ".to_string(),
    };
    render_list(frame, area, title, items, app.step_index);
}

fn render_preview(frame: &mut Frame, app: &App, area: Rect) {
    let lines: Vec<Line> = app
        .preview
        .iter()
        .map(|line| {
            let number = line.line_no.map(|n| format!("{n:>5} ")).unwrap_or_default();
            let style = if line.is_match {
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(Color::White)
            };
            Line::from(vec![
                Span::styled(number, Style::default().fg(Color::DarkGray)),
                Span::styled(line.text.clone(), style),
            ])
        })
        .collect();

    let title = match app.view {
        View::Search => app.selected_hit().map(|h| h.file_path.clone()),
        View::Steps => app.selected_step().map(|s| s.matched.file_path.clone()),
        View::Flows => app.selected_flow().and_then(|f| f.description.clone()),
    }
    .map(|t| format!(" {t} "))
    .unwrap_or_else(|| " Preview ".to_string());

    let block = Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Magenta));

    let paragraph = Paragraph::new(lines)
        .block(block)
        .wrap(Wrap { trim: false });

    frame.render_widget(paragraph, area);
}

fn render_status(frame: &mut Frame, app: &App, area: Rect) {
    let status = match (&app.status, app.is_searching) {
        (_, true) => "Searching...".to_string(),
        (Some(message), false) => message.clone(),
        (None, false) => match app.view {
            View::Search => "/:search  Enter:save to flow  o:open  ?:help  q:quit".to_string(),
            View::Flows => "Enter:activate  n:new  r:rename  d:archive  ?:help".to_string(),
            View::Steps => "K/J:move  d:remove  e:note  o:open  ?:help".to_string(),
        },
    };

    let paragraph = Paragraph::new(status).style(Style::default().fg(Color::DarkGray));
    frame.render_widget(paragraph, area);
}

fn render_input(frame: &mut Frame, app: &App) {
    let area = centered_rect(60, 20, frame.area());
    let title = app.input_mode.map(|m| m.prompt()).unwrap_or_default();

    let block = Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow));

    let inner = block.inner(area);

    // Clear the area first
    frame.render_widget(Clear, area);
    frame.render_widget(block, area);

    let input_text = format!("> {}_", app.input);
    let paragraph = Paragraph::new(input_text)
        .style(Style::default().fg(Color::White))
        .wrap(Wrap { trim: false });
    frame.render_widget(paragraph, inner);
}

fn render_help(frame: &mut Frame) {
    let area = centered_rect(50, 80, frame.area());

    let help_text = [
        "",
        " Views:",
        "   1 2 3    Search / Flows / Steps",
        "",
        " Navigation:",
        "   j / ↓    Move down",
        "   k / ↑    Move up",
        "",
        " Search:",
        "   /        New search",
        "   Enter    Save hit to the active flow",
        "   o        Open hit in $EDITOR",
        "",
        " Flows:",
        "   Enter    Activate and show steps",
        "   n        New flow",
        "   r        Rename flow",
        "   d        Archive flow",
        "",
        " Steps:",
        "   K / J    Move step up / down",
        "   d        Remove step",
        "   e        Edit note",
        "   o        Open step in $EDITOR",
        "",
        " General:",
        "   ?        Toggle this help",
        "   q        Quit",
        "",
        " Press any key to close",
    ];

    let block = Block::default()
        .title(" Help ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan));

    let paragraph = Paragraph::new(help_text.join("\n"))
        .block(block)
        .style(Style::default().fg(Color::White));

    frame.render_widget(Clear, area);
    frame.render_widget(paragraph, area);
}

fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}
