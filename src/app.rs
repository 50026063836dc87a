use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::config::Config;
use crate::db::Repository;
use crate::error::Result;
use crate::models::{Flow, FlowStep, Match, MatchNote, NewMatch, SessionContext};
use crate::services::{preview, PreviewLine, Searcher};
use crate::tui::AppAction;

// Message for a finished search
pub struct SearchResult {
    pub pattern: String,
    pub result: std::result::Result<Vec<NewMatch>, String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    Search,
    Flows,
    Steps,
}

impl View {
    pub fn label(&self) -> &'static str {
        match self {
            View::Search => "Search",
            View::Flows => "Flows",
            View::Steps => "Steps",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Search,
    NewFlow,
    RenameFlow(i64),
    Note(i64),
}

impl InputMode {
    pub fn prompt(&self) -> &'static str {
        match self {
            InputMode::Search => " Search pattern ",
            InputMode::NewFlow => " New flow name ",
            InputMode::RenameFlow(_) => " Rename flow ",
            InputMode::Note(_) => " Note (empty to remove) ",
        }
    }
}

pub struct App {
    // Data
    pub hits: Vec<NewMatch>,
    pub flows: Vec<Flow>,
    pub flow_counts: HashMap<i64, usize>,
    pub steps: Vec<FlowStep>,
    pub active_flow: Option<Flow>,
    pub preview: Vec<PreviewLine>,

    // UI State
    pub view: View,
    pub hit_index: usize,
    pub flow_index: usize,
    pub step_index: usize,
    pub input_mode: Option<InputMode>,
    pub input: String,
    pub status: Option<String>,
    pub show_help: bool,
    editor_request: Option<(String, Option<i64>)>,

    // Async state
    pub is_searching: bool,
    pub pattern: String,
    search_paths: Vec<String>,
    search_rx: mpsc::Receiver<SearchResult>,
    search_tx: mpsc::Sender<SearchResult>,

    // Services
    pub repository: Repository,
    session: SessionContext,
    searcher: Arc<Searcher>,
    preview_context: usize,
}

impl App {
    pub async fn new(config: &Config, search_paths: Vec<String>) -> Result<Self> {
        let repository = Repository::new(&config.db_path).await?;
        Self::with_repository(repository, config, search_paths).await
    }

    pub async fn with_repository(
        repository: Repository,
        config: &Config,
        search_paths: Vec<String>,
    ) -> Result<Self> {
        let session = config.session();
        let (search_tx, search_rx) = mpsc::channel(1);

        let mut app = Self {
            hits: Vec::new(),
            flows: Vec::new(),
            flow_counts: HashMap::new(),
            steps: Vec::new(),
            active_flow: None,
            preview: Vec::new(),
            view: View::Search,
            hit_index: 0,
            flow_index: 0,
            step_index: 0,
            input_mode: None,
            input: String::new(),
            status: None,
            show_help: false,
            editor_request: None,
            is_searching: false,
            pattern: String::new(),
            search_paths,
            search_rx,
            search_tx,
            repository,
            session,
            searcher: Arc::new(Searcher::new(config.rg_globs.clone())),
            preview_context: config.preview_context,
        };

        app.reload_flows().await?;
        app.reload_steps().await?;
        Ok(app)
    }

    pub fn selected_hit(&self) -> Option<&NewMatch> {
        self.hits.get(self.hit_index)
    }

    pub fn selected_flow(&self) -> Option<&Flow> {
        self.flows.get(self.flow_index)
    }

    pub fn selected_step(&self) -> Option<&FlowStep> {
        self.steps.get(self.step_index)
    }

    /// File and line the main loop should open in `$EDITOR`, if one was asked for.
    pub fn take_editor_request(&mut self) -> Option<(String, Option<i64>)> {
        self.editor_request.take()
    }

    pub fn input_active(&self) -> bool {
        self.input_mode.is_some()
    }

    fn cursor(&mut self) -> (&mut usize, usize) {
        match self.view {
            View::Search => (&mut self.hit_index, self.hits.len()),
            View::Flows => (&mut self.flow_index, self.flows.len()),
            View::Steps => (&mut self.step_index, self.steps.len()),
        }
    }

    pub async fn handle_action(&mut self, action: AppAction) -> Result<bool> {
        match action {
            AppAction::Quit => return Ok(true),

            AppAction::MoveUp => {
                let (index, _) = self.cursor();
                if *index > 0 {
                    *index -= 1;
                    self.on_selection_changed().await;
                }
            }

            AppAction::MoveDown => {
                let (index, len) = self.cursor();
                if len > 0 && *index < len - 1 {
                    *index += 1;
                    self.on_selection_changed().await;
                }
            }

            AppAction::ShowView(view) => {
                self.view = view;
                if view == View::Steps {
                    self.reload_steps().await?;
                }
                self.on_selection_changed().await;
            }

            AppAction::Select => match self.view {
                View::Search => self.save_selected_hit().await?,
                View::Flows => self.activate_selected_flow().await?,
                View::Steps => {}
            },

            AppAction::Delete => match self.view {
                View::Search => {}
                View::Flows => self.archive_selected_flow().await?,
                View::Steps => self.remove_selected_step().await?,
            },

            AppAction::MoveStepUp => {
                if self.view == View::Steps && self.step_index > 0 {
                    self.swap_steps(self.step_index, self.step_index - 1).await?;
                }
            }

            AppAction::MoveStepDown => {
                if self.view == View::Steps && self.step_index + 1 < self.steps.len() {
                    self.swap_steps(self.step_index, self.step_index + 1).await?;
                }
            }

            AppAction::StartSearch => {
                self.open_input(InputMode::Search, self.pattern.clone());
            }

            AppAction::NewFlow => {
                self.open_input(InputMode::NewFlow, String::new());
            }

            AppAction::RenameFlow => {
                if self.view == View::Flows {
                    if let Some(flow) = self.selected_flow() {
                        let (id, name) = (flow.id, flow.name.clone());
                        self.open_input(InputMode::RenameFlow(id), name);
                    }
                }
            }

            AppAction::EditNote => {
                if self.view == View::Steps {
                    if let Some(step) = self.selected_step() {
                        let occurrence = step.occurrence.id;
                        let text = step.note.as_ref().map(|n| n.note.clone()).unwrap_or_default();
                        self.open_input(InputMode::Note(occurrence), text);
                    }
                }
            }

            AppAction::OpenInEditor => {
                self.editor_request = match self.view {
                    View::Search => self
                        .selected_hit()
                        .map(|hit| (hit.file_path.clone(), hit.line_no)),
                    View::Steps => self
                        .selected_step()
                        .map(|step| (step.matched.file_path.clone(), step.matched.line_no)),
                    View::Flows => None,
                };
            }

            AppAction::ShowHelp => {
                self.show_help = true;
            }

            AppAction::HideHelp => {
                self.show_help = false;
            }

            AppAction::InputChar(c) => {
                self.input.push(c);
            }

            AppAction::InputBackspace => {
                self.input.pop();
            }

            AppAction::InputConfirm => {
                if let Some(mode) = self.input_mode.take() {
                    let input = std::mem::take(&mut self.input);
                    self.confirm_input(mode, input).await?;
                }
            }

            AppAction::InputCancel => {
                self.input_mode = None;
                self.input.clear();
            }
        }

        Ok(false)
    }

    fn open_input(&mut self, mode: InputMode, prefill: String) {
        self.input_mode = Some(mode);
        self.input = prefill;
    }

    async fn confirm_input(&mut self, mode: InputMode, input: String) -> Result<()> {
        let text = input.trim().to_string();
        match mode {
            InputMode::Search => {
                if !text.is_empty() {
                    self.start_search(text);
                }
            }
            InputMode::NewFlow => {
                if !text.is_empty() {
                    let flow_id = self.repository.new_flow(text.clone(), None).await?;
                    self.repository.activate_flow(flow_id).await?;
                    self.status = Some(format!("Created and activated {text}"));
                    self.reload_flows().await?;
                    self.reload_steps().await?;
                }
            }
            InputMode::RenameFlow(flow_id) => {
                if !text.is_empty() && self.repository.rename_flow(flow_id, text).await? {
                    self.reload_flows().await?;
                }
            }
            InputMode::Note(flow_match_id) => {
                self.save_note(flow_match_id, input).await?;
                self.reload_steps().await?;
            }
        }
        Ok(())
    }

    /// One live note per occurrence: the existing note is updated in place,
    /// or archived when the new text is empty.
    async fn save_note(&mut self, flow_match_id: i64, text: String) -> Result<()> {
        let existing = self.repository.get_note_for_occurrence(flow_match_id).await?;
        match existing {
            Some(note) if text.trim().is_empty() => {
                if let Some(id) = note.id {
                    self.repository.archive_note(id).await?;
                }
            }
            Some(mut note) => {
                note.note = text;
                self.repository.add_or_update_note(note).await?;
            }
            None if text.trim().is_empty() => {}
            None => {
                self.repository
                    .add_or_update_note(MatchNote::new(flow_match_id, text))
                    .await?;
            }
        }
        Ok(())
    }

    pub fn start_search(&mut self, pattern: String) {
        self.pattern = pattern.clone();
        self.is_searching = true;
        self.status = Some(format!("Searching for {pattern}..."));

        let searcher = Arc::clone(&self.searcher);
        let paths = self.search_paths.clone();
        let tx = self.search_tx.clone();

        tokio::spawn(async move {
            let result = searcher
                .search(&pattern, &paths)
                .await
                .map_err(|e| e.to_string());
            let _ = tx.send(SearchResult { pattern, result }).await;
        });
    }

    /// Poll for a finished search (non-blocking)
    pub async fn poll_search_result(&mut self) {
        let Ok(result) = self.search_rx.try_recv() else {
            return;
        };
        // A newer search superseded this one
        if result.pattern != self.pattern {
            return;
        }

        self.is_searching = false;
        match result.result {
            Ok(hits) => {
                self.status = Some(format!("{} hits for {}", hits.len(), result.pattern));
                self.hits = hits;
                self.hit_index = 0;
                self.view = View::Search;
            }
            Err(e) => {
                tracing::warn!("Search failed: {}", e);
                self.status = Some(format!("Search failed: {e}"));
            }
        }
        self.on_selection_changed().await;
    }

    async fn on_selection_changed(&mut self) {
        let matched = match self.view {
            View::Search => self.selected_hit().cloned().map(Match::from),
            View::Steps => self.selected_step().map(|s| s.matched.clone()),
            View::Flows => None,
        };
        self.preview = match matched {
            Some(m) => preview(&m, self.preview_context).await,
            None => Vec::new(),
        };
    }

    async fn save_selected_hit(&mut self) -> Result<()> {
        let Some(hit) = self.selected_hit().cloned() else {
            return Ok(());
        };

        let saved = self.repository.save_to_active_flow(self.session, hit).await?;
        self.reload_flows().await?;

        let flow_name = self
            .active_flow
            .as_ref()
            .map(|f| f.name.clone())
            .unwrap_or_default();
        self.status = Some(if saved.created_flow {
            format!("Saved to new flow {flow_name}")
        } else {
            format!("Saved to {flow_name}")
        });
        Ok(())
    }

    async fn activate_selected_flow(&mut self) -> Result<()> {
        let Some(flow_id) = self.selected_flow().map(|f| f.id) else {
            return Ok(());
        };

        self.repository.activate_flow(flow_id).await?;
        self.reload_flows().await?;
        self.view = View::Steps;
        self.step_index = 0;
        self.reload_steps().await?;
        self.on_selection_changed().await;
        Ok(())
    }

    async fn archive_selected_flow(&mut self) -> Result<()> {
        let Some(flow_id) = self.selected_flow().map(|f| f.id) else {
            return Ok(());
        };

        self.repository.archive_flow(flow_id).await?;
        self.reload_flows().await?;
        self.reload_steps().await?;
        Ok(())
    }

    async fn remove_selected_step(&mut self) -> Result<()> {
        let Some(step) = self.selected_step() else {
            return Ok(());
        };

        self.repository.archive_flow_match(step.occurrence.id).await?;
        self.reload_steps().await?;
        self.reload_counts().await?;
        self.on_selection_changed().await;
        Ok(())
    }

    /// Persists the swap, then re-reads the order. A rolled-back swap leaves
    /// the stored order untouched, so reloading is correct either way.
    async fn swap_steps(&mut self, from: usize, to: usize) -> Result<()> {
        let Some(flow_id) = self.active_flow.as_ref().map(|f| f.id) else {
            return Ok(());
        };

        match self.repository.swap(flow_id, from, to).await {
            Ok(()) => self.step_index = to,
            Err(e) if e.is_recoverable() => {
                self.status = Some(e.to_string());
            }
            Err(e) => return Err(e),
        }
        self.reload_steps().await
    }

    async fn reload_flows(&mut self) -> Result<()> {
        self.flows = self.repository.list_flows().await?;
        self.active_flow = self.repository.get_active_flow(self.session).await?;
        if self.flow_index >= self.flows.len() {
            self.flow_index = self.flows.len().saturating_sub(1);
        }
        self.reload_counts().await
    }

    async fn reload_counts(&mut self) -> Result<()> {
        let ids = self.flows.iter().map(|f| f.id).collect();
        self.flow_counts = self.repository.get_flow_match_counts(ids).await?;
        Ok(())
    }

    async fn reload_steps(&mut self) -> Result<()> {
        self.active_flow = self.repository.get_active_flow(self.session).await?;
        self.steps = match &self.active_flow {
            Some(flow) => self.repository.load_flow_steps(flow.id).await?,
            None => Vec::new(),
        };
        if self.step_index >= self.steps.len() {
            self.step_index = self.steps.len().saturating_sub(1);
        }
        Ok(())
    }
}
