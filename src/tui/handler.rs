use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::app::View;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppAction {
    Quit,
    MoveUp,
    MoveDown,
    ShowView(View),
    Select,
    Delete,
    MoveStepUp,
    MoveStepDown,
    StartSearch,
    NewFlow,
    RenameFlow,
    EditNote,
    OpenInEditor,
    ShowHelp,
    HideHelp,
    // Text input actions
    InputChar(char),
    InputBackspace,
    InputConfirm,
    InputCancel,
}

pub fn handle_key_event(key: KeyEvent, input_active: bool, show_help: bool) -> Option<AppAction> {
    // If help is showing, any key closes it
    if show_help {
        return Some(AppAction::HideHelp);
    }

    if input_active {
        return match key.code {
            KeyCode::Enter => Some(AppAction::InputConfirm),
            KeyCode::Esc => Some(AppAction::InputCancel),
            KeyCode::Backspace => Some(AppAction::InputBackspace),
            KeyCode::Char(c) => Some(AppAction::InputChar(c)),
            _ => None,
        };
    }

    // Normal mode
    match (key.code, key.modifiers) {
        (KeyCode::Char('q'), _) => Some(AppAction::Quit),
        (KeyCode::Char('c'), KeyModifiers::CONTROL) => Some(AppAction::Quit),

        (KeyCode::Char('1'), _) => Some(AppAction::ShowView(View::Search)),
        (KeyCode::Char('2'), _) => Some(AppAction::ShowView(View::Flows)),
        (KeyCode::Char('3'), _) => Some(AppAction::ShowView(View::Steps)),

        (KeyCode::Char('j'), _) | (KeyCode::Down, KeyModifiers::NONE) => Some(AppAction::MoveDown),
        (KeyCode::Char('k'), _) | (KeyCode::Up, KeyModifiers::NONE) => Some(AppAction::MoveUp),
        (KeyCode::Char('J'), _) | (KeyCode::Down, KeyModifiers::SHIFT) => {
            Some(AppAction::MoveStepDown)
        }
        (KeyCode::Char('K'), _) | (KeyCode::Up, KeyModifiers::SHIFT) => Some(AppAction::MoveStepUp),

        (KeyCode::Enter, _) => Some(AppAction::Select),
        (KeyCode::Char('d'), _) => Some(AppAction::Delete),

        (KeyCode::Char('/'), _) => Some(AppAction::StartSearch),
        (KeyCode::Char('n'), _) => Some(AppAction::NewFlow),
        (KeyCode::Char('r'), _) => Some(AppAction::RenameFlow),
        (KeyCode::Char('e'), _) => Some(AppAction::EditNote),
        (KeyCode::Char('o'), _) => Some(AppAction::OpenInEditor),

        (KeyCode::Char('?'), _) => Some(AppAction::ShowHelp),

        _ => None,
    }
}
