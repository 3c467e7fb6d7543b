//! Input handling and keybindings.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use super::state::{AppState, InputMode, PopupState, Tab};

/// What the app must do after a key was handled. State-only changes
/// (tab switch, selection, popup scroll) are applied directly.
#[derive(Debug, PartialEq, Eq)]
pub enum KeyAction {
    None,
    Quit,
    /// `state.server_idx` changed; feeds must follow.
    SwitchServer,
    /// `state.live` changed.
    ToggleLive,
    Refetch,
    /// Explain the selected session's query.
    ExplainSelected { analyze: bool },
    /// Explain a typed query (estimate only).
    ExplainQuery(String),
    /// Plan popup closed; drop the inspector result.
    ClosePlan,
}

const PLAN_PAGE: usize = 10;

/// Handles key input and updates state.
pub fn handle_key(state: &mut AppState, key: KeyEvent) -> KeyAction {
    if matches!(state.popup, PopupState::QuitConfirm) {
        return handle_quit_confirm(state, key);
    }
    match state.input_mode {
        InputMode::Normal => handle_normal_mode(state, key),
        InputMode::Query => handle_query_mode(state, key),
    }
}

fn handle_quit_confirm(state: &mut AppState, key: KeyEvent) -> KeyAction {
    match key.code {
        KeyCode::Enter | KeyCode::Char('q') | KeyCode::Char('Q') => {
            state.popup = PopupState::None;
            KeyAction::Quit
        }
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            state.popup = PopupState::None;
            KeyAction::Quit
        }
        KeyCode::Esc | KeyCode::Char('n') | KeyCode::Char('N') => {
            state.popup = PopupState::None;
            KeyAction::None
        }
        _ => KeyAction::None,
    }
}

fn handle_query_mode(state: &mut AppState, key: KeyEvent) -> KeyAction {
    match key.code {
        KeyCode::Esc => {
            state.input_mode = InputMode::Normal;
            state.query_input.clear();
            KeyAction::None
        }
        KeyCode::Enter => {
            let query = state.query_input.trim().to_string();
            if query.is_empty() {
                return KeyAction::None;
            }
            state.input_mode = InputMode::Normal;
            state.query_input.clear();
            state.popup = PopupState::Plan { scroll: 0 };
            KeyAction::ExplainQuery(query)
        }
        KeyCode::Backspace => {
            state.query_input.pop();
            KeyAction::None
        }
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => KeyAction::Quit,
        KeyCode::Char(c) => {
            state.query_input.push(c);
            KeyAction::None
        }
        _ => KeyAction::None,
    }
}

fn handle_plan_popup(state: &mut AppState, key: KeyEvent) -> KeyAction {
    let PopupState::Plan { scroll } = &mut state.popup else {
        return KeyAction::None;
    };
    match key.code {
        KeyCode::Esc => {
            state.popup = PopupState::None;
            KeyAction::ClosePlan
        }
        KeyCode::Up | KeyCode::Char('k') => {
            *scroll = scroll.saturating_sub(1);
            KeyAction::None
        }
        KeyCode::Down | KeyCode::Char('j') => {
            *scroll = scroll.saturating_add(1);
            KeyAction::None
        }
        KeyCode::PageUp => {
            *scroll = scroll.saturating_sub(PLAN_PAGE);
            KeyAction::None
        }
        KeyCode::PageDown => {
            *scroll = scroll.saturating_add(PLAN_PAGE);
            KeyAction::None
        }
        KeyCode::Home => {
            *scroll = 0;
            KeyAction::None
        }
        KeyCode::Char('q') | KeyCode::Char('Q') => {
            state.popup = PopupState::QuitConfirm;
            KeyAction::None
        }
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => KeyAction::Quit,
        _ => KeyAction::None,
    }
}

/// Handles keys in normal mode.
fn handle_normal_mode(state: &mut AppState, key: KeyEvent) -> KeyAction {
    if matches!(state.popup, PopupState::Plan { .. }) {
        return handle_plan_popup(state, key);
    }
    state.status_message = None;

    match key.code {
        KeyCode::Char('q') | KeyCode::Char('Q') => {
            state.popup = PopupState::QuitConfirm;
            KeyAction::None
        }
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => KeyAction::Quit,

        KeyCode::Char(c @ '1'..='9') => {
            if let Some(tab) = Tab::from_digit(c) {
                state.current_tab = tab;
            }
            KeyAction::None
        }

        // Server switch
        KeyCode::Tab | KeyCode::Char(']') => switch_server(state, true),
        KeyCode::BackTab | KeyCode::Char('[') => switch_server(state, false),

        // Live refresh
        KeyCode::Char('p') => {
            state.live = !state.live;
            KeyAction::ToggleLive
        }
        KeyCode::Char('r') => KeyAction::Refetch,

        // Row navigation
        KeyCode::Up | KeyCode::Char('k') => {
            state.tab_state_mut(state.current_tab).select_up();
            KeyAction::None
        }
        KeyCode::Down | KeyCode::Char('j') => {
            state.tab_state_mut(state.current_tab).select_down();
            KeyAction::None
        }

        // Explain
        KeyCode::Char('e') | KeyCode::Char('E') => {
            if state.current_tab != Tab::Activity {
                state.status_message =
                    Some("Select a session on the Activity tab to explain".to_string());
                return KeyAction::None;
            }
            state.popup = PopupState::Plan { scroll: 0 };
            KeyAction::ExplainSelected {
                analyze: key.code == KeyCode::Char('E'),
            }
        }
        KeyCode::Char('x') => {
            state.input_mode = InputMode::Query;
            state.query_input.clear();
            KeyAction::None
        }

        _ => KeyAction::None,
    }
}

fn switch_server(state: &mut AppState, forward: bool) -> KeyAction {
    if state.cycle_server(forward) {
        KeyAction::SwitchServer
    } else {
        state.status_message = Some("No other server configured".to_string());
        KeyAction::None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::servers::ServerConfig;
    use crossterm::event::{KeyEvent, KeyEventKind, KeyEventState};

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent {
            code,
            modifiers: KeyModifiers::NONE,
            kind: KeyEventKind::Press,
            state: KeyEventState::NONE,
        }
    }

    fn server(id: &str) -> ServerConfig {
        ServerConfig {
            id: id.to_string(),
            name: id.to_string(),
            host: "localhost".to_string(),
            port: 5432,
            database: "postgres".to_string(),
            username: "postgres".to_string(),
            use_ssl: false,
            password_env: None,
        }
    }

    fn state() -> AppState {
        AppState::new(vec![server("a"), server("b"), server("c")], 0, true)
    }

    #[test]
    fn digits_switch_tabs() {
        let mut state = state();
        assert_eq!(handle_key(&mut state, key(KeyCode::Char('2'))), KeyAction::None);
        assert_eq!(state.current_tab, Tab::Activity);
        handle_key(&mut state, key(KeyCode::Char('3')));
        assert_eq!(state.current_tab, Tab::Queries);
        handle_key(&mut state, key(KeyCode::Char('6')));
        assert_eq!(state.current_tab, Tab::Issues);
        // No seventh tab
        handle_key(&mut state, key(KeyCode::Char('7')));
        assert_eq!(state.current_tab, Tab::Issues);
    }

    #[test]
    fn server_switch_wraps_and_resets_selection() {
        let mut state = state();
        state.current_tab = Tab::Activity;
        state.activity.selected = 3;

        assert_eq!(handle_key(&mut state, key(KeyCode::Char('['))), KeyAction::SwitchServer);
        assert_eq!(state.server_idx, 2);
        assert_eq!(state.activity.selected, 0);

        assert_eq!(handle_key(&mut state, key(KeyCode::Tab)), KeyAction::SwitchServer);
        assert_eq!(state.server_idx, 0);
        handle_key(&mut state, key(KeyCode::Char(']')));
        assert_eq!(state.current_server().map(|s| s.id.as_str()), Some("b"));
    }

    #[test]
    fn single_server_cannot_switch() {
        let mut state = AppState::new(vec![server("only")], 0, true);
        assert_eq!(handle_key(&mut state, key(KeyCode::Tab)), KeyAction::None);
        assert_eq!(state.server_idx, 0);
        assert!(state.status_message.is_some());
    }

    #[test]
    fn pause_toggles_live() {
        let mut state = state();
        assert_eq!(handle_key(&mut state, key(KeyCode::Char('p'))), KeyAction::ToggleLive);
        assert!(!state.live);
        handle_key(&mut state, key(KeyCode::Char('p')));
        assert!(state.live);
        assert_eq!(handle_key(&mut state, key(KeyCode::Char('r'))), KeyAction::Refetch);
    }

    #[test]
    fn explain_only_from_activity_tab() {
        let mut state = state();
        assert_eq!(handle_key(&mut state, key(KeyCode::Char('e'))), KeyAction::None);
        assert_eq!(state.popup, PopupState::None);

        state.current_tab = Tab::Activity;
        assert_eq!(
            handle_key(&mut state, key(KeyCode::Char('E'))),
            KeyAction::ExplainSelected { analyze: true }
        );
        assert_eq!(state.popup, PopupState::Plan { scroll: 0 });

        // Keys scroll the popup instead of moving the selection
        handle_key(&mut state, key(KeyCode::Down));
        assert_eq!(state.popup, PopupState::Plan { scroll: 1 });
        assert_eq!(state.activity.selected, 0);

        assert_eq!(handle_key(&mut state, key(KeyCode::Esc)), KeyAction::ClosePlan);
        assert_eq!(state.popup, PopupState::None);
    }

    #[test]
    fn adhoc_query_input() {
        let mut state = state();
        handle_key(&mut state, key(KeyCode::Char('x')));
        assert_eq!(state.input_mode, InputMode::Query);

        // Enter on empty input does nothing
        assert_eq!(handle_key(&mut state, key(KeyCode::Enter)), KeyAction::None);

        for c in "select 12".chars() {
            handle_key(&mut state, key(KeyCode::Char(c)));
        }
        handle_key(&mut state, key(KeyCode::Backspace));
        // 'q' is text here, not quit
        assert_eq!(state.popup, PopupState::None);
        assert_eq!(state.query_input, "select 1");

        assert_eq!(
            handle_key(&mut state, key(KeyCode::Enter)),
            KeyAction::ExplainQuery("select 1".to_string())
        );
        assert_eq!(state.input_mode, InputMode::Normal);
        assert!(state.query_input.is_empty());
        assert_eq!(state.popup, PopupState::Plan { scroll: 0 });
    }

    #[test]
    fn esc_cancels_query_input() {
        let mut state = state();
        handle_key(&mut state, key(KeyCode::Char('x')));
        handle_key(&mut state, key(KeyCode::Char('s')));
        handle_key(&mut state, key(KeyCode::Esc));
        assert_eq!(state.input_mode, InputMode::Normal);
        assert!(state.query_input.is_empty());
    }

    #[test]
    fn quit_requires_confirmation() {
        let mut state = state();
        assert_eq!(handle_key(&mut state, key(KeyCode::Char('q'))), KeyAction::None);
        assert_eq!(state.popup, PopupState::QuitConfirm);
        assert_eq!(handle_key(&mut state, key(KeyCode::Char('n'))), KeyAction::None);
        assert_eq!(state.popup, PopupState::None);

        handle_key(&mut state, key(KeyCode::Char('q')));
        assert_eq!(handle_key(&mut state, key(KeyCode::Enter)), KeyAction::Quit);
    }

    #[test]
    fn selection_moves_within_current_tab() {
        let mut state = state();
        state.current_tab = Tab::Locks;
        handle_key(&mut state, key(KeyCode::Down));
        handle_key(&mut state, key(KeyCode::Char('j')));
        handle_key(&mut state, key(KeyCode::Up));
        assert_eq!(state.locks.selected, 1);
        assert_eq!(state.tables.selected, 0);
        assert_eq!(state.locks.resolve(1), Some(0));
    }
}
