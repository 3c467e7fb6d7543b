//! Main rendering logic for TUI.

use ratatui::Frame;
use ratatui::layout::{Constraint, Layout};

use super::feeds::FeedsSnapshot;
use super::state::{AppState, PopupState, Tab};
use super::widgets::{
    render_activity, render_databases, render_error_banner, render_footer, render_header,
    render_issues, render_locks, render_plan_popup, render_queries, render_quit_confirm,
    render_tables,
};
use crate::backend::BackendError;
use crate::plan::InspectorState;

/// Main render function.
pub fn render(
    frame: &mut Frame,
    state: &mut AppState,
    feeds: &FeedsSnapshot,
    inspector: &InspectorState,
) {
    let area = frame.area();
    let (loading, error) = feeds.status(state.current_tab);
    // A missing extension is explained in the tab itself.
    let error = error.filter(|e| !matches!(e, BackendError::ExtensionMissing(_)));

    let chunks = Layout::vertical([
        Constraint::Length(1),                           // Header
        Constraint::Length(error.is_some() as u16),      // Error banner
        Constraint::Min(5),                              // Content
        Constraint::Length(1),                           // Footer
    ])
    .split(area);

    render_header(frame, chunks[0], state, loading);
    if let Some(e) = error {
        render_error_banner(frame, chunks[1], e);
    }

    match state.current_tab {
        Tab::Databases => render_databases(frame, chunks[2], &mut state.databases, &feeds.databases),
        Tab::Activity => render_activity(frame, chunks[2], &mut state.activity, &feeds.activity),
        Tab::Queries => render_queries(frame, chunks[2], &mut state.queries, &feeds.queries),
        Tab::Locks => render_locks(frame, chunks[2], &mut state.locks, &feeds.locks),
        Tab::Tables => render_tables(frame, chunks[2], &mut state.tables, &feeds.tables),
        Tab::Issues => render_issues(frame, chunks[2], &mut state.issues, &feeds.issues),
    }

    render_footer(frame, chunks[3], state);

    // Popups last, over everything.
    match &mut state.popup {
        PopupState::Plan { scroll } => render_plan_popup(frame, area, inspector, scroll),
        PopupState::QuitConfirm => render_quit_confirm(frame, area),
        PopupState::None => {}
    }
}
