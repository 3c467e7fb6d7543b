mod activity;
mod databases;
mod header;
mod issues;
mod locks;
mod plan;
mod queries;
mod quit_confirm;
mod tables;

pub use activity::render_activity;
pub use databases::render_databases;
pub use header::{render_error_banner, render_footer, render_header};
pub use issues::render_issues;
pub use locks::render_locks;
pub use plan::render_plan_popup;
pub use queries::render_queries;
pub use quit_confirm::render_quit_confirm;
pub use tables::render_tables;

use ratatui::Frame;
use ratatui::layout::{Constraint, Layout, Rect};
use ratatui::widgets::{Block, Borders, Clear, Paragraph};

use crate::backend::BackendError;
use crate::refresh::FeedState;
use crate::tui::style::Styles;

/// Returns a centered rect of given percentage within `area`.
pub(super) fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::vertical([
        Constraint::Percentage((100 - percent_y) / 2),
        Constraint::Percentage(percent_y),
        Constraint::Percentage((100 - percent_y) / 2),
    ])
    .split(r);

    Layout::horizontal([
        Constraint::Percentage((100 - percent_x) / 2),
        Constraint::Percentage(percent_x),
        Constraint::Percentage((100 - percent_x) / 2),
    ])
    .split(popup_layout[1])[1]
}

/// Renders a bordered message in place of a table.
fn render_message(frame: &mut Frame, area: Rect, title: &str, message: &str) {
    let msg = Paragraph::new(message.to_string())
        .style(Styles::dim())
        .block(Block::default().title(title.to_string()).borders(Borders::ALL));
    frame.render_widget(Clear, area);
    frame.render_widget(msg, area);
}

/// Message for a feed that has no data yet. Returns `None` once data is present.
fn feed_placeholder<T>(feed: &FeedState<T, BackendError>) -> Option<String> {
    if feed.data.is_some() {
        return None;
    }
    Some(match (&feed.error, feed.is_loading) {
        (Some(e), _) => format!("No data: {}", e),
        (None, true) => "Loading…".to_string(),
        (None, false) => "No data (paused, press r to fetch)".to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn placeholder_reflects_feed_state() {
        let mut feed: FeedState<Vec<u8>, BackendError> = FeedState::default();
        assert_eq!(
            feed_placeholder(&feed).as_deref(),
            Some("No data (paused, press r to fetch)")
        );
        feed.is_loading = true;
        assert_eq!(feed_placeholder(&feed).as_deref(), Some("Loading…"));
        feed.error = Some(BackendError::Connection("connection refused".to_string()));
        assert_eq!(
            feed_placeholder(&feed).as_deref(),
            Some("No data: connection error: connection refused")
        );
        feed.data = Some(Arc::new(vec![]));
        assert!(feed_placeholder(&feed).is_none());
    }
}
