//! Queries tab: top statements by total execution time (`pg_stat_statements`).

use ratatui::Frame;
use ratatui::layout::{Constraint, Rect};
use ratatui::style::Style;
use ratatui::text::Span;
use ratatui::widgets::{Block, Borders, Clear, Row, Table};

use super::{feed_placeholder, render_message};
use crate::backend::{BackendError, QueryStat};
use crate::fmt::{format_count, format_percent, format_time, normalize_for_display};
use crate::refresh::FeedState;
use crate::tui::state::TabState;
use crate::tui::style::Styles;

const TITLE: &str = "Top Queries";

/// Mean time above which a statement is highlighted, ms.
const SLOW_MEAN_MS: f64 = 100.0;

/// Shown instead of an error when the extension is not installed.
pub(crate) const EXTENSION_HINT: &str = "pg_stat_statements is not installed. Add it to \
     shared_preload_libraries and run CREATE EXTENSION pg_stat_statements.";

/// Placeholder for a feed without data; a missing extension is a notice, not an error.
fn queries_placeholder(feed: &FeedState<Vec<QueryStat>, BackendError>) -> Option<String> {
    if feed.data.is_none() && matches!(feed.error, Some(BackendError::ExtensionMissing(_))) {
        return Some(EXTENSION_HINT.to_string());
    }
    feed_placeholder(feed)
}

fn hit_ratio(q: &QueryStat) -> Option<f64> {
    let total = q.shared_blks_hit + q.shared_blks_read;
    (total > 0).then(|| q.shared_blks_hit as f64 / total as f64 * 100.0)
}

pub fn render_queries(
    frame: &mut Frame,
    area: Rect,
    tab: &mut TabState,
    feed: &FeedState<Vec<QueryStat>, BackendError>,
) {
    if let Some(msg) = queries_placeholder(feed) {
        render_message(frame, area, TITLE, &msg);
        return;
    }
    let Some(queries) = feed.data.as_deref() else {
        return;
    };
    if queries.is_empty() {
        render_message(frame, area, TITLE, "No statements recorded yet");
        return;
    }

    let headers = ["CALLS", "TOTAL", "MEAN", "MAX", "ROWS", "HIT%", "QUERY"];
    let header = Row::new(headers.iter().map(|h| Span::raw(*h))).style(Styles::table_header());
    let widths = [
        Constraint::Length(10),
        Constraint::Length(11),
        Constraint::Length(11),
        Constraint::Length(11),
        Constraint::Length(10),
        Constraint::Length(7),
        Constraint::Percentage(100),
    ];

    let rows: Vec<Row> = queries
        .iter()
        .map(|q| {
            let style = if q.mean_exec_time >= SLOW_MEAN_MS {
                Styles::warning()
            } else {
                Style::default()
            };
            Row::new(vec![
                Span::raw(format_count(q.calls)),
                Span::raw(format_time(q.total_exec_time)),
                Span::raw(format_time(q.mean_exec_time)),
                Span::raw(format_time(q.max_exec_time)),
                Span::raw(format_count(q.rows)),
                Span::raw(format_percent(hit_ratio(q))),
                Span::raw(normalize_for_display(&q.query)),
            ])
            .style(style)
        })
        .collect();

    tab.resolve(rows.len());
    let title = format!("{} by execution time ({})", TITLE, queries.len());
    let table = Table::new(rows, widths)
        .header(header)
        .block(
            Block::default()
                .title(title)
                .borders(Borders::ALL)
                .style(Styles::default()),
        )
        .column_spacing(1)
        .row_highlight_style(Styles::selected());

    frame.render_widget(Clear, area);
    frame.render_stateful_widget(table, area, &mut tab.ratatui_state);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MockData;
    use std::sync::Arc;

    #[test]
    fn missing_extension_is_a_hint_not_an_error() {
        let mut feed: FeedState<Vec<QueryStat>, BackendError> = FeedState::default();
        feed.error = Some(BackendError::ExtensionMissing(
            "pg_stat_statements".to_string(),
        ));
        assert_eq!(queries_placeholder(&feed).as_deref(), Some(EXTENSION_HINT));

        feed.error = Some(BackendError::Query("permission denied".to_string()));
        assert_eq!(
            queries_placeholder(&feed).as_deref(),
            Some("No data: query error: permission denied")
        );
    }

    #[test]
    fn data_replaces_placeholder() {
        let queries = MockData::demo().top_queries.unwrap();
        let feed = FeedState {
            data: Some(Arc::new(queries.clone())),
            error: None,
            is_loading: false,
        };
        assert!(queries_placeholder(&feed).is_none());
        assert_eq!(hit_ratio(&queries[0]).map(|h| h.round()), Some(99.0));
    }
}
