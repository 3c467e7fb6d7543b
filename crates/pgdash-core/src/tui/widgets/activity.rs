//! Activity tab: non-idle sessions. The selected row is what `e`/`E` explain.

use ratatui::Frame;
use ratatui::layout::{Constraint, Rect};
use ratatui::style::Style;
use ratatui::text::Span;
use ratatui::widgets::{Block, Borders, Clear, Row, Table};

use super::{feed_placeholder, render_message};
use crate::backend::{ActiveQuery, BackendError};
use crate::fmt::{ABSENT, format_opt_time, normalize_for_display};
use crate::refresh::FeedState;
use crate::tui::state::TabState;
use crate::tui::style::Styles;

const TITLE: &str = "Activity";

fn wait_label(q: &ActiveQuery) -> String {
    match (&q.wait_event_type, &q.wait_event) {
        (Some(t), Some(e)) => format!("{}:{}", t, e),
        (Some(t), None) => t.clone(),
        _ => ABSENT.to_string(),
    }
}

fn row_style(q: &ActiveQuery) -> Style {
    if q.wait_event_type.as_deref() == Some("Lock") {
        Styles::critical()
    } else if q.state.starts_with("idle in transaction") {
        Styles::warning()
    } else {
        Style::default()
    }
}

pub fn render_activity(
    frame: &mut Frame,
    area: Rect,
    tab: &mut TabState,
    feed: &FeedState<Vec<ActiveQuery>, BackendError>,
) {
    if let Some(msg) = feed_placeholder(feed) {
        render_message(frame, area, TITLE, &msg);
        return;
    }
    let Some(sessions) = feed.data.as_deref() else {
        return;
    };
    if sessions.is_empty() {
        render_message(frame, area, TITLE, "No active sessions");
        return;
    }

    let headers = ["PID", "DATABASE", "USER", "STATE", "WAIT", "DURATION", "QUERY"];
    let header = Row::new(headers.iter().map(|h| Span::raw(*h))).style(Styles::table_header());
    let widths = [
        Constraint::Length(8),
        Constraint::Length(12),
        Constraint::Length(12),
        Constraint::Length(20),
        Constraint::Length(22),
        Constraint::Length(10),
        Constraint::Percentage(100),
    ];

    let rows: Vec<Row> = sessions
        .iter()
        .map(|q| {
            Row::new(vec![
                Span::raw(q.pid.to_string()),
                Span::raw(q.datname.clone().unwrap_or_else(|| ABSENT.to_string())),
                Span::raw(q.usename.clone().unwrap_or_else(|| ABSENT.to_string())),
                Span::raw(q.state.clone()),
                Span::raw(wait_label(q)),
                Span::raw(format_opt_time(q.duration_ms)),
                Span::raw(normalize_for_display(&q.query)),
            ])
            .style(row_style(q))
        })
        .collect();

    tab.resolve(rows.len());
    let title = format!("{} ({} sessions) e explain, E analyze", TITLE, sessions.len());
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
