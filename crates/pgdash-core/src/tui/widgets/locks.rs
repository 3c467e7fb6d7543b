//! Locks tab. Ungranted locks first, as returned by the backend.

use ratatui::Frame;
use ratatui::layout::{Constraint, Rect};
use ratatui::style::Style;
use ratatui::text::Span;
use ratatui::widgets::{Block, Borders, Clear, Row, Table};

use super::{feed_placeholder, render_message};
use crate::backend::{BackendError, LockInfo};
use crate::fmt::ABSENT;
use crate::refresh::FeedState;
use crate::tui::state::TabState;
use crate::tui::style::Styles;

const TITLE: &str = "Locks";

/// Shortens PostgreSQL lock mode names for table display.
fn short_lock_mode(mode: &str) -> &str {
    match mode {
        "AccessShareLock" => "AccShr",
        "RowShareLock" => "RowShr",
        "RowExclusiveLock" => "RowExcl",
        "ShareUpdateExclusiveLock" => "ShrUpdExcl",
        "ShareLock" => "Share",
        "ShareRowExclusiveLock" => "ShrRowExcl",
        "ExclusiveLock" => "Excl",
        "AccessExclusiveLock" => "AccExcl",
        "" => ABSENT,
        other => other,
    }
}

pub fn render_locks(
    frame: &mut Frame,
    area: Rect,
    tab: &mut TabState,
    feed: &FeedState<Vec<LockInfo>, BackendError>,
) {
    if let Some(msg) = feed_placeholder(feed) {
        render_message(frame, area, TITLE, &msg);
        return;
    }
    let Some(locks) = feed.data.as_deref() else {
        return;
    };
    if locks.is_empty() {
        render_message(frame, area, TITLE, "No locks held");
        return;
    }

    let headers = ["PID", "TYPE", "MODE", "RELATION", "DATABASE", "GRANTED"];
    let header = Row::new(headers.iter().map(|h| Span::raw(*h))).style(Styles::table_header());
    let widths = [
        Constraint::Length(8),
        Constraint::Length(14),
        Constraint::Length(12),
        Constraint::Min(20),
        Constraint::Length(14),
        Constraint::Length(8),
    ];

    let waiting = locks.iter().filter(|l| !l.granted).count();
    let rows: Vec<Row> = locks
        .iter()
        .map(|l| {
            let style = if l.granted {
                Style::default()
            } else {
                Styles::warning()
            };
            Row::new(vec![
                Span::raw(l.pid.map(|p| p.to_string()).unwrap_or_else(|| ABSENT.to_string())),
                Span::raw(l.locktype.clone()),
                Span::raw(short_lock_mode(&l.mode).to_string()),
                Span::raw(l.relation.clone().unwrap_or_else(|| ABSENT.to_string())),
                Span::raw(l.database.clone().unwrap_or_else(|| ABSENT.to_string())),
                Span::raw(if l.granted { "yes" } else { "WAIT" }),
            ])
            .style(style)
        })
        .collect();

    tab.resolve(rows.len());
    let title = format!("{} ({} held, {} waiting)", TITLE, locks.len() - waiting, waiting);
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
