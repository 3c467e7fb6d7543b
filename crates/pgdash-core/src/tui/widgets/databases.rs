//! Databases tab: per-database counters joined with sizes, plus a
//! checkpoint and background writer summary.

use ratatui::Frame;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::Style;
use ratatui::text::Span;
use ratatui::widgets::{Block, Borders, Clear, Paragraph, Row, Table};

use super::{feed_placeholder, render_message};
use crate::backend::{BackendError, BgWriterStats, total_cache_hit_ratio};
use crate::fmt::{format_bytes, format_count, format_percent, format_time};
use crate::refresh::FeedState;
use crate::tui::feeds::DatabasesData;
use crate::tui::state::TabState;
use crate::tui::style::Styles;

const TITLE: &str = "Databases";

/// Share of requested checkpoints above which the summary is highlighted, %.
const REQUESTED_CHECKPOINTS_WARN_PCT: f64 = 10.0;

fn requested_share(bg: &BgWriterStats) -> Option<f64> {
    let total = bg.checkpoints_timed + bg.checkpoints_req;
    (total > 0).then(|| bg.checkpoints_req as f64 / total as f64 * 100.0)
}

/// One-line checkpoint and buffer write summary.
fn bgwriter_summary(bg: &BgWriterStats) -> String {
    format!(
        "timed {}  requested {} ({})  write {}  sync {}  buffers: checkpoint {} clean {} backend {}",
        format_count(bg.checkpoints_timed),
        format_count(bg.checkpoints_req),
        format_percent(requested_share(bg)),
        format_time(bg.checkpoint_write_time),
        format_time(bg.checkpoint_sync_time),
        format_count(bg.buffers_checkpoint),
        format_count(bg.buffers_clean),
        format_count(bg.buffers_backend),
    )
}

fn render_bgwriter(frame: &mut Frame, area: Rect, bg: &BgWriterStats) {
    let style = match requested_share(bg) {
        Some(pct) if pct > REQUESTED_CHECKPOINTS_WARN_PCT => Styles::warning(),
        _ => Styles::default(),
    };
    let summary = Paragraph::new(bgwriter_summary(bg)).style(style).block(
        Block::default()
            .title("Checkpoints")
            .borders(Borders::ALL)
            .style(Styles::default()),
    );
    frame.render_widget(Clear, area);
    frame.render_widget(summary, area);
}

pub fn render_databases(
    frame: &mut Frame,
    area: Rect,
    tab: &mut TabState,
    feed: &FeedState<DatabasesData, BackendError>,
) {
    if let Some(msg) = feed_placeholder(feed) {
        render_message(frame, area, TITLE, &msg);
        return;
    }
    let Some(data) = feed.data.as_deref() else {
        return;
    };
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(3), Constraint::Length(3)])
        .split(area);
    render_bgwriter(frame, chunks[1], &data.bgwriter);
    let area = chunks[0];

    let headers = [
        "DATABASE",
        "BACKENDS",
        "COMMITS",
        "ROLLBACKS",
        "CACHE HIT",
        "TEMP",
        "DEADLOCKS",
        "SIZE",
    ];
    let header = Row::new(headers.iter().map(|h| Span::raw(*h))).style(Styles::table_header());

    let widths = [
        Constraint::Min(16),
        Constraint::Length(9),
        Constraint::Length(10),
        Constraint::Length(10),
        Constraint::Length(10),
        Constraint::Length(10),
        Constraint::Length(10),
        Constraint::Length(10),
    ];

    let rows: Vec<Row> = data
        .stats
        .iter()
        .map(|db| {
            let hit = db.cache_hit_ratio();
            let hit_style = match hit {
                Some(h) if h < 90.0 => Styles::critical(),
                Some(h) if h < 99.0 => Styles::warning(),
                _ => Style::default(),
            };
            let size = data
                .sizes
                .iter()
                .find(|s| s.database_name == db.datname)
                .map(|s| format_bytes(s.size_bytes.max(0) as u64))
                .unwrap_or_else(|| "-".to_string());
            let deadlock_style = if db.deadlocks > 0 {
                Styles::warning()
            } else {
                Style::default()
            };
            Row::new(vec![
                Span::raw(db.datname.clone()),
                Span::raw(db.numbackends.to_string()),
                Span::raw(format_count(db.xact_commit)),
                Span::raw(format_count(db.xact_rollback)),
                Span::styled(format_percent(hit), hit_style),
                Span::raw(format_bytes(db.temp_bytes.max(0) as u64)),
                Span::styled(db.deadlocks.to_string(), deadlock_style),
                Span::raw(size),
            ])
        })
        .collect();

    tab.resolve(rows.len());
    let title = format!(
        "{} ({}) cache hit {}",
        TITLE,
        data.stats.len(),
        format_percent(total_cache_hit_ratio(&data.stats))
    );
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

    #[test]
    fn bgwriter_summary_reports_requested_share() {
        let bg = MockData::demo().bgwriter;
        assert_eq!(
            bgwriter_summary(&bg),
            "timed 1420  requested 37 (2.5%)  write 8450.00 s  sync 12.30 s  \
             buffers: checkpoint 5.6M clean 310.0K backend 98.0K"
        );
    }

    #[test]
    fn fresh_server_has_no_requested_share() {
        let bg = BgWriterStats {
            checkpoints_timed: 0,
            checkpoints_req: 0,
            checkpoint_write_time: 0.0,
            checkpoint_sync_time: 0.0,
            buffers_checkpoint: 0,
            buffers_clean: 0,
            maxwritten_clean: 0,
            buffers_backend: 0,
            buffers_alloc: 0,
        };
        assert_eq!(requested_share(&bg), None);
        assert!(bgwriter_summary(&bg).contains("requested 0 (-)"));
    }
}
