//! Tables tab: table access statistics above index usage.

use ratatui::Frame;
use ratatui::layout::{Constraint, Layout, Rect};
use ratatui::style::Style;
use ratatui::text::Span;
use ratatui::widgets::{Block, Borders, Clear, Row, Table};

use super::{feed_placeholder, render_message};
use crate::backend::{BackendError, IndexStats, TableStats};
use crate::fmt::{ABSENT, format_count, format_percent};
use crate::refresh::FeedState;
use crate::tui::feeds::TablesData;
use crate::tui::state::TabState;
use crate::tui::style::Styles;

const TITLE: &str = "Tables";
const DEAD_WARN_PCT: f64 = 20.0;

pub fn render_tables(
    frame: &mut Frame,
    area: Rect,
    tab: &mut TabState,
    feed: &FeedState<TablesData, BackendError>,
) {
    if let Some(msg) = feed_placeholder(feed) {
        render_message(frame, area, TITLE, &msg);
        return;
    }
    let Some(data) = feed.data.as_deref() else {
        return;
    };

    let chunks = Layout::vertical([Constraint::Percentage(60), Constraint::Percentage(40)]).split(area);
    render_table_stats(frame, chunks[0], tab, &data.tables);
    render_index_stats(frame, chunks[1], &data.indexes);
}

fn render_table_stats(frame: &mut Frame, area: Rect, tab: &mut TabState, tables: &[TableStats]) {
    let headers = [
        "TABLE",
        "SEQ SCAN",
        "SEQ READ",
        "IDX SCAN",
        "LIVE",
        "DEAD",
        "DEAD%",
        "LAST AUTOVACUUM",
    ];
    let header = Row::new(headers.iter().map(|h| Span::raw(*h))).style(Styles::table_header());
    let widths = [
        Constraint::Min(24),
        Constraint::Length(10),
        Constraint::Length(10),
        Constraint::Length(10),
        Constraint::Length(10),
        Constraint::Length(10),
        Constraint::Length(7),
        Constraint::Length(24),
    ];

    let rows: Vec<Row> = tables
        .iter()
        .map(|t| {
            let dead = t.dead_ratio();
            let dead_style = match dead {
                Some(d) if d >= DEAD_WARN_PCT => Styles::warning(),
                _ => Style::default(),
            };
            Row::new(vec![
                Span::raw(t.qualified_name()),
                Span::raw(format_count(t.seq_scan)),
                Span::raw(format_count(t.seq_tup_read)),
                Span::raw(t.idx_scan.map(format_count).unwrap_or_else(|| ABSENT.to_string())),
                Span::raw(format_count(t.n_live_tup)),
                Span::raw(format_count(t.n_dead_tup)),
                Span::styled(format_percent(dead), dead_style),
                Span::raw(
                    t.last_autovacuum
                        .clone()
                        .unwrap_or_else(|| ABSENT.to_string()),
                ),
            ])
        })
        .collect();

    tab.resolve(rows.len());
    let table = Table::new(rows, widths)
        .header(header)
        .block(
            Block::default()
                .title(format!("{} ({})", TITLE, tables.len()))
                .borders(Borders::ALL)
                .style(Styles::default()),
        )
        .column_spacing(1)
        .row_highlight_style(Styles::selected());

    frame.render_widget(Clear, area);
    frame.render_stateful_widget(table, area, &mut tab.ratatui_state);
}

fn render_index_stats(frame: &mut Frame, area: Rect, indexes: &[IndexStats]) {
    let headers = ["INDEX", "TABLE", "SCANS", "TUP READ", "TUP FETCH"];
    let header = Row::new(headers.iter().map(|h| Span::raw(*h))).style(Styles::table_header());
    let widths = [
        Constraint::Min(28),
        Constraint::Min(20),
        Constraint::Length(10),
        Constraint::Length(10),
        Constraint::Length(10),
    ];

    let rows: Vec<Row> = indexes
        .iter()
        .map(|i| {
            let style = if i.idx_scan == 0 {
                Styles::dim()
            } else {
                Style::default()
            };
            Row::new(vec![
                Span::raw(i.indexname.clone()),
                Span::raw(format!("{}.{}", i.schemaname, i.tablename)),
                Span::raw(format_count(i.idx_scan)),
                Span::raw(format_count(i.idx_tup_read)),
                Span::raw(format_count(i.idx_tup_fetch)),
            ])
            .style(style)
        })
        .collect();

    let table = Table::new(rows, widths)
        .header(header)
        .block(
            Block::default()
                .title(format!("Indexes ({})", indexes.len()))
                .borders(Borders::ALL)
                .style(Styles::default()),
        )
        .column_spacing(1);

    frame.render_widget(Clear, area);
    frame.render_widget(table, area);
}
