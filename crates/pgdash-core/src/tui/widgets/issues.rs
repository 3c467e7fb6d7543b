//! Issues tab: configuration and performance findings, critical first.

use ratatui::Frame;
use ratatui::layout::{Constraint, Rect};
use ratatui::text::Span;
use ratatui::widgets::{Block, Borders, Clear, Row, Table};

use super::{feed_placeholder, render_message};
use crate::analysis::{Issue, Severity};
use crate::backend::BackendError;
use crate::refresh::FeedState;
use crate::tui::state::TabState;
use crate::tui::style::Styles;

const TITLE: &str = "Issues";

pub fn render_issues(
    frame: &mut Frame,
    area: Rect,
    tab: &mut TabState,
    feed: &FeedState<Vec<Issue>, BackendError>,
) {
    if let Some(msg) = feed_placeholder(feed) {
        render_message(frame, area, TITLE, &msg);
        return;
    }
    let Some(issues) = feed.data.as_deref() else {
        return;
    };
    if issues.is_empty() {
        render_message(frame, area, TITLE, "No issues detected");
        return;
    }

    let headers = ["SEV", "AREA", "ISSUE", "DETAIL", "RECOMMENDATION"];
    let header = Row::new(headers.iter().map(|h| Span::raw(*h))).style(Styles::table_header());
    let widths = [
        Constraint::Length(5),
        Constraint::Length(7),
        Constraint::Percentage(40),
        Constraint::Length(34),
        Constraint::Percentage(60),
    ];

    let rows: Vec<Row> = issues
        .iter()
        .map(|i| {
            Row::new(vec![
                Span::styled(i.severity.label(), Styles::severity(i.severity)),
                Span::raw(i.category.label()),
                Span::raw(i.title.clone()),
                Span::styled(i.detail.clone().unwrap_or_default(), Styles::dim()),
                Span::raw(i.recommendation.clone()),
            ])
        })
        .collect();

    let critical = issues
        .iter()
        .filter(|i| i.severity == Severity::Critical)
        .count();
    tab.resolve(rows.len());
    let title = format!("{} ({}, {} critical)", TITLE, issues.len(), critical);
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
