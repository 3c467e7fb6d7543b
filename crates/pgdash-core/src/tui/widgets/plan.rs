//! Plan inspector popup: summary, warnings and the node tree with
//! cost/time bars.

use ratatui::Frame;
use ratatui::layout::Rect;
use ratatui::style::{Color, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, Paragraph, Wrap};

use super::centered_rect;
use crate::fmt::{format_cost, format_opt_time, format_rows, format_time, normalize_for_display, truncate};
use crate::plan::{
    InspectorState, Plan, PlanMetrics, PlanNode, cost_bar_width, cost_share, derive_metrics,
    row_mismatch, time_bar_width,
};
use crate::tui::style::Styles;

/// Bar cells for a 100% share.
const BAR_CELLS: usize = 10;

/// Fixed-width bar for a share in `[0, 100]`.
fn bar(pct: f64) -> String {
    let filled = ((pct / 100.0) * BAR_CELLS as f64).round() as usize;
    let filled = filled.min(BAR_CELLS);
    format!("{}{}", "█".repeat(filled), "░".repeat(BAR_CELLS - filled))
}

/// Renders the popup for the current inspector state. Nothing for `Idle`.
pub fn render_plan_popup(frame: &mut Frame, area: Rect, inspector: &InspectorState, scroll: &mut usize) {
    let (title, content) = match inspector {
        InspectorState::Idle => return,
        InspectorState::Pending(req) => (
            if req.analyze { " Analyzing… " } else { " Explaining… " },
            vec![
                Line::from(Span::styled(
                    truncate(&normalize_for_display(&req.query), 200),
                    Styles::dim(),
                )),
                Line::from(""),
                Line::from(if req.analyze {
                    "The query is being executed; its effects will be rolled back."
                } else {
                    "Waiting for the planner…"
                }),
            ],
        ),
        InspectorState::Failed(msg) => (
            " Analysis failed ",
            vec![
                Line::from(Span::styled(msg.clone(), Styles::critical())),
                Line::from(""),
                Line::from(Span::styled("Esc to close", Styles::dim())),
            ],
        ),
        InspectorState::Ready(plan) => (
            if plan.is_measured() {
                " Plan (measured) "
            } else {
                " Plan (estimate) "
            },
            plan_lines(plan),
        ),
    };

    let popup_area = centered_rect(90, 85, area);
    frame.render_widget(Clear, popup_area);

    let block = Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .style(Style::default().fg(Color::White).bg(Color::Black));
    let inner = block.inner(popup_area);
    frame.render_widget(block, popup_area);

    let max_scroll = content.len().saturating_sub(inner.height as usize);
    if *scroll > max_scroll {
        *scroll = max_scroll;
    }
    let paragraph = Paragraph::new(content)
        .wrap(Wrap { trim: false })
        .scroll((*scroll as u16, 0));
    frame.render_widget(paragraph, inner);
}

/// All popup lines for a ready plan.
pub(crate) fn plan_lines(plan: &Plan) -> Vec<Line<'static>> {
    let metrics = derive_metrics(plan);
    let mut lines = Vec::new();

    lines.push(Line::from(Span::styled("Summary", Styles::section_header())));
    lines.push(Line::from(vec![
        Span::styled("  Total cost ", Styles::dim()),
        Span::raw(format_cost(plan.total_cost)),
        Span::styled("   Planning ", Styles::dim()),
        Span::raw(format_opt_time(plan.planning_time)),
        Span::styled("   Execution ", Styles::dim()),
        Span::raw(if plan.is_measured() {
            format_opt_time(plan.execution_time)
        } else {
            "- (estimate only)".to_string()
        }),
        Span::styled("   Warnings ", Styles::dim()),
        Span::raw(plan.warnings.len().to_string()),
    ]));

    if !plan.warnings.is_empty() {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled("Warnings", Styles::section_header())));
        for w in &plan.warnings {
            lines.push(Line::from(Span::styled(format!("  ⚠ {}", w), Styles::warning())));
        }
    }

    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled("Plan", Styles::section_header())));
    for row in plan.rows() {
        node_lines(&mut lines, row.node, row.depth, &metrics);
    }
    lines
}

fn node_lines(lines: &mut Vec<Line<'static>>, node: &PlanNode, depth: usize, metrics: &PlanMetrics) {
    let indent = "  ".repeat(depth + 1);
    let arrow = if depth == 0 { "" } else { "└ " };

    lines.push(Line::from(vec![
        Span::raw(format!("{}{}", indent, arrow)),
        Span::styled(node.label(), Styles::node_kind(node.kind())),
    ]));

    let detail = format!("{}    ", indent);
    let mut stats = vec![
        Span::raw(detail.clone()),
        Span::styled(bar(cost_bar_width(node, metrics)), Styles::cost_bar()),
        Span::raw(format!(
            " cost {} ({:.0}%)  rows {}",
            format_cost(node.total_cost),
            cost_share(node, metrics),
            format_rows(node.plan_rows)
        )),
    ];
    if let Some(actual) = node.actual {
        let rows_style = if row_mismatch(node) {
            Styles::critical()
        } else {
            Style::default()
        };
        stats.push(Span::raw(" → "));
        stats.push(Span::styled(format_rows(actual.rows), rows_style));
        if let Some(width) = time_bar_width(node, metrics) {
            stats.push(Span::raw("  "));
            stats.push(Span::styled(bar(width), Styles::time_bar()));
        }
        let mut time = format!(" {}", format_time(actual.total_time));
        if actual.loops > 1 {
            time.push_str(&format!(" x{}", actual.loops));
        }
        stats.push(Span::raw(time));
    }
    lines.push(Line::from(stats));

    if let Some(b) = node.buffers {
        lines.push(Line::from(Span::styled(
            format!("{}buffers hit={} read={}", detail, b.shared_hit, b.shared_read),
            Styles::dim(),
        )));
    }
    for (label, text) in node.conditions() {
        lines.push(Line::from(Span::styled(
            format!("{}{}: {}", detail, label, text),
            Styles::dim(),
        )));
    }
    if let Some(keys) = &node.sort_key {
        lines.push(Line::from(Span::styled(
            format!("{}Sort Key: {}", detail, keys.join(", ")),
            Styles::dim(),
        )));
    }
    for w in &node.warnings {
        lines.push(Line::from(Span::styled(
            format!("{}⚠ {}", detail, w),
            Styles::warning(),
        )));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MockData;

    fn text(line: &Line) -> String {
        line.spans.iter().map(|s| s.content.as_ref()).collect()
    }

    #[test]
    fn bar_fills_proportionally() {
        assert_eq!(bar(0.0), "░░░░░░░░░░");
        assert_eq!(bar(40.0), "████░░░░░░");
        assert_eq!(bar(100.0), "██████████");
        assert_eq!(bar(250.0), "██████████");
    }

    #[test]
    fn estimate_plan_has_no_actual_rows() {
        let plan = Plan::from_value(MockData::demo().plan_estimate, "q").unwrap();
        let lines = plan_lines(&plan);
        let all: Vec<String> = lines.iter().map(text).collect();
        assert!(all.iter().any(|l| l.contains("Execution - (estimate only)")));
        assert!(all.iter().any(|l| l.contains("Hash Join")));
        assert!(!all.iter().any(|l| l.contains(" → ")));
    }

    #[test]
    fn measured_plan_marks_row_mismatch_red() {
        let plan = Plan::from_json(
            r#"{"Plan": {"Node Type": "Seq Scan", "Relation Name": "t",
                "Startup Cost": 0, "Total Cost": 10, "Plan Rows": 5, "Plan Width": 4,
                "Actual Startup Time": 0.01, "Actual Total Time": 3.0,
                "Actual Rows": 500, "Actual Loops": 1},
                "Planning Time": 0.1, "Execution Time": 3.2}"#,
            "select * from t",
        )
        .unwrap();
        let lines = plan_lines(&plan);
        let stats = lines
            .iter()
            .find(|l| text(l).contains(" → "))
            .expect("stats line");
        let actual = stats
            .spans
            .iter()
            .find(|s| s.content == "500")
            .expect("actual rows span");
        assert_eq!(actual.style, Styles::critical());
        assert!(text(stats).contains("██████████"));
    }
}
