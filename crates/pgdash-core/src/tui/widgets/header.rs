//! Header bar (clock, server, refresh mode, tabs), error banner and footer.

use chrono::Local;
use ratatui::Frame;
use ratatui::layout::{Constraint, Layout, Rect};
use ratatui::style::Color;
use ratatui::text::{Line, Span};
use ratatui::widgets::Paragraph;

use crate::backend::BackendError;
use crate::fmt::truncate;
use crate::tui::state::{AppState, InputMode, Tab};
use crate::tui::style::Styles;

/// Renders the header bar.
pub fn render_header(frame: &mut Frame, area: Rect, state: &AppState, loading: bool) {
    let chunks = Layout::horizontal([
        Constraint::Length(10), // Time
        Constraint::Length(28), // Server
        Constraint::Length(12), // Mode
        Constraint::Min(20),    // Tabs
    ])
    .split(area);

    let time = Paragraph::new(Local::now().format(" %H:%M:%S").to_string()).style(Styles::header());
    frame.render_widget(time, chunks[0]);

    let server = state
        .current_server()
        .map(|s| truncate(&s.name, 26))
        .unwrap_or_else(|| "-".to_string());
    frame.render_widget(
        Paragraph::new(format!(" {}", server)).style(Styles::header()),
        chunks[1],
    );

    // Mode + loading marker
    let (mode_str, mode_style) = if state.live {
        (" LIVE", Styles::header().fg(Color::LightGreen))
    } else {
        (" PAUSED", Styles::header().fg(Color::Yellow))
    };
    let mode = Line::from(vec![
        Span::styled(mode_str, mode_style),
        Span::styled(if loading { " ⟳" } else { "" }, Styles::header()),
    ]);
    frame.render_widget(Paragraph::new(mode).style(Styles::header()), chunks[2]);

    // Tabs
    let tabs: Vec<Span> = Tab::all()
        .iter()
        .enumerate()
        .flat_map(|(i, tab)| {
            let style = if *tab == state.current_tab {
                Styles::tab_active()
            } else {
                Styles::tab_inactive()
            };
            vec![
                Span::styled(format!(" {}:", i + 1), Styles::dim()),
                Span::styled(format!("{} ", tab.name()), style),
            ]
        })
        .collect();
    frame.render_widget(
        Paragraph::new(Line::from(tabs)).style(Styles::header()),
        chunks[3],
    );
}

/// One-line banner for the last fetch error. Data below it may be stale.
pub fn render_error_banner(frame: &mut Frame, area: Rect, error: &BackendError) {
    let text = format!(" ! {} (showing last data)", error);
    frame.render_widget(Paragraph::new(text).style(Styles::error_banner()), area);
}

/// Footer: query input, status message, or key hints.
pub fn render_footer(frame: &mut Frame, area: Rect, state: &AppState) {
    let line = if state.input_mode == InputMode::Query {
        Line::from(vec![
            Span::styled(" EXPLAIN ", Styles::section_header()),
            Span::styled(format!("{}█", state.query_input), Styles::input()),
            Span::styled("  Enter run, Esc cancel", Styles::dim()),
        ])
    } else if let Some(msg) = &state.status_message {
        Line::from(Span::styled(format!(" {}", msg), Styles::warning()))
    } else {
        let hints = [
            ("1-6", "tabs"),
            ("Tab/[ ]", "server"),
            ("p", "pause"),
            ("r", "refresh"),
            ("e/E", "explain"),
            ("x", "query"),
            ("q", "quit"),
        ];
        let spans: Vec<Span> = hints
            .iter()
            .flat_map(|(key, what)| {
                vec![
                    Span::styled(format!(" {}", key), Styles::help_key()),
                    Span::styled(format!(" {} ", what), Styles::dim()),
                ]
            })
            .collect();
        Line::from(spans)
    };
    frame.render_widget(Paragraph::new(line), area);
}
