//! Main TUI application.

use std::io::{self, Stdout};
use std::sync::Arc;
use std::time::Duration;

use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use tracing::{info, warn};

use super::event::{Event, EventHandler};
use super::feeds::Feeds;
use super::input::{KeyAction, handle_key};
use super::render::render;
use super::state::{AppState, PopupState};
use crate::backend::{self, MetricsBackend};
use crate::plan::PlanInspector;
use crate::refresh::RefreshOptions;
use crate::servers::ServerConfig;

/// Main TUI application.
pub struct App {
    backend: Arc<dyn MetricsBackend>,
    state: AppState,
    feeds: Feeds,
    inspector: PlanInspector,
    should_quit: bool,
}

impl App {
    /// Creates the app and starts the feeds for the initial server.
    ///
    /// Must be called within a tokio runtime.
    pub fn new(
        backend: Arc<dyn MetricsBackend>,
        servers: Vec<ServerConfig>,
        initial_server: Option<&str>,
        options: RefreshOptions,
    ) -> io::Result<Self> {
        if servers.is_empty() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "no servers configured",
            ));
        }
        let server_idx = match initial_server {
            Some(id) => servers.iter().position(|s| s.id == id).ok_or_else(|| {
                io::Error::new(io::ErrorKind::NotFound, format!("unknown server '{}'", id))
            })?,
            None => 0,
        };

        let state = AppState::new(servers, server_idx, options.enabled);
        let server_id = state.servers[server_idx].id.clone();
        let feeds = Feeds::start(backend.clone(), &server_id, options);

        let explain_backend = backend.clone();
        let inspector = PlanInspector::new(move |req: crate::plan::ExplainRequest| {
            backend::call(explain_backend.clone(), move |b| {
                b.explain(&req.server_id, &req.query, req.analyze)
            })
        });

        Ok(Self {
            backend,
            state,
            feeds,
            inspector,
            should_quit: false,
        })
    }

    /// Connects every configured server. Failures are reported, not fatal:
    /// feeds of an unreachable server show the error and keep retrying.
    pub async fn connect_all(&mut self) {
        for server in self.state.servers.clone() {
            let config = server.clone();
            match backend::call(self.backend.clone(), move |b| b.connect(&config)).await {
                Ok(version) => info!(server = %server.id, version = %version, "server ready"),
                Err(e) => {
                    warn!(server = %server.id, error = %e, "connect failed");
                    self.state.status_message =
                        Some(format!("{}: {}", server.name, e));
                }
            }
        }
    }

    /// Runs the TUI application.
    pub async fn run(mut self, tick_rate: Duration) -> io::Result<()> {
        self.connect_all().await;
        if !self.state.live {
            self.feeds.refetch();
        }

        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen)?;
        let mut terminal = Terminal::new(CrosstermBackend::new(stdout))?;

        let mut events = EventHandler::new(tick_rate);
        let result = self.event_loop(&mut terminal, &mut events).await;

        // Restore terminal
        disable_raw_mode()?;
        execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
        terminal.show_cursor()?;

        result
    }

    async fn event_loop(
        &mut self,
        terminal: &mut Terminal<CrosstermBackend<Stdout>>,
        events: &mut EventHandler,
    ) -> io::Result<()> {
        loop {
            let feeds = self.feeds.snapshot();
            let inspector = self.inspector.state();
            terminal.draw(|frame| render(frame, &mut self.state, &feeds, &inspector))?;

            tokio::select! {
                event = events.next() => match event {
                    Some(Event::Key(key)) => {
                        let action = handle_key(&mut self.state, key);
                        self.apply(action);
                    }
                    Some(Event::Tick) | Some(Event::Resize) => {}
                    None => self.should_quit = true,
                },
                _ = self.feeds.changed() => {}
                _ = self.inspector.changed() => {}
            }

            if self.should_quit {
                return Ok(());
            }
        }
    }

    fn apply(&mut self, action: KeyAction) {
        match action {
            KeyAction::None => {}
            KeyAction::Quit => self.should_quit = true,
            KeyAction::SwitchServer => self.switch_server(),
            KeyAction::ToggleLive => {
                info!(live = self.state.live, "live refresh toggled");
                self.feeds.set_enabled(self.state.live);
            }
            KeyAction::Refetch => {
                if self.feeds.refetch() == 0 {
                    self.state.status_message = Some("Refresh already in progress".to_string());
                }
            }
            KeyAction::ExplainSelected { analyze } => {
                let selected = self.feeds.snapshot().activity.data.and_then(|sessions| {
                    let idx = self.state.activity.selected.min(sessions.len().checked_sub(1)?);
                    Some(sessions[idx].query.clone())
                });
                match selected {
                    Some(query) if !query.trim().is_empty() => self.explain(&query, analyze),
                    _ => {
                        self.state.popup = PopupState::None;
                        self.state.status_message = Some("No session selected".to_string());
                    }
                }
            }
            KeyAction::ExplainQuery(query) => self.explain(&query, false),
            KeyAction::ClosePlan => self.inspector.close(),
        }
    }

    fn explain(&mut self, query: &str, analyze: bool) {
        let server_id = self.feeds.server_id().to_string();
        self.inspector.request(&server_id, query, analyze);
    }

    fn switch_server(&mut self) {
        let Some(server) = self.state.current_server().cloned() else {
            return;
        };
        self.inspector.close();
        self.state.popup = PopupState::None;

        if !self.backend.is_connected(&server.id) {
            // Feeds report NotConnected until this lands, then recover on their own.
            let backend = self.backend.clone();
            tokio::spawn(async move {
                let id = server.id.clone();
                if let Err(e) = backend::call(backend, move |b| b.connect(&server)).await {
                    warn!(server = %id, error = %e, "connect failed");
                }
            });
        }
        let id = self.state.current_server().map(|s| s.id.clone()).unwrap_or_default();
        self.feeds.switch_server(&id);
    }
}
