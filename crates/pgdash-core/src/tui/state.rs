//! Dashboard UI state. Feed data lives in [`super::feeds`]; this is only what
//! the user controls.

use ratatui::widgets::TableState as RatatuiTableState;

use crate::servers::ServerConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Tab {
    #[default]
    Databases,
    Activity,
    Queries,
    Locks,
    Tables,
    Issues,
}

impl Tab {
    pub fn all() -> &'static [Tab] {
        &[
            Tab::Databases,
            Tab::Activity,
            Tab::Queries,
            Tab::Locks,
            Tab::Tables,
            Tab::Issues,
        ]
    }

    pub fn name(self) -> &'static str {
        match self {
            Tab::Databases => "Databases",
            Tab::Activity => "Activity",
            Tab::Queries => "Queries",
            Tab::Locks => "Locks",
            Tab::Tables => "Tables",
            Tab::Issues => "Issues",
        }
    }

    /// Tab bound to a digit key, `'1'` being the first.
    pub fn from_digit(c: char) -> Option<Tab> {
        let idx = c.to_digit(10)?.checked_sub(1)? as usize;
        Tab::all().get(idx).copied()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InputMode {
    #[default]
    Normal,
    /// Typing an ad-hoc query to explain.
    Query,
}

/// Only one popup can be open at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PopupState {
    #[default]
    None,
    Plan {
        scroll: usize,
    },
    QuitConfirm,
}

/// Row selection of one table tab. Clamped to the row count at render time.
#[derive(Debug, Default)]
pub struct TabState {
    pub selected: usize,
    pub ratatui_state: RatatuiTableState,
}

impl TabState {
    pub fn select_up(&mut self) {
        self.selected = self.selected.saturating_sub(1);
    }

    pub fn select_down(&mut self) {
        self.selected = self.selected.saturating_add(1);
    }

    pub fn reset(&mut self) {
        self.selected = 0;
        self.ratatui_state = RatatuiTableState::default();
    }

    /// Clamps the selection to `len` rows and syncs the ratatui state.
    pub fn resolve(&mut self, len: usize) -> Option<usize> {
        if len == 0 {
            self.selected = 0;
            self.ratatui_state.select(None);
            return None;
        }
        self.selected = self.selected.min(len - 1);
        self.ratatui_state.select(Some(self.selected));
        Some(self.selected)
    }
}

#[derive(Debug)]
pub struct AppState {
    pub current_tab: Tab,
    pub input_mode: InputMode,
    /// Ad-hoc query buffer (`x`).
    pub query_input: String,
    pub popup: PopupState,
    pub servers: Vec<ServerConfig>,
    pub server_idx: usize,
    /// Live refresh on (`p` toggles).
    pub live: bool,
    /// Temporary status message shown in the footer.
    pub status_message: Option<String>,
    pub databases: TabState,
    pub activity: TabState,
    pub queries: TabState,
    pub locks: TabState,
    pub tables: TabState,
    pub issues: TabState,
}

impl AppState {
    pub fn new(servers: Vec<ServerConfig>, server_idx: usize, live: bool) -> Self {
        let server_idx = server_idx.min(servers.len().saturating_sub(1));
        Self {
            current_tab: Tab::default(),
            input_mode: InputMode::Normal,
            query_input: String::new(),
            popup: PopupState::None,
            servers,
            server_idx,
            live,
            status_message: None,
            databases: TabState::default(),
            activity: TabState::default(),
            queries: TabState::default(),
            locks: TabState::default(),
            tables: TabState::default(),
            issues: TabState::default(),
        }
    }

    pub fn current_server(&self) -> Option<&ServerConfig> {
        self.servers.get(self.server_idx)
    }

    pub fn tab_state_mut(&mut self, tab: Tab) -> &mut TabState {
        match tab {
            Tab::Databases => &mut self.databases,
            Tab::Activity => &mut self.activity,
            Tab::Queries => &mut self.queries,
            Tab::Locks => &mut self.locks,
            Tab::Tables => &mut self.tables,
            Tab::Issues => &mut self.issues,
        }
    }

    /// Moves to the next (`forward`) or previous server, wrapping around.
    /// Returns `false` when there is nothing to switch to.
    pub fn cycle_server(&mut self, forward: bool) -> bool {
        let n = self.servers.len();
        if n < 2 {
            return false;
        }
        self.server_idx = if forward {
            (self.server_idx + 1) % n
        } else {
            (self.server_idx + n - 1) % n
        };
        for tab in Tab::all() {
            self.tab_state_mut(*tab).reset();
        }
        true
    }
}
