//! Terminal dashboard.
//!
//! Five tabs (databases, activity, locks, tables, issues), each backed by its
//! own refresh feed bound to the active server, plus a plan inspector popup.

mod app;
mod event;
pub mod feeds;
mod input;
mod render;
pub mod state;
mod style;
mod widgets;

pub use app::App;
pub use feeds::{DatabasesData, Feeds, FeedsSnapshot, TablesData};
pub use state::{AppState, PopupState, Tab};
