//! Event handling for TUI.
//!
//! Uses a separate thread to poll for terminal events and timer ticks, and
//! forwards them into the async main loop.

use std::thread;
use std::time::Duration;

use crossterm::event::{self, Event as CrosstermEvent, KeyEvent, KeyEventKind};
use tokio::sync::mpsc::{self, UnboundedReceiver};

/// Application events.
#[derive(Debug)]
pub enum Event {
    /// Redraw tick (clock, elapsed times).
    Tick,
    /// Keyboard input.
    Key(KeyEvent),
    /// Terminal resize.
    Resize,
}

pub struct EventHandler {
    rx: UnboundedReceiver<Event>,
}

impl EventHandler {
    pub fn new(tick_rate: Duration) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();

        thread::spawn(move || {
            loop {
                let event = if event::poll(tick_rate).unwrap_or(false) {
                    match event::read() {
                        Ok(CrosstermEvent::Key(key)) if key.kind == KeyEventKind::Press => {
                            Event::Key(key)
                        }
                        Ok(CrosstermEvent::Resize(..)) => Event::Resize,
                        _ => continue,
                    }
                } else {
                    Event::Tick
                };
                if tx.send(event).is_err() {
                    break;
                }
            }
        });

        Self { rx }
    }

    /// Next event; `None` once the polling thread is gone.
    pub async fn next(&mut self) -> Option<Event> {
        self.rx.recv().await
    }
}
