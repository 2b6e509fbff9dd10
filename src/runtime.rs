use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::time::Duration;

use crossterm::event::{self, Event as CtEvent, KeyEvent, MouseEventKind};

/// Unified event type consumed by the app loop.
#[derive(Clone, Debug)]
pub enum CueEvent {
    Key(KeyEvent),
    /// Mouse wheel detents; positive scrolls the script back toward the top.
    Wheel(i32),
    Resize,
    Tick,
}

/// Source of terminal events (keyboard, wheel, resize).
pub trait CueEventSource: Send + 'static {
    /// Block for up to `timeout` waiting for an event.
    fn recv_timeout(&self, timeout: Duration) -> Result<CueEvent, RecvTimeoutError>;
}

/// Production event source backed by a crossterm reader thread.
pub struct CrosstermEventSource {
    rx: Receiver<CueEvent>,
}

impl CrosstermEventSource {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel();

        std::thread::spawn(move || loop {
            let mapped = match event::read() {
                Ok(CtEvent::Key(key)) => Some(CueEvent::Key(key)),
                Ok(CtEvent::Mouse(m)) => match m.kind {
                    MouseEventKind::ScrollUp => Some(CueEvent::Wheel(1)),
                    MouseEventKind::ScrollDown => Some(CueEvent::Wheel(-1)),
                    _ => None,
                },
                Ok(CtEvent::Resize(_, _)) => Some(CueEvent::Resize),
                Ok(_) => None,
                Err(_) => break,
            };
            if let Some(ev) = mapped {
                if tx.send(ev).is_err() {
                    break;
                }
            }
        });

        Self { rx }
    }
}

impl Default for CrosstermEventSource {
    fn default() -> Self {
        Self::new()
    }
}

impl CueEventSource for CrosstermEventSource {
    fn recv_timeout(&self, timeout: Duration) -> Result<CueEvent, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }
}

/// Configurable ticker interface.
pub trait Ticker: Send + Sync + 'static {
    fn interval(&self) -> Duration;
}

/// Fixed interval ticker; the interval is the frame budget for every
/// deadline-driven engine.
#[derive(Clone, Copy, Debug)]
pub struct FixedTicker {
    interval: Duration,
}

impl FixedTicker {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }
}

impl Ticker for FixedTicker {
    fn interval(&self) -> Duration {
        self.interval
    }
}

/// Test event source for headless tests.
pub struct TestEventSource {
    rx: Receiver<CueEvent>,
}

impl TestEventSource {
    pub fn new(rx: Receiver<CueEvent>) -> Self {
        Self { rx }
    }
}

impl CueEventSource for TestEventSource {
    fn recv_timeout(&self, timeout: Duration) -> Result<CueEvent, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }
}

/// Advances the application one event or tick at a time. There is only ever
/// one pending wait; every timer in the engines is a deadline checked
/// against the tick clock, so cancellation never leaves stray callbacks.
pub struct Runner<E: CueEventSource, T: Ticker> {
    event_source: E,
    ticker: T,
}

impl<E: CueEventSource, T: Ticker> Runner<E, T> {
    pub fn new(event_source: E, ticker: T) -> Self {
        Self {
            event_source,
            ticker,
        }
    }

    /// Blocks up to the tick interval and returns the next event, or Tick on
    /// timeout.
    pub fn step(&self) -> CueEvent {
        match self.event_source.recv_timeout(self.ticker.interval()) {
            Ok(ev) => ev,
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => CueEvent::Tick,
        }
    }
}
