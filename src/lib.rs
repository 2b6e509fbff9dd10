// Library surface for headless/integration tests and reuse.
// Keep this lean to avoid coupling to bin-only types in main.rs.
pub mod align;
pub mod config;
pub mod error;
pub mod fuzzy;
pub mod logging;
pub mod page;
pub mod playback;
pub mod rsvp;
pub mod runtime;
pub mod script;
pub mod scroll;
pub mod ui;
