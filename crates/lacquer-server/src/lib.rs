//! Development server with live reload for lacquer themes.
//!
//! Serves the built destination directory, watches source globs per asset
//! class, and notifies connected browsers over WebSocket: a full reload for
//! most classes, stylesheet injection for styles.

pub mod livereload;
pub mod server;
pub mod watcher;

pub use livereload::{inject_client, CssSink, ReloadHub, ReloadMessage};
pub use server::{DevServer, ServerError, ServerHandle};
pub use watcher::{serve, watch, WatchError};
