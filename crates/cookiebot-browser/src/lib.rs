//! Remote-control channel to the game's browser session.
//!
//! The bot never touches game memory directly: everything goes through a
//! Chrome DevTools Protocol connection. This crate has three layers:
//!
//! - [`cdp`]: WebSocket client with JSON-RPC command/response correlation
//!   and an event channel.
//! - [`driver`]: the operations the bot actually needs — evaluate a script
//!   in page context, click an element, type into an element, read element
//!   text, navigate, wait for the page title.
//! - [`launch`]: spawning a Chrome child process with remote debugging
//!   enabled and discovering its DevTools WebSocket endpoint.
//!
//! Chrome is started with `--remote-debugging-port` on an ephemeral port;
//! attaching to an already-running instance works by passing its WebSocket
//! URL directly to [`driver::GameDriver::connect`].

pub mod cdp;
pub mod driver;
pub mod error;
pub mod launch;

pub use cdp::{CdpClient, CdpEvent};
pub use driver::GameDriver;
pub use error::BrowserError;
pub use launch::ChromeHandle;
