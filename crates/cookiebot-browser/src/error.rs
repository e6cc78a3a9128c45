//! Error types for the browser channel.

use std::time::Duration;

use thiserror::Error;

/// Errors surfaced by the CDP client, driver, and launcher.
#[derive(Debug, Error)]
pub enum BrowserError {
    /// No browser could be started.
    #[error("failed to launch browser: {reason}")]
    LaunchFailed { reason: String },

    /// The DevTools WebSocket could not be reached.
    #[error("failed to connect to DevTools at {url}: {reason}")]
    ConnectionFailed { url: String, reason: String },

    /// A CDP command returned an error response.
    #[error("CDP error {code}: {message}")]
    Cdp { code: i64, message: String },

    /// A CDP command got no response in time.
    #[error("CDP command '{method}' timed out after {duration:?}")]
    Timeout { method: String, duration: Duration },

    /// Serialization failure or an unexpected message shape.
    #[error("CDP protocol error: {detail}")]
    Protocol { detail: String },

    /// No element matched the selector.
    #[error("element not found: {selector}")]
    ElementNotFound { selector: String },

    /// A matched element has no usable geometry.
    #[error("element not interactable: {reason}")]
    ElementNotInteractable { reason: String },

    /// Navigation was rejected by the browser.
    #[error("navigation failed: {reason}")]
    NavigationFailed { reason: String },

    /// The evaluated script threw.
    #[error("JavaScript exception: {message}")]
    JsException { message: String },

    /// The page title never matched within the wait window.
    #[error("page title did not contain {needle:?} within {duration:?}")]
    TitleTimeout { needle: String, duration: Duration },
}

impl BrowserError {
    /// Whether this error means the session itself is gone.
    ///
    /// Fatal errors stop the decision loop; everything else aborts only
    /// the current tick.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            BrowserError::LaunchFailed { .. }
                | BrowserError::ConnectionFailed { .. }
                | BrowserError::Timeout { .. }
                | BrowserError::Protocol { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_errors_are_fatal() {
        assert!(BrowserError::ConnectionFailed {
            url: "ws://x".into(),
            reason: "refused".into()
        }
        .is_fatal());
        assert!(BrowserError::Protocol {
            detail: "socket closed".into()
        }
        .is_fatal());
        assert!(BrowserError::Timeout {
            method: "Runtime.evaluate".into(),
            duration: Duration::from_secs(30)
        }
        .is_fatal());
    }

    #[test]
    fn page_level_errors_are_recoverable() {
        assert!(!BrowserError::JsException {
            message: "boom".into()
        }
        .is_fatal());
        assert!(!BrowserError::ElementNotFound {
            selector: "#prompt".into()
        }
        .is_fatal());
        assert!(!BrowserError::Cdp {
            code: -32000,
            message: "no such node".into()
        }
        .is_fatal());
    }
}
