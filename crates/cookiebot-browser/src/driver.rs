//! High-level driver over the CDP client.
//!
//! Exposes exactly the operations the bot needs: evaluate a script in page
//! context, click an element (real input events, not synthetic DOM
//! `click()`), type into an element, read an element's text, navigate, and
//! wait for the page title to settle. Inputs are plain CSS selectors.

use std::time::Duration;

use serde_json::Value;

use crate::cdp::CdpClient;
use crate::error::BrowserError;

/// How often [`GameDriver::wait_for_title_contains`] re-reads the title.
const TITLE_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// The bot's view of the browser session.
pub struct GameDriver {
    client: CdpClient,
}

impl GameDriver {
    /// Connect to a page target and enable the domains the driver uses.
    pub async fn connect(ws_url: &str) -> Result<Self, BrowserError> {
        let client = CdpClient::connect(ws_url).await?;
        client.enable_domain("Page").await?;
        client.enable_domain("DOM").await?;
        client.enable_domain("Runtime").await?;
        Ok(Self { client })
    }

    /// Wrap an existing client (used by tests).
    pub fn from_client(client: CdpClient) -> Self {
        Self { client }
    }

    /// Navigate to a URL. Browser-level rejections (bad DNS, etc.) are
    /// reported in the response rather than as a CDP error.
    pub async fn navigate(&self, url: &str) -> Result<(), BrowserError> {
        let result = self
            .client
            .send_command("Page.navigate", serde_json::json!({ "url": url }))
            .await?;
        if let Some(error_text) = result.get("errorText").and_then(Value::as_str) {
            return Err(BrowserError::NavigationFailed {
                reason: error_text.to_string(),
            });
        }
        Ok(())
    }

    /// Evaluate an expression in page context and return its value.
    ///
    /// Exceptions thrown by the script come back as
    /// [`BrowserError::JsException`].
    pub async fn evaluate(&self, expression: &str) -> Result<Value, BrowserError> {
        let result = self
            .client
            .send_command("Runtime.evaluate", evaluate_params(expression))
            .await?;

        if let Some(exception) = result.get("exceptionDetails") {
            let message = exception
                .get("exception")
                .and_then(|e| e.get("description"))
                .and_then(Value::as_str)
                .or_else(|| exception.get("text").and_then(Value::as_str))
                .unwrap_or("unknown exception")
                .to_string();
            return Err(BrowserError::JsException { message });
        }

        Ok(result
            .get("result")
            .and_then(|r| r.get("value"))
            .cloned()
            .unwrap_or(Value::Null))
    }

    /// Poll the document title until it contains `needle`.
    ///
    /// The game page takes a while to boot; waiting on the title is more
    /// reliable than waiting on the load event, which can fire before the
    /// game object exists.
    pub async fn wait_for_title_contains(
        &self,
        needle: &str,
        timeout: Duration,
    ) -> Result<(), BrowserError> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if let Ok(title) = self.evaluate("document.title").await {
                if title.as_str().is_some_and(|t| t.contains(needle)) {
                    return Ok(());
                }
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(BrowserError::TitleTimeout {
                    needle: needle.to_string(),
                    duration: timeout,
                });
            }
            tokio::time::sleep(TITLE_POLL_INTERVAL).await;
        }
    }

    /// Click the center of the element matching `selector` using trusted
    /// mouse events.
    pub async fn click(&self, selector: &str) -> Result<(), BrowserError> {
        let node_id = self.query_selector(selector).await?.ok_or_else(|| {
            BrowserError::ElementNotFound {
                selector: selector.to_string(),
            }
        })?;
        let (cx, cy) = self.element_center(node_id).await?;

        self.client
            .send_command("Input.dispatchMouseEvent", mouse_params("mousePressed", cx, cy))
            .await?;
        self.client
            .send_command("Input.dispatchMouseEvent", mouse_params("mouseReleased", cx, cy))
            .await?;
        Ok(())
    }

    /// Focus the element matching `selector` and type `text` into it,
    /// one key event pair per character.
    pub async fn type_text(&self, selector: &str, text: &str) -> Result<(), BrowserError> {
        let node_id = self.query_selector(selector).await?.ok_or_else(|| {
            BrowserError::ElementNotFound {
                selector: selector.to_string(),
            }
        })?;

        self.client
            .send_command("DOM.focus", serde_json::json!({ "nodeId": node_id }))
            .await?;

        for ch in text.chars() {
            let ch = ch.to_string();
            self.client
                .send_command("Input.dispatchKeyEvent", key_params("keyDown", &ch))
                .await?;
            self.client
                .send_command("Input.dispatchKeyEvent", key_params("keyUp", &ch))
                .await?;
        }
        Ok(())
    }

    /// Read an element's textual payload: its `value` for form controls,
    /// falling back to `textContent`.
    pub async fn element_text(&self, selector: &str) -> Result<String, BrowserError> {
        let value = self.evaluate(&element_text_script(selector)).await?;
        match value {
            Value::String(s) => Ok(s),
            Value::Null => Err(BrowserError::ElementNotFound {
                selector: selector.to_string(),
            }),
            other => Err(BrowserError::Protocol {
                detail: format!("element text evaluated to non-string: {other}"),
            }),
        }
    }

    async fn document_root(&self) -> Result<i64, BrowserError> {
        let result = self
            .client
            .send_command("DOM.getDocument", serde_json::json!({}))
            .await?;
        result
            .get("root")
            .and_then(|r| r.get("nodeId"))
            .and_then(Value::as_i64)
            .ok_or_else(|| BrowserError::Protocol {
                detail: "DOM.getDocument returned no root nodeId".to_string(),
            })
    }

    /// `None` when nothing matches (CDP reports node id 0).
    async fn query_selector(&self, selector: &str) -> Result<Option<i64>, BrowserError> {
        let root = self.document_root().await?;
        let result = self
            .client
            .send_command(
                "DOM.querySelector",
                serde_json::json!({ "nodeId": root, "selector": selector }),
            )
            .await?;
        let node_id = result.get("nodeId").and_then(Value::as_i64).unwrap_or(0);
        Ok((node_id != 0).then_some(node_id))
    }

    /// Center of the element's content quad.
    async fn element_center(&self, node_id: i64) -> Result<(f64, f64), BrowserError> {
        let result = self
            .client
            .send_command("DOM.getBoxModel", serde_json::json!({ "nodeId": node_id }))
            .await?;
        let quad: Vec<f64> = result
            .get("model")
            .and_then(|m| m.get("content"))
            .and_then(Value::as_array)
            .map(|arr| arr.iter().filter_map(Value::as_f64).collect())
            .unwrap_or_default();

        center_of_quad(&quad).ok_or_else(|| BrowserError::ElementNotInteractable {
            reason: format!("content quad has {} coordinates, expected 8", quad.len()),
        })
    }
}

// -- parameter builders (pure, test-covered) --------------------------------

/// `Runtime.evaluate` parameters.
pub fn evaluate_params(expression: &str) -> Value {
    serde_json::json!({
        "expression": expression,
        "returnByValue": true,
        "awaitPromise": true,
    })
}

/// `Input.dispatchMouseEvent` parameters for a left click phase.
pub fn mouse_params(event_type: &str, x: f64, y: f64) -> Value {
    serde_json::json!({
        "type": event_type,
        "x": x,
        "y": y,
        "button": "left",
        "clickCount": 1,
    })
}

/// `Input.dispatchKeyEvent` parameters for one character.
pub fn key_params(event_type: &str, text: &str) -> Value {
    serde_json::json!({
        "type": event_type,
        "text": text,
        "unmodifiedText": text,
        "key": text,
    })
}

/// Script reading an element's `value`-or-`textContent`, with the selector
/// embedded as a JSON string literal so quoting is always safe.
pub fn element_text_script(selector: &str) -> String {
    let quoted = Value::String(selector.to_string());
    format!(
        "(() => {{ const el = document.querySelector({quoted}); \
         if (!el) return null; \
         const v = el.value; \
         return (v !== undefined && v !== '') ? v : (el.textContent || ''); }})()"
    )
}

/// Center of an 8-value content quad `[x1,y1, x2,y2, x3,y3, x4,y4]`.
pub fn center_of_quad(quad: &[f64]) -> Option<(f64, f64)> {
    if quad.len() < 8 {
        return None;
    }
    let xs: Vec<f64> = quad.iter().step_by(2).copied().collect();
    let ys: Vec<f64> = quad.iter().skip(1).step_by(2).copied().collect();
    let min_x = xs.iter().copied().fold(f64::INFINITY, f64::min);
    let max_x = xs.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let min_y = ys.iter().copied().fold(f64::INFINITY, f64::min);
    let max_y = ys.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    Some(((min_x + max_x) / 2.0, (min_y + max_y) / 2.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evaluate_params_shape() {
        let params = evaluate_params("Game.cookies");
        assert_eq!(params["expression"], "Game.cookies");
        assert_eq!(params["returnByValue"], true);
        assert_eq!(params["awaitPromise"], true);
    }

    #[test]
    fn mouse_params_shape() {
        let params = mouse_params("mousePressed", 10.0, 20.0);
        assert_eq!(params["type"], "mousePressed");
        assert_eq!(params["x"], 10.0);
        assert_eq!(params["y"], 20.0);
        assert_eq!(params["button"], "left");
    }

    #[test]
    fn key_params_shape() {
        let params = key_params("keyDown", "a");
        assert_eq!(params["type"], "keyDown");
        assert_eq!(params["text"], "a");
        assert_eq!(params["unmodifiedText"], "a");
    }

    #[test]
    fn element_text_script_quotes_selector() {
        let script = element_text_script("#textareaPrompt");
        assert!(script.contains(r##"document.querySelector("#textareaPrompt")"##));

        // A selector with quotes must not break out of the literal.
        let script = element_text_script(r#"[data-x="y"]"#);
        assert!(script.contains(r#"querySelector("[data-x=\"y\"]")"#));
    }

    #[test]
    fn center_of_quad_square() {
        let quad = [0.0, 0.0, 100.0, 0.0, 100.0, 100.0, 0.0, 100.0];
        let (cx, cy) = center_of_quad(&quad).unwrap();
        assert!((cx - 50.0).abs() < 1e-9);
        assert!((cy - 50.0).abs() < 1e-9);
    }

    #[test]
    fn center_of_quad_offset_rect() {
        let quad = [50.0, 75.0, 250.0, 75.0, 250.0, 175.0, 50.0, 175.0];
        let (cx, cy) = center_of_quad(&quad).unwrap();
        assert!((cx - 150.0).abs() < 1e-9);
        assert!((cy - 125.0).abs() < 1e-9);
    }

    #[test]
    fn center_of_quad_rejects_short_input() {
        assert!(center_of_quad(&[1.0, 2.0]).is_none());
        assert!(center_of_quad(&[]).is_none());
    }

    #[test]
    fn exception_extraction_from_evaluate_response() {
        let response = serde_json::json!({
            "result": {"type": "object", "subtype": "error"},
            "exceptionDetails": {
                "text": "Uncaught",
                "exception": {"description": "ReferenceError: Game is not defined"}
            }
        });
        let msg = response["exceptionDetails"]["exception"]["description"]
            .as_str()
            .unwrap();
        assert_eq!(msg, "ReferenceError: Game is not defined");
    }
}
