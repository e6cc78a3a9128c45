//! Game-side script surface.
//!
//! Everything the bot knows about the game lives here: the script strings
//! evaluated in page context, the element ids of the save prompt, and the
//! typed shapes the evaluated values are parsed into. The rest of the
//! workspace talks in terms of these methods, never raw scripts.

use cookiebot_browser::{BrowserError, GameDriver};
use serde::Deserialize;
use serde_json::Value;

use crate::html::decode_entities;

/// The game's building table has this many slots.
pub const BUILDING_SLOTS: usize = 11;

/// Textarea the game puts the save blob in (export and import prompts).
pub const SAVE_TEXTAREA: &str = "#textareaPrompt";

/// Confirm button of the game's modal prompt.
pub const PROMPT_CONFIRM: &str = "#promptOption0";

/// Raw building row, as evaluated from the page.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct BuildingInfo {
    pub name: String,
    pub price: f64,
    /// Cookies per second this building currently produces.
    pub cps: f64,
}

/// Raw upgrade row, as evaluated from the page.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct UpgradeInfo {
    pub name: String,
    pub price: f64,
}

// -- script builders --------------------------------------------------------

/// One round trip for the whole building table.
pub fn buildings_snapshot_script() -> String {
    format!(
        "Game.ObjectsById.slice(0, {BUILDING_SLOTS})\
         .map(o => ({{ name: o.name, price: o.price, cps: o.cps() }}))"
    )
}

/// One round trip for the upgrade store.
pub fn upgrades_snapshot_script() -> &'static str {
    "Game.UpgradesInStore.map(u => ({ name: u.name, price: u.getPrice() }))"
}

/// Purchase script for the building at `index`.
pub fn building_buy_script(index: usize) -> String {
    format!("Game.ObjectsById[{index}].buy(1)")
}

/// Purchase script for the store upgrade at `index`.
pub fn upgrade_buy_script(index: usize) -> String {
    format!("Game.UpgradesInStore[{index}].buy(1)")
}

// -- client -----------------------------------------------------------------

/// The bot's typed handle on the live game.
///
/// Owns the driver for the whole session; every method is one or a few
/// page round trips with no caching.
pub struct GameClient {
    driver: GameDriver,
}

impl GameClient {
    pub fn new(driver: GameDriver) -> Self {
        Self { driver }
    }

    pub fn driver(&self) -> &GameDriver {
        &self.driver
    }

    /// Current cookie total, full precision.
    pub async fn cookies(&self) -> Result<f64, BrowserError> {
        self.number("Game.cookies").await
    }

    /// Current passive production rate, full precision.
    pub async fn cookies_per_second(&self) -> Result<f64, BrowserError> {
        self.number("Game.cookiesPs").await
    }

    /// Golden cookies clicked this session.
    pub async fn golden_clicks(&self) -> Result<u64, BrowserError> {
        Ok(self.number("Game.goldenClicksLocal").await? as u64)
    }

    /// Fire a click at the golden cookie. Harmless when none is up.
    pub async fn click_golden_cookie(&self) -> Result<(), BrowserError> {
        self.driver.evaluate("Game.goldenCookie.click()").await?;
        Ok(())
    }

    /// Effect text of the last claimed golden cookie, lowercased and
    /// entity-decoded.
    pub async fn golden_effect(&self) -> Result<String, BrowserError> {
        let value = self.driver.evaluate("Game.goldenCookie.last").await?;
        Ok(decode_entities(value.as_str().unwrap_or_default()).to_lowercase())
    }

    /// Click the big cookie `times` times. One cookie per press.
    pub async fn click_big_cookie(&self, times: usize) -> Result<(), BrowserError> {
        for _ in 0..times {
            self.driver.evaluate("Game.ClickCookie()").await?;
        }
        Ok(())
    }

    /// Dismiss every on-screen notification.
    pub async fn close_notifications(&self) -> Result<(), BrowserError> {
        self.driver.evaluate("Game.CloseNotes()").await?;
        Ok(())
    }

    /// The full building table.
    pub async fn buildings(&self) -> Result<Vec<BuildingInfo>, BrowserError> {
        let value = self.driver.evaluate(&buildings_snapshot_script()).await?;
        parse_rows(value, "building table")
    }

    /// Upgrades currently purchasable in the store.
    pub async fn upgrades_in_store(&self) -> Result<Vec<UpgradeInfo>, BrowserError> {
        let value = self.driver.evaluate(upgrades_snapshot_script()).await?;
        parse_rows(value, "upgrade store")
    }

    /// Execute a purchase script produced by the economy scanner.
    ///
    /// An underfunded purchase is a no-op on the game side; there is no
    /// local validation.
    pub async fn buy(&self, script: &str) -> Result<(), BrowserError> {
        self.driver.evaluate(script).await?;
        Ok(())
    }

    /// Cookies baked per prestige chip. Stable for a given save, so the
    /// session caches the value after the first call.
    pub async fn reset_divisor(&self) -> Result<f64, BrowserError> {
        self.number("Game.HowManyCookiesReset(1)").await
    }

    /// Reset the game, confirming through the prompt.
    pub async fn reset(&self) -> Result<(), BrowserError> {
        self.driver.evaluate("Game.Reset()").await?;
        self.driver.click(PROMPT_CONFIRM).await
    }

    /// Pull the save blob out through the export prompt.
    pub async fn export_save(&self) -> Result<String, BrowserError> {
        self.driver.evaluate("Game.ExportSave()").await?;
        let text = self.driver.element_text(SAVE_TEXTAREA).await;
        // Close the prompt even when the read failed.
        let _ = self.driver.evaluate("Game.ClosePrompt()").await;
        Ok(decode_entities(text?.trim()))
    }

    /// Push a save blob in through the import prompt.
    pub async fn import_save(&self, blob: &str) -> Result<(), BrowserError> {
        self.driver.evaluate("Game.ImportSave()").await?;
        self.driver.type_text(SAVE_TEXTAREA, blob).await?;
        self.driver.click(PROMPT_CONFIRM).await
    }

    /// Turn the page's cosmetic settings down so a long-running session
    /// stays cheap.
    pub async fn tune_performance(&self) -> Result<(), BrowserError> {
        self.driver
            .evaluate(r#"for (var k in Game.prefs) Game.prefs[k] = 0; Game.prefs["format"] = 1"#)
            .await?;
        self.driver
            .evaluate("Game.ToggleFancy();BeautifyAll();Game.RefreshStore();Game.upgradesToRebuild = 1;")
            .await?;
        Ok(())
    }

    async fn number(&self, script: &str) -> Result<f64, BrowserError> {
        let value = self.driver.evaluate(script).await?;
        value.as_f64().ok_or_else(|| BrowserError::Protocol {
            detail: format!("{script} evaluated to non-number: {value}"),
        })
    }
}

/// Parse an evaluated array into typed rows.
fn parse_rows<T: serde::de::DeserializeOwned>(
    value: Value,
    what: &str,
) -> Result<Vec<T>, BrowserError> {
    serde_json::from_value(value).map_err(|e| BrowserError::Protocol {
        detail: format!("cannot parse {what}: {e}"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buy_scripts_index_into_game_tables() {
        assert_eq!(building_buy_script(0), "Game.ObjectsById[0].buy(1)");
        assert_eq!(building_buy_script(10), "Game.ObjectsById[10].buy(1)");
        assert_eq!(upgrade_buy_script(3), "Game.UpgradesInStore[3].buy(1)");
    }

    #[test]
    fn snapshot_scripts_cover_the_tables() {
        let script = buildings_snapshot_script();
        assert!(script.contains("Game.ObjectsById.slice(0, 11)"));
        assert!(script.contains("o.cps()"));
        assert!(upgrades_snapshot_script().contains("u.getPrice()"));
    }

    #[test]
    fn building_rows_parse_from_evaluated_json() {
        let value = serde_json::json!([
            {"name": "Cursor", "price": 15.0, "cps": 0.1},
            {"name": "Grandma", "price": 100.0, "cps": 1.0},
        ]);
        let rows: Vec<BuildingInfo> = parse_rows(value, "building table").unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].name, "Cursor");
        assert_eq!(rows[1].price, 100.0);
    }

    #[test]
    fn upgrade_rows_parse_and_reject_garbage() {
        let value = serde_json::json!([{"name": "Reinforced index finger", "price": 100.0}]);
        let rows: Vec<UpgradeInfo> = parse_rows(value, "upgrade store").unwrap();
        assert_eq!(rows[0].name, "Reinforced index finger");

        let garbage = serde_json::json!({"not": "an array"});
        assert!(parse_rows::<UpgradeInfo>(garbage, "upgrade store").is_err());
    }
}
