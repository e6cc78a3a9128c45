//! Purchase-option scoring.
//!
//! Every tick the scanner rebuilds the option list from live game state —
//! nothing is cached across ticks — and scores each option with a greedy
//! "ticks until affordable" ratio. Lower is better. The scoring itself is
//! pure so the selection rules can be tested without a browser.

use std::collections::HashSet;

use cookiebot_browser::BrowserError;

use crate::game::{building_buy_script, upgrade_buy_script, BuildingInfo, GameClient, UpgradeInfo};

/// One fresh read of the game's top-level numbers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EconomySnapshot {
    pub cookies: f64,
    pub cookies_per_second: f64,
    /// Prestige currency banked so far; zero until the chip divisor has
    /// been captured from the game.
    pub chips: f64,
}

/// A scored purchase candidate, valid for the current tick only.
#[derive(Debug, Clone, PartialEq)]
pub struct Purchasable {
    pub name: String,
    pub price: f64,
    /// Production added by the purchase; upgrades have none we can see.
    pub rate_contribution: Option<f64>,
    /// Greedy score: approximate seconds until affordable. Lower wins.
    pub ratio: f64,
    /// Script that executes the purchase.
    pub buy_script: String,
}

/// The scoring formula.
///
/// `(price - cookies) / max(cps, 1)`: a zero production rate is floored to
/// one so the score stays finite. This is an approximation, not an ETA —
/// already-affordable options simply go negative and win.
pub fn affordability_ratio(price: f64, cookies: f64, cps: f64) -> f64 {
    (price - cookies) / cps.max(1.0)
}

/// Prestige chips for a cookie total; zero without a usable divisor.
pub fn chips_for(cookies: f64, divisor: Option<f64>) -> f64 {
    match divisor {
        Some(d) if d > 0.0 => cookies / d,
        _ => 0.0,
    }
}

/// Score the building table.
pub fn score_structures(rows: &[BuildingInfo], snapshot: EconomySnapshot) -> Vec<Purchasable> {
    rows.iter()
        .enumerate()
        .map(|(index, row)| Purchasable {
            name: row.name.clone(),
            price: row.price,
            rate_contribution: Some(row.cps),
            ratio: affordability_ratio(row.price, snapshot.cookies, snapshot.cookies_per_second),
            buy_script: building_buy_script(index),
        })
        .collect()
}

/// Score the upgrade store, dropping excluded names first.
///
/// Exclusion matches on the lowercased upgrade name.
pub fn score_upgrades(
    rows: &[UpgradeInfo],
    snapshot: EconomySnapshot,
    excluded: &HashSet<String>,
) -> Vec<Purchasable> {
    rows.iter()
        .enumerate()
        .filter(|(_, row)| !excluded.contains(&row.name.to_lowercase()))
        .map(|(index, row)| Purchasable {
            name: row.name.clone(),
            price: row.price,
            rate_contribution: None,
            ratio: affordability_ratio(row.price, snapshot.cookies, snapshot.cookies_per_second),
            buy_script: upgrade_buy_script(index),
        })
        .collect()
}

/// Global-minimum ratio; first-seen wins on ties.
///
/// Callers build the option list structures-first in game order, which
/// makes tie-breaking deterministic.
pub fn best_option(options: &[Purchasable]) -> Option<&Purchasable> {
    options.iter().reduce(|best, candidate| {
        if candidate.ratio < best.ratio {
            candidate
        } else {
            best
        }
    })
}

/// Scanner: live reads composed into scored option lists.
pub struct EconomyScanner<'a> {
    client: &'a GameClient,
    excluded: &'a HashSet<String>,
}

impl<'a> EconomyScanner<'a> {
    pub fn new(client: &'a GameClient, excluded: &'a HashSet<String>) -> Self {
        Self { client, excluded }
    }

    /// Fresh top-level numbers. `divisor` is the session's cached
    /// cookies-per-chip value, if already captured.
    pub async fn scan(&self, divisor: Option<f64>) -> Result<EconomySnapshot, BrowserError> {
        let cookies = self.client.cookies().await?;
        Ok(EconomySnapshot {
            cookies,
            cookies_per_second: self.client.cookies_per_second().await?,
            chips: chips_for(cookies, divisor),
        })
    }

    /// Scored structure options, in game order.
    pub async fn structures(
        &self,
        snapshot: EconomySnapshot,
    ) -> Result<Vec<Purchasable>, BrowserError> {
        Ok(score_structures(&self.client.buildings().await?, snapshot))
    }

    /// Scored upgrade options, exclusions already applied.
    pub async fn upgrades(
        &self,
        snapshot: EconomySnapshot,
    ) -> Result<Vec<Purchasable>, BrowserError> {
        Ok(score_upgrades(
            &self.client.upgrades_in_store().await?,
            snapshot,
            self.excluded,
        ))
    }

    /// All purchase options for this tick, structures first.
    pub async fn options(&self, snapshot: EconomySnapshot) -> Result<Vec<Purchasable>, BrowserError> {
        let mut options = self.structures(snapshot).await?;
        options.extend(self.upgrades(snapshot).await?);
        Ok(options)
    }
}
