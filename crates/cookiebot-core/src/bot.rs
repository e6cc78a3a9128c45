//! The decision loop.
//!
//! One tick: claim any golden cookie (following chains), dismiss
//! notifications, snapshot the economy, score every purchasable structure
//! and upgrade, buy the best one (grinding out a shortfall with manual
//! clicks when configured), check the prestige-reset threshold, and
//! periodically capture a save blob. The blob only reaches disk at
//! shutdown.
//!
//! Stopping is cooperative: the running flag is read once per tick boundary,
//! so an in-flight tick always completes first. There is no mid-tick
//! preemption.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use cookiebot_browser::BrowserError;
use cookiebot_types::BotConfig;

use crate::echo::Echo;
use crate::economy::{best_option, EconomyScanner};
use crate::error::BotError;
use crate::game::GameClient;
use crate::savefile::{flush_last_save, SaveFile};

/// Delay between clicks while following a golden-cookie chain.
const CHAIN_CLICK_DELAY: Duration = Duration::from_millis(100);

/// Claims closer together than this are treated as one event.
const MIN_BONUS_SPACING: Duration = Duration::from_millis(100);

/// Manual clicks used when there is nothing to buy at all.
const FALLBACK_CLICKS: usize = 5;

/// Spacing guard for golden-cookie claims.
///
/// The game reports a claim through a counter; polling it twice inside the
/// same instant of game time would count one cookie twice. A claim within
/// the spacing window of the previous one is therefore not registered.
#[derive(Debug)]
pub struct ChainGuard {
    min_spacing: Duration,
    last_claim: Option<Instant>,
}

impl ChainGuard {
    pub fn new(min_spacing: Duration) -> Self {
        Self {
            min_spacing,
            last_claim: None,
        }
    }

    /// Register a claim observed at `now`. Returns whether it counts as a
    /// new event.
    pub fn register(&mut self, now: Instant) -> bool {
        let counted = match self.last_claim {
            Some(last) => now.duration_since(last) >= self.min_spacing,
            None => true,
        };
        if counted {
            self.last_claim = Some(now);
        }
        counted
    }
}

/// Counts ticks between save-blob captures.
#[derive(Debug)]
pub struct SaveScheduler {
    every: u32,
    ticks: u32,
}

impl SaveScheduler {
    pub fn new(every: u32) -> Self {
        Self {
            every: every.max(1),
            ticks: 0,
        }
    }

    /// Advance one tick; true when a capture is due.
    pub fn tick(&mut self) -> bool {
        self.ticks += 1;
        if self.ticks >= self.every {
            self.ticks = 0;
            true
        } else {
            false
        }
    }
}

/// Whether the prestige reset should fire.
pub fn should_reset(cookies: f64, divisor: f64, threshold: f64) -> bool {
    divisor > 0.0 && cookies / divisor >= threshold
}

/// How many top-up iterations a shortfall is worth.
pub fn grind_budget(shortfall: f64, cap: Option<u64>) -> u64 {
    let base = shortfall.ceil().max(0.0) as u64;
    match cap {
        Some(cap) => base.min(cap),
        None => base,
    }
}

/// Display rounding for status lines. Arithmetic always uses full precision.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// One bot run: owns the game client, configuration, status logger, and
/// the save blob captured most recently.
pub struct BotSession {
    client: GameClient,
    config: BotConfig,
    echo: Echo,
    savefile: SaveFile,
    running: Arc<AtomicBool>,
    excluded: HashSet<String>,
    chain_guard: ChainGuard,
    saver: SaveScheduler,
    save_blob: Option<String>,
    /// Cookies-per-chip divisor, captured from the game once per session.
    chip_divisor: Option<f64>,
}

impl BotSession {
    pub fn new(client: GameClient, config: BotConfig, running: Arc<AtomicBool>) -> Self {
        let echo = Echo::from_config(&config);
        let savefile = SaveFile::new(config.savefile_path());
        let excluded = config.excluded_upgrades();
        let saver = SaveScheduler::new(config.save_every());
        Self {
            client,
            config,
            echo,
            savefile,
            running,
            excluded,
            chain_guard: ChainGuard::new(MIN_BONUS_SPACING),
            saver,
            save_blob: None,
            chip_divisor: None,
        }
    }

    /// Load the save file into the game and turn cosmetics down. Called
    /// once after the game page has booted.
    pub async fn prepare(&mut self) -> Result<(), BotError> {
        match self.savefile.load()? {
            Some(blob) => {
                self.client.import_save(blob.trim()).await?;
                self.echo.emit("[+] Save imported.");
            }
            None => self.echo.emit("[-] No savefile!"),
        }
        self.client.tune_performance().await?;
        Ok(())
    }

    /// Run until the running flag is cleared or a fatal error surfaces.
    ///
    /// Recoverable tick errors are logged and skipped unless
    /// `halt_on_error` is set. The caller is responsible for invoking
    /// [`shutdown`](Self::shutdown) afterwards in every case.
    pub async fn run(&mut self) -> Result<(), BotError> {
        self.echo.emit("[+] Starting...");
        while self.running.load(Ordering::Relaxed) {
            if let Err(e) = self.tick().await {
                if e.is_fatal() || self.config.halt_on_error() {
                    return Err(e);
                }
                tracing::warn!(error = %e, "tick failed, continuing");
            }
            tokio::time::sleep(self.config.sleep_amount()).await;
        }
        self.echo.emit("[-] Quitting...");
        Ok(())
    }

    /// Persist the last captured save blob exactly once and drop the
    /// session. The browser connection is released when the client goes
    /// out of scope; a session that already went away is not an error.
    pub async fn shutdown(mut self) -> Result<(), BotError> {
        if flush_last_save(&self.savefile, &mut self.save_blob)? {
            self.echo.emit("[+] Save written.");
        }
        Ok(())
    }

    async fn tick(&mut self) -> Result<(), BotError> {
        self.claim_golden().await?;
        self.client.close_notifications().await?;

        let scanner = EconomyScanner::new(&self.client, &self.excluded);
        let snapshot = scanner.scan(self.chip_divisor).await?;
        self.echo.emit(&format!(
            "[+] Have {} cookies and {} cookies per second, heavenly chips so far: {}",
            round2(snapshot.cookies),
            round2(snapshot.cookies_per_second),
            round2(snapshot.chips),
        ));

        let options = scanner.options(snapshot).await?;
        match best_option(&options) {
            Some(best) => {
                self.echo.emit(&format!(
                    "[+] Buying {} with price {}",
                    best.name,
                    round2(best.price)
                ));
                let price = best.price;
                let buy_script = best.buy_script.clone();
                if price > snapshot.cookies && self.config.click_missing() {
                    self.grind_shortfall(price, snapshot.cookies).await?;
                }
                // Issued regardless; the game rejects underfunded buys.
                self.client.buy(&buy_script).await?;
            }
            None => {
                self.client.click_big_cookie(FALLBACK_CLICKS).await?;
            }
        }

        self.check_reset().await?;

        if self.saver.tick() {
            self.save_blob = Some(self.client.export_save().await?);
            self.echo.emit("[+] Saved!");
        }
        Ok(())
    }

    /// Claim a golden cookie and follow any chain it starts.
    ///
    /// The session-local golden click counter tells us whether a click
    /// actually landed. Chain effects re-click after a short delay; the
    /// [`ChainGuard`] keeps a single event from being counted twice.
    async fn claim_golden(&mut self) -> Result<(), BotError> {
        let mut chain: u32 = 0;
        loop {
            let before = self.client.golden_clicks().await?;
            match self.client.click_golden_cookie().await {
                Ok(()) => {}
                // Nothing on screen to click; the bonus object may not
                // even exist between spawns.
                Err(BrowserError::JsException { .. }) => return Ok(()),
                Err(e) => return Err(e.into()),
            }
            let after = self.client.golden_clicks().await?;
            if after <= before {
                return Ok(());
            }

            let counted = self.chain_guard.register(Instant::now());
            let effect = self.client.golden_effect().await?;
            let chained = effect.contains("chain");
            if counted {
                if chain == 0 && !chained {
                    self.echo
                        .emit(&format!("[+] Pressed a Golden Cookie with effect {effect}!"));
                } else {
                    self.echo
                        .emit(&format!("[+] Chaining {effect} cookies, step {chain}"));
                }
                chain += 1;
            }
            if !chained {
                return Ok(());
            }
            tokio::time::sleep(CHAIN_CLICK_DELAY).await;
        }
    }

    /// Grind out a purchase shortfall: interleave golden-claim attempts
    /// with manual clicks, bounded by the shortfall itself and the
    /// configured cap, breaking early once the price is covered.
    async fn grind_shortfall(&mut self, price: f64, cookies: f64) -> Result<(), BotError> {
        let shortfall = price - cookies;
        self.echo
            .emit(&format!("[-] Missing {} cookies!", round2(shortfall)));
        let budget = grind_budget(shortfall, self.config.click_cap());
        for _ in 0..budget {
            self.claim_golden().await?;
            self.client.click_big_cookie(1).await?;
            if self.client.cookies().await? >= price {
                break;
            }
        }
        Ok(())
    }

    /// Fire the prestige reset when the chip threshold is crossed.
    ///
    /// The divisor is read from the game once and cached on the session
    /// for its lifetime.
    async fn check_reset(&mut self) -> Result<(), BotError> {
        let Some(threshold) = self.config.reset_every() else {
            return Ok(());
        };
        let divisor = match self.chip_divisor {
            Some(d) => d,
            None => {
                let d = self.client.reset_divisor().await?;
                self.chip_divisor = Some(d);
                d
            }
        };
        let cookies = self.client.cookies().await?;
        if should_reset(cookies, divisor, threshold) {
            self.echo.emit("[+] Resetting!");
            self.client.reset().await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chain_guard_counts_spaced_claims() {
        let mut guard = ChainGuard::new(Duration::from_millis(100));
        let t0 = Instant::now();
        assert!(guard.register(t0));
        assert!(guard.register(t0 + Duration::from_millis(150)));
    }

    #[test]
    fn chain_guard_suppresses_double_count_within_window() {
        let mut guard = ChainGuard::new(Duration::from_millis(100));
        let t0 = Instant::now();
        assert!(guard.register(t0));
        assert!(!guard.register(t0 + Duration::from_millis(50)));
        // The suppressed claim does not extend the window.
        assert!(guard.register(t0 + Duration::from_millis(120)));
    }

    #[test]
    fn save_scheduler_fires_every_n_ticks() {
        let mut saver = SaveScheduler::new(3);
        assert!(!saver.tick());
        assert!(!saver.tick());
        assert!(saver.tick());
        assert!(!saver.tick());
        assert!(!saver.tick());
        assert!(saver.tick());
    }

    #[test]
    fn save_scheduler_clamps_zero_to_every_tick() {
        let mut saver = SaveScheduler::new(0);
        assert!(saver.tick());
        assert!(saver.tick());
    }

    #[test]
    fn reset_fires_exactly_at_threshold() {
        // divisor 1000, threshold 2: fires at 2000 cookies, not before.
        assert!(!should_reset(1999.9, 1000.0, 2.0));
        assert!(should_reset(2000.0, 1000.0, 2.0));
        assert!(should_reset(2500.0, 1000.0, 2.0));
    }

    #[test]
    fn reset_never_fires_without_valid_divisor() {
        assert!(!should_reset(1e12, 0.0, 2.0));
        assert!(!should_reset(1e12, -1.0, 2.0));
    }

    #[test]
    fn grind_budget_is_ceiled_shortfall() {
        assert_eq!(grind_budget(10.2, None), 11);
        assert_eq!(grind_budget(0.0, None), 0);
        assert_eq!(grind_budget(-5.0, None), 0);
    }

    #[test]
    fn grind_budget_respects_cap() {
        assert_eq!(grind_budget(10_000.0, Some(500)), 500);
        assert_eq!(grind_budget(3.0, Some(500)), 3);
    }

    #[test]
    fn display_rounding_keeps_two_places() {
        assert_eq!(round2(123.456), 123.46);
        assert_eq!(round2(0.125), 0.13);
        assert_eq!(round2(60.0), 60.0);
    }
}
