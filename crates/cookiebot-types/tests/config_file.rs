//! End-to-end configuration loading: a realistic file on disk through
//! discovery, the grammar, and the typed accessors.

use std::io::Write;
use std::time::Duration;

use cookiebot_types::{BotConfig, FileMode, TimestampPrefix};

fn write_file(dir: &std::path::Path, name: &str, content: &str) {
    let mut f = std::fs::File::create(dir.join(name)).unwrap();
    f.write_all(content.as_bytes()).unwrap();
}

#[test]
fn full_config_file_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let log_template = dir.path().join("status-{}.log").display().to_string();
    let content = format!(
        r#"# cookiebot settings
[CookieBot]
binary_path = "/usr/bin/chromium"
savefile_path = "my.save"
url = "https://orteil.dashnet.org/cookieclicker/"
click_missing = TRUE
save_every = 12
sleep_amount = 1.5
excluded_upgrades = ["Golden Switch", "Background Music"]
verbose = true
timestamp = ["time", "date"]
output_file = file("{log_template}", "a")
reset_every = 2
this line is not valid and is skipped
"#
    );
    write_file(dir.path(), "config.txt", &content);

    let (path, config) = BotConfig::discover(dir.path()).unwrap();
    assert!(path.ends_with("config.txt"));

    assert_eq!(config.binary_path(), Some("/usr/bin/chromium"));
    assert!(config.savefile_path().ends_with("my.save"));
    assert!(config.click_missing());
    assert_eq!(config.save_every(), 12);
    assert_eq!(config.sleep_amount(), Duration::from_secs_f64(1.5));
    assert!(config.excluded_upgrades().contains("golden switch"));
    assert!(config.excluded_upgrades().contains("background music"));
    assert!(config.verbose());
    assert_eq!(
        config.timestamp(),
        TimestampPrefix {
            time: true,
            date: true
        }
    );
    assert_eq!(config.reset_every(), Some(2.0));

    let spec = config.output_file().unwrap();
    assert_eq!(spec.mode, FileMode::Append);
    assert!(spec.with_date);
}

#[test]
fn sample_file_is_used_when_primary_missing() {
    let dir = tempfile::tempdir().unwrap();
    write_file(
        dir.path(),
        "config-sample.txt",
        "[CookieBot]\nsave_every = 7\n",
    );

    let (path, config) = BotConfig::discover(dir.path()).unwrap();
    assert!(path.ends_with("config-sample.txt"));
    assert_eq!(config.save_every(), 7);
}

#[test]
fn unreadable_keys_fall_back_to_defaults() {
    let dir = tempfile::tempdir().unwrap();
    // save_every has the wrong type, sleep_amount is malformed: both keep
    // their defaults rather than erroring.
    write_file(
        dir.path(),
        "config.txt",
        "[CookieBot]\nsave_every = \"often\"\nsleep_amount = fast\n",
    );

    let (_, config) = BotConfig::discover(dir.path()).unwrap();
    assert_eq!(config.save_every(), 30);
    assert_eq!(config.sleep_amount(), Duration::from_secs(3));
}
