//! User-facing status output.
//!
//! Separate from the tracing diagnostics: these are the `[+]`-style lines
//! an operator watches, optionally mirrored to a file whose name carries
//! the current date. All output is gated on the `verbose` config key.
//!
//! When the configured file template has a date placeholder, crossing a
//! calendar-date boundary closes the old handle and opens the next day's
//! file. The logger owns the handle; the configuration never changes.

use std::fs::File;
use std::io::Write;

use chrono::{DateTime, Local, NaiveDate};

use cookiebot_types::{BotConfig, OutFileSpec, TimestampPrefix};

/// Status logger.
pub struct Echo {
    enabled: bool,
    prefix: TimestampPrefix,
    sink: Sink,
}

enum Sink {
    Stdout,
    File(FileSink),
}

struct FileSink {
    spec: OutFileSpec,
    file: File,
    /// Date the current handle was opened for.
    date: NaiveDate,
}

impl Echo {
    /// Build from configuration. A configured output file that cannot be
    /// opened degrades to stdout.
    pub fn from_config(config: &BotConfig) -> Self {
        Self::build(
            config.verbose(),
            config.timestamp(),
            config.output_file(),
            Local::now().date_naive(),
        )
    }

    /// Plain stdout logger.
    pub fn stdout(enabled: bool, prefix: TimestampPrefix) -> Self {
        Self {
            enabled,
            prefix,
            sink: Sink::Stdout,
        }
    }

    fn build(
        enabled: bool,
        prefix: TimestampPrefix,
        spec: Option<&OutFileSpec>,
        date: NaiveDate,
    ) -> Self {
        let sink = match spec {
            Some(spec) => match spec.open(date) {
                Ok(file) => Sink::File(FileSink {
                    spec: spec.clone(),
                    file,
                    date,
                }),
                Err(e) => {
                    tracing::warn!(template = %spec.template, error = %e, "status file unavailable, using stdout");
                    Sink::Stdout
                }
            },
            None => Sink::Stdout,
        };
        Self {
            enabled,
            prefix,
            sink,
        }
    }

    /// Emit one status line. No-op unless verbose.
    pub fn emit(&mut self, message: &str) {
        self.emit_at(Local::now(), message);
    }

    fn emit_at(&mut self, now: DateTime<Local>, message: &str) {
        if !self.enabled {
            return;
        }
        self.roll_over_if_new_day(now);

        let line = format!("{}{message}", prefix_for(self.prefix, now));
        match &mut self.sink {
            Sink::Stdout => println!("{line}"),
            Sink::File(sink) => {
                let _ = writeln!(sink.file, "{line}");
                let _ = sink.file.flush();
            }
        }
    }

    /// Swap the file handle when the calendar date moved past the one the
    /// current handle was opened for.
    fn roll_over_if_new_day(&mut self, now: DateTime<Local>) {
        let Sink::File(sink) = &mut self.sink else {
            return;
        };
        let today = now.date_naive();
        if !sink.spec.with_date || sink.date == today {
            return;
        }
        match sink.spec.open(today) {
            Ok(file) => {
                sink.file = file;
                sink.date = today;
                let line = format!("{}[+] New Day!", prefix_for(self.prefix, now));
                let _ = writeln!(sink.file, "{line}");
                let _ = sink.file.flush();
            }
            Err(e) => {
                tracing::warn!(template = %sink.spec.template, error = %e, "status file rollover failed");
            }
        }
    }
}

/// Timestamp prefix for one line: time component first, then date, each
/// in brackets, trailing space after each.
pub fn prefix_for(prefix: TimestampPrefix, now: DateTime<Local>) -> String {
    let mut out = String::new();
    if prefix.time {
        out.push_str(&format!("[{}] ", now.format("%H:%M:%S")));
    }
    if prefix.date {
        out.push_str(&format!("[{}] ", now.format("%Y-%m-%d")));
    }
    out
}
