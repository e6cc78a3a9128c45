//! The configuration value grammar.
//!
//! Line-oriented: `#`-prefixed lines are comments, `[Section]` lines start
//! a named section, and everything else is `key = value`. Values come in
//! six forms:
//!
//! - `"a string"`
//! - `123` / `-7` (integer)
//! - `1.5` (float)
//! - `true` / `FALSE` (boolean, case-insensitive)
//! - `[elem, elem, ...]` (list; elements parsed by the same value grammar)
//! - `file("status-{}.log", "a")` (output-file declaration; the path
//!   template may contain a `{}` date placeholder substituted at open time)
//!
//! Lines that match no form yield no entry. A `file(...)` value is
//! validated by opening the substituted path once; if the arguments are
//! not both strings, the mode is unknown, or the open fails, the key is
//! silently omitted. The parsed value carries the template and mode only —
//! the component that writes to the file owns the actual handle, so
//! rollover never mutates the configuration.

use std::collections::HashMap;
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::OnceLock;

use chrono::NaiveDate;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Placeholder substituted with the current date in file templates.
const DATE_PLACEHOLDER: &str = "{}";

/// Format used when substituting [`DATE_PLACEHOLDER`].
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Open mode for an output-file declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileMode {
    /// `"a"` — append, creating the file if missing.
    Append,
    /// `"w"` — truncate, creating the file if missing.
    Write,
}

impl FileMode {
    fn from_str(s: &str) -> Option<Self> {
        match s {
            "a" => Some(FileMode::Append),
            "w" => Some(FileMode::Write),
            _ => None,
        }
    }
}

/// A parsed `file(template, mode)` declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutFileSpec {
    /// Path template, possibly containing a `{}` date placeholder.
    pub template: String,
    /// Open mode.
    pub mode: FileMode,
    /// True when the template contains the date placeholder, meaning the
    /// file should roll over to a new name when the calendar date changes.
    pub with_date: bool,
}

impl OutFileSpec {
    /// Resolve the template against a concrete date.
    pub fn resolved_path(&self, date: NaiveDate) -> PathBuf {
        PathBuf::from(
            self.template
                .replace(DATE_PLACEHOLDER, &date.format(DATE_FORMAT).to_string()),
        )
    }

    /// Open the resolved path with the declared mode.
    pub fn open(&self, date: NaiveDate) -> std::io::Result<std::fs::File> {
        let path = self.resolved_path(date);
        match self.mode {
            FileMode::Append => OpenOptions::new().append(true).create(true).open(path),
            FileMode::Write => OpenOptions::new()
                .write(true)
                .truncate(true)
                .create(true)
                .open(path),
        }
    }
}

/// A configuration value: one tagged variant per grammar form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ConfigValue {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    List(Vec<ConfigValue>),
    OutFile(OutFileSpec),
}

impl ConfigValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ConfigValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            ConfigValue::Int(n) => Some(*n),
            _ => None,
        }
    }

    /// Numeric accessor: accepts both the integer and float forms.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            ConfigValue::Int(n) => Some(*n as f64),
            ConfigValue::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ConfigValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[ConfigValue]> {
        match self {
            ConfigValue::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_out_file(&self) -> Option<&OutFileSpec> {
        match self {
            ConfigValue::OutFile(spec) => Some(spec),
            _ => None,
        }
    }
}

/// Compiled grammar regexes, built once.
struct Grammar {
    line: Regex,
    section: Regex,
    string: Regex,
    int: Regex,
    float: Regex,
    boolean: Regex,
    list: Regex,
    file: Regex,
}

fn grammar() -> &'static Grammar {
    static GRAMMAR: OnceLock<Grammar> = OnceLock::new();
    GRAMMAR.get_or_init(|| Grammar {
        line: Regex::new(r"^\s*([^=#\[\s][^=]*?)\s*=\s*(.*?)\s*$").unwrap(),
        section: Regex::new(r"^\s*\[(.*?)\]\s*$").unwrap(),
        string: Regex::new(r#"^"([^"]*)"$"#).unwrap(),
        int: Regex::new(r"^-?\d+$").unwrap(),
        float: Regex::new(r"^-?\d+\.\d+$").unwrap(),
        boolean: Regex::new(r"^(?i:true|false)$").unwrap(),
        list: Regex::new(r"^\[(.*)\]$").unwrap(),
        file: Regex::new(r"^(?i:file)\s*\(\s*(.*?)\s*,\s*(.*?)\s*\)$").unwrap(),
    })
}

/// Parse the right-hand side of an assignment.
///
/// Returns `None` for anything that matches no value form.
pub fn parse_value(raw: &str) -> Option<ConfigValue> {
    let g = grammar();

    if let Some(caps) = g.string.captures(raw) {
        return Some(ConfigValue::Str(caps[1].to_string()));
    }
    if g.int.is_match(raw) {
        return raw.parse().ok().map(ConfigValue::Int);
    }
    if g.float.is_match(raw) {
        return raw.parse().ok().map(ConfigValue::Float);
    }
    if g.boolean.is_match(raw) {
        return Some(ConfigValue::Bool(raw.eq_ignore_ascii_case("true")));
    }
    if let Some(caps) = g.list.captures(raw) {
        let inner = caps[1].trim();
        if inner.is_empty() {
            return Some(ConfigValue::List(Vec::new()));
        }
        let items: Vec<ConfigValue> = inner
            .split(',')
            .filter_map(|elem| parse_value(elem.trim()))
            .collect();
        return Some(ConfigValue::List(items));
    }
    if let Some(caps) = g.file.captures(raw) {
        return parse_file_value(&caps[1], &caps[2]);
    }
    None
}

/// Parse and validate a `file(template, mode)` declaration.
///
/// Both arguments must themselves parse as strings, the mode must be a
/// known one, and the substituted path must be openable. Any failure
/// means the declaration is dropped, matching the silent-skip behavior
/// of the rest of the grammar.
fn parse_file_value(raw_template: &str, raw_mode: &str) -> Option<ConfigValue> {
    let template = parse_value(raw_template)?.as_str()?.to_string();
    let mode_str = parse_value(raw_mode)?.as_str()?.to_string();
    let mode = FileMode::from_str(&mode_str)?;

    let spec = OutFileSpec {
        with_date: template.contains(DATE_PLACEHOLDER),
        template,
        mode,
    };

    let today = chrono::Local::now().date_naive();
    match spec.open(today) {
        Ok(_) => Some(ConfigValue::OutFile(spec)),
        Err(e) => {
            tracing::debug!(template = %spec.template, error = %e, "dropping unopenable file() value");
            None
        }
    }
}

/// Parse a single `key = value` line. Section headers, comments, and
/// malformed lines all return `None`.
pub fn parse_line(line: &str) -> Option<(String, ConfigValue)> {
    let g = grammar();
    let caps = g.line.captures(line)?;
    let key = caps[1].to_string();
    let value = parse_value(&caps[2])?;
    Some((key, value))
}

/// Parse a whole configuration document into per-section key maps.
///
/// Keys appearing before any `[Section]` header land in the `""` section.
pub fn parse_document(input: &str) -> HashMap<String, HashMap<String, ConfigValue>> {
    let g = grammar();
    let mut sections: HashMap<String, HashMap<String, ConfigValue>> = HashMap::new();
    let mut current = String::new();

    for line in input.lines() {
        if line.trim_start().starts_with('#') {
            continue;
        }
        if let Some(caps) = g.section.captures(line) {
            current = caps[1].to_string();
            sections.entry(current.clone()).or_default();
            continue;
        }
        if let Some((key, value)) = parse_line(line) {
            sections.entry(current.clone()).or_default().insert(key, value);
        }
    }

    sections
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_int_assignment() {
        let (key, value) = parse_line("gold = 5").unwrap();
        assert_eq!(key, "gold");
        assert_eq!(value, ConfigValue::Int(5));
    }

    #[test]
    fn parse_string_assignment() {
        let (key, value) = parse_line(r#"url = "https://example.com""#).unwrap();
        assert_eq!(key, "url");
        assert_eq!(value.as_str(), Some("https://example.com"));
    }

    #[test]
    fn parse_float_assignment() {
        let (_, value) = parse_line("sleep_amount = 2.5").unwrap();
        assert_eq!(value, ConfigValue::Float(2.5));
    }

    #[test]
    fn parse_bool_case_insensitive() {
        assert_eq!(parse_line("a = true").unwrap().1, ConfigValue::Bool(true));
        assert_eq!(parse_line("a = TRUE").unwrap().1, ConfigValue::Bool(true));
        assert_eq!(parse_line("a = False").unwrap().1, ConfigValue::Bool(false));
    }

    #[test]
    fn parse_list_of_strings() {
        let (key, value) = parse_line(r#"names = ["a", "b"]"#).unwrap();
        assert_eq!(key, "names");
        assert_eq!(
            value,
            ConfigValue::List(vec![
                ConfigValue::Str("a".into()),
                ConfigValue::Str("b".into()),
            ])
        );
    }

    #[test]
    fn parse_list_mixed_and_empty() {
        let (_, value) = parse_line("xs = [1, 2.5, true]").unwrap();
        assert_eq!(
            value,
            ConfigValue::List(vec![
                ConfigValue::Int(1),
                ConfigValue::Float(2.5),
                ConfigValue::Bool(true),
            ])
        );
        assert_eq!(parse_line("xs = []").unwrap().1, ConfigValue::List(vec![]));
    }

    #[test]
    fn malformed_lines_yield_nothing() {
        assert!(parse_line("no equals sign here").is_none());
        assert!(parse_line("key = ").is_none());
        assert!(parse_line("key = 'single quotes'").is_none());
        assert!(parse_line("= 5").is_none());
    }

    #[test]
    fn parse_file_value_append_mode() {
        let dir = tempfile::tempdir().unwrap();
        let template = dir.path().join("out.log").display().to_string();
        let line = format!(r#"output_file = file("{template}", "a")"#);
        let (key, value) = parse_line(&line).unwrap();
        assert_eq!(key, "output_file");
        let spec = value.as_out_file().unwrap();
        assert_eq!(spec.mode, FileMode::Append);
        assert!(!spec.with_date);
        // Validation opened (and therefore created) the file.
        assert!(dir.path().join("out.log").exists());
    }

    #[test]
    fn parse_file_value_with_date_placeholder() {
        let dir = tempfile::tempdir().unwrap();
        let template = dir.path().join("out-{}.log").display().to_string();
        let line = format!(r#"output_file = file("{template}", "a")"#);
        let (_, value) = parse_line(&line).unwrap();
        let spec = value.as_out_file().unwrap();
        assert!(spec.with_date);

        let date = NaiveDate::from_ymd_opt(2020, 1, 2).unwrap();
        assert!(spec
            .resolved_path(date)
            .display()
            .to_string()
            .ends_with("out-2020-01-02.log"));
    }

    #[test]
    fn parse_file_value_bad_mode_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let template = dir.path().join("out.log").display().to_string();
        let line = format!(r#"output_file = file("{template}", "x")"#);
        assert!(parse_line(&line).is_none());
    }

    #[test]
    fn parse_file_value_unopenable_path_dropped() {
        let line = r#"output_file = file("/nonexistent-dir-zzz/out.log", "a")"#;
        assert!(parse_line(line).is_none());
    }

    #[test]
    fn document_sections_and_comments() {
        let doc = "\
# a comment
top = 1
[CookieBot]
verbose = true
broken line
count = 2
";
        let sections = parse_document(doc);
        assert_eq!(sections[""]["top"], ConfigValue::Int(1));
        let bot = &sections["CookieBot"];
        assert_eq!(bot["verbose"], ConfigValue::Bool(true));
        assert_eq!(bot["count"], ConfigValue::Int(2));
        assert!(!bot.contains_key("broken line"));
    }

    #[test]
    fn number_accessor_accepts_both_forms() {
        assert_eq!(ConfigValue::Int(3).as_number(), Some(3.0));
        assert_eq!(ConfigValue::Float(0.5).as_number(), Some(0.5));
        assert_eq!(ConfigValue::Bool(true).as_number(), None);
    }
}
