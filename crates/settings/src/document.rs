//! Strategy settings files (`.set`).
//!
//! Sections are introduced by `;=====Name=====` header lines. Values may be
//! plain strings or `current||flag||min||max` tuples; a tuple whose flag is
//! `Y` marks a parameter the recommender may tune.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use common::{Error, Result};

use crate::recommend::Recommendation;

const TUPLE_DELIMITER: &str = "||";
const HEADER_FENCE: &str = "=====";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Section {
    General,
    Entry,
    Exit,
    TakeProfit,
    StopLoss,
    Schedule,
    News,
}

impl Section {
    /// Match header text, e.g. "Take Profit" or "basic_settings".
    /// Returns `None` for headers that name no known section.
    pub fn from_header(text: &str) -> Option<Section> {
        let key: String = text
            .chars()
            .filter(|c| !matches!(c, ' ' | '_' | '-'))
            .collect::<String>()
            .to_lowercase();

        if key.contains("general") || key.contains("basic") {
            Some(Section::General)
        } else if key.contains("entry") {
            Some(Section::Entry)
        } else if key.contains("exit") {
            Some(Section::Exit)
        } else if key.contains("takeprofit") {
            Some(Section::TakeProfit)
        } else if key.contains("stoploss") {
            Some(Section::StopLoss)
        } else if key.contains("schedule") {
            Some(Section::Schedule)
        } else if key.contains("news") {
            Some(Section::News)
        } else {
            None
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Section::General => "General",
            Section::Entry => "Entry",
            Section::Exit => "Exit",
            Section::TakeProfit => "Take Profit",
            Section::StopLoss => "Stop Loss",
            Section::Schedule => "Schedule",
            Section::News => "News",
        }
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.title())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SettingValue {
    Plain(String),
    Constrained {
        current: f64,
        min: f64,
        max: f64,
        tunable: bool,
    },
}

impl SettingValue {
    /// Decode a raw right-hand side.
    pub fn decode(raw: &str) -> SettingValue {
        if !raw.contains(TUPLE_DELIMITER) {
            return SettingValue::Plain(raw.to_string());
        }

        let parts: Vec<&str> = raw.split(TUPLE_DELIMITER).map(str::trim).collect();
        let number = |s: &str| s.parse::<f64>().ok().filter(|v| v.is_finite());

        if let [current, flag, min, max] = parts[..] {
            if let (Some(current), Some(min), Some(max)) = (number(current), number(min), number(max)) {
                return SettingValue::Constrained {
                    current,
                    min,
                    max,
                    tunable: flag == "Y",
                };
            }
        }
        SettingValue::Plain(parts[0].to_string())
    }
}

/// One `name=value` entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Setting {
    pub section: Section,
    pub name: String,
    pub value: SettingValue,
    /// Full right-hand side as read, tuple included.
    pub raw: String,
}

impl Setting {
    /// Numeric current value of a constrained setting.
    pub fn current(&self) -> Option<f64> {
        match self.value {
            SettingValue::Constrained { current, .. } => Some(current),
            SettingValue::Plain(_) => None,
        }
    }

    pub fn is_tunable(&self) -> bool {
        matches!(self.value, SettingValue::Constrained { tunable: true, .. })
    }

    /// Right-hand side for writing: the raw text with the current position
    /// replaced when the value changed.
    fn render(&self) -> String {
        let current = match self.value {
            SettingValue::Constrained { current, .. } => current,
            SettingValue::Plain(_) => return self.raw.clone(),
        };

        let mut parts: Vec<String> = self.raw.split(TUPLE_DELIMITER).map(str::to_string).collect();
        let unchanged = parts[0].trim().parse::<f64>().map_or(false, |v| v == current);
        if !unchanged {
            parts[0] = format_number(current);
        }
        parts.join(TUPLE_DELIMITER)
    }
}

/// A line the parser could not use.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedLine {
    pub line: usize,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Summary {
    pub source: String,
    pub lines: usize,
    pub entries: usize,
    pub tunables: usize,
    pub skipped: usize,
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} settings ({} tunable) from {} lines, {} skipped",
            self.source, self.entries, self.tunables, self.lines, self.skipped
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SettingsDocument {
    source: String,
    entries: Vec<Setting>,
    index: HashMap<(Section, String), usize>,
    skipped: Vec<SkippedLine>,
    line_count: usize,
}

impl SettingsDocument {
    /// Parse settings text. Never fails; unusable lines are recorded in
    /// `skipped()`.
    pub fn parse(source: impl Into<String>, text: &str) -> SettingsDocument {
        let mut doc = SettingsDocument {
            source: source.into(),
            entries: Vec::new(),
            index: HashMap::new(),
            skipped: Vec::new(),
            line_count: 0,
        };
        let mut section = Section::General;

        for (i, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            doc.line_count += 1;

            if let Some(header) = header_text(line) {
                match Section::from_header(header) {
                    Some(s) => section = s,
                    None => debug!(header, "Unknown settings header, keeping {section}"),
                }
                continue;
            }
            if line.starts_with(';') {
                continue;
            }

            let Some((key, raw)) = line.split_once('=') else {
                doc.skip(i + 1, line);
                continue;
            };
            let key = key.trim();
            if key.is_empty() {
                doc.skip(i + 1, line);
                continue;
            }

            let raw = raw.trim();
            doc.upsert(Setting {
                section,
                name: key.to_string(),
                value: SettingValue::decode(raw),
                raw: raw.to_string(),
            });
        }

        debug!(summary = %doc.summary(), "Parsed settings");
        doc
    }

    /// Read and parse a settings file, detecting its text encoding.
    pub fn load(path: impl AsRef<Path>) -> Result<SettingsDocument> {
        let path = path.as_ref();
        let file = path.display().to_string();
        let bytes = std::fs::read(path).map_err(|e| Error::Parse {
            file: file.clone(),
            reason: e.to_string(),
        })?;

        let doc = SettingsDocument::parse(file, &decode(&bytes));
        info!(summary = %doc.summary(), "Loaded settings file");
        Ok(doc)
    }

    /// Write the sectioned form to `path` as UTF-8.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        std::fs::write(path, self.serialize_sectioned())?;
        info!(file = %path.display(), entries = self.entries.len(), "Saved settings file");
        Ok(())
    }

    fn skip(&mut self, line: usize, text: &str) {
        debug!(line, text, "Skipping malformed settings line");
        self.skipped.push(SkippedLine {
            line,
            text: text.to_string(),
        });
    }

    fn upsert(&mut self, setting: Setting) {
        let key = (setting.section, setting.name.clone());
        match self.index.get(&key) {
            Some(&i) => self.entries[i] = setting,
            None => {
                self.index.insert(key, self.entries.len());
                self.entries.push(setting);
            }
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn entries(&self) -> &[Setting] {
        &self.entries
    }

    pub fn skipped(&self) -> &[SkippedLine] {
        &self.skipped
    }

    /// Non-empty lines read, headers and comments included.
    pub fn line_count(&self) -> usize {
        self.line_count
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// First setting called `name`, in any section.
    pub fn get(&self, name: &str) -> Option<&Setting> {
        self.entries.iter().find(|s| s.name == name)
    }

    pub fn get_in(&self, section: Section, name: &str) -> Option<&Setting> {
        self.index
            .get(&(section, name.to_string()))
            .map(|&i| &self.entries[i])
    }

    pub fn tunables(&self) -> impl Iterator<Item = &Setting> {
        self.entries.iter().filter(|s| s.is_tunable())
    }

    pub fn summary(&self) -> Summary {
        Summary {
            source: self.source.clone(),
            lines: self.line_count,
            entries: self.entries.len(),
            tunables: self.tunables().count(),
            skipped: self.skipped.len(),
        }
    }

    /// Flat `name=value` lines in file order, without headers.
    pub fn serialize(&self) -> String {
        self.entries
            .iter()
            .map(|s| format!("{}={}\n", s.name, s.render()))
            .collect()
    }

    /// Lines grouped under `;=====Title=====` headers, sections in the order
    /// they were first seen.
    pub fn serialize_sectioned(&self) -> String {
        let mut order: Vec<Section> = Vec::new();
        for s in &self.entries {
            if !order.contains(&s.section) {
                order.push(s.section);
            }
        }

        let mut out = String::new();
        for section in order {
            out.push_str(&format!(";{HEADER_FENCE}{}{HEADER_FENCE}\n", section.title()));
            for s in self.entries.iter().filter(|s| s.section == section) {
                out.push_str(&format!("{}={}\n", s.name, s.render()));
            }
        }
        out
    }

    /// Copy with recommended current values applied, clamped to each
    /// setting's range. Names absent from the document are ignored.
    pub fn with_updates(&self, recommendation: &Recommendation) -> SettingsDocument {
        let mut doc = self.clone();
        for setting in &mut doc.entries {
            let Some(proposed) = recommendation.get(&setting.name) else {
                continue;
            };
            if let SettingValue::Constrained { current, min, max, .. } = &mut setting.value {
                *current = clamp_to(proposed, *min, *max);
            }
        }
        doc
    }
}

/// Header inner text if `line` is `;=====...=====` (the `;` is optional).
fn header_text(line: &str) -> Option<&str> {
    let s = line.strip_prefix(';').unwrap_or(line).trim();
    if s.len() >= 2 * HEADER_FENCE.len() && s.starts_with(HEADER_FENCE) && s.ends_with(HEADER_FENCE) {
        Some(s.trim_matches('=').trim())
    } else {
        None
    }
}

/// Clamp into `[min, max]`, tolerating reversed bounds.
pub(crate) fn clamp_to(value: f64, min: f64, max: f64) -> f64 {
    let (lo, hi) = if min <= max { (min, max) } else { (max, min) };
    if value.is_nan() {
        return lo;
    }
    value.max(lo).min(hi)
}

fn format_number(v: f64) -> String {
    format!("{v}")
}

/// Decode settings bytes: UTF-8 (optional BOM), UTF-16 LE/BE with BOM,
/// otherwise Latin-1.
pub fn decode(bytes: &[u8]) -> String {
    match bytes {
        [0xEF, 0xBB, 0xBF, rest @ ..] => String::from_utf8_lossy(rest).into_owned(),
        [0xFF, 0xFE, rest @ ..] => utf16(rest, u16::from_le_bytes),
        [0xFE, 0xFF, rest @ ..] => utf16(rest, u16::from_be_bytes),
        _ => match std::str::from_utf8(bytes) {
            Ok(s) => s.to_string(),
            Err(_) => bytes.iter().map(|&b| char::from(b)).collect(),
        },
    }
}

fn utf16(bytes: &[u8], unit: fn([u8; 2]) -> u16) -> String {
    let units: Vec<u16> = bytes.chunks_exact(2).map(|c| unit([c[0], c[1]])).collect();
    String::from_utf16_lossy(&units)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
;=====General Settings=====
Lots=0.1
Comment=bartune
;=====Take Profit=====
TakeProfit=50||Y||10||200
;=====Stop Loss=====
StopLoss=30||Y||5||100
Trailing=15||N||0||50
; a comment
garbage line
=orphan
";

    #[test]
    fn header_matching_normalizes_text() {
        assert_eq!(Section::from_header("Take Profit"), Some(Section::TakeProfit));
        assert_eq!(Section::from_header("STOP_LOSS settings"), Some(Section::StopLoss));
        assert_eq!(Section::from_header("basic"), Some(Section::General));
        assert_eq!(Section::from_header("Trade-Entry"), Some(Section::Entry));
        assert_eq!(Section::from_header("misc"), None);
    }

    #[test]
    fn parses_sections_and_values() {
        let doc = SettingsDocument::parse("sample.set", SAMPLE);
        assert_eq!(doc.len(), 5);
        assert_eq!(doc.line_count(), 11);

        let lots = doc.get("Lots").unwrap();
        assert_eq!(lots.section, Section::General);
        assert_eq!(lots.value, SettingValue::Plain("0.1".into()));

        let tp = doc.get_in(Section::TakeProfit, "TakeProfit").unwrap();
        assert_eq!(
            tp.value,
            SettingValue::Constrained {
                current: 50.0,
                min: 10.0,
                max: 200.0,
                tunable: true
            }
        );

        let trailing = doc.get("Trailing").unwrap();
        assert_eq!(trailing.section, Section::StopLoss);
        assert!(!trailing.is_tunable());
        assert_eq!(trailing.current(), Some(15.0));

        let names: Vec<&str> = doc.tunables().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["TakeProfit", "StopLoss"]);
    }

    #[test]
    fn records_skipped_lines() {
        let doc = SettingsDocument::parse("sample.set", SAMPLE);
        let skipped: Vec<(usize, &str)> = doc.skipped().iter().map(|s| (s.line, s.text.as_str())).collect();
        assert_eq!(skipped, vec![(10, "garbage line"), (11, "=orphan")]);
    }

    #[test]
    fn tuple_flag_is_positional() {
        // a trailing Y in another position does not make it tunable
        let v = SettingValue::decode("50||10||1||Y");
        assert_eq!(v, SettingValue::Plain("50".into()));
        let v = SettingValue::decode("50||N||10||200");
        assert!(matches!(v, SettingValue::Constrained { tunable: false, .. }));
        let v = SettingValue::decode("abc||Y||1||2");
        assert_eq!(v, SettingValue::Plain("abc".into()));
        let v = SettingValue::decode("5||Y||1");
        assert_eq!(v, SettingValue::Plain("5".into()));
    }

    #[test]
    fn default_section_is_general() {
        let doc = SettingsDocument::parse("x", "Magic=1\n;=====unknown=====\nSlip=3\n");
        assert_eq!(doc.get("Magic").unwrap().section, Section::General);
        assert_eq!(doc.get("Slip").unwrap().section, Section::General);
    }

    #[test]
    fn duplicate_key_replaces_in_place() {
        let doc = SettingsDocument::parse("x", "A=1\nB=2\nA=3\n");
        assert_eq!(doc.len(), 2);
        assert_eq!(doc.entries()[0].raw, "3");
        assert_eq!(doc.entries()[1].name, "B");
    }

    #[test]
    fn value_split_on_first_equals() {
        let doc = SettingsDocument::parse("x", "Expr = a=b \n");
        assert_eq!(doc.get("Expr").unwrap().raw, "a=b");
    }

    #[test]
    fn serialize_flat_round_trip() {
        let doc = SettingsDocument::parse("sample.set", SAMPLE);
        let flat = doc.serialize();
        assert!(!flat.contains("====="));
        assert!(flat.contains("TakeProfit=50||Y||10||200\n"));

        let again = SettingsDocument::parse("again", &flat);
        for s in doc.entries() {
            let other = again.get(&s.name).unwrap();
            assert_eq!(other.value, s.value);
        }
    }

    #[test]
    fn sectioned_round_trip_keeps_sections() {
        let doc = SettingsDocument::parse("sample.set", SAMPLE);
        let text = doc.serialize_sectioned();
        assert!(text.starts_with(";=====General=====\n"));

        let again = SettingsDocument::parse("again", &text);
        assert_eq!(again.entries(), doc.entries());
    }

    #[test]
    fn with_updates_clamps_and_leaves_original() {
        let doc = SettingsDocument::parse("sample.set", SAMPLE);
        let mut rec = Recommendation::default();
        rec.insert("TakeProfit", 60.0);
        rec.insert("StopLoss", 500.0);
        rec.insert("Missing", 1.0);

        let updated = doc.with_updates(&rec);
        assert_eq!(updated.get("TakeProfit").unwrap().current(), Some(60.0));
        assert_eq!(updated.get("StopLoss").unwrap().current(), Some(100.0));
        assert_eq!(doc.get("TakeProfit").unwrap().current(), Some(50.0));
        assert!(updated.serialize().contains("TakeProfit=60||Y||10||200\n"));
    }

    #[test]
    fn decode_handles_boms_and_latin1() {
        assert_eq!(decode(b"\xEF\xBB\xBFA=1"), "A=1");
        let le: Vec<u8> = [0xFF, 0xFE].into_iter().chain("A=1".encode_utf16().flat_map(u16::to_le_bytes)).collect();
        assert_eq!(decode(&le), "A=1");
        let be: Vec<u8> = [0xFE, 0xFF].into_iter().chain("B=2".encode_utf16().flat_map(u16::to_be_bytes)).collect();
        assert_eq!(decode(&be), "B=2");
        assert_eq!(decode(b"Name=caf\xE9"), "Name=café");
    }

    #[test]
    fn clamp_tolerates_reversed_bounds() {
        assert_eq!(clamp_to(5.0, 10.0, 1.0), 5.0);
        assert_eq!(clamp_to(50.0, 10.0, 1.0), 10.0);
        assert_eq!(clamp_to(f64::NAN, 1.0, 10.0), 1.0);
    }
}
