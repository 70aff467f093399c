// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Block-style YAML output for calibration tools.
//!
//! Values are first converted to a [`serde_yaml::Value`] and then emitted
//! by hand, because the two consumers disagree on layout:
//!
//! - [`YamlFlavor::Kalibr`]: plain document, leaf sequences in flow style
//!   (`intrinsics: [fx, fy, cx, cy]`), the layout of the camchain files
//!   Kalibr itself writes. A `default_flow_style=False` dump of the same
//!   data gives block sequences instead; Kalibr's loader reads both.
//! - [`YamlFlavor::OpenCv`]: `%YAML:1.0` directive and `---` start marker,
//!   every sequence in block style and indented under its key. The OpenCV
//!   `FileStorage` parser is indentation-sensitive and rejects
//!   `key:\n- item`.
//!
//! Floats always carry a decimal point and a signed exponent so that YAML
//! 1.1 parsers read them back as floats.

use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_yaml::Value;

use crate::core::{Result, VidimuError};

const INDENT: usize = 2;

/// Output layout.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum YamlFlavor {
    /// Flow-style leaf sequences, unlike a `default_flow_style=False` dump
    #[default]
    Kalibr,
    OpenCv,
}

/// Serialize `value` as a YAML document.
pub fn to_string<T: Serialize + ?Sized>(value: &T, flavor: YamlFlavor) -> Result<String> {
    let value = serde_yaml::to_value(value)
        .map_err(|e| VidimuError::sink("yaml", format!("Failed to serialize: {e}")))?;
    let mut out = String::new();
    if flavor == YamlFlavor::OpenCv {
        out.push_str("%YAML:1.0\n---\n");
    }
    let emitter = Emitter { flavor };
    match &value {
        Value::Mapping(map) if !map.is_empty() => emitter.block(&mut out, &value, 0),
        Value::Sequence(seq) if !seq.is_empty() => emitter.block(&mut out, &value, 0),
        other => {
            out.push_str(&emitter.inline(other));
            out.push('\n');
        }
    }
    Ok(out)
}

/// Parse a YAML document written in either flavor.
pub fn from_str<T: DeserializeOwned>(text: &str) -> Result<T> {
    serde_yaml::from_str(strip_directive(text))
        .map_err(|e| VidimuError::decode("yaml", e.to_string()))
}

/// Write `value` to `path` in the given flavor.
pub fn write_file<T: Serialize + ?Sized>(path: &Path, value: &T, flavor: YamlFlavor) -> Result<()> {
    let text = to_string(value, flavor)?;
    std::fs::write(path, text).map_err(|e| {
        VidimuError::sink("yaml", format!("Failed to write {}: {e}", path.display()))
    })?;
    tracing::debug!(path = %path.display(), ?flavor, "Wrote YAML");
    Ok(())
}

/// Read and parse a YAML file written in either flavor.
pub fn read_file<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let text = std::fs::read_to_string(path).map_err(|e| {
        VidimuError::io("yaml", format!("Failed to read {}: {e}", path.display()))
    })?;
    from_str(&text)
}

/// `%YAML:1.0` is not a valid YAML directive, so drop it before parsing.
fn strip_directive(text: &str) -> &str {
    let trimmed = text.trim_start();
    if trimmed.starts_with("%YAML") {
        match trimmed.find('\n') {
            Some(pos) => &trimmed[pos + 1..],
            None => "",
        }
    } else {
        text
    }
}

struct Emitter {
    flavor: YamlFlavor,
}

impl Emitter {
    /// Non-empty collection as indented block lines.
    fn block(&self, out: &mut String, value: &Value, indent: usize) {
        let pad = " ".repeat(indent);
        match value {
            Value::Mapping(map) => {
                for (key, item) in map {
                    out.push_str(&pad);
                    out.push_str(&self.inline(key));
                    out.push(':');
                    self.after_key(out, item, indent);
                }
            }
            Value::Sequence(seq) => {
                for item in seq {
                    out.push_str(&pad);
                    out.push_str("- ");
                    if self.is_block(item) {
                        // Render one level deeper and pull the first line up
                        // next to the dash.
                        let mut nested = String::new();
                        self.block(&mut nested, item, indent + INDENT);
                        out.push_str(&nested[indent + INDENT..]);
                    } else {
                        out.push_str(&self.inline(item));
                        out.push('\n');
                    }
                }
            }
            Value::Tagged(tagged) => self.block(out, &tagged.value, indent),
            other => {
                out.push_str(&pad);
                out.push_str(&self.inline(other));
                out.push('\n');
            }
        }
    }

    fn after_key(&self, out: &mut String, item: &Value, indent: usize) {
        if !self.is_block(item) {
            out.push(' ');
            out.push_str(&self.inline(item));
            out.push('\n');
            return;
        }
        out.push('\n');
        let nested = match (self.flavor, item) {
            // Kalibr keeps PyYAML's indentless sequences under mapping keys.
            (YamlFlavor::Kalibr, Value::Sequence(_)) => indent,
            _ => indent + INDENT,
        };
        self.block(out, item, nested);
    }

    fn is_block(&self, value: &Value) -> bool {
        match value {
            Value::Mapping(map) => !map.is_empty(),
            Value::Sequence(seq) => match self.flavor {
                YamlFlavor::OpenCv => !seq.is_empty(),
                YamlFlavor::Kalibr => seq.iter().any(is_collection),
            },
            Value::Tagged(tagged) => self.is_block(&tagged.value),
            _ => false,
        }
    }

    fn inline(&self, value: &Value) -> String {
        match value {
            Value::Null => "~".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => match n.as_f64() {
                Some(f) if n.is_f64() => format_float(f),
                _ => n.to_string(),
            },
            Value::String(s) => quote(s),
            Value::Sequence(seq) => {
                let items: Vec<_> = seq.iter().map(|v| self.inline(v)).collect();
                format!("[{}]", items.join(", "))
            }
            Value::Mapping(map) => {
                let items: Vec<_> = map
                    .iter()
                    .map(|(k, v)| format!("{}: {}", self.inline(k), self.inline(v)))
                    .collect();
                format!("{{{}}}", items.join(", "))
            }
            Value::Tagged(tagged) => self.inline(&tagged.value),
        }
    }
}

fn is_collection(value: &Value) -> bool {
    matches!(value, Value::Mapping(_) | Value::Sequence(_))
}

/// Float text readable by YAML 1.1 and 1.2 parsers alike.
pub fn format_float(value: f64) -> String {
    if value.is_nan() {
        return ".nan".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { ".inf" } else { "-.inf" }.to_string();
    }
    let text = format!("{value:?}");
    match text.split_once('e') {
        Some((mantissa, exponent)) => {
            let mantissa = if mantissa.contains('.') {
                mantissa.to_string()
            } else {
                format!("{mantissa}.0")
            };
            let exponent = if exponent.starts_with('-') {
                exponent.to_string()
            } else {
                format!("+{exponent}")
            };
            format!("{mantissa}e{exponent}")
        }
        None => text,
    }
}

fn quote(s: &str) -> String {
    if needs_quotes(s) {
        format!("'{}'", s.replace('\'', "''"))
    } else {
        s.to_string()
    }
}

fn needs_quotes(s: &str) -> bool {
    if s.is_empty() || s.trim() != s {
        return true;
    }
    let lower = s.to_ascii_lowercase();
    if matches!(
        lower.as_str(),
        "~" | "null" | "true" | "false" | "yes" | "no" | "on" | "off" | "y" | "n"
    ) {
        return true;
    }
    if s.parse::<f64>().is_ok() || s.starts_with('.') && s[1..].parse::<f64>().is_ok() {
        return true;
    }
    let first = s.chars().next().unwrap_or(' ');
    if "-?:,[]{}#&*!|>'\"%@`".contains(first) && !(first == '-' && s.len() > 1 && !s[1..].starts_with(' ')) {
        return true;
    }
    s.contains(": ") || s.contains(" #") || s.contains('\n') || s.ends_with(':')
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Doc {
        name: String,
        values: Vec<f64>,
        rows: Vec<Vec<f64>>,
        empty: Vec<u32>,
    }

    fn doc() -> Doc {
        Doc {
            name: "/cam0/image_raw".to_string(),
            values: vec![1.0, 0.5],
            rows: vec![vec![1.0, 0.0], vec![0.0, 1.0]],
            empty: vec![],
        }
    }

    #[test]
    fn test_kalibr_flavor_layout() {
        let text = to_string(&doc(), YamlFlavor::Kalibr).unwrap();
        assert_eq!(
            text,
            "name: /cam0/image_raw\n\
             values: [1.0, 0.5]\n\
             rows:\n\
             - [1.0, 0.0]\n\
             - [0.0, 1.0]\n\
             empty: []\n"
        );
    }

    #[test]
    fn test_opencv_flavor_layout() {
        let text = to_string(&doc(), YamlFlavor::OpenCv).unwrap();
        assert_eq!(
            text,
            "%YAML:1.0\n---\n\
             name: /cam0/image_raw\n\
             values:\n  - 1.0\n  - 0.5\n\
             rows:\n  - - 1.0\n    - 0.0\n  - - 0.0\n    - 1.0\n\
             empty: []\n"
        );
    }

    #[test]
    fn test_sequence_of_mappings() {
        #[derive(Serialize)]
        struct Entry {
            frame: f64,
            time: f64,
        }
        #[derive(Serialize)]
        struct Video {
            video: Vec<Entry>,
        }
        let video = Video {
            video: vec![
                Entry { frame: 0.0, time: 10.0 },
                Entry { frame: 1.0, time: 20.0 },
            ],
        };
        let text = to_string(&video, YamlFlavor::OpenCv).unwrap();
        assert_eq!(
            text,
            "%YAML:1.0\n---\nvideo:\n  - frame: 0.0\n    time: 10.0\n  - frame: 1.0\n    time: 20.0\n"
        );
    }

    #[test]
    fn test_both_flavors_parse_back() {
        for flavor in [YamlFlavor::Kalibr, YamlFlavor::OpenCv] {
            let text = to_string(&doc(), flavor).unwrap();
            let parsed: Doc = from_str(&text).unwrap();
            assert_eq!(parsed, doc());
        }
    }

    #[test]
    fn test_format_float() {
        assert_eq!(format_float(1.0), "1.0");
        assert_eq!(format_float(-0.25), "-0.25");
        assert_eq!(format_float(1e-6), "1.0e-6");
        assert_eq!(format_float(1.764e-6), "1.764e-6");
        assert_eq!(format_float(1e20), "1.0e+20");
        assert_eq!(format_float(f64::NAN), ".nan");
        assert_eq!(format_float(f64::NEG_INFINITY), "-.inf");
    }

    #[test]
    fn test_ambiguous_strings_are_quoted() {
        assert_eq!(quote("aprilgrid"), "aprilgrid");
        assert_eq!(quote("1.5"), "'1.5'");
        assert_eq!(quote("yes"), "'yes'");
        assert_eq!(quote(""), "''");
        assert_eq!(quote("a: b"), "'a: b'");
        assert_eq!(quote("it's"), "it's");
        assert_eq!(quote("'x"), "'''x'");
    }
}
