//! Localization file formats.
//!
//! Two formats exist: the legacy line-based `key=value` `.lang` files and the
//! structured `.json` files used from 1.13 onwards. This module knows how to
//! recognise them, canonicalize their key order, and normalize content pulled
//! from mod archives.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::version::McVersion;

/// Language of a localization file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LangType {
    En,
    Cn,
}

/// Classify a file name as an English or Chinese localization file.
///
/// Matching is case-insensitive and covers both naming conventions.
pub fn classify_file_name(file_name: &str) -> Option<LangType> {
    let lower = file_name.to_ascii_lowercase();
    match lower.as_str() {
        "en_us.lang" | "en_us.json" => Some(LangType::En),
        "zh_cn.lang" | "zh_cn.json" => Some(LangType::Cn),
        _ => None,
    }
}

/// On-disk format of a localization file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LangFormat {
    /// `key=value` lines with `#` or `//` comments.
    Legacy,
    /// A flat JSON object of string values.
    Json,
}

impl LangFormat {
    /// Detect the format from a file extension. Returns `None` for anything
    /// other than `.json` and `.lang`.
    pub fn from_path(path: impl AsRef<Path>) -> Option<Self> {
        match path.as_ref().extension()?.to_str()? {
            "json" => Some(LangFormat::Json),
            "lang" => Some(LangFormat::Legacy),
            _ => None,
        }
    }

    pub fn for_version(version: McVersion) -> Self {
        if version.uses_legacy_format() {
            LangFormat::Legacy
        } else {
            LangFormat::Json
        }
    }

    /// Reorder entries by key. Applying this twice yields the same output as
    /// applying it once.
    pub fn canonicalize(self, input: &str) -> Result<String> {
        match self {
            LangFormat::Legacy => Ok(sort_lang_lines(input)),
            LangFormat::Json => sort_json_keys(input),
        }
    }

    /// Normalize content taken from a mod archive without reordering it.
    pub fn convert(self, input: &str) -> Result<String> {
        match self {
            LangFormat::Legacy => Ok(normalize_lang(input)),
            LangFormat::Json => normalize_json(input),
        }
    }
}

fn strip_bom(input: &str) -> &str {
    input.strip_prefix('\u{feff}').unwrap_or(input)
}

fn is_lang_comment_or_blank(line: &str) -> bool {
    line.starts_with('#') || line.starts_with("//") || line.trim().is_empty()
}

fn lang_key(line: &str) -> &str {
    line.split_once('=').map_or(line, |(key, _)| key)
}

/// Drop comment and blank lines, then sort the rest by the text before the
/// first `=`. The sort is stable, so lines sharing a key keep their order.
pub fn sort_lang_lines(input: &str) -> String {
    let mut lines: Vec<&str> = strip_bom(input)
        .lines()
        .filter(|line| !is_lang_comment_or_blank(line))
        .collect();
    lines.sort_by(|a, b| lang_key(a).cmp(lang_key(b)));

    let mut output = String::new();
    for line in lines {
        output.push_str(line);
        output.push('\n');
    }
    output
}

fn parse_json_object(input: &str) -> Result<Map<String, Value>> {
    let relaxed = strip_json_extensions(strip_bom(input));
    match serde_json::from_str::<Value>(&relaxed).context("Failed to parse JSON")? {
        Value::Object(map) => Ok(map),
        other => bail!("Expected a JSON object, found {}", json_kind(&other)),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Re-serialize a flat object of strings with keys in ascending order.
///
/// Non-ASCII text is written verbatim; only the characters JSON requires are
/// escaped.
pub fn sort_json_keys(input: &str) -> Result<String> {
    let map = parse_json_object(input)?;
    let mut sorted = BTreeMap::new();
    for (key, value) in map {
        match value {
            Value::String(text) => {
                sorted.insert(key, text);
            }
            other => {
                return Err(anyhow!(
                    "Value of key `{}` is {}, expected a string",
                    key,
                    json_kind(&other)
                ))
            }
        }
    }
    serde_json::to_string_pretty(&sorted).context("Failed to serialize sorted JSON")
}

fn normalize_lang(input: &str) -> String {
    let mut output = String::new();
    for line in strip_bom(input).lines() {
        output.push_str(line.trim_end());
        output.push('\n');
    }
    let trimmed_len = output.trim_end_matches('\n').len();
    output.truncate(trimmed_len);
    if !output.is_empty() {
        output.push('\n');
    }
    output
}

fn normalize_json(input: &str) -> Result<String> {
    let map = parse_json_object(input)?;
    serde_json::to_string_pretty(&map).context("Failed to serialize JSON")
}

/// Remove `//` and `/* */` comments and trailing commas so that hand-edited
/// language files parse as strict JSON. String contents are left untouched.
pub fn strip_json_extensions(input: &str) -> String {
    let chars: Vec<char> = input.chars().collect();
    let mut without_comments = String::with_capacity(input.len());
    let mut i = 0;
    let mut in_string = false;

    while i < chars.len() {
        let c = chars[i];
        if in_string {
            without_comments.push(c);
            if c == '\\' && i + 1 < chars.len() {
                without_comments.push(chars[i + 1]);
                i += 2;
                continue;
            }
            if c == '"' {
                in_string = false;
            }
            i += 1;
            continue;
        }

        match (c, chars.get(i + 1)) {
            ('"', _) => {
                in_string = true;
                without_comments.push(c);
                i += 1;
            }
            ('/', Some('/')) => {
                while i < chars.len() && chars[i] != '\n' {
                    i += 1;
                }
            }
            ('/', Some('*')) => {
                i += 2;
                while i < chars.len() && !(chars[i] == '*' && chars.get(i + 1) == Some(&'/')) {
                    i += 1;
                }
                i += 2;
            }
            _ => {
                without_comments.push(c);
                i += 1;
            }
        }
    }

    let chars: Vec<char> = without_comments.chars().collect();
    let mut output = String::with_capacity(without_comments.len());
    let mut in_string = false;
    let mut escaped = false;
    for (i, &c) in chars.iter().enumerate() {
        if in_string {
            output.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        if c == '"' {
            in_string = true;
        }
        if c == ',' {
            let next = chars[i + 1..].iter().find(|ch| !ch.is_whitespace());
            if matches!(next, Some('}') | Some(']')) {
                continue;
            }
        }
        output.push(c);
    }
    output
}
