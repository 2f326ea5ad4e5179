//! Flat `key=value` configuration files
//!
//! A Figment provider for `.properties` documents. Keys are dot-delimited
//! paths (`redis.port=6379` becomes `{ redis: { port: "6379" } }`); every value
//! is a string and is coerced to the target type on extraction.
//!
//! Supported syntax: `#` / `!` comments, `=`, `:` or whitespace separators,
//! trailing-backslash line continuations and the `\=`, `\:`, `\ `, `\t`,
//! `\n`, `\r`, `\f` and `\uXXXX` escapes. The key ends at the first
//! unescaped separator; the value keeps its trailing whitespace.

use std::iter::Peekable;
use std::path::{Path, PathBuf};
use std::str::Chars;

use figment::value::{Dict, Map, Value};
use figment::{Metadata, Profile, Provider, Source};

/// Figment provider reading a `.properties` file
#[derive(Debug, Clone)]
pub struct Properties {
    path: PathBuf,
}

impl Properties {
    /// Provider for the file at `path`
    pub fn file<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl Provider for Properties {
    fn metadata(&self) -> Metadata {
        Metadata::named("Properties file").source(Source::File(self.path.clone()))
    }

    fn data(&self) -> Result<Map<Profile, Dict>, figment::Error> {
        let text = std::fs::read_to_string(&self.path)
            .map_err(|e| figment::Error::from(format!("{}: {e}", self.path.display())))?;
        let dict = parse(&text).map_err(figment::Error::from)?;
        Ok(Profile::Default.collect(dict))
    }
}

/// Parse a properties document into a nested dictionary
pub fn parse(text: &str) -> Result<Dict, String> {
    let mut root = Dict::new();
    for (line_no, line) in logical_lines(text) {
        let (key, value) = split_entry(&line).map_err(|e| format!("line {line_no}: {e}"))?;
        if key.is_empty() {
            return Err(format!("line {line_no}: missing key"));
        }
        insert_nested(&mut root, &key, value).map_err(|e| format!("line {line_no}: {e}"))?;
    }
    Ok(root)
}

/// Join continuation lines and drop comments and blanks
fn logical_lines(text: &str) -> Vec<(usize, String)> {
    let mut lines = Vec::new();
    let mut pending: Option<(usize, String)> = None;

    for (idx, raw) in text.lines().enumerate() {
        let trimmed = raw.trim_start();
        let continuing = pending.is_some();
        if !continuing && (trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with('!')) {
            continue;
        }

        // An odd run of trailing backslashes continues the line
        let trailing = trimmed.chars().rev().take_while(|c| *c == '\\').count();
        let continues = trailing % 2 == 1;
        let content = if continues {
            &trimmed[..trimmed.len() - 1]
        } else {
            trimmed
        };

        let entry = pending.get_or_insert_with(|| (idx + 1, String::new()));
        entry.1.push_str(content);

        if !continues {
            if let Some(done) = pending.take() {
                lines.push(done);
            }
        }
    }
    if let Some(done) = pending.take() {
        lines.push(done);
    }
    lines
}

/// Split a logical line into its unescaped key and value
fn split_entry(line: &str) -> Result<(String, String), String> {
    let mut chars = line.chars().peekable();
    let mut key = String::new();
    loop {
        match chars.next() {
            None => return Ok((key, String::new())),
            Some('\\') => key.push(unescape(&mut chars)?),
            Some('=' | ':') => break,
            Some(c) if c.is_whitespace() => {
                skip_whitespace(&mut chars);
                if matches!(chars.peek(), Some('=' | ':')) {
                    chars.next();
                }
                break;
            }
            Some(c) => key.push(c),
        }
    }

    skip_whitespace(&mut chars);
    let mut value = String::new();
    while let Some(c) = chars.next() {
        match c {
            '\\' => value.push(unescape(&mut chars)?),
            c => value.push(c),
        }
    }
    Ok((key, value))
}

fn skip_whitespace(chars: &mut Peekable<Chars<'_>>) {
    while chars.next_if(|c| c.is_whitespace()).is_some() {}
}

/// Decode the character following a backslash
fn unescape(chars: &mut Peekable<Chars<'_>>) -> Result<char, String> {
    match chars.next() {
        Some('t') => Ok('\t'),
        Some('n') => Ok('\n'),
        Some('r') => Ok('\r'),
        Some('f') => Ok('\u{c}'),
        Some('u') => {
            let hex: String = chars.by_ref().take(4).collect();
            if hex.len() != 4 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
                return Err(format!("malformed \\u escape `\\u{hex}`"));
            }
            u32::from_str_radix(&hex, 16)
                .ok()
                .and_then(char::from_u32)
                .ok_or_else(|| format!("`\\u{hex}` is not a character"))
        }
        Some(other) => Ok(other),
        None => Err("dangling backslash".to_string()),
    }
}

fn insert_nested(root: &mut Dict, key: &str, value: String) -> Result<(), String> {
    let segments: Vec<&str> = key.split('.').collect();
    if segments.iter().any(|segment| segment.is_empty()) {
        return Err(format!("invalid key `{key}`"));
    }
    let Some((last, parents)) = segments.split_last() else {
        return Err(format!("invalid key `{key}`"));
    };

    let mut current = root;
    for segment in parents {
        let entry = current
            .entry((*segment).to_string())
            .or_insert_with(|| Value::from(Dict::new()));
        current = match entry {
            Value::Dict(_, dict) => dict,
            _ => return Err(format!("`{key}` conflicts with a scalar at `{segment}`")),
        };
    }

    if matches!(current.get(*last), Some(Value::Dict(..))) {
        return Err(format!("`{key}` conflicts with a nested table"));
    }
    current.insert((*last).to_string(), Value::from(value));
    Ok(())
}
