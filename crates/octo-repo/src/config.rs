//! A small reader for git's INI-style config files.
//!
//! Supports `[section]` and `[section "subsection"]` headers, `key = value`
//! lines, bare keys (boolean true), `#` and `;` comments, double-quoted
//! values with `\"`, `\\`, `\n` and `\t` escapes, and trailing-backslash
//! continuation lines. Includes are not followed.

use std::path::Path;

use crate::RepoError;

/// Parsed configuration. Later entries override earlier ones.
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Canonical `section[.subsection].key` to raw value (`None` for bare keys).
    entries: Vec<(String, Option<String>)>,
}

impl Config {
    /// Load `path`; a missing file is an empty config.
    pub fn load(path: &Path) -> Result<Self, RepoError> {
        match std::fs::read(path) {
            Ok(data) => Self::parse(&String::from_utf8_lossy(&data), path),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }

    pub fn parse(text: &str, origin: &Path) -> Result<Self, RepoError> {
        let mut entries = Vec::new();
        let mut section: Option<String> = None;
        let mut lines = text.lines().enumerate();

        while let Some((idx, raw)) = lines.next() {
            let bad = |reason: &str| RepoError::Config {
                path: origin.to_path_buf(),
                line: idx + 1,
                reason: reason.to_string(),
            };
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
                continue;
            }

            if let Some(rest) = line.strip_prefix('[') {
                let end = rest.find(']').ok_or_else(|| bad("unterminated section header"))?;
                section = Some(parse_section(&rest[..end]).ok_or_else(|| bad("bad section header"))?);
                let trailing = rest[end + 1..].trim();
                if !trailing.is_empty() && !trailing.starts_with('#') && !trailing.starts_with(';') {
                    return Err(bad("unexpected text after section header"));
                }
                continue;
            }

            let Some(section) = section.as_deref() else {
                return Err(bad("key outside of any section"));
            };

            let (key, value) = match line.find('=') {
                Some(eq) => (line[..eq].trim(), Some(line[eq + 1..].to_string())),
                None => (strip_comment(line).trim(), None),
            };
            if key.is_empty() || !key.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
                return Err(bad("invalid key name"));
            }

            let value = match value {
                None => None,
                Some(mut v) => {
                    // Continuation lines end in an unescaped backslash.
                    while v.trim_end().ends_with('\\') && !v.trim_end().ends_with("\\\\") {
                        let trimmed = v.trim_end();
                        v = trimmed[..trimmed.len() - 1].to_string();
                        match lines.next() {
                            Some((_, next)) => v.push_str(next),
                            None => break,
                        }
                    }
                    Some(parse_value(&v).ok_or_else(|| bad("unterminated quoted value"))?)
                }
            };
            entries.push((format!("{section}.{}", key.to_ascii_lowercase()), value));
        }
        Ok(Self { entries })
    }

    fn lookup(&self, key: &str) -> Option<&Option<String>> {
        let key = canonical_key(key);
        self.entries
            .iter()
            .rev()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v)
    }

    /// Last value for `key`. Bare keys read as the empty string.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.lookup(key).map(|v| v.as_deref().unwrap_or(""))
    }

    /// Boolean value for `key`, using git's spellings.
    pub fn get_bool(&self, key: &str) -> Result<Option<bool>, RepoError> {
        let Some(value) = self.lookup(key) else {
            return Ok(None);
        };
        let Some(value) = value.as_deref() else {
            return Ok(Some(true));
        };
        let v = value.trim().to_ascii_lowercase();
        match v.as_str() {
            "true" | "yes" | "on" => Ok(Some(true)),
            "false" | "no" | "off" | "" => Ok(Some(false)),
            other => other
                .parse::<i64>()
                .map(|n| Some(n != 0))
                .map_err(|_| RepoError::InvalidBool {
                    key: key.to_string(),
                    value: value.to_string(),
                }),
        }
    }

    pub fn get_bool_or(&self, key: &str, default: bool) -> Result<bool, RepoError> {
        Ok(self.get_bool(key)?.unwrap_or(default))
    }
}

/// Section and key names are case-insensitive, subsections are not.
fn canonical_key(key: &str) -> String {
    let (Some(first), Some(last)) = (key.find('.'), key.rfind('.')) else {
        return key.to_ascii_lowercase();
    };
    let section = key[..first].to_ascii_lowercase();
    let name = key[last + 1..].to_ascii_lowercase();
    if first == last {
        format!("{section}.{name}")
    } else {
        format!("{section}.{}.{name}", &key[first + 1..last])
    }
}

fn parse_section(header: &str) -> Option<String> {
    let header = header.trim();
    match header.find(char::is_whitespace) {
        None => {
            // Legacy `[section.sub]` form lowercases everything.
            let ok = header
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.');
            (ok && !header.is_empty()).then(|| header.to_ascii_lowercase())
        }
        Some(space) => {
            let name = &header[..space];
            let sub = header[space..].trim();
            let sub = sub.strip_prefix('"')?.strip_suffix('"')?;
            let sub = sub.replace("\\\"", "\"").replace("\\\\", "\\");
            Some(format!("{}.{}", name.to_ascii_lowercase(), sub))
        }
    }
}

fn strip_comment(s: &str) -> &str {
    match s.find(['#', ';']) {
        Some(i) => &s[..i],
        None => s,
    }
}

/// Unquote and unescape a raw value, dropping trailing comments.
fn parse_value(raw: &str) -> Option<String> {
    let mut out = String::new();
    let mut quoted = false;
    let mut pending_space = String::new();
    let mut chars = raw.trim_start().chars();

    while let Some(c) = chars.next() {
        match c {
            '"' => {
                out.push_str(&pending_space);
                pending_space.clear();
                quoted = !quoted;
            }
            '#' | ';' if !quoted => break,
            '\\' => {
                out.push_str(&pending_space);
                pending_space.clear();
                match chars.next()? {
                    'n' => out.push('\n'),
                    't' => out.push('\t'),
                    'b' => {
                        out.pop();
                    }
                    other => out.push(other),
                }
            }
            c if c.is_whitespace() && !quoted => pending_space.push(c),
            c => {
                out.push_str(&pending_space);
                pending_space.clear();
                out.push(c);
            }
        }
    }
    (!quoted).then_some(out)
}
