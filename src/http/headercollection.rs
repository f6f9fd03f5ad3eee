//! Ordered, multi-valued header storage.
//!
//! Names keep the case they were given for serialization; every lookup
//! compares names ASCII case-insensitively. `Set-Cookie` entries are never
//! merged because each cookie must stay independently addressable.

use crate::base::neterror::NetError;
use std::fmt::Write;

const SET_COOKIE: &str = "Set-Cookie";

/// A header map that preserves insertion order for serialization.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderCollection {
    entries: Vec<(String, String)>,
}

impl HeaderCollection {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Set a header.
    ///
    /// With `replace` the first existing entry's value is overwritten and any
    /// further entries of the same name are dropped. Without it the new value
    /// is comma-joined onto the existing one (`"old, new"`). `Set-Cookie` is
    /// always stored as a separate entry, whatever `replace` says.
    pub fn set(&mut self, name: &str, value: &str, replace: bool) -> Result<(), NetError> {
        validate_name(name)?;
        validate_value(value)?;
        let value = value.trim();

        if name.eq_ignore_ascii_case(SET_COOKIE) {
            self.entries.push((name.to_string(), value.to_string()));
            return Ok(());
        }

        match self.position(name) {
            Some(idx) if replace => {
                self.entries[idx].1 = value.to_string();
                let mut seen = 0usize;
                self.entries.retain(|(n, _)| {
                    if n.eq_ignore_ascii_case(name) {
                        seen += 1;
                        seen == 1
                    } else {
                        true
                    }
                });
            }
            Some(idx) => {
                let existing = &mut self.entries[idx].1;
                if existing.is_empty() {
                    existing.push_str(value);
                } else if !value.is_empty() {
                    existing.push_str(", ");
                    existing.push_str(value);
                }
            }
            None => self.entries.push((name.to_string(), value.to_string())),
        }
        Ok(())
    }

    /// Append a new entry without looking at existing ones.
    pub fn add(&mut self, name: &str, value: &str) -> Result<(), NetError> {
        validate_name(name)?;
        validate_value(value)?;
        self.entries.push((name.to_string(), value.trim().to_string()));
        Ok(())
    }

    /// First value stored under `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Every value stored under `name`, in insertion order.
    pub fn get_all(&self, name: &str) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
            .collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    pub fn remove(&mut self, name: &str) {
        self.entries.retain(|(n, _)| !n.eq_ignore_ascii_case(name));
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    /// Whether a comma-separated header value contains `token`.
    pub fn has_token(&self, name: &str, token: &str) -> bool {
        self.get_all(name)
            .iter()
            .flat_map(|v| v.split(','))
            .any(|t| t.trim().eq_ignore_ascii_case(token))
    }

    /// Write every entry as `Name: value\r\n`. The caller appends the
    /// terminating blank line.
    pub fn write_to(&self, out: &mut String) {
        for (name, value) in &self.entries {
            // Writing into a String cannot fail.
            let _ = write!(out, "{}: {}\r\n", name, value);
        }
    }

    /// Parse the header lines of a response head (status line excluded).
    ///
    /// Lines starting with SP/HT continue the previous header (obs-fold).
    /// Repeated names are merged with [`set`](Self::set) semantics, except
    /// challenge headers, which stay one entry per line because a challenge
    /// list cannot be split back apart on commas.
    pub fn parse_block(block: &str) -> Result<Self, NetError> {
        let mut lines: Vec<(String, String)> = Vec::new();
        for line in block.split('\n') {
            let line = line.strip_suffix('\r').unwrap_or(line);
            if line.is_empty() {
                continue;
            }
            if line.starts_with(' ') || line.starts_with('\t') {
                let (_, value) = lines.last_mut().ok_or(NetError::InvalidResponse)?;
                value.push(' ');
                value.push_str(line.trim());
                continue;
            }
            let (name, value) = line.split_once(':').ok_or(NetError::InvalidResponse)?;
            let name = name.trim_end();
            if name.is_empty() || !name.bytes().all(is_token_byte) {
                return Err(NetError::InvalidResponse);
            }
            lines.push((name.to_string(), value.trim().to_string()));
        }

        let mut headers = Self::new();
        for (name, value) in lines {
            let stored = if is_challenge_header(&name) {
                headers.add(&name, &value)
            } else {
                headers.set(&name, &value, false)
            };
            stored.map_err(|_| NetError::InvalidResponse)?;
        }
        Ok(headers)
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.entries
            .iter()
            .position(|(n, _)| n.eq_ignore_ascii_case(name))
    }
}

fn is_challenge_header(name: &str) -> bool {
    name.eq_ignore_ascii_case("WWW-Authenticate") || name.eq_ignore_ascii_case("Proxy-Authenticate")
}

fn is_token_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&b)
}

fn validate_name(name: &str) -> Result<(), NetError> {
    if name.is_empty() || !name.bytes().all(is_token_byte) {
        return Err(NetError::InvalidHeader);
    }
    Ok(())
}

fn validate_value(value: &str) -> Result<(), NetError> {
    if value.bytes().any(|b| b == b'\r' || b == b'\n' || b == 0) {
        return Err(NetError::InvalidHeader);
    }
    Ok(())
}
