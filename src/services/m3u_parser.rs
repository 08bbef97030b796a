use lazy_static::lazy_static;
use regex::Regex;
use url::Url;

use crate::models::RawEntry;

/// Header line of every M3U we write
pub const M3U_HEADER: &str = "#EXTM3U";

/// Marker of an extended info line
pub const EXTINF_MARKER: &str = "#EXTINF";

/// Attribute carrying the category in playlist clients
pub const GROUP_ATTRIBUTE: &str = "group-title";

lazy_static! {
    /// Regex to normalize multiple whitespaces into single space
    static ref MULTI_SPACE_REGEX: Regex = Regex::new(r"\s{2,}").unwrap();
    /// One EXTINF attribute at the start of the remaining header:
    /// key="value", key='value' or key=value
    static ref ATTR_REGEX: Regex =
        Regex::new(r#"^(\w+(?:[-.]\w+)*)=(?:"([^"]*)"|'([^']*)'|([^\s"']*))"#).unwrap();
}

/// Parse raw playlist text into (EXTINF line, stream URL) pairs
///
/// Only the line right after an EXTINF line is inspected. If it is not an
/// absolute URL the EXTINF line is dropped without error.
pub fn parse(raw: &str) -> Vec<RawEntry> {
    let lines: Vec<&str> = raw.lines().map(str::trim).collect();

    lines
        .windows(2)
        .filter(|pair| pair[0].starts_with(EXTINF_MARKER) && is_stream_url(pair[1]))
        .map(|pair| RawEntry::new(pair[0], pair[1]))
        .collect()
}

/// Non-empty, absolute, and hierarchical (`scheme://host/...`)
pub fn is_stream_url(line: &str) -> bool {
    if line.is_empty() || line.starts_with('#') {
        return false;
    }

    match Url::parse(line) {
        Ok(url) => !url.cannot_be_a_base() && url.has_host(),
        Err(_) => false,
    }
}

/// Normalize text: trim and collapse multiple spaces into single space
pub fn normalize_text(text: &str) -> String {
    let trimmed = text.trim();
    MULTI_SPACE_REGEX.replace_all(trimmed, " ").to_string()
}

/// How an attribute value was quoted in the source line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Quote {
    Double,
    Single,
    Unquoted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum HeaderToken {
    /// Duration or any token that is not an attribute
    Bare(String),
    Attribute {
        key: String,
        value: String,
        quote: Quote,
    },
}

/// Structured view of an EXTINF line
///
/// Format: `#EXTINF:duration key="value" ...,Display Name`
///
/// Attributes keep their order and original quoting. Whitespace between
/// header tokens is normalized to one space when the line is written back;
/// the display name is written back byte for byte.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtinfLine {
    tokens: Vec<HeaderToken>,
    title: Option<String>,
}

impl ExtinfLine {
    pub fn parse(line: &str) -> Option<Self> {
        let rest = line.trim().strip_prefix(EXTINF_MARKER)?;
        let content = rest.strip_prefix(':').unwrap_or(rest);

        let (header, title) = match split_title(content) {
            Some(idx) => (&content[..idx], Some(content[idx + 1..].to_string())),
            None => (content, None),
        };

        Some(Self {
            tokens: tokenize_header(header),
            title,
        })
    }

    /// Human readable name after the separating comma, normalized
    pub fn display_name(&self) -> String {
        self.title.as_deref().map(normalize_text).unwrap_or_default()
    }

    /// Set `key` so that it occurs exactly once
    ///
    /// An existing attribute, however it was quoted, is replaced in place
    /// with a double-quoted value and any further copies are removed. A
    /// missing attribute is inserted right after the duration.
    pub fn set_attribute(&mut self, key: &str, value: &str) {
        let mut replaced = false;

        self.tokens.retain_mut(|t| match t {
            HeaderToken::Attribute {
                key: k,
                value: v,
                quote,
            } if k.eq_ignore_ascii_case(key) => {
                if replaced {
                    false
                } else {
                    *v = value.to_string();
                    *quote = Quote::Double;
                    replaced = true;
                    true
                }
            }
            _ => true,
        });

        if !replaced {
            let at = match self.tokens.first() {
                Some(HeaderToken::Bare(_)) => 1,
                _ => 0,
            };
            self.tokens.insert(
                at,
                HeaderToken::Attribute {
                    key: key.to_string(),
                    value: value.to_string(),
                    quote: Quote::Double,
                },
            );
        }
    }

    pub fn to_line(&self) -> String {
        let header: Vec<String> = self
            .tokens
            .iter()
            .map(|t| match t {
                HeaderToken::Bare(s) => s.clone(),
                HeaderToken::Attribute { key, value, quote } => match quote {
                    Quote::Double => format!("{}=\"{}\"", key, value),
                    Quote::Single => format!("{}='{}'", key, value),
                    Quote::Unquoted => format!("{}={}", key, value),
                },
            })
            .collect();

        let mut line = format!("{}:{}", EXTINF_MARKER, header.join(" "));
        if let Some(title) = &self.title {
            line.push(',');
            line.push_str(title);
        }
        line
    }
}

/// Index of the comma separating header from title
///
/// Commas inside single or double quoted attribute values do not count.
/// With unbalanced quotes the first comma is used.
fn split_title(content: &str) -> Option<usize> {
    let mut open_quote: Option<char> = None;
    for (idx, ch) in content.char_indices() {
        match (ch, open_quote) {
            ('"' | '\'', None) => open_quote = Some(ch),
            (c, Some(q)) if c == q => open_quote = None,
            (',', None) => return Some(idx),
            _ => {}
        }
    }
    content.find(',')
}

fn tokenize_header(header: &str) -> Vec<HeaderToken> {
    let mut tokens = Vec::new();
    let mut rest = header.trim_start();

    while !rest.is_empty() {
        // An attribute must end at whitespace; `key="unterminated` stays bare
        let attribute = ATTR_REGEX.captures(rest).filter(|caps| {
            rest[caps[0].len()..]
                .chars()
                .next()
                .map_or(true, char::is_whitespace)
        });

        if let Some(caps) = attribute {
            let (value, quote) = match (caps.get(2), caps.get(3), caps.get(4)) {
                (Some(v), _, _) => (v.as_str(), Quote::Double),
                (_, Some(v), _) => (v.as_str(), Quote::Single),
                (_, _, v) => (v.map_or("", |m| m.as_str()), Quote::Unquoted),
            };
            tokens.push(HeaderToken::Attribute {
                key: caps[1].to_string(),
                value: value.to_string(),
                quote,
            });
            rest = &rest[caps[0].len()..];
        } else {
            let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
            tokens.push(HeaderToken::Bare(rest[..end].to_string()));
            rest = &rest[end..];
        }
        rest = rest.trim_start();
    }

    tokens
}
