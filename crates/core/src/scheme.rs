use std::fmt;

use serde::{Deserialize, Serialize};

const PROTOCOL_SEP: &str = "://";
const LOCAL_FALLBACK: &str = "/";

/// Registry key: `"<protocol>://"` for networked stores, `"/"` for the local fallback.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SchemeKey(String);

impl SchemeKey {
    pub fn protocol(protocol: &str) -> Self {
        Self(format!("{protocol}{PROTOCOL_SEP}"))
    }

    pub fn local() -> Self {
        Self(LOCAL_FALLBACK.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SchemeKey {
    /// Accepts either a full key (`"s3://"`, `"/"`) or a bare protocol (`"s3"`).
    fn from(value: &str) -> Self {
        if value == LOCAL_FALLBACK || value.ends_with(PROTOCOL_SEP) {
            Self(value.to_string())
        } else {
            Self::protocol(value)
        }
    }
}

impl fmt::Display for SchemeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// What kind of location a path string names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme<'a> {
    /// `<protocol>://...`
    Protocol(&'a str),
    /// Scheme-less absolute path.
    LocalRoot,
    /// Relative or otherwise unrecognized path.
    Unqualified,
}

impl<'a> Scheme<'a> {
    pub fn parse(path: &'a str) -> Self {
        match path.split_once(PROTOCOL_SEP) {
            Some((protocol, _)) if is_protocol(protocol) => Scheme::Protocol(protocol),
            _ if path.starts_with(LOCAL_FALLBACK) => Scheme::LocalRoot,
            _ => Scheme::Unqualified,
        }
    }

    pub fn key(&self) -> Option<SchemeKey> {
        match self {
            Scheme::Protocol(protocol) => Some(SchemeKey::protocol(protocol)),
            Scheme::LocalRoot => Some(SchemeKey::local()),
            Scheme::Unqualified => None,
        }
    }

    /// True for any protocol other than `file`.
    pub fn is_remote(&self) -> bool {
        matches!(self, Scheme::Protocol(protocol) if *protocol != "file")
    }
}

// RFC 3986 scheme characters; keeps "a/b://c" from parsing as protocol "a/b".
fn is_protocol(candidate: &str) -> bool {
    let mut chars = candidate.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

/// Splits `<protocol>://rest` into `(Some(protocol), rest)`.
pub fn split_protocol(path: &str) -> (Option<&str>, &str) {
    match Scheme::parse(path) {
        Scheme::Protocol(protocol) => {
            (Some(protocol), &path[protocol.len() + PROTOCOL_SEP.len()..])
        }
        _ => (None, path),
    }
}
