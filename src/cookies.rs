//! Cookie records set by modules during render
//!
//! Modules do not write cookies directly. They describe the cookie with a
//! [`Cookie`] and the render unit replays it in the browser as a
//! `document.cookie` assignment.

use chrono::{DateTime, Duration, Utc};
use indexmap::IndexMap;

use crate::error::{Error, Result};

/// A cookie a module asked to set
#[derive(Debug, Clone, PartialEq)]
pub struct Cookie {
    pub key: String,
    pub value: String,
    /// Lifetime in seconds
    pub max_age: Option<i64>,
    pub expire: Option<DateTime<Utc>>,
    pub domain: Option<String>,
    pub path: Option<String>,
    pub secure: bool,
    pub http_only: bool,
}

impl Cookie {
    /// Create a session cookie
    pub fn new<K: Into<String>, V: Into<String>>(key: K, value: V) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            max_age: None,
            expire: None,
            domain: None,
            path: None,
            secure: false,
            http_only: false,
        }
    }

    pub fn with_max_age(mut self, seconds: i64) -> Self {
        self.max_age = Some(seconds);
        self
    }

    pub fn with_expire(mut self, expire: DateTime<Utc>) -> Self {
        self.expire = Some(expire);
        self
    }

    pub fn with_domain<S: Into<String>>(mut self, domain: S) -> Self {
        self.domain = Some(domain.into());
        self
    }

    pub fn with_path<S: Into<String>>(mut self, path: S) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    pub fn with_http_only(mut self, http_only: bool) -> Self {
        self.http_only = http_only;
        self
    }

    /// Check that the key and value can be written as a cookie string
    pub fn validate(&self) -> Result<()> {
        if self.key.is_empty() {
            return Err(Error::cookie_static("cookie key must not be empty"));
        }
        if self
            .key
            .chars()
            .any(|c| c == '=' || c == ';' || c.is_whitespace() || c.is_control())
        {
            return Err(Error::cookie_owned(format!(
                "cookie key '{}' contains a reserved character",
                self.key
            )));
        }
        if self.value.contains(';') || self.value.chars().any(char::is_control) {
            return Err(Error::cookie_owned(format!(
                "value of cookie '{}' contains a reserved character",
                self.key
            )));
        }
        Ok(())
    }

    /// Serialize as a `document.cookie` setup string
    ///
    /// When only a max age is given, the expiry date is derived from it.
    pub fn to_cookie_string(&self) -> String {
        let mut cookie = format!("{}={}", self.key, self.value);

        if let Some(max_age) = self.max_age {
            cookie.push_str(&format!("; max-age={}", max_age));
        }

        let expire = self.expire.or_else(|| {
            self.max_age
                .and_then(Duration::try_seconds)
                .and_then(|age| Utc::now().checked_add_signed(age))
        });
        if let Some(expire) = expire {
            cookie.push_str("; expire=");
            cookie.push_str(&format_utc(&expire));
        }
        if let Some(ref path) = self.path {
            cookie.push_str("; path=");
            cookie.push_str(path);
        }
        if let Some(ref domain) = self.domain {
            cookie.push_str("; domain=");
            cookie.push_str(domain);
        }
        if self.secure {
            cookie.push_str("; secure");
        }
        if self.http_only {
            cookie.push_str("; HttpOnly");
        }
        cookie
    }
}

/// Format a date the way browsers print `Date.prototype.toUTCString`
pub fn format_utc(date: &DateTime<Utc>) -> String {
    date.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

/// Parse a `Cookie` request header into name/value pairs
///
/// Pairs without `=` are skipped, so a malformed header yields no cookies.
pub fn parse_cookie_header(header: &str) -> IndexMap<String, String> {
    header
        .split(';')
        .filter_map(|pair| {
            let (name, value) = pair.split_once('=')?;
            let name = name.trim();
            if name.is_empty() {
                return None;
            }
            Some((name.to_string(), value.trim().to_string()))
        })
        .collect()
}
