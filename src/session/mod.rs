//! Session cookie lookup.
//!
//! The identity service's browser helpers store the session under a cookie
//! named `<prefix><suffix>` (for example `sb-abcd-auth-token`). Large sessions
//! are split into fragments `<prefix><suffix>.0`, `<prefix><suffix>.1`, ...
//! which have to be concatenated in index order before the value is decoded.

use std::collections::BTreeMap;

use axum::http::{header, HeaderMap};
use base64::{
    engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD},
    Engine as _,
};
use cookie::Cookie;
use serde_json::Value;

const BASE64_PREFIX: &str = "base64-";

/// Reassembled session cookie value, not yet decoded
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawSessionToken(String);

impl RawSessionToken {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Extract the bearer access token.
    ///
    /// Accepts a JSON object with `access_token`, a JSON array whose first
    /// element is the token (or an object carrying it), or a JSON string.
    /// Values prefixed with `base64-` are decoded first. Anything that does
    /// not parse is used verbatim, after base64 decoding when that applied.
    pub fn access_token(&self) -> String {
        let decoded = decode_base64_value(&self.0);
        let text = decoded.as_deref().unwrap_or(&self.0);

        serde_json::from_str::<Value>(text)
            .ok()
            .and_then(|value| token_from_json(&value))
            .unwrap_or_else(|| text.to_string())
    }
}

fn decode_base64_value(raw: &str) -> Option<String> {
    let encoded = raw.strip_prefix(BASE64_PREFIX)?;
    let bytes = URL_SAFE_NO_PAD
        .decode(encoded.trim_end_matches('='))
        .or_else(|_| STANDARD.decode(encoded))
        .ok()?;
    String::from_utf8(bytes).ok()
}

fn token_from_json(value: &Value) -> Option<String> {
    let token = match value {
        Value::Object(map) => map.get("access_token")?.as_str()?,
        Value::Array(items) => match items.first()? {
            Value::String(token) => token.as_str(),
            Value::Object(map) => map.get("access_token")?.as_str()?,
            _ => return None,
        },
        Value::String(token) => token.as_str(),
        _ => return None,
    };

    (!token.is_empty()).then(|| token.to_string())
}

/// Collect `(name, value)` pairs from every `Cookie` header on the request
pub fn request_cookies(headers: &HeaderMap) -> Vec<(String, String)> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| Cookie::split_parse_encoded(value))
        .filter_map(|cookie| cookie.ok())
        .map(|cookie| (cookie.name().to_string(), cookie.value().to_string()))
        .collect()
}

/// Locate the session cookie, reassembling fragments when it was split
pub fn find_session(cookies: &[(String, String)], suffix: &str) -> Option<RawSessionToken> {
    if suffix.is_empty() {
        return None;
    }

    // Unsplit cookie wins
    if let Some((_, value)) = cookies
        .iter()
        .find(|(name, value)| name.ends_with(suffix) && !value.is_empty())
    {
        return Some(RawSessionToken::new(value.clone()));
    }

    // Fragments grouped by everything up to and including the suffix
    let mut groups: BTreeMap<&str, Vec<(u64, &str)>> = BTreeMap::new();
    for (name, value) in cookies {
        if value.is_empty() {
            continue;
        }
        if let Some((prefix, index)) = fragment_name(name, suffix) {
            groups.entry(prefix).or_default().push((index, value.as_str()));
        }
    }

    let (_, mut fragments) = groups.into_iter().next()?;
    // Numeric order keeps `.10` after `.9`
    fragments.sort_by_key(|(index, _)| *index);

    let joined: String = fragments.into_iter().map(|(_, value)| value).collect();
    Some(RawSessionToken::new(joined))
}

/// Split `<prefix><suffix>.<digits>` into the group prefix and the index.
/// Any other tail after the suffix (such as `-code-verifier`) is not a fragment.
fn fragment_name<'a>(name: &'a str, suffix: &str) -> Option<(&'a str, u64)> {
    let (group, index) = name.rsplit_once('.')?;
    if !group.ends_with(suffix) || index.is_empty() || !index.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some((group, index.parse().ok()?))
}
