//! Credentials: access tokens, refresh credentials and one-time stream tickets.
//!
//! None of these types print their secret through `Debug`; tickets show a
//! masked prefix/suffix so log lines can still be correlated.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::fmt;

/// Shortest ticket the client will try to connect with
pub const MIN_TICKET_LEN: usize = 10;

/// Short-lived bearer token for REST calls and ticket exchange.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct AccessToken(String);

impl AccessToken {
    /// Wrap a token; blank input yields `None`
    pub fn new(value: impl Into<String>) -> Option<Self> {
        let value = value.into();
        if value.trim().is_empty() {
            None
        } else {
            Some(Self(value))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `Authorization` header value
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.0)
    }

    /// Expiry from the `exp` claim, if this token is a JWT that carries one
    pub fn jwt_expiry(&self) -> Option<DateTime<Utc>> {
        #[derive(Deserialize)]
        struct Claims {
            exp: Option<i64>,
        }

        let mut parts = self.0.split('.');
        let (_header, payload, _signature) = (parts.next()?, parts.next()?, parts.next()?);
        if parts.next().is_some() {
            return None;
        }
        let decoded = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
        let claims: Claims = serde_json::from_slice(&decoded).ok()?;
        DateTime::from_timestamp(claims.exp?, 0)
    }

    /// A token is usable unless it is a JWT whose `exp` has passed.
    ///
    /// Tokens with no readable `exp` count as usable: opaque tokens, and JWTs
    /// that omit the claim. The server is the authority for those, and a dead
    /// one is refused at ticket exchange.
    pub fn is_usable_at(&self, now: DateTime<Utc>) -> bool {
        self.jwt_expiry().map_or(true, |exp| exp > now)
    }

    pub fn is_usable(&self) -> bool {
        self.is_usable_at(Utc::now())
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessToken(<redacted>)")
    }
}

/// Long-lived credential used only to renew the access token.
#[derive(Clone, PartialEq, Eq)]
pub struct RefreshCredential(String);

impl RefreshCredential {
    pub fn new(value: impl Into<String>) -> Option<Self> {
        let value = value.into();
        if value.trim().is_empty() {
            None
        } else {
            Some(Self(value))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for RefreshCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("RefreshCredential(<redacted>)")
    }
}

/// One-time, short-TTL credential for opening the event stream.
///
/// Not `Clone`: opening a transport consumes the ticket, so the type system
/// rules out reusing one across connection attempts.
#[derive(PartialEq, Eq)]
pub struct Ticket {
    value: String,
    issued_for: AccessToken,
    issued_at: DateTime<Utc>,
}

impl Ticket {
    /// Accept a ticket issued for `issued_for`, rejecting values too short to be real
    pub fn issue(value: impl Into<String>, issued_for: AccessToken) -> Result<Self, String> {
        let value = value.into().trim().to_string();
        if value.len() < MIN_TICKET_LEN {
            return Err(format!(
                "ticket must be at least {} characters, got {}",
                MIN_TICKET_LEN,
                value.len()
            ));
        }
        Ok(Self {
            value,
            issued_for,
            issued_at: Utc::now(),
        })
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn issued_for(&self) -> &AccessToken {
        &self.issued_for
    }

    pub fn issued_at(&self) -> DateTime<Utc> {
        self.issued_at
    }

    /// `abcdef...uvwxyz` form for logs
    pub fn masked(&self) -> String {
        mask(&self.value)
    }

    /// Hand over the raw value; the ticket is gone afterwards
    pub fn into_value(self) -> String {
        self.value
    }
}

impl fmt::Debug for Ticket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ticket")
            .field("value", &self.masked())
            .field("issued_at", &self.issued_at)
            .finish()
    }
}

fn mask(raw: &str) -> String {
    let chars: Vec<char> = raw.chars().collect();
    if chars.len() > 12 {
        let head: String = chars[..6].iter().collect();
        let tail: String = chars[chars.len() - 6..].iter().collect();
        format!("{head}...{tail}")
    } else {
        "***".to_string()
    }
}
