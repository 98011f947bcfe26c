//! Caller identity.
//!
//! Login flows live outside this crate; they hand the browser a signed
//! `studio_session` cookie that [`CookieIdentity`] verifies on every request.

use std::fmt;

use axum::http::{HeaderMap, header};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use hmac::digest::InvalidLength;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

pub const SESSION_COOKIE: &str = "studio_session";

/// Stable user id issued by the login system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub i64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

pub trait IdentityResolver: Send + Sync {
    /// Returns the authenticated caller, if any.
    fn identify(&self, headers: &HeaderMap) -> Option<UserId>;
}

/// Verifies `<guid>.<base64url(hmac_sha256(key, guid))>` session cookies.
#[derive(Clone)]
pub struct CookieIdentity {
    mac: HmacSha256,
}

impl CookieIdentity {
    pub fn new(key: &[u8]) -> Result<Self, InvalidLength> {
        Ok(Self {
            mac: HmacSha256::new_from_slice(key)?,
        })
    }

    /// Cookie value for `user`, as the login system would issue it.
    pub fn session_value(&self, user: UserId) -> String {
        let guid = user.0.to_string();
        let mut mac = self.mac.clone();
        mac.update(guid.as_bytes());
        let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());
        format!("{guid}.{signature}")
    }

    /// Full `Cookie` header value carrying the session for `user`.
    pub fn cookie_header(&self, user: UserId) -> String {
        format!("{SESSION_COOKIE}={}", self.session_value(user))
    }

    fn verify(&self, value: &str) -> Option<UserId> {
        let (guid, signature) = value.split_once('.')?;
        let signature = URL_SAFE_NO_PAD.decode(signature).ok()?;

        let mut mac = self.mac.clone();
        mac.update(guid.as_bytes());
        mac.verify_slice(&signature).ok()?;

        guid.parse().ok().map(UserId)
    }
}

impl IdentityResolver for CookieIdentity {
    fn identify(&self, headers: &HeaderMap) -> Option<UserId> {
        headers
            .get_all(header::COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .flat_map(|raw| raw.split(';'))
            .filter_map(|pair| pair.trim().split_once('='))
            .filter(|(name, _)| *name == SESSION_COOKIE)
            .find_map(|(_, value)| self.verify(value))
    }
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    fn identity() -> CookieIdentity {
        CookieIdentity::new(b"0123456789abcdef").expect("key")
    }

    fn headers(cookie: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_str(cookie).expect("header"));
        headers
    }

    #[test]
    fn issued_cookie_round_trips() {
        let identity = identity();
        let cookie = format!("theme=dark; {}", identity.cookie_header(UserId(77)));
        assert_eq!(identity.identify(&headers(&cookie)), Some(UserId(77)));
    }

    #[test]
    fn tampered_guid_is_rejected() {
        let identity = identity();
        let value = identity.session_value(UserId(5));
        let (_, signature) = value.split_once('.').expect("dot");
        let forged = format!("{SESSION_COOKIE}=6.{signature}");
        assert_eq!(identity.identify(&headers(&forged)), None);
    }

    #[test]
    fn cookie_from_another_key_is_rejected() {
        let other = CookieIdentity::new(b"fedcba9876543210").expect("key");
        let cookie = other.cookie_header(UserId(5));
        assert_eq!(identity().identify(&headers(&cookie)), None);
    }

    #[test]
    fn missing_cookie_is_anonymous() {
        assert_eq!(identity().identify(&HeaderMap::new()), None);
    }
}
