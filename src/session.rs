//! Per-client session identity.
//!
//! Each browser gets an opaque UUID on first generation request, carried in
//! a signed cookie and used only as the partition key for the audio store.
//! The cookie value is `<uuid>.<mac>` where the MAC is a keyed BLAKE3 hash
//! of the id; a tampered or foreign cookie simply fails verification and the
//! client is treated as new.
//!
//! The signing key comes from the `SESSION_SECRET` environment variable.
//! Without one, a random per-process key is used — sessions then survive
//! only as long as the process does.
//!
//! There is no server-side session table and therefore no expiry: the
//! cookie itself is the whole session record.

use axum::http::{header, HeaderMap, HeaderValue};
use uuid::Uuid;

pub const COOKIE_NAME: &str = "cb_session";

/// Keyed-MAC signer for session cookies.
pub struct SessionKey([u8; 32]);

impl SessionKey {
    /// Derive a key from a configured secret string.
    pub fn from_secret(secret: &str) -> Self {
        Self(blake3::derive_key(
            "chatterbox-web session cookie v1",
            secret.as_bytes(),
        ))
    }

    /// Random per-process key, used when no secret is configured.
    pub fn random() -> Self {
        Self(rand::random())
    }

    fn mac(&self, id: &str) -> blake3::Hash {
        blake3::keyed_hash(&self.0, id.as_bytes())
    }

    /// Cookie value for `id`: `<id>.<mac-hex>`.
    pub fn sign(&self, id: &str) -> String {
        format!("{}.{}", id, self.mac(id).to_hex())
    }

    /// Recover the session id from a cookie value, if its MAC checks out.
    pub fn verify(&self, cookie_value: &str) -> Option<String> {
        let (id, mac_hex) = cookie_value.split_once('.')?;
        let presented = blake3::Hash::from_hex(mac_hex).ok()?;
        // Hash equality is constant-time.
        (self.mac(id) == presented).then(|| id.to_string())
    }
}

/// Pull the verified session id out of the request's `Cookie` header.
pub fn session_from_headers(headers: &HeaderMap, key: &SessionKey) -> Option<String> {
    let raw = headers.get(header::COOKIE)?.to_str().ok()?;
    raw.split(';')
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == COOKIE_NAME)
        .and_then(|(_, value)| key.verify(value))
}

/// Mint a fresh session: returns the new id and the `Set-Cookie` value that
/// hands it to the client.
pub fn mint_session(key: &SessionKey) -> (String, HeaderValue) {
    let id = Uuid::new_v4().to_string();
    let header = set_cookie_value(key, &id);
    (id, header)
}

fn set_cookie_value(key: &SessionKey, id: &str) -> HeaderValue {
    let cookie = format!("{}={}; Path=/; HttpOnly; SameSite=Lax", COOKIE_NAME, key.sign(id));
    // UUIDs and hex MACs are always valid header text.
    HeaderValue::from_str(&cookie).expect("cookie value contains invalid header characters")
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
