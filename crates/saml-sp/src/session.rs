use crate::principal::Principal;
use crate::state::AppState;
use axum::extract::FromRequestParts;
use axum::http::header::{COOKIE, SET_COOKIE};
use axum::http::request::Parts;
use axum::http::{HeaderMap, HeaderValue};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

type HmacSha256 = Hmac<Sha256>;

pub const SESSION_COOKIE_NAME: &str = "portal_session";

const CLEANUP_INTERVAL: Duration = Duration::from_secs(5 * 60);

struct SessionRecord {
    principal: Principal,
    created_at: DateTime<Utc>,
}

/// In-memory sessions for authenticated principals. The cookie carries a
/// random session ID plus an HMAC over it, so forged or altered tokens are
/// rejected before the map is consulted.
#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<DashMap<String, SessionRecord>>,
    secret: Arc<[u8]>,
    ttl: Duration,
    secure: bool,
}

impl SessionManager {
    pub fn new(secret: &[u8], ttl: Duration, secure: bool) -> Self {
        Self {
            inner: Arc::new(DashMap::new()),
            secret: Arc::from(secret),
            ttl,
            secure,
        }
    }

    /// Stores `principal` and returns the signed token for the cookie.
    pub fn create(&self, principal: Principal) -> String {
        let id = uuid::Uuid::new_v4().to_string();
        let token = format!("{id}.{}", self.sign(&id));
        self.inner.insert(
            id,
            SessionRecord {
                principal,
                created_at: Utc::now(),
            },
        );
        token
    }

    pub fn get(&self, token: &str) -> Option<Principal> {
        let id = self.verify(token)?;
        let entry = self.inner.get(id)?;
        if self.is_expired(&entry, Utc::now()) {
            drop(entry);
            self.inner.remove(id);
            return None;
        }
        Some(entry.principal.clone())
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.inner.len()
    }

    /// `Set-Cookie` value carrying `token`.
    pub fn cookie(&self, token: &str) -> String {
        let secure_flag = if self.secure { "; Secure" } else { "" };
        format!(
            "{SESSION_COOKIE_NAME}={token}; HttpOnly{secure_flag}; SameSite=Lax; Path=/; Max-Age={}",
            self.ttl.as_secs()
        )
    }

    pub fn set_cookie(&self, headers: &mut HeaderMap, token: &str) {
        if let Ok(value) = HeaderValue::from_str(&self.cookie(token)) {
            headers.insert(SET_COOKIE, value);
        }
    }

    fn sign(&self, id: &str) -> String {
        let mut mac =
            HmacSha256::new_from_slice(&self.secret).expect("HMAC can take key of any size");
        mac.update(id.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    fn verify<'a>(&self, token: &'a str) -> Option<&'a str> {
        use subtle::ConstantTimeEq;

        let (id, signature) = token.split_once('.')?;
        let expected = self.sign(id);
        if bool::from(expected.as_bytes().ct_eq(signature.as_bytes())) {
            Some(id)
        } else {
            None
        }
    }

    fn is_expired(&self, record: &SessionRecord, now: DateTime<Utc>) -> bool {
        let elapsed = now
            .signed_duration_since(record.created_at)
            .to_std()
            .unwrap_or(Duration::ZERO);
        elapsed > self.ttl
    }

    fn cleanup_expired(&self) -> usize {
        let before = self.inner.len();
        let now = Utc::now();
        self.inner.retain(|_, record| !self.is_expired(record, now));
        before.saturating_sub(self.inner.len())
    }
}

/// Reads the session token from a `Cookie` header, if present.
pub fn extract_session_cookie(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|cookies| cookies.split(';'))
        .find_map(|part| {
            let (name, value) = part.trim().split_once('=')?;
            (name == SESSION_COOKIE_NAME).then(|| value.trim().to_string())
        })
}

pub async fn session_cleanup_task(store: SessionManager) {
    let mut interval = tokio::time::interval(CLEANUP_INTERVAL);
    loop {
        interval.tick().await;
        let removed = store.cleanup_expired();
        if removed > 0 {
            tracing::info!(removed, "cleaned up expired sessions");
        }
    }
}

/// The principal of the request's live session, if it has one. Missing,
/// forged and expired cookies all read as "no session".
pub struct CurrentSession(pub Option<Principal>);

impl FromRequestParts<Arc<AppState>> for CurrentSession {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let principal =
            extract_session_cookie(&parts.headers).and_then(|token| state.sessions.get(&token));
        Ok(Self(principal))
    }
}
