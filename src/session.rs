// src/session.rs
use axum::http::{header, HeaderMap};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use dashmap::DashMap;
use rand::RngCore;
use sha2::{Digest, Sha256};
use tracing::info;

use crate::error::AuthError;
use crate::types::SignalRecord;

pub const COOKIE_NAME: &str = "beacon_session";
pub const MAX_IDENTITY_LEN: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub identity: String,
}

/// Server-side session table. Cookies carry `<token>.<sig>`, the token keys the table.
pub struct SessionGate {
    secret: String,
    sessions: DashMap<String, Session>,
}

impl SessionGate {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            sessions: DashMap::new(),
        }
    }

    /// Returns the cookie value for the new session, or `None` for an unusable name.
    pub fn open(&self, identity: &str) -> Option<String> {
        let identity = identity.trim();
        if identity.is_empty() || identity.chars().count() > MAX_IDENTITY_LEN {
            return None;
        }
        let token = gen_token();
        self.sessions.insert(
            token.clone(),
            Session {
                identity: identity.to_string(),
            },
        );
        info!(identity, "session opened");
        Some(format!("{token}.{}", self.sign(&token)))
    }

    pub fn close(&self, headers: &HeaderMap) {
        if let Some(token) = self.verified_token(headers) {
            if let Some((_, s)) = self.sessions.remove(&token) {
                info!(identity = %s.identity, "session closed");
            }
        }
    }

    pub fn resolve(&self, headers: &HeaderMap) -> Option<Session> {
        let token = self.verified_token(headers)?;
        self.sessions.get(&token).map(|s| s.value().clone())
    }

    fn verified_token(&self, headers: &HeaderMap) -> Option<String> {
        let value = cookie_value(headers, COOKIE_NAME)?;
        let (token, sig) = value.rsplit_once('.')?;
        (self.sign(token) == sig).then(|| token.to_string())
    }

    fn sign(&self, token: &str) -> String {
        let mut h = Sha256::new();
        h.update(self.secret.as_bytes());
        h.update(b".");
        h.update(token.as_bytes());
        hex::encode(h.finalize())
    }
}

/// Server-asserted identity wins over whatever the client put in `user`.
pub fn attach_identity(mut record: SignalRecord, session: Option<&Session>) -> SignalRecord {
    if let Some(s) = session {
        record.user = Some(s.identity.clone());
    }
    record
}

pub fn require_session(session: Option<Session>) -> Result<Session, AuthError> {
    session.ok_or(AuthError::NoSession)
}

pub fn set_cookie(value: &str) -> String {
    format!("{COOKIE_NAME}={value}; Path=/; HttpOnly; SameSite=Lax")
}

pub fn clear_cookie() -> String {
    format!("{COOKIE_NAME}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0")
}

fn cookie_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(k, _)| *k == name)
        .map(|(_, v)| v)
}

fn gen_token() -> String {
    let mut b = [0u8; 24];
    rand::thread_rng().fill_bytes(&mut b);
    URL_SAFE_NO_PAD.encode(b)
}
