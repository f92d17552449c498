use serde::{Deserialize, Serialize};

/// The cached channel access token, persisted as `{access_token, expires_at}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialRecord {
    pub access_token: String,
    pub expires_at: i64, // UNIX TIMESTAMP
}

/// Freshness of the current credential slot, computed on every read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenState {
    Absent,
    Fresh,
    Stale,
}

impl CredentialRecord {
    pub fn new(access_token: String, expires_at: i64) -> Self {
        Self { access_token, expires_at }
    }

    /// Record for a token issued at `now` that lives `expires_in` seconds.
    /// `None` when the expiry does not fit an i64.
    pub fn issued_at(access_token: String, now: i64, expires_in: i64) -> Option<Self> {
        now.checked_add(expires_in).map(|expires_at| Self::new(access_token, expires_at))
    }

    /// Strict: at exactly `expires_at - safety_margin` the record is stale.
    pub fn is_fresh(&self, now: i64, safety_margin_seconds: u64) -> bool {
        let margin = i64::try_from(safety_margin_seconds).unwrap_or(i64::MAX);
        now < self.expires_at.saturating_sub(margin)
    }
}

impl TokenState {
    pub fn of(record: Option<&CredentialRecord>, now: i64, safety_margin_seconds: u64) -> Self {
        match record {
            None => TokenState::Absent,
            Some(r) if r.is_fresh(now, safety_margin_seconds) => TokenState::Fresh,
            Some(_) => TokenState::Stale,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TokenState::Absent => "absent",
            TokenState::Fresh => "fresh",
            TokenState::Stale => "stale",
        }
    }
}
