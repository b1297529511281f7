use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::Mutex;

pub const OTP_TTL_MINUTES: i64 = 10;
pub const MAX_ATTEMPTS: u8 = 3;
pub const MAX_PENDING_CHALLENGES: usize = 10_000;

const PASS_TTL_MINUTES: i64 = 10;

#[derive(Debug, Clone)]
struct Challenge {
    code: String,
    expires_at: DateTime<Utc>,
    attempts: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyOutcome {
    Verified,
    NoChallenge,
    Expired,
    AttemptsExhausted,
    InvalidCode { attempts_left: u8 },
}

#[derive(Default)]
struct StoreInner {
    challenges: HashMap<String, Challenge>,
    passes: HashMap<String, DateTime<Utc>>,
}

/// In-memory challenge state, one record per email address. All mutation goes
/// through these methods; the mutex is held for each full read-check-mutate
/// sequence and never across an await point.
pub struct OtpStore {
    inner: Mutex<StoreInner>,
}

impl OtpStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(StoreInner::default()),
        }
    }

    /// Stores a fresh challenge for the address, unconditionally replacing
    /// any existing record and restarting the expiry window and attempt
    /// budget. Returns `false` when the store is at capacity even after
    /// reclaiming expired entries.
    pub fn begin_challenge(&self, email: &str, code: &str, now: DateTime<Utc>) -> bool {
        let mut inner = self.inner.lock().unwrap();
        if !inner.challenges.contains_key(email)
            && inner.challenges.len() >= MAX_PENDING_CHALLENGES
        {
            inner.challenges.retain(|_, challenge| now <= challenge.expires_at);
            if inner.challenges.len() >= MAX_PENDING_CHALLENGES {
                return false;
            }
        }
        inner.challenges.insert(
            email.to_owned(),
            Challenge {
                code: code.to_owned(),
                expires_at: now + Duration::minutes(OTP_TTL_MINUTES),
                attempts: 0,
            },
        );
        true
    }

    /// Exactly one outcome fires per call. A match, a detected expiry, and an
    /// exhausted attempt budget all delete the record; a mismatch increments
    /// the attempt counter and keeps it. A match also issues a verification
    /// pass consumable by [`OtpStore::consume_pass`].
    pub fn verify(&self, email: &str, code: &str, now: DateTime<Utc>) -> VerifyOutcome {
        let mut inner = self.inner.lock().unwrap();
        let inner = &mut *inner;
        let Some(challenge) = inner.challenges.get_mut(email) else {
            return VerifyOutcome::NoChallenge;
        };
        if now > challenge.expires_at {
            inner.challenges.remove(email);
            return VerifyOutcome::Expired;
        }
        if challenge.attempts >= MAX_ATTEMPTS {
            inner.challenges.remove(email);
            return VerifyOutcome::AttemptsExhausted;
        }
        if challenge.code != code {
            challenge.attempts += 1;
            return VerifyOutcome::InvalidCode {
                attempts_left: MAX_ATTEMPTS - challenge.attempts,
            };
        }
        inner.challenges.remove(email);
        inner
            .passes
            .insert(email.to_owned(), now + Duration::minutes(PASS_TTL_MINUTES));
        VerifyOutcome::Verified
    }

    /// Takes the verification pass for the address if one is live. Passes are
    /// single use; a consumed or expired pass requires a fresh OTP round.
    pub fn consume_pass(&self, email: &str, now: DateTime<Utc>) -> bool {
        let mut inner = self.inner.lock().unwrap();
        matches!(inner.passes.remove(email), Some(valid_until) if now <= valid_until)
    }

    /// Drops expired challenges and passes, returning how many were removed.
    pub fn sweep(&self, now: DateTime<Utc>) -> usize {
        let mut inner = self.inner.lock().unwrap();
        let before = inner.challenges.len() + inner.passes.len();
        inner.challenges.retain(|_, challenge| now <= challenge.expires_at);
        inner.passes.retain(|_, valid_until| now <= *valid_until);
        before - inner.challenges.len() - inner.passes.len()
    }

    /// Drops everything, returning how many entries were held.
    pub fn clear(&self) -> usize {
        let mut inner = self.inner.lock().unwrap();
        let count = inner.challenges.len() + inner.passes.len();
        inner.challenges.clear();
        inner.passes.clear();
        count
    }

    pub fn pending(&self) -> usize {
        self.inner.lock().unwrap().challenges.len()
    }
}

impl Default for OtpStore {
    fn default() -> Self {
        Self::new()
    }
}
