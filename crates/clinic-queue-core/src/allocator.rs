//! Day-scoped token allocation.
//!
//! The atomic path asks the store to advance a per-day counter in one round
//! trip, which is the only way two receptionists registering at once get
//! distinct tokens. When that path keeps failing, the allocator falls back to
//! numbering from the locally cached queue:
//!
//! ```text
//! allocate_sequence(day) ──ok──▶ T{n}               (TokenSource::Atomic)
//!        │ err
//!        ▼  retry with doubling backoff
//! allocate_sequence(day) ──ok──▶ T{n}
//!        │ still failing
//!        ▼
//! cached visits on day + 1 ───▶ T{count + 1}        (TokenSource::Fallback)
//! ```
//!
//! Fallback tokens are NOT safe under concurrency. Two offline clients with
//! the same cached count hand out the same token. Every fallback is logged at
//! warn level and reported to the caller through [`TokenSource`].

use std::sync::Mutex;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::clock::DateKey;
use crate::config::ClinicConfig;
use crate::models::TokenNumber;
use crate::store::VisitStore;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("token allocation failed: {0}")]
    AllocationFailed(String),
}

/// Which path produced a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenSource {
    /// Store-side atomic counter
    Atomic,
    /// Offline numbering from the cached queue; may duplicate
    Fallback,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllocatedToken {
    pub token: TokenNumber,
    pub source: TokenSource,
}

/// Hands out the next token for a day.
#[derive(Debug, Clone)]
pub struct TokenAllocator {
    retry_attempts: u32,
    retry_backoff: Duration,
    fallback_enabled: bool,
}

impl Default for TokenAllocator {
    fn default() -> Self {
        Self::from_config(&ClinicConfig::default())
    }
}

impl TokenAllocator {
    pub fn from_config(config: &ClinicConfig) -> Self {
        Self {
            retry_attempts: config.token_retry_attempts(),
            retry_backoff: config.token_retry_backoff(),
            fallback_enabled: config.token_fallback_enabled(),
        }
    }

    /// Next token for `day`.
    ///
    /// `cached_on_day` is how many visits for `day` the caller's projection
    /// holds, or `None` if it has never loaded one; without it there is no
    /// basis for fallback numbering.
    pub fn next<S>(
        &self,
        store: &Mutex<S>,
        day: DateKey,
        cached_on_day: Option<usize>,
    ) -> Result<AllocatedToken, TokenError>
    where
        S: VisitStore + ?Sized,
    {
        let atomic_error = match self.allocate_atomic(store, day) {
            Ok(token) => {
                debug!(%day, %token, "allocated token from store sequence");
                return Ok(AllocatedToken {
                    token,
                    source: TokenSource::Atomic,
                });
            }
            Err(e) => e,
        };

        if !self.fallback_enabled {
            return Err(TokenError::AllocationFailed(format!(
                "{atomic_error}; offline numbering disabled"
            )));
        }

        let count = cached_on_day.ok_or_else(|| {
            TokenError::AllocationFailed(format!(
                "{atomic_error}; no cached queue to number from"
            ))
        })?;

        let token = fallback_token(count).ok_or_else(|| {
            TokenError::AllocationFailed(format!("{atomic_error}; cached queue too long"))
        })?;

        warn!(
            %day,
            %token,
            cached = count,
            error = %atomic_error,
            "token service unavailable, using offline numbering; duplicate tokens possible"
        );

        Ok(AllocatedToken {
            token,
            source: TokenSource::Fallback,
        })
    }

    /// Try the store counter, retrying with doubling backoff.
    fn allocate_atomic<S>(&self, store: &Mutex<S>, day: DateKey) -> Result<TokenNumber, String>
    where
        S: VisitStore + ?Sized,
    {
        let mut delay = self.retry_backoff;
        let mut last_error = String::new();

        for attempt in 0..=self.retry_attempts {
            if attempt > 0 {
                std::thread::sleep(delay);
                delay = delay.saturating_mul(2);
            }

            // Lock per attempt so backoff does not hold up other round trips
            let result = match store.lock() {
                Ok(mut guard) => guard.allocate_sequence(day).map_err(|e| e.to_string()),
                Err(_) => Err("store lock poisoned".to_string()),
            };

            match result {
                Ok(value) => {
                    return TokenNumber::from_sequence(value)
                        .ok_or_else(|| format!("store returned invalid sequence {value}"));
                }
                Err(e) => {
                    warn!(%day, attempt, error = %e, "atomic token allocation failed");
                    last_error = e;
                }
            }
        }

        Err(last_error)
    }
}

/// Offline token: one past the number of visits already cached for the day.
pub fn fallback_token(cached_on_day: usize) -> Option<TokenNumber> {
    u32::try_from(cached_on_day)
        .ok()
        .and_then(|n| n.checked_add(1))
        .and_then(TokenNumber::from_sequence)
}
