//! Authoritative in-memory projection of the visit table.
//!
//! Every mutation follows the same shape:
//!
//! ```text
//! validate ──▶ store round trip ──▶ refresh ──▶ install new snapshot
//!    │               │                  │
//!    └── error ──────┴──── error ───────┴──▶ previous snapshot stays
//! ```
//!
//! Readers take an `Arc<Snapshot>` and iterate it without holding any lock.
//! Refreshes are ticketed: the ticket is taken while the store is locked, so
//! ticket order is query order, and a refresh that finishes late never
//! installs older rows over newer ones.

mod snapshot;

pub use snapshot::Snapshot;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::allocator::{TokenAllocator, TokenError, TokenSource};
use crate::billing::{Charges, DailyBillingExport};
use crate::clock::{Clock, DateKey, SystemClock};
use crate::config::ClinicConfig;
use crate::db::{DbError, DbResult, VisitFilter};
use crate::identity::{IdentityProvider, StaticIdentity};
use crate::models::{
    Demographics, DemographicsError, NewVisit, QueueStats, Visit, VisitStatus,
};
use crate::store::VisitStore;
use crate::workflow::{Transition, TransitionError};

/// Errors surfaced to the Presentation Layer.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RepositoryError {
    #[error("token allocation failed: {0}")]
    TokenAllocationFailed(String),

    #[error("cannot {action} a visit that is {from}")]
    InvalidTransition {
        from: VisitStatus,
        action: &'static str,
    },

    #[error("prescription is required before completing a consultation")]
    EmptyPrescription,

    #[error("bill amount must be a non-negative number, got {0}")]
    InvalidAmount(f64),

    #[error("store sync failed: {0}")]
    SyncFailed(String),

    #[error("visit not found: {0}")]
    NotFound(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),
}

pub type RepoResult<T> = Result<T, RepositoryError>;

impl From<TransitionError> for RepositoryError {
    fn from(e: TransitionError) -> Self {
        match e {
            TransitionError::InvalidTransition { from, action } => {
                RepositoryError::InvalidTransition { from, action }
            }
            TransitionError::EmptyPrescription => RepositoryError::EmptyPrescription,
            TransitionError::InvalidAmount(amount) => RepositoryError::InvalidAmount(amount),
        }
    }
}

impl From<TokenError> for RepositoryError {
    fn from(e: TokenError) -> Self {
        match e {
            TokenError::AllocationFailed(msg) => RepositoryError::TokenAllocationFailed(msg),
        }
    }
}

impl From<DemographicsError> for RepositoryError {
    fn from(e: DemographicsError) -> Self {
        RepositoryError::InvalidInput(e.to_string())
    }
}

impl From<DbError> for RepositoryError {
    fn from(e: DbError) -> Self {
        match e {
            DbError::NotFound(id) => RepositoryError::NotFound(id),
            DbError::Constraint(reason) => RepositoryError::InvalidInput(reason),
            other => RepositoryError::SyncFailed(other.to_string()),
        }
    }
}

/// Current stored status of one visit, read without touching the snapshot.
fn stored_status<S: VisitStore + ?Sized>(store: &mut S, id: &str) -> Option<VisitStatus> {
    store
        .query(&VisitFilter::all())
        .ok()?
        .into_iter()
        .find(|v| v.id == id)
        .map(|v| v.status)
}

/// Result of a successful registration.
#[derive(Debug, Clone, PartialEq)]
pub struct Registration {
    pub visit: Visit,
    /// `Fallback` means the token came from offline numbering and may be shared
    pub token_source: TokenSource,
}

/// Visit cache plus the intents that mutate it.
pub struct PatientRepository<S: VisitStore> {
    store: Mutex<S>,
    clock: Arc<dyn Clock>,
    identity: Arc<dyn IdentityProvider>,
    allocator: TokenAllocator,
    snapshot: RwLock<Arc<Snapshot>>,
    tickets: AtomicU64,
}

impl<S: VisitStore> PatientRepository<S> {
    /// Create a repository with an empty, unloaded snapshot. Call
    /// [`refresh`](Self::refresh) before serving reads.
    pub fn new(
        store: S,
        clock: Arc<dyn Clock>,
        identity: Arc<dyn IdentityProvider>,
        config: &ClinicConfig,
    ) -> Self {
        Self {
            store: Mutex::new(store),
            clock,
            identity,
            allocator: TokenAllocator::from_config(config),
            snapshot: RwLock::new(Arc::new(Snapshot::default())),
            tickets: AtomicU64::new(0),
        }
    }

    /// Wall clock, no session, default config.
    pub fn with_defaults(store: S) -> Self {
        Self::new(
            store,
            Arc::new(SystemClock),
            Arc::new(StaticIdentity::anonymous()),
            &ClinicConfig::default(),
        )
    }

    /// Current day key according to the repository's clock.
    pub fn day(&self) -> DateKey {
        self.clock.today()
    }

    /// Shared handle to the installed snapshot.
    pub fn snapshot(&self) -> Arc<Snapshot> {
        // The slot only ever holds a complete Arc, so a poisoned lock is still readable
        Arc::clone(&self.snapshot.read().unwrap_or_else(|e| e.into_inner()))
    }

    /// Pull every visit from the store and install it as a new snapshot.
    pub fn refresh(&self) -> RepoResult<Arc<Snapshot>> {
        let (ticket, fetched) = {
            let mut store = self.lock_store()?;
            let ticket = self.tickets.fetch_add(1, Ordering::SeqCst) + 1;
            (ticket, store.query(&VisitFilter::all()))
        };

        let visits = fetched.map_err(|e| {
            warn!(ticket, error = %e, "refresh failed, keeping previous snapshot");
            RepositoryError::SyncFailed(e.to_string())
        })?;

        let count = visits.len();
        if self.install(ticket, visits) {
            debug!(version = ticket, visits = count, "installed snapshot");
        } else {
            debug!(ticket, "discarded stale refresh");
        }

        Ok(self.snapshot())
    }

    /// Today's visits, newest first.
    pub fn today(&self) -> Vec<Visit> {
        let day = self.clock.today();
        self.snapshot().on(day).cloned().collect()
    }

    /// Today's visits in one status.
    pub fn by_status(&self, status: VisitStatus) -> Vec<Visit> {
        let day = self.clock.today();
        self.snapshot().on_with_status(day, status).cloned().collect()
    }

    pub fn get(&self, id: &str) -> Option<Visit> {
        self.snapshot().get(id).cloned()
    }

    /// Dashboard counters for today.
    pub fn stats(&self) -> QueueStats {
        let day = self.clock.today();
        QueueStats::from_visits(self.snapshot().on(day))
    }

    /// Today's queue as JSON.
    pub fn today_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&self.today())
    }

    /// Billed visits for today.
    pub fn billing_export(&self) -> DailyBillingExport {
        let day = self.clock.today();
        DailyBillingExport::from_visits(day, self.clock.now(), self.snapshot().visits())
    }

    /// Register a patient for today and issue their token.
    pub fn register(&self, demographics: Demographics) -> RepoResult<Registration> {
        demographics.validate()?;

        let day = self.clock.today();
        let cached = self.snapshot();
        let cached_on_day = cached.is_loaded().then(|| cached.on(day).count());

        let allocated = self.allocator.next(&self.store, day, cached_on_day)?;

        let mut new_visit = NewVisit::new(allocated.token, day, demographics);
        new_visit.created_by = self.identity.current_session().map(|s| s.subject_id);

        let visit = self.with_store("insert", |store| store.insert(&new_visit))?;
        info!(
            visit_id = %visit.id,
            token = %visit.token_number,
            source = ?allocated.source,
            %day,
            "registered visit"
        );

        self.refresh()?;

        Ok(Registration {
            visit,
            token_source: allocated.source,
        })
    }

    /// Validate `transition` against the cached visit, write the changed
    /// fields and refresh.
    pub fn apply_transition(&self, id: &str, transition: &Transition) -> RepoResult<Visit> {
        let cached = self.snapshot();
        let visit = cached
            .get(id)
            .ok_or_else(|| RepositoryError::NotFound(id.to_string()))?;

        let update = transition.apply(visit).map_err(|e| {
            debug!(visit_id = id, %transition, error = %e, "rejected transition");
            e
        })?;

        {
            let mut store = self.lock_store()?;
            store.update(id, &update).map_err(|e| match e {
                DbError::Constraint(reason) => {
                    // Another client moved the visit on since our snapshot
                    let from = stored_status(&mut *store, id).unwrap_or(visit.status);
                    warn!(visit_id = id, %transition, %from, %reason, "store rejected stale transition");
                    RepositoryError::InvalidTransition {
                        from,
                        action: transition.action(),
                    }
                }
                other => {
                    warn!(op = "update", error = %other, "store round trip failed");
                    RepositoryError::from(other)
                }
            })?;
        }
        info!(
            visit_id = id,
            token = %visit.token_number,
            from = %visit.status,
            to = %update.status,
            "applied transition"
        );

        self.refresh()?
            .get(id)
            .cloned()
            .ok_or_else(|| RepositoryError::NotFound(id.to_string()))
    }

    pub fn start_consultation(&self, id: &str) -> RepoResult<Visit> {
        self.apply_transition(id, &Transition::StartConsultation)
    }

    pub fn save_completion(&self, id: &str, prescription: &str) -> RepoResult<Visit> {
        self.apply_transition(
            id,
            &Transition::SaveCompletion {
                prescription: prescription.to_string(),
            },
        )
    }

    pub fn generate_bill(&self, id: &str, amount: f64) -> RepoResult<Visit> {
        self.apply_transition(id, &Transition::GenerateBill { amount })
    }

    /// Bill with the total of itemized charges.
    pub fn generate_bill_from_charges(&self, id: &str, charges: &Charges) -> RepoResult<Visit> {
        self.generate_bill(id, charges.total())
    }

    fn lock_store(&self) -> RepoResult<MutexGuard<'_, S>> {
        self.store
            .lock()
            .map_err(|_| RepositoryError::SyncFailed("store lock poisoned".to_string()))
    }

    fn with_store<T, F>(&self, op: &'static str, f: F) -> RepoResult<T>
    where
        F: FnOnce(&mut S) -> DbResult<T>,
    {
        let mut store = self.lock_store()?;
        f(&mut *store).map_err(|e| {
            warn!(op, error = %e, "store round trip failed");
            RepositoryError::from(e)
        })
    }

    /// Install `visits` unless a newer ticket already has.
    fn install(&self, ticket: u64, visits: Vec<Visit>) -> bool {
        let mut slot = self.snapshot.write().unwrap_or_else(|e| e.into_inner());
        if ticket <= slot.version() {
            return false;
        }
        *slot = Arc::new(Snapshot::new(ticket, visits));
        true
    }
}
