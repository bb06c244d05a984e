//! Clinic Queue Core Library
//!
//! Front-desk patient queue for a small clinic: registration with day-scoped
//! tokens, the consultation workflow, and billing.
//!
//! # Architecture
//!
//! ```text
//!  Reception                      Doctor                     Reception
//!  register ──▶ T001 waiting ──▶ in-consultation ──▶ completed ──▶ billed
//!      │                                                            │
//!      ▼                                                            ▼
//! TokenAllocator                                            BillingCalculator
//! (atomic per-day                                           (500 + 250 + 0)
//!  sequence)
//!      │
//!      ▼
//! ┌──────────────────── PatientRepository ─────────────────────┐
//! │  validate ─▶ store round trip ─▶ refresh ─▶ Arc<Snapshot>  │
//! └───────────────────────────┬────────────────────────────────┘
//!                             │
//!                      VisitStore (SQLite)
//! ```
//!
//! # Modules
//!
//! - [`clock`]: calendar-day keys and injectable clocks
//! - [`models`]: Visit, status, token and dashboard types
//! - [`workflow`]: the visit status machine
//! - [`billing`]: bill totals and the day-end export
//! - [`allocator`]: token allocation with logged offline fallback
//! - [`db`]: SQLite store
//! - [`repository`]: cached projection and the user intents
//! - [`identity`], [`capabilities`]: sessions and role-based UI gating
//! - [`config`]: startup configuration
//!
//! The library emits `tracing` events but installs no subscriber.

pub mod allocator;
pub mod billing;
pub mod capabilities;
pub mod clock;
pub mod config;
pub mod db;
pub mod identity;
pub mod models;
pub mod repository;
pub mod store;
pub mod workflow;

// Re-export commonly used types
pub use allocator::{AllocatedToken, TokenAllocator, TokenError, TokenSource};
pub use billing::{Charges, DailyBillingExport};
pub use capabilities::{capabilities, Capabilities, Capability, Dashboard};
pub use clock::{Clock, DateKey, ManualClock, SystemClock};
pub use config::{ClinicConfig, ConfigError};
pub use db::{Database, DbError, VisitFilter};
pub use identity::{IdentityProvider, Role, Session, StaticIdentity};
pub use models::{
    Demographics, Gender, NewVisit, QueueStats, TokenNumber, Visit, VisitStatus, VisitUpdate,
};
pub use repository::{PatientRepository, Registration, RepositoryError, Snapshot};
pub use store::VisitStore;
pub use workflow::{Transition, TransitionError};

// UniFFI setup - using proc macros
uniffi::setup_scaffolding!();

use std::sync::Arc;

// =========================================================================
// FFI Error Type
// =========================================================================

#[derive(Debug, thiserror::Error, uniffi::Error)]
pub enum ClinicError {
    #[error("Token allocation failed: {0}")]
    TokenAllocationFailed(String),

    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    #[error("Empty prescription: {0}")]
    EmptyPrescription(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Sync failed: {0}")]
    SyncFailed(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl From<RepositoryError> for ClinicError {
    fn from(e: RepositoryError) -> Self {
        let msg = e.to_string();
        match e {
            RepositoryError::TokenAllocationFailed(_) => ClinicError::TokenAllocationFailed(msg),
            RepositoryError::InvalidTransition { .. } => ClinicError::InvalidTransition(msg),
            RepositoryError::EmptyPrescription => ClinicError::EmptyPrescription(msg),
            RepositoryError::InvalidAmount(_) => ClinicError::InvalidAmount(msg),
            RepositoryError::SyncFailed(_) => ClinicError::SyncFailed(msg),
            RepositoryError::NotFound(id) => ClinicError::NotFound(id),
            RepositoryError::InvalidInput(_) => ClinicError::InvalidInput(msg),
        }
    }
}

impl From<DbError> for ClinicError {
    fn from(e: DbError) -> Self {
        ClinicError::SyncFailed(e.to_string())
    }
}

impl From<ConfigError> for ClinicError {
    fn from(e: ConfigError) -> Self {
        ClinicError::InvalidInput(e.to_string())
    }
}

impl From<serde_json::Error> for ClinicError {
    fn from(e: serde_json::Error) -> Self {
        ClinicError::InvalidInput(format!("serialization: {}", e))
    }
}

// =========================================================================
// Factory Functions (exported to FFI)
// =========================================================================

/// Open or create a clinic database at the given path.
#[uniffi::export]
pub fn open_clinic(path: String) -> Result<Arc<ClinicCore>, ClinicError> {
    ClinicCore::open(ClinicConfig::default().with_db_path(path))
}

/// Open an in-memory clinic (for testing).
#[uniffi::export]
pub fn open_clinic_in_memory() -> Result<Arc<ClinicCore>, ClinicError> {
    ClinicCore::open(ClinicConfig::default())
}

/// Open using `CLINIC_*` environment settings.
#[uniffi::export]
pub fn open_clinic_from_env() -> Result<Arc<ClinicCore>, ClinicError> {
    ClinicCore::open(ClinicConfig::from_env()?)
}

/// What a role may see and do.
#[uniffi::export]
pub fn capabilities_for_role(role: String) -> Result<FfiCapabilities, ClinicError> {
    let role: Role = role
        .parse()
        .map_err(|e: identity::UnknownRole| ClinicError::InvalidInput(e.to_string()))?;
    Ok(capabilities(role).into())
}

/// Bill total from the three charge lines; negatives count as zero.
#[uniffi::export]
pub fn bill_total(consultation_fee: f64, medication_cost: f64, additional_charges: f64) -> f64 {
    billing::total(consultation_fee, medication_cost, additional_charges)
}

// =========================================================================
// Main API Object
// =========================================================================

/// Thread-safe clinic queue for FFI.
#[derive(uniffi::Object)]
pub struct ClinicCore {
    repo: PatientRepository<Database>,
    identity: Arc<StaticIdentity>,
}

impl ClinicCore {
    /// Open the configured store and load the first snapshot.
    pub fn open(config: ClinicConfig) -> Result<Arc<Self>, ClinicError> {
        let db = match config.db_path() {
            Some(path) => Database::open_with_timeout(path, config.store_timeout())?,
            None => Database::open_in_memory()?,
        };

        let identity = Arc::new(StaticIdentity::anonymous());
        let repo = PatientRepository::new(db, Arc::new(SystemClock), identity.clone(), &config);
        repo.refresh()?;

        tracing::info!(path = ?config.db_path(), "opened clinic queue");
        Ok(Arc::new(Self { repo, identity }))
    }
}

#[uniffi::export]
impl ClinicCore {
    // =========================================================================
    // Session
    // =========================================================================

    /// Record the signed-in user and return what their role may do.
    pub fn sign_in(&self, subject_id: String, role: String) -> Result<FfiCapabilities, ClinicError> {
        let role: Role = role
            .parse()
            .map_err(|e: identity::UnknownRole| ClinicError::InvalidInput(e.to_string()))?;
        self.identity.sign_in(Session::new(subject_id, role));
        Ok(capabilities(role).into())
    }

    pub fn sign_out(&self) {
        self.identity.sign_out();
    }

    // =========================================================================
    // Queue Reads
    // =========================================================================

    /// Reload from the store. Returns the installed snapshot version.
    pub fn refresh(&self) -> Result<u64, ClinicError> {
        Ok(self.repo.refresh()?.version())
    }

    /// Today's visits, newest first.
    pub fn today(&self) -> Vec<FfiVisit> {
        self.repo.today().into_iter().map(|v| v.into()).collect()
    }

    /// Today's visits in one status (`waiting`, `in-consultation`, ...).
    pub fn by_status(&self, status: String) -> Result<Vec<FfiVisit>, ClinicError> {
        let status: VisitStatus = status
            .parse()
            .map_err(|e: models::UnknownStatus| ClinicError::InvalidInput(e.to_string()))?;
        Ok(self.repo.by_status(status).into_iter().map(|v| v.into()).collect())
    }

    pub fn get_visit(&self, id: String) -> Option<FfiVisit> {
        self.repo.get(&id).map(|v| v.into())
    }

    pub fn stats(&self) -> FfiStats {
        self.repo.stats().into()
    }

    /// Today's queue as JSON.
    pub fn today_json(&self) -> Result<String, ClinicError> {
        Ok(self.repo.today_json()?)
    }

    // =========================================================================
    // Intents
    // =========================================================================

    /// Register a patient for today.
    pub fn register(&self, demographics: FfiDemographics) -> Result<FfiRegistration, ClinicError> {
        let demographics = Demographics::try_from(demographics)?;
        Ok(self.repo.register(demographics)?.into())
    }

    pub fn start_consultation(&self, id: String) -> Result<FfiVisit, ClinicError> {
        Ok(self.repo.start_consultation(&id)?.into())
    }

    pub fn save_completion(&self, id: String, prescription: String) -> Result<FfiVisit, ClinicError> {
        Ok(self.repo.save_completion(&id, &prescription)?.into())
    }

    pub fn generate_bill(&self, id: String, amount: f64) -> Result<FfiVisit, ClinicError> {
        Ok(self.repo.generate_bill(&id, amount)?.into())
    }

    /// Bill from itemized charges.
    pub fn generate_bill_from_charges(
        &self,
        id: String,
        charges: FfiCharges,
    ) -> Result<FfiVisit, ClinicError> {
        Ok(self.repo.generate_bill_from_charges(&id, &charges.into())?.into())
    }

    // =========================================================================
    // Export Operations
    // =========================================================================

    /// Export today's billed visits as JSON.
    pub fn export_billing_json(&self) -> Result<String, ClinicError> {
        Ok(self.repo.billing_export().to_json()?)
    }

    /// Export today's billed visits as CSV.
    pub fn export_billing_csv(&self) -> String {
        self.repo.billing_export().to_csv()
    }
}

// =========================================================================
// FFI Types
// =========================================================================

/// FFI-safe visit.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiVisit {
    pub id: String,
    pub token_number: String,
    pub visit_date: String,
    pub name: String,
    pub age: u32,
    pub gender: String,
    pub phone: String,
    pub address: String,
    pub status: String,
    pub assigned_doctor: Option<String>,
    pub symptoms: Option<String>,
    pub prescription: Option<String>,
    pub bill_amount: Option<f64>,
    pub created_by: Option<String>,
    pub created_at: String,
}

impl From<Visit> for FfiVisit {
    fn from(visit: Visit) -> Self {
        Self {
            id: visit.id,
            token_number: visit.token_number.to_string(),
            visit_date: visit.visit_date.to_string(),
            name: visit.name,
            age: visit.age,
            gender: visit.gender.as_str().to_string(),
            phone: visit.phone,
            address: visit.address,
            status: visit.status.as_str().to_string(),
            assigned_doctor: visit.assigned_doctor,
            symptoms: visit.symptoms,
            prescription: visit.prescription,
            bill_amount: visit.bill_amount,
            created_by: visit.created_by,
            created_at: visit.created_at,
        }
    }
}

/// FFI-safe registration form.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiDemographics {
    pub name: String,
    pub age: u32,
    pub gender: String,
    pub phone: String,
    pub address: String,
    pub symptoms: Option<String>,
}

impl TryFrom<FfiDemographics> for Demographics {
    type Error = ClinicError;

    fn try_from(form: FfiDemographics) -> Result<Self, Self::Error> {
        let gender: Gender = form
            .gender
            .parse()
            .map_err(|e: models::UnknownGender| ClinicError::InvalidInput(e.to_string()))?;

        Ok(Demographics {
            name: form.name,
            age: form.age,
            gender,
            phone: form.phone,
            address: form.address,
            symptoms: form.symptoms.filter(|s| !s.trim().is_empty()),
        })
    }
}

/// FFI-safe registration result.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiRegistration {
    pub visit: FfiVisit,
    /// False when the token came from offline numbering and may be shared
    pub token_from_store: bool,
}

impl From<Registration> for FfiRegistration {
    fn from(registration: Registration) -> Self {
        Self {
            visit: registration.visit.into(),
            token_from_store: registration.token_source == TokenSource::Atomic,
        }
    }
}

/// FFI-safe itemized charges.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiCharges {
    pub consultation_fee: f64,
    pub medication_cost: f64,
    pub additional_charges: f64,
}

impl From<FfiCharges> for Charges {
    fn from(charges: FfiCharges) -> Self {
        Charges::new(
            charges.consultation_fee,
            charges.medication_cost,
            charges.additional_charges,
        )
    }
}

/// FFI-safe dashboard counters.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiStats {
    pub total: u32,
    pub waiting: u32,
    pub in_consultation: u32,
    pub completed: u32,
    pub billed: u32,
    pub seen: u32,
    pub revenue: f64,
}

impl From<QueueStats> for FfiStats {
    fn from(stats: QueueStats) -> Self {
        Self {
            seen: stats.seen(),
            total: stats.total,
            waiting: stats.waiting,
            in_consultation: stats.in_consultation,
            completed: stats.completed,
            billed: stats.billed,
            revenue: stats.revenue,
        }
    }
}

/// FFI-safe role capabilities.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiCapabilities {
    pub dashboard: String,
    pub allowed: Vec<String>,
}

impl From<Capabilities> for FfiCapabilities {
    fn from(caps: Capabilities) -> Self {
        Self {
            dashboard: caps.dashboard.as_str().to_string(),
            allowed: caps.allowed.iter().map(|c| c.as_str().to_string()).collect(),
        }
    }
}
