//! Token allocation integration tests.
//!
//! Each front-desk client gets its own repository and connection onto one
//! SQLite file, the same way separate devices share a store.

use std::path::Path;
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

use chrono::NaiveDate;
use clinic_queue_core::allocator::TokenSource;
use clinic_queue_core::clock::{DateKey, ManualClock};
use clinic_queue_core::config::ClinicConfig;
use clinic_queue_core::db::{Database, DbError, DbResult, VisitFilter};
use clinic_queue_core::identity::StaticIdentity;
use clinic_queue_core::models::{Demographics, Gender, NewVisit, Visit, VisitUpdate};
use clinic_queue_core::repository::{PatientRepository, RepositoryError};
use clinic_queue_core::store::VisitStore;

fn march_7() -> Arc<ManualClock> {
    Arc::new(ManualClock::at_date(NaiveDate::from_ymd_opt(2024, 3, 7).unwrap()))
}

fn make_patient(i: usize) -> Demographics {
    Demographics::new(format!("Patient {}", i), 30, Gender::Other, "555-0100")
        .with_address("1 Main St")
}

fn client(path: &Path, clock: Arc<ManualClock>) -> PatientRepository<Database> {
    let repo = PatientRepository::new(
        Database::open(path).unwrap(),
        clock,
        Arc::new(StaticIdentity::anonymous()),
        &ClinicConfig::default(),
    );
    repo.refresh().unwrap();
    repo
}

/// Register one patient per client thread, all released at once.
fn register_concurrently(clients: usize) -> Vec<String> {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("clinic.db");
    // Create schema and switch to WAL before the clients race
    drop(Database::open(&path).unwrap());

    let clock = march_7();
    let barrier = Arc::new(Barrier::new(clients));

    let handles: Vec<_> = (0..clients)
        .map(|i| {
            let path = path.clone();
            let clock = clock.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                let repo = client(&path, clock);
                barrier.wait();
                let registration = repo.register(make_patient(i)).unwrap();
                assert_eq!(registration.token_source, TokenSource::Atomic);
                registration.visit.token_number.to_string()
            })
        })
        .collect();

    let mut tokens: Vec<String> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    tokens.sort();
    tokens
}

#[test]
fn test_two_simultaneous_registrations() {
    assert_eq!(register_concurrently(2), vec!["T001", "T002"]);
}

#[test]
fn test_concurrent_registrations_are_gap_free() {
    let n = 12;
    let expected: Vec<String> = (1..=n).map(|i| format!("T{:03}", i)).collect();
    assert_eq!(register_concurrently(n), expected);
}

#[test]
fn test_clients_see_each_others_registrations() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("clinic.db");
    let clock = march_7();

    let front = client(&path, clock.clone());
    let back = client(&path, clock);

    front.register(make_patient(1)).unwrap();
    let second = back.register(make_patient(2)).unwrap();
    assert_eq!(second.visit.token_number.to_string(), "T002");

    front.refresh().unwrap();
    assert_eq!(front.today().len(), 2);
}

/// Database whose token counter is unreachable.
struct CounterDown(Database);

impl VisitStore for CounterDown {
    fn query(&mut self, filter: &VisitFilter) -> DbResult<Vec<Visit>> {
        self.0.list_visits(filter)
    }

    fn insert(&mut self, new_visit: &NewVisit) -> DbResult<Visit> {
        self.0.insert_visit(new_visit)
    }

    fn update(&mut self, id: &str, update: &VisitUpdate) -> DbResult<()> {
        VisitStore::update(&mut self.0, id, update)
    }

    fn allocate_sequence(&mut self, _scope: DateKey) -> DbResult<u32> {
        Err(DbError::Unavailable("token service timed out".to_string()))
    }
}

fn offline_repo(config: &ClinicConfig) -> PatientRepository<CounterDown> {
    PatientRepository::new(
        CounterDown(Database::open_in_memory().unwrap()),
        march_7(),
        Arc::new(StaticIdentity::anonymous()),
        config,
    )
}

fn fast_retries() -> ClinicConfig {
    ClinicConfig::default().with_token_retries(2, Duration::from_millis(1))
}

#[test]
fn test_fallback_numbering_when_counter_down() {
    let repo = offline_repo(&fast_retries());
    repo.refresh().unwrap();

    let first = repo.register(make_patient(1)).unwrap();
    let second = repo.register(make_patient(2)).unwrap();

    assert_eq!(first.token_source, TokenSource::Fallback);
    assert_eq!(first.visit.token_number.to_string(), "T001");
    assert_eq!(second.visit.token_number.to_string(), "T002");
}

#[test]
fn test_fallback_needs_loaded_snapshot() {
    let repo = offline_repo(&fast_retries());

    let result = repo.register(make_patient(1));

    assert!(matches!(result, Err(RepositoryError::TokenAllocationFailed(_))));
    repo.refresh().unwrap();
    assert!(repo.today().is_empty());
}

#[test]
fn test_fallback_disabled() {
    let repo = offline_repo(&fast_retries().with_token_fallback(false));
    repo.refresh().unwrap();

    let result = repo.register(make_patient(1));

    assert!(matches!(result, Err(RepositoryError::TokenAllocationFailed(_))));
    assert!(repo.snapshot().is_empty());
}
