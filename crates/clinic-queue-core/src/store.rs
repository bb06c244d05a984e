//! Persistent Store contract.
//!
//! The repository talks to durable storage only through [`VisitStore`]. The
//! bundled implementation is the SQLite [`Database`]; hosts backed by a remote
//! service implement the same four calls.

use crate::clock::DateKey;
use crate::db::{Database, DbError, DbResult, VisitFilter};
use crate::models::{NewVisit, Visit, VisitUpdate};

pub trait VisitStore: Send {
    /// Visits matching `filter`, newest first.
    fn query(&mut self, filter: &VisitFilter) -> DbResult<Vec<Visit>>;

    /// Insert a visit and return it with its store-assigned id and timestamp.
    fn insert(&mut self, new_visit: &NewVisit) -> DbResult<Visit>;

    /// Write the changed fields of one visit. Fails with `NotFound` for unknown ids.
    fn update(&mut self, id: &str, update: &VisitUpdate) -> DbResult<()>;

    /// Atomically advance and return the counter for `scope`, starting at 1.
    fn allocate_sequence(&mut self, scope: DateKey) -> DbResult<u32>;
}

impl VisitStore for Database {
    fn query(&mut self, filter: &VisitFilter) -> DbResult<Vec<Visit>> {
        self.list_visits(filter)
    }

    fn insert(&mut self, new_visit: &NewVisit) -> DbResult<Visit> {
        self.insert_visit(new_visit)
    }

    fn update(&mut self, id: &str, update: &VisitUpdate) -> DbResult<()> {
        if self.update_visit(id, update)? {
            Ok(())
        } else {
            Err(DbError::NotFound(id.to_string()))
        }
    }

    fn allocate_sequence(&mut self, scope: DateKey) -> DbResult<u32> {
        Database::allocate_sequence(self, scope)
    }
}
