//! Versioned, immutable view of the visit table.

use serde::Serialize;

use crate::clock::DateKey;
use crate::models::{Visit, VisitStatus};

/// One installed projection of the store. Replaced wholesale on refresh,
/// never edited in place.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    version: u64,
    visits: Vec<Visit>,
}

impl Snapshot {
    pub(crate) fn new(version: u64, visits: Vec<Visit>) -> Self {
        Self { version, visits }
    }

    /// Refresh ticket that produced this snapshot; 0 before the first load.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// False until a refresh has succeeded.
    pub fn is_loaded(&self) -> bool {
        self.version > 0
    }

    /// Every cached visit, newest first.
    pub fn visits(&self) -> &[Visit] {
        &self.visits
    }

    pub fn get(&self, id: &str) -> Option<&Visit> {
        self.visits.iter().find(|v| v.id == id)
    }

    /// Visits on `day`, in store order.
    pub fn on(&self, day: DateKey) -> impl Iterator<Item = &Visit> + '_ {
        self.visits.iter().filter(move |v| v.is_on(day))
    }

    pub fn on_with_status(
        &self,
        day: DateKey,
        status: VisitStatus,
    ) -> impl Iterator<Item = &Visit> + '_ {
        self.on(day).filter(move |v| v.status == status)
    }

    pub fn len(&self) -> usize {
        self.visits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.visits.is_empty()
    }
}
