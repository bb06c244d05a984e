//! Dashboard counters for a day's queue.

use serde::{Deserialize, Serialize};

use super::visit::{Visit, VisitStatus};

/// Counts shown on the doctor and reception dashboards.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueStats {
    pub total: u32,
    pub waiting: u32,
    pub in_consultation: u32,
    /// Completed and awaiting billing
    pub completed: u32,
    pub billed: u32,
    /// Sum of bill amounts
    pub revenue: f64,
}

impl QueueStats {
    pub fn from_visits<'a>(visits: impl IntoIterator<Item = &'a Visit>) -> Self {
        let mut stats = Self::default();
        for visit in visits {
            stats.total += 1;
            match visit.status {
                VisitStatus::Waiting => stats.waiting += 1,
                VisitStatus::InConsultation => stats.in_consultation += 1,
                VisitStatus::Completed => stats.completed += 1,
                VisitStatus::Billed => stats.billed += 1,
            }
            stats.revenue += visit.bill_amount.unwrap_or(0.0);
        }
        stats.revenue = (stats.revenue * 100.0).round() / 100.0;
        stats
    }

    /// Consultations finished today, billed or not.
    pub fn seen(&self) -> u32 {
        self.completed + self.billed
    }
}
