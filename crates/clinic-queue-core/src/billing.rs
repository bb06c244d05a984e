//! Bill totals and the day-end billing export.
//!
//! [`total`] only computes a number. Writing `bill_amount` onto a visit is the
//! workflow's job.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::clock::DateKey;
use crate::models::{Visit, VisitStatus};

pub const DEFAULT_CONSULTATION_FEE: f64 = 500.0;
pub const DEFAULT_MEDICATION_COST: f64 = 250.0;
pub const DEFAULT_ADDITIONAL_CHARGES: f64 = 0.0;

/// Round to the currency's minor unit.
fn round_minor(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}

/// Negative and non-finite charges count as zero.
fn clamp_charge(amount: f64) -> f64 {
    if amount.is_finite() && amount > 0.0 {
        amount
    } else {
        0.0
    }
}

/// Parse a charge typed at the desk. Blank or unparseable text counts as zero.
pub fn parse_charge(raw: &str) -> f64 {
    raw.trim().parse::<f64>().map(clamp_charge).unwrap_or(0.0)
}

/// Sum the three charge lines.
///
/// Inputs are clamped to zero, so `total(-10.0, 250.0, 0.0) == 250.0`.
pub fn total(consultation_fee: f64, medication_cost: f64, additional_charges: f64) -> f64 {
    round_minor(
        clamp_charge(consultation_fee) + clamp_charge(medication_cost) + clamp_charge(additional_charges),
    )
}

/// Itemized charges for one visit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Charges {
    pub consultation_fee: f64,
    pub medication_cost: f64,
    pub additional_charges: f64,
}

impl Default for Charges {
    fn default() -> Self {
        Self {
            consultation_fee: DEFAULT_CONSULTATION_FEE,
            medication_cost: DEFAULT_MEDICATION_COST,
            additional_charges: DEFAULT_ADDITIONAL_CHARGES,
        }
    }
}

impl Charges {
    pub fn new(consultation_fee: f64, medication_cost: f64, additional_charges: f64) -> Self {
        Self {
            consultation_fee,
            medication_cost,
            additional_charges,
        }
    }

    /// Build from the raw text fields of the billing form.
    pub fn parse(consultation_fee: &str, medication_cost: &str, additional_charges: &str) -> Self {
        Self {
            consultation_fee: parse_charge(consultation_fee),
            medication_cost: parse_charge(medication_cost),
            additional_charges: parse_charge(additional_charges),
        }
    }

    pub fn total(&self) -> f64 {
        total(
            self.consultation_fee,
            self.medication_cost,
            self.additional_charges,
        )
    }
}

/// One billed visit in the day-end export.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BilledVisitLine {
    pub visit_id: String,
    pub token_number: String,
    pub patient_name: String,
    pub amount: f64,
}

/// Billed visits for one day.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyBillingExport {
    pub visit_date: DateKey,
    pub exported_at: String,
    pub lines: Vec<BilledVisitLine>,
    pub total: f64,
}

impl DailyBillingExport {
    /// Collect billed visits for `day`, ordered by token.
    pub fn from_visits<'a>(
        day: DateKey,
        exported_at: DateTime<Utc>,
        visits: impl IntoIterator<Item = &'a Visit>,
    ) -> Self {
        let mut billed: Vec<&Visit> = visits
            .into_iter()
            .filter(|v| v.is_on(day) && v.status == VisitStatus::Billed)
            .collect();
        billed.sort_by_key(|v| v.token_number);

        let lines: Vec<BilledVisitLine> = billed
            .into_iter()
            .map(|v| BilledVisitLine {
                visit_id: v.id.clone(),
                token_number: v.token_number.to_string(),
                patient_name: v.name.clone(),
                amount: v.bill_amount.unwrap_or(0.0),
            })
            .collect();
        let total = round_minor(lines.iter().map(|l| l.amount).sum());

        Self {
            visit_date: day,
            exported_at: exported_at.to_rfc3339_opts(SecondsFormat::Secs, true),
            lines,
            total,
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn to_csv(&self) -> String {
        let mut csv = String::new();
        csv.push_str("visit_date,token_number,visit_id,patient_name,amount\n");

        for line in &self.lines {
            csv.push_str(&format!(
                "{},{},{},{},{:.2}\n",
                self.visit_date,
                escape_csv(&line.token_number),
                escape_csv(&line.visit_id),
                escape_csv(&line.patient_name),
                line.amount,
            ));
        }

        csv
    }
}

fn escape_csv(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}
