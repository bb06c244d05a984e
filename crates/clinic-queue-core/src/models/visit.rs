//! Visit models.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::token::TokenNumber;
use crate::clock::DateKey;

/// Doctor label stamped on every new registration.
pub const AUTO_ASSIGNED_DOCTOR: &str = "Auto-assigned";

/// Oldest age accepted at registration.
pub const MAX_AGE: u32 = 150;

/// Visit workflow status.
///
/// Declaration order is workflow order, so `Ord` compares progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VisitStatus {
    /// Registered, waiting for the doctor
    Waiting,
    /// Doctor has called the patient in
    InConsultation,
    /// Prescription saved, ready for billing
    Completed,
    /// Bill generated
    Billed,
}

impl VisitStatus {
    pub const ALL: [VisitStatus; 4] = [
        VisitStatus::Waiting,
        VisitStatus::InConsultation,
        VisitStatus::Completed,
        VisitStatus::Billed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            VisitStatus::Waiting => "waiting",
            VisitStatus::InConsultation => "in-consultation",
            VisitStatus::Completed => "completed",
            VisitStatus::Billed => "billed",
        }
    }

    /// True once the doctor has finished with the patient.
    pub fn is_seen(&self) -> bool {
        matches!(self, VisitStatus::Completed | VisitStatus::Billed)
    }
}

impl fmt::Display for VisitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown visit status: {0}")]
pub struct UnknownStatus(pub String);

impl FromStr for VisitStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "waiting" => Ok(VisitStatus::Waiting),
            "in-consultation" => Ok(VisitStatus::InConsultation),
            "completed" => Ok(VisitStatus::Completed),
            "billed" => Ok(VisitStatus::Billed),
            _ => Err(UnknownStatus(s.to_string())),
        }
    }
}

/// Patient gender as recorded at the front desk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Gender {
    Male,
    Female,
    Other,
}

impl Gender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Male => "Male",
            Gender::Female => "Female",
            Gender::Other => "Other",
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown gender: {0}")]
pub struct UnknownGender(pub String);

impl FromStr for Gender {
    type Err = UnknownGender;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Male" => Ok(Gender::Male),
            "Female" => Ok(Gender::Female),
            "Other" => Ok(Gender::Other),
            _ => Err(UnknownGender(s.to_string())),
        }
    }
}

/// One patient's attendance on one calendar day.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Visit {
    /// Store-assigned identifier
    pub id: String,
    /// Queue ticket, unique within `visit_date`
    pub token_number: TokenNumber,
    /// Calendar day of the visit
    pub visit_date: DateKey,
    /// Patient name
    pub name: String,
    /// Age in years
    pub age: u32,
    pub gender: Gender,
    pub phone: String,
    pub address: String,
    /// Workflow status
    pub status: VisitStatus,
    /// Doctor label (registration stamps "Auto-assigned")
    pub assigned_doctor: Option<String>,
    /// Complaint noted at registration
    pub symptoms: Option<String>,
    /// Set once, on completion
    pub prescription: Option<String>,
    /// Set once, on billing
    pub bill_amount: Option<f64>,
    /// Subject id of the registering session
    pub created_by: Option<String>,
    /// Store-assigned creation timestamp
    pub created_at: String,
}

impl Visit {
    pub fn is_on(&self, day: DateKey) -> bool {
        self.visit_date == day
    }
}

/// Registration form input.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Demographics {
    pub name: String,
    pub age: u32,
    pub gender: Gender,
    pub phone: String,
    pub address: String,
    pub symptoms: Option<String>,
}

/// Rejected registration input.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DemographicsError {
    #[error("{0} is required")]
    MissingField(&'static str),

    #[error("age {0} is out of range (0-150)")]
    AgeOutOfRange(u32),
}

impl Demographics {
    /// Create demographics with required fields.
    pub fn new(name: impl Into<String>, age: u32, gender: Gender, phone: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            age,
            gender,
            phone: phone.into(),
            address: String::new(),
            symptoms: None,
        }
    }

    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = address.into();
        self
    }

    pub fn with_symptoms(mut self, symptoms: impl Into<String>) -> Self {
        self.symptoms = Some(symptoms.into());
        self
    }

    /// Check the fields the front desk requires before issuing a token.
    pub fn validate(&self) -> Result<(), DemographicsError> {
        if self.name.trim().is_empty() {
            return Err(DemographicsError::MissingField("name"));
        }
        if self.phone.trim().is_empty() {
            return Err(DemographicsError::MissingField("phone"));
        }
        if self.address.trim().is_empty() {
            return Err(DemographicsError::MissingField("address"));
        }
        if self.age > MAX_AGE {
            return Err(DemographicsError::AgeOutOfRange(self.age));
        }
        Ok(())
    }
}

/// Insert payload for a new visit. The store assigns `id` and `created_at`.
#[derive(Debug, Clone, PartialEq)]
pub struct NewVisit {
    pub token_number: TokenNumber,
    pub visit_date: DateKey,
    pub demographics: Demographics,
    pub assigned_doctor: Option<String>,
    pub created_by: Option<String>,
}

impl NewVisit {
    pub fn new(token_number: TokenNumber, visit_date: DateKey, demographics: Demographics) -> Self {
        Self {
            token_number,
            visit_date,
            demographics,
            assigned_doctor: Some(AUTO_ASSIGNED_DOCTOR.to_string()),
            created_by: None,
        }
    }

    /// New visits always enter the queue waiting.
    pub fn status(&self) -> VisitStatus {
        VisitStatus::Waiting
    }
}

/// The fields a workflow transition changes.
#[derive(Debug, Clone, PartialEq)]
pub struct VisitUpdate {
    pub status: VisitStatus,
    pub prescription: Option<String>,
    pub bill_amount: Option<f64>,
}

impl VisitUpdate {
    pub fn status(status: VisitStatus) -> Self {
        Self {
            status,
            prescription: None,
            bill_amount: None,
        }
    }
}
