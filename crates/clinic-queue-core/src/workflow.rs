//! Visit status workflow.
//!
//! ```text
//! waiting ──▶ in-consultation ──▶ completed ──▶ billed
//!    │                               ▲
//!    └───────── save completion ─────┘
//! ```
//!
//! Transitions only move forward. Re-running one that has already been
//! applied is rejected, never silently re-applied: callers that retry must
//! check the visit's current status first.

use std::fmt;

use thiserror::Error;

use crate::models::{Visit, VisitStatus, VisitUpdate};

/// Workflow violations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransitionError {
    #[error("cannot {action} a visit that is {from}")]
    InvalidTransition {
        from: VisitStatus,
        action: &'static str,
    },

    #[error("prescription is required before completing a consultation")]
    EmptyPrescription,

    #[error("bill amount must be a non-negative number, got {0}")]
    InvalidAmount(f64),
}

/// A requested workflow step.
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    StartConsultation,
    SaveCompletion { prescription: String },
    GenerateBill { amount: f64 },
}

impl Transition {
    pub fn action(&self) -> &'static str {
        match self {
            Transition::StartConsultation => "start consultation for",
            Transition::SaveCompletion { .. } => "complete",
            Transition::GenerateBill { .. } => "bill",
        }
    }

    /// Status the visit ends in when this step succeeds.
    pub fn target(&self) -> VisitStatus {
        match self {
            Transition::StartConsultation => VisitStatus::InConsultation,
            Transition::SaveCompletion { .. } => VisitStatus::Completed,
            Transition::GenerateBill { .. } => VisitStatus::Billed,
        }
    }

    /// Statuses this step may start from.
    pub fn allowed_from(&self) -> &'static [VisitStatus] {
        match self {
            Transition::StartConsultation => &[VisitStatus::Waiting],
            Transition::SaveCompletion { .. } => {
                &[VisitStatus::Waiting, VisitStatus::InConsultation]
            }
            Transition::GenerateBill { .. } => &[VisitStatus::Completed],
        }
    }

    /// Validate against the visit's current state and compute the changed fields.
    pub fn apply(&self, visit: &Visit) -> Result<VisitUpdate, TransitionError> {
        match self {
            Transition::StartConsultation => start_consultation(visit.status),
            Transition::SaveCompletion { prescription } => save_completion(visit.status, prescription),
            Transition::GenerateBill { amount } => generate_bill(visit.status, *amount),
        }
    }
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Transition::StartConsultation => f.write_str("start-consultation"),
            Transition::SaveCompletion { .. } => f.write_str("save-completion"),
            Transition::GenerateBill { amount } => write!(f, "generate-bill({amount})"),
        }
    }
}

fn ensure_allowed(transition: &Transition, from: VisitStatus) -> Result<(), TransitionError> {
    if transition.allowed_from().contains(&from) {
        Ok(())
    } else {
        Err(TransitionError::InvalidTransition {
            from,
            action: transition.action(),
        })
    }
}

/// `waiting` → `in-consultation`.
pub fn start_consultation(from: VisitStatus) -> Result<VisitUpdate, TransitionError> {
    ensure_allowed(&Transition::StartConsultation, from)?;
    Ok(VisitUpdate::status(VisitStatus::InConsultation))
}

/// `waiting` | `in-consultation` → `completed`, recording the prescription.
pub fn save_completion(from: VisitStatus, prescription: &str) -> Result<VisitUpdate, TransitionError> {
    ensure_allowed(
        &Transition::SaveCompletion {
            prescription: String::new(),
        },
        from,
    )?;

    if prescription.trim().is_empty() {
        return Err(TransitionError::EmptyPrescription);
    }

    Ok(VisitUpdate {
        status: VisitStatus::Completed,
        prescription: Some(prescription.to_string()),
        bill_amount: None,
    })
}

/// `completed` → `billed`, recording the bill total.
pub fn generate_bill(from: VisitStatus, amount: f64) -> Result<VisitUpdate, TransitionError> {
    ensure_allowed(&Transition::GenerateBill { amount }, from)?;

    if !amount.is_finite() || amount < 0.0 {
        return Err(TransitionError::InvalidAmount(amount));
    }

    Ok(VisitUpdate {
        status: VisitStatus::Billed,
        prescription: None,
        bill_amount: Some(amount),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_start_consultation_only_from_waiting() {
        let update = start_consultation(VisitStatus::Waiting).unwrap();
        assert_eq!(update.status, VisitStatus::InConsultation);
        assert!(update.prescription.is_none());
        assert!(update.bill_amount.is_none());

        for from in [
            VisitStatus::InConsultation,
            VisitStatus::Completed,
            VisitStatus::Billed,
        ] {
            assert!(matches!(
                start_consultation(from),
                Err(TransitionError::InvalidTransition { .. })
            ));
        }
    }

    #[test]
    fn test_save_completion_without_start() {
        let update = save_completion(VisitStatus::Waiting, "ORS sachets TDS").unwrap();
        assert_eq!(update.status, VisitStatus::Completed);
        assert_eq!(update.prescription.as_deref(), Some("ORS sachets TDS"));
    }

    #[test]
    fn test_save_completion_keeps_text_as_entered() {
        let update =
            save_completion(VisitStatus::InConsultation, "  Paracetamol 500mg BD \n").unwrap();
        assert_eq!(update.prescription.as_deref(), Some("  Paracetamol 500mg BD \n"));
    }

    #[test]
    fn test_save_completion_rejects_blank() {
        for text in ["", "   ", "\n\t"] {
            assert_eq!(
                save_completion(VisitStatus::InConsultation, text),
                Err(TransitionError::EmptyPrescription)
            );
        }
    }

    #[test]
    fn test_save_completion_after_completed() {
        for from in [VisitStatus::Completed, VisitStatus::Billed] {
            assert!(matches!(
                save_completion(from, "Amoxicillin 250mg"),
                Err(TransitionError::InvalidTransition { .. })
            ));
        }
    }

    #[test]
    fn test_generate_bill_only_from_completed() {
        let update = generate_bill(VisitStatus::Completed, 750.0).unwrap();
        assert_eq!(update.status, VisitStatus::Billed);
        assert_eq!(update.bill_amount, Some(750.0));

        for from in [
            VisitStatus::Waiting,
            VisitStatus::InConsultation,
            VisitStatus::Billed,
        ] {
            assert!(matches!(
                generate_bill(from, 750.0),
                Err(TransitionError::InvalidTransition { .. })
            ));
        }
    }

    #[test]
    fn test_generate_bill_amounts() {
        assert!(generate_bill(VisitStatus::Completed, 0.0).is_ok());
        assert_eq!(
            generate_bill(VisitStatus::Completed, -1.0),
            Err(TransitionError::InvalidAmount(-1.0))
        );
        assert!(matches!(
            generate_bill(VisitStatus::Completed, f64::NAN),
            Err(TransitionError::InvalidAmount(_))
        ));
        assert!(matches!(
            generate_bill(VisitStatus::Completed, f64::INFINITY),
            Err(TransitionError::InvalidAmount(_))
        ));
    }

    #[test]
    fn test_state_checked_before_amount() {
        assert!(matches!(
            generate_bill(VisitStatus::Waiting, -5.0),
            Err(TransitionError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn test_error_message_names_state() {
        let err = generate_bill(VisitStatus::Billed, 10.0).unwrap_err();
        assert_eq!(err.to_string(), "cannot bill a visit that is billed");
    }

    fn any_transition() -> impl Strategy<Value = Transition> {
        prop_oneof![
            Just(Transition::StartConsultation),
            "[ a-z]{0,12}".prop_map(|prescription| Transition::SaveCompletion { prescription }),
            (-100.0..1000.0f64).prop_map(|amount| Transition::GenerateBill { amount }),
        ]
    }

    fn any_status() -> impl Strategy<Value = VisitStatus> {
        prop_oneof![
            Just(VisitStatus::Waiting),
            Just(VisitStatus::InConsultation),
            Just(VisitStatus::Completed),
            Just(VisitStatus::Billed),
        ]
    }

    proptest! {
        /// Every successful step moves strictly forward.
        #[test]
        fn transitions_never_regress(from in any_status(), transition in any_transition()) {
            let result = match &transition {
                Transition::StartConsultation => start_consultation(from),
                Transition::SaveCompletion { prescription } => save_completion(from, prescription),
                Transition::GenerateBill { amount } => generate_bill(from, *amount),
            };

            if let Ok(update) = result {
                prop_assert!(update.status > from);
                prop_assert_eq!(update.status, transition.target());
            }
        }
    }
}
