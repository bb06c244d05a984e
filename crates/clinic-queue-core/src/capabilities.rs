//! What each role may see and do.
//!
//! A pure mapping the Presentation Layer uses to pick a dashboard and enable
//! actions. The core itself enforces nothing here.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::identity::Role;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Capability {
    ViewQueue,
    RegisterPatient,
    StartConsultation,
    SavePrescription,
    GenerateBill,
    ExportBilling,
}

impl Capability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::ViewQueue => "view-queue",
            Capability::RegisterPatient => "register-patient",
            Capability::StartConsultation => "start-consultation",
            Capability::SavePrescription => "save-prescription",
            Capability::GenerateBill => "generate-bill",
            Capability::ExportBilling => "export-billing",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Dashboard {
    Doctor,
    Reception,
}

impl Dashboard {
    pub fn as_str(&self) -> &'static str {
        match self {
            Dashboard::Doctor => "doctor",
            Dashboard::Reception => "reception",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    pub dashboard: Dashboard,
    pub allowed: BTreeSet<Capability>,
}

impl Capabilities {
    pub fn allows(&self, capability: Capability) -> bool {
        self.allowed.contains(&capability)
    }
}

pub fn capabilities(role: Role) -> Capabilities {
    let (dashboard, allowed) = match role {
        Role::Doctor => (
            Dashboard::Doctor,
            vec![
                Capability::ViewQueue,
                Capability::StartConsultation,
                Capability::SavePrescription,
            ],
        ),
        Role::Receptionist => (
            Dashboard::Reception,
            vec![
                Capability::ViewQueue,
                Capability::RegisterPatient,
                Capability::GenerateBill,
                Capability::ExportBilling,
            ],
        ),
    };

    let allowed: BTreeSet<Capability> = allowed.into_iter().collect();
    Capabilities { dashboard, allowed }
}
