//! ADT^A01 (admit/visit notification).

use crate::hl7::Message;
use crate::resources::{EncounterStatus, Record, Resource};
use crate::transform::Transformer;

use super::common::{build_encounter, build_patient, locate};

/// Admit: Patient plus an Encounter marked in progress when a PV1 exists.
#[derive(Debug, Clone, Copy, Default)]
pub struct AdtA01Transformer;

impl Transformer for AdtA01Transformer {
    fn event(&self) -> &'static str {
        "ADT^A01"
    }

    fn transform(&self, message: &Message) -> Vec<Resource> {
        let patient = build_patient(&locate(message, "PID"));
        let pv1 = locate(message, "PV1");
        let status = pv1.is_present().then_some(EncounterStatus::InProgress);
        let encounter = build_encounter(&pv1, patient.id(), status);
        vec![patient.into(), encounter.into()]
    }
}
