//! Builders shared by the per-event transformers.

use tracing::debug;

use crate::coercion::{map_gender, to_date_precision};
use crate::extraction::{extract_value, Element, Lookup};
use crate::hl7::{Delimiters, Field, Message, Segment};
use crate::locator::{find_first_raw_line, find_first_structured};
use crate::resources::{
    CodeableConcept, EncounterStatus, HumanName, Identifier, NormalizedEncounter,
    NormalizedPatient, Period, Reference,
};

/// A segment as seen by both extraction paths: the structured node (when the
/// tree has a non-empty one) and the raw line (when the text has one).
#[derive(Debug, Clone, Default)]
pub(crate) struct SegmentView<'a> {
    pub structured: Option<&'a Segment>,
    pub raw: Option<String>,
    pub delimiters: Delimiters,
}

impl<'a> SegmentView<'a> {
    pub fn new(structured: Option<&'a Segment>, raw: Option<String>) -> Self {
        Self {
            structured,
            raw,
            delimiters: Delimiters::default(),
        }
    }

    /// Read the raw line with the message's delimiters.
    pub fn in_message(mut self, message: &Message) -> Self {
        self.delimiters = message.delimiters().clone();
        self
    }

    pub fn is_present(&self) -> bool {
        self.structured.is_some() || self.raw.is_some()
    }

    /// Value of `field.component` (both 1-based), trimmed and non-empty.
    pub fn value(&self, field: usize, component: usize) -> Option<String> {
        let element = self
            .structured
            .and_then(|seg| seg.field(field))
            .and_then(Field::first_repetition)
            .and_then(|rep| rep.component(component))
            .map(Element::Component);
        extract_value(
            Lookup::from(element),
            self.raw.as_deref(),
            &self.delimiters,
            field,
            component,
        )
        .into_option()
    }
}

/// First occurrence of a segment, resolved on both paths.
pub(crate) fn locate<'a>(message: &'a Message, name: &str) -> SegmentView<'a> {
    let view = SegmentView::new(
        find_first_structured(message, name).into_option(),
        find_first_raw_line(message, name).into_option(),
    )
    .in_message(message);
    if !view.is_present() {
        debug!(segment = name, "Segment not present");
    }
    view
}

/// Patient from PID. Every field is optional.
pub(crate) fn build_patient(pid: &SegmentView<'_>) -> NormalizedPatient {
    let mut patient = NormalizedPatient::default();
    if !pid.is_present() {
        return patient;
    }

    if let Some(id) = pid.value(3, 1) {
        patient.identifier.push(Identifier::new(id.clone()));
        patient.id = Some(id);
    }

    let family = pid.value(5, 1);
    let given = pid.value(5, 2);
    if family.is_some() || given.is_some() {
        patient.name.push(HumanName {
            family,
            given: given.into_iter().collect(),
        });
    }

    patient.birth_date = pid.value(7, 1).and_then(|raw| {
        let date = to_date_precision(&raw);
        if date.is_none() {
            debug!(value = %raw, "Unusable PID-7 birth date");
        }
        date
    });
    patient.gender = pid.value(8, 1).and_then(|raw| map_gender(&raw));

    patient
}

/// Encounter from PV1: class, visit number, admit/discharge period.
pub(crate) fn build_encounter(
    pv1: &SegmentView<'_>,
    patient_id: Option<&str>,
    status: Option<EncounterStatus>,
) -> NormalizedEncounter {
    let class = pv1
        .value(2, 1)
        .map(CodeableConcept::from_code)
        .unwrap_or_else(CodeableConcept::unspecified);
    let id = pv1
        .value(19, 1)
        .unwrap_or_else(|| format!("enc-{}", patient_id.unwrap_or("unknown")));
    let start = pv1.value(44, 1).and_then(|raw| to_date_precision(&raw));
    let end = pv1.value(45, 1).and_then(|raw| to_date_precision(&raw));

    NormalizedEncounter {
        id,
        status,
        class,
        subject: Reference::patient(patient_id),
        period: Period::new(start, end),
    }
}
