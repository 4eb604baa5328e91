//! ORU^R01 (observation result).
//!
//! One Observation per raw `OBX|` line. The tree is only used to improve
//! each value: the k-th raw line is paired with the k-th OBX node, when the
//! tree has one.

use tracing::debug;

use crate::coercion::{coerce_value, to_instant, FhirDate};
use crate::extraction::read_message_type;
use crate::hl7::Message;
use crate::locator::{find_all_structured, raw_lines};
use crate::resources::{
    CodeableConcept, Identifier, NormalizedObservation, ObservationStatus, Record, Reference,
    Resource, UNSPECIFIED_OBSERVATION,
};
use crate::transform::{Transformer, TriggerEvent};

use super::common::{build_patient, locate, SegmentView};

const EVENT: &str = "ORU^R01";

/// Result: Patient plus one Observation per OBX.
#[derive(Debug, Clone, Copy, Default)]
pub struct OruR01Transformer;

impl Transformer for OruR01Transformer {
    fn event(&self) -> &'static str {
        EVENT
    }

    /// Case-insensitive; the extended `ORU^R01^ORU_R01` form also matches.
    /// Extra characters inside the event component (`ORU^R011`) do not.
    fn applies(&self, message: &Message) -> bool {
        let Some(text) = read_message_type(message).into_option() else {
            return false;
        };
        let text = text.trim().to_ascii_uppercase();
        let extended = text
            .strip_prefix(EVENT)
            .is_some_and(|rest| rest.is_empty() || rest.starts_with('^'));
        extended || TriggerEvent::from_header_text(&text).is_some_and(|t| t.to_string() == EVENT)
    }

    fn transform(&self, message: &Message) -> Vec<Resource> {
        let patient = build_patient(&locate(message, "PID"));
        let patient_id = patient.id().map(str::to_string);
        let obr = locate(message, "OBR");

        let effective = obr
            .value(7, 1)
            .and_then(|raw| to_instant(&raw))
            .map(FhirDate::Instant);
        let identifier: Vec<Identifier> = [obr.value(2, 1), obr.value(3, 1)]
            .into_iter()
            .flatten()
            .map(Identifier::new)
            .collect();

        let structured = find_all_structured(message, "OBX");
        let lines = raw_lines(message, "OBX");
        if structured.len() != lines.len() {
            debug!(
                tree = structured.len(),
                text = lines.len(),
                "OBX count differs between tree and text, following the text"
            );
        }

        let mut out: Vec<Resource> = Vec::with_capacity(lines.len() + 1);
        out.push(patient.into());
        for (k, line) in lines.into_iter().enumerate() {
            let obx = SegmentView::new(structured.get(k).copied(), Some(line)).in_message(message);
            let observation = NormalizedObservation {
                id: format!("obs-{}-{}", patient_id.as_deref().unwrap_or("unknown"), k + 1),
                status: ObservationStatus::Final,
                code: observation_code(&obx),
                subject: Reference::patient(patient_id.as_deref()),
                effective_date_time: effective,
                identifier: identifier.clone(),
                value: obx.value(5, 1).map(|raw| coerce_value(&raw, unit(&obx))),
            };
            out.push(observation.into());
        }
        out
    }
}

fn observation_code(obx: &SegmentView<'_>) -> CodeableConcept {
    CodeableConcept::from_parts(obx.value(3, 1), obx.value(3, 2)).unwrap_or_else(|| {
        CodeableConcept {
            coding: Vec::new(),
            text: Some(UNSPECIFIED_OBSERVATION.to_string()),
        }
    })
}

/// OBX-6: the text component, else the identifier.
fn unit(obx: &SegmentView<'_>) -> Option<String> {
    obx.value(6, 2).or_else(|| obx.value(6, 1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coercion::ObservationValue;
    use crate::hl7::{parse_message, Field, Node, ParseOptions, Segment};
    use rust_decimal::Decimal;
    use std::str::FromStr;

    const HEAD: &str = "MSH|^~\\&|LAB|HOSP|EHR|HOSP|202501011230||ORU^R01|M1|P|2.5\r\
                        PID|1||12345^^^MRN||Doe^John\r\
                        OBR|1|PLC1|FIL1|CBC^Blood count|||20250101083000";

    fn parse(raw: &str) -> Message {
        parse_message(raw, &ParseOptions::default()).unwrap()
    }

    fn observations(out: &[Resource]) -> Vec<&NormalizedObservation> {
        out.iter()
            .filter_map(|r| match r {
                Resource::Observation(o) => Some(o),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_observation_count_follows_raw_lines() {
        for n in [0usize, 1, 3] {
            let obx: String = (1..=n)
                .map(|i| format!("\rOBX|{}|NM|GLU^Glucose||5.{}|mmol/L", i, i))
                .collect();
            let out = OruR01Transformer.transform(&parse(&format!("{}{}", HEAD, obx)));
            assert_eq!(out.len(), n + 1);
            assert_eq!(out[0].resource_type(), "Patient");
            assert_eq!(observations(&out).len(), n);
        }
    }

    #[test]
    fn test_tree_with_fewer_obx_than_text() {
        let raw = format!(
            "{}\rOBX|1|NM|A||1\rOBX|2|NM|B||2\rOBX|3|ST|C||high",
            HEAD
        );
        let one_obx = Segment::new(
            "OBX",
            vec![
                Field::literal("1"),
                Field::literal("NM"),
                Field::literal("A"),
                Field::default(),
                Field::literal("1"),
            ],
        );
        let msg = Message::from_parts(raw, vec![Node::Segment(one_obx)]);
        let out = OruR01Transformer.transform(&msg);
        let obs = observations(&out);
        assert_eq!(obs.len(), 3);
        assert_eq!(obs[2].id, "obs-12345-3");
        assert_eq!(obs[2].value, Some(ObservationValue::String("high".to_string())));
    }

    #[test]
    fn test_observation_fields() {
        let out = OruR01Transformer.transform(&parse(&format!(
            "{}\rOBX|1|NM|GLU^Glucose||5.4|mmol^millimoles per liter",
            HEAD
        )));
        let obs = observations(&out)[0];
        assert_eq!(obs.id, "obs-12345-1");
        assert_eq!(obs.status, ObservationStatus::Final);
        assert_eq!(obs.code.coding[0].code.as_deref(), Some("GLU"));
        assert_eq!(obs.code.text.as_deref(), Some("Glucose"));
        assert_eq!(obs.subject.reference, "Patient/12345");
        assert_eq!(
            obs.effective_date_time.map(|d| d.to_string()).as_deref(),
            Some("2025-01-01T08:30:00+00:00")
        );
        assert_eq!(
            obs.identifier,
            vec![Identifier::new("PLC1"), Identifier::new("FIL1")]
        );
        match &obs.value {
            Some(ObservationValue::Quantity(q)) => {
                assert_eq!(q.value, Decimal::from_str("5.4").unwrap());
                assert_eq!(q.unit.as_deref(), Some("millimoles per liter"));
            }
            other => panic!("expected quantity, got {:?}", other),
        }
    }

    #[test]
    fn test_placeholders_and_fallbacks() {
        let raw = "MSH|^~\\&|A|B|C|D|2025||ORU^R01|1|P|2.5\r\
                   OBR|1||||||20250101\r\
                   OBX|1|ST|||\r\
                   OBX|2|NM|K||4.1|mmol";
        let out = OruR01Transformer.transform(&parse(raw));
        let obs = observations(&out);

        assert_eq!(obs[0].id, "obs-unknown-1");
        assert_eq!(obs[0].code.text.as_deref(), Some(UNSPECIFIED_OBSERVATION));
        assert!(obs[0].code.coding.is_empty());
        assert!(obs[0].value.is_none());
        assert_eq!(
            obs[0].effective_date_time.map(|d| d.to_string()).as_deref(),
            Some("2025-01-01T00:00:00+00:00")
        );
        assert!(obs[0].identifier.is_empty());

        match &obs[1].value {
            Some(ObservationValue::Quantity(q)) => assert_eq!(q.unit.as_deref(), Some("mmol")),
            other => panic!("expected quantity, got {:?}", other),
        }
    }

    #[test]
    fn test_applies_variants() {
        let with_type = |t: &str| parse(&format!("MSH|^~\\&|A|B|C|D|2025||{}|1|P|2.5", t));
        assert!(OruR01Transformer.applies(&with_type("ORU^R01")));
        assert!(OruR01Transformer.applies(&with_type("oru^r01")));
        assert!(OruR01Transformer.applies(&with_type("ORU^R01^ORU_R01")));
        assert!(!OruR01Transformer.applies(&with_type("ORU^R03")));
        assert!(!OruR01Transformer.applies(&with_type("ORU^R011")));
        assert!(!OruR01Transformer.applies(&with_type("ORU^R01X")));
        assert!(!OruR01Transformer.applies(&with_type("ADT^A01")));
        assert!(!OruR01Transformer.applies(&Message::from_parts("", vec![])));
    }

    #[test]
    fn test_text_only_message_with_declared_delimiters() {
        let parsed = parse(
            "MSH|#~\\&|LAB|HOSP|EHR|HOSP|2025||ORU#R01|M1|P|2.5\r\
             PID|1||77\r\
             OBX|1|ST|NOTE#Note||a^b",
        );
        let msg = Message::from_parts(parsed.to_er7(), vec![])
            .with_delimiters(parsed.delimiters().clone());

        let out = OruR01Transformer.transform(&msg);
        let obs = observations(&out);
        assert_eq!(out[0].id(), Some("77"));
        assert_eq!(obs.len(), 1);
        assert_eq!(obs[0].code.coding[0].code.as_deref(), Some("NOTE"));
        assert_eq!(obs[0].value, Some(ObservationValue::String("a^b".to_string())));
        assert!(OruR01Transformer.applies(&msg));
    }

    #[test]
    fn test_empty_obx_node_keeps_pairing() {
        let msg = parse(&format!("{}\rOBX|\rOBX|2|NM|B||2", HEAD));
        let obs = observations(&OruR01Transformer.transform(&msg))
            .into_iter()
            .cloned()
            .collect::<Vec<_>>();
        assert_eq!(obs.len(), 2);
        assert!(obs[0].value.is_none());
        assert_eq!(obs[1].code.coding[0].code.as_deref(), Some("B"));
    }

    #[test]
    fn test_synthetic_ids_are_stable() {
        let msg = parse(&format!("{}\rOBX|1|NM|A||1\rOBX|2|NM|B||2", HEAD));
        let first = OruR01Transformer.transform(&msg);
        let second = OruR01Transformer.transform(&msg);
        assert_eq!(first, second);
        let ids: Vec<_> = observations(&first).iter().map(|o| o.id.clone()).collect();
        assert_eq!(ids, vec!["obs-12345-1", "obs-12345-2"]);
    }
}
