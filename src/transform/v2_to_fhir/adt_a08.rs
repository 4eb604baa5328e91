//! ADT^A08 (update patient information).

use crate::hl7::Message;
use crate::resources::{EncounterStatus, Record, Resource};
use crate::transform::Transformer;

use super::common::{build_encounter, build_patient, locate};

/// Update: Patient plus an in-progress Encounter.
#[derive(Debug, Clone, Copy, Default)]
pub struct AdtA08Transformer;

impl Transformer for AdtA08Transformer {
    fn event(&self) -> &'static str {
        "ADT^A08"
    }

    fn transform(&self, message: &Message) -> Vec<Resource> {
        let patient = build_patient(&locate(message, "PID"));
        let encounter = build_encounter(
            &locate(message, "PV1"),
            patient.id(),
            Some(EncounterStatus::InProgress),
        );
        vec![patient.into(), encounter.into()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hl7::{parse_message, Field, Node, ParseOptions, Segment};

    #[test]
    fn test_update_without_pid_or_pv1() {
        let msg = parse_message(
            "MSH|^~\\&|A|B|C|D|2025||ADT^A08|1|P|2.5",
            &ParseOptions::default(),
        )
        .unwrap();
        let out = AdtA08Transformer.transform(&msg);
        assert_eq!(out.len(), 2);
        let Resource::Encounter(e) = &out[1] else {
            panic!("expected encounter");
        };
        assert_eq!(e.status, Some(EncounterStatus::InProgress));
        assert_eq!(e.subject.reference, "Patient/unknown");
        assert_eq!(e.id, "enc-unknown");
    }

    #[test]
    fn test_name_from_raw_when_tree_is_placeholder() {
        // The tree carries an empty PID while the text has the real values
        let msg = Message::from_parts(
            "MSH|^~\\&|A|B|C|D|2025||ADT^A08|1|P|2.5\rPID|1||777||Smith^Jane||19851231|F",
            vec![Node::Segment(Segment::new("PID", vec![Field::default()]))],
        );
        let out = AdtA08Transformer.transform(&msg);
        let Resource::Patient(p) = &out[0] else {
            panic!("expected patient");
        };
        assert_eq!(p.id.as_deref(), Some("777"));
        assert_eq!(p.name[0].family.as_deref(), Some("Smith"));
        assert_eq!(p.name[0].given, vec!["Jane".to_string()]);
        assert_eq!(p.birth_date.map(|d| d.to_string()).as_deref(), Some("1985-12-31"));
    }

    #[test]
    fn test_transform_is_deterministic() {
        let msg = parse_message(
            "MSH|^~\\&|A|B|C|D|2025||ADT^A08|1|P|2.5\rPV1|1|O",
            &ParseOptions::default(),
        )
        .unwrap();
        assert_eq!(AdtA08Transformer.transform(&msg), AdtA08Transformer.transform(&msg));
    }
}
