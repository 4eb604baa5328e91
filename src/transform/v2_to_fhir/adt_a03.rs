//! ADT^A03 (discharge/end visit).

use crate::hl7::Message;
use crate::resources::{EncounterStatus, Record, Resource};
use crate::transform::Transformer;

use super::common::{build_encounter, build_patient, locate};

/// Discharge: Patient plus a finished Encounter.
#[derive(Debug, Clone, Copy, Default)]
pub struct AdtA03Transformer;

impl Transformer for AdtA03Transformer {
    fn event(&self) -> &'static str {
        "ADT^A03"
    }

    fn transform(&self, message: &Message) -> Vec<Resource> {
        let patient = build_patient(&locate(message, "PID"));
        let encounter = build_encounter(
            &locate(message, "PV1"),
            patient.id(),
            Some(EncounterStatus::Finished),
        );
        vec![patient.into(), encounter.into()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hl7::{parse_message, ParseOptions};

    fn pv1(fields: &[(usize, &str)]) -> String {
        let mut line = vec![""; 46];
        line[0] = "PV1";
        for &(i, v) in fields {
            line[i] = v;
        }
        line.join("|")
    }

    fn message(pv1: &str) -> Message {
        parse_message(
            &format!(
                "MSH|^~\\&|A|B|C|D|2025||ADT^A03|1|P|2.5\rPID|1||555||Roe^Ann\r{}",
                pv1
            ),
            &ParseOptions::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_discharge_encounter() {
        let msg = message(&pv1(&[(2, "I"), (19, "V9"), (44, "20250101"), (45, "20250103120000")]));
        let out = AdtA03Transformer.transform(&msg);
        assert_eq!(out.len(), 2);

        let json: serde_json::Value = serde_json::from_str(&out[1].to_json().unwrap()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "resourceType": "Encounter",
                "id": "V9",
                "status": "finished",
                "class": {"coding": [{"code": "I"}]},
                "subject": {"reference": "Patient/555"},
                "period": {"start": "2025-01-01", "end": "2025-01-03"}
            })
        );
    }

    #[test]
    fn test_discharge_fallbacks() {
        let msg = message("PV1|1");
        let Resource::Encounter(e) = &AdtA03Transformer.transform(&msg)[1] else {
            panic!("expected encounter");
        };
        assert_eq!(e.id, "enc-555");
        assert!(e.class.is_unspecified());
        assert!(e.period.is_none());
        assert_eq!(e.status, Some(EncounterStatus::Finished));
    }

    #[test]
    fn test_invalid_period_dates_dropped() {
        let msg = message(&pv1(&[(44, "2025"), (45, "notadate")]));
        let Resource::Encounter(e) = &AdtA03Transformer.transform(&msg)[1] else {
            panic!("expected encounter");
        };
        let period = e.period.as_ref().unwrap();
        assert_eq!(period.start.map(|d| d.to_string()).as_deref(), Some("2025"));
        assert!(period.end.is_none());
    }
}
