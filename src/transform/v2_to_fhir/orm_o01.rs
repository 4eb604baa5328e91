//! ORM^O01 (general order).

use tracing::debug;

use crate::coercion::map_order_status;
use crate::hl7::Message;
use crate::resources::{
    CodeableConcept, Identifier, NormalizedServiceRequest, Record, Reference, RequestIntent,
    Resource,
};
use crate::transform::Transformer;

use super::common::{build_patient, locate};

/// Order: Patient plus a ServiceRequest.
///
/// The order number is the placer number (ORC-2), else the filler number
/// (ORC-3); without either the id is derived from the patient.
#[derive(Debug, Clone, Copy, Default)]
pub struct OrmO01Transformer;

impl Transformer for OrmO01Transformer {
    fn event(&self) -> &'static str {
        "ORM^O01"
    }

    fn transform(&self, message: &Message) -> Vec<Resource> {
        let patient = build_patient(&locate(message, "PID"));
        let orc = locate(message, "ORC");
        let obr = locate(message, "OBR");

        let order_number = orc.value(2, 1).or_else(|| orc.value(3, 1));
        let id = order_number
            .clone()
            .unwrap_or_else(|| format!("sr-{}", patient.id().unwrap_or("unknown")));
        if order_number.is_none() {
            debug!(id = %id, "No placer or filler number, using derived id");
        }

        let request = NormalizedServiceRequest {
            id,
            status: map_order_status(orc.value(5, 1).as_deref()),
            intent: RequestIntent::Order,
            code: CodeableConcept::from_parts(obr.value(4, 1), obr.value(4, 2)),
            identifier: order_number.map(Identifier::new).into_iter().collect(),
            subject: Reference::patient(patient.id()),
        };
        vec![patient.into(), request.into()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coercion::RequestStatus;
    use crate::hl7::{parse_message, ParseOptions};

    fn transform(body: &str) -> NormalizedServiceRequest {
        let msg = parse_message(
            &format!("MSH|^~\\&|A|B|C|D|2025||ORM^O01|1|P|2.5\rPID|1||42\r{}", body),
            &ParseOptions::default().with_groups(),
        )
        .unwrap();
        let out = OrmO01Transformer.transform(&msg);
        assert_eq!(out.len(), 2);
        match out.into_iter().nth(1) {
            Some(Resource::ServiceRequest(sr)) => sr,
            other => panic!("expected service request, got {:?}", other),
        }
    }

    #[test]
    fn test_placer_number_preferred() {
        let sr = transform("ORC|NW|PLC100|FIL200||CM\rOBR|1|PLC100||XR-CHEST^Chest X-ray");
        assert_eq!(sr.id, "PLC100");
        assert_eq!(sr.identifier, vec![Identifier::new("PLC100")]);
        assert_eq!(sr.status, RequestStatus::Completed);
        assert_eq!(sr.intent, RequestIntent::Order);
        let code = sr.code.unwrap();
        assert_eq!(code.coding[0].code.as_deref(), Some("XR-CHEST"));
        assert_eq!(code.text.as_deref(), Some("Chest X-ray"));
        assert_eq!(sr.subject.reference, "Patient/42");
    }

    #[test]
    fn test_filler_number_fallback() {
        let sr = transform("ORC|NW||FIL200||IP");
        assert_eq!(sr.id, "FIL200");
        assert_eq!(sr.identifier, vec![Identifier::new("FIL200")]);
        assert_eq!(sr.status, RequestStatus::Active);
        assert!(sr.code.is_none());
    }

    #[test]
    fn test_derived_id_and_default_status() {
        let sr = transform("OBR|1|||^Text only");
        assert_eq!(sr.id, "sr-42");
        assert!(sr.identifier.is_empty());
        assert_eq!(sr.status, RequestStatus::Active);
        let code = sr.code.unwrap();
        assert!(code.coding.is_empty());
        assert_eq!(code.text.as_deref(), Some("Text only"));
    }

    #[test]
    fn test_serialized_shape() {
        let msg = parse_message(
            "MSH|^~\\&|A|B|C|D|2025||ORM^O01|1|P|2.5\rORC|NW|P1",
            &ParseOptions::default(),
        )
        .unwrap();
        let out = OrmO01Transformer.transform(&msg);
        let json: serde_json::Value = serde_json::from_str(&out[1].to_json().unwrap()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "resourceType": "ServiceRequest",
                "id": "P1",
                "status": "active",
                "intent": "order",
                "identifier": [{"value": "P1"}],
                "subject": {"reference": "Patient/unknown"}
            })
        );
    }
}
