//! Normalized clinical records produced by the transformers.
//!
//! Shapes follow FHIR: camelCase keys, absent fields omitted, and a
//! `resourceType` discriminator on every serialized [`Resource`].

use serde::Serialize;

use crate::coercion::{AdministrativeGender, FhirDate, ObservationValue, RequestStatus};

/// Placeholder text for an observation without any code
pub const UNSPECIFIED_OBSERVATION: &str = "Unspecified Observation";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identifier {
    pub value: String,
}

impl Identifier {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct HumanName {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub family: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub given: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct Coding {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,
}

/// Coded concept: codings plus optional free text
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct CodeableConcept {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub coding: Vec<Coding>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl CodeableConcept {
    /// A single-code concept.
    pub fn from_code(code: impl Into<String>) -> Self {
        Self {
            coding: vec![Coding {
                code: Some(code.into()),
                display: None,
            }],
            text: None,
        }
    }

    /// Code and text, either of which may be absent. `None` when both are.
    pub fn from_parts(code: Option<String>, text: Option<String>) -> Option<Self> {
        if code.is_none() && text.is_none() {
            return None;
        }
        let coding = code
            .map(|c| Coding {
                code: Some(c),
                display: None,
            })
            .into_iter()
            .collect();
        Some(Self { coding, text })
    }

    /// Wrapper for a concept the source did not supply.
    pub fn unspecified() -> Self {
        Self {
            coding: Vec::new(),
            text: Some("unspecified".to_string()),
        }
    }

    pub fn is_unspecified(&self) -> bool {
        self.coding.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reference {
    pub reference: String,
}

impl Reference {
    /// `Patient/{id}`, with `unknown` standing in for a missing id.
    pub fn patient(id: Option<&str>) -> Self {
        Self {
            reference: format!("Patient/{}", id.unwrap_or("unknown")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Period {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start: Option<FhirDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end: Option<FhirDate>,
}

impl Period {
    /// `None` when neither bound is known.
    pub fn new(start: Option<FhirDate>, end: Option<FhirDate>) -> Option<Self> {
        (start.is_some() || end.is_some()).then_some(Self { start, end })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum EncounterStatus {
    InProgress,
    Finished,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestIntent {
    Order,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ObservationStatus {
    Final,
}

/// Common behaviour of the record types
pub trait Record: Serialize + Into<Resource> {
    /// FHIR resource type name
    const RESOURCE_TYPE: &'static str;

    fn id(&self) -> Option<&str>;
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedPatient {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub identifier: Vec<Identifier>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub name: Vec<HumanName>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub birth_date: Option<FhirDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gender: Option<AdministrativeGender>,
}

impl Record for NormalizedPatient {
    const RESOURCE_TYPE: &'static str = "Patient";

    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedEncounter {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<EncounterStatus>,
    pub class: CodeableConcept,
    pub subject: Reference,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub period: Option<Period>,
}

impl Record for NormalizedEncounter {
    const RESOURCE_TYPE: &'static str = "Encounter";

    fn id(&self) -> Option<&str> {
        Some(&self.id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedServiceRequest {
    pub id: String,
    pub status: RequestStatus,
    pub intent: RequestIntent,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<CodeableConcept>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub identifier: Vec<Identifier>,
    pub subject: Reference,
}

impl Record for NormalizedServiceRequest {
    const RESOURCE_TYPE: &'static str = "ServiceRequest";

    fn id(&self) -> Option<&str> {
        Some(&self.id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedObservation {
    pub id: String,
    pub status: ObservationStatus,
    pub code: CodeableConcept,
    pub subject: Reference,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub effective_date_time: Option<FhirDate>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub identifier: Vec<Identifier>,
    #[serde(flatten)]
    pub value: Option<ObservationValue>,
}

impl Record for NormalizedObservation {
    const RESOURCE_TYPE: &'static str = "Observation";

    fn id(&self) -> Option<&str> {
        Some(&self.id)
    }
}

/// Any record a transformer can produce
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "resourceType")]
pub enum Resource {
    Patient(NormalizedPatient),
    Encounter(NormalizedEncounter),
    ServiceRequest(NormalizedServiceRequest),
    Observation(NormalizedObservation),
}

impl Resource {
    pub fn resource_type(&self) -> &'static str {
        match self {
            Resource::Patient(_) => NormalizedPatient::RESOURCE_TYPE,
            Resource::Encounter(_) => NormalizedEncounter::RESOURCE_TYPE,
            Resource::ServiceRequest(_) => NormalizedServiceRequest::RESOURCE_TYPE,
            Resource::Observation(_) => NormalizedObservation::RESOURCE_TYPE,
        }
    }

    pub fn id(&self) -> Option<&str> {
        match self {
            Resource::Patient(r) => r.id(),
            Resource::Encounter(r) => r.id(),
            Resource::ServiceRequest(r) => r.id(),
            Resource::Observation(r) => r.id(),
        }
    }

    /// Convert to compact JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Convert to pretty-printed JSON
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Convert to an NDJSON line (newline-terminated)
    pub fn to_ndjson_line(&self) -> Result<String, serde_json::Error> {
        let json = self.to_json()?;
        Ok(format!("{}\n", json))
    }
}

impl From<NormalizedPatient> for Resource {
    fn from(r: NormalizedPatient) -> Self {
        Resource::Patient(r)
    }
}

impl From<NormalizedEncounter> for Resource {
    fn from(r: NormalizedEncounter) -> Self {
        Resource::Encounter(r)
    }
}

impl From<NormalizedServiceRequest> for Resource {
    fn from(r: NormalizedServiceRequest) -> Self {
        Resource::ServiceRequest(r)
    }
}

impl From<NormalizedObservation> for Resource {
    fn from(r: NormalizedObservation) -> Self {
        Resource::Observation(r)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coercion::{normalize_date, Quantity};
    use rust_decimal::Decimal;
    use serde_json::json;

    fn value_of(resource: &Resource) -> serde_json::Value {
        serde_json::from_str(&resource.to_json().unwrap()).unwrap()
    }

    #[test]
    fn test_empty_patient_serializes_type_only() {
        let r = Resource::from(NormalizedPatient::default());
        assert_eq!(r.to_json().unwrap(), r#"{"resourceType":"Patient"}"#);
        assert_eq!(r.resource_type(), "Patient");
        assert_eq!(r.id(), None);
    }

    #[test]
    fn test_patient_shape() {
        let r = Resource::from(NormalizedPatient {
            id: Some("12345".to_string()),
            identifier: vec![Identifier::new("12345")],
            name: vec![HumanName {
                family: Some("Doe".to_string()),
                given: vec!["John".to_string()],
            }],
            birth_date: normalize_date("19700101"),
            gender: Some(AdministrativeGender::Male),
        });
        assert_eq!(
            value_of(&r),
            json!({
                "resourceType": "Patient",
                "id": "12345",
                "identifier": [{"value": "12345"}],
                "name": [{"family": "Doe", "given": ["John"]}],
                "birthDate": "1970-01-01",
                "gender": "male"
            })
        );
    }

    #[test]
    fn test_encounter_shape() {
        let r = Resource::from(NormalizedEncounter {
            id: "enc-unknown".to_string(),
            status: Some(EncounterStatus::InProgress),
            class: CodeableConcept::unspecified(),
            subject: Reference::patient(None),
            period: Period::new(normalize_date("20250101"), None),
        });
        assert_eq!(
            value_of(&r),
            json!({
                "resourceType": "Encounter",
                "id": "enc-unknown",
                "status": "in-progress",
                "class": {"text": "unspecified"},
                "subject": {"reference": "Patient/unknown"},
                "period": {"start": "2025-01-01"}
            })
        );
        assert!(Period::new(None, None).is_none());
    }

    #[test]
    fn test_observation_value_flattening() {
        let obs = NormalizedObservation {
            id: "obs-1-1".to_string(),
            status: ObservationStatus::Final,
            code: CodeableConcept::from_code("GLU"),
            subject: Reference::patient(Some("1")),
            effective_date_time: None,
            identifier: vec![],
            value: Some(ObservationValue::Quantity(Quantity {
                value: Decimal::new(54, 1),
                unit: Some("mmol/L".to_string()),
            })),
        };
        let v = value_of(&obs.clone().into());
        assert_eq!(v["valueQuantity"], json!({"value": 5.4, "unit": "mmol/L"}));
        assert!(v.get("valueString").is_none());

        let text = NormalizedObservation {
            value: Some(ObservationValue::String("positive".to_string())),
            ..obs.clone()
        };
        assert_eq!(value_of(&text.into())["valueString"], "positive");

        let none = NormalizedObservation { value: None, ..obs };
        let v = value_of(&none.into());
        assert!(v.get("valueQuantity").is_none() && v.get("valueString").is_none());
    }

    #[test]
    fn test_codeable_concept_from_parts() {
        assert!(CodeableConcept::from_parts(None, None).is_none());
        let cc = CodeableConcept::from_parts(None, Some("Chest X-ray".to_string())).unwrap();
        assert!(cc.coding.is_empty());
        assert!(CodeableConcept::unspecified().is_unspecified());
        assert!(!CodeableConcept::from_code("I").is_unspecified());
    }

    #[test]
    fn test_ndjson_line() {
        let r = Resource::from(NormalizedPatient::default());
        let line = r.to_ndjson_line().unwrap();
        assert!(line.ends_with('\n'));
        assert_eq!(line.matches('\n').count(), 1);
    }
}
