//! Search parameter catalog.
//!
//! The catalog maps `(resource type, parameter key)` to a declared search
//! parameter: its type tag and the extraction path handed to the
//! [`PathResolver`](crate::PathResolver). Universal parameters such as `_id`
//! are declared without a path.

use crate::ResourceType;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Search parameter types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    Number,
    Date,
    String,
    Token,
    Reference,
    Composite,
    Quantity,
    Uri,
    Special,
}

impl std::fmt::Display for ParamType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParamType::Number => write!(f, "number"),
            ParamType::Date => write!(f, "date"),
            ParamType::String => write!(f, "string"),
            ParamType::Token => write!(f, "token"),
            ParamType::Reference => write!(f, "reference"),
            ParamType::Composite => write!(f, "composite"),
            ParamType::Quantity => write!(f, "quantity"),
            ParamType::Uri => write!(f, "uri"),
            ParamType::Special => write!(f, "special"),
        }
    }
}

/// Declaration of one search parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchParamDef {
    /// Query key, e.g. `given` or `_id`
    pub name: String,
    /// Parameter type, selects the evaluator
    pub param_type: ParamType,
    /// Extraction path; `None` for universal parameters
    pub path: Option<String>,
}

impl SearchParamDef {
    /// Declare a parameter with an extraction path.
    pub fn new(name: impl Into<String>, param_type: ParamType, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            param_type,
            path: Some(path.into()),
        }
    }

    /// Declare a universal parameter (no path).
    pub fn universal(name: impl Into<String>, param_type: ParamType) -> Self {
        Self {
            name: name.into(),
            param_type,
            path: None,
        }
    }
}

/// Looks up search parameter declarations.
pub trait SchemaCatalog: Send + Sync {
    /// Find the declaration for `key` on `resource_type`.
    fn lookup(&self, resource_type: &str, key: &str) -> Option<SearchParamDef>;
}

/// Search parameters declared for one resource type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceParams {
    /// Resource type name
    pub resource_type: ResourceType,
    /// Parameter declarations
    pub params: Vec<SearchParamDef>,
}

impl ResourceParams {
    /// Create a new set of declarations.
    pub fn new(resource_type: impl Into<ResourceType>, params: Vec<SearchParamDef>) -> Self {
        Self {
            resource_type: resource_type.into(),
            params,
        }
    }

    /// Find a declaration by key.
    pub fn get(&self, key: &str) -> Option<&SearchParamDef> {
        self.params.iter().find(|p| p.name == key)
    }
}

/// Catalog backed by an in-memory table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StaticCatalog {
    /// Per-type declarations by resource type
    pub resources: HashMap<ResourceType, ResourceParams>,
    /// Declarations shared by every resource type
    pub universal: Vec<SearchParamDef>,
}

impl StaticCatalog {
    /// Create an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) the declarations for a resource type.
    pub fn add_resource(&mut self, resource: ResourceParams) -> &mut Self {
        self.resources
            .insert(resource.resource_type.clone(), resource);
        self
    }

    /// Builder-style method to add a resource type.
    pub fn with_resource(mut self, resource: ResourceParams) -> Self {
        self.add_resource(resource);
        self
    }

    /// Builder-style method to add a universal parameter.
    pub fn with_universal(mut self, param: SearchParamDef) -> Self {
        self.universal.push(param);
        self
    }

    /// Get the declarations for a resource type.
    pub fn get_resource(&self, name: &str) -> Option<&ResourceParams> {
        self.resources.get(name)
    }

    /// Universal parameters every FHIR resource carries.
    pub fn universal_params() -> Vec<SearchParamDef> {
        vec![
            SearchParamDef::universal("_id", ParamType::Token),
            SearchParamDef::universal("_lastUpdated", ParamType::Date),
            SearchParamDef::universal("_tag", ParamType::Token),
            SearchParamDef::universal("_profile", ParamType::Uri),
            SearchParamDef::universal("_security", ParamType::Token),
            SearchParamDef::universal("_source", ParamType::Uri),
            SearchParamDef::universal("_text", ParamType::String),
            SearchParamDef::universal("_content", ParamType::String),
        ]
    }

    /// A subset of the FHIR R4 search parameters for the resource types the
    /// store is most commonly seeded with.
    pub fn r4_core() -> Self {
        use ParamType::*;

        let p = SearchParamDef::new;

        let mut catalog = StaticCatalog::new();
        catalog.universal = Self::universal_params();

        catalog
            .with_resource(ResourceParams::new(
                "Patient",
                vec![
                    p("identifier", Token, "Patient.identifier"),
                    p("name", String, "Patient.name"),
                    p("given", String, "Patient.name.given"),
                    p("family", String, "Patient.name.family"),
                    p("gender", Token, "Patient.gender"),
                    p("birthdate", Date, "Patient.birthDate"),
                    p("active", Token, "Patient.active"),
                    p("telecom", Token, "Patient.telecom"),
                    p("address", String, "Patient.address"),
                    p("address-city", String, "Patient.address.city"),
                    p("general-practitioner", Reference, "Patient.generalPractitioner"),
                    p("link", Reference, "Patient.link.other"),
                    p("organization", Reference, "Patient.managingOrganization"),
                ],
            ))
            .with_resource(ResourceParams::new(
                "Practitioner",
                vec![
                    p("identifier", Token, "Practitioner.identifier"),
                    p("name", String, "Practitioner.name"),
                    p("given", String, "Practitioner.name.given"),
                    p("family", String, "Practitioner.name.family"),
                    p("gender", Token, "Practitioner.gender"),
                    p("active", Token, "Practitioner.active"),
                    p("telecom", Token, "Practitioner.telecom"),
                ],
            ))
            .with_resource(ResourceParams::new(
                "Encounter",
                vec![
                    p("identifier", Token, "Encounter.identifier"),
                    p("status", Token, "Encounter.status"),
                    p("class", Token, "Encounter.class"),
                    p("type", Token, "Encounter.type"),
                    p("subject", Reference, "Encounter.subject"),
                    p("patient", Reference, "Encounter.subject"),
                    p("participant", Reference, "Encounter.participant.individual"),
                    p("practitioner", Reference, "Encounter.participant.individual"),
                    p("date", Date, "Encounter.period.start"),
                    p("length", Quantity, "Encounter.length"),
                ],
            ))
            .with_resource(ResourceParams::new(
                "Observation",
                vec![
                    p("identifier", Token, "Observation.identifier"),
                    p("status", Token, "Observation.status"),
                    p("code", Token, "Observation.code"),
                    p("category", Token, "Observation.category"),
                    p("subject", Reference, "Observation.subject"),
                    p("patient", Reference, "Observation.subject"),
                    p("encounter", Reference, "Observation.encounter"),
                    p("performer", Reference, "Observation.performer"),
                    p("date", Date, "Observation.effectiveDateTime"),
                    p("value-quantity", Quantity, "Observation.valueQuantity"),
                    p("value-string", String, "Observation.valueString"),
                ],
            ))
            .with_resource(ResourceParams::new(
                "RiskAssessment",
                vec![
                    p("identifier", Token, "RiskAssessment.identifier"),
                    p("status", Token, "RiskAssessment.status"),
                    p("method", Token, "RiskAssessment.method"),
                    p("subject", Reference, "RiskAssessment.subject"),
                    p("patient", Reference, "RiskAssessment.subject"),
                    p("probability", Number, "RiskAssessment.prediction.probabilityDecimal"),
                    p("date", Date, "RiskAssessment.occurrenceDateTime"),
                ],
            ))
            .with_resource(ResourceParams::new(
                "AllergyIntolerance",
                vec![
                    p("identifier", Token, "AllergyIntolerance.identifier"),
                    p("code", Token, "AllergyIntolerance.code"),
                    p("clinical-status", Token, "AllergyIntolerance.clinicalStatus"),
                    p("patient", Reference, "AllergyIntolerance.patient"),
                    p("recorder", Reference, "AllergyIntolerance.recorder"),
                    p("date", Date, "AllergyIntolerance.recordedDate"),
                ],
            ))
            .with_resource(ResourceParams::new(
                "Provenance",
                vec![
                    p("target", Reference, "Provenance.target"),
                    p("patient", Reference, "Provenance.target"),
                    p("agent", Reference, "Provenance.agent.who"),
                    p("recorded", Date, "Provenance.recorded"),
                ],
            ))
    }
}

impl SchemaCatalog for StaticCatalog {
    fn lookup(&self, resource_type: &str, key: &str) -> Option<SearchParamDef> {
        self.resources
            .get(resource_type)
            .and_then(|resource| resource.get(key))
            .or_else(|| self.universal.iter().find(|p| p.name == key))
            .cloned()
    }
}
