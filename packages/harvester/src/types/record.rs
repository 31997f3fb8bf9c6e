//! The structured output schema.
//!
//! One `StructuredRecord` is produced per target site from the aggregate
//! of its classified raw payloads. The JSON schema derived from these
//! types is both embedded in the structuring prompt and enforced by
//! deterministic post-validation; the model is never trusted verbatim.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Schema-conformant structured output for one municipal site.
///
/// Every array field defaults to empty rather than absent.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct StructuredRecord {
    /// Brief summary of the site's content
    pub overview: String,

    /// Name of the city, if mentioned
    pub city_name: String,

    #[serde(default)]
    pub departments: Vec<String>,

    #[serde(default)]
    pub services: Vec<String>,

    #[serde(default)]
    pub contacts: Vec<Contact>,

    #[serde(default)]
    pub meetings: Vec<Meeting>,

    #[serde(default)]
    pub documents: Vec<DocumentRef>,

    #[serde(default)]
    pub news: Vec<NewsItem>,

    #[serde(default)]
    pub forms: Vec<FormRecord>,

    pub signup_info: SignupInfo,

    #[serde(default)]
    pub office_hours: Option<OfficeHours>,

    /// Any other relevant city information
    #[serde(default)]
    pub other_info: Option<String>,
}

/// A named contact at the city.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct Contact {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub department: String,
}

/// A public meeting or event.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct Meeting {
    pub title: String,
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub time: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub agenda: String,
}

/// A referenced document (ordinance, report, agenda, ...).
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct DocumentRef {
    pub title: String,
    #[serde(default, rename = "type")]
    pub doc_type: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub description: String,
}

/// A news or announcement item.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct NewsItem {
    pub title: String,
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub summary: String,
}

/// A described form. Forms are detected and described, never submitted.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct FormRecord {
    pub name: String,
    /// signup / login / contact / application / subscription / other
    #[serde(default, rename = "type")]
    pub form_type: String,
    #[serde(default)]
    pub purpose: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub fields: Vec<String>,
    #[serde(default)]
    pub requirements: Vec<String>,
}

/// How residents sign up for city services.
///
/// `available` must be consistent with whether any input payload was
/// classified signup-bearing; the structuring engine forces it.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct SignupInfo {
    pub available: bool,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub requirements: Vec<String>,
    #[serde(default)]
    pub benefits: Vec<String>,
}

/// Posted office hours.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct OfficeHours {
    #[serde(default)]
    pub days: String,
    #[serde(default)]
    pub hours: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub phone: String,
}

impl StructuredRecord {
    /// The JSON schema the model output must conform to.
    pub fn json_schema() -> serde_json::Value {
        let schema = schemars::schema_for!(StructuredRecord);
        serde_json::to_value(schema).unwrap_or_default()
    }

    /// Field names that must be present in model output, with the array
    /// fields among them. Used by deterministic validation.
    pub fn required_fields() -> &'static [&'static str] {
        &[
            "overview",
            "city_name",
            "departments",
            "services",
            "contacts",
            "meetings",
            "documents",
            "forms",
            "signup_info",
        ]
    }

    /// The subset of required fields that must be JSON arrays.
    pub fn array_fields() -> &'static [&'static str] {
        &[
            "departments",
            "services",
            "contacts",
            "meetings",
            "documents",
            "forms",
        ]
    }
}
