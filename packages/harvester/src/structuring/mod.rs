//! Structuring engine: segmented content in, validated record out.
//!
//! The model is an untrusted producer. Every response is parsed and
//! validated deterministically; a non-conforming response triggers a
//! bounded repair loop that feeds the violations back. When retries are
//! exhausted, the last raw response is preserved in the error so the
//! orchestrator can store it for later reprocessing.

pub mod prompts;
pub mod schema;

use tracing::{debug, warn};

use crate::error::StructuringError;
use crate::traits::model::StructuringModel;
use crate::types::payload::{ContentKind, RawPayload};
use crate::types::record::StructuredRecord;

/// Produces one [`StructuredRecord`] per target site from the aggregate
/// of its classified payloads.
pub struct StructuringEngine<M: StructuringModel> {
    model: M,
    /// Total model calls allowed per site (first call plus repairs)
    repair_attempts: usize,
    forms_only: bool,
}

impl<M: StructuringModel> StructuringEngine<M> {
    pub fn new(model: M) -> Self {
        Self {
            model,
            repair_attempts: 3,
            forms_only: false,
        }
    }

    /// Set the model-call budget per site (minimum 1).
    pub fn with_repair_attempts(mut self, attempts: usize) -> Self {
        self.repair_attempts = attempts.max(1);
        self
    }

    /// Restrict structuring to form-bearing and signup payloads.
    pub fn with_forms_only(mut self, forms_only: bool) -> Self {
        self.forms_only = forms_only;
        self
    }

    /// Structure one site's payloads into a validated record.
    pub async fn structure_site(
        &self,
        site_url: &str,
        payloads: &[RawPayload],
    ) -> Result<StructuredRecord, StructuringError> {
        let selected: Vec<&RawPayload> = if self.forms_only {
            payloads
                .iter()
                .filter(|p| p.is_kind(ContentKind::FormBearing) || p.is_kind(ContentKind::Signup))
                .collect()
        } else {
            payloads.iter().collect()
        };
        let owned: Vec<RawPayload> = selected.into_iter().cloned().collect();

        let content = prompts::segment_payloads(&owned);
        if content.trim().is_empty() {
            return Err(StructuringError::NoContent);
        }

        let json_schema = StructuredRecord::json_schema();
        let mut prompt = if self.forms_only {
            prompts::build_forms_prompt(&json_schema, site_url, &content)
        } else {
            prompts::build_prompt(&json_schema, site_url, &content)
        };

        let signup_present = owned.iter().any(|p| p.is_kind(ContentKind::Signup));
        let mut last_raw = String::new();

        for attempt in 1..=self.repair_attempts {
            debug!(site = %site_url, attempt = attempt, model = self.model.name(), "structuring call");

            let raw = self
                .model
                .structure(&json_schema, &prompt)
                .await
                .map_err(|e| StructuringError::Model(Box::new(e)))?;
            last_raw = raw.clone();

            let stripped = schema::strip_code_fences(&raw);
            let violations = match serde_json::from_str::<serde_json::Value>(stripped) {
                Ok(value) => {
                    let violations = schema::validate(&value);
                    if violations.is_empty() {
                        match serde_json::from_value::<StructuredRecord>(value) {
                            Ok(mut record) => {
                                // Ground truth from classification outranks
                                // the model's own judgment
                                if signup_present && !record.signup_info.available {
                                    record.signup_info.available = true;
                                }
                                return Ok(record);
                            }
                            Err(e) => vec![format!("field type mismatch: {}", e)],
                        }
                    } else {
                        violations
                    }
                }
                Err(e) => vec![format!("not parseable JSON: {}", e)],
            };

            warn!(
                site = %site_url,
                attempt = attempt,
                violations = violations.len(),
                "model output rejected"
            );
            prompt = prompts::repair_prompt(&json_schema, &violations, stripped);
        }

        Err(StructuringError::RetriesExhausted {
            attempts: self.repair_attempts,
            raw_response: last_raw,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockModel;
    use crate::types::job::StrategyKind;

    fn conforming_json() -> String {
        serde_json::json!({
            "overview": "City portal for Example City",
            "city_name": "Example City",
            "departments": ["Public Works"],
            "services": [],
            "contacts": [],
            "meetings": [],
            "documents": [],
            "forms": [],
            "signup_info": {"available": false}
        })
        .to_string()
    }

    fn plain_payload() -> RawPayload {
        let mut p = RawPayload::new(
            "https://example-city.gov/",
            "Welcome to Example City. Public Works handles snow removal.",
            StrategyKind::RemoteRender,
        );
        p.kinds = vec![ContentKind::Plain];
        p
    }

    #[tokio::test]
    async fn test_conforming_response_is_returned() {
        let model = MockModel::new().with_response(Ok(conforming_json()));
        let engine = StructuringEngine::new(model);

        let record = engine
            .structure_site("https://example-city.gov/", &[plain_payload()])
            .await
            .unwrap();

        assert_eq!(record.city_name, "Example City");
        assert_eq!(record.departments, vec!["Public Works"]);
    }

    #[tokio::test]
    async fn test_fenced_response_is_accepted() {
        let fenced = format!("```json\n{}\n```", conforming_json());
        let model = MockModel::new().with_response(Ok(fenced));
        let engine = StructuringEngine::new(model);

        let record = engine
            .structure_site("https://example-city.gov/", &[plain_payload()])
            .await
            .unwrap();
        assert_eq!(record.city_name, "Example City");
    }

    #[tokio::test]
    async fn test_invalid_json_repaired_on_second_call() {
        let model = MockModel::new()
            .with_response(Ok("here is the data you asked for".to_string()))
            .with_response(Ok(conforming_json()));
        let engine = StructuringEngine::new(model.clone());

        let record = engine
            .structure_site("https://example-city.gov/", &[plain_payload()])
            .await
            .unwrap();

        assert_eq!(record.city_name, "Example City");
        assert_eq!(model.call_count(), 2);
        // The repair prompt carries the violation back to the model
        assert!(model.prompts()[1].contains("not parseable JSON"));
    }

    #[tokio::test]
    async fn test_retries_exhausted_preserves_last_raw() {
        let bad = r#"{"overview": "partial only"}"#;
        let model = MockModel::new()
            .with_response(Ok(bad.to_string()))
            .with_response(Ok(bad.to_string()))
            .with_response(Ok(bad.to_string()));
        let engine = StructuringEngine::new(model.clone()).with_repair_attempts(3);

        let err = engine
            .structure_site("https://example-city.gov/", &[plain_payload()])
            .await
            .unwrap_err();

        match err {
            StructuringError::RetriesExhausted {
                attempts,
                raw_response,
            } => {
                assert_eq!(attempts, 3);
                assert!(raw_response.contains("partial only"));
            }
            other => panic!("expected retries exhausted, got {:?}", other),
        }
        assert_eq!(model.call_count(), 3);
    }

    #[tokio::test]
    async fn test_signup_classification_forces_available() {
        // Model claims no signup; a payload classified signup overrides it
        let model = MockModel::new().with_response(Ok(conforming_json()));
        let engine = StructuringEngine::new(model);

        let mut signup = RawPayload::new(
            "https://example-city.gov/register",
            "Sign up for the resident alert program today.",
            StrategyKind::BrowserAutomation,
        );
        signup.kinds = vec![ContentKind::Plain, ContentKind::Signup];

        let record = engine
            .structure_site("https://example-city.gov/", &[signup])
            .await
            .unwrap();
        assert!(record.signup_info.available);
    }

    #[tokio::test]
    async fn test_no_payloads_is_no_content() {
        let model = MockModel::new();
        let engine = StructuringEngine::new(model);

        let err = engine
            .structure_site("https://example-city.gov/", &[])
            .await
            .unwrap_err();
        assert!(matches!(err, StructuringError::NoContent));
    }

    #[tokio::test]
    async fn test_forms_only_skips_plain_payloads() {
        let model = MockModel::new().with_response(Ok(conforming_json()));
        let engine = StructuringEngine::new(model).with_forms_only(true);

        let err = engine
            .structure_site("https://example-city.gov/", &[plain_payload()])
            .await
            .unwrap_err();
        assert!(matches!(err, StructuringError::NoContent));
    }
}
