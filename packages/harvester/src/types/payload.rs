//! Raw payloads and their classifier-assigned content kinds.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::types::job::StrategyKind;

/// What a raw payload contains. Kinds are additive tags, not exclusive:
/// a page can be both `Plain` and `FormBearing`.
///
/// Assigned by the classifier, never by the fetch strategy, because
/// detection requires inspecting content independent of how it was
/// fetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    Plain,
    FormBearing,
    Signup,
    Document,
}

/// Form categories detected on municipal pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormType {
    Signup,
    Login,
    Contact,
    Application,
    Subscription,
    Search,
    Other,
}

impl Default for FormType {
    fn default() -> Self {
        Self::Other
    }
}

/// One input, select, or textarea inside a form.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FormField {
    pub name: String,
    pub field_type: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub placeholder: String,
    #[serde(default)]
    pub required: bool,
}

/// A detected `<form>`: described, never filled in or submitted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormInfo {
    pub id: String,
    pub action: String,
    pub method: String,
    pub form_type: FormType,
    #[serde(default)]
    pub fields: Vec<FormField>,

    /// First few hundred characters of the form's visible text
    #[serde(default)]
    pub text_excerpt: String,
}

impl FormInfo {
    /// Whether the form exposes at least one named field.
    ///
    /// The escalator's completeness check requires this for any payload
    /// classified form-bearing; a login wall with no extracted fields is
    /// deemed incomplete.
    pub fn has_named_fields(&self) -> bool {
        self.fields.iter().any(|f| !f.name.trim().is_empty())
    }
}

/// Raw content for one URL, as accepted by the escalator.
///
/// Owned by the artifact store once written; read-only afterward. The
/// ledger references it by `content_hash`-independent artifact key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawPayload {
    pub url: String,

    /// Classifier-assigned kinds (additive)
    #[serde(default)]
    pub kinds: Vec<ContentKind>,

    /// Extracted text (page text, rendered DOM text, or document text)
    pub text: String,

    /// Forms detected on the page
    #[serde(default)]
    pub forms: Vec<FormInfo>,

    /// In-page links, for depth-bounded discovery
    #[serde(default)]
    pub links: Vec<String>,

    /// MIME type reported by the source, when known
    pub content_type: Option<String>,

    /// Which strategy produced this payload
    pub source_strategy: StrategyKind,

    pub fetched_at: DateTime<Utc>,

    /// SHA-256 of `text`, for deduplication
    pub content_hash: String,
}

impl RawPayload {
    /// Create a payload from extracted text.
    pub fn new(
        url: impl Into<String>,
        text: impl Into<String>,
        source_strategy: StrategyKind,
    ) -> Self {
        let text = text.into();
        let content_hash = Self::hash_content(&text);

        Self {
            url: url.into(),
            kinds: Vec::new(),
            text,
            forms: Vec::new(),
            links: Vec::new(),
            content_type: None,
            source_strategy,
            fetched_at: Utc::now(),
            content_hash,
        }
    }

    /// SHA-256 hex digest of content text.
    pub fn hash_content(text: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(text.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    /// Set detected forms.
    pub fn with_forms(mut self, forms: Vec<FormInfo>) -> Self {
        self.forms = forms;
        self
    }

    /// Set discovered links.
    pub fn with_links(mut self, links: Vec<String>) -> Self {
        self.links = links;
        self
    }

    /// Set the reported content type.
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Whether any non-whitespace text was extracted.
    pub fn has_content(&self) -> bool {
        !self.text.trim().is_empty()
    }

    /// Whether the classifier tagged this payload with a kind.
    pub fn is_kind(&self, kind: ContentKind) -> bool {
        self.kinds.contains(&kind)
    }
}
