//! Content classification.
//!
//! A pure function over fetched content: no I/O, no state. The escalator
//! uses the result both to route post-processing and to decide whether a
//! nominally successful fetch is actually complete enough to stop
//! escalating.

use regex::Regex;
use std::sync::OnceLock;

use crate::traits::fetch::FetchedContent;
use crate::types::payload::{ContentKind, FormInfo};

/// Classifier output: additive kinds plus the heuristics that fired.
#[derive(Debug, Clone, Default)]
pub struct Classification {
    /// All kinds that apply (a page can be both plain and form-bearing)
    pub kinds: Vec<ContentKind>,

    /// 0.0 to 1.0; below [`CONFIDENCE_FLOOR`] is treated as ambiguous
    pub confidence: f32,

    /// Names of the heuristics that fired, for logging and debugging
    pub signals: Vec<String>,
}

/// Below this confidence the escalator treats the payload as incomplete
/// and escalates anyway; downstream correctness outranks a saved fetch.
pub const CONFIDENCE_FLOOR: f32 = 0.3;

impl Classification {
    /// Whether the classifier could assign any kind with confidence.
    pub fn is_ambiguous(&self) -> bool {
        self.kinds.is_empty() || self.confidence < CONFIDENCE_FLOOR
    }

    pub fn has_kind(&self, kind: ContentKind) -> bool {
        self.kinds.contains(&kind)
    }
}

fn signup_keyword_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)sign\s*up|register|create\s*account|join\s*us|registration").unwrap()
    })
}

fn form_markup_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)<form[^>]*>").unwrap())
}

fn event_markup_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?i)class\s*=\s*["'][^"']*(event|calendar|meeting|agenda)[^"']*["']"#)
            .unwrap()
    })
}

/// Classify fetched content into content kinds.
///
/// Kinds are additive tags: conflicting signals (e.g. form markup inside
/// a page that also links documents) produce multiple kinds rather than
/// a priority pick.
pub fn classify(content: &FetchedContent) -> Classification {
    let mut kinds = Vec::new();
    let mut signals = Vec::new();
    let mut confidence: f32 = 0.0;

    let text = content.text.trim();
    let html = content.html.as_deref().unwrap_or("");

    // Document detection: magic bytes or reported MIME type
    let is_pdf_magic = content.bytes.as_deref().is_some_and(|b| b.starts_with(b"%PDF-"));
    let is_doc_mime = content
        .content_type
        .as_deref()
        .is_some_and(|ct| ct.contains("pdf") || ct.contains("msword") || ct.contains("officedocument"));
    if is_pdf_magic || is_doc_mime {
        kinds.push(ContentKind::Document);
        signals.push(if is_pdf_magic { "pdf_magic_bytes" } else { "document_mime" }.to_string());
        confidence = confidence.max(0.9);
    }

    // Form detection: extracted forms, or raw form markup
    let has_extracted_forms = !content.forms.is_empty();
    let has_form_markup = form_markup_re().is_match(html);
    if has_extracted_forms || has_form_markup {
        kinds.push(ContentKind::FormBearing);
        signals.push(if has_extracted_forms { "extracted_forms" } else { "form_markup" }.to_string());
        // Markup alone is weaker evidence than parsed fields
        confidence = confidence.max(if has_extracted_forms { 0.9 } else { 0.6 });
    }

    // Signup detection: registration keywords; a co-present usable form
    // raises confidence
    if signup_keyword_re().is_match(text) || signup_keyword_re().is_match(html) {
        kinds.push(ContentKind::Signup);
        signals.push("signup_keywords".to_string());
        let usable_form = content.forms.iter().any(FormInfo::has_named_fields);
        confidence = confidence.max(if usable_form { 0.95 } else { 0.5 });
    }

    // Calendar/event markup is a routing signal, not a kind of its own
    if event_markup_re().is_match(html) {
        signals.push("event_markup".to_string());
    }

    // Any non-trivial text is at least plain content
    if !text.is_empty() && !kinds.contains(&ContentKind::Document) {
        kinds.push(ContentKind::Plain);
        signals.push("text_content".to_string());
        let base = if text.len() > 200 { 0.8 } else { 0.4 };
        confidence = confidence.max(base);
    }

    Classification {
        kinds,
        confidence,
        signals,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::payload::{FormField, FormType};

    fn content_with_html(html: &str) -> FetchedContent {
        FetchedContent {
            text: crate::html::html_to_text(html),
            html: Some(html.to_string()),
            forms: crate::html::parse_forms(html),
            ..Default::default()
        }
    }

    #[test]
    fn test_plain_page() {
        let c = classify(&content_with_html(
            "<html><body><p>The city of Example maintains twelve parks and a public library \
             open seven days a week. Residents may reserve pavilions for private events by \
             calling the parks department during business hours.</p></body></html>",
        ));

        assert_eq!(c.kinds, vec![ContentKind::Plain]);
        assert!(!c.is_ambiguous());
        assert!(c.signals.contains(&"text_content".to_string()));
    }

    #[test]
    fn test_signup_keyword_with_form_is_signup() {
        let c = classify(&content_with_html(
            r#"<h1>Register for trash collection</h1>
               <form action="/register"><input type="text" name="address"></form>"#,
        ));

        assert!(c.has_kind(ContentKind::Signup));
        assert!(c.has_kind(ContentKind::FormBearing));
        assert!(c.has_kind(ContentKind::Plain));
        assert!(c.confidence >= 0.9);
    }

    #[test]
    fn test_pdf_magic_bytes() {
        let content = FetchedContent {
            text: "Ordinance 2024-01".into(),
            bytes: Some(b"%PDF-1.7 ...".to_vec()),
            ..Default::default()
        };
        let c = classify(&content);

        assert!(c.has_kind(ContentKind::Document));
        assert!(c.signals.contains(&"pdf_magic_bytes".to_string()));
    }

    #[test]
    fn test_empty_content_is_ambiguous() {
        let c = classify(&FetchedContent::default());
        assert!(c.is_ambiguous());
        assert!(c.kinds.is_empty());
    }

    #[test]
    fn test_additive_kinds_for_conflicting_signals() {
        // Form markup and a document MIME type at once: both kinds kept
        let content = FetchedContent {
            text: "Apply using the permit form".into(),
            html: Some(r#"<form><input name="permit_no"></form>"#.into()),
            content_type: Some("application/pdf".into()),
            forms: vec![FormInfo {
                id: "f".into(),
                action: String::new(),
                method: "GET".into(),
                form_type: FormType::Application,
                fields: vec![FormField {
                    name: "permit_no".into(),
                    field_type: "text".into(),
                    ..Default::default()
                }],
                text_excerpt: String::new(),
            }],
            ..Default::default()
        };
        let c = classify(&content);

        assert!(c.has_kind(ContentKind::Document));
        assert!(c.has_kind(ContentKind::FormBearing));
    }
}
