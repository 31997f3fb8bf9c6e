//! Regex-based HTML helpers: text extraction, titles, links, and forms.
//!
//! Deliberately lightweight: municipal sites are messy enough that a
//! full DOM parser buys little over targeted patterns, and every
//! extraction here is re-checked downstream (classifier, structuring
//! validation) anyway.

use regex::Regex;
use std::sync::OnceLock;
use url::Url;

use crate::types::payload::{FormField, FormInfo, FormType};

fn re(cell: &'static OnceLock<Regex>, pattern: &str) -> &'static Regex {
    cell.get_or_init(|| Regex::new(pattern).expect("static regex"))
}

macro_rules! static_re {
    ($pattern:expr) => {{
        static CELL: OnceLock<Regex> = OnceLock::new();
        re(&CELL, $pattern)
    }};
}

/// Convert HTML to readable text, stripping scripts, styles, and tags.
pub fn html_to_text(html: &str) -> String {
    let mut text = html.to_string();

    // Remove scripts and styles
    text = static_re!(r"(?is)<script[^>]*>.*?</script>")
        .replace_all(&text, "")
        .to_string();
    text = static_re!(r"(?is)<style[^>]*>.*?</style>")
        .replace_all(&text, "")
        .to_string();

    // Headers and block elements become line breaks
    text = static_re!(r"(?is)<(h[1-6]|p|div|tr|li|br)[^>]*>")
        .replace_all(&text, "\n")
        .to_string();

    // Remaining tags
    text = static_re!(r"<[^>]+>").replace_all(&text, " ").to_string();

    // Entities
    text = text
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'");

    // Collapse whitespace
    text = static_re!(r"[ \t]{2,}").replace_all(&text, " ").to_string();
    text = static_re!(r"\n{3,}").replace_all(&text, "\n\n").to_string();

    text.trim().to_string()
}

/// Extract the document title.
pub fn extract_title(html: &str) -> Option<String> {
    static_re!(r"(?is)<title[^>]*>(.*?)</title>")
        .captures(html)
        .and_then(|cap| cap.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|t| !t.is_empty())
}

/// Extract absolute links from href attributes, resolved against `base`.
///
/// Anchors, javascript:, mailto:, and tel: links are skipped.
pub fn extract_links(base: &Url, html: &str) -> Vec<String> {
    let mut links = Vec::new();

    for cap in static_re!(r#"href\s*=\s*["']([^"']+)["']"#).captures_iter(html) {
        let Some(href) = cap.get(1) else { continue };
        let href = href.as_str();

        if href.starts_with('#')
            || href.starts_with("javascript:")
            || href.starts_with("mailto:")
            || href.starts_with("tel:")
        {
            continue;
        }

        if let Ok(resolved) = base.join(href) {
            links.push(resolved.to_string());
        }
    }

    links
}

/// Whether a URL points at a document format we hand to the document
/// extraction strategy.
pub fn is_document_url(url: &str) -> bool {
    let path = Url::parse(url)
        .map(|u| u.path().to_lowercase())
        .unwrap_or_else(|_| url.to_lowercase());
    [".pdf", ".doc", ".docx"]
        .iter()
        .any(|ext| path.ends_with(ext))
}

/// Parse `<form>` blocks and their fields out of HTML.
pub fn parse_forms(html: &str) -> Vec<FormInfo> {
    let form_re = static_re!(r"(?is)<form([^>]*)>(.*?)</form>");
    let mut forms = Vec::new();

    for (i, cap) in form_re.captures_iter(html).enumerate() {
        let attrs = cap.get(1).map(|m| m.as_str()).unwrap_or("");
        let body = cap.get(2).map(|m| m.as_str()).unwrap_or("");

        let fields = parse_fields(body);
        let text = html_to_text(body);
        let excerpt: String = text.chars().take(500).collect();
        let form_type = classify_form_type(&text, &fields);

        forms.push(FormInfo {
            id: attr_value(attrs, "id").unwrap_or_else(|| format!("form_{}", i)),
            action: attr_value(attrs, "action").unwrap_or_default(),
            method: attr_value(attrs, "method")
                .unwrap_or_else(|| "GET".into())
                .to_uppercase(),
            form_type,
            fields,
            text_excerpt: excerpt,
        });
    }

    forms
}

/// Parse input/select/textarea fields inside a form body.
fn parse_fields(body: &str) -> Vec<FormField> {
    let field_re = static_re!(r"(?is)<(input|select|textarea)([^>]*)>");
    let mut fields = Vec::new();

    for cap in field_re.captures_iter(body) {
        let tag = cap.get(1).map(|m| m.as_str().to_lowercase()).unwrap_or_default();
        let attrs = cap.get(2).map(|m| m.as_str()).unwrap_or("");

        let field_type = match tag.as_str() {
            "select" => "select".to_string(),
            "textarea" => "textarea".to_string(),
            _ => attr_value(attrs, "type").unwrap_or_else(|| "text".into()),
        };

        // Hidden inputs and buttons carry no user-facing signal
        if matches!(field_type.as_str(), "hidden" | "submit" | "button" | "image") {
            continue;
        }

        let id = attr_value(attrs, "id").unwrap_or_default();
        let label = if id.is_empty() {
            String::new()
        } else {
            label_for(body, &id).unwrap_or_default()
        };

        fields.push(FormField {
            name: attr_value(attrs, "name").unwrap_or_default(),
            field_type,
            label,
            placeholder: attr_value(attrs, "placeholder").unwrap_or_default(),
            required: static_re!(r"(?i)\brequired\b").is_match(attrs),
        });
    }

    fields
}

/// Find the text of a `<label for="...">` matching a field id.
fn label_for(body: &str, id: &str) -> Option<String> {
    static_re!(r"(?is)<label([^>]*)>(.*?)</label>")
        .captures_iter(body)
        .find(|cap| {
            cap.get(1)
                .and_then(|m| attr_value(m.as_str(), "for"))
                .as_deref()
                == Some(id)
        })
        .and_then(|cap| cap.get(2))
        .map(|m| html_to_text(m.as_str()))
        .filter(|t| !t.is_empty())
}

/// Pull one attribute's value out of a tag's attribute string. A single
/// precompiled scan; the attribute name is matched case-insensitively.
fn attr_value(attrs: &str, name: &str) -> Option<String> {
    static_re!(r#"([a-zA-Z][a-zA-Z0-9_-]*)\s*=\s*["']([^"']*)["']"#)
        .captures_iter(attrs)
        .find(|cap| {
            cap.get(1)
                .map_or(false, |m| m.as_str().eq_ignore_ascii_case(name))
        })
        .and_then(|cap| cap.get(2))
        .map(|m| m.as_str().trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Classify a form from its visible text and field names.
pub fn classify_form_type(form_text: &str, fields: &[FormField]) -> FormType {
    let text = form_text.to_lowercase();
    let field_names: Vec<String> = fields.iter().map(|f| f.name.to_lowercase()).collect();

    let any = |keywords: &[&str]| keywords.iter().any(|k| text.contains(k));

    if any(&["sign up", "register", "create account", "join", "signup", "registration"]) {
        return FormType::Signup;
    }
    if any(&["sign in", "login", "log in", "signin"]) {
        return FormType::Login;
    }
    if any(&["contact", "message", "inquiry", "feedback"]) {
        return FormType::Contact;
    }
    if any(&["apply", "application", "permit", "license", "request"]) {
        return FormType::Application;
    }
    if field_names.iter().any(|n| n == "email") && any(&["subscribe", "newsletter"]) {
        return FormType::Subscription;
    }
    if field_names.iter().any(|n| n == "search" || n == "q") {
        return FormType::Search;
    }

    FormType::Other
}

#[cfg(test)]
mod tests {
    use super::*;

    const SIGNUP_FORM: &str = r#"
        <form id="resident-signup" action="/register" method="post">
            <h2>Sign up for city services</h2>
            <label for="email-input">Email address</label>
            <input type="email" name="email" id="email-input" required>
            <input type="text" name="full_name" placeholder="Full name">
            <input type="hidden" name="csrf" value="x">
            <input type="submit" value="Register">
        </form>
    "#;

    #[test]
    fn test_html_to_text_strips_markup() {
        let html = "<html><script>var x=1;</script><h1>City Hall</h1><p>Open &amp; staffed.</p></html>";
        let text = html_to_text(html);

        assert!(text.contains("City Hall"));
        assert!(text.contains("Open & staffed."));
        assert!(!text.contains("var x"));
        assert!(!text.contains('<'));
    }

    #[test]
    fn test_extract_links_resolves_and_filters() {
        let base = Url::parse("https://example-city.gov/services/").unwrap();
        let html = r##"
            <a href="/permits">Permits</a>
            <a href="trash.html">Trash pickup</a>
            <a href="#top">Top</a>
            <a href="mailto:clerk@example-city.gov">Clerk</a>
        "##;

        let links = extract_links(&base, html);

        assert!(links.contains(&"https://example-city.gov/permits".to_string()));
        assert!(links.contains(&"https://example-city.gov/services/trash.html".to_string()));
        assert_eq!(links.len(), 2);
    }

    #[test]
    fn test_is_document_url() {
        assert!(is_document_url("https://example-city.gov/agenda.pdf"));
        assert!(is_document_url("https://example-city.gov/files/budget.PDF?v=2"));
        assert!(!is_document_url("https://example-city.gov/agenda"));
    }

    #[test]
    fn test_parse_forms_extracts_fields_and_labels() {
        let forms = parse_forms(SIGNUP_FORM);
        assert_eq!(forms.len(), 1);

        let form = &forms[0];
        assert_eq!(form.id, "resident-signup");
        assert_eq!(form.action, "/register");
        assert_eq!(form.method, "POST");
        assert_eq!(form.form_type, FormType::Signup);

        // hidden + submit skipped
        assert_eq!(form.fields.len(), 2);
        let email = &form.fields[0];
        assert_eq!(email.name, "email");
        assert_eq!(email.field_type, "email");
        assert_eq!(email.label, "Email address");
        assert!(email.required);
    }

    #[test]
    fn test_attribute_lookup_is_case_insensitive() {
        let html = r#"<form ID="f1" ACTION="/go" Method="Post">
            <label FOR="em">Email</label>
            <input NAME="email" TYPE="email" id="em">
        </form>"#;

        let forms = parse_forms(html);
        assert_eq!(forms[0].id, "f1");
        assert_eq!(forms[0].action, "/go");
        assert_eq!(forms[0].method, "POST");
        assert_eq!(forms[0].fields[0].name, "email");
        assert_eq!(forms[0].fields[0].label, "Email");
    }

    #[test]
    fn test_classify_form_type() {
        let login = classify_form_type("Please log in to continue", &[]);
        assert_eq!(login, FormType::Login);

        let search_fields = vec![FormField {
            name: "q".into(),
            field_type: "text".into(),
            ..Default::default()
        }];
        assert_eq!(classify_form_type("", &search_fields), FormType::Search);

        let newsletter_fields = vec![FormField {
            name: "email".into(),
            field_type: "email".into(),
            ..Default::default()
        }];
        assert_eq!(
            classify_form_type("Subscribe to our newsletter", &newsletter_fields),
            FormType::Subscription
        );
    }
}
