//! Prompt assembly and content segmentation for the structuring model.

use crate::types::payload::{ContentKind, RawPayload};

/// Total character budget for segmented content in one prompt.
const MAX_CONTENT_CHARS: usize = 24_000;

/// Per-payload character cap, so one giant page cannot crowd out the rest.
const MAX_SEGMENT_CHARS: usize = 6_000;

/// Concatenate payload texts into one segmented document.
///
/// Each segment is headed by its source URL and classifier kinds, and
/// detected forms are described inline so the model sees field names it
/// would otherwise miss in stripped text. Payloads with duplicate
/// `content_hash` values are emitted once.
pub fn segment_payloads(payloads: &[RawPayload]) -> String {
    let mut seen_hashes = std::collections::HashSet::new();
    let mut out = String::new();

    for payload in payloads {
        if !payload.has_content() && payload.forms.is_empty() {
            continue;
        }
        if !seen_hashes.insert(payload.content_hash.clone()) {
            continue;
        }
        if out.len() >= MAX_CONTENT_CHARS {
            break;
        }

        let kinds = payload
            .kinds
            .iter()
            .map(kind_label)
            .collect::<Vec<_>>()
            .join(", ");
        out.push_str(&format!("--- PAGE: {} [{}] ---\n", payload.url, kinds));

        let text = payload.text.trim();
        let take = text
            .char_indices()
            .nth(MAX_SEGMENT_CHARS)
            .map(|(i, _)| i)
            .unwrap_or(text.len());
        out.push_str(&text[..take]);
        out.push('\n');

        for form in &payload.forms {
            let fields = form
                .fields
                .iter()
                .map(|f| {
                    if f.label.is_empty() {
                        format!("{} ({})", f.name, f.field_type)
                    } else {
                        format!("{} ({}, \"{}\")", f.name, f.field_type, f.label)
                    }
                })
                .collect::<Vec<_>>()
                .join(", ");
            out.push_str(&format!(
                "[FORM id={} type={:?} action={} fields: {}]\n",
                form.id, form.form_type, form.action, fields
            ));
        }
        out.push('\n');
    }

    out
}

fn kind_label(kind: &ContentKind) -> &'static str {
    match kind {
        ContentKind::Plain => "plain",
        ContentKind::FormBearing => "form_bearing",
        ContentKind::Signup => "signup",
        ContentKind::Document => "document",
    }
}

/// The initial structuring prompt: schema plus segmented content.
pub fn build_prompt(schema: &serde_json::Value, site_url: &str, content: &str) -> String {
    format!(
        "You are extracting structured data from pages of a municipal government \
website ({site_url}).\n\
Return ONLY a JSON object conforming to this JSON schema, with no prose and no \
markdown fences:\n\n{schema}\n\n\
Rules:\n\
- Every array field must be present, empty if nothing applies.\n\
- signup_info.available must be true only if the pages describe a way for \
residents to sign up or register.\n\
- Do not invent information that is not in the content.\n\n\
CONTENT:\n{content}",
        site_url = site_url,
        schema = schema,
        content = content,
    )
}

/// Variant prompt for forms-only runs: same schema, form-focused rules.
pub fn build_forms_prompt(schema: &serde_json::Value, site_url: &str, content: &str) -> String {
    format!(
        "You are cataloguing the forms on a municipal government website ({site_url}).\n\
Return ONLY a JSON object conforming to this JSON schema, with no prose and no \
markdown fences:\n\n{schema}\n\n\
Rules:\n\
- Focus on the `forms` and `signup_info` fields; describe each detected form's \
name, type, purpose, and fields.\n\
- Every array field must be present, empty if nothing applies.\n\
- Do not invent forms or fields that are not in the content.\n\n\
CONTENT:\n{content}",
        site_url = site_url,
        schema = schema,
        content = content,
    )
}

/// Repair prompt carrying the previous raw output and its violations.
pub fn repair_prompt(
    schema: &serde_json::Value,
    violations: &[String],
    previous_raw: &str,
) -> String {
    format!(
        "Your previous response did not conform to the required JSON schema.\n\
Violations:\n- {violations}\n\n\
Previous response:\n{previous}\n\n\
Return ONLY a corrected JSON object conforming to this schema, with no prose \
and no markdown fences:\n\n{schema}",
        violations = violations.join("\n- "),
        previous = previous_raw,
        schema = schema,
    )
}
