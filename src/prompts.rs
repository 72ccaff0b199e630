//! Prompts for the two AI calls: page OCR and field mapping.
//!
//! Callers can override the OCR instruction via
//! [`crate::config::FillConfig::ocr_prompt`]; the mapping prompt is built
//! from the template's placeholder names and is not configurable, because
//! the response parser depends on its output contract.

/// Default instruction for extracting text from a report page image.
pub const DEFAULT_OCR_PROMPT: &str = r#"Extract all readable text from this insurance or medical document page.
Return plain text only. No explanations. No headings. Just the raw interpreted text.

Keep the reading order a human would follow. Keep labels next to their values
(for example "Policy No: 12345"). If the page has no readable text, return nothing."#;

/// System message for the field-mapping call.
pub const MAPPING_SYSTEM_PROMPT: &str = r#"You fill document templates from extracted report text.
You answer with a single VALID JSON object and nothing else: no code fences, no commentary."#;

/// Build the user message for the field-mapping call.
///
/// Placeholder names are listed one per line, without delimiters, so the
/// model has no reason to echo braces back in its keys.
pub fn mapping_request(placeholders: &[String], corpus: &str) -> String {
    let list = placeholders
        .iter()
        .map(|p| format!("- {p}"))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "From the extracted report text below, fill values for each placeholder.\n\
Here are the placeholders:\n{list}\n\n\
Return a VALID JSON object ONLY, mapping each placeholder name to its correct extracted value.\n\
If a value is missing, return an empty string.\n\
JSON keys MUST match placeholders EXACTLY and MUST NOT include curly braces.\n\n\
Extracted text:\n\"\"\"\n{corpus}\n\"\"\"\n\n\
Return only the JSON object, no other text."
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mapping_request_lists_every_placeholder() {
        let names = vec!["CLIENT_NAME".to_string(), "DOB".to_string()];
        let msg = mapping_request(&names, "Name: Jane");
        assert!(msg.contains("- CLIENT_NAME\n- DOB"));
        assert!(msg.contains("Name: Jane"));
        assert!(!msg.contains("{{"));
    }
}
