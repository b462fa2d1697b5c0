//! Prompts for VLM-based document field extraction.
//!
//! Callers can override the system prompt via
//! [`crate::config::StudioConfig::system_prompt`]; the user instructions and
//! the image placeholder are fixed because the pipeline relies on them.

/// Literal token the model is told to put in `document_data`.
///
/// For single-image files the pipeline swaps the first occurrence for the
/// file's real base64 payload, so the model never has to echo megabytes of
/// image data back.
pub const IMAGE_DATA_PLACEHOLDER: &str = "{{image_data}}";

/// Default system prompt.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a meticulous document data extraction engine. \
You read scanned identity documents, licences, certificates and forms, and you answer with \
a single JSON object and nothing else.";

/// Known `document_details` fields, in the order they are presented.
pub const DETAIL_FIELDS: &[&str] = &[
    "name",
    "date_of_birth",
    "address",
    "nic_no",
    "nic_issue_date",
    "dl_no",
    "dl_issue_date",
    "dl_expiry_date",
    "passport_no",
    "passport_issue_date",
    "passport_expiry_date",
    "place_of_birth",
    "id_no",
];

/// Build the user instruction sent alongside the document image(s).
pub fn extraction_instructions() -> String {
    format!(
        r#"Extract information from this document and return it as JSON with this shape:

{{
  "document_category": string,
  "document_details": {{ <field>: string | null, ... }},
  "document_data": string
}}

Follow these strict rules for the JSON response:
- If any extracted value is in a language other than English, translate it into English and store ONLY the translated English text.
- If a field is NOT present in the document at all, completely OMIT that parameter from the JSON.
- If a field IS present in the document (visually displayed) but you fail to extract its value, include the parameter and set its value explicitly to null.
- If a field has a valid extracted value, include the parameter with that value.
- Only include parameters that either have a valid extracted value, or are visible in the document but extraction failed (set as null).

Fields to look for in 'document_details':
- {fields}.

The 'document_data' field should be set to '{placeholder}'.

Return ONLY the JSON. Do not wrap it in code fences."#,
        fields = DETAIL_FIELDS.join(", "),
        placeholder = IMAGE_DATA_PLACEHOLDER,
    )
}
