//! The extraction prompt and the fixed list of RFP fields.
//!
//! Every prompt string lives here so the field list, the template, and the
//! output schema cannot drift apart. Callers can override the template via
//! [`crate::config::ExtractionConfig::prompt_template`]; the constants here
//! are used only when no override is provided.

/// The 20 fields the model is asked to fill, in schema order.
pub const RFP_FIELDS: [&str; 20] = [
    "Bid Number",
    "Title",
    "Due Date",
    "Bid Submission Type",
    "Term of Bid",
    "Pre Bid Meeting",
    "Installation",
    "Bid Bond Requirement",
    "Delivery Date",
    "Payment Terms",
    "Any Additional Documentation Required",
    "MFG for Registration",
    "Contract or Cooperative to use",
    "Model_no",
    "Part_no",
    "Product",
    "Contact Info",
    "Company Name",
    "Bid Summary",
    "Product Specification",
];

/// Substitution point for the extracted document text.
pub const DOCUMENT_TEXT_PLACEHOLDER: &str = "{document_text}";

/// Default extraction template.
///
/// Contains [`DOCUMENT_TEXT_PLACEHOLDER`] exactly once. All other braces are
/// literal and reach the model unchanged.
pub const EXTRACTION_TEMPLATE: &str = r#"I have a document with RFP details. Please extract the following structured information from the text:

- Bid Number
- Title
- Due Date
- Bid Submission Type
- Term of Bid
- Pre Bid Meeting
- Installation
- Bid Bond Requirement
- Delivery Date
- Payment Terms
- Any Additional Documentation Required
- MFG for Registration
- Contract or Cooperative to use
- Model_no
- Part_no
- Product
- Contact Info
- Company Name
- Bid Summary
- Product Specification

Document text:
{document_text}

Please return the extracted information as a JSON object with the following structure:
{
    "Bid Number": "value",
    "Title": "value",
    "Due Date": "value",
    "Bid Submission Type": "value",
    "Term of Bid": "value",
    "Pre Bid Meeting": "value",
    "Installation": "value",
    "Bid Bond Requirement": "value",
    "Delivery Date": "value",
    "Payment Terms": "value",
    "Any Additional Documentation Required": "value",
    "MFG for Registration": "value",
    "Contract or Cooperative to use": "value",
    "Model_no": "value",
    "Part_no": "value",
    "Product": "value",
    "Contact Info": "value",
    "Company Name": "value",
    "Bid Summary": "value",
    "Product Specification": "value"
}
"#;

/// The literal string sent to the model. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt(String);

impl Prompt {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl AsRef<str> for Prompt {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Render the default template around `text`.
///
/// The whole text is embedded; nothing is truncated or chunked.
pub fn build_prompt(text: &str) -> Prompt {
    build_prompt_with(EXTRACTION_TEMPLATE, text)
}

/// Render `template` around `text`.
///
/// Only the first [`DOCUMENT_TEXT_PLACEHOLDER`] is replaced and the inserted
/// text is never rescanned, so a document that itself contains the
/// placeholder string is embedded verbatim. A template with no placeholder
/// is returned with the text appended after a blank line.
pub fn build_prompt_with(template: &str, text: &str) -> Prompt {
    let rendered = match template.split_once(DOCUMENT_TEXT_PLACEHOLDER) {
        Some((head, tail)) => {
            let mut s = String::with_capacity(head.len() + text.len() + tail.len());
            s.push_str(head);
            s.push_str(text);
            s.push_str(tail);
            s
        }
        None => format!("{template}\n\n{text}"),
    };
    Prompt(rendered)
}
