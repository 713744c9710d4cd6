// src/llm_extract.rs

use crate::error::Result;
use crate::invoice::InvoiceRecord;
use crate::llm::{LlmClient, extract_json_object, strip_fences};
use tracing::info;

/// Cap on the document text embedded in the prompt, to stay within the
/// model's context window.
const MAX_PROMPT_CHARS: usize = 12_000;

/// Build the deterministic extraction prompt for one document.
pub fn build_extraction_prompt(document_text: &str) -> String {
    let text = truncate_chars(document_text, MAX_PROMPT_CHARS);

    format!(
        r#"You are a precise invoice data extractor. Your task is to extract EXACT values from this invoice text:

{text}

CRITICAL INSTRUCTIONS:
1. Extract EXACT values from the invoice text - do not modify or guess any values
2. For dates: Convert to YYYY-MM-DD format (e.g., "13 June 2025" -> "2025-06-13")
3. For amounts: Convert currency-prefixed values to decimal numbers (e.g., "Rs. 18000" -> 18000.00)
4. For line items: Extract EXACT names and quantities as shown
5. Do not add or remove any line items
6. Do not modify any values
7. Each line item must have a name, quantity, and price
8. The total amount must match the sum of all line items

Return a JSON object with this structure:
{{
    "vendor": "string (exact vendor name from invoice)",
    "date": "YYYY-MM-DD (converted date)",
    "invoice_number": "string (exact invoice number)",
    "total_amount": decimal_number (converted total amount),
    "line_items": [
        {{
            "name": "string (exact item name)",
            "quantity": number (exact quantity),
            "price": decimal_number (converted price)
        }}
    ]
}}

Return ONLY the JSON object with EXACT values from the invoice. Do not add, remove, or modify any values."#
    )
}

/// Extract structured invoice data from raw document text.
///
/// Single LLM call at temperature 0; the reply is defensively cleaned,
/// parsed and validated. Every failure on this path is fatal for the
/// request — a malformed extraction cannot be defaulted.
pub async fn extract_invoice(llm: &LlmClient, document_text: &str) -> Result<InvoiceRecord> {
    let prompt = build_extraction_prompt(document_text);
    let content = llm.complete(&prompt).await?;

    let cleaned = strip_fences(&content);
    let json = extract_json_object(cleaned)?;
    let record = InvoiceRecord::from_json(json)?;

    info!(
        vendor = %record.vendor,
        invoice_number = %record.invoice_number,
        total_amount = record.total_amount,
        line_items = record.line_items.len(),
        "Invoice extracted"
    );

    Ok(record)
}

/// Truncate on a char boundary so multi-byte text can't split a codepoint.
fn truncate_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
