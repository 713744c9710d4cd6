// src/risk.rs

use crate::error::{PipelineError, Result};
use crate::invoice::InvoiceRecord;
use crate::llm::{LlmClient, extract_json_object, strip_fences};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// A line item is flagged when its price exceeds this multiple of the mean.
pub const PRICE_OUTLIER_MULTIPLIER: f64 = 5.0;

/// Invoice-level totals above this are flagged, in the invoice's currency unit.
pub const TOTAL_FLAG_THRESHOLD: f64 = 100_000.0;

const FALLBACK_CONFIDENCE: f64 = 0.6;
const FALLBACK_FINDING: &str =
    "Unable to perform detailed risk assessment. Defaulting to low risk.";

const REQUIRED_FIELDS: [&str; 3] = ["risk_level", "confidence_score", "findings"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnusualItem {
    pub item: String,
    pub price: f64,
    pub reason: String,
}

/// The risk report for one invoice. `assess` always produces one of these,
/// never an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskRecord {
    pub risk_level: RiskLevel,
    pub confidence_score: f64,
    pub findings: Vec<String>,
    #[serde(default)]
    pub unusual_items: Vec<UnusualItem>,
}

impl RiskRecord {
    /// The fixed record returned when the model's reply cannot be used.
    pub fn fallback() -> Self {
        Self {
            risk_level: RiskLevel::Low,
            confidence_score: FALLBACK_CONFIDENCE,
            findings: vec![FALLBACK_FINDING.to_string()],
            unusual_items: Vec::new(),
        }
    }

    /// Fallback when the assessment call itself failed (network, API).
    fn fallback_after_error(err: &PipelineError) -> Self {
        Self {
            findings: vec![
                format!("Error in risk assessment: {err}"),
                "Defaulting to low risk due to assessment failure".to_string(),
            ],
            ..Self::fallback()
        }
    }
}

/// Deterministic pre-pass: flag price outliers and an oversized total.
/// The flags are advisory signals for the model, not findings themselves.
pub fn find_unusual_items(invoice: &InvoiceRecord) -> Vec<UnusualItem> {
    let mut unusual = Vec::new();

    if !invoice.line_items.is_empty() {
        let mean: f64 = invoice
            .line_items
            .iter()
            .map(|item| item.price)
            .sum::<f64>()
            / invoice.line_items.len() as f64;

        for item in &invoice.line_items {
            if item.price > mean * PRICE_OUTLIER_MULTIPLIER {
                unusual.push(UnusualItem {
                    item: item.name.clone(),
                    price: item.price,
                    reason: format!("Price is {:.1}x higher than average", item.price / mean),
                });
            }
        }
    }

    if invoice.total_amount > TOTAL_FLAG_THRESHOLD {
        unusual.push(UnusualItem {
            item: "Total Amount".to_string(),
            price: invoice.total_amount,
            reason: "Total amount exceeds 100,000".to_string(),
        });
    }

    unusual
}

/// Build the risk-assessment prompt from the invoice and the pre-pass flags.
pub fn build_risk_prompt(invoice: &InvoiceRecord, unusual: &[UnusualItem]) -> String {
    let invoice_json = serde_json::to_string_pretty(invoice).unwrap_or_default();
    let unusual_json = serde_json::to_string_pretty(unusual).unwrap_or_default();

    format!(
        r#"Analyze this invoice data for potential risks or fraud indicators:

Invoice Data:
{invoice_json}

Unusual Items Found:
{unusual_json}

Consider the following risk factors:
1. Unusual amounts:
   - Items significantly above average price (only flag if >5x average)
   - Total amount unusually high (only flag if >100,000)
   - Round numbers or suspicious patterns
2. Missing or suspicious information:
   - Missing vendor details
   - Missing invoice number
   - Missing dates
3. Inconsistencies:
   - Mismatched totals
   - Unusual quantities
   - Suspicious item names
4. High-risk indicators:
   - Executive or license fees
   - Round number amounts
   - Unusually high individual items

Return a JSON object with this structure:
{{
    "risk_level": "high|medium|low",
    "confidence_score": number between 0 and 1,
    "findings": [
        "string describing each risk found"
    ],
    "unusual_items": [
        {{
            "item": "item name",
            "price": number,
            "reason": "string explaining why it's unusual"
        }}
    ]
}}

Note: Be conservative in flagging risks. Only mark as medium or high risk if there are clear and significant concerns. Most invoices should be marked as low risk unless there are obvious red flags.

IMPORTANT: Return ONLY the JSON object, no additional text or explanation."#
    )
}

/// Assess an extracted invoice. Always returns a well-formed record: a
/// reply that cannot be parsed falls back to the fixed low-risk record,
/// and a failed call falls back with the error recorded as a finding.
/// An assessment failure must never block invoice processing.
pub async fn assess(llm: &LlmClient, invoice: &InvoiceRecord) -> RiskRecord {
    let unusual = find_unusual_items(invoice);
    let prompt = build_risk_prompt(invoice, &unusual);

    match llm.complete(&prompt).await {
        Ok(content) => parse_risk_response(&content).unwrap_or_else(|e| {
            warn!(error = %e, "Risk assessment reply unusable, falling back to low risk");
            RiskRecord::fallback()
        }),
        Err(e) => {
            warn!(error = %e, "Risk assessment call failed, falling back to low risk");
            RiskRecord::fallback_after_error(&e)
        }
    }
}

/// Clean and parse a model reply into a risk record, checking the required
/// fields and value ranges. Extra top-level fields are ignored.
fn parse_risk_response(content: &str) -> Result<RiskRecord> {
    let cleaned = strip_fences(content);
    let json = extract_json_object(cleaned)?;

    let value: serde_json::Value = serde_json::from_str(json)
        .map_err(|e| PipelineError::response_parse(format!("invalid JSON: {e}")))?;

    for field in REQUIRED_FIELDS {
        if value.get(field).is_none() {
            return Err(PipelineError::MissingField {
                field: field.to_string(),
            });
        }
    }

    let record: RiskRecord = serde_json::from_value(value).map_err(|e| {
        PipelineError::response_parse(format!("risk report does not match expected shape: {e}"))
    })?;

    if !(0.0..=1.0).contains(&record.confidence_score) {
        return Err(PipelineError::validation(format!(
            "confidence_score {} outside [0, 1]",
            record.confidence_score
        )));
    }

    Ok(record)
}
