// src/invoice.rs

use crate::error::{PipelineError, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Absolute tolerance when cross-checking the declared total against the
/// recomputed line-item sum.
pub const TOTAL_TOLERANCE: f64 = 0.01;

const REQUIRED_FIELDS: [&str; 5] = [
    "vendor",
    "date",
    "invoice_number",
    "total_amount",
    "line_items",
];

/// A single billed entry on an invoice.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineItem {
    pub name: String,
    pub quantity: f64,
    pub price: f64,
}

/// Structured data extracted from one invoice document. Created fresh per
/// request, never mutated after validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoiceRecord {
    pub vendor: String,
    pub date: String,
    pub invoice_number: String,
    pub total_amount: f64,
    pub line_items: Vec<LineItem>,
}

impl InvoiceRecord {
    /// Parse a JSON object into a validated record.
    ///
    /// Field presence is checked on the raw value first so that a missing
    /// field is reported by name. Unknown extra fields are ignored.
    pub fn from_json(json: &str) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_str(json)
            .map_err(|e| PipelineError::response_parse(format!("invalid JSON: {e}")))?;

        for field in REQUIRED_FIELDS {
            if value.get(field).is_none() {
                return Err(PipelineError::MissingField {
                    field: field.to_string(),
                });
            }
        }

        let record: InvoiceRecord = serde_json::from_value(value).map_err(|e| {
            PipelineError::validation(format!("invoice does not match expected shape: {e}"))
        })?;
        record.validate()?;
        Ok(record)
    }

    /// Structural and numeric-consistency checks. Any failure here is hard:
    /// a partially valid record is never returned to the caller.
    pub fn validate(&self) -> Result<()> {
        if self.vendor.trim().is_empty() {
            return Err(PipelineError::validation("vendor must not be empty"));
        }
        if self.invoice_number.trim().is_empty() {
            return Err(PipelineError::validation("invoice_number must not be empty"));
        }

        let date_re = Regex::new(r"^\d{4}-\d{2}-\d{2}$").unwrap();
        if !date_re.is_match(&self.date) {
            return Err(PipelineError::validation(format!(
                "date {:?} is not in YYYY-MM-DD format",
                self.date
            )));
        }

        if self.total_amount < 0.0 {
            return Err(PipelineError::validation("total_amount must not be negative"));
        }

        if self.line_items.is_empty() {
            return Err(PipelineError::validation("no line items found in invoice"));
        }
        for item in &self.line_items {
            if item.name.trim().is_empty() {
                return Err(PipelineError::validation("line item with empty name"));
            }
            if item.quantity <= 0.0 {
                return Err(PipelineError::validation(format!(
                    "invalid quantity for item {}",
                    item.name
                )));
            }
            if item.price <= 0.0 {
                return Err(PipelineError::validation(format!(
                    "invalid price for item {}",
                    item.name
                )));
            }
        }

        let computed = self.computed_total();
        if (computed - self.total_amount).abs() > TOTAL_TOLERANCE {
            return Err(PipelineError::validation(format!(
                "total amount {} does not match sum of line items {computed}",
                self.total_amount
            )));
        }

        Ok(())
    }

    /// Sum of `price * quantity` over all line items.
    pub fn computed_total(&self) -> f64 {
        self.line_items
            .iter()
            .map(|item| item.price * item.quantity)
            .sum()
    }
}
