// src/api.rs

use crate::error::PipelineError;
use crate::invoice::InvoiceRecord;
use crate::llm::LlmClient;
use crate::{llm_extract, pdf_extract, risk};
use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde_json::json;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::{error, info};

const ALLOWED_EXTENSIONS: [&str; 4] = ["pdf", "png", "jpg", "jpeg"];

/// Shared state: the process-wide LLM client handle.
pub struct AppState {
    pub llm: LlmClient,
}

pub fn router(state: Arc<AppState>, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/api/process-invoice", post(process_invoice))
        .route("/api/health", get(health_check))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .with_state(state)
}

async fn health_check() -> Json<serde_json::Value> {
    Json(json!({"status": "healthy"}))
}

/// Upload → extract text → extract invoice → assess risk → combined reply.
///
/// Extraction failures surface as error responses; risk assessment never
/// fails (it falls back internally), so a reply past extraction always has
/// a risk report.
async fn process_invoice(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Response {
    let mut upload: Option<(String, Vec<u8>)> = None;
    loop {
        match multipart.next_field().await {
            Ok(Some(field)) => {
                if field.name() == Some("invoice") {
                    let filename = field.file_name().unwrap_or_default().to_string();
                    match field.bytes().await {
                        Ok(bytes) => {
                            upload = Some((filename, bytes.to_vec()));
                            break;
                        }
                        Err(e) => {
                            return error_response(
                                StatusCode::BAD_REQUEST,
                                format!("failed to read upload: {e}"),
                            );
                        }
                    }
                }
            }
            Ok(None) => break,
            Err(e) => {
                return error_response(
                    StatusCode::BAD_REQUEST,
                    format!("invalid multipart body: {e}"),
                );
            }
        }
    }

    let Some((filename, bytes)) = upload else {
        return error_response(StatusCode::BAD_REQUEST, "No invoice file provided".to_string());
    };
    if !allowed_file(&filename) {
        return error_response(StatusCode::BAD_REQUEST, "Invalid file type".to_string());
    }

    info!(filename = %filename, bytes = bytes.len(), "Processing invoice upload");

    let text = match pdf_extract::extract_text(&bytes) {
        Ok(text) => text,
        Err(e) => {
            error!(error = %e, "Document extraction failed");
            return pipeline_error_response(&e);
        }
    };

    let invoice = match llm_extract::extract_invoice(&state.llm, &text).await {
        Ok(invoice) => invoice,
        Err(e) => {
            error!(error = %e, "Invoice extraction failed");
            return pipeline_error_response(&e);
        }
    };

    let risk_report = risk::assess(&state.llm, &invoice).await;
    let action_hash = action_hash(&invoice);
    info!(action_hash = %action_hash, risk_level = ?risk_report.risk_level, "Invoice processed");

    Json(json!({
        "success": true,
        "data": {
            "invoice_data": invoice,
            "risk_assessment": risk_report,
            "action_hash": action_hash,
        }
    }))
    .into_response()
}

fn allowed_file(filename: &str) -> bool {
    filename
        .rsplit_once('.')
        .is_some_and(|(_, ext)| ALLOWED_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
}

/// SHA-256 over the canonical (sorted-key) JSON form of the invoice, used
/// for audit-log identification of the processed record.
pub fn action_hash(invoice: &InvoiceRecord) -> String {
    // serde_json objects are BTreeMap-backed, so a Value round-trip yields
    // sorted keys
    let canonical = serde_json::to_value(invoice)
        .and_then(|v| serde_json::to_string(&v))
        .unwrap_or_default();
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn pipeline_error_response(err: &PipelineError) -> Response {
    error_response(status_for(err), err.to_string())
}

fn error_response(status: StatusCode, message: String) -> Response {
    (status, Json(json!({"success": false, "error": message}))).into_response()
}

fn status_for(err: &PipelineError) -> StatusCode {
    match err {
        PipelineError::Document { .. }
        | PipelineError::ResponseParse { .. }
        | PipelineError::MissingField { .. }
        | PipelineError::Validation { .. } => StatusCode::BAD_REQUEST,
        PipelineError::Transport(_) | PipelineError::Api { .. } | PipelineError::Config { .. } => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::invoice::LineItem;

    fn sample_invoice() -> InvoiceRecord {
        InvoiceRecord {
            vendor: "Acme Traders".to_string(),
            date: "2025-06-13".to_string(),
            invoice_number: "INV-2025-001".to_string(),
            total_amount: 18000.0,
            line_items: vec![LineItem {
                name: "Consulting services".to_string(),
                quantity: 3.0,
                price: 6000.0,
            }],
        }
    }

    #[test]
    fn extension_allowlist() {
        assert!(allowed_file("invoice.pdf"));
        assert!(allowed_file("scan.JPEG"));
        assert!(!allowed_file("invoice.txt"));
        assert!(!allowed_file("invoice"));
        assert!(!allowed_file(""));
    }

    #[test]
    fn action_hash_is_deterministic_hex() {
        let a = action_hash(&sample_invoice());
        let b = action_hash(&sample_invoice());
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn action_hash_tracks_content() {
        let mut invoice = sample_invoice();
        let before = action_hash(&invoice);
        invoice.vendor = "Other Vendor".to_string();
        assert_ne!(action_hash(&invoice), before);
    }

    #[test]
    fn extraction_errors_map_to_client_errors() {
        let err = PipelineError::MissingField {
            field: "invoice_number".to_string(),
        };
        assert_eq!(status_for(&err), StatusCode::BAD_REQUEST);
        let err = PipelineError::Api {
            status: 503,
            body: "overloaded".to_string(),
        };
        assert_eq!(status_for(&err), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
