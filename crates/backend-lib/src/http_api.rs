// ============================
// crates/backend-lib/src/http_api.rs
// ============================
//! Stateless assistant endpoints. No session affinity, nothing mutated.
use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::ai::prompt;
use crate::error::AppError;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/ai/status", get(status))
        .route("/ai/analyze", post(analyze))
        .route("/ai/generate", post(generate))
        .route("/ai/explain", post(explain))
}

#[derive(Serialize)]
struct StatusResponse {
    available: bool,
    message: &'static str,
}

async fn status(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    let available = state.ai.available();
    Json(StatusResponse {
        available,
        message: if available {
            "AI Service is available"
        } else {
            "AI Service is not configured. Set CODEROOM_AI__API_KEY in environment."
        },
    })
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnalyzeRequest {
    code: Option<String>,
    language: Option<String>,
    file_name: Option<String>,
}

#[derive(Serialize)]
struct AnalyzeResponse {
    analysis: String,
}

async fn analyze(
    State(state): State<Arc<AppState>>,
    Json(body): Json<AnalyzeRequest>,
) -> Result<Json<AnalyzeResponse>, AppError> {
    if !state.ai.available() {
        return Err(AppError::BackendUnavailable);
    }
    let (code, language, file_name) = match (
        required(body.code),
        required(body.language),
        required(body.file_name),
    ) {
        (Some(code), Some(language), Some(file_name)) => (code, language, file_name),
        _ => {
            return Err(AppError::InvalidInput(
                "Missing required fields: code, language, fileName".to_string(),
            ))
        }
    };

    let rendered = prompt::build_analyze_prompt(&code, &language, &file_name);
    let analysis = state.ai.complete(&rendered).await?;
    Ok(Json(AnalyzeResponse { analysis }))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    description: Option<String>,
    language: Option<String>,
    context: Option<String>,
}

#[derive(Serialize)]
struct GenerateResponse {
    code: String,
}

async fn generate(
    State(state): State<Arc<AppState>>,
    Json(body): Json<GenerateRequest>,
) -> Result<Json<GenerateResponse>, AppError> {
    if !state.ai.available() {
        return Err(AppError::BackendUnavailable);
    }
    let (description, language) = match (required(body.description), required(body.language)) {
        (Some(description), Some(language)) => (description, language),
        _ => {
            return Err(AppError::InvalidInput(
                "Missing required fields: description, language".to_string(),
            ))
        }
    };

    let rendered = prompt::build_generate_prompt(&description, &language, body.context.as_deref());
    let code = state.ai.complete(&rendered).await?;
    Ok(Json(GenerateResponse { code }))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExplainRequest {
    code: Option<String>,
    language: Option<String>,
}

#[derive(Serialize)]
struct ExplainResponse {
    explanation: String,
}

async fn explain(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ExplainRequest>,
) -> Result<Json<ExplainResponse>, AppError> {
    if !state.ai.available() {
        return Err(AppError::BackendUnavailable);
    }
    let (code, language) = match (required(body.code), required(body.language)) {
        (Some(code), Some(language)) => (code, language),
        _ => {
            return Err(AppError::InvalidInput(
                "Missing required fields: code, language".to_string(),
            ))
        }
    };

    let rendered = prompt::build_explain_prompt(&code, &language);
    let explanation = state.ai.complete(&rendered).await?;
    Ok(Json(ExplainResponse { explanation }))
}

/// Empty strings count as missing, matching form-style clients.
fn required(field: Option<String>) -> Option<String> {
    field.filter(|value| !value.trim().is_empty())
}
