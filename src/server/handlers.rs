//! HTTP request handlers for the API server.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::error;
use url::Url;

use crate::analysis::{self, AnalysisEnvelope};
use crate::store::{StoreError, DEFAULT_CATEGORY};

use super::AppState;

fn success(data: impl Serialize) -> Response {
    (
        StatusCode::OK,
        Json(json!({"status": "success", "data": data})),
    )
        .into_response()
}

fn failure(status: StatusCode, message: &str) -> Response {
    (
        status,
        Json(json!({"status": "error", "message": message})),
    )
        .into_response()
}

#[derive(Debug, Deserialize)]
pub struct AnalyzeRequest {
    pub link: Option<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
}

/// Run the full collect-and-analyze pipeline for a listing URL.
pub async fn analyze(
    State(state): State<AppState>,
    Json(req): Json<AnalyzeRequest>,
) -> Response {
    let Some(link) = req.link.filter(|l| !l.is_empty()) else {
        return failure(StatusCode::BAD_REQUEST, "link와 keywords는 필수 항목입니다.");
    };
    if req.keywords.is_empty() {
        return failure(StatusCode::BAD_REQUEST, "link와 keywords는 필수 항목입니다.");
    }
    if Url::parse(&link).is_err() {
        return failure(StatusCode::BAD_REQUEST, "link가 올바른 URL이 아닙니다.");
    }

    match analysis::analyze_listing(&state.settings, &link, &req.keywords).await {
        Ok(envelope) => success(envelope),
        Err(e) => {
            error!("analysis failed for {link}: {e:#}");
            failure(StatusCode::INTERNAL_SERVER_ERROR, &format!("{e:#}"))
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SaveLibraryRequest {
    pub user_id: i64,
    pub analysis: AnalysisEnvelope,
    pub category_name: Option<String>,
}

/// Persist an analysis and link it into the user's library.
pub async fn save_to_library(
    State(state): State<AppState>,
    Json(req): Json<SaveLibraryRequest>,
) -> Response {
    if req.analysis.analysis_id.is_empty() {
        return failure(StatusCode::BAD_REQUEST, "저장할 분석 데이터가 필요합니다.");
    }
    match state.store.find_user_by_id(req.user_id) {
        Ok(Some(_)) => {}
        Ok(None) => return failure(StatusCode::NOT_FOUND, "사용자를 찾을 수 없습니다."),
        Err(e) => {
            error!("user lookup failed: {e}");
            return failure(StatusCode::INTERNAL_SERVER_ERROR, "라이브러리 저장 중 오류가 발생했습니다.");
        }
    }

    let category = req.category_name.as_deref().unwrap_or(DEFAULT_CATEGORY);
    let result = state
        .store
        .save_analysis(&req.analysis, category)
        .and_then(|_| state.store.add_to_library(req.user_id, &req.analysis.analysis_id));
    match result {
        Ok(()) => (
            StatusCode::CREATED,
            Json(json!({"status": "success", "message": "라이브러리에 저장되었습니다."})),
        )
            .into_response(),
        Err(e) => {
            error!("library save failed: {e}");
            failure(StatusCode::INTERNAL_SERVER_ERROR, "라이브러리 저장 중 오류가 발생했습니다.")
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct LibraryQuery {
    pub user_id: Option<i64>,
}

/// List a user's saved analyses, most recent first.
pub async fn get_library(
    State(state): State<AppState>,
    Query(query): Query<LibraryQuery>,
) -> Response {
    let Some(user_id) = query.user_id else {
        return failure(StatusCode::BAD_REQUEST, "user_id가 필요합니다.");
    };

    match state.store.library_for_user(user_id) {
        Ok(entries) => success(entries),
        Err(e) => {
            error!("library query failed: {e}");
            failure(StatusCode::INTERNAL_SERVER_ERROR, "데이터를 조회하는 중 오류가 발생했습니다.")
        }
    }
}

/// Remove one analysis from a user's library.
pub async fn delete_from_library(
    State(state): State<AppState>,
    Path(analysis_id): Path<String>,
    Query(query): Query<LibraryQuery>,
) -> Response {
    let Some(user_id) = query.user_id else {
        return failure(StatusCode::BAD_REQUEST, "user_id가 필요합니다.");
    };

    match state.store.remove_from_library(user_id, &analysis_id) {
        Ok(true) => (
            StatusCode::OK,
            Json(json!({"status": "success", "message": "삭제되었습니다."})),
        )
            .into_response(),
        Ok(false) => failure(
            StatusCode::NOT_FOUND,
            "삭제할 항목을 찾지 못했거나 권한이 없습니다.",
        ),
        Err(e) => {
            error!("library delete failed: {e}");
            failure(StatusCode::INTERNAL_SERVER_ERROR, "데이터를 삭제하는 중 오류가 발생했습니다.")
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub user_name: Option<String>,
}

/// Register a new user.
pub async fn create_user(
    State(state): State<AppState>,
    Json(req): Json<CreateUserRequest>,
) -> Response {
    let Some(user_name) = req.user_name.filter(|n| !n.trim().is_empty()) else {
        return failure(StatusCode::BAD_REQUEST, "user_name을 입력해주세요.");
    };

    match state.store.create_user(user_name.trim()) {
        Ok(user) => (
            StatusCode::CREATED,
            Json(json!({"status": "success", "data": user})),
        )
            .into_response(),
        Err(StoreError::DuplicateUser(_)) => {
            failure(StatusCode::CONFLICT, "이미 존재하는 사용자입니다.")
        }
        Err(e) => {
            error!("user creation failed: {e}");
            failure(StatusCode::INTERNAL_SERVER_ERROR, "사용자 생성 중 오류가 발생했습니다.")
        }
    }
}
