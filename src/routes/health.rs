//! # 헬스체크(Health Check) 핸들러
//!
//! ## 엔드포인트
//! - `GET /api/v1/health` → `{ "status": "ok", "database": "ok" }`
//!
//! 로드밸런서나 컨테이너 오케스트레이터가 서버 상태를 확인할 때 씁니다.
//! 데이터베이스에 `SELECT 1`을 보내 연결까지 확인합니다.

use axum::{extract::State, http::StatusCode, Json};
use serde_json::{json, Value};

use crate::routes::AppState;

/// `GET /health`
///
/// DB 연결이 안 되면 503과 함께 `"database": "unavailable"`을 돌려줍니다.
pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    match sqlx::query("SELECT 1").execute(&state.pool).await {
        Ok(_) => (
            StatusCode::OK,
            Json(json!({ "status": "ok", "database": "ok" })),
        ),
        Err(e) => {
            tracing::error!(error = %e, "health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "status": "degraded", "database": "unavailable" })),
            )
        }
    }
}
