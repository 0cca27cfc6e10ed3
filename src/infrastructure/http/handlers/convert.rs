//! Convert Handler

use std::sync::Arc;

use axum::{extract::State, Json};

use crate::application::ConvertSessionCommand;
use crate::infrastructure::http::dto::{ApiResponse, ConvertRequest, ConvertResponse};
use crate::infrastructure::http::error::ApiError;
use crate::infrastructure::http::state::AppState;

pub async fn convert_session(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ConvertRequest>,
) -> Result<Json<ApiResponse<ConvertResponse>>, ApiError> {
    let result = state
        .convert_handler
        .handle(ConvertSessionCommand {
            v1_session: req.v1_session,
        })
        .await?;

    Ok(Json(
        ApiResponse::success(ConvertResponse {
            v2_session: result.v2_session,
        })
        .with_message("转换成功"),
    ))
}
