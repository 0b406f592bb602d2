use serde::Serialize;
use utoipa::ToSchema;

/// 错误响应体（OpenAPI 文档用）
#[derive(Serialize, ToSchema)]
pub struct ErrorBodyDoc {
    pub code: String,
    pub message: String,
    pub trace_id: Option<String>,
}
