//! Trace ID 中间件
//! 为每个请求生成唯一的 trace_id，用于全链路追踪

use std::convert::Infallible;

use axum::{
    async_trait,
    extract::{FromRequestParts, Request},
    http::{request::Parts, HeaderValue},
    middleware::Next,
    response::Response,
};

use crate::utils::get_or_generate_trace_id;

pub const TRACE_ID_HEADER: &str = "X-Trace-Id";

/// 请求扩展中的追踪ID
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceId(pub String);

/// Trace ID 生成器
pub struct TraceIdGenerator;

impl TraceIdGenerator {
    /// 从请求头中提取 trace_id，如果没有则生成新的
    pub fn get_or_generate(req: &Request) -> String {
        let from_header = req
            .headers()
            .get(TRACE_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty() && v.len() <= 128);

        get_or_generate_trace_id(from_header)
    }
}

/// Trace ID 中间件
/// 为每个请求生成或提取 trace_id，并添加到请求扩展和响应头中
pub async fn trace_id_middleware(mut req: Request, next: Next) -> Response {
    let trace_id = TraceIdGenerator::get_or_generate(&req);

    req.extensions_mut().insert(TraceId(trace_id.clone()));

    let mut response = next.run(req).await;

    if let Ok(header_value) = HeaderValue::from_str(&trace_id) {
        response.headers_mut().insert(TRACE_ID_HEADER, header_value);
    }

    response
}

/// 处理器中提取 trace_id；中间件未挂载时现场生成
#[async_trait]
impl<S> FromRequestParts<S> for TraceId
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts
            .extensions
            .get::<TraceId>()
            .cloned()
            .unwrap_or_else(|| TraceId(get_or_generate_trace_id(None))))
    }
}
