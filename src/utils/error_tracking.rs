//! 错误追踪模块
//! 提供请求追踪ID生成

use uuid::Uuid;

/// 复用调用方提供的追踪ID，否则生成新的
pub fn get_or_generate_trace_id(request_id: Option<&str>) -> String {
    request_id
        .map(|s| s.to_string())
        .unwrap_or_else(|| format!("trace_{}", Uuid::new_v4().simple()))
}
