//! Data Transfer Objects

use serde::{Deserialize, Serialize};

// ============================================================================
// 统一响应结构
// ============================================================================

/// 统一 API 响应格式（管理类接口使用）
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub errno: i32,
    pub error: String,
    pub data: Option<T>,
}

impl<T: Serialize> ApiResponse<T> {
    /// 成功响应
    pub fn success(data: T) -> Self {
        Self {
            errno: 0,
            error: String::new(),
            data: Some(data),
        }
    }
}

// ============================================================================
// Generation DTOs
// ============================================================================

/// POST /generate 请求体
#[derive(Debug, Deserialize)]
pub struct GenerateRequest {
    /// 角色名，接受 `image-generator` 或 `image_generator`
    pub role: String,
    #[serde(default = "empty_params")]
    pub params: serde_json::Value,
    /// 缺省时由服务端生成
    #[serde(default)]
    pub task_id: Option<String>,
}

fn empty_params() -> serde_json::Value {
    serde_json::Value::Object(serde_json::Map::new())
}

/// POST /generate 响应体
#[derive(Debug, Serialize, Deserialize)]
pub struct GenerateResponse {
    pub task_id: String,
    pub status: String,
}

/// DELETE /task/progress/{task_id} 响应体
#[derive(Debug, Serialize, Deserialize)]
pub struct AcknowledgeResponse {
    pub task_id: String,
    pub removed: bool,
}
