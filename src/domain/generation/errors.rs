//! Generation Context - Errors

use thiserror::Error;

use super::ModelRole;

/// 生成参数错误
#[derive(Debug, Error)]
pub enum ParamsError {
    #[error("malformed {role} parameters: {reason}")]
    Malformed { role: ModelRole, reason: String },

    #[error("invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

impl ParamsError {
    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            reason: reason.into(),
        }
    }
}
