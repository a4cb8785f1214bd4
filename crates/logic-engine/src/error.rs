//! 逻辑引擎错误类型

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LogicError {
    #[error("操作符 {operator} 缺少操作数")]
    MissingOperand { operator: String },

    #[error("表达式嵌套超过深度上限 {limit}")]
    DepthExceeded { limit: usize },

    #[error("检测到依赖环: {path} (路径链: {})", .chain.join(" -> "))]
    DependencyCycle { path: String, chain: Vec<String> },

    #[error("JSON 序列化错误: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl LogicError {
    pub(crate) fn missing_operand(operator: impl ToString) -> Self {
        Self::MissingOperand {
            operator: operator.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, LogicError>;
