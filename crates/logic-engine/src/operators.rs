//! 逻辑表达式操作符定义

use serde::{Deserialize, Serialize};
use std::fmt;

/// 表达式操作符（封闭集合，不支持扩展）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operator {
    // 算术
    #[serde(rename = "+")]
    Add,
    #[serde(rename = "-")]
    Sub,
    #[serde(rename = "*")]
    Mul,
    #[serde(rename = "/")]
    Div,

    // 链式比较
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = ">")]
    Gt,

    // 严格相等（感知空值）
    #[serde(rename = "===")]
    StrictEq,
    #[serde(rename = "!==")]
    StrictNeq,

    // 布尔
    #[serde(rename = "!")]
    Not,
    #[serde(rename = "!!")]
    Truthy,
    #[serde(rename = "||")]
    OrElse,

    // 极值
    #[serde(rename = "min")]
    Min,
    #[serde(rename = "max")]
    Max,

    // 控制流与聚合
    #[serde(rename = "if")]
    If,
    #[serde(rename = "and")]
    And,
    #[serde(rename = "or")]
    Or,
    #[serde(rename = "some")]
    AnyOf,
    #[serde(rename = "every")]
    AllOf,

    // 变量读取
    #[serde(rename = "var")]
    Var,
}

impl Operator {
    pub const ALL: [Operator; 19] = [
        Self::Add,
        Self::Sub,
        Self::Mul,
        Self::Div,
        Self::Lt,
        Self::Gt,
        Self::StrictEq,
        Self::StrictNeq,
        Self::Not,
        Self::Truthy,
        Self::OrElse,
        Self::Min,
        Self::Max,
        Self::If,
        Self::And,
        Self::Or,
        Self::AnyOf,
        Self::AllOf,
        Self::Var,
    ];

    /// 操作符在规则 JSON 中的键名
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::Lt => "<",
            Self::Gt => ">",
            Self::StrictEq => "===",
            Self::StrictNeq => "!==",
            Self::Not => "!",
            Self::Truthy => "!!",
            Self::OrElse => "||",
            Self::Min => "min",
            Self::Max => "max",
            Self::If => "if",
            Self::And => "and",
            Self::Or => "or",
            Self::AnyOf => "some",
            Self::AllOf => "every",
            Self::Var => "var",
        }
    }

    /// 按键名查找操作符，未识别时返回 None
    pub fn from_key(key: &str) -> Option<Self> {
        let op = match key {
            "+" => Self::Add,
            "-" => Self::Sub,
            "*" => Self::Mul,
            "/" => Self::Div,
            "<" => Self::Lt,
            ">" => Self::Gt,
            "===" => Self::StrictEq,
            "!==" => Self::StrictNeq,
            "!" => Self::Not,
            "!!" => Self::Truthy,
            "||" => Self::OrElse,
            "min" => Self::Min,
            "max" => Self::Max,
            "if" => Self::If,
            "and" => Self::And,
            "or" => Self::Or,
            "some" => Self::AnyOf,
            "every" => Self::AllOf,
            "var" => Self::Var,
            _ => return None,
        };
        Some(op)
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
