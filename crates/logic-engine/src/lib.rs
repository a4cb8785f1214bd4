//! 声明式逻辑规则引擎
//!
//! 提供：
//! - JSON 逻辑表达式求值（算术、比较、布尔、控制流、集合谓词、变量读取）
//! - 表达式依赖扫描
//! - 规则树依赖图构建（正向 / 反向 / 无向视图）
//! - 有状态的规则引擎：单条求值、批量求值、依赖传播与钻取求值

pub mod config;
pub mod engine;
pub mod error;
pub mod evaluator;
pub mod graph;
pub mod logic;
pub mod observability;
pub mod operators;
pub mod path;
pub mod scanner;

pub use config::{EngineConfig, ObservabilityConfig};
pub use engine::{RuleEngine, create_rule_engine};
pub use error::{LogicError, Result};
pub use evaluator::{Evaluator, evaluate};
pub use graph::{DependencyGraph, Direction};
pub use logic::{Logic, is_logic};
pub use operators::Operator;
pub use path::{
    Path, Segment, get_rule_by_path, get_value_by_path, locate_rule, merge_edge, set_value_by_path,
};
pub use scanner::{collect_dependencies, scan};
