//! 逻辑表达式模型
//!
//! 表达式是只有一个键的 JSON 对象，键为操作符，值为操作数（单个值或有序列表）。
//! 其他任何结构（多键对象、未识别的键、数组、原始值）都视为字面量。

use crate::operators::Operator;
use serde_json::{Number, Value};

/// `some` / `every` 模板中绑定当前元素的保留键
pub const LOOP_VARIABLE: &str = "$";

/// 已识别表达式的借用视图
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Logic<'a> {
    operator: Operator,
    operand: &'a Value,
}

impl<'a> Logic<'a> {
    /// 尝试把 JSON 节点识别为表达式
    pub fn parse(node: &'a Value) -> Option<Self> {
        let map = node.as_object()?;
        if map.len() != 1 {
            return None;
        }
        let (key, operand) = map.iter().next()?;
        let operator = Operator::from_key(key)?;
        Some(Self { operator, operand })
    }

    pub fn operator(&self) -> Operator {
        self.operator
    }

    /// 操作数列表：列表形式按原样展开，单个操作数视为长度为 1 的列表
    pub fn operands(&self) -> &'a [Value] {
        match self.operand {
            Value::Array(items) => items.as_slice(),
            single => std::slice::from_ref(single),
        }
    }

    pub fn operand(&self, index: usize) -> Option<&'a Value> {
        self.operands().get(index)
    }
}

/// 节点是否为合法的逻辑表达式
pub fn is_logic(node: &Value) -> bool {
    Logic::parse(node).is_some()
}

/// 节点是否为原始值（字符串、数字、布尔或空）
pub fn is_primitive(value: &Value) -> bool {
    !matches!(value, Value::Array(_) | Value::Object(_))
}

/// 节点是否为规则树中的终端值：原始值、全部由原始值组成的数组或逻辑表达式
pub fn is_terminal(value: &Value) -> bool {
    match value {
        Value::Array(items) => items.iter().all(is_primitive),
        Value::Object(_) => is_logic(value),
        _ => true,
    }
}

/// 真值判断
///
/// `false`、`0`、`NaN`、空字符串和空值为假；数组与对象（包括空的）均为真。
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// 数值转换，无法转换时得到 NaN
pub fn to_number(value: &Value) -> f64 {
    match value {
        Value::Null => f64::NAN,
        Value::Bool(b) => {
            if *b {
                1.0
            } else {
                0.0
            }
        }
        Value::Number(n) => n.as_f64().unwrap_or(f64::NAN),
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                0.0
            } else {
                trimmed.parse().unwrap_or(f64::NAN)
            }
        }
        Value::Array(items) => match items.as_slice() {
            [] => 0.0,
            [single] => to_number(single),
            _ => f64::NAN,
        },
        Value::Object(_) => f64::NAN,
    }
}

const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

/// 把计算结果转换回 JSON 数值
///
/// 整数值输出为整数，非有限值（NaN、无穷）无法用 JSON 表示，输出为空值。
pub fn number_value(n: f64) -> Value {
    if !n.is_finite() {
        return Value::Null;
    }
    if n.fract() == 0.0 && n.abs() <= MAX_SAFE_INTEGER {
        return Value::from(n as i64);
    }
    Number::from_f64(n).map(Value::Number).unwrap_or(Value::Null)
}

/// 获取值的类型名称
pub fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
