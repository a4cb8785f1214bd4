//! 路径访问
//!
//! 规则集、事实数据和依赖图都是嵌套的 JSON 结构，这里提供按点号路径读写的工具。
//! 路径只在公开边界解析一次，内部统一使用 [`Path`] 的分段表示。

use crate::logic::{is_primitive, is_terminal};
use serde_json::{Map, Value};
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

/// 通配段的文本形式
pub const WILDCARD: &str = "*";

/// 路径分段
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Segment {
    Key(String),
    /// `*`：展开到当前层级的所有值
    Wildcard,
}

impl Segment {
    /// 作为普通键使用时的名称
    pub fn as_key(&self) -> &str {
        match self {
            Self::Key(key) => key,
            Self::Wildcard => WILDCARD,
        }
    }
}

impl From<&str> for Segment {
    fn from(text: &str) -> Self {
        if text == WILDCARD {
            Self::Wildcard
        } else {
            Self::Key(text.to_string())
        }
    }
}

/// 点号分隔路径的结构化表示
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Path {
    segments: Vec<Segment>,
}

impl Path {
    /// 从点号分隔文本解析，空字符串得到空路径
    pub fn parse(text: &str) -> Self {
        if text.is_empty() {
            return Self::default();
        }
        Self {
            segments: text.split('.').map(Segment::from).collect(),
        }
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// 追加一个子键
    pub fn child(&self, key: impl Into<String>) -> Self {
        let mut segments = self.segments.clone();
        segments.push(Segment::Key(key.into()));
        Self { segments }
    }

    pub fn join(&self, other: &Path) -> Self {
        let mut segments = self.segments.clone();
        segments.extend(other.segments.iter().cloned());
        Self { segments }
    }

    /// 前 `len` 段组成的路径
    pub fn prefix(&self, len: usize) -> Self {
        Self {
            segments: self.segments[..len.min(self.segments.len())].to_vec(),
        }
    }

    /// 用 `replacement` 替换首段，其余分段保持不变
    pub fn with_first_replaced(&self, replacement: &Path) -> Self {
        let rest = Self {
            segments: self.segments.get(1..).unwrap_or_default().to_vec(),
        };
        replacement.join(&rest)
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            f.write_str(segment.as_key())?;
        }
        Ok(())
    }
}

impl FromStr for Path {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

impl From<&str> for Path {
    fn from(text: &str) -> Self {
        Self::parse(text)
    }
}

/// 取下一层的值：对象按键取值，数组按下标取值
pub(crate) fn child<'a>(current: &'a Value, key: &str) -> Option<&'a Value> {
    match current {
        Value::Object(map) => map.get(key),
        Value::Array(items) => key.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    }
}

fn is_empty_object(value: &Value) -> bool {
    value.as_object().is_some_and(Map::is_empty)
}

/// 按路径读取值
///
/// `*` 段会对当前层的每个值分别求剩余路径，结果展平并过滤空值；
/// 若 `*` 是最后一段且遇到非原始值，会继续向下展开直到叶子。
///
/// 非严格模式下，根以下的某段缺失时返回当前已到达的值，而不是 `None`，
/// 依赖图查询借此回退到所在的分组。
pub fn get_value_by_path(obj: &Value, path: &Path, strict: bool) -> Option<Value> {
    lookup(obj, path.segments(), strict, true)
}

fn lookup(current: &Value, segments: &[Segment], strict: bool, at_root: bool) -> Option<Value> {
    let Some((head, rest)) = segments.split_first() else {
        return Some(current.clone());
    };

    match head {
        Segment::Wildcard => Some(fan_out(current, rest, strict)),
        Segment::Key(key) => match child(current, key) {
            Some(next) => lookup(next, rest, strict, false),
            None if strict || at_root => None,
            None => Some(current.clone()),
        },
    }
}

fn fan_out(current: &Value, rest: &[Segment], strict: bool) -> Value {
    let children: Vec<&Value> = match current {
        Value::Object(map) => map.values().collect(),
        Value::Array(items) => items.iter().collect(),
        _ => Vec::new(),
    };

    let mut found = Vec::new();
    for value in children {
        let result = if rest.is_empty() {
            if is_primitive(value) {
                Some(value.clone())
            } else {
                Some(fan_out(value, rest, strict))
            }
        } else {
            lookup(value, rest, strict, false)
        };

        match result {
            Some(Value::Array(items)) => found.extend(items.into_iter().filter(|v| !v.is_null())),
            Some(Value::Null) | None => {}
            Some(other) => found.push(other),
        }
    }
    Value::Array(found)
}

/// 按路径写入值，缺失的中间层自动创建为对象
///
/// 空路径直接用 `value` 替换根。
pub fn set_value_by_path(obj: &mut Value, path: &Path, value: Value) {
    let Some((last, parents)) = path.segments().split_last() else {
        *obj = value;
        return;
    };

    let mut current = obj;
    for segment in parents {
        current = ensure_object(current)
            .entry(segment.as_key().to_string())
            .or_insert_with(|| Value::Object(Map::new()));
    }
    ensure_object(current).insert(last.as_key().to_string(), value);
}

fn ensure_object(value: &mut Value) -> &mut Map<String, Value> {
    if !value.is_object() {
        *value = Value::Object(Map::new());
    }
    match value {
        Value::Object(map) => map,
        _ => unreachable!(),
    }
}

/// 在规则树中按路径查找规则
///
/// 沿途一旦遇到终端值（原始值、原始值数组或逻辑表达式）就直接返回它，
/// 因此只写出前缀的路径也能解析到完整规则；路径上出现空对象时返回 `None`。
pub fn get_rule_by_path<'a>(rule_set: &'a Value, path: &Path) -> Option<&'a Value> {
    locate_rule(rule_set, path).map(|(_, rule)| rule)
}

/// 同 [`get_rule_by_path`]，并返回规则实际所在的路径
///
/// 沿途提前遇到终端值时，返回的是 `path` 的对应前缀。
pub fn locate_rule<'a>(rule_set: &'a Value, path: &Path) -> Option<(Path, &'a Value)> {
    let mut current = rule_set;
    for (depth, segment) in path.segments().iter().enumerate() {
        if is_terminal(current) {
            return Some((path.prefix(depth), current));
        }
        if is_empty_object(current) {
            return None;
        }
        current = child(current, segment.as_key())?;
    }

    if is_empty_object(current) {
        None
    } else {
        Some((path.clone(), current))
    }
}

/// 把一条依赖边合并到已有的边集合中
///
/// - 已有列表：追加 `new_path`
/// - 已有分组（对象）：递归进入每个子键，子键名追加到路径上，保持与规则树同构
/// - 其他情况：新建单元素列表
pub fn merge_edge(existing: Option<Value>, new_path: &str) -> Value {
    match existing {
        Some(Value::Array(mut items)) => {
            items.push(Value::String(new_path.to_string()));
            Value::Array(items)
        }
        Some(Value::Object(map)) => Value::Object(
            map.into_iter()
                .map(|(key, edges)| {
                    let merged = merge_edge(Some(edges), &format!("{}.{}", new_path, key));
                    (key, merged)
                })
                .collect(),
        ),
        _ => Value::Array(vec![Value::String(new_path.to_string())]),
    }
}
