//! 依赖扫描
//!
//! 遍历表达式树，找出所有 `var` 读取的路径。

use crate::logic::{LOOP_VARIABLE, Logic};
use crate::operators::Operator;
use serde_json::Value;
use std::collections::BTreeSet;

/// 遍历表达式树，每遇到一个 `var` 路径就调用一次 `on_found`
///
/// 列表的每个元素、表达式的每个操作数都会被递归访问；字面量不产生回调。
pub fn scan<F>(node: &Value, on_found: &mut F)
where
    F: FnMut(&str),
{
    if let Value::Array(items) = node {
        for item in items {
            scan(item, on_found);
        }
        return;
    }

    let Some(logic) = Logic::parse(node) else {
        return;
    };

    if logic.operator() == Operator::Var {
        match logic.operand(0) {
            Some(Value::String(path)) => on_found(path),
            Some(Value::Number(n)) => on_found(&n.to_string()),
            _ => {}
        }
        return;
    }

    for operand in logic.operands() {
        scan(operand, on_found);
    }
}

/// 收集表达式依赖的路径（去重）
///
/// 只移除恰好等于 `$` 的循环变量，`$.x` 这类路径会原样保留。
pub fn collect_dependencies(node: &Value) -> BTreeSet<String> {
    let mut found = BTreeSet::new();
    scan(node, &mut |path: &str| {
        found.insert(path.to_string());
    });
    found.remove(LOOP_VARIABLE);
    found
}
