//! 依赖图
//!
//! 一次性遍历整棵规则树，为每条规则收集依赖路径，生成三种视图：
//! - `forward`：字段 -> 它读取的路径
//! - `backward`：路径 -> 读取它的字段
//! - `undirected`：两者的浅合并，同名顶层键以 `backward` 为准
//!
//! 视图与规则树同构：分组规则的边集合是嵌套对象，单个字段的边集合是路径列表。

use crate::error::{LogicError, Result};
use crate::logic::is_logic;
use crate::path::{Path, get_value_by_path, merge_edge, set_value_by_path};
use crate::scanner::collect_dependencies;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info};

/// 传播方向
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Forward,
    Backward,
    #[default]
    Undirected,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Forward => "forward",
            Self::Backward => "backward",
            Self::Undirected => "undirected",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "forward" => Ok(Self::Forward),
            "backward" => Ok(Self::Backward),
            "undirected" => Ok(Self::Undirected),
            other => Err(format!("无效的传播方向: {}", other)),
        }
    }
}

/// 规则依赖图
#[derive(Debug, Clone, Serialize)]
pub struct DependencyGraph {
    forward: Value,
    backward: Value,
    undirected: Value,
    #[serde(skip)]
    edge_count: usize,
}

impl DependencyGraph {
    /// 遍历规则树构建依赖图
    pub fn build(rules: &Value) -> Self {
        let mut graph = Self {
            forward: Value::Object(Map::new()),
            backward: Value::Object(Map::new()),
            undirected: Value::Object(Map::new()),
            edge_count: 0,
        };

        graph.walk(rules, &Path::default());
        graph.undirected = shallow_merge(&graph.forward, &graph.backward);

        info!(edges = graph.edge_count, "依赖图构建完成");
        graph
    }

    fn walk(&mut self, node: &Value, path: &Path) {
        if is_logic(node) {
            if path.is_empty() {
                debug!("规则树根节点本身是表达式，跳过");
                return;
            }
            for dependency in collect_dependencies(node) {
                // 用依赖路径替换当前路径的首段，使同组内的相对引用落到相同位置
                let dependency_path = path.with_first_replaced(&Path::parse(&dependency));
                self.record(path, &dependency_path);
            }
            return;
        }

        if let Value::Object(map) = node {
            for (key, child) in map {
                self.walk(child, &path.child(key.as_str()));
            }
        }
    }

    fn record(&mut self, field: &Path, dependency: &Path) {
        let field_text = field.to_string();
        let dependency_text = dependency.to_string();
        debug!(field = %field_text, dependency = %dependency_text, "记录依赖边");

        insert_edge(&mut self.forward, field, &dependency_text);
        insert_edge(&mut self.backward, dependency, &field_text);
        self.edge_count += 1;
    }

    pub fn forward(&self) -> &Value {
        &self.forward
    }

    pub fn backward(&self) -> &Value {
        &self.backward
    }

    pub fn undirected(&self) -> &Value {
        &self.undirected
    }

    /// 记录的依赖边数量
    pub fn edge_count(&self) -> usize {
        self.edge_count
    }

    /// 获取指定方向的视图
    pub fn view(&self, direction: Direction) -> &Value {
        match direction {
            Direction::Forward => &self.forward,
            Direction::Backward => &self.backward,
            Direction::Undirected => &self.undirected,
        }
    }

    /// 路径在指定视图中的直接邻居
    ///
    /// 使用非严格查找：路径比图更深时回退到沿途的边集合；分组边集合会被展开成平铺列表。
    pub fn edges_of(&self, path: &Path, direction: Direction) -> Vec<String> {
        let mut edges = Vec::new();
        if let Some(found) = get_value_by_path(self.view(direction), path, false) {
            flatten_edges(&found, &mut edges);
        }
        edges
    }

    /// 从 `path` 出发的传递闭包（先序深度优先）
    ///
    /// 不去重：经由多条边可达的路径会出现多次。沿当前展开链回到已访问路径时返回
    /// [`LogicError::DependencyCycle`]。
    pub fn propagate(&self, path: &Path, direction: Direction) -> Result<Vec<String>> {
        let mut closure = Vec::new();
        let mut chain = vec![path.to_string()];
        self.expand(path, direction, &mut chain, &mut closure)?;
        Ok(closure)
    }

    fn expand(
        &self,
        path: &Path,
        direction: Direction,
        chain: &mut Vec<String>,
        closure: &mut Vec<String>,
    ) -> Result<()> {
        for next in self.edges_of(path, direction) {
            if chain.contains(&next) {
                return Err(LogicError::DependencyCycle {
                    path: next,
                    chain: chain.clone(),
                });
            }
            closure.push(next.clone());
            chain.push(next.clone());
            self.expand(&Path::parse(&next), direction, chain, closure)?;
            chain.pop();
        }
        Ok(())
    }
}

fn insert_edge(view: &mut Value, at: &Path, target: &str) {
    push_down_covering_edges(view, at);
    let existing = get_value_by_path(view, at, true);
    let merged = merge_edge(existing, target);
    set_value_by_path(view, at, merged);
}

/// `at` 的某个前缀上已有平铺边集合时，把它改写成以下一段为子键的分组
///
/// 原有的每条边都追加子键后缀保留下来，与 [`merge_edge`] 把整体边合并进已有分组的结果同构。
fn push_down_covering_edges(view: &mut Value, at: &Path) {
    let mut current = view;
    for segment in at.segments() {
        let key = segment.as_key();
        if let Value::Array(edges) = current {
            let pushed: Vec<Value> = edges
                .iter()
                .filter_map(Value::as_str)
                .map(|edge| Value::String(format!("{}.{}", edge, key)))
                .collect();
            debug!(child = key, edges = pushed.len(), "平铺边集合下推为分组");
            let mut group = Map::new();
            group.insert(key.to_string(), Value::Array(pushed));
            *current = Value::Object(group);
        }
        let Value::Object(map) = current else {
            return;
        };
        match map.get_mut(key) {
            Some(next) => current = next,
            None => return,
        }
    }
}

fn shallow_merge(forward: &Value, backward: &Value) -> Value {
    let mut merged = forward.as_object().cloned().unwrap_or_default();
    if let Some(backward) = backward.as_object() {
        for (key, edges) in backward {
            merged.insert(key.clone(), edges.clone());
        }
    }
    Value::Object(merged)
}

fn flatten_edges(edges: &Value, out: &mut Vec<String>) {
    match edges {
        Value::String(path) => out.push(path.clone()),
        Value::Array(items) => items.iter().for_each(|item| flatten_edges(item, out)),
        Value::Object(map) => map.values().for_each(|item| flatten_edges(item, out)),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn chain_rules() -> Value {
        json!({
            "a": {"var": "b"},
            "b": {"+": [{"var": "c"}, 1]}
        })
    }

    #[test]
    fn test_forward_and_backward_views() {
        let graph = DependencyGraph::build(&chain_rules());
        assert_eq!(graph.forward(), &json!({"a": ["b"], "b": ["c"]}));
        assert_eq!(graph.backward(), &json!({"b": ["a"], "c": ["b"]}));
        assert_eq!(graph.undirected(), &json!({"a": ["b"], "b": ["a"], "c": ["b"]}));
        assert_eq!(graph.edge_count(), 2);
    }

    #[test]
    fn test_nested_group_dependency_path() {
        let rules = json!({
            "billing": {
                "total": {"+": [{"var": "order"}, {"var": "tax"}]}
            }
        });
        let graph = DependencyGraph::build(&rules);
        assert_eq!(
            graph.forward(),
            &json!({"billing": {"total": ["order.total", "tax.total"]}})
        );
        assert_eq!(
            graph.backward(),
            &json!({
                "order": {"total": ["billing.total"]},
                "tax": {"total": ["billing.total"]}
            })
        );
    }

    #[test]
    fn test_group_edge_set_is_merged_per_child() {
        // `summary` 读取整个 `input`，而 `input` 下已有字段级的反向边
        let rules = json!({
            "form": {"name": {"var": "input"}},
            "summary": {"var": "input"}
        });
        let graph = DependencyGraph::build(&rules);
        assert_eq!(graph.forward()["summary"], json!(["input"]));
        assert_eq!(
            graph.backward()["input"],
            json!({"name": ["form.name", "summary.name"]})
        );
    }

    #[test]
    fn test_whole_path_edges_survive_later_field_edges() {
        // `alpha` 先读取整个 `order`，随后分组规则落到 `order.total`
        let rules = json!({
            "alpha": {"var": "order"},
            "billing": {"total": {"var": "order"}}
        });
        let graph = DependencyGraph::build(&rules);
        assert_eq!(
            graph.backward(),
            &json!({"order": {"total": ["alpha.total", "billing.total"]}})
        );
        assert_eq!(graph.forward()["alpha"], json!(["order"]));

        let closure = graph
            .propagate(&Path::parse("order"), Direction::Backward)
            .unwrap();
        assert_eq!(closure, vec!["alpha.total", "billing.total"]);
    }

    #[test]
    fn test_edge_shape_independent_of_insertion_order() {
        let list_first = DependencyGraph::build(&json!({
            "alpha": {"var": "order"},
            "billing": {"total": {"var": "order"}}
        }));
        let group_first = DependencyGraph::build(&json!({
            "billing": {"total": {"var": "order"}},
            "zeta": {"var": "order"}
        }));
        assert_eq!(
            list_first.backward()["order"],
            json!({"total": ["alpha.total", "billing.total"]})
        );
        assert_eq!(
            group_first.backward()["order"],
            json!({"total": ["billing.total", "zeta.total"]})
        );
    }

    #[test]
    fn test_push_down_reaches_nested_levels() {
        let rules = json!({
            "alpha": {"var": "order"},
            "billing": {"lines": {"amount": {"var": "order"}}}
        });
        let graph = DependencyGraph::build(&rules);
        assert_eq!(
            graph.backward(),
            &json!({
                "order": {"lines": {"amount": ["alpha.lines.amount", "billing.lines.amount"]}}
            })
        );
    }

    #[test]
    fn test_root_expression_records_nothing() {
        let graph = DependencyGraph::build(&json!({"var": "x"}));
        assert_eq!(graph.edge_count(), 0);
        assert_eq!(graph.forward(), &json!({}));
    }

    #[test]
    fn test_edges_of_flattens_groups() {
        let rules = json!({
            "billing": {
                "net": {"var": "order"},
                "gross": {"var": "order"}
            }
        });
        let graph = DependencyGraph::build(&rules);
        let mut edges = graph.edges_of(&Path::parse("billing"), Direction::Forward);
        edges.sort();
        assert_eq!(edges, vec!["order.gross", "order.net"]);
        assert!(graph.edges_of(&Path::parse("unknown"), Direction::Forward).is_empty());
    }

    #[test]
    fn test_propagate_backward_closure() {
        let graph = DependencyGraph::build(&chain_rules());
        let closure = graph
            .propagate(&Path::parse("c"), Direction::Backward)
            .unwrap();
        assert_eq!(closure, vec!["b", "a"]);

        let closure = graph
            .propagate(&Path::parse("a"), Direction::Forward)
            .unwrap();
        assert_eq!(closure, vec!["b", "c"]);
    }

    #[test]
    fn test_propagate_keeps_duplicates() {
        let rules = json!({
            "left": {"var": "base"},
            "right": {"var": "base"},
            "top": {"+": [{"var": "left"}, {"var": "right"}]},
            "base": 1
        });
        let graph = DependencyGraph::build(&rules);
        let closure = graph
            .propagate(&Path::parse("top"), Direction::Forward)
            .unwrap();
        assert_eq!(closure, vec!["left", "base", "right", "base"]);
    }

    #[test]
    fn test_propagate_detects_cycle() {
        let rules = json!({
            "x": {"var": "y"},
            "y": {"var": "x"}
        });
        let graph = DependencyGraph::build(&rules);
        let err = graph
            .propagate(&Path::parse("x"), Direction::Forward)
            .unwrap_err();
        assert!(matches!(err, LogicError::DependencyCycle { ref path, .. } if path == "x"));

        // 无向视图中任何两级依赖都会互相可达
        let graph = DependencyGraph::build(&chain_rules());
        assert!(
            graph
                .propagate(&Path::parse("c"), Direction::Undirected)
                .is_err()
        );
    }

    #[test]
    fn test_direction_parse_and_display() {
        assert_eq!("backward".parse::<Direction>(), Ok(Direction::Backward));
        assert!("sideways".parse::<Direction>().is_err());
        assert_eq!(Direction::default(), Direction::Undirected);
        assert_eq!(Direction::Forward.to_string(), "forward");
        assert_eq!(serde_json::to_value(Direction::Undirected).unwrap(), json!("undirected"));
    }
}
