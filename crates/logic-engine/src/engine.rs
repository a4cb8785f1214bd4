//! 规则引擎
//!
//! 持有规则树、由它推导出的依赖图和一份可替换的事实快照。
//! 规则树与依赖图在构造后不再变化；事实快照存放在 `ArcSwapOption` 中，
//! 每次调用只做一次原子 load，并发替换不会影响进行中的求值。

use crate::config::EngineConfig;
use crate::error::Result;
use crate::evaluator::Evaluator;
use crate::graph::{DependencyGraph, Direction};
use crate::logic::type_name;
use crate::path::{Path, get_rule_by_path, locate_rule, set_value_by_path};
use arc_swap::ArcSwapOption;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

/// 规则引擎
pub struct RuleEngine {
    rules: Value,
    graph: DependencyGraph,
    facts: ArcSwapOption<Value>,
    evaluator: Evaluator,
}

impl RuleEngine {
    /// 使用默认配置创建
    pub fn new(rules: Value) -> Self {
        Self::with_config(rules, &EngineConfig::default())
    }

    pub fn with_config(rules: Value, config: &EngineConfig) -> Self {
        let graph = DependencyGraph::build(&rules);
        let evaluator = Evaluator::new().with_max_depth(config.max_depth);
        info!(
            edges = graph.edge_count(),
            max_depth = evaluator.max_depth(),
            "规则引擎已创建"
        );

        Self {
            rules,
            graph,
            facts: ArcSwapOption::empty(),
            evaluator,
        }
    }

    /// 从 JSON 字符串创建
    pub fn from_json(json: &str) -> Result<Self> {
        let rules: Value = serde_json::from_str(json)?;
        Ok(Self::new(rules))
    }

    pub fn rules(&self) -> &Value {
        &self.rules
    }

    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    /// 当前事实快照
    pub fn facts(&self) -> Option<Arc<Value>> {
        self.facts.load_full()
    }

    /// 替换事实快照
    pub fn use_facts(&self, facts: Value) -> &Self {
        self.facts.store(Some(Arc::new(facts)));
        self
    }

    /// 对 `path` 处的规则求值
    ///
    /// 优先使用传入的 `facts`，其次是快照，都没有时用空对象求值。
    /// 路径上没有规则时结果为空值。
    #[instrument(skip(self, facts))]
    pub fn run(&self, path: &str, facts: Option<&Value>) -> Result<Value> {
        let path = Path::parse(path);
        if let Some(facts) = facts {
            return self.run_path(&path, facts);
        }

        let snapshot = self.facts.load_full();
        match snapshot.as_deref() {
            Some(facts) => self.run_path(&path, facts),
            None => {
                warn!("未提供事实数据，使用空对象求值");
                self.run_path(&path, &Value::Object(Map::new()))
            }
        }
    }

    fn run_path(&self, path: &Path, facts: &Value) -> Result<Value> {
        match get_rule_by_path(&self.rules, path) {
            Some(rule) => self.evaluator.evaluate(rule, facts),
            None => {
                debug!(path = %path, "路径上没有规则");
                Ok(Value::Null)
            }
        }
    }

    /// 批量求值
    ///
    /// `entries` 为数组，元素可以是路径字符串，也可以是 `[path]` 或 `[path, facts]`。
    /// 非数组输入只记录错误并返回空列表；格式不对的元素会被跳过。
    #[instrument(skip_all)]
    pub fn run_several(&self, entries: &Value) -> Result<Vec<Value>> {
        let Value::Array(entries) = entries else {
            error!(input_type = type_name(entries), "run_several 需要数组参数");
            return Ok(Vec::new());
        };

        let mut results = Vec::with_capacity(entries.len());
        for (index, entry) in entries.iter().enumerate() {
            let (path, facts) = match entry {
                Value::String(path) => (path.as_str(), None),
                Value::Array(pair) => match pair.as_slice() {
                    [Value::String(path)] => (path.as_str(), None),
                    [Value::String(path), facts] => {
                        (path.as_str(), Some(facts).filter(|f| !f.is_null()))
                    }
                    _ => {
                        warn!(index, "批量求值条目格式无效，已跳过");
                        continue;
                    }
                },
                _ => {
                    warn!(index, "批量求值条目格式无效，已跳过");
                    continue;
                }
            };
            results.push(self.run(path, facts)?);
        }
        Ok(results)
    }

    /// `path` 在指定视图中的传递依赖闭包
    pub fn propagate(&self, path: &str, direction: Direction) -> Result<Vec<String>> {
        self.graph.propagate(&Path::parse(path), direction)
    }

    /// 对 `path` 及其传递闭包中的每条路径依次求值
    ///
    /// 结果顺序为：`path` 自身，然后按闭包顺序。求值在事实数据的副本上进行，
    /// 每条规则的结果会写回副本中对应的路径，后续依赖它的规则读到的是新值。
    #[instrument(skip(self, facts))]
    pub fn drill(
        &self,
        path: &str,
        facts: Option<&Value>,
        direction: Direction,
    ) -> Result<Vec<Value>> {
        let root = Path::parse(path);
        let closure = self.graph.propagate(&root, direction)?;
        let mut working = self.working_facts(facts);

        let targets = std::iter::once(root).chain(closure.iter().map(|p| Path::parse(p)));
        let mut results = Vec::with_capacity(closure.len() + 1);
        for target in targets {
            let Some((at, rule)) = locate_rule(&self.rules, &target) else {
                debug!(path = %target, "路径上没有规则");
                results.push(Value::Null);
                continue;
            };
            let value = self.evaluator.evaluate(rule, &working)?;
            // 写回规则实际所在的路径；整棵规则树本身是表达式时不写回
            if !at.is_empty() {
                set_value_by_path(&mut working, &at, value.clone());
            }
            results.push(value);
        }

        debug!(evaluated = results.len(), "钻取求值完成");
        Ok(results)
    }

    fn working_facts(&self, facts: Option<&Value>) -> Value {
        if let Some(facts) = facts {
            return facts.clone();
        }
        match self.facts.load_full() {
            Some(snapshot) => (*snapshot).clone(),
            None => {
                warn!("未提供事实数据，使用空对象求值");
                Value::Object(Map::new())
            }
        }
    }
}

/// 创建规则引擎
pub fn create_rule_engine(rules: Value) -> RuleEngine {
    RuleEngine::new(rules)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LogicError;
    use serde_json::json;

    fn form_engine() -> RuleEngine {
        RuleEngine::new(json!({
            "a": {"var": "b"},
            "b": {"+": [{"var": "c"}, 1]},
            "limits": {
                "upper": 10
            }
        }))
    }

    #[test]
    fn test_engine_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<RuleEngine>();
    }

    #[test]
    fn test_run_with_explicit_facts() {
        let engine = form_engine();
        assert_eq!(engine.run("b", Some(&json!({"c": 4}))).unwrap(), json!(5));
        assert_eq!(engine.run("limits.upper", None).unwrap(), json!(10));
    }

    #[test]
    fn test_run_uses_snapshot_and_explicit_override() {
        let engine = form_engine();
        engine.use_facts(json!({"c": 1}));
        assert_eq!(engine.run("b", None).unwrap(), json!(2));
        assert_eq!(engine.run("b", Some(&json!({"c": 9}))).unwrap(), json!(10));
        // 单次覆盖不改变快照
        assert_eq!(engine.facts().as_deref(), Some(&json!({"c": 1})));
    }

    #[test]
    fn test_use_facts_is_chainable() {
        let engine = form_engine();
        let result = engine
            .use_facts(json!({"c": 1}))
            .use_facts(json!({"c": 2}))
            .run("b", None)
            .unwrap();
        assert_eq!(result, json!(3));
    }

    #[test]
    fn test_run_without_facts_uses_empty_store() {
        let engine = form_engine();
        assert_eq!(engine.run("a", None).unwrap(), Value::Null);
    }

    #[test]
    fn test_run_missing_rule_is_null() {
        let engine = form_engine();
        assert_eq!(engine.run("nope", Some(&json!({}))).unwrap(), Value::Null);
    }

    #[test]
    fn test_run_several() {
        let engine = form_engine();
        engine.use_facts(json!({"c": 1, "b": 20}));
        let results = engine
            .run_several(&json!([
                "b",
                ["b", {"c": 5}],
                ["limits.upper"],
                ["a", null],
                42
            ]))
            .unwrap();
        assert_eq!(results, vec![json!(2), json!(6), json!(10), json!(20)]);
    }

    #[test]
    fn test_run_several_rejects_non_array() {
        let engine = form_engine();
        assert!(engine.run_several(&json!("not-an-array")).unwrap().is_empty());
        assert!(engine.run_several(&json!({"a": 1})).unwrap().is_empty());
    }

    #[test]
    fn test_drill_feeds_results_forward() {
        let engine = form_engine();
        engine.use_facts(json!({"c": 0}));
        let results = engine
            .drill("c", Some(&json!({"c": 9})), Direction::Backward)
            .unwrap();
        // c 本身不是规则；b = 9 + 1；a 读到的是刚算出的 b
        assert_eq!(results, vec![Value::Null, json!(10), json!(10)]);
        assert_eq!(engine.facts().as_deref(), Some(&json!({"c": 0})));
    }

    #[test]
    fn test_drill_propagates_evaluation_errors() {
        let engine = RuleEngine::new(json!({
            "broken": {"if": []},
            "source": 1
        }));
        // broken 没有依赖，直接求值它本身
        let err = engine.drill("broken", None, Direction::Forward).unwrap_err();
        assert!(matches!(err, LogicError::MissingOperand { .. }));
    }

    #[test]
    fn test_drill_writes_back_at_resolved_rule_path() {
        let engine = RuleEngine::new(json!({
            "b": {"+": [{"var": "c"}, 1]},
            "d": {"var": "b"}
        }));
        // `b.x` 解析到 `b` 规则，结果写回 `b`，`d` 读到的是标量
        let results = engine
            .drill("b.x", Some(&json!({"c": 1, "b": 0})), Direction::Backward)
            .unwrap();
        assert_eq!(results, vec![json!(2), json!(2)]);
    }

    #[test]
    fn test_from_json() {
        let engine = RuleEngine::from_json(r#"{"x": {"*": [{"var": "y"}, 2]}}"#).unwrap();
        assert_eq!(engine.run("x", Some(&json!({"y": 4}))).unwrap(), json!(8));
        assert!(RuleEngine::from_json("{not json").is_err());
    }

    #[test]
    fn test_with_config_applies_depth_limit() {
        let config = EngineConfig {
            max_depth: 2,
            ..EngineConfig::default()
        };
        let engine = RuleEngine::with_config(
            json!({"deep": {"!": [{"!": [{"!": [{"var": "x"}]}]}]}}),
            &config,
        );
        assert!(matches!(
            engine.run("deep", Some(&json!({}))),
            Err(LogicError::DepthExceeded { limit: 2 })
        ));
    }
}
