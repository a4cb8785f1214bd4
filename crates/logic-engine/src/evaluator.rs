//! 表达式求值器
//!
//! 把表达式树和事实数据归约为一个值。列表节点逐项求值，非表达式节点按字面量原样返回。

use crate::error::{LogicError, Result};
use crate::logic::{LOOP_VARIABLE, Logic, is_truthy, number_value, to_number};
use crate::operators::Operator;
use crate::path::{Path, child};
use serde_json::Value;
use tracing::warn;

/// 默认递归深度上限
pub const DEFAULT_MAX_DEPTH: usize = 512;

/// 求值作用域：事实数据，以及 `some` / `every` 当前绑定的元素
#[derive(Debug, Clone, Copy)]
struct Scope<'a> {
    facts: &'a Value,
    binding: Option<&'a Value>,
}

impl<'a> Scope<'a> {
    fn new(facts: &'a Value) -> Self {
        Self {
            facts,
            binding: None,
        }
    }

    fn bind(&self, element: &'a Value) -> Self {
        Self {
            facts: self.facts,
            binding: Some(element),
        }
    }

    /// 按路径读取变量
    ///
    /// 任何一层的值为假（包括缺失、`0`、`""`、`false`）时立即停止，返回该值。
    fn resolve(&self, path: &Path) -> Value {
        let mut segments = path.segments();
        let mut current = self.facts;

        if let (Some(binding), Some(first)) = (self.binding, segments.first()) {
            if first.as_key() == LOOP_VARIABLE {
                current = binding;
                segments = &segments[1..];
            }
        }

        for segment in segments {
            if !is_truthy(current) {
                return current.clone();
            }
            current = match child(current, segment.as_key()) {
                Some(next) => next,
                None => return Value::Null,
            };
        }
        current.clone()
    }
}

/// 表达式求值器
pub struct Evaluator {
    max_depth: usize,
}

impl Evaluator {
    pub fn new() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    /// 设置递归深度上限
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// 对事实数据求值
    pub fn evaluate(&self, node: &Value, facts: &Value) -> Result<Value> {
        self.eval(node, Scope::new(facts), 0)
    }

    fn eval(&self, node: &Value, scope: Scope<'_>, depth: usize) -> Result<Value> {
        if depth > self.max_depth {
            warn!(limit = self.max_depth, "表达式嵌套超过深度上限");
            return Err(LogicError::DepthExceeded {
                limit: self.max_depth,
            });
        }

        if let Value::Array(items) = node {
            return items
                .iter()
                .map(|item| self.eval(item, scope, depth + 1))
                .collect::<Result<Vec<_>>>()
                .map(Value::Array);
        }

        match Logic::parse(node) {
            Some(logic) => self.eval_logic(logic, scope, depth + 1),
            None => Ok(node.clone()),
        }
    }

    fn eval_logic(&self, logic: Logic<'_>, scope: Scope<'_>, depth: usize) -> Result<Value> {
        let operator = logic.operator();
        let args = logic.operands();

        match operator {
            Operator::If => self.eval_if(args, scope, depth),

            Operator::And => {
                for arg in args {
                    if !is_truthy(&self.eval(arg, scope, depth)?) {
                        return Ok(Value::Bool(false));
                    }
                }
                Ok(Value::Bool(true))
            }

            Operator::Or => {
                for arg in args {
                    if is_truthy(&self.eval(arg, scope, depth)?) {
                        return Ok(Value::Bool(true));
                    }
                }
                Ok(Value::Bool(false))
            }

            Operator::AnyOf | Operator::AllOf => self.eval_quantifier(logic, scope, depth),

            Operator::Var => {
                let path = match logic.operand(0) {
                    Some(Value::String(text)) => Path::parse(text),
                    Some(Value::Number(n)) => Path::parse(&n.to_string()),
                    _ => return Err(LogicError::missing_operand(operator)),
                };
                Ok(scope.resolve(&path))
            }

            Operator::Not => {
                let values = self.eval_all(args, scope, depth)?;
                Ok(Value::Bool(!is_truthy(first(&values))))
            }

            Operator::Truthy => {
                let values = self.eval_all(args, scope, depth)?;
                Ok(Value::Bool(is_truthy(first(&values))))
            }

            Operator::StrictEq | Operator::StrictNeq => {
                let values = self.eval_all(args, scope, depth)?;
                let left = values.first().unwrap_or(&Value::Null);
                let right = values.get(1).unwrap_or(&Value::Null);
                let equal = strict_equals(left, right);
                Ok(Value::Bool(if operator == Operator::StrictEq {
                    equal
                } else {
                    !equal
                }))
            }

            Operator::OrElse => {
                let mut values = self.eval_all(args, scope, depth)?;
                match values.iter().position(is_truthy) {
                    Some(index) => Ok(values.swap_remove(index)),
                    None => Ok(values.pop().unwrap_or(Value::Null)),
                }
            }

            Operator::Add => {
                let nums = self.eval_numbers(args, scope, depth)?;
                Ok(number_value(nums.iter().sum()))
            }

            Operator::Mul => {
                let nums = self.eval_numbers(args, scope, depth)?;
                Ok(number_value(nums.iter().product()))
            }

            Operator::Sub => {
                let nums = self.eval_numbers(args, scope, depth)?;
                match nums.split_first() {
                    None => Err(LogicError::missing_operand(operator)),
                    Some((only, [])) => Ok(number_value(-only)),
                    Some((head, rest)) => Ok(number_value(rest.iter().fold(*head, |acc, n| acc - n))),
                }
            }

            Operator::Div => {
                let nums = self.eval_numbers(args, scope, depth)?;
                match nums.split_first() {
                    None => Err(LogicError::missing_operand(operator)),
                    // 除数缺失按 NaN 处理
                    Some((_, [])) => Ok(Value::Null),
                    Some((head, rest)) => Ok(number_value(rest.iter().fold(*head, |acc, n| acc / n))),
                }
            }

            Operator::Lt => {
                let nums = self.eval_numbers(args, scope, depth)?;
                Ok(Value::Bool(chain(&nums, |a, b| a < b)))
            }

            Operator::Gt => {
                let nums = self.eval_numbers(args, scope, depth)?;
                Ok(Value::Bool(chain(&nums, |a, b| a > b)))
            }

            Operator::Min => {
                let nums = self.eval_numbers(args, scope, depth)?;
                Ok(extremum(&nums, f64::min))
            }

            Operator::Max => {
                let nums = self.eval_numbers(args, scope, depth)?;
                Ok(extremum(&nums, f64::max))
            }
        }
    }

    /// `if`：条件与值成对出现，返回第一个为真的条件对应的值；
    /// 都不满足时返回最后一个操作数（奇数个时即默认值）的求值结果
    fn eval_if(&self, args: &[Value], scope: Scope<'_>, depth: usize) -> Result<Value> {
        let fallback = args
            .last()
            .ok_or_else(|| LogicError::missing_operand(Operator::If))?;

        for pair in args.chunks_exact(2) {
            if is_truthy(&self.eval(&pair[0], scope, depth)?) {
                return self.eval(&pair[1], scope, depth);
            }
        }
        self.eval(fallback, scope, depth)
    }

    /// `some` / `every`：第一个操作数求值为数组时，以 `$` 绑定每个元素求模板；
    /// 否则直接返回其真值，模板不会被应用
    fn eval_quantifier(&self, logic: Logic<'_>, scope: Scope<'_>, depth: usize) -> Result<Value> {
        let operator = logic.operator();
        let domain = logic
            .operand(0)
            .ok_or_else(|| LogicError::missing_operand(operator))?;
        let domain = self.eval(domain, scope, depth)?;

        let Value::Array(items) = domain else {
            return Ok(Value::Bool(is_truthy(&domain)));
        };

        let template = logic
            .operand(1)
            .ok_or_else(|| LogicError::missing_operand(operator))?;
        let want_any = operator == Operator::AnyOf;

        for item in &items {
            let matched = is_truthy(&self.eval(template, scope.bind(item), depth)?);
            if matched == want_any {
                return Ok(Value::Bool(want_any));
            }
        }
        Ok(Value::Bool(!want_any))
    }

    fn eval_all(&self, args: &[Value], scope: Scope<'_>, depth: usize) -> Result<Vec<Value>> {
        args.iter()
            .map(|arg| self.eval(arg, scope, depth))
            .collect()
    }

    fn eval_numbers(&self, args: &[Value], scope: Scope<'_>, depth: usize) -> Result<Vec<f64>> {
        args.iter()
            .map(|arg| self.eval(arg, scope, depth).map(|v| to_number(&v)))
            .collect()
    }
}

impl Default for Evaluator {
    fn default() -> Self {
        Self::new()
    }
}

/// 使用默认深度上限求值
pub fn evaluate(node: &Value, facts: &Value) -> Result<Value> {
    Evaluator::new().evaluate(node, facts)
}

fn first(values: &[Value]) -> &Value {
    values.first().unwrap_or(&Value::Null)
}

/// 两个空值视为相等；数值按大小比较，其余类型要求完全相同
fn strict_equals(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Null, Value::Null) => true,
        (Value::Number(a), Value::Number(b)) => a.as_f64() == b.as_f64(),
        _ => left == right,
    }
}

/// 链式比较：每对相邻操作数都要满足关系，NaN 参与的比较一律为假
fn chain(nums: &[f64], cmp: impl Fn(f64, f64) -> bool) -> bool {
    nums.windows(2)
        .all(|pair| !pair[0].is_nan() && !pair[1].is_nan() && cmp(pair[0], pair[1]))
}

fn extremum(nums: &[f64], pick: fn(f64, f64) -> f64) -> Value {
    if nums.is_empty() || nums.iter().any(|n| n.is_nan()) {
        return Value::Null;
    }
    number_value(nums[1..].iter().fold(nums[0], |acc, n| pick(acc, *n)))
}
