//! Evaluation of assertion sub-expressions.
//!
//! This is the only place the crate executes user code: leaf bindings and
//! bound invokers run here, exactly as written, side effects included. There
//! is no caching and no memoization; the dispatcher calls [`evaluate`] once
//! per sub-expression it needs a value for.
//!
//! Failure of a *custom check* (an extension predicate that supplies its own
//! report text) is expected control flow, modeled as [`EvalError::Custom`]
//! and always intercepted by the dispatch layer. Everything else in
//! [`EvalError`] is a real problem: an unsupported node kind is a contract
//! violation by the tree producer, and a fault in user code propagates
//! unchanged so the caller sees the original failure.

use crate::expr::{BinaryOp, CallExpr, Expr, UnaryOp};
use crate::value::{display_type_name, Value};
use anyhow::anyhow;

/// Failure description supplied by a custom check predicate.
///
/// The four fields slot straight into the composed report: `relation` after
/// "to", `expected` on the same line, `was` in the "but was:" label, and
/// `actual` as the observed value text.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckFailure {
    pub relation: String,
    pub expected: String,
    pub was: String,
    pub actual: String,
}

impl CheckFailure {
    /// A failure with the default `was` wording.
    pub fn new(
        relation: impl Into<String>,
        expected: impl Into<String>,
        actual: impl Into<String>,
    ) -> Self {
        Self {
            relation: relation.into(),
            expected: expected.into(),
            was: "was".to_string(),
            actual: actual.into(),
        }
    }

    /// Replace the `was` wording (e.g. "contained" instead of "was").
    pub fn with_was(mut self, was: impl Into<String>) -> Self {
        self.was = was.into();
        self
    }
}

/// Why evaluation stopped.
#[derive(Debug)]
pub enum EvalError {
    /// The tree contains a node kind this evaluator cannot execute. A bug in
    /// the tree producer, never retried.
    Unsupported { kind: &'static str },
    /// A custom check signaled failure with its own report text. Caught at
    /// the dispatch layer, never propagates past this crate.
    Custom(CheckFailure),
    /// A genuine fault inside user code (null dereference, division by
    /// zero, ...). Propagates unchanged.
    Fault(anyhow::Error),
}

impl EvalError {
    fn fault(message: String) -> Self {
        EvalError::Fault(anyhow!(message))
    }
}

/// Evaluate a sub-expression to its runtime value.
pub fn evaluate(expr: &Expr) -> Result<Value, EvalError> {
    match expr {
        Expr::Constant(value) => Ok(value.clone()),
        Expr::Variable { binding, .. } => Ok(binding()),
        Expr::Member {
            target,
            name,
            binding,
            ..
        } => {
            if let Some(binding) = binding {
                return Ok(binding());
            }
            match target {
                Some(t) => member_of(&evaluate(t)?, name),
                None => Err(EvalError::fault(format!(
                    "static member '{}' has no captured binding",
                    name
                ))),
            }
        }
        Expr::Call(call) => eval_call(call),
        Expr::Indexer { target, args } => {
            let target_value = evaluate(target)?;
            if args.len() != 1 {
                return Err(EvalError::fault(format!(
                    "indexer expects one argument, got {}",
                    args.len()
                )));
            }
            let index = evaluate(&args[0])?;
            index_value(&target_value, &index)
        }
        Expr::Unary {
            op,
            operand,
            type_name,
        } => {
            let value = evaluate(operand)?;
            match op {
                UnaryOp::Negate => match value {
                    Value::Int(n) => Ok(Value::Int(-n)),
                    Value::Float(f) => Ok(Value::Float(-f)),
                    other => Err(EvalError::fault(format!(
                        "cannot negate a {}",
                        other.type_name()
                    ))),
                },
                UnaryOp::Not => match value {
                    Value::Bool(b) => Ok(Value::Bool(!b)),
                    other => Err(EvalError::fault(format!(
                        "cannot apply ! to a {}",
                        other.type_name()
                    ))),
                },
                UnaryOp::ArrayLength => match value {
                    Value::List(items) => Ok(Value::Int(items.len() as i64)),
                    Value::Str(s) => Ok(Value::Int(s.chars().count() as i64)),
                    other => Err(EvalError::fault(format!(
                        "a {} has no length",
                        other.type_name()
                    ))),
                },
                UnaryOp::Convert => {
                    let name = type_name.as_deref().unwrap_or("object");
                    convert_to(name, value)
                }
                UnaryOp::TypeAs => {
                    let name = type_name.as_deref().unwrap_or("object");
                    if type_matches(&value, name) {
                        Ok(value)
                    } else {
                        Ok(Value::Null)
                    }
                }
            }
        }
        Expr::Binary { op, left, right } => match op {
            // Nested conjunction/disjunction short-circuits normally; only
            // the dispatcher's top-level split checks both sides regardless.
            BinaryOp::AndAlso => {
                if !eval_bool(left)? {
                    Ok(Value::Bool(false))
                } else {
                    Ok(Value::Bool(eval_bool(right)?))
                }
            }
            BinaryOp::OrElse => {
                if eval_bool(left)? {
                    Ok(Value::Bool(true))
                } else {
                    Ok(Value::Bool(eval_bool(right)?))
                }
            }
            BinaryOp::Coalesce => {
                let left_value = evaluate(left)?;
                if left_value == Value::Null {
                    evaluate(right)
                } else {
                    Ok(left_value)
                }
            }
            _ => {
                let left_value = evaluate(left)?;
                let right_value = evaluate(right)?;
                apply_binary(*op, &left_value, &right_value)
            }
        },
        Expr::Conditional {
            test,
            if_true,
            if_false,
        } => {
            if eval_bool(test)? {
                evaluate(if_true)
            } else {
                evaluate(if_false)
            }
        }
        Expr::TypeCheck { target, type_name } => {
            let value = evaluate(target)?;
            Ok(Value::Bool(type_matches(&value, type_name)))
        }
        Expr::ObjectInit {
            type_name,
            bindings,
        } => {
            let mut fields = std::collections::BTreeMap::new();
            for (name, value) in bindings {
                fields.insert(name.clone(), evaluate(value)?);
            }
            Ok(Value::Object {
                type_name: type_name.clone(),
                fields,
            })
        }
        // Only the outermost lambda body is walked, by the dispatcher. A
        // lambda in evaluation position is outside the supported kind set.
        Expr::Lambda { .. } => Err(EvalError::Unsupported { kind: "Lambda" }),
        Expr::ArrayNew { elements } => Ok(Value::List(eval_all(elements)?)),
        Expr::ListInit { elements, .. } => Ok(Value::List(eval_all(elements)?)),
        Expr::Invocation { target, .. } => match &**target {
            Expr::Lambda { body } => evaluate(body),
            other => Err(EvalError::fault(format!(
                "invocation target must be a lambda, got {}",
                other.kind_name()
            ))),
        },
    }
}

fn eval_all(items: &[crate::expr::ExprRef]) -> Result<Vec<Value>, EvalError> {
    items.iter().map(|item| evaluate(item)).collect()
}

fn eval_bool(expr: &Expr) -> Result<bool, EvalError> {
    match evaluate(expr)? {
        Value::Bool(b) => Ok(b),
        other => Err(EvalError::fault(format!(
            "expected a bool, got {}",
            other.type_name()
        ))),
    }
}

fn eval_call(call: &CallExpr) -> Result<Value, EvalError> {
    let target_value = match &call.target {
        Some(target) => Some(evaluate(target)?),
        None => None,
    };
    let mut arg_values = Vec::with_capacity(call.args.len());
    for arg in &call.args {
        arg_values.push(evaluate(arg)?);
    }

    if let Some(invoker) = &call.invoker {
        return invoker.invoke(target_value.as_ref(), &arg_values);
    }

    if let Some(receiver) = &target_value {
        return builtin_method(receiver, &call.method, &arg_values);
    }

    if call.is_extension {
        if let Some((receiver, rest)) = arg_values.split_first() {
            return builtin_method(receiver, &call.method, rest);
        }
    }

    Err(EvalError::fault(format!(
        "static call '{}' has no bound invoker",
        call.method
    )))
}

fn member_of(target: &Value, name: &str) -> Result<Value, EvalError> {
    match target {
        Value::Null => Err(EvalError::fault(format!(
            "null dereference accessing '{}'",
            name
        ))),
        Value::Object { fields, type_name } => fields.get(name).cloned().ok_or_else(|| {
            EvalError::fault(format!("no member '{}' on {}", name, type_name))
        }),
        Value::List(items) if name == "Count" || name == "Length" => {
            Ok(Value::Int(items.len() as i64))
        }
        Value::Str(s) if name == "Length" => Ok(Value::Int(s.chars().count() as i64)),
        other => Err(EvalError::fault(format!(
            "no member '{}' on {}",
            name,
            other.type_name()
        ))),
    }
}

/// Built-in method table for values without a bound invoker.
fn builtin_method(receiver: &Value, method: &str, args: &[Value]) -> Result<Value, EvalError> {
    if *receiver == Value::Null {
        return Err(EvalError::fault(format!(
            "null dereference calling '{}'",
            method
        )));
    }
    match (receiver, method) {
        (value, "ToString") => Ok(Value::Str(value.to_text())),
        (value, "Equals") => {
            let other = single_arg(method, args)?;
            Ok(Value::Bool(values_equal(value, other)))
        }
        (value, "get_Item") => index_value(value, single_arg(method, args)?),
        (Value::Str(s), "Contains") => {
            Ok(Value::Bool(s.contains(str_arg(method, args)?)))
        }
        (Value::Str(s), "StartsWith") => {
            Ok(Value::Bool(s.starts_with(str_arg(method, args)?)))
        }
        (Value::Str(s), "EndsWith") => Ok(Value::Bool(s.ends_with(str_arg(method, args)?))),
        (Value::Str(s), "Trim") => Ok(Value::Str(s.trim().to_string())),
        (Value::Str(s), "ToUpper") => Ok(Value::Str(s.to_uppercase())),
        (Value::Str(s), "ToLower") => Ok(Value::Str(s.to_lowercase())),
        (Value::List(items), "Contains") => {
            let needle = single_arg(method, args)?;
            Ok(Value::Bool(items.iter().any(|item| values_equal(item, needle))))
        }
        (Value::List(items), "Count") => Ok(Value::Int(items.len() as i64)),
        (other, _) => Err(EvalError::fault(format!(
            "no built-in method '{}' on {}",
            method,
            other.type_name()
        ))),
    }
}

fn single_arg<'a>(method: &str, args: &'a [Value]) -> Result<&'a Value, EvalError> {
    match args {
        [arg] => Ok(arg),
        _ => Err(EvalError::fault(format!(
            "'{}' expects one argument, got {}",
            method,
            args.len()
        ))),
    }
}

fn str_arg<'a>(method: &str, args: &'a [Value]) -> Result<&'a str, EvalError> {
    match single_arg(method, args)? {
        Value::Str(s) => Ok(s),
        other => Err(EvalError::fault(format!(
            "'{}' expects a string argument, got {}",
            method,
            other.type_name()
        ))),
    }
}

fn index_value(target: &Value, index: &Value) -> Result<Value, EvalError> {
    match (target, index) {
        (Value::List(items), Value::Int(i)) => {
            let i = *i;
            if i < 0 || i as usize >= items.len() {
                Err(EvalError::fault(format!(
                    "index {} out of range for list of {}",
                    i,
                    items.len()
                )))
            } else {
                Ok(items[i as usize].clone())
            }
        }
        (Value::Str(s), Value::Int(i)) => s
            .chars()
            .nth(usize::try_from(*i).unwrap_or(usize::MAX))
            .map(|c| Value::Str(c.to_string()))
            .ok_or_else(|| {
                EvalError::fault(format!("index {} out of range for string", i))
            }),
        (Value::Object { fields, type_name }, Value::Str(key)) => {
            fields.get(key).cloned().ok_or_else(|| {
                EvalError::fault(format!("no member '{}' on {}", key, type_name))
            })
        }
        (target, index) => Err(EvalError::fault(format!(
            "cannot index a {} with a {}",
            target.type_name(),
            index.type_name()
        ))),
    }
}

enum Numbers {
    Ints(i64, i64),
    Floats(f64, f64),
}

fn numeric_pair(left: &Value, right: &Value) -> Option<Numbers> {
    match (left, right) {
        (Value::Int(a), Value::Int(b)) => Some(Numbers::Ints(*a, *b)),
        (Value::Int(a), Value::Float(b)) => Some(Numbers::Floats(*a as f64, *b)),
        (Value::Float(a), Value::Int(b)) => Some(Numbers::Floats(*a, *b as f64)),
        (Value::Float(a), Value::Float(b)) => Some(Numbers::Floats(*a, *b)),
        _ => None,
    }
}

/// Equality with int/float promotion; everything else is structural.
fn values_equal(left: &Value, right: &Value) -> bool {
    match numeric_pair(left, right) {
        Some(Numbers::Ints(a, b)) => a == b,
        Some(Numbers::Floats(a, b)) => a == b,
        None => left == right,
    }
}

fn ordering(
    op: BinaryOp,
    left: &Value,
    right: &Value,
) -> Result<Value, EvalError> {
    use std::cmp::Ordering;
    let ord = match numeric_pair(left, right) {
        Some(Numbers::Ints(a, b)) => Some(a.cmp(&b)),
        Some(Numbers::Floats(a, b)) => a.partial_cmp(&b),
        None => match (left, right) {
            (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
            (Value::DateTime(a), Value::DateTime(b)) => Some(a.cmp(b)),
            _ => None,
        },
    };
    let Some(ord) = ord else {
        return Err(EvalError::fault(format!(
            "cannot compare a {} with a {}",
            left.type_name(),
            right.type_name()
        )));
    };
    let result = match op {
        BinaryOp::GreaterThan => ord == Ordering::Greater,
        BinaryOp::GreaterThanOrEqual => ord != Ordering::Less,
        BinaryOp::LessThan => ord == Ordering::Less,
        BinaryOp::LessThanOrEqual => ord != Ordering::Greater,
        _ => {
            return Err(EvalError::fault(format!(
                "'{:?}' is not an ordering operator",
                op
            )))
        }
    };
    Ok(Value::Bool(result))
}

fn arithmetic(
    op: BinaryOp,
    left: &Value,
    right: &Value,
) -> Result<Value, EvalError> {
    // String concatenation piggybacks on Add.
    if op == BinaryOp::Add {
        if let (Value::Str(a), b) = (left, right) {
            return Ok(Value::Str(format!("{}{}", a, b.to_text())));
        }
        if let (a, Value::Str(b)) = (left, right) {
            return Ok(Value::Str(format!("{}{}", a.to_text(), b)));
        }
    }

    let Some(pair) = numeric_pair(left, right) else {
        return Err(EvalError::fault(format!(
            "cannot apply '{}' to a {} and a {}",
            crate::render::operator_symbol(op),
            left.type_name(),
            right.type_name()
        )));
    };
    match pair {
        Numbers::Ints(a, b) => {
            let result = match op {
                BinaryOp::Add => a.checked_add(b),
                BinaryOp::Subtract => a.checked_sub(b),
                BinaryOp::Multiply => a.checked_mul(b),
                BinaryOp::Divide => {
                    if b == 0 {
                        return Err(EvalError::fault("division by zero".to_string()));
                    }
                    a.checked_div(b)
                }
                BinaryOp::Modulo => {
                    if b == 0 {
                        return Err(EvalError::fault("division by zero".to_string()));
                    }
                    a.checked_rem(b)
                }
                BinaryOp::Power => u32::try_from(b).ok().and_then(|exp| a.checked_pow(exp)),
                _ => None,
            };
            result.map(Value::Int).ok_or_else(|| {
                EvalError::fault(format!(
                    "integer overflow applying '{}'",
                    crate::render::operator_symbol(op)
                ))
            })
        }
        Numbers::Floats(a, b) => {
            let result = match op {
                BinaryOp::Add => a + b,
                BinaryOp::Subtract => a - b,
                BinaryOp::Multiply => a * b,
                BinaryOp::Divide => a / b,
                BinaryOp::Modulo => a % b,
                BinaryOp::Power => a.powf(b),
                _ => {
                    return Err(EvalError::fault(format!(
                        "'{:?}' is not an arithmetic operator",
                        op
                    )))
                }
            };
            Ok(Value::Float(result))
        }
    }
}

fn apply_binary(op: BinaryOp, left: &Value, right: &Value) -> Result<Value, EvalError> {
    match op {
        BinaryOp::Equal => Ok(Value::Bool(values_equal(left, right))),
        BinaryOp::NotEqual => Ok(Value::Bool(!values_equal(left, right))),
        BinaryOp::GreaterThan
        | BinaryOp::GreaterThanOrEqual
        | BinaryOp::LessThan
        | BinaryOp::LessThanOrEqual => ordering(op, left, right),
        BinaryOp::Add
        | BinaryOp::Subtract
        | BinaryOp::Multiply
        | BinaryOp::Divide
        | BinaryOp::Modulo
        | BinaryOp::Power => arithmetic(op, left, right),
        BinaryOp::ArrayIndex => index_value(left, right),
        BinaryOp::And | BinaryOp::AndAlso => logical_or_bitwise(op, left, right),
        BinaryOp::Or | BinaryOp::OrElse => logical_or_bitwise(op, left, right),
        BinaryOp::ExclusiveOr => logical_or_bitwise(op, left, right),
        BinaryOp::LeftShift | BinaryOp::RightShift => match (left, right) {
            (Value::Int(a), Value::Int(b)) => {
                let shift = u32::try_from(*b).map_err(|_| {
                    EvalError::fault(format!("invalid shift amount {}", b))
                })?;
                let result = if op == BinaryOp::LeftShift {
                    a.checked_shl(shift)
                } else {
                    a.checked_shr(shift)
                };
                result.map(Value::Int).ok_or_else(|| {
                    EvalError::fault(format!("invalid shift amount {}", b))
                })
            }
            _ => Err(EvalError::fault(format!(
                "cannot shift a {} by a {}",
                left.type_name(),
                right.type_name()
            ))),
        },
        BinaryOp::Coalesce => {
            if *left == Value::Null {
                Ok(right.clone())
            } else {
                Ok(left.clone())
            }
        }
    }
}

fn logical_or_bitwise(op: BinaryOp, left: &Value, right: &Value) -> Result<Value, EvalError> {
    match (left, right) {
        (Value::Bool(a), Value::Bool(b)) => {
            let result = match op {
                BinaryOp::And | BinaryOp::AndAlso => *a && *b,
                BinaryOp::Or | BinaryOp::OrElse => *a || *b,
                _ => *a ^ *b,
            };
            Ok(Value::Bool(result))
        }
        (Value::Int(a), Value::Int(b)) => {
            let result = match op {
                BinaryOp::And | BinaryOp::AndAlso => a & b,
                BinaryOp::Or | BinaryOp::OrElse => a | b,
                _ => a ^ b,
            };
            Ok(Value::Int(result))
        }
        _ => Err(EvalError::fault(format!(
            "cannot apply '{}' to a {} and a {}",
            crate::render::operator_symbol(op),
            left.type_name(),
            right.type_name()
        ))),
    }
}

fn convert_to(type_name: &str, value: Value) -> Result<Value, EvalError> {
    let target = display_type_name(type_name);
    let from = value.type_name().to_string();
    let converted = match (target, &value) {
        ("int", Value::Int(n)) => Some(Value::Int(*n)),
        ("int", Value::Float(f)) => Some(Value::Int(*f as i64)),
        ("int", Value::Str(s)) => s.trim().parse::<i64>().ok().map(Value::Int),
        ("double", Value::Int(n)) => Some(Value::Float(*n as f64)),
        ("double", Value::Float(f)) => Some(Value::Float(*f)),
        ("double", Value::Str(s)) => s.trim().parse::<f64>().ok().map(Value::Float),
        ("string", v) => Some(Value::Str(v.to_text())),
        ("bool", Value::Bool(b)) => Some(Value::Bool(*b)),
        ("object", v) => Some(v.clone()),
        (t, v) if v.type_name() == t => Some(v.clone()),
        _ => None,
    };
    converted.ok_or_else(|| {
        EvalError::fault(format!("cannot convert a {} to {}", from, target))
    })
}

fn type_matches(value: &Value, declared: &str) -> bool {
    let declared = display_type_name(declared);
    declared == "object" || value.type_name() == declared
}
