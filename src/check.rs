//! Top-level assertion dispatch.
//!
//! [`Checker`] receives a boolean assertion tree, classifies its root,
//! evaluates the interesting sub-expression, and composes a failure report
//! when the predicate is false. The reporting action is a caller-supplied
//! callback; the formatter is pluggable too.
//!
//! Classification, in order:
//!
//! - a top-level `&&` splits and checks both sides unconditionally, left to
//!   right, so a failure on the left never hides one on the right;
//! - a relational comparison evaluates its left operand exactly once,
//!   substitutes the observed value back into the tree as a literal, and
//!   reports rendered-left / relation / rendered-right / observed value;
//! - a type test reports the target text against the actual runtime type;
//! - anything else is evaluated as a plain boolean and reported against
//!   `true`.

use crate::eval::{evaluate, EvalError};
use crate::expr::{BinaryOp, Expr, ExprRef};
use crate::render::{relation_keyword, render};
use crate::report::{default_layout, Report};
use crate::value::{display_type_name, format_value};
use crate::visitor::{Replace, Rewrite};

/// Why a check call did not complete normally.
#[derive(Debug, thiserror::Error)]
pub enum CheckError {
    /// The predicate evaluated false; carries the composed message. This is
    /// the designed report path, not a malfunction.
    #[error("{0}")]
    AssertionFailed(String),
    /// The tree contains a node kind outside the supported set. A bug in
    /// the tree-producing collaborator; fatal, never retried.
    #[error("unsupported expression node kind: {0}")]
    UnsupportedNodeKind(&'static str),
    /// The assertion did not evaluate to a boolean.
    #[error("assertion did not evaluate to a boolean (got {0})")]
    NotBoolean(String),
    /// A fault inside user code, passed through unmodified.
    #[error(transparent)]
    EvaluationFault(#[from] anyhow::Error),
}

/// Check an assertion tree, panicking with the composed message on failure.
///
/// This is the assert-style entry point for use inside `#[test]` functions.
/// Use [`Checker`] for non-panicking evaluation or custom formatting.
///
/// # Example
///
/// ```rust,ignore
/// use attest::{capture, check, BinaryOp, Expr};
///
/// let foo = 1;
/// check(&Expr::binary(BinaryOp::Equal, capture!(foo), Expr::constant(2)));
/// ```
///
/// # Panics
///
/// Panics if the predicate is false, with the three-line failure report as
/// the message; also panics on contract violations (unsupported node kinds,
/// non-boolean assertions) and user faults.
pub fn check(expr: &ExprRef) {
    if let Err(e) = Checker::new().check(expr) {
        panic!("{}", e);
    }
}

/// Assertion checker with a pluggable report formatter.
pub struct Checker {
    formatter: Box<dyn Fn(&Report) -> String>,
}

impl Default for Checker {
    fn default() -> Self {
        Self::new()
    }
}

impl Checker {
    /// A checker using the default three-line layout.
    pub fn new() -> Self {
        Self {
            formatter: Box::new(default_layout),
        }
    }

    /// A checker with a caller-supplied layout.
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// use attest::Checker;
    ///
    /// let checker = Checker::with_formatter(|r| {
    ///     format!("{} should {} {} (got {})", r.subject, r.relation, r.expected, r.actual)
    /// });
    /// ```
    pub fn with_formatter(formatter: impl Fn(&Report) -> String + 'static) -> Self {
        Self {
            formatter: Box::new(formatter),
        }
    }

    /// Check `expr`, invoking `on_failure` with one composed message per
    /// failed side. Returns `Ok(())` whether or not failures were reported;
    /// errors are reserved for contract violations and user faults.
    pub fn check_with(
        &self,
        expr: &ExprRef,
        on_failure: &mut dyn FnMut(&str),
    ) -> Result<(), CheckError> {
        let body = unwrap_lambda(expr);
        self.dispatch(body, on_failure)
    }

    /// Check `expr` with the default reporting action: the first failure
    /// becomes [`CheckError::AssertionFailed`].
    pub fn check(&self, expr: &ExprRef) -> Result<(), CheckError> {
        let mut first: Option<String> = None;
        self.check_with(expr, &mut |message| {
            if first.is_none() {
                first = Some(message.to_string());
            }
        })?;
        match first {
            Some(message) => Err(CheckError::AssertionFailed(message)),
            None => Ok(()),
        }
    }

    /// Check `expr` and collect every composed failure message. A top-level
    /// conjunction can produce one message per failing side.
    pub fn failures(&self, expr: &ExprRef) -> Result<Vec<String>, CheckError> {
        let mut messages = Vec::new();
        self.check_with(expr, &mut |message| messages.push(message.to_string()))?;
        Ok(messages)
    }

    fn dispatch(
        &self,
        expr: &ExprRef,
        on_failure: &mut dyn FnMut(&str),
    ) -> Result<(), CheckError> {
        match &**expr {
            // Both sides are checked regardless of the left's outcome, so a
            // conjunction reports each failing side independently.
            Expr::Binary {
                op: BinaryOp::AndAlso,
                left,
                right,
            } => {
                self.dispatch(left, on_failure)?;
                self.dispatch(right, on_failure)
            }
            Expr::Binary { op, left, right } => match relation_keyword(*op) {
                Some(keyword) => self.check_relational(expr, keyword, left, right, on_failure),
                None => self.check_boolean(expr, on_failure),
            },
            Expr::TypeCheck { target, type_name } => {
                self.check_type(expr, target, type_name, on_failure)
            }
            _ => self.check_boolean(expr, on_failure),
        }
    }

    /// Evaluate a sub-expression, intercepting the custom-check signal. A
    /// custom failure is reported immediately and yields `None`; genuine
    /// faults and unsupported kinds bubble up as errors.
    fn eval_reporting(
        &self,
        failing_node: &ExprRef,
        target: &ExprRef,
        on_failure: &mut dyn FnMut(&str),
    ) -> Result<Option<crate::value::Value>, CheckError> {
        match evaluate(target) {
            Ok(value) => Ok(Some(value)),
            Err(EvalError::Custom(failure)) => {
                let report = Report {
                    subject: render(&subject_of(failing_node)),
                    relation: failure.relation,
                    expected: failure.expected,
                    was: failure.was,
                    actual: failure.actual,
                };
                on_failure(&(self.formatter)(&report));
                Ok(None)
            }
            Err(EvalError::Unsupported { kind }) => Err(CheckError::UnsupportedNodeKind(kind)),
            Err(EvalError::Fault(e)) => Err(CheckError::EvaluationFault(e)),
        }
    }

    fn check_relational(
        &self,
        expr: &ExprRef,
        keyword: &str,
        left: &ExprRef,
        right: &ExprRef,
        on_failure: &mut dyn FnMut(&str),
    ) -> Result<(), CheckError> {
        // The left operand runs exactly once; the substituted comparison
        // re-reads it as a literal.
        let Some(left_value) = self.eval_reporting(expr, left, on_failure)? else {
            return Ok(());
        };
        let substituted = Replace::new(left.clone(), Expr::constant(left_value.clone()))
            .rewrite(expr)?;
        let Some(result) = self.eval_reporting(expr, &substituted, on_failure)? else {
            return Ok(());
        };
        if self.expect_bool(result)? {
            return Ok(());
        }

        let report = Report::new(
            render(left),
            keyword,
            render(right),
            format_value(&left_value),
        );
        on_failure(&(self.formatter)(&report));
        Ok(())
    }

    fn check_type(
        &self,
        expr: &ExprRef,
        target: &ExprRef,
        type_name: &str,
        on_failure: &mut dyn FnMut(&str),
    ) -> Result<(), CheckError> {
        let Some(target_value) = self.eval_reporting(expr, target, on_failure)? else {
            return Ok(());
        };
        let substituted = Replace::new(target.clone(), Expr::constant(target_value.clone()))
            .rewrite(expr)?;
        let Some(result) = self.eval_reporting(expr, &substituted, on_failure)? else {
            return Ok(());
        };
        if self.expect_bool(result)? {
            return Ok(());
        }

        let report = Report::new(
            render(target),
            "be",
            display_type_name(type_name),
            target_value.type_name(),
        );
        on_failure(&(self.formatter)(&report));
        Ok(())
    }

    fn check_boolean(
        &self,
        expr: &ExprRef,
        on_failure: &mut dyn FnMut(&str),
    ) -> Result<(), CheckError> {
        let Some(value) = self.eval_reporting(expr, expr, on_failure)? else {
            return Ok(());
        };
        if self.expect_bool(value)? {
            return Ok(());
        }

        let report = Report::new(render(expr), "be", "true", "false");
        on_failure(&(self.formatter)(&report));
        Ok(())
    }

    fn expect_bool(&self, value: crate::value::Value) -> Result<bool, CheckError> {
        value
            .as_bool()
            .ok_or_else(|| CheckError::NotBoolean(value.type_name().to_string()))
    }
}

/// The top-level tree may arrive wrapped in a lambda; only its body is
/// classified and walked.
fn unwrap_lambda(expr: &ExprRef) -> &ExprRef {
    match &**expr {
        Expr::Lambda { body } => body,
        _ => expr,
    }
}

/// Report subject for a failing node: an extension-style call reports its
/// first argument (`foo`, not `foo.IsEmpty()`); anything else reports
/// itself.
fn subject_of(expr: &ExprRef) -> ExprRef {
    if let Expr::Call(call) = &**expr {
        if call.is_extension {
            if let Some(first) = call.args.first() {
                return first.clone();
            }
        }
    }
    expr.clone()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval::CheckFailure;
    use crate::expr::Invoker;
    use crate::value::Value;
    use std::cell::Cell;
    use std::rc::Rc;

    fn counted_var(name: &str, value: Value) -> (ExprRef, Rc<Cell<usize>>) {
        let hits = Rc::new(Cell::new(0));
        let seen = hits.clone();
        let node = Expr::var(name.to_string(), move || {
            seen.set(seen.get() + 1);
            value.clone()
        });
        (node, hits)
    }

    #[test]
    fn test_relational_failure_message() {
        let (foo, _) = counted_var("foo", Value::Int(1));
        let tree = Expr::binary(BinaryOp::Equal, foo, Expr::constant(2));
        let messages = Checker::new().failures(&tree).unwrap();
        assert_eq!(messages, vec!["Expected: foo\n   to be: 2\n but was: 1"]);
    }

    #[test]
    fn test_relational_pass_reports_nothing() {
        let (foo, _) = counted_var("foo", Value::Int(2));
        let tree = Expr::binary(BinaryOp::Equal, foo, Expr::constant(2));
        assert!(Checker::new().failures(&tree).unwrap().is_empty());
    }

    #[test]
    fn test_left_operand_evaluates_exactly_once() {
        let (foo, hits) = counted_var("foo", Value::Int(1));
        let tree = Expr::binary(BinaryOp::Equal, foo, Expr::constant(2));
        let _ = Checker::new().failures(&tree).unwrap();
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn test_conjunction_checks_both_sides() {
        let (a, a_hits) = counted_var("a", Value::Int(1));
        let (b, b_hits) = counted_var("b", Value::Int(2));
        let tree = Expr::binary(
            BinaryOp::AndAlso,
            Expr::binary(BinaryOp::Equal, a, Expr::constant(0)),
            Expr::binary(BinaryOp::Equal, b, Expr::constant(0)),
        );
        let messages = Checker::new().failures(&tree).unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(a_hits.get(), 1);
        assert_eq!(b_hits.get(), 1);
    }

    #[test]
    fn test_conjunction_only_second_false_reports_once() {
        let (a, _) = counted_var("a", Value::Int(1));
        let (b, b_hits) = counted_var("b", Value::Int(1));
        let tree = Expr::binary(
            BinaryOp::AndAlso,
            Expr::binary(BinaryOp::Equal, a, Expr::constant(1)),
            Expr::binary(BinaryOp::Equal, b, Expr::constant(2)),
        );
        let messages = Checker::new().failures(&tree).unwrap();
        assert_eq!(messages, vec!["Expected: b\n   to be: 2\n but was: 1"]);
        assert_eq!(b_hits.get(), 1);
    }

    #[test]
    fn test_type_check_failure() {
        let (x, _) = counted_var("x", Value::Int(3));
        let tree = Expr::type_check(x, "String");
        let messages = Checker::new().failures(&tree).unwrap();
        assert_eq!(
            messages,
            vec!["Expected: x\n   to be: string\n but was: int"]
        );
    }

    #[test]
    fn test_plain_boolean_failure() {
        let (foo, _) = counted_var("foo", Value::from(vec![1, 2, 3]));
        let tree = Expr::extension_call("Contains", vec![foo, Expr::constant(4)]);
        let messages = Checker::new().failures(&Expr::lambda(tree)).unwrap();
        assert_eq!(
            messages,
            vec!["Expected: foo.Contains(4)\n   to be: true\n but was: false"]
        );
    }

    #[test]
    fn test_custom_check_reports_first_argument_as_subject() {
        let (foo, _) = counted_var("foo", Value::from(vec![1, 2, 3]));
        let tree = Expr::extension_check(
            "IsEmpty",
            vec![foo],
            Invoker::new(|_, args| match &args[0] {
                Value::List(items) if items.is_empty() => Ok(Value::Bool(true)),
                Value::List(items) => Err(EvalError::Custom(CheckFailure::new(
                    "be",
                    "empty",
                    format!("{} items", items.len()),
                ))),
                other => Err(EvalError::Fault(anyhow::anyhow!(
                    "IsEmpty expects a list, got {}",
                    other.type_name()
                ))),
            }),
        );
        let messages = Checker::new().failures(&tree).unwrap();
        assert_eq!(messages, vec!["Expected: foo\n   to be: empty\n but was: 3 items"]);
    }

    #[test]
    fn test_negation_is_a_plain_boolean_check() {
        let (flag, _) = counted_var("flag", Value::Bool(true));
        let tree = Expr::unary(crate::expr::UnaryOp::Not, flag);
        let messages = Checker::new().failures(&tree).unwrap();
        assert_eq!(
            messages,
            vec!["Expected: !flag\n   to be: true\n but was: false"]
        );
    }

    #[test]
    fn test_non_boolean_assertion_is_an_error() {
        let tree = Expr::constant(3);
        match Checker::new().check(&tree) {
            Err(CheckError::NotBoolean(ty)) => assert_eq!(ty, "int"),
            other => panic!("expected NotBoolean, got {:?}", other.is_ok()),
        }
    }

    #[test]
    fn test_user_fault_propagates() {
        let tree = Expr::binary(
            BinaryOp::Equal,
            Expr::binary(BinaryOp::Divide, Expr::constant(1), Expr::constant(0)),
            Expr::constant(1),
        );
        match Checker::new().check(&tree) {
            Err(CheckError::EvaluationFault(e)) => {
                assert!(e.to_string().contains("division by zero"));
            }
            other => panic!("expected an evaluation fault, got {:?}", other.is_ok()),
        }
    }

    #[test]
    fn test_custom_formatter() {
        let (foo, _) = counted_var("foo", Value::Int(1));
        let tree = Expr::binary(BinaryOp::Equal, foo, Expr::constant(2));
        let checker = Checker::with_formatter(|r| {
            format!("{} should {} {} but {} {}", r.subject, r.relation, r.expected, r.was, r.actual)
        });
        let messages = checker.failures(&tree).unwrap();
        assert_eq!(messages, vec!["foo should be 2 but was 1"]);
    }

    #[test]
    fn test_check_returns_first_failure() {
        let (foo, _) = counted_var("foo", Value::Int(1));
        let tree = Expr::binary(BinaryOp::Equal, foo, Expr::constant(2));
        match Checker::new().check(&tree) {
            Err(CheckError::AssertionFailed(message)) => {
                assert!(message.starts_with("Expected: foo"));
            }
            other => panic!("expected AssertionFailed, got {:?}", other.is_ok()),
        }
    }
}
