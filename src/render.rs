//! Source-like rendering of assertion expressions.
//!
//! [`render`] walks a tree once, appending fragments to a buffer, and
//! produces the text a developer would have written: `foo.Contains(4)`,
//! `items[0] < limit`, `(int)x`. Rendering is deterministic and idempotent;
//! it never evaluates anything (constants are literal already).

use crate::expr::{BinaryOp, CallExpr, Expr, ExprRef, UnaryOp};
use crate::value::{display_type_name, format_value};

/// Render an expression tree to its source-like text.
pub fn render(expr: &ExprRef) -> String {
    render_node(expr)
}

/// Render a bare node (used by `Expr`'s `Debug` impl).
pub(crate) fn render_node(expr: &Expr) -> String {
    let mut renderer = Renderer {
        out: String::new(),
    };
    renderer.write_expr(expr);
    renderer.out
}

/// Fixed symbol for a binary operator as it appears in source text.
pub fn operator_symbol(op: BinaryOp) -> &'static str {
    match op {
        BinaryOp::Add => "+",
        BinaryOp::And => "&",
        BinaryOp::AndAlso => "&&",
        BinaryOp::ArrayIndex => "[]",
        BinaryOp::Coalesce => "??",
        BinaryOp::Divide => "/",
        BinaryOp::Equal => "==",
        BinaryOp::ExclusiveOr => "^",
        BinaryOp::GreaterThan => ">",
        BinaryOp::GreaterThanOrEqual => ">=",
        BinaryOp::LeftShift => "<<",
        BinaryOp::LessThan => "<",
        BinaryOp::LessThanOrEqual => "<=",
        BinaryOp::Modulo => "%",
        BinaryOp::Multiply => "*",
        BinaryOp::NotEqual => "!=",
        BinaryOp::Or => "|",
        BinaryOp::OrElse => "||",
        BinaryOp::Power => "^",
        BinaryOp::RightShift => ">>",
        BinaryOp::Subtract => "-",
    }
}

/// Natural-language relation keyword for a comparison rendered at the top of
/// a report (`Equal` becomes `be`, so the message reads "Expected: foo / to
/// be: 42"). Total over the six relational kinds, `None` for everything else.
pub fn relation_keyword(op: BinaryOp) -> Option<&'static str> {
    match op {
        BinaryOp::Equal => Some("be"),
        BinaryOp::NotEqual => Some("not be"),
        BinaryOp::GreaterThan => Some("be greater than"),
        BinaryOp::GreaterThanOrEqual => Some("be greater than or equal to"),
        BinaryOp::LessThan => Some("be less than"),
        BinaryOp::LessThanOrEqual => Some("be less than or equal to"),
        _ => None,
    }
}

/// Whether a node's text is worth showing as a receiver prefix.
///
/// Everything except constants qualifies; constants qualify only when they
/// are primitive or string typed. This keeps literal receivers visible
/// (`"1".Trim()`, `1.ToString()`) while suppressing synthetic captured
/// targets.
fn is_interesting(expr: &Expr) -> bool {
    match expr {
        Expr::Constant(value) => value.is_primitive(),
        _ => true,
    }
}

struct Renderer {
    out: String,
}

impl Renderer {
    fn write_expr(&mut self, expr: &Expr) {
        match expr {
            Expr::Constant(value) => self.out.push_str(&format_value(value)),
            Expr::Variable { name, .. } => self.out.push_str(name),
            Expr::Member {
                target,
                name,
                declaring_type,
                ..
            } => {
                match target {
                    None => {
                        if let Some(declaring) = declaring_type {
                            self.out.push_str(declaring);
                            self.out.push('.');
                        }
                    }
                    Some(t) if is_interesting(t) => {
                        self.write_expr(t);
                        self.out.push('.');
                    }
                    Some(_) => {}
                }
                self.out.push_str(name);
            }
            Expr::Call(call) => self.write_call(call),
            Expr::Indexer { target, args } => {
                self.write_expr(target);
                self.out.push('[');
                self.write_args(args);
                self.out.push(']');
            }
            Expr::Unary {
                op,
                operand,
                type_name,
            } => {
                let type_text = type_name
                    .as_deref()
                    .map(display_type_name)
                    .unwrap_or("object");
                match op {
                    UnaryOp::Negate => {
                        self.out.push('-');
                        self.write_expr(operand);
                    }
                    UnaryOp::Not => {
                        self.out.push('!');
                        self.write_expr(operand);
                    }
                    UnaryOp::Convert => {
                        self.out.push('(');
                        self.out.push_str(type_text);
                        self.out.push(')');
                        self.write_expr(operand);
                    }
                    UnaryOp::ArrayLength => {
                        self.write_expr(operand);
                        self.out.push_str(".Length");
                    }
                    UnaryOp::TypeAs => {
                        self.write_expr(operand);
                        self.out.push_str(" as ");
                        self.out.push_str(type_text);
                    }
                }
            }
            Expr::Binary { op, left, right } => {
                if *op == BinaryOp::ArrayIndex {
                    self.write_expr(left);
                    self.out.push('[');
                    self.write_expr(right);
                    self.out.push(']');
                } else {
                    self.write_expr(left);
                    self.out.push(' ');
                    self.out.push_str(operator_symbol(*op));
                    self.out.push(' ');
                    self.write_expr(right);
                }
            }
            Expr::Conditional {
                test,
                if_true,
                if_false,
            } => {
                self.write_expr(test);
                self.out.push_str(" ? ");
                self.write_expr(if_true);
                self.out.push_str(" : ");
                self.write_expr(if_false);
            }
            Expr::TypeCheck { target, type_name } => {
                self.write_expr(target);
                self.out.push_str(" is ");
                self.out.push_str(display_type_name(type_name));
            }
            Expr::ObjectInit {
                type_name,
                bindings,
            } => {
                self.out.push_str("new ");
                self.out.push_str(type_name);
                self.out.push_str(" { ");
                for (i, (name, value)) in bindings.iter().enumerate() {
                    if i > 0 {
                        self.out.push_str(", ");
                    }
                    self.out.push_str(name);
                    self.out.push_str(" = ");
                    self.write_expr(value);
                }
                self.out.push_str(" }");
            }
            Expr::Lambda { body } => self.write_expr(body),
            Expr::ArrayNew { elements } => {
                self.out.push_str("new[] { ");
                self.write_args(elements);
                self.out.push_str(" }");
            }
            Expr::ListInit {
                type_name,
                elements,
            } => {
                self.out.push_str("new ");
                self.out.push_str(type_name);
                self.out.push_str(" { ");
                self.write_args(elements);
                self.out.push_str(" }");
            }
            Expr::Invocation { target, args } => {
                self.write_expr(target);
                self.out.push('(');
                self.write_args(args);
                self.out.push(')');
            }
        }
    }

    fn write_call(&mut self, call: &CallExpr) {
        // Indexer call syntax: target[args].
        if call.method == "get_Item" {
            if let Some(target) = &call.target {
                self.write_expr(target);
                self.out.push('[');
                self.write_args(&call.args);
                self.out.push(']');
                return;
            }
        }

        // Extension-style call: the first argument is the receiver.
        if call.is_extension && !call.args.is_empty() {
            self.write_expr(&call.args[0]);
            self.out.push('.');
            self.out.push_str(&call.method);
            self.out.push('(');
            self.write_args(&call.args[1..]);
            self.out.push(')');
            return;
        }

        match &call.target {
            None => {
                if let Some(declaring) = &call.declaring_type {
                    self.out.push_str(declaring);
                    self.out.push('.');
                }
            }
            Some(target) if is_interesting(target) => {
                self.write_expr(target);
                self.out.push('.');
            }
            Some(_) => {}
        }
        self.out.push_str(&call.method);
        self.out.push('(');
        self.write_args(&call.args);
        self.out.push(')');
    }

    fn write_args(&mut self, args: &[ExprRef]) {
        for (i, arg) in args.iter().enumerate() {
            if i > 0 {
                self.out.push_str(", ");
            }
            self.write_expr(arg);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::Expr;
    use crate::value::Value;

    fn var(name: &str) -> ExprRef {
        Expr::var(name.to_string(), || Value::Null)
    }

    #[test]
    fn test_relation_keywords_total_over_relational_kinds() {
        let expected = [
            (BinaryOp::Equal, "be"),
            (BinaryOp::NotEqual, "not be"),
            (BinaryOp::GreaterThan, "be greater than"),
            (BinaryOp::GreaterThanOrEqual, "be greater than or equal to"),
            (BinaryOp::LessThan, "be less than"),
            (BinaryOp::LessThanOrEqual, "be less than or equal to"),
        ];
        for (op, keyword) in expected {
            assert_eq!(relation_keyword(op), Some(keyword));
        }
        assert_eq!(relation_keyword(BinaryOp::Add), None);
        assert_eq!(relation_keyword(BinaryOp::AndAlso), None);
    }

    #[test]
    fn test_binary_operator_symbols() {
        let tree = Expr::binary(BinaryOp::Add, var("a"), var("b"));
        assert_eq!(render(&tree), "a + b");

        let tree = Expr::binary(BinaryOp::Coalesce, var("a"), var("b"));
        assert_eq!(render(&tree), "a ?? b");

        let tree = Expr::binary(BinaryOp::LeftShift, var("a"), Expr::constant(2));
        assert_eq!(render(&tree), "a << 2");
    }

    #[test]
    fn test_array_index_renders_as_brackets() {
        let tree = Expr::binary(BinaryOp::ArrayIndex, var("xs"), Expr::constant(0));
        assert_eq!(render(&tree), "xs[0]");
    }

    #[test]
    fn test_conditional() {
        let tree = Expr::conditional(var("flag"), Expr::constant(1), Expr::constant(2));
        assert_eq!(render(&tree), "flag ? 1 : 2");
    }

    #[test]
    fn test_indexer_call_syntax() {
        let tree = Expr::call(
            var("map"),
            "get_Item",
            vec![Expr::constant("key")],
        );
        assert_eq!(render(&tree), "map[\"key\"]");
    }

    #[test]
    fn test_extension_call_uses_first_arg_as_receiver() {
        let tree = Expr::extension_call("Contains", vec![var("foo"), Expr::constant(4)]);
        assert_eq!(render(&tree), "foo.Contains(4)");
    }

    #[test]
    fn test_static_call_prefixes_declaring_type() {
        let tree = Expr::static_call(
            "Math",
            "Abs",
            vec![var("x")],
            crate::expr::Invoker::new(|_, _| Ok(Value::Int(0))),
        );
        assert_eq!(render(&tree), "Math.Abs(x)");
    }

    #[test]
    fn test_uninteresting_constant_target_is_suppressed() {
        let this = Expr::constant(Value::Object {
            type_name: "Fixture".to_string(),
            fields: Default::default(),
        });
        let tree = Expr::call(this, "Check", vec![]);
        assert_eq!(render(&tree), "Check()");

        let member = Expr::member(
            Expr::constant(Value::Object {
                type_name: "Fixture".to_string(),
                fields: Default::default(),
            }),
            "count",
        );
        assert_eq!(render(&member), "count");
    }

    #[test]
    fn test_literal_receivers_stay_visible() {
        let tree = Expr::call(Expr::constant("1"), "Trim", vec![]);
        assert_eq!(render(&tree), "\"1\".Trim()");

        let tree = Expr::call(Expr::constant(1), "ToString", vec![]);
        assert_eq!(render(&tree), "1.ToString()");
    }

    #[test]
    fn test_unary_forms() {
        assert_eq!(render(&Expr::unary(UnaryOp::Negate, var("x"))), "-x");
        assert_eq!(render(&Expr::unary(UnaryOp::Not, var("b"))), "!b");
        assert_eq!(
            render(&Expr::unary(UnaryOp::ArrayLength, var("xs"))),
            "xs.Length"
        );
        assert_eq!(render(&Expr::convert("Int32", var("x"))), "(int)x");
        assert_eq!(render(&Expr::type_as(var("x"), "String")), "x as string");
    }

    #[test]
    fn test_type_check() {
        let tree = Expr::type_check(var("x"), "String");
        assert_eq!(render(&tree), "x is string");
    }

    #[test]
    fn test_object_init() {
        let tree = Expr::object_init(
            "Point",
            vec![
                ("X".to_string(), Expr::constant(1)),
                ("Y".to_string(), Expr::constant(2)),
            ],
        );
        assert_eq!(render(&tree), "new Point { X = 1, Y = 2 }");
    }

    #[test]
    fn test_array_new_and_list_init() {
        let tree = Expr::array_new(vec![Expr::constant(1), Expr::constant(2)]);
        assert_eq!(render(&tree), "new[] { 1, 2 }");

        let tree = Expr::list_init("List", vec![Expr::constant(1)]);
        assert_eq!(render(&tree), "new List { 1 }");
    }

    #[test]
    fn test_lambda_renders_its_body() {
        let tree = Expr::lambda(Expr::binary(BinaryOp::Equal, var("a"), Expr::constant(1)));
        assert_eq!(render(&tree), "a == 1");
    }

    #[test]
    fn test_rendering_is_idempotent() {
        let tree = Expr::binary(
            BinaryOp::GreaterThanOrEqual,
            Expr::member(var("order"), "total"),
            Expr::constant(100),
        );
        let first = render(&tree);
        let second = render(&tree);
        assert_eq!(first, second);
        assert_eq!(first, "order.total >= 100");
    }
}
