//! The boolean assertion expression tree.
//!
//! An assertion like `foo.len() == 42` arrives here as an immutable tree of
//! [`Expr`] nodes built by the producing harness. The node set is closed:
//! every component in this crate (the rebuilding visitor, the renderer, the
//! evaluator) matches exhaustively over it.
//!
//! Leaves carry their evaluation capability with them: a [`Expr::Variable`]
//! holds a closure capturing the live binding at tree-build time, so no
//! runtime code generation is needed to recover the runtime value later.
//!
//! # Example
//!
//! ```rust,ignore
//! use attest::{capture, check, BinaryOp, Expr};
//!
//! let foo = 1;
//! let tree = Expr::binary(BinaryOp::Equal, capture!(foo), Expr::constant(2));
//! check(&tree); // panics: "Expected: foo / to be: 2 / but was: 1"
//! ```

use crate::eval::EvalError;
use crate::value::Value;
use std::fmt;
use std::rc::Rc;

/// Shared handle to an expression node.
///
/// Children are owned through `Rc` so the rebuilding visitor can return
/// untouched subtrees without reallocating them.
pub type ExprRef = Rc<Expr>;

/// A captured leaf binding, pulled on demand during evaluation.
pub type Binding = Rc<dyn Fn() -> Value>;

/// Binary operator kinds, covering arithmetic, logical, relational, bitwise
/// and array-index forms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    And,
    AndAlso,
    ArrayIndex,
    Coalesce,
    Divide,
    Equal,
    ExclusiveOr,
    GreaterThan,
    GreaterThanOrEqual,
    LeftShift,
    LessThan,
    LessThanOrEqual,
    Modulo,
    Multiply,
    NotEqual,
    Or,
    OrElse,
    Power,
    RightShift,
    Subtract,
}

/// Unary operator kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    /// Arithmetic negation, `-x`.
    Negate,
    /// Boolean negation, `!x`.
    Not,
    /// Cast, `(T)x`.
    Convert,
    /// Array length, rendered as `x.Length`.
    ArrayLength,
    /// Safe cast, `x as T`.
    TypeAs,
}

/// An external predicate bound to a [`Expr::Call`] node at tree-build time.
///
/// The invoker receives the evaluated target (if any) and the evaluated
/// arguments, and either returns a value or signals failure. Custom checks
/// (emptiness, subset membership, ...) communicate their own report text by
/// returning [`EvalError::Custom`]; any other error is treated as a genuine
/// fault in user code and propagates unchanged.
#[derive(Clone)]
pub struct Invoker(Rc<dyn Fn(Option<&Value>, &[Value]) -> Result<Value, EvalError>>);

impl Invoker {
    pub fn new(f: impl Fn(Option<&Value>, &[Value]) -> Result<Value, EvalError> + 'static) -> Self {
        Invoker(Rc::new(f))
    }

    pub fn invoke(&self, target: Option<&Value>, args: &[Value]) -> Result<Value, EvalError> {
        (self.0)(target, args)
    }
}

impl fmt::Debug for Invoker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Invoker")
    }
}

/// A method-call node.
#[derive(Clone)]
pub struct CallExpr {
    /// Receiver expression; `None` for static and extension-style calls.
    pub target: Option<ExprRef>,
    pub method: String,
    /// Declaring type shown as the prefix of a static call.
    pub declaring_type: Option<String>,
    /// Extension-style call: the first argument is the subject and renders
    /// as the receiver (`args[0].method(rest)`).
    pub is_extension: bool,
    pub args: Vec<ExprRef>,
    /// Predicate bound at build time; when absent, evaluation falls back to
    /// the built-in method table.
    pub invoker: Option<Invoker>,
}

/// One node of a boolean assertion expression.
#[derive(Clone)]
pub enum Expr {
    /// A literal value, already evaluated.
    Constant(Value),
    /// A parameter or local, with its binding captured at build time.
    Variable { name: String, binding: Binding },
    /// Field or property access. `target` is `None` for static members,
    /// which read through their own captured binding instead.
    Member {
        target: Option<ExprRef>,
        name: String,
        declaring_type: Option<String>,
        binding: Option<Binding>,
    },
    Call(CallExpr),
    /// Indexer access, `target[args]`.
    Indexer { target: ExprRef, args: Vec<ExprRef> },
    /// `type_name` is set for `Convert` and `TypeAs`.
    Unary {
        op: UnaryOp,
        operand: ExprRef,
        type_name: Option<String>,
    },
    Binary {
        op: BinaryOp,
        left: ExprRef,
        right: ExprRef,
    },
    /// `test ? if_true : if_false`.
    Conditional {
        test: ExprRef,
        if_true: ExprRef,
        if_false: ExprRef,
    },
    /// `target is type_name`.
    TypeCheck { target: ExprRef, type_name: String },
    /// `new T { name = value, ... }`.
    ObjectInit {
        type_name: String,
        bindings: Vec<(String, ExprRef)>,
    },
    /// Only the outermost lambda's body is walked; a lambda anywhere else in
    /// the tree is an unsupported kind for the evaluator.
    Lambda { body: ExprRef },
    /// `new[] { ... }`.
    ArrayNew { elements: Vec<ExprRef> },
    /// `new T { e1, e2, ... }`.
    ListInit {
        type_name: String,
        elements: Vec<ExprRef>,
    },
    /// Application of an inline lambda.
    Invocation { target: ExprRef, args: Vec<ExprRef> },
}

impl Expr {
    /// Static name of this node's kind, used in unsupported-kind errors.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Expr::Constant(_) => "Constant",
            Expr::Variable { .. } => "Variable",
            Expr::Member { .. } => "Member",
            Expr::Call(_) => "Call",
            Expr::Indexer { .. } => "Indexer",
            Expr::Unary { .. } => "Unary",
            Expr::Binary { .. } => "Binary",
            Expr::Conditional { .. } => "Conditional",
            Expr::TypeCheck { .. } => "TypeCheck",
            Expr::ObjectInit { .. } => "ObjectInit",
            Expr::Lambda { .. } => "Lambda",
            Expr::ArrayNew { .. } => "ArrayNew",
            Expr::ListInit { .. } => "ListInit",
            Expr::Invocation { .. } => "Invocation",
        }
    }

    // =========================================================================
    // Constructors
    // =========================================================================

    /// A literal constant.
    pub fn constant(value: impl Into<Value>) -> ExprRef {
        Rc::new(Expr::Constant(value.into()))
    }

    /// A named variable whose value is pulled from `binding` at evaluation
    /// time. See also the [`capture!`](crate::capture) macro.
    pub fn var(name: impl Into<String>, binding: impl Fn() -> Value + 'static) -> ExprRef {
        Rc::new(Expr::Variable {
            name: name.into(),
            binding: Rc::new(binding),
        })
    }

    /// Instance field or property access, `target.name`.
    pub fn member(target: ExprRef, name: impl Into<String>) -> ExprRef {
        Rc::new(Expr::Member {
            target: Some(target),
            name: name.into(),
            declaring_type: None,
            binding: None,
        })
    }

    /// Static field or property access, `DeclaringType.name`, reading
    /// through a captured binding.
    pub fn static_member(
        declaring_type: impl Into<String>,
        name: impl Into<String>,
        binding: impl Fn() -> Value + 'static,
    ) -> ExprRef {
        Rc::new(Expr::Member {
            target: None,
            name: name.into(),
            declaring_type: Some(declaring_type.into()),
            binding: Some(Rc::new(binding)),
        })
    }

    /// Instance method call, `target.method(args)`, dispatched against the
    /// built-in method table.
    pub fn call(target: ExprRef, method: impl Into<String>, args: Vec<ExprRef>) -> ExprRef {
        Rc::new(Expr::Call(CallExpr {
            target: Some(target),
            method: method.into(),
            declaring_type: None,
            is_extension: false,
            args,
            invoker: None,
        }))
    }

    /// Static method call, `DeclaringType.method(args)`, backed by `invoker`.
    pub fn static_call(
        declaring_type: impl Into<String>,
        method: impl Into<String>,
        args: Vec<ExprRef>,
        invoker: Invoker,
    ) -> ExprRef {
        Rc::new(Expr::Call(CallExpr {
            target: None,
            method: method.into(),
            declaring_type: Some(declaring_type.into()),
            is_extension: false,
            args,
            invoker: Some(invoker),
        }))
    }

    /// Extension-style call: `args[0]` is the subject, rendered as the
    /// receiver. Dispatches against the built-in method table.
    pub fn extension_call(method: impl Into<String>, args: Vec<ExprRef>) -> ExprRef {
        Rc::new(Expr::Call(CallExpr {
            target: None,
            method: method.into(),
            declaring_type: None,
            is_extension: true,
            args,
            invoker: None,
        }))
    }

    /// Extension-style call backed by an external predicate. This is how
    /// custom checks (emptiness, subset, ...) plug in.
    pub fn extension_check(
        method: impl Into<String>,
        args: Vec<ExprRef>,
        invoker: Invoker,
    ) -> ExprRef {
        Rc::new(Expr::Call(CallExpr {
            target: None,
            method: method.into(),
            declaring_type: None,
            is_extension: true,
            args,
            invoker: Some(invoker),
        }))
    }

    /// Indexer access, `target[args]`.
    pub fn indexer(target: ExprRef, args: Vec<ExprRef>) -> ExprRef {
        Rc::new(Expr::Indexer { target, args })
    }

    /// Unary operation without a type operand (`Negate`, `Not`,
    /// `ArrayLength`).
    pub fn unary(op: UnaryOp, operand: ExprRef) -> ExprRef {
        Rc::new(Expr::Unary {
            op,
            operand,
            type_name: None,
        })
    }

    /// Cast, `(type_name)operand`.
    pub fn convert(type_name: impl Into<String>, operand: ExprRef) -> ExprRef {
        Rc::new(Expr::Unary {
            op: UnaryOp::Convert,
            operand,
            type_name: Some(type_name.into()),
        })
    }

    /// Safe cast, `operand as type_name`.
    pub fn type_as(operand: ExprRef, type_name: impl Into<String>) -> ExprRef {
        Rc::new(Expr::Unary {
            op: UnaryOp::TypeAs,
            operand,
            type_name: Some(type_name.into()),
        })
    }

    /// Binary operation.
    pub fn binary(op: BinaryOp, left: ExprRef, right: ExprRef) -> ExprRef {
        Rc::new(Expr::Binary { op, left, right })
    }

    /// Conditional, `test ? if_true : if_false`.
    pub fn conditional(test: ExprRef, if_true: ExprRef, if_false: ExprRef) -> ExprRef {
        Rc::new(Expr::Conditional {
            test,
            if_true,
            if_false,
        })
    }

    /// Type test, `target is type_name`.
    pub fn type_check(target: ExprRef, type_name: impl Into<String>) -> ExprRef {
        Rc::new(Expr::TypeCheck {
            target,
            type_name: type_name.into(),
        })
    }

    /// Object construction with member bindings.
    pub fn object_init(
        type_name: impl Into<String>,
        bindings: Vec<(String, ExprRef)>,
    ) -> ExprRef {
        Rc::new(Expr::ObjectInit {
            type_name: type_name.into(),
            bindings,
        })
    }

    /// Outermost lambda wrapper around an assertion body.
    pub fn lambda(body: ExprRef) -> ExprRef {
        Rc::new(Expr::Lambda { body })
    }

    /// Array construction, `new[] { ... }`.
    pub fn array_new(elements: Vec<ExprRef>) -> ExprRef {
        Rc::new(Expr::ArrayNew { elements })
    }

    /// List construction, `new T { ... }`.
    pub fn list_init(type_name: impl Into<String>, elements: Vec<ExprRef>) -> ExprRef {
        Rc::new(Expr::ListInit {
            type_name: type_name.into(),
            elements,
        })
    }

    /// Application of an inline lambda.
    pub fn invocation(target: ExprRef, args: Vec<ExprRef>) -> ExprRef {
        Rc::new(Expr::Invocation { target, args })
    }
}

impl fmt::Debug for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.kind_name(), crate::render::render_node(self))
    }
}

/// Capture a local binding as a [`Expr::Variable`] node.
///
/// The value is cloned once when the tree is built, matching the
/// capture-at-build-time evaluation model.
///
/// # Example
///
/// ```rust,ignore
/// use attest::{capture, check, BinaryOp, Expr};
///
/// let foo = 41;
/// let tree = Expr::binary(BinaryOp::Equal, capture!(foo), Expr::constant(42));
/// ```
#[macro_export]
macro_rules! capture {
    ($name:ident) => {{
        let __captured = $crate::Value::from($name.clone());
        $crate::Expr::var(stringify!($name), move || __captured.clone())
    }};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_names() {
        assert_eq!(Expr::constant(1).kind_name(), "Constant");
        assert_eq!(Expr::var("x", || Value::Int(1)).kind_name(), "Variable");
        assert_eq!(
            Expr::binary(BinaryOp::Add, Expr::constant(1), Expr::constant(2)).kind_name(),
            "Binary"
        );
        assert_eq!(Expr::lambda(Expr::constant(true)).kind_name(), "Lambda");
    }

    #[test]
    fn test_capture_macro_snapshots_value() {
        let mut foo = 1;
        let node = capture!(foo);
        foo += 1;
        let _ = foo;

        match &*node {
            Expr::Variable { name, binding } => {
                assert_eq!(name, "foo");
                assert_eq!(binding(), Value::Int(1));
            }
            other => panic!("expected a Variable node, got {}", other.kind_name()),
        }
    }

    #[test]
    fn test_extension_call_shape() {
        let node = Expr::extension_call("Contains", vec![Expr::constant("ab"), Expr::constant("a")]);
        match &*node {
            Expr::Call(call) => {
                assert!(call.is_extension);
                assert!(call.target.is_none());
                assert_eq!(call.args.len(), 2);
            }
            other => panic!("expected a Call node, got {}", other.kind_name()),
        }
    }
}
