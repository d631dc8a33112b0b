//! Rebuilding traversal over assertion expression trees.
//!
//! [`Rewrite`] is the generic double-dispatch skeleton every transformation
//! specializes: the default for each node kind is to rewrite the children and
//! reconstruct the node only when a child actually changed identity, so
//! untouched subtrees are shared rather than reallocated. The default is
//! never used standalone; concrete behaviors override [`Rewrite::rewrite`]
//! for the kinds they care about and delegate the rest back to
//! [`Rewrite::rewrite_children`].
//!
//! The one specialization this crate needs is [`Replace`], which the
//! dispatcher uses to substitute an evaluated operand back into the tree as
//! a literal constant.

use crate::check::CheckError;
use crate::expr::{CallExpr, Expr, ExprRef};
use std::rc::Rc;

/// Tree transformation with identity-preserving defaults.
pub trait Rewrite {
    /// Transform one node. Defaults to rewriting the children.
    fn rewrite(&mut self, expr: &ExprRef) -> Result<ExprRef, CheckError> {
        self.rewrite_children(expr)
    }

    /// Rewrite every child of `expr`, reconstructing the node only if some
    /// child changed identity. Exhaustive over the closed node set so that
    /// specializations compose for every kind.
    fn rewrite_children(&mut self, expr: &ExprRef) -> Result<ExprRef, CheckError> {
        match &**expr {
            Expr::Constant(_) | Expr::Variable { .. } => Ok(expr.clone()),
            Expr::Member {
                target,
                name,
                declaring_type,
                binding,
            } => {
                let new_target = match target {
                    Some(t) => Some(self.rewrite(t)?),
                    None => None,
                };
                match (&new_target, target) {
                    (Some(n), Some(t)) if !Rc::ptr_eq(n, t) => Ok(Rc::new(Expr::Member {
                        target: new_target,
                        name: name.clone(),
                        declaring_type: declaring_type.clone(),
                        binding: binding.clone(),
                    })),
                    _ => Ok(expr.clone()),
                }
            }
            Expr::Call(call) => {
                let mut changed = false;
                let new_target = match &call.target {
                    Some(t) => {
                        let n = self.rewrite(t)?;
                        changed |= !Rc::ptr_eq(&n, t);
                        Some(n)
                    }
                    None => None,
                };
                let (new_args, args_changed) = self.rewrite_all(&call.args)?;
                if changed || args_changed {
                    Ok(Rc::new(Expr::Call(CallExpr {
                        target: new_target,
                        method: call.method.clone(),
                        declaring_type: call.declaring_type.clone(),
                        is_extension: call.is_extension,
                        args: new_args,
                        invoker: call.invoker.clone(),
                    })))
                } else {
                    Ok(expr.clone())
                }
            }
            Expr::Indexer { target, args } => {
                let new_target = self.rewrite(target)?;
                let (new_args, args_changed) = self.rewrite_all(args)?;
                if !Rc::ptr_eq(&new_target, target) || args_changed {
                    Ok(Rc::new(Expr::Indexer {
                        target: new_target,
                        args: new_args,
                    }))
                } else {
                    Ok(expr.clone())
                }
            }
            Expr::Unary {
                op,
                operand,
                type_name,
            } => {
                let new_operand = self.rewrite(operand)?;
                if Rc::ptr_eq(&new_operand, operand) {
                    Ok(expr.clone())
                } else {
                    Ok(Rc::new(Expr::Unary {
                        op: *op,
                        operand: new_operand,
                        type_name: type_name.clone(),
                    }))
                }
            }
            Expr::Binary { op, left, right } => {
                let new_left = self.rewrite(left)?;
                let new_right = self.rewrite(right)?;
                if Rc::ptr_eq(&new_left, left) && Rc::ptr_eq(&new_right, right) {
                    Ok(expr.clone())
                } else {
                    Ok(Rc::new(Expr::Binary {
                        op: *op,
                        left: new_left,
                        right: new_right,
                    }))
                }
            }
            Expr::Conditional {
                test,
                if_true,
                if_false,
            } => {
                let new_test = self.rewrite(test)?;
                let new_true = self.rewrite(if_true)?;
                let new_false = self.rewrite(if_false)?;
                if Rc::ptr_eq(&new_test, test)
                    && Rc::ptr_eq(&new_true, if_true)
                    && Rc::ptr_eq(&new_false, if_false)
                {
                    Ok(expr.clone())
                } else {
                    Ok(Rc::new(Expr::Conditional {
                        test: new_test,
                        if_true: new_true,
                        if_false: new_false,
                    }))
                }
            }
            Expr::TypeCheck { target, type_name } => {
                let new_target = self.rewrite(target)?;
                if Rc::ptr_eq(&new_target, target) {
                    Ok(expr.clone())
                } else {
                    Ok(Rc::new(Expr::TypeCheck {
                        target: new_target,
                        type_name: type_name.clone(),
                    }))
                }
            }
            Expr::ObjectInit {
                type_name,
                bindings,
            } => {
                let mut changed = false;
                let mut new_bindings = Vec::with_capacity(bindings.len());
                for (name, value) in bindings {
                    let new_value = self.rewrite(value)?;
                    changed |= !Rc::ptr_eq(&new_value, value);
                    new_bindings.push((name.clone(), new_value));
                }
                if changed {
                    Ok(Rc::new(Expr::ObjectInit {
                        type_name: type_name.clone(),
                        bindings: new_bindings,
                    }))
                } else {
                    Ok(expr.clone())
                }
            }
            Expr::Lambda { body } => {
                let new_body = self.rewrite(body)?;
                if Rc::ptr_eq(&new_body, body) {
                    Ok(expr.clone())
                } else {
                    Ok(Rc::new(Expr::Lambda { body: new_body }))
                }
            }
            Expr::ArrayNew { elements } => {
                let (new_elements, changed) = self.rewrite_all(elements)?;
                if changed {
                    Ok(Rc::new(Expr::ArrayNew {
                        elements: new_elements,
                    }))
                } else {
                    Ok(expr.clone())
                }
            }
            Expr::ListInit {
                type_name,
                elements,
            } => {
                let (new_elements, changed) = self.rewrite_all(elements)?;
                if changed {
                    Ok(Rc::new(Expr::ListInit {
                        type_name: type_name.clone(),
                        elements: new_elements,
                    }))
                } else {
                    Ok(expr.clone())
                }
            }
            Expr::Invocation { target, args } => {
                let new_target = self.rewrite(target)?;
                let (new_args, args_changed) = self.rewrite_all(args)?;
                if !Rc::ptr_eq(&new_target, target) || args_changed {
                    Ok(Rc::new(Expr::Invocation {
                        target: new_target,
                        args: new_args,
                    }))
                } else {
                    Ok(expr.clone())
                }
            }
        }
    }

    /// Rewrite a slice of children, reporting whether any changed identity.
    fn rewrite_all(&mut self, items: &[ExprRef]) -> Result<(Vec<ExprRef>, bool), CheckError> {
        let mut changed = false;
        let mut out = Vec::with_capacity(items.len());
        for item in items {
            let new_item = self.rewrite(item)?;
            changed |= !Rc::ptr_eq(&new_item, item);
            out.push(new_item);
        }
        Ok((out, changed))
    }
}

/// Substitute one node (by identity) with a replacement everywhere it occurs.
pub struct Replace {
    target: ExprRef,
    replacement: ExprRef,
}

impl Replace {
    pub fn new(target: ExprRef, replacement: ExprRef) -> Self {
        Self {
            target,
            replacement,
        }
    }
}

impl Rewrite for Replace {
    fn rewrite(&mut self, expr: &ExprRef) -> Result<ExprRef, CheckError> {
        if Rc::ptr_eq(expr, &self.target) {
            Ok(self.replacement.clone())
        } else {
            self.rewrite_children(expr)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::BinaryOp;
    use crate::render::render;

    /// The default rewrite with no overrides: pure structural copy.
    struct Identity;
    impl Rewrite for Identity {}

    #[test]
    fn test_identity_rewrite_preserves_node_identity() {
        let tree = Expr::binary(
            BinaryOp::Add,
            Expr::constant(1),
            Expr::member(Expr::var("p", || 0.into()), "x"),
        );
        let out = Identity.rewrite(&tree).unwrap();
        assert!(Rc::ptr_eq(&out, &tree));
    }

    #[test]
    fn test_replace_substitutes_deep_node() {
        let leaf = Expr::var("foo", || 1.into());
        let sibling = Expr::constant(2);
        let tree = Expr::binary(
            BinaryOp::Equal,
            Expr::call(leaf.clone(), "ToString", vec![]),
            sibling.clone(),
        );

        let out = Replace::new(leaf, Expr::constant(13)).rewrite(&tree).unwrap();
        assert!(!Rc::ptr_eq(&out, &tree));
        assert_eq!(render(&out), "13.ToString() == 2");

        // The untouched sibling is shared, not copied.
        match &*out {
            Expr::Binary { right, .. } => assert!(Rc::ptr_eq(right, &sibling)),
            other => panic!("expected a Binary node, got {}", other.kind_name()),
        }
    }

    #[test]
    fn test_replace_misses_leave_tree_untouched() {
        let tree = Expr::indexer(Expr::var("xs", || 0.into()), vec![Expr::constant(0)]);
        let unrelated = Expr::constant(9);
        let out = Replace::new(unrelated, Expr::constant(10))
            .rewrite(&tree)
            .unwrap();
        assert!(Rc::ptr_eq(&out, &tree));
    }
}
