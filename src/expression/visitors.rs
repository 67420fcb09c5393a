//! Expression visitors and rewriters
//!
//! Read-only traversal goes through [`ExpressionVisitor`] and
//! [`walk_expression`]: implementors override the `visit_*` methods they care
//! about and the walker takes care of descending into children.
//!
//! Rewrites never mutate a tree in place. [`transform_up`] rebuilds a tree
//! bottom-up, and [`ExpressionRewriter`] is the pluggable form used by the
//! query provider for its before/after translation stages.
//!
//! # Example
//!
//! ```ignore
//! use crate::expression::visitors::{walk_expression, MemberAccessCollector};
//!
//! let members = MemberAccessCollector::collect(&expr);
//! // members = ["dto.Nested.Flag", "dto.Age"]
//! ```

use std::collections::BTreeSet;
use std::convert::Infallible;

use super::types::{ParameterValues, Value};
use super::{
    BinaryOperator, ConditionalExpr, Constant, Expr, Lambda, MemberAccess, MethodCall, Parameter,
};

/// Trait for visiting `Expr` nodes.
///
/// Default implementations do nothing, so visitors only override what they
/// need.
pub trait ExpressionVisitor {
    type Output: Default;

    /// Member access such as `dto.Age`
    fn visit_member(&mut self, _member: &MemberAccess) -> Self::Output {
        Self::Output::default()
    }

    /// Method call such as `s.where(x => ...)`
    fn visit_call(&mut self, _call: &MethodCall) -> Self::Output {
        Self::Output::default()
    }

    fn visit_lambda(&mut self, _lambda: &Lambda) -> Self::Output {
        Self::Output::default()
    }

    fn visit_conditional(&mut self, _conditional: &ConditionalExpr) -> Self::Output {
        Self::Output::default()
    }

    /// Named `$parameter`
    fn visit_external(&mut self, _parameter: &Parameter) -> Self::Output {
        Self::Output::default()
    }

    fn visit_constant(&mut self, _constant: &Constant) -> Self::Output {
        Self::Output::default()
    }

    /// Leaves without a dedicated method (sources, lambda parameters)
    fn visit_leaf(&mut self, _expr: &Expr) -> Self::Output {
        Self::Output::default()
    }
}

/// Walk an expression tree, calling visitor methods for each node before
/// descending into its children.
pub fn walk_expression<V: ExpressionVisitor>(expr: &Expr, visitor: &mut V) -> V::Output {
    let result = match expr {
        Expr::Member(member) => visitor.visit_member(member),
        Expr::Call(call) => visitor.visit_call(call),
        Expr::Lambda(lambda) => visitor.visit_lambda(lambda),
        Expr::Conditional(conditional) => visitor.visit_conditional(conditional),
        Expr::External(parameter) => visitor.visit_external(parameter),
        Expr::Constant(constant) => visitor.visit_constant(constant),
        Expr::Source(_) | Expr::Parameter(_) => visitor.visit_leaf(expr),
        Expr::Unary(_) | Expr::Binary(_) | Expr::Convert(_) | Expr::New(_) => {
            V::Output::default()
        }
    };
    for child in expr.children() {
        walk_expression(child, visitor);
    }
    result
}

/// Rebuild `expr` bottom-up, passing every node to `f` after its children
/// have been rebuilt.
pub fn transform_up(expr: Expr, f: &mut impl FnMut(Expr) -> Expr) -> Expr {
    let rebuilt = match expr.map_children(&mut |child| Ok::<_, Infallible>(transform_up(child, f)))
    {
        Ok(rebuilt) => rebuilt,
        Err(never) => match never {},
    };
    f(rebuilt)
}

/// Replace references to lambda parameter `name` in `body` with
/// `replacement`. Nested lambdas that rebind `name` are left alone; nested
/// lambdas whose parameter occurs free in `replacement` are renamed first so
/// the replacement keeps referring to the outer scope.
pub fn substitute_parameter(body: Expr, name: &str, replacement: &Expr) -> Expr {
    let free = free_parameters(replacement);
    substitute_avoiding(body, name, replacement, &free)
}

fn substitute_avoiding(
    body: Expr,
    name: &str,
    replacement: &Expr,
    free: &BTreeSet<String>,
) -> Expr {
    match body {
        Expr::Parameter(ref p) if p.name == name => replacement.clone(),
        Expr::Lambda(ref lambda) if lambda.parameter.name == name => body,
        Expr::Lambda(lambda) if free.contains(&lambda.parameter.name) => {
            let mut taken = free_parameters(&lambda.body);
            taken.extend(free.iter().cloned());
            taken.insert(name.to_string());
            let fresh = Parameter::new(
                fresh_name(&lambda.parameter.name, &taken),
                lambda.parameter.ty.clone(),
            );
            let renamed = substitute_parameter(
                *lambda.body,
                &lambda.parameter.name,
                &Expr::Parameter(fresh.clone()),
            );
            Expr::Lambda(Lambda::new(
                fresh,
                substitute_avoiding(renamed, name, replacement, free),
            ))
        }
        other => match other.map_children(&mut |child| {
            Ok::<_, Infallible>(substitute_avoiding(child, name, replacement, free))
        }) {
            Ok(rebuilt) => rebuilt,
            Err(never) => match never {},
        },
    }
}

/// `base` followed by the smallest counter not in `taken`, e.g. `o1`.
fn fresh_name(base: &str, taken: &BTreeSet<String>) -> String {
    (1..)
        .map(|n| format!("{}{}", base, n))
        .find(|candidate| !taken.contains(candidate))
        .unwrap_or_else(|| format!("{}_", base))
}

/// Lambda parameter names referenced in `expr` but not bound inside it.
pub fn free_parameters(expr: &Expr) -> BTreeSet<String> {
    fn collect(expr: &Expr, bound: &mut Vec<String>, free: &mut BTreeSet<String>) {
        match expr {
            Expr::Parameter(p) => {
                if !bound.contains(&p.name) {
                    free.insert(p.name.clone());
                }
            }
            Expr::Lambda(lambda) => {
                bound.push(lambda.parameter.name.clone());
                collect(&lambda.body, bound, free);
                bound.pop();
            }
            other => {
                for child in other.children() {
                    collect(child, bound, free);
                }
            }
        }
    }

    let mut free = BTreeSet::new();
    collect(expr, &mut Vec::new(), &mut free);
    free
}

/// Replace every `$name` with a constant from `values`. Returns the name of
/// the first parameter without a value.
pub fn bind_external_parameters(expr: Expr, values: &ParameterValues) -> Result<Expr, String> {
    match expr {
        Expr::External(parameter) => match values.get(&parameter.name) {
            Some(value) => Ok(Expr::typed_constant(value.clone(), parameter.ty)),
            None => Err(parameter.name),
        },
        other => other.map_children(&mut |child| bind_external_parameters(child, values)),
    }
}

/// Stage in the query provider's translation pipeline.
pub trait ExpressionRewriter: Send + Sync {
    fn name(&self) -> &str;

    fn rewrite(&self, expr: Expr) -> Expr;
}

/// Adapts a closure into an [`ExpressionRewriter`].
pub struct FnRewriter<F> {
    name: String,
    f: F,
}

impl<F> FnRewriter<F>
where
    F: Fn(Expr) -> Expr + Send + Sync,
{
    pub fn new(name: impl Into<String>, f: F) -> Self {
        FnRewriter {
            name: name.into(),
            f,
        }
    }
}

impl<F> ExpressionRewriter for FnRewriter<F>
where
    F: Fn(Expr) -> Expr + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn rewrite(&self, expr: Expr) -> Expr {
        (self.f)(expr)
    }
}

/// Drops null guards of the form `x == null ? null : body`, leaving `body`.
///
/// Sources that already propagate nulls through member access (the in-memory
/// interpreter does) evaluate both forms the same way.
pub struct NullCheckFlattener;

impl ExpressionRewriter for NullCheckFlattener {
    fn name(&self) -> &str {
        "null_check_flattener"
    }

    fn rewrite(&self, expr: Expr) -> Expr {
        transform_up(expr, &mut |node| match node {
            Expr::Conditional(c) if is_null_guard(&c.test) && c.if_true.is_null_constant() => {
                *c.if_false
            }
            other => other,
        })
    }
}

fn is_null_guard(test: &Expr) -> bool {
    match test {
        Expr::Binary(b) if b.op == BinaryOperator::Equal => {
            b.left.is_null_constant() || b.right.is_null_constant()
        }
        _ => false,
    }
}

// =============================================================================
// Common visitors
// =============================================================================

/// Collects the rendered text of every outermost member chain, e.g.
/// `dto.Nested.Flag`.
#[derive(Default)]
pub struct MemberAccessCollector {
    pub members: Vec<String>,
    inside_chain: usize,
}

impl MemberAccessCollector {
    pub fn collect(expr: &Expr) -> Vec<String> {
        let mut collector = Self::default();
        collector.walk(expr);
        collector.members
    }

    fn walk(&mut self, expr: &Expr) {
        match expr {
            Expr::Member(member) => {
                if self.inside_chain == 0 {
                    self.members.push(expr.to_string());
                }
                self.inside_chain += 1;
                self.walk(&member.target);
                self.inside_chain -= 1;
            }
            other => {
                let saved = std::mem::take(&mut self.inside_chain);
                for child in other.children() {
                    self.walk(child);
                }
                self.inside_chain = saved;
            }
        }
    }
}

/// Collects names of `$parameters` referenced by an expression.
#[derive(Default)]
pub struct ExternalParameterCollector {
    pub names: BTreeSet<String>,
}

impl ExternalParameterCollector {
    pub fn collect(expr: &Expr) -> BTreeSet<String> {
        let mut collector = Self::default();
        walk_expression(expr, &mut collector);
        collector.names
    }
}

impl ExpressionVisitor for ExternalParameterCollector {
    type Output = ();

    fn visit_external(&mut self, parameter: &Parameter) {
        self.names.insert(parameter.name.clone());
    }
}

/// Counts method calls in a tree, used to tell query shapes apart in logs.
#[derive(Default)]
pub struct CallCounter {
    pub calls: usize,
}

impl ExpressionVisitor for CallCounter {
    type Output = ();

    fn visit_call(&mut self, _call: &MethodCall) {
        self.calls += 1;
    }
}

/// Whether `expr` contains a constant equal to `value`.
pub fn contains_constant(expr: &Expr, value: &Value) -> bool {
    struct Finder<'a> {
        value: &'a Value,
        found: bool,
    }

    impl ExpressionVisitor for Finder<'_> {
        type Output = ();

        fn visit_constant(&mut self, constant: &Constant) {
            if constant.value == *self.value {
                self.found = true;
            }
        }
    }

    let mut finder = Finder {
        value,
        found: false,
    };
    walk_expression(expr, &mut finder);
    finder.found
}
