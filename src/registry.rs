//! The operation registry: typed rewrite rules and signature dispatch.
//!
//! An [`Operation`] is a named rewrite rule with a parameter-type
//! signature. Registering a commutative binary rule also synthesizes its
//! *conjugate* (signature and argument order reversed), so a rule written
//! for `(Int, List)` fires for `(List, Int)` without duplicate authoring.
//!
//! [`Registry::resolve`] returns candidates sorted ascending by *scope*,
//! the summed specificity weight of the signature; a lower scope is more
//! specific and is tried first by the simplifier.

use std::collections::HashMap;
use std::rc::Rc;

use crate::error::EvalError;
use crate::node::{attr, Node};

pub mod builtins;

/// A rewrite-rule body: ordered arguments in, optionally a replacement out.
///
/// Returning `Ok(None)` means "this rule does not apply to these values",
/// which is distinct from `Err(_)`: applicable but failed.
pub type Definition = Rc<dyn Fn(&[Node]) -> Result<Option<Node>, EvalError>>;

/// A parameter-type constraint in an operation signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Parameter {
    /// A variable leaf.
    Var,
    /// A type tag leaf.
    Type,
    /// A boolean leaf.
    Bool,
    /// An exact or big integer leaf.
    Int,
    /// A string leaf.
    Str,
    /// A closure.
    Closure,
    /// Any numeric leaf.
    Number,
    /// An equation.
    Equation,
    /// A pair.
    Pair,
    /// A vector.
    Vec,
    /// A matrix.
    Matrix,
    /// A list.
    List,
    /// A term (function application).
    Function,
    /// Anything that is not a numeric leaf.
    NotNumber,
    /// A list, vector, or matrix.
    Iterable,
    /// Any node.
    Any,
    /// Expands to all-[`Parameter::Number`] at the call's arity.
    Numbers,
    /// Expands to all-[`Parameter::Bool`] at the call's arity.
    Booleans,
    /// Expands to all-[`Parameter::Any`] at the call's arity.
    Universal,
    /// Like [`Parameter::Universal`], but requires arity above one.
    Multivariate,
}

impl Parameter {
    /// The specificity weight; lower is more specific.
    fn weight(self) -> u32 {
        match self {
            Parameter::Var | Parameter::Type => 1,
            Parameter::Bool | Parameter::Int | Parameter::Str | Parameter::Closure => 2,
            Parameter::Number | Parameter::Equation | Parameter::Pair => 3,
            Parameter::Vec | Parameter::Matrix | Parameter::List => 4,
            Parameter::Function | Parameter::NotNumber => 5,
            Parameter::Iterable => 6,
            Parameter::Any => 10,
            Parameter::Numbers | Parameter::Booleans => 40,
            Parameter::Universal | Parameter::Multivariate => 100,
        }
    }

    /// Whether `node` satisfies this constraint.
    fn matches(self, node: &Node) -> bool {
        match self {
            Parameter::Var => matches!(node, Node::Var(_)),
            Parameter::Type => matches!(node, Node::Type(_)),
            Parameter::Bool => matches!(node, Node::Bool(_)),
            Parameter::Int => matches!(node, Node::Int(_) | Node::Big(_)),
            Parameter::Str => matches!(node, Node::Str(_)),
            Parameter::Closure => matches!(node, Node::Closure(_)),
            Parameter::Number => node.is_number(),
            Parameter::Equation => matches!(node, Node::Equation(_)),
            Parameter::Pair => matches!(node, Node::Pair(_)),
            Parameter::Vec => matches!(node, Node::Vector(_)),
            Parameter::Matrix => matches!(node, Node::Matrix(_)),
            Parameter::List => matches!(node, Node::List(_)),
            Parameter::Function => matches!(node, Node::Term(_)),
            Parameter::NotNumber => !node.is_number(),
            Parameter::Iterable => {
                matches!(node, Node::List(_) | Node::Vector(_) | Node::Matrix(_))
            }
            Parameter::Any => true,
            // generic markers are expanded before matching
            Parameter::Numbers
            | Parameter::Booleans
            | Parameter::Universal
            | Parameter::Multivariate => false,
        }
    }
}

/// A typed rewrite rule.
#[derive(Clone)]
pub struct Operation {
    name: String,
    signature: Vec<Parameter>,
    scope: u32,
    def: Definition,
}

impl std::fmt::Debug for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Operation")
            .field("name", &self.name)
            .field("signature", &self.signature)
            .field("scope", &self.scope)
            .finish_non_exhaustive()
    }
}

impl PartialEq for Operation {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.signature == other.signature
    }
}

impl Operation {
    /// Builds a rule from a name, a signature, and a definition body.
    pub fn new(
        name: impl Into<String>,
        signature: Vec<Parameter>,
        def: impl Fn(&[Node]) -> Result<Option<Node>, EvalError> + 'static,
    ) -> Self {
        let scope = signature.iter().map(|p| p.weight()).sum();
        Self {
            name: name.into(),
            signature,
            scope,
            def: Rc::new(def),
        }
    }

    /// Convenience constructor for a unary rule.
    pub fn unary(
        name: impl Into<String>,
        parameter: Parameter,
        def: impl Fn(&Node) -> Result<Option<Node>, EvalError> + 'static,
    ) -> Self {
        Self::new(name, vec![parameter], move |args| def(&args[0]))
    }

    /// Convenience constructor for a binary rule.
    pub fn binary(
        name: impl Into<String>,
        signature: (Parameter, Parameter),
        def: impl Fn(&Node, &Node) -> Result<Option<Node>, EvalError> + 'static,
    ) -> Self {
        Self::new(name, vec![signature.0, signature.1], move |args| {
            def(&args[0], &args[1])
        })
    }

    /// The operation name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The parameter signature.
    pub fn signature(&self) -> &[Parameter] {
        &self.signature
    }

    /// The summed specificity of the signature; lower is more specific.
    pub fn scope(&self) -> u32 {
        self.scope
    }

    /// Invokes the rule body on `args`.
    pub fn invoke(&self, args: &[Node]) -> Result<Option<Node>, EvalError> {
        (self.def)(args)
    }

    /// The reversed-signature twin of a commutative binary rule, delegating
    /// to the original definition with arguments reversed. `None` when the
    /// reversal would be a no-op (non-commutative, non-binary, or an
    /// already symmetric signature).
    fn conjugate(&self) -> Option<Operation> {
        if self.signature.len() != 2
            || !attr::is_commutative(&self.name)
            || self.signature[0] == self.signature[1]
        {
            return None;
        }
        let original = Rc::clone(&self.def);
        let signature = vec![self.signature[1], self.signature[0]];
        let scope = self.scope;
        Some(Operation {
            name: self.name.clone(),
            signature,
            scope,
            def: Rc::new(move |args: &[Node]| {
                let mut reversed = args.to_vec();
                reversed.reverse();
                original(&reversed)
            }),
        })
    }
}

/// A name-keyed collection of rewrite rules, each list kept in ascending
/// scope order.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    ops: HashMap<String, Vec<Operation>>,
}

impl Registry {
    /// A registry populated with the built-in rules.
    pub fn new() -> Self {
        let mut registry = Self::default();
        builtins::install(&mut registry);
        registry
    }

    /// A registry with no rules at all.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Registers `op`, along with its conjugate when the name is
    /// commutative and the rule is binary.
    pub fn register(&mut self, op: Operation) {
        let conjugate = op.conjugate();
        let list = self.ops.entry(op.name.clone()).or_default();
        list.push(op);
        if let Some(conjugate) = conjugate {
            list.push(conjugate);
        }
        list.sort_by_key(Operation::scope);
    }

    /// Every rule named `op` whose signature accepts `args`, most specific
    /// first.
    pub fn resolve(&self, op: &str, args: &[Node]) -> Vec<&Operation> {
        let Some(candidates) = self.ops.get(op) else {
            return Vec::new();
        };

        let mut matching = Vec::new();
        'candidates: for cand in candidates {
            let expanded: Vec<Parameter> = match cand.signature.first() {
                Some(Parameter::Multivariate) => {
                    if args.len() <= 1 {
                        continue;
                    }
                    vec![Parameter::Any; args.len()]
                }
                Some(Parameter::Universal) => vec![Parameter::Any; args.len()],
                Some(Parameter::Numbers) => vec![Parameter::Number; args.len()],
                Some(Parameter::Booleans) => vec![Parameter::Bool; args.len()],
                _ => cand.signature.clone(),
            };

            if expanded.len() != args.len() {
                continue;
            }
            for (parameter, arg) in expanded.iter().zip(args) {
                if !parameter.matches(arg) {
                    continue 'candidates;
                }
            }
            matching.push(cand);
        }
        matching
    }

    /// Removes the rule with this exact name and signature.
    pub fn remove(&mut self, name: &str, signature: &[Parameter]) {
        if let Some(list) = self.ops.get_mut(name) {
            list.retain(|op| op.signature != signature);
        }
    }

    /// Removes every rule registered under `name`.
    pub fn remove_all(&mut self, name: &str) {
        self.ops.remove(name);
    }

    /// Discards everything and reinstalls the built-in rules.
    pub fn restore_default(&mut self) {
        self.ops.clear();
        builtins::install(self);
    }
}
