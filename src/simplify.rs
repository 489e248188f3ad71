//! The simplifier: recursive normalization of a tree against a [`Registry`].
//!
//! # Algorithm
//! For a term node:
//!
//! 1. a leading `$` on the name is a one-shot preserve marker: strip it and
//!    return the node unevaluated for this pass;
//! 2. unless the operation preserves its arguments, simplify every argument
//!    first;
//! 3. resolve the candidate rules for the (name, arguments) tuple and
//!    invoke them most-specific-first; the first rule that yields a value
//!    wins, and its result is itself simplified;
//! 4. when no rule fires on a commutative term with more than two
//!    operands, search the operand pairs for any junction that strictly
//!    reduces complexity, replace it, and recurse on the reduced list;
//! 5. otherwise return the term with only its arguments simplified.
//!
//! "No rule matched" is never an error; the search only accepts rewrites
//! that strictly shrink the [complexity](Node::complexity) metric, which
//! is what guarantees termination.

use log::trace;

use crate::error::EvalError;
use crate::node::{attr, Matrix, Node, Term};
use crate::registry::Registry;

/// Simplifies `node` toward its normal form under `registry`.
pub fn simplify(node: &Node, registry: &Registry) -> Result<Node, EvalError> {
    match node {
        Node::Term(term) => simplify_term(term, registry),
        Node::List(items) => Ok(Node::List(simplify_all(items, registry)?)),
        Node::Vector(items) => Ok(Node::Vector(simplify_all(items, registry)?)),
        Node::Matrix(matrix) => {
            let rows = matrix
                .rows()
                .iter()
                .map(|row| simplify_all(row, registry))
                .collect::<Result<Vec<_>, _>>()?;
            // element rewrites cannot change the validated shape
            Matrix::new(rows).map(Node::Matrix)
        }
        // a pipeline evaluates to the value of its last statement
        Node::Statements(items) => {
            let mut last = Node::Void;
            for item in items {
                last = simplify(item, registry)?;
            }
            Ok(last)
        }
        Node::Pair(pair) => Ok(Node::pair(
            simplify(&pair.0, registry)?,
            simplify(&pair.1, registry)?,
            pair.2,
        )),
        Node::Equation(eq) => Ok(Node::equation(
            simplify(&eq.0, registry)?,
            simplify(&eq.1, registry)?,
        )),
        // closure bodies stay unevaluated until applied
        Node::Closure(_) => Ok(node.clone()),
        leaf => Ok(leaf.clone()),
    }
}

fn simplify_all(items: &[Node], registry: &Registry) -> Result<Vec<Node>, EvalError> {
    items.iter().map(|n| simplify(n, registry)).collect()
}

fn simplify_term(term: &Term, registry: &Registry) -> Result<Node, EvalError> {
    // one-shot preserve marker: `$f(x)` passes through as `f(x)` so the
    // argument expression is handed over by value exactly once
    if let Some(preserved) = term.name().strip_prefix('$') {
        return Ok(Node::term(preserved.to_string(), term.args().to_vec()));
    }

    let args = if attr::preserves_arguments(term.name()) {
        term.args().to_vec()
    } else {
        simplify_all(term.args(), registry)?
    };
    // rebuilding re-normalizes commutative nesting the argument
    // simplification may have exposed
    let copy = Term::new(term.name().to_string(), args);

    for op in registry.resolve(copy.name(), copy.args()) {
        if let Some(result) = op.invoke(copy.args())? {
            trace!(
                "rule {}{:?} rewrote {} argument(s)",
                copy.name(),
                op.signature(),
                copy.count()
            );
            return simplify(&result, registry);
        }
    }

    if copy.is_commutative() && copy.count() > 2 {
        let op = copy.name().to_string();
        let args = copy.args().to_vec();
        let whole = Node::Term(copy);
        let reduced = simplify_commutatively(args, &op, registry)?;
        return Ok(if reduced.complexity() < whole.complexity() {
            reduced
        } else {
            whole
        });
    }

    Ok(Node::Term(copy))
}

/// The pairwise commutative search.
///
/// For `1 + a + (-1) + (-a)` no binary rule fires on the flat term, but
/// the junction `1 + (-1)` simplifies; this search finds such a pair,
/// folds it back into the pool, and recurses until no pair anywhere
/// strictly reduces complexity.
fn simplify_commutatively(
    mut nodes: Vec<Node>,
    op: &str,
    registry: &Registry,
) -> Result<Node, EvalError> {
    if nodes.len() == 2 {
        return simplify(&Node::term(op.to_string(), nodes), registry);
    }

    for i in 0..nodes.len() - 1 {
        let candidate = nodes.remove(i);
        for j in i..nodes.len() {
            let junction = Node::term(op.to_string(), vec![nodes[j].clone(), candidate.clone()]);
            let before = junction.complexity();
            let simplified = simplify(&junction, registry)?;

            if simplified.complexity() < before {
                trace!("commutative search reduced a pair under '{op}'");
                nodes.remove(j);
                nodes.push(simplified);
                return simplify_commutatively(nodes, op, registry);
            }
        }
        // nothing pairs with this operand; put it back and move on
        nodes.insert(i, candidate);
    }

    Ok(Node::term(op.to_string(), nodes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::name;

    fn simplified(node: Node) -> Node {
        simplify(&node, &Registry::new()).unwrap()
    }

    fn var(name: &str) -> Node {
        Node::Var(name.into())
    }

    #[test]
    fn folds_arithmetic_bottom_up() {
        // 1 + 2*3 becomes 7
        let node = Node::term(
            name::ADD,
            vec![
                Node::Int(1),
                Node::term(name::MULT, vec![Node::Int(2), Node::Int(3)]),
            ],
        );
        assert_eq!(simplified(node), Node::Int(7));
    }

    #[test]
    fn no_rule_match_returns_the_simplified_copy() {
        let node = Node::term("mystery", vec![Node::term(name::ADD, vec![1.into(), 1.into()])]);
        assert_eq!(
            simplified(node),
            Node::term("mystery", vec![Node::Int(2)])
        );
    }

    #[test]
    fn commutative_search_combines_distant_terms() {
        // a + b + a has no directly applicable binary rule, but the
        // pairwise search finds a + a
        let node = Node::term(name::ADD, vec![var("a"), var("b"), var("a")]);
        let expected = Node::term(
            name::ADD,
            vec![
                Node::term(name::MULT, vec![Node::Int(2), var("a")]),
                var("b"),
            ],
        );
        assert_eq!(simplified(node), expected);
    }

    #[test]
    fn commutative_search_cancels_across_the_pool() {
        // 1 + a + (-1) folds the numeric junction down to a
        let node = Node::term(
            name::ADD,
            vec![Node::Int(1), var("a"), Node::Int(-1)],
        );
        assert_eq!(simplified(node), var("a"));
    }

    #[test]
    fn fixed_points_are_returned_unchanged() {
        let node = Node::term(name::ADD, vec![var("a"), var("b"), var("c")]);
        let first = simplified(node.clone());
        assert_eq!(first, node);
        // idempotence
        assert_eq!(simplified(first.clone()), first);
    }

    #[test]
    fn simplification_is_idempotent_on_mixed_trees() {
        let samples = vec![
            Node::term(name::ADD, vec![var("x"), var("x"), Node::Int(2)]),
            Node::term(name::MULT, vec![var("x"), var("x")]),
            Node::term(
                name::AND,
                vec![var("p"), Node::Bool(true), var("p")],
            ),
            Node::List(vec![Node::term(name::ADD, vec![1.into(), 2.into()])]),
        ];
        for sample in samples {
            let once = simplified(sample);
            let twice = simplified(once.clone());
            assert_eq!(once, twice);
        }
    }

    #[test]
    fn preserve_once_marker_suppresses_one_pass() {
        let node = Node::term("$f", vec![Node::term(name::ADD, vec![1.into(), 1.into()])]);
        let once = simplified(node);
        // the marker is stripped and the arguments left untouched
        assert_eq!(
            once,
            Node::term("f", vec![Node::term(name::ADD, vec![1.into(), 1.into()])])
        );
        // the next pass evaluates normally
        assert_eq!(simplified(once), Node::term("f", vec![Node::Int(2)]));
    }

    #[test]
    fn preserving_operations_keep_raw_arguments() {
        let node = Node::term(
            name::DEF,
            vec![Node::equation(
                Node::term("f", vec![var("x")]),
                Node::term(name::ADD, vec![var("x"), var("x")]),
            )],
        );
        // def must not collapse x + x inside the bound body
        assert_eq!(simplified(node.clone()), node);
    }

    #[test]
    fn pipelines_evaluate_to_their_last_statement() {
        let node = Node::Statements(vec![
            Node::term(name::ADD, vec![1.into(), 1.into()]),
            Node::term(name::MULT, vec![2.into(), 3.into()]),
        ]);
        assert_eq!(simplified(node), Node::Int(6));
        assert_eq!(simplified(Node::Statements(vec![])), Node::Void);
    }

    #[test]
    fn closures_stay_unevaluated() {
        let body = Node::term(name::ADD, vec![1.into(), 1.into()]);
        let node = Node::Closure(Box::new(body.clone()));
        assert_eq!(simplified(node), Node::Closure(Box::new(body)));
    }

    #[test]
    fn rule_errors_propagate() {
        let node = Node::term(name::DIV, vec![Node::Int(1), Node::Int(0)]);
        assert!(simplify(&node, &Registry::new()).is_err());
    }

    #[test]
    fn boolean_pools_collapse() {
        let node = Node::term(
            name::AND,
            vec![var("p"), var("q"), Node::Bool(false)],
        );
        assert_eq!(simplified(node), Node::Bool(false));
    }
}
