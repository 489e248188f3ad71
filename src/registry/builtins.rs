//! The built-in rewrite rules.
//!
//! Only the rules that exercise the rewriting core live here: numeric
//! folding, identity elements, like-term/like-factor combination, boolean
//! logic, comparisons, and subscripting. Heavier numeric algorithms
//! (linear algebra, calculus, statistics) are ordinary library operations
//! registered from outside through [`Registry::register`].

use num_bigint::BigInt;
use num_traits::{One, Signed, ToPrimitive, Zero};

use super::{Operation, Parameter, Registry};
use crate::error::EvalError;
use crate::node::{name, Node};

/// Registers every built-in rule into `registry`.
pub fn install(registry: &mut Registry) {
    use Parameter as P;

    // ---- addition ----
    registry.register(Operation::new(name::ADD, vec![P::Numbers], |args| {
        fold_numeric(args, |a, b| a + b, |a, b| a + b)
    }));
    registry.register(Operation::binary(name::ADD, (P::Any, P::Number), |a, b| {
        Ok(if is_zero(b) { Some(a.clone()) } else { None })
    }));
    registry.register(Operation::binary(name::ADD, (P::Any, P::Any), |a, b| {
        combine_like_terms(a, b)
    }));

    // ---- multiplication ----
    registry.register(Operation::new(name::MULT, vec![P::Numbers], |args| {
        fold_numeric(args, |a, b| a * b, |a, b| a * b)
    }));
    registry.register(Operation::binary(name::MULT, (P::Any, P::Number), |a, b| {
        Ok(if is_one(b) {
            Some(a.clone())
        } else if is_zero(b) {
            Some(Node::Int(0))
        } else {
            None
        })
    }));
    registry.register(Operation::binary(name::MULT, (P::Any, P::Any), |a, b| {
        combine_like_factors(a, b)
    }));

    // ---- subtraction ----
    registry.register(Operation::binary(
        name::SUB,
        (P::Number, P::Number),
        |a, b| fold_numeric(&[a.clone(), b.clone()], |x, y| x - y, |x, y| x - y),
    ));
    registry.register(Operation::binary(name::SUB, (P::Any, P::Number), |a, b| {
        Ok(if is_zero(b) { Some(a.clone()) } else { None })
    }));
    registry.register(Operation::binary(name::SUB, (P::Number, P::Any), |a, b| {
        Ok(if is_zero(a) {
            Some(Node::term(name::NEGATE, vec![b.clone()]))
        } else {
            None
        })
    }));
    registry.register(Operation::binary(name::SUB, (P::Any, P::Any), |a, b| {
        Ok(if a == b { Some(Node::Int(0)) } else { None })
    }));

    // ---- division ----
    registry.register(Operation::binary(
        name::DIV,
        (P::Number, P::Number),
        |a, b| {
            if is_zero(b) {
                return Err(EvalError::Math("division by zero".into()));
            }
            if let (Some(x), Some(y)) = (as_big(a), as_big(b)) {
                if (&x % &y).is_zero() {
                    return Ok(Some(Node::from_big(x / y)));
                }
            }
            Ok(binary_float(a, b, |x, y| x / y))
        },
    ));
    registry.register(Operation::binary(name::DIV, (P::Any, P::Number), |a, b| {
        Ok(if is_one(b) { Some(a.clone()) } else { None })
    }));
    registry.register(Operation::binary(name::DIV, (P::Number, P::Any), |a, _| {
        Ok(if is_zero(a) { Some(Node::Int(0)) } else { None })
    }));
    registry.register(Operation::binary(name::DIV, (P::Any, P::Any), |a, b| {
        Ok(if a == b { Some(Node::Int(1)) } else { None })
    }));

    // ---- remainder ----
    registry.register(Operation::binary(
        name::MOD,
        (P::Number, P::Number),
        |a, b| {
            if is_zero(b) {
                return Err(EvalError::Math("remainder by zero".into()));
            }
            if let (Some(x), Some(y)) = (as_big(a), as_big(b)) {
                return Ok(Some(Node::from_big(x % y)));
            }
            Ok(binary_float(a, b, |x, y| x % y))
        },
    ));

    // ---- exponentiation ----
    registry.register(Operation::binary(
        name::POW,
        (P::Number, P::Number),
        |a, b| Ok(fold_pow(a, b)),
    ));
    registry.register(Operation::binary(name::POW, (P::Any, P::Number), |a, b| {
        Ok(if is_one(b) {
            Some(a.clone())
        } else if is_zero(b) {
            Some(Node::Int(1))
        } else {
            None
        })
    }));
    registry.register(Operation::binary(name::POW, (P::Number, P::Any), |a, _| {
        Ok(if is_one(a) { Some(Node::Int(1)) } else { None })
    }));

    // ---- unary numerics ----
    registry.register(Operation::unary(name::NEGATE, P::Number, |arg| {
        if let Some(n) = as_big(arg) {
            return Ok(Some(Node::from_big(-n)));
        }
        Ok(arg.as_f64().map(|x| Node::Float(-x)))
    }));
    registry.register(Operation::unary(name::NEGATE, P::Any, |arg| {
        Ok(match arg {
            // double negation
            Node::Term(term) if term.name() == name::NEGATE && term.count() == 1 => {
                Some(term.args()[0].clone())
            }
            _ => None,
        })
    }));
    registry.register(Operation::unary(name::SQRT, P::Number, |arg| {
        let Some(x) = arg.as_f64() else { return Ok(None) };
        if x < 0.0 {
            return Err(EvalError::Math("square root of a negative number".into()));
        }
        let root = x.sqrt();
        Ok(Some(
            if !matches!(arg, Node::Float(_)) && root.fract() == 0.0 && root <= i64::MAX as f64 {
                Node::Int(root as i64)
            } else {
                Node::Float(root)
            },
        ))
    }));
    registry.register(Operation::unary(name::FACTORIAL, P::Int, |arg| {
        let Some(n) = arg.as_int() else {
            return Err(EvalError::Math("factorial operand is too large".into()));
        };
        if n < 0 {
            return Err(EvalError::Math("factorial of a negative number".into()));
        }
        let mut product = BigInt::one();
        for k in 2..=n {
            product *= k;
        }
        Ok(Some(Node::from_big(product)))
    }));
    registry.register(Operation::unary(name::PERCENT, P::Number, |arg| {
        Ok(arg.as_f64().map(|x| Node::Float(x / 100.0)))
    }));
    registry.register(Operation::unary(name::DEGREES, P::Number, |arg| {
        Ok(arg.as_f64().map(|x| Node::Float(x.to_radians())))
    }));

    // ---- boolean logic ----
    registry.register(Operation::unary(name::NOT, P::Bool, |arg| {
        Ok(match arg {
            Node::Bool(b) => Some(Node::Bool(!b)),
            _ => None,
        })
    }));
    registry.register(Operation::unary(name::NOT, P::Any, |arg| {
        Ok(match arg {
            Node::Term(term) if term.name() == name::NOT && term.count() == 1 => {
                Some(term.args()[0].clone())
            }
            _ => None,
        })
    }));
    registry.register(Operation::new(name::AND, vec![P::Booleans], |args| {
        Ok(Some(Node::Bool(args.iter().all(|n| n == &Node::Bool(true)))))
    }));
    registry.register(Operation::binary(name::AND, (P::Any, P::Bool), |a, b| {
        Ok(match b {
            Node::Bool(true) => Some(a.clone()),
            Node::Bool(false) => Some(Node::Bool(false)),
            _ => None,
        })
    }));
    registry.register(Operation::binary(name::AND, (P::Any, P::Any), |a, b| {
        Ok(if a == b { Some(a.clone()) } else { None })
    }));
    registry.register(Operation::new(name::OR, vec![P::Booleans], |args| {
        Ok(Some(Node::Bool(args.iter().any(|n| n == &Node::Bool(true)))))
    }));
    registry.register(Operation::binary(name::OR, (P::Any, P::Bool), |a, b| {
        Ok(match b {
            Node::Bool(false) => Some(a.clone()),
            Node::Bool(true) => Some(Node::Bool(true)),
            _ => None,
        })
    }));
    registry.register(Operation::binary(name::OR, (P::Any, P::Any), |a, b| {
        Ok(if a == b { Some(a.clone()) } else { None })
    }));
    registry.register(Operation::binary(name::XOR, (P::Bool, P::Bool), |a, b| {
        Ok(Some(Node::Bool(a != b)))
    }));

    // ---- comparisons ----
    comparison(registry, name::LT, |a, b| a < b);
    comparison(registry, name::GT, |a, b| a > b);
    comparison(registry, name::LEQ, |a, b| a <= b);
    comparison(registry, name::GEQ, |a, b| a >= b);
    registry.register(Operation::binary(name::EQ, (P::Any, P::Any), |a, b| {
        Ok(if a == b {
            Some(Node::Bool(true))
        } else if a.is_number() && b.is_number() {
            Some(Node::Bool(a.as_f64() == b.as_f64()))
        } else {
            None
        })
    }));
    registry.register(Operation::binary(name::NEQ, (P::Any, P::Any), |a, b| {
        Ok(if a == b {
            Some(Node::Bool(false))
        } else if a.is_number() && b.is_number() {
            Some(Node::Bool(a.as_f64() != b.as_f64()))
        } else {
            None
        })
    }));

    // ---- subscripting and collections ----
    registry.register(Operation::binary(name::GET, (P::List, P::Int), |a, b| {
        index_elements(a, b)
    }));
    registry.register(Operation::binary(name::GET, (P::Vec, P::Int), |a, b| {
        index_elements(a, b)
    }));
    registry.register(Operation::binary(name::GET, (P::Matrix, P::Int), |a, b| {
        let (Node::Matrix(matrix), Some(index)) = (a, b.as_int()) else {
            return Ok(None);
        };
        let len = matrix.rows().len();
        match usize::try_from(index).ok().and_then(|i| matrix.rows().get(i)) {
            Some(row) => Ok(Some(Node::Vector(row.clone()))),
            None => Err(EvalError::IndexOutOfBounds { index, len }),
        }
    }));
    registry.register(Operation::unary(name::SIZE, P::Iterable, |arg| {
        Ok(match arg {
            Node::List(items) | Node::Vector(items) => Some(Node::Int(items.len() as i64)),
            Node::Matrix(matrix) => Some(Node::Int(matrix.rows().len() as i64)),
            _ => None,
        })
    }));
    registry.register(Operation::unary(name::COMPLEXITY, P::Any, |arg| {
        Ok(Some(Node::Int(arg.complexity() as i64)))
    }));
    registry.register(Operation::binary(name::CONCAT, (P::Str, P::Str), |a, b| {
        Ok(match (a, b) {
            (Node::Str(x), Node::Str(y)) => Some(Node::Str(format!("{x}{y}"))),
            _ => None,
        })
    }));
    registry.register(Operation::binary(name::APPEND, (P::List, P::List), |a, b| {
        Ok(match (a, b) {
            (Node::List(x), Node::List(y)) => {
                let mut merged = x.clone();
                merged.extend(y.iter().cloned());
                Some(Node::List(merged))
            }
            _ => None,
        })
    }));
    registry.register(Operation::binary(name::APPEND, (P::List, P::Any), |a, b| {
        Ok(match a {
            Node::List(items) => {
                let mut extended = items.clone();
                extended.push(b.clone());
                Some(Node::List(extended))
            }
            _ => None,
        })
    }));
}

/// Registers a numeric comparison rule.
fn comparison(registry: &mut Registry, op: &str, cmp: impl Fn(f64, f64) -> bool + 'static) {
    registry.register(Operation::binary(
        op,
        (Parameter::Number, Parameter::Number),
        move |a, b| match (a.as_f64(), b.as_f64()) {
            (Some(x), Some(y)) => Ok(Some(Node::Bool(cmp(x, y)))),
            _ => Ok(None),
        },
    ));
}

/// The exact integer value of a numeric leaf, if it is an integer.
fn as_big(node: &Node) -> Option<BigInt> {
    match node {
        Node::Int(n) => Some(BigInt::from(*n)),
        Node::Big(n) => Some(n.clone()),
        _ => None,
    }
}

fn is_zero(node: &Node) -> bool {
    match node {
        Node::Int(n) => *n == 0,
        Node::Big(n) => n.is_zero(),
        Node::Float(x) => *x == 0.0,
        _ => false,
    }
}

fn is_one(node: &Node) -> bool {
    match node {
        Node::Int(n) => *n == 1,
        Node::Big(n) => n.is_one(),
        Node::Float(x) => *x == 1.0,
        _ => false,
    }
}

/// Folds an all-numeric argument list: exactly in big integers when every
/// operand is an integer, otherwise in floats.
fn fold_numeric(
    args: &[Node],
    int_op: impl Fn(BigInt, BigInt) -> BigInt,
    float_op: impl Fn(f64, f64) -> f64,
) -> Result<Option<Node>, EvalError> {
    if let Some(ints) = args.iter().map(as_big).collect::<Option<Vec<_>>>() {
        let folded = ints.into_iter().reduce(int_op);
        return Ok(folded.map(Node::from_big));
    }
    let mut floats = Vec::with_capacity(args.len());
    for arg in args {
        let Some(x) = arg.as_f64() else { return Ok(None) };
        floats.push(x);
    }
    Ok(floats.into_iter().reduce(float_op).map(Node::Float))
}

fn binary_float(a: &Node, b: &Node, f: impl Fn(f64, f64) -> f64) -> Option<Node> {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => Some(Node::Float(f(x, y))),
        _ => None,
    }
}

/// Integer exponentiation stays exact for modest non-negative exponents;
/// everything else drops to floats.
fn fold_pow(a: &Node, b: &Node) -> Option<Node> {
    if let (Some(base), Some(exp)) = (as_big(a), as_big(b)) {
        if !exp.is_negative() {
            if let Some(small) = exp.to_u32().filter(|e| *e <= 65_536) {
                return Some(Node::from_big(base.pow(small)));
            }
        }
    }
    binary_float(a, b, f64::powf)
}

/// Splits a term into an integer coefficient and a residual core:
/// `3*x` is `(3, x)`, anything else is `(1, itself)`.
fn coefficient(node: &Node) -> (BigInt, Node) {
    if let Node::Term(term) = node {
        if term.name() == name::MULT {
            let mut coeff: Option<BigInt> = None;
            let mut rest: Vec<Node> = Vec::new();
            for arg in term.args() {
                match as_big(arg) {
                    Some(n) if coeff.is_none() => coeff = Some(n),
                    _ => rest.push(arg.clone()),
                }
            }
            if let (Some(c), false) = (coeff, rest.is_empty()) {
                let core = if rest.len() == 1 {
                    rest.swap_remove(0)
                } else {
                    Node::term(name::MULT, rest)
                };
                return (c, core);
            }
        }
    }
    (BigInt::one(), node.clone())
}

/// `x + x` to `2x`, `n·x + m·x` to `(n+m)·x`. Pure numbers are left to the
/// folding rule.
fn combine_like_terms(a: &Node, b: &Node) -> Result<Option<Node>, EvalError> {
    if a.is_number() && b.is_number() {
        return Ok(None);
    }
    let (ca, core_a) = coefficient(a);
    let (cb, core_b) = coefficient(b);
    if core_a != core_b || core_a.is_number() {
        return Ok(None);
    }
    let total = ca + cb;
    Ok(Some(if total.is_zero() {
        Node::Int(0)
    } else if total.is_one() {
        core_a
    } else {
        Node::term(name::MULT, vec![Node::from_big(total), core_a])
    }))
}

/// Splits a term into base and exponent: `x^n` is `(x, n)`, anything else
/// is `(itself, 1)`.
fn base_and_exponent(node: &Node) -> (Node, Node) {
    if let Node::Term(term) = node {
        if term.name() == name::POW && term.count() == 2 {
            return (term.args()[0].clone(), term.args()[1].clone());
        }
    }
    (node.clone(), Node::Int(1))
}

/// `x · x` to `x^2`, `x^n · x^m` to `x^(n+m)`. Pure numbers are left to
/// the folding rule.
fn combine_like_factors(a: &Node, b: &Node) -> Result<Option<Node>, EvalError> {
    if a.is_number() && b.is_number() {
        return Ok(None);
    }
    let (base_a, exp_a) = base_and_exponent(a);
    let (base_b, exp_b) = base_and_exponent(b);
    if base_a != base_b || base_a.is_number() {
        return Ok(None);
    }
    Ok(Some(Node::term(
        name::POW,
        vec![base_a, Node::term(name::ADD, vec![exp_a, exp_b])],
    )))
}

/// Bounds-checked zero-based element access for lists and vectors.
fn index_elements(collection: &Node, subscript: &Node) -> Result<Option<Node>, EvalError> {
    let (Node::List(items) | Node::Vector(items), Some(index)) =
        (collection, subscript.as_int())
    else {
        return Ok(None);
    };
    match usize::try_from(index).ok().and_then(|i| items.get(i)) {
        Some(element) => Ok(Some(element.clone())),
        None => Err(EvalError::IndexOutOfBounds {
            index,
            len: items.len(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn invoke(registry: &Registry, op: &str, args: &[Node]) -> Result<Option<Node>, EvalError> {
        for candidate in registry.resolve(op, args) {
            if let Some(result) = candidate.invoke(args)? {
                return Ok(Some(result));
            }
        }
        Ok(None)
    }

    #[test]
    fn numeric_folding_stays_exact_for_integers() {
        let registry = Registry::new();
        assert_eq!(
            invoke(&registry, name::ADD, &[Node::Int(2), Node::Int(3)]).unwrap(),
            Some(Node::Int(5))
        );
        assert_eq!(
            invoke(&registry, name::MULT, &[Node::Int(4), Node::Float(0.5)]).unwrap(),
            Some(Node::Float(2.0))
        );
        // overflow promotes instead of wrapping
        let huge = invoke(
            &registry,
            name::MULT,
            &[Node::Int(i64::MAX), Node::Int(i64::MAX)],
        )
        .unwrap()
        .unwrap();
        assert!(matches!(huge, Node::Big(_)));
    }

    #[test]
    fn division_is_exact_only_when_it_divides() {
        let registry = Registry::new();
        assert_eq!(
            invoke(&registry, name::DIV, &[Node::Int(6), Node::Int(3)]).unwrap(),
            Some(Node::Int(2))
        );
        assert_eq!(
            invoke(&registry, name::DIV, &[Node::Int(1), Node::Int(2)]).unwrap(),
            Some(Node::Float(0.5))
        );
        assert!(invoke(&registry, name::DIV, &[Node::Int(1), Node::Int(0)]).is_err());
    }

    #[test]
    fn identity_elements_apply_from_either_side() {
        let registry = Registry::new();
        let x = Node::Var("x".into());
        // x + 0 directly, 0 + x through the conjugate
        assert_eq!(
            invoke(&registry, name::ADD, &[x.clone(), Node::Int(0)]).unwrap(),
            Some(x.clone())
        );
        assert_eq!(
            invoke(&registry, name::ADD, &[Node::Int(0), x.clone()]).unwrap(),
            Some(x.clone())
        );
        assert_eq!(
            invoke(&registry, name::MULT, &[Node::Int(0), x.clone()]).unwrap(),
            Some(Node::Int(0))
        );
        assert_eq!(
            invoke(&registry, name::POW, &[x.clone(), Node::Int(1)]).unwrap(),
            Some(x)
        );
    }

    #[test]
    fn like_terms_and_factors_combine() {
        let x = Node::Var("x".into());
        let (c, core) = coefficient(&Node::term(name::MULT, vec![Node::Int(3), x.clone()]));
        assert_eq!(c, BigInt::from(3));
        assert_eq!(core, x);

        let registry = Registry::new();
        let combined = invoke(&registry, name::ADD, &[x.clone(), x.clone()])
            .unwrap()
            .unwrap();
        assert_eq!(combined, Node::term(name::MULT, vec![Node::Int(2), x.clone()]));

        let squared = invoke(&registry, name::MULT, &[x.clone(), x.clone()])
            .unwrap()
            .unwrap();
        assert_eq!(
            squared,
            Node::term(
                name::POW,
                vec![x, Node::term(name::ADD, vec![Node::Int(1), Node::Int(1)])]
            )
        );
    }

    #[test]
    fn factorial_and_sqrt_guard_their_domains() {
        let registry = Registry::new();
        assert_eq!(
            invoke(&registry, name::FACTORIAL, &[Node::Int(5)]).unwrap(),
            Some(Node::Int(120))
        );
        assert!(invoke(&registry, name::FACTORIAL, &[Node::Int(-1)]).is_err());

        assert_eq!(
            invoke(&registry, name::SQRT, &[Node::Int(16)]).unwrap(),
            Some(Node::Int(4))
        );
        assert_eq!(
            invoke(&registry, name::SQRT, &[Node::Int(2)]).unwrap(),
            Some(Node::Float(2.0_f64.sqrt()))
        );
        assert!(invoke(&registry, name::SQRT, &[Node::Int(-4)]).is_err());
    }

    #[test]
    fn boolean_rules() {
        let registry = Registry::new();
        let p = Node::Var("p".into());
        assert_eq!(
            invoke(
                &registry,
                name::AND,
                &[Node::Bool(true), Node::Bool(true), Node::Bool(false)]
            )
            .unwrap(),
            Some(Node::Bool(false))
        );
        assert_eq!(
            invoke(&registry, name::AND, &[p.clone(), Node::Bool(true)]).unwrap(),
            Some(p.clone())
        );
        assert_eq!(
            invoke(&registry, name::OR, &[Node::Bool(true), p.clone()]).unwrap(),
            Some(Node::Bool(true))
        );
        assert_eq!(
            invoke(&registry, name::NOT, &[Node::Bool(true)]).unwrap(),
            Some(Node::Bool(false))
        );
        // symbolic conjunction of identical operands collapses
        assert_eq!(
            invoke(&registry, name::AND, &[p.clone(), p.clone()]).unwrap(),
            Some(p)
        );
    }

    #[test]
    fn subscripts_are_bounds_checked() {
        let registry = Registry::new();
        let list = Node::List(vec![Node::Int(10), Node::Int(20)]);
        assert_eq!(
            invoke(&registry, name::GET, &[list.clone(), Node::Int(1)]).unwrap(),
            Some(Node::Int(20))
        );
        assert_eq!(
            invoke(&registry, name::GET, &[list, Node::Int(2)]).unwrap_err(),
            EvalError::IndexOutOfBounds { index: 2, len: 2 }
        );
    }
}
