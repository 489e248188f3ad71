//! The symbolic tree: the closed set of node variants produced by
//! compilation and consumed by the rewriter.
//!
//! Trees are persistent values; every "mutation" builds a new tree.
//! Commutative terms flatten their same-named children at construction,
//! so `+(d, +(+(a, b), c))` is stored as `+(a, b, c, d)` (in argument
//! order `d, a, b, c`; commutative equality ignores the order anyway).

use num_bigint::BigInt;
use num_traits::ToPrimitive;

/// Canonical operation names used across the compiler and the registry.
pub mod name {
    /// Addition, `+`.
    pub const ADD: &str = "add";
    /// Subtraction, `-`.
    pub const SUB: &str = "sub";
    /// Unary negation, prefix `-`.
    pub const NEGATE: &str = "negate";
    /// Multiplication, `*`.
    pub const MULT: &str = "mult";
    /// Division, `/`.
    pub const DIV: &str = "div";
    /// Remainder, `%`.
    pub const MOD: &str = "mod";
    /// Exponentiation, `^`.
    pub const POW: &str = "pow";
    /// Square root, prefix `√`.
    pub const SQRT: &str = "sqrt";
    /// Factorial, postfix `!`.
    pub const FACTORIAL: &str = "factorial";
    /// Percent, postfix `%`.
    pub const PERCENT: &str = "percent";
    /// Degree-to-radian conversion, postfix `°`.
    pub const DEGREES: &str = "degrees";
    /// Logical negation, prefix `!`.
    pub const NOT: &str = "not";
    /// Logical conjunction, `&&`.
    pub const AND: &str = "and";
    /// Logical disjunction, `||`.
    pub const OR: &str = "or";
    /// Exclusive disjunction, `^^`.
    pub const XOR: &str = "xor";
    /// Value equality test, `==`.
    pub const EQ: &str = "eq";
    /// Value inequality test, `!=`.
    pub const NEQ: &str = "neq";
    /// Less-than, `<`.
    pub const LT: &str = "lt";
    /// Greater-than, `>`.
    pub const GT: &str = "gt";
    /// Less-than-or-equal, `<=`.
    pub const LEQ: &str = "leq";
    /// Greater-than-or-equal, `>=`.
    pub const GEQ: &str = "geq";
    /// Subscript access, `::` or `a[i]`.
    pub const GET: &str = "get";
    /// Collection length.
    pub const SIZE: &str = "size";
    /// The structural size metric, exposed as an operation.
    pub const COMPLEXITY: &str = "complexity";
    /// List construction; `{a, b}` desugars to this.
    pub const LIST: &str = "list";
    /// The closure marker; `f(x){body}` desugars to `f(x, #(body))`.
    pub const CLOSURE: &str = "#";
    /// Pair construction, `:`.
    pub const PAIR: &str = "pair";
    /// String/value concatenation, `&`.
    pub const CONCAT: &str = "concat";
    /// List append, `++`.
    pub const APPEND: &str = "append";
    /// The equation operator, `=`.
    pub const EQUATES: &str = "equates";
    /// Definition binding.
    pub const DEF: &str = "def";
    /// Branch binding.
    pub const ELSE: &str = "else";
    /// Prefix-syntax declaration.
    pub const PREFIX: &str = "prefix";
    /// Infix-syntax declaration.
    pub const INFIX: &str = "infix";
    /// Postfix-syntax declaration.
    pub const POSTFIX: &str = "postfix";
    /// Automatic syntax declaration.
    pub const AUTO: &str = "auto";
    /// Loop continuation.
    pub const CONTINUE: &str = "continue";
    /// Loop exit.
    pub const BREAK: &str = "break";
}

/// Operator attributes derived from the operation name.
///
/// These are properties of the *name*, fixed when a [`Term`] is
/// constructed, so the node model stays free of registry state.
pub mod attr {
    use super::name;

    /// Whether terms with this name ignore argument order.
    pub fn is_commutative(op: &str) -> bool {
        matches!(
            op,
            name::ADD | name::MULT | name::AND | name::OR | name::XOR | name::EQ | name::NEQ
        )
    }

    /// Whether the simplifier must leave this operation's arguments
    /// unevaluated (e.g. a symbolic binder).
    pub fn preserves_arguments(op: &str) -> bool {
        matches!(op, name::DEF | name::PREFIX | name::INFIX | name::POSTFIX | name::AUTO)
    }

    /// Whether the operation distributes over its own kind only on the
    /// left, which forces parentheses around right children when printing
    /// (`a - (b + c)`).
    pub fn is_forward_commutative(op: &str) -> bool {
        matches!(op, name::SUB | name::DIV)
    }

    /// Whether a bare `name { ... }` block attaches a trailing closure
    /// without an argument list.
    pub fn has_implicit_trailing_closure(op: &str) -> bool {
        matches!(op, "repeat" | "while" | "loop" | "try")
    }
}

/// A named symbolic constant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Constant {
    /// The circle constant π.
    Pi,
    /// Euler's number.
    E,
    /// The golden ratio.
    Phi,
    /// Positive infinity.
    Inf,
}

impl Constant {
    /// Resolves a constant from its literal spelling.
    pub fn parse(literal: &str) -> Option<Self> {
        Some(match literal {
            "pi" | "π" => Constant::Pi,
            "e" => Constant::E,
            "phi" => Constant::Phi,
            "inf" => Constant::Inf,
            _ => return None,
        })
    }

    /// The canonical spelling.
    pub fn as_str(&self) -> &'static str {
        match self {
            Constant::Pi => "pi",
            Constant::E => "e",
            Constant::Phi => "phi",
            Constant::Inf => "inf",
        }
    }

    /// The numeric value, used only inside numeric rules.
    pub fn value(&self) -> f64 {
        match self {
            Constant::Pi => std::f64::consts::PI,
            Constant::E => std::f64::consts::E,
            Constant::Phi => (1.0 + 5.0_f64.sqrt()) / 2.0,
            Constant::Inf => f64::INFINITY,
        }
    }
}

/// A type tag literal, written `@name` in source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeTag {
    /// Any numeric leaf.
    Number,
    /// An exact machine integer.
    Int,
    /// A floating value.
    Float,
    /// A boolean.
    Bool,
    /// A string.
    String,
    /// A variable.
    Variable,
    /// A named constant.
    Constant,
    /// A list.
    List,
    /// A vector.
    Vector,
    /// A matrix.
    Matrix,
    /// An equation.
    Equation,
    /// A pair.
    Pair,
    /// A closure.
    Closure,
    /// A term (function application).
    Function,
    /// A type tag itself.
    Type,
    /// Any node at all.
    Node,
}

impl TypeTag {
    /// Resolves a tag from its literal spelling (without the `@`).
    pub fn parse(literal: &str) -> Option<Self> {
        Some(match literal {
            "number" => TypeTag::Number,
            "int" => TypeTag::Int,
            "float" => TypeTag::Float,
            "bool" => TypeTag::Bool,
            "string" => TypeTag::String,
            "variable" => TypeTag::Variable,
            "constant" => TypeTag::Constant,
            "list" => TypeTag::List,
            "vector" => TypeTag::Vector,
            "matrix" => TypeTag::Matrix,
            "equation" => TypeTag::Equation,
            "pair" => TypeTag::Pair,
            "closure" => TypeTag::Closure,
            "function" => TypeTag::Function,
            "type" => TypeTag::Type,
            "node" => TypeTag::Node,
            _ => return None,
        })
    }

    /// The canonical spelling (without the `@`).
    pub fn as_str(&self) -> &'static str {
        match self {
            TypeTag::Number => "number",
            TypeTag::Int => "int",
            TypeTag::Float => "float",
            TypeTag::Bool => "bool",
            TypeTag::String => "string",
            TypeTag::Variable => "variable",
            TypeTag::Constant => "constant",
            TypeTag::List => "list",
            TypeTag::Vector => "vector",
            TypeTag::Matrix => "matrix",
            TypeTag::Equation => "equation",
            TypeTag::Pair => "pair",
            TypeTag::Closure => "closure",
            TypeTag::Function => "function",
            TypeTag::Type => "type",
            TypeTag::Node => "node",
        }
    }

    /// The tag describing `node`.
    pub fn of(node: &Node) -> TypeTag {
        match node {
            Node::Int(_) | Node::Big(_) => TypeTag::Int,
            Node::Float(_) => TypeTag::Float,
            Node::Bool(_) => TypeTag::Bool,
            Node::Str(_) => TypeTag::String,
            Node::Var(_) => TypeTag::Variable,
            Node::Const(_) => TypeTag::Constant,
            Node::Type(_) => TypeTag::Type,
            Node::List(_) => TypeTag::List,
            Node::Vector(_) => TypeTag::Vector,
            Node::Matrix(_) => TypeTag::Matrix,
            Node::Equation(_) => TypeTag::Equation,
            Node::Pair(_) => TypeTag::Pair,
            Node::Closure(_) => TypeTag::Closure,
            Node::Term(_) => TypeTag::Function,
            Node::Statements(_) | Node::Void => TypeTag::Node,
        }
    }
}

/// The preposition tag carried by a [`Pair`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Preposition {
    /// The glyph form `a : b`.
    Colon,
    /// `a of b`.
    Of,
    /// `a to b`.
    To,
    /// `a from b`.
    From,
    /// `a in b`.
    In,
    /// `a at b`.
    At,
}

impl Preposition {
    /// Resolves a word-form preposition.
    pub fn parse(word: &str) -> Option<Self> {
        Some(match word {
            "of" => Preposition::Of,
            "to" => Preposition::To,
            "from" => Preposition::From,
            "in" => Preposition::In,
            "at" => Preposition::At,
            _ => return None,
        })
    }

    /// The source spelling.
    pub fn as_str(&self) -> &'static str {
        match self {
            Preposition::Colon => ":",
            Preposition::Of => "of",
            Preposition::To => "to",
            Preposition::From => "from",
            Preposition::In => "in",
            Preposition::At => "at",
        }
    }
}

/// A named operator applied to an ordered argument list; the primary
/// rewritable unit.
#[derive(Debug, Clone)]
pub struct Term {
    /// The canonical operation name.
    name: String,
    /// The ordered arguments.
    args: Vec<Node>,
    /// Whether argument order is ignored; derived from the name at
    /// construction.
    commutative: bool,
}

impl Term {
    /// Builds a term, flattening nested same-named commutative children.
    pub fn new(op: impl Into<String>, args: Vec<Node>) -> Self {
        let op = op.into();
        let commutative = attr::is_commutative(&op);
        let args = if commutative {
            let mut flat = Vec::with_capacity(args.len());
            for arg in args {
                match arg {
                    Node::Term(inner) if inner.name == op => flat.extend(inner.args),
                    other => flat.push(other),
                }
            }
            flat
        } else {
            args
        };
        Self {
            name: op,
            args,
            commutative,
        }
    }

    /// The operation name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The ordered arguments.
    pub fn args(&self) -> &[Node] {
        &self.args
    }

    /// The number of arguments.
    pub fn count(&self) -> usize {
        self.args.len()
    }

    /// Whether this term ignores argument order.
    pub fn is_commutative(&self) -> bool {
        self.commutative
    }

    /// Consumes `self`, yielding its name and arguments.
    pub fn into_parts(self) -> (String, Vec<Node>) {
        (self.name, self.args)
    }
}

impl PartialEq for Term {
    fn eq(&self, other: &Self) -> bool {
        if self.name != other.name || self.args.len() != other.args.len() {
            return false;
        }
        if !self.commutative {
            return self.args == other.args;
        }

        // commutative terms compare as multisets
        let mut used = vec![false; other.args.len()];
        'outer: for arg in &self.args {
            for (slot, candidate) in other.args.iter().enumerate() {
                if !used[slot] && arg == candidate {
                    used[slot] = true;
                    continue 'outer;
                }
            }
            return false;
        }
        true
    }
}

/// A rectangular matrix of nodes, stored as rows.
#[derive(Debug, Clone, PartialEq)]
pub struct Matrix {
    rows: Vec<Vec<Node>>,
    cols: usize,
}

impl Matrix {
    /// Builds a matrix from rows, rejecting empty and ragged input.
    pub fn new(rows: Vec<Vec<Node>>) -> Result<Self, crate::error::EvalError> {
        let cols = rows.first().map(Vec::len).unwrap_or(0);
        if rows.is_empty() || cols == 0 {
            return Err(crate::error::EvalError::DimensionMismatch);
        }
        if rows.iter().any(|row| row.len() != cols) {
            return Err(crate::error::EvalError::DimensionMismatch);
        }
        Ok(Self { rows, cols })
    }

    /// The rows of the matrix.
    pub fn rows(&self) -> &[Vec<Node>] {
        &self.rows
    }

    /// The `(rows, cols)` dimension pair.
    pub fn dim(&self) -> (usize, usize) {
        (self.rows.len(), self.cols)
    }

    /// Whether the matrix is square.
    pub fn is_square(&self) -> bool {
        self.rows.len() == self.cols
    }
}

/// A value of the symbolic-tree variant type.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// An exact machine integer.
    Int(i64),
    /// An arbitrary-precision integer.
    Big(BigInt),
    /// A floating value.
    Float(f64),
    /// A boolean literal.
    Bool(bool),
    /// A string literal.
    Str(String),
    /// A free variable.
    Var(String),
    /// A named symbolic constant.
    Const(Constant),
    /// A type tag literal.
    Type(TypeTag),
    /// The unit value, written `()`.
    Void,
    /// A named operator applied to arguments.
    Term(Term),
    /// An ordered list, written `{a, b}`.
    List(Vec<Node>),
    /// A vector, written `[a, b]`.
    Vector(Vec<Node>),
    /// A rectangular matrix, written `[[a, b], [c, d]]`.
    Matrix(Matrix),
    /// A tagged two-element pair, e.g. `1 of x`.
    Pair(Box<(Node, Node, Preposition)>),
    /// An equation `lhs = rhs`.
    Equation(Box<(Node, Node)>),
    /// An unevaluated body, written `#(body)`.
    Closure(Box<Node>),
    /// A `;`-separated statement pipeline.
    Statements(Vec<Node>),
}

impl Node {
    /// Convenience constructor for a [`Term`] node.
    pub fn term(op: impl Into<String>, args: Vec<Node>) -> Self {
        Node::Term(Term::new(op, args))
    }

    /// Convenience constructor for a [`Pair`](Node::Pair) node.
    pub fn pair(left: Node, right: Node, preposition: Preposition) -> Self {
        Node::Pair(Box::new((left, right, preposition)))
    }

    /// Convenience constructor for an [`Equation`](Node::Equation) node.
    pub fn equation(lhs: Node, rhs: Node) -> Self {
        Node::Equation(Box::new((lhs, rhs)))
    }

    /// Normalizes a big integer, demoting it to [`Node::Int`] when it fits.
    pub fn from_big(value: BigInt) -> Self {
        match value.to_i64() {
            Some(small) => Node::Int(small),
            None => Node::Big(value),
        }
    }

    /// Whether this node is a numeric leaf.
    pub fn is_number(&self) -> bool {
        matches!(self, Node::Int(_) | Node::Big(_) | Node::Float(_))
    }

    /// The numeric value of this leaf, if it has one.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Node::Int(n) => Some(*n as f64),
            Node::Big(n) => n.to_f64(),
            Node::Float(x) => Some(*x),
            _ => None,
        }
    }

    /// The exact integer value of this leaf, if it is one.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Node::Int(n) => Some(*n),
            Node::Big(n) => n.to_i64(),
            _ => None,
        }
    }

    /// The recursively-defined structural size of this tree, used as the
    /// simplification progress measure. Variables weigh more than numeric
    /// leaves so that like-term combination (`x + x` to `2x`) registers as
    /// a strict decrease.
    pub fn complexity(&self) -> usize {
        match self {
            Node::Int(_) | Node::Big(_) | Node::Float(_) | Node::Bool(_) | Node::Void => 1,
            Node::Str(_) | Node::Type(_) => 2,
            Node::Var(_) | Node::Const(_) => 3,
            Node::Term(term) => 1 + term.args.iter().map(Node::complexity).sum::<usize>(),
            Node::List(items) | Node::Vector(items) | Node::Statements(items) => {
                1 + items.iter().map(Node::complexity).sum::<usize>()
            }
            Node::Matrix(matrix) => {
                1 + matrix
                    .rows
                    .iter()
                    .flatten()
                    .map(Node::complexity)
                    .sum::<usize>()
            }
            Node::Pair(pair) => 1 + pair.0.complexity() + pair.1.complexity(),
            Node::Equation(eq) => 1 + eq.0.complexity() + eq.1.complexity(),
            Node::Closure(body) => 1 + body.complexity(),
        }
    }

    /// Whether `pred` holds for this node or any descendant within
    /// `depth` levels (depth 0 checks only `self`).
    pub fn contains(&self, pred: &dyn Fn(&Node) -> bool, depth: usize) -> bool {
        if pred(self) {
            return true;
        }
        if depth == 0 {
            return false;
        }
        let below = |items: &[Node]| items.iter().any(|n| n.contains(pred, depth - 1));
        match self {
            Node::Term(term) => below(&term.args),
            Node::List(items) | Node::Vector(items) | Node::Statements(items) => below(items),
            Node::Matrix(matrix) => matrix
                .rows
                .iter()
                .flatten()
                .any(|n| n.contains(pred, depth - 1)),
            Node::Pair(pair) => {
                pair.0.contains(pred, depth - 1) || pair.1.contains(pred, depth - 1)
            }
            Node::Equation(eq) => {
                eq.0.contains(pred, depth - 1) || eq.1.contains(pred, depth - 1)
            }
            Node::Closure(body) => body.contains(pred, depth - 1),
            _ => false,
        }
    }

    /// Rebuilds this tree bottom-up, applying `f` to every node after its
    /// children have been rebuilt. Terms are reconstructed through
    /// [`Term::new`], so commutative flattening is re-normalized.
    pub fn transform<E>(
        self,
        f: &mut impl FnMut(Node) -> Result<Node, E>,
    ) -> Result<Node, E> {
        let rebuilt = match self {
            Node::Term(term) => {
                let (op, args) = term.into_parts();
                let args = args
                    .into_iter()
                    .map(|arg| arg.transform(f))
                    .collect::<Result<Vec<_>, E>>()?;
                Node::term(op, args)
            }
            Node::List(items) => Node::List(
                items
                    .into_iter()
                    .map(|n| n.transform(f))
                    .collect::<Result<_, E>>()?,
            ),
            Node::Vector(items) => Node::Vector(
                items
                    .into_iter()
                    .map(|n| n.transform(f))
                    .collect::<Result<_, E>>()?,
            ),
            Node::Statements(items) => Node::Statements(
                items
                    .into_iter()
                    .map(|n| n.transform(f))
                    .collect::<Result<_, E>>()?,
            ),
            Node::Matrix(matrix) => {
                let mut rows = Vec::with_capacity(matrix.rows.len());
                for row in matrix.rows {
                    rows.push(
                        row.into_iter()
                            .map(|n| n.transform(f))
                            .collect::<Result<Vec<_>, E>>()?,
                    );
                }
                // dimensions were validated at construction and element
                // rewrites cannot change them
                Node::Matrix(Matrix {
                    cols: rows[0].len(),
                    rows,
                })
            }
            Node::Pair(pair) => {
                let (left, right, prep) = *pair;
                Node::pair(left.transform(f)?, right.transform(f)?, prep)
            }
            Node::Equation(eq) => {
                let (lhs, rhs) = *eq;
                Node::equation(lhs.transform(f)?, rhs.transform(f)?)
            }
            Node::Closure(body) => Node::Closure(Box::new(body.transform(f)?)),
            leaf => leaf,
        };
        f(rebuilt)
    }

    /// Visits every node in the tree, parents before children.
    pub fn for_each(&self, f: &mut impl FnMut(&Node)) {
        f(self);
        match self {
            Node::Term(term) => term.args.iter().for_each(|n| n.for_each(f)),
            Node::List(items) | Node::Vector(items) | Node::Statements(items) => {
                items.iter().for_each(|n| n.for_each(f))
            }
            Node::Matrix(matrix) => matrix.rows.iter().flatten().for_each(|n| n.for_each(f)),
            Node::Pair(pair) => {
                pair.0.for_each(f);
                pair.1.for_each(f);
            }
            Node::Equation(eq) => {
                eq.0.for_each(f);
                eq.1.for_each(f);
            }
            Node::Closure(body) => body.for_each(f),
            _ => {}
        }
    }
}

impl From<i64> for Node {
    fn from(value: i64) -> Self {
        Node::Int(value)
    }
}

impl From<f64> for Node {
    fn from(value: f64) -> Self {
        Node::Float(value)
    }
}

impl From<bool> for Node {
    fn from(value: bool) -> Self {
        Node::Bool(value)
    }
}

impl From<&str> for Node {
    fn from(value: &str) -> Self {
        Node::Var(value.into())
    }
}
