//! Keyword definitions: fixity, precedence classes, and operator glyphs.
//!
//! The [`SyntaxTable`] is consulted by both the lexer (which glyphs exist)
//! and the parser (how tightly they bind, and in which positions they are
//! legal). It is also what the `prefix`/`infix`/`postfix`/`auto` language
//! forms extend at compile time, so a table is plain mutable state owned by
//! a [`Context`](crate::compiler::Context) rather than a process-wide global.

use std::collections::HashMap;

use crate::error::CompileError;

/// The position a keyword occupies relative to its operands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Fixity {
    /// Written before a single operand, e.g. `-x`.
    Prefix,
    /// Written between two operands, e.g. `a + b`.
    Infix,
    /// Written after a single operand, e.g. `n!`.
    Postfix,
}

impl std::fmt::Display for Fixity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Fixity::Prefix => "prefix",
            Fixity::Infix => "infix",
            Fixity::Postfix => "postfix",
        })
    }
}

/// Precedence classes, from loosest-binding to tightest-binding.
///
/// The derived [`Ord`] is the binding order: a class listed later binds more
/// tightly. All infix operators are left-associative; a prefix operator's
/// operand is parsed at the operator's own class, so `-x^2` reads as
/// `-(x^2)` while `-x*y` reads as `(-x)*y`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Precedence {
    /// `else` binding.
    Binding,
    /// `:=`, `+=`, and friends, along with `def`.
    Assignment,
    /// The equation operator `=`.
    Equation,
    /// The ternary conditional `?`.
    Conditional,
    /// The pair operator `:` (binds tighter than `?` so `a ? b : c`
    /// captures `b : c` as the branch pair).
    Pair,
    /// Logical disjunction `||`.
    Or,
    /// Exclusive disjunction `^^`.
    Xor,
    /// Joint denial `!|`.
    Nor,
    /// Logical conjunction `&&`.
    And,
    /// Alternative denial `!&`.
    Nand,
    /// `==` and `!=`.
    Equality,
    /// `<`, `>`, `<=`, `>=`.
    Relational,
    /// Concatenation: `&` and list append `++`.
    Concat,
    /// The repetition operator `...`.
    Repeat,
    /// The default class for word-form binary operators (`npr`, `map`, ...).
    Binary,
    /// `+` and `-`.
    Addition,
    /// `*`, `/`, `%`, and the vector products.
    Scaling,
    /// The default class for word-form and glyph unary prefixes (`-x`, `√x`).
    Prefix,
    /// Exponentiation `^`.
    Exponent,
    /// Type coercion `!!` and type query `??`.
    Coercion,
    /// The derivative operator `'`.
    Derivative,
    /// Commands that swallow one tight operand: `print`, `return`, `run`, ...
    PrefixCommand,
    /// Subscript access `::`.
    Subscript,
}

impl Precedence {
    /// The numeric binding power of this class. Gaps are left between
    /// classes so the parser can ask for "just tighter than" a class.
    pub(crate) fn power(self) -> u8 {
        (self as u8 + 1) * 2
    }
}

/// How an operator glyph is spaced when stringified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Padding {
    /// Spaces on both sides, e.g. `a + b`.
    #[default]
    BothSides,
    /// A space only after the glyph, e.g. `a++ `.
    RightSide,
    /// No spaces, e.g. `a!`.
    None,
}

/// An operator glyph together with its stringification spacing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operator {
    /// The literal glyph, e.g. `"+"` or `">="`.
    pub glyph: String,
    /// Spacing applied when pretty-printing.
    pub padding: Padding,
}

impl Operator {
    /// An operator with the default (both-sides) padding.
    pub fn new(glyph: &str) -> Self {
        Self {
            glyph: glyph.into(),
            padding: Padding::BothSides,
        }
    }

    /// An operator with explicit padding.
    pub fn padded(glyph: &str, padding: Padding) -> Self {
        Self {
            glyph: glyph.into(),
            padding,
        }
    }
}

/// A single syntax definition: a canonical operation name bound to a
/// fixity, a precedence class, and an optional operator glyph.
#[derive(Debug, Clone, PartialEq)]
pub struct Keyword {
    /// The canonical operation name, e.g. `"add"`.
    pub name: String,
    /// Where the keyword sits relative to its operands.
    pub fixity: Fixity,
    /// How tightly the keyword binds.
    pub precedence: Precedence,
    /// The glyph form, if the keyword has one; word-form keywords
    /// (e.g. `and` written out) have none... the *name* is their spelling.
    pub operator: Option<Operator>,
}

impl Keyword {
    fn new(
        name: &str,
        fixity: Fixity,
        precedence: Option<Precedence>,
        operator: Option<Operator>,
    ) -> Self {
        // infix and postfix keywords default to the generic binary class,
        // prefixes to the tight unary class
        let precedence = precedence.unwrap_or(match fixity {
            Fixity::Prefix => Precedence::Prefix,
            Fixity::Infix | Fixity::Postfix => Precedence::Binary,
        });
        Self {
            name: name.into(),
            fixity,
            precedence,
            operator,
        }
    }

    /// The source spelling of this keyword: its glyph if it has one,
    /// otherwise its name.
    pub fn spelling(&self) -> &str {
        self.operator
            .as_ref()
            .map(|op| op.glyph.as_str())
            .unwrap_or(&self.name)
    }
}

/// The registry of every [`Keyword`] known to a compilation context.
#[derive(Debug, Clone)]
pub struct SyntaxTable {
    /// Keywords by canonical name.
    by_name: HashMap<String, Keyword>,
    /// Names of the keywords sharing each glyph.
    by_glyph: HashMap<String, Vec<String>>,
    /// Every registered glyph, longest first, so the lexer can match
    /// greedily ("compilation priority").
    glyphs: Vec<String>,
}

impl Default for SyntaxTable {
    fn default() -> Self {
        let mut table = Self {
            by_name: HashMap::new(),
            by_glyph: HashMap::new(),
            glyphs: Vec::new(),
        };
        table.install_defaults();
        table
    }
}

impl SyntaxTable {
    /// A table populated with the built-in definitions.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a keyword.
    ///
    /// Fails with [`CompileError::DuplicateKeyword`] if `name` is already
    /// defined, or if the glyph is already claimed by a keyword of the same
    /// fixity. A glyph *may* be shared across fixities; that is the
    /// sanctioned ambiguous-operator pattern (`!` is both `not` and
    /// `factorial`), resolved positionally by the parser.
    pub fn define(
        &mut self,
        name: &str,
        fixity: Fixity,
        precedence: Option<Precedence>,
        operator: Option<Operator>,
    ) -> Result<(), CompileError> {
        if self.by_name.contains_key(name) {
            return Err(CompileError::DuplicateKeyword(name.into()));
        }
        if let Some(op) = &operator {
            let collision = self
                .candidates(&op.glyph)
                .iter()
                .any(|kw| kw.fixity == fixity);
            if collision {
                return Err(CompileError::DuplicateKeyword(name.into()));
            }
        }

        let keyword = Keyword::new(name, fixity, precedence, operator);
        if let Some(op) = &keyword.operator {
            self.by_glyph
                .entry(op.glyph.clone())
                .or_default()
                .push(keyword.name.clone());
            if !self.glyphs.contains(&op.glyph) {
                self.glyphs.push(op.glyph.clone());
                self.glyphs.sort_by(|a, b| b.len().cmp(&a.len()));
            }
        }
        self.by_name.insert(keyword.name.clone(), keyword);
        Ok(())
    }

    /// Looks up a keyword by its canonical name.
    pub fn lookup(&self, name: &str) -> Option<&Keyword> {
        self.by_name.get(name)
    }

    /// Every keyword spelled with `glyph`, across all fixities.
    pub fn candidates(&self, glyph: &str) -> Vec<&Keyword> {
        self.by_glyph
            .get(glyph)
            .map(|names| names.iter().filter_map(|n| self.by_name.get(n)).collect())
            .unwrap_or_default()
    }

    /// The keyword spelled with `glyph` at the given fixity, if any.
    pub fn candidate(&self, glyph: &str, fixity: Fixity) -> Option<&Keyword> {
        self.candidates(glyph)
            .into_iter()
            .find(|kw| kw.fixity == fixity)
    }

    /// Glyphs shared by more than one keyword, keyed by glyph.
    pub fn ambiguous_operators(&self, glyph: &str) -> Vec<&Keyword> {
        let candidates = self.candidates(glyph);
        if candidates.len() > 1 {
            candidates
        } else {
            Vec::new()
        }
    }

    /// Every registered glyph, longest first.
    pub fn glyphs(&self) -> &[String] {
        &self.glyphs
    }

    /// Discards every runtime definition and reinstalls the built-in table.
    pub fn restore_default(&mut self) {
        self.by_name.clear();
        self.by_glyph.clear();
        self.glyphs.clear();
        self.install_defaults();
    }

    fn install_defaults(&mut self) {
        use Fixity::{Infix, Postfix, Prefix};
        use Padding::{None as NoPad, RightSide};
        use Precedence as P;

        let defs: &[(&str, Fixity, Option<P>, Option<Operator>)] = &[
            // arithmetic
            ("add", Infix, Some(P::Addition), Some(Operator::new("+"))),
            ("sub", Infix, Some(P::Addition), Some(Operator::new("-"))),
            ("negate", Prefix, None, Some(Operator::padded("-", NoPad))),
            ("mult", Infix, Some(P::Scaling), Some(Operator::new("*"))),
            ("div", Infix, Some(P::Scaling), Some(Operator::new("/"))),
            ("mod", Infix, Some(P::Scaling), Some(Operator::new("%"))),
            ("pow", Infix, Some(P::Exponent), Some(Operator::new("^"))),
            ("sqrt", Prefix, None, Some(Operator::padded("√", NoPad))),
            // assignment
            (
                "increment",
                Postfix,
                None,
                Some(Operator::padded("++", RightSide)),
            ),
            (
                "decrement",
                Postfix,
                None,
                Some(Operator::padded("--", RightSide)),
            ),
            ("add_assign", Infix, Some(P::Assignment), Some(Operator::new("+="))),
            ("sub_assign", Infix, Some(P::Assignment), Some(Operator::new("-="))),
            ("mult_assign", Infix, Some(P::Assignment), Some(Operator::new("*="))),
            ("div_assign", Infix, Some(P::Assignment), Some(Operator::new("/="))),
            ("assign", Infix, Some(P::Assignment), Some(Operator::new(":="))),
            ("def", Prefix, Some(P::Assignment), None),
            ("del", Prefix, None, None),
            // numbers
            ("degrees", Postfix, None, Some(Operator::padded("°", NoPad))),
            ("factorial", Postfix, None, Some(Operator::padded("!", NoPad))),
            ("percent", Postfix, None, Some(Operator::padded("%", NoPad))),
            ("round", Prefix, None, None),
            ("int", Prefix, None, None),
            ("npr", Infix, None, None),
            ("ncr", Infix, None, None),
            // relational
            ("equates", Infix, Some(P::Equation), Some(Operator::new("="))),
            ("lt", Infix, Some(P::Relational), Some(Operator::new("<"))),
            ("gt", Infix, Some(P::Relational), Some(Operator::new(">"))),
            ("geq", Infix, Some(P::Relational), Some(Operator::new(">="))),
            ("leq", Infix, Some(P::Relational), Some(Operator::new("<="))),
            ("eq", Infix, Some(P::Equality), Some(Operator::new("=="))),
            ("neq", Infix, Some(P::Equality), Some(Operator::new("!="))),
            // boolean logic
            ("and", Infix, Some(P::And), Some(Operator::new("&&"))),
            ("or", Infix, Some(P::Or), Some(Operator::new("||"))),
            ("xor", Infix, Some(P::Xor), Some(Operator::new("^^"))),
            ("not", Prefix, None, Some(Operator::padded("!", NoPad))),
            ("nand", Infix, Some(P::Nand), Some(Operator::new("!&"))),
            ("nor", Infix, Some(P::Nor), Some(Operator::new("!|"))),
            // lists
            ("get", Infix, Some(P::Subscript), Some(Operator::padded("::", NoPad))),
            ("size", Prefix, None, None),
            ("map", Infix, None, Some(Operator::new("|"))),
            ("reduce", Infix, None, Some(Operator::new("~"))),
            ("filter", Infix, None, Some(Operator::new("|?"))),
            ("zip", Infix, None, Some(Operator::new("><"))),
            ("append", Infix, Some(P::Concat), Some(Operator::new("++"))),
            ("sort", Infix, None, Some(Operator::new(">?"))),
            ("remove", Infix, None, None),
            ("contains", Infix, None, None),
            // developer utility
            ("pipe", Infix, None, Some(Operator::new("->"))),
            ("repeat", Infix, Some(P::Repeat), Some(Operator::padded("...", NoPad))),
            ("copy", Infix, Some(P::Repeat), None),
            ("complexity", Prefix, None, None),
            ("eval", Prefix, None, None),
            ("print", Prefix, Some(P::PrefixCommand), None),
            ("println", Prefix, Some(P::PrefixCommand), None),
            ("run", Prefix, Some(P::PrefixCommand), None),
            ("import", Prefix, Some(P::PrefixCommand), None),
            ("func_ref", Prefix, Some(P::PrefixCommand), Some(Operator::padded("*", NoPad))),
            // flow control and error handling
            ("return", Prefix, Some(P::PrefixCommand), None),
            ("for", Prefix, None, None),
            ("while", Prefix, None, None),
            ("ternary", Infix, Some(P::Conditional), Some(Operator::new("?"))),
            ("assert", Prefix, Some(P::PrefixCommand), None),
            ("try", Prefix, Some(P::PrefixCommand), None),
            ("throw", Prefix, Some(P::PrefixCommand), None),
            ("else", Infix, Some(P::Binding), None),
            ("inout", Prefix, None, Some(Operator::padded("&", NoPad))),
            // calculus syntax (the rules live outside the core)
            ("derivative", Infix, Some(P::Derivative), Some(Operator::padded("'", NoPad))),
            ("gradient", Infix, Some(P::Derivative), Some(Operator::new("∇"))),
            // type casting
            ("as", Infix, Some(P::Coercion), Some(Operator::new("!!"))),
            ("is", Infix, Some(P::Coercion), Some(Operator::new("??"))),
            // matrices and vectors
            ("determinant", Prefix, None, None),
            ("dot", Infix, Some(P::Scaling), Some(Operator::new("•"))),
            ("cross", Infix, Some(P::Scaling), Some(Operator::new("×"))),
            ("matmul", Infix, Some(P::Scaling), Some(Operator::new("**"))),
            ("transpose", Prefix, None, Some(Operator::padded("¡", NoPad))),
            // others
            ("pair", Infix, Some(P::Pair), Some(Operator::new(":"))),
            ("concat", Infix, Some(P::Concat), Some(Operator::new("&"))),
            // prepositions, restored to Pair nodes in postprocessing
            ("of", Infix, Some(P::Pair), None),
            ("to", Infix, Some(P::Pair), None),
            ("from", Infix, Some(P::Pair), None),
            ("in", Infix, Some(P::Pair), None),
            ("at", Infix, Some(P::Pair), None),
            // live syntax extension
            ("prefix", Prefix, Some(P::Assignment), None),
            ("infix", Prefix, Some(P::Assignment), None),
            ("postfix", Prefix, Some(P::Assignment), None),
            ("auto", Prefix, Some(P::Assignment), None),
        ];

        for (name, fixity, precedence, operator) in defs {
            self.define(name, *fixity, *precedence, operator.clone())
                .expect("built-in syntax table is internally consistent");
        }
    }
}
