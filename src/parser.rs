//! The expression parser: precedence climbing over the lexed token stream.
//!
//! # Grammar
//! There is no fixed grammar; binding is driven entirely by the
//! [`SyntaxTable`], which user programs may extend while compiling. The
//! parser therefore climbs precedence numerically instead of encoding one
//! ladder of functions per class:
//!
//! - all infix operators are left-associative, and a class listed later in
//!   [`Precedence`] binds more tightly;
//! - a prefix operator's operand is parsed at the operator's own class, so
//!   `-x^2` reads as `-(x^2)` while `print a+b` reads as `print(a) + b`;
//! - postfix operators and subscripts bind immediately;
//! - a glyph shared across fixities is resolved positionally: at operand
//!   position the prefix reading wins, after an operand the infix reading
//!   wins whenever an operand can follow, else the postfix reading.
//!
//! Implicit multiplication is inserted between a trailing number-or-`)`
//! and a following identifier-or-`(`; an identifier directly followed by
//! `(` is always a call, never a product.

use crate::error::CompileError;
use crate::lexer::token::Token;
use crate::node::{attr, name, Constant, Node, TypeTag};
use crate::syntax::{Fixity, Keyword, Precedence, SyntaxTable};

pub mod postprocess;

/// Parses a complete token stream into a raw tree.
///
/// The result still contains compilation artifacts (`list(...)` calls,
/// `#(...)` closure markers, `equates` terms); [`postprocess`] resolves
/// those into their final node kinds.
pub fn parse(tokens: &[Token], table: &SyntaxTable) -> Result<Node, CompileError> {
    if tokens.is_empty() {
        return Err(CompileError::EmptyString);
    }
    let mut parser = Parser {
        tokens,
        pos: 0,
        table,
    };
    let node = parser.sequence(None)?;
    match parser.peek() {
        None => Ok(node),
        Some(tok) => Err(CompileError::Syntax(format!("unexpected '{tok}'"))),
    }
}

/// The parser state: a cursor over the token stream plus the syntax table
/// driving operator resolution.
struct Parser<'buf, 'syn> {
    tokens: &'buf [Token],
    pos: usize,
    table: &'syn SyntaxTable,
}

impl<'buf, 'syn> Parser<'buf, 'syn> {
    fn peek(&self) -> Option<&'buf Token> {
        self.tokens.get(self.pos)
    }

    fn peek_next(&self) -> Option<&'buf Token> {
        self.tokens.get(self.pos + 1)
    }

    fn prev(&self) -> Option<&'buf Token> {
        self.pos.checked_sub(1).and_then(|i| self.tokens.get(i))
    }

    fn consume(&mut self, expected: &Token) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: &Token) -> Result<(), CompileError> {
        if self.consume(expected) {
            Ok(())
        } else {
            Err(CompileError::Syntax(match self.peek() {
                Some(found) => format!("expected '{expected}', found '{found}'"),
                None => format!("expected '{expected}'"),
            }))
        }
    }

    /// Parses `;`-separated statements of `,`-separated expressions up to
    /// (not including) the closing token.
    fn sequence(&mut self, close: Option<&Token>) -> Result<Node, CompileError> {
        let mut statements = Vec::new();
        loop {
            statements.push(self.comma_list()?);
            if self.consume(&Token::Semicolon) {
                // tolerate a trailing `;`
                if self.peek().is_none() || self.peek() == close {
                    break;
                }
                continue;
            }
            break;
        }
        Ok(match statements.len() {
            1 => statements.swap_remove(0),
            _ => Node::Statements(statements),
        })
    }

    fn comma_list(&mut self) -> Result<Node, CompileError> {
        let mut items = vec![self.expression(0)?];
        while self.consume(&Token::Comma) {
            items.push(self.expression(0)?);
        }
        Ok(match items.len() {
            1 => items.swap_remove(0),
            _ => Node::List(items),
        })
    }

    /// Precedence climbing: parses one operand, then extends it while the
    /// following operator binds at least as tightly as `min_bp`.
    fn expression(&mut self, min_bp: u8) -> Result<Node, CompileError> {
        let mut lhs = self.operand()?;

        loop {
            let Some(tok) = self.peek() else { break };
            match tok {
                Token::LBracket => lhs = self.subscript(lhs)?,
                Token::Op(glyph) => {
                    let glyph = glyph.clone();
                    match self.operator_use(&glyph, min_bp)? {
                        OperatorUse::Infix(kw) => {
                            let power = kw.precedence.power();
                            let op = kw.name.clone();
                            self.pos += 1;
                            let rhs = self.expression(power + 1)?;
                            lhs = Node::term(op, vec![lhs, rhs]);
                        }
                        OperatorUse::Postfix(kw) => {
                            let op = kw.name.clone();
                            self.pos += 1;
                            lhs = Node::term(op, vec![lhs]);
                        }
                        OperatorUse::TooLoose => break,
                    }
                }
                Token::Ident(word) => {
                    if let Some(kw) = self.table.lookup(word) {
                        if self.peek_next() == Some(&Token::LParen) {
                            // `a max(b, c)`: the keyword reads as a call
                            // here, which cannot extend the climb
                            break;
                        }
                        match kw.fixity {
                            Fixity::Infix => {
                                let power = kw.precedence.power();
                                if power < min_bp {
                                    break;
                                }
                                let op = kw.name.clone();
                                self.pos += 1;
                                let rhs = self.expression(power + 1)?;
                                lhs = Node::term(op, vec![lhs, rhs]);
                            }
                            Fixity::Postfix => {
                                let op = kw.name.clone();
                                self.pos += 1;
                                lhs = Node::term(op, vec![lhs]);
                            }
                            Fixity::Prefix => {
                                return Err(illegal_position(kw, "infix"));
                            }
                        }
                    } else if self.implicit_multiplication(min_bp) {
                        let rhs = self.expression(Precedence::Scaling.power() + 1)?;
                        lhs = Node::term(name::MULT, vec![lhs, rhs]);
                    } else {
                        break;
                    }
                }
                Token::LParen if self.implicit_multiplication(min_bp) => {
                    let rhs = self.expression(Precedence::Scaling.power() + 1)?;
                    lhs = Node::term(name::MULT, vec![lhs, rhs]);
                }
                _ => break,
            }
        }

        Ok(lhs)
    }

    /// Whether the cursor sits at an implied product: the previous token
    /// ended with a digit or `)` and the current one opens an identifier
    /// or group. A call (`f(...)`) never reaches this check because the
    /// identifier and its argument list are consumed together.
    fn implicit_multiplication(&self, min_bp: u8) -> bool {
        let juxtaposed = matches!(
            self.prev(),
            Some(Token::Int(_) | Token::Big(_) | Token::Float(_) | Token::RParen)
        );
        juxtaposed && Precedence::Scaling.power() >= min_bp
    }

    /// Resolves a glyph found after a complete operand.
    fn operator_use(&self, glyph: &str, min_bp: u8) -> Result<OperatorUse<'syn>, CompileError> {
        let infix = self.table.candidate(glyph, Fixity::Infix);
        let postfix = self.table.candidate(glyph, Fixity::Postfix);
        let operand_follows = match self.peek_next() {
            None => false,
            Some(Token::Op(next)) => self.table.candidate(next, Fixity::Prefix).is_some(),
            Some(tok) => tok.starts_operand(),
        };

        if let Some(kw) = infix {
            if operand_follows || postfix.is_none() {
                return if kw.precedence.power() >= min_bp {
                    if operand_follows {
                        Ok(OperatorUse::Infix(kw))
                    } else {
                        // `a +` with nothing to bind on the right
                        Err(illegal_position(kw, "postfix"))
                    }
                } else {
                    Ok(OperatorUse::TooLoose)
                };
            }
        }
        if let Some(kw) = postfix {
            return Ok(OperatorUse::Postfix(kw));
        }

        // only a prefix keyword owns this glyph; naming it in the error
        let attempted = if operand_follows { "infix" } else { "postfix" };
        let candidates = self.table.candidates(glyph);
        match candidates.first() {
            Some(kw) => Err(illegal_position(kw, attempted)),
            None => Err(CompileError::Syntax(format!("unknown operator '{glyph}'"))),
        }
    }

    /// Parses a single operand: a literal, a prefix application, a call,
    /// a group, or a bracketed literal, plus any directly attached
    /// subscripts or trailing closure.
    fn operand(&mut self) -> Result<Node, CompileError> {
        let Some(tok) = self.peek() else {
            return Err(CompileError::Syntax("expected an operand".into()));
        };

        match tok {
            Token::Int(n) => {
                let node = Node::Int(*n);
                self.pos += 1;
                Ok(node)
            }
            Token::Big(n) => {
                let node = Node::Big(n.clone());
                self.pos += 1;
                Ok(node)
            }
            Token::Float(x) => {
                let node = Node::Float(*x);
                self.pos += 1;
                Ok(node)
            }
            Token::Bool(b) => {
                let node = Node::Bool(*b);
                self.pos += 1;
                Ok(node)
            }
            Token::Str(s) => {
                let node = Node::Str(s.clone());
                self.pos += 1;
                Ok(node)
            }
            Token::TypeLit(tag) => {
                let node = TypeTag::parse(tag)
                    .map(Node::Type)
                    .ok_or_else(|| CompileError::InvalidType(tag.clone()))?;
                self.pos += 1;
                Ok(node)
            }
            Token::Hash => {
                self.pos += 1;
                self.expect(&Token::LParen)?;
                let args = self.call_arguments()?;
                Ok(Node::term(name::CLOSURE, args))
            }
            Token::LParen => {
                self.pos += 1;
                if self.consume(&Token::RParen) {
                    return Ok(Node::Void);
                }
                let inner = self.sequence(Some(&Token::RParen))?;
                self.expect(&Token::RParen)?;
                Ok(inner)
            }
            Token::LBracket => {
                self.pos += 1;
                if self.consume(&Token::RBracket) {
                    return Ok(Node::Vector(Vec::new()));
                }
                let inner = self.sequence(Some(&Token::RBracket))?;
                self.expect(&Token::RBracket)?;
                Ok(Node::Vector(splat(inner)))
            }
            Token::LBrace => {
                self.pos += 1;
                if self.consume(&Token::RBrace) {
                    return Ok(Node::term(name::LIST, Vec::new()));
                }
                let inner = self.sequence(Some(&Token::RBrace))?;
                self.expect(&Token::RBrace)?;
                Ok(Node::term(name::LIST, splat(inner)))
            }
            Token::Op(glyph) => {
                let glyph = glyph.clone();
                match self.table.candidate(&glyph, Fixity::Prefix) {
                    Some(kw) => {
                        let power = kw.precedence.power();
                        let op = kw.name.clone();
                        self.pos += 1;
                        let operand = self.expression(power)?;
                        Ok(Node::term(op, vec![operand]))
                    }
                    None => {
                        let candidates = self.table.candidates(&glyph);
                        match candidates.first() {
                            Some(kw) => Err(illegal_position(kw, "prefix")),
                            None => Err(CompileError::Syntax(format!(
                                "unknown operator '{glyph}'"
                            ))),
                        }
                    }
                }
            }
            Token::Ident(word) => {
                let word = word.clone();
                self.ident_operand(word)
            }
            other => Err(CompileError::Syntax(format!("unexpected '{other}'"))),
        }
    }

    fn ident_operand(&mut self, word: String) -> Result<Node, CompileError> {
        if self.peek_next() == Some(&Token::LParen) {
            // a call: `f(...)`, possibly with a trailing `{...}` closure.
            // Keyword names followed directly by an argument list read as
            // calls too, so `repeat(f(), 5)` works alongside `a ... b`.
            self.pos += 2;
            let mut args = self.call_arguments()?;
            if self.peek() == Some(&Token::LBrace) {
                args.push(self.closure_block()?);
            }
            return Ok(Node::term(word, args));
        }

        if self.peek_next() == Some(&Token::LBrace)
            && attr::has_implicit_trailing_closure(&word)
        {
            // `repeat { ... }`: a bare trailing closure with no arguments
            self.pos += 1;
            let body = self.closure_block()?;
            return Ok(Node::term(word, vec![body]));
        }

        if let Some(kw) = self.table.lookup(&word) {
            return match kw.fixity {
                Fixity::Prefix => {
                    let power = kw.precedence.power();
                    let op = kw.name.clone();
                    self.pos += 1;
                    if !self.operand_may_follow() {
                        // zero-operand command form, e.g. a bare `return`
                        return Ok(Node::term(op, Vec::new()));
                    }
                    let operand = self.expression(power)?;
                    Ok(Node::term(op, vec![operand]))
                }
                Fixity::Infix | Fixity::Postfix => Err(illegal_position(kw, "prefix")),
            };
        }

        if matches!(word.as_str(), name::CONTINUE | name::BREAK) {
            self.pos += 1;
            return Ok(Node::term(word, Vec::new()));
        }

        self.pos += 1;
        if let Some(constant) = Constant::parse(&word) {
            return Ok(Node::Const(constant));
        }
        if let Some(literal) = word.strip_prefix('$') {
            // `$name` outside a call position must be a constant literal
            return Constant::parse(literal)
                .map(Node::Const)
                .ok_or_else(|| CompileError::NoSuchConstant(literal.into()));
        }
        Ok(Node::Var(word))
    }

    /// Parses the arguments of a call whose `(` has been consumed.
    fn call_arguments(&mut self) -> Result<Vec<Node>, CompileError> {
        if self.consume(&Token::RParen) {
            return Ok(Vec::new());
        }
        let inner = self.sequence(Some(&Token::RParen))?;
        self.expect(&Token::RParen)?;
        Ok(splat(inner))
    }

    /// Parses a `{ ... }` block into a closure-marker term.
    fn closure_block(&mut self) -> Result<Node, CompileError> {
        self.expect(&Token::LBrace)?;
        if self.consume(&Token::RBrace) {
            return Ok(Node::term(name::CLOSURE, Vec::new()));
        }
        let body = self.sequence(Some(&Token::RBrace))?;
        self.expect(&Token::RBrace)?;
        Ok(Node::term(name::CLOSURE, vec![body]))
    }

    fn subscript(&mut self, operand: Node) -> Result<Node, CompileError> {
        self.pos += 1;
        if self.consume(&Token::RBracket) {
            return Err(CompileError::Syntax(
                "cannot subscript with empty square brackets []".into(),
            ));
        }
        let index = self.sequence(Some(&Token::RBracket))?;
        self.expect(&Token::RBracket)?;
        Ok(Node::term(name::GET, vec![operand, index]))
    }

    /// Whether the next token can begin an operand for a prefix keyword;
    /// a closing token or an infix-only glyph means the zero-operand form.
    fn operand_may_follow(&self) -> bool {
        match self.peek() {
            None
            | Some(
                Token::RParen
                | Token::RBracket
                | Token::RBrace
                | Token::Comma
                | Token::Semicolon,
            ) => false,
            Some(Token::Op(glyph)) => self.table.candidate(glyph, Fixity::Prefix).is_some(),
            Some(_) => true,
        }
    }
}

/// How a glyph found after an operand is to be read.
enum OperatorUse<'syn> {
    /// Apply as a binary operator with the keyword's precedence.
    Infix(&'syn Keyword),
    /// Wrap the operand immediately.
    Postfix(&'syn Keyword),
    /// Legal, but binds too loosely for the current climb.
    TooLoose,
}

/// Call and collection interiors splat a parsed comma-list into elements.
fn splat(node: Node) -> Vec<Node> {
    match node {
        Node::List(items) => items,
        other => vec![other],
    }
}

fn illegal_position(kw: &Keyword, attempted: &str) -> CompileError {
    CompileError::Syntax(format!(
        "{}, i.e. '{}' cannot be used as a/an {attempted} operator",
        kw.name,
        kw.spelling(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::lex;

    fn parse_str(input: &str) -> Result<Node, CompileError> {
        let table = SyntaxTable::new();
        let tokens = lex(input, &table)?;
        parse(&tokens, &table)
    }

    fn var(name: &str) -> Node {
        Node::Var(name.into())
    }

    #[test]
    fn precedence_shapes_the_tree() {
        // 1+2*3 parses as +(1, *(2, 3))
        let expr = parse_str("1+2*3").unwrap();
        assert_eq!(
            expr,
            Node::term(
                name::ADD,
                vec![
                    Node::Int(1),
                    Node::term(name::MULT, vec![Node::Int(2), Node::Int(3)]),
                ]
            )
        );

        // parenthesised grouping overrides it
        let expr = parse_str("(1+2)*3").unwrap();
        assert_eq!(
            expr,
            Node::term(
                name::MULT,
                vec![
                    Node::term(name::ADD, vec![Node::Int(1), Node::Int(2)]),
                    Node::Int(3),
                ]
            )
        );
    }

    #[test]
    fn infix_operators_associate_left() {
        let expr = parse_str("10-3-2").unwrap();
        assert_eq!(
            expr,
            Node::term(
                name::SUB,
                vec![
                    Node::term(name::SUB, vec![Node::Int(10), Node::Int(3)]),
                    Node::Int(2),
                ]
            )
        );
    }

    #[test]
    fn prefix_operand_binds_at_own_class() {
        // -x^2 is -(x^2) ...
        let expr = parse_str("-x^2").unwrap();
        assert_eq!(
            expr,
            Node::term(
                "negate",
                vec![Node::term(name::POW, vec![var("x"), Node::Int(2)])]
            )
        );

        // ... but -x*y is (-x)*y
        let expr = parse_str("-x*y").unwrap();
        assert_eq!(
            expr,
            Node::term(
                name::MULT,
                vec![Node::term("negate", vec![var("x")]), var("y")]
            )
        );
    }

    #[test]
    fn implicit_multiplication() {
        assert_eq!(
            parse_str("3x").unwrap(),
            Node::term(name::MULT, vec![Node::Int(3), var("x")])
        );
        assert_eq!(
            parse_str("(a+b)(c)").unwrap(),
            Node::term(
                name::MULT,
                vec![
                    Node::term(name::ADD, vec![var("a"), var("b")]),
                    var("c"),
                ]
            )
        );
        assert_eq!(
            parse_str("2x^2").unwrap(),
            Node::term(
                name::MULT,
                vec![
                    Node::Int(2),
                    Node::term(name::POW, vec![var("x"), Node::Int(2)]),
                ]
            )
        );

        // a letter sequence followed by an argument list is a call
        assert_eq!(
            parse_str("f(x)").unwrap(),
            Node::term("f", vec![var("x")])
        );
    }

    #[test]
    fn ambiguous_glyphs_resolve_by_position() {
        // `!` is `not` before an operand and `factorial` after one
        assert_eq!(
            parse_str("!p").unwrap(),
            Node::term(name::NOT, vec![var("p")])
        );
        assert_eq!(
            parse_str("n!").unwrap(),
            Node::term(name::FACTORIAL, vec![var("n")])
        );
        // `%` is `mod` between operands and `percent` after one
        assert_eq!(
            parse_str("7%2").unwrap(),
            Node::term(name::MOD, vec![Node::Int(7), Node::Int(2)])
        );
        assert_eq!(
            parse_str("50%").unwrap(),
            Node::term(name::PERCENT, vec![Node::Int(50)])
        );
        // postfix then infix in one expression
        assert_eq!(
            parse_str("50% + 1").unwrap(),
            Node::term(
                name::ADD,
                vec![
                    Node::term(name::PERCENT, vec![Node::Int(50)]),
                    Node::Int(1),
                ]
            )
        );
    }

    #[test]
    fn illegal_operator_positions_are_reported() {
        let err = parse_str("2√4").unwrap_err();
        assert_eq!(
            err,
            CompileError::Syntax(
                "sqrt, i.e. '√' cannot be used as a/an infix operator".into()
            )
        );

        let err = parse_str("a +").unwrap_err();
        assert!(matches!(err, CompileError::Syntax(msg) if msg.contains("postfix")));

        let err = parse_str("and b").unwrap_err();
        assert!(matches!(err, CompileError::Syntax(msg) if msg.contains("prefix")));
    }

    #[test]
    fn word_operators_apply_infix() {
        let expr = parse_str("p and q").unwrap();
        assert_eq!(expr, Node::term(name::AND, vec![var("p"), var("q")]));
    }

    #[test]
    fn subscripts_chain_leftward() {
        let expr = parse_str("m[1][2]").unwrap();
        assert_eq!(
            expr,
            Node::term(
                name::GET,
                vec![
                    Node::term(name::GET, vec![var("m"), Node::Int(1)]),
                    Node::Int(2),
                ]
            )
        );

        let err = parse_str("m[]").unwrap_err();
        assert!(matches!(err, CompileError::Syntax(msg) if msg.contains("subscript")));
    }

    #[test]
    fn brackets_build_vectors_and_braces_build_lists() {
        assert_eq!(
            parse_str("[1,2]").unwrap(),
            Node::Vector(vec![Node::Int(1), Node::Int(2)])
        );
        assert_eq!(parse_str("[]").unwrap(), Node::Vector(Vec::new()));
        assert_eq!(
            parse_str("{1,2,3}").unwrap(),
            Node::term(
                name::LIST,
                vec![Node::Int(1), Node::Int(2), Node::Int(3)]
            )
        );
        assert_eq!(parse_str("()").unwrap(), Node::Void);
    }

    #[test]
    fn statements_and_lists_at_top_level() {
        let expr = parse_str("a; b; c").unwrap();
        assert_eq!(
            expr,
            Node::Statements(vec![var("a"), var("b"), var("c")])
        );

        let expr = parse_str("a, b").unwrap();
        assert_eq!(expr, Node::List(vec![var("a"), var("b")]));
    }

    #[test]
    fn trailing_closures_desugar_to_the_marker_call() {
        let sugar = parse_str("f(x){x+1}").unwrap();
        let spelled = parse_str("f(x,#(x+1))").unwrap();
        assert_eq!(sugar, spelled);
        assert_eq!(
            sugar,
            Node::term(
                "f",
                vec![
                    var("x"),
                    Node::term(
                        name::CLOSURE,
                        vec![Node::term(name::ADD, vec![var("x"), Node::Int(1)])]
                    ),
                ]
            )
        );
    }

    #[test]
    fn prefix_commands_take_one_tight_operand() {
        // print binds its operand before the addition applies
        let expr = parse_str("print a+b").unwrap();
        assert_eq!(
            expr,
            Node::term(
                name::ADD,
                vec![Node::term("print", vec![var("a")]), var("b")]
            )
        );

        // the zero-operand command form
        assert_eq!(
            parse_str("return").unwrap(),
            Node::term("return", Vec::new())
        );
    }

    #[test]
    fn ternary_captures_its_branch_pair() {
        let expr = parse_str("c ? a : b").unwrap();
        assert_eq!(
            expr,
            Node::term(
                "ternary",
                vec![
                    var("c"),
                    Node::term("pair", vec![var("a"), var("b")]),
                ]
            )
        );
    }

    #[test]
    fn constants_and_types_resolve() {
        assert_eq!(parse_str("pi").unwrap(), Node::Const(Constant::Pi));
        assert_eq!(parse_str("$pi").unwrap(), Node::Const(Constant::Pi));
        assert_eq!(
            parse_str("$nope").unwrap_err(),
            CompileError::NoSuchConstant("nope".into())
        );
        assert_eq!(parse_str("@int").unwrap(), Node::Type(TypeTag::Int));
        assert_eq!(
            parse_str("@widget").unwrap_err(),
            CompileError::InvalidType("widget".into())
        );
    }

    #[test]
    fn preserve_once_markers_survive_parsing() {
        let expr = parse_str("repeat($random(), 5)").unwrap();
        assert_eq!(
            expr,
            Node::term(
                "repeat",
                vec![Node::term("$random", Vec::new()), Node::Int(5)]
            )
        );
    }
}
