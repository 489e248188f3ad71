//! Post-compilation resolution: compilation artifacts into final node kinds.
//!
//! The raw tree still spells lists as `list(...)` calls, closures as
//! `#(...)` marker calls, equations as `equates` terms, and so on. This
//! pass rewrites the tree bottom-up into its final shape, infers matrices
//! from rectangular vector-of-vector literals, and performs live syntax
//! extension for root-level `prefix`/`infix`/`postfix`/`auto` calls.

use crate::error::CompileError;
use crate::node::{name, Matrix, Node, Preposition};
use crate::syntax::{Fixity, SyntaxTable};

/// Runs the full postprocessing pass over a parsed tree.
pub fn postprocess(root: Node, table: &mut SyntaxTable) -> Result<Node, CompileError> {
    let root = root.transform(&mut resolve)?;
    syntax_extension(root, table)
}

/// Rewrites a single node whose children are already in final form.
fn resolve(node: Node) -> Result<Node, CompileError> {
    let term = match node {
        Node::Term(term) => term,
        Node::Vector(items) => return infer_matrix(items),
        other => return Ok(other),
    };

    match term.name() {
        name::LIST => {
            let (_, args) = term.into_parts();
            Ok(Node::List(args))
        }
        name::CLOSURE => {
            let (_, mut args) = term.into_parts();
            Ok(Node::Closure(Box::new(match args.len() {
                0 => Node::Void,
                1 => args.swap_remove(0),
                _ => Node::List(args),
            })))
        }
        name::EQUATES => {
            if term.count() != 2 {
                return Err(CompileError::Syntax(
                    "expected expr. on both sides of '='".into(),
                ));
            }
            let (_, mut args) = term.into_parts();
            let rhs = args.pop().unwrap_or(Node::Void);
            let lhs = args.pop().unwrap_or(Node::Void);
            Ok(Node::equation(lhs, rhs))
        }
        name::PAIR if term.count() == 2 => {
            let (_, mut args) = term.into_parts();
            let right = args.pop().unwrap_or(Node::Void);
            let left = args.pop().unwrap_or(Node::Void);
            Ok(Node::pair(left, right, Preposition::Colon))
        }
        word if term.count() == 2 && Preposition::parse(word).is_some() => {
            let preposition = Preposition::parse(word).unwrap_or(Preposition::Colon);
            let (_, mut args) = term.into_parts();
            let right = args.pop().unwrap_or(Node::Void);
            let left = args.pop().unwrap_or(Node::Void);
            Ok(Node::pair(left, right, preposition))
        }
        name::ELSE => {
            // `... else {a; b}`: the trailing list is really a branch body
            let (op, mut args) = term.into_parts();
            if let Some(Node::List(_)) = args.last() {
                if let Some(Node::List(mut items)) = args.pop() {
                    let body = match items.len() {
                        0 => Node::Void,
                        1 => items.swap_remove(0),
                        _ => Node::Statements(items),
                    };
                    args.push(Node::Closure(Box::new(body)));
                }
            }
            Ok(Node::term(op, args))
        }
        _ => Ok(Node::Term(term)),
    }
}

/// Promotes a vector whose elements are all vectors of equal length to a
/// [`Matrix`]; ragged rows are a hard error, mixed elements stay a vector.
fn infer_matrix(items: Vec<Node>) -> Result<Node, CompileError> {
    let all_rows = !items.is_empty() && items.iter().all(|n| matches!(n, Node::Vector(_)));
    if !all_rows {
        return Ok(Node::Vector(items));
    }
    let rows = items
        .into_iter()
        .map(|n| match n {
            Node::Vector(row) => row,
            _ => Vec::new(),
        })
        .collect();
    Matrix::new(rows)
        .map(Node::Matrix)
        .map_err(|_| CompileError::DimensionMismatch)
}

/// Interprets a root-level `prefix`/`infix`/`postfix`/`auto` call as a live
/// syntax-extension request, registering the keyword and rewriting the call
/// into an ordinary `def` so the template body still binds normally.
fn syntax_extension(root: Node, table: &mut SyntaxTable) -> Result<Node, CompileError> {
    let term = match &root {
        Node::Term(term)
            if matches!(
                term.name(),
                name::PREFIX | name::INFIX | name::POSTFIX | name::AUTO
            ) =>
        {
            term
        }
        _ => return Ok(root),
    };

    let template = match term.args().first() {
        Some(Node::Term(template)) => template,
        _ => {
            return Err(CompileError::Syntax(
                "expected a function template, but found nothing".into(),
            ))
        }
    };
    let target = template.name().to_string();
    if table.lookup(&target).is_some() {
        return Err(CompileError::DuplicateKeyword(target));
    }

    // parameter count, not counting an attached body closure
    let params = template
        .args()
        .iter()
        .filter(|arg| !matches!(arg, Node::Closure(_)))
        .count();

    let fixity = match (term.name(), params) {
        (name::PREFIX, 1) => Fixity::Prefix,
        (name::POSTFIX, 1) => Fixity::Postfix,
        (name::INFIX, 2) => Fixity::Infix,
        (name::AUTO, 1) => Fixity::Prefix,
        (name::AUTO, 2) => Fixity::Infix,
        (declared, _) => {
            return Err(CompileError::Syntax(format!(
                "cannot declare '{target}' as {declared} with {params} parameter(s)"
            )))
        }
    };
    table.define(&target, fixity, None, None)?;
    log::debug!("registered {fixity} syntax for '{target}'");

    Ok(Node::term(name::DEF, term.args().to_vec()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::lex;
    use crate::node::TypeTag;

    fn compile(input: &str, table: &mut SyntaxTable) -> Result<Node, CompileError> {
        let tokens = lex(input, table)?;
        let raw = crate::parser::parse(&tokens, table)?;
        postprocess(raw, table)
    }

    fn compile_default(input: &str) -> Result<Node, CompileError> {
        compile(input, &mut SyntaxTable::new())
    }

    #[test]
    fn brace_literals_become_lists() {
        let node = compile_default("{1,2,3}").unwrap();
        assert_eq!(
            node,
            Node::List(vec![Node::Int(1), Node::Int(2), Node::Int(3)])
        );
        // and never matrices
        assert!(matches!(node, Node::List(_)));
    }

    #[test]
    fn rectangular_vectors_promote_to_matrices() {
        let node = compile_default("[[1,2],[3,4]]").unwrap();
        match node {
            Node::Matrix(m) => assert_eq!(m.dim(), (2, 2)),
            other => panic!("expected a matrix, got {other:?}"),
        }

        assert_eq!(
            compile_default("[[1,2],[3]]").unwrap_err(),
            CompileError::DimensionMismatch
        );

        // mixed elements stay a plain vector
        let node = compile_default("[[1,2],3]").unwrap();
        assert!(matches!(node, Node::Vector(_)));
    }

    #[test]
    fn equations_require_two_sides() {
        let node = compile_default("x+1 = 4").unwrap();
        assert_eq!(
            node,
            Node::equation(
                Node::term(name::ADD, vec![Node::Var("x".into()), Node::Int(1)]),
                Node::Int(4),
            )
        );
    }

    #[test]
    fn closure_markers_become_closures() {
        let node = compile_default("f(x,#(x+1))").unwrap();
        match node {
            Node::Term(term) => {
                assert_eq!(term.name(), "f");
                assert!(matches!(term.args()[1], Node::Closure(_)));
            }
            other => panic!("expected a term, got {other:?}"),
        }

        assert_eq!(
            compile_default("#()").unwrap(),
            Node::Closure(Box::new(Node::Void))
        );
    }

    #[test]
    fn prepositions_become_pairs() {
        let node = compile_default("1 of x").unwrap();
        assert_eq!(
            node,
            Node::pair(Node::Int(1), Node::Var("x".into()), Preposition::Of)
        );

        let node = compile_default("a : b").unwrap();
        assert_eq!(
            node,
            Node::pair(
                Node::Var("a".into()),
                Node::Var("b".into()),
                Preposition::Colon
            )
        );
    }

    #[test]
    fn else_branches_close_over_trailing_lists() {
        let node = compile_default("f(c){a} else {b}").unwrap();
        match node {
            Node::Term(term) => {
                assert_eq!(term.name(), name::ELSE);
                assert!(matches!(term.args()[1], Node::Closure(_)));
            }
            other => panic!("expected an else term, got {other:?}"),
        }
    }

    #[test]
    fn type_tags_resolve_in_place() {
        let node = compile_default("x !! @int").unwrap();
        assert_eq!(
            node,
            Node::term("as", vec![Node::Var("x".into()), Node::Type(TypeTag::Int)])
        );
    }

    #[test]
    fn prefix_declarations_register_keywords() {
        let mut table = SyntaxTable::new();
        let node = compile("prefix double(x) { x+x }", &mut table).unwrap();

        // the declaration rewrites into a def call
        match &node {
            Node::Term(term) => assert_eq!(term.name(), name::DEF),
            other => panic!("expected a def term, got {other:?}"),
        }

        // and the new keyword immediately parses as a prefix operator
        let keyword = table.lookup("double").unwrap();
        assert_eq!(keyword.fixity, Fixity::Prefix);
        let node = compile("double 5", &mut table).unwrap();
        assert_eq!(node, Node::term("double", vec![Node::Int(5)]));
    }

    #[test]
    fn infix_declarations_require_two_parameters() {
        let mut table = SyntaxTable::new();
        let err = compile("infix wrap(x) { x }", &mut table).unwrap_err();
        assert!(matches!(err, CompileError::Syntax(_)));

        let node = compile("infix wrap(a, b) { a+b }", &mut table);
        assert!(node.is_ok());
        assert_eq!(table.lookup("wrap").unwrap().fixity, Fixity::Infix);
    }

    #[test]
    fn auto_declarations_derive_fixity_from_arity() {
        let mut table = SyntaxTable::new();
        compile("auto twice(x) { x+x }", &mut table).unwrap();
        assert_eq!(table.lookup("twice").unwrap().fixity, Fixity::Prefix);

        compile("auto join(a, b) { a&b }", &mut table).unwrap();
        assert_eq!(table.lookup("join").unwrap().fixity, Fixity::Infix);
    }

    #[test]
    fn redeclaring_a_keyword_is_rejected() {
        let mut table = SyntaxTable::new();
        let err = compile("prefix not(x) { x }", &mut table).unwrap_err();
        assert_eq!(err, CompileError::DuplicateKeyword("not".into()));
    }
}
