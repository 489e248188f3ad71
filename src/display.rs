//! Stringification of trees back into source form, driven by the same
//! syntax table that compiled them.
//!
//! Parenthesization mirrors compilation: a child is wrapped when its
//! operator binds more loosely than its parent's, when it is a unary use
//! at equal precedence, and on the right-hand side of operators that only
//! distribute forward (`a - (b + c)`).

use crate::node::{attr, Node, Term};
use crate::syntax::{Fixity, Keyword, Padding, SyntaxTable};

/// Renders `node` as compilable source text.
pub fn stringify(node: &Node, table: &SyntaxTable) -> String {
    match node {
        Node::Int(n) => n.to_string(),
        Node::Big(n) => n.to_string(),
        // the Debug form keeps a trailing `.0`, so floats re-lex as floats
        Node::Float(x) => format!("{x:?}"),
        Node::Bool(b) => b.to_string(),
        Node::Str(s) => format!("\"{}\"", escape(s)),
        Node::Var(v) => v.clone(),
        Node::Const(c) => c.as_str().into(),
        Node::Type(t) => format!("@{}", t.as_str()),
        Node::Void => "()".into(),
        Node::List(items) => format!("{{{}}}", join(items, table)),
        Node::Vector(items) => format!("[{}]", join(items, table)),
        Node::Matrix(matrix) => {
            let rows: Vec<String> = matrix
                .rows()
                .iter()
                .map(|row| format!("[{}]", join(row, table)))
                .collect();
            format!("[{}]", rows.join(", "))
        }
        Node::Statements(items) => {
            let parts: Vec<String> = items.iter().map(|n| stringify(n, table)).collect();
            parts.join("; ")
        }
        Node::Pair(pair) => match pair.2 {
            crate::node::Preposition::Colon => format!(
                "{} : {}",
                stringify(&pair.0, table),
                stringify(&pair.1, table)
            ),
            word => format!(
                "{} {} {}",
                stringify(&pair.0, table),
                word.as_str(),
                stringify(&pair.1, table)
            ),
        },
        Node::Equation(eq) => format!(
            "{} = {}",
            stringify(&eq.0, table),
            stringify(&eq.1, table)
        ),
        Node::Closure(body) => format!("#({})", stringify(body, table)),
        Node::Term(term) => stringify_term(term, table),
    }
}

fn stringify_term(term: &Term, table: &SyntaxTable) -> String {
    let rendered: Vec<String> = term
        .args()
        .iter()
        .enumerate()
        .map(|(idx, arg)| {
            let text = stringify(arg, table);
            if uses_parenthesis(term, idx, table) {
                format!("({text})")
            } else {
                text
            }
        })
        .collect();

    if let Some(kw) = table.lookup(term.name()) {
        match kw.fixity {
            Fixity::Infix if term.count() >= 2 => {
                return rendered.join(&infix_spelling(kw));
            }
            Fixity::Prefix if term.count() == 1 => {
                return format!("{}{}", prefix_spelling(kw), rendered[0]);
            }
            Fixity::Postfix if term.count() == 1 => {
                return format!("{}{}", rendered[0], postfix_spelling(kw));
            }
            _ => {}
        }
    }

    // plain call form; arguments re-render without operator parens
    let args: Vec<String> = term.args().iter().map(|a| stringify(a, table)).collect();
    format!("{}({})", term.name(), args.join(", "))
}

fn infix_spelling(kw: &Keyword) -> String {
    match &kw.operator {
        Some(op) => match op.padding {
            Padding::BothSides => format!(" {} ", op.glyph),
            Padding::RightSide => format!("{} ", op.glyph),
            Padding::None => op.glyph.clone(),
        },
        None => format!(" {} ", kw.name),
    }
}

fn prefix_spelling(kw: &Keyword) -> String {
    match &kw.operator {
        Some(op) => match op.padding {
            Padding::None => op.glyph.clone(),
            _ => format!("{} ", op.glyph),
        },
        None => format!("{} ", kw.name),
    }
}

fn postfix_spelling(kw: &Keyword) -> String {
    match &kw.operator {
        Some(op) => op.glyph.clone(),
        None => format!(" {}", kw.name),
    }
}

/// Whether the child at `idx` must be parenthesized under `parent`.
fn uses_parenthesis(parent: &Term, idx: usize, table: &SyntaxTable) -> bool {
    let Some(parent_kw) = table.lookup(parent.name()) else {
        return false;
    };
    let Some(Node::Term(child)) = parent.args().get(idx) else {
        return false;
    };
    let Some(child_kw) = table.lookup(child.name()) else {
        return false;
    };

    if child_kw.precedence < parent_kw.precedence {
        // e.g. (a + b) * c
        return true;
    }
    if child_kw.precedence == parent_kw.precedence {
        // unary uses always disambiguate
        if child.count() == 1 {
            return true;
        }
        if idx != 0 {
            if attr::is_forward_commutative(parent.name()) {
                // a - (b + c)
                return true;
            }
            if parent.is_commutative() {
                return parent.name() != child.name();
            }
            return true;
        }
    }
    false
}

/// Comma-joins a slice of rendered elements.
fn join(items: &[Node], table: &SyntaxTable) -> String {
    items
        .iter()
        .map(|n| stringify(n, table))
        .collect::<Vec<_>>()
        .join(", ")
}

fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            other => out.push(other),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::name;

    fn render(node: &Node) -> String {
        stringify(node, &SyntaxTable::new())
    }

    fn var(name: &str) -> Node {
        Node::Var(name.into())
    }

    #[test]
    fn operators_render_with_their_glyphs() {
        let node = Node::term(
            name::ADD,
            vec![
                var("b"),
                Node::term(name::MULT, vec![Node::Int(2), var("a")]),
            ],
        );
        assert_eq!(render(&node), "b + 2 * a");
    }

    #[test]
    fn loose_children_are_parenthesized() {
        let node = Node::term(
            name::MULT,
            vec![
                Node::term(name::ADD, vec![var("a"), var("b")]),
                var("c"),
            ],
        );
        assert_eq!(render(&node), "(a + b) * c");
    }

    #[test]
    fn forward_commutative_parents_guard_the_right_side() {
        let node = Node::term(
            name::SUB,
            vec![
                var("a"),
                Node::term(name::SUB, vec![var("b"), var("c")]),
            ],
        );
        assert_eq!(render(&node), "a - (b - c)");
    }

    #[test]
    fn unary_forms_render_tight() {
        assert_eq!(
            render(&Node::term("negate", vec![var("x")])),
            "-x"
        );
        assert_eq!(
            render(&Node::term(name::FACTORIAL, vec![Node::Int(5)])),
            "5!"
        );
        assert_eq!(
            render(&Node::term("print", vec![var("x")])),
            "print x"
        );
        assert_eq!(
            render(&Node::term(name::GET, vec![var("m"), Node::Int(1)])),
            "m::1"
        );
    }

    #[test]
    fn collections_and_leaves() {
        assert_eq!(
            render(&Node::List(vec![Node::Int(1), Node::Int(2)])),
            "{1, 2}"
        );
        assert_eq!(
            render(&Node::Vector(vec![Node::Int(1), Node::Int(2)])),
            "[1, 2]"
        );
        assert_eq!(render(&Node::Float(7.0)), "7.0");
        assert_eq!(render(&Node::Str("a\tb".into())), "\"a\\tb\"");
        assert_eq!(render(&Node::Void), "()");
        assert_eq!(
            render(&Node::Closure(Box::new(var("x")))),
            "#(x)"
        );
    }

    #[test]
    fn unregistered_names_render_as_calls() {
        let node = Node::term("f", vec![var("x"), Node::Int(2)]);
        assert_eq!(render(&node), "f(x, 2)");
    }

    #[test]
    fn commutative_chains_render_flat() {
        let node = Node::term(name::ADD, vec![var("a"), var("b"), var("c")]);
        assert_eq!(render(&node), "a + b + c");
    }
}
