//! The lexer: flat source text into a [`Token`] stream.
//!
//! String literals are extracted first (their contents are immune to every
//! later rule), punctuation and literals are fixed, and operator glyphs are
//! matched greedily longest-first against the [`SyntaxTable`] so that a
//! more specific glyph is never shadowed by a shorter prefix of itself
//! (`>=` before `>`, `!=` before `!`).

use crate::error::CompileError;
use crate::syntax::SyntaxTable;

use self::token::Token;

pub mod literal;
pub mod token;

/// Lexes `input` into a token stream using the glyphs registered in
/// `table`.
///
/// Word-form keywords come out as ordinary [`Token::Ident`]s; deciding
/// whether `and` is an operator is positional and belongs to the parser.
pub fn lex(input: &str, table: &SyntaxTable) -> Result<Vec<Token>, CompileError> {
    let mut rest = input;
    let mut tokens = Vec::new();

    loop {
        rest = rest.trim_start();
        let Some(c) = rest.chars().next() else {
            break;
        };

        if let Some(punct) = punctuation(c) {
            tokens.push(punct);
            rest = &rest[c.len_utf8()..];
            continue;
        }

        if c == '@' {
            let (tail, tok) = literal::word(&rest[c.len_utf8()..]).map_err(|_| {
                CompileError::Syntax(format!("expected a type name after '@' in \"{input}\""))
            })?;
            match tok {
                Token::Ident(tag) => tokens.push(Token::TypeLit(tag)),
                _ => {
                    return Err(CompileError::Syntax(format!(
                        "expected a type name after '@' in \"{input}\""
                    )))
                }
            }
            rest = tail;
            continue;
        }

        if c == '"' {
            let (tail, tok) = literal::string(rest).map_err(|_| {
                CompileError::Syntax(format!("malformed string literal in \"{input}\""))
            })?;
            tokens.push(tok);
            rest = tail;
            continue;
        }

        if c.is_ascii_digit() {
            let (tail, tok) = literal::number(rest).map_err(|_| {
                CompileError::Syntax(format!("malformed numeric literal in \"{input}\""))
            })?;
            tokens.push(tok);
            rest = tail;
            continue;
        }

        if c.is_alphabetic() || c == '$' || c == '_' {
            let (tail, tok) = literal::word(rest).map_err(|_| {
                CompileError::Syntax(format!("illegal variable name in \"{input}\""))
            })?;
            tokens.push(tok);
            rest = tail;
            continue;
        }

        // glyphs are pre-sorted longest-first by the syntax table
        if let Some(glyph) = table.glyphs().iter().find(|g| rest.starts_with(g.as_str())) {
            tokens.push(Token::Op(glyph.clone()));
            rest = &rest[glyph.len()..];
            continue;
        }

        return Err(CompileError::Syntax(format!(
            "unexpected character '{c}' in \"{input}\""
        )));
    }

    Ok(tokens)
}

/// The fixed single-character tokens.
fn punctuation(c: char) -> Option<Token> {
    Some(match c {
        '(' => Token::LParen,
        ')' => Token::RParen,
        '[' => Token::LBracket,
        ']' => Token::RBracket,
        '{' => Token::LBrace,
        '}' => Token::RBrace,
        ',' => Token::Comma,
        ';' => Token::Semicolon,
        '#' => Token::Hash,
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex_default(input: &str) -> Vec<Token> {
        lex(input, &SyntaxTable::new()).unwrap()
    }

    #[test]
    fn lexes_a_small_expression() {
        let tokens = lex_default("x + 2.5*(y - 1)");
        assert_eq!(
            tokens,
            vec![
                Token::Ident("x".into()),
                Token::Op("+".into()),
                Token::Float(2.5),
                Token::Op("*".into()),
                Token::LParen,
                Token::Ident("y".into()),
                Token::Op("-".into()),
                Token::Int(1),
                Token::RParen,
            ]
        );
    }

    #[test]
    fn glyph_matching_is_greedy() {
        assert_eq!(
            lex_default("a>=b"),
            vec![
                Token::Ident("a".into()),
                Token::Op(">=".into()),
                Token::Ident("b".into()),
            ]
        );
        assert_eq!(lex_default("a!=b")[1], Token::Op("!=".into()));
        // `1...5` is a repeat range, not a float
        assert_eq!(
            lex_default("1...5"),
            vec![Token::Int(1), Token::Op("...".into()), Token::Int(5)]
        );
    }

    #[test]
    fn operators_inside_strings_are_inert() {
        let tokens = lex_default(r#""a + b" & c"#);
        assert_eq!(
            tokens,
            vec![
                Token::Str("a + b".into()),
                Token::Op("&".into()),
                Token::Ident("c".into()),
            ]
        );
    }

    #[test]
    fn word_keywords_stay_idents() {
        let tokens = lex_default("x and y");
        assert_eq!(
            tokens,
            vec![
                Token::Ident("x".into()),
                Token::Ident("and".into()),
                Token::Ident("y".into()),
            ]
        );
    }

    #[test]
    fn type_tags_and_closure_markers() {
        assert_eq!(
            lex_default("x !! @int"),
            vec![
                Token::Ident("x".into()),
                Token::Op("!!".into()),
                Token::TypeLit("int".into()),
            ]
        );
        assert_eq!(
            lex_default("#(x)"),
            vec![
                Token::Hash,
                Token::LParen,
                Token::Ident("x".into()),
                Token::RParen,
            ]
        );
    }

    #[test]
    fn runtime_defined_glyphs_are_honoured() {
        use crate::syntax::{Fixity, Operator, Padding};

        let mut table = SyntaxTable::new();
        table
            .define(
                "tilde",
                Fixity::Postfix,
                None,
                Some(Operator::padded("~~", Padding::None)),
            )
            .unwrap();
        let tokens = lex("x~~", &table).unwrap();
        assert_eq!(
            tokens,
            vec![Token::Ident("x".into()), Token::Op("~~".into())]
        );
    }

    #[test]
    fn rejects_unexpected_characters() {
        let err = lex("a ¤ b", &SyntaxTable::new()).unwrap_err();
        assert!(matches!(err, CompileError::Syntax(_)));
    }
}
