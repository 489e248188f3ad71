//! [`nom`] parsers for the literal leaves: strings, numbers, and words.

use nom::{
    branch::alt,
    bytes::complete::{escaped_transform, is_not, tag, take_while1},
    character::complete::{char, digit1, one_of},
    combinator::{map, map_res, opt, recognize, value, verify},
    sequence::{delimited, pair, tuple},
    IResult,
};
use num_bigint::BigInt;
use num_traits::ToPrimitive;

use super::token::Token;

/// The general return type for the literal sub-lexers.
pub type LexResult<'src> = IResult<&'src str, Token>;

/// Parses a double-quoted [`Token::Str`], decoding the escape sequences
/// `\n`, `\r`, `\t`, `\"`, and `\\`.
pub fn string(input: &str) -> LexResult<'_> {
    map(
        delimited(
            char('"'),
            alt((
                escaped_transform(
                    is_not("\\\""),
                    '\\',
                    alt((
                        value("\n", char('n')),
                        value("\r", char('r')),
                        value("\t", char('t')),
                        value("\"", char('"')),
                        value("\\", char('\\')),
                    )),
                ),
                map(tag(""), |_: &str| String::new()),
            )),
            char('"'),
        ),
        Token::Str,
    )(input)
}

/// Parses a numeric literal: a float when a decimal point is present,
/// otherwise an exact integer promoted to [`Token::Big`] only when it
/// overflows a machine word.
pub fn number(input: &str) -> LexResult<'_> {
    alt((float, integer))(input)
}

/// Parses a [`Token::Float`]: `digits '.' digits` with an optional
/// exponent suffix.
fn float(input: &str) -> LexResult<'_> {
    map_res(
        recognize(tuple((
            digit1,
            char('.'),
            digit1,
            opt(tuple((one_of("eE"), opt(one_of("+-")), digit1))),
        ))),
        |text: &str| text.parse::<f64>().map(Token::Float),
    )(input)
}

/// Parses a [`Token::Int`] or [`Token::Big`] from a digit sequence.
fn integer(input: &str) -> LexResult<'_> {
    let (tail, big) = map_res(digit1, str::parse::<BigInt>)(input)?;
    let token = match big.to_i64() {
        Some(small) => Token::Int(small),
        None => Token::Big(big),
    };
    Ok((tail, token))
}

/// Parses a [`Token::Ident`] (or [`Token::Bool`] for the boolean
/// spellings): an alphabetic first character followed by alphanumerics and
/// underscores, with an optional leading `$` preserve-once marker.
pub fn word(input: &str) -> LexResult<'_> {
    map(
        recognize(pair(
            opt(char('$')),
            verify(
                take_while1(|c: char| c.is_alphanumeric() || c == '_'),
                |s: &str| s.chars().next().is_some_and(char::is_alphabetic),
            ),
        )),
        |w: &str| match w {
            "true" => Token::Bool(true),
            "false" => Token::Bool(false),
            _ => Token::Ident(w.into()),
        },
    )(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_decodes_escapes() {
        let (tail, tok) = string(r#""a\tb\"c" rest"#).unwrap();
        assert_eq!(tok, Token::Str("a\tb\"c".into()));
        assert_eq!(tail, " rest");

        let (_, empty) = string(r#""""#).unwrap();
        assert_eq!(empty, Token::Str(String::new()));
    }

    #[test]
    fn number_distinguishes_int_and_float() {
        assert_eq!(number("42)").unwrap(), (")", Token::Int(42)));
        assert_eq!(number("2.5+x").unwrap(), ("+x", Token::Float(2.5)));
        assert_eq!(number("1.0e3,").unwrap(), (",", Token::Float(1000.0)));

        // `1...5` must not eat the repeat glyph
        assert_eq!(number("1...5").unwrap(), ("...5", Token::Int(1)));
    }

    #[test]
    fn oversized_integers_promote() {
        let (_, tok) = number("170141183460469231731687303715884105727").unwrap();
        assert!(matches!(tok, Token::Big(_)));
    }

    #[test]
    fn word_recognizes_booleans_and_markers() {
        assert_eq!(word("true)").unwrap(), (")", Token::Bool(true)));
        assert_eq!(word("x_1+2").unwrap(), ("+2", Token::Ident("x_1".into())));
        assert_eq!(word("$f(").unwrap(), ("(", Token::Ident("$f".into())));
        assert!(word("_tail").is_err());
        assert!(word("9lives").is_err());
    }
}
