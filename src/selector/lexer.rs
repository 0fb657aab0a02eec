// ABOUTME: Tokenizer for selector expressions.
// ABOUTME: Produces literals, names, keywords and operators with byte offsets.

use super::error::SelectorError;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Int(i64),
    Float(f64),
    Str(String),
    Name(String),
    /// Comparison or arithmetic operator, including keyword operators.
    Op(&'static str),
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
    Dot,
    /// Operator that exists in the host language but is refused here.
    Forbidden(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    pub token: Token,
    pub offset: usize,
}

const FORBIDDEN_OPERATORS: &[&str] = &[
    "**", "//", "<<", ">>", ":=", "*", "/", "%", "@", "&", "|", "^", "~", ":", "=", "{", "}",
    ";",
];

pub fn tokenize(source: &str) -> Result<Vec<Spanned>, SelectorError> {
    let bytes = source.as_bytes();
    let mut tokens = Vec::new();
    let mut pos = 0;

    while pos < bytes.len() {
        let c = bytes[pos];
        let start = pos;

        if c.is_ascii_whitespace() || c == b'\\' && bytes.get(pos + 1) == Some(&b'\n') {
            pos += if c == b'\\' { 2 } else { 1 };
            continue;
        }

        if c == b'#' {
            while pos < bytes.len() && bytes[pos] != b'\n' {
                pos += 1;
            }
            continue;
        }

        let token = match c {
            b'(' => single(&mut pos, Token::LParen),
            b')' => single(&mut pos, Token::RParen),
            b'[' => single(&mut pos, Token::LBracket),
            b']' => single(&mut pos, Token::RBracket),
            b',' => single(&mut pos, Token::Comma),
            b'+' => single(&mut pos, Token::Op("+")),
            b'-' => single(&mut pos, Token::Op("-")),
            b'.' if !bytes.get(pos + 1).is_some_and(u8::is_ascii_digit) => {
                single(&mut pos, Token::Dot)
            }
            b'=' | b'!' | b'<' | b'>' if bytes.get(pos + 1) == Some(&b'=') => {
                pos += 2;
                Token::Op(match c {
                    b'=' => "==",
                    b'!' => "!=",
                    b'<' => "<=",
                    _ => ">=",
                })
            }
            b'<' if bytes.get(pos + 1) != Some(&b'<') => single(&mut pos, Token::Op("<")),
            b'>' if bytes.get(pos + 1) != Some(&b'>') => single(&mut pos, Token::Op(">")),
            b'\'' | b'"' => lex_string(source, &mut pos)?,
            b'0'..=b'9' | b'.' => lex_number(source, &mut pos)?,
            c if c == b'_' || c.is_ascii_alphabetic() => {
                while pos < bytes.len() && (bytes[pos] == b'_' || bytes[pos].is_ascii_alphanumeric())
                {
                    pos += 1;
                }
                keyword_or_name(&source[start..pos])
            }
            _ => match FORBIDDEN_OPERATORS
                .iter()
                .find(|op| source[pos..].starts_with(**op))
            {
                Some(op) => {
                    pos += op.len();
                    Token::Forbidden(format!("operator '{}'", op))
                }
                None => {
                    let ch = source[pos..].chars().next().unwrap_or('?');
                    return Err(SelectorError::syntax(
                        pos,
                        format!("unexpected character '{}'", ch),
                    ));
                }
            },
        };

        tokens.push(Spanned {
            token,
            offset: start,
        });
    }

    Ok(tokens)
}

fn single(pos: &mut usize, token: Token) -> Token {
    *pos += 1;
    token
}

fn keyword_or_name(word: &str) -> Token {
    match word {
        "and" => Token::Op("and"),
        "or" => Token::Op("or"),
        "not" => Token::Op("not"),
        "in" => Token::Op("in"),
        "is" => Token::Op("is"),
        _ => Token::Name(word.to_string()),
    }
}

fn lex_string(source: &str, pos: &mut usize) -> Result<Token, SelectorError> {
    let start = *pos;
    let mut chars = source[start..].char_indices();
    let quote = chars.next().map(|(_, q)| q).unwrap_or('"');
    let mut value = String::new();

    while let Some((i, ch)) = chars.next() {
        match ch {
            c if c == quote => {
                *pos = start + i + ch.len_utf8();
                return Ok(Token::Str(value));
            }
            '\\' => {
                let (_, escaped) = chars
                    .next()
                    .ok_or_else(|| SelectorError::syntax(start, "unterminated string"))?;
                value.push(match escaped {
                    'n' => '\n',
                    't' => '\t',
                    'r' => '\r',
                    '0' => '\0',
                    other => other,
                });
            }
            '\n' => return Err(SelectorError::syntax(start, "unterminated string")),
            other => value.push(other),
        }
    }

    Err(SelectorError::syntax(start, "unterminated string"))
}

fn lex_number(source: &str, pos: &mut usize) -> Result<Token, SelectorError> {
    let start = *pos;
    let bytes = source.as_bytes();
    let mut is_float = false;

    while *pos < bytes.len() {
        match bytes[*pos] {
            b'0'..=b'9' | b'_' => {}
            b'.' if !is_float => is_float = true,
            b'e' | b'E' => {
                is_float = true;
                if matches!(bytes.get(*pos + 1), Some(b'+' | b'-')) {
                    *pos += 1;
                }
            }
            _ => break,
        }
        *pos += 1;
    }

    let text: String = source[start..*pos].chars().filter(|c| *c != '_').collect();
    let invalid = || SelectorError::syntax(start, format!("invalid number '{}'", text));

    if is_float {
        text.parse().map(Token::Float).map_err(|_| invalid())
    } else {
        text.parse().map(Token::Int).map_err(|_| invalid())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(source: &str) -> Vec<Token> {
        tokenize(source)
            .unwrap()
            .into_iter()
            .map(|s| s.token)
            .collect()
    }

    #[test]
    fn lexes_comparison() {
        assert_eq!(
            tokens("service['image'] == \"nginx\""),
            vec![
                Token::Name("service".to_string()),
                Token::LBracket,
                Token::Str("image".to_string()),
                Token::RBracket,
                Token::Op("=="),
                Token::Str("nginx".to_string()),
            ]
        );
    }

    #[test]
    fn lexes_keyword_operators_and_numbers() {
        assert_eq!(
            tokens("1.5 not in x is 42"),
            vec![
                Token::Float(1.5),
                Token::Op("not"),
                Token::Op("in"),
                Token::Name("x".to_string()),
                Token::Op("is"),
                Token::Int(42),
            ]
        );
    }

    #[test]
    fn marks_forbidden_operators() {
        assert_eq!(
            tokens("2 ** 8"),
            vec![
                Token::Int(2),
                Token::Forbidden("operator '**'".to_string()),
                Token::Int(8),
            ]
        );
        assert_eq!(tokens("a % b")[1], Token::Forbidden("operator '%'".to_string()));
    }

    #[test]
    fn skips_comments_and_newlines() {
        assert_eq!(
            tokens("# only gateways\nname == 'gateway'\n"),
            vec![
                Token::Name("name".to_string()),
                Token::Op("=="),
                Token::Str("gateway".to_string()),
            ]
        );
    }

    #[test]
    fn string_escapes() {
        assert_eq!(tokens(r#"'it\'s'"#), vec![Token::Str("it's".to_string())]);
    }

    #[test]
    fn unterminated_string_is_syntax_error() {
        assert!(matches!(
            tokenize("'abc"),
            Err(SelectorError::Syntax { offset: 0, .. })
        ));
    }

    #[test]
    fn unknown_character_is_syntax_error() {
        assert!(matches!(
            tokenize("a $ b"),
            Err(SelectorError::Syntax { offset: 2, .. })
        ));
    }
}
