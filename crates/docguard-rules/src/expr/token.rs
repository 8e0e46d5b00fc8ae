//! Lexer for the condition expression language.

use std::fmt;

/// A single lexical token.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Number(f64),
    Str(String),
    Ident(String),
    True,
    False,
    Null,
    OrOr,
    AndAnd,
    EqEq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Bang,
    In,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Str(s) => write!(f, "\"{s}\""),
            Self::Ident(name) => f.write_str(name),
            Self::True => f.write_str("true"),
            Self::False => f.write_str("false"),
            Self::Null => f.write_str("null"),
            Self::OrOr => f.write_str("||"),
            Self::AndAnd => f.write_str("&&"),
            Self::EqEq => f.write_str("=="),
            Self::NotEq => f.write_str("!="),
            Self::Lt => f.write_str("<"),
            Self::Le => f.write_str("<="),
            Self::Gt => f.write_str(">"),
            Self::Ge => f.write_str(">="),
            Self::Plus => f.write_str("+"),
            Self::Minus => f.write_str("-"),
            Self::Star => f.write_str("*"),
            Self::Slash => f.write_str("/"),
            Self::Percent => f.write_str("%"),
            Self::Bang => f.write_str("!"),
            Self::In => f.write_str("in"),
            Self::LParen => f.write_str("("),
            Self::RParen => f.write_str(")"),
            Self::LBracket => f.write_str("["),
            Self::RBracket => f.write_str("]"),
            Self::Comma => f.write_str(","),
        }
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_' || c == '$'
}

fn is_ident_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '$'
}

/// Tokenize an expression source string.
pub fn tokenize(source: &str) -> Result<Vec<Token>, String> {
    let mut tokens = Vec::new();
    let mut chars = source.chars().peekable();

    while let Some(&c) = chars.peek() {
        match c {
            ' ' | '\t' | '\r' | '\n' => {
                chars.next();
            }
            '(' => {
                chars.next();
                tokens.push(Token::LParen);
            }
            ')' => {
                chars.next();
                tokens.push(Token::RParen);
            }
            '[' => {
                chars.next();
                tokens.push(Token::LBracket);
            }
            ']' => {
                chars.next();
                tokens.push(Token::RBracket);
            }
            ',' => {
                chars.next();
                tokens.push(Token::Comma);
            }
            '+' => {
                chars.next();
                tokens.push(Token::Plus);
            }
            '-' => {
                chars.next();
                tokens.push(Token::Minus);
            }
            '*' => {
                chars.next();
                tokens.push(Token::Star);
            }
            '/' => {
                chars.next();
                tokens.push(Token::Slash);
            }
            '%' => {
                chars.next();
                tokens.push(Token::Percent);
            }
            '|' => {
                chars.next();
                if chars.next_if_eq(&'|').is_none() {
                    return Err("single '|' is not an operator".to_string());
                }
                tokens.push(Token::OrOr);
            }
            '&' => {
                chars.next();
                if chars.next_if_eq(&'&').is_none() {
                    return Err("single '&' is not an operator".to_string());
                }
                tokens.push(Token::AndAnd);
            }
            '=' => {
                chars.next();
                if chars.next_if_eq(&'=').is_none() {
                    return Err("assignment is not supported".to_string());
                }
                tokens.push(Token::EqEq);
            }
            '!' => {
                chars.next();
                if chars.next_if_eq(&'=').is_some() {
                    tokens.push(Token::NotEq);
                } else {
                    tokens.push(Token::Bang);
                }
            }
            '<' => {
                chars.next();
                if chars.next_if_eq(&'=').is_some() {
                    tokens.push(Token::Le);
                } else {
                    tokens.push(Token::Lt);
                }
            }
            '>' => {
                chars.next();
                if chars.next_if_eq(&'=').is_some() {
                    tokens.push(Token::Ge);
                } else {
                    tokens.push(Token::Gt);
                }
            }
            '\'' | '"' => {
                let quote = c;
                chars.next();
                let mut text = String::new();
                loop {
                    match chars.next() {
                        Some(ch) if ch == quote => break,
                        Some('\\') => match chars.next() {
                            Some('n') => text.push('\n'),
                            Some('t') => text.push('\t'),
                            Some('\\') => text.push('\\'),
                            Some('\'') => text.push('\''),
                            Some('"') => text.push('"'),
                            Some(other) => {
                                return Err(format!("unknown escape '\\{other}'"));
                            }
                            None => return Err("unterminated string literal".to_string()),
                        },
                        Some(ch) => text.push(ch),
                        None => return Err("unterminated string literal".to_string()),
                    }
                }
                tokens.push(Token::Str(text));
            }
            c if c.is_ascii_digit() => {
                let mut text = String::new();
                while let Some(d) = chars.next_if(|d| d.is_ascii_digit()) {
                    text.push(d);
                }
                if chars.peek() == Some(&'.') {
                    text.push('.');
                    chars.next();
                    while let Some(d) = chars.next_if(|d| d.is_ascii_digit()) {
                        text.push(d);
                    }
                }
                let number = text
                    .parse::<f64>()
                    .map_err(|_| format!("invalid number literal '{text}'"))?;
                tokens.push(Token::Number(number));
            }
            c if is_ident_start(c) => {
                let mut name = String::new();
                while let Some(ch) = chars.next_if(|&ch| is_ident_continue(ch)) {
                    name.push(ch);
                }
                tokens.push(match name.as_str() {
                    "true" => Token::True,
                    "false" => Token::False,
                    "null" => Token::Null,
                    "in" => Token::In,
                    _ => Token::Ident(name),
                });
            }
            other => return Err(format!("unexpected character '{other}'")),
        }
    }

    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operators_and_literals() {
        let tokens = tokenize("$userid == 123 && !$blocked").unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::Ident("$userid".to_string()),
                Token::EqEq,
                Token::Number(123.0),
                Token::AndAnd,
                Token::Bang,
                Token::Ident("$blocked".to_string()),
            ]
        );
    }

    #[test]
    fn test_string_literals_and_escapes() {
        let tokens = tokenize(r#"'it\'s' "two\nlines""#).unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::Str("it's".to_string()),
                Token::Str("two\nlines".to_string()),
            ]
        );
    }

    #[test]
    fn test_keywords() {
        let tokens = tokenize("true false null in").unwrap();
        assert_eq!(tokens, vec![Token::True, Token::False, Token::Null, Token::In]);
    }

    #[test]
    fn test_numbers() {
        let tokens = tokenize("3.25 10").unwrap();
        assert_eq!(tokens, vec![Token::Number(3.25), Token::Number(10.0)]);
    }

    #[test]
    fn test_rejects_assignment() {
        assert!(tokenize("$a = 1").is_err());
    }

    #[test]
    fn test_rejects_unterminated_string() {
        assert!(tokenize("'open").is_err());
    }

    #[test]
    fn test_rejects_unknown_characters() {
        assert!(tokenize("a @ b").is_err());
        assert!(tokenize("a | b").is_err());
    }
}
