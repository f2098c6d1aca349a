//! Tokenizer for the expression DSL.

use super::ExpressionError;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Number(f64),
    Str(String),
    Ident(String),
    True,
    False,
    Null,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    EqEq,
    NotEq,
    Lt,
    Lte,
    Gt,
    Gte,
    AndAnd,
    OrOr,
    Bang,
    Question,
    Colon,
    Dot,
    Comma,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Eof,
}

/// A token plus the byte offset it started at, for error position cursors.
pub struct PosToken {
    pub token: Token,
    pub position: usize,
}

pub fn tokenize(src: &str) -> Result<Vec<PosToken>, ExpressionError> {
    let bytes = src.as_bytes();
    let mut i = 0;
    let mut tokens = Vec::new();

    macro_rules! err {
        ($pos:expr, $msg:expr) => {
            return Err(ExpressionError::Parse { expr: src.to_string(), position: $pos, message: $msg.to_string() })
        };
    }

    while i < bytes.len() {
        let c = bytes[i] as char;
        if c.is_whitespace() {
            i += 1;
            continue;
        }
        let start = i;
        match c {
            '+' => {
                tokens.push(PosToken { token: Token::Plus, position: start });
                i += 1;
            }
            '-' => {
                tokens.push(PosToken { token: Token::Minus, position: start });
                i += 1;
            }
            '*' => {
                tokens.push(PosToken { token: Token::Star, position: start });
                i += 1;
            }
            '/' => {
                tokens.push(PosToken { token: Token::Slash, position: start });
                i += 1;
            }
            '%' => {
                tokens.push(PosToken { token: Token::Percent, position: start });
                i += 1;
            }
            '?' => {
                tokens.push(PosToken { token: Token::Question, position: start });
                i += 1;
            }
            ':' => {
                tokens.push(PosToken { token: Token::Colon, position: start });
                i += 1;
            }
            '.' => {
                tokens.push(PosToken { token: Token::Dot, position: start });
                i += 1;
            }
            ',' => {
                tokens.push(PosToken { token: Token::Comma, position: start });
                i += 1;
            }
            '(' => {
                tokens.push(PosToken { token: Token::LParen, position: start });
                i += 1;
            }
            ')' => {
                tokens.push(PosToken { token: Token::RParen, position: start });
                i += 1;
            }
            '[' => {
                tokens.push(PosToken { token: Token::LBracket, position: start });
                i += 1;
            }
            ']' => {
                tokens.push(PosToken { token: Token::RBracket, position: start });
                i += 1;
            }
            '#' => {
                // `#` is the map()-closure synonym for the current element,
                // alongside `item`.
                tokens.push(PosToken { token: Token::Ident("#".to_string()), position: start });
                i += 1;
            }
            '=' => {
                if bytes.get(i + 1) == Some(&b'=') {
                    tokens.push(PosToken { token: Token::EqEq, position: start });
                    i += 2;
                } else {
                    err!(start, "unexpected '=' (did you mean '=='?)");
                }
            }
            '!' => {
                if bytes.get(i + 1) == Some(&b'=') {
                    tokens.push(PosToken { token: Token::NotEq, position: start });
                    i += 2;
                } else {
                    tokens.push(PosToken { token: Token::Bang, position: start });
                    i += 1;
                }
            }
            '<' => {
                if bytes.get(i + 1) == Some(&b'=') {
                    tokens.push(PosToken { token: Token::Lte, position: start });
                    i += 2;
                } else {
                    tokens.push(PosToken { token: Token::Lt, position: start });
                    i += 1;
                }
            }
            '>' => {
                if bytes.get(i + 1) == Some(&b'=') {
                    tokens.push(PosToken { token: Token::Gte, position: start });
                    i += 2;
                } else {
                    tokens.push(PosToken { token: Token::Gt, position: start });
                    i += 1;
                }
            }
            '&' => {
                if bytes.get(i + 1) == Some(&b'&') {
                    tokens.push(PosToken { token: Token::AndAnd, position: start });
                    i += 2;
                } else {
                    err!(start, "unexpected '&' (did you mean '&&'?)");
                }
            }
            '|' => {
                if bytes.get(i + 1) == Some(&b'|') {
                    tokens.push(PosToken { token: Token::OrOr, position: start });
                    i += 2;
                } else {
                    err!(start, "unexpected '|' (did you mean '||'?)");
                }
            }
            '\'' | '"' => {
                let quote = c;
                i += 1;
                let mut s = String::new();
                loop {
                    match bytes.get(i) {
                        None => err!(start, "unterminated string literal"),
                        Some(&b) if b as char == quote => {
                            i += 1;
                            break;
                        }
                        Some(&b'\\') if i + 1 < bytes.len() => {
                            s.push(bytes[i + 1] as char);
                            i += 2;
                        }
                        Some(&b) => {
                            s.push(b as char);
                            i += 1;
                        }
                    }
                }
                tokens.push(PosToken { token: Token::Str(s), position: start });
            }
            c if c.is_ascii_digit() => {
                let mut end = i;
                while end < bytes.len() && (bytes[end].is_ascii_digit() || bytes[end] == b'.') {
                    end += 1;
                }
                let text = &src[i..end];
                let number = text
                    .parse::<f64>()
                    .map_err(|_| ExpressionError::Parse { expr: src.to_string(), position: start, message: format!("invalid number literal '{text}'") })?;
                tokens.push(PosToken { token: Token::Number(number), position: start });
                i = end;
            }
            c if c.is_alphabetic() || c == '_' => {
                let mut end = i;
                while end < bytes.len() && ((bytes[end] as char).is_alphanumeric() || bytes[end] == b'_') {
                    end += 1;
                }
                let text = &src[i..end];
                let token = match text {
                    "true" => Token::True,
                    "false" => Token::False,
                    "null" => Token::Null,
                    _ => Token::Ident(text.to_string()),
                };
                tokens.push(PosToken { token, position: start });
                i = end;
            }
            other => err!(start, format!("unexpected character '{other}'")),
        }
    }

    tokens.push(PosToken { token: Token::Eof, position: bytes.len() });
    Ok(tokens)
}
