use crate::error::ExpressionError;
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Field(String),
    Str(String),
    Number(String),
    Ident(String),
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    LParen,
    RParen,
    Comma,
    And,
    Or,
    Not,
    If,
    Then,
    ElseIf,
    Else,
    EndIf,
    True,
    False,
    Eof,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Field(name) => write!(f, "field [{}]", name),
            TokenKind::Str(s) => write!(f, "string \"{}\"", s),
            TokenKind::Number(n) => write!(f, "number {}", n),
            TokenKind::Ident(name) => write!(f, "identifier '{}'", name),
            TokenKind::Plus => write!(f, "'+'"),
            TokenKind::Minus => write!(f, "'-'"),
            TokenKind::Star => write!(f, "'*'"),
            TokenKind::Slash => write!(f, "'/'"),
            TokenKind::Percent => write!(f, "'%'"),
            TokenKind::Eq => write!(f, "'='"),
            TokenKind::NotEq => write!(f, "'<>'"),
            TokenKind::Lt => write!(f, "'<'"),
            TokenKind::LtEq => write!(f, "'<='"),
            TokenKind::Gt => write!(f, "'>'"),
            TokenKind::GtEq => write!(f, "'>='"),
            TokenKind::LParen => write!(f, "'('"),
            TokenKind::RParen => write!(f, "')'"),
            TokenKind::Comma => write!(f, "','"),
            TokenKind::And => write!(f, "'AND'"),
            TokenKind::Or => write!(f, "'OR'"),
            TokenKind::Not => write!(f, "'NOT'"),
            TokenKind::If => write!(f, "'IF'"),
            TokenKind::Then => write!(f, "'THEN'"),
            TokenKind::ElseIf => write!(f, "'ELSEIF'"),
            TokenKind::Else => write!(f, "'ELSE'"),
            TokenKind::EndIf => write!(f, "'ENDIF'"),
            TokenKind::True => write!(f, "'TRUE'"),
            TokenKind::False => write!(f, "'FALSE'"),
            TokenKind::Eof => write!(f, "end of input"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    /// Byte offset of the token's first character in the formula.
    pub position: usize,
}

/// Splits a formula into tokens. The returned list always ends with `Eof`.
pub fn tokenize(src: &str) -> Result<Vec<Token>, ExpressionError> {
    let mut tokens = Vec::new();
    let mut chars = src.char_indices().peekable();

    while let Some(&(start, c)) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }

        let kind = match c {
            '[' => {
                chars.next();
                TokenKind::Field(read_until(&mut chars, ']', start, "']'")?)
            }
            '"' | '\'' => {
                chars.next();
                TokenKind::Str(read_until(&mut chars, c, start, "closing quote")?)
            }
            '0'..='9' | '.' => read_number(src, &mut chars, start)?,
            c if c.is_alphabetic() || c == '_' => {
                let mut end = start;
                while let Some(&(i, c)) = chars.peek() {
                    if c.is_alphanumeric() || c == '_' {
                        end = i + c.len_utf8();
                        chars.next();
                    } else {
                        break;
                    }
                }
                keyword_or_ident(&src[start..end])
            }
            '/' => {
                chars.next();
                if matches!(chars.peek(), Some((_, '/'))) {
                    // Line comment.
                    for (_, c) in chars.by_ref() {
                        if c == '\n' {
                            break;
                        }
                    }
                    continue;
                }
                TokenKind::Slash
            }
            _ => {
                chars.next();
                let next = chars.peek().map(|&(_, n)| n);
                let (kind, consume_next) = match (c, next) {
                    ('+', _) => (TokenKind::Plus, false),
                    ('-', _) => (TokenKind::Minus, false),
                    ('*', _) => (TokenKind::Star, false),
                    ('%', _) => (TokenKind::Percent, false),
                    ('(', _) => (TokenKind::LParen, false),
                    (')', _) => (TokenKind::RParen, false),
                    (',', _) => (TokenKind::Comma, false),
                    ('=', Some('=')) => (TokenKind::Eq, true),
                    ('=', _) => (TokenKind::Eq, false),
                    ('!', Some('=')) => (TokenKind::NotEq, true),
                    ('!', _) => (TokenKind::Not, false),
                    ('<', Some('>')) => (TokenKind::NotEq, true),
                    ('<', Some('=')) => (TokenKind::LtEq, true),
                    ('<', _) => (TokenKind::Lt, false),
                    ('>', Some('=')) => (TokenKind::GtEq, true),
                    ('>', _) => (TokenKind::Gt, false),
                    ('&', Some('&')) => (TokenKind::And, true),
                    ('|', Some('|')) => (TokenKind::Or, true),
                    _ => {
                        return Err(ExpressionError::syntax(
                            start,
                            "an operator or operand",
                            format!("'{}'", c),
                        ));
                    }
                };
                if consume_next {
                    chars.next();
                }
                kind
            }
        };
        tokens.push(Token {
            kind,
            position: start,
        });
    }

    tokens.push(Token {
        kind: TokenKind::Eof,
        position: src.len(),
    });
    Ok(tokens)
}

fn read_until(
    chars: &mut std::iter::Peekable<std::str::CharIndices<'_>>,
    terminator: char,
    start: usize,
    expected: &str,
) -> Result<String, ExpressionError> {
    let mut value = String::new();
    for (_, c) in chars.by_ref() {
        if c == terminator {
            return Ok(value);
        }
        value.push(c);
    }
    Err(ExpressionError::syntax(
        start,
        expected,
        "end of input",
    ))
}

fn read_number(
    src: &str,
    chars: &mut std::iter::Peekable<std::str::CharIndices<'_>>,
    start: usize,
) -> Result<TokenKind, ExpressionError> {
    let mut end = start;
    let mut seen_dot = false;
    let mut seen_exp = false;
    let mut prev = ' ';
    while let Some(&(i, c)) = chars.peek() {
        let accept = match c {
            '0'..='9' => true,
            '.' if !seen_dot && !seen_exp => {
                seen_dot = true;
                true
            }
            'e' | 'E' if !seen_exp && end > start => {
                seen_exp = true;
                true
            }
            '+' | '-' if prev == 'e' || prev == 'E' => true,
            _ => false,
        };
        if !accept {
            break;
        }
        prev = c;
        end = i + 1;
        chars.next();
    }

    let text = &src[start..end];
    if text == "." || text.ends_with(['e', 'E', '+', '-']) {
        return Err(ExpressionError::syntax(start, "a number", format!("'{}'", text)));
    }
    Ok(TokenKind::Number(text.to_string()))
}

fn keyword_or_ident(word: &str) -> TokenKind {
    match word.to_ascii_uppercase().as_str() {
        "AND" => TokenKind::And,
        "OR" => TokenKind::Or,
        "NOT" => TokenKind::Not,
        "IF" => TokenKind::If,
        "THEN" => TokenKind::Then,
        "ELSEIF" => TokenKind::ElseIf,
        "ELSE" => TokenKind::Else,
        "ENDIF" => TokenKind::EndIf,
        "TRUE" => TokenKind::True,
        "FALSE" => TokenKind::False,
        _ => TokenKind::Ident(word.to_string()),
    }
}
