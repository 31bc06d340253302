use crate::ast::StringSegment;
use crate::error::ScriptError;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Token {
    Ident(String),
    /// Double-quoted string with escapes already decoded.
    Str(String),
    /// Single-quoted string, split into interpolation segments.
    Interpolated(Vec<StringSegment>),
    Int(i64),
    Float(f64),
    LParen,
    RParen,
    Comma,
    Assign,
    EqEq,
    NotEq,
    Lt,
    Gt,
    LtEq,
    GtEq,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
}

impl Token {
    pub(crate) fn describe(&self) -> String {
        match self {
            Token::Ident(s) => format!("'{}'", s),
            Token::Str(s) => format!("\"{}\"", s),
            Token::Interpolated(_) => "a single-quoted string".to_string(),
            Token::Int(n) => n.to_string(),
            Token::Float(x) => x.to_string(),
            Token::LParen => "'('".to_string(),
            Token::RParen => "')'".to_string(),
            Token::Comma => "','".to_string(),
            Token::Assign => "'='".to_string(),
            Token::EqEq => "'=='".to_string(),
            Token::NotEq => "'!='".to_string(),
            Token::Lt => "'<'".to_string(),
            Token::Gt => "'>'".to_string(),
            Token::LtEq => "'<='".to_string(),
            Token::GtEq => "'>='".to_string(),
            Token::Plus => "'+'".to_string(),
            Token::Minus => "'-'".to_string(),
            Token::Star => "'*'".to_string(),
            Token::Slash => "'/'".to_string(),
            Token::Percent => "'%'".to_string(),
        }
    }
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Tokenizes one statement line.
pub(crate) fn tokenize(line: &str) -> Result<Vec<Token>, ScriptError> {
    let mut tokens = Vec::new();
    let mut chars = line.chars().peekable();

    while let Some(&ch) = chars.peek() {
        match ch {
            ' ' | '\t' | '\r' => {
                chars.next();
            }
            '(' | ')' | ',' | '+' | '-' | '*' | '/' | '%' => {
                chars.next();
                tokens.push(match ch {
                    '(' => Token::LParen,
                    ')' => Token::RParen,
                    ',' => Token::Comma,
                    '+' => Token::Plus,
                    '-' => Token::Minus,
                    '*' => Token::Star,
                    '/' => Token::Slash,
                    _ => Token::Percent,
                });
            }
            '=' => {
                chars.next();
                if chars.peek() == Some(&'=') {
                    chars.next();
                    tokens.push(Token::EqEq);
                } else {
                    tokens.push(Token::Assign);
                }
            }
            '!' => {
                chars.next();
                if chars.peek() == Some(&'=') {
                    chars.next();
                    tokens.push(Token::NotEq);
                } else {
                    return Err(ScriptError::generic(
                        "Expected '=' after '!' (use 'not' for negation)",
                    ));
                }
            }
            '<' | '>' => {
                chars.next();
                let with_eq = chars.peek() == Some(&'=');
                if with_eq {
                    chars.next();
                }
                tokens.push(match (ch, with_eq) {
                    ('<', false) => Token::Lt,
                    ('<', true) => Token::LtEq,
                    ('>', false) => Token::Gt,
                    _ => Token::GtEq,
                });
            }
            '"' => {
                chars.next();
                let mut s = String::new();
                loop {
                    match chars.next() {
                        Some('\\') => match chars.next() {
                            Some('n') => s.push('\n'),
                            Some('t') => s.push('\t'),
                            Some('\\') => s.push('\\'),
                            Some('"') => s.push('"'),
                            Some(c) => {
                                s.push('\\');
                                s.push(c);
                            }
                            None => return Err(ScriptError::generic("Unterminated string literal")),
                        },
                        Some('"') => break,
                        Some(c) => s.push(c),
                        None => return Err(ScriptError::generic("Unterminated string literal")),
                    }
                }
                tokens.push(Token::Str(s));
            }
            '\'' => {
                chars.next();
                let mut raw = String::new();
                loop {
                    match chars.next() {
                        Some('\\') => match chars.next() {
                            Some(c) => {
                                raw.push('\\');
                                raw.push(c);
                            }
                            None => return Err(ScriptError::generic("Unterminated string literal")),
                        },
                        Some('\'') => break,
                        Some(c) => raw.push(c),
                        None => return Err(ScriptError::generic("Unterminated string literal")),
                    }
                }
                tokens.push(Token::Interpolated(split_interpolation(&raw)));
            }
            c if c.is_ascii_digit() => {
                let mut num_str = String::new();
                let mut is_float = false;
                while let Some(&d) = chars.peek() {
                    if d.is_ascii_digit() {
                        num_str.push(d);
                        chars.next();
                    } else if d == '.' && !is_float {
                        // Only a dot followed by a digit continues the number.
                        let mut lookahead = chars.clone();
                        lookahead.next();
                        if !matches!(lookahead.peek(), Some(n) if n.is_ascii_digit()) {
                            break;
                        }
                        is_float = true;
                        num_str.push(d);
                        chars.next();
                    } else {
                        break;
                    }
                }
                if is_float {
                    let x: f64 = num_str
                        .parse()
                        .map_err(|_| ScriptError::generic(format!("Invalid number: {}", num_str)))?;
                    tokens.push(Token::Float(x));
                } else {
                    let n: i64 = num_str
                        .parse()
                        .map_err(|_| ScriptError::generic(format!("Invalid number: {}", num_str)))?;
                    tokens.push(Token::Int(n));
                }
            }
            c if is_ident_char(c) => {
                let mut ident = String::new();
                while let Some(&c) = chars.peek() {
                    if is_ident_char(c) {
                        ident.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(Token::Ident(ident));
            }
            _ => {
                return Err(ScriptError::generic(format!("Unexpected character: '{}'", ch)));
            }
        }
    }

    Ok(tokens)
}

/// Splits the body of a single-quoted string into literal and `{name}` parts.
///
/// `\{` and `\}` produce literal braces, `\'` and `\\` their literal character.
/// Any other escape is kept verbatim. A `{` that does not start a well-formed
/// `{identifier}` span is literal text.
pub(crate) fn split_interpolation(raw: &str) -> Vec<StringSegment> {
    let mut segments = Vec::new();
    let mut literal = String::new();
    let chars: Vec<char> = raw.chars().collect();
    let mut i = 0;

    while i < chars.len() {
        match chars[i] {
            '\\' if i + 1 < chars.len() => {
                match chars[i + 1] {
                    c @ ('{' | '}' | '\'' | '\\') => literal.push(c),
                    c => {
                        literal.push('\\');
                        literal.push(c);
                    }
                }
                i += 2;
            }
            '{' => {
                let name_len = chars[i + 1..].iter().take_while(|c| is_ident_char(**c)).count();
                let close = i + 1 + name_len;
                if name_len > 0 && chars.get(close) == Some(&'}') {
                    if !literal.is_empty() {
                        segments.push(StringSegment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(StringSegment::Variable(chars[i + 1..close].iter().collect()));
                    i = close + 1;
                } else {
                    literal.push('{');
                    i += 1;
                }
            }
            c => {
                literal.push(c);
                i += 1;
            }
        }
    }

    if !literal.is_empty() || segments.is_empty() {
        segments.push(StringSegment::Literal(literal));
    }
    segments
}
