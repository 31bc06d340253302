//! Parsing of a single statement line into either a simple statement or a
//! block marker (opener, `else`, `catch`, closer).

use tracing::warn;

use crate::ast::*;
use crate::error::{ErrorKind, ScriptError};
use crate::value::Value;

use super::tokens::{tokenize, Token};

/// What one line contributes to the block structure.
#[derive(Debug)]
pub(crate) enum Line {
    Simple(StatementKind),
    Open(Opener),
    Else,
    Catch(Option<ErrorKind>),
    Close(Closer),
}

#[derive(Debug)]
pub(crate) enum Opener {
    If(Expression),
    /// `if_ends_with <suffix>`; the subject is the enclosing loop variable.
    IfEndsWith(Expression),
    Repeat(Expression),
    Loop(LoopCount),
    ForEach { prefix: String, source: ForEachSource },
    ForEachLine { variable: String, file: Expression },
    Try,
    Function { name: String, params: Vec<String> },
    Macro { name: String },
}

impl Opener {
    pub(crate) fn keyword(&self) -> &'static str {
        match self {
            Opener::If(_) => "if",
            Opener::IfEndsWith(_) => "if_ends_with",
            Opener::Repeat(_) => "repeat",
            Opener::Loop(_) => "loop",
            Opener::ForEach { .. } => "for_each",
            Opener::ForEachLine { .. } => "for_each_line",
            Opener::Try => "try",
            Opener::Function { .. } => "function",
            Opener::Macro { .. } => "make a_command",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Closer {
    EndIf,
    EndRepeat,
    EndLoop,
    EndFor,
    EndTry,
    EndFunction,
    EndCommand,
}

impl Closer {
    fn from_word(word: &str) -> Option<Closer> {
        Some(match word {
            "end_if" => Closer::EndIf,
            "end_repeat" => Closer::EndRepeat,
            "end_loop" => Closer::EndLoop,
            "end_for" => Closer::EndFor,
            "end_try" => Closer::EndTry,
            "end_function" => Closer::EndFunction,
            "end_command" => Closer::EndCommand,
            _ => return None,
        })
    }

    pub(crate) fn keyword(self) -> &'static str {
        match self {
            Closer::EndIf => "end_if",
            Closer::EndRepeat => "end_repeat",
            Closer::EndLoop => "end_loop",
            Closer::EndFor => "end_for",
            Closer::EndTry => "end_try",
            Closer::EndFunction => "end_function",
            Closer::EndCommand => "end_command",
        }
    }
}

/// Statement keyword → (builtin name, separator keywords between arguments).
const COMMANDS: &[(&str, &str, &[&str])] = &[
    ("say", "say", &[]),
    ("log", "log", &[]),
    ("warn", "warn", &[]),
    ("error", "error", &[]),
    ("wait", "wait", &[]),
    ("delete", "delete", &[]),
    ("ping", "ping", &[]),
    ("run", "run", &[]),
    ("capture", "capture", &[]),
    ("kill", "kill", &[]),
    ("copy", "copy", &["to"]),
    ("move", "move", &["to"]),
    ("download", "download", &["to"]),
    ("upload", "upload", &["to"]),
];

/// Predicates accepted by the `if <predicate> <subject> <literal>` sugar,
/// mapped to the builtin the condition is rewritten to.
const PREDICATE_SUGAR: &[(&str, &str)] = &[
    ("ends_with", "endswith"),
    ("endswith", "endswith"),
    ("starts_with", "startswith"),
    ("startswith", "startswith"),
    ("contains", "contains"),
];

const RESERVED: &[&str] = &["and", "or", "not", "true", "false"];

pub(crate) fn parse_line(text: &str) -> Result<Line, ScriptError> {
    let tokens = tokenize(text)?;
    let mut parser = LineParser::new(tokens);
    let line = parser.parse_line()?;
    parser.expect_end()?;
    Ok(line)
}

/// Parses a standalone expression (used by tests and by `for_each` sources).
pub(crate) fn parse_expression_text(text: &str) -> Result<Expression, ScriptError> {
    let mut parser = LineParser::new(tokenize(text)?);
    let expr = parser.parse_expression()?;
    parser.expect_end()?;
    Ok(expr)
}

struct LineParser {
    tokens: Vec<Token>,
    pos: usize,
}

impl LineParser {
    fn new(tokens: Vec<Token>) -> Self {
        Self { tokens, pos: 0 }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn peek_at(&self, offset: usize) -> Option<&Token> {
        self.tokens.get(self.pos + offset)
    }

    fn advance(&mut self) -> Option<Token> {
        let t = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        t
    }

    fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn peek_ident(&self) -> Option<&str> {
        match self.peek() {
            Some(Token::Ident(s)) => Some(s),
            _ => None,
        }
    }

    fn is_keyword(&self, word: &str) -> bool {
        self.peek_ident() == Some(word)
    }

    fn expect(&mut self, expected: &Token) -> Result<(), ScriptError> {
        match self.advance() {
            Some(ref t) if t == expected => Ok(()),
            Some(t) => Err(ScriptError::generic(format!(
                "Expected {}, got {}",
                expected.describe(),
                t.describe()
            ))),
            None => Err(ScriptError::generic(format!(
                "Expected {}, got end of line",
                expected.describe()
            ))),
        }
    }

    fn expect_keyword(&mut self, word: &str) -> Result<(), ScriptError> {
        self.expect(&Token::Ident(word.to_string()))
    }

    fn expect_end(&mut self) -> Result<(), ScriptError> {
        match self.peek() {
            None => Ok(()),
            Some(t) => Err(ScriptError::generic(format!(
                "Unexpected {} at end of statement",
                t.describe()
            ))),
        }
    }

    fn expect_name(&mut self, what: &str) -> Result<String, ScriptError> {
        match self.advance() {
            Some(Token::Ident(s)) if !RESERVED.contains(&s.as_str()) => Ok(s),
            Some(t) => Err(ScriptError::generic(format!(
                "Expected {}, got {}",
                what,
                t.describe()
            ))),
            None => Err(ScriptError::generic(format!("Expected {}, got end of line", what))),
        }
    }

    fn parse_name_list(&mut self, what: &str) -> Result<Vec<String>, ScriptError> {
        let mut names = vec![self.expect_name(what)?];
        while self.peek() == Some(&Token::Comma) {
            self.advance();
            names.push(self.expect_name(what)?);
        }
        Ok(names)
    }

    fn parse_line(&mut self) -> Result<Line, ScriptError> {
        let first = match self.peek() {
            Some(Token::Ident(s)) => s.clone(),
            Some(t) => {
                return Err(ScriptError::generic(format!(
                    "Expected a statement, got {}",
                    t.describe()
                )))
            }
            None => return Err(ScriptError::generic("Empty statement")),
        };

        match first.as_str() {
            "global_variable" | "local_variable" => {
                self.advance();
                self.expect(&Token::Assign)?;
                let names = self.parse_name_list("a variable name")?;
                return Ok(Line::Simple(if first == "global_variable" {
                    StatementKind::DeclareGlobal(names)
                } else {
                    StatementKind::DeclareLocal(names)
                }));
            }
            _ => {}
        }

        if self.peek_at(1) == Some(&Token::Assign) {
            return self.parse_assignment();
        }

        if let Some(closer) = Closer::from_word(&first) {
            self.advance();
            return Ok(Line::Close(closer));
        }

        match first.as_str() {
            "if" => self.parse_if(),
            "if_ends_with" => {
                self.advance();
                Ok(Line::Open(Opener::IfEndsWith(self.parse_expression()?)))
            }
            "else" => {
                self.advance();
                Ok(Line::Else)
            }
            "repeat" => {
                self.advance();
                Ok(Line::Open(Opener::Repeat(self.parse_expression()?)))
            }
            "loop" => {
                self.advance();
                if self.is_keyword("forever") && self.peek_at(1).is_none() {
                    self.advance();
                    Ok(Line::Open(Opener::Loop(LoopCount::Forever)))
                } else {
                    Ok(Line::Open(Opener::Loop(LoopCount::Times(self.parse_expression()?))))
                }
            }
            "for_each" => self.parse_for_each(),
            "for_each_line" => {
                self.advance();
                let variable = self.expect_name("a loop variable")?;
                self.expect_keyword("in")?;
                let file = self.parse_expression()?;
                Ok(Line::Open(Opener::ForEachLine { variable, file }))
            }
            "try" => {
                self.advance();
                Ok(Line::Open(Opener::Try))
            }
            "catch" => {
                self.advance();
                match self.advance() {
                    None => Ok(Line::Catch(None)),
                    Some(Token::Ident(name)) => ErrorKind::from_catch_name(&name)
                        .map(|kind| Line::Catch(Some(kind)))
                        .ok_or_else(|| {
                            ScriptError::generic(format!("Unknown error kind '{}' in catch", name))
                        }),
                    Some(t) => Err(ScriptError::generic(format!(
                        "Expected an error kind after 'catch', got {}",
                        t.describe()
                    ))),
                }
            }
            "function" => self.parse_function(),
            "make" => self.parse_make(),
            "return" => {
                self.advance();
                if self.at_end() {
                    Ok(Line::Simple(StatementKind::Return(None)))
                } else {
                    Ok(Line::Simple(StatementKind::Return(Some(self.parse_expression()?))))
                }
            }
            "break" => {
                self.advance();
                Ok(Line::Simple(StatementKind::Break))
            }
            "continue" => {
                self.advance();
                Ok(Line::Simple(StatementKind::Continue))
            }
            "include" => {
                self.advance();
                Ok(Line::Simple(StatementKind::Include(self.parse_expression()?)))
            }
            "script_path" => {
                self.advance();
                self.parse_script_path()
            }
            "path" if self.peek_is_path_op() => {
                warn!("'path' is deprecated; use 'script_path'");
                self.advance();
                self.parse_script_path()
            }
            "ask" => {
                self.advance();
                let target = self.expect_name("a variable name after 'ask'")?;
                let prompt = self.parse_expression()?;
                Ok(Line::Simple(StatementKind::Ask { target, prompt }))
            }
            "pause" => {
                self.advance();
                Ok(Line::Simple(StatementKind::Call(CommandCall {
                    name: "pause".to_string(),
                    args: vec![],
                })))
            }
            "exit" => {
                self.advance();
                if self.at_end() {
                    Ok(Line::Simple(StatementKind::Exit(None)))
                } else {
                    Ok(Line::Simple(StatementKind::Exit(Some(self.parse_expression()?))))
                }
            }
            word => {
                if let Some((_, builtin, separators)) =
                    COMMANDS.iter().find(|(kw, _, _)| *kw == word)
                {
                    self.advance();
                    let call = self.parse_command_args(builtin, separators)?;
                    return Ok(Line::Simple(StatementKind::Call(call)));
                }
                if self.peek_at(1) == Some(&Token::LParen) {
                    let expr = self.parse_expression()?;
                    return match expr {
                        Expression::Call { .. } => {
                            Ok(Line::Simple(StatementKind::Expression(expr)))
                        }
                        _ => Err(ScriptError::generic(
                            "Only function calls may be used as statements",
                        )),
                    };
                }
                Err(ScriptError::generic(format!("Unknown statement '{}'", word)))
            }
        }
    }

    fn parse_assignment(&mut self) -> Result<Line, ScriptError> {
        let target = self.expect_name("an assignment target")?;
        self.expect(&Token::Assign)?;

        // `x = run "cmd"` / `x = capture "cmd"` capture the command's result.
        if let Some(word @ ("run" | "capture")) = self.peek_ident() {
            let builtin = word.to_string();
            if matches!(
                self.peek_at(1),
                Some(Token::Str(_) | Token::Interpolated(_) | Token::Ident(_))
            ) {
                self.advance();
                let call = self.parse_command_args(&builtin, &[])?;
                return Ok(Line::Simple(StatementKind::Assign {
                    target,
                    value: AssignValue::Command(call),
                }));
            }
        }

        let value = self.parse_expression()?;
        Ok(Line::Simple(StatementKind::Assign {
            target,
            value: AssignValue::Expr(value),
        }))
    }

    /// True at `path add|remove|list`, the deprecated `script_path` spelling.
    fn peek_is_path_op(&self) -> bool {
        matches!(
            self.peek_at(1),
            Some(Token::Ident(op)) if op == "add" || op == "remove" || op == "list"
        )
    }

    fn parse_command_args(
        &mut self,
        builtin: &str,
        separators: &[&str],
    ) -> Result<CommandCall, ScriptError> {
        let mut args = vec![self.parse_expression()?];
        for sep in separators {
            self.expect_keyword(sep)?;
            args.push(self.parse_expression()?);
        }
        Ok(CommandCall {
            name: builtin.to_string(),
            args,
        })
    }

    fn parse_if(&mut self) -> Result<Line, ScriptError> {
        self.expect_keyword("if")?;

        if let Some(word) = self.peek_ident().map(str::to_string) {
            let sugar = PREDICATE_SUGAR.iter().find(|(name, _)| *name == word);
            if let Some((_, builtin)) = sugar {
                if self.peek_at(1).is_some() && self.peek_at(1) != Some(&Token::LParen) {
                    self.advance();
                    let subject = self.parse_expression()?;
                    let literal = match self.advance() {
                        Some(Token::Str(s)) => Expression::Literal(Value::String(s)),
                        Some(Token::Interpolated(segments)) => Expression::Interpolated(segments),
                        _ => {
                            return Err(ScriptError::generic(format!(
                                "'if {}' expects a subject followed by a quoted string",
                                word
                            )))
                        }
                    };
                    return Ok(Line::Open(Opener::If(Expression::Call {
                        name: builtin.to_string(),
                        args: vec![subject, literal],
                    })));
                }
            }
        }

        Ok(Line::Open(Opener::If(self.parse_expression()?)))
    }

    fn parse_for_each(&mut self) -> Result<Line, ScriptError> {
        self.expect_keyword("for_each")?;
        let word = self.expect_name("a loop variable after 'for_each'")?;

        if self.is_keyword("in") {
            self.advance();
            let source = match self.parse_scope_keyword() {
                Some(scope) => ForEachSource::Scope(scope),
                None => {
                    let mut items = vec![self.parse_expression()?];
                    while self.peek() == Some(&Token::Comma) {
                        self.advance();
                        items.push(self.parse_expression()?);
                    }
                    ForEachSource::Items(items)
                }
            };
            return Ok(Line::Open(Opener::ForEach { prefix: word, source }));
        }

        match word.strip_suffix("_in") {
            Some(prefix) if !prefix.is_empty() => {
                let source = match self.parse_scope_keyword() {
                    Some(scope) => ForEachSource::Scope(scope),
                    None => ForEachSource::Pattern(self.parse_expression()?),
                };
                Ok(Line::Open(Opener::ForEach {
                    prefix: prefix.to_string(),
                    source,
                }))
            }
            _ => Err(ScriptError::generic(
                "Expected 'for_each <name> in <items>' or 'for_each <name>_in <pattern>'",
            )),
        }
    }

    fn parse_scope_keyword(&mut self) -> Option<ScopeKeyword> {
        let scope = match self.peek_ident()? {
            "here" => ScopeKeyword::Here,
            "deep" => ScopeKeyword::Deep,
            _ => return None,
        };
        if self.peek_at(1).is_some() {
            return None;
        }
        self.advance();
        Some(scope)
    }

    fn parse_function(&mut self) -> Result<Line, ScriptError> {
        self.expect_keyword("function")?;
        let name = self.expect_name("a function name")?;
        let mut params = Vec::new();

        if self.peek() == Some(&Token::LParen) {
            self.advance();
            if self.peek() != Some(&Token::RParen) {
                params = self.parse_name_list("a parameter name")?;
            }
            self.expect(&Token::RParen)?;
        } else {
            while !self.at_end() {
                params.push(self.expect_name("a parameter name")?);
                if self.peek() == Some(&Token::Comma) {
                    self.advance();
                }
            }
        }

        for (i, p) in params.iter().enumerate() {
            if params[..i].contains(p) {
                return Err(ScriptError::generic(format!(
                    "Duplicate parameter '{}' in function '{}'",
                    p, name
                )));
            }
        }

        Ok(Line::Open(Opener::Function { name, params }))
    }

    fn parse_make(&mut self) -> Result<Line, ScriptError> {
        self.expect_keyword("make")?;
        match self.peek_ident() {
            Some("a_command") => {
                self.advance();
                let name = self.expect_name("a command name")?;
                Ok(Line::Open(Opener::Macro { name }))
            }
            Some("a") if matches!(self.peek_at(1), Some(Token::Ident(w)) if w == "command") => {
                warn!("'make a command' is deprecated; use 'make a_command'");
                self.advance();
                self.advance();
                let name = self.expect_name("a command name")?;
                Ok(Line::Open(Opener::Macro { name }))
            }
            Some("folder") => {
                self.advance();
                Ok(Line::Simple(StatementKind::Call(self.parse_command_args("make_folder", &[])?)))
            }
            Some("file") => {
                self.advance();
                let call = self.parse_command_args("make_file", &["with"])?;
                Ok(Line::Simple(StatementKind::Call(call)))
            }
            _ => Err(ScriptError::generic(
                "Expected 'make folder', 'make file' or 'make a_command'",
            )),
        }
    }

    fn parse_script_path(&mut self) -> Result<Line, ScriptError> {
        let op = match self.advance() {
            Some(Token::Ident(op)) => op,
            _ => return Err(ScriptError::generic("Expected 'add', 'remove' or 'list'")),
        };
        let op = match op.as_str() {
            "add" => ScriptPathOp::Add(self.parse_expression()?),
            "remove" => ScriptPathOp::Remove(self.parse_expression()?),
            "list" => ScriptPathOp::List,
            other => {
                return Err(ScriptError::generic(format!(
                    "Unknown script_path operation '{}'",
                    other
                )))
            }
        };
        Ok(Line::Simple(StatementKind::ScriptPath(op)))
    }

    // ── Expressions ──────────────────────────────────────────────────────────

    fn parse_expression(&mut self) -> Result<Expression, ScriptError> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> Result<Expression, ScriptError> {
        let mut left = self.parse_and()?;
        while self.is_keyword("or") {
            self.advance();
            let right = self.parse_and()?;
            left = binary(BinOp::Or, left, right);
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expression, ScriptError> {
        let mut left = self.parse_not()?;
        while self.is_keyword("and") {
            self.advance();
            let right = self.parse_not()?;
            left = binary(BinOp::And, left, right);
        }
        Ok(left)
    }

    fn parse_not(&mut self) -> Result<Expression, ScriptError> {
        if self.is_keyword("not") {
            self.advance();
            let operand = self.parse_not()?;
            return Ok(Expression::Unary {
                op: UnaryOp::Not,
                operand: Box::new(operand),
            });
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Result<Expression, ScriptError> {
        let left = self.parse_additive()?;
        let op = match self.peek() {
            Some(Token::EqEq) => BinOp::Eq,
            Some(Token::NotEq) => BinOp::NotEq,
            Some(Token::Lt) => BinOp::Lt,
            Some(Token::Gt) => BinOp::Gt,
            Some(Token::LtEq) => BinOp::LtEq,
            Some(Token::GtEq) => BinOp::GtEq,
            _ => return Ok(left),
        };
        self.advance();
        let right = self.parse_additive()?;
        Ok(binary(op, left, right))
    }

    fn parse_additive(&mut self) -> Result<Expression, ScriptError> {
        let mut left = self.parse_term()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinOp::Add,
                Some(Token::Minus) => BinOp::Sub,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.parse_term()?;
            left = binary(op, left, right);
        }
    }

    fn parse_term(&mut self) -> Result<Expression, ScriptError> {
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => BinOp::Mul,
                Some(Token::Slash) => BinOp::Div,
                Some(Token::Percent) => BinOp::Mod,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.parse_unary()?;
            left = binary(op, left, right);
        }
    }

    fn parse_unary(&mut self) -> Result<Expression, ScriptError> {
        if self.peek() == Some(&Token::Minus) {
            self.advance();
            let operand = self.parse_unary()?;
            return Ok(Expression::Unary {
                op: UnaryOp::Neg,
                operand: Box::new(operand),
            });
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Expression, ScriptError> {
        match self.advance() {
            Some(Token::Int(n)) => Ok(Expression::Literal(Value::Integer(n))),
            Some(Token::Float(x)) => Ok(Expression::Literal(Value::Float(x))),
            Some(Token::Str(s)) => Ok(Expression::Literal(Value::String(s))),
            Some(Token::Interpolated(segments)) => Ok(match segments.as_slice() {
                [StringSegment::Literal(s)] => Expression::Literal(Value::String(s.clone())),
                _ => Expression::Interpolated(segments),
            }),
            Some(Token::LParen) => {
                let inner = self.parse_expression()?;
                self.expect(&Token::RParen)?;
                Ok(inner)
            }
            Some(Token::Ident(name)) => match name.as_str() {
                "true" => Ok(Expression::Literal(Value::Boolean(true))),
                "false" => Ok(Expression::Literal(Value::Boolean(false))),
                "and" | "or" | "not" => Err(ScriptError::generic(format!(
                    "Unexpected '{}' in expression",
                    name
                ))),
                _ => {
                    if self.peek() == Some(&Token::LParen) {
                        self.advance();
                        let mut args = Vec::new();
                        if self.peek() != Some(&Token::RParen) {
                            args.push(self.parse_expression()?);
                            while self.peek() == Some(&Token::Comma) {
                                self.advance();
                                args.push(self.parse_expression()?);
                            }
                        }
                        self.expect(&Token::RParen)?;
                        Ok(Expression::Call { name, args })
                    } else {
                        Ok(Expression::Identifier(name))
                    }
                }
            },
            Some(t) => Err(ScriptError::generic(format!(
                "Unexpected {} in expression",
                t.describe()
            ))),
            None => Err(ScriptError::generic("Unexpected end of line in expression")),
        }
    }
}

fn binary(op: BinOp, left: Expression, right: Expression) -> Expression {
    Expression::Binary {
        op,
        left: Box::new(left),
        right: Box::new(right),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn simple(text: &str) -> StatementKind {
        match parse_line(text).unwrap() {
            Line::Simple(kind) => kind,
            other => panic!("Expected simple statement, got {:?}", other),
        }
    }

    fn opener(text: &str) -> Opener {
        match parse_line(text).unwrap() {
            Line::Open(o) => o,
            other => panic!("Expected block opener, got {:?}", other),
        }
    }

    #[test]
    fn test_precedence() {
        let expr = parse_expression_text("1 + 2 * 3 == 7 and not false").unwrap();
        match expr {
            Expression::Binary { op: BinOp::And, left, right } => {
                assert!(matches!(*left, Expression::Binary { op: BinOp::Eq, .. }));
                assert!(matches!(*right, Expression::Unary { op: UnaryOp::Not, .. }));
            }
            other => panic!("Expected And, got {:?}", other),
        }
    }

    #[test]
    fn test_left_associative_subtraction() {
        let expr = parse_expression_text("10 - 4 - 3").unwrap();
        match expr {
            Expression::Binary { op: BinOp::Sub, left, right } => {
                assert!(matches!(*left, Expression::Binary { op: BinOp::Sub, .. }));
                assert_eq!(*right, Expression::Literal(Value::Integer(3)));
            }
            other => panic!("Expected Sub, got {:?}", other),
        }
    }

    #[test]
    fn test_call_with_args() {
        let expr = parse_expression_text("substring(name, 0, 3)").unwrap();
        match expr {
            Expression::Call { name, args } => {
                assert_eq!(name, "substring");
                assert_eq!(args.len(), 3);
            }
            other => panic!("Expected Call, got {:?}", other),
        }
    }

    #[test]
    fn test_single_quoted_without_placeholders_is_literal() {
        assert_eq!(
            parse_expression_text("'plain'").unwrap(),
            Expression::Literal(Value::String("plain".to_string()))
        );
    }

    #[test]
    fn test_declarations() {
        match simple("global_variable = a, b, c") {
            StatementKind::DeclareGlobal(names) => assert_eq!(names, vec!["a", "b", "c"]),
            other => panic!("Expected DeclareGlobal, got {:?}", other),
        }
        match simple("local_variable = tmp") {
            StatementKind::DeclareLocal(names) => assert_eq!(names, vec!["tmp"]),
            other => panic!("Expected DeclareLocal, got {:?}", other),
        }
    }

    #[test]
    fn test_assignment_forms() {
        match simple("x = 1 + 2") {
            StatementKind::Assign { target, value: AssignValue::Expr(_) } => {
                assert_eq!(target, "x")
            }
            other => panic!("Expected Assign, got {:?}", other),
        }
        match simple("code = run \"make build\"") {
            StatementKind::Assign { value: AssignValue::Command(call), .. } => {
                assert_eq!(call.name, "run")
            }
            other => panic!("Expected command Assign, got {:?}", other),
        }
        match simple("out = capture 'git rev-parse {ref}'") {
            StatementKind::Assign { value: AssignValue::Command(call), .. } => {
                assert_eq!(call.name, "capture")
            }
            other => panic!("Expected command Assign, got {:?}", other),
        }
    }

    #[test]
    fn test_commands_with_separators() {
        match simple("copy \"a.txt\" to 'backup/{name}'") {
            StatementKind::Call(call) => {
                assert_eq!(call.name, "copy");
                assert_eq!(call.args.len(), 2);
            }
            other => panic!("Expected Call, got {:?}", other),
        }
        match simple("make file \"notes.txt\" with \"hello\"") {
            StatementKind::Call(call) => {
                assert_eq!(call.name, "make_file");
                assert_eq!(call.args.len(), 2);
            }
            other => panic!("Expected Call, got {:?}", other),
        }
        match simple("make folder \"out\"") {
            StatementKind::Call(call) => assert_eq!(call.name, "make_folder"),
            other => panic!("Expected Call, got {:?}", other),
        }
        assert!(parse_line("copy \"a\" \"b\"").is_err());
    }

    #[test]
    fn test_ends_with_sugar_rewrites_to_call() {
        let sugar = match opener("if ends_with file \".txt\"") {
            Opener::If(cond) => cond,
            other => panic!("Expected If, got {:?}", other),
        };
        let explicit = match opener("if endswith(file, \".txt\")") {
            Opener::If(cond) => cond,
            other => panic!("Expected If, got {:?}", other),
        };
        assert_eq!(sugar, explicit);
    }

    #[test]
    fn test_sugar_requires_literal() {
        assert!(parse_line("if ends_with file suffix").is_err());
    }

    #[test]
    fn test_for_each_forms() {
        match opener("for_each f in \"a\", \"b\", \"c\"") {
            Opener::ForEach { prefix, source: ForEachSource::Items(items) } => {
                assert_eq!(prefix, "f");
                assert_eq!(items.len(), 3);
            }
            other => panic!("Expected ForEach items, got {:?}", other),
        }
        match opener("for_each file_in \"*.log\"") {
            Opener::ForEach { prefix, source: ForEachSource::Pattern(_) } => {
                assert_eq!(prefix, "file")
            }
            other => panic!("Expected ForEach pattern, got {:?}", other),
        }
        match opener("for_each entry in deep") {
            Opener::ForEach { source: ForEachSource::Scope(ScopeKeyword::Deep), .. } => {}
            other => panic!("Expected ForEach deep, got {:?}", other),
        }
        match opener("for_each item_in here") {
            Opener::ForEach { prefix, source: ForEachSource::Scope(ScopeKeyword::Here) } => {
                assert_eq!(prefix, "item")
            }
            other => panic!("Expected ForEach here, got {:?}", other),
        }
        assert!(parse_line("for_each x \"a\"").is_err());
    }

    #[test]
    fn test_function_headers() {
        match opener("function greet name greeting") {
            Opener::Function { name, params } => {
                assert_eq!(name, "greet");
                assert_eq!(params, vec!["name", "greeting"]);
            }
            other => panic!("Expected Function, got {:?}", other),
        }
        match opener("function add(a, b)") {
            Opener::Function { params, .. } => assert_eq!(params, vec!["a", "b"]),
            other => panic!("Expected Function, got {:?}", other),
        }
        match opener("function tick()") {
            Opener::Function { params, .. } => assert!(params.is_empty()),
            other => panic!("Expected Function, got {:?}", other),
        }
        assert!(parse_line("function f a a").is_err());
    }

    #[test]
    fn test_macro_headers() {
        for header in ["make a_command deploy", "make a command deploy"] {
            assert!(matches!(opener(header), Opener::Macro { name } if name == "deploy"));
        }
    }

    #[test]
    fn test_catch_kinds() {
        assert!(matches!(parse_line("catch").unwrap(), Line::Catch(None)));
        assert!(matches!(
            parse_line("catch NetworkError").unwrap(),
            Line::Catch(Some(ErrorKind::Network))
        ));
        assert!(parse_line("catch BogusError").is_err());
    }

    #[test]
    fn test_closers_and_markers() {
        assert!(matches!(parse_line("end_if").unwrap(), Line::Close(Closer::EndIf)));
        assert!(matches!(parse_line("end_for").unwrap(), Line::Close(Closer::EndFor)));
        assert!(matches!(parse_line("else").unwrap(), Line::Else));
        assert!(parse_line("end_if now").is_err());
    }

    #[test]
    fn test_loop_forever_and_count() {
        assert!(matches!(opener("loop forever"), Opener::Loop(LoopCount::Forever)));
        assert!(matches!(opener("loop 3"), Opener::Loop(LoopCount::Times(_))));
    }

    #[test]
    fn test_script_path_and_deprecated_path() {
        assert!(matches!(
            simple("script_path add \"lib\""),
            StatementKind::ScriptPath(ScriptPathOp::Add(_))
        ));
        assert!(matches!(
            simple("script_path list"),
            StatementKind::ScriptPath(ScriptPathOp::List)
        ));
        assert!(matches!(
            simple("path remove \"lib\""),
            StatementKind::ScriptPath(ScriptPathOp::Remove(_))
        ));
    }

    #[test]
    fn test_bare_function_call_statement() {
        assert!(matches!(
            simple("greet(\"bob\")"),
            StatementKind::Expression(Expression::Call { .. })
        ));
        assert!(parse_line("frobnicate \"x\"").is_err());
    }

    #[test]
    fn test_return_exit_and_ask() {
        assert!(matches!(simple("return"), StatementKind::Return(None)));
        assert!(matches!(simple("return a + 1"), StatementKind::Return(Some(_))));
        assert!(matches!(simple("exit"), StatementKind::Exit(None)));
        assert!(matches!(simple("exit 3"), StatementKind::Exit(Some(_))));
        assert!(matches!(simple("ask name \"Your name?\""), StatementKind::Ask { .. }));
    }

    #[test]
    fn test_trailing_tokens_rejected() {
        assert!(parse_line("break now").is_err());
        assert!(parse_line("x = 1 2").is_err());
    }
}
