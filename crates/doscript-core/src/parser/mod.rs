//! Block-structured parser.
//!
//! Lines come from [`crate::lexer::segment`]; each one is parsed on its own by
//! [`line::parse_line`] and then folded into a tree using an explicit stack of
//! open blocks. Closing keywords must match the innermost open block.

mod line;
mod tokens;

use std::path::Path;
use std::rc::Rc;

use crate::ast::*;
use crate::error::{ErrorKind, ScriptError};
use crate::lexer::{segment, SourceLine};

use line::{parse_line, Closer, Line, Opener};

/// Parses a whole source file into a [`Program`].
pub fn parse(source: &str, file: &Path) -> Result<Program, ScriptError> {
    let lines = segment(source, file)?;
    let mut parser = BlockParser::new(file);
    for source_line in &lines {
        parser.feed(source_line)?;
    }
    let statements = parser.finish()?;
    Ok(Program {
        file: file.to_path_buf(),
        statements,
    })
}

/// Parses a single expression, e.g. for evaluating snippets in tests or tools.
pub fn parse_expression(text: &str) -> Result<Expression, ScriptError> {
    line::parse_expression_text(text)
}

struct OpenBlock {
    opener: Opener,
    location: Rc<Location>,
    body: Vec<Statement>,
    else_block: Option<Vec<Statement>>,
    catches: Vec<CatchClause>,
}

impl OpenBlock {
    /// The statement list new statements are appended to.
    fn current(&mut self) -> &mut Vec<Statement> {
        match (self.catches.last_mut(), self.else_block.as_mut()) {
            (Some(catch), _) => &mut catch.body,
            (None, Some(block)) => block,
            (None, None) => &mut self.body,
        }
    }

    fn expected_closer(&self) -> Closer {
        match self.opener {
            Opener::If(_) | Opener::IfEndsWith(_) => Closer::EndIf,
            Opener::Repeat(_) => Closer::EndRepeat,
            Opener::Loop(_) => Closer::EndLoop,
            Opener::ForEach { .. } | Opener::ForEachLine { .. } => Closer::EndFor,
            Opener::Try => Closer::EndTry,
            Opener::Function { .. } => Closer::EndFunction,
            Opener::Macro { .. } => Closer::EndCommand,
        }
    }

    fn into_statement(self) -> Statement {
        let OpenBlock {
            opener,
            location,
            body,
            else_block,
            catches,
        } = self;

        let kind = match opener {
            Opener::If(condition) | Opener::IfEndsWith(condition) => StatementKind::If {
                condition,
                then_block: body,
                else_block,
            },
            Opener::Repeat(count) => StatementKind::Repeat { count, body },
            Opener::Loop(count) => StatementKind::Loop { count, body },
            Opener::ForEach { prefix, source } => StatementKind::ForEach { prefix, source, body },
            Opener::ForEachLine { variable, file } => StatementKind::ForEachLine {
                variable,
                file,
                body,
            },
            Opener::Try => StatementKind::Try { body, catches },
            Opener::Function { name, params } => {
                StatementKind::FunctionDef(Rc::new(FunctionDef { name, params, body }))
            }
            Opener::Macro { name } => StatementKind::MacroDef(Rc::new(MacroDef { name, body })),
        };

        Statement { kind, location }
    }
}

struct BlockParser<'a> {
    file: &'a Path,
    top: Vec<Statement>,
    stack: Vec<OpenBlock>,
}

impl<'a> BlockParser<'a> {
    fn new(file: &'a Path) -> Self {
        Self {
            file,
            top: Vec::new(),
            stack: Vec::new(),
        }
    }

    fn push_statement(&mut self, statement: Statement) {
        match self.stack.last_mut() {
            Some(block) => block.current().push(statement),
            None => self.top.push(statement),
        }
    }

    /// Prefix of the innermost enclosing `for_each`, if any.
    fn enclosing_for_each(&self) -> Option<&str> {
        self.stack.iter().rev().find_map(|block| match &block.opener {
            Opener::ForEach { prefix, .. } => Some(prefix.as_str()),
            _ => None,
        })
    }

    fn feed(&mut self, source_line: &SourceLine) -> Result<(), ScriptError> {
        let location = Rc::new(Location {
            file: self.file.to_path_buf(),
            line: source_line.number,
            text: source_line.text.clone(),
        });
        let located = |e: ScriptError| e.located(|| location.origin());

        match parse_line(&source_line.text).map_err(located)? {
            Line::Simple(kind) => {
                self.push_statement(Statement {
                    kind,
                    location: Rc::clone(&location),
                });
            }
            Line::Open(opener) => {
                let opener = match opener {
                    Opener::IfEndsWith(suffix) => {
                        let prefix = self.enclosing_for_each().ok_or_else(|| {
                            located(ScriptError::generic(
                                "'if_ends_with' can only be used inside a for_each loop",
                            ))
                        })?;
                        Opener::IfEndsWith(Expression::Call {
                            name: "endswith".to_string(),
                            args: vec![Expression::Identifier(prefix.to_string()), suffix],
                        })
                    }
                    other => other,
                };
                self.stack.push(OpenBlock {
                    opener,
                    location: Rc::clone(&location),
                    body: Vec::new(),
                    else_block: None,
                    catches: Vec::new(),
                });
            }
            Line::Else => match self.stack.last_mut() {
                Some(block)
                    if matches!(block.opener, Opener::If(_) | Opener::IfEndsWith(_))
                        && block.else_block.is_none() =>
                {
                    block.else_block = Some(Vec::new());
                }
                Some(block) if matches!(block.opener, Opener::If(_) | Opener::IfEndsWith(_)) => {
                    return Err(located(ScriptError::generic(format!(
                        "Duplicate 'else' for 'if' opened on line {}",
                        block.location.line
                    ))));
                }
                _ => return Err(located(ScriptError::generic("'else' without a matching 'if'"))),
            },
            Line::Catch(kind) => match self.stack.last_mut() {
                Some(block) if matches!(block.opener, Opener::Try) => {
                    block.catches.push(CatchClause {
                        kind,
                        body: Vec::new(),
                    });
                }
                _ => {
                    let what =
                        kind.map_or("catch".to_string(), |k: ErrorKind| format!("catch {}", k));
                    return Err(located(ScriptError::generic(format!(
                        "'{}' without a matching 'try'",
                        what
                    ))));
                }
            },
            Line::Close(closer) => {
                let block = self.stack.pop().ok_or_else(|| {
                    located(ScriptError::generic(format!(
                        "'{}' on line {} has no matching opening block",
                        closer.keyword(),
                        source_line.number
                    )))
                })?;
                if block.expected_closer() != closer {
                    return Err(located(ScriptError::generic(format!(
                        "'{}' on line {} does not match '{}' opened on line {} (expected '{}')",
                        closer.keyword(),
                        source_line.number,
                        block.opener.keyword(),
                        block.location.line,
                        block.expected_closer().keyword()
                    ))));
                }
                let statement = block.into_statement();
                self.push_statement(statement);
            }
        }

        Ok(())
    }

    fn finish(mut self) -> Result<Vec<Statement>, ScriptError> {
        if let Some(block) = self.stack.pop() {
            let location = Rc::clone(&block.location);
            return Err(ScriptError::generic(format!(
                "'{}' opened on line {} is never closed (expected '{}')",
                block.opener.keyword(),
                location.line,
                block.expected_closer().keyword()
            ))
            .located(|| location.origin()));
        }
        Ok(self.top)
    }
}
