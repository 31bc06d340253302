use std::path::PathBuf;
use std::rc::Rc;

use crate::error::{ErrorKind, Origin};
use crate::value::Value;

/// A parsed source file.
#[derive(Debug, Clone)]
pub struct Program {
    pub file: PathBuf,
    pub statements: Vec<Statement>,
}

/// A statement plus the location it was parsed from.
#[derive(Debug, Clone)]
pub struct Statement {
    pub kind: StatementKind,
    pub location: Rc<Location>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    pub file: PathBuf,
    pub line: usize,
    pub text: String,
}

impl Location {
    pub fn origin(&self) -> Origin {
        Origin {
            file: self.file.clone(),
            line: self.line,
            text: self.text.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub enum StatementKind {
    Assign {
        target: String,
        value: AssignValue,
    },
    DeclareGlobal(Vec<String>),
    DeclareLocal(Vec<String>),
    If {
        condition: Expression,
        then_block: Vec<Statement>,
        else_block: Option<Vec<Statement>>,
    },
    Repeat {
        count: Expression,
        body: Vec<Statement>,
    },
    Loop {
        count: LoopCount,
        body: Vec<Statement>,
    },
    ForEach {
        prefix: String,
        source: ForEachSource,
        body: Vec<Statement>,
    },
    ForEachLine {
        variable: String,
        file: Expression,
        body: Vec<Statement>,
    },
    Try {
        body: Vec<Statement>,
        catches: Vec<CatchClause>,
    },
    FunctionDef(Rc<FunctionDef>),
    MacroDef(Rc<MacroDef>),
    Return(Option<Expression>),
    Break,
    Continue,
    Include(Expression),
    ScriptPath(ScriptPathOp),
    Ask {
        target: String,
        prompt: Expression,
    },
    Exit(Option<Expression>),
    /// A builtin command such as `say`, `make folder` or `run`.
    Call(CommandCall),
    /// A bare function call whose result is discarded.
    Expression(Expression),
}

/// Right-hand side of an assignment.
#[derive(Debug, Clone)]
pub enum AssignValue {
    Expr(Expression),
    /// `x = run "cmd"` / `x = capture "cmd"`: the command's captured result.
    Command(CommandCall),
}

#[derive(Debug, Clone)]
pub enum LoopCount {
    Times(Expression),
    Forever,
}

#[derive(Debug, Clone)]
pub enum ForEachSource {
    /// `for_each f in a, b, c`. A single glob string or list value switches to
    /// enumeration at run time.
    Items(Vec<Expression>),
    /// `for_each f_in "<pattern>"`: always filesystem enumeration.
    Pattern(Expression),
    /// `here` or `deep`.
    Scope(ScopeKeyword),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKeyword {
    Here,
    Deep,
}

#[derive(Debug, Clone)]
pub struct CatchClause {
    /// `None` catches every kind.
    pub kind: Option<ErrorKind>,
    pub body: Vec<Statement>,
}

impl CatchClause {
    pub fn matches(&self, kind: ErrorKind) -> bool {
        self.kind.map_or(true, |k| k == kind)
    }
}

#[derive(Debug, Clone)]
pub struct FunctionDef {
    pub name: String,
    pub params: Vec<String>,
    pub body: Vec<Statement>,
}

#[derive(Debug, Clone)]
pub struct MacroDef {
    pub name: String,
    pub body: Vec<Statement>,
}

#[derive(Debug, Clone)]
pub enum ScriptPathOp {
    Add(Expression),
    Remove(Expression),
    List,
}

#[derive(Debug, Clone)]
pub struct CommandCall {
    /// Registry name of the builtin, e.g. `make_folder`.
    pub name: String,
    pub args: Vec<Expression>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    Literal(Value),
    /// A single-quoted string, split into literal and `{name}` parts.
    Interpolated(Vec<StringSegment>),
    Identifier(String),
    Call {
        name: String,
        args: Vec<Expression>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expression>,
    },
    Binary {
        op: BinOp,
        left: Box<Expression>,
        right: Box<Expression>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StringSegment {
    Literal(String),
    Variable(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    NotEq,
    Lt,
    Gt,
    LtEq,
    GtEq,
    And,
    Or,
}

impl BinOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Mod => "%",
            BinOp::Eq => "==",
            BinOp::NotEq => "!=",
            BinOp::Lt => "<",
            BinOp::Gt => ">",
            BinOp::LtEq => "<=",
            BinOp::GtEq => ">=",
            BinOp::And => "and",
            BinOp::Or => "or",
        }
    }
}
