//! AST handed over by the front end.
//!
//! Only the shape the code generators consume: functions with named
//! arguments whose body is a statement block or a single expression.
//! Everything is serde-serializable so a front end in any process can hand
//! a unit over as JSON.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A source file: included libraries plus its own functions
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompilationUnit {
    #[serde(default)]
    pub includes: BTreeMap<String, CompilationUnit>,
    #[serde(default)]
    pub functions: Vec<FunctionDef>,
}

impl CompilationUnit {
    pub fn new(functions: Vec<FunctionDef>) -> Self {
        Self {
            includes: BTreeMap::new(),
            functions,
        }
    }

    /// Attach a library reachable as `name.function`
    pub fn with_include(mut self, name: &str, library: CompilationUnit) -> Self {
        self.includes.insert(name.to_string(), library);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionDef {
    pub name: String,
    #[serde(default)]
    pub args: Vec<String>,
    pub body: FunctionBody,
}

impl FunctionDef {
    pub fn block(name: &str, args: &[&str], body: Vec<Statement>) -> Self {
        Self {
            name: name.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
            body: FunctionBody::Block(body),
        }
    }

    pub fn expression(name: &str, args: &[&str], body: Expression) -> Self {
        Self {
            name: name.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
            body: FunctionBody::Expression(body),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FunctionBody {
    Block(Vec<Statement>),
    Expression(Expression),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Statement {
    VarDecl {
        name: String,
        value: Expression,
    },
    Assign {
        name: String,
        value: Expression,
    },
    Return(Expression),
    If {
        condition: Expression,
        then_branch: Vec<Statement>,
        #[serde(default)]
        else_branch: Option<Vec<Statement>>,
    },
    While {
        condition: Expression,
        body: Vec<Statement>,
    },
}

impl Statement {
    pub fn var(name: &str, value: Expression) -> Self {
        Statement::VarDecl {
            name: name.to_string(),
            value,
        }
    }

    pub fn assign(name: &str, value: Expression) -> Self {
        Statement::Assign {
            name: name.to_string(),
            value,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Expression {
    Number(i32),
    Boolean(bool),
    Identifier(String),
    Unary {
        op: UnaryOp,
        operand: Box<Expression>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expression>,
        right: Box<Expression>,
    },
    Call {
        name: String,
        #[serde(default)]
        args: Vec<Expression>,
    },
    Paren(Box<Expression>),
}

impl Expression {
    pub fn ident(name: &str) -> Self {
        Expression::Identifier(name.to_string())
    }

    pub fn unary(op: UnaryOp, operand: Expression) -> Self {
        Expression::Unary {
            op,
            operand: Box::new(operand),
        }
    }

    pub fn binary(op: BinaryOp, left: Expression, right: Expression) -> Self {
        Expression::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn call(name: &str, args: Vec<Expression>) -> Self {
        Expression::Call {
            name: name.to_string(),
            args,
        }
    }

    pub fn paren(inner: Expression) -> Self {
        Expression::Paren(Box::new(inner))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    /// Logical and over 0/1 operands; both sides are always evaluated
    And,
    /// Logical or over 0/1 operands; both sides are always evaluated
    Or,
    BitAnd,
    BitOr,
    BitXor,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnaryOp {
    Neg,
    Not,
}
