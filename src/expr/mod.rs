//! The formula translator.
//!
//! A formula goes through four steps: [`lexer`] → [`parser`] → [`simplify`] → [`lower`].
//! Parsing failures are returned as [`ExpressionError::SyntaxError`]; everything after a
//! successful parse is infallible and reports problems as review notes instead.

pub mod ast;
pub mod functions;
pub mod lexer;
pub mod lower;
pub mod parser;
pub mod simplify;

pub use ast::{BinaryOp, DisplayTree, Expr, Literal, LogicalOp, UnaryOp};
pub use lower::{python_literal, python_str};

use crate::error::ExpressionError;
use lower::Lowerer;
use simplify::Simplifier;

/// A translated formula.
#[derive(Debug, Clone)]
pub struct TargetExpr {
    /// The simplified expression tree.
    pub ast: Expr,
    /// PySpark column-expression source.
    pub code: String,
    /// Non-fatal problems that need a human to look at the generated code.
    pub review: Vec<ExpressionError>,
}

impl TargetExpr {
    pub fn needs_review(&self) -> bool {
        !self.review.is_empty()
    }
}

/// Parses and simplifies a formula without lowering it.
pub fn parse(formula: &str) -> Result<Expr, ExpressionError> {
    parser::parse(formula).map(Simplifier::simplify)
}

/// Translates one workflow formula into a PySpark column expression.
pub fn translate(formula: &str) -> Result<TargetExpr, ExpressionError> {
    let ast = parse(formula)?;
    log::debug!("Expression tree for `{}`:\n{}", formula.trim(), DisplayTree(&ast));

    let mut lowerer = Lowerer::default();
    let code = lowerer.lower(&ast);
    Ok(TargetExpr {
        ast,
        code,
        review: lowerer.into_review(),
    })
}
