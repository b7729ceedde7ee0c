use super::ast::{BinaryOp, Expr, Literal, LogicalOp, UnaryOp};
use super::functions;
use crate::error::ExpressionError;
use itertools::Itertools;

/// Lowers an [`Expr`] into PySpark column-expression source text.
///
/// Lowering never fails. Anything that cannot be expressed faithfully is still rendered
/// (as an `F.expr` pass-through or a best-effort call) and recorded as a review note.
#[derive(Debug, Default)]
pub struct Lowerer {
    review: Vec<ExpressionError>,
}

impl Lowerer {
    pub fn lower(&mut self, expr: &Expr) -> String {
        match expr {
            Expr::Field(name) => format!("F.col({})", python_str(name)),
            Expr::Literal(lit) => format!("F.lit({})", self.literal(lit)),
            Expr::Unary { op, operand } => {
                let operand = self.lower(operand);
                match op {
                    UnaryOp::Negate => format!("(-{})", operand),
                    UnaryOp::Not => format!("(~{})", operand),
                }
            }
            Expr::Binary {
                op: BinaryOp::Add,
                left,
                right,
            } if is_stringish(left) || is_stringish(right) => {
                format!("F.concat({}, {})", self.lower(left), self.lower(right))
            }
            Expr::Binary { op, left, right } => format!(
                "({} {} {})",
                self.lower(left),
                op.column_symbol(),
                self.lower(right)
            ),
            Expr::Logical { op, operands } => {
                let sep = match op {
                    LogicalOp::And => " & ",
                    LogicalOp::Or => " | ",
                };
                format!("({})", operands.iter().map(|o| self.lower(o)).join(sep))
            }
            Expr::Call { name, args } => match functions::lookup(name, args.len()) {
                Some(spec) => spec.lower(self, args),
                None => {
                    self.note(ExpressionError::UnknownFunction {
                        name: name.clone(),
                        arity: args.len(),
                    });
                    format!("F.expr({})", python_str(&expr.to_string()))
                }
            },
            Expr::Conditional {
                branches,
                otherwise,
            } => {
                let mut code = String::from("F");
                for (condition, result) in branches {
                    code.push_str(&format!(
                        ".when({}, {})",
                        self.lower(condition),
                        self.lower(result)
                    ));
                }
                code.push_str(&format!(".otherwise({})", self.lower(otherwise)));
                code
            }
        }
    }

    /// Renders an argument that the target API wants as a plain Python constant.
    pub(crate) fn scalar(&mut self, function: &str, index: usize, expr: &Expr) -> String {
        match expr {
            Expr::Literal(lit) => self.literal(lit),
            other => {
                self.note(ExpressionError::NonConstantArgument {
                    name: function.to_string(),
                    index,
                });
                self.lower(other)
            }
        }
    }

    fn literal(&mut self, lit: &Literal) -> String {
        if let Literal::Float(n) = lit {
            if !n.is_finite() {
                self.note(ExpressionError::NonFiniteNumber {
                    value: n.to_string(),
                });
            }
        }
        python_literal(lit)
    }

    pub(crate) fn note(&mut self, error: ExpressionError) {
        self.review.push(error);
    }

    pub fn into_review(self) -> Vec<ExpressionError> {
        self.review
    }
}

fn is_stringish(expr: &Expr) -> bool {
    match expr {
        Expr::Literal(Literal::String(_)) => true,
        Expr::Binary {
            op: BinaryOp::Add,
            left,
            right,
        } => is_stringish(left) || is_stringish(right),
        _ => false,
    }
}

/// Renders a literal as Python source.
pub fn python_literal(lit: &Literal) -> String {
    match lit {
        Literal::Integer(n) => n.to_string(),
        Literal::Float(n) if n.is_nan() => "float(\"nan\")".to_string(),
        Literal::Float(n) if n.is_infinite() => {
            let sign = if n.is_sign_negative() { "-" } else { "" };
            format!("float(\"{}inf\")", sign)
        }
        Literal::Float(n) => format!("{:?}", n),
        Literal::String(s) => python_str(s),
        Literal::Bool(true) => "True".to_string(),
        Literal::Bool(false) => "False".to_string(),
        Literal::Null => "None".to_string(),
    }
}

/// Quotes a string as a double-quoted Python literal.
pub fn python_str(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}
