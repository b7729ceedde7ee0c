use super::ast::{BinaryOp, Expr, Literal, LogicalOp, UnaryOp};

/// Applies local simplifications to a parsed formula before lowering.
///
/// The passes never change evaluation order of conditional branches and never fold
/// anything that could differ between the workflow engine and the dataframe engine
/// (integer division, string arithmetic, comparisons against nulls).
pub struct Simplifier;

impl Simplifier {
    /// Runs the simplification pass until the tree reaches a fixed point.
    pub fn simplify(expr: Expr) -> Expr {
        let mut current = expr;
        loop {
            let next = Self::pass(current.clone());
            if next == current {
                return next;
            }
            current = next;
        }
    }

    fn pass(expr: Expr) -> Expr {
        match expr {
            Expr::Unary { op, operand } => {
                let operand = Self::pass(*operand);
                match (op, operand) {
                    (UnaryOp::Negate, Expr::Literal(Literal::Integer(n))) if n != i64::MIN => {
                        Expr::Literal(Literal::Integer(-n))
                    }
                    (UnaryOp::Negate, Expr::Literal(Literal::Float(n))) => {
                        Expr::Literal(Literal::Float(-n))
                    }
                    (
                        UnaryOp::Not,
                        Expr::Unary {
                            op: UnaryOp::Not,
                            operand: inner,
                        },
                    ) => *inner,
                    (op, operand) => Expr::Unary {
                        op,
                        operand: Box::new(operand),
                    },
                }
            }
            Expr::Binary { op, left, right } => {
                let left = Self::pass(*left);
                let right = Self::pass(*right);
                fold_arithmetic(op, &left, &right).unwrap_or_else(|| Expr::binary(op, left, right))
            }
            Expr::Logical { op, operands } => Expr::Logical {
                op,
                operands: flatten(op, operands),
            },
            Expr::Call { name, args } => Expr::Call {
                name,
                args: args.into_iter().map(Self::pass).collect(),
            },
            Expr::Conditional {
                branches,
                otherwise,
            } => Expr::Conditional {
                branches: branches
                    .into_iter()
                    .map(|(c, r)| (Self::pass(c), Self::pass(r)))
                    .collect(),
                otherwise: Box::new(Self::pass(*otherwise)),
            },
            // Leaf nodes don't need simplification
            leaf => leaf,
        }
    }
}

/// `a AND (b AND c)` becomes `a AND b AND c`.
fn flatten(op: LogicalOp, operands: Vec<Expr>) -> Vec<Expr> {
    let mut flat = Vec::with_capacity(operands.len());
    for operand in operands {
        match Simplifier::pass(operand) {
            Expr::Logical {
                op: inner,
                operands: nested,
            } if inner == op => flat.extend(nested),
            other => flat.push(other),
        }
    }
    flat
}

fn fold_arithmetic(op: BinaryOp, left: &Expr, right: &Expr) -> Option<Expr> {
    use Literal::{Float, Integer};
    let folded = match (left, right) {
        (Expr::Literal(Integer(a)), Expr::Literal(Integer(b))) => match op {
            BinaryOp::Add => Integer(a.checked_add(*b)?),
            BinaryOp::Subtract => Integer(a.checked_sub(*b)?),
            BinaryOp::Multiply => Integer(a.checked_mul(*b)?),
            _ => return None,
        },
        (Expr::Literal(Float(a)), Expr::Literal(Float(b))) => match op {
            BinaryOp::Add => Float(a + b),
            BinaryOp::Subtract => Float(a - b),
            BinaryOp::Multiply => Float(a * b),
            BinaryOp::Divide if *b != 0.0 => Float(a / b),
            _ => return None,
        },
        _ => return None,
    };
    // A NaN literal never equals itself and would stall the fixed-point loop.
    match folded {
        Float(v) if !v.is_finite() => None,
        other => Some(Expr::Literal(other)),
    }
}
