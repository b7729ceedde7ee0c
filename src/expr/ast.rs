use itertools::Itertools;
use std::fmt;

/// The Abstract Syntax Tree of one workflow formula.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Field(String),
    Literal(Literal),
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    /// An `AND` or `OR` chain, kept flat so a long chain renders without nesting.
    Logical {
        op: LogicalOp,
        operands: Vec<Expr>,
    },
    Call {
        name: String,
        args: Vec<Expr>,
    },
    /// `IF c1 THEN r1 ELSEIF c2 THEN r2 ... ELSE otherwise ENDIF`, first true branch wins.
    Conditional {
        branches: Vec<(Expr, Expr)>,
        otherwise: Box<Expr>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Integer(i64),
    Float(f64),
    String(String),
    Bool(bool),
    Null,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Negate,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    Equal,
    NotEqual,
    Less,
    LessOrEqual,
    Greater,
    GreaterOrEqual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
}

impl BinaryOp {
    /// The operator as written in the workflow formula language.
    pub fn formula_symbol(&self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Subtract => "-",
            BinaryOp::Multiply => "*",
            BinaryOp::Divide => "/",
            BinaryOp::Modulo => "%",
            BinaryOp::Equal => "=",
            BinaryOp::NotEqual => "<>",
            BinaryOp::Less => "<",
            BinaryOp::LessOrEqual => "<=",
            BinaryOp::Greater => ">",
            BinaryOp::GreaterOrEqual => ">=",
        }
    }

    /// The operator as written on PySpark columns.
    pub fn column_symbol(&self) -> &'static str {
        match self {
            BinaryOp::Equal => "==",
            BinaryOp::NotEqual => "!=",
            other => other.formula_symbol(),
        }
    }
}

impl Expr {
    pub fn field(name: &str) -> Expr {
        Expr::Field(name.to_string())
    }

    pub fn int(value: i64) -> Expr {
        Expr::Literal(Literal::Integer(value))
    }

    pub fn string(value: &str) -> Expr {
        Expr::Literal(Literal::String(value.to_string()))
    }

    pub fn binary(op: BinaryOp, left: Expr, right: Expr) -> Expr {
        Expr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn is_string_literal(&self) -> bool {
        matches!(self, Expr::Literal(Literal::String(_)))
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Integer(n) => write!(f, "{}", n),
            Literal::Float(n) => write!(f, "{:?}", n),
            Literal::String(s) => write!(f, "\"{}\"", s),
            Literal::Bool(true) => write!(f, "TRUE"),
            Literal::Bool(false) => write!(f, "FALSE"),
            Literal::Null => write!(f, "NULL()"),
        }
    }
}

/// Renders the expression back into formula syntax, fully parenthesized.
impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Field(name) => write!(f, "[{}]", name),
            Expr::Literal(lit) => write!(f, "{}", lit),
            Expr::Unary {
                op: UnaryOp::Negate,
                operand,
            } => write!(f, "-{}", operand),
            Expr::Unary {
                op: UnaryOp::Not,
                operand,
            } => write!(f, "NOT {}", operand),
            Expr::Binary { op, left, right } => {
                write!(f, "({} {} {})", left, op.formula_symbol(), right)
            }
            Expr::Logical { op, operands } => {
                let sep = match op {
                    LogicalOp::And => " AND ",
                    LogicalOp::Or => " OR ",
                };
                write!(f, "({})", operands.iter().join(sep))
            }
            Expr::Call { name, args } => write!(f, "{}({})", name, args.iter().join(", ")),
            Expr::Conditional {
                branches,
                otherwise,
            } => {
                for (i, (cond, result)) in branches.iter().enumerate() {
                    let keyword = if i == 0 { "IF" } else { "ELSEIF" };
                    write!(f, "{} {} THEN {} ", keyword, cond, result)?;
                }
                write!(f, "ELSE {} ENDIF", otherwise)
            }
        }
    }
}

/// A wrapper to display an expression as an indented tree, used in debug logs.
pub struct DisplayTree<'a>(pub &'a Expr);

impl fmt::Display for DisplayTree<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt_as_tree(self.0, f, "", true)
    }
}

fn fmt_as_tree(expr: &Expr, f: &mut fmt::Formatter<'_>, prefix: &str, is_last: bool) -> fmt::Result {
    let node_marker = if is_last { "└── " } else { "├── " };
    write!(f, "{}{}", prefix, node_marker)?;
    let child_prefix = format!("{}{}", prefix, if is_last { "    " } else { "│   " });

    let children: Vec<&Expr> = match expr {
        Expr::Field(name) => return writeln!(f, "Field: [{}]", name),
        Expr::Literal(lit) => return writeln!(f, "Literal: {}", lit),
        Expr::Unary { op, operand } => {
            writeln!(f, "{:?}", op)?;
            vec![operand.as_ref()]
        }
        Expr::Binary { op, left, right } => {
            writeln!(f, "{:?} ({})", op, op.formula_symbol())?;
            vec![left.as_ref(), right.as_ref()]
        }
        Expr::Logical { op, operands } => {
            writeln!(f, "{:?}", op)?;
            operands.iter().collect()
        }
        Expr::Call { name, args } => {
            writeln!(f, "Call: {}", name)?;
            args.iter().collect()
        }
        Expr::Conditional {
            branches,
            otherwise,
        } => {
            writeln!(f, "Conditional ({} branch(es))", branches.len())?;
            branches
                .iter()
                .flat_map(|(c, r)| [c, r])
                .chain(std::iter::once(otherwise.as_ref()))
                .collect()
        }
    };

    let count = children.len();
    for (i, child) in children.into_iter().enumerate() {
        fmt_as_tree(child, f, &child_prefix, i + 1 == count)?;
    }
    Ok(())
}
