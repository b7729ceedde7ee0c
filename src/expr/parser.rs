use super::ast::{BinaryOp, Expr, Literal, LogicalOp, UnaryOp};
use super::lexer::{Token, TokenKind, tokenize};
use crate::error::ExpressionError;

/// Parses a formula into an [`Expr`].
pub fn parse(formula: &str) -> Result<Expr, ExpressionError> {
    let mut parser = Parser {
        tokens: tokenize(formula)?,
        pos: 0,
        depth: 0,
    };
    let expr = parser.expression()?;
    parser.expect(TokenKind::Eof, "end of input")?;
    Ok(expr)
}

/// Recursive-descent parser over a token stream.
///
/// Precedence, lowest first: conditional, `OR`, `AND`, comparison, additive,
/// multiplicative, unary, primary.
struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    /// Current nesting of groups, calls, conditionals, unary operators and operator chains.
    depth: usize,
}

/// Formulas nested deeper than this are rejected as a syntax error.
pub const MAX_DEPTH: usize = 128;

fn comparison_op(kind: &TokenKind) -> Option<BinaryOp> {
    match kind {
        TokenKind::Eq => Some(BinaryOp::Equal),
        TokenKind::NotEq => Some(BinaryOp::NotEqual),
        TokenKind::Lt => Some(BinaryOp::Less),
        TokenKind::LtEq => Some(BinaryOp::LessOrEqual),
        TokenKind::Gt => Some(BinaryOp::Greater),
        TokenKind::GtEq => Some(BinaryOp::GreaterOrEqual),
        _ => None,
    }
}

fn additive_op(kind: &TokenKind) -> Option<BinaryOp> {
    match kind {
        TokenKind::Plus => Some(BinaryOp::Add),
        TokenKind::Minus => Some(BinaryOp::Subtract),
        _ => None,
    }
}

fn multiplicative_op(kind: &TokenKind) -> Option<BinaryOp> {
    match kind {
        TokenKind::Star => Some(BinaryOp::Multiply),
        TokenKind::Slash => Some(BinaryOp::Divide),
        TokenKind::Percent => Some(BinaryOp::Modulo),
        _ => None,
    }
}

impl Parser {
    fn peek(&self) -> &Token {
        // `tokenize` guarantees a trailing Eof, and `advance` never moves past it.
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if token.kind != TokenKind::Eof {
            self.pos += 1;
        }
        token
    }

    fn check(&self, kind: &TokenKind) -> bool {
        &self.peek().kind == kind
    }

    fn expect(&mut self, kind: TokenKind, expected: &str) -> Result<Token, ExpressionError> {
        if self.check(&kind) {
            Ok(self.advance())
        } else {
            Err(self.error(expected))
        }
    }

    fn error(&self, expected: &str) -> ExpressionError {
        let token = self.peek();
        ExpressionError::syntax(token.position, expected, token.kind.to_string())
    }

    fn descend(&mut self) -> Result<(), ExpressionError> {
        if self.depth >= MAX_DEPTH {
            return Err(self.error("shallower nesting"));
        }
        self.depth += 1;
        Ok(())
    }

    fn expression(&mut self) -> Result<Expr, ExpressionError> {
        self.descend()?;
        let expr = self.logical(LogicalOp::Or)?;
        self.depth -= 1;
        Ok(expr)
    }

    /// Parses an `OR` chain (or, one level down, an `AND` chain) into a flat operand list.
    fn logical(&mut self, op: LogicalOp) -> Result<Expr, ExpressionError> {
        let (token, next) = match op {
            LogicalOp::Or => (TokenKind::Or, Some(LogicalOp::And)),
            LogicalOp::And => (TokenKind::And, None),
        };
        let operand = |p: &mut Self| match next {
            Some(inner) => p.logical(inner),
            None => p.comparison(),
        };

        let mut operands = vec![operand(self)?];
        while self.check(&token) {
            self.advance();
            operands.push(operand(self)?);
        }
        Ok(if operands.len() == 1 {
            operands.remove(0)
        } else {
            Expr::Logical { op, operands }
        })
    }

    fn comparison(&mut self) -> Result<Expr, ExpressionError> {
        self.binary_chain(Self::additive, comparison_op)
    }

    fn additive(&mut self) -> Result<Expr, ExpressionError> {
        self.binary_chain(Self::multiplicative, additive_op)
    }

    fn multiplicative(&mut self) -> Result<Expr, ExpressionError> {
        self.binary_chain(Self::unary, multiplicative_op)
    }

    /// Left-associative chain of one precedence level. Each link nests the tree one level.
    fn binary_chain(
        &mut self,
        operand: fn(&mut Self) -> Result<Expr, ExpressionError>,
        operator: fn(&TokenKind) -> Option<BinaryOp>,
    ) -> Result<Expr, ExpressionError> {
        let base = self.depth;
        let mut left = operand(self)?;
        while let Some(op) = operator(&self.peek().kind) {
            self.descend()?;
            self.advance();
            left = Expr::binary(op, left, operand(self)?);
        }
        self.depth = base;
        Ok(left)
    }

    fn unary(&mut self) -> Result<Expr, ExpressionError> {
        let op = match self.peek().kind {
            TokenKind::Minus => UnaryOp::Negate,
            TokenKind::Not => UnaryOp::Not,
            _ => return self.primary(),
        };
        self.advance();
        self.descend()?;
        let operand = self.unary()?;
        self.depth -= 1;
        Ok(Expr::Unary {
            op,
            operand: Box::new(operand),
        })
    }

    fn primary(&mut self) -> Result<Expr, ExpressionError> {
        let token = self.advance();
        match token.kind {
            TokenKind::Field(name) => Ok(Expr::Field(name)),
            TokenKind::Str(s) => Ok(Expr::Literal(Literal::String(s))),
            TokenKind::Number(text) => number_literal(&text, token.position),
            TokenKind::True => Ok(Expr::Literal(Literal::Bool(true))),
            TokenKind::False => Ok(Expr::Literal(Literal::Bool(false))),
            TokenKind::If => self.conditional(),
            TokenKind::LParen => {
                let inner = self.expression()?;
                self.expect(TokenKind::RParen, "')'")?;
                Ok(inner)
            }
            TokenKind::Ident(name) => {
                if self.check(&TokenKind::LParen) {
                    self.advance();
                    let args = self.arguments()?;
                    Ok(Expr::Call { name, args })
                } else if name.eq_ignore_ascii_case("null") {
                    Ok(Expr::Literal(Literal::Null))
                } else {
                    Err(self.error("'(' after function name"))
                }
            }
            other => Err(ExpressionError::syntax(
                token.position,
                "an operand",
                other.to_string(),
            )),
        }
    }

    /// Parses a comma-separated argument list; the opening parenthesis is already consumed.
    fn arguments(&mut self) -> Result<Vec<Expr>, ExpressionError> {
        let mut args = Vec::new();
        if self.check(&TokenKind::RParen) {
            self.advance();
            return Ok(args);
        }
        loop {
            args.push(self.expression()?);
            match self.peek().kind {
                TokenKind::Comma => {
                    self.advance();
                }
                TokenKind::RParen => {
                    self.advance();
                    return Ok(args);
                }
                _ => return Err(self.error("',' or ')'")),
            }
        }
    }

    /// Parses the remainder of `IF cond THEN result [ELSEIF ...] ELSE result ENDIF`; the `IF`
    /// is already consumed.
    fn conditional(&mut self) -> Result<Expr, ExpressionError> {
        let mut branches = Vec::new();
        loop {
            let condition = self.expression()?;
            self.expect(TokenKind::Then, "'THEN'")?;
            let result = self.expression()?;
            branches.push((condition, result));

            match self.peek().kind {
                TokenKind::ElseIf => {
                    self.advance();
                }
                TokenKind::Else => {
                    self.advance();
                    let otherwise = self.expression()?;
                    self.expect(TokenKind::EndIf, "'ENDIF'")?;
                    return Ok(Expr::Conditional {
                        branches,
                        otherwise: Box::new(otherwise),
                    });
                }
                _ => return Err(self.error("'ELSEIF' or 'ELSE'")),
            }
        }
    }
}

fn number_literal(text: &str, position: usize) -> Result<Expr, ExpressionError> {
    if !text.contains(['.', 'e', 'E']) {
        if let Ok(n) = text.parse::<i64>() {
            return Ok(Expr::Literal(Literal::Integer(n)));
        }
    }
    text.parse::<f64>()
        .map(|n| Expr::Literal(Literal::Float(n)))
        .map_err(|_| ExpressionError::syntax(position, "a number", format!("'{}'", text)))
}
