use conduit_message::{NumericHeader, StringHeader};

use crate::ast::{CompareOp, Expr, Field, Literal};
use crate::error::SyntaxError;
use crate::lexer::{lex, Spanned, Token};

/// Compiles a match expression into a reusable [`Expr`] tree.
///
/// Grammar:
/// ```text
/// expr       := or_expr
/// or_expr    := and_expr ("||" and_expr)*
/// and_expr   := atom ("&&" atom)*
/// atom       := "TRUE" | "FALSE" | comparison | "(" expr ")"
/// comparison := field op literal
/// ```
pub fn compile(input: &str) -> Result<Expr, SyntaxError> {
    let tokens = lex(input)?;
    let mut parser = Parser { tokens, pos: 0 };
    let expr = parser.parse_or()?;
    parser.expect_eof()?;
    Ok(expr)
}

struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> &Token {
        &self.tokens[self.pos].token
    }

    fn position(&self) -> usize {
        self.tokens[self.pos].position
    }

    fn advance(&mut self) -> Token {
        let tok = self.tokens[self.pos].token.clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        tok
    }

    fn error(&self, message: impl Into<String>) -> SyntaxError {
        SyntaxError {
            position: self.position(),
            last_token: self.peek().to_string(),
            message: message.into(),
        }
    }

    fn expect_eof(&self) -> Result<(), SyntaxError> {
        if matches!(self.peek(), Token::Eof) {
            Ok(())
        } else {
            Err(self.error("expected end of expression"))
        }
    }

    fn parse_or(&mut self) -> Result<Expr, SyntaxError> {
        let mut lhs = self.parse_and()?;
        while matches!(self.peek(), Token::OrOr) {
            self.advance();
            let rhs = self.parse_and()?;
            lhs = Expr::Or(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<Expr, SyntaxError> {
        let mut lhs = self.parse_atom()?;
        while matches!(self.peek(), Token::AndAnd) {
            self.advance();
            let rhs = self.parse_atom()?;
            lhs = Expr::And(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_atom(&mut self) -> Result<Expr, SyntaxError> {
        match self.peek().clone() {
            Token::LParen => {
                self.advance();
                let inner = self.parse_or()?;
                match self.peek() {
                    Token::RParen => {
                        self.advance();
                        Ok(inner)
                    }
                    _ => Err(self.error("expected closing ')'")),
                }
            }
            Token::Ident(name) if name == "TRUE" => {
                self.advance();
                Ok(Expr::True)
            }
            Token::Ident(name) if name == "FALSE" => {
                self.advance();
                Ok(Expr::False)
            }
            Token::Ident(name) => self.parse_comparison(&name),
            _ => Err(self.error("expected TRUE, FALSE, a field name, or '('")),
        }
    }

    fn parse_comparison(&mut self, name: &str) -> Result<Expr, SyntaxError> {
        let field = field_for_name(name)
            .ok_or_else(|| self.error(format!("unknown field '{name}'")))?;
        self.advance(); // consume field identifier

        let op = match self.peek() {
            Token::Eq => CompareOp::Eq,
            Token::Ne => CompareOp::Ne,
            Token::Lt => CompareOp::Lt,
            Token::Le => CompareOp::Le,
            Token::Gt => CompareOp::Gt,
            Token::Ge => CompareOp::Ge,
            _ => return Err(self.error("expected a comparison operator")),
        };
        self.advance();

        let literal = match self.peek().clone() {
            Token::StringLit(s) => {
                self.advance();
                Literal::String(s)
            }
            Token::NumberLit(n) => {
                self.advance();
                Literal::Number(n)
            }
            _ => return Err(self.error("expected a string or numeric literal")),
        };

        match (&field, &literal) {
            (Field::String(_), Literal::String(_)) | (Field::Numeric(_), Literal::Number(_)) => {
                Ok(Expr::Compare { field, op, literal })
            }
            (Field::String(_), Literal::Number(_)) => {
                Err(self.error(format!("field '{name}' compares to a string, not a number")))
            }
            (Field::Numeric(_), Literal::String(_)) => {
                Err(self.error(format!("field '{name}' compares to a number, not a string")))
            }
        }
    }
}

fn field_for_name(name: &str) -> Option<Field> {
    Some(match name {
        "Uuid" => Field::String(StringHeader::Uuid),
        "Type" => Field::String(StringHeader::Type),
        "Logger" => Field::String(StringHeader::Logger),
        "Payload" => Field::String(StringHeader::Payload),
        "EnvVersion" => Field::String(StringHeader::EnvVersion),
        "Hostname" => Field::String(StringHeader::Hostname),
        "Timestamp" => Field::Numeric(NumericHeader::Timestamp),
        "Severity" => Field::Numeric(NumericHeader::Severity),
        "Pid" => Field::Numeric(NumericHeader::Pid),
        _ => return None,
    })
}
