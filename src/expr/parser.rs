//! Recursive-descent parser for metric expressions.
//!
//! Grammar:
//!
//! ```text
//! expr   := term (('+'|'-') term)*
//! term   := factor (('*'|'/') factor)*
//! factor := NUMBER | '-' factor | REF | '(' expr ')'
//! ```
//!
//! The composite expansion in the compiler substitutes sub-expressions
//! structurally into this AST's emission, so parsing has to be structural
//! rather than textual; regex replacement cannot nest correctly.

use super::ast::{BinaryOp, ExprNode, MetricRef};
use super::lexer::{tokenize, Token};
use super::ExprError;

/// Parse an expression source string into an AST.
pub fn parse_expression(src: &str) -> Result<ExprNode, ExprError> {
    let tokens = tokenize(src)?;
    if tokens.is_empty() {
        return Err(ExprError::Empty);
    }
    let mut parser = Parser { tokens, pos: 0 };
    let expr = parser.expr()?;
    if let Some((tok, at)) = parser.peek_with_pos() {
        return Err(ExprError::UnexpectedToken {
            found: describe(tok),
            pos: at,
        });
    }
    Ok(expr)
}

struct Parser {
    tokens: Vec<(Token, usize)>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(t, _)| t)
    }

    fn peek_with_pos(&self) -> Option<(&Token, usize)> {
        self.tokens.get(self.pos).map(|(t, at)| (t, *at))
    }

    fn advance(&mut self) -> Option<Token> {
        let tok = self.tokens.get(self.pos).map(|(t, _)| t.clone());
        self.pos += 1;
        tok
    }

    fn expr(&mut self) -> Result<ExprNode, ExprError> {
        let mut left = self.term()?;
        while let Some(op) = match self.peek() {
            Some(Token::Plus) => Some(BinaryOp::Add),
            Some(Token::Minus) => Some(BinaryOp::Sub),
            _ => None,
        } {
            self.pos += 1;
            let right = self.term()?;
            left = ExprNode::Binary {
                left: Box::new(left),
                op,
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn term(&mut self) -> Result<ExprNode, ExprError> {
        let mut left = self.factor()?;
        while let Some(op) = match self.peek() {
            Some(Token::Star) => Some(BinaryOp::Mul),
            Some(Token::Slash) => Some(BinaryOp::Div),
            _ => None,
        } {
            self.pos += 1;
            let right = self.factor()?;
            left = ExprNode::Binary {
                left: Box::new(left),
                op,
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn factor(&mut self) -> Result<ExprNode, ExprError> {
        let (tok, at) = match self.peek_with_pos() {
            Some((tok, at)) => (tok.clone(), at),
            None => return Err(ExprError::UnexpectedEnd),
        };
        match tok {
            Token::Number(lexeme) => {
                self.pos += 1;
                Ok(ExprNode::Number(lexeme))
            }
            Token::Ref { id, modifier } => {
                self.pos += 1;
                Ok(ExprNode::Ref(MetricRef { id, modifier }))
            }
            Token::Minus => {
                self.pos += 1;
                Ok(ExprNode::Neg(Box::new(self.factor()?)))
            }
            Token::LParen => {
                self.pos += 1;
                let inner = self.expr()?;
                match self.advance() {
                    Some(Token::RParen) => Ok(ExprNode::Paren(Box::new(inner))),
                    Some(other) => Err(ExprError::UnexpectedToken {
                        found: describe(&other),
                        pos: at,
                    }),
                    None => Err(ExprError::UnexpectedEnd),
                }
            }
            other => Err(ExprError::UnexpectedToken {
                found: describe(&other),
                pos: at,
            }),
        }
    }
}

fn describe(tok: &Token) -> String {
    match tok {
        Token::Number(n) => format!("number '{n}'"),
        Token::Ref { id, .. } => format!("reference '{id}'"),
        Token::Plus => "'+'".into(),
        Token::Minus => "'-'".into(),
        Token::Star => "'*'".into(),
        Token::Slash => "'/'".into(),
        Token::LParen => "'('".into(),
        Token::RParen => "')'".into(),
    }
}
