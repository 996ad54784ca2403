//! Recursive-descent parser with precedence climbing for binary operators.

use super::Condition;
use super::ast::{BinaryOp, DeclKind, Expr, LogicalOp, Stmt, UnaryOp};
use super::lexer::{Lexer, Token, TokenKind};

/// Bound on syntactic nesting; keeps both parsing and evaluation shallow.
pub const MAX_DEPTH: usize = 256;

const UNSUPPORTED: &[&str] = &[
    "function", "return", "if", "else", "for", "while", "do", "switch", "case", "class", "try",
    "catch", "finally", "async", "await", "yield", "import", "export", "delete", "void", "this",
    "super", "with", "break", "continue", "debugger",
];

const RESERVED: &[&str] = &[
    "let", "const", "var", "throw", "new", "typeof", "true", "false", "null", "in", "instanceof",
];

pub fn parse_program(source: &str) -> Result<Vec<Stmt>, Condition> {
    let tokens = Lexer::new(source).tokenize()?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
    };
    let mut stmts = Vec::new();
    while !parser.at_eof() {
        stmts.push(parser.parse_statement()?);
    }
    Ok(stmts)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

static EOF: TokenKind = TokenKind::Eof;

impl Parser {
    /// Index of the next token that is not a line break.
    fn peek_index(&self) -> usize {
        let mut i = self.pos;
        while matches!(self.tokens.get(i).map(|t| &t.kind), Some(TokenKind::Newline)) {
            i += 1;
        }
        i
    }

    fn peek(&self) -> &TokenKind {
        self.tokens.get(self.peek_index()).map_or(&EOF, |t| &t.kind)
    }

    /// Consumes the token returned by the last `peek`.
    fn bump(&mut self) {
        self.pos = (self.peek_index() + 1).min(self.tokens.len());
    }

    fn next(&mut self) -> TokenKind {
        let kind = self.peek().clone();
        if kind != TokenKind::Eof {
            self.bump();
        }
        kind
    }

    fn at_eof(&self) -> bool {
        *self.peek() == TokenKind::Eof
    }

    fn peek_punct(&self, p: &str) -> bool {
        matches!(self.peek(), TokenKind::Punct(q) if *q == p)
    }

    fn peek_ident(&self, word: &str) -> bool {
        matches!(self.peek(), TokenKind::Ident(w) if w == word)
    }

    fn eat_punct(&mut self, p: &str) -> bool {
        if self.peek_punct(p) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn expect_punct(&mut self, p: &str) -> Result<(), Condition> {
        if self.eat_punct(p) {
            Ok(())
        } else {
            let found = self.next();
            Err(unexpected(&found))
        }
    }

    fn enter(&mut self) -> Result<(), Condition> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(Condition::syntax("Maximum nesting depth exceeded"));
        }
        Ok(())
    }

    fn leave(&mut self) {
        self.depth -= 1;
    }

    /// A statement ends at `;`, a line break, `}` or the end of input.
    fn end_statement(&mut self) -> Result<(), Condition> {
        match self.tokens.get(self.pos).map(|t| &t.kind) {
            None | Some(TokenKind::Eof | TokenKind::Newline) => Ok(()),
            Some(TokenKind::Punct(";")) => {
                self.pos += 1;
                Ok(())
            }
            Some(TokenKind::Punct("}")) => Ok(()),
            Some(other) => Err(unexpected(other)),
        }
    }

    fn parse_statement(&mut self) -> Result<Stmt, Condition> {
        self.enter()?;
        let stmt = self.parse_statement_inner();
        self.leave();
        stmt
    }

    fn parse_statement_inner(&mut self) -> Result<Stmt, Condition> {
        if self.eat_punct(";") {
            return Ok(Stmt::Empty);
        }
        if self.eat_punct("{") {
            let mut body = Vec::new();
            while !self.eat_punct("}") {
                if self.at_eof() {
                    return Err(Condition::syntax("Unexpected end of input"));
                }
                body.push(self.parse_statement()?);
            }
            return Ok(Stmt::Block(body));
        }

        let decl_kind = match self.peek() {
            TokenKind::Ident(w) if w == "let" => Some(DeclKind::Let),
            TokenKind::Ident(w) if w == "const" => Some(DeclKind::Const),
            TokenKind::Ident(w) if w == "var" => Some(DeclKind::Var),
            _ => None,
        };
        if let Some(kind) = decl_kind {
            self.bump();
            let mut declarators = Vec::new();
            loop {
                let name = self.binding_name()?;
                let init = if self.eat_punct("=") {
                    Some(self.parse_assignment()?)
                } else if kind == DeclKind::Const {
                    return Err(Condition::syntax("Missing initializer in const declaration"));
                } else {
                    None
                };
                declarators.push((name, init));
                if !self.eat_punct(",") {
                    break;
                }
            }
            self.end_statement()?;
            return Ok(Stmt::Decl { kind, declarators });
        }

        if self.peek_ident("throw") {
            self.bump();
            let expr = self.parse_expression()?;
            self.end_statement()?;
            return Ok(Stmt::Throw(expr));
        }

        let expr = self.parse_expression()?;
        self.end_statement()?;
        Ok(Stmt::Expr(expr))
    }

    fn binding_name(&mut self) -> Result<String, Condition> {
        match self.next() {
            TokenKind::Ident(name) => {
                check_supported(&name)?;
                if RESERVED.contains(&name.as_str()) {
                    return Err(Condition::syntax(&format!("Unexpected token '{name}'")));
                }
                Ok(name)
            }
            other => Err(unexpected(&other)),
        }
    }

    fn parse_expression(&mut self) -> Result<Expr, Condition> {
        self.parse_assignment()
    }

    fn parse_assignment(&mut self) -> Result<Expr, Condition> {
        self.enter()?;
        let result = self.parse_assignment_inner();
        self.leave();
        result
    }

    fn parse_assignment_inner(&mut self) -> Result<Expr, Condition> {
        let target = self.parse_conditional()?;
        let op = match self.peek() {
            TokenKind::Punct("=") => None,
            TokenKind::Punct("+=") => Some(BinaryOp::Add),
            TokenKind::Punct("-=") => Some(BinaryOp::Sub),
            TokenKind::Punct("*=") => Some(BinaryOp::Mul),
            TokenKind::Punct("/=") => Some(BinaryOp::Div),
            TokenKind::Punct("%=") => Some(BinaryOp::Rem),
            TokenKind::Punct("**=") => Some(BinaryOp::Pow),
            TokenKind::Punct("=>") => {
                return Err(Condition::syntax("Arrow functions are not supported"));
            }
            _ => return Ok(target),
        };
        if !matches!(
            target,
            Expr::Ident(_)
                | Expr::Member {
                    optional: false,
                    ..
                }
                | Expr::Index {
                    optional: false,
                    ..
                }
        ) {
            return Err(Condition::syntax("Invalid left-hand side in assignment"));
        }
        self.bump();
        let value = self.parse_assignment()?;
        Ok(Expr::Assign {
            op,
            target: Box::new(target),
            value: Box::new(value),
        })
    }

    fn parse_conditional(&mut self) -> Result<Expr, Condition> {
        let test = self.parse_binary(1)?;
        if !self.eat_punct("?") {
            return Ok(test);
        }
        let then = self.parse_assignment()?;
        self.expect_punct(":")?;
        let otherwise = self.parse_assignment()?;
        Ok(Expr::Conditional {
            test: Box::new(test),
            then: Box::new(then),
            otherwise: Box::new(otherwise),
        })
    }

    fn peek_binary(&mut self) -> Option<(Operator, u8)> {
        use BinaryOp as B;
        let op = match self.peek() {
            TokenKind::Punct(p) => match *p {
                "??" => (Operator::Logical(LogicalOp::Nullish), 1),
                "||" => (Operator::Logical(LogicalOp::Or), 2),
                "&&" => (Operator::Logical(LogicalOp::And), 3),
                "==" => (Operator::Binary(B::Eq), 4),
                "!=" => (Operator::Binary(B::NotEq), 4),
                "===" => (Operator::Binary(B::StrictEq), 4),
                "!==" => (Operator::Binary(B::StrictNotEq), 4),
                "<" => (Operator::Binary(B::Lt), 5),
                ">" => (Operator::Binary(B::Gt), 5),
                "<=" => (Operator::Binary(B::LtEq), 5),
                ">=" => (Operator::Binary(B::GtEq), 5),
                "+" => (Operator::Binary(B::Add), 6),
                "-" => (Operator::Binary(B::Sub), 6),
                "*" => (Operator::Binary(B::Mul), 7),
                "/" => (Operator::Binary(B::Div), 7),
                "%" => (Operator::Binary(B::Rem), 7),
                "**" => (Operator::Binary(B::Pow), 8),
                _ => return None,
            },
            TokenKind::Ident(w) if w == "in" => (Operator::Binary(B::In), 5),
            TokenKind::Ident(w) if w == "instanceof" => (Operator::Binary(B::InstanceOf), 5),
            _ => return None,
        };
        Some(op)
    }

    fn parse_binary(&mut self, min_prec: u8) -> Result<Expr, Condition> {
        let mut lhs = self.parse_unary()?;
        let start_depth = self.depth;
        while let Some((op, prec)) = self.peek_binary() {
            if prec < min_prec {
                break;
            }
            self.bump();
            // Left-leaning chains nest too.
            self.enter()?;
            // `**` is right-associative.
            let next_min = if op == Operator::Binary(BinaryOp::Pow) {
                prec
            } else {
                prec + 1
            };
            self.enter()?;
            let rhs = self.parse_binary(next_min);
            self.leave();
            let rhs = rhs?;
            lhs = match op {
                Operator::Binary(op) => Expr::Binary {
                    op,
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                },
                Operator::Logical(op) => Expr::Logical {
                    op,
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                },
            };
        }
        self.depth = start_depth;
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<Expr, Condition> {
        let op = match self.peek() {
            TokenKind::Punct("!") => Some(UnaryOp::Not),
            TokenKind::Punct("-") => Some(UnaryOp::Neg),
            TokenKind::Punct("+") => Some(UnaryOp::Plus),
            TokenKind::Ident(w) if w == "typeof" => Some(UnaryOp::TypeOf),
            _ => None,
        };
        let Some(op) = op else {
            return self.parse_postfix();
        };
        self.bump();
        self.enter()?;
        let expr = self.parse_unary();
        self.leave();
        Ok(Expr::Unary {
            op,
            expr: Box::new(expr?),
        })
    }

    fn parse_postfix(&mut self) -> Result<Expr, Condition> {
        let mut expr = if self.peek_ident("new") {
            self.parse_new()?
        } else {
            self.parse_primary()?
        };
        let start_depth = self.depth;
        loop {
            if self.peek_postfix() {
                self.enter()?;
            }
            if self.eat_punct(".") {
                expr = Expr::Member {
                    object: Box::new(expr),
                    property: self.property_name()?,
                    optional: false,
                };
            } else if self.eat_punct("?.") {
                if self.eat_punct("[") {
                    let index = self.parse_expression()?;
                    self.expect_punct("]")?;
                    expr = Expr::Index {
                        object: Box::new(expr),
                        index: Box::new(index),
                        optional: true,
                    };
                } else {
                    expr = Expr::Member {
                        object: Box::new(expr),
                        property: self.property_name()?,
                        optional: true,
                    };
                }
            } else if self.eat_punct("[") {
                let index = self.parse_expression()?;
                self.expect_punct("]")?;
                expr = Expr::Index {
                    object: Box::new(expr),
                    index: Box::new(index),
                    optional: false,
                };
            } else if self.eat_punct("(") {
                let args = self.parse_arguments()?;
                expr = Expr::Call {
                    callee: Box::new(expr),
                    args,
                };
            } else {
                self.depth = start_depth;
                return Ok(expr);
            }
        }
    }

    fn peek_postfix(&self) -> bool {
        matches!(self.peek(), TokenKind::Punct("." | "?." | "[" | "("))
    }

    fn parse_new(&mut self) -> Result<Expr, Condition> {
        self.bump();
        let mut callee = self.parse_primary()?;
        while self.eat_punct(".") {
            callee = Expr::Member {
                object: Box::new(callee),
                property: self.property_name()?,
                optional: false,
            };
        }
        let args = if self.eat_punct("(") {
            self.parse_arguments()?
        } else {
            Vec::new()
        };
        Ok(Expr::New {
            callee: Box::new(callee),
            args,
        })
    }

    fn property_name(&mut self) -> Result<String, Condition> {
        match self.next() {
            TokenKind::Ident(name) => Ok(name),
            other => Err(unexpected(&other)),
        }
    }

    /// Arguments after the opening `(`, through the closing `)`.
    fn parse_arguments(&mut self) -> Result<Vec<Expr>, Condition> {
        let mut args = Vec::new();
        while !self.eat_punct(")") {
            if self.peek_punct("...") {
                return Err(Condition::syntax("Spread syntax is not supported"));
            }
            args.push(self.parse_assignment()?);
            if !self.eat_punct(",") {
                self.expect_punct(")")?;
                break;
            }
        }
        Ok(args)
    }

    fn parse_primary(&mut self) -> Result<Expr, Condition> {
        match self.next() {
            TokenKind::Number(n) => Ok(Expr::Number(n)),
            TokenKind::Str(s) => Ok(Expr::Str(s)),
            TokenKind::Ident(word) => match word.as_str() {
                "true" => Ok(Expr::Bool(true)),
                "false" => Ok(Expr::Bool(false)),
                "null" => Ok(Expr::Null),
                w if RESERVED.contains(&w) => {
                    Err(Condition::syntax(&format!("Unexpected token '{w}'")))
                }
                w => {
                    check_supported(w)?;
                    Ok(Expr::Ident(word))
                }
            },
            TokenKind::Punct("(") => {
                let expr = self.parse_expression()?;
                self.expect_punct(")")?;
                Ok(expr)
            }
            TokenKind::Punct("[") => self.parse_array(),
            TokenKind::Punct("{") => self.parse_object(),
            TokenKind::Punct("...") => Err(Condition::syntax("Spread syntax is not supported")),
            other => Err(unexpected(&other)),
        }
    }

    fn parse_array(&mut self) -> Result<Expr, Condition> {
        let mut items = Vec::new();
        while !self.eat_punct("]") {
            if self.eat_punct(",") {
                items.push(Expr::Ident("undefined".to_string()));
                continue;
            }
            if self.peek_punct("...") {
                return Err(Condition::syntax("Spread syntax is not supported"));
            }
            items.push(self.parse_assignment()?);
            if !self.eat_punct(",") {
                self.expect_punct("]")?;
                break;
            }
        }
        Ok(Expr::Array(items))
    }

    fn parse_object(&mut self) -> Result<Expr, Condition> {
        let mut props = Vec::new();
        while !self.eat_punct("}") {
            let key = match self.next() {
                TokenKind::Ident(name) | TokenKind::Str(name) => name,
                TokenKind::Number(n) => super::value::format_number(n),
                other => return Err(unexpected(&other)),
            };
            let value = if self.eat_punct(":") {
                self.parse_assignment()?
            } else {
                Expr::Ident(key.clone())
            };
            props.push((key, value));
            if !self.eat_punct(",") {
                self.expect_punct("}")?;
                break;
            }
        }
        Ok(Expr::Object(props))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operator {
    Binary(BinaryOp),
    Logical(LogicalOp),
}

fn check_supported(word: &str) -> Result<(), Condition> {
    if UNSUPPORTED.contains(&word) {
        return Err(Condition::syntax(&format!("'{word}' is not supported in the console")));
    }
    Ok(())
}

fn unexpected(kind: &TokenKind) -> Condition {
    match kind {
        TokenKind::Eof => Condition::syntax("Unexpected end of input"),
        TokenKind::Newline => Condition::syntax("Unexpected line break"),
        TokenKind::Number(n) => Condition::syntax(&format!("Unexpected number {n}")),
        TokenKind::Str(_) => Condition::syntax("Unexpected string"),
        TokenKind::Ident(w) => Condition::syntax(&format!("Unexpected identifier '{w}'")),
        TokenKind::Punct(p) => Condition::syntax(&format!("Unexpected token '{p}'")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expr(src: &str) -> Expr {
        match parse_program(src).unwrap().remove(0) {
            Stmt::Expr(e) => e,
            other => panic!("expected expression, got {other:?}"),
        }
    }

    #[test]
    fn test_precedence() {
        let e = expr("1 + 2 * 3");
        let Expr::Binary { op, rhs, .. } = e else {
            panic!("expected binary");
        };
        assert_eq!(op, BinaryOp::Add);
        assert!(matches!(*rhs, Expr::Binary { op: BinaryOp::Mul, .. }));
    }

    #[test]
    fn test_pow_is_right_associative() {
        let Expr::Binary { lhs, rhs, .. } = expr("2 ** 3 ** 2") else {
            panic!("expected binary");
        };
        assert_eq!(*lhs, Expr::Number(2.0));
        assert!(matches!(*rhs, Expr::Binary { op: BinaryOp::Pow, .. }));
    }

    #[test]
    fn test_braces_are_blocks_in_statement_position() {
        assert!(parse_program("{a:1}").is_err());
        assert!(matches!(expr("({a:1})"), Expr::Object(_)));
    }

    #[test]
    fn test_newlines_separate_statements() {
        let stmts = parse_program("let a = 1\na + 1").unwrap();
        assert_eq!(stmts.len(), 2);
        assert!(matches!(stmts[0], Stmt::Decl { kind: DeclKind::Let, .. }));
    }

    #[test]
    fn test_member_chain_and_call() {
        let e = expr("console.log(a?.b, x[0])");
        let Expr::Call { callee, args } = e else {
            panic!("expected call");
        };
        assert!(matches!(*callee, Expr::Member { ref property, .. } if property == "log"));
        assert_eq!(args.len(), 2);
    }

    #[test]
    fn test_unsupported_keywords_report_clearly() {
        let err = parse_program("for (;;) {}").unwrap_err();
        assert!(err.to_string().contains("not supported"));
    }

    #[test]
    fn test_nesting_is_bounded() {
        let deep = format!("{}1{}", "(".repeat(500), ")".repeat(500));
        assert!(parse_program(&deep).is_err());
    }

    #[test]
    fn test_invalid_assignment_target() {
        assert!(parse_program("1 = 2").is_err());
    }
}
