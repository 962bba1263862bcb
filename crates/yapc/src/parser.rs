use yap_bytecode::{Truth, Type};

use crate::ast::*;
use crate::error::CompileError;
use crate::lexer::{Token, TokenKind};

pub fn parse(tokens: Vec<Token>) -> Result<Program, CompileError> {
    let mut parser = Parser::new(tokens);
    parser.parse_program()
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        Parser { tokens, pos: 0 }
    }

    fn peek(&self) -> Option<&TokenKind> {
        self.tokens.get(self.pos).map(|t| &t.kind)
    }

    fn current_line(&self) -> usize {
        if self.pos < self.tokens.len() {
            self.tokens[self.pos].line
        } else {
            self.tokens.last().map(|t| t.line).unwrap_or(1)
        }
    }

    fn advance(&mut self) -> Option<TokenKind> {
        if self.pos < self.tokens.len() {
            let tok = self.tokens[self.pos].kind.clone();
            self.pos += 1;
            Some(tok)
        } else {
            None
        }
    }

    fn expect(&mut self, expected: &TokenKind) -> Result<TokenKind, CompileError> {
        if self.pos >= self.tokens.len() {
            return Err(self.error(format!("expected {:?}, got EOF", expected)));
        }
        let tok = self.tokens[self.pos].kind.clone();
        if std::mem::discriminant(&tok) == std::mem::discriminant(expected) {
            self.pos += 1;
            Ok(tok)
        } else {
            Err(self.error(format!("expected {:?}, got {:?}", expected, tok)))
        }
    }

    fn expect_ident(&mut self) -> Result<String, CompileError> {
        if self.pos >= self.tokens.len() {
            return Err(self.error("expected identifier, got EOF".into()));
        }
        match &self.tokens[self.pos].kind {
            TokenKind::Ident(s) => {
                let s = s.clone();
                self.pos += 1;
                Ok(s)
            }
            other => Err(self.error(format!("expected identifier, got {:?}", other))),
        }
    }

    fn check(&self, kind: &TokenKind) -> bool {
        match self.peek() {
            Some(k) => std::mem::discriminant(k) == std::mem::discriminant(kind),
            None => false,
        }
    }

    fn error(&self, msg: String) -> CompileError {
        CompileError::Parse { line: self.current_line(), msg }
    }

    fn at_type(&self) -> bool {
        matches!(
            self.peek(),
            Some(
                TokenKind::IntTy
                    | TokenKind::FloatTy
                    | TokenKind::BoolTy
                    | TokenKind::StringTy
                    | TokenKind::VoidTy
                    | TokenKind::StackTy
                    | TokenKind::QueueTy
                    | TokenKind::HashmapTy
            )
        )
    }

    fn parse_program(&mut self) -> Result<Program, CompileError> {
        let mut stmts = Vec::new();
        while self.peek().is_some() {
            stmts.push(self.parse_stmt()?);
        }
        Ok(Program { stmts })
    }

    fn parse_type(&mut self) -> Result<Type, CompileError> {
        let base = match self.advance() {
            Some(TokenKind::IntTy) => Type::Int,
            Some(TokenKind::FloatTy) => Type::Float,
            Some(TokenKind::BoolTy) => Type::Bool,
            Some(TokenKind::StringTy) => Type::Str,
            Some(TokenKind::VoidTy) => Type::Void,
            Some(TokenKind::StackTy) => {
                self.expect(&TokenKind::Lt)?;
                let inner = self.parse_type()?;
                self.expect(&TokenKind::Gt)?;
                return Ok(Type::Stack(Box::new(inner)));
            }
            Some(TokenKind::QueueTy) => {
                self.expect(&TokenKind::Lt)?;
                let inner = self.parse_type()?;
                self.expect(&TokenKind::Gt)?;
                return Ok(Type::Queue(Box::new(inner)));
            }
            Some(TokenKind::HashmapTy) => {
                self.expect(&TokenKind::Lt)?;
                let key = self.parse_type()?;
                self.expect(&TokenKind::Comma)?;
                let val = self.parse_type()?;
                self.expect(&TokenKind::Gt)?;
                return Ok(Type::Map(Box::new(key), Box::new(val)));
            }
            other => return Err(self.error(format!("expected type, got {:?}", other))),
        };

        // Trailing `[]` marks an array type
        if self.check(&TokenKind::LBracket) {
            self.advance();
            self.expect(&TokenKind::RBracket)?;
            Ok(Type::Array(Box::new(base)))
        } else {
            Ok(base)
        }
    }

    fn parse_stmt(&mut self) -> Result<Stmt, CompileError> {
        match self.peek() {
            Some(TokenKind::Def) => self.parse_fn_def().map(Stmt::Function),
            Some(TokenKind::Yeet) => self.parse_return(),
            Some(TokenKind::Yap) => self.parse_print(),
            Some(TokenKind::If) => self.parse_cond(),
            Some(TokenKind::While) => self.parse_while(),
            Some(TokenKind::For) => self.parse_for(),
            Some(TokenKind::Break) => {
                self.advance();
                self.expect(&TokenKind::Semi)?;
                Ok(Stmt::Break)
            }
            Some(TokenKind::Continue) => {
                self.advance();
                self.expect(&TokenKind::Semi)?;
                Ok(Stmt::Continue)
            }
            Some(TokenKind::Struct) => self.parse_struct_def(),
            _ if self.at_type() => {
                let stmt = self.parse_declaration()?;
                self.expect(&TokenKind::Semi)?;
                Ok(stmt)
            }
            _ => {
                let stmt = self.parse_assign_or_expr()?;
                self.expect(&TokenKind::Semi)?;
                Ok(stmt)
            }
        }
    }

    /// `type name = expr` or a bare container declaration `stack<T> name`.
    /// The statement separator is left to the caller so `for`-loop
    /// initializers can reuse this.
    fn parse_declaration(&mut self) -> Result<Stmt, CompileError> {
        let ty = self.parse_type()?;
        let name = self.expect_ident()?;

        if self.check(&TokenKind::Eq) {
            self.advance();
            let mut value = self.parse_expr()?;
            // `spill()` picks up the declaration's target type
            if let Expr::Input(t) = &mut value {
                *t = ty.clone();
            }
            Ok(Stmt::Declaration { ty, name, value: Some(value) })
        } else {
            match ty {
                Type::Stack(_) | Type::Queue(_) | Type::Map(_, _) => {
                    Ok(Stmt::Declaration { ty, name, value: None })
                }
                _ => Err(self.error(format!("expected '=' after declaration of '{name}'"))),
            }
        }
    }

    /// Assignment (`name = e`, `a[i] = e`) or a bare expression
    /// statement, separator left to the caller.
    fn parse_assign_or_expr(&mut self) -> Result<Stmt, CompileError> {
        let expr = self.parse_expr()?;
        if self.check(&TokenKind::Eq) {
            self.advance();
            let value = self.parse_expr()?;
            match expr {
                Expr::Var(name) => Ok(Stmt::Assignment { name, value }),
                Expr::Index { target, index } => {
                    Ok(Stmt::IndexAssign { target: *target, index: *index, value })
                }
                _ => Err(self.error("invalid assignment target".into())),
            }
        } else {
            Ok(Stmt::Expr(expr))
        }
    }

    fn parse_fn_def(&mut self) -> Result<FnDef, CompileError> {
        self.expect(&TokenKind::Def)?;
        let name = self.expect_ident()?;
        self.expect(&TokenKind::LParen)?;

        let mut params = Vec::new();
        while !self.check(&TokenKind::RParen) {
            if !params.is_empty() {
                self.expect(&TokenKind::Comma)?;
            }
            let ty = self.parse_type()?;
            let pname = self.expect_ident()?;
            params.push((ty, pname));
        }
        self.expect(&TokenKind::RParen)?;

        let ret = if self.check(&TokenKind::Arrow) {
            self.advance();
            self.parse_type()?
        } else {
            Type::Void
        };

        let body = self.parse_block()?;
        Ok(FnDef { name, params, ret, body })
    }

    fn parse_return(&mut self) -> Result<Stmt, CompileError> {
        self.expect(&TokenKind::Yeet)?;
        if self.check(&TokenKind::Semi) {
            self.advance();
            return Ok(Stmt::Return(None));
        }
        if self.check(&TokenKind::RBrace) || self.peek().is_none() {
            return Ok(Stmt::Return(None));
        }
        let value = self.parse_expr()?;
        // `yeet` is newline-terminated; the semicolon is optional
        if self.check(&TokenKind::Semi) {
            self.advance();
        }
        Ok(Stmt::Return(Some(value)))
    }

    fn parse_print(&mut self) -> Result<Stmt, CompileError> {
        self.expect(&TokenKind::Yap)?;
        self.expect(&TokenKind::LParen)?;
        let mut values = Vec::new();
        while !self.check(&TokenKind::RParen) {
            if !values.is_empty() {
                self.expect(&TokenKind::Comma)?;
            }
            values.push(self.parse_expr()?);
        }
        self.expect(&TokenKind::RParen)?;
        self.expect(&TokenKind::Semi)?;
        Ok(Stmt::Print(values))
    }

    fn parse_cond(&mut self) -> Result<Stmt, CompileError> {
        self.expect(&TokenKind::If)?;
        self.expect(&TokenKind::LParen)?;
        let condition = self.parse_expr()?;
        self.expect(&TokenKind::RParen)?;
        let body = self.parse_block()?;

        let mut arms = vec![(condition, body)];
        while self.check(&TokenKind::Elif) {
            self.advance();
            self.expect(&TokenKind::LParen)?;
            let condition = self.parse_expr()?;
            self.expect(&TokenKind::RParen)?;
            let body = self.parse_block()?;
            arms.push((condition, body));
        }

        let otherwise = if self.check(&TokenKind::Else) {
            self.advance();
            Some(self.parse_block()?)
        } else {
            None
        };

        Ok(Stmt::Cond { arms, otherwise })
    }

    fn parse_while(&mut self) -> Result<Stmt, CompileError> {
        self.expect(&TokenKind::While)?;
        self.expect(&TokenKind::LParen)?;
        let condition = self.parse_expr()?;
        self.expect(&TokenKind::RParen)?;
        let body = self.parse_block()?;
        Ok(Stmt::While { condition, body })
    }

    fn parse_for(&mut self) -> Result<Stmt, CompileError> {
        self.expect(&TokenKind::For)?;
        self.expect(&TokenKind::LParen)?;

        let init = if self.at_type() {
            self.parse_declaration()?
        } else {
            self.parse_assign_or_expr()?
        };
        self.expect(&TokenKind::Semi)?;

        let condition = self.parse_expr()?;
        self.expect(&TokenKind::Semi)?;

        let step = self.parse_assign_or_expr()?;
        self.expect(&TokenKind::RParen)?;

        let body = self.parse_block()?;
        Ok(Stmt::For {
            init: Box::new(init),
            condition,
            step: Box::new(step),
            body,
        })
    }

    fn parse_struct_def(&mut self) -> Result<Stmt, CompileError> {
        self.expect(&TokenKind::Struct)?;
        let name = self.expect_ident()?;
        self.expect(&TokenKind::LBrace)?;
        let mut fields = Vec::new();
        while !self.check(&TokenKind::RBrace) {
            let ty = self.parse_type()?;
            let fname = self.expect_ident()?;
            self.expect(&TokenKind::Semi)?;
            fields.push((ty, fname));
        }
        self.expect(&TokenKind::RBrace)?;
        Ok(Stmt::StructDef { name, fields })
    }

    fn parse_block(&mut self) -> Result<Vec<Stmt>, CompileError> {
        self.expect(&TokenKind::LBrace)?;
        let mut stmts = Vec::new();
        while !self.check(&TokenKind::RBrace) {
            if self.peek().is_none() {
                return Err(self.error("expected '}', got EOF".into()));
            }
            stmts.push(self.parse_stmt()?);
        }
        self.expect(&TokenKind::RBrace)?;
        Ok(stmts)
    }

    fn parse_expr(&mut self) -> Result<Expr, CompileError> {
        self.parse_logical()
    }

    /// Logical, comparison, and bitwise binary operators share one
    /// left-associative level; `not` and `~~` prefix its operands.
    fn parse_logical(&mut self) -> Result<Expr, CompileError> {
        let mut left = self.parse_logical_operand()?;
        loop {
            let op = match self.peek() {
                Some(TokenKind::And) => BinOp::And,
                Some(TokenKind::Or) => BinOp::Or,
                Some(TokenKind::Lt) => BinOp::Lt,
                Some(TokenKind::LtEq) => BinOp::Le,
                Some(TokenKind::Gt) => BinOp::Gt,
                Some(TokenKind::GtEq) => BinOp::Ge,
                Some(TokenKind::EqEq) => BinOp::Eq,
                Some(TokenKind::BangEq) => BinOp::Ne,
                Some(TokenKind::Amp) => BinOp::BitAnd,
                Some(TokenKind::Pipe) => BinOp::BitOr,
                _ => break,
            };
            self.advance();
            let right = self.parse_logical_operand()?;
            left = Expr::Binary { op, left: Box::new(left), right: Box::new(right) };
        }
        Ok(left)
    }

    fn parse_logical_operand(&mut self) -> Result<Expr, CompileError> {
        match self.peek() {
            Some(TokenKind::Not) => {
                self.advance();
                let expr = self.parse_logical_operand()?;
                Ok(Expr::Unary { op: UnOp::Not, expr: Box::new(expr) })
            }
            Some(TokenKind::TildeTilde) => {
                self.advance();
                let expr = self.parse_logical_operand()?;
                Ok(Expr::Unary { op: UnOp::BitNot, expr: Box::new(expr) })
            }
            _ => self.parse_additive(),
        }
    }

    fn parse_additive(&mut self) -> Result<Expr, CompileError> {
        let mut left = self.parse_modulo()?;
        loop {
            let op = match self.peek() {
                Some(TokenKind::Plus) => BinOp::Add,
                Some(TokenKind::Minus) => BinOp::Sub,
                _ => break,
            };
            self.advance();
            let right = self.parse_modulo()?;
            left = Expr::Binary { op, left: Box::new(left), right: Box::new(right) };
        }
        Ok(left)
    }

    fn parse_modulo(&mut self) -> Result<Expr, CompileError> {
        let mut left = self.parse_multiplicative()?;
        while self.check(&TokenKind::Percent) {
            self.advance();
            let right = self.parse_multiplicative()?;
            left = Expr::Binary {
                op: BinOp::Mod,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, CompileError> {
        let mut left = self.parse_division()?;
        while self.check(&TokenKind::Star) {
            self.advance();
            let right = self.parse_division()?;
            left = Expr::Binary {
                op: BinOp::Mul,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_division(&mut self) -> Result<Expr, CompileError> {
        let mut left = self.parse_exponent()?;
        loop {
            let op = match self.peek() {
                Some(TokenKind::Slash) => BinOp::Div,
                Some(TokenKind::SlashSlash) => BinOp::FloorDiv,
                _ => break,
            };
            self.advance();
            let right = self.parse_exponent()?;
            left = Expr::Binary { op, left: Box::new(left), right: Box::new(right) };
        }
        Ok(left)
    }

    fn parse_exponent(&mut self) -> Result<Expr, CompileError> {
        let left = self.parse_postfix()?;
        if self.check(&TokenKind::Caret) {
            self.advance();
            // Right-associative: 2^3^2 == 2^(3^2)
            let right = self.parse_exponent()?;
            return Ok(Expr::Binary {
                op: BinOp::Pow,
                left: Box::new(left),
                right: Box::new(right),
            });
        }
        Ok(left)
    }

    /// Trailing `[index]` chains and method-style calls.
    fn parse_postfix(&mut self) -> Result<Expr, CompileError> {
        let mut expr = self.parse_atom()?;
        loop {
            if self.check(&TokenKind::LBracket) {
                self.advance();
                let index = self.parse_expr()?;
                self.expect(&TokenKind::RBracket)?;
                expr = Expr::Index { target: Box::new(expr), index: Box::new(index) };
            } else if self.check(&TokenKind::Dot) {
                self.advance();
                let method = self.expect_ident()?;
                self.expect(&TokenKind::LParen)?;
                expr = match method.as_str() {
                    "append" => {
                        let value = self.parse_expr()?;
                        Expr::Append { target: Box::new(expr), value: Box::new(value) }
                    }
                    "delete" => {
                        let index = self.parse_expr()?;
                        Expr::Delete { target: Box::new(expr), index: Box::new(index) }
                    }
                    "len" => Expr::Len(Box::new(expr)),
                    "push" => {
                        let value = self.parse_expr()?;
                        Expr::SeqPush { target: Box::new(expr), value: Box::new(value) }
                    }
                    "pop" => Expr::SeqPop(Box::new(expr)),
                    other => {
                        return Err(self.error(format!("unknown method: '{other}'")));
                    }
                };
                self.expect(&TokenKind::RParen)?;
            } else {
                break;
            }
        }
        Ok(expr)
    }

    fn parse_atom(&mut self) -> Result<Expr, CompileError> {
        match self.peek().cloned() {
            // `~x` desugars to multiplication by -1
            Some(TokenKind::Tilde) => {
                self.advance();
                let expr = self.parse_atom()?;
                Ok(Expr::Binary {
                    op: BinOp::Mul,
                    left: Box::new(Expr::Int(-1)),
                    right: Box::new(expr),
                })
            }
            Some(TokenKind::IntLit(n)) => {
                self.advance();
                Ok(Expr::Int(n))
            }
            Some(TokenKind::FloatLit(x)) => {
                self.advance();
                Ok(Expr::Float(x))
            }
            Some(TokenKind::StringLit(s)) => {
                self.advance();
                Ok(Expr::Str(s))
            }
            Some(TokenKind::Nocap) => {
                self.advance();
                Ok(Expr::Bool(Truth::Nocap))
            }
            Some(TokenKind::Cap) => {
                self.advance();
                Ok(Expr::Bool(Truth::Cap))
            }
            Some(TokenKind::Spill) => {
                self.advance();
                self.expect(&TokenKind::LParen)?;
                self.expect(&TokenKind::RParen)?;
                Ok(Expr::Input(Type::Unknown))
            }
            Some(TokenKind::LParen) => {
                self.advance();
                let expr = self.parse_expr()?;
                self.expect(&TokenKind::RParen)?;
                Ok(Expr::Paren(Box::new(expr)))
            }
            Some(TokenKind::LBracket) => {
                self.advance();
                let mut items = Vec::new();
                while !self.check(&TokenKind::RBracket) {
                    if !items.is_empty() {
                        self.expect(&TokenKind::Comma)?;
                    }
                    items.push(self.parse_expr()?);
                }
                self.expect(&TokenKind::RBracket)?;
                Ok(Expr::ArrayLit(items))
            }
            Some(TokenKind::Ident(name)) => {
                self.advance();
                if self.check(&TokenKind::LParen) {
                    self.advance();
                    let mut args = Vec::new();
                    while !self.check(&TokenKind::RParen) {
                        if !args.is_empty() {
                            self.expect(&TokenKind::Comma)?;
                        }
                        args.push(self.parse_expr()?);
                    }
                    self.expect(&TokenKind::RParen)?;
                    Ok(Expr::Call { name, args })
                } else {
                    Ok(Expr::Var(name))
                }
            }
            other => Err(self.error(format!("expected expression, got {:?}", other))),
        }
    }
}
