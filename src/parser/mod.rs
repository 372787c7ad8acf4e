//! # Parser
//!
//! Recursive-descent statement parser plus a precedence-climbing expression
//! parser, producing the flat `Vec<Stmt>` from `ast.rs`.
//!
//! ## Architecture
//!
//! The token stream is read line by line: each logical line starts with an
//! optional leading line number, then one or more `:`-separated statements.
//! A block-form `IF...THEN` (the `THEN` is the last token on its line) reads
//! statements across physical lines until a matching `ELSE`/`ENDIF`; every
//! other construct — including `FOR`/`NEXT`, `WHILE`/`WEND`, `DO`/`LOOP` — is
//! parsed as flat sibling statements per the AST's own design note, with
//! stack-discipline validated in a post-parse pass rather than during
//! descent.

pub mod ast;

#[cfg(test)]
mod tests;

use crate::error::{ErrorKind, RuntimeError, Span};
use crate::lexer::token::{Token, TokenKind};
use ast::{
    ArrayTarget, AudioStatement, BinOp, DataLiteral, Expr, GraphicsStatement, LoopPolarity,
    PrintItem, PrintSep, Stmt, StatementKind, UnaryOp,
};

pub struct ParseResult {
    pub statements: Vec<Stmt>,
    pub errors: Vec<RuntimeError>,
}

#[must_use]
pub fn parse(tokens: &[Token]) -> ParseResult {
    let mut parser = Parser { tokens, pos: 0 };
    let mut statements = Vec::new();
    let mut errors = Vec::new();

    parser.skip_newlines();
    while !parser.is_eof() {
        if let Err(err) = parser.parse_line(&mut statements) {
            errors.push(err);
            parser.recover_to_next_line();
        }
        parser.skip_newlines();
    }

    validate_structure(&statements, &mut errors);
    ParseResult { statements, errors }
}

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
}

impl<'a> Parser<'a> {
    fn peek_kind(&self) -> &TokenKind {
        &self.tokens[self.pos].kind
    }

    fn peek_at(&self, offset: usize) -> &TokenKind {
        self.tokens.get(self.pos + offset).map(|t| &t.kind).unwrap_or(&TokenKind::Eof)
    }

    fn current_span(&self) -> Span {
        self.tokens[self.pos].span
    }

    fn is_eof(&self) -> bool {
        matches!(self.peek_kind(), TokenKind::Eof)
    }

    fn advance(&mut self) -> &Token {
        let tok = &self.tokens[self.pos];
        if !matches!(tok.kind, TokenKind::Eof) {
            self.pos += 1;
        }
        tok
    }

    fn skip_newlines(&mut self) {
        while matches!(self.peek_kind(), TokenKind::Newline) {
            self.advance();
        }
    }

    fn matches_kind(&self, kind: &TokenKind) -> bool {
        std::mem::discriminant(self.peek_kind()) == std::mem::discriminant(kind)
    }

    fn at_statement_end(&self) -> bool {
        matches!(
            self.peek_kind(),
            TokenKind::Colon | TokenKind::Newline | TokenKind::Eof | TokenKind::Else | TokenKind::EndIf
        )
    }

    fn error_here(&self, kind: ErrorKind, message: impl Into<String>) -> RuntimeError {
        RuntimeError::at(kind, message, self.current_span())
    }

    fn expect(&mut self, kind: TokenKind, message: &str) -> Result<(), RuntimeError> {
        if self.matches_kind(&kind) {
            self.advance();
            Ok(())
        } else {
            Err(self.error_here(ErrorKind::UnexpectedToken, message.to_string()))
        }
    }

    fn expect_identifier(&mut self, message: &str) -> Result<String, RuntimeError> {
        match self.peek_kind().clone() {
            TokenKind::Identifier(name) => {
                self.advance();
                Ok(name)
            }
            _ => Err(self.error_here(ErrorKind::UnexpectedToken, message.to_string())),
        }
    }

    fn recover_to_next_line(&mut self) {
        while !matches!(self.peek_kind(), TokenKind::Newline | TokenKind::Eof) {
            self.advance();
        }
    }

    fn parse_expr_list(&mut self, terminator: TokenKind) -> Result<Vec<Expr>, RuntimeError> {
        let mut out = Vec::new();
        if self.matches_kind(&terminator) {
            return Ok(out);
        }
        loop {
            out.push(self.parse_expr()?);
            if matches!(self.peek_kind(), TokenKind::Comma) {
                self.advance();
            } else {
                break;
            }
        }
        Ok(out)
    }

    fn parse_lineno(&mut self) -> Result<i32, RuntimeError> {
        match self.peek_kind().clone() {
            TokenKind::Number(n) => {
                self.advance();
                Ok(n as i32)
            }
            other => Err(self.error_here(
                ErrorKind::UnexpectedToken,
                format!("expected a line number, found {:?}", other),
            )),
        }
    }

    // --- lines and statement runs ---

    fn parse_line(&mut self, out: &mut Vec<Stmt>) -> Result<(), RuntimeError> {
        let line_number = if let TokenKind::Number(n) = self.peek_kind().clone() {
            self.advance();
            Some(n as i32)
        } else {
            None
        };

        let mut first = true;
        loop {
            if matches!(self.peek_kind(), TokenKind::Newline | TokenKind::Eof) {
                break;
            }
            let span = self.current_span();
            let kind = self.parse_statement()?;
            out.push(Stmt { line_number: if first { line_number } else { None }, kind, span });
            first = false;
            if matches!(self.peek_kind(), TokenKind::Colon) {
                self.advance();
            } else {
                break;
            }
        }
        Ok(())
    }

    /// Reads statements across physical lines until a terminator keyword
    /// (`ELSE`/`ENDIF`) starts a logical line. Used for block-form `IF`.
    fn parse_block_body(&mut self, terminators: &[TokenKind]) -> Result<Vec<Stmt>, RuntimeError> {
        let mut out = Vec::new();
        loop {
            self.skip_newlines();
            if self.is_eof() {
                return Err(self
                    .error_here(ErrorKind::MissingTerminator, "unterminated IF block (missing ELSE/ENDIF)"));
            }
            if terminators.iter().any(|t| self.matches_kind(t)) {
                break;
            }
            loop {
                let span = self.current_span();
                let kind = self.parse_statement()?;
                out.push(Stmt { line_number: None, kind, span });
                if matches!(self.peek_kind(), TokenKind::Colon) {
                    self.advance();
                } else {
                    break;
                }
            }
        }
        Ok(out)
    }

    /// Reads statements on the same physical line, stopping before a
    /// terminator (`ELSE`), a newline, or EOF. Used for single-line `IF`.
    fn parse_inline_body(&mut self, terminators: &[TokenKind]) -> Result<Vec<Stmt>, RuntimeError> {
        let mut out = Vec::new();
        loop {
            if matches!(self.peek_kind(), TokenKind::Newline | TokenKind::Eof)
                || terminators.iter().any(|t| self.matches_kind(t))
            {
                break;
            }
            let span = self.current_span();
            let kind = self.parse_statement()?;
            out.push(Stmt { line_number: None, kind, span });
            if matches!(self.peek_kind(), TokenKind::Colon) {
                self.advance();
            } else {
                break;
            }
        }
        Ok(out)
    }

    // --- statement dispatch ---

    fn parse_statement(&mut self) -> Result<StatementKind, RuntimeError> {
        match self.peek_kind().clone() {
            TokenKind::Let => {
                self.advance();
                self.parse_let_or_array_assign()
            }
            TokenKind::Identifier(_) => self.parse_let_or_array_assign(),
            TokenKind::Print => {
                self.advance();
                self.parse_print()
            }
            TokenKind::Input => {
                self.advance();
                self.parse_input()
            }
            TokenKind::If => {
                self.advance();
                self.parse_if()
            }
            TokenKind::For => {
                self.advance();
                self.parse_for()
            }
            TokenKind::Next => {
                self.advance();
                self.parse_next()
            }
            TokenKind::While => {
                self.advance();
                Ok(StatementKind::While { cond: self.parse_expr()? })
            }
            TokenKind::Wend => {
                self.advance();
                Ok(StatementKind::Wend)
            }
            TokenKind::Do => {
                self.advance();
                Ok(StatementKind::Do { cond: self.parse_loop_condition()? })
            }
            TokenKind::Loop => {
                self.advance();
                Ok(StatementKind::Loop { cond: self.parse_loop_condition()? })
            }
            TokenKind::Goto => {
                self.advance();
                Ok(StatementKind::Goto(self.parse_lineno()?))
            }
            TokenKind::Gosub => {
                self.advance();
                Ok(StatementKind::Gosub(self.parse_lineno()?))
            }
            TokenKind::Return => {
                self.advance();
                Ok(StatementKind::Return)
            }
            TokenKind::On => {
                self.advance();
                self.parse_on()
            }
            TokenKind::Dim => {
                self.advance();
                self.parse_dim()
            }
            TokenKind::Data => {
                self.advance();
                self.parse_data()
            }
            TokenKind::Read => {
                self.advance();
                self.parse_read()
            }
            TokenKind::Restore => {
                self.advance();
                self.parse_restore()
            }
            TokenKind::Def => {
                self.advance();
                self.parse_def_fn()
            }
            TokenKind::End => {
                self.advance();
                Ok(StatementKind::End)
            }
            TokenKind::Stop => {
                self.advance();
                Ok(StatementKind::Stop)
            }
            TokenKind::Rem(text) => {
                self.advance();
                Ok(StatementKind::Rem(text))
            }
            TokenKind::Run => {
                self.advance();
                Ok(StatementKind::Run)
            }
            TokenKind::List => {
                self.advance();
                Ok(StatementKind::List)
            }
            TokenKind::New => {
                self.advance();
                Ok(StatementKind::New)
            }
            TokenKind::Clear => {
                self.advance();
                Ok(StatementKind::Clear)
            }
            TokenKind::Save => {
                self.advance();
                Ok(StatementKind::Save(self.parse_optional_trailing_expr()?))
            }
            TokenKind::Load => {
                self.advance();
                Ok(StatementKind::Load(self.parse_optional_trailing_expr()?))
            }
            TokenKind::Screen
            | TokenKind::Cls
            | TokenKind::Color
            | TokenKind::PSet
            | TokenKind::PReset
            | TokenKind::Line
            | TokenKind::Circle
            | TokenKind::Paint
            | TokenKind::Get
            | TokenKind::Put
            | TokenKind::View
            | TokenKind::Window
            | TokenKind::Palette
            | TokenKind::Draw => self.parse_graphics(),
            TokenKind::Sound | TokenKind::Play => self.parse_audio(),
            TokenKind::Open => {
                self.advance();
                self.parse_open()
            }
            TokenKind::Close => {
                self.advance();
                self.parse_close()
            }
            other => Err(self.error_here(
                ErrorKind::UnexpectedToken,
                format!("unexpected token {:?} at start of statement", other),
            )),
        }
    }

    fn parse_optional_trailing_expr(&mut self) -> Result<Option<Expr>, RuntimeError> {
        if self.at_statement_end() {
            Ok(None)
        } else {
            Ok(Some(self.parse_expr()?))
        }
    }

    fn parse_let_or_array_assign(&mut self) -> Result<StatementKind, RuntimeError> {
        let name = self.expect_identifier("expected a variable name")?;
        if matches!(self.peek_kind(), TokenKind::LParen) {
            self.advance();
            let indices = self.parse_expr_list(TokenKind::RParen)?;
            self.expect(TokenKind::RParen, "expected ')' after array indices")?;
            self.expect(TokenKind::Equal, "expected '=' in array assignment")?;
            let value = self.parse_expr()?;
            Ok(StatementKind::ArrayAssign { target: ArrayTarget { name, indices }, value })
        } else {
            self.expect(TokenKind::Equal, "expected '=' in assignment")?;
            let value = self.parse_expr()?;
            Ok(StatementKind::Let { var: name, value })
        }
    }

    fn parse_optional_file_num(&mut self) -> Result<Option<Expr>, RuntimeError> {
        if matches!(self.peek_kind(), TokenKind::Hash) {
            self.advance();
            let e = self.parse_expr()?;
            if matches!(self.peek_kind(), TokenKind::Comma) {
                self.advance();
            }
            Ok(Some(e))
        } else {
            Ok(None)
        }
    }

    fn parse_print(&mut self) -> Result<StatementKind, RuntimeError> {
        let file_num = self.parse_optional_file_num()?;
        let mut items = Vec::new();
        while !self.at_statement_end() {
            let expr = self.parse_expr()?;
            let sep = match self.peek_kind() {
                TokenKind::Comma => {
                    self.advance();
                    Some(PrintSep::Comma)
                }
                TokenKind::Semicolon => {
                    self.advance();
                    Some(PrintSep::Semicolon)
                }
                _ => None,
            };
            let keep_going = sep.is_some();
            items.push(PrintItem { expr, sep });
            if !keep_going {
                break;
            }
        }
        Ok(StatementKind::Print { items, file_num })
    }

    fn parse_input(&mut self) -> Result<StatementKind, RuntimeError> {
        let file_num = self.parse_optional_file_num()?;
        let mut prompt = None;
        if let TokenKind::String(s) = self.peek_kind().clone() {
            if matches!(self.peek_at(1), TokenKind::Semicolon) {
                self.advance();
                self.advance();
                prompt = Some(s);
            }
        }
        let mut vars = Vec::new();
        loop {
            vars.push(self.expect_identifier("expected a variable name in INPUT")?);
            if matches!(self.peek_kind(), TokenKind::Comma) {
                self.advance();
            } else {
                break;
            }
        }
        Ok(StatementKind::Input { prompt, vars, file_num })
    }

    fn parse_if(&mut self) -> Result<StatementKind, RuntimeError> {
        let cond = self.parse_expr()?;
        self.expect(TokenKind::Then, "expected THEN after IF condition")?;

        if matches!(self.peek_kind(), TokenKind::Newline) {
            let then_branch = self.parse_block_body(&[TokenKind::Else, TokenKind::EndIf])?;
            let else_branch = if matches!(self.peek_kind(), TokenKind::Else) {
                self.advance();
                Some(self.parse_block_body(&[TokenKind::EndIf])?)
            } else {
                None
            };
            self.expect(TokenKind::EndIf, "expected ENDIF to close a block IF")?;
            Ok(StatementKind::If { cond, then_branch, else_branch })
        } else if let TokenKind::Number(n) = self.peek_kind().clone() {
            // `IF cond THEN <lineno>` is shorthand for `IF cond THEN GOTO <lineno>`.
            self.advance();
            let then_branch = vec![Stmt { line_number: None, kind: StatementKind::Goto(n as i32), span: self.current_span() }];
            let else_branch = if matches!(self.peek_kind(), TokenKind::Else) {
                self.advance();
                Some(self.parse_inline_body(&[])?)
            } else {
                None
            };
            Ok(StatementKind::If { cond, then_branch, else_branch })
        } else {
            let then_branch = self.parse_inline_body(&[TokenKind::Else])?;
            let else_branch = if matches!(self.peek_kind(), TokenKind::Else) {
                self.advance();
                Some(self.parse_inline_body(&[])?)
            } else {
                None
            };
            Ok(StatementKind::If { cond, then_branch, else_branch })
        }
    }

    fn parse_for(&mut self) -> Result<StatementKind, RuntimeError> {
        let var = self.expect_identifier("expected a loop variable after FOR")?;
        self.expect(TokenKind::Equal, "expected '=' after the FOR loop variable")?;
        let start = self.parse_expr()?;
        self.expect(TokenKind::To, "expected TO in FOR statement")?;
        let end = self.parse_expr()?;
        let step = if matches!(self.peek_kind(), TokenKind::Step) {
            self.advance();
            Some(self.parse_expr()?)
        } else {
            None
        };
        Ok(StatementKind::For { var, start, end, step })
    }

    fn parse_next(&mut self) -> Result<StatementKind, RuntimeError> {
        let var = if let TokenKind::Identifier(name) = self.peek_kind().clone() {
            self.advance();
            Some(name)
        } else {
            None
        };
        Ok(StatementKind::Next { var })
    }

    fn parse_loop_condition(&mut self) -> Result<Option<(LoopPolarity, Expr)>, RuntimeError> {
        let polarity = match self.peek_kind() {
            TokenKind::Until => {
                self.advance();
                Some(LoopPolarity::Until)
            }
            TokenKind::While => {
                self.advance();
                Some(LoopPolarity::While)
            }
            _ => None,
        };
        match polarity {
            Some(p) => Ok(Some((p, self.parse_expr()?))),
            None => Ok(None),
        }
    }

    fn parse_on(&mut self) -> Result<StatementKind, RuntimeError> {
        let selector = self.parse_expr()?;
        let is_gosub = match self.peek_kind().clone() {
            TokenKind::Goto => {
                self.advance();
                false
            }
            TokenKind::Gosub => {
                self.advance();
                true
            }
            other => {
                return Err(self.error_here(
                    ErrorKind::UnexpectedToken,
                    format!("expected GOTO or GOSUB after ON, found {:?}", other),
                ))
            }
        };
        let mut targets = Vec::new();
        loop {
            targets.push(self.parse_lineno()?);
            if matches!(self.peek_kind(), TokenKind::Comma) {
                self.advance();
            } else {
                break;
            }
        }
        Ok(if is_gosub {
            StatementKind::OnGosub { selector, targets }
        } else {
            StatementKind::OnGoto { selector, targets }
        })
    }

    fn parse_dim(&mut self) -> Result<StatementKind, RuntimeError> {
        let mut arrays = Vec::new();
        loop {
            let name = self.expect_identifier("expected an array name in DIM")?;
            self.expect(TokenKind::LParen, "expected '(' after the array name in DIM")?;
            let dims = self.parse_expr_list(TokenKind::RParen)?;
            self.expect(TokenKind::RParen, "expected ')' to close DIM dimensions")?;
            arrays.push((name, dims));
            if matches!(self.peek_kind(), TokenKind::Comma) {
                self.advance();
            } else {
                break;
            }
        }
        Ok(StatementKind::Dim { arrays })
    }

    fn parse_data(&mut self) -> Result<StatementKind, RuntimeError> {
        let mut literals = Vec::new();
        loop {
            let lit = match self.peek_kind().clone() {
                TokenKind::Minus => {
                    self.advance();
                    match self.peek_kind().clone() {
                        TokenKind::Number(n) => {
                            self.advance();
                            DataLiteral::Number(-n)
                        }
                        other => {
                            return Err(self.error_here(
                                ErrorKind::UnexpectedToken,
                                format!("expected a number after '-' in DATA, found {:?}", other),
                            ))
                        }
                    }
                }
                TokenKind::Number(n) => {
                    self.advance();
                    DataLiteral::Number(n)
                }
                TokenKind::String(s) => {
                    self.advance();
                    DataLiteral::Str(s)
                }
                other => {
                    return Err(self
                        .error_here(ErrorKind::UnexpectedToken, format!("expected a DATA literal, found {:?}", other)))
                }
            };
            literals.push(lit);
            if matches!(self.peek_kind(), TokenKind::Comma) {
                self.advance();
            } else {
                break;
            }
        }
        Ok(StatementKind::Data(literals))
    }

    fn parse_read(&mut self) -> Result<StatementKind, RuntimeError> {
        let mut vars = Vec::new();
        loop {
            vars.push(self.expect_identifier("expected a variable name in READ")?);
            if matches!(self.peek_kind(), TokenKind::Comma) {
                self.advance();
            } else {
                break;
            }
        }
        Ok(StatementKind::Read(vars))
    }

    fn parse_restore(&mut self) -> Result<StatementKind, RuntimeError> {
        if let TokenKind::Number(n) = self.peek_kind().clone() {
            self.advance();
            Ok(StatementKind::Restore(Some(n as i32)))
        } else {
            Ok(StatementKind::Restore(None))
        }
    }

    fn parse_def_fn(&mut self) -> Result<StatementKind, RuntimeError> {
        self.expect(TokenKind::Fn, "expected FN after DEF")?;
        let name = self.expect_identifier("expected a function name after DEF FN")?;
        self.expect(TokenKind::LParen, "expected '(' after the function name")?;
        let param = self.expect_identifier("expected a parameter name")?;
        self.expect(TokenKind::RParen, "expected ')' after the parameter")?;
        self.expect(TokenKind::Equal, "expected '=' in DEF FN")?;
        let body = self.parse_expr()?;
        Ok(StatementKind::DefFn { name, param, body })
    }

    fn parse_point(&mut self) -> Result<(Expr, Expr), RuntimeError> {
        self.expect(TokenKind::LParen, "expected '(' to start a coordinate pair")?;
        let x = self.parse_expr()?;
        self.expect(TokenKind::Comma, "expected ',' between coordinates")?;
        let y = self.parse_expr()?;
        self.expect(TokenKind::RParen, "expected ')' to close a coordinate pair")?;
        Ok((x, y))
    }

    fn parse_optional_expr(&mut self) -> Result<Option<Expr>, RuntimeError> {
        if matches!(self.peek_kind(), TokenKind::Comma) || self.at_statement_end() {
            Ok(None)
        } else {
            Ok(Some(self.parse_expr()?))
        }
    }

    fn parse_optional_trailing_color(&mut self) -> Result<Option<Expr>, RuntimeError> {
        if matches!(self.peek_kind(), TokenKind::Comma) {
            self.advance();
            self.parse_optional_expr()
        } else {
            Ok(None)
        }
    }

    fn parse_optional_box_style(&mut self) -> Result<(bool, bool), RuntimeError> {
        if matches!(self.peek_kind(), TokenKind::Comma) {
            if let TokenKind::Identifier(word) = self.peek_at(1).clone() {
                let upper = word.to_ascii_uppercase();
                if upper == "B" || upper == "BF" {
                    self.advance();
                    self.advance();
                    return Ok((true, upper == "BF"));
                }
            }
        }
        Ok((false, false))
    }

    fn parse_paren_expr_list(&mut self) -> Result<Vec<Expr>, RuntimeError> {
        self.expect(TokenKind::LParen, "expected '(' to start an argument list")?;
        let list = self.parse_expr_list(TokenKind::RParen)?;
        self.expect(TokenKind::RParen, "expected ')' to close an argument list")?;
        Ok(list)
    }

    fn parse_graphics(&mut self) -> Result<StatementKind, RuntimeError> {
        match self.peek_kind().clone() {
            TokenKind::Screen => {
                self.advance();
                Ok(StatementKind::Graphics(GraphicsStatement::Screen(self.parse_expr()?)))
            }
            TokenKind::Cls => {
                self.advance();
                let mode = if self.at_statement_end() { None } else { Some(self.parse_expr()?) };
                Ok(StatementKind::Graphics(GraphicsStatement::Cls(mode)))
            }
            TokenKind::Color => {
                self.advance();
                let fg = self.parse_optional_expr()?;
                let bg = if matches!(self.peek_kind(), TokenKind::Comma) {
                    self.advance();
                    self.parse_optional_expr()?
                } else {
                    None
                };
                let border = if matches!(self.peek_kind(), TokenKind::Comma) {
                    self.advance();
                    self.parse_optional_expr()?
                } else {
                    None
                };
                Ok(StatementKind::Graphics(GraphicsStatement::Color { fg, bg, border }))
            }
            TokenKind::PSet => {
                self.advance();
                let (x, y) = self.parse_point()?;
                let color = self.parse_optional_trailing_color()?;
                Ok(StatementKind::Graphics(GraphicsStatement::PSet { x, y, color }))
            }
            TokenKind::PReset => {
                self.advance();
                let (x, y) = self.parse_point()?;
                let color = self.parse_optional_trailing_color()?;
                Ok(StatementKind::Graphics(GraphicsStatement::PReset { x, y, color }))
            }
            TokenKind::Line => {
                self.advance();
                let (x1, y1) = self.parse_point()?;
                self.expect(TokenKind::Minus, "expected '-' between LINE endpoints")?;
                let (x2, y2) = self.parse_point()?;
                let color = if matches!(self.peek_kind(), TokenKind::Comma) {
                    self.advance();
                    self.parse_optional_expr()?
                } else {
                    None
                };
                let (boxed, filled) = self.parse_optional_box_style()?;
                Ok(StatementKind::Graphics(GraphicsStatement::Line { x1, y1, x2, y2, color, boxed, filled }))
            }
            TokenKind::Circle => {
                self.advance();
                let (x, y) = self.parse_point()?;
                self.expect(TokenKind::Comma, "expected ',' after the CIRCLE center")?;
                let radius = self.parse_expr()?;
                let color = if matches!(self.peek_kind(), TokenKind::Comma) {
                    self.advance();
                    Some(self.parse_expr()?)
                } else {
                    None
                };
                Ok(StatementKind::Graphics(GraphicsStatement::Circle { x, y, radius, color }))
            }
            TokenKind::Paint => {
                self.advance();
                let (x, y) = self.parse_point()?;
                let paint_color = if matches!(self.peek_kind(), TokenKind::Comma) {
                    self.advance();
                    self.parse_optional_expr()?
                } else {
                    None
                };
                let border_color = if matches!(self.peek_kind(), TokenKind::Comma) {
                    self.advance();
                    self.parse_optional_expr()?
                } else {
                    None
                };
                Ok(StatementKind::Graphics(GraphicsStatement::Paint { x, y, paint_color, border_color }))
            }
            TokenKind::Get => {
                self.advance();
                let (x1, y1) = self.parse_point()?;
                self.expect(TokenKind::Minus, "expected '-' between GET endpoints")?;
                let (x2, y2) = self.parse_point()?;
                self.expect(TokenKind::Comma, "expected ',' before the GET target array")?;
                let array = self.expect_identifier("expected an array name in GET")?;
                Ok(StatementKind::Graphics(GraphicsStatement::Get { x1, y1, x2, y2, array }))
            }
            TokenKind::Put => {
                self.advance();
                let (x, y) = self.parse_point()?;
                self.expect(TokenKind::Comma, "expected ',' before the PUT source array")?;
                let array = self.expect_identifier("expected an array name in PUT")?;
                Ok(StatementKind::Graphics(GraphicsStatement::Put { x, y, array }))
            }
            TokenKind::View => {
                self.advance();
                Ok(StatementKind::Graphics(GraphicsStatement::View(self.parse_paren_expr_list()?)))
            }
            TokenKind::Window => {
                self.advance();
                Ok(StatementKind::Graphics(GraphicsStatement::Window(self.parse_paren_expr_list()?)))
            }
            TokenKind::Palette => {
                self.advance();
                Ok(StatementKind::Graphics(GraphicsStatement::Palette(self.parse_paren_expr_list()?)))
            }
            TokenKind::Draw => {
                self.advance();
                Ok(StatementKind::Graphics(GraphicsStatement::Draw(self.parse_expr()?)))
            }
            other => Err(self.error_here(ErrorKind::UnexpectedToken, format!("unexpected graphics token {:?}", other))),
        }
    }

    fn parse_audio(&mut self) -> Result<StatementKind, RuntimeError> {
        match self.peek_kind().clone() {
            TokenKind::Sound => {
                self.advance();
                let freq = self.parse_expr()?;
                self.expect(TokenKind::Comma, "expected ',' between SOUND frequency and duration")?;
                let duration = self.parse_expr()?;
                Ok(StatementKind::Audio(AudioStatement::Sound { freq, duration }))
            }
            TokenKind::Play => {
                self.advance();
                Ok(StatementKind::Audio(AudioStatement::Play(self.parse_expr()?)))
            }
            other => Err(self.error_here(ErrorKind::UnexpectedToken, format!("unexpected audio token {:?}", other))),
        }
    }

    fn parse_open(&mut self) -> Result<StatementKind, RuntimeError> {
        let mode = self.parse_expr()?;
        self.expect(TokenKind::Comma, "expected ',' after the OPEN mode")?;
        self.expect(TokenKind::Hash, "expected '#' before the OPEN file number")?;
        let file_num = self.parse_expr()?;
        self.expect(TokenKind::Comma, "expected ',' after the OPEN file number")?;
        let name = self.parse_expr()?;
        let rec_len = if matches!(self.peek_kind(), TokenKind::Comma) {
            self.advance();
            Some(self.parse_expr()?)
        } else {
            None
        };
        Ok(StatementKind::FileOpen { mode, file_num, name, rec_len })
    }

    fn parse_close(&mut self) -> Result<StatementKind, RuntimeError> {
        let mut file_nums = Vec::new();
        if matches!(self.peek_kind(), TokenKind::Hash) {
            loop {
                self.expect(TokenKind::Hash, "expected '#' before a CLOSE file number")?;
                file_nums.push(self.parse_expr()?);
                if matches!(self.peek_kind(), TokenKind::Comma) {
                    self.advance();
                } else {
                    break;
                }
            }
        }
        Ok(StatementKind::FileClose { file_nums })
    }

    // --- expressions, precedence climbing low to high:
    // or < and < relational < add/sub < mul/div/mod < pow < unary < primary

    fn parse_expr(&mut self) -> Result<Expr, RuntimeError> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> Result<Expr, RuntimeError> {
        let mut lhs = self.parse_and()?;
        while matches!(self.peek_kind(), TokenKind::Or) {
            self.advance();
            let rhs = self.parse_and()?;
            lhs = Expr::Binary { op: BinOp::Or, lhs: Box::new(lhs), rhs: Box::new(rhs) };
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<Expr, RuntimeError> {
        let mut lhs = self.parse_rel()?;
        while matches!(self.peek_kind(), TokenKind::And) {
            self.advance();
            let rhs = self.parse_rel()?;
            lhs = Expr::Binary { op: BinOp::And, lhs: Box::new(lhs), rhs: Box::new(rhs) };
        }
        Ok(lhs)
    }

    fn parse_rel(&mut self) -> Result<Expr, RuntimeError> {
        let mut lhs = self.parse_add()?;
        loop {
            let op = match self.peek_kind() {
                TokenKind::Equal => BinOp::Eq,
                TokenKind::NotEqual => BinOp::Ne,
                TokenKind::Less => BinOp::Lt,
                TokenKind::LessEqual => BinOp::Le,
                TokenKind::Greater => BinOp::Gt,
                TokenKind::GreaterEqual => BinOp::Ge,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_add()?;
            lhs = Expr::Binary { op, lhs: Box::new(lhs), rhs: Box::new(rhs) };
        }
        Ok(lhs)
    }

    fn parse_add(&mut self) -> Result<Expr, RuntimeError> {
        let mut lhs = self.parse_mul()?;
        loop {
            let op = match self.peek_kind() {
                TokenKind::Plus => BinOp::Add,
                TokenKind::Minus => BinOp::Sub,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_mul()?;
            lhs = Expr::Binary { op, lhs: Box::new(lhs), rhs: Box::new(rhs) };
        }
        Ok(lhs)
    }

    fn parse_mul(&mut self) -> Result<Expr, RuntimeError> {
        let mut lhs = self.parse_pow()?;
        loop {
            let op = match self.peek_kind() {
                TokenKind::Star => BinOp::Mul,
                TokenKind::Slash => BinOp::Div,
                TokenKind::Mod => BinOp::Mod,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_pow()?;
            lhs = Expr::Binary { op, lhs: Box::new(lhs), rhs: Box::new(rhs) };
        }
        Ok(lhs)
    }

    /// Right-associative; each operand is a `parse_unary`, not a bare
    /// primary, so a chained unary like `2^-1` parses.
    fn parse_pow(&mut self) -> Result<Expr, RuntimeError> {
        let base = self.parse_unary()?;
        if matches!(self.peek_kind(), TokenKind::Caret) {
            self.advance();
            let rhs = self.parse_pow()?;
            Ok(Expr::Binary { op: BinOp::Pow, lhs: Box::new(base), rhs: Box::new(rhs) })
        } else {
            Ok(base)
        }
    }

    fn parse_unary(&mut self) -> Result<Expr, RuntimeError> {
        match self.peek_kind() {
            TokenKind::Plus => {
                self.advance();
                Ok(Expr::Unary { op: UnaryOp::Pos, expr: Box::new(self.parse_unary()?) })
            }
            TokenKind::Minus => {
                self.advance();
                Ok(Expr::Unary { op: UnaryOp::Neg, expr: Box::new(self.parse_unary()?) })
            }
            TokenKind::Not => {
                self.advance();
                Ok(Expr::Unary { op: UnaryOp::Not, expr: Box::new(self.parse_unary()?) })
            }
            _ => self.parse_primary(),
        }
    }

    fn parse_primary(&mut self) -> Result<Expr, RuntimeError> {
        match self.peek_kind().clone() {
            TokenKind::Number(n) => {
                self.advance();
                Ok(Expr::Number(n))
            }
            TokenKind::String(s) => {
                self.advance();
                Ok(Expr::Str(s))
            }
            TokenKind::LParen => {
                self.advance();
                let inner = self.parse_expr()?;
                self.expect(TokenKind::RParen, "expected ')' to close a parenthesized expression")?;
                Ok(Expr::Paren(Box::new(inner)))
            }
            TokenKind::Fn => {
                self.advance();
                let name = self.expect_identifier("expected a function name after FN")?;
                self.expect(TokenKind::LParen, "expected '(' after the FN name")?;
                let arg = self.parse_expr()?;
                self.expect(TokenKind::RParen, "expected ')' after the FN argument")?;
                Ok(Expr::FnCall { name, arg: Box::new(arg) })
            }
            TokenKind::Identifier(name) => {
                self.advance();
                if matches!(self.peek_kind(), TokenKind::LParen) {
                    self.advance();
                    let args = self.parse_expr_list(TokenKind::RParen)?;
                    self.expect(TokenKind::RParen, "expected ')' to close a call or array access")?;
                    if crate::eval::is_builtin_function(&name.to_ascii_uppercase()) {
                        Ok(Expr::Call { name, args })
                    } else {
                        Ok(Expr::ArrayAccess { name, indices: args })
                    }
                } else {
                    Ok(Expr::Var(name))
                }
            }
            other => Err(self.error_here(ErrorKind::UnexpectedToken, format!("unexpected token {:?} in expression", other))),
        }
    }
}

/// Post-parse validation of `FOR`/`NEXT`, `WHILE`/`WEND`, and `DO`/`LOOP`
/// stack discipline (§4.2 failure modes), plus the structural rule that
/// these loop pairs may only appear as top-level siblings: the interpreter
/// pairs them by scanning the flat program vector, which never descends
/// into a nested `IF` branch.
fn validate_structure(statements: &[Stmt], errors: &mut Vec<RuntimeError>) {
    validate_top_level(statements, errors);
    for stmt in statements {
        if let StatementKind::If { then_branch, else_branch, .. } = &stmt.kind {
            reject_loops_in_block(then_branch, errors);
            if let Some(else_branch) = else_branch {
                reject_loops_in_block(else_branch, errors);
            }
        }
    }
}

fn validate_top_level(statements: &[Stmt], errors: &mut Vec<RuntimeError>) {
    let mut for_stack: Vec<(&str, Span)> = Vec::new();
    let mut while_stack: Vec<Span> = Vec::new();
    let mut do_stack: Vec<(bool, Span)> = Vec::new();

    for stmt in statements {
        match &stmt.kind {
            StatementKind::For { var, .. } => for_stack.push((var.as_str(), stmt.span)),
            StatementKind::Next { var } => match for_stack.pop() {
                None => errors.push(RuntimeError::at(
                    ErrorKind::NextWithoutFor,
                    "NEXT without a matching FOR",
                    stmt.span,
                )),
                Some((open_var, _)) => {
                    if let Some(name) = var {
                        if name != open_var {
                            errors.push(RuntimeError::at(
                                ErrorKind::NextVariableMismatch,
                                format!("NEXT {} does not match the innermost FOR {}", name, open_var),
                                stmt.span,
                            ));
                        }
                    }
                }
            },
            StatementKind::While { .. } => while_stack.push(stmt.span),
            StatementKind::Wend => {
                if while_stack.pop().is_none() {
                    errors.push(RuntimeError::at(ErrorKind::MissingTerminator, "WEND without a matching WHILE", stmt.span));
                }
            }
            StatementKind::Do { cond } => do_stack.push((cond.is_some(), stmt.span)),
            StatementKind::Loop { cond } => match do_stack.pop() {
                None => errors.push(RuntimeError::at(ErrorKind::MissingTerminator, "LOOP without a matching DO", stmt.span)),
                Some((has_pre_condition, _)) => {
                    if !has_pre_condition && cond.is_none() {
                        errors.push(RuntimeError::at(
                            ErrorKind::MissingTerminator,
                            "DO/LOOP needs an UNTIL or WHILE condition on one side",
                            stmt.span,
                        ));
                    }
                }
            },
            _ => {}
        }
    }

    for (_, span) in for_stack {
        errors.push(RuntimeError::at(ErrorKind::ForWithoutNext, "FOR without a matching NEXT", span));
    }
    for span in while_stack {
        errors.push(RuntimeError::at(ErrorKind::MissingTerminator, "WHILE without a matching WEND", span));
    }
    for (_, span) in do_stack {
        errors.push(RuntimeError::at(ErrorKind::MissingTerminator, "DO without a matching LOOP", span));
    }
}

fn reject_loops_in_block(statements: &[Stmt], errors: &mut Vec<RuntimeError>) {
    for stmt in statements {
        match &stmt.kind {
            StatementKind::For { .. }
            | StatementKind::Next { .. }
            | StatementKind::While { .. }
            | StatementKind::Wend
            | StatementKind::Do { .. }
            | StatementKind::Loop { .. } => {
                errors.push(RuntimeError::at(
                    ErrorKind::UnexpectedToken,
                    "FOR/WHILE/DO loops must be top-level statements, not nested inside an IF branch",
                    stmt.span,
                ));
            }
            StatementKind::If { then_branch, else_branch, .. } => {
                reject_loops_in_block(then_branch, errors);
                if let Some(else_branch) = else_branch {
                    reject_loops_in_block(else_branch, errors);
                }
            }
            _ => {}
        }
    }
}
