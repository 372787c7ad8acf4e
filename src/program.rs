//! # Program
//!
//! The parsed statement vector plus its line-number index, per §3's data
//! model: "Ordered sequence of statements plus a mapping from user-visible
//! line numbers to statement indices." Insertion of a line with an existing
//! number replaces it; a new number splices in sorted position; the index
//! map is rebuilt whenever the sequence changes.

use std::collections::BTreeMap;

use crate::parser::ast::{
    ArrayTarget, AudioStatement, BinOp, DataLiteral, Expr, GraphicsStatement, PrintSep, Stmt,
    StatementKind, UnaryOp,
};
use crate::value::format_number;

#[derive(Debug, Default, Clone)]
pub struct Program {
    statements: Vec<Stmt>,
    line_map: BTreeMap<i32, usize>,
}

impl Program {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a program from a flat statement vector freshly produced by the
    /// parser, rebuilding the line-number index from scratch.
    pub fn from_statements(statements: Vec<Stmt>) -> Self {
        let mut program = Self {
            statements,
            line_map: BTreeMap::new(),
        };
        program.reindex();
        program
    }

    fn reindex(&mut self) {
        self.line_map.clear();
        for (i, stmt) in self.statements.iter().enumerate() {
            if let Some(line) = stmt.line_number {
                self.line_map.insert(line, i);
            }
        }
    }

    pub fn statements(&self) -> &[Stmt] {
        &self.statements
    }

    pub fn len(&self) -> usize {
        self.statements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Stmt> {
        self.statements.get(index)
    }

    /// Statement-vector index of the statement whose line number is `line`.
    pub fn index_of_line(&self, line: i32) -> Option<usize> {
        self.line_map.get(&line).copied()
    }

    /// Replace the program with a single new/edited line, parsed by the
    /// caller into its own small statement run sharing that line number.
    /// Splices in sorted position if the line number is new, replaces the
    /// existing run if the line number already exists.
    pub fn set_line(&mut self, line: i32, new_stmts: Vec<Stmt>) {
        let existing_run = self.line_run(line);
        match existing_run {
            Some((start, end)) => {
                self.statements.splice(start..end, new_stmts);
            }
            None => {
                let insert_at = self
                    .statements
                    .iter()
                    .position(|s| s.line_number.is_some_and(|n| n > line))
                    .unwrap_or(self.statements.len());
                self.statements.splice(insert_at..insert_at, new_stmts);
            }
        }
        self.reindex();
    }

    /// The `[start, end)` half-open range of statement indices belonging to
    /// `line` — the line's own leading statement plus every colon-separated
    /// statement following it up to (not including) the next line-numbered
    /// statement.
    fn line_run(&self, line: i32) -> Option<(usize, usize)> {
        let start = self.index_of_line(line)?;
        let end = self.statements[start + 1..]
            .iter()
            .position(|s| s.line_number.is_some())
            .map(|offset| start + 1 + offset)
            .unwrap_or(self.statements.len());
        Some((start, end))
    }

    /// `NEW`/`CLEAR`-adjacent reset: empties the statement vector entirely.
    pub fn clear(&mut self) {
        self.statements.clear();
        self.line_map.clear();
    }

    /// Render the program back to source text in ascending line-number
    /// order, for the `LIST` meta-command.
    pub fn list(&self) -> String {
        let mut out = String::new();
        let mut i = 0;
        while i < self.statements.len() {
            let stmt = &self.statements[i];
            if let Some(line) = stmt.line_number {
                out.push_str(&line.to_string());
                out.push(' ');
            }
            out.push_str(&render_statement(&stmt.kind));
            i += 1;
            while i < self.statements.len() && self.statements[i].line_number.is_none() {
                out.push_str(" : ");
                out.push_str(&render_statement(&self.statements[i].kind));
                i += 1;
            }
            out.push('\n');
        }
        out
    }
}

/// A best-effort, debug-oriented rendering of a statement back to source
/// text. Not required to byte-for-byte round-trip the original spelling —
/// only to round-trip through the lexer and parser (§8 Invariant 6): every
/// sub-expression is rendered out in full, never elided behind a `...`
/// placeholder, since a bare `.` is not a valid numeric literal and would
/// make the listing unparseable.
fn render_statement(kind: &StatementKind) -> String {
    match kind {
        StatementKind::Let { var, value } => format!("LET {} = {}", var, render_expr(value)),
        StatementKind::ArrayAssign { target, value } => {
            format!("{} = {}", render_array_target(target), render_expr(value))
        }
        StatementKind::Print { items, file_num } => {
            let mut out = String::from("PRINT ");
            if let Some(n) = file_num {
                out.push_str(&format!("#{}, ", render_expr(n)));
            }
            for item in items {
                out.push_str(&render_expr(&item.expr));
                match item.sep {
                    Some(PrintSep::Comma) => out.push(','),
                    Some(PrintSep::Semicolon) => out.push(';'),
                    None => {}
                }
            }
            out
        }
        StatementKind::Input { prompt, vars, file_num } => {
            let mut out = String::from("INPUT ");
            if let Some(n) = file_num {
                out.push_str(&format!("#{}, ", render_expr(n)));
            }
            if let Some(p) = prompt {
                out.push_str(&format!("\"{}\"; ", p));
            }
            out.push_str(&vars.join(", "));
            out
        }
        StatementKind::If { cond, then_branch, else_branch } => {
            let mut out = format!("IF {} THEN\n{}", render_expr(cond), render_block(then_branch));
            if let Some(else_branch) = else_branch {
                out.push_str(&format!("\nELSE\n{}", render_block(else_branch)));
            }
            out.push_str("\nENDIF");
            out
        }
        StatementKind::For { var, start, end, step } => {
            let mut out = format!("FOR {} = {} TO {}", var, render_expr(start), render_expr(end));
            if let Some(step) = step {
                out.push_str(&format!(" STEP {}", render_expr(step)));
            }
            out
        }
        StatementKind::Next { var } => match var {
            Some(v) => format!("NEXT {}", v),
            None => "NEXT".to_string(),
        },
        StatementKind::While { cond } => format!("WHILE {}", render_expr(cond)),
        StatementKind::Wend => "WEND".to_string(),
        StatementKind::Do { cond } => match cond {
            Some((polarity, expr)) => format!("DO {} {}", polarity_keyword(*polarity), render_expr(expr)),
            None => "DO".to_string(),
        },
        StatementKind::Loop { cond } => match cond {
            Some((polarity, expr)) => format!("LOOP {} {}", polarity_keyword(*polarity), render_expr(expr)),
            None => "LOOP".to_string(),
        },
        StatementKind::Goto(n) => format!("GOTO {}", n),
        StatementKind::Gosub(n) => format!("GOSUB {}", n),
        StatementKind::Return => "RETURN".to_string(),
        StatementKind::OnGoto { selector, targets } => {
            format!("ON {} GOTO {}", render_expr(selector), render_targets(targets))
        }
        StatementKind::OnGosub { selector, targets } => {
            format!("ON {} GOSUB {}", render_expr(selector), render_targets(targets))
        }
        StatementKind::Dim { arrays } => {
            let rendered = arrays
                .iter()
                .map(|(name, dims)| format!("{}({})", name, render_expr_list(dims)))
                .collect::<Vec<_>>()
                .join(", ");
            format!("DIM {}", rendered)
        }
        StatementKind::Data(literals) => {
            let rendered = literals.iter().map(render_data_literal).collect::<Vec<_>>().join(", ");
            format!("DATA {}", rendered)
        }
        StatementKind::Read(vars) => format!("READ {}", vars.join(", ")),
        StatementKind::Restore(line) => match line {
            Some(n) => format!("RESTORE {}", n),
            None => "RESTORE".to_string(),
        },
        StatementKind::DefFn { name, param, body } => {
            format!("DEF FN {}({}) = {}", name, param, render_expr(body))
        }
        StatementKind::End => "END".to_string(),
        StatementKind::Stop => "STOP".to_string(),
        StatementKind::Rem(text) => format!("REM {}", text),
        StatementKind::Run => "RUN".to_string(),
        StatementKind::List => "LIST".to_string(),
        StatementKind::New => "NEW".to_string(),
        StatementKind::Clear => "CLEAR".to_string(),
        StatementKind::Save(name) => render_with_optional_arg("SAVE", name.as_ref()),
        StatementKind::Load(name) => render_with_optional_arg("LOAD", name.as_ref()),
        StatementKind::Graphics(g) => render_graphics(g),
        StatementKind::Audio(a) => match a {
            AudioStatement::Sound { freq, duration } => {
                format!("SOUND {}, {}", render_expr(freq), render_expr(duration))
            }
            AudioStatement::Play(mml) => format!("PLAY {}", render_expr(mml)),
        },
        StatementKind::FileOpen { mode, file_num, name, rec_len } => {
            let mut out = format!(
                "OPEN {}, #{}, {}",
                render_expr(mode),
                render_expr(file_num),
                render_expr(name)
            );
            if let Some(rec_len) = rec_len {
                out.push_str(&format!(", {}", render_expr(rec_len)));
            }
            out
        }
        StatementKind::FileClose { file_nums } => {
            let rendered =
                file_nums.iter().map(|n| format!("#{}", render_expr(n))).collect::<Vec<_>>().join(", ");
            format!("CLOSE {}", rendered)
        }
    }
}

/// Each inner statement of an `IF`/`ELSE` block on its own line — always
/// valid regardless of how the block was originally spelled (single-line or
/// multi-line), since the parser skips any number of newlines between the
/// statements of a block body.
fn render_block(stmts: &[Stmt]) -> String {
    stmts.iter().map(|s| render_statement(&s.kind)).collect::<Vec<_>>().join("\n")
}

fn render_array_target(target: &ArrayTarget) -> String {
    format!("{}({})", target.name, render_expr_list(&target.indices))
}

fn render_expr_list(exprs: &[Expr]) -> String {
    exprs.iter().map(render_expr).collect::<Vec<_>>().join(", ")
}

fn render_targets(targets: &[i32]) -> String {
    targets.iter().map(i32::to_string).collect::<Vec<_>>().join(", ")
}

fn render_data_literal(literal: &DataLiteral) -> String {
    match literal {
        DataLiteral::Number(n) => format_number(*n),
        DataLiteral::Str(s) => format!("\"{}\"", s),
    }
}

fn polarity_keyword(polarity: crate::parser::ast::LoopPolarity) -> &'static str {
    use crate::parser::ast::LoopPolarity;
    match polarity {
        LoopPolarity::Until => "UNTIL",
        LoopPolarity::While => "WHILE",
    }
}

fn render_with_optional_arg(keyword: &str, arg: Option<&Expr>) -> String {
    match arg {
        Some(e) => format!("{} {}", keyword, render_expr(e)),
        None => keyword.to_string(),
    }
}

/// Renders a run of optional, comma-separated trailing arguments the way
/// the parser's own "peek for a comma, else stop" loops consume them:
/// a `None` that precedes a later `Some` must still occupy its comma slot
/// (`COLOR , 5` keeps `bg` in place even though `fg` is absent), but
/// trailing `None`s are dropped entirely since nothing after them needs a
/// placeholder.
fn render_optional_args(args: Vec<Option<String>>) -> String {
    let mut args = args;
    while matches!(args.last(), Some(None)) {
        args.pop();
    }
    args.into_iter().map(Option::unwrap_or_default).collect::<Vec<_>>().join(", ")
}

fn render_graphics(g: &GraphicsStatement) -> String {
    match g {
        GraphicsStatement::Screen(mode) => format!("SCREEN {}", render_expr(mode)),
        GraphicsStatement::Cls(mode) => render_with_optional_arg("CLS", mode.as_ref()),
        GraphicsStatement::Color { fg, bg, border } => {
            let args = render_optional_args(vec![
                fg.as_ref().map(render_expr),
                bg.as_ref().map(render_expr),
                border.as_ref().map(render_expr),
            ]);
            if args.is_empty() { "COLOR".to_string() } else { format!("COLOR {}", args) }
        }
        GraphicsStatement::PSet { x, y, color } => {
            let mut out = format!("PSET ({}, {})", render_expr(x), render_expr(y));
            if let Some(color) = color {
                out.push_str(&format!(", {}", render_expr(color)));
            }
            out
        }
        GraphicsStatement::PReset { x, y, color } => {
            let mut out = format!("PRESET ({}, {})", render_expr(x), render_expr(y));
            if let Some(color) = color {
                out.push_str(&format!(", {}", render_expr(color)));
            }
            out
        }
        GraphicsStatement::Line { x1, y1, x2, y2, color, boxed, filled } => {
            let mut out = format!(
                "LINE ({}, {})-({}, {})",
                render_expr(x1),
                render_expr(y1),
                render_expr(x2),
                render_expr(y2)
            );
            if let Some(color) = color {
                out.push_str(&format!(", {}", render_expr(color)));
            }
            if *boxed {
                out.push_str(if *filled { ", BF" } else { ", B" });
            }
            out
        }
        GraphicsStatement::Circle { x, y, radius, color } => {
            let mut out = format!("CIRCLE ({}, {}), {}", render_expr(x), render_expr(y), render_expr(radius));
            if let Some(color) = color {
                out.push_str(&format!(", {}", render_expr(color)));
            }
            out
        }
        GraphicsStatement::Paint { x, y, paint_color, border_color } => {
            let args = render_optional_args(vec![
                paint_color.as_ref().map(render_expr),
                border_color.as_ref().map(render_expr),
            ]);
            let mut out = format!("PAINT ({}, {})", render_expr(x), render_expr(y));
            if !args.is_empty() {
                out.push_str(&format!(", {}", args));
            }
            out
        }
        GraphicsStatement::Get { x1, y1, x2, y2, array } => format!(
            "GET ({}, {})-({}, {}), {}",
            render_expr(x1),
            render_expr(y1),
            render_expr(x2),
            render_expr(y2),
            array
        ),
        GraphicsStatement::Put { x, y, array } => {
            format!("PUT ({}, {}), {}", render_expr(x), render_expr(y), array)
        }
        GraphicsStatement::View(args) => format!("VIEW ({})", render_expr_list(args)),
        GraphicsStatement::Window(args) => format!("WINDOW ({})", render_expr_list(args)),
        GraphicsStatement::Palette(args) => format!("PALETTE ({})", render_expr_list(args)),
        GraphicsStatement::Draw(cmd) => format!("DRAW {}", render_expr(cmd)),
    }
}

/// Renders an expression back to source text. Every binary operation is
/// wrapped in parentheses regardless of its original precedence context, so
/// reparsing never depends on reconstructing precedence from scratch — it's
/// read straight back off the parenthesization.
fn render_expr(expr: &Expr) -> String {
    match expr {
        Expr::Number(n) => format_number(*n),
        Expr::Str(s) => format!("\"{}\"", s),
        Expr::Var(name) => name.clone(),
        Expr::Paren(inner) => format!("({})", render_expr(inner)),
        Expr::Unary { op, expr } => match op {
            UnaryOp::Neg => format!("-{}", render_expr(expr)),
            UnaryOp::Pos => format!("+{}", render_expr(expr)),
            UnaryOp::Not => format!("NOT {}", render_expr(expr)),
        },
        Expr::Binary { op, lhs, rhs } => {
            format!("({} {} {})", render_expr(lhs), binop_keyword(*op), render_expr(rhs))
        }
        Expr::Call { name, args } => format!("{}({})", name, render_expr_list(args)),
        Expr::ArrayAccess { name, indices } => format!("{}({})", name, render_expr_list(indices)),
        Expr::FnCall { name, arg } => format!("FN {}({})", name, render_expr(arg)),
    }
}

fn binop_keyword(op: BinOp) -> &'static str {
    match op {
        BinOp::Or => "OR",
        BinOp::And => "AND",
        BinOp::Eq => "=",
        BinOp::Ne => "<>",
        BinOp::Lt => "<",
        BinOp::Le => "<=",
        BinOp::Gt => ">",
        BinOp::Ge => ">=",
        BinOp::Add => "+",
        BinOp::Sub => "-",
        BinOp::Mul => "*",
        BinOp::Div => "/",
        BinOp::Mod => "MOD",
        BinOp::Pow => "^",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Span;

    fn stmt(line: Option<i32>, kind: StatementKind) -> Stmt {
        Stmt { line_number: line, kind, span: Span::new(1, 1) }
    }

    #[test]
    fn line_map_matches_statements() {
        let program = Program::from_statements(vec![
            stmt(Some(10), StatementKind::End),
            stmt(Some(20), StatementKind::Stop),
        ]);
        assert_eq!(program.index_of_line(10), Some(0));
        assert_eq!(program.index_of_line(20), Some(1));
    }

    #[test]
    fn set_line_replaces_existing_run() {
        let mut program = Program::from_statements(vec![
            stmt(Some(10), StatementKind::End),
            stmt(Some(20), StatementKind::Stop),
        ]);
        program.set_line(10, vec![stmt(Some(10), StatementKind::Rem("hi".into()))]);
        assert_eq!(program.len(), 2);
        assert!(matches!(program.get(0).unwrap().kind, StatementKind::Rem(_)));
    }

    #[test]
    fn set_line_splices_new_number_in_sorted_position() {
        let mut program = Program::from_statements(vec![
            stmt(Some(10), StatementKind::End),
            stmt(Some(30), StatementKind::Stop),
        ]);
        program.set_line(20, vec![stmt(Some(20), StatementKind::Rem("mid".into()))]);
        assert_eq!(program.len(), 3);
        assert_eq!(program.index_of_line(20), Some(1));
        assert_eq!(program.index_of_line(30), Some(2));
    }

    #[test]
    fn clear_empties_everything() {
        let mut program = Program::from_statements(vec![stmt(Some(10), StatementKind::End)]);
        program.clear();
        assert!(program.is_empty());
        assert_eq!(program.index_of_line(10), None);
    }
}
