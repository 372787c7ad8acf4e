//! # DATA pool
//!
//! At program-initialization time, every `DATA` statement's literals are
//! concatenated into a flat pool in source order (§4.3.8). `READ` consumes
//! from the pool; `RESTORE` repositions the pointer. The pool itself is
//! read-only for the duration of a run — only the pointer moves.

use crate::parser::ast::{DataLiteral, Stmt, StatementKind};
use crate::value::Value;

#[derive(Debug, Default, Clone)]
pub struct DataPool {
    values: Vec<DataLiteral>,
    /// Index of the next value `READ` will consume.
    pointer: usize,
    /// `pointer` value that corresponds to the start of each source line
    /// that contributed to the pool, for the `RESTORE <lineno>` form.
    line_starts: Vec<(i32, usize)>,
}

impl DataPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Walks the statement vector and harvests every `DATA` statement's
    /// literals in source order.
    pub fn build(statements: &[Stmt]) -> Self {
        let mut pool = DataPool::new();
        let mut current_line = 0;
        for stmt in statements {
            if let Some(line) = stmt.line_number {
                current_line = line;
            }
            if let StatementKind::Data(literals) = &stmt.kind {
                pool.line_starts.push((current_line, pool.values.len()));
                pool.values.extend(literals.iter().cloned());
            }
        }
        pool
    }

    pub fn reset(&mut self) {
        self.pointer = 0;
    }

    /// `RESTORE [lineno]`: unqualified resets to zero; the line-specific
    /// form (per `DESIGN.md`'s resolution of the corresponding open
    /// question) repositions to the first datum harvested from that line.
    pub fn restore(&mut self, line: Option<i32>) {
        match line {
            None => self.pointer = 0,
            Some(target) => {
                self.pointer = self
                    .line_starts
                    .iter()
                    .find(|(l, _)| *l == target)
                    .map(|(_, pos)| *pos)
                    .unwrap_or(0);
            }
        }
    }

    pub fn has_next(&self) -> bool {
        self.pointer < self.values.len()
    }

    pub fn next_raw(&mut self) -> Option<DataLiteral> {
        let v = self.values.get(self.pointer)?.clone();
        self.pointer += 1;
        Some(v)
    }

    /// Coerce the next pool literal to the type implied by `var_name`'s
    /// suffix: a `$`-suffixed variable receives the literal verbatim as
    /// text, anything else receives a parsed number (0 on parse failure).
    pub fn read_coerced(&mut self, var_name: &str) -> Option<Value> {
        let literal = self.next_raw()?;
        Some(if var_name.ends_with('$') {
            match literal {
                DataLiteral::Str(s) => Value::Str(s),
                DataLiteral::Number(n) => Value::Str(crate::value::format_number(n)),
            }
        } else {
            match literal {
                DataLiteral::Number(n) => Value::Number(n),
                DataLiteral::Str(s) => Value::Number(s.trim().parse().unwrap_or(0.0)),
            }
        })
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
    fn harvests_in_source_order() {
        let stmts = vec![
            stmt(Some(10), StatementKind::Data(vec![DataLiteral::Number(1.0), DataLiteral::Number(2.0)])),
            stmt(Some(20), StatementKind::Data(vec![DataLiteral::Str("THREE".into())])),
        ];
        let mut pool = DataPool::build(&stmts);
        assert_eq!(pool.read_coerced("A"), Some(Value::Number(1.0)));
        assert_eq!(pool.read_coerced("B"), Some(Value::Number(2.0)));
        assert_eq!(pool.read_coerced("C$"), Some(Value::Str("THREE".into())));
        assert_eq!(pool.read_coerced("D"), None);
    }

    #[test]
    fn restore_line_specific_repositions_to_that_line() {
        let stmts = vec![
            stmt(Some(10), StatementKind::Data(vec![DataLiteral::Number(1.0)])),
            stmt(Some(20), StatementKind::Data(vec![DataLiteral::Number(2.0)])),
        ];
        let mut pool = DataPool::build(&stmts);
        pool.next_raw();
        pool.next_raw();
        assert!(!pool.has_next());
        pool.restore(Some(20));
        assert_eq!(pool.read_coerced("A"), Some(Value::Number(2.0)));
    }
}
