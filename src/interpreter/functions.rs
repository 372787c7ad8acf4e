//! # User-function table
//!
//! `DEF FN name(param) = expr` registrations. Small insertion-ordered table,
//! same idiom as the variable store — a program rarely defines more than a
//! handful of functions.

use crate::parser::ast::Expr;

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDef {
    pub param: String,
    pub body: Expr,
}

#[derive(Debug, Default, Clone)]
pub struct FunctionTable {
    entries: Vec<(String, FunctionDef)>,
}

impl FunctionTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn define(&mut self, name: &str, def: FunctionDef) {
        let upper = name.to_ascii_uppercase();
        if let Some(slot) = self.entries.iter_mut().find(|(n, _)| *n == upper) {
            slot.1 = def;
        } else {
            self.entries.push((upper, def));
        }
    }

    pub fn get(&self, name: &str) -> Option<&FunctionDef> {
        let upper = name.to_ascii_uppercase();
        self.entries.iter().find(|(n, _)| *n == upper).map(|(_, d)| d)
    }
}
