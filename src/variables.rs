//! # Variable store
//!
//! Scalars and arrays, keyed by the identifier's full spelling including its
//! type suffix (`X`, `X$`, `X%` are three distinct variables — historical
//! BASIC does not unify them). Backed by insertion-ordered `Vec<(K, V)>`
//! tables rather than a `HashMap`, matching this runtime's small-table idiom
//! elsewhere (the user-function table, the DATA pool) — program variable
//! counts are small enough that linear scan beats hashing overhead, and
//! insertion order is handy for trace/snapshot rendering.

use crate::error::{ErrorKind, RuntimeError, Span};
use crate::value::Value;

/// A declared array: its shape (one bound per dimension) and flat,
/// row-major backing storage.
#[derive(Debug, Clone, PartialEq)]
pub struct ArrayCell {
    pub shape: Vec<usize>,
    pub data: Vec<Value>,
}

impl ArrayCell {
    fn new(name: &str, shape: Vec<usize>) -> Self {
        let len = shape.iter().product::<usize>().max(1);
        Self {
            data: vec![Value::default_for_name(name); len],
            shape,
        }
    }

    fn flat_index(&self, indices: &[usize], span: Span) -> Result<usize, RuntimeError> {
        if indices.len() != self.shape.len() {
            return Err(RuntimeError::at(
                ErrorKind::SubscriptOutOfRange,
                format!(
                    "array has {} dimension(s), got {} subscript(s)",
                    self.shape.len(),
                    indices.len()
                ),
                span,
            ));
        }
        let mut flat = 0usize;
        for (i, &idx) in indices.iter().enumerate() {
            if idx >= self.shape[i] {
                return Err(RuntimeError::at(
                    ErrorKind::SubscriptOutOfRange,
                    format!("subscript {} out of range (bound {})", idx, self.shape[i]),
                    span,
                ));
            }
            flat = flat * self.shape[i] + idx;
        }
        Ok(flat)
    }
}

#[derive(Debug, Default, Clone)]
pub struct VariableStore {
    scalars: Vec<(String, Value)>,
    arrays: Vec<(String, ArrayCell)>,
}

impl VariableStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A clone of this store with `name` rebound to `value`, used to build
    /// the shadow scope for a `DEF FN` call: everything else is inherited,
    /// only `name` (the function's parameter) is overridden.
    pub fn snapshot_with_override(&self, name: &str, value: Value) -> VariableStore {
        let mut copy = self.clone();
        copy.set_scalar(name, value);
        copy
    }

    pub fn clear(&mut self) {
        self.scalars.clear();
        self.arrays.clear();
    }

    pub fn get_scalar(&self, name: &str) -> Value {
        self.scalars
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.clone())
            .unwrap_or_else(|| Value::default_for_name(name))
    }

    pub fn set_scalar(&mut self, name: &str, value: Value) {
        if let Some(slot) = self.scalars.iter_mut().find(|(n, _)| n == name) {
            slot.1 = value;
        } else {
            self.scalars.push((name.to_string(), value));
        }
    }

    /// Iterate `(name, value)` pairs in declaration order, for trace
    /// snapshots and watch evaluation.
    pub fn scalars(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.scalars.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn declare_array(
        &mut self,
        name: &str,
        shape: Vec<usize>,
        span: Span,
    ) -> Result<(), RuntimeError> {
        if self.arrays.iter().any(|(n, _)| n == name) {
            return Err(RuntimeError::at(
                ErrorKind::ArrayAlreadyDeclared,
                format!("array {} already declared", name),
                span,
            ));
        }
        self.arrays.push((name.to_string(), ArrayCell::new(name, shape)));
        Ok(())
    }

    fn array(&self, name: &str, span: Span) -> Result<&ArrayCell, RuntimeError> {
        self.arrays
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, a)| a)
            .ok_or_else(|| {
                RuntimeError::at(
                    ErrorKind::ArrayNotDeclared,
                    format!("array {} not declared", name),
                    span,
                )
            })
    }

    fn array_mut(&mut self, name: &str, span: Span) -> Result<&mut ArrayCell, RuntimeError> {
        self.arrays
            .iter_mut()
            .find(|(n, _)| n == name)
            .map(|(_, a)| a)
            .ok_or_else(|| {
                RuntimeError::at(
                    ErrorKind::ArrayNotDeclared,
                    format!("array {} not declared", name),
                    span,
                )
            })
    }

    pub fn get_element(
        &self,
        name: &str,
        indices: &[usize],
        span: Span,
    ) -> Result<Value, RuntimeError> {
        let array = self.array(name, span)?;
        let flat = array.flat_index(indices, span)?;
        Ok(array.data[flat].clone())
    }

    pub fn set_element(
        &mut self,
        name: &str,
        indices: &[usize],
        value: Value,
        span: Span,
    ) -> Result<(), RuntimeError> {
        let array = self.array_mut(name, span)?;
        let flat = array.flat_index(indices, span)?;
        array.data[flat] = value;
        Ok(())
    }

    pub fn is_array_declared(&self, name: &str) -> bool {
        self.arrays.iter().any(|(n, _)| n == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn span() -> Span {
        Span::new(1, 1)
    }

    #[test]
    fn uninitialized_scalar_reads_as_the_suffix_appropriate_zero_value() {
        let store = VariableStore::new();
        assert_eq!(store.get_scalar("X"), Value::Number(0.0));
        assert_eq!(store.get_scalar("X$"), Value::Str(String::new()));
    }

    #[test]
    fn suffix_variants_of_a_name_are_distinct_variables() {
        let mut store = VariableStore::new();
        store.set_scalar("X", Value::Number(1.0));
        store.set_scalar("X$", Value::Str("hi".into()));
        assert_eq!(store.get_scalar("X"), Value::Number(1.0));
        assert_eq!(store.get_scalar("X$"), Value::Str("hi".into()));
    }

    #[test]
    fn array_access_is_row_major() {
        let mut store = VariableStore::new();
        store.declare_array("A", vec![2, 3], span()).unwrap();
        store.set_element("A", &[1, 2], Value::Number(9.0), span()).unwrap();
        assert_eq!(store.get_element("A", &[1, 2], span()).unwrap(), Value::Number(9.0));
        assert_eq!(store.get_element("A", &[0, 0], span()).unwrap(), Value::Number(0.0));
    }

    #[test]
    fn redeclaring_an_array_is_an_error() {
        let mut store = VariableStore::new();
        store.declare_array("A", vec![5], span()).unwrap();
        let err = store.declare_array("A", vec![10], span()).unwrap_err();
        assert_eq!(err.kind, ErrorKind::ArrayAlreadyDeclared);
    }

    #[test]
    fn accessing_an_undeclared_array_is_an_error() {
        let store = VariableStore::new();
        let err = store.get_element("A", &[0], span()).unwrap_err();
        assert_eq!(err.kind, ErrorKind::ArrayNotDeclared);
    }

    #[test]
    fn out_of_range_subscript_is_an_error() {
        let mut store = VariableStore::new();
        store.declare_array("A", vec![3], span()).unwrap();
        let err = store.get_element("A", &[3], span()).unwrap_err();
        assert_eq!(err.kind, ErrorKind::SubscriptOutOfRange);
    }

    #[test]
    fn snapshot_with_override_leaves_the_original_store_untouched() {
        let mut store = VariableStore::new();
        store.set_scalar("X", Value::Number(1.0));
        let shadow = store.snapshot_with_override("X", Value::Number(99.0));
        assert_eq!(shadow.get_scalar("X"), Value::Number(99.0));
        assert_eq!(store.get_scalar("X"), Value::Number(1.0));
    }
}
