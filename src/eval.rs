//! # Expression evaluator
//!
//! Evaluates a pure `Expr` tree against the current variable store and
//! user-function table. Re-entrant and stateless beyond the environment it
//! is handed — no suspension point lives in here (per the concurrency
//! model, expression evaluation is never a suspension point).

use crate::error::{ErrorKind, RuntimeError, Span};
use crate::interpreter::functions::FunctionTable;
use crate::parser::ast::{BinOp, Expr, UnaryOp};
use crate::value::Value;
use crate::variables::VariableStore;

/// Fixed vocabulary of builtin function names, checked case-insensitively.
/// The parser consults this same list to disambiguate `NAME(...)` as a
/// builtin call rather than an array access.
const BUILTIN_NAMES: &[&str] = &[
    "ABS", "INT", "RND", "SIN", "COS", "TAN", "ATN", "LOG", "EXP", "SQR", "STR$", "CHR$", "LEN",
    "VAL", "ASC", "LEFT$", "RIGHT$", "MID$", "POINT",
];

pub fn is_builtin_function(name_upper: &str) -> bool {
    BUILTIN_NAMES.contains(&name_upper)
}

/// Read-only access the evaluator needs to a running peripheral, kept
/// minimal and optional so expressions can be evaluated (e.g. by the
/// debugger, against a watch) without a graphics peripheral attached.
pub trait PointSource {
    fn point(&self, x: i32, y: i32) -> i32;
}

pub struct EvalContext<'a> {
    pub variables: &'a VariableStore,
    pub functions: &'a FunctionTable,
    pub graphics: Option<&'a dyn PointSource>,
}

pub fn eval(expr: &Expr, span: Span, ctx: &EvalContext) -> Result<Value, RuntimeError> {
    match expr {
        Expr::Number(n) => Ok(Value::Number(*n)),
        Expr::Str(s) => Ok(Value::Str(s.clone())),
        Expr::Var(name) => {
            if ctx.variables.is_array_declared(name) {
                // Bare `A` where `A` is a declared array is a type error in
                // this dialect; the parser only produces `Var` for names
                // used without subscripts.
                return Err(RuntimeError::at(
                    ErrorKind::TypeMismatch,
                    format!("{} is an array, expected a scalar", name),
                    span,
                ));
            }
            Ok(ctx.variables.get_scalar(name))
        }
        Expr::Paren(inner) => eval(inner, span, ctx),
        Expr::Unary { op, expr } => eval_unary(*op, expr, span, ctx),
        Expr::Binary { op, lhs, rhs } => eval_binary(*op, lhs, rhs, span, ctx),
        Expr::Call { name, args } => eval_call(name, args, span, ctx),
        Expr::ArrayAccess { name, indices } => eval_array_access(name, indices, span, ctx),
        Expr::FnCall { name, arg } => eval_fn_call(name, arg, span, ctx),
    }
}

fn eval_unary(op: UnaryOp, expr: &Expr, span: Span, ctx: &EvalContext) -> Result<Value, RuntimeError> {
    let v = eval(expr, span, ctx)?;
    match op {
        UnaryOp::Pos => Ok(Value::Number(v.as_number(span)?)),
        UnaryOp::Neg => Ok(Value::Number(-v.as_number(span)?)),
        UnaryOp::Not => {
            // Historical bitwise NOT on the truncated integer representation.
            let n = v.as_number(span)? as i64;
            Ok(Value::Number(!n as f64))
        }
    }
}

fn eval_binary(
    op: BinOp,
    lhs: &Expr,
    rhs: &Expr,
    span: Span,
    ctx: &EvalContext,
) -> Result<Value, RuntimeError> {
    // `+` needs both operand values before it knows whether to concatenate
    // or add, so it is handled before anything assumes numeric operands.
    if op == BinOp::Add {
        let l = eval(lhs, span, ctx)?;
        let r = eval(rhs, span, ctx)?;
        return match (&l, &r) {
            (Value::Str(a), Value::Str(b)) => Ok(Value::Str(format!("{}{}", a, b))),
            (Value::Str(a), _) => Ok(Value::Str(format!("{}{}", a, r.to_display_string()))),
            (_, Value::Str(b)) => Ok(Value::Str(format!("{}{}", l.to_display_string(), b))),
            _ => checked_number(l.as_number(span)? + r.as_number(span)?, span),
        };
    }

    match op {
        BinOp::Eq | BinOp::Ne | BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge => {
            let l = eval(lhs, span, ctx)?;
            let r = eval(rhs, span, ctx)?;
            let ordering = match (&l, &r) {
                (Value::Str(a), Value::Str(b)) => a.cmp(b),
                _ => l
                    .as_number(span)?
                    .partial_cmp(&r.as_number(span)?)
                    .unwrap_or(std::cmp::Ordering::Equal),
            };
            use std::cmp::Ordering::*;
            let truth = match op {
                BinOp::Eq => ordering == Equal,
                BinOp::Ne => ordering != Equal,
                BinOp::Lt => ordering == Less,
                BinOp::Le => ordering != Greater,
                BinOp::Gt => ordering == Greater,
                BinOp::Ge => ordering != Less,
                _ => unreachable!(),
            };
            Ok(basic_bool(truth))
        }
        BinOp::And | BinOp::Or => {
            let l = eval(lhs, span, ctx)?.as_number(span)? as i64;
            let r = eval(rhs, span, ctx)?.as_number(span)? as i64;
            let result = match op {
                BinOp::And => l & r,
                BinOp::Or => l | r,
                _ => unreachable!(),
            };
            Ok(Value::Number(result as f64))
        }
        BinOp::Sub => {
            let l = eval(lhs, span, ctx)?.as_number(span)?;
            let r = eval(rhs, span, ctx)?.as_number(span)?;
            checked_number(l - r, span)
        }
        BinOp::Mul => {
            let l = eval(lhs, span, ctx)?.as_number(span)?;
            let r = eval(rhs, span, ctx)?.as_number(span)?;
            checked_number(l * r, span)
        }
        BinOp::Div => {
            let l = eval(lhs, span, ctx)?.as_number(span)?;
            let r = eval(rhs, span, ctx)?.as_number(span)?;
            if r == 0.0 {
                return Err(RuntimeError::at(ErrorKind::DivisionByZero, "division by zero", span));
            }
            Ok(Value::Number(l / r))
        }
        BinOp::Mod => {
            let l = eval(lhs, span, ctx)?.as_number(span)?;
            let r = eval(rhs, span, ctx)?.as_number(span)?;
            if r == 0.0 {
                return Err(RuntimeError::at(ErrorKind::DivisionByZero, "MOD by zero", span));
            }
            Ok(Value::Number(l % r))
        }
        BinOp::Pow => {
            let l = eval(lhs, span, ctx)?.as_number(span)?;
            let r = eval(rhs, span, ctx)?.as_number(span)?;
            checked_number(l.powf(r), span)
        }
        BinOp::Add => unreachable!("handled above"),
    }
}

/// Historical relational convention: `-1` for true, `0` for false.
fn basic_bool(truth: bool) -> Value {
    Value::Number(if truth { -1.0 } else { 0.0 })
}

/// Rejects a result that has grown past `f64`'s finite range, the numeric
/// analogue of classic BASIC's `OVERFLOW` error.
fn checked_number(n: f64, span: Span) -> Result<Value, RuntimeError> {
    if n.is_infinite() {
        return Err(RuntimeError::at(ErrorKind::Overflow, "result is too large to represent", span));
    }
    Ok(Value::Number(n))
}

fn eval_array_access(
    name: &str,
    indices: &[Expr],
    span: Span,
    ctx: &EvalContext,
) -> Result<Value, RuntimeError> {
    let idx = eval_indices(indices, span, ctx)?;
    ctx.variables.get_element(name, &idx, span)
}

pub fn eval_indices(
    indices: &[Expr],
    span: Span,
    ctx: &EvalContext,
) -> Result<Vec<usize>, RuntimeError> {
    indices
        .iter()
        .map(|e| {
            let n = eval(e, span, ctx)?.as_number(span)?;
            if n < 0.0 {
                return Err(RuntimeError::at(
                    ErrorKind::SubscriptOutOfRange,
                    "negative array subscript",
                    span,
                ));
            }
            Ok(n.floor() as usize)
        })
        .collect()
}

fn eval_fn_call(name: &str, arg: &Expr, span: Span, ctx: &EvalContext) -> Result<Value, RuntimeError> {
    let def = ctx.functions.get(name).ok_or_else(|| {
        RuntimeError::at(ErrorKind::UndefinedFunction, format!("undefined function FN {}", name), span)
    })?;
    let arg_value = eval(arg, span, ctx)?;

    // Single-parameter shadow scope: the param name is bound to the
    // argument value, every other variable is inherited from the caller.
    let scoped = ctx.variables.snapshot_with_override(&def.param, arg_value);
    let inner_ctx = EvalContext {
        variables: &scoped,
        functions: ctx.functions,
        graphics: ctx.graphics,
    };
    eval(&def.body, span, &inner_ctx)
}

fn eval_call(name: &str, args: &[Expr], span: Span, ctx: &EvalContext) -> Result<Value, RuntimeError> {
    let upper = name.to_ascii_uppercase();
    let values: Result<Vec<Value>, RuntimeError> =
        args.iter().map(|a| eval(a, span, ctx)).collect();
    let values = values?;

    macro_rules! num_arg {
        ($i:expr) => {
            values
                .get($i)
                .ok_or_else(|| wrong_arity(&upper, span))?
                .as_number(span)?
        };
    }
    macro_rules! str_arg {
        ($i:expr) => {
            values
                .get($i)
                .ok_or_else(|| wrong_arity(&upper, span))?
                .as_str(span)?
        };
    }

    match upper.as_str() {
        "ABS" => Ok(Value::Number(num_arg!(0).abs())),
        "INT" => Ok(Value::Number(num_arg!(0).floor())),
        "RND" => Ok(Value::Number(rand::random::<f64>())),
        "SIN" => Ok(Value::Number(num_arg!(0).sin())),
        "COS" => Ok(Value::Number(num_arg!(0).cos())),
        "TAN" => Ok(Value::Number(num_arg!(0).tan())),
        "ATN" => Ok(Value::Number(num_arg!(0).atan())),
        "LOG" => {
            let n = num_arg!(0);
            if n <= 0.0 {
                return Err(RuntimeError::at(
                    ErrorKind::IllegalQuantity,
                    "LOG of non-positive argument",
                    span,
                ));
            }
            Ok(Value::Number(n.ln()))
        }
        "EXP" => checked_number(num_arg!(0).exp(), span),
        "SQR" => {
            let n = num_arg!(0);
            if n < 0.0 {
                return Err(RuntimeError::at(
                    ErrorKind::IllegalQuantity,
                    "SQR of negative argument",
                    span,
                ));
            }
            Ok(Value::Number(n.sqrt()))
        }
        "STR$" => Ok(Value::Str(crate::value::format_number(num_arg!(0)))),
        "CHR$" => {
            let code = num_arg!(0) as u32;
            let ch = char::from_u32(code).ok_or_else(|| {
                RuntimeError::at(ErrorKind::IllegalFunctionCall, "invalid character code", span)
            })?;
            Ok(Value::Str(ch.to_string()))
        }
        "LEN" => Ok(Value::Number(str_arg!(0).len() as f64)),
        "VAL" => Ok(Value::Number(str_arg!(0).trim().parse().unwrap_or(0.0))),
        "ASC" => {
            let s = str_arg!(0);
            let code = s.bytes().next().ok_or_else(|| {
                RuntimeError::at(ErrorKind::IllegalFunctionCall, "ASC of empty string", span)
            })?;
            Ok(Value::Number(code as f64))
        }
        "LEFT$" => {
            let s = str_arg!(0);
            let n = (num_arg!(1).max(0.0)) as usize;
            Ok(Value::Str(s.chars().take(n).collect()))
        }
        "RIGHT$" => {
            let s = str_arg!(0);
            let n = (num_arg!(1).max(0.0)) as usize;
            let total = s.chars().count();
            let skip = total.saturating_sub(n);
            Ok(Value::Str(s.chars().skip(skip).collect()))
        }
        "MID$" => {
            let s = str_arg!(0);
            let start = (num_arg!(1).max(1.0)) as usize - 1;
            let chars: Vec<char> = s.chars().collect();
            let take = values
                .get(2)
                .map(|v| v.as_number(span))
                .transpose()?
                .map(|n| n.max(0.0) as usize)
                .unwrap_or(chars.len());
            if start >= chars.len() {
                return Ok(Value::Str(String::new()));
            }
            Ok(Value::Str(chars[start..].iter().take(take).collect()))
        }
        "POINT" => {
            let x = num_arg!(0) as i32;
            let y = num_arg!(1) as i32;
            let color = ctx
                .graphics
                .map(|g| g.point(x, y))
                .ok_or_else(|| RuntimeError::at(ErrorKind::IllegalFunctionCall, "no graphics peripheral attached", span))?;
            Ok(Value::Number(color as f64))
        }
        _ => Err(RuntimeError::at(
            ErrorKind::UndefinedFunction,
            format!("undefined function {}", name),
            span,
        )),
    }
}

fn wrong_arity(name: &str, span: Span) -> RuntimeError {
    RuntimeError::at(
        ErrorKind::IllegalFunctionCall,
        format!("wrong number of arguments to {}", name),
        span,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpreter::functions::FunctionTable;

    fn ctx(variables: &VariableStore, functions: &FunctionTable) -> EvalContext {
        EvalContext { variables, functions, graphics: None }
    }

    fn span() -> Span {
        Span::new(1, 1)
    }

    #[test]
    fn addition_on_two_strings_concatenates() {
        let variables = VariableStore::new();
        let functions = FunctionTable::new();
        let expr = Expr::Binary {
            op: BinOp::Add,
            lhs: Box::new(Expr::Str("AB".into())),
            rhs: Box::new(Expr::Str("CD".into())),
        };
        let result = eval(&expr, span(), &ctx(&variables, &functions)).unwrap();
        assert_eq!(result, Value::Str("ABCD".into()));
    }

    #[test]
    fn relational_operators_use_historical_minus_one_for_true() {
        let variables = VariableStore::new();
        let functions = FunctionTable::new();
        let expr = Expr::Binary {
            op: BinOp::Lt,
            lhs: Box::new(Expr::Number(1.0)),
            rhs: Box::new(Expr::Number(2.0)),
        };
        let result = eval(&expr, span(), &ctx(&variables, &functions)).unwrap();
        assert_eq!(result, Value::Number(-1.0));
    }

    #[test]
    fn division_by_zero_is_an_error() {
        let variables = VariableStore::new();
        let functions = FunctionTable::new();
        let expr = Expr::Binary {
            op: BinOp::Div,
            lhs: Box::new(Expr::Number(1.0)),
            rhs: Box::new(Expr::Number(0.0)),
        };
        let err = eval(&expr, span(), &ctx(&variables, &functions)).unwrap_err();
        assert_eq!(err.kind, ErrorKind::DivisionByZero);
    }

    #[test]
    fn builtin_name_detection_is_case_sensitive_to_the_callers_uppercasing() {
        assert!(is_builtin_function("ABS"));
        assert!(is_builtin_function("LEFT$"));
        assert!(!is_builtin_function("SCORES"));
    }

    #[test]
    fn mid_dollar_defaults_its_length_to_the_rest_of_the_string() {
        let variables = VariableStore::new();
        let functions = FunctionTable::new();
        let expr = Expr::Call {
            name: "MID$".into(),
            args: vec![Expr::Str("HELLO WORLD".into()), Expr::Number(7.0)],
        };
        let result = eval(&expr, span(), &ctx(&variables, &functions)).unwrap();
        assert_eq!(result, Value::Str("WORLD".into()));
    }

    #[test]
    fn point_without_a_graphics_peripheral_is_an_illegal_function_call() {
        let variables = VariableStore::new();
        let functions = FunctionTable::new();
        let expr = Expr::Call { name: "POINT".into(), args: vec![Expr::Number(0.0), Expr::Number(0.0)] };
        let err = eval(&expr, span(), &ctx(&variables, &functions)).unwrap_err();
        assert_eq!(err.kind, ErrorKind::IllegalFunctionCall);
    }

    #[test]
    fn sqr_of_a_negative_number_is_an_illegal_quantity() {
        let variables = VariableStore::new();
        let functions = FunctionTable::new();
        let expr = Expr::Call { name: "SQR".into(), args: vec![Expr::Number(-4.0)] };
        let err = eval(&expr, span(), &ctx(&variables, &functions)).unwrap_err();
        assert_eq!(err.kind, ErrorKind::IllegalQuantity);
    }

    #[test]
    fn log_of_zero_is_an_illegal_quantity() {
        let variables = VariableStore::new();
        let functions = FunctionTable::new();
        let expr = Expr::Call { name: "LOG".into(), args: vec![Expr::Number(0.0)] };
        let err = eval(&expr, span(), &ctx(&variables, &functions)).unwrap_err();
        assert_eq!(err.kind, ErrorKind::IllegalQuantity);
    }

    #[test]
    fn a_result_that_exceeds_f64_range_overflows() {
        let variables = VariableStore::new();
        let functions = FunctionTable::new();
        let expr = Expr::Binary {
            op: BinOp::Mul,
            lhs: Box::new(Expr::Number(f64::MAX)),
            rhs: Box::new(Expr::Number(f64::MAX)),
        };
        let err = eval(&expr, span(), &ctx(&variables, &functions)).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Overflow);
    }
}
