//! Pure per-value operations. Each function takes already-resolved string
//! arguments and either produces the output value or a domain error; the
//! evaluator owns argument resolution, arity padding, and error prefixing.

use std::fmt;

use thiserror::Error;

pub mod date;
pub mod layout;

/// Which positional argument an operation is complaining about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgPos {
    First,
    Second,
}

impl fmt::Display for ArgPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgPos::First => write!(f, "first"),
            ArgPos::Second => write!(f, "second"),
        }
    }
}

/// Domain failures of individual operations. The display strings are part of
/// the language contract and are matched verbatim by callers' tests.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum OpError {
    #[error("{pos} arg to {name} was not numeric: {value}")]
    NotNumeric {
        pos: ArgPos,
        name: &'static str,
        value: String,
    },

    #[error("error: {pos} arg to {name} was not numeric, got '{value}'")]
    NotNumericQuoted {
        pos: ArgPos,
        name: &'static str,
        value: String,
    },

    #[error("error: attempt to divide by zero")]
    DivideByZero,

    #[error("{pos} arg to mod was not an integer: '{value}'")]
    ModNotInteger { pos: ArgPos, value: String },

    #[error("attempt to divide by zero")]
    ModuloByZero,

    #[error("error: input is not numeric: got '{value}'")]
    NotNumericInput { value: String },

    #[error("error: digits must be an integer, got '{value}'")]
    BadDigits { value: String },

    #[error("first arg is not an integer: got '{value}'")]
    CountNotInteger { value: String },

    #[error("first arg is negative: got '{value}'")]
    NegativeCount { value: String },

    #[error("expected RFC3339 format for input date: '{value}'")]
    NotRfc3339 { value: String },

    #[error("unrecognized date '{value}' for format: '{layout}'")]
    UnrecognizedDate { value: String, layout: String },
}

pub fn uppercase(input: &str) -> String {
    input.to_uppercase()
}

pub fn lowercase(input: &str) -> String {
    input.to_lowercase()
}

fn parse_numeric(
    raw: &str,
    pos: ArgPos,
    name: &'static str,
    quoted: bool,
) -> Result<f64, OpError> {
    raw.parse().map_err(|_| {
        let value = raw.to_string();
        if quoted {
            OpError::NotNumericQuoted { pos, name, value }
        } else {
            OpError::NotNumeric { pos, name, value }
        }
    })
}

/// Sum of two numbers, six fractional digits.
pub fn add(a: &str, b: &str) -> Result<String, OpError> {
    let x = parse_numeric(a, ArgPos::First, "Add", false)?;
    let y = parse_numeric(b, ArgPos::Second, "Add", false)?;
    Ok(format!("{:.6}", x + y))
}

pub fn subtract(a: &str, b: &str) -> Result<String, OpError> {
    let x = parse_numeric(a, ArgPos::First, "Subtract", false)?;
    let y = parse_numeric(b, ArgPos::Second, "Subtract", false)?;
    Ok(format!("{:.6}", x - y))
}

pub fn multiply(a: &str, b: &str) -> Result<String, OpError> {
    let x = parse_numeric(a, ArgPos::First, "multiply", true)?;
    let y = parse_numeric(b, ArgPos::Second, "multiply", true)?;
    Ok(format!("{:.6}", x * y))
}

pub fn divide(a: &str, b: &str) -> Result<String, OpError> {
    let x = parse_numeric(a, ArgPos::First, "divide", true)?;
    let y = parse_numeric(b, ArgPos::Second, "divide", true)?;
    if y == 0.0 {
        return Err(OpError::DivideByZero);
    }
    Ok(format!("{:.6}", x / y))
}

/// Integer remainder, truncated toward zero.
pub fn modulus(a: &str, b: &str) -> Result<String, OpError> {
    let x: i64 = a.parse().map_err(|_| OpError::ModNotInteger {
        pos: ArgPos::First,
        value: a.to_string(),
    })?;
    let y: i64 = b.parse().map_err(|_| OpError::ModNotInteger {
        pos: ArgPos::Second,
        value: b.to_string(),
    })?;
    if y == 0 {
        return Err(OpError::ModuloByZero);
    }
    Ok((x % y).to_string())
}

/// Format a number with exactly `digits` fractional places.
pub fn number_format(digits: &str, value: &str) -> Result<String, OpError> {
    let x: f64 = value.parse().map_err(|_| OpError::NotNumericInput {
        value: value.to_string(),
    })?;
    let digits: i64 = digits.parse().map_err(|_| OpError::BadDigits {
        value: digits.to_string(),
    })?;
    Ok(format!("{:.*}", digits.max(0) as usize, x))
}

/// Swap `input` for `to` when it equals `from`, case-sensitively.
pub fn change(from: &str, to: &str, input: &str) -> String {
    if input == from {
        to.to_string()
    } else {
        input.to_string()
    }
}

/// As [`change`], comparing case-insensitively.
pub fn change_ci(from: &str, to: &str, input: &str) -> String {
    if input.to_lowercase() == from.to_lowercase() {
        to.to_string()
    } else {
        input.to_string()
    }
}

pub fn if_empty(if_empty: &str, if_not: &str, check: &str) -> String {
    if check.is_empty() {
        if_empty.to_string()
    } else {
        if_not.to_string()
    }
}

pub fn remove_digits(input: &str) -> String {
    input.chars().filter(|c| !c.is_numeric()).collect()
}

pub fn only_digits(input: &str) -> String {
    input.chars().filter(|c| c.is_numeric()).collect()
}

pub fn trim(input: &str) -> String {
    input.trim().to_string()
}

fn parse_count(raw: &str) -> Result<usize, OpError> {
    let count: i64 = raw.parse().map_err(|_| OpError::CountNotInteger {
        value: raw.to_string(),
    })?;
    if count < 0 {
        return Err(OpError::NegativeCount {
            value: raw.to_string(),
        });
    }
    Ok(count as usize)
}

/// First `count` characters of `input`, or all of it when shorter. Counts
/// code points, not bytes.
pub fn first_chars(count: &str, input: &str) -> Result<String, OpError> {
    let count = parse_count(count)?;
    Ok(input.chars().take(count).collect())
}

/// Last `count` characters of `input`, or all of it when shorter.
pub fn last_chars(count: &str, input: &str) -> Result<String, OpError> {
    let count = parse_count(count)?;
    let total = input.chars().count();
    if count >= total {
        return Ok(input.to_string());
    }
    Ok(input.chars().skip(total - count).collect())
}

/// `count` concatenated copies of `input`.
pub fn repeat(count: &str, input: &str) -> Result<String, OpError> {
    Ok(input.repeat(parse_count(count)?))
}

/// Replace every occurrence of `search` in `input` with `replacement`.
pub fn replace(search: &str, replacement: &str, input: &str) -> String {
    input.replace(search, replacement)
}
