use smallvec::SmallVec;
use thiserror::Error;

use crate::ops::{self, date, date::Clock, OpError};
use crate::transform::{Argument, LineContext, Operation, Recipe, Target};

/// How the next computed value combines with the running placeholder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Replace,
    Join,
}

/// Operations known to the evaluator. Recipe text reaches them by name,
/// matched case-insensitively; the arity decides how many placeholder
/// arguments are padded onto a call that names fewer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Func {
    Value,
    Join,
    Uppercase,
    Lowercase,
    Add,
    Subtract,
    Multiply,
    Divide,
    Mod,
    NumberFormat,
    Change,
    ChangeI,
    IfEmpty,
    LineNo,
    RemoveDigits,
    OnlyDigits,
    Trim,
    FirstChars,
    LastChars,
    Repeat,
    Replace,
    Today,
    Now,
    FormatDate,
    FormatDateF,
    ReadDate,
    ReadDateF,
    SmartDate,
    IsPast,
    IsFuture,
}

impl Func {
    /// Look up an operation by its lower-cased recipe name.
    pub fn resolve(name: &str) -> Option<Func> {
        use Func::*;

        Some(match name {
            "value" => Value,
            "join" => Join,
            "uppercase" => Uppercase,
            "lowercase" => Lowercase,
            "add" => Add,
            "subtract" => Subtract,
            "multiply" => Multiply,
            "divide" => Divide,
            "mod" => Mod,
            "numberformat" => NumberFormat,
            "change" => Change,
            "changei" => ChangeI,
            "ifempty" | "isempty" => IfEmpty,
            "lineno" => LineNo,
            "removedigits" => RemoveDigits,
            "onlydigits" => OnlyDigits,
            "trim" => Trim,
            "firstchars" => FirstChars,
            "lastchars" => LastChars,
            "repeat" => Repeat,
            "replace" => Replace,
            "today" => Today,
            "now" => Now,
            "formatdate" => FormatDate,
            "formatdatef" => FormatDateF,
            "readdate" => ReadDate,
            "readdatef" => ReadDateF,
            "smartdate" => SmartDate,
            "ispast" => IsPast,
            "isfuture" => IsFuture,
            _ => return None,
        })
    }

    /// Fixed argument count. Calls with fewer arguments are right-padded
    /// with placeholders; extra arguments are ignored.
    pub fn arity(self) -> usize {
        use Func::*;

        match self {
            LineNo | Today | Now => 0,
            Value | Join | Uppercase | Lowercase | RemoveDigits | OnlyDigits | Trim
            | SmartDate => 1,
            Add | Subtract | Multiply | Divide | Mod | FirstChars | LastChars | Repeat
            | FormatDate | FormatDateF | ReadDate | ReadDateF => 2,
            // numberformat only reads two arguments but declares three.
            NumberFormat | Change | ChangeI | IfEmpty | Replace | IsPast | IsFuture => 3,
        }
    }
}

/// Evaluation failure, prefixed with the site that was being computed.
#[derive(Debug, Error)]
#[error("line {line} / {target}: {kind}")]
pub struct EvalError {
    pub line: u64,
    pub target: Target,
    pub kind: EvalErrorKind,
}

#[derive(Debug, Error)]
pub enum EvalErrorKind {
    /// Failed argument resolution of `value` or `join`, reported bare.
    #[error(transparent)]
    Resolve(ResolveError),

    /// Failed argument resolution inside a named operation.
    #[error("{name}(): error evaluating arg: {source}")]
    Arg { name: String, source: ResolveError },

    /// The operation itself failed.
    #[error("{name}(): {source}")]
    Op { name: String, source: OpError },

    #[error("error: processing variable, unimplemented operation {0}")]
    Unimplemented(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ResolveError {
    #[error("column {0} referenced, but it does not exist in the input")]
    UnknownColumn(u32),

    #[error("variable '{0}' referenced, but it is not defined")]
    UnknownVariable(String),
}

/// Resolve one argument against the row context and the running placeholder.
fn resolve(arg: &Argument, ctx: &LineContext, placeholder: &str) -> Result<String, ResolveError> {
    match arg {
        Argument::Column(n) => ctx
            .column(*n)
            .map(str::to_string)
            .ok_or(ResolveError::UnknownColumn(*n)),
        Argument::Variable(name) => ctx
            .variables
            .get(name.as_ref())
            .cloned()
            .ok_or_else(|| ResolveError::UnknownVariable(name.to_string())),
        Argument::Literal(text) => Ok(text.clone()),
        Argument::Placeholder => Ok(placeholder.to_string()),
    }
}

/// Resolve the operation's arguments, padded with placeholders up to `arity`.
fn resolve_args(
    operation: &Operation,
    arity: usize,
    ctx: &LineContext,
    placeholder: &str,
) -> Result<SmallVec<[String; 3]>, ResolveError> {
    let mut values = SmallVec::new();
    for index in 0..arity {
        let arg = operation.args.get(index).unwrap_or(&Argument::Placeholder);
        values.push(resolve(arg, ctx, placeholder)?);
    }
    Ok(values)
}

/// Run one recipe's pipeline against a row, returning the final placeholder.
pub fn eval_recipe(recipe: &Recipe, ctx: &LineContext, clock: Clock) -> Result<String, EvalError> {
    let mut placeholder = String::new();
    let mut mode = Mode::Replace;

    let fail = |kind| EvalError {
        line: ctx.line_no,
        target: recipe.target.clone(),
        kind,
    };

    for operation in &recipe.pipe {
        let name = operation.name.to_lowercase();
        let Some(func) = Func::resolve(&name) else {
            return Err(fail(EvalErrorKind::Unimplemented(operation.name.clone())));
        };

        let args = resolve_args(operation, func.arity(), ctx, &placeholder).map_err(|e| {
            fail(match func {
                // value and join report resolution failures without a prefix.
                Func::Value | Func::Join => EvalErrorKind::Resolve(e),
                _ => EvalErrorKind::Arg {
                    name: name.clone(),
                    source: e,
                },
            })
        })?;

        let domain = |e: OpError| {
            fail(EvalErrorKind::Op {
                name: name.clone(),
                source: e,
            })
        };

        let value = match func {
            Func::Value => args[0].clone(),
            Func::Join => {
                mode = Mode::Join;
                let value = args[0].clone();
                // A placeholder argument means the joined value comes from
                // the next operation: leave Join armed and move on.
                let deferred = operation
                    .args
                    .first()
                    .map_or(true, |arg| matches!(arg, Argument::Placeholder));
                if deferred {
                    continue;
                }
                value
            }
            Func::Uppercase => ops::uppercase(&args[0]),
            Func::Lowercase => ops::lowercase(&args[0]),
            Func::Add => ops::add(&args[0], &args[1]).map_err(domain)?,
            Func::Subtract => ops::subtract(&args[0], &args[1]).map_err(domain)?,
            Func::Multiply => ops::multiply(&args[0], &args[1]).map_err(domain)?,
            Func::Divide => ops::divide(&args[0], &args[1]).map_err(domain)?,
            Func::Mod => ops::modulus(&args[0], &args[1]).map_err(domain)?,
            Func::NumberFormat => ops::number_format(&args[0], &args[1]).map_err(domain)?,
            Func::Change => ops::change(&args[0], &args[1], &args[2]),
            Func::ChangeI => ops::change_ci(&args[0], &args[1], &args[2]),
            Func::IfEmpty => ops::if_empty(&args[0], &args[1], &args[2]),
            Func::LineNo => ctx.line_no.to_string(),
            Func::RemoveDigits => ops::remove_digits(&args[0]),
            Func::OnlyDigits => ops::only_digits(&args[0]),
            Func::Trim => ops::trim(&args[0]),
            Func::FirstChars => ops::first_chars(&args[0], &args[1]).map_err(domain)?,
            Func::LastChars => ops::last_chars(&args[0], &args[1]).map_err(domain)?,
            Func::Repeat => ops::repeat(&args[0], &args[1]).map_err(domain)?,
            Func::Replace => ops::replace(&args[0], &args[1], &args[2]),
            Func::Today => date::today(clock),
            Func::Now => date::now(clock),
            Func::FormatDate => date::format_date(&args[0], &args[1]),
            Func::FormatDateF => date::format_date_strict(&args[0], &args[1]).map_err(domain)?,
            Func::ReadDate => date::read_date(&args[0], &args[1]),
            Func::ReadDateF => date::read_date_strict(&args[0], &args[1]).map_err(domain)?,
            Func::SmartDate => date::smart_date(&args[0]),
            Func::IsPast => date::is_past(&args[0], &args[1], &args[2], clock),
            Func::IsFuture => date::is_future(&args[0], &args[1], &args[2], clock),
        };

        match mode {
            Mode::Replace => placeholder = value,
            Mode::Join => {
                placeholder.push_str(&value);
                mode = Mode::Replace;
            }
        }
    }

    Ok(placeholder)
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, FixedOffset};
    use smallvec::smallvec;

    use super::*;
    use crate::transform::VarName;

    fn fixed_clock() -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339("2021-08-30T18:22:13-06:00").unwrap()
    }

    fn ctx(row: &[&str]) -> LineContext {
        LineContext::new(row.iter().map(|s| s.to_string()).collect(), 1)
    }

    fn recipe(pipe: Vec<Operation>) -> Recipe {
        Recipe {
            target: Target::Column(1),
            pipe,
            comment: String::new(),
        }
    }

    fn op(name: &str, args: Vec<Argument>) -> Operation {
        Operation::new(name, args)
    }

    #[test]
    fn stages_thread_the_placeholder() {
        let recipe = recipe(vec![
            op("value", vec![Argument::Column(1)]),
            op("uppercase", vec![]),
        ]);
        let out = eval_recipe(&recipe, &ctx(&["apple"]), fixed_clock).unwrap();
        assert_eq!(out, "APPLE");
    }

    #[test]
    fn dispatch_is_case_insensitive() {
        let recipe = recipe(vec![op("UpPeRcAsE", vec![Argument::Column(1)])]);
        let out = eval_recipe(&recipe, &ctx(&["ab"]), fixed_clock).unwrap();
        assert_eq!(out, "AB");
    }

    #[test]
    fn join_concatenates_the_next_value() {
        // `2 + 1` lowering: value(2), join(?), value(1).
        let recipe = recipe(vec![
            op("value", vec![Argument::Column(2)]),
            op("join", vec![Argument::Placeholder]),
            op("value", vec![Argument::Column(1)]),
        ]);
        let out = eval_recipe(&recipe, &ctx(&["alpha", "beta"]), fixed_clock).unwrap();
        assert_eq!(out, "betaalpha");
    }

    #[test]
    fn deferred_join_doubles_the_placeholder() {
        // `1 + ?` lowering: the joined value is the running value itself.
        let recipe = recipe(vec![
            op("value", vec![Argument::Column(1)]),
            op("join", vec![Argument::Placeholder]),
            op("value", vec![Argument::Placeholder]),
        ]);
        let out = eval_recipe(&recipe, &ctx(&["ab"]), fixed_clock).unwrap();
        assert_eq!(out, "abab");
    }

    #[test]
    fn bare_join_arms_concatenation_for_the_next_stage() {
        // `1 -> join -> 1`
        let recipe = recipe(vec![
            op("value", vec![Argument::Column(1)]),
            op("join", vec![]),
            op("value", vec![Argument::Column(1)]),
        ]);
        let out = eval_recipe(&recipe, &ctx(&["a"]), fixed_clock).unwrap();
        assert_eq!(out, "aa");
    }

    #[test]
    fn join_with_explicit_argument_consumes_it() {
        // `1 -> join(1)`
        let recipe = recipe(vec![
            op("value", vec![Argument::Column(1)]),
            op("join", vec![Argument::Column(1)]),
        ]);
        let out = eval_recipe(&recipe, &ctx(&["a"]), fixed_clock).unwrap();
        assert_eq!(out, "aa");
    }

    #[test]
    fn missing_trailing_arguments_pad_with_the_placeholder() {
        let recipe = recipe(vec![
            op("value", vec![Argument::Column(1)]),
            op("firstchars", vec![Argument::Literal("3".into())]),
        ]);
        let out = eval_recipe(&recipe, &ctx(&["banana"]), fixed_clock).unwrap();
        assert_eq!(out, "ban");
    }

    #[test]
    fn extra_arguments_are_ignored() {
        let recipe = recipe(vec![op(
            "add",
            vec![
                Argument::Column(1),
                Argument::Column(2),
                Argument::Literal("0".into()),
            ],
        )]);
        let out = eval_recipe(&recipe, &ctx(&["1", "2"]), fixed_clock).unwrap();
        assert_eq!(out, "3.000000");
    }

    #[test]
    fn unknown_column_reference_fails_bare_for_value() {
        let recipe = recipe(vec![op("value", vec![Argument::Column(3)])]);
        let err = eval_recipe(&recipe, &ctx(&["a", "b"]), fixed_clock).unwrap_err();
        assert_eq!(
            err.to_string(),
            "line 1 / column 1: column 3 referenced, but it does not exist in the input"
        );
    }

    #[test]
    fn unknown_variable_reference_is_prefixed_by_the_operation() {
        let recipe = recipe(vec![op(
            "uppercase",
            vec![Argument::Variable(VarName::new("$foo".into()).unwrap())],
        )]);
        let err = eval_recipe(&recipe, &ctx(&["a"]), fixed_clock).unwrap_err();
        assert_eq!(
            err.to_string(),
            "line 1 / column 1: uppercase(): error evaluating arg: \
             variable '$foo' referenced, but it is not defined"
        );
    }

    #[test]
    fn domain_failures_carry_the_operation_name() {
        let recipe = recipe(vec![op(
            "divide",
            vec![Argument::Column(1), Argument::Literal("0".into())],
        )]);
        let err = eval_recipe(&recipe, &ctx(&["4"]), fixed_clock).unwrap_err();
        assert_eq!(
            err.to_string(),
            "line 1 / column 1: divide(): error: attempt to divide by zero"
        );
    }

    #[test]
    fn unknown_operations_are_reported_with_their_spelling() {
        let recipe = recipe(vec![op("frobnicate", vec![])]);
        let err = eval_recipe(&recipe, &ctx(&["a"]), fixed_clock).unwrap_err();
        assert_eq!(
            err.to_string(),
            "line 1 / column 1: error: processing variable, unimplemented operation frobnicate"
        );
    }

    #[test]
    fn lineno_reports_the_context_line() {
        let recipe = recipe(vec![op("lineno", vec![])]);
        let mut context = ctx(&["a"]);
        context.line_no = 42;
        assert_eq!(eval_recipe(&recipe, &context, fixed_clock).unwrap(), "42");
    }

    #[test]
    fn variables_resolve_from_the_context() {
        let name = VarName::new("$foo".into()).unwrap();
        let recipe = Recipe {
            target: Target::Header(1),
            pipe: vec![op("value", vec![Argument::Variable(name)])],
            comment: String::new(),
        };
        let mut context = ctx(&["a"]);
        context
            .variables
            .insert("$foo".to_string(), "banana".to_string());
        assert_eq!(
            eval_recipe(&recipe, &context, fixed_clock).unwrap(),
            "banana"
        );
    }

    #[test]
    fn one_argument_ifempty_passes_non_empty_input_through() {
        let pipe = vec![
            op("value", vec![Argument::Column(1)]),
            op("ifempty", vec![Argument::Literal("empty".into())]),
        ];
        let recipe = recipe(pipe);
        assert_eq!(eval_recipe(&recipe, &ctx(&[""]), fixed_clock).unwrap(), "empty");
        assert_eq!(eval_recipe(&recipe, &ctx(&["A"]), fixed_clock).unwrap(), "A");
    }

    #[test]
    fn smallvec_arguments_round_trip() {
        let operation = Operation {
            name: "change".into(),
            args: smallvec![
                Argument::Literal("a".into()),
                Argument::Literal("b".into()),
                Argument::Placeholder,
            ],
        };
        assert_eq!(operation.to_string(), "change(\"a\", \"b\", ?)");
    }
}
