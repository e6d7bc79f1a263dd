//! Recipe is a small DSL for reshaping delimited-record data. A recipe file
//! declares, one line per output column, how that column's value is computed
//! from the current input row; running the recipe turns each input row into
//! exactly one output row. There is deliberately no way to loop, aggregate,
//! or look at any row other than the current one, which keeps recipes
//! predictable and linear: every output row is a pure function of one input
//! row, the recipe's variables for that row, and the current line number.
//!
//! # Recipe language
//!
//! Each non-blank line is one assignment, `target <- pipeline`, with `#`
//! starting a comment that runs to the end of the line:
//!
//! ```text
//! # swap the first two columns and give them fresh names
//! !1 <- "last"
//! !2 <- "first"
//! 1  <- 2
//! 2  <- 1 -> uppercase
//! ```
//!
//! Targets come in three kinds. A bare number selects an output column, a
//! number after `!` selects that column's header, and a `$name` declares a
//! variable. Variables are computed first on every row, in the order they
//! were declared, and can be referenced by any later pipeline on that row.
//!
//! A pipeline is a chain of stages separated by `->`. The value produced by
//! one stage becomes the *placeholder* of the next: any operation that is
//! called with fewer arguments than it needs has the missing ones filled
//! with the placeholder, so `1 -> uppercase` reads column 1 and upper-cases
//! it. The placeholder can also be named explicitly with `?`. Within a
//! stage, `+` concatenates: `"id-" + 1` glues a literal and a column
//! together.
//!
//! Operation names are case-insensitive. The library covers strings
//! (`uppercase`, `trim`, `replace`, `firstChars`, …), numbers (`add`,
//! `divide`, `numberFormat`, …) and dates (`today`, `readDate`,
//! `smartDate`, `isPast`, …); dates are described with reference layouts
//! such as `2006-01-02`. The full catalog lives in [`eval::Func`].
//!
//! # Running
//!
//! [`parse::parse`] turns recipe text into a [`transform::Transformation`],
//! and [`transform::Transformation::execute`] drives it over a
//! [`run::RowSource`] into a [`run::RowSink`]. CSV adapters for both sides
//! are in [`run`]; the `recipe-run` binary wires them to files.
//!
//! Errors are strings aimed at the recipe author, not the embedding
//! program: parse errors carry the recipe line (`error - line 3: …`), and
//! evaluation errors carry the input line and the target being computed
//! (`line 7 / column 2: divide(): …`). The first error aborts the run.
//!
//! The current time used by `today`, `now`, `isPast`, and `isFuture` comes
//! from a replaceable [`ops::date::Clock`] function, so tests can pin it.

/// Per-value operation library: string, number, and date functions.
pub mod ops;

/// Lexer for recipe lines.
pub mod lex;

/// Parser building a [`transform::Transformation`] from recipe text.
pub mod parse;

/// The recipe data model: targets, operations, pipelines, and the
/// per-row evaluation context.
pub mod transform;

/// Pipeline evaluator with placeholder threading.
pub mod eval;

/// Row driver and the CSV source/sink adapters.
pub mod run;

#[cfg(test)]
pub fn init_log() {
    use log::*;

    flexi_logger::Logger::try_with_str("trace")
        .expect("valid log spec")
        .format(format)
        .start()
        .ok();

    fn format(
        write: &mut dyn std::io::Write,
        _: &mut flexi_logger::DeferredNow,
        record: &Record,
    ) -> std::io::Result<()> {
        write.write_all(
            format!(
                "[{} {}:{}] {} - {}",
                record.level(),
                record.file().unwrap_or_default(),
                record.line().unwrap_or_default(),
                record.module_path().unwrap_or_default(),
                record.args()
            )
            .as_bytes(),
        )
    }
}
