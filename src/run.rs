use std::io;

use log::debug;
use thiserror::Error;

use crate::eval::{eval_recipe, EvalError};
use crate::ops::date::{system_clock, Clock};
use crate::transform::{LineContext, Transformation, ValidateError};

/// Rows are flushed to the sink in batches of this many.
const FLUSH_EVERY: u64 = 100;

/// Yields input rows as ordered field lists. End of input is `Ok(None)`.
pub trait RowSource {
    fn read_row(&mut self) -> Result<Option<Vec<String>>, RowIoError>;
}

/// Accepts output rows. `flush` is called every [`FLUSH_EVERY`] rows and
/// once when the run completes.
pub trait RowSink {
    fn write_row(&mut self, row: &[String]) -> Result<(), RowIoError>;
    fn flush(&mut self) -> Result<(), RowIoError>;
}

#[derive(Debug, Error)]
pub enum RowIoError {
    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Io(#[from] io::Error),
}

/// CSV-backed [`RowSource`]. The first row is data like any other; header
/// handling belongs to the driver, not the codec.
pub struct CsvRowSource<R: io::Read> {
    reader: csv::Reader<R>,
    record: csv::StringRecord,
}

impl<R: io::Read> CsvRowSource<R> {
    pub fn new(input: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(input);
        Self {
            reader,
            record: csv::StringRecord::new(),
        }
    }
}

impl<R: io::Read> RowSource for CsvRowSource<R> {
    fn read_row(&mut self) -> Result<Option<Vec<String>>, RowIoError> {
        if self.reader.read_record(&mut self.record)? {
            Ok(Some(self.record.iter().map(str::to_string).collect()))
        } else {
            Ok(None)
        }
    }
}

/// CSV-backed [`RowSink`].
pub struct CsvRowSink<W: io::Write> {
    writer: csv::Writer<W>,
}

impl<W: io::Write> CsvRowSink<W> {
    pub fn new(output: W) -> Self {
        Self {
            writer: csv::WriterBuilder::new().flexible(true).from_writer(output),
        }
    }

    /// Flush and hand back the underlying writer.
    pub fn into_inner(self) -> Result<W, RowIoError> {
        self.writer
            .into_inner()
            .map_err(|e| RowIoError::Io(e.into_error()))
    }
}

impl<W: io::Write> RowSink for CsvRowSink<W> {
    fn write_row(&mut self, row: &[String]) -> Result<(), RowIoError> {
        self.writer.write_record(row)?;
        Ok(())
    }

    fn flush(&mut self) -> Result<(), RowIoError> {
        self.writer.flush()?;
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Validate(#[from] ValidateError),

    #[error(transparent)]
    Eval(#[from] Box<EvalError>),

    #[error(transparent)]
    Io(#[from] RowIoError),
}

impl From<EvalError> for RunError {
    fn from(e: EvalError) -> Self {
        RunError::Eval(Box::new(e))
    }
}

/// Knobs for one run.
#[derive(Debug, Clone, Copy)]
pub struct ExecuteOptions {
    /// Treat the first input row as a header row: seed it from the input and
    /// apply header recipes instead of column recipes.
    pub process_header: bool,
    /// Stop after this many input rows; zero or negative reads everything.
    pub line_limit: i64,
    pub clock: Clock,
}

impl Default for ExecuteOptions {
    fn default() -> Self {
        Self {
            process_header: true,
            line_limit: -1,
            clock: system_clock,
        }
    }
}

/// Row counts of a completed run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub header_lines: u64,
    pub data_lines: u64,
}

impl Transformation {
    /// Run the program over every input row, writing one output row per
    /// input row. The program is validated first; the first structural
    /// problem or failing row aborts the run.
    pub fn execute(
        &self,
        source: &mut dyn RowSource,
        sink: &mut dyn RowSink,
        options: &ExecuteOptions,
    ) -> Result<RunSummary, RunError> {
        self.validate()?;

        let num_columns = self.columns.len() as u32;
        let mut lines_read: u64 = 0;

        while options.line_limit <= 0 || lines_read < options.line_limit as u64 {
            let Some(row) = source.read_row()? else {
                break;
            };
            lines_read += 1;

            let mut ctx = LineContext::new(row, lines_read);

            // Variables first, in declaration order, header row included.
            for name in &self.variable_order {
                if let Some(recipe) = self.variables.get(name.as_ref()) {
                    let value = eval_recipe(recipe, &ctx, options.clock)?;
                    ctx.variables.insert(name.to_string(), value);
                }
            }

            if options.process_header && lines_read == 1 {
                // Seed the header row from the input, inventing names for
                // output columns the input does not cover, then let header
                // recipes overwrite their slots.
                let mut output: Vec<String> = (1..=num_columns)
                    .map(|index| {
                        ctx.column(index)
                            .map(str::to_string)
                            .unwrap_or_else(|| format!("column {index}"))
                    })
                    .collect();
                for (index, recipe) in &self.headers {
                    output[*index as usize - 1] = eval_recipe(recipe, &ctx, options.clock)?;
                }
                sink.write_row(&output)?;
            } else {
                let mut output = vec![String::new(); num_columns as usize];
                for (index, recipe) in &self.columns {
                    output[*index as usize - 1] = eval_recipe(recipe, &ctx, options.clock)?;
                }
                sink.write_row(&output)?;
            }

            if lines_read % FLUSH_EVERY == 0 {
                sink.flush()?;
            }
        }
        sink.flush()?;

        let header_lines = if options.process_header { 1 } else { 0 };
        let summary = RunSummary {
            header_lines,
            data_lines: lines_read.saturating_sub(header_lines),
        };
        debug!(
            "run complete: {} header rows, {} data rows",
            summary.header_lines, summary.data_lines
        );
        Ok(summary)
    }
}
