//! CLI tool to run a recipe file against delimited input data.

use std::fs::File;
use std::io;
use std::path::PathBuf;
use std::process;

use clap::Parser;

use recipe::parse::parse;
use recipe::run::{CsvRowSink, CsvRowSource, ExecuteOptions, RunSummary};
use recipe::transform::Transformation;

/// Transform delimited records with a recipe file.
#[derive(Parser)]
#[command(name = "recipe-run")]
struct Cli {
    /// Recipe file describing the transformation
    recipe: PathBuf,

    /// Input data file (delimited records)
    input: PathBuf,

    /// Write output to file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Stop after this many input rows; 0 or less reads everything
    #[arg(short, long, default_value_t = -1)]
    limit: i64,

    /// Treat the first row as data instead of a header row
    #[arg(long)]
    no_header: bool,

    /// Print the parsed recipe and exit
    #[arg(long)]
    dump: bool,

    /// Show debug logging and the run summary on stderr
    #[arg(short, long)]
    verbose: bool,
}

fn main() {
    let cli = Cli::parse();

    if cli.verbose {
        flexi_logger::Logger::try_with_env_or_str("debug")
            .and_then(|logger| logger.start())
            .ok();
    }

    let recipe_text = match std::fs::read_to_string(&cli.recipe) {
        Ok(content) => content,
        Err(e) => {
            eprintln!("Error reading recipe file '{}': {e}", cli.recipe.display());
            process::exit(1);
        }
    };

    let transformation = match parse(&recipe_text) {
        Ok(transformation) => transformation,
        Err(e) => {
            eprintln!("{e}");
            process::exit(1);
        }
    };

    if cli.dump {
        print!("{transformation}");
        return;
    }

    let input = match File::open(&cli.input) {
        Ok(file) => file,
        Err(e) => {
            eprintln!("Error reading input file '{}': {e}", cli.input.display());
            process::exit(1);
        }
    };
    let mut source = CsvRowSource::new(io::BufReader::new(input));

    let options = ExecuteOptions {
        process_header: !cli.no_header,
        line_limit: cli.limit,
        ..Default::default()
    };

    let result = match &cli.output {
        Some(out_path) => {
            let file = match File::create(out_path) {
                Ok(file) => file,
                Err(e) => {
                    eprintln!("Error creating output file '{}': {e}", out_path.display());
                    process::exit(1);
                }
            };
            let mut sink = CsvRowSink::new(io::BufWriter::new(file));
            transformation.execute(&mut source, &mut sink, &options)
        }
        None => {
            let stdout = io::stdout();
            let mut sink = CsvRowSink::new(stdout.lock());
            transformation.execute(&mut source, &mut sink, &options)
        }
    };

    match result {
        Ok(summary) => report(&cli, &transformation, &summary),
        Err(e) => {
            eprintln!("{e}");
            process::exit(1);
        }
    }
}

fn report(cli: &Cli, transformation: &Transformation, summary: &RunSummary) {
    if cli.verbose {
        eprintln!(
            "Rows: {} header, {} data ({} output columns)",
            summary.header_lines,
            summary.data_lines,
            transformation.columns.len(),
        );
    }
}
