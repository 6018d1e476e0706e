//! Top-level application orchestration.
//!
//! `src/main.rs` stays tiny; this module is the real main that:
//! - loads `.env` and parses CLI arguments
//! - installs the tracing subscriber
//! - runs the selection pipeline
//! - prints reports and writes optional exports

use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::cli::{Cli, Command, SelectArgs};
use crate::domain::{DataSource, RunConfig, SelectorConfig, SelectorKind, SyntheticConfig};
use crate::error::AppError;
use crate::io::export::{write_results_csv, write_results_json, SelectionReport};
use crate::report;

pub mod pipeline;

/// Entry point for the `hmmsel` binary.
pub fn run() -> Result<(), AppError> {
    dotenvy::dotenv().ok();

    // `hmmsel --min-n 2 ...` behaves like `hmmsel select --min-n 2 ...`.
    let argv = rewrite_args(std::env::args().collect());
    let cli = Cli::parse_from(argv);

    match cli.command {
        Command::Select(args) => {
            init_tracing(args.verbose);
            handle_select(&args, OutputMode::Single)
        }
        Command::Compare(args) => {
            init_tracing(args.verbose);
            handle_select(&args, OutputMode::Compare)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputMode {
    Single,
    Compare,
}

/// Log to stderr. `RUST_LOG` wins over the `--verbose` default.
fn init_tracing(verbose: bool) {
    let default = if verbose { "info" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .with(filter)
        .try_init();
}

fn handle_select(args: &SelectArgs, mode: OutputMode) -> Result<(), AppError> {
    let config = run_config_from_args(args)?;
    let selectors: Vec<SelectorKind> = match mode {
        OutputMode::Single => vec![config.selector],
        OutputMode::Compare => SelectorKind::ALL.to_vec(),
    };

    let run = pipeline::run_selection(&config, &selectors)?;

    println!(
        "{}",
        report::format_run_header(
            &run.data.source_label,
            &selectors,
            &config.selector_config,
            run.targets.len()
        )
    );
    let row_errors = report::format_row_errors(&run.data.row_errors);
    if !row_errors.is_empty() {
        println!("{row_errors}");
    }

    match mode {
        OutputMode::Single => {
            println!(
                "{}",
                report::format_selection_table(&run.results, run.data.true_states.as_ref())
            );
            let occupancy = report::format_state_occupancy(&run.results);
            if !occupancy.is_empty() {
                println!("{occupancy}");
            }
        }
        OutputMode::Compare => println!("{}", report::format_compare_table(&run.results)),
    }
    let diagnostics = report::format_diagnostics(&run.results);
    if !diagnostics.is_empty() {
        println!("{diagnostics}");
    }

    if let Some(path) = &config.export_json {
        let export = SelectionReport::new(selectors.clone(), config.selector_config, run.results.clone());
        write_results_json(path, &export)?;
    }
    if let Some(path) = &config.export_csv {
        write_results_csv(path, &run.results)?;
    }

    match run.failures() {
        0 => Ok(()),
        n => Err(AppError::new(
            4,
            format!("Selection failed for {n} word/strategy pair(s); see diagnostics above."),
        )),
    }
}

/// Convert parsed flags into a validated `RunConfig`.
pub fn run_config_from_args(args: &SelectArgs) -> Result<RunConfig, AppError> {
    let selector_config = SelectorConfig {
        n_constant: args.n_constant,
        min_n: args.min_n,
        max_n: args.max_n,
        seed: args.seed,
        verbose: args.verbose,
    };
    selector_config.validate()?;

    let source = match &args.data {
        Some(path) => DataSource::Csv {
            path: path.clone(),
            features: (!args.features.is_empty()).then(|| args.features.clone()),
        },
        None => {
            if !args.features.is_empty() {
                return Err(AppError::new(2, "`--features` requires `--data`."));
            }
            DataSource::Synthetic(SyntheticConfig {
                n_words: args.words,
                instances_per_word: args.instances,
                n_features: args.dims,
                seed: args.data_seed,
                ..SyntheticConfig::default()
            })
        }
    };

    Ok(RunConfig {
        source,
        selector: args.selector,
        selector_config,
        only_words: args
            .only
            .iter()
            .map(|w| w.trim().to_string())
            .filter(|w| !w.is_empty())
            .collect(),
        export_json: args.export_json.clone(),
        export_csv: args.export_csv.clone(),
    })
}

/// Rewrite argv so `hmmsel` defaults to `hmmsel select`.
///
/// Rules:
/// - `hmmsel`                          -> `hmmsel select`
/// - `hmmsel --min-n 2 ...`            -> `hmmsel select --min-n 2 ...`
/// - `hmmsel --help/--version/-h/-V`   -> unchanged (top-level help/version)
fn rewrite_args(mut argv: Vec<String>) -> Vec<String> {
    let Some(arg1) = argv.get(1).cloned() else {
        argv.push("select".to_string());
        return argv;
    };

    let is_top_level_help_or_version = matches!(arg1.as_str(), "-h" | "--help" | "-V" | "--version" | "help");
    if is_top_level_help_or_version {
        return argv;
    }

    let is_subcommand = matches!(arg1.as_str(), "select" | "compare");
    if is_subcommand {
        return argv;
    }

    if arg1.starts_with('-') {
        argv.insert(1, "select".to_string());
    }
    argv
}
