//! gridcalc - evaluate spreadsheet formulas from the command line

mod error;
mod script;

use anyhow::Context;
use gridcalc_core::{Sheet, format_value, load_config};
use gridcalc_engine::builtins::builtin_registry;
use log::{Level, LevelFilter, Metadata, Record};
use std::env;
use std::path::PathBuf;
use std::sync::Arc;

fn print_usage() {
    eprintln!("Usage: gridcalc [OPTIONS] [FILE]");
    eprintln!();
    eprintln!("Arguments:");
    eprintln!("  [FILE]                    Script of 'CELL: value' lines to load");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  -c, --command <FORMULA>   Evaluate a formula and print the result");
    eprintln!("  --config <FILE>           Load settings from a TOML file");
    eprintln!("  -v, --verbose             Log recalculation details to stderr");
    eprintln!("  -h, --help                Print help");
}

struct StderrLogger;

impl log::Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= Level::Debug
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            eprintln!("[{}] {}", record.level(), record.args());
        }
    }

    fn flush(&self) {}
}

static LOGGER: StderrLogger = StderrLogger;

struct Options {
    script: Option<PathBuf>,
    command: Option<String>,
    config: Option<PathBuf>,
    verbose: bool,
}

fn parse_args(args: &[String]) -> Options {
    let mut options = Options {
        script: None,
        command: None,
        config: None,
        verbose: false,
    };

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "-h" | "--help" => {
                print_usage();
                std::process::exit(0);
            }
            "-c" | "--command" => {
                i += 1;
                if i >= args.len() {
                    eprintln!("Error: --command requires a formula");
                    std::process::exit(1);
                }
                options.command = Some(args[i].to_string());
            }
            "--config" => {
                i += 1;
                if i >= args.len() {
                    eprintln!("Error: --config requires a file path");
                    std::process::exit(1);
                }
                options.config = Some(PathBuf::from(&args[i]));
            }
            "-v" | "--verbose" => options.verbose = true,
            arg if arg.starts_with('-') => {
                eprintln!("Error: Unknown option: {}", arg);
                print_usage();
                std::process::exit(1);
            }
            _ => {
                if options.script.is_none() {
                    options.script = Some(PathBuf::from(&args[i]));
                } else {
                    eprintln!("Error: Unexpected argument: {}", args[i]);
                    print_usage();
                    std::process::exit(1);
                }
            }
        }
        i += 1;
    }
    options
}

/// Evaluate `formula` against `sheet` in a cell right of the used area.
/// Returns whether the result was an error value.
fn run_command(sheet: &mut Sheet, formula: &str) -> anyhow::Result<bool> {
    let col = sheet
        .used_region()
        .map_or(0, |used| used.right.saturating_add(1));
    sheet
        .set_formula(0, col, formula)
        .with_context(|| format!("cannot evaluate '{}'", formula))?;
    let value = sheet.value(0, col);
    println!("{}", format_value(&value));
    Ok(value.is_error())
}

fn print_cells(sheet: &Sheet) {
    let Some(used) = sheet.used_region() else {
        return;
    };
    for (at, _) in sheet.non_empty_cells(&used) {
        println!("{}\t{}", at, sheet.display_value(at.row, at.col));
    }
}

fn run(options: Options) -> anyhow::Result<i32> {
    let (config, warnings) = load_config(options.config.as_deref());
    for warning in warnings {
        eprintln!("Warning: {}", warning);
    }

    let mut sheet = Sheet::with_config("Sheet1", &config, Arc::new(builtin_registry()));
    if let Some(path) = &options.script {
        script::load_script(path, &mut sheet)
            .with_context(|| format!("failed to load {}", path.display()))?;
    }

    match &options.command {
        Some(formula) => {
            let failed = run_command(&mut sheet, formula)?;
            Ok(if failed { 1 } else { 0 })
        }
        None => {
            print_cells(&sheet);
            Ok(0)
        }
    }
}

fn main() {
    let args: Vec<String> = env::args().collect();
    let options = parse_args(&args);

    if options.script.is_none() && options.command.is_none() {
        print_usage();
        std::process::exit(1);
    }
    if options.verbose && log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(LevelFilter::Debug);
    }

    match run(options) {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_lands_right_of_used_area() {
        let mut sheet = Sheet::new("Sheet1");
        sheet.set_value(0, 0, 2.0).unwrap();
        sheet.set_value(1, 1, 3.0).unwrap();
        assert!(!run_command(&mut sheet, "A1*B2").unwrap());
        assert_eq!(sheet.formula_text(0, 2).as_deref(), Some("=A1*B2"));
    }

    #[test]
    fn test_command_error_value_is_reported() {
        let mut sheet = Sheet::new("Sheet1");
        assert!(run_command(&mut sheet, "1/0").unwrap());
        assert!(run_command(&mut sheet, "SUM(").is_err());
    }
}
