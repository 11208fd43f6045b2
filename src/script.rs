//! Script files: one cell assignment, name definition or number format
//! per line.
//!
//! ```text
//! # comment
//! A1: 10
//! A2: =A1*rate
//! rate := 0.2
//! data := A1:A2
//! format A1:A2 money 2
//! ```

use crate::error::{CliError, Result};
use gridcalc_core::{CellFormat, CellRef, CellValue, Region, Sheet};
use gridcalc_engine::engine::{Reference, Variable};
use regex::Regex;
use std::path::Path;
use std::sync::OnceLock;

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    /// `A1: input`, applied like typed input.
    Assign { cell: CellRef, input: String },
    /// `name := A1:B2` or `name := 0.5`.
    Define { name: String, definition: Variable },
    /// `format A1:B2 fixed 2`, `format A:A money [2]` or `format A1 general`.
    Format { region: Region, format: CellFormat },
}

const MAX_FORMAT_DECIMALS: usize = 15;

#[derive(Debug, Clone, PartialEq)]
pub struct Line {
    pub number: usize,
    pub statement: Statement,
}

fn assign_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(?P<cell>[A-Za-z]+[0-9]+)\s*:(?P<input>.*)$")
            .expect("assignment regex must compile")
    })
}

fn define_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(?P<name>[A-Za-z_][A-Za-z0-9_]*)\s*:=(?P<value>.*)$")
            .expect("definition regex must compile")
    })
}

fn format_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^format\s+(?P<range>\S+)\s+(?P<kind>[a-z]+)(?:\s+(?P<decimals>\S+))?$")
            .expect("format regex must compile")
    })
}

fn parse_format(caps: &regex::Captures<'_>) -> std::result::Result<Statement, String> {
    let range = &caps["range"];
    let region = Reference::parse(range)
        .and_then(|reference| reference.to_region())
        .ok_or_else(|| format!("invalid range '{}'", range))?;
    let decimals = match caps.name("decimals") {
        Some(text) => match text.as_str().parse::<usize>() {
            Ok(n) if n <= MAX_FORMAT_DECIMALS => Some(n),
            _ => return Err(format!("invalid decimal places '{}'", text.as_str())),
        },
        None => None,
    };
    let kind = caps["kind"].to_ascii_lowercase();
    let format = match (kind.as_str(), decimals) {
        ("general", None) => CellFormat::General,
        ("fixed", Some(decimals)) => CellFormat::Fixed { decimals },
        ("money", decimals) => CellFormat::Money {
            symbol: "$".to_string(),
            decimals: decimals.unwrap_or(2),
        },
        ("fixed", None) => return Err("fixed format needs decimal places".to_string()),
        _ => return Err(format!("unknown format '{}'", &caps["kind"])),
    };
    Ok(Statement::Format { region, format })
}

/// Parse script text. Blank lines and lines starting with `#` are skipped.
pub fn parse_script(content: &str) -> Result<Vec<Line>> {
    let mut lines = Vec::new();

    for (idx, raw) in content.lines().enumerate() {
        let number = idx + 1;
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let statement = if let Some(caps) = format_re().captures(line) {
            parse_format(&caps).map_err(|message| CliError::Parse {
                line: number,
                message,
            })?
        } else if let Some(caps) = define_re().captures(line) {
            let value = caps["value"].trim();
            if value.is_empty() {
                return Err(CliError::Parse {
                    line: number,
                    message: format!("missing definition for '{}'", &caps["name"]),
                });
            }
            let definition = match Reference::parse(value) {
                Some(reference) => Variable::Range(reference),
                None => Variable::Value(CellValue::infer(value)),
            };
            Statement::Define {
                name: caps["name"].to_string(),
                definition,
            }
        } else if let Some(caps) = assign_re().captures(line) {
            let cell = CellRef::from_a1(&caps["cell"]).ok_or_else(|| CliError::Parse {
                line: number,
                message: format!("invalid cell reference '{}'", &caps["cell"]),
            })?;
            Statement::Assign {
                cell,
                input: caps["input"].trim().to_string(),
            }
        } else {
            return Err(CliError::Parse {
                line: number,
                message: format!(
                    "expected 'CELL: value', 'name := value' or 'format RANGE KIND', got '{}'",
                    line
                ),
            });
        };

        lines.push(Line { number, statement });
    }

    Ok(lines)
}

/// Apply parsed lines to a sheet as one batch.
pub fn apply_script(sheet: &mut Sheet, lines: &[Line]) -> Result<()> {
    sheet.pause_calculation();
    let applied = lines.iter().try_for_each(|line| {
        let outcome = match &line.statement {
            Statement::Assign { cell, input } => sheet.set_input(cell.row, cell.col, input),
            Statement::Define { name, definition } => sheet.define_name(name, definition.clone()),
            Statement::Format { region, format } => {
                sheet.set_format(region, format.clone());
                Ok(())
            }
        };
        outcome.map_err(|source| CliError::Apply {
            line: line.number,
            source,
        })
    });
    // Leave the sheet calculated even when a line failed part way.
    let resumed = sheet.resume_calculation();
    applied?;
    resumed.map_err(|source| CliError::Apply { line: 0, source })?;
    Ok(())
}

pub fn load_script(path: &Path, sheet: &mut Sheet) -> Result<()> {
    let content = std::fs::read_to_string(path)?;
    let lines = parse_script(&content)?;
    log::debug!("{}: {} statements", path.display(), lines.len());
    apply_script(sheet, &lines)
}
