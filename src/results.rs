/// Simulation result file readers.
///
/// The simulation writes tabular files with a header section declaring
/// `*FieldNames:` and `*FieldUnits:` as comma-separated lists, terminated
/// by `*EndOfHeader`, followed by one line per time sample with
/// whitespace-separated columns in field-name order. Field names contain
/// spaces; columns map to names by position.
///
/// Profile ("Hoffmueller") files share the header convention but hold
/// blank-line-delimited depth blocks, one block per saved profile
/// snapshot, 1-indexed.

use std::path::Path;

use crate::model::ResultsError;

// ---------------------------------------------------------------------------
// Result containers
// ---------------------------------------------------------------------------

/// One (independent, dependent) field pair read from a tabular result file.
#[derive(Debug, Clone, PartialEq)]
pub struct Timeseries {
    /// Independent data, usually hours since the run start.
    pub indep_data: Vec<f64>,
    pub dep_data: Vec<f64>,
}

/// One depth profile snapshot from a profile file.
#[derive(Debug, Clone, PartialEq)]
pub struct Profile {
    /// Independent data, usually depth in metres.
    pub indep_data: Vec<f64>,
    pub dep_data: Vec<f64>,
}

// ---------------------------------------------------------------------------
// Header parsing
// ---------------------------------------------------------------------------

struct Header {
    field_names: Vec<String>,
    data_start: usize,
}

fn split_field_list(raw: &str) -> Vec<String> {
    raw.split(',').map(|f| f.trim().to_string()).collect()
}

fn parse_header(path: &str, lines: &[&str]) -> Result<Header, ResultsError> {
    let mut field_names: Option<Vec<String>> = None;
    for (i, line) in lines.iter().enumerate() {
        let line = line.trim();
        if let Some(rest) = line.strip_prefix("*FieldNames:") {
            field_names = Some(split_field_list(rest));
        } else if line == "*EndOfHeader" {
            return match field_names {
                Some(field_names) => Ok(Header {
                    field_names,
                    data_start: i + 1,
                }),
                None => Err(ResultsError::MalformedHeader {
                    path: path.to_string(),
                    detail: "*EndOfHeader reached without *FieldNames:".to_string(),
                }),
            };
        }
    }
    Err(ResultsError::MalformedHeader {
        path: path.to_string(),
        detail: "no *EndOfHeader marker".to_string(),
    })
}

fn field_index(path: &str, header: &Header, field: &str) -> Result<usize, ResultsError> {
    header
        .field_names
        .iter()
        .position(|name| name == field)
        .ok_or_else(|| ResultsError::MissingField {
            path: path.to_string(),
            field: field.to_string(),
        })
}

fn parse_row(
    path: &str,
    line_number: usize,
    line: &str,
    indep_col: usize,
    dep_col: usize,
) -> Result<(f64, f64), ResultsError> {
    let columns: Vec<&str> = line.split_whitespace().collect();
    let value_at = |col: usize| -> Result<f64, ResultsError> {
        columns
            .get(col)
            .and_then(|c| c.parse::<f64>().ok())
            .ok_or(ResultsError::MalformedRow {
                path: path.to_string(),
                line: line_number,
            })
    };
    Ok((value_at(indep_col)?, value_at(dep_col)?))
}

// ---------------------------------------------------------------------------
// Time series files
// ---------------------------------------------------------------------------

pub fn read_timeseries(
    path: &Path,
    indep_field: &str,
    dep_field: &str,
) -> Result<Timeseries, ResultsError> {
    let label = path.display().to_string();
    let contents = std::fs::read_to_string(path).map_err(|e| ResultsError::Io {
        path: label.clone(),
        detail: e.to_string(),
    })?;
    timeseries_from_str(&label, &contents, indep_field, dep_field)
}

fn timeseries_from_str(
    path: &str,
    contents: &str,
    indep_field: &str,
    dep_field: &str,
) -> Result<Timeseries, ResultsError> {
    let lines: Vec<&str> = contents.lines().collect();
    let header = parse_header(path, &lines)?;
    let indep_col = field_index(path, &header, indep_field)?;
    let dep_col = field_index(path, &header, dep_field)?;
    let mut indep_data = Vec::new();
    let mut dep_data = Vec::new();
    for (i, line) in lines.iter().enumerate().skip(header.data_start) {
        if line.trim().is_empty() {
            continue;
        }
        let (indep, dep) = parse_row(path, i + 1, line, indep_col, dep_col)?;
        indep_data.push(indep);
        dep_data.push(dep);
    }
    Ok(Timeseries { indep_data, dep_data })
}

// ---------------------------------------------------------------------------
// Profile files
// ---------------------------------------------------------------------------

pub fn read_hoffmueller_profile(
    path: &Path,
    indep_field: &str,
    dep_field: &str,
    profile_number: usize,
) -> Result<Profile, ResultsError> {
    let label = path.display().to_string();
    let contents = std::fs::read_to_string(path).map_err(|e| ResultsError::Io {
        path: label.clone(),
        detail: e.to_string(),
    })?;
    profile_from_str(&label, &contents, indep_field, dep_field, profile_number)
}

fn profile_from_str(
    path: &str,
    contents: &str,
    indep_field: &str,
    dep_field: &str,
    profile_number: usize,
) -> Result<Profile, ResultsError> {
    let lines: Vec<&str> = contents.lines().collect();
    let header = parse_header(path, &lines)?;
    let indep_col = field_index(path, &header, indep_field)?;
    let dep_col = field_index(path, &header, dep_field)?;

    // Profile N is the Nth blank-line-delimited block, 1-indexed.
    let mut block = 0usize;
    let mut in_block = false;
    let mut indep_data = Vec::new();
    let mut dep_data = Vec::new();
    for (i, line) in lines.iter().enumerate().skip(header.data_start) {
        if line.trim().is_empty() {
            in_block = false;
            continue;
        }
        if !in_block {
            in_block = true;
            block += 1;
            if block > profile_number {
                break;
            }
        }
        if block == profile_number {
            let (indep, dep) = parse_row(path, i + 1, line, indep_col, dep_col)?;
            indep_data.push(indep);
            dep_data.push(dep);
        }
    }
    if block < profile_number || indep_data.is_empty() {
        return Err(ResultsError::MissingProfile {
            path: path.to_string(),
            profile_number,
            available: block,
        });
    }
    Ok(Profile { indep_data, dep_data })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
