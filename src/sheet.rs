use crate::error::ExtractError;
use calamine::{open_workbook, Data, ExcelDateTime, Reader, Xlsx};
use chrono::Timelike;
use std::path::Path;

#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Number(f64),
    Text(String),
    Empty,
}

impl Cell {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Cell::Number(v) if v.is_finite() => Some(*v),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Cell::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Display form: integral numbers print without a fractional part ("1", not "1.0").
    pub fn display(&self) -> String {
        match self {
            Cell::Number(v) => format_number(*v),
            Cell::Text(s) => s.clone(),
            Cell::Empty => String::new(),
        }
    }

    pub fn is_blank(&self) -> bool {
        match self {
            Cell::Empty => true,
            Cell::Text(s) => s.trim().is_empty(),
            Cell::Number(v) => !v.is_finite(),
        }
    }
}

fn format_number(v: f64) -> String {
    if v.is_finite() && v.fract() == 0.0 && v.abs() < 1e15 {
        format!("{}", v as i64)
    } else {
        v.to_string()
    }
}

static EMPTY: Cell = Cell::Empty;

/// Rows of typed cells. Row 0 / column 0 are the sheet's A1 position; rows may be ragged.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Grid {
    rows: Vec<Vec<Cell>>,
}

impl Grid {
    pub fn new(rows: Vec<Vec<Cell>>) -> Self {
        Self { rows }
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn row(&self, r: usize) -> &[Cell] {
        self.rows.get(r).map(|v| v.as_slice()).unwrap_or(&[])
    }

    /// Out-of-range positions read as `Cell::Empty`.
    pub fn cell(&self, r: usize, c: usize) -> &Cell {
        self.rows.get(r).and_then(|row| row.get(c)).unwrap_or(&EMPTY)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Sheet {
    pub name: String,
    pub grid: Grid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Spreadsheet,
    Delimited,
}

impl SourceFormat {
    pub fn from_file_name(name: &str) -> Result<Self, ExtractError> {
        let ext = Path::new(name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "xlsx" => Ok(SourceFormat::Spreadsheet),
            "csv" => Ok(SourceFormat::Delimited),
            _ => Err(ExtractError::UnsupportedFormat(ext)),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SourceFormat::Spreadsheet => "xlsx",
            SourceFormat::Delimited => "csv",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            SourceFormat::Spreadsheet => ".xlsx",
            SourceFormat::Delimited => ".csv",
        }
    }
}

pub fn read_sheets(path: &Path, format: SourceFormat) -> Result<Vec<Sheet>, ExtractError> {
    match format {
        SourceFormat::Spreadsheet => read_workbook(path),
        SourceFormat::Delimited => Ok(vec![read_delimited(path)?]),
    }
}

fn read_workbook(path: &Path) -> Result<Vec<Sheet>, ExtractError> {
    let fmt = SourceFormat::Spreadsheet.as_str();
    let mut workbook: Xlsx<_> = open_workbook(path).map_err(|e| ExtractError::read(fmt, e))?;

    let mut sheets = Vec::new();
    for name in workbook.sheet_names() {
        let range = workbook
            .worksheet_range(&name)
            .map_err(|e| ExtractError::read(fmt, format!("sheet {name:?}: {e}")))?;

        // The used range may start below/right of A1; pad so indices are physical positions.
        let (row0, col0) = range
            .start()
            .map(|(r, c)| (r as usize, c as usize))
            .unwrap_or((0, 0));
        let mut rows: Vec<Vec<Cell>> = vec![Vec::new(); row0];
        for src in range.rows() {
            let mut row = vec![Cell::Empty; col0];
            row.extend(src.iter().map(cell_from_data));
            rows.push(row);
        }
        sheets.push(Sheet {
            name,
            grid: Grid::new(rows),
        });
    }
    Ok(sheets)
}

fn cell_from_data(d: &Data) -> Cell {
    match d {
        Data::Int(i) => Cell::Number(*i as f64),
        Data::Float(f) => Cell::Number(*f),
        Data::String(s) => Cell::Text(s.clone()),
        Data::Bool(b) => Cell::Text(b.to_string()),
        Data::DateTime(dt) => Cell::Text(date_display(dt)),
        Data::DateTimeIso(s) | Data::DurationIso(s) => Cell::Text(s.clone()),
        _ => Cell::Empty,
    }
}

const DELIMITED_SHEET_NAME: &str = "Sheet1";

/// Dates print as `YYYY-MM-DD`, or with the time when it is not midnight. Durations and serials
/// outside chrono's range keep the raw serial.
fn date_display(dt: &ExcelDateTime) -> String {
    if dt.is_duration() {
        return dt.as_f64().to_string();
    }
    match dt.as_datetime() {
        Some(ndt) if ndt.num_seconds_from_midnight() == 0 => {
            ndt.date().format("%Y-%m-%d").to_string()
        }
        Some(ndt) => ndt.format("%Y-%m-%d %H:%M:%S").to_string(),
        None => dt.as_f64().to_string(),
    }
}

fn read_delimited(path: &Path) -> Result<Sheet, ExtractError> {
    let fmt = SourceFormat::Delimited.as_str();
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .map_err(|e| ExtractError::read(fmt, e))?;

    let mut rows = Vec::new();
    for record in rdr.records() {
        let record = record.map_err(|e| ExtractError::read(fmt, e))?;
        rows.push(record.iter().map(cell_from_field).collect());
    }

    // The staged path is a temp name, so the single sheet gets a fixed one.
    Ok(Sheet {
        name: DELIMITED_SHEET_NAME.to_string(),
        grid: Grid::new(rows),
    })
}

/// Delimited text has no cell types; a field that reads as a finite number is numeric.
fn cell_from_field(field: &str) -> Cell {
    let t = field.trim();
    if t.is_empty() {
        return Cell::Empty;
    }
    match t.parse::<f64>() {
        Ok(v) if v.is_finite() => Cell::Number(v),
        _ => Cell::Text(field.to_string()),
    }
}
