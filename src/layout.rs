//! Header discovery for marks sheets.
//!
//! Marks sheets do not keep their header rows at fixed offsets: the CO row, the
//! "Maximum Marks" row and the USN/STUDENT NAME header drift between rows 0..4 depending on
//! who prepared the sheet. Every anchor is therefore found by content match inside a small
//! window at the top of the sheet (`LayoutRules::scan_rows`). The window must stay small,
//! otherwise student data further down can match the labels.
//!
//! Search order:
//! 1. CO-mapping row: always row 0.
//! 2. Max-marks row: first row in `1..scan_rows` whose first cell equals the label, or
//!    any of whose text cells contains it.
//! 3. Student data start: one past the first row in `0..scan_rows` holding both the USN and
//!    the name label; else one past the first row anywhere whose first cell is exactly the
//!    USN label.
//! 4. USN/name columns: first header-row cell containing the label.
//! 5. Question columns: header-row text cells starting with the question prefix.

use crate::config::LayoutRules;
use crate::error::{Anchor, ExtractError};
use crate::sheet::{Cell, Grid, Sheet};
use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionColumn {
    pub id: String,
    pub col: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayoutAnchors {
    pub co_row: usize,
    pub max_marks_row: usize,
    pub data_start_row: usize,
    pub usn_col: usize,
    pub name_col: Option<usize>,
    pub questions: Vec<QuestionColumn>,
}

pub fn locate(sheet: &Sheet, rules: &LayoutRules) -> Result<LayoutAnchors, ExtractError> {
    let grid = &sheet.grid;
    let not_found = |anchor: Anchor| ExtractError::AnchorNotFound {
        anchor,
        sheet: sheet.name.clone(),
    };

    if grid.row_count() == 0 {
        return Err(not_found(Anchor::CoMappingRow));
    }
    let co_row = 0;

    let max_marks_row =
        find_max_marks_row(grid, rules).ok_or_else(|| not_found(Anchor::MaxMarksRow))?;
    let data_start_row =
        find_data_start_row(grid, rules).ok_or_else(|| not_found(Anchor::StudentDataStart))?;

    let header = grid.row(data_start_row - 1);
    let usn_col = find_column(header, &rules.usn_label).ok_or_else(|| {
        ExtractError::MissingColumn {
            column: rules.usn_label.clone(),
            sheet: sheet.name.clone(),
        }
    })?;
    let name_col = if rules.name_label.trim().is_empty() {
        None
    } else {
        find_column(header, &rules.name_label)
    };
    if name_col.is_none() {
        log::debug!(
            "sheet {:?}: no {:?} column, student names left empty",
            sheet.name,
            rules.name_label
        );
    }

    let questions = question_columns(sheet, header, usn_col, name_col, rules);

    Ok(LayoutAnchors {
        co_row,
        max_marks_row,
        data_start_row,
        usn_col,
        name_col,
        questions,
    })
}

fn cell_contains(cell: &Cell, token: &str) -> bool {
    cell.as_text().map(|t| t.contains(token)).unwrap_or(false)
}

fn row_contains(row: &[Cell], token: &str) -> bool {
    row.iter().any(|c| cell_contains(c, token))
}

fn first_cell_equals(grid: &Grid, r: usize, label: &str) -> bool {
    grid.cell(r, 0)
        .as_text()
        .map(|t| t.trim() == label)
        .unwrap_or(false)
}

fn find_max_marks_row(grid: &Grid, rules: &LayoutRules) -> Option<usize> {
    let label = rules.max_marks_label.as_str();
    let end = rules.scan_rows.min(grid.row_count());
    (1..end).find(|&r| first_cell_equals(grid, r, label) || row_contains(grid.row(r), label))
}

fn find_data_start_row(grid: &Grid, rules: &LayoutRules) -> Option<usize> {
    let end = rules.scan_rows.min(grid.row_count());
    // Without a name label the header row is recognised by the USN label alone.
    let has_name_label = !rules.name_label.trim().is_empty();
    let labelled = (0..end).find(|&r| {
        let row = grid.row(r);
        row_contains(row, &rules.usn_label)
            && (!has_name_label || row_contains(row, &rules.name_label))
    });
    if let Some(r) = labelled {
        return Some(r + 1);
    }
    (0..grid.row_count())
        .find(|&r| first_cell_equals(grid, r, &rules.usn_label))
        .map(|r| r + 1)
}

fn find_column(header: &[Cell], label: &str) -> Option<usize> {
    header.iter().position(|c| cell_contains(c, label))
}

fn question_columns(
    sheet: &Sheet,
    header: &[Cell],
    usn_col: usize,
    name_col: Option<usize>,
    rules: &LayoutRules,
) -> Vec<QuestionColumn> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut out = Vec::new();
    for (col, cell) in header.iter().enumerate() {
        if col == usn_col || Some(col) == name_col {
            continue;
        }
        let Some(text) = cell.as_text() else {
            continue;
        };
        let id = text.trim();
        if !id.starts_with(&rules.question_prefix) {
            continue;
        }
        if !seen.insert(id.to_string()) {
            log::warn!(
                "sheet {:?}: duplicate question header {:?} in column {}, keeping the first",
                sheet.name,
                id,
                col
            );
            continue;
        }
        out.push(QuestionColumn {
            id: id.to_string(),
            col,
        });
    }
    out
}
