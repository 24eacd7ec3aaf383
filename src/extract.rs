use crate::config::LayoutRules;
use crate::error::ExtractError;
use crate::layout::{self, LayoutAnchors};
use crate::sheet::{Cell, Sheet};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub usn: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Mark {
    pub usn: String,
    pub question_id: String,
    pub mark: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionMeta {
    pub question_id: String,
    /// Comma-separated CO labels exactly as written in the CO row (trimmed).
    pub course_outcomes: String,
    pub max_mark: f64,
}

impl QuestionMeta {
    pub fn co_labels(&self) -> impl Iterator<Item = &str> {
        self.course_outcomes
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Extraction {
    pub students: Vec<Student>,
    pub marks: Vec<Mark>,
    pub questions: Vec<QuestionMeta>,
}

impl Extraction {
    fn append(&mut self, other: Extraction) {
        self.students.extend(other.students);
        self.marks.extend(other.marks);
        self.questions.extend(other.questions);
    }
}

/// Primary sheet first; up to `rules.max_lab_sheets` further sheets are read as lab sheets
/// whose question ids carry a `LAB_{k}_` prefix. Lab sheets add marks and questions only.
pub fn extract_workbook(sheets: &[Sheet], rules: &LayoutRules) -> Result<Extraction, ExtractError> {
    let Some(primary) = sheets.first() else {
        return Err(ExtractError::read("workbook", "source contains no sheets"));
    };

    let anchors = layout::locate(primary, rules)?;
    let mut out = extract_sheet(primary, &anchors, "", true);

    let lab_sheets = sheets.len().saturating_sub(1).min(rules.max_lab_sheets);
    for (k, sheet) in sheets.iter().enumerate().skip(1).take(lab_sheets) {
        let anchors = layout::locate(sheet, rules)?;
        let prefix = rules.sheet_prefix(k);
        out.append(extract_sheet(sheet, &anchors, &prefix, false));
    }
    if sheets.len() > lab_sheets + 1 {
        log::info!(
            "ignoring {} sheet(s) beyond the {} lab sheet limit",
            sheets.len() - lab_sheets - 1,
            rules.max_lab_sheets
        );
    }
    Ok(out)
}

pub fn extract_sheet(
    sheet: &Sheet,
    anchors: &LayoutAnchors,
    id_prefix: &str,
    emit_students: bool,
) -> Extraction {
    let grid = &sheet.grid;
    let mut out = Extraction::default();

    for q in &anchors.questions {
        let co = grid.cell(anchors.co_row, q.col).display();
        let co = co.trim();
        if co.is_empty() {
            continue;
        }
        out.questions.push(QuestionMeta {
            question_id: format!("{id_prefix}{}", q.id),
            course_outcomes: co.to_string(),
            max_mark: max_mark(grid.cell(anchors.max_marks_row, q.col)),
        });
    }

    let mut skipped_rows = 0usize;
    for r in anchors.data_start_row..grid.row_count() {
        let Some(usn) = usn_of(grid.cell(r, anchors.usn_col)) else {
            skipped_rows += 1;
            continue;
        };

        if emit_students {
            let name = anchors
                .name_col
                .map(|c| grid.cell(r, c).display().trim().to_string())
                .unwrap_or_default();
            out.students.push(Student {
                usn: usn.clone(),
                name,
            });
        }

        for q in &anchors.questions {
            if let Some(mark) = mark_of(grid.cell(r, q.col)) {
                out.marks.push(Mark {
                    usn: usn.clone(),
                    question_id: format!("{id_prefix}{}", q.id),
                    mark,
                });
            }
        }
    }

    log::debug!(
        "sheet {:?}: {} student row(s), {} mark(s), {} question(s), {} blank-USN row(s) skipped",
        sheet.name,
        out.students.len(),
        out.marks.len(),
        out.questions.len(),
        skipped_rows
    );
    out
}

fn usn_of(cell: &Cell) -> Option<String> {
    if cell.is_blank() {
        return None;
    }
    Some(cell.display().trim().to_string())
}

/// Only numeric cells count; text such as "AB" or "-" is not a zero.
fn mark_of(cell: &Cell) -> Option<f64> {
    cell.as_number().filter(|v| *v >= 0.0)
}

fn max_mark(cell: &Cell) -> f64 {
    let v = match cell {
        Cell::Number(v) => *v,
        Cell::Text(s) => s.trim().parse::<f64>().unwrap_or(0.0),
        Cell::Empty => 0.0,
    };
    if v.is_finite() && v > 0.0 {
        v
    } else {
        0.0
    }
}
