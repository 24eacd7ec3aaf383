use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const CONFIG_ENV: &str = "COATTAIND_CONFIG";

/// Header-row heuristics. Every label match is case-sensitive, like the sheets teachers hand in.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct LayoutRules {
    /// Rows examined from the top of a sheet when looking for header rows.
    pub scan_rows: usize,
    pub max_marks_label: String,
    pub usn_label: String,
    pub name_label: String,
    pub question_prefix: String,
    /// Extra sheets after the primary one that are read as lab sheets.
    pub max_lab_sheets: usize,
    pub lab_prefix: String,
}

impl Default for LayoutRules {
    fn default() -> Self {
        Self {
            scan_rows: 5,
            max_marks_label: "Maximum Marks".to_string(),
            usn_label: "USN".to_string(),
            name_label: "STUDENT NAME".to_string(),
            question_prefix: "Q".to_string(),
            max_lab_sheets: 2,
            lab_prefix: "LAB_".to_string(),
        }
    }
}

impl LayoutRules {
    /// Id prefix given to questions of the `sheet_idx`-th sheet (0 is the primary sheet).
    pub fn sheet_prefix(&self, sheet_idx: usize) -> String {
        if sheet_idx == 0 {
            String::new()
        } else {
            format!("{}{}_", self.lab_prefix, sheet_idx)
        }
    }

    pub fn is_lab_question(&self, question_id: &str) -> bool {
        !self.lab_prefix.is_empty() && question_id.starts_with(&self.lab_prefix)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CoPoEntry {
    pub co: String,
    pub pos: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct AttainmentConfig {
    /// Fraction of a question's maximum a mark must reach to count as attained.
    pub threshold: f64,
    pub co_po_mapping: Vec<CoPoEntry>,
    pub layout: LayoutRules,
}

impl Default for AttainmentConfig {
    fn default() -> Self {
        Self {
            threshold: 0.6,
            co_po_mapping: default_co_po_mapping(),
            layout: LayoutRules::default(),
        }
    }
}

fn default_co_po_mapping() -> Vec<CoPoEntry> {
    const WITH_PO8: &[&str] = &["PO1", "PO5", "PO8", "PO9", "PO10", "PO12"];
    const WITHOUT_PO8: &[&str] = &["PO1", "PO5", "PO9", "PO10", "PO12"];
    let rows: [(&str, &[&str]); 7] = [
        ("0", WITH_PO8),
        ("1", WITHOUT_PO8),
        ("2", WITHOUT_PO8),
        ("3", WITH_PO8),
        ("4", WITHOUT_PO8),
        ("5", WITHOUT_PO8),
        ("6", WITH_PO8),
    ];
    rows.iter()
        .map(|(co, pos)| CoPoEntry {
            co: co.to_string(),
            pos: pos.iter().map(|p| p.to_string()).collect(),
        })
        .collect()
}

impl AttainmentConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.to_string_lossy()))?;
        let cfg: AttainmentConfig = serde_json::from_str(&text)
            .with_context(|| format!("failed to parse config {}", path.to_string_lossy()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if !self.threshold.is_finite() || !(0.0..=1.0).contains(&self.threshold) {
            anyhow::bail!("threshold must be within 0..=1, got {}", self.threshold);
        }
        if self.layout.scan_rows == 0 {
            anyhow::bail!("layout.scanRows must be at least 1");
        }
        if self.layout.usn_label.trim().is_empty() {
            anyhow::bail!("layout.usnLabel must not be empty");
        }
        if self.layout.max_marks_label.trim().is_empty() {
            anyhow::bail!("layout.maxMarksLabel must not be empty");
        }
        if self.layout.question_prefix.is_empty() {
            anyhow::bail!("layout.questionPrefix must not be empty");
        }
        Ok(())
    }
}
