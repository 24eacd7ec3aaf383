use crate::config::AttainmentConfig;
use crate::extract::{Extraction, QuestionMeta};
use serde::Serialize;
use std::collections::HashMap;

/// Two-decimal rounding applied wherever a percentage is produced. Exact ties go to the even
/// digit (`3.125` -> `3.12`), as decimal formatting of the binary value does.
pub fn round2(x: f64) -> f64 {
    format!("{x:.2}").parse().unwrap_or(x)
}

/// `100 * num / den`, rounded; 0 when there is nothing to divide by.
pub fn percent(num: usize, den: usize) -> f64 {
    if den == 0 {
        return 0.0;
    }
    round2(100.0 * (num as f64) / (den as f64))
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    round2(values.iter().sum::<f64>() / (values.len() as f64))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionMetrics {
    pub question_id: String,
    pub max_mark: f64,
    pub threshold: f64,
    pub num_attempted: usize,
    pub num_above_threshold: usize,
    pub attainment: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutcomeAttainment {
    pub label: String,
    pub overall: f64,
    pub theory: f64,
    pub lab: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttainmentSummary {
    pub average_attainment: f64,
    pub average_theory: f64,
    pub average_lab: f64,
}

impl AttainmentSummary {
    fn of(rows: &[OutcomeAttainment]) -> Self {
        let overall: Vec<f64> = rows.iter().map(|r| r.overall).collect();
        let theory: Vec<f64> = rows.iter().map(|r| r.theory).collect();
        let lab: Vec<f64> = rows.iter().map(|r| r.lab).collect();
        Self {
            average_attainment: mean(&overall),
            average_theory: mean(&theory),
            average_lab: mean(&lab),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CoAttainment {
    pub outcomes: Vec<OutcomeAttainment>,
    pub summary: AttainmentSummary,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PoAttainment {
    pub outcomes: Vec<OutcomeAttainment>,
    pub summary: AttainmentSummary,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttainmentReport {
    pub co_data: CoAttainment,
    pub po_data: PoAttainment,
    pub question_metrics: Vec<QuestionMetrics>,
}

impl CoAttainment {
    pub fn get(&self, co: &str) -> Option<&OutcomeAttainment> {
        self.outcomes.iter().find(|o| o.label == co)
    }
}

pub fn compute(data: &Extraction, cfg: &AttainmentConfig) -> AttainmentReport {
    let question_metrics = question_metrics(data, cfg.threshold);
    let co_data = co_attainment(&data.questions, &question_metrics, cfg);
    let po_data = po_attainment(&co_data, cfg);
    AttainmentReport {
        co_data,
        po_data,
        question_metrics,
    }
}

/// One entry per question that has at least one mark, in first-mark order.
pub fn question_metrics(data: &Extraction, threshold_ratio: f64) -> Vec<QuestionMetrics> {
    let mut max_by_question: HashMap<&str, f64> = HashMap::new();
    for q in &data.questions {
        max_by_question.insert(q.question_id.as_str(), q.max_mark);
    }

    let mut order: Vec<&str> = Vec::new();
    let mut marks_by_question: HashMap<&str, Vec<f64>> = HashMap::new();
    for m in &data.marks {
        let qid = m.question_id.as_str();
        marks_by_question
            .entry(qid)
            .or_insert_with(|| {
                order.push(qid);
                Vec::new()
            })
            .push(m.mark);
    }

    order
        .into_iter()
        .map(|qid| {
            let marks = &marks_by_question[qid];
            let max_mark = max_by_question.get(qid).copied().unwrap_or(0.0);
            let threshold = threshold_ratio * max_mark;
            let num_attempted = marks.len();
            let num_above_threshold = marks.iter().filter(|&&m| m >= threshold).count();
            QuestionMetrics {
                question_id: qid.to_string(),
                max_mark,
                threshold,
                num_attempted,
                num_above_threshold,
                attainment: percent(num_above_threshold, num_attempted),
            }
        })
        .collect()
}

#[derive(Debug, Clone, Copy, Default)]
struct Tally {
    passed: usize,
    attempted: usize,
}

impl Tally {
    fn add(&mut self, m: &QuestionMetrics) {
        self.passed += m.num_above_threshold;
        self.attempted += m.num_attempted;
    }

    fn percent(self) -> f64 {
        percent(self.passed, self.attempted)
    }
}

/// Questions mapped to a CO but without marks contribute nothing to its tallies.
pub fn co_attainment(
    questions: &[QuestionMeta],
    metrics: &[QuestionMetrics],
    cfg: &AttainmentConfig,
) -> CoAttainment {
    let by_id: HashMap<&str, &QuestionMetrics> = metrics
        .iter()
        .map(|m| (m.question_id.as_str(), m))
        .collect();

    let mut order: Vec<&str> = Vec::new();
    let mut co_to_questions: HashMap<&str, Vec<&str>> = HashMap::new();
    for q in questions {
        for co in q.co_labels() {
            co_to_questions
                .entry(co)
                .or_insert_with(|| {
                    order.push(co);
                    Vec::new()
                })
                .push(q.question_id.as_str());
        }
    }

    let outcomes: Vec<OutcomeAttainment> = order
        .into_iter()
        .map(|co| {
            let mut overall = Tally::default();
            let mut theory = Tally::default();
            let mut lab = Tally::default();
            for qid in &co_to_questions[co] {
                let Some(m) = by_id.get(qid) else {
                    continue;
                };
                if m.num_attempted == 0 {
                    continue;
                }
                overall.add(m);
                if cfg.layout.is_lab_question(qid) {
                    lab.add(m);
                } else {
                    theory.add(m);
                }
            }
            OutcomeAttainment {
                label: co.to_string(),
                overall: overall.percent(),
                theory: theory.percent(),
                lab: lab.percent(),
            }
        })
        .collect();

    let summary = AttainmentSummary::of(&outcomes);
    CoAttainment { outcomes, summary }
}

/// Unweighted mean of the CO percentages mapped to each PO through the configured table.
/// COs in the table that the sheet never assessed contribute 0.
pub fn po_attainment(co: &CoAttainment, cfg: &AttainmentConfig) -> PoAttainment {
    let mut order: Vec<&str> = Vec::new();
    let mut collected: HashMap<&str, Vec<(f64, f64, f64)>> = HashMap::new();
    for entry in &cfg.co_po_mapping {
        let (o, t, l) = co
            .get(&entry.co)
            .map(|a| (a.overall, a.theory, a.lab))
            .unwrap_or((0.0, 0.0, 0.0));
        for po in &entry.pos {
            collected
                .entry(po.as_str())
                .or_insert_with(|| {
                    order.push(po.as_str());
                    Vec::new()
                })
                .push((o, t, l));
        }
    }

    let outcomes: Vec<OutcomeAttainment> = order
        .into_iter()
        .map(|po| {
            let vals = &collected[po];
            let overall: Vec<f64> = vals.iter().map(|v| v.0).collect();
            let theory: Vec<f64> = vals.iter().map(|v| v.1).collect();
            let lab: Vec<f64> = vals.iter().map(|v| v.2).collect();
            OutcomeAttainment {
                label: po.to_string(),
                overall: mean(&overall),
                theory: mean(&theory),
                lab: mean(&lab),
            }
        })
        .collect();

    let summary = AttainmentSummary::of(&outcomes);
    PoAttainment { outcomes, summary }
}
