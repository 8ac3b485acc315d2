//! Held-out evaluation of a fitted classifier.
//!
//! Accuracy, confusion matrix, per-class precision / recall / F1 and ROC-AUC
//! for the binary heart disease label.

use std::fmt;

use serde::Serialize;

/// Binary confusion matrix, rows are the true class.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ConfusionMatrix {
    pub tn: usize,
    pub fp: usize,
    #[serde(rename = "fn")]
    pub fn_: usize,
    pub tp: usize,
}

impl ConfusionMatrix {
    pub fn from_labels(truth: &[u8], predicted: &[u8]) -> Self {
        debug_assert_eq!(truth.len(), predicted.len());
        let mut m = Self::default();
        for (&t, &p) in truth.iter().zip(predicted) {
            match (t, p) {
                (0, 0) => m.tn += 1,
                (0, _) => m.fp += 1,
                (_, 0) => m.fn_ += 1,
                _ => m.tp += 1,
            }
        }
        m
    }

    /// `[[tn, fp], [fn, tp]]`
    pub fn as_rows(&self) -> [[usize; 2]; 2] {
        [[self.tn, self.fp], [self.fn_, self.tp]]
    }

    pub fn total(&self) -> usize {
        self.tn + self.fp + self.fn_ + self.tp
    }
}

/// Precision, recall and F1 for one class.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ClassMetrics {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: usize,
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

impl ClassMetrics {
    fn new(true_pos: usize, false_pos: usize, false_neg: usize) -> Self {
        let precision = ratio(true_pos, true_pos + false_pos);
        let recall = ratio(true_pos, true_pos + false_neg);
        let f1 = if precision + recall == 0.0 {
            0.0
        } else {
            2.0 * precision * recall / (precision + recall)
        };
        Self {
            precision,
            recall,
            f1,
            support: true_pos + false_neg,
        }
    }
}

/// Full evaluation of one classifier on one split.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluationReport {
    pub accuracy: f64,
    pub confusion: ConfusionMatrix,
    /// Index 0 is "no disease", index 1 is "disease"
    pub classes: [ClassMetrics; 2],
    pub macro_avg: ClassMetrics,
    pub weighted_avg: ClassMetrics,
    /// `None` when the split holds only one class
    pub roc_auc: Option<f64>,
}

impl EvaluationReport {
    /// Evaluate hard labels and class-1 probabilities against the truth.
    pub fn compute(truth: &[u8], predicted: &[u8], probabilities: &[f64]) -> Self {
        let confusion = ConfusionMatrix::from_labels(truth, predicted);
        let ConfusionMatrix { tn, fp, fn_, tp } = confusion;

        let classes = [ClassMetrics::new(tn, fn_, fp), ClassMetrics::new(tp, fp, fn_)];
        let total = confusion.total();

        let macro_avg = average(&classes, |_| 0.5);
        let weighted_avg = average(&classes, |c| ratio(c.support, total));

        Self {
            accuracy: ratio(tn + tp, total),
            confusion,
            classes,
            macro_avg,
            weighted_avg,
            roc_auc: roc_auc(probabilities, truth),
        }
    }
}

fn average(classes: &[ClassMetrics; 2], weight: impl Fn(&ClassMetrics) -> f64) -> ClassMetrics {
    let mut avg = ClassMetrics::default();
    for c in classes {
        let w = weight(c);
        avg.precision += w * c.precision;
        avg.recall += w * c.recall;
        avg.f1 += w * c.f1;
        avg.support += c.support;
    }
    avg
}

/// Area under the ROC curve via the Mann-Whitney U statistic.
///
/// Tied scores between a positive and a negative count one half. Returns
/// `None` when either class is absent.
pub fn roc_auc(scores: &[f64], labels: &[u8]) -> Option<f64> {
    debug_assert_eq!(scores.len(), labels.len());

    let n_pos = labels.iter().filter(|&&l| l == 1).count();
    let n_neg = labels.len() - n_pos;
    if n_pos == 0 || n_neg == 0 {
        return None;
    }

    let mut concordant = 0.0f64;
    for (p_pos, _) in scores.iter().zip(labels).filter(|&(_, &l)| l == 1) {
        for (p_neg, _) in scores.iter().zip(labels).filter(|&(_, &l)| l != 1) {
            if p_pos > p_neg {
                concordant += 1.0;
            } else if p_pos == p_neg {
                concordant += 0.5;
            }
        }
    }

    Some(concordant / (n_pos as f64 * n_neg as f64))
}

impl fmt::Display for EvaluationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Accuracy: {:.4}", self.accuracy)?;
        writeln!(f)?;
        writeln!(f, "Confusion matrix (rows = truth):")?;
        for row in self.confusion.as_rows() {
            writeln!(f, "  [{:>5} {:>5}]", row[0], row[1])?;
        }
        writeln!(f)?;
        writeln!(
            f,
            "{:>14} {:>9} {:>9} {:>9} {:>9}",
            "", "precision", "recall", "f1-score", "support"
        )?;
        let rows = [
            ("0", &self.classes[0]),
            ("1", &self.classes[1]),
            ("macro avg", &self.macro_avg),
            ("weighted avg", &self.weighted_avg),
        ];
        for (name, m) in rows {
            writeln!(
                f,
                "{:>14} {:>9.2} {:>9.2} {:>9.2} {:>9}",
                name, m.precision, m.recall, m.f1, m.support
            )?;
        }
        writeln!(f)?;
        match self.roc_auc {
            Some(auc) => write!(f, "ROC-AUC: {auc:.4}"),
            None => write!(f, "ROC-AUC: undefined (single class)"),
        }
    }
}
