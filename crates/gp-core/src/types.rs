//! Common data types for gofpower

use serde::{Deserialize, Serialize};

/// Per-batch test statistics and p-values for one trial.
///
/// Both vectors are aligned with the batches of alternative samples that were
/// handed to the engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TestOutput {
    /// Test statistic per batch.
    pub statistic: Vec<f64>,
    /// p-value per batch, each in `[0, 1]`.
    pub pvalue: Vec<f64>,
}

impl TestOutput {
    /// Create an empty output with room for `n` batches.
    pub fn with_capacity(n: usize) -> Self {
        Self { statistic: Vec::with_capacity(n), pvalue: Vec::with_capacity(n) }
    }

    /// Append one batch result.
    pub fn push(&mut self, statistic: f64, pvalue: f64) {
        self.statistic.push(statistic);
        self.pvalue.push(pvalue);
    }

    /// Number of batches.
    pub fn len(&self) -> usize {
        self.pvalue.len()
    }

    /// `true` when no batch was tested.
    pub fn is_empty(&self) -> bool {
        self.pvalue.is_empty()
    }

    /// Number of batches whose p-value falls below `alpha`.
    pub fn rejections(&self, alpha: f64) -> usize {
        self.pvalue.iter().filter(|&&p| p < alpha).count()
    }
}

/// One trial's contribution to a dispatcher history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialRecord {
    /// Trial index within the dataset.
    pub trial: usize,
    /// Engine output for the trial.
    #[serde(flatten)]
    pub output: TestOutput,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_push_and_rejections() {
        let mut out = TestOutput::with_capacity(3);
        out.push(4.1, 0.01);
        out.push(0.2, 0.64);
        out.push(2.9, 0.049);
        assert_eq!(out.len(), 3);
        assert_eq!(out.rejections(0.05), 2);
        assert_eq!(out.rejections(0.001), 0);
    }

    #[test]
    fn test_trial_record_json_is_flat() {
        let rec = TrialRecord {
            trial: 2,
            output: TestOutput { statistic: vec![1.0], pvalue: vec![0.5] },
        };
        let v = serde_json::to_value(&rec).unwrap();
        assert_eq!(v["trial"], 2);
        assert_eq!(v["pvalue"][0], 0.5);
    }
}
