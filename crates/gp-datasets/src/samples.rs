use gp_core::{Error, Result};
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

/// Row-major `(num_trials, num_samples, dim)` array of `f64`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleArray {
    shape: [usize; 3],
    data: Vec<f64>,
}

impl SampleArray {
    /// Zero-filled array.
    pub fn zeros(num_trials: usize, num_samples: usize, dim: usize) -> Self {
        Self { shape: [num_trials, num_samples, dim], data: vec![0.0; num_trials * num_samples * dim] }
    }

    /// Build from a flat buffer, checking its length against `shape`.
    pub fn from_parts(shape: [usize; 3], data: Vec<f64>) -> Result<Self> {
        let expected = shape.iter().product::<usize>();
        if data.len() != expected {
            return Err(Error::Validation(format!(
                "sample buffer has {} values, shape {:?} needs {expected}",
                data.len(),
                shape
            )));
        }
        Ok(Self { shape, data })
    }

    /// Reshape `(num_trials * num_samples) × dim` rows into trials.
    pub fn from_stacked(num_trials: usize, num_samples: usize, rows: &DMatrix<f64>) -> Result<Self> {
        if rows.nrows() != num_trials * num_samples {
            return Err(Error::Validation(format!(
                "stacked samples have {} rows, expected {}",
                rows.nrows(),
                num_trials * num_samples
            )));
        }
        let dim = rows.ncols();
        let mut data = Vec::with_capacity(rows.len());
        for r in rows.row_iter() {
            data.extend(r.iter().copied());
        }
        Ok(Self { shape: [num_trials, num_samples, dim], data })
    }

    /// `[num_trials, num_samples, dim]`.
    pub fn shape(&self) -> [usize; 3] {
        self.shape
    }

    /// Number of trials.
    pub fn num_trials(&self) -> usize {
        self.shape[0]
    }

    /// Flat row-major view.
    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    fn trial_range(&self, index: usize) -> std::ops::Range<usize> {
        let stride = self.shape[1] * self.shape[2];
        index * stride..(index + 1) * stride
    }

    /// Samples of one trial as an owned `num_samples × dim` matrix.
    pub fn trial(&self, index: usize) -> Option<DMatrix<f64>> {
        if index >= self.shape[0] {
            return None;
        }
        let [_, n, d] = self.shape;
        Some(DMatrix::from_row_slice(n, d, &self.data[self.trial_range(index)]))
    }

    /// Overwrite one trial.
    pub fn set_trial(&mut self, index: usize, samples: &DMatrix<f64>) -> Result<()> {
        let [t, n, d] = self.shape;
        if index >= t {
            return Err(Error::Validation(format!("trial index {index} out of range ({t})")));
        }
        if samples.shape() != (n, d) {
            return Err(Error::Validation(format!(
                "trial samples have shape {:?}, expected ({n}, {d})",
                samples.shape()
            )));
        }
        let range = self.trial_range(index);
        for (dst, src) in self.data[range].chunks_mut(d).zip(samples.row_iter()) {
            for (x, y) in dst.iter_mut().zip(src.iter()) {
                *x = *y;
            }
        }
        Ok(())
    }
}
