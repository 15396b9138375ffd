use std::fmt;
use std::path::{Path, PathBuf};

use gp_core::{Error, Result};
use gp_prob::DistributionParams;
use nalgebra::DMatrix;

use crate::artifact::{self, ArtifactKey};
use crate::config::DatasetConfig;
use crate::samples::SampleArray;
use crate::GeneratedData;

/// Whether an existing artifact may be reused.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CachePolicy {
    /// Load an existing artifact; a corrupt one is an error.
    #[default]
    Reuse,
    /// Regenerate and overwrite, even when an artifact exists.
    ForceRegenerate,
}

/// Where the data of an opened dataset came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provenance {
    /// Sampled during this `open`.
    Generated,
    /// Loaded from a persisted artifact.
    Cached,
}

/// One randomized trial, fully materialized.
#[derive(Debug, Clone)]
pub struct Trial {
    /// Index within the dataset.
    pub index: usize,
    /// Null samples (`num_samples × dim`).
    pub null: DMatrix<f64>,
    /// Alternative samples (`num_samples × dim`).
    pub alter: DMatrix<f64>,
    /// Fixed null parameters.
    pub null_params: DistributionParams,
    /// This trial's alternative parameters.
    pub alter_params: DistributionParams,
}

/// Cached sequence of trials for one generation configuration.
#[derive(Debug, Clone)]
pub struct Dataset {
    root: PathBuf,
    config: DatasetConfig,
    fingerprint: String,
    null_params: DistributionParams,
    data: GeneratedData,
    provenance: Provenance,
}

impl Dataset {
    /// Open (load or generate) the dataset for `config` under `root`.
    pub fn open(root: impl AsRef<Path>, config: DatasetConfig) -> Result<Self> {
        Self::open_with(root, config, CachePolicy::Reuse)
    }

    /// Open with an explicit cache policy.
    ///
    /// The configuration is validated before the filesystem is touched.
    pub fn open_with(
        root: impl AsRef<Path>,
        config: DatasetConfig,
        policy: CachePolicy,
    ) -> Result<Self> {
        config.validate()?;
        let root = root.as_ref().to_path_buf();
        let fingerprint = config.fingerprint();
        let null_params = config.null_params();
        let shape = [config.num_trials(), config.num_samples(), config.dim()];

        let mut ds = Self {
            root,
            config,
            fingerprint,
            null_params,
            data: GeneratedData {
                null: SampleArray::zeros(0, 0, 0),
                alter: SampleArray::zeros(0, 0, 0),
                alter_params: Vec::new(),
            },
            provenance: Provenance::Generated,
        };

        let path = ds.artifact_path();
        let key = ArtifactKey {
            data_name: ds.config.data_name(),
            fingerprint: &ds.fingerprint,
            shape,
        };

        let (data, provenance) = if policy == CachePolicy::Reuse && path.exists() {
            log::debug!("loading cached dataset {}", path.display());
            (artifact::load(&path, &key)?, Provenance::Cached)
        } else {
            if !ds.raw_folder().exists() {
                std::fs::create_dir_all(ds.raw_folder())?;
            }
            std::fs::create_dir_all(ds.processed_folder())?;
            log::info!(
                "generating {} dataset: {} trials x {} samples (fingerprint {})",
                key.data_name,
                shape[0],
                shape[1],
                key.fingerprint
            );
            let data = ds.config.generate()?;
            artifact::save(&path, &key, &data)?;
            (data, Provenance::Generated)
        };

        ds.data = data;
        ds.provenance = provenance;
        Ok(ds)
    }

    /// Root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Folder holding persisted artifacts.
    pub fn processed_folder(&self) -> PathBuf {
        self.root.join("processed")
    }

    /// Staging folder for raw inputs (always empty: data is synthetic).
    pub fn raw_folder(&self) -> PathBuf {
        self.root.join("raw")
    }

    /// `{root}/processed/{name}_{fingerprint}.bin`
    pub fn artifact_path(&self) -> PathBuf {
        self.processed_folder().join(format!("{}_{}.bin", self.data_name(), self.fingerprint))
    }

    /// Dataset name (`GMM` / `MVN`).
    pub fn data_name(&self) -> &'static str {
        self.config.data_name()
    }

    /// Configuration fingerprint.
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// Generation configuration.
    pub fn config(&self) -> &DatasetConfig {
        &self.config
    }

    /// Whether the data was generated or loaded.
    pub fn provenance(&self) -> Provenance {
        self.provenance
    }

    /// Number of trials.
    pub fn len(&self) -> usize {
        self.data.null.num_trials()
    }

    /// `true` if the dataset holds no trials.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Fixed null parameters.
    pub fn null_params(&self) -> &DistributionParams {
        &self.null_params
    }

    /// All null samples.
    pub fn null_array(&self) -> &SampleArray {
        &self.data.null
    }

    /// All alternative samples.
    pub fn alter_array(&self) -> &SampleArray {
        &self.data.alter
    }

    /// Per-trial alternative parameters.
    pub fn alter_params(&self) -> &[DistributionParams] {
        &self.data.alter_params
    }

    /// Materialize trial `index`.
    pub fn trial(&self, index: usize) -> Result<Trial> {
        let out_of_range =
            || Error::Validation(format!("trial index {index} out of range ({})", self.len()));
        let null = self.data.null.trial(index).ok_or_else(out_of_range)?;
        let alter = self.data.alter.trial(index).ok_or_else(out_of_range)?;
        let alter_params = self.data.alter_params.get(index).ok_or_else(out_of_range)?.clone();
        Ok(Trial { index, null, alter, null_params: self.null_params.clone(), alter_params })
    }

    /// Trials in index order.
    pub fn iter(&self) -> impl Iterator<Item = Result<Trial>> + '_ {
        (0..self.len()).map(move |i| self.trial(i))
    }
}

impl fmt::Display for Dataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Dataset {}\nSize: {}\nRoot: {}\nFingerprint: {}",
            self.data_name(),
            self.len(),
            self.root.display(),
            self.fingerprint
        )
    }
}
