//! JSON run files: `{ "dataset": ..., "gof": ... }`.

use std::path::Path;

use anyhow::{Context, Result};
use gp_datasets::DatasetConfig;
use gp_inference::GofConfig;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunConfig {
    pub dataset: DatasetConfig,
    pub gof: Option<GofConfig>,
}

impl RunConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("failed to read run config {}", path.display()))?;
        let cfg: RunConfig = serde_json::from_slice(&bytes)
            .with_context(|| format!("invalid run config {}", path.display()))?;
        cfg.dataset.validate()?;
        if let Some(gof) = &cfg.gof {
            gof.validate()?;
        }
        Ok(cfg)
    }

    pub fn require_gof(&self) -> Result<&GofConfig> {
        self.gof.as_ref().context("run config has no \"gof\" section")
    }
}
