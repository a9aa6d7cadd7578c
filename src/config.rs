//! Configuration of the model, training loop, data pipeline and hyperparameter sweep.
//!
//! Everything can be read from a TOML file; missing sections and fields take their
//! default values.

use log::warn;
use serde::{Deserialize, Serialize};
use std::{
    fs, io,
    path::{Path, PathBuf},
};
use thiserror::Error;


/// Network dimensions and optimizer hyperparameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub input_dim: usize,
    pub hidden_dim1: usize,
    pub out_dim: usize,
    /// L2 penalty added to the weight gradients (biases are not decayed).
    pub weight_decay: f64,
    pub learning_rate: f64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            input_dim: 3072,
            hidden_dim1: 2048,
            out_dim: 10,
            weight_decay: 0.0001,
            learning_rate: 0.01,
        }
    }
}

/// Training loop configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    pub batch_size: usize,
    pub epochs: usize,
    /// Seeds both parameter initialization and batch sampling. Random when absent.
    pub seed: Option<u64>,
    /// File the best model is written to. When absent, the model keeps its own
    /// checkpoint path (`DEFAULT_CHECKPOINT` unless set with `Model::with_checkpoint`).
    pub checkpoint: Option<PathBuf>,
    /// Show a progress bar for every epoch.
    pub progress: bool,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            batch_size: 64,
            epochs: 10,
            seed: None,
            checkpoint: None,
            progress: true,
        }
    }
}

/// Dataset location and train/validation split
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    pub dir: PathBuf,
    /// Share of the training set held out for validation.
    pub validation_fraction: f64,
    pub split_seed: u64,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("./data"),
            validation_fraction: 0.2,
            split_seed: 42,
        }
    }
}

/// Grid of hyperparameters tried by `sweep::run_sweep`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepConfig {
    pub hidden_dim1: Vec<usize>,
    pub learning_rate: Vec<f64>,
    pub weight_decay: Vec<f64>,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            hidden_dim1: vec![1024, 2048],
            learning_rate: vec![0.01, 0.001],
            weight_decay: vec![0.0, 0.0001],
        }
    }
}

/// Main configuration
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub model: ModelConfig,
    pub training: TrainingConfig,
    pub data: DataConfig,
    pub sweep: SweepConfig,
}

impl Config {
    /// Load configuration from file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_owned(),
            source,
        })?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration from file or use default
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        Self::load(path).unwrap_or_else(|err| {
            warn!("config load failed, using defaults: {}", err);
            Self::default()
        })
    }

    /// Save configuration to file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content).map_err(|source| ConfigError::Io {
            path: path.to_owned(),
            source,
        })
    }

    /// Rejects values the training code can't work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let model = &self.model;
        if model.input_dim == 0 || model.hidden_dim1 == 0 || model.out_dim == 0 {
            return Err(ConfigError::Invalid(format!(
                "layer sizes must be positive, but got {}x{}x{}",
                model.input_dim, model.hidden_dim1, model.out_dim
            )));
        }
        check_rates(&[model.learning_rate], &[model.weight_decay])?;

        if self.training.batch_size == 0 {
            return Err(ConfigError::Invalid("batch size must be positive".into()));
        }

        let fraction = self.data.validation_fraction;
        if !(fraction > 0.0 && fraction < 1.0) {
            return Err(ConfigError::Invalid(format!(
                "validation fraction must be in (0, 1), but got {}",
                fraction
            )));
        }

        let sweep = &self.sweep;
        if sweep.hidden_dim1.is_empty() || sweep.learning_rate.is_empty() || sweep.weight_decay.is_empty() {
            return Err(ConfigError::Invalid("sweep grid must not be empty".into()));
        }
        if sweep.hidden_dim1.contains(&0) {
            return Err(ConfigError::Invalid("sweep hidden sizes must be positive".into()));
        }
        check_rates(&sweep.learning_rate, &sweep.weight_decay)
    }
}

fn check_rates(learning_rates: &[f64], weight_decays: &[f64]) -> Result<(), ConfigError> {
    if let Some(lr) = learning_rates.iter().find(|&&lr| !(lr > 0.0)) {
        return Err(ConfigError::Invalid(format!(
            "learning rate must be positive, but got {}",
            lr
        )));
    }
    if let Some(wd) = weight_decays.iter().find(|&&wd| !(wd >= 0.0)) {
        return Err(ConfigError::Invalid(format!(
            "weight decay must not be negative, but got {}",
            wd
        )));
    }
    Ok(())
}

/// Error structure for configuration loading
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Can't access config {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Can't parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Can't write config: {0}")]
    Write(#[from] toml::ser::Error),
    #[error("Invalid config: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = Config::default();
        assert_eq!(config.model.input_dim, 3072);
        assert_eq!(config.model.hidden_dim1, 2048);
        assert_eq!(config.training.batch_size, 64);
        assert_eq!(config.training.checkpoint, None);
        assert_eq!(config.data.split_seed, 42);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let config: Config = toml::from_str(
            r#"
            [model]
            hidden_dim1 = 128
            learning_rate = 0.05

            [training]
            epochs = 3
            seed = 9
            "#,
        )
        .unwrap();
        assert_eq!(config.model.hidden_dim1, 128);
        assert_eq!(config.model.input_dim, 3072);
        assert_eq!(config.training.epochs, 3);
        assert_eq!(config.training.seed, Some(9));
        assert_eq!(config.training.batch_size, 64);
        assert_eq!(config.sweep, SweepConfig::default());
    }

    #[test]
    fn save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let mut config = Config::default();
        config.sweep.hidden_dim1 = vec![16, 32];
        config.training.seed = Some(1);
        config.training.checkpoint = Some(dir.path().join("best.bin"));
        config.save(&path).unwrap();

        assert_eq!(Config::load(&path).unwrap(), config);
    }

    #[test]
    fn missing_file_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");
        assert!(matches!(Config::load(&path), Err(ConfigError::Io { .. })));
        assert_eq!(Config::load_or_default(&path), Config::default());
    }

    #[test]
    fn validation() {
        let mut config = Config::default();
        config.model.hidden_dim1 = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.data.validation_fraction = 1.0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.sweep.weight_decay = vec![0.0, -1.0];
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.model.learning_rate = 0.0;
        assert!(config.validate().is_err());
    }
}
