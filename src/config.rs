use anyhow::{Context, Result};
use directories::ProjectDirs;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use svdface_vision::ExtractorConfig;

pub static CONFIG_PATH: Lazy<&'static Path> = Lazy::new(|| {
    Path::new(option_env!("SVDFACE_CONFIG_PATH").unwrap_or("/usr/local/etc/svdface/config.toml"))
});

/// Fallback location of the identity store when the config names none.
pub static DEFAULT_STORE_PATH: Lazy<PathBuf> = Lazy::new(|| {
    ProjectDirs::from("org", "svdface", "svdface")
        .map(|dirs| dirs.data_dir().join("faces.bin"))
        .unwrap_or_else(|| PathBuf::from("faces.bin"))
});

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Side length of the square intensity matrix fed to the extractor.
    pub image_size: usize,
    /// Number of leading singular directions kept per descriptor (K).
    pub rank: usize,
    /// Fraction of the maximum score `rank` a match must reach.
    pub threshold_ratio: f64,
    pub store_path: Option<PathBuf>,
    pub camera: String,
    pub warmup_frames: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            image_size: 100,
            rank: 10,
            threshold_ratio: 0.8,
            store_path: None,
            camera: "/dev/video0".to_string(),
            warmup_frames: 5,
        }
    }
}

impl Config {
    /// Acceptance threshold on the subspace similarity score.
    pub fn threshold(&self) -> f64 {
        self.rank as f64 * self.threshold_ratio
    }

    pub fn extractor(&self) -> ExtractorConfig {
        ExtractorConfig {
            image_size: self.image_size,
            rank: self.rank,
        }
    }

    pub fn store_path(&self) -> PathBuf {
        self.store_path
            .clone()
            .unwrap_or_else(|| DEFAULT_STORE_PATH.clone())
    }

    pub fn validate(&self) -> crate::Result<()> {
        if self.image_size == 0 {
            return Err(crate::Error::Config("image_size must be positive".into()));
        }
        if self.rank == 0 || self.rank > self.image_size {
            return Err(crate::Error::Config(format!(
                "rank must be in 1..={}, got {}",
                self.image_size, self.rank
            )));
        }
        if !(0.0..=1.0).contains(&self.threshold_ratio) {
            return Err(crate::Error::Config(format!(
                "threshold_ratio must be in [0, 1], got {}",
                self.threshold_ratio
            )));
        }
        Ok(())
    }
}

pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let path = path.unwrap_or(&CONFIG_PATH);
    if !path.exists() {
        return Ok(Config::default());
    }
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading config at {}", path.display()))?;
    let cfg: Config =
        toml::from_str(&raw).with_context(|| format!("parsing config {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}

pub fn save_config(cfg: &Config, path: Option<&Path>) -> Result<()> {
    let path = path.unwrap_or(&CONFIG_PATH);
    let data = toml::to_string_pretty(cfg)?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, data)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_threshold() {
        let cfg = Config::default();
        assert!((cfg.threshold() - 8.0).abs() < 1e-12);
        assert_eq!(cfg.extractor(), ExtractorConfig::default());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let cfg: Config = toml::from_str("rank = 5\nthreshold_ratio = 0.5").unwrap();
        assert_eq!(cfg.rank, 5);
        assert_eq!(cfg.image_size, 100);
        assert!((cfg.threshold() - 2.5).abs() < 1e-12);
    }

    #[test]
    fn test_validate_rejects_bad_rank() {
        let cfg = Config {
            rank: 101,
            ..Config::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_missing_file_is_default() {
        let cfg = load_config(Some(Path::new("/nonexistent/svdface/config.toml"))).unwrap();
        assert_eq!(cfg.rank, 10);
    }
}
