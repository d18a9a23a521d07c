use std::path::{Path, PathBuf};

use crate::impute::ImputationStrategy;

pub const DEFAULT_MATCHES_CSV: &str = "Fifa_world_cup_matches.csv";
pub const DEFAULT_WEATHER_CSV: &str = "qatar_weather.csv";

pub const MISSINGNESS_FILE: &str = "missingness_summary.csv";
pub const CLEANED_FILE: &str = "cleaned_fifa_weather.csv";
pub const ADVANCED_FILE: &str = "cleaned_fifa_weather_advanced.csv";
pub const REPORT_FILE: &str = "analysis_report.json";

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub matches_path: PathBuf,
    pub weather_path: PathBuf,
    pub out_dir: PathBuf,
    pub imputation: ImputationStrategy,
    pub xlsx_path: Option<PathBuf>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            matches_path: PathBuf::from(DEFAULT_MATCHES_CSV),
            weather_path: PathBuf::from(DEFAULT_WEATHER_CSV),
            out_dir: PathBuf::from("."),
            imputation: ImputationStrategy::Linear,
            xlsx_path: None,
        }
    }
}

impl PipelineConfig {
    pub fn missingness_path(&self) -> PathBuf {
        self.out_dir.join(MISSINGNESS_FILE)
    }

    pub fn cleaned_path(&self) -> PathBuf {
        self.out_dir.join(CLEANED_FILE)
    }

    pub fn advanced_path(&self) -> PathBuf {
        self.out_dir.join(ADVANCED_FILE)
    }

    pub fn report_path(&self) -> PathBuf {
        self.out_dir.join(REPORT_FILE)
    }
}

#[derive(Debug, Clone)]
pub struct DashboardConfig {
    pub data_path: PathBuf,
    pub missingness_path: PathBuf,
}

impl DashboardConfig {
    /// Resolves artifact paths from `WC22_DATA_CSV` / `WC22_MISSINGNESS_CSV`, falling back to
    /// the pipeline's default output names in the working directory.
    pub fn from_env() -> Self {
        let data_path = env_path("WC22_DATA_CSV").unwrap_or_else(|| PathBuf::from(ADVANCED_FILE));
        let missingness_path =
            env_path("WC22_MISSINGNESS_CSV").unwrap_or_else(|| PathBuf::from(MISSINGNESS_FILE));
        Self {
            data_path,
            missingness_path,
        }
    }

    pub fn in_dir(dir: &Path) -> Self {
        Self {
            data_path: dir.join(ADVANCED_FILE),
            missingness_path: dir.join(MISSINGNESS_FILE),
        }
    }
}

fn env_path(key: &str) -> Option<PathBuf> {
    std::env::var(key)
        .ok()
        .filter(|val| !val.trim().is_empty())
        .map(PathBuf::from)
}
