// Optional runtime configuration. An absent `config.json` means defaults;
// a present but malformed one is a structural error the user should see.
use crate::error::ReportError;
use crate::rank::TieBreak;
use crate::resilience::ExtremityBands;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub data_dir: String,
    pub crop_file: String,
    pub pollution_file: String,
    pub temperature_file: String,
    pub weather_file: String,
    /// Rank-1 tie policy: "lexicographic" (default) or "fail".
    pub tie_break: TieBreak,
    /// Explicit extremity bands. When absent, the resilience report
    /// prompts for one of the named presets instead of silently picking
    /// one.
    pub resilience_bands: Option<ExtremityBands>,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            data_dir: "data".to_string(),
            crop_file: "crop_data.csv".to_string(),
            pollution_file: "pollution_data.csv".to_string(),
            temperature_file: "temperature_data.csv".to_string(),
            weather_file: "weather_events.csv".to_string(),
            tie_break: TieBreak::Lexicographic,
            resilience_bands: None,
        }
    }
}

impl AppConfig {
    pub fn load(path: &str) -> Result<AppConfig, ReportError> {
        if !Path::new(path).exists() {
            return Ok(AppConfig::default());
        }
        let text = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    pub fn crop_path(&self) -> PathBuf {
        Path::new(&self.data_dir).join(&self.crop_file)
    }

    pub fn pollution_path(&self) -> PathBuf {
        Path::new(&self.data_dir).join(&self.pollution_file)
    }

    pub fn temperature_path(&self) -> PathBuf {
        Path::new(&self.data_dir).join(&self.temperature_file)
    }

    pub fn weather_path(&self) -> PathBuf {
        Path::new(&self.data_dir).join(&self.weather_file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let config = AppConfig::load("definitely_not_here.json").unwrap();
        assert_eq!(config.data_dir, "data");
        assert_eq!(config.tie_break, TieBreak::Lexicographic);
        assert!(config.resilience_bands.is_none());
    }

    #[test]
    fn partial_config_overrides_only_named_fields() {
        let config: AppConfig =
            serde_json::from_str(r#"{ "data_dir": "elsewhere", "tie_break": "fail" }"#).unwrap();
        assert_eq!(config.data_dir, "elsewhere");
        assert_eq!(config.tie_break, TieBreak::Fail);
        assert_eq!(config.crop_file, "crop_data.csv");
    }

    #[test]
    fn explicit_bands_parse_with_open_ends() {
        let config: AppConfig = serde_json::from_str(
            r#"{ "resilience_bands": {
                "pollution": { "low": null, "high": 16.0 },
                "temperature": { "low": 20.0, "high": 80.0 },
                "precipitation": { "low": 0.01, "high": 0.16 }
            } }"#,
        )
        .unwrap();
        let bands = config.resilience_bands.unwrap();
        assert_eq!(bands.pollution.low, None);
        assert_eq!(bands.pollution.high, Some(16.0));
    }
}
