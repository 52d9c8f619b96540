//! Configuration file loading and parsing.
//!
//! `.testgate.json` is discovered by walking up from the module directory;
//! every field has a default so an absent file simply means defaults. The
//! CSV-style keys of build-tool integrations are JSON arrays here.

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

pub const CONFIG_FILE_NAME: &str = ".testgate.json";

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GateConfig {
    pub detekt: DetektConfig,
    pub lint: LintConfig,
    pub sql_fts: SqlFtsConfig,
    pub harness: HarnessConfig,
    pub structure: StructureConfig,
    pub test_stack: TestStackConfig,
    pub fixtures: FixturesConfig,
    pub tests: TestsConfig,
    pub coverage: CoverageConfig,
    pub report_path: String,
    pub upload_enabled: bool,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            detekt: DetektConfig::default(),
            lint: LintConfig::default(),
            sql_fts: SqlFtsConfig::default(),
            harness: HarnessConfig::default(),
            structure: StructureConfig::default(),
            test_stack: TestStackConfig::default(),
            fixtures: FixturesConfig::default(),
            tests: TestsConfig::default(),
            coverage: CoverageConfig::default(),
            report_path: default_report_path(),
            upload_enabled: default_upload_enabled(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DetektConfig {
    pub tolerance_percent: u32,
    pub whitelist_patterns: Vec<String>,
    pub hard_fail_rule_ids: Vec<String>,
}

impl Default for DetektConfig {
    fn default() -> Self {
        Self {
            tolerance_percent: 10,
            whitelist_patterns: Vec::new(),
            hard_fail_rule_ids: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LintConfig {
    pub tolerance_percent: u32,
    pub whitelist_patterns: Vec<String>,
}

impl Default for LintConfig {
    fn default() -> Self {
        Self {
            tolerance_percent: 10,
            whitelist_patterns: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SqlFtsConfig {
    pub tolerance_percent: u32,
    pub whitelist_patterns: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HarnessConfig {
    pub root_package: String,
    pub harness_package: String,
    pub data_helpers: Vec<String>,
    pub sync_helpers: Vec<String>,
    pub ui_helpers: Vec<String>,
    pub shared_helpers: Vec<String>,
    pub whitelist_patterns: Vec<String>,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            root_package: "com.example".to_string(),
            harness_package: "com.example.testing".to_string(),
            data_helpers: vec!["com.example.testing.data".to_string()],
            sync_helpers: vec!["com.example.testing.sync".to_string()],
            ui_helpers: vec!["com.example.testing.ui".to_string()],
            shared_helpers: vec!["com.example.testing.common".to_string()],
            whitelist_patterns: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StructureConfig {
    pub harness_coordinate: String,
    pub instrumented_root_package: String,
    pub instrumented_allow_list: Vec<String>,
    pub instrumented_tolerance_percent: u32,
}

impl Default for StructureConfig {
    fn default() -> Self {
        Self {
            harness_coordinate: ":testing".to_string(),
            instrumented_root_package: "com.example".to_string(),
            instrumented_allow_list: Vec::new(),
            instrumented_tolerance_percent: 0,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TestStackConfig {
    pub whitelist_files: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FixturesConfig {
    pub tolerance_percent: u32,
    pub min_bytes: u64,
    pub max_bytes: u64,
    pub whitelist_patterns: Vec<String>,
}

impl Default for FixturesConfig {
    fn default() -> Self {
        Self {
            tolerance_percent: 10,
            min_bytes: 256,
            max_bytes: 8192,
            whitelist_patterns: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TestsConfig {
    pub tolerance_percent: u32,
    pub whitelist_patterns: Vec<String>,
    pub results_dir: String,
}

impl Default for TestsConfig {
    fn default() -> Self {
        Self {
            tolerance_percent: 10,
            whitelist_patterns: Vec::new(),
            results_dir: "build/test-results/test".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CoverageConfig {
    pub min_percent: u32,
    pub whitelist_patterns: Vec<String>,
}

impl Default for CoverageConfig {
    fn default() -> Self {
        Self {
            min_percent: 70,
            whitelist_patterns: Vec::new(),
        }
    }
}

fn default_report_path() -> String {
    "build/reports/testgate-results.json".to_string()
}

fn default_upload_enabled() -> bool {
    true
}

impl GateConfig {
    /// Validate numeric invariants. Every tolerance is a percentage.
    pub fn validate(&self) -> Result<()> {
        for (key, value) in [
            ("detekt.tolerancePercent", self.detekt.tolerance_percent),
            ("lint.tolerancePercent", self.lint.tolerance_percent),
            ("sqlFts.tolerancePercent", self.sql_fts.tolerance_percent),
            (
                "structure.instrumentedTolerancePercent",
                self.structure.instrumented_tolerance_percent,
            ),
            ("fixtures.tolerancePercent", self.fixtures.tolerance_percent),
            ("tests.tolerancePercent", self.tests.tolerance_percent),
            ("coverage.minPercent", self.coverage.min_percent),
        ] {
            if value > 100 {
                bail!("'{}' must be between 0 and 100, got {}", key, value);
            }
        }
        if self.fixtures.min_bytes > self.fixtures.max_bytes {
            bail!(
                "'fixtures.minBytes' ({}) must not exceed 'fixtures.maxBytes' ({})",
                self.fixtures.min_bytes,
                self.fixtures.max_bytes
            );
        }
        Ok(())
    }
}

pub fn default_config_json() -> Result<String> {
    serde_json::to_string_pretty(&GateConfig::default())
        .context("Failed to generate default config.")
}

pub fn find_config_file(start_dir: &Path) -> Option<PathBuf> {
    let mut current = start_dir.to_path_buf();

    loop {
        let config_path = current.join(CONFIG_FILE_NAME);
        if config_path.exists() {
            return Some(config_path);
        }
        if current.join(".git").exists() {
            return None;
        }
        if !current.pop() {
            return None;
        }
    }
}

/// Result of loading configuration.
pub struct ConfigLoadResult {
    pub config: GateConfig,
    /// True if config was loaded from a file, false if using defaults.
    pub from_file: bool,
}

pub fn load_config(start_dir: &Path) -> Result<ConfigLoadResult> {
    match find_config_file(start_dir) {
        Some(path) => {
            let content = fs::read_to_string(&path)?;
            let config: GateConfig = serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {:?}", path))?;
            config.validate()?;
            Ok(ConfigLoadResult {
                config,
                from_file: true,
            })
        }
        None => Ok(ConfigLoadResult {
            config: GateConfig::default(),
            from_file: false,
        }),
    }
}

#[cfg(test)]
mod tests {
    use std::fs::{self, File};

    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    use super::*;

    #[test]
    fn defaults_match_the_documented_table() {
        let config = GateConfig::default();
        assert_eq!(config.detekt.tolerance_percent, 10);
        assert_eq!(config.lint.tolerance_percent, 10);
        assert_eq!(config.sql_fts.tolerance_percent, 0);
        assert_eq!(config.structure.instrumented_tolerance_percent, 0);
        assert_eq!(config.fixtures.tolerance_percent, 10);
        assert_eq!(config.fixtures.min_bytes, 256);
        assert_eq!(config.fixtures.max_bytes, 8192);
        assert_eq!(config.tests.tolerance_percent, 10);
        assert_eq!(config.coverage.min_percent, 70);
        assert!(config.upload_enabled);
        assert_eq!(config.report_path, "build/reports/testgate-results.json");
    }

    #[test]
    fn parses_partial_config() {
        let json = r#"{
            "detekt": { "tolerancePercent": 5, "hardFailRuleIds": ["ForbiddenImport"] },
            "coverage": { "minPercent": 85 }
        }"#;
        let config: GateConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.detekt.tolerance_percent, 5);
        assert_eq!(config.detekt.hard_fail_rule_ids, vec!["ForbiddenImport"]);
        assert_eq!(config.coverage.min_percent, 85);
        // Untouched sections keep their defaults.
        assert_eq!(config.lint.tolerance_percent, 10);
        assert!(config.upload_enabled);
    }

    #[test]
    fn camel_case_keys_round_trip() {
        let json = serde_json::to_string(&GateConfig::default()).unwrap();
        assert!(json.contains("sqlFts"));
        assert!(json.contains("tolerancePercent"));
        assert!(json.contains("uploadEnabled"));
        assert!(json.contains("minBytes"));
        assert!(!json.contains("tolerance_percent"));
    }

    #[test]
    fn validate_rejects_out_of_range_tolerance() {
        let mut config = GateConfig::default();
        config.tests.tolerance_percent = 101;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("tests.tolerancePercent"));
    }

    #[test]
    fn validate_rejects_inverted_size_window() {
        let mut config = GateConfig::default();
        config.fixtures.min_bytes = 10_000;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("minBytes"));
    }

    #[test]
    fn find_config_walks_up() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("feature").join("app");
        fs::create_dir_all(&nested).unwrap();
        let config_path = dir.path().join(CONFIG_FILE_NAME);
        File::create(&config_path).unwrap();

        assert_eq!(find_config_file(&nested), Some(config_path));
    }

    #[test]
    fn find_config_stops_at_git_root() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join(".git")).unwrap();
        assert_eq!(find_config_file(dir.path()), None);
    }

    #[test]
    fn load_config_defaults_when_not_found() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join(".git")).unwrap();
        let result = load_config(dir.path()).unwrap();
        assert!(!result.from_file);
        assert_eq!(result.config.coverage.min_percent, 70);
    }

    #[test]
    fn load_config_from_file_validates() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join(".git")).unwrap();
        fs::write(
            dir.path().join(CONFIG_FILE_NAME),
            r#"{ "lint": { "tolerancePercent": 200 } }"#,
        )
        .unwrap();
        assert!(load_config(dir.path()).is_err());
    }

    #[test]
    fn default_config_json_parses_back() {
        let json = default_config_json().unwrap();
        let config: GateConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(config.harness.harness_package, "com.example.testing");
    }
}
