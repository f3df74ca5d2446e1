//! Configuration system for xai-compare.
//!
//! Uses `figment` for layered configuration: defaults -> config file -> environment -> overrides.
//! Configuration is loaded from `~/.config/xai-compare/config.toml` and/or
//! `.xai-compare/config.toml` in the workspace directory.

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::explainers::ExplainerKind;
use crate::explainers::shap::BinaryClassPolicy;
use crate::model::Mode;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct XaiConfig {
    /// Task of the model being explained.
    #[serde(default)]
    pub mode: Mode,
    /// Explainer selection and per-explainer settings.
    #[serde(default)]
    pub explainers: ExplainerSettings,
    /// How the comparison runs.
    #[serde(default)]
    pub orchestration: OrchestrationConfig,
}

/// Settings the factory hands to each adapter it builds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExplainerSettings {
    /// Explainers run when the caller doesn't name any.
    #[serde(default = "default_explainers")]
    pub default_explainers: Vec<ExplainerKind>,
    #[serde(default)]
    pub shap: ShapSettings,
    #[serde(default)]
    pub permutation: PermutationSettings,
    #[serde(default)]
    pub lime: LimeSettings,
    #[serde(default)]
    pub ebm: EbmSettings,
    #[serde(default)]
    pub mimic: MimicSettings,
}

impl Default for ExplainerSettings {
    fn default() -> Self {
        Self {
            default_explainers: default_explainers(),
            shap: ShapSettings::default(),
            permutation: PermutationSettings::default(),
            lime: LimeSettings::default(),
            ebm: EbmSettings::default(),
            mimic: MimicSettings::default(),
        }
    }
}

fn default_explainers() -> Vec<ExplainerKind> {
    ExplainerKind::ALL.to_vec()
}

/// SHAP adapter settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShapSettings {
    /// Size of the k-means background summary for non-linear strategies.
    #[serde(default = "default_background_clusters")]
    pub background_clusters: usize,
    /// Which attributions to report for two-class models.
    #[serde(default)]
    pub binary_class_policy: BinaryClassPolicy,
    /// Permutation samples per row for the kernel strategy.
    #[serde(default = "default_kernel_samples")]
    pub kernel_samples: usize,
    /// Feature count above which exact enumeration refuses to run. Values
    /// above 16 are treated as 16.
    #[serde(default = "default_max_exact_features")]
    pub max_exact_features: usize,
    /// Seed for background summarization and sampling.
    #[serde(default)]
    pub seed: u64,
}

impl Default for ShapSettings {
    fn default() -> Self {
        Self {
            background_clusters: default_background_clusters(),
            binary_class_policy: BinaryClassPolicy::default(),
            kernel_samples: default_kernel_samples(),
            max_exact_features: default_max_exact_features(),
            seed: 0,
        }
    }
}

fn default_background_clusters() -> usize {
    5
}

fn default_kernel_samples() -> usize {
    200
}

fn default_max_exact_features() -> usize {
    12
}

/// Permutation-importance settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PermutationSettings {
    /// Shuffles per feature.
    #[serde(default = "default_num_permutations")]
    pub num_permutations: usize,
    /// Seed for the shuffles; fresh entropy when unset.
    #[serde(default)]
    pub random_state: Option<u64>,
}

impl Default for PermutationSettings {
    fn default() -> Self {
        Self {
            num_permutations: default_num_permutations(),
            random_state: None,
        }
    }
}

fn default_num_permutations() -> usize {
    5
}

/// LIME settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimeSettings {
    /// Perturbed samples drawn around each row.
    #[serde(default = "default_lime_samples")]
    pub num_samples: usize,
    /// Proximity kernel width; `0.75 * sqrt(features)` when unset.
    #[serde(default)]
    pub kernel_width: Option<f64>,
    /// Ridge penalty of the local surrogate.
    #[serde(default = "default_lime_alpha")]
    pub alpha: f64,
    #[serde(default)]
    pub random_state: Option<u64>,
}

impl Default for LimeSettings {
    fn default() -> Self {
        Self {
            num_samples: default_lime_samples(),
            kernel_width: None,
            alpha: default_lime_alpha(),
            random_state: None,
        }
    }
}

fn default_lime_samples() -> usize {
    500
}

fn default_lime_alpha() -> f64 {
    1.0
}

/// Explainable boosting machine settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EbmSettings {
    /// Boosting rounds; each round visits every feature once.
    #[serde(default = "default_ebm_rounds")]
    pub rounds: usize,
    /// Maximum quantile bins per feature.
    #[serde(default = "default_ebm_bins")]
    pub max_bins: usize,
    #[serde(default = "default_ebm_learning_rate")]
    pub learning_rate: f64,
}

impl Default for EbmSettings {
    fn default() -> Self {
        Self {
            rounds: default_ebm_rounds(),
            max_bins: default_ebm_bins(),
            learning_rate: default_ebm_learning_rate(),
        }
    }
}

fn default_ebm_rounds() -> usize {
    100
}

fn default_ebm_bins() -> usize {
    16
}

fn default_ebm_learning_rate() -> f64 {
    0.1
}

/// Global surrogate (mimic) settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MimicSettings {
    /// Ridge penalty of the surrogate.
    #[serde(default = "default_mimic_alpha")]
    pub alpha: f64,
}

impl Default for MimicSettings {
    fn default() -> Self {
        Self {
            alpha: default_mimic_alpha(),
        }
    }
}

fn default_mimic_alpha() -> f64 {
    1e-3
}

/// Orchestration settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrchestrationConfig {
    /// Run explainers on blocking worker threads instead of one after another.
    #[serde(default)]
    pub concurrent: bool,
}

/// Values given explicitly by the caller, such as command-line flags.
///
/// Unset fields leave the lower configuration layers untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigOverrides {
    pub mode: Option<Mode>,
    /// Seed for SHAP and for the permutation and LIME random states.
    pub seed: Option<u64>,
    pub concurrent: Option<bool>,
}

impl ConfigOverrides {
    /// The set fields as a partial configuration tree.
    fn to_value(&self) -> Value {
        let mut root = Map::new();
        if let Some(mode) = self.mode {
            root.insert("mode".to_string(), json!(mode));
        }
        if let Some(seed) = self.seed {
            root.insert(
                "explainers".to_string(),
                json!({
                    "shap": { "seed": seed },
                    "permutation": { "random_state": seed },
                    "lime": { "random_state": seed },
                }),
            );
        }
        if let Some(concurrent) = self.concurrent {
            root.insert(
                "orchestration".to_string(),
                json!({ "concurrent": concurrent }),
            );
        }
        Value::Object(root)
    }
}

/// Load configuration from defaults, files, environment and overrides.
pub fn load_config(
    workspace: Option<&Path>,
    overrides: Option<&ConfigOverrides>,
) -> Result<XaiConfig> {
    let mut figment = Figment::from(Serialized::defaults(XaiConfig::default()));

    // User-level config
    if let Some(user_config) = user_config_path() {
        if user_config.exists() {
            figment = figment.merge(Toml::file(&user_config));
        }
    }

    // Workspace-level config
    if let Some(ws) = workspace {
        let ws_config = workspace_config_path(ws);
        if ws_config.exists() {
            figment = figment.merge(Toml::file(&ws_config));
        }
    }

    // Environment variables (XAI_COMPARE_MODE, XAI_COMPARE_EXPLAINERS__PERMUTATION__NUM_PERMUTATIONS, etc.)
    figment = figment.merge(Env::prefixed("XAI_COMPARE_").split("__"));

    // Explicit overrides
    if let Some(overrides) = overrides {
        figment = figment.merge(Serialized::defaults(overrides.to_value()));
    }

    Ok(figment.extract().map_err(Box::new)?)
}

/// Check whether a config file exists at the user or workspace level.
pub fn config_exists(workspace: Option<&Path>) -> bool {
    if user_config_path().is_some_and(|p| p.exists()) {
        return true;
    }
    workspace.is_some_and(|ws| workspace_config_path(ws).exists())
}

/// `<workspace>/.xai-compare/config.toml`
pub fn workspace_config_path(workspace: &Path) -> PathBuf {
    workspace.join(".xai-compare").join("config.toml")
}

fn user_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("dev", "xai-compare", "xai-compare")
        .map(|dirs| dirs.config_dir().join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = XaiConfig::default();
        assert_eq!(config.mode, Mode::Regression);
        assert_eq!(config.explainers.default_explainers, ExplainerKind::ALL.to_vec());
        assert_eq!(config.explainers.shap.background_clusters, 5);
        assert_eq!(config.explainers.permutation.num_permutations, 5);
        assert_eq!(config.explainers.permutation.random_state, None);
        assert_eq!(
            config.explainers.shap.binary_class_policy,
            BinaryClassPolicy::NegativeClass
        );
        assert!(!config.orchestration.concurrent);
    }

    #[test]
    fn test_config_serialization_roundtrip() {
        let mut config = XaiConfig::default();
        config.explainers.permutation.random_state = Some(7);
        let toml_str = toml::to_string(&config).unwrap();
        let deserialized: XaiConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(deserialized.explainers.permutation.random_state, Some(7));
        assert_eq!(
            deserialized.explainers.default_explainers,
            config.explainers.default_explainers
        );
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config: XaiConfig = toml::from_str(
            r#"
mode = "classification"

[explainers]
default_explainers = ["shap", "permutation"]
"#,
        )
        .unwrap();
        assert_eq!(config.mode, Mode::Classification);
        assert_eq!(
            config.explainers.default_explainers,
            vec![ExplainerKind::Shap, ExplainerKind::Permutation]
        );
        assert_eq!(config.explainers.lime.num_samples, 500);
    }

    #[test]
    fn test_load_config_with_overrides() {
        let overrides = ConfigOverrides {
            mode: Some(Mode::Classification),
            seed: Some(9),
            concurrent: Some(true),
        };

        let config = load_config(None, Some(&overrides)).unwrap();
        assert_eq!(config.mode, Mode::Classification);
        assert_eq!(config.explainers.shap.seed, 9);
        assert_eq!(config.explainers.permutation.random_state, Some(9));
        assert_eq!(config.explainers.lime.random_state, Some(9));
        assert!(config.orchestration.concurrent);
    }

    #[test]
    fn test_overrides_keep_workspace_values() {
        let dir = tempfile::tempdir().unwrap();
        let config_dir = dir.path().join(".xai-compare");
        std::fs::create_dir_all(&config_dir).unwrap();
        std::fs::write(
            config_dir.join("config.toml"),
            r#"
mode = "classification"

[explainers.shap]
background_clusters = 3

[explainers.permutation]
num_permutations = 20
"#,
        )
        .unwrap();

        let overrides = ConfigOverrides {
            seed: Some(4),
            ..ConfigOverrides::default()
        };
        let config = load_config(Some(dir.path()), Some(&overrides)).unwrap();
        assert_eq!(config.mode, Mode::Classification);
        assert_eq!(config.explainers.shap.background_clusters, 3);
        assert_eq!(config.explainers.shap.seed, 4);
        assert_eq!(config.explainers.permutation.num_permutations, 20);
        assert_eq!(config.explainers.permutation.random_state, Some(4));
    }

    #[test]
    fn test_invalid_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let config_dir = dir.path().join(".xai-compare");
        std::fs::create_dir_all(&config_dir).unwrap();
        std::fs::write(config_dir.join("config.toml"), "mode = \"sideways\"\n").unwrap();

        let err = load_config(Some(dir.path()), None).unwrap_err();
        assert!(matches!(err, crate::error::XaiError::Config(_)), "{}", err);
    }

    #[test]
    fn test_load_config_from_workspace() {
        let dir = tempfile::tempdir().unwrap();
        let config_dir = dir.path().join(".xai-compare");
        std::fs::create_dir_all(&config_dir).unwrap();
        std::fs::write(
            config_dir.join("config.toml"),
            r#"
[explainers.shap]
background_clusters = 3
binary_class_policy = "mean_absolute"

[orchestration]
concurrent = true
"#,
        )
        .unwrap();

        assert!(config_exists(Some(dir.path())));
        let config = load_config(Some(dir.path()), None).unwrap();
        assert_eq!(config.explainers.shap.background_clusters, 3);
        assert_eq!(
            config.explainers.shap.binary_class_policy,
            BinaryClassPolicy::MeanAbsolute
        );
        assert!(config.orchestration.concurrent);
        assert_eq!(config.explainers.shap.kernel_samples, 200);
    }
}
