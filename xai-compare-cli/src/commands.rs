//! CLI subcommand handlers.

use crate::CompareArgs;
use crate::Commands;
use crate::ConfigAction;
use crate::OutputFormat;
use ndarray::Array1;
use std::path::Path;
use std::sync::Arc;
use xai_compare_core::config::{ConfigOverrides, XaiConfig, load_config, workspace_config_path};
use xai_compare_core::metrics::Scorer;
use xai_compare_core::{
    ComparisonReport, Dataset, ExplainerFactory, ExplainerKind, ExplainerSelection,
    FeatureMatrix, LinearModel, Mode, Model, ModelCategory, OutcomeStatus, run_and_report,
    run_and_report_concurrent,
};

/// Penalty of the reference ridge model fit before comparing.
const REFERENCE_ALPHA: f64 = 1e-3;
const DEFAULT_SPLIT_SEED: u64 = 42;

/// Handle a CLI subcommand.
pub async fn handle_command(command: Commands, workspace: &Path) -> anyhow::Result<()> {
    match command {
        Commands::Compare(args) => handle_compare(args, workspace).await,
        Commands::List => handle_list(),
        Commands::Config { action } => handle_config(action, workspace).await,
    }
}

async fn handle_config(action: ConfigAction, workspace: &Path) -> anyhow::Result<()> {
    match action {
        ConfigAction::Init => {
            let config_path = workspace_config_path(workspace);
            if let Some(config_dir) = config_path.parent() {
                std::fs::create_dir_all(config_dir)?;
            }

            if config_path.exists() {
                println!(
                    "Configuration file already exists at: {}",
                    config_path.display()
                );
                return Ok(());
            }

            let default_config = XaiConfig::default();
            let toml_str = toml::to_string_pretty(&default_config)?;
            std::fs::write(&config_path, &toml_str)?;
            println!(
                "Created default configuration at: {}",
                config_path.display()
            );
            Ok(())
        }
        ConfigAction::Show => {
            let config = load_config(Some(workspace), None)?;
            let toml_str = toml::to_string_pretty(&config)?;
            println!("{}", toml_str);
            Ok(())
        }
    }
}

fn handle_list() -> anyhow::Result<()> {
    println!("Available explainers:");
    for kind in ExplainerKind::ALL {
        let scope = if kind.supports_local() {
            "global, local"
        } else {
            "global"
        };
        println!("  {:<12} {}", kind.as_str(), scope);
    }
    Ok(())
}

async fn handle_compare(args: CompareArgs, workspace: &Path) -> anyhow::Result<()> {
    let format = args.format;
    let outcome = compare(args, workspace).await?;

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&outcome.report)?);
        }
        OutputFormat::Table => {
            println!(
                "Reference model: {} ({} on test split: {:.4})",
                outcome.model_name, outcome.scorer, outcome.test_score
            );
            println!();
            if outcome.report.table.is_empty() {
                println!("No explainer produced a result.");
            } else {
                print!("{}", outcome.report.table);
            }
            for failure in outcome.report.failures() {
                match &failure.status {
                    OutcomeStatus::Unrecognized => {
                        println!("  skipped {}: unknown explainer", failure.explainer)
                    }
                    OutcomeStatus::Failed(reason) => {
                        println!("  skipped {}: {}", failure.explainer, reason)
                    }
                    OutcomeStatus::Succeeded => {}
                }
            }
        }
    }
    Ok(())
}

/// Everything a compare run produced.
#[derive(Debug)]
struct CompareOutcome {
    report: ComparisonReport,
    model_name: String,
    scorer: &'static str,
    test_score: f64,
}

async fn compare(args: CompareArgs, workspace: &Path) -> anyhow::Result<CompareOutcome> {
    let dataset = Dataset::from_path(&args.data)?;
    let overrides = ConfigOverrides {
        mode: args.mode.or(dataset.mode),
        seed: args.seed,
        concurrent: args.concurrent.then_some(true),
    };
    let config = load_config(Some(workspace), Some(&overrides))?;
    let mode = config.mode;
    let concurrent = config.orchestration.concurrent;

    let split = dataset.split(args.test_size, args.seed.unwrap_or(DEFAULT_SPLIT_SEED))?;
    let model = reference_model(mode, &split.x_train, &split.y_train)?;
    let scorer = Scorer::for_mode(mode);
    let test_score = scorer.score(&split.y_test, &model.predict(&split.x_test)?);
    tracing::info!(
        model = model.type_name(),
        %mode,
        scorer = scorer.name(),
        test_score,
        train_rows = split.x_train.n_rows(),
        test_rows = split.x_test.n_rows(),
        "reference model fitted"
    );
    let model_name = model.type_name().to_string();

    let factory = ExplainerFactory::new(
        model,
        split.x_train,
        split.x_test,
        split.y_train,
        split.y_test,
        mode,
    )?
    .with_settings(config.explainers);

    let selection = if args.explainers.is_empty() {
        ExplainerSelection::Default
    } else {
        ExplainerSelection::Many(args.explainers)
    };

    let report = if concurrent {
        let data = Arc::new(factory.x_test().clone());
        run_and_report_concurrent(Arc::new(factory), data, selection).await
    } else {
        run_and_report(&factory, factory.x_test(), selection)
    };

    Ok(CompareOutcome {
        report,
        model_name,
        scorer: scorer.name(),
        test_score,
    })
}

fn reference_model(
    mode: Mode,
    x: &FeatureMatrix,
    y: &Array1<f64>,
) -> anyhow::Result<Arc<dyn Model>> {
    let regression = LinearModel::fit(x, y, REFERENCE_ALPHA)?;
    Ok(match mode {
        Mode::Regression => Arc::new(regression),
        Mode::Classification => Arc::new(NearestLabelClassifier::new(regression, y)),
    })
}

/// Linear scores snapped to the nearest label seen in training.
struct NearestLabelClassifier {
    scores: LinearModel,
    labels: Vec<f64>,
}

impl NearestLabelClassifier {
    fn new(scores: LinearModel, y: &Array1<f64>) -> Self {
        let mut labels: Vec<f64> = y.iter().copied().filter(|v| v.is_finite()).collect();
        labels.sort_by(f64::total_cmp);
        labels.dedup();
        Self { scores, labels }
    }

    fn nearest(&self, score: f64) -> f64 {
        self.labels
            .iter()
            .copied()
            .min_by(|a, b| (a - score).abs().total_cmp(&(b - score).abs()))
            .unwrap_or(score)
    }
}

impl Model for NearestLabelClassifier {
    fn predict(&self, x: &FeatureMatrix) -> xai_compare_core::Result<Array1<f64>> {
        Ok(self.scores.predict(x)?.mapv(|s| self.nearest(s)))
    }

    fn type_name(&self) -> &str {
        "LinearClassifier"
    }

    fn category(&self) -> ModelCategory {
        ModelCategory::Linear
    }
}
