//! stroke-risk entrypoint: train a model from CSV, serve predictions over
//! NDJSON, or inspect a saved artifact. Everything runs locally.

use clap::{Parser, Subcommand};
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use stroke_risk::{
    config::{ClassWeight, ServiceConfig},
    dataset,
    logging::{PredictionLog, StructuredLogger},
    model,
    service::{render, PredictionService},
    trainer::{train, CancellationToken},
};
use tracing::{info, warn};

type CliResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

#[derive(Parser)]
#[command(name = "stroke-risk")]
#[command(version)]
#[command(about = "Local stroke-risk classifier", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (falls back to STROKE_RISK_CONFIG_PATH, then config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Fit a model on a labeled CSV and write the artifact
    Train {
        /// CSV with the public stroke dataset columns
        #[arg(long)]
        data: PathBuf,

        /// Where to write the model artifact
        #[arg(long)]
        out: PathBuf,

        #[arg(long)]
        seed: Option<u64>,

        #[arg(long)]
        eval_fraction: Option<f64>,

        /// none or balanced
        #[arg(long)]
        class_weight: Option<ClassWeight>,

        #[arg(long)]
        max_iterations: Option<usize>,

        #[arg(long)]
        timeout_secs: Option<u64>,
    },

    /// Predict for NDJSON requests, one response per line
    Predict {
        /// Model artifact (defaults to model_path from config)
        #[arg(long)]
        model: Option<PathBuf>,

        /// Request file (stdin if not specified)
        #[arg(long)]
        input: Option<PathBuf>,

        /// Append a JSON audit line per request to this file
        #[arg(long)]
        audit: Option<PathBuf>,
    },

    /// Print schema, feature weights and training report of an artifact
    Inspect {
        #[arg(long)]
        model: PathBuf,
    },
}

fn config_path(cli: &Cli) -> PathBuf {
    cli.config.clone().unwrap_or_else(|| {
        std::env::var("STROKE_RISK_CONFIG_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config.json"))
    })
}

#[allow(clippy::too_many_arguments)]
fn run_train(
    mut config: ServiceConfig,
    data: &Path,
    out: &Path,
    seed: Option<u64>,
    eval_fraction: Option<f64>,
    class_weight: Option<ClassWeight>,
    max_iterations: Option<usize>,
    timeout_secs: Option<u64>,
) -> CliResult<()> {
    let training = &mut config.training;
    if let Some(v) = seed {
        training.seed = v;
    }
    if let Some(v) = eval_fraction {
        training.eval_fraction = v;
    }
    if let Some(v) = class_weight {
        training.class_weight = v;
    }
    if let Some(v) = max_iterations {
        training.max_iterations = v;
    }
    if timeout_secs.is_some() {
        training.timeout_secs = timeout_secs;
    }

    let samples = dataset::load_csv(data)?;

    let cancel = CancellationToken::new();
    let handler_token = cancel.clone();
    if let Err(e) = ctrlc::set_handler(move || handler_token.cancel()) {
        warn!(error = %e, "could not install Ctrl+C handler");
    }

    let params = train(&samples, &config.training, &cancel)?;
    model::save(&params, out)?;

    if let Some(report) = &params.report {
        println!("{}", serde_json::to_string_pretty(report)?);
    }
    info!(model_id = %params.model_id, out = %out.display(), "training complete");
    Ok(())
}

fn run_predict(
    mut config: ServiceConfig,
    model_path: Option<PathBuf>,
    input: Option<PathBuf>,
    audit: Option<PathBuf>,
) -> CliResult<()> {
    if let Some(p) = model_path {
        config.model_path = p;
    }
    let service = PredictionService::from_config(&config)?;

    let reader: Box<dyn BufRead> = match input {
        Some(p) => Box::new(BufReader::new(File::open(p)?)),
        None => Box::new(BufReader::new(io::stdin())),
    };
    let mut audit = match audit {
        Some(p) => Some(BufWriter::new(
            std::fs::OpenOptions::new().create(true).append(true).open(p)?,
        )),
        None => None,
    };
    let stdout = io::stdout();
    let mut out = stdout.lock();

    let model_id = service.current_model().model_id.clone();
    let (mut ok, mut failed) = (0usize, 0usize);
    for (i, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let outcome = service.predict_json(&line);
        if outcome.is_ok() {
            ok += 1;
        } else {
            failed += 1;
        }
        writeln!(out, "{}", render(&outcome))?;
        if let Some(w) = audit.as_mut() {
            StructuredLogger::emit_json(&PredictionLog::new(&model_id, i + 1, &outcome), w)?;
        }
    }
    out.flush()?;
    if let Some(w) = audit.as_mut() {
        w.flush()?;
    }
    info!(ok, failed, "predict finished");
    Ok(())
}

fn run_inspect(path: &Path) -> CliResult<()> {
    let params = model::load(path)?;
    let weights: Vec<serde_json::Value> = params
        .scheme
        .feature_names()
        .into_iter()
        .zip(&params.weights)
        .map(|(name, w)| serde_json::json!({ "feature": name, "weight": w }))
        .collect();
    let summary = serde_json::json!({
        "model_id": params.model_id,
        "trained_at": params.trained_at,
        "format_version": model::FORMAT_VERSION,
        "schema_version": params.schema_version,
        "scheme_fingerprint": params.scheme.fingerprint()?,
        "bmi_fill": params.scheme.bmi_fill,
        "scalers": params.scheme.scalers,
        "bias": params.bias,
        "weights": weights,
        "report": params.report,
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

fn main() -> CliResult<()> {
    let cli = Cli::parse();
    let config = ServiceConfig::load(&config_path(&cli))?;

    StructuredLogger::init(config.log.json, &config.log.level);

    match cli.command {
        Commands::Train {
            data,
            out,
            seed,
            eval_fraction,
            class_weight,
            max_iterations,
            timeout_secs,
        } => run_train(
            config,
            &data,
            &out,
            seed,
            eval_fraction,
            class_weight,
            max_iterations,
            timeout_secs,
        ),
        Commands::Predict { model, input, audit } => run_predict(config, model, input, audit),
        Commands::Inspect { model } => run_inspect(&model),
    }
}
