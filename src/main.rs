//! Prepayment Harness - entry point
//!
//! Stages run in order, each reading what the previous one persisted:
//!
//! ```text
//! ┌──────────┐    ┌──────────┐    ┌──────────┐    ┌──────────┐
//! │ Generate │───▶│  Prepay  │───▶│ Deliver  │───▶│  Export  │
//! │ (labels) │    │(tracking)│    │ (cycles) │    │  (CSV)   │
//! └──────────┘    └──────────┘    └──────────┘    └──────────┘
//! ```
//!
//! With no stage flag every stage runs.

use anyhow::{Context, Result};
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::path::Path;

use prepay_harness::case::{CaseRecordSynthesizer, CaseRecords};
use prepay_harness::config::AppConfig;
use prepay_harness::identifier::{IdentifierMint, IdentifierStore, JsonFileStore};
use prepay_harness::{
    DeliveryInput, DeliveryStage, DirTemplateProvider, HttpSubmitter, PrepaymentStage,
    ResponseShape, TrackingBook, assign_cases,
};

const DELIVERY_INPUT_FILE: &str = "delivery_input.json";

fn get_env() -> String {
    let args: Vec<String> = std::env::args().collect();
    for i in 0..args.len() {
        if (args[i] == "--env" || args[i] == "-e") && i + 1 < args.len() {
            return args[i + 1].clone();
        }
    }
    "dev".to_string()
}

fn get_input_file() -> Option<String> {
    let args: Vec<String> = std::env::args().collect();
    for i in 0..args.len() {
        if args[i] == "--input" && i + 1 < args.len() {
            return Some(args[i + 1].clone());
        }
    }
    None
}

fn has_flag(flag: &str) -> bool {
    std::env::args().any(|a| a == flag)
}

#[tokio::main]
async fn main() -> Result<()> {
    let env = get_env();
    let input_file = get_input_file();
    let mut generate = has_flag("--generate");
    let mut prepay = has_flag("--prepay");
    let mut deliver = has_flag("--deliver");
    if !(generate || prepay || deliver) {
        generate = true;
        prepay = true;
        deliver = true;
    }

    let config = AppConfig::load(&env).context("Failed to load configuration")?;
    let _log_guard = prepay_harness::logging::init_logging(&config);

    tracing::info!(
        revision = env!("HARNESS_REVISION"),
        generate,
        prepay,
        deliver,
        "Starting prepayment harness in {} mode",
        env
    );

    let mut store = JsonFileStore::open(&config.paths.identifier_pool)
        .context("Failed to open identifier pool")?;
    if has_flag("--reset-pool") {
        store.reset().context("Failed to reset identifier pool")?;
        tracing::info!(path = %store.path().display(), "Identifier pool reset");
    }
    tracing::info!(identifiers = store.len(), "Identifier pool loaded");
    let mut mint = IdentifierMint::with_max_attempts(store, config.harness.mint_max_attempts);
    let mut rng = StdRng::from_entropy();

    if generate {
        let synthesizer = CaseRecordSynthesizer::from_config(&config.cases);
        let labels = synthesizer
            .generate(&mut rng, config.cases.total)
            .context("Failed to generate case labels")?;
        CaseRecords::from_labels(labels).save(&config.paths.case_records)?;
        tracing::info!(
            cases = config.cases.total,
            path = %config.paths.case_records,
            "Case records written"
        );
    }

    if prepay {
        let templates = DirTemplateProvider::new(&config.paths.prepayment_template_dir);
        let submitter = HttpSubmitter::new(
            "prepayment",
            config.endpoints.prepayment.clone(),
            ResponseShape::Prepayment,
        )?
        .with_header("mode", "debug");
        PrepaymentStage::new(&config, &templates, &submitter)
            .run(&mut mint, &mut rng)
            .await
            .context("Prepayment stage failed")?;
    }

    if deliver {
        let output_dir = Path::new(&config.paths.output_dir);
        let input = match &input_file {
            Some(path) => DeliveryInput::load(path)
                .with_context(|| format!("Failed to read delivery input {}", path))?,
            None => {
                let tracking = TrackingBook::load(&config.paths.tracking_file)?;
                let labels = CaseRecords::load(&config.paths.case_records)
                    .with_context(|| format!("Failed to read {}", config.paths.case_records))?
                    .labels();
                let input = assign_cases(&tracking, &labels, config.harness.many_to_one_size);
                input.save(output_dir.join(DELIVERY_INPUT_FILE))?;
                input
            }
        };

        let templates = DirTemplateProvider::new(&config.paths.delivery_template_dir);
        let submitter = HttpSubmitter::new(
            "delivery",
            config.endpoints.delivery.clone(),
            ResponseShape::Delivery,
        )?;
        let stage = DeliveryStage::new(&config, &templates, &submitter);
        let report = stage
            .run(&input, &mut mint, &mut rng)
            .await
            .context("Delivery stage failed")?;
        report.write_reports(stage.output_dir(), &config)?;

        println!(
            "Processed {} cases across {} companies: {} requests, {} successful",
            report.results.len(),
            report.companies_processed,
            report.request_count(),
            report.success_count()
        );
    }

    tracing::info!(identifiers = mint.store().len(), "Harness finished");
    Ok(())
}
