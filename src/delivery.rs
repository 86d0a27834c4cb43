//! Delivery stage
//!
//! Drives every assigned case through the [`CaseProcessor`], one company at
//! a time, then writes the generated payloads, the run summary and both
//! CSV reports into the output directory.

use rand::Rng;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{error, info, warn};

use crate::assignment::DeliveryInput;
use crate::case::{AmountAllocator, CaseInterpreter, CaseProcessor, CaseResult};
use crate::config::AppConfig;
use crate::error::HarnessError;
use crate::export::{self, RunSummary};
use crate::identifier::{IdentifierMint, IdentifierStore};
use crate::submission::Submitter;
use crate::template::{DeliveryTemplate, TemplateProvider};

/// Everything a delivery run produced
#[derive(Debug, Default)]
pub struct DeliveryReport {
    pub companies_processed: usize,
    pub results: Vec<CaseResult>,
}

impl DeliveryReport {
    pub fn request_count(&self) -> usize {
        self.results.iter().map(|r| r.cycles.len()).sum()
    }

    pub fn success_count(&self) -> usize {
        self.results.iter().map(CaseResult::success_count).sum()
    }

    pub fn summary(&self) -> RunSummary {
        RunSummary::from_results(self.companies_processed, &self.results)
    }

    /// Summary JSON plus both CSV reports
    pub fn write_reports(&self, dir: &Path, config: &AppConfig) -> anyhow::Result<()> {
        self.summary().save(&dir.join(export::SUMMARY_JSON))?;
        export::write_processing_results(&dir.join(export::PROCESSING_RESULTS_CSV), &self.results)?;
        export::write_transformed_report(
            &dir.join(export::TRANSFORMED_REPORT_CSV),
            &self.results,
            config,
        )?;
        info!(dir = %dir.display(), "Reports written");
        Ok(())
    }
}

pub struct DeliveryStage<'a> {
    config: &'a AppConfig,
    templates: &'a dyn TemplateProvider,
    submitter: &'a dyn Submitter,
    output_dir: PathBuf,
}

impl<'a> DeliveryStage<'a> {
    pub fn new(
        config: &'a AppConfig,
        templates: &'a dyn TemplateProvider,
        submitter: &'a dyn Submitter,
    ) -> Self {
        Self {
            config,
            templates,
            submitter,
            output_dir: PathBuf::from(&config.paths.output_dir),
        }
    }

    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    fn processor(&self) -> CaseProcessor<'a> {
        let harness = &self.config.harness;
        CaseProcessor::new(
            CaseInterpreter::new(harness.max_number_one_to_many),
            AmountAllocator::new(harness.is_equal),
            self.submitter,
            harness.identifier_length,
        )
        .with_cycle_delay(Duration::from_millis(harness.request_delay_ms))
    }

    /// Process every company in `input`.
    ///
    /// A missing template skips the company. A pool persistence failure
    /// abandons the rest of that company's cases; results already
    /// produced are kept.
    pub async fn run<S, R>(
        &self,
        input: &DeliveryInput,
        mint: &mut IdentifierMint<S>,
        rng: &mut R,
    ) -> Result<DeliveryReport, HarnessError>
    where
        S: IdentifierStore,
        R: Rng + ?Sized,
    {
        let processor = self.processor();
        let mut report = DeliveryReport::default();

        for (company, cases) in &input.companies {
            info!(company, cases = cases.records.len(), "Delivering company");
            let template = match DeliveryTemplate::load(self.templates, company) {
                Ok(t) => t,
                Err(e) => {
                    error!(company, "Skipping company: {}", e);
                    continue;
                }
            };

            let mut company_results = Vec::with_capacity(cases.records.len());
            for known in &cases.records {
                match processor.process(company, known, &template, mint, rng).await {
                    Ok(result) => company_results.push(result),
                    Err(e) => {
                        error!(company, case = %known.case, "Abandoning company: {}", e);
                        break;
                    }
                }
            }

            if company_results.is_empty() {
                warn!(company, "No cases processed");
                continue;
            }
            self.write_payloads(company, &company_results)?;
            report.companies_processed += 1;
            report.results.extend(company_results);
        }

        info!(
            companies = report.companies_processed,
            requests = report.request_count(),
            successes = report.success_count(),
            failures = report.request_count() - report.success_count(),
            "Delivery stage complete"
        );
        Ok(report)
    }

    fn write_payloads(&self, company: &str, results: &[CaseResult]) -> Result<(), HarnessError> {
        fs::create_dir_all(&self.output_dir)?;
        let payloads: Vec<&Value> = results
            .iter()
            .flat_map(|r| r.cycles.iter().map(|c| &c.payload))
            .collect();
        let path = self.output_dir.join(format!("{}_generated.json", company));
        fs::write(&path, serde_json::to_string_pretty(&payloads)?)?;
        info!(company, payloads = payloads.len(), path = %path.display(), "Payloads written");
        Ok(())
    }
}
