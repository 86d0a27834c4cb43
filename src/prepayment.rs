//! Prepayment stage
//!
//! Creates the original prepayments the delivery cases later refer to. Per
//! company: one initial prepayment, then `additional_prepayments` more
//! attached to the sales order the initial one produced. Every tracked
//! prepayment is written through to the tracking file immediately.

use rand::Rng;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

use crate::config::{AppConfig, NetAmountConfig};
use crate::error::HarnessError;
use crate::identifier::{IdentifierMint, IdentifierStore};
use crate::submission::Submitter;
use crate::template::{PrepaymentFields, PrepaymentTemplate, TemplateProvider};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackedPrepayment {
    #[serde(rename = "BillingNumber")]
    pub billing_number: String,
    #[serde(rename = "PrepaymentRequestnumber")]
    pub prepayment_id: String,
    #[serde(rename = "Amount")]
    pub amount: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompanyTracking {
    #[serde(rename = "SoNumber")]
    pub so_number: String,
    #[serde(rename = "Records", default)]
    pub records: Vec<TrackedPrepayment>,
}

/// company code -> sales order + tracked prepayments
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrackingBook {
    pub companies: BTreeMap<String, CompanyTracking>,
}

impl TrackingBook {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, HarnessError> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), HarnessError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Record a response. The company entry appears with the first sales
    /// order seen; a prepayment is only recorded when a billing number came
    /// back with it. Returns whether a prepayment was recorded.
    pub fn track(
        &mut self,
        company: &str,
        so_number: &str,
        billing_number: Option<String>,
        prepayment_id: &str,
        amount: Decimal,
    ) -> bool {
        let entry = self
            .companies
            .entry(company.to_string())
            .or_insert_with(|| CompanyTracking {
                so_number: so_number.to_string(),
                records: Vec::new(),
            });
        match billing_number {
            Some(billing_number) => {
                entry.records.push(TrackedPrepayment {
                    billing_number,
                    prepayment_id: prepayment_id.to_string(),
                    amount,
                });
                true
            }
            None => false,
        }
    }

    pub fn record_count(&self) -> usize {
        self.companies.values().map(|c| c.records.len()).sum()
    }
}

/// Word following "billing number" in a status description, case-insensitive
pub fn extract_billing_number(description: &str) -> Option<String> {
    const NEEDLE: &str = "billing number";
    let lower = description.to_ascii_lowercase();
    let start = lower.find(NEEDLE)? + NEEDLE.len();
    let rest = description[start..].trim_start();
    let word: String = rest
        .chars()
        .take_while(|c| c.is_alphanumeric() || *c == '_')
        .collect();
    (!word.is_empty()).then_some(word)
}

/// Uniform whole amount within the configured bounds
pub fn random_net_amount<R: Rng + ?Sized>(rng: &mut R, bounds: &NetAmountConfig) -> Decimal {
    let lo = bounds.min.ceil().to_i64().unwrap_or(1);
    let hi = bounds.max.floor().to_i64().unwrap_or(lo);
    Decimal::from(rng.gen_range(lo..=hi.max(lo)))
}

pub struct PrepaymentStage<'a> {
    config: &'a AppConfig,
    templates: &'a dyn TemplateProvider,
    submitter: &'a dyn Submitter,
    tracking_path: PathBuf,
}

impl<'a> PrepaymentStage<'a> {
    pub fn new(
        config: &'a AppConfig,
        templates: &'a dyn TemplateProvider,
        submitter: &'a dyn Submitter,
    ) -> Self {
        Self {
            config,
            templates,
            submitter,
            tracking_path: PathBuf::from(&config.paths.tracking_file),
        }
    }

    pub fn with_tracking_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.tracking_path = path.into();
        self
    }

    fn currency_override(&self) -> Option<String> {
        let currency = &self.config.prepayment_currency;
        (!currency.eq_ignore_ascii_case("local")).then(|| currency.to_uppercase())
    }

    /// Create prepayments for every configured company, sequentially.
    ///
    /// Template and submission failures skip work for that company; a pool
    /// persistence failure stops the stage.
    pub async fn run<S, R>(
        &self,
        mint: &mut IdentifierMint<S>,
        rng: &mut R,
    ) -> Result<TrackingBook, HarnessError>
    where
        S: IdentifierStore,
        R: Rng + ?Sized,
    {
        let mut book = TrackingBook::default();

        for (company, settings) in &self.config.companies {
            info!(company, "Creating prepayments");
            let template = match PrepaymentTemplate::load(self.templates, company) {
                Ok(t) => t,
                Err(e) => {
                    error!(company, "Skipping company: {}", e);
                    continue;
                }
            };

            let Some(so_number) = self
                .create_one(company, &template, &mut book, mint, rng)
                .await?
            else {
                error!(company, "Initial prepayment returned no sales order, skipping additional prepayments");
                continue;
            };

            let attached = template.with_sales_order(&so_number);
            for n in 1..=settings.additional_prepayments {
                if self
                    .create_one(company, &attached, &mut book, mint, rng)
                    .await?
                    .is_none()
                {
                    warn!(company, n, "Additional prepayment not tracked");
                }
            }
        }

        info!(
            companies = book.companies.len(),
            prepayments = book.record_count(),
            "Prepayment stage complete"
        );
        Ok(book)
    }

    /// Returns the sales order number when the remote side produced one.
    async fn create_one<S, R>(
        &self,
        company: &str,
        template: &PrepaymentTemplate,
        book: &mut TrackingBook,
        mint: &mut IdentifierMint<S>,
        rng: &mut R,
    ) -> Result<Option<String>, HarnessError>
    where
        S: IdentifierStore,
        R: Rng + ?Sized,
    {
        let identifier = mint.mint(rng, self.config.harness.prepayment_identifier_length)?;
        let sfid = format!("TEST{}{}", company, identifier);
        let amount = random_net_amount(rng, &self.config.harness.net_amount);
        let currency = self.currency_override();

        let payload = template.render(&PrepaymentFields {
            sfid: &sfid,
            identifier: &identifier,
            amount,
            currency: currency.as_deref(),
        });

        let receipt = match self.submitter.submit(&payload).await {
            Ok(receipt) => receipt,
            Err(e) => {
                error!(company, %identifier, "Prepayment failed: {}", e);
                return Ok(None);
            }
        };

        let Some(so_number) = receipt.correlation_id else {
            warn!(company, %identifier, "Prepayment response carried no sales order");
            return Ok(None);
        };

        let billing_number = receipt
            .raw
            .get("Status_Description__c")
            .and_then(|v| v.as_str())
            .and_then(extract_billing_number);

        if book.track(company, &so_number, billing_number, &identifier, amount) {
            book.save(&self.tracking_path)?;
            info!(company, %identifier, %so_number, %amount, "Prepayment tracked");
        } else {
            warn!(company, %identifier, %so_number, "Prepayment has no billing number, not tracked");
        }
        Ok(Some(so_number))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{SubmitError, TemplateError};
    use crate::identifier::MemoryStore;
    use crate::submission::SubmitReceipt;
    use crate::submission::mock::ScriptedSubmitter;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use serde_json::{Value, json};

    struct StaticTemplates;

    impl TemplateProvider for StaticTemplates {
        fn load(&self, company: &str) -> Result<Value, TemplateError> {
            match company {
                "SAC1" => Ok(json!({
                    "SalesOrder": [{
                        "SalesOrderItem": [{
                            "PricingElement": [{"ConditionType": "ZSFN"}]
                        }]
                    }]
                })),
                other => Err(TemplateError::NotFound(other.to_string())),
            }
        }
    }

    fn prepayment_receipt(so: &str, billing: &str) -> Result<SubmitReceipt, SubmitError> {
        Ok(SubmitReceipt {
            correlation_id: Some(so.to_string()),
            line_correlation_id: None,
            raw: json!({
                "SO_Number__c": so,
                "Status_Description__c": format!("Prepayment posted with billing number {}", billing)
            }),
        })
    }

    fn config() -> AppConfig {
        AppConfig::from_yaml(
            r#"
log_level: "info"
log_dir: "./logs"
log_file: "harness.log"
use_json: false
rotation: "never"
enable_tracing: false
harness:
  net_amount: { min: 100, max: 200 }
endpoints:
  prepayment: { url: "http://x", username: "u", password: "p" }
  delivery: { url: "http://x", username: "u", password: "p" }
companies:
  SAC1: { currency: "SAR", additional_prepayments: 2 }
  ZZZ1: { currency: "USD", additional_prepayments: 1 }
"#,
        )
        .unwrap()
    }

    #[test]
    fn test_extract_billing_number() {
        assert_eq!(
            extract_billing_number("Created with billing number 1SA5000078."),
            Some("1SA5000078".to_string())
        );
        assert_eq!(
            extract_billing_number("BILLING NUMBER   ab_12 issued"),
            Some("ab_12".to_string())
        );
        assert_eq!(extract_billing_number("no billing here"), None);
        assert_eq!(extract_billing_number("billing number "), None);
    }

    #[test]
    fn test_random_net_amount_within_bounds() {
        let mut rng = StdRng::seed_from_u64(9);
        let bounds = NetAmountConfig {
            min: Decimal::from(10),
            max: Decimal::from(12),
        };
        for _ in 0..100 {
            let amount = random_net_amount(&mut rng, &bounds);
            assert!(amount >= Decimal::from(10) && amount <= Decimal::from(12));
        }
    }

    #[tokio::test]
    async fn test_stage_tracks_initial_and_additional_prepayments() {
        let config = config();
        let submitter = ScriptedSubmitter::new(vec![
            prepayment_receipt("1200000001", "1SA0001"),
            Err(SubmitError::Transport("timeout".to_string())),
            prepayment_receipt("1200000001", "1SA0003"),
        ]);
        let tracking = format!("target/test_prepayment_{}/tracking.json", std::process::id());
        let stage = PrepaymentStage::new(&config, &StaticTemplates, &submitter)
            .with_tracking_path(&tracking);
        let mut mint = IdentifierMint::new(MemoryStore::new());
        let mut rng = StdRng::seed_from_u64(1);

        let book = stage.run(&mut mint, &mut rng).await.unwrap();

        // ZZZ1 has no template and is skipped
        assert_eq!(book.companies.len(), 1);
        let sac1 = &book.companies["SAC1"];
        assert_eq!(sac1.so_number, "1200000001");
        assert_eq!(sac1.records.len(), 2);
        assert_eq!(sac1.records[1].billing_number, "1SA0003");
        assert!(sac1.records.iter().all(|r| r.prepayment_id.len() == 8));
        assert_eq!(mint.store().len(), 3);

        // Follow-up prepayments are attached to the initial sales order
        let payloads = submitter.payloads();
        assert_eq!(payloads.len(), 3);
        assert_eq!(payloads[2]["SalesOrder"][0]["SalesOrder"], "1200000001");
        assert!(payloads[0]["SalesOrder"][0].get("SalesOrder").is_none());

        let on_disk = TrackingBook::load(&tracking).unwrap();
        assert_eq!(on_disk, book);
        let _ = fs::remove_dir_all(Path::new(&tracking).parent().unwrap());
    }
}
