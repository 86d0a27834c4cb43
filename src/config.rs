use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;

use crate::error::ConfigError;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AppConfig {
    pub log_level: String,
    pub log_dir: String,
    pub log_file: String,
    pub use_json: bool,
    pub rotation: String,
    pub enable_tracing: bool,
    #[serde(default)]
    pub harness: HarnessConfig,
    #[serde(default)]
    pub cases: CaseWeightsConfig,
    pub endpoints: EndpointsConfig,
    /// `Local` uses each company's own currency, anything else is an override
    #[serde(default = "default_prepayment_currency")]
    pub prepayment_currency: String,
    /// Company code -> company settings. BTreeMap keeps processing order stable.
    #[serde(default)]
    pub companies: BTreeMap<String, CompanyConfig>,
    #[serde(default)]
    pub paths: PathsConfig,
}

fn default_prepayment_currency() -> String {
    "Local".to_string()
}

/// Allocation, fan-out and minting knobs
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct HarnessConfig {
    /// Exact-equality policy for under-delivery allocation
    pub is_equal: bool,
    pub max_number_one_to_many: usize,
    pub many_to_one_size: usize,
    pub identifier_length: usize,
    pub prepayment_identifier_length: usize,
    pub mint_max_attempts: usize,
    pub request_delay_ms: u64,
    pub net_amount: NetAmountConfig,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            is_equal: false,
            max_number_one_to_many: 3,
            many_to_one_size: 2,
            identifier_length: 9,
            prepayment_identifier_length: 8,
            mint_max_attempts: 1000,
            request_delay_ms: 100,
            net_amount: NetAmountConfig::default(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct NetAmountConfig {
    pub min: Decimal,
    pub max: Decimal,
}

impl Default for NetAmountConfig {
    fn default() -> Self {
        Self {
            min: Decimal::from(100),
            max: Decimal::from(10_000),
        }
    }
}

/// Case population weights. Weights are entry counts in a sampling pool.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(default)]
pub struct CaseWeightsConfig {
    pub total: usize,
    pub relationship: RelationshipWeights,
    pub under_delivery: ScenarioWeights,
    pub over_delivery: ScenarioWeights,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(default)]
pub struct RelationshipWeights {
    pub one_to_one: usize,
    pub one_to_many: usize,
    pub many_to_one: usize,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(default)]
pub struct ScenarioWeights {
    pub happy: usize,
    pub no_prepayment: usize,
    pub diff_prepayment: usize,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct EndpointsConfig {
    pub prepayment: EndpointConfig,
    pub delivery: EndpointConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct EndpointConfig {
    pub url: String,
    pub username: String,
    pub password: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CompanyConfig {
    pub currency: String,
    #[serde(default)]
    pub sold_to_party: Option<String>,
    /// Prepayments created after the initial one
    #[serde(default)]
    pub additional_prepayments: usize,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct PathsConfig {
    pub prepayment_template_dir: String,
    pub delivery_template_dir: String,
    pub identifier_pool: String,
    pub tracking_file: String,
    pub case_records: String,
    pub output_dir: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            prepayment_template_dir: "templates/prepayment".to_string(),
            delivery_template_dir: "templates/delivery".to_string(),
            identifier_pool: "data/used_identifiers.json".to_string(),
            tracking_file: "data/prepayment_tracking.json".to_string(),
            case_records: "data/case_records.json".to_string(),
            output_dir: "output".to_string(),
        }
    }
}

impl AppConfig {
    pub fn load(env: &str) -> Result<Self, ConfigError> {
        let config_path = format!("config/{}.yaml", env);
        let content = fs::read_to_string(&config_path).map_err(|e| ConfigError::Read {
            path: config_path.clone(),
            source: e,
        })?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let amounts = &self.harness.net_amount;
        if amounts.min > amounts.max {
            return Err(ConfigError::Invalid(format!(
                "net_amount.min ({}) exceeds net_amount.max ({})",
                amounts.min, amounts.max
            )));
        }
        if self.harness.identifier_length == 0 || self.harness.prepayment_identifier_length == 0 {
            return Err(ConfigError::Invalid(
                "identifier lengths must be positive".to_string(),
            ));
        }
        if self.harness.mint_max_attempts == 0 {
            return Err(ConfigError::Invalid(
                "mint_max_attempts must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Currency for a company's documents, honouring the global override
    pub fn currency_for(&self, company: &str) -> String {
        if self.prepayment_currency.eq_ignore_ascii_case("local") {
            self.companies
                .get(company)
                .map(|c| c.currency.clone())
                .unwrap_or_else(|| "USD".to_string())
        } else {
            self.prepayment_currency.to_uppercase()
        }
    }

    pub fn sold_to_party(&self, company: &str) -> String {
        self.companies
            .get(company)
            .and_then(|c| c.sold_to_party.clone())
            .unwrap_or_else(|| "Unknown".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
log_level: "info"
log_dir: "./logs"
log_file: "harness.log"
use_json: false
rotation: "daily"
enable_tracing: false
harness:
  is_equal: true
  max_number_one_to_many: 4
  net_amount:
    min: 500
    max: 900
cases:
  total: 12
  relationship:
    one_to_one: 2
    many_to_one: 1
  under_delivery:
    happy: 3
  over_delivery:
    diff_prepayment: 1
endpoints:
  prepayment:
    url: "http://localhost:9000/prepayment"
    username: "user"
    password: "pass"
  delivery:
    url: "http://localhost:9000/delivery"
    username: "user"
    password: "pass"
    timeout_secs: 5
companies:
  SAC1:
    currency: "SAR"
    sold_to_party: "HS58M1PTWJ"
    additional_prepayments: 3
  AEC1:
    currency: "USD"
"#;

    #[test]
    fn test_app_config_deserialize() {
        let config = AppConfig::from_yaml(SAMPLE).unwrap();

        assert!(config.harness.is_equal);
        assert_eq!(config.harness.max_number_one_to_many, 4);
        // Unspecified harness keys fall back to defaults
        assert_eq!(config.harness.identifier_length, 9);
        assert_eq!(config.harness.mint_max_attempts, 1000);
        assert_eq!(config.harness.net_amount.min, Decimal::from(500));
        assert_eq!(config.cases.total, 12);
        assert_eq!(config.cases.relationship.one_to_many, 0);
        assert_eq!(config.cases.under_delivery.happy, 3);
        assert_eq!(config.endpoints.prepayment.timeout_secs, 30);
        assert_eq!(config.endpoints.delivery.timeout_secs, 5);
        assert_eq!(config.companies["SAC1"].additional_prepayments, 3);
        assert_eq!(config.paths.output_dir, "output");
    }

    #[test]
    fn test_company_order_is_stable() {
        let config = AppConfig::from_yaml(SAMPLE).unwrap();
        let codes: Vec<&str> = config.companies.keys().map(String::as_str).collect();
        assert_eq!(codes, vec!["AEC1", "SAC1"]);
    }

    #[test]
    fn test_currency_local_and_override() {
        let mut config = AppConfig::from_yaml(SAMPLE).unwrap();
        assert_eq!(config.currency_for("SAC1"), "SAR");
        assert_eq!(config.currency_for("ZZZ1"), "USD");

        config.prepayment_currency = "eur".to_string();
        assert_eq!(config.currency_for("SAC1"), "EUR");
    }

    #[test]
    fn test_sold_to_party_fallback() {
        let config = AppConfig::from_yaml(SAMPLE).unwrap();
        assert_eq!(config.sold_to_party("SAC1"), "HS58M1PTWJ");
        assert_eq!(config.sold_to_party("AEC1"), "Unknown");
    }

    #[test]
    fn test_rejects_inverted_net_amount() {
        let yaml = SAMPLE.replace("min: 500", "min: 1500");
        let err = AppConfig::from_yaml(&yaml).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_missing_endpoints_is_an_error() {
        let err = AppConfig::from_yaml("log_level: info\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
