//! Export: CSV reports and the run summary
//!
//! Two CSV files come out of a delivery run:
//!
//! - processing results: one row per case, multi-values joined by `", "`
//! - transformed report: rows shaped by relationship (one per cycle for
//!   OneToMany, one per known prepayment for ManyToOne)

use anyhow::{Context, Result};
use chrono::Utc;
use serde::Serialize;
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::case::processor::join;
use crate::case::{CaseResult, Relationship};
use crate::config::AppConfig;

pub const PROCESSING_RESULTS_CSV: &str = "processing-results.csv";
pub const TRANSFORMED_REPORT_CSV: &str = "transformed-prepayment-scenarios.csv";
pub const SUMMARY_JSON: &str = "overall_results_summary.json";

pub const PROCESSING_HEADERS: [&str; 14] = [
    "Company Code",
    "Data Source",
    "SO Number",
    "Record Index",
    "Billing Number",
    "Original Prepayment Request Number",
    "Amount",
    "Assigned Case",
    "Assigned Scenario",
    "OneToMany Number",
    "ZFSN",
    "Generated Prepayment Request Number",
    "Processed",
    "TransactionOrderNumbers",
];

pub const REPORT_HEADERS: [&str; 18] = [
    "Reference Number (Prepayment SO)",
    "Sold to Party",
    "Prepayment SO Number",
    "Prepayment SO Line Item Number",
    "Prepayment SO Amount",
    "Prepayment SO Currency",
    "Billing Document (Prepayment Tax Invoice)",
    "Reference Number (Delivery SO)",
    "Delivery SO Number",
    "Delivery SO Line Item Number",
    "Delivery SO Amount",
    "Delivery SO Currency",
    "Amount to Apply",
    "Sales Organization",
    "Data Source",
    "Assigned Case",
    "Assigned Scenario",
    "Number Of Case",
];

pub const REPORT_TECHNICAL_HEADERS: [&str; 18] = [
    "I_Salesdocument-YY1_PrepaymentReqNum",
    "I_Salesdocument - Soldtoparty",
    "I_Salesdocument-Salesdocument",
    "I_Salesdocumentitem-Salesdocumentitem",
    "I_Salesdocumentitem-Netamount",
    "I_Salesdocument-Currency",
    "I_Billingdocument-Billingdocument",
    "I_Salesdocument-YY1_PrepaymentReqNum",
    "I_Salesdocument-Salesdocument",
    "I_Salesdocumentitem-Salesdocumentitem",
    "I_Salesdocumentitem-Netamount",
    "I_Salesdocument-Currency",
    "Customzed field (refer to field I_Salesdocumentitem-Netamount)",
    "I_Salesdocument-SALESORGANIZATION",
    "Data Source",
    "Assigned Case",
    "Assigned Scenario",
    "Number Of Case",
];

const DATA_SOURCE: &str = "JSON";
const DELIVERY_LINE_ITEM: &str = "10";

/// Quote a field when it holds a delimiter, quote or newline
pub fn csv_field(value: &str) -> Cow<'_, str> {
    if value.contains([',', '"', '\n']) {
        Cow::Owned(format!("\"{}\"", value.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(value)
    }
}

fn csv_line<S: AsRef<str>>(fields: &[S]) -> String {
    fields
        .iter()
        .map(|f| csv_field(f.as_ref()))
        .collect::<Vec<_>>()
        .join(",")
}

fn write_csv(path: &Path, header_rows: &[&[&str]], rows: &[Vec<String>]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let file = File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    for header in header_rows {
        writeln!(writer, "{}", csv_line(header))?;
    }
    for row in rows {
        writeln!(writer, "{}", csv_line(row))?;
    }
    writer.flush()?;
    Ok(())
}

/// One row per case
pub fn processing_row(result: &CaseResult) -> Vec<String> {
    let records = &result.known.record;
    vec![
        result.company.clone(),
        DATA_SOURCE.to_string(),
        join(&records.iter().map(|r| r.so_number.as_str()).collect::<Vec<_>>()),
        join(&(1..=records.len()).collect::<Vec<_>>()),
        join(&records.iter().map(|r| r.billing_number.as_str()).collect::<Vec<_>>()),
        join(&records.iter().map(|r| r.prepayment_id.as_str()).collect::<Vec<_>>()),
        join(&records.iter().map(|r| r.amount).collect::<Vec<_>>()),
        result.descriptor.case_type(),
        result.descriptor.scenario_name().to_string(),
        result.multiplicity().map(|n| n.to_string()).unwrap_or_default(),
        join(&result.amounts),
        join(&result.identifiers),
        "true".to_string(),
        join(&result.outcomes().collect::<Vec<_>>()),
    ]
}

pub fn write_processing_results(path: &Path, results: &[CaseResult]) -> Result<()> {
    let rows: Vec<Vec<String>> = results.iter().map(processing_row).collect();
    write_csv(path, &[&PROCESSING_HEADERS], &rows)
}

/// Report rows for one case, shaped by relationship
pub fn report_rows(result: &CaseResult, config: &AppConfig) -> Vec<Vec<String>> {
    let currency = config.currency_for(&result.company);
    let sold_to = config.sold_to_party(&result.company);
    let records = &result.known.record;
    let case_type = result.descriptor.case_type();
    let scenario = result.descriptor.scenario_name();

    let prepayment = |i: usize| -> [String; 4] {
        records
            .get(i)
            .map(|r| {
                [
                    r.prepayment_id.clone(),
                    r.so_number.clone(),
                    r.amount.to_string(),
                    r.billing_number.clone(),
                ]
            })
            .unwrap_or_default()
    };

    let row = |prepayment_index: usize, cycle_index: usize, number_of_case: String| {
        let [reference, so_number, amount, billing] = prepayment(prepayment_index);
        let line_item = if prepayment_index < records.len() {
            ((prepayment_index + 1) * 10).to_string()
        } else {
            String::new()
        };
        let cycle = result.cycles.get(cycle_index);
        let delivery_amount = cycle.map(|c| c.amount.to_string()).unwrap_or_default();
        vec![
            reference,
            sold_to.clone(),
            so_number,
            line_item,
            amount,
            currency.clone(),
            billing,
            cycle.map(|c| c.prepayment_id.clone()).unwrap_or_default(),
            cycle.map(|c| c.outcome.to_string()).unwrap_or_default(),
            DELIVERY_LINE_ITEM.to_string(),
            delivery_amount.clone(),
            currency.clone(),
            delivery_amount,
            result.company.clone(),
            DATA_SOURCE.to_string(),
            case_type.clone(),
            scenario.to_string(),
            number_of_case,
        ]
    };

    match result.descriptor.relationship() {
        // Every cycle draws on the single known prepayment
        Some(Relationship::OneToMany) => {
            let n = result.cycles.len().to_string();
            (0..result.cycles.len()).map(|i| row(0, i, n.clone())).collect()
        }
        // Every known prepayment is settled by the single delivery
        Some(Relationship::ManyToOne) => {
            let n = records.len().max(1);
            (0..n).map(|i| row(i, 0, n.to_string())).collect()
        }
        _ => vec![row(0, 0, "1".to_string())],
    }
}

pub fn write_transformed_report(path: &Path, results: &[CaseResult], config: &AppConfig) -> Result<()> {
    let rows: Vec<Vec<String>> = results
        .iter()
        .flat_map(|r| report_rows(r, config))
        .collect();
    write_csv(path, &[&REPORT_HEADERS, &REPORT_TECHNICAL_HEADERS], &rows)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CaseSummary {
    pub case_name: String,
    pub scenario: String,
    pub case_type: String,
    pub generated_json_count: usize,
    pub transaction_order_numbers: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub timestamp: String,
    pub total_companies_processed: usize,
    pub total_jsons_created: usize,
    pub total_requests_sent: usize,
    pub total_successful_requests: usize,
    pub total_failed_requests: usize,
    pub companies_results: BTreeMap<String, Vec<CaseSummary>>,
}

impl RunSummary {
    pub fn from_results(companies_processed: usize, results: &[CaseResult]) -> Self {
        let mut companies_results: BTreeMap<String, Vec<CaseSummary>> = BTreeMap::new();
        let mut requests = 0;
        let mut successes = 0;

        for result in results {
            requests += result.cycles.len();
            successes += result.success_count();
            companies_results
                .entry(result.company.clone())
                .or_default()
                .push(CaseSummary {
                    case_name: result.known.case.to_string(),
                    scenario: result.descriptor.scenario_name().to_string(),
                    case_type: result.descriptor.case_type(),
                    generated_json_count: result.cycles.len(),
                    transaction_order_numbers: join(&result.outcomes().collect::<Vec<_>>()),
                });
        }

        Self {
            timestamp: Utc::now().to_rfc3339(),
            total_companies_processed: companies_processed,
            total_jsons_created: requests,
            total_requests_sent: requests,
            total_successful_requests: successes,
            total_failed_requests: requests - successes,
            companies_results,
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)
            .with_context(|| format!("Failed to write {}", path.display()))
    }
}
