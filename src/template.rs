//! Request templates
//!
//! Templates are per-company JSON documents loaded from a directory
//! (`<dir>/<COMPANY>.json`). They are validated once at load time so that
//! rendering a cycle's payload cannot fail halfway through a case.

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde_json::{Value, json};
use std::fs;
use std::path::PathBuf;

use crate::error::TemplateError;

pub trait TemplateProvider {
    /// Load a deep-cloneable template. A missing template is fatal for the
    /// company that asked for it.
    fn load(&self, company: &str) -> Result<Value, TemplateError>;
}

#[derive(Debug, Clone)]
pub struct DirTemplateProvider {
    dir: PathBuf,
}

impl DirTemplateProvider {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl TemplateProvider for DirTemplateProvider {
    fn load(&self, company: &str) -> Result<Value, TemplateError> {
        let path = self.dir.join(format!("{}.json", company));
        if !path.exists() {
            return Err(TemplateError::NotFound(company.to_string()));
        }
        let content = fs::read_to_string(&path).map_err(|e| TemplateError::Read {
            path: path.display().to_string(),
            source: e,
        })?;
        serde_json::from_str(&content).map_err(|e| TemplateError::Parse {
            company: company.to_string(),
            source: e,
        })
    }
}

/// Pricing condition carrying the net amount
pub const NET_AMOUNT_CONDITION: &str = "ZSFN";

const FIRST_ITEM: &str = "/SalesOrder/0/SalesOrderItem/0";

/// JSON number for an amount: integral values stay integers
pub fn amount_json(amount: Decimal) -> Value {
    let normalized = amount.normalize();
    if normalized.fract().is_zero() {
        if let Some(whole) = normalized.to_i64() {
            return json!(whole);
        }
    }
    normalized.to_f64().map(|f| json!(f)).unwrap_or(Value::Null)
}

fn missing(company: &str, field: &'static str) -> TemplateError {
    TemplateError::MissingField {
        company: company.to_string(),
        field,
    }
}

/// Delivery request template, patched once per cycle
#[derive(Debug, Clone)]
pub struct DeliveryTemplate {
    document: Value,
}

impl DeliveryTemplate {
    pub fn from_value(company: &str, document: Value) -> Result<Self, TemplateError> {
        if !document
            .pointer("/SalesOrder/0")
            .is_some_and(Value::is_object)
        {
            return Err(missing(company, "SalesOrder[0]"));
        }
        if !document.pointer(FIRST_ITEM).is_some_and(Value::is_object) {
            return Err(missing(company, "SalesOrder[0].SalesOrderItem[0]"));
        }
        Ok(Self { document })
    }

    pub fn load(provider: &dyn TemplateProvider, company: &str) -> Result<Self, TemplateError> {
        Self::from_value(company, provider.load(company)?)
    }

    /// Clone the template with the cycle's prepayment reference, test id and amount.
    pub fn render(&self, prepayment_id: &str, test_id: &str, amount: Decimal) -> Value {
        let mut body = self.document.clone();

        if let Some(order) = body.pointer_mut("/SalesOrder/0") {
            order["SalesOrderItemsSet"] = json!([test_id]);
        }
        if let Some(item) = body.pointer_mut(FIRST_ITEM) {
            item["PrepaymentRequestnumber"] = json!(prepayment_id);
            item["YY1_SFDCLINEID_I"] = json!(test_id);
            item["YY1_SALESFORCEID_I"] = json!(test_id);
            item["YY1_BATCHID_I"] = json!(test_id);

            if let Some(pricing) = item
                .get_mut("PricingElement")
                .and_then(Value::as_array_mut)
                .and_then(|elements| {
                    elements
                        .iter_mut()
                        .find(|pe| pe["ConditionType"] == NET_AMOUNT_CONDITION)
                })
            {
                pricing["ConditionRateValue"] = amount_json(amount);
            }
        }
        body
    }
}

/// Prepayment request template
#[derive(Debug, Clone)]
pub struct PrepaymentTemplate {
    document: Value,
}

/// Values stamped into one prepayment request
#[derive(Debug, Clone)]
pub struct PrepaymentFields<'a> {
    pub sfid: &'a str,
    pub identifier: &'a str,
    pub amount: Decimal,
    /// Currency override; `None` keeps the template's own currency
    pub currency: Option<&'a str>,
}

impl PrepaymentTemplate {
    pub fn from_value(company: &str, document: Value) -> Result<Self, TemplateError> {
        if !document
            .get("SalesOrder")
            .and_then(Value::as_array)
            .is_some_and(|orders| !orders.is_empty())
        {
            return Err(missing(company, "SalesOrder"));
        }
        Ok(Self { document })
    }

    pub fn load(provider: &dyn TemplateProvider, company: &str) -> Result<Self, TemplateError> {
        Self::from_value(company, provider.load(company)?)
    }

    pub fn render(&self, fields: &PrepaymentFields<'_>) -> Value {
        let mut body = self.document.clone();
        let amount = amount_json(fields.amount);

        for order in sales_orders(&mut body) {
            order["SalesOrderItemsSet"] = json!([fields.sfid]);
            if let Some(currency) = fields.currency {
                order["TransactionCurrency"] = json!(currency);
            }
            for item in array_mut(order, "SalesOrderItem") {
                item["YY1_SFDCLINEID_I"] = json!(fields.sfid);
                item["YY1_SALESFORCEID_I"] = json!(fields.sfid);
                item["PrepaymentRequestnumber"] = json!(fields.identifier);
                item["YY1_BATCHID_I"] = json!(fields.identifier);

                for pricing in array_mut(item, "PricingElement") {
                    if let Some(currency) = fields.currency {
                        pricing["ConditionCurrency"] = json!(currency);
                    }
                    if pricing["ConditionType"] == NET_AMOUNT_CONDITION {
                        pricing["ConditionRateValue"] = amount.clone();
                    }
                }
                for plan in array_mut(item, "to_billingplan") {
                    for plan_item in array_mut(plan, "to_billingplanitem") {
                        plan_item["BillingPlanAmount"] = amount.clone();
                    }
                }
            }
        }
        body
    }

    /// Stamp the sales order number returned for the initial prepayment on
    /// every nested document so follow-up prepayments attach to it.
    pub fn with_sales_order(&self, so_number: &str) -> Self {
        let mut document = self.document.clone();
        let so = json!(so_number);

        for order in sales_orders(&mut document) {
            order["SalesOrder"] = so.clone();
            for item in array_mut(order, "SalesOrderItem") {
                item["SalesOrder"] = so.clone();
                for key in ["PricingElement", "ItemText"] {
                    for child in array_mut(item, key) {
                        child["SalesOrder"] = so.clone();
                    }
                }
                for plan in array_mut(item, "to_billingplan") {
                    plan["SalesOrder"] = so.clone();
                    for plan_item in array_mut(plan, "to_billingplanitem") {
                        plan_item["SalesOrder"] = so.clone();
                    }
                }
            }
        }
        Self { document }
    }
}

fn sales_orders(body: &mut Value) -> impl Iterator<Item = &mut Value> {
    array_mut(body, "SalesOrder")
}

/// Object elements of `value[key]` when it is an array, nothing otherwise
fn array_mut<'a>(value: &'a mut Value, key: &str) -> impl Iterator<Item = &'a mut Value> {
    value
        .get_mut(key)
        .and_then(Value::as_array_mut)
        .into_iter()
        .flat_map(|elements| elements.iter_mut())
        .filter(|element| element.is_object())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn delivery_doc() -> Value {
        json!({
            "SalesOrder": [{
                "SalesOrderItemsSet": [],
                "SalesOrderItem": [{
                    "PrepaymentRequestnumber": "",
                    "PricingElement": [
                        {"ConditionType": "PR00", "ConditionRateValue": 1},
                        {"ConditionType": "ZSFN", "ConditionRateValue": 0}
                    ]
                }]
            }]
        })
    }

    fn prepayment_doc() -> Value {
        json!({
            "SalesOrder": [{
                "TransactionCurrency": "SAR",
                "SalesOrderItem": [{
                    "PricingElement": [
                        {"ConditionType": "ZSFN", "ConditionCurrency": "SAR"},
                        {"ConditionType": "MWST", "ConditionCurrency": "SAR"}
                    ],
                    "ItemText": [{"Text": "x"}],
                    "to_billingplan": [{"to_billingplanitem": [{"BillingPlanAmount": 0}]}]
                }]
            }]
        })
    }

    #[test]
    fn test_delivery_render_patches_cycle_fields() {
        let template = DeliveryTemplate::from_value("SAC1", delivery_doc()).unwrap();
        let body = template.render("PRE12345", "Delvr_PRE12345_1", Decimal::from(75));

        let item = &body["SalesOrder"][0]["SalesOrderItem"][0];
        assert_eq!(item["PrepaymentRequestnumber"], "PRE12345");
        assert_eq!(item["YY1_SFDCLINEID_I"], "Delvr_PRE12345_1");
        assert_eq!(item["YY1_BATCHID_I"], "Delvr_PRE12345_1");
        assert_eq!(item["PricingElement"][1]["ConditionRateValue"], 75);
        assert_eq!(item["PricingElement"][0]["ConditionRateValue"], 1);
        assert_eq!(body["SalesOrder"][0]["SalesOrderItemsSet"], json!(["Delvr_PRE12345_1"]));
    }

    #[test]
    fn test_delivery_render_leaves_template_untouched() {
        let template = DeliveryTemplate::from_value("SAC1", delivery_doc()).unwrap();
        let _ = template.render("A", "B", Decimal::ONE);
        let again = template.render("", "C", Decimal::new(125, 1));
        let item = &again["SalesOrder"][0]["SalesOrderItem"][0];
        assert_eq!(item["PrepaymentRequestnumber"], "");
        assert_eq!(item["PricingElement"][1]["ConditionRateValue"], 12.5);
    }

    #[test]
    fn test_delivery_template_validation() {
        let err = DeliveryTemplate::from_value("EGC1", json!({"SalesOrder": []})).unwrap_err();
        assert!(matches!(err, TemplateError::MissingField { .. }));
    }

    #[test]
    fn test_prepayment_render_with_currency_override() {
        let template = PrepaymentTemplate::from_value("SAC1", prepayment_doc()).unwrap();
        let body = template.render(&PrepaymentFields {
            sfid: "TESTSAC1abcdEFGH",
            identifier: "abcdEFGH",
            amount: Decimal::from(4200),
            currency: Some("USD"),
        });

        let order = &body["SalesOrder"][0];
        assert_eq!(order["TransactionCurrency"], "USD");
        assert_eq!(order["SalesOrderItemsSet"], json!(["TESTSAC1abcdEFGH"]));
        let item = &order["SalesOrderItem"][0];
        assert_eq!(item["PrepaymentRequestnumber"], "abcdEFGH");
        assert_eq!(item["YY1_SALESFORCEID_I"], "TESTSAC1abcdEFGH");
        assert_eq!(item["PricingElement"][0]["ConditionRateValue"], 4200);
        assert_eq!(item["PricingElement"][1]["ConditionCurrency"], "USD");
        assert!(item["PricingElement"][1].get("ConditionRateValue").is_none());
        assert_eq!(item["to_billingplan"][0]["to_billingplanitem"][0]["BillingPlanAmount"], 4200);
    }

    #[test]
    fn test_prepayment_render_keeps_local_currency() {
        let template = PrepaymentTemplate::from_value("SAC1", prepayment_doc()).unwrap();
        let body = template.render(&PrepaymentFields {
            sfid: "S",
            identifier: "I",
            amount: Decimal::ONE,
            currency: None,
        });
        assert_eq!(body["SalesOrder"][0]["TransactionCurrency"], "SAR");
    }

    #[test]
    fn test_with_sales_order_stamps_nested_documents() {
        let template = PrepaymentTemplate::from_value("SAC1", prepayment_doc())
            .unwrap()
            .with_sales_order("1200000042");
        let body = template.render(&PrepaymentFields {
            sfid: "S",
            identifier: "I",
            amount: Decimal::ONE,
            currency: None,
        });
        let item = &body["SalesOrder"][0]["SalesOrderItem"][0];
        assert_eq!(body["SalesOrder"][0]["SalesOrder"], "1200000042");
        assert_eq!(item["SalesOrder"], "1200000042");
        assert_eq!(item["ItemText"][0]["SalesOrder"], "1200000042");
        assert_eq!(item["to_billingplan"][0]["to_billingplanitem"][0]["SalesOrder"], "1200000042");
    }

    #[test]
    fn test_dir_provider_missing_template() {
        let provider = DirTemplateProvider::new("target/definitely_missing_templates");
        assert!(matches!(provider.load("XXX1"), Err(TemplateError::NotFound(_))));
    }

    #[test]
    fn test_amount_json() {
        assert_eq!(amount_json(Decimal::new(15000, 2)), json!(150));
        assert_eq!(amount_json(Decimal::new(15050, 2)), json!(150.5));
    }
}
