use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::modules::allocations::models::AllocationType;

/// Pagination block returned alongside PayProp export items
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Pagination {
    pub page: Option<u32>,
    pub total_pages: Option<u32>,
    pub total: Option<u64>,
}

/// One page of an export or report response
#[derive(Debug, Clone, Default)]
pub struct PayPropPage {
    pub items: Vec<Value>,
    pub pagination: Option<Pagination>,
}

impl PayPropPage {
    /// Items live under `items`, `data` or `results` depending on the endpoint.
    /// Pagination is either a nested object or top-level fields.
    pub fn from_value(mut body: Value) -> Self {
        let items = ["items", "data", "results"]
            .iter()
            .find_map(|key| match body.get_mut(*key).map(Value::take) {
                Some(Value::Array(items)) => Some(items),
                _ => None,
            })
            .unwrap_or_default();

        let pagination = match body.get("pagination") {
            Some(p @ Value::Object(_)) => serde_json::from_value(p.clone()).ok(),
            _ if body.get("total_pages").is_some() => serde_json::from_value(body.clone()).ok(),
            _ => None,
        };

        Self { items, pagination }
    }

    /// Whether another page should be requested after `page`
    pub fn has_next(&self, page: u32, page_size: u32) -> bool {
        if self.items.is_empty() {
            return false;
        }
        match self.pagination.as_ref().and_then(|p| p.total_pages) {
            Some(total_pages) => {
                let current = self
                    .pagination
                    .as_ref()
                    .and_then(|p| p.page)
                    .unwrap_or(page);
                current < total_pages
            }
            None => self.items.len() >= page_size as usize,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PayPropEntityRef {
    pub id: Option<String>,
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PayPropIncomingTransaction {
    pub id: Option<String>,
    pub reconciliation_date: Option<NaiveDate>,
    pub property: Option<PayPropEntityRef>,
    pub tenant: Option<PayPropEntityRef>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PayPropPaymentBatch {
    pub id: Option<String>,
    pub status: Option<String>,
    pub transfer_date: Option<NaiveDate>,
}

/// A row of `/report/all-payments`
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PayPropPayment {
    pub id: String,
    pub amount: Decimal,
    pub description: Option<String>,
    pub due_date: Option<NaiveDate>,
    pub reference: Option<String>,
    pub beneficiary: Option<PayPropEntityRef>,
    pub category: Option<PayPropEntityRef>,
    pub incoming_transaction: Option<PayPropIncomingTransaction>,
    pub payment_batch: Option<PayPropPaymentBatch>,
}

impl PayPropPayment {
    pub fn beneficiary_type(&self) -> BeneficiaryType {
        self.beneficiary
            .as_ref()
            .and_then(|b| b.kind.as_deref())
            .map(BeneficiaryType::from_label)
            .unwrap_or(BeneficiaryType::Other)
    }

    pub fn property_payprop_id(&self) -> Option<&str> {
        self.incoming_transaction
            .as_ref()
            .and_then(|t| t.property.as_ref())
            .and_then(|p| p.id.as_deref())
    }

    /// PayProp batch id and transfer date when the payment already left PayProp
    pub fn settlement(&self) -> Option<(String, NaiveDate)> {
        let batch = self.payment_batch.as_ref()?;
        let id = batch.id.clone().filter(|id| !id.is_empty())?;
        let paid = batch
            .transfer_date
            .or(self.due_date)
            .or_else(|| {
                self.incoming_transaction
                    .as_ref()
                    .and_then(|t| t.reconciliation_date)
            })?;
        Some((id, paid))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BeneficiaryType {
    Beneficiary,
    Agency,
    Contractor,
    Other,
}

impl BeneficiaryType {
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "beneficiary" => BeneficiaryType::Beneficiary,
            "agency" => BeneficiaryType::Agency,
            "contractor" => BeneficiaryType::Contractor,
            _ => BeneficiaryType::Other,
        }
    }

    pub fn allocation_type(&self) -> AllocationType {
        match self {
            BeneficiaryType::Beneficiary => AllocationType::Owner,
            BeneficiaryType::Agency => AllocationType::Commission,
            BeneficiaryType::Contractor => AllocationType::Expense,
            BeneficiaryType::Other => AllocationType::Other,
        }
    }
}
