use std::collections::HashMap;
use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use crate::core::import::{require_header, ImportLineError};
use crate::core::Result;
use crate::modules::properties::repositories::PropertyRepository;
use crate::modules::transactions::models::{
    HistoricalTransaction, NewHistoricalTransaction, TransactionImportReport,
    TRANSACTION_CSV_HEADER,
};
use crate::modules::transactions::repositories::HistoricalTransactionRepository;

/// Imports bank statement history and serves it back
pub struct TransactionImportService {
    transactions: Arc<dyn HistoricalTransactionRepository>,
    properties: Arc<dyn PropertyRepository>,
}

impl TransactionImportService {
    pub fn new(
        transactions: Arc<dyn HistoricalTransactionRepository>,
        properties: Arc<dyn PropertyRepository>,
    ) -> Self {
        Self {
            transactions,
            properties,
        }
    }

    /// Imports every valid line; bad lines are reported, not fatal
    pub async fn import_csv(&self, data: &[u8]) -> Result<TransactionImportReport> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(data);
        require_header(reader.headers()?, TRANSACTION_CSV_HEADER)?;

        let import_batch_id = format!("HIST-{}", Uuid::new_v4());
        let mut errors = Vec::new();
        let mut rows = Vec::new();
        let mut property_cache: HashMap<String, Option<i64>> = HashMap::new();
        let mut unresolved_properties = 0;

        for record in reader.records() {
            let record = match record {
                Ok(record) => record,
                Err(e) => {
                    let line = e.position().map(|p| p.line()).unwrap_or_default();
                    errors.push(ImportLineError::new(line, e.to_string()));
                    continue;
                }
            };
            let line = record.position().map(|p| p.line()).unwrap_or_default();

            let mut row = match NewHistoricalTransaction::from_record(&record) {
                Ok(row) => row,
                Err(message) => {
                    errors.push(ImportLineError::new(line, message));
                    continue;
                }
            };

            if let Some(reference) = row.property_reference.clone() {
                let property_id = match property_cache.get(&reference) {
                    Some(cached) => *cached,
                    None => {
                        let found = self
                            .properties
                            .find_by_name(&reference)
                            .await?
                            .map(|p| p.id);
                        property_cache.insert(reference, found);
                        found
                    }
                };
                if property_id.is_none() {
                    unresolved_properties += 1;
                }
                row.property_id = property_id;
            }

            row.import_batch_id = Some(import_batch_id.clone());
            rows.push(row);
        }

        let inserted = self.transactions.insert_all(&rows).await?;

        if !errors.is_empty() {
            warn!(
                import_batch_id = %import_batch_id,
                failed = errors.len(),
                "Transaction import skipped invalid lines"
            );
        }
        info!(
            import_batch_id = %import_batch_id,
            imported = inserted.len(),
            unresolved_properties,
            "Historical transactions imported"
        );

        Ok(TransactionImportReport {
            import_batch_id,
            imported: inserted.len(),
            unresolved_properties,
            errors,
        })
    }

    pub async fn get(&self, id: i64) -> Result<Option<HistoricalTransaction>> {
        self.transactions.find_by_id(id).await
    }

    pub async fn list(
        &self,
        property_id: Option<i64>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<HistoricalTransaction>> {
        self.transactions
            .list(property_id, limit.clamp(1, 500), offset.max(0))
            .await
    }
}
