use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{info, warn};

use crate::core::import::{require_header, ImportLineError};
use crate::core::{AppError, Result};
use crate::modules::leases::models::{
    Lease, LeaseImportReport, LeaseImportRow, NewLease, LEASE_CSV_HEADER,
};
use crate::modules::leases::repositories::LeaseRepository;
use crate::modules::properties::models::Property;
use crate::modules::properties::repositories::PropertyRepository;

pub struct LeaseService {
    leases: Arc<dyn LeaseRepository>,
    properties: Arc<dyn PropertyRepository>,
}

impl LeaseService {
    pub fn new(leases: Arc<dyn LeaseRepository>, properties: Arc<dyn PropertyRepository>) -> Self {
        Self { leases, properties }
    }

    pub async fn create_lease(&self, new: NewLease) -> Result<Lease> {
        new.validate()?;
        if self.properties.find_by_id(new.property_id).await?.is_none() {
            return Err(AppError::not_found(format!("Property {}", new.property_id)));
        }
        if self
            .leases
            .find_by_reference(&new.lease_reference)
            .await?
            .is_some()
        {
            return Err(AppError::conflict(format!(
                "Lease reference {} already exists",
                new.lease_reference
            )));
        }

        let lease = self.leases.create(&new).await.map_err(|e| {
            if e.is_unique_violation() {
                AppError::conflict(format!(
                    "Lease reference {} already exists",
                    new.lease_reference
                ))
            } else {
                e
            }
        })?;

        info!(
            lease_id = lease.id,
            lease_reference = %lease.lease_reference,
            property_id = lease.property_id,
            frequency = lease.frequency.as_str(),
            "Lease created"
        );
        Ok(lease)
    }

    pub async fn get(&self, id: i64) -> Result<Lease> {
        self.leases
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Lease {}", id)))
    }

    pub async fn list_by_property(&self, property_id: i64) -> Result<Vec<Lease>> {
        self.leases.list_by_property(property_id).await
    }

    /// Due dates of a lease within `[from, to]`
    pub async fn schedule(&self, id: i64, from: NaiveDate, to: NaiveDate) -> Result<Vec<NaiveDate>> {
        if to < from {
            return Err(AppError::validation("Schedule window ends before it starts"));
        }
        Ok(self.get(id).await?.due_dates(from, to))
    }

    /// Creates a lease per valid line. References already on file, or repeated
    /// within the upload, are skipped rather than failed.
    pub async fn import_csv(&self, data: &[u8]) -> Result<LeaseImportReport> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(data);
        require_header(reader.headers()?, LEASE_CSV_HEADER)?;

        let mut imported = 0;
        let mut skipped_duplicates = Vec::new();
        let mut errors = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();
        let mut property_cache: HashMap<String, Option<Property>> = HashMap::new();

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

            let row = match LeaseImportRow::from_record(&record) {
                Ok(row) => row,
                Err(message) => {
                    errors.push(ImportLineError::new(line, message));
                    continue;
                }
            };

            if !seen.insert(row.lease_reference.clone())
                || self
                    .leases
                    .find_by_reference(&row.lease_reference)
                    .await?
                    .is_some()
            {
                skipped_duplicates.push(row.lease_reference);
                continue;
            }

            let property = match property_cache.get(&row.property_reference) {
                Some(cached) => cached.clone(),
                None => {
                    let found = self.properties.find_by_name(&row.property_reference).await?;
                    property_cache.insert(row.property_reference.clone(), found.clone());
                    found
                }
            };
            let Some(property) = property else {
                errors.push(ImportLineError::new(
                    line,
                    format!("Property not found: {}", row.property_reference),
                ));
                continue;
            };

            let new = row.into_new_lease(property.id, &property.name);
            if let Err(e) = new.validate() {
                errors.push(ImportLineError::new(line, e.to_string()));
                continue;
            }
            match self.leases.create(&new).await {
                Ok(_) => imported += 1,
                Err(e) if e.is_unique_violation() => skipped_duplicates.push(new.lease_reference),
                Err(e) => return Err(e),
            }
        }

        if !errors.is_empty() {
            warn!(failed = errors.len(), "Lease import skipped invalid lines");
        }
        info!(
            imported,
            duplicates = skipped_duplicates.len(),
            "Leases imported"
        );

        Ok(LeaseImportReport {
            imported,
            skipped_duplicates,
            errors,
        })
    }
}
