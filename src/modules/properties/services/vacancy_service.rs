use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use tracing::{info, warn};

use crate::core::{AppError, Result};
use crate::modules::properties::models::{
    NewProperty, OccupancyStatus, OccupancyTransition, Property, PropertyFilter,
};
use crate::modules::properties::repositories::PropertyRepository;

/// Property registration and occupancy workflow
pub struct VacancyService {
    properties: Arc<dyn PropertyRepository>,
}

impl VacancyService {
    pub fn new(properties: Arc<dyn PropertyRepository>) -> Self {
        Self { properties }
    }

    pub async fn create_property(&self, new: NewProperty) -> Result<Property> {
        new.validate()?;

        if let Some(block_id) = new.block_property_id {
            let block = self.get_property(block_id).await?;
            if !block.is_block_property {
                return Err(AppError::validation(format!(
                    "Property {} is not a block property",
                    block_id
                )));
            }
        }

        let property = self.properties.create(&new).await.map_err(|e| {
            if e.is_unique_violation() {
                AppError::conflict(format!("Property '{}' already exists", new.name.trim()))
            } else {
                e
            }
        })?;
        info!(property_id = property.id, name = %property.name, "Property registered");
        Ok(property)
    }

    pub async fn get_property(&self, id: i64) -> Result<Property> {
        self.properties
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Property {}", id)))
    }

    pub async fn list_properties(&self, filter: &PropertyFilter) -> Result<Vec<Property>> {
        self.properties.list(filter).await
    }

    /// Properties available now or vacating within the attention window
    pub async fn properties_needing_attention(&self, today: NaiveDate) -> Result<Vec<Property>> {
        let mut candidates = Vec::new();
        for status in [OccupancyStatus::NoticeGiven, OccupancyStatus::Available] {
            let filter = PropertyFilter {
                occupancy_status: Some(status),
                limit: i64::from(u16::MAX),
                ..PropertyFilter::default()
            };
            candidates.extend(self.properties.list(&filter).await?);
        }

        Ok(candidates
            .into_iter()
            .filter(|p| p.needs_attention(today))
            .collect())
    }

    /// Applies a transition against the stored status
    pub async fn transition(&self, id: i64, transition: OccupancyTransition) -> Result<Property> {
        let mut property = self.get_property(id).await?;
        let from = property.apply_transition(&transition, Utc::now())?;

        if !self.properties.update_occupancy(&property, from).await? {
            warn!(property_id = id, from = %from, "Concurrent occupancy change");
            return Err(AppError::conflict(format!(
                "Property {} changed occupancy concurrently; reload and retry",
                id
            )));
        }

        info!(
            property_id = id,
            from = %from,
            to = %property.occupancy_status,
            "Occupancy changed"
        );
        Ok(property)
    }

    pub async fn mark_notice_given(
        &self,
        id: i64,
        notice_date: NaiveDate,
        expected_vacancy_date: NaiveDate,
    ) -> Result<Property> {
        self.transition(
            id,
            OccupancyTransition::NoticeGiven {
                notice_date,
                expected_vacancy_date,
            },
        )
        .await
    }

    pub async fn start_advertising(&self, id: i64, start_date: NaiveDate) -> Result<Property> {
        self.transition(id, OccupancyTransition::StartAdvertising { start_date })
            .await
    }

    pub async fn mark_available(&self, id: i64, available_from: NaiveDate) -> Result<Property> {
        self.transition(id, OccupancyTransition::Available { available_from })
            .await
    }

    pub async fn mark_occupied(&self, id: i64) -> Result<Property> {
        self.transition(id, OccupancyTransition::Occupied).await
    }

    pub async fn mark_maintenance(&self, id: i64) -> Result<Property> {
        self.transition(id, OccupancyTransition::Maintenance).await
    }

    pub async fn take_off_market(&self, id: i64) -> Result<Property> {
        self.transition(id, OccupancyTransition::OffMarket).await
    }
}
