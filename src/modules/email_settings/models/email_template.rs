use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::{AppError, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailTemplate {
    pub id: i64,
    pub name: String,
    pub content: String,
    pub json_design: Option<String>,
    pub user_id: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewEmailTemplate {
    pub name: String,
    pub content: String,
    pub json_design: Option<String>,
}

impl NewEmailTemplate {
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(AppError::validation("Template name is required"));
        }
        if self.content.trim().is_empty() {
            return Err(AppError::validation("Template content is required"));
        }
        Ok(())
    }
}
