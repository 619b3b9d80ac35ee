use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, MySql, MySqlPool, Transaction};
use tracing::warn;

use crate::core::{AppError, Result};
use crate::modules::email_settings::models::{
    EmailSettings, EmailTemplate, NewEmailTemplate, SettingsKind, Trigger, TriggerSlot,
};

/// Email templates and the per-user trigger settings that reference them
#[async_trait]
pub trait EmailSettingsRepository: Send + Sync {
    /// A duplicate name surfaces as a unique violation
    async fn create_template(&self, user_id: i64, new: &NewEmailTemplate) -> Result<EmailTemplate>;

    async fn find_template(&self, id: i64) -> Result<Option<EmailTemplate>>;

    async fn find_template_by_name(&self, name: &str) -> Result<Option<EmailTemplate>>;

    /// Settings never saved load as all-disabled
    async fn load_settings(&self, user_id: i64, kind: SettingsKind) -> Result<EmailSettings>;

    async fn save_settings(&self, user_id: i64, settings: &EmailSettings) -> Result<()>;

    /// Saves `settings` and deletes the template in one transaction
    async fn delete_template(
        &self,
        user_id: i64,
        template_id: i64,
        settings: &[EmailSettings],
    ) -> Result<()>;
}

const TEMPLATE_COLUMNS: &str = "id, name, content, json_design, user_id, created_at";

#[derive(Debug, FromRow)]
struct TemplateRow {
    id: i64,
    name: String,
    content: String,
    json_design: Option<String>,
    user_id: i64,
    created_at: DateTime<Utc>,
}

impl From<TemplateRow> for EmailTemplate {
    fn from(row: TemplateRow) -> Self {
        EmailTemplate {
            id: row.id,
            name: row.name,
            content: row.content,
            json_design: row.json_design,
            user_id: row.user_id,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct SlotRow {
    trigger_name: String,
    enabled: bool,
    template_id: Option<i64>,
}

pub struct MySqlEmailSettingsRepository {
    pool: MySqlPool,
}

impl MySqlEmailSettingsRepository {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

async fn upsert_settings(
    tx: &mut Transaction<'_, MySql>,
    user_id: i64,
    settings: &EmailSettings,
) -> Result<()> {
    let kind = settings.kind();
    let now = Utc::now();
    for (trigger, slot) in settings.slots() {
        sqlx::query(
            r#"
            INSERT INTO email_trigger_settings (user_id, kind, trigger_name, enabled, template_id, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON DUPLICATE KEY UPDATE
                enabled = VALUES(enabled),
                template_id = VALUES(template_id),
                updated_at = VALUES(updated_at)
            "#,
        )
        .bind(user_id)
        .bind(kind.as_str())
        .bind(trigger.as_str())
        .bind(slot.enabled)
        .bind(slot.template_id)
        .bind(now)
        .execute(tx.as_mut())
        .await?;
    }
    Ok(())
}

#[async_trait]
impl EmailSettingsRepository for MySqlEmailSettingsRepository {
    async fn create_template(&self, user_id: i64, new: &NewEmailTemplate) -> Result<EmailTemplate> {
        let result = sqlx::query(
            r#"
            INSERT INTO email_templates (name, content, json_design, user_id, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&new.name)
        .bind(&new.content)
        .bind(&new.json_design)
        .bind(user_id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::from_insert(e, format!("Template name {} is already used", new.name)))?;

        let id = result.last_insert_id() as i64;
        self.find_template(id)
            .await?
            .ok_or_else(|| AppError::internal(format!("Email template {} vanished after insert", id)))
    }

    async fn find_template(&self, id: i64) -> Result<Option<EmailTemplate>> {
        let sql = format!("SELECT {} FROM email_templates WHERE id = ?", TEMPLATE_COLUMNS);
        let row = sqlx::query_as::<_, TemplateRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(EmailTemplate::from))
    }

    async fn find_template_by_name(&self, name: &str) -> Result<Option<EmailTemplate>> {
        let sql = format!("SELECT {} FROM email_templates WHERE name = ?", TEMPLATE_COLUMNS);
        let row = sqlx::query_as::<_, TemplateRow>(&sql)
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(EmailTemplate::from))
    }

    async fn load_settings(&self, user_id: i64, kind: SettingsKind) -> Result<EmailSettings> {
        let rows = sqlx::query_as::<_, SlotRow>(
            r#"
            SELECT trigger_name, enabled, template_id
            FROM email_trigger_settings
            WHERE user_id = ? AND kind = ?
            "#,
        )
        .bind(user_id)
        .bind(kind.as_str())
        .fetch_all(&self.pool)
        .await?;

        let mut settings = EmailSettings::empty(kind);
        for row in rows {
            let Ok(trigger) = Trigger::parse(kind, &row.trigger_name) else {
                warn!(user_id, kind = kind.as_str(), trigger = %row.trigger_name, "Ignoring unknown stored trigger");
                continue;
            };
            *settings.slot_mut(trigger)? = TriggerSlot {
                enabled: row.enabled,
                template_id: row.template_id,
            };
        }
        Ok(settings)
    }

    async fn save_settings(&self, user_id: i64, settings: &EmailSettings) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        upsert_settings(&mut tx, user_id, settings).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn delete_template(
        &self,
        user_id: i64,
        template_id: i64,
        settings: &[EmailSettings],
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        for s in settings {
            upsert_settings(&mut tx, user_id, s).await?;
        }

        sqlx::query(
            "UPDATE email_trigger_settings SET enabled = FALSE, template_id = NULL WHERE template_id = ?",
        )
        .bind(template_id)
        .execute(tx.as_mut())
        .await?;

        let deleted = sqlx::query("DELETE FROM email_templates WHERE id = ? AND user_id = ?")
            .bind(template_id)
            .bind(user_id)
            .execute(tx.as_mut())
            .await?
            .rows_affected();
        if deleted == 0 {
            return Err(AppError::not_found(format!("Email template {}", template_id)));
        }

        tx.commit().await?;
        Ok(())
    }
}
