use std::sync::Arc;

use tracing::info;

use crate::core::{AppError, Result};
use crate::modules::email_settings::models::{
    EmailSettings, EmailTemplate, NewEmailTemplate, SettingsKind, Trigger, TriggerSlot,
};
use crate::modules::email_settings::repositories::EmailSettingsRepository;

pub struct EmailSettingsService {
    repository: Arc<dyn EmailSettingsRepository>,
}

impl EmailSettingsService {
    pub fn new(repository: Arc<dyn EmailSettingsRepository>) -> Self {
        Self { repository }
    }

    /// Template names are unique across all users
    pub async fn create_template(&self, user_id: i64, new: NewEmailTemplate) -> Result<EmailTemplate> {
        new.validate()?;
        let name_taken = || AppError::conflict(format!("Template name {} is already used", new.name));
        if self.repository.find_template_by_name(&new.name).await?.is_some() {
            return Err(name_taken());
        }
        match self.repository.create_template(user_id, &new).await {
            Ok(template) => {
                info!(template_id = template.id, user_id, "Email template created");
                Ok(template)
            }
            Err(e) if e.is_unique_violation() => Err(name_taken()),
            Err(e) => Err(e),
        }
    }

    pub async fn get_settings(&self, user_id: i64, kind: SettingsKind) -> Result<EmailSettings> {
        self.repository.load_settings(user_id, kind).await
    }

    /// Enabling a trigger requires a template owned by the user
    pub async fn set_trigger(
        &self,
        user_id: i64,
        kind: SettingsKind,
        trigger: &str,
        enabled: bool,
        template_id: Option<i64>,
    ) -> Result<EmailSettings> {
        let trigger = Trigger::parse(kind, trigger)?;

        if let Some(id) = template_id {
            self.owned_template(user_id, id).await?;
        } else if enabled {
            return Err(AppError::validation("An enabled trigger needs a template"));
        }

        let mut settings = self.repository.load_settings(user_id, kind).await?;
        *settings.slot_mut(trigger)? = TriggerSlot {
            enabled,
            template_id,
        };
        self.repository.save_settings(user_id, &settings).await?;

        info!(
            user_id,
            kind = kind.as_str(),
            trigger = trigger.as_str(),
            enabled,
            "Email trigger updated"
        );
        Ok(settings)
    }

    /// Deletes a template after detaching it from every trigger that uses it
    pub async fn delete_template(&self, user_id: i64, template_id: i64) -> Result<()> {
        self.owned_template(user_id, template_id).await?;

        let mut changed = Vec::new();
        let mut detached = 0;
        for kind in SettingsKind::ALL {
            let mut settings = self.repository.load_settings(user_id, kind).await?;
            let count = settings.detach_template(template_id);
            if count > 0 {
                detached += count;
                changed.push(settings);
            }
        }

        self.repository
            .delete_template(user_id, template_id, &changed)
            .await?;
        info!(template_id, user_id, detached, "Email template deleted");
        Ok(())
    }

    async fn owned_template(&self, user_id: i64, template_id: i64) -> Result<EmailTemplate> {
        let template = self
            .repository
            .find_template(template_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Email template {}", template_id)))?;
        if template.user_id != user_id {
            return Err(AppError::forbidden(format!(
                "Email template {} belongs to another user",
                template_id
            )));
        }
        Ok(template)
    }
}
