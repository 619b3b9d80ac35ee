mod email_settings;
mod email_template;

pub use email_settings::{
    ContractEmailSettings, ContractTrigger, EmailSettings, LeadEmailSettings, LeadTrigger,
    SettingsKind, TicketEmailSettings, TicketTrigger, Trigger, TriggerSlot,
};
pub use email_template::{EmailTemplate, NewEmailTemplate};
