// Per-user email trigger settings. Each settings kind has a fixed set of
// trigger slots; a slot fires its template when enabled.

use serde::{Deserialize, Serialize};

use crate::core::{AppError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SettingsKind {
    Contract,
    Ticket,
    Lead,
}

impl SettingsKind {
    pub const ALL: [SettingsKind; 3] = [SettingsKind::Contract, SettingsKind::Ticket, SettingsKind::Lead];

    pub fn as_str(&self) -> &'static str {
        match self {
            SettingsKind::Contract => "CONTRACT",
            SettingsKind::Ticket => "TICKET",
            SettingsKind::Lead => "LEAD",
        }
    }
}

impl std::str::FromStr for SettingsKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "CONTRACT" => Ok(SettingsKind::Contract),
            "TICKET" => Ok(SettingsKind::Ticket),
            "LEAD" => Ok(SettingsKind::Lead),
            _ => Err(format!("Invalid settings kind: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ContractTrigger {
    Status,
    Amount,
    Subject,
    Description,
    StartDate,
    EndDate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TicketTrigger {
    Subject,
    Description,
    Status,
    Priority,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LeadTrigger {
    Name,
    Status,
    Phone,
    Meeting,
}

/// A trigger of any kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Trigger {
    Contract(ContractTrigger),
    Ticket(TicketTrigger),
    Lead(LeadTrigger),
}

impl Trigger {
    /// Parses a trigger name within a kind, e.g. `START_DATE` for contracts
    pub fn parse(kind: SettingsKind, name: &str) -> Result<Self> {
        let value = serde_json::Value::String(name.trim().to_ascii_uppercase());
        let parsed = match kind {
            SettingsKind::Contract => serde_json::from_value(value).map(Trigger::Contract),
            SettingsKind::Ticket => serde_json::from_value(value).map(Trigger::Ticket),
            SettingsKind::Lead => serde_json::from_value(value).map(Trigger::Lead),
        };
        parsed.map_err(|_| {
            AppError::validation(format!(
                "{} is not a {} trigger",
                name,
                kind.as_str()
            ))
        })
    }

    pub fn kind(&self) -> SettingsKind {
        match self {
            Trigger::Contract(_) => SettingsKind::Contract,
            Trigger::Ticket(_) => SettingsKind::Ticket,
            Trigger::Lead(_) => SettingsKind::Lead,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Trigger::Contract(t) => match t {
                ContractTrigger::Status => "STATUS",
                ContractTrigger::Amount => "AMOUNT",
                ContractTrigger::Subject => "SUBJECT",
                ContractTrigger::Description => "DESCRIPTION",
                ContractTrigger::StartDate => "START_DATE",
                ContractTrigger::EndDate => "END_DATE",
            },
            Trigger::Ticket(t) => match t {
                TicketTrigger::Subject => "SUBJECT",
                TicketTrigger::Description => "DESCRIPTION",
                TicketTrigger::Status => "STATUS",
                TicketTrigger::Priority => "PRIORITY",
            },
            Trigger::Lead(t) => match t {
                LeadTrigger::Name => "NAME",
                LeadTrigger::Status => "STATUS",
                LeadTrigger::Phone => "PHONE",
                LeadTrigger::Meeting => "MEETING",
            },
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerSlot {
    pub enabled: bool,
    pub template_id: Option<i64>,
}

impl TriggerSlot {
    /// Disables the slot if it uses `template_id`; returns whether it did
    fn detach(&mut self, template_id: i64) -> bool {
        if self.template_id == Some(template_id) {
            *self = TriggerSlot::default();
            true
        } else {
            false
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractEmailSettings {
    pub status: TriggerSlot,
    pub amount: TriggerSlot,
    pub subject: TriggerSlot,
    pub description: TriggerSlot,
    pub start_date: TriggerSlot,
    pub end_date: TriggerSlot,
}

impl ContractEmailSettings {
    pub fn slot_mut(&mut self, trigger: ContractTrigger) -> &mut TriggerSlot {
        match trigger {
            ContractTrigger::Status => &mut self.status,
            ContractTrigger::Amount => &mut self.amount,
            ContractTrigger::Subject => &mut self.subject,
            ContractTrigger::Description => &mut self.description,
            ContractTrigger::StartDate => &mut self.start_date,
            ContractTrigger::EndDate => &mut self.end_date,
        }
    }

    fn slots(&self) -> Vec<(Trigger, TriggerSlot)> {
        vec![
            (Trigger::Contract(ContractTrigger::Status), self.status),
            (Trigger::Contract(ContractTrigger::Amount), self.amount),
            (Trigger::Contract(ContractTrigger::Subject), self.subject),
            (Trigger::Contract(ContractTrigger::Description), self.description),
            (Trigger::Contract(ContractTrigger::StartDate), self.start_date),
            (Trigger::Contract(ContractTrigger::EndDate), self.end_date),
        ]
    }

    fn slots_mut(&mut self) -> [&mut TriggerSlot; 6] {
        [
            &mut self.status,
            &mut self.amount,
            &mut self.subject,
            &mut self.description,
            &mut self.start_date,
            &mut self.end_date,
        ]
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketEmailSettings {
    pub subject: TriggerSlot,
    pub description: TriggerSlot,
    pub status: TriggerSlot,
    pub priority: TriggerSlot,
}

impl TicketEmailSettings {
    pub fn slot_mut(&mut self, trigger: TicketTrigger) -> &mut TriggerSlot {
        match trigger {
            TicketTrigger::Subject => &mut self.subject,
            TicketTrigger::Description => &mut self.description,
            TicketTrigger::Status => &mut self.status,
            TicketTrigger::Priority => &mut self.priority,
        }
    }

    fn slots(&self) -> Vec<(Trigger, TriggerSlot)> {
        vec![
            (Trigger::Ticket(TicketTrigger::Subject), self.subject),
            (Trigger::Ticket(TicketTrigger::Description), self.description),
            (Trigger::Ticket(TicketTrigger::Status), self.status),
            (Trigger::Ticket(TicketTrigger::Priority), self.priority),
        ]
    }

    fn slots_mut(&mut self) -> [&mut TriggerSlot; 4] {
        [
            &mut self.subject,
            &mut self.description,
            &mut self.status,
            &mut self.priority,
        ]
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeadEmailSettings {
    pub name: TriggerSlot,
    pub status: TriggerSlot,
    pub phone: TriggerSlot,
    pub meeting: TriggerSlot,
}

impl LeadEmailSettings {
    pub fn slot_mut(&mut self, trigger: LeadTrigger) -> &mut TriggerSlot {
        match trigger {
            LeadTrigger::Name => &mut self.name,
            LeadTrigger::Status => &mut self.status,
            LeadTrigger::Phone => &mut self.phone,
            LeadTrigger::Meeting => &mut self.meeting,
        }
    }

    fn slots(&self) -> Vec<(Trigger, TriggerSlot)> {
        vec![
            (Trigger::Lead(LeadTrigger::Name), self.name),
            (Trigger::Lead(LeadTrigger::Status), self.status),
            (Trigger::Lead(LeadTrigger::Phone), self.phone),
            (Trigger::Lead(LeadTrigger::Meeting), self.meeting),
        ]
    }

    fn slots_mut(&mut self) -> [&mut TriggerSlot; 4] {
        [
            &mut self.name,
            &mut self.status,
            &mut self.phone,
            &mut self.meeting,
        ]
    }
}

/// One user's settings for one kind
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "triggers", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EmailSettings {
    Contract(ContractEmailSettings),
    Ticket(TicketEmailSettings),
    Lead(LeadEmailSettings),
}

impl EmailSettings {
    pub fn empty(kind: SettingsKind) -> Self {
        match kind {
            SettingsKind::Contract => EmailSettings::Contract(ContractEmailSettings::default()),
            SettingsKind::Ticket => EmailSettings::Ticket(TicketEmailSettings::default()),
            SettingsKind::Lead => EmailSettings::Lead(LeadEmailSettings::default()),
        }
    }

    pub fn kind(&self) -> SettingsKind {
        match self {
            EmailSettings::Contract(_) => SettingsKind::Contract,
            EmailSettings::Ticket(_) => SettingsKind::Ticket,
            EmailSettings::Lead(_) => SettingsKind::Lead,
        }
    }

    /// The slot for `trigger`, or `Validation` when it belongs to another kind
    pub fn slot_mut(&mut self, trigger: Trigger) -> Result<&mut TriggerSlot> {
        let kind = self.kind();
        match (self, trigger) {
            (EmailSettings::Contract(s), Trigger::Contract(t)) => Ok(s.slot_mut(t)),
            (EmailSettings::Ticket(s), Trigger::Ticket(t)) => Ok(s.slot_mut(t)),
            (EmailSettings::Lead(s), Trigger::Lead(t)) => Ok(s.slot_mut(t)),
            (_, trigger) => Err(AppError::validation(format!(
                "{} trigger {} does not apply to {} settings",
                trigger.kind().as_str(),
                trigger.as_str(),
                kind.as_str()
            ))),
        }
    }

    /// Every trigger with its current slot, in declaration order
    pub fn slots(&self) -> Vec<(Trigger, TriggerSlot)> {
        match self {
            EmailSettings::Contract(s) => s.slots(),
            EmailSettings::Ticket(s) => s.slots(),
            EmailSettings::Lead(s) => s.slots(),
        }
    }

    /// Disables and clears every slot using `template_id`; returns how many changed
    pub fn detach_template(&mut self, template_id: i64) -> usize {
        match self {
            EmailSettings::Contract(s) => detach_all(&mut s.slots_mut(), template_id),
            EmailSettings::Ticket(s) => detach_all(&mut s.slots_mut(), template_id),
            EmailSettings::Lead(s) => detach_all(&mut s.slots_mut(), template_id),
        }
    }
}

fn detach_all(slots: &mut [&mut TriggerSlot], template_id: i64) -> usize {
    slots
        .iter_mut()
        .map(|slot| slot.detach(template_id))
        .filter(|changed| *changed)
        .count()
}
