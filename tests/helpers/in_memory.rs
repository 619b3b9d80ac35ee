// In-memory implementation of every repository trait
//
// One mutex guards the whole store, so each call is atomic the way the
// MySQL repositories make it with a transaction. Orderings and conflict
// rules follow the SQL in the MySQL implementations.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;

use propledger::core::{AppError, Result};
use propledger::middleware::{hash_api_key, ApiKeyRecord, ApiKeyStore};
use propledger::modules::allocations::models::{
    AllocationFilter, AllocationType, NewAllocation, PaymentStatus, PendingTotals, TransactionKey,
    UnifiedAllocation,
};
use propledger::modules::allocations::AllocationRepository;
use propledger::modules::balances::models::{
    post_movements, touched_property_ids, AccountState, BalanceMovement, EntryType, LedgerEntry,
    LedgerQuery, UnitContribution,
};
use propledger::modules::balances::LedgerRepository;
use propledger::modules::batches::models::{BatchStatus, PaymentBatch};
use propledger::modules::batches::BatchRepository;
use propledger::modules::email_settings::models::{
    EmailSettings, EmailTemplate, NewEmailTemplate, SettingsKind,
};
use propledger::modules::email_settings::EmailSettingsRepository;
use propledger::modules::leases::models::{Lease, NewLease};
use propledger::modules::leases::LeaseRepository;
use propledger::modules::owner_payments::models::{BeneficiaryPending, StatusCount};
use propledger::modules::owner_payments::DashboardRepository;
use propledger::modules::properties::models::{
    NewProperty, OccupancyStatus, Property, PropertyFilter,
};
use propledger::modules::properties::PropertyRepository;
use propledger::modules::transactions::models::{HistoricalTransaction, NewHistoricalTransaction};
use propledger::modules::transactions::HistoricalTransactionRepository;
use propledger::Repositories;

#[derive(Default)]
struct State {
    next_id: i64,
    properties: BTreeMap<i64, Property>,
    ledger: Vec<LedgerEntry>,
    allocations: BTreeMap<i64, UnifiedAllocation>,
    transactions: BTreeMap<i64, HistoricalTransaction>,
    batches: BTreeMap<i64, PaymentBatch>,
    leases: BTreeMap<i64, Lease>,
    templates: BTreeMap<i64, EmailTemplate>,
    settings: HashMap<(i64, SettingsKind), EmailSettings>,
    api_keys: HashMap<String, ApiKeyRecord>,
}

impl State {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    /// Posts movements against the current balances; writes nothing on error
    fn apply_movements(&mut self, movements: &[BalanceMovement]) -> Result<Vec<LedgerEntry>> {
        if movements.is_empty() {
            return Ok(Vec::new());
        }

        let mut accounts: BTreeMap<i64, AccountState> = touched_property_ids(movements)
            .into_iter()
            .filter_map(|id| self.properties.get(&id))
            .map(|p| {
                (
                    p.id,
                    AccountState {
                        property_id: p.id,
                        property_name: p.name.clone(),
                        owner_id: p.owner_id,
                        balance: p.account_balance,
                        minimum_balance: p.minimum_balance,
                        has_entries: self.ledger.iter().any(|e| e.property_id == p.id),
                    },
                )
            })
            .collect();

        let posted = post_movements(&mut accounts, movements)?;
        let now = Utc::now();
        let mut entries = Vec::with_capacity(posted.len());
        for entry in posted {
            let id = self.next_id();
            let entry = LedgerEntry::from_new(entry, id, now);
            self.ledger.push(entry.clone());
            entries.push(entry);
        }

        for account in accounts.values() {
            if !movements.iter().any(|m| m.property_id == account.property_id) {
                continue;
            }
            if let Some(property) = self.properties.get_mut(&account.property_id) {
                property.account_balance = account.balance;
                property.updated_at = now;
            }
        }
        Ok(entries)
    }

    fn ledger_matches(entry: &LedgerEntry, query: &LedgerQuery) -> bool {
        query.property_id.map_or(true, |id| entry.property_id == id)
            && query.owner_id.map_or(true, |id| entry.owner_id == Some(id))
            && query
                .payment_batch_id
                .as_ref()
                .map_or(true, |b| entry.payment_batch_id.as_ref() == Some(b))
            && query.from.map_or(true, |from| entry.entry_date >= from)
            && query.to.map_or(true, |to| entry.entry_date <= to)
    }
}

fn page<T>(items: impl Iterator<Item = T>, limit: i64, offset: i64) -> Vec<T> {
    items
        .skip(usize::try_from(offset).unwrap_or(0))
        .take(usize::try_from(limit).unwrap_or(0))
        .collect()
}

#[derive(Default)]
pub struct InMemoryStore {
    state: Mutex<State>,
    stale_allocation_lookups: AtomicUsize,
}

impl InMemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn repositories(self: &Arc<Self>) -> Repositories {
        Repositories {
            properties: self.clone(),
            ledger: self.clone(),
            allocations: self.clone(),
            transactions: self.clone(),
            batches: self.clone(),
            leases: self.clone(),
            dashboard: self.clone(),
            email_settings: self.clone(),
        }
    }

    /// The next `count` allocation lookups by transaction see no row, as a
    /// reader would while a concurrent insert is still uncommitted
    pub fn hide_allocation_lookups(&self, count: usize) {
        self.stale_allocation_lookups.store(count, Ordering::SeqCst);
    }

    /// Registers an API key stored as `hash_api_key(secret, key)`
    pub fn add_api_key(&self, secret: &str, key: &str, user_id: i64, role: &str, customer_id: Option<i64>) {
        let mut state = self.state.lock().unwrap();
        let id = state.next_id();
        state.api_keys.insert(
            hash_api_key(secret, key).unwrap(),
            ApiKeyRecord {
                id,
                user_id,
                role: role.to_string(),
                customer_id,
                is_active: true,
            },
        );
    }

    pub fn ledger_entries(&self, property_id: i64) -> Vec<LedgerEntry> {
        let state = self.state.lock().unwrap();
        state
            .ledger
            .iter()
            .filter(|e| e.property_id == property_id)
            .cloned()
            .collect()
    }

    pub fn allocation(&self, id: i64) -> Option<UnifiedAllocation> {
        self.state.lock().unwrap().allocations.get(&id).cloned()
    }

    pub fn allocation_count(&self) -> usize {
        self.state.lock().unwrap().allocations.len()
    }
}

#[async_trait]
impl PropertyRepository for InMemoryStore {
    async fn create(&self, new: &NewProperty) -> Result<Property> {
        let mut state = self.state.lock().unwrap();
        let name = new.name.trim().to_string();
        let duplicate_payprop = new.payprop_id.is_some()
            && state.properties.values().any(|p| p.payprop_id == new.payprop_id);
        if duplicate_payprop || state.properties.values().any(|p| p.name == name) {
            return Err(AppError::duplicate(format!("Property '{}' already exists", name)));
        }

        let now = Utc::now();
        let id = state.next_id();
        let property = Property {
            id,
            name,
            payprop_id: new.payprop_id.clone(),
            owner_id: new.owner_id,
            owner_name: new.owner_name.clone(),
            is_block_property: new.is_block_property,
            block_property_id: new.block_property_id,
            account_balance: Decimal::ZERO,
            minimum_balance: new.minimum_balance,
            occupancy_status: OccupancyStatus::default(),
            notice_given_date: None,
            expected_vacancy_date: None,
            advertising_start_date: None,
            available_from_date: None,
            last_occupancy_change: None,
            created_at: now,
            updated_at: now,
        };
        state.properties.insert(id, property.clone());
        Ok(property)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Property>> {
        Ok(self.state.lock().unwrap().properties.get(&id).cloned())
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<Property>> {
        let name = name.trim();
        let state = self.state.lock().unwrap();
        Ok(state.properties.values().find(|p| p.name == name).cloned())
    }

    async fn find_by_payprop_id(&self, payprop_id: &str) -> Result<Option<Property>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .properties
            .values()
            .find(|p| p.payprop_id.as_deref() == Some(payprop_id))
            .cloned())
    }

    async fn list(&self, filter: &PropertyFilter) -> Result<Vec<Property>> {
        let state = self.state.lock().unwrap();
        let mut matching: Vec<Property> = state
            .properties
            .values()
            .filter(|p| filter.occupancy_status.map_or(true, |s| p.occupancy_status == s))
            .filter(|p| filter.owner_id.map_or(true, |o| p.owner_id == Some(o)))
            .filter(|p| {
                filter
                    .block_property_id
                    .map_or(true, |b| p.block_property_id == Some(b))
            })
            .cloned()
            .collect();
        matching.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(page(matching.into_iter(), filter.limit, filter.offset))
    }

    async fn update_occupancy(&self, property: &Property, expected: OccupancyStatus) -> Result<bool> {
        let mut state = self.state.lock().unwrap();
        match state.properties.get_mut(&property.id) {
            Some(stored) if stored.occupancy_status == expected => {
                let account_balance = stored.account_balance;
                *stored = property.clone();
                stored.account_balance = account_balance;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn set_account_balance(&self, id: i64, balance: Decimal) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let property = state
            .properties
            .get_mut(&id)
            .ok_or_else(|| AppError::not_found(format!("Property {}", id)))?;
        property.account_balance = balance;
        Ok(())
    }

    async fn total_balance_for_owner(&self, owner_id: i64) -> Result<Decimal> {
        let state = self.state.lock().unwrap();
        Ok(state
            .properties
            .values()
            .filter(|p| p.owner_id == Some(owner_id))
            .map(|p| p.account_balance)
            .sum())
    }
}

#[async_trait]
impl LedgerRepository for InMemoryStore {
    async fn apply(&self, movements: &[BalanceMovement]) -> Result<Vec<LedgerEntry>> {
        self.state.lock().unwrap().apply_movements(movements)
    }

    async fn has_entries(&self, property_id: i64) -> Result<bool> {
        let state = self.state.lock().unwrap();
        Ok(state.ledger.iter().any(|e| e.property_id == property_id))
    }

    async fn latest_entry(&self, property_id: i64) -> Result<Option<LedgerEntry>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .ledger
            .iter()
            .filter(|e| e.property_id == property_id)
            .max_by_key(|e| e.id)
            .cloned())
    }

    async fn latest_entry_as_of(
        &self,
        property_id: i64,
        date: NaiveDate,
    ) -> Result<Option<LedgerEntry>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .ledger
            .iter()
            .filter(|e| e.property_id == property_id && e.entry_date <= date)
            .max_by_key(|e| (e.entry_date, e.id))
            .cloned())
    }

    async fn history(&self, query: &LedgerQuery) -> Result<Vec<LedgerEntry>> {
        let state = self.state.lock().unwrap();
        let mut entries: Vec<LedgerEntry> = state
            .ledger
            .iter()
            .filter(|e| State::ledger_matches(e, query))
            .cloned()
            .collect();
        entries.sort_by(|a, b| (b.entry_date, b.id).cmp(&(a.entry_date, a.id)));
        Ok(page(entries.into_iter(), query.limit, query.offset))
    }

    async fn count(&self, query: &LedgerQuery) -> Result<i64> {
        let state = self.state.lock().unwrap();
        Ok(state
            .ledger
            .iter()
            .filter(|e| State::ledger_matches(e, query))
            .count() as i64)
    }

    async fn unit_contributions(
        &self,
        block_property_id: i64,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<UnitContribution>> {
        let state = self.state.lock().unwrap();
        let mut grouped: BTreeMap<i64, UnitContribution> = BTreeMap::new();
        for entry in state.ledger.iter().filter(|e| {
            e.property_id == block_property_id
                && e.entry_type == EntryType::TransferIn
                && e.entry_date >= from
                && e.entry_date <= to
        }) {
            let Some(unit_id) = entry.related_property_id else {
                continue;
            };
            let row = grouped.entry(unit_id).or_insert_with(|| UnitContribution {
                unit_property_id: unit_id,
                unit_property_name: None,
                total: Decimal::ZERO,
                entry_count: 0,
            });
            // MAX() over the group skips NULLs
            if entry.related_property_name > row.unit_property_name {
                row.unit_property_name = entry.related_property_name.clone();
            }
            row.total += entry.amount;
            row.entry_count += 1;
        }
        let mut rows: Vec<UnitContribution> = grouped.into_values().collect();
        rows.sort_by(|a, b| b.total.cmp(&a.total));
        Ok(rows)
    }
}

#[async_trait]
impl AllocationRepository for InMemoryStore {
    async fn insert(&self, new: &NewAllocation, status: PaymentStatus) -> Result<UnifiedAllocation> {
        let mut state = self.state.lock().unwrap();
        let (transaction_id, payprop_payment_id) = match &new.transaction {
            Some(TransactionKey::Historical(id)) => (Some(*id), None),
            Some(TransactionKey::PayProp(payment_id)) => (None, Some(payment_id.clone())),
            None => (None, None),
        };

        // Mirrors the two unique keys; NULL beneficiaries never collide in MySQL
        if new.beneficiary_id.is_some()
            && new.transaction.is_some()
            && state.allocations.values().any(|a| {
                a.beneficiary_id == new.beneficiary_id
                    && a.transaction_key().as_ref() == new.transaction.as_ref()
            })
        {
            return Err(AppError::duplicate("Allocation already recorded for this beneficiary"));
        }

        let now = Utc::now();
        let id = state.next_id();
        let allocation = UnifiedAllocation {
            id,
            transaction_id,
            payprop_payment_id,
            allocation_type: new.allocation_type,
            amount: new.amount,
            category: new.category.clone(),
            description: new.description.clone(),
            property_id: new.property_id,
            property_name: new.property_name.clone(),
            beneficiary_id: new.beneficiary_id,
            beneficiary_name: new.beneficiary_name.clone(),
            payment_status: status,
            payment_batch_id: new.settled.as_ref().map(|s| s.batch_reference.clone()),
            paid_date: new.settled.as_ref().map(|s| s.paid_date),
            source: new.source,
            created_at: now,
            updated_at: now,
        };
        state.allocations.insert(id, allocation.clone());
        Ok(allocation)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<UnifiedAllocation>> {
        Ok(self.state.lock().unwrap().allocations.get(&id).cloned())
    }

    async fn find_by_ids(&self, ids: &[i64]) -> Result<Vec<UnifiedAllocation>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .allocations
            .values()
            .filter(|a| ids.contains(&a.id))
            .cloned()
            .collect())
    }

    async fn find_by_transaction(
        &self,
        key: &TransactionKey,
        beneficiary_id: Option<i64>,
    ) -> Result<Option<UnifiedAllocation>> {
        let hidden = self
            .stale_allocation_lookups
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if hidden {
            return Ok(None);
        }
        let state = self.state.lock().unwrap();
        Ok(state
            .allocations
            .values()
            .find(|a| a.transaction_key().as_ref() == Some(key) && a.beneficiary_id == beneficiary_id)
            .cloned())
    }

    async fn list(&self, filter: &AllocationFilter) -> Result<Vec<UnifiedAllocation>> {
        let state = self.state.lock().unwrap();
        Ok(page(
            state.allocations.values().filter(|a| filter.matches(a)).cloned(),
            filter.limit,
            filter.offset,
        ))
    }

    async fn totals(&self, filter: &AllocationFilter) -> Result<PendingTotals> {
        let state = self.state.lock().unwrap();
        Ok(PendingTotals::from_allocations(
            state.allocations.values().filter(|a| filter.matches(a)),
        ))
    }
}

#[async_trait]
impl HistoricalTransactionRepository for InMemoryStore {
    async fn insert_all(&self, rows: &[NewHistoricalTransaction]) -> Result<Vec<HistoricalTransaction>> {
        let mut state = self.state.lock().unwrap();
        let now = Utc::now();
        let mut inserted = Vec::with_capacity(rows.len());
        for row in rows {
            let id = state.next_id();
            let transaction = HistoricalTransaction {
                id,
                transaction_date: row.transaction_date,
                amount: row.amount,
                description: row.description.clone(),
                transaction_type: row.transaction_type,
                category: row.category.clone(),
                property_id: row.property_id,
                property_reference: row.property_reference.clone(),
                customer_reference: row.customer_reference.clone(),
                bank_reference: row.bank_reference.clone(),
                payment_method: row.payment_method.clone(),
                notes: row.notes.clone(),
                import_batch_id: row.import_batch_id.clone(),
                created_at: now,
            };
            state.transactions.insert(id, transaction.clone());
            inserted.push(transaction);
        }
        Ok(inserted)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<HistoricalTransaction>> {
        Ok(self.state.lock().unwrap().transactions.get(&id).cloned())
    }

    async fn list(
        &self,
        property_id: Option<i64>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<HistoricalTransaction>> {
        let state = self.state.lock().unwrap();
        let mut rows: Vec<HistoricalTransaction> = state
            .transactions
            .values()
            .filter(|t| property_id.map_or(true, |p| t.property_id == Some(p)))
            .cloned()
            .collect();
        rows.sort_by(|a, b| (b.transaction_date, b.id).cmp(&(a.transaction_date, a.id)));
        Ok(page(rows.into_iter(), limit, offset))
    }
}

#[async_trait]
impl BatchRepository for InMemoryStore {
    async fn count_with_prefix(&self, day_prefix: &str) -> Result<i64> {
        let state = self.state.lock().unwrap();
        Ok(state
            .batches
            .values()
            .filter(|b| b.batch_id.starts_with(day_prefix))
            .count() as i64)
    }

    async fn create_with_allocations(
        &self,
        batch: &PaymentBatch,
        allocation_ids: &[i64],
        movements: &[BalanceMovement],
    ) -> Result<(PaymentBatch, Vec<LedgerEntry>)> {
        let mut state = self.state.lock().unwrap();
        if state.batches.values().any(|b| b.batch_id == batch.batch_id) {
            return Err(AppError::duplicate(format!("Batch id {} is taken", batch.batch_id)));
        }

        let claimable = allocation_ids
            .iter()
            .filter(|id| state.allocations.get(id).is_some_and(|a| a.is_pending()))
            .count();
        if claimable != allocation_ids.len() {
            return Err(AppError::conflict(format!(
                "{} of {} allocations were claimed by another batch",
                allocation_ids.len() - claimable,
                allocation_ids.len()
            )));
        }

        let entries = state.apply_movements(movements)?;

        for id in allocation_ids {
            if let Some(allocation) = state.allocations.get_mut(id) {
                allocation.payment_status = PaymentStatus::Batched;
                allocation.payment_batch_id = Some(batch.batch_id.clone());
                allocation.updated_at = batch.updated_at;
            }
        }

        let mut created = batch.clone();
        created.id = state.next_id();
        state.batches.insert(created.id, created.clone());
        Ok((created, entries))
    }

    async fn find_by_batch_id(&self, batch_id: &str) -> Result<Option<PaymentBatch>> {
        let state = self.state.lock().unwrap();
        Ok(state.batches.values().find(|b| b.batch_id == batch_id).cloned())
    }

    async fn save_adjustment(
        &self,
        batch: &PaymentBatch,
        movements: &[BalanceMovement],
    ) -> Result<Vec<LedgerEntry>> {
        let mut state = self.state.lock().unwrap();
        let adjustable = state.batches.values().any(|b| {
            b.batch_id == batch.batch_id && !b.has_adjustment() && b.status != BatchStatus::Paid
        });
        if !adjustable {
            return Err(AppError::conflict(format!(
                "Batch {} was adjusted or paid concurrently",
                batch.batch_id
            )));
        }

        let entries = state.apply_movements(movements)?;
        if let Some(stored) = state.batches.values_mut().find(|b| b.batch_id == batch.batch_id) {
            stored.balance_adjustment = batch.balance_adjustment;
            stored.adjustment_source = batch.adjustment_source;
            stored.adjustment_notes = batch.adjustment_notes.clone();
            stored.adjustment_property_id = batch.adjustment_property_id;
            stored.total_payment = batch.total_payment;
            stored.updated_at = batch.updated_at;
        }
        Ok(entries)
    }

    async fn update_status(&self, batch: &PaymentBatch, expected: BatchStatus) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        match state
            .batches
            .values_mut()
            .find(|b| b.batch_id == batch.batch_id && b.status == expected)
        {
            Some(stored) => {
                stored.status = batch.status;
                stored.updated_at = batch.updated_at;
                Ok(())
            }
            None => Err(AppError::conflict(format!(
                "Batch {} changed status concurrently",
                batch.batch_id
            ))),
        }
    }

    async fn mark_paid(&self, batch: &PaymentBatch, expected: BatchStatus) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let stored = state
            .batches
            .values_mut()
            .find(|b| b.batch_id == batch.batch_id && b.status == expected)
            .ok_or_else(|| {
                AppError::conflict(format!(
                    "Batch {} changed status concurrently",
                    batch.batch_id
                ))
            })?;
        stored.status = BatchStatus::Paid;
        stored.paid_date = batch.paid_date;
        stored.payment_reference = batch.payment_reference.clone();
        stored.updated_at = batch.updated_at;

        for allocation in state
            .allocations
            .values_mut()
            .filter(|a| a.payment_batch_id.as_deref() == Some(batch.batch_id.as_str()))
        {
            allocation.payment_status = PaymentStatus::Paid;
            allocation.paid_date = batch.paid_date;
            allocation.updated_at = batch.updated_at;
        }
        Ok(())
    }

    async fn list_by_status(
        &self,
        statuses: &[BatchStatus],
        limit: i64,
        offset: i64,
    ) -> Result<Vec<PaymentBatch>> {
        let state = self.state.lock().unwrap();
        let mut batches: Vec<PaymentBatch> = state
            .batches
            .values()
            .filter(|b| statuses.contains(&b.status))
            .cloned()
            .collect();
        batches.sort_by(|a, b| (a.payment_date, a.id).cmp(&(b.payment_date, b.id)));
        Ok(page(batches.into_iter(), limit, offset))
    }
}

#[async_trait]
impl LeaseRepository for InMemoryStore {
    async fn create(&self, new: &NewLease) -> Result<Lease> {
        let mut state = self.state.lock().unwrap();
        if state
            .leases
            .values()
            .any(|l| l.lease_reference == new.lease_reference)
        {
            return Err(AppError::duplicate(format!(
                "Lease reference {} already exists",
                new.lease_reference
            )));
        }
        let now = Utc::now();
        let id = state.next_id();
        let lease = Lease {
            id,
            lease_reference: new.lease_reference.clone(),
            property_id: new.property_id,
            tenant_reference: new.tenant_reference.clone(),
            amount: new.amount,
            frequency: new.frequency,
            frequency_months: new.frequency_months,
            payment_day: new.payment_day,
            start_date: new.start_date,
            end_date: new.end_date,
            description: new.description.clone(),
            sync_status: new.sync_status,
            created_at: now,
            updated_at: now,
        };
        state.leases.insert(id, lease.clone());
        Ok(lease)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Lease>> {
        Ok(self.state.lock().unwrap().leases.get(&id).cloned())
    }

    async fn find_by_reference(&self, reference: &str) -> Result<Option<Lease>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .leases
            .values()
            .find(|l| l.lease_reference == reference)
            .cloned())
    }

    async fn list_by_property(&self, property_id: i64) -> Result<Vec<Lease>> {
        let state = self.state.lock().unwrap();
        let mut leases: Vec<Lease> = state
            .leases
            .values()
            .filter(|l| l.property_id == property_id)
            .cloned()
            .collect();
        leases.sort_by(|a, b| (a.start_date, a.id).cmp(&(b.start_date, b.id)));
        Ok(leases)
    }
}

#[async_trait]
impl DashboardRepository for InMemoryStore {
    async fn pending_by_beneficiary(&self) -> Result<Vec<BeneficiaryPending>> {
        let state = self.state.lock().unwrap();
        let mut grouped: BTreeMap<Option<i64>, BeneficiaryPending> = BTreeMap::new();
        for allocation in state.allocations.values().filter(|a| a.is_pending()) {
            let row = grouped
                .entry(allocation.beneficiary_id)
                .or_insert_with(|| BeneficiaryPending {
                    beneficiary_id: allocation.beneficiary_id,
                    beneficiary_name: None,
                    income: Decimal::ZERO,
                    deductions: Decimal::ZERO,
                    net: Decimal::ZERO,
                    allocation_count: 0,
                });
            if allocation.beneficiary_name > row.beneficiary_name {
                row.beneficiary_name = allocation.beneficiary_name.clone();
            }
            if allocation.allocation_type == AllocationType::Owner {
                row.income += allocation.amount;
            } else {
                row.deductions += allocation.amount;
            }
            row.allocation_count += 1;
            row.net = row.income - row.deductions;
        }
        Ok(grouped.into_values().collect())
    }

    async fn status_counts(&self) -> Result<Vec<StatusCount>> {
        let state = self.state.lock().unwrap();
        let mut counts: BTreeMap<&'static str, StatusCount> = BTreeMap::new();
        for allocation in state.allocations.values() {
            counts
                .entry(allocation.payment_status.as_str())
                .or_insert(StatusCount {
                    status: allocation.payment_status,
                    count: 0,
                })
                .count += 1;
        }
        Ok(counts.into_values().collect())
    }
}

#[async_trait]
impl EmailSettingsRepository for InMemoryStore {
    async fn create_template(&self, user_id: i64, new: &NewEmailTemplate) -> Result<EmailTemplate> {
        let mut state = self.state.lock().unwrap();
        if state.templates.values().any(|t| t.name == new.name) {
            return Err(AppError::duplicate(format!(
                "Template name {} is already used",
                new.name
            )));
        }
        let id = state.next_id();
        let template = EmailTemplate {
            id,
            name: new.name.clone(),
            content: new.content.clone(),
            json_design: new.json_design.clone(),
            user_id,
            created_at: Utc::now(),
        };
        state.templates.insert(id, template.clone());
        Ok(template)
    }

    async fn find_template(&self, id: i64) -> Result<Option<EmailTemplate>> {
        Ok(self.state.lock().unwrap().templates.get(&id).cloned())
    }

    async fn find_template_by_name(&self, name: &str) -> Result<Option<EmailTemplate>> {
        let state = self.state.lock().unwrap();
        Ok(state.templates.values().find(|t| t.name == name).cloned())
    }

    async fn load_settings(&self, user_id: i64, kind: SettingsKind) -> Result<EmailSettings> {
        let state = self.state.lock().unwrap();
        Ok(state
            .settings
            .get(&(user_id, kind))
            .cloned()
            .unwrap_or_else(|| EmailSettings::empty(kind)))
    }

    async fn save_settings(&self, user_id: i64, settings: &EmailSettings) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state
            .settings
            .insert((user_id, settings.kind()), settings.clone());
        Ok(())
    }

    async fn delete_template(
        &self,
        user_id: i64,
        template_id: i64,
        settings: &[EmailSettings],
    ) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let owned = state
            .templates
            .get(&template_id)
            .is_some_and(|t| t.user_id == user_id);
        if !owned {
            return Err(AppError::not_found(format!("Email template {}", template_id)));
        }

        for s in settings {
            state.settings.insert((user_id, s.kind()), s.clone());
        }
        for stored in state.settings.values_mut() {
            stored.detach_template(template_id);
        }
        state.templates.remove(&template_id);
        Ok(())
    }
}

#[async_trait]
impl ApiKeyStore for InMemoryStore {
    async fn find_active(&self, key_hash: &str) -> Result<Option<ApiKeyRecord>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .api_keys
            .get(key_hash)
            .filter(|record| record.is_active)
            .cloned())
    }
}
