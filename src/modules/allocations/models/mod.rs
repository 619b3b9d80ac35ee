mod allocation;

pub use allocation::{
    signed_total, AllocationFilter, AllocationSource, AllocationType, NewAllocation,
    PaymentStatus, PendingTotals, Settlement, TransactionKey, UnifiedAllocation,
};
