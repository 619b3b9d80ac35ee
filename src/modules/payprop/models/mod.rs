mod payprop_payment;
mod sync_job;

pub use payprop_payment::{
    BeneficiaryType, Pagination, PayPropEntityRef, PayPropIncomingTransaction, PayPropPage,
    PayPropPayment, PayPropPaymentBatch,
};
pub use sync_job::{JobState, JobStatus, SyncKind, SyncSummary};
