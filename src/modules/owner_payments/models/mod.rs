mod dashboard;

pub use dashboard::{
    fold_pending, BeneficiaryPending, OwnerBalances, OwnerPaymentDashboard, StatusCount,
};
