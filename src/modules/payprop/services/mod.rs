pub mod payment_sync;
pub mod payprop_client;
pub mod sync_supervisor;

pub use payment_sync::PaymentSyncJob;
pub use payprop_client::{PagingLimits, PayPropApi, PayPropClient};
pub use sync_supervisor::SyncSupervisor;
