mod payment_batch;

pub use payment_batch::{
    batch_id_day_prefix, generate_batch_id, total_payment, AdjustmentSource, BatchRequest,
    BatchSource, BatchStatus, BatchType, BatchWithAllocations, PaidTransition, PaymentBatch,
};
