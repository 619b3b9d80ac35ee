mod lease;

pub use lease::{
    Lease, LeaseFrequency, LeaseImportReport, LeaseImportRow, NewLease, SyncStatus,
    LEASE_CSV_HEADER,
};
