pub mod sync_controller;

pub use sync_controller::configure;
