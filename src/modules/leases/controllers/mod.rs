pub mod lease_controller;

pub use lease_controller::configure;
