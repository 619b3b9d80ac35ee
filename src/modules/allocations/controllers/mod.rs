pub mod allocation_controller;

pub use allocation_controller::configure;
