pub mod balance_controller;

pub use balance_controller::configure;
