pub mod property_controller;

pub use property_controller::configure;
