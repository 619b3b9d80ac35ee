pub mod batch_controller;

pub use batch_controller::configure;
