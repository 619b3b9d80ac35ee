pub mod owner_payment_controller;

pub use owner_payment_controller::configure;
