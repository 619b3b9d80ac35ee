pub mod email_template_controller;

pub use email_template_controller::configure;
