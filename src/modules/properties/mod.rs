// Properties module: registration, block membership and occupancy workflow

pub mod controllers;
pub mod models;
pub mod repositories;
pub mod services;

pub use models::{OccupancyStatus, OccupancyTransition, Property};
pub use repositories::{MySqlPropertyRepository, PropertyRepository};
pub use services::VacancyService;
