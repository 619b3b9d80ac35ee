pub mod vacancy_service;

pub use vacancy_service::VacancyService;
