mod property;

pub use property::{
    available_balance, NewProperty, OccupancyStatus, OccupancyTransition, Property,
    PropertyFilter, VACANCY_ATTENTION_DAYS,
};
