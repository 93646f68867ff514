pub mod attendance;
pub mod auth;
pub mod classes;
pub mod core;
pub mod exchange;
pub mod points;
pub mod stats;
pub mod students;
pub mod syncctl;
