pub mod hero;
pub mod import;
pub mod models;
pub mod services;
