pub mod app_config;
pub mod errors;
pub mod floor;
