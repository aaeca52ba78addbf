pub mod database;
pub mod provider;
