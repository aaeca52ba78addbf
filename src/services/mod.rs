pub mod provider;
pub mod scan_service;
pub mod scan_store;
pub mod user_service;
