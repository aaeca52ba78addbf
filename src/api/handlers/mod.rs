pub mod auth;
pub mod health;
pub mod scans;
pub mod users;
