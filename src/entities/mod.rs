pub mod prelude;

pub mod file_scans;
pub mod tokens;
pub mod users;
