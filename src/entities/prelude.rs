pub use super::file_scans::Entity as FileScans;
pub use super::tokens::Entity as Tokens;
pub use super::users::Entity as Users;
