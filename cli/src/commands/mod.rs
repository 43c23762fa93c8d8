pub mod check;
pub mod claims;
pub mod init;
pub mod roles;
pub mod users;
