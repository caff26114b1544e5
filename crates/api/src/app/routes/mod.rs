pub mod account;
pub mod admin;
pub mod common;
pub mod session;
pub mod system;
