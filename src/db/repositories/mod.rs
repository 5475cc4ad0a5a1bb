pub mod client;
pub mod sale;
pub mod session;
pub mod user;
