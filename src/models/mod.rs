pub mod client;
pub mod user;

pub use client::{Client, ContactStatus, Sale};
pub use user::{User, UserRole};
