pub mod prelude;

pub mod clients;
pub mod sales;
pub mod user_sessions;
pub mod users;
