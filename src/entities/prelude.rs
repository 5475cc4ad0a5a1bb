pub use super::clients::Entity as Clients;
pub use super::sales::Entity as Sales;
pub use super::user_sessions::Entity as UserSessions;
pub use super::users::Entity as Users;
