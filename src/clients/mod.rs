pub mod phantom;

pub use phantom::{PhantomClient, PhantomError, SubscriberDirectory, TokenCache};
