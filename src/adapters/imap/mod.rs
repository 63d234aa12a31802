pub mod connection;
pub mod message;
pub mod messages;

pub use connection::{connect, MailSession};
