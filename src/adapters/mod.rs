pub mod imap;
pub mod smtp;
pub mod sqlite;
