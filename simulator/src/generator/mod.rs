pub mod channel;
pub mod profile;
