pub mod chat;
pub mod extraction;
pub mod health;
