pub mod chat;
pub mod mapping;
pub mod youchat;
