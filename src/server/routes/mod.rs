pub mod admin;
pub mod events;
pub mod streams;
pub mod subscriptions;
