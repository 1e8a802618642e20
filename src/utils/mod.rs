pub mod auth;
pub mod slug;
pub mod validation;
