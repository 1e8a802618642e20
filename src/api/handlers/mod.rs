pub mod auth;
pub mod fallback;
pub mod health;
pub mod resources;
pub mod singletons;
pub mod slug;
