pub mod asset_lifecycle;
pub mod assets;
pub mod catalog;
pub mod changeset;
pub mod cleanup;
pub mod faq;
pub mod resource;
pub mod singleton;
pub mod worker;
