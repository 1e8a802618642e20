pub mod prelude;

pub mod admin;
pub mod appointment_forms;
pub mod awards;
pub mod banners;
pub mod blogs;
pub mod categories;
pub mod cities;
pub mod contacts;
pub mod menus;
pub mod services;
pub mod testimonials;

pub mod about;
pub mod best_solution;
pub mod home_setting;
pub mod seo;
