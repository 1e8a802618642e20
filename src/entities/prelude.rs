pub use super::about::Entity as About;
pub use super::admin::Entity as Admin;
pub use super::appointment_forms::Entity as AppointmentForms;
pub use super::awards::Entity as Awards;
pub use super::banners::Entity as Banners;
pub use super::best_solution::Entity as BestSolution;
pub use super::blogs::Entity as Blogs;
pub use super::categories::Entity as Categories;
pub use super::cities::Entity as Cities;
pub use super::contacts::Entity as Contacts;
pub use super::home_setting::Entity as HomeSetting;
pub use super::menus::Entity as Menus;
pub use super::seo::Entity as Seo;
pub use super::services::Entity as Services;
pub use super::testimonials::Entity as Testimonials;
