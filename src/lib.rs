pub mod api;
pub mod config;
pub mod entities;
pub mod infrastructure;
pub mod services;
pub mod utils;

use crate::api::handlers::{auth, fallback, health, slug};
use crate::api::middleware::auth::auth_middleware;
use crate::api::{Access, resource_routes, singleton_routes};
use crate::config::SiteConfig;
use crate::entities::prelude::*;
use crate::services::asset_lifecycle::AssetLifecycle;
use crate::services::assets::{AssetStore, PUBLIC_PREFIX};
use crate::services::catalog::{
    ABOUT, APPOINTMENTS, AWARDS, BANNERS, BEST_SOLUTION, BLOGS, CATEGORIES, CITIES, CONTACTS,
    HOME_SETTING, MENUS, SEO, SERVICES, TESTIMONIALS,
};
use crate::services::cleanup::AssetCleaner;
use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method, header},
    middleware::from_fn_with_state,
    routing::{get, post},
};
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::set_header::SetResponseHeaderLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(
        api::handlers::auth::login,
        api::handlers::slug::suggest,
        api::handlers::health::health_check,
    ),
    components(
        schemas(
            api::handlers::auth::LoginRequest,
            api::handlers::auth::LoginResponse,
            api::handlers::slug::SlugResponse,
            api::handlers::health::HealthResponse,
            api::error::ErrorBody,
            api::error::ErrorDetail,
            services::faq::Faq,
        )
    ),
    tags(
        (name = "auth", description = "Admin authentication"),
        (name = "system", description = "Health and diagnostics")
    )
)]
pub struct ApiDoc;

#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub store: Arc<dyn AssetStore>,
    pub cleaner: AssetCleaner,
    pub assets: AssetLifecycle,
    pub config: SiteConfig,
}

impl AppState {
    pub fn new(
        db: DatabaseConnection,
        store: Arc<dyn AssetStore>,
        cleaner: AssetCleaner,
        config: SiteConfig,
    ) -> Self {
        let assets = AssetLifecycle::new(store.clone(), cleaner.clone(), config.max_upload_size);
        Self {
            db,
            store,
            cleaner,
            assets,
            config,
        }
    }
}

pub fn create_app(state: AppState) -> Router {
    let origins: Vec<HeaderValue> = state
        .config
        .allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true);

    // Stored files are served from this origin and must never run as a page
    let sandbox = SetResponseHeaderLayer::overriding(
        header::CONTENT_SECURITY_POLICY,
        HeaderValue::from_static("sandbox"),
    );
    let nosniff = SetResponseHeaderLayer::overriding(
        header::X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static("nosniff"),
    );
    let uploads: Router<AppState> = Router::new()
        .nest_service(PUBLIC_PREFIX, ServeDir::new(&state.config.upload_dir))
        .layer(sandbox)
        .layer(nosniff);

    let s = &state;
    let content = Access::Content;
    let forms = Access::Submission;
    let admin = from_fn_with_state(state.clone(), auth_middleware);

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/health", get(health::health_check))
        .route("/api/admin/login", post(auth::login))
        .route("/api/admin/slug", get(slug::suggest).route_layer(admin))
        .merge(resource_routes::<Cities>(s, "/api/cities", &CITIES, content))
        .merge(resource_routes::<Categories>(s, "/api/categories", &CATEGORIES, content))
        .merge(resource_routes::<Services>(s, "/api/services", &SERVICES, content))
        .merge(resource_routes::<Banners>(s, "/api/banners", &BANNERS, content))
        .merge(resource_routes::<Blogs>(s, "/api/blogs", &BLOGS, content))
        .merge(resource_routes::<Testimonials>(s, "/api/testimonials", &TESTIMONIALS, content))
        .merge(resource_routes::<Awards>(s, "/api/awards", &AWARDS, content))
        .merge(resource_routes::<Menus>(s, "/api/menus", &MENUS, content))
        .merge(resource_routes::<Contacts>(s, "/api/contacts", &CONTACTS, forms))
        .merge(resource_routes::<AppointmentForms>(s, "/api/appointments", &APPOINTMENTS, forms))
        .merge(singleton_routes::<HomeSetting>(s, "/api/home-setting", &HOME_SETTING))
        .merge(singleton_routes::<About>(s, "/api/about", &ABOUT))
        .merge(singleton_routes::<Seo>(s, "/api/seo", &SEO))
        .merge(singleton_routes::<BestSolution>(s, "/api/best_solution", &BEST_SOLUTION))
        .method_not_allowed_fallback(fallback::method_not_allowed)
        .merge(uploads)
        .fallback(fallback::route_not_found)
        .layer(DefaultBodyLimit::max(state.config.max_body_size()))
        .layer(cors)
        .with_state(state)
}
