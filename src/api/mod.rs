pub mod error;
pub mod extractors;
pub mod handlers;
pub mod middleware;

use crate::AppState;
use crate::api::handlers::{resources, singletons};
use crate::api::middleware::auth::auth_middleware;
use crate::services::resource::{CrudService, ResourceSpec};
use crate::services::singleton::SingletonService;
use axum::{
    Extension, Router,
    middleware::from_fn_with_state,
    routing::{delete, get, post, put},
};
use sea_orm::{ActiveModelBehavior, ActiveModelTrait, EntityTrait, IntoActiveModel, PrimaryKeyTrait};
use serde::Serialize;
use std::sync::Arc;

/// Who may call which endpoints of a list-style resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// Public reads, admin-only writes.
    Content,
    /// Public create (site forms), admin-only reads and deletes.
    Submission,
}

/// `GET/POST {path}` and `GET/PUT/DELETE {path}/:id` for one resource.
pub fn resource_routes<E>(
    state: &AppState,
    path: &str,
    spec: &'static ResourceSpec,
    access: Access,
) -> Router<AppState>
where
    E: EntityTrait,
    E::Model: IntoActiveModel<E::ActiveModel> + Serialize + Sync,
    E::ActiveModel: ActiveModelTrait<Entity = E> + ActiveModelBehavior + Send,
    <E::PrimaryKey as PrimaryKeyTrait>::ValueType: From<i32>,
{
    let service = Arc::new(CrudService::<E>::new(state.db.clone(), state.assets.clone(), spec));
    let auth = from_fn_with_state(state.clone(), auth_middleware);
    let item = format!("{}/:id", path);

    let router = match access {
        Access::Content => Router::new()
            .route(
                path,
                get(resources::list::<E>)
                    .merge(post(resources::create::<E>).route_layer(auth.clone())),
            )
            .route(
                &item,
                get(resources::get_one::<E>).merge(
                    put(resources::update::<E>)
                        .delete(resources::delete::<E>)
                        .route_layer(auth),
                ),
            ),
        Access::Submission => Router::new()
            .route(
                path,
                post(resources::create::<E>)
                    .merge(get(resources::list::<E>).route_layer(auth.clone())),
            )
            .route(
                &item,
                get(resources::get_one::<E>)
                    .delete(resources::delete::<E>)
                    .route_layer(auth),
            ),
    };

    router.layer(Extension(service))
}

/// `GET {path}` (public), `POST`/`PUT {path}` upsert and
/// `DELETE {path}/:id` (admin) for a singleton resource.
pub fn singleton_routes<E>(
    state: &AppState,
    path: &str,
    spec: &'static ResourceSpec,
) -> Router<AppState>
where
    E: EntityTrait,
    E::Model: IntoActiveModel<E::ActiveModel> + Serialize + Sync,
    E::ActiveModel: ActiveModelTrait<Entity = E> + ActiveModelBehavior + Send,
    <E::PrimaryKey as PrimaryKeyTrait>::ValueType: From<i32>,
{
    let service = Arc::new(SingletonService::<E>::new(
        state.db.clone(),
        state.assets.clone(),
        spec,
    ));
    let auth = from_fn_with_state(state.clone(), auth_middleware);

    Router::new()
        .route(
            path,
            get(singletons::get::<E>).merge(
                post(singletons::save::<E>)
                    .put(singletons::save::<E>)
                    .route_layer(auth.clone()),
            ),
        )
        .route(
            &format!("{}/:id", path),
            delete(singletons::delete::<E>).route_layer(auth),
        )
        .layer(Extension(service))
}
