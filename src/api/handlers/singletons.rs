use crate::api::error::AppError;
use crate::api::extractors::RecordId;
use crate::services::changeset::FormPayload;
use crate::services::singleton::SingletonService;
use axum::{Extension, Json};
use sea_orm::{ActiveModelBehavior, ActiveModelTrait, EntityTrait, IntoActiveModel, PrimaryKeyTrait};
use serde::Serialize;
use serde_json::{Value, json};
use std::sync::Arc;

/// The single row, or 404 while it has never been saved.
pub async fn get<E>(
    Extension(service): Extension<Arc<SingletonService<E>>>,
) -> Result<Json<Value>, AppError>
where
    E: EntityTrait,
    E::Model: IntoActiveModel<E::ActiveModel> + Serialize + Sync,
    E::ActiveModel: ActiveModelTrait<Entity = E> + ActiveModelBehavior + Send,
    <E::PrimaryKey as PrimaryKeyTrait>::ValueType: From<i32>,
{
    Ok(Json(service.get().await?))
}

/// Upsert. Fields left out of the body keep their stored value.
pub async fn save<E>(
    Extension(service): Extension<Arc<SingletonService<E>>>,
    payload: FormPayload,
) -> Result<Json<Value>, AppError>
where
    E: EntityTrait,
    E::Model: IntoActiveModel<E::ActiveModel> + Serialize + Sync,
    E::ActiveModel: ActiveModelTrait<Entity = E> + ActiveModelBehavior + Send,
    <E::PrimaryKey as PrimaryKeyTrait>::ValueType: From<i32>,
{
    let model = service.save(payload).await?;
    Ok(Json(service.present(&model)?))
}

pub async fn delete<E>(
    Extension(service): Extension<Arc<SingletonService<E>>>,
    RecordId(id): RecordId,
) -> Result<Json<Value>, AppError>
where
    E: EntityTrait,
    E::Model: IntoActiveModel<E::ActiveModel> + Serialize + Sync,
    E::ActiveModel: ActiveModelTrait<Entity = E> + ActiveModelBehavior + Send,
    <E::PrimaryKey as PrimaryKeyTrait>::ValueType: From<i32>,
{
    service.delete(id).await?;
    Ok(Json(json!({ "message": "deleted" })))
}
