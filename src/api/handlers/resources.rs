//! Handlers shared by every list-style resource. The concrete service is
//! injected per route group as an `Extension<Arc<CrudService<E>>>`.

use crate::api::error::AppError;
use crate::api::extractors::{Filters, RecordId};
use crate::services::changeset::FormPayload;
use crate::services::resource::CrudService;
use axum::{Extension, Json, http::StatusCode};
use sea_orm::{ActiveModelBehavior, ActiveModelTrait, EntityTrait, IntoActiveModel, PrimaryKeyTrait};
use serde::Serialize;
use serde_json::{Value, json};
use std::sync::Arc;

pub async fn list<E>(
    Extension(service): Extension<Arc<CrudService<E>>>,
    Filters(filters): Filters,
) -> Result<Json<Vec<Value>>, AppError>
where
    E: EntityTrait,
    E::Model: IntoActiveModel<E::ActiveModel> + Serialize + Sync,
    E::ActiveModel: ActiveModelTrait<Entity = E> + ActiveModelBehavior + Send,
    <E::PrimaryKey as PrimaryKeyTrait>::ValueType: From<i32>,
{
    Ok(Json(service.list(&filters).await?))
}

pub async fn get_one<E>(
    Extension(service): Extension<Arc<CrudService<E>>>,
    RecordId(id): RecordId,
) -> Result<Json<Value>, AppError>
where
    E: EntityTrait,
    E::Model: IntoActiveModel<E::ActiveModel> + Serialize + Sync,
    E::ActiveModel: ActiveModelTrait<Entity = E> + ActiveModelBehavior + Send,
    <E::PrimaryKey as PrimaryKeyTrait>::ValueType: From<i32>,
{
    Ok(Json(service.get(id).await?))
}

/// 201 with `{id, <name>Id, data}`.
pub async fn create<E>(
    Extension(service): Extension<Arc<CrudService<E>>>,
    payload: FormPayload,
) -> Result<(StatusCode, Json<Value>), AppError>
where
    E: EntityTrait,
    E::Model: IntoActiveModel<E::ActiveModel> + Serialize + Sync,
    E::ActiveModel: ActiveModelTrait<Entity = E> + ActiveModelBehavior + Send,
    <E::PrimaryKey as PrimaryKeyTrait>::ValueType: From<i32>,
{
    let model = service.create(payload).await?;
    let data = service.present_one(&model).await?;
    let id = data.get("id").cloned().unwrap_or(Value::Null);

    let mut body = json!({ "id": id.clone(), "data": data });
    body[format!("{}Id", service.spec().name)] = id;

    Ok((StatusCode::CREATED, Json(body)))
}

pub async fn update<E>(
    Extension(service): Extension<Arc<CrudService<E>>>,
    RecordId(id): RecordId,
    payload: FormPayload,
) -> Result<Json<Value>, AppError>
where
    E: EntityTrait,
    E::Model: IntoActiveModel<E::ActiveModel> + Serialize + Sync,
    E::ActiveModel: ActiveModelTrait<Entity = E> + ActiveModelBehavior + Send,
    <E::PrimaryKey as PrimaryKeyTrait>::ValueType: From<i32>,
{
    let model = service.update(id, payload).await?;
    Ok(Json(service.present_one(&model).await?))
}

pub async fn delete<E>(
    Extension(service): Extension<Arc<CrudService<E>>>,
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
