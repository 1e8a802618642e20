use crate::api::error::AppError;
use crate::services::asset_lifecycle::{AssetLifecycle, StagedAssets};
use crate::services::changeset::{ChangeSet, FormPayload};
use crate::services::faq::decode_stored;
use futures::future::BoxFuture;
use sea_orm::sea_query::ValueType;
use sea_orm::{
    ActiveModelBehavior, ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait,
    IntoActiveModel, ModelTrait, PaginatorTrait, PrimaryKeyTrait, QueryFilter, QueryOrder, Value,
};
use serde::Serialize;
use serde_json::json;
use std::collections::HashMap;
use std::marker::PhantomData;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Integer,
    /// JSON list of question/answer pairs kept in a text column.
    Faqs,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    /// Must be given on create, may never be emptied.
    Required,
    /// Nullable; an empty value clears it.
    Optional,
    /// Non-null with a default applied on create.
    Defaulted(i32),
}

/// A writable, non-image column of a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
    pub presence: Presence,
}

impl FieldSpec {
    pub const fn required_text(name: &'static str) -> Self {
        Self {
            name,
            kind: FieldKind::Text,
            presence: Presence::Required,
        }
    }

    pub const fn text(name: &'static str) -> Self {
        Self {
            name,
            kind: FieldKind::Text,
            presence: Presence::Optional,
        }
    }

    pub const fn required_int(name: &'static str) -> Self {
        Self {
            name,
            kind: FieldKind::Integer,
            presence: Presence::Required,
        }
    }

    pub const fn int(name: &'static str) -> Self {
        Self {
            name,
            kind: FieldKind::Integer,
            presence: Presence::Optional,
        }
    }

    pub const fn int_default(name: &'static str, default: i32) -> Self {
        Self {
            name,
            kind: FieldKind::Integer,
            presence: Presence::Defaulted(default),
        }
    }

    pub const fn status() -> Self {
        Self::int_default("status", 1)
    }

    pub const fn faqs(name: &'static str) -> Self {
        Self {
            name,
            kind: FieldKind::Faqs,
            presence: Presence::Optional,
        }
    }
}

/// `field` must be unique, optionally only among rows sharing `scope`.
#[derive(Debug, Clone, Copy)]
pub struct UniqueKey {
    pub field: &'static str,
    pub scope: Option<&'static str>,
}

pub type Rows = Vec<serde_json::Value>;

pub type ExistsFn = fn(&DatabaseConnection, i32) -> BoxFuture<'_, Result<bool, DbErr>>;
pub type CountFn = fn(&DatabaseConnection, i32) -> BoxFuture<'_, Result<u64, DbErr>>;
pub type Decorator = fn(&DatabaseConnection, Rows) -> BoxFuture<'_, Result<Rows, DbErr>>;

/// Foreign key that must point at an existing row.
#[derive(Clone, Copy)]
pub struct ParentRef {
    pub field: &'static str,
    pub label: &'static str,
    pub exists: ExistsFn,
}

/// Rows elsewhere that block deleting a record while they reference it.
#[derive(Clone, Copy)]
pub struct Dependent {
    pub label: &'static str,
    pub count: CountFn,
}

/// Declarative description of one content resource.
pub struct ResourceSpec {
    /// Singular name used in messages and the `{name}Id` response key.
    pub name: &'static str,
    /// Asset store subdirectory.
    pub asset_dir: &'static str,
    pub fields: &'static [FieldSpec],
    pub slots: &'static [&'static str],
    pub unique: &'static [UniqueKey],
    /// Query-string keys accepted by `list` as equality filters.
    pub filters: &'static [&'static str],
    pub parents: &'static [ParentRef],
    pub dependents: &'static [Dependent],
    /// Listing order as `(column, descending)`.
    pub order: &'static [(&'static str, bool)],
    /// Post-processing applied to presented rows (e.g. joined display fields).
    pub decorate: Option<Decorator>,
}

impl ResourceSpec {
    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }
}

pub(crate) fn column<E: EntityTrait>(name: &str) -> Result<E::Column, AppError> {
    E::Column::from_str(name)
        .map_err(|_| AppError::Internal(format!("Unknown column '{}'", name)))
}

pub(crate) fn text_of<M: ModelTrait>(
    model: &M,
    col: <M::Entity as EntityTrait>::Column,
) -> Option<String> {
    <Option<String> as ValueType>::try_from(model.get(col))
        .ok()
        .flatten()
}

fn int_of<M: ModelTrait>(model: &M, col: <M::Entity as EntityTrait>::Column) -> Option<i32> {
    <Option<i32> as ValueType>::try_from(model.get(col))
        .ok()
        .flatten()
}

fn parse_filter(name: &str, value: &str) -> Result<i32, AppError> {
    value
        .trim()
        .parse()
        .map_err(|_| AppError::Validation(format!("Filter '{}' must be an integer", name)))
}

/// Copies column values onto an active model.
pub(crate) fn apply<E: EntityTrait>(
    active: &mut E::ActiveModel,
    values: Vec<(&'static str, Value)>,
) -> Result<(), AppError>
where
    E::ActiveModel: ActiveModelTrait<Entity = E>,
{
    for (name, value) in values {
        active.set(column::<E>(name)?, value);
    }
    Ok(())
}

pub(crate) fn apply_assets<E: EntityTrait>(
    active: &mut E::ActiveModel,
    staged: &StagedAssets,
) -> Result<(), AppError>
where
    E::ActiveModel: ActiveModelTrait<Entity = E>,
{
    for (slot, path) in staged.assignments() {
        active.set(column::<E>(slot)?, path.clone().into());
    }
    Ok(())
}

/// Serialises a row for clients: FAQ columns are decoded into arrays.
pub(crate) fn present_model<M: Serialize>(
    fields: &[FieldSpec],
    model: &M,
) -> Result<serde_json::Value, AppError> {
    let mut value = serde_json::to_value(model)
        .map_err(|e| AppError::Internal(format!("Failed to serialise record: {}", e)))?;

    if let Some(obj) = value.as_object_mut() {
        for spec in fields.iter().filter(|f| f.kind == FieldKind::Faqs) {
            let decoded = decode_stored(obj.get(spec.name).and_then(|v| v.as_str()));
            obj.insert(spec.name.to_string(), json!(decoded));
        }
    }

    Ok(value)
}

/// Create/read/update/delete over one table, driven by a [`ResourceSpec`].
pub struct CrudService<E> {
    db: DatabaseConnection,
    assets: AssetLifecycle,
    spec: &'static ResourceSpec,
    _entity: PhantomData<E>,
}

impl<E> CrudService<E>
where
    E: EntityTrait,
    E::Model: IntoActiveModel<E::ActiveModel> + Serialize + Sync,
    E::ActiveModel: ActiveModelTrait<Entity = E> + ActiveModelBehavior + Send,
    <E::PrimaryKey as PrimaryKeyTrait>::ValueType: From<i32>,
{
    pub fn new(
        db: DatabaseConnection,
        assets: AssetLifecycle,
        spec: &'static ResourceSpec,
    ) -> Self {
        Self {
            db,
            assets,
            spec,
            _entity: PhantomData,
        }
    }

    pub fn spec(&self) -> &'static ResourceSpec {
        self.spec
    }

    pub async fn list(&self, query: &HashMap<String, String>) -> Result<Rows, AppError> {
        let mut select = E::find();

        for &name in self.spec.filters {
            let Some(raw) = query.get(name) else {
                continue;
            };
            let col = column::<E>(name)?;
            let is_int = self
                .spec
                .field(name)
                .is_some_and(|f| f.kind == FieldKind::Integer);

            select = if is_int {
                select.filter(col.eq(parse_filter(name, raw)?))
            } else {
                select.filter(col.eq(raw.as_str()))
            };
        }

        for &(name, descending) in self.spec.order {
            let col = column::<E>(name)?;
            select = if descending {
                select.order_by_desc(col)
            } else {
                select.order_by_asc(col)
            };
        }

        let rows = select.all(&self.db).await?;
        self.present(&rows).await
    }

    pub async fn find(&self, id: i32) -> Result<E::Model, AppError> {
        E::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or_else(|| AppError::not_found(self.spec.name, id))
    }

    pub async fn get(&self, id: i32) -> Result<serde_json::Value, AppError> {
        let model = self.find(id).await?;
        self.present_one(&model).await
    }

    pub async fn create(&self, payload: FormPayload) -> Result<E::Model, AppError> {
        let changes = ChangeSet::parse(self.spec.fields, self.spec.slots, &payload.fields)?;
        changes.ensure_complete()?;
        self.assets.check_uploads(self.spec.slots, &payload.files)?;
        self.check_parents(&changes).await?;
        self.check_unique(&changes, None, None).await?;

        let staged = self
            .assets
            .stage(
                self.spec.asset_dir,
                self.spec.slots,
                |_| None,
                payload.files,
                &[],
            )
            .await?;

        let mut active = <E::ActiveModel as ActiveModelBehavior>::new();
        if let Err(e) = apply::<E>(&mut active, changes.insert_values())
            .and_then(|()| apply_assets::<E>(&mut active, &staged))
        {
            self.assets.rollback(staged).await;
            return Err(e);
        }

        match active.insert(&self.db).await {
            Ok(model) => {
                self.assets.commit(staged);
                tracing::info!("Created {} record", self.spec.name);
                Ok(model)
            }
            Err(e) => {
                self.assets.rollback(staged).await;
                Err(e.into())
            }
        }
    }

    pub async fn update(&self, id: i32, payload: FormPayload) -> Result<E::Model, AppError> {
        let changes = ChangeSet::parse(self.spec.fields, self.spec.slots, &payload.fields)?;
        self.assets.check_uploads(self.spec.slots, &payload.files)?;

        let existing = self.find(id).await?;
        self.check_parents(&changes).await?;
        self.check_unique(&changes, Some(&existing), Some(id)).await?;

        let mut previous = HashMap::new();
        for &slot in self.spec.slots {
            previous.insert(slot, text_of(&existing, column::<E>(slot)?));
        }

        let staged = self
            .assets
            .stage(
                self.spec.asset_dir,
                self.spec.slots,
                |slot| previous.get(slot).cloned().flatten(),
                payload.files,
                changes.removals(),
            )
            .await?;

        let mut active = existing.into_active_model();
        if let Err(e) = apply::<E>(&mut active, changes.update_values())
            .and_then(|()| apply_assets::<E>(&mut active, &staged))
        {
            self.assets.rollback(staged).await;
            return Err(e);
        }

        match active.update(&self.db).await {
            Ok(model) => {
                self.assets.commit(staged);
                tracing::info!("Updated {} {}", self.spec.name, id);
                Ok(model)
            }
            Err(e) => {
                self.assets.rollback(staged).await;
                Err(e.into())
            }
        }
    }

    pub async fn delete(&self, id: i32) -> Result<(), AppError> {
        let existing = self.find(id).await?;

        for dependent in self.spec.dependents {
            let count = (dependent.count)(&self.db, id).await?;
            if count > 0 {
                return Err(AppError::Conflict(format!(
                    "Cannot delete {} {}: {} {} still reference it",
                    self.spec.name, id, count, dependent.label
                )));
            }
        }

        let mut owned = Vec::new();
        for &slot in self.spec.slots {
            owned.extend(text_of(&existing, column::<E>(slot)?));
        }

        E::delete_by_id(id).exec(&self.db).await?;
        self.assets.retire(owned);

        tracing::info!("Deleted {} {}", self.spec.name, id);
        Ok(())
    }

    pub async fn present(&self, rows: &[E::Model]) -> Result<Rows, AppError> {
        let values = rows
            .iter()
            .map(|row| present_model(self.spec.fields, row))
            .collect::<Result<Vec<_>, _>>()?;

        match self.spec.decorate {
            Some(decorate) => Ok(decorate(&self.db, values).await?),
            None => Ok(values),
        }
    }

    pub async fn present_one(&self, row: &E::Model) -> Result<serde_json::Value, AppError> {
        self.present(std::slice::from_ref(row))
            .await?
            .pop()
            .ok_or_else(|| AppError::Internal("Record vanished while presenting".to_string()))
    }

    async fn check_parents(&self, changes: &ChangeSet) -> Result<(), AppError> {
        for parent in self.spec.parents {
            let Some(parent_id) = changes.integer(parent.field) else {
                continue;
            };
            if !(parent.exists)(&self.db, parent_id).await? {
                return Err(AppError::Validation(format!(
                    "{} {} does not exist",
                    parent.label, parent_id
                )));
            }
        }
        Ok(())
    }

    /// Rejects a write whose unique value is already taken by another row.
    /// Unchanged fields of `existing` fill in for omitted ones.
    async fn check_unique(
        &self,
        changes: &ChangeSet,
        existing: Option<&E::Model>,
        own_id: Option<i32>,
    ) -> Result<(), AppError> {
        for key in self.spec.unique {
            let field_col = column::<E>(key.field)?;
            let Some(value) = changes
                .text(key.field)
                .map(str::to_string)
                .or_else(|| existing.and_then(|m| text_of(m, field_col)))
            else {
                continue;
            };

            // Only re-check when something in the key actually changes
            let touched = changes.text(key.field).is_some()
                || key.scope.is_some_and(|s| changes.integer(s).is_some());
            if !touched {
                continue;
            }

            let mut select = E::find().filter(field_col.eq(value.as_str()));

            let mut scope_desc = String::new();
            if let Some(scope) = key.scope {
                let scope_col = column::<E>(scope)?;
                let scope_value = changes
                    .integer(scope)
                    .or_else(|| existing.and_then(|m| int_of(m, scope_col)));
                let Some(scope_value) = scope_value else {
                    continue;
                };
                select = select.filter(scope_col.eq(scope_value));
                scope_desc = format!(" for {} {}", scope, scope_value);
            }

            if let Some(id) = own_id {
                select = select.filter(column::<E>("id")?.ne(id));
            }

            if select.count(&self.db).await? > 0 {
                return Err(AppError::Conflict(format!(
                    "{} '{}' already exists{}",
                    key.field, value, scope_desc
                )));
            }
        }
        Ok(())
    }
}
