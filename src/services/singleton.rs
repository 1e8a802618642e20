use crate::api::error::AppError;
use crate::services::asset_lifecycle::AssetLifecycle;
use crate::services::changeset::{ChangeSet, FormPayload};
use crate::services::resource::{ResourceSpec, apply, apply_assets, column, present_model, text_of};
use sea_orm::{
    ActiveModelBehavior, ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseBackend,
    DatabaseConnection, DbErr, EntityTrait, IntoActiveModel, PrimaryKeyTrait, QueryFilter,
    QuerySelect, RuntimeErr, SqlErr, TransactionTrait,
};
use serde::Serialize;
use std::collections::HashMap;
use std::marker::PhantomData;
#[cfg(test)]
use std::sync::atomic::{AtomicBool, Ordering};

/// Constant stored in every singleton row's uniquely indexed `singleton_key`.
pub const SINGLETON_KEY: i32 = 1;

/// SQLSTATE for a serialization failure; MySQL reports deadlock victims with it.
const SERIALIZATION_FAILURE: &str = "40001";

/// Zero-or-one row resources (home settings, about, SEO, best solution).
///
/// `save` reads the row under an exclusive lock inside a transaction and
/// either updates or inserts it. A concurrent first save loses either on the
/// unique `singleton_key` or as a deadlock victim of the gap lock both
/// readers took; either way it is retried once as an update.
pub struct SingletonService<E> {
    db: DatabaseConnection,
    assets: AssetLifecycle,
    spec: &'static ResourceSpec,
    /// Makes the next read miss the row, as if another writer inserted it
    /// right after this one looked.
    #[cfg(test)]
    stale_read: AtomicBool,
    _entity: PhantomData<E>,
}

enum Attempt<M> {
    Saved(M),
    LostInsertRace,
}

fn sqlstate(err: &DbErr) -> Option<String> {
    let source = match err {
        DbErr::Exec(RuntimeErr::SqlxError(e)) | DbErr::Query(RuntimeErr::SqlxError(e)) => e,
        _ => return None,
    };
    let code = source.as_database_error()?.code()?;
    Some(code.into_owned())
}

/// Whether a failed insert collided with a concurrent first save.
fn lost_insert_race(err: &DbErr) -> bool {
    matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
        || sqlstate(err).as_deref() == Some(SERIALIZATION_FAILURE)
}

impl<E> SingletonService<E>
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
            #[cfg(test)]
            stale_read: AtomicBool::new(false),
            _entity: PhantomData,
        }
    }

    pub fn spec(&self) -> &'static ResourceSpec {
        self.spec
    }

    pub async fn find(&self) -> Result<Option<E::Model>, AppError> {
        let key = column::<E>("singleton_key")?;
        Ok(E::find().filter(key.eq(SINGLETON_KEY)).one(&self.db).await?)
    }

    pub async fn get(&self) -> Result<serde_json::Value, AppError> {
        let model = self
            .find()
            .await?
            .ok_or_else(|| AppError::NotFound(format!("{} has not been set up", self.spec.name)))?;
        self.present(&model)
    }

    pub fn present(&self, model: &E::Model) -> Result<serde_json::Value, AppError> {
        present_model(self.spec.fields, model)
    }

    /// Creates the row or updates it in place. Omitted fields keep their value.
    pub async fn save(&self, payload: FormPayload) -> Result<E::Model, AppError> {
        let changes = ChangeSet::parse(self.spec.fields, self.spec.slots, &payload.fields)?;
        self.assets.check_uploads(self.spec.slots, &payload.files)?;

        match self.try_save(&changes, &payload, true).await? {
            Attempt::Saved(model) => Ok(model),
            Attempt::LostInsertRace => {
                tracing::debug!(
                    "Concurrent {} insert detected, retrying as update",
                    self.spec.name
                );
                match self.try_save(&changes, &payload, false).await? {
                    Attempt::Saved(model) => Ok(model),
                    Attempt::LostInsertRace => Err(AppError::Conflict(format!(
                        "{} is being modified concurrently",
                        self.spec.name
                    ))),
                }
            }
        }
    }

    async fn try_save(
        &self,
        changes: &ChangeSet,
        payload: &FormPayload,
        may_retry: bool,
    ) -> Result<Attempt<E::Model>, AppError> {
        let key = column::<E>("singleton_key")?;
        let txn = self.db.begin().await?;

        let mut select = E::find().filter(key.eq(SINGLETON_KEY));
        if txn.get_database_backend() != DatabaseBackend::Sqlite {
            select = select.lock_exclusive();
        }
        let existing = select.one(&txn).await?;
        #[cfg(test)]
        let existing = existing.filter(|_| !self.stale_read.swap(false, Ordering::SeqCst));

        let mut previous = HashMap::new();
        if let Some(row) = &existing {
            for &slot in self.spec.slots {
                previous.insert(slot, text_of(row, column::<E>(slot)?));
            }
        }

        let staged = self
            .assets
            .stage(
                self.spec.asset_dir,
                self.spec.slots,
                |slot| previous.get(slot).cloned().flatten(),
                payload.files.clone(),
                changes.removals(),
            )
            .await?;

        let is_insert = existing.is_none();
        let (mut active, values) = match existing {
            Some(row) => (row.into_active_model(), changes.update_values()),
            None => {
                let mut active = <E::ActiveModel as ActiveModelBehavior>::new();
                active.set(key, SINGLETON_KEY.into());
                (active, changes.insert_values())
            }
        };

        let prepared = apply::<E>(&mut active, values)
            .and_then(|()| apply_assets::<E>(&mut active, &staged));
        if let Err(e) = prepared {
            self.assets.rollback(staged).await;
            let _ = txn.rollback().await;
            return Err(e);
        }

        let written: Result<E::Model, DbErr> = if is_insert {
            active.insert(&txn).await
        } else {
            active.update(&txn).await
        };

        let model = match written {
            Ok(model) => model,
            Err(e) => {
                self.assets.rollback(staged).await;
                let _ = txn.rollback().await;
                if may_retry && is_insert && lost_insert_race(&e) {
                    return Ok(Attempt::LostInsertRace);
                }
                return Err(e.into());
            }
        };

        if let Err(e) = txn.commit().await {
            self.assets.rollback(staged).await;
            return Err(e.into());
        }

        self.assets.commit(staged);
        tracing::info!("Saved {}", self.spec.name);
        Ok(Attempt::Saved(model))
    }

    /// Removes the row with `id` and retires every file it references.
    pub async fn delete(&self, id: i32) -> Result<(), AppError> {
        let existing = E::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or_else(|| AppError::not_found(self.spec.name, id))?;

        let mut owned = Vec::new();
        for &slot in self.spec.slots {
            owned.extend(text_of(&existing, column::<E>(slot)?));
        }

        E::delete_by_id(id).exec(&self.db).await?;
        self.assets.retire(owned);

        tracing::info!("Deleted {} {}", self.spec.name, id);
        Ok(())
    }
}
