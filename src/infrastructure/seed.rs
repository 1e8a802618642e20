use crate::config::SiteConfig;
use crate::entities::{admin, prelude::*};
use crate::utils::auth::hash_password;
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, PaginatorTrait, Set};
use tracing::info;

/// Creates the first admin from `ADMIN_USERNAME`/`ADMIN_PASSWORD` when the
/// admin table is empty. Returns whether an account was created.
pub async fn seed_admin(db: &DatabaseConnection, config: &SiteConfig) -> anyhow::Result<bool> {
    let (Some(username), Some(password)) = (&config.admin_username, &config.admin_password) else {
        return Ok(false);
    };

    if Admin::find().count(db).await? > 0 {
        return Ok(false);
    }

    info!("🌱 Seeding admin account '{}'", username);

    admin::ActiveModel {
        username: Set(username.clone()),
        password_hash: Set(hash_password(password)?),
        created_at: Set(Some(chrono::Utc::now())),
        ..Default::default()
    }
    .insert(db)
    .await?;

    Ok(true)
}
