use crate::config::SiteConfig;
use crate::entities::{
    about, admin, appointment_forms, awards, banners, best_solution, blogs, categories, cities,
    contacts, home_setting, menus, seo, services, testimonials,
};
use sea_orm::{
    ConnectOptions, ConnectionTrait, Database, DatabaseBackend, DatabaseConnection, EntityTrait,
    Schema, Statement,
};
use std::time::Duration;
use tracing::info;

pub async fn setup_database(config: &SiteConfig) -> anyhow::Result<DatabaseConnection> {
    info!("📂 Database: {}", redact(&config.database_url));

    let is_sqlite = config.database_url.starts_with("sqlite:");
    let in_memory = is_sqlite && config.database_url.contains(":memory:");

    let mut opt = ConnectOptions::new(config.database_url.clone());
    opt.connect_timeout(Duration::from_secs(30))
        .acquire_timeout(Duration::from_secs(30))
        .sqlx_logging(true)
        .sqlx_logging_level(log::LevelFilter::Debug);

    if in_memory {
        // Every connection to :memory: is a separate database
        opt.max_connections(1).min_connections(1);
    } else if is_sqlite {
        opt.max_connections(1);
    } else {
        opt.max_connections(20)
            .min_connections(2)
            .idle_timeout(Duration::from_secs(600))
            .max_lifetime(Duration::from_secs(1800));
    }

    let db = Database::connect(opt).await?;

    info!("✅ Database connected successfully");

    run_migrations(&db).await?;

    Ok(db)
}

pub async fn run_migrations(db: &DatabaseConnection) -> anyhow::Result<()> {
    let backend = db.get_database_backend();

    if backend == DatabaseBackend::MySql {
        info!("🔄 Running SQLx migrations for MySQL...");
        sqlx::migrate!("./migrations")
            .run(db.get_mysql_connection_pool())
            .await?;
        return Ok(());
    }

    info!("🔄 Creating schema from entities...");
    let schema = Schema::new(backend);

    // Parents before children: services references cities and categories
    let stmts = vec![
        ("admin", table(&schema, admin::Entity)),
        ("cities", table(&schema, cities::Entity)),
        ("categories", table(&schema, categories::Entity)),
        ("services", table(&schema, services::Entity)),
        ("banners", table(&schema, banners::Entity)),
        ("blogs", table(&schema, blogs::Entity)),
        ("testimonials", table(&schema, testimonials::Entity)),
        ("awards", table(&schema, awards::Entity)),
        ("contacts", table(&schema, contacts::Entity)),
        ("appointment_forms", table(&schema, appointment_forms::Entity)),
        ("menus", table(&schema, menus::Entity)),
        ("home_setting", table(&schema, home_setting::Entity)),
        ("about", table(&schema, about::Entity)),
        ("seo", table(&schema, seo::Entity)),
        ("best_solution", table(&schema, best_solution::Entity)),
    ];

    for (name, stmt) in stmts {
        db.execute(backend.build(&stmt)).await?;
        tracing::debug!("   - Table '{}' checked/created", name);
    }

    db.execute(Statement::from_string(
        backend,
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_services_city_slug ON services(city_id, slug)",
    ))
    .await?;

    Ok(())
}

fn table<E: EntityTrait>(schema: &Schema, entity: E) -> sea_orm::sea_query::TableCreateStatement {
    schema
        .create_table_from_entity(entity)
        .if_not_exists()
        .to_owned()
}

/// Hides the password part of a connection URL for logging.
fn redact(url: &str) -> String {
    match (url.find("://"), url.rfind('@')) {
        (Some(scheme), Some(at)) if at > scheme => {
            let credentials = &url[scheme + 3..at];
            match credentials.find(':') {
                Some(colon) => format!(
                    "{}{}:***{}",
                    &url[..scheme + 3],
                    &credentials[..colon],
                    &url[at..]
                ),
                None => url.to_string(),
            }
        }
        _ => url.to_string(),
    }
}
