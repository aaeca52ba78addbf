use crate::config::AppConfig;
use crate::entities::{file_scans, tokens, users};
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use sea_orm::{ConnectionTrait, Schema};
use std::time::Duration;
use tracing::info;

pub async fn setup_database(config: &AppConfig) -> anyhow::Result<DatabaseConnection> {
    info!("📂 Database: {}", config.database_url);

    let mut opt = ConnectOptions::new(&config.database_url);
    opt.max_connections(100)
        .min_connections(5)
        .connect_timeout(Duration::from_secs(30))
        .acquire_timeout(Duration::from_secs(30))
        .idle_timeout(Duration::from_secs(600))
        .max_lifetime(Duration::from_secs(1800))
        .sqlx_logging(true)
        .sqlx_logging_level(log::LevelFilter::Debug);

    // Every pooled connection to an in-memory SQLite database is a separate database.
    if config.database_url.contains(":memory:") {
        opt.max_connections(1).min_connections(1);
    }

    let db = Database::connect(opt).await?;

    info!("✅ Database connected successfully");

    run_migrations(&db).await?;

    Ok(db)
}

pub async fn run_migrations(db: &DatabaseConnection) -> anyhow::Result<()> {
    let builder = db.get_database_backend();
    let schema = Schema::new(builder);

    info!("🔄 Running auto-migrations...");

    // Order matters for foreign keys: Users -> Tokens, Users -> FileScans
    let stmts = vec![
        (
            "users",
            schema
                .create_table_from_entity(users::Entity)
                .if_not_exists()
                .to_owned(),
        ),
        (
            "tokens",
            schema
                .create_table_from_entity(tokens::Entity)
                .if_not_exists()
                .to_owned(),
        ),
        (
            "file_scans",
            schema
                .create_table_from_entity(file_scans::Entity)
                .if_not_exists()
                .to_owned(),
        ),
    ];

    for (name, stmt) in stmts {
        let stmt = builder.build(&stmt);
        db.execute(stmt)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to create table '{}': {}", name, e))?;
        info!("   - Table '{}' checked/created", name);
    }

    info!("🔄 Checking indexes...");

    let indexes = [
        "CREATE INDEX IF NOT EXISTS idx_file_scans_owner_id ON file_scans(owner_id)",
        "CREATE INDEX IF NOT EXISTS idx_file_scans_filename ON file_scans(filename)",
        "CREATE INDEX IF NOT EXISTS idx_file_scans_md5_hash ON file_scans(md5_hash)",
        "CREATE INDEX IF NOT EXISTS idx_file_scans_sha1_hash ON file_scans(sha1_hash)",
        "CREATE INDEX IF NOT EXISTS idx_file_scans_sha256_hash ON file_scans(sha256_hash)",
        "CREATE INDEX IF NOT EXISTS idx_file_scans_created_at ON file_scans(created_at)",
        "CREATE INDEX IF NOT EXISTS idx_tokens_user_id ON tokens(user_id)",
    ];

    for query in indexes {
        match db
            .execute(sea_orm::Statement::from_string(builder, query.to_owned()))
            .await
        {
            Ok(_) => tracing::debug!("   - Executed: {}", query),
            Err(e) => tracing::warn!("   - Index creation warning: {} -> {}", query, e),
        }
    }

    Ok(())
}
