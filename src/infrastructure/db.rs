use sea_orm::{ConnectionTrait, Database, DatabaseConnection, DbErr, Statement};

const CREATE_REQUEST_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS request (
        request_id INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,
        request_url TEXT NOT NULL UNIQUE,
        response TEXT NOT NULL,
        timestamp TEXT NOT NULL
    )
"#;

pub async fn init_db(database_url: &str) -> Result<DatabaseConnection, DbErr> {
    let db = Database::connect(database_url).await?;

    // Run migrations manually (simple SQL)
    run_migrations(&db).await?;

    Ok(db)
}

async fn run_migrations(db: &DatabaseConnection) -> Result<(), DbErr> {
    db.execute(Statement::from_string(
        db.get_database_backend(),
        CREATE_REQUEST_TABLE.to_owned(),
    ))
    .await?;

    Ok(())
}

/// Drop the cache table and create it again, empty.
pub async fn recreate_cache_table(db: &DatabaseConnection) -> Result<(), DbErr> {
    db.execute(Statement::from_string(
        db.get_database_backend(),
        "DROP TABLE IF EXISTS request".to_owned(),
    ))
    .await?;
    tracing::info!("Dropped request cache table");

    run_migrations(db).await
}
