use anyhow::Result;
use sqlite_rows::{
    ColumnConstraint, ColumnDefinition, Condition, DataType, DefaultValue, Row, Schema,
    SqliteConfig, SqliteDriver, SqliteService, TableDefinition, ValidationError, Value,
};
use std::time::Duration;
use tempfile::TempDir;

fn users_schema() -> Schema {
    Schema::new()
        .add_table(
            TableDefinition::new("users")
                .add_column(
                    ColumnDefinition::new("id", DataType::Integer)
                        .with_constraint(ColumnConstraint::PrimaryKey),
                )
                .add_column(
                    ColumnDefinition::new("name", DataType::Text)
                        .with_constraint(ColumnConstraint::NotNull),
                )
                .add_column(
                    ColumnDefinition::new("email", DataType::Text)
                        .with_constraint(ColumnConstraint::NotNull)
                        .with_constraint(ColumnConstraint::Unique),
                )
                .add_column(ColumnDefinition::new("age", DataType::Integer)),
        )
        .add_table(
            TableDefinition::new("messages")
                .add_column(
                    ColumnDefinition::new("user_id", DataType::Integer)
                        .with_constraint(ColumnConstraint::PrimaryKey),
                )
                .add_column(
                    ColumnDefinition::new("text", DataType::Text)
                        .with_default(DefaultValue::Text(String::new())),
                )
                .add_column(ColumnDefinition::new("payload", DataType::Blob)),
        )
}

// In-memory database with the users/messages schema applied
async fn create_test_service() -> Result<SqliteService> {
    let service = SqliteService::with_driver(SqliteDriver::open_in_memory()?);
    service.initialize_schema(&users_schema()).await?;
    Ok(service)
}

// File-based database under a temporary directory, opened through `start`
async fn create_temp_service() -> Result<(SqliteService, TempDir)> {
    let dir = TempDir::new()?;
    let config = SqliteConfig::new(dir.path().join("nested/app.sqlite"), users_schema());
    let service = SqliteService::start(config).await?;
    Ok((service, dir))
}

fn john() -> Row {
    Row::new()
        .with_value("id", 1)
        .with_value("name", "John Doe")
        .with_value("email", "john@example.com")
        .with_value("age", 30)
}

#[tokio::test]
async fn test_basic_operations() -> Result<()> {
    let service = create_test_service().await?;

    assert_eq!(service.insert("users", &john()).await?, 1);

    let rows = service
        .find("users", "id", 1, &["name", "email", "age"])
        .await?;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["name"].as_str(), Some("John Doe"));
    assert_eq!(rows[0]["email"].as_str(), Some("john@example.com"));
    assert_eq!(rows[0]["age"].as_i64(), Some(30));
    assert!(!rows[0].contains_key("id"));

    let changed = service
        .update_by_all(
            "users",
            &Row::new().with_value("age", 31),
            &Condition::new().with_value("id", 1),
        )
        .await?;
    assert_eq!(changed, 1);
    let rows = service.find("users", "id", 1, &["age"]).await?;
    assert_eq!(rows[0]["age"].as_i64(), Some(31));

    service.execute("DELETE FROM users WHERE id = ?", vec![Value::Integer(1)]).await?;
    let rows = service.find("users", "id", 1, &[]).await?;
    assert!(rows.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_start_creates_directory_and_schema() -> Result<()> {
    let (service, dir) = create_temp_service().await?;
    assert!(dir.path().join("nested/app.sqlite").exists());

    service.insert("users", &john()).await?;
    // applying the schema again leaves existing data alone
    service.initialize_schema(&users_schema()).await?;
    let rows = service
        .select("SELECT COUNT(*) AS n FROM users", Vec::new())
        .await?;
    assert_eq!(rows[0]["n"], Value::Integer(1));
    Ok(())
}

#[tokio::test]
async fn test_insert_if_not_exists_keeps_existing_row() -> Result<()> {
    let service = create_test_service().await?;
    service.insert("users", &john()).await?;

    let duplicate = john().with_value("name", "Someone Else");
    let inserted = service
        .insert_if_not_exists("users", &duplicate, &["id"])
        .await?;
    assert_eq!(inserted, 0);

    let rows = service.find("users", "id", 1, &["name"]).await?;
    assert_eq!(rows[0]["name"], Value::Text("John Doe".into()));
    Ok(())
}

#[tokio::test]
async fn test_plain_insert_reports_constraint_violation() -> Result<()> {
    let service = create_test_service().await?;
    service.insert("users", &john()).await?;

    let err = service.insert("users", &john()).await.unwrap_err();
    assert!(err.is_driver());
    assert!(err.to_string().starts_with("insert failed on table 'users'"));
    Ok(())
}

#[tokio::test]
async fn test_insert_or_update_overwrites_non_key_columns() -> Result<()> {
    let service = create_test_service().await?;
    let first = Row::new().with_value("user_id", 7).with_value("text", "hi");
    service.insert_or_update("messages", &first, &["user_id"]).await?;

    let second = Row::new().with_value("user_id", 7).with_value("text", "bye");
    service.insert_or_update("messages", &second, &["user_id"]).await?;

    let rows = service
        .select_by_all("messages", &Condition::new().with_value("user_id", 7), &[])
        .await?;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["text"], Value::Text("bye".into()));
    Ok(())
}

#[tokio::test]
async fn test_insert_or_update_with_only_key_columns_is_a_no_op() -> Result<()> {
    let service = create_test_service().await?;
    let row = Row::new().with_value("user_id", 9);
    service.insert_or_update("messages", &row, &["user_id"]).await?;
    assert_eq!(
        service.insert_or_update("messages", &row, &["user_id"]).await?,
        0
    );
    Ok(())
}

#[tokio::test]
async fn test_conflict_key_must_be_a_row_column() -> Result<()> {
    let service = create_test_service().await?;
    let err = service
        .insert_or_update("users", &john(), &["nickname"])
        .await
        .unwrap_err();
    assert!(err.is_conflict_spec());
    assert!(err.to_string().contains("insert_or_update failed on table 'users'"));
    Ok(())
}

#[tokio::test]
async fn test_select_by_all_and_any() -> Result<()> {
    let service = create_test_service().await?;
    service.insert("users", &john()).await?;
    service
        .insert(
            "users",
            &Row::new()
                .with_value("id", 2)
                .with_value("name", "Jane")
                .with_value("email", "jane@example.com")
                .with_value("age", 30),
        )
        .await?;

    let condition = Condition::new().with_value("name", "Jane").with_value("age", 30);
    let all = service.select_by_all("users", &condition, &["id"]).await?;
    assert_eq!(all.len(), 1);
    assert_eq!(all[0]["id"], Value::Integer(2));

    let any = service.select_by_any("users", &condition, &["id"]).await?;
    assert_eq!(any.len(), 2);

    let none = service
        .select_by_all("users", &Condition::new().with_value("name", "Nobody"), &[])
        .await?;
    assert!(none.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_update_by_any_touches_every_match() -> Result<()> {
    let service = create_test_service().await?;
    service.insert("users", &john()).await?;
    service
        .insert(
            "users",
            &Row::new()
                .with_value("id", 2)
                .with_value("name", "Jane")
                .with_value("email", "jane@example.com"),
        )
        .await?;

    let changed = service
        .update_by_any(
            "users",
            &Row::new().with_value("age", 40),
            &Condition::new().with_value("id", 1).with_value("name", "Jane"),
        )
        .await?;
    assert_eq!(changed, 2);
    Ok(())
}

#[tokio::test]
async fn test_empty_condition_never_reaches_the_store() -> Result<()> {
    let service = create_test_service().await?;
    service.insert("users", &john()).await?;

    let err = service
        .update_by_all("users", &Row::new().with_value("age", 1), &Condition::new())
        .await
        .unwrap_err();
    assert_eq!(err.validation(), Some(&ValidationError::EmptyCondition));

    let err = service
        .select_by_any("users", &Condition::new(), &[])
        .await
        .unwrap_err();
    assert_eq!(err.validation(), Some(&ValidationError::EmptyCondition));

    let rows = service.find("users", "id", 1, &["age"]).await?;
    assert_eq!(rows[0]["age"], Value::Integer(30));
    Ok(())
}

#[tokio::test]
async fn test_blob_cells_come_back_as_text_when_utf8() -> Result<()> {
    let service = create_test_service().await?;
    service
        .insert(
            "messages",
            &Row::new()
                .with_value("user_id", 1)
                .with_value("payload", b"plain".to_vec()),
        )
        .await?;
    service
        .insert(
            "messages",
            &Row::new()
                .with_value("user_id", 2)
                .with_value("payload", vec![0xffu8, 0x00]),
        )
        .await?;

    let rows = service.find("messages", "user_id", 1, &["payload", "text"]).await?;
    assert_eq!(rows[0]["payload"], Value::Text("plain".into()));
    assert_eq!(rows[0]["text"], Value::Text(String::new()));

    let rows = service.find("messages", "user_id", 2, &["payload"]).await?;
    assert_eq!(rows[0]["payload"], Value::Blob(vec![0xff, 0x00]));
    Ok(())
}

#[tokio::test]
async fn test_drop_table() -> Result<()> {
    let service = create_test_service().await?;
    service.drop_table("messages").await?;
    // dropping a missing table is fine
    service.drop_table("messages").await?;

    let err = service
        .insert("messages", &Row::new().with_value("user_id", 1))
        .await
        .unwrap_err();
    assert!(err.is_driver());
    Ok(())
}

#[tokio::test]
async fn test_raw_statements_are_terminated_and_validated() -> Result<()> {
    let service = create_test_service().await?;
    let rows = service.select("  SELECT 2 AS two  ", Vec::new()).await?;
    assert_eq!(rows[0]["two"], Value::Integer(2));

    let rows = service.select("SELECT 3 AS three;", Vec::new()).await?;
    assert_eq!(rows[0]["three"], Value::Integer(3));

    let err = service.execute("   ", Vec::new()).await.unwrap_err();
    assert_eq!(err.validation(), Some(&ValidationError::EmptyStatement));
    assert!(err.to_string().starts_with("execute failed:"));
    Ok(())
}

#[tokio::test]
async fn test_execute_accepts_writes_that_return_rows() -> Result<()> {
    let service = create_test_service().await?;
    service
        .execute(
            "CREATE TABLE notes (id INTEGER PRIMARY KEY, body TEXT, score REAL)",
            Vec::new(),
        )
        .await?;

    let changed = service
        .execute(
            "INSERT INTO notes (body) VALUES (?) RETURNING id",
            vec![Value::from("a")],
        )
        .await?;
    assert_eq!(changed, 1);

    service.execute("PRAGMA journal_mode = DELETE", Vec::new()).await?;

    let rows = service
        .select("SELECT COUNT(*) AS n FROM notes", Vec::new())
        .await?;
    assert_eq!(rows[0]["n"].as_i64(), Some(1));

    let rows = service.find("notes", "body", "a", &["score"]).await?;
    assert!(rows[0]["score"].is_null());
    assert_eq!(rows[0]["score"].as_f64(), None);

    service
        .update_by_all(
            "notes",
            &Row::new().with_value("score", 2.5),
            &Condition::new().with_value("body", "a"),
        )
        .await?;
    let rows = service.find("notes", "body", "a", &["score"]).await?;
    assert_eq!(rows[0]["score"].as_f64(), Some(2.5));
    Ok(())
}

#[tokio::test]
async fn test_unbounded_timeout_runs_statements() -> Result<()> {
    let service = create_test_service().await?.with_timeout(Duration::MAX);
    let rows = service.select("SELECT 1 AS one", Vec::new()).await?;
    assert_eq!(rows[0]["one"].as_i64(), Some(1));

    service.insert("users", &john()).await?;
    assert_eq!(service.find("users", "id", 1, &["id"]).await?.len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_unbounded_timeout_from_config() -> Result<()> {
    let dir = TempDir::new()?;
    let config: SqliteConfig = serde_json::from_value(serde_json::json!({
        "db_path": dir.path().join("big.sqlite"),
        "timeout": { "secs": u64::MAX, "nanos": 0 }
    }))?;
    let service = SqliteService::start(config).await?;
    assert_eq!(service.timeout(), Duration::from_secs(u64::MAX));
    let rows = service.select("SELECT 2 AS two", Vec::new()).await?;
    assert_eq!(rows[0]["two"].as_i64(), Some(2));
    Ok(())
}

#[tokio::test]
async fn test_zero_timeout_exceeds_deadline() -> Result<()> {
    let service = create_test_service().await?.with_timeout(Duration::ZERO);
    let err = service
        .select_by_all("users", &Condition::new().with_value("id", 1), &[])
        .await
        .unwrap_err();
    assert!(err.is_deadline_exceeded());
    Ok(())
}

#[tokio::test]
async fn test_long_running_statement_is_interrupted() -> Result<()> {
    let service = create_test_service().await?.with_timeout(Duration::from_millis(50));
    let err = service
        .select(
            "WITH RECURSIVE n(x) AS (SELECT 1 UNION ALL SELECT x + 1 FROM n) \
             SELECT COUNT(*) FROM n",
            Vec::new(),
        )
        .await
        .unwrap_err();
    assert!(err.is_deadline_exceeded());

    // the connection is usable again afterwards
    let service = service.with_timeout(Duration::from_secs(5));
    let rows = service.select("SELECT 1 AS one", Vec::new()).await?;
    assert_eq!(rows[0]["one"], Value::Integer(1));
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_reads() -> Result<()> {
    let service = create_test_service().await?;
    for id in 1..=8 {
        service
            .insert(
                "users",
                &Row::new()
                    .with_value("id", id)
                    .with_value("name", format!("user{id}"))
                    .with_value("email", format!("user{id}@example.com")),
            )
            .await?;
    }

    let lookups = (1..=8).map(|id| service.find("users", "id", id, &["name"]));
    let results = futures::future::join_all(lookups).await;
    for (id, result) in (1..=8).zip(results) {
        let rows = result?;
        assert_eq!(rows[0]["name"], Value::Text(format!("user{id}")));
    }
    Ok(())
}
