#[cfg(test)]
mod tests {
    use indoc::indoc;
    use std::{path::Path, time::Duration};
    use tokio::fs;
    use trove_core::{
        Connection, CrudRepository, Driver, Executor, Pool, QueryResult, Statement, Transaction,
        Value,
        stream::TryStreamExt,
    };
    use trove_sqlite::{SqliteConnection, SqliteDriver, SqlitePool};
    use trove_tests::{execute_tests, init_logs, silent_logs};

    #[tokio::test]
    async fn sqlite() {
        init_logs();
        let pool = SqlitePool::connect("sqlite://:memory:?max_connections=4".into())
            .await
            .expect("Could not create the sqlite pool");
        execute_tests(pool).await;
    }

    #[tokio::test]
    async fn wrong_url() {
        silent_logs! {
            assert!(SqliteConnection::connect("mysql://x".into()).await.is_err());
            assert!(SqlitePool::connect("sqlite://?max_connections=0".into()).await.is_err());
            assert!(SqlitePool::connect("sqlite://?max_connections=many".into()).await.is_err());
            assert!(
                SqliteConnection::connect("sqlite://../target/missing/dir/db.sqlite?mode=ro".into())
                    .await
                    .is_err()
            );
        };
    }

    #[tokio::test]
    async fn create_database() {
        init_logs();
        const DB_PATH: &str = "../target/creation.sqlite";
        if Path::new(DB_PATH).exists() {
            fs::remove_file(DB_PATH)
                .await
                .expect("Failed to remove the test database file");
        }
        if let Some(parent) = Path::new(DB_PATH).parent() {
            fs::create_dir_all(parent)
                .await
                .expect("Failed to create the target directory");
        }
        let driver = SqliteDriver::new();
        let mut connection = driver
            .connect(format!("sqlite://{}", DB_PATH).into())
            .await
            .expect("Could not open the database");
        assert!(
            Path::new(DB_PATH).exists(),
            "Database file should be created after connection"
        );
        connection
            .execute(Statement::raw(
                r#"CREATE TABLE "note" ("id" INTEGER PRIMARY KEY, "text" TEXT)"#,
            ))
            .await
            .expect("Could not create the note table");
        drop(connection);
        let mut read_only = SqliteConnection::connect(format!("sqlite://{}?mode=ro", DB_PATH).into())
            .await
            .expect("Could not open the database read only");
        silent_logs! {
            assert!(
                read_only
                    .execute(Statement::raw(r#"INSERT INTO "note" ("text") VALUES ('x')"#))
                    .await
                    .is_err(),
                "A read only connection cannot write"
            );
        };
        drop(read_only);
        fs::remove_file(DB_PATH)
            .await
            .expect("Failed to remove the test database file");
        silent_logs! {
            assert!(
                SqliteConnection::connect(format!("sqlite://{}?mode=ro", DB_PATH).into())
                    .await
                    .is_err(),
                "Should not be able to open in read only a missing database"
            );
        };
    }

    #[tokio::test]
    async fn statements_run_in_order() {
        init_logs();
        let mut connection = SqliteConnection::connect("sqlite://".into())
            .await
            .expect("Could not connect");
        let results = connection
            .run(
                Statement::raw(indoc! {r#"
                    CREATE TABLE "note" ("id" INTEGER PRIMARY KEY, "text" TEXT NOT NULL);
                    INSERT INTO "note" ("text") VALUES (?), (?);
                    SELECT "id", "text" FROM "note" WHERE "id" > ? ORDER BY "id";
                    -- trailing comment
                "#})
                .bind("first")
                .bind("second")
                .bind(0),
            )
            .try_collect::<Vec<_>>()
            .await
            .expect("Could not run the statements");
        assert_eq!(results.len(), 4);
        let QueryResult::Affected(created) = &results[0] else {
            panic!("Expected the create result, found {:?}", results[0]);
        };
        assert_eq!(created.rows_affected, 0);
        assert_eq!(created.last_affected_id, None);
        let QueryResult::Affected(inserted) = &results[1] else {
            panic!("Expected the insert result, found {:?}", results[1]);
        };
        assert_eq!(inserted.rows_affected, 2);
        assert_eq!(inserted.last_affected_id, Some(2));
        let QueryResult::Row(row) = &results[3] else {
            panic!("Expected a row, found {:?}", results[3]);
        };
        assert_eq!(row.names(), ["id", "text"]);
        assert_eq!(
            row.values(),
            [Value::Int64(Some(2)), Value::Varchar(Some("second".into()))]
        );

        let deleted = connection
            .execute(Statement::raw(r#"DELETE FROM "note""#))
            .await
            .expect("Could not delete");
        assert_eq!(deleted.rows_affected, 2);
        assert_eq!(deleted.last_affected_id, None);

        silent_logs! {
            assert!(
                connection
                    .execute(Statement::raw(r#"DELETE FROM "note" WHERE "id" = ?"#))
                    .await
                    .is_err(),
                "Missing parameters"
            );
            assert!(
                connection
                    .execute(Statement::raw(r#"DELETE FROM "note""#).bind(1))
                    .await
                    .is_err(),
                "Unused parameters"
            );
            assert!(
                connection
                    .execute(Statement::raw(r#"SELECT "missing" FROM "note""#))
                    .await
                    .is_err(),
                "Double quoted names are never string literals"
            );
        };
    }

    #[tokio::test]
    async fn pool_bounds_connections() {
        init_logs();
        let pool = SqlitePool::connect("sqlite://?max_connections=2".into())
            .await
            .expect("Could not create the sqlite pool");
        assert_eq!(pool.max_connections(), 2);
        assert!(pool.filename().contains("mode=memory"));
        let mut first = pool.acquire().await.expect("Could not acquire");
        let mut second = pool.acquire().await.expect("Could not acquire");
        assert_eq!(pool.available(), 0);
        let waiting = tokio::time::timeout(Duration::from_millis(50), pool.acquire()).await;
        assert!(waiting.is_err(), "A third connection must wait");

        // Connections of the pool share the memory database
        first
            .execute(Statement::raw(
                r#"CREATE TABLE "shared" ("id" INTEGER PRIMARY KEY)"#,
            ))
            .await
            .expect("Could not create the shared table");
        first
            .execute(Statement::raw(r#"INSERT INTO "shared" ("id") VALUES (7)"#))
            .await
            .expect("Could not insert");
        let seen = second
            .execute(Statement::raw(r#"DELETE FROM "shared" WHERE "id" = 7"#))
            .await
            .expect("Could not delete");
        assert_eq!(seen.rows_affected, 1);

        pool.release(first);
        assert_eq!(pool.available(), 1);
        let third = pool.acquire().await.expect("Could not acquire");
        pool.release(second);
        pool.release(third);
        assert_eq!(pool.available(), 2);
    }

    #[tokio::test]
    async fn dropped_transaction_rolls_back() {
        init_logs();
        let mut connection = SqliteConnection::connect("sqlite://:memory:".into())
            .await
            .expect("Could not connect");
        connection
            .execute(Statement::raw(indoc! {r#"
                CREATE TABLE "counter" ("id" INTEGER PRIMARY KEY, "value" INTEGER NOT NULL);
                INSERT INTO "counter" ("id", "value") VALUES (1, 10)
            "#}))
            .await
            .expect("Could not prepare the counter table");
        silent_logs! {
            let mut transaction = connection.begin().await.expect("Could not begin");
            transaction
                .execute(Statement::raw(r#"UPDATE "counter" SET "value" = 11 WHERE "id" = 1"#))
                .await
                .expect("Could not update");
            drop(transaction);
        };
        assert!(connection.is_autocommit());
        let count = connection
            .execute(Statement::raw(r#"DELETE FROM "counter" WHERE "value" = 10"#))
            .await
            .expect("Could not delete");
        assert_eq!(count.rows_affected, 1);

        let mut transaction = connection.begin().await.expect("Could not begin");
        transaction
            .execute(Statement::raw(
                r#"INSERT INTO "counter" ("id", "value") VALUES (2, 20)"#,
            ))
            .await
            .expect("Could not insert");
        transaction.commit().await.expect("Could not commit");
        assert!(connection.is_autocommit());
        let count = connection
            .execute(Statement::raw(r#"DELETE FROM "counter" WHERE "id" = 2"#))
            .await
            .expect("Could not delete");
        assert_eq!(count.rows_affected, 1);
    }

    #[derive(Debug, Default, PartialEq)]
    struct City {
        id: Option<i32>,
        name: String,
        population: Option<i64>,
        area: Option<f64>,
    }

    #[tokio::test]
    async fn upsert_keeps_generated_keys() {
        init_logs();
        let mut connection = SqliteConnection::connect("sqlite://".into())
            .await
            .expect("Could not connect");
        connection
            .execute(Statement::raw(indoc! {r#"
                CREATE TABLE "city" (
                    "id" INTEGER PRIMARY KEY,
                    "name" TEXT NOT NULL,
                    "population" INTEGER,
                    "area" REAL
                )
            "#}))
            .await
            .expect("Could not create the city table");
        let mapper = trove_core::RowMapper::builder("city", City::default)
            .pk("id", |e: &City| e.id, |e: &mut City, v| e.id = Some(v))
            .autogenerated()
            .add_field("name", |e: &City| e.name.clone(), |e: &mut City, v| e.name = v)
            .add_field(
                "population",
                |e: &City| e.population,
                |e: &mut City, v| e.population = v,
            )
            .add_field("area", |e: &City| e.area, |e: &mut City, v| e.area = v)
            .build()
            .expect("Could not build the mapper");
        let repository = CrudRepository::for_driver(mapper, connection.driver());
        let turin = repository
            .save(
                &mut connection,
                City {
                    id: None,
                    name: "Turin".into(),
                    population: Some(841_600),
                    area: Some(130.01),
                },
            )
            .await
            .expect("Could not save");
        assert_eq!(turin.id, Some(1));
        let updated = repository
            .save(
                &mut connection,
                City {
                    population: Some(850_000),
                    ..turin
                },
            )
            .await
            .expect("Could not upsert");
        assert_eq!(repository.count_all(&mut connection).await.unwrap(), 1);
        let found = repository
            .find(&mut connection, &1)
            .await
            .expect("Could not find")
            .expect("The city must exist");
        assert_eq!(found, updated);
    }
}
