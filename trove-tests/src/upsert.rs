use indoc::indoc;
use std::sync::LazyLock;
use tokio::sync::Mutex;
use trove::{CrudRepository, ErrorKind, Executor, RowMapper, Statement};

#[derive(Debug, Clone, Default, PartialEq)]
struct Setting {
    key: String,
    value: String,
    revision: i32,
}

fn setting_mapper() -> RowMapper<String, Setting> {
    RowMapper::builder("setting", Setting::default)
        .pk(
            "key",
            |e: &Setting| Some(e.key.clone()),
            |e: &mut Setting, key| e.key = key,
        )
        .add_field(
            "value",
            |e: &Setting| e.value.clone(),
            |e: &mut Setting, v| e.value = v,
        )
        .add_field(
            "revision",
            |e: &Setting| e.revision,
            |e: &mut Setting, v| e.revision = v,
        )
        .build()
        .expect("Failed to build the Setting mapper")
}

static MUTEX: LazyLock<Mutex<()>> = LazyLock::new(|| Mutex::new(()));

pub async fn upsert<Exec: Executor>(executor: &mut Exec) {
    let _lock = MUTEX.lock().await;

    // Setup
    executor
        .execute(Statement::raw(r#"DROP TABLE IF EXISTS "setting""#))
        .await
        .expect("Failed to drop the setting table");
    executor
        .execute(Statement::raw(indoc! {r#"
            CREATE TABLE "setting" (
                "key" TEXT PRIMARY KEY,
                "value" TEXT NOT NULL,
                "revision" INTEGER NOT NULL
            )
        "#}))
        .await
        .expect("Failed to create the setting table");
    let repository = CrudRepository::for_driver(setting_mapper(), executor.driver());

    // Same key twice leaves one row with the last values
    let theme = Setting {
        key: "theme".into(),
        value: "dark".into(),
        revision: 1,
    };
    repository
        .save(executor, theme.clone())
        .await
        .expect("Failed to save the theme");
    repository
        .save(executor, theme.clone())
        .await
        .expect("Failed to save the theme again");
    assert_eq!(repository.count_all(executor).await.unwrap(), 1);
    let changed = Setting {
        value: "light".into(),
        revision: 2,
        ..theme.clone()
    };
    let returned = repository
        .save(executor, changed.clone())
        .await
        .expect("Failed to overwrite the theme");
    assert_eq!(returned, changed);
    assert_eq!(repository.count_all(executor).await.unwrap(), 1);
    let found = repository
        .find(executor, &"theme".to_string())
        .await
        .expect("Failed to query the theme")
        .expect("Failed to find the theme");
    assert_eq!(found, changed);

    // Plain insert of an existing key is a storage error
    let error = repository
        .insert(executor, theme)
        .await
        .expect_err("Inserting a duplicate key must fail");
    assert_eq!(ErrorKind::of(&error), ErrorKind::Storage);
    assert_eq!(
        repository
            .find(executor, &"theme".to_string())
            .await
            .unwrap()
            .unwrap()
            .revision,
        2
    );

    // Another key is another row
    repository
        .save(
            executor,
            Setting {
                key: "language".into(),
                value: "en".into(),
                revision: 1,
            },
        )
        .await
        .expect("Failed to save the language");
    assert_eq!(repository.count_all(executor).await.unwrap(), 2);
}
