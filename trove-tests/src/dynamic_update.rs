use indoc::indoc;
use std::sync::LazyLock;
use tokio::sync::Mutex;
use trove::{Condition, CrudRepository, Executor, Query, RowMapper, Statement};

#[derive(Debug, Clone, Default, PartialEq)]
struct Profile {
    id: Option<i32>,
    nickname: Option<String>,
    email: Option<String>,
    age: Option<i16>,
}

fn profile_mapper() -> RowMapper<i32, Profile> {
    RowMapper::builder("profile", Profile::default)
        .pk("id", |e: &Profile| e.id, |e: &mut Profile, id| e.id = Some(id))
        .autogenerated()
        .add_field(
            "nickname",
            |e: &Profile| e.nickname.clone(),
            |e: &mut Profile, v| e.nickname = v,
        )
        .add_field(
            "email",
            |e: &Profile| e.email.clone(),
            |e: &mut Profile, v| e.email = v,
        )
        .add_field("age", |e: &Profile| e.age, |e: &mut Profile, v| e.age = v)
        .build()
        .expect("Failed to build the Profile mapper")
}

static MUTEX: LazyLock<Mutex<()>> = LazyLock::new(|| Mutex::new(()));

pub async fn dynamic_update<Exec: Executor>(executor: &mut Exec) {
    let _lock = MUTEX.lock().await;

    // Setup
    executor
        .execute(Statement::raw(r#"DROP TABLE IF EXISTS "profile""#))
        .await
        .expect("Failed to drop the profile table");
    executor
        .execute(Statement::raw(indoc! {r#"
            CREATE TABLE "profile" (
                "id" INTEGER PRIMARY KEY,
                "nickname" TEXT,
                "email" TEXT,
                "age" INTEGER
            )
        "#}))
        .await
        .expect("Failed to create the profile table");
    let repository = CrudRepository::for_driver(profile_mapper(), executor.driver());

    let profile = repository
        .insert(
            executor,
            Profile {
                id: None,
                nickname: Some("neo".into()),
                email: Some("neo@example.com".into()),
                age: Some(37),
            },
        )
        .await
        .expect("Failed to insert the profile");
    let id = profile.id.expect("The generated id must be set");

    // Only the present fields are written
    repository
        .update_dynamic(
            executor,
            Profile {
                id: Some(id),
                nickname: Some("the one".into()),
                ..Default::default()
            },
        )
        .await
        .expect("Failed to update the nickname");
    let found = repository.find(executor, &id).await.unwrap().unwrap();
    assert_eq!(
        found,
        Profile {
            id: Some(id),
            nickname: Some("the one".into()),
            email: Some("neo@example.com".into()),
            age: Some(37),
        }
    );

    // Nothing present, nothing sent
    repository
        .update_dynamic(
            executor,
            Profile {
                id: Some(id),
                ..Default::default()
            },
        )
        .await
        .expect("An empty dynamic update must succeed");
    assert_eq!(repository.find(executor, &id).await.unwrap().unwrap(), found);

    // The condition restricts the update
    repository
        .update_dynamic_by_query(
            executor,
            Profile {
                id: Some(id),
                age: Some(38),
                ..Default::default()
            },
            &Query::from(Condition::greater("age", 100)),
        )
        .await
        .expect("Failed to run the restricted update");
    assert_eq!(
        repository.find(executor, &id).await.unwrap().unwrap().age,
        Some(37)
    );
    repository
        .update_dynamic_by_query(
            executor,
            Profile {
                id: Some(id),
                age: Some(38),
                ..Default::default()
            },
            &Query::from(Condition::less("age", 100).and(Condition::is_not_null("email"))),
        )
        .await
        .expect("Failed to run the matching update");
    assert_eq!(
        repository.find(executor, &id).await.unwrap().unwrap().age,
        Some(38)
    );

    // The full update writes the missing fields as NULL
    repository
        .update_by_query(
            executor,
            Profile {
                id: Some(id),
                nickname: Some("neo".into()),
                ..Default::default()
            },
            &Query::from(Condition::equal("nickname", "the one")),
        )
        .await
        .expect("Failed to run the full update");
    assert_eq!(
        repository.find(executor, &id).await.unwrap().unwrap(),
        Profile {
            id: Some(id),
            nickname: Some("neo".into()),
            email: None,
            age: None,
        }
    );
}
