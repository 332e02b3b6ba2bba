use indoc::indoc;
use rust_decimal::Decimal;
use std::sync::LazyLock;
use tokio::sync::Mutex;
use trove::{
    Condition, CrudRepository, ErrorKind, Executor, Query, RowMapper, Statement,
};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Item {
    pub id: Option<i64>,
    pub name: String,
    pub price: Decimal,
}

pub fn item_mapper() -> RowMapper<i64, Item> {
    RowMapper::builder("item", Item::default)
        .pk("id", |e: &Item| e.id, |e: &mut Item, id| e.id = Some(id))
        .autogenerated()
        .add_field("name", |e: &Item| e.name.clone(), |e: &mut Item, v| e.name = v)
        .add_decimal("price", |e: &Item| Some(e.price), |e: &mut Item, v| e.price = v)
        .build()
        .expect("Failed to build the Item mapper")
}

pub async fn create_item_table<Exec: Executor>(executor: &mut Exec) {
    executor
        .execute(Statement::raw(r#"DROP TABLE IF EXISTS "item""#))
        .await
        .expect("Failed to drop the item table");
    executor
        .execute(Statement::raw(indoc! {r#"
            CREATE TABLE "item" (
                "id" INTEGER PRIMARY KEY,
                "name" TEXT NOT NULL,
                "price" NUMERIC NOT NULL
            )
        "#}))
        .await
        .expect("Failed to create the item table");
}

/// Guards the `item` table, shared by every scenario using it.
pub(crate) static ITEM_TABLE: LazyLock<Mutex<()>> = LazyLock::new(|| Mutex::new(()));

pub async fn item<Exec: Executor>(executor: &mut Exec) {
    let _lock = ITEM_TABLE.lock().await;

    // Setup
    create_item_table(executor).await;
    let repository = CrudRepository::for_driver(item_mapper(), executor.driver());

    // Insert then find
    let inserted = repository
        .insert(
            executor,
            Item {
                id: None,
                name: "a".into(),
                price: Decimal::new(999, 2),
            },
        )
        .await
        .expect("Failed to insert item a");
    let id = inserted.id.expect("The inserted item must carry the generated id");
    let found = repository
        .find(executor, &id)
        .await
        .expect("Failed to query item a")
        .expect("Failed to find item a");
    assert_eq!(
        found,
        Item {
            id: Some(id),
            name: "a".into(),
            price: Decimal::new(999, 2),
        }
    );
    assert!(
        repository
            .exists_by_id(executor, &id)
            .await
            .expect("Failed to check item a")
    );

    // Save without id inserts, save with id overwrites
    let saved = repository
        .save(
            executor,
            Item {
                id: None,
                name: "b".into(),
                price: Decimal::new(150, 2),
            },
        )
        .await
        .expect("Failed to save item b");
    let b = saved.id.expect("The saved item must carry the generated id");
    assert_ne!(b, id);
    repository
        .save(
            executor,
            Item {
                id: Some(b),
                name: "bravo".into(),
                price: Decimal::new(175, 2),
            },
        )
        .await
        .expect("Failed to save item b again");
    let found = repository
        .find(executor, &b)
        .await
        .expect("Failed to query item b")
        .expect("Failed to find item b");
    assert_eq!(found.name, "bravo");
    assert_eq!(found.price, Decimal::new(175, 2));
    assert_eq!(repository.count_all(executor).await.unwrap(), 2);

    // Update
    repository
        .update(
            executor,
            Item {
                id: Some(b),
                name: "b".into(),
                price: Decimal::new(200, 2),
            },
        )
        .await
        .expect("Failed to update item b");
    let found = repository.find(executor, &b).await.unwrap().unwrap();
    assert_eq!(found.name, "b");
    assert_eq!(found.price, Decimal::new(200, 2));
    // Missing row, nothing happens
    repository
        .update(
            executor,
            Item {
                id: Some(9999),
                name: "ghost".into(),
                price: Decimal::ZERO,
            },
        )
        .await
        .expect("Updating a missing item is not an error");
    assert!(repository.find(executor, &9999).await.unwrap().is_none());

    // Queries
    let cheap = repository
        .find_all_by(
            executor,
            &Query::new()
                .filter(Condition::less("price", Decimal::new(500, 2)))
                .desc("price"),
        )
        .await
        .expect("Failed to query cheap items");
    assert_eq!(
        cheap.iter().map(|v| v.name.as_str()).collect::<Vec<_>>(),
        ["b"]
    );
    let below_ten = repository
        .find_all_by(
            executor,
            &Query::new()
                .filter(Condition::less("price", Decimal::TEN))
                .desc("price"),
        )
        .await
        .expect("Failed to query the items below ten");
    assert_eq!(
        below_ten.iter().map(|v| v.name.as_str()).collect::<Vec<_>>(),
        ["a", "b"]
    );
    let one = repository
        .find_one(executor, &Query::from(Condition::like("name", "b%")))
        .await
        .expect("Failed to query item b by name")
        .expect("Failed to find item b by name");
    assert_eq!(one.id, Some(b));
    assert!(
        repository
            .find_one(executor, &Query::from(Condition::equal("name", "zulu")))
            .await
            .unwrap()
            .is_none()
    );
    assert_eq!(
        repository
            .count(executor, &Query::from(Condition::is_in("id", [id, b, 12345])))
            .await
            .unwrap(),
        2
    );
    assert!(
        !repository
            .exists(executor, &Query::from(Condition::greater("price", 100)))
            .await
            .unwrap()
    );

    // Delete
    repository
        .delete(executor, id)
        .await
        .expect("Failed to delete item a");
    assert!(repository.find(executor, &id).await.unwrap().is_none());
    let error = repository
        .delete(executor, id)
        .await
        .expect_err("Deleting item a twice must fail");
    assert_eq!(ErrorKind::of(&error), ErrorKind::NotFound);
    let all = repository.find_all(executor).await.unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].id, Some(b));
}
