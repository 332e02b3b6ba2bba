use crate::item::{ITEM_TABLE, Item, create_item_table, item_mapper};
use rust_decimal::Decimal;
use trove::{Connection, CrudRepository, Transaction};

pub async fn transaction<C: Connection>(connection: &mut C) {
    let _lock = ITEM_TABLE.lock().await;

    // Setup
    create_item_table(connection).await;
    let repository = CrudRepository::for_driver(item_mapper(), connection.driver());

    // Rolled back
    let mut transaction = connection
        .begin()
        .await
        .expect("Could not begin a transaction");
    let discarded = repository
        .insert(
            &mut transaction,
            Item {
                id: None,
                name: "discarded".into(),
                price: Decimal::ONE,
            },
        )
        .await
        .expect("Failed to insert in the transaction");
    let discarded = discarded.id.unwrap();
    assert!(
        repository
            .exists_by_id(&mut transaction, &discarded)
            .await
            .unwrap(),
        "The transaction must see its own insert"
    );
    transaction
        .rollback()
        .await
        .expect("Failed to roll back the transaction");
    assert!(
        repository
            .find(connection, &discarded)
            .await
            .unwrap()
            .is_none()
    );
    assert_eq!(repository.count_all(connection).await.unwrap(), 0);

    // Committed
    let mut transaction = connection
        .begin()
        .await
        .expect("Could not begin a transaction");
    let kept = repository
        .insert(
            &mut transaction,
            Item {
                id: None,
                name: "kept".into(),
                price: Decimal::TEN,
            },
        )
        .await
        .expect("Failed to insert in the transaction");
    repository
        .delete(&mut transaction, kept.id.unwrap())
        .await
        .expect("Failed to delete in the transaction");
    repository
        .save(&mut transaction, kept.clone())
        .await
        .expect("Failed to save in the transaction");
    transaction
        .commit()
        .await
        .expect("Failed to commit the transaction");
    let found = repository
        .find(connection, &kept.id.unwrap())
        .await
        .expect("Failed to query the committed item")
        .expect("Failed to find the committed item");
    assert_eq!(found, kept);
}
