use crate::item::{ITEM_TABLE, Item, create_item_table, item_mapper};
use rust_decimal::Decimal;
use std::sync::Arc;
use trove::{
    Condition, CrudRepository, ErrorKind, Executor, PageRequest, Pool, PooledRepository, Query,
};

pub async fn pooled<P: Pool>(pool: Arc<P>) {
    let _lock = ITEM_TABLE.lock().await;

    // Setup
    let repository = {
        let mut connection = pool.acquire().await.expect("Could not acquire a connection");
        create_item_table(&mut connection).await;
        let repository = CrudRepository::for_driver(item_mapper(), connection.driver());
        pool.release(connection);
        PooledRepository::new(pool.clone(), repository)
    };

    let mut ids = Vec::new();
    for (name, cents) in [("pen", 150), ("ink", 900), ("pad", 325), ("nib", 75)] {
        let item = repository
            .insert(Item {
                id: None,
                name: name.into(),
                price: Decimal::new(cents, 2),
            })
            .await
            .expect("Failed to insert through the pool");
        ids.push(item.id.expect("The generated id must be set"));
    }
    assert_eq!(repository.count_all().await.unwrap(), 4);
    assert!(repository.exists_by_id(&ids[0]).await.unwrap());

    let found = repository
        .find(&ids[1])
        .await
        .unwrap()
        .expect("Failed to find the ink");
    assert_eq!(found.name, "ink");

    let updated = repository
        .update(Item {
            price: Decimal::new(950, 2),
            ..found
        })
        .await
        .expect("Failed to update through the pool");
    repository
        .update_dynamic(Item {
            id: Some(ids[2]),
            name: "notepad".into(),
            price: Decimal::new(325, 2),
        })
        .await
        .expect("Failed to update dynamically through the pool");
    repository
        .save(Item {
            name: "fountain ink".into(),
            ..updated
        })
        .await
        .expect("Failed to save through the pool");
    repository
        .update_by_query(
            Item {
                id: Some(ids[3]),
                name: "nib".into(),
                price: Decimal::new(80, 2),
            },
            &Query::from(Condition::equal("name", "nib")),
        )
        .await
        .expect("Failed to update by query through the pool");
    repository
        .update_dynamic_by_query(
            Item {
                id: Some(ids[3]),
                name: "never".into(),
                price: Decimal::new(1, 2),
            },
            &Query::from(Condition::equal("name", "missing")),
        )
        .await
        .expect("Failed to update dynamically by query through the pool");

    let names = repository
        .find_all_by(&Query::new().asc("price"))
        .await
        .unwrap()
        .into_iter()
        .map(|v| v.name)
        .collect::<Vec<_>>();
    assert_eq!(names, ["nib", "pen", "notepad", "fountain ink"]);
    assert_eq!(repository.find_all().await.unwrap().len(), 4);

    let expensive = Query::from(Condition::greater_equal("price", Decimal::new(300, 2)));
    assert_eq!(repository.count(&expensive).await.unwrap(), 2);
    assert!(repository.exists(&expensive).await.unwrap());
    let first = repository
        .find_one(&expensive.clone().desc("price"))
        .await
        .unwrap()
        .expect("Failed to find the most expensive item");
    assert_eq!(first.name, "fountain ink");

    let page = repository
        .find_page(&Query::new().asc("id"), PageRequest::of(1, 3).unwrap())
        .await
        .expect("Failed to query a page through the pool");
    assert_eq!(page.total_elements(), 4);
    assert_eq!(page.len(), 1);
    assert_eq!(page.content()[0].id, Some(ids[3]));
    let page = repository
        .find_all_page(PageRequest::at_offset(10, 5).unwrap())
        .await
        .unwrap();
    assert!(page.is_empty());
    assert_eq!(page.total_elements(), 4);

    repository
        .delete(ids[0])
        .await
        .expect("Failed to delete through the pool");
    let error = repository
        .delete(ids[0])
        .await
        .expect_err("Deleting twice through the pool must fail");
    assert_eq!(ErrorKind::of(&error), ErrorKind::NotFound);
    assert_eq!(repository.count_all().await.unwrap(), 3);

    // Concurrent callers each get their own connection
    let counts = count_twice(&repository).await;
    assert_eq!(counts, (3, 3));
}

async fn count_twice<P: Pool>(repository: &PooledRepository<P, i64, Item>) -> (u64, u64) {
    let (a, b) = tokio::join!(repository.count_all(), repository.count_all());
    (a.unwrap(), b.unwrap())
}
