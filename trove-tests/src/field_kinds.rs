use indoc::indoc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, sync::LazyLock};
use time::{
    Date, OffsetDateTime, PrimitiveDateTime, Time,
    macros::{date, datetime, format_description, time},
};
use tokio::sync::Mutex;
use trove::{CrudRepository, Executor, RowMapper, Statement};
use uuid::Uuid;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct Payload {
    title: String,
    tags: Vec<String>,
    counters: BTreeMap<String, i64>,
}

#[derive(Debug, Clone, PartialEq)]
struct Event {
    id: Uuid,
    day: Option<Date>,
    at: Option<Time>,
    stamp: Option<PrimitiveDateTime>,
    zoned: Option<OffsetDateTime>,
    local_day: Option<Date>,
    amount: Option<Decimal>,
    reference: Option<Uuid>,
    payload: Option<Payload>,
}

impl Default for Event {
    fn default() -> Self {
        Self {
            id: Uuid::nil(),
            day: None,
            at: None,
            stamp: None,
            zoned: None,
            local_day: None,
            amount: None,
            reference: None,
            payload: None,
        }
    }
}

fn event_mapper() -> RowMapper<Uuid, Event> {
    RowMapper::builder("event", Event::default)
        .pk_as(
            "id",
            |e: &Event| Some(e.id).filter(|v| !v.is_nil()),
            |e: &mut Event, id| e.id = id,
            |id: &Uuid| id.hyphenated().to_string(),
            |v: String| Uuid::parse_str(&v).map_err(Into::into),
        )
        .add_date("day", |e: &Event| e.day, |e: &mut Event, v| e.day = Some(v))
        .add_time("at", |e: &Event| e.at, |e: &mut Event, v| e.at = Some(v))
        .add_timestamp(
            "stamp",
            |e: &Event| e.stamp,
            |e: &mut Event, v| e.stamp = Some(v),
        )
        .add_timestamp_with_timezone(
            "zoned",
            |e: &Event| e.zoned,
            |e: &mut Event, v| e.zoned = Some(v),
        )
        .add_temporal(
            "local_day",
            |e: &Event| e.local_day,
            |e: &mut Event, v| e.local_day = Some(v),
            format_description!("[day]/[month]/[year]"),
        )
        .add_decimal(
            "amount",
            |e: &Event| e.amount,
            |e: &mut Event, v| e.amount = Some(v),
        )
        .add_uuid(
            "reference",
            |e: &Event| e.reference,
            |e: &mut Event, v| e.reference = Some(v),
        )
        .add_json(
            "payload",
            |e: &Event| e.payload.as_ref(),
            |e: &mut Event, v| e.payload = Some(v),
        )
        .build()
        .expect("Failed to build the Event mapper")
}

static MUTEX: LazyLock<Mutex<()>> = LazyLock::new(|| Mutex::new(()));

pub async fn field_kinds<Exec: Executor>(executor: &mut Exec) {
    let _lock = MUTEX.lock().await;

    // Setup
    executor
        .execute(Statement::raw(r#"DROP TABLE IF EXISTS "event""#))
        .await
        .expect("Failed to drop the event table");
    executor
        .execute(Statement::raw(indoc! {r#"
            CREATE TABLE "event" (
                "id" TEXT PRIMARY KEY,
                "day" TEXT,
                "at" TEXT,
                "stamp" TEXT,
                "zoned" TEXT,
                "local_day" TEXT,
                "amount" TEXT,
                "reference" TEXT,
                "payload" TEXT
            )
        "#}))
        .await
        .expect("Failed to create the event table");
    let repository = CrudRepository::for_driver(event_mapper(), executor.driver());

    // Every kind populated
    let full = Event {
        id: Uuid::new_v4(),
        day: Some(date!(2024 - 02 - 29)),
        at: Some(time!(23:59:58.125)),
        stamp: Some(datetime!(1999-12-31 23:59:59.5)),
        zoned: Some(datetime!(2020-06-15 08:30:00 +02:00)),
        local_day: Some(date!(1970 - 01 - 01)),
        amount: Some(Decimal::new(-12_345_678, 4)),
        reference: Some(Uuid::parse_str("5e915574-bb30-4430-98cf-c5854f61fbbd").unwrap()),
        payload: Some(Payload {
            title: "launch".into(),
            tags: vec!["a".into(), "b \"quoted\"".into()],
            counters: BTreeMap::from([("views".into(), 3), ("likes".into(), -1)]),
        }),
    };
    repository
        .insert(executor, full.clone())
        .await
        .expect("Failed to insert the full event");
    let found = repository
        .find(executor, &full.id)
        .await
        .expect("Failed to query the full event")
        .expect("Failed to find the full event");
    assert_eq!(found, full);

    // Every kind NULL
    let empty = Event {
        id: Uuid::new_v4(),
        ..Default::default()
    };
    repository
        .insert(executor, empty.clone())
        .await
        .expect("Failed to insert the empty event");
    let found = repository
        .find(executor, &empty.id)
        .await
        .expect("Failed to query the empty event")
        .expect("Failed to find the empty event");
    assert_eq!(found, empty);

    // Overwriting with NULLs clears the stored values
    repository
        .update(
            executor,
            Event {
                id: full.id,
                ..Default::default()
            },
        )
        .await
        .expect("Failed to clear the full event");
    let found = repository.find(executor, &full.id).await.unwrap().unwrap();
    assert_eq!(found.payload, None);
    assert_eq!(found.zoned, None);
    assert_eq!(repository.count_all(executor).await.unwrap(), 2);
}
