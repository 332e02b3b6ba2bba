use indoc::indoc;
use std::sync::LazyLock;
use tokio::sync::Mutex;
use trove::{
    Condition, CrudRepository, Executor, PageRequest, Query, QueryResult, Result, RowMapper,
    Statement, stream::Stream,
};

#[derive(Debug, Clone, Default, PartialEq)]
struct Entry {
    id: i32,
    label: Option<String>,
}

fn entry_mapper() -> RowMapper<i32, Entry> {
    RowMapper::builder("page_entry", Entry::default)
        .pk("id", |e: &Entry| Some(e.id), |e: &mut Entry, id| e.id = id)
        .add_field(
            "label",
            |e: &Entry| e.label.clone(),
            |e: &mut Entry, v| e.label = v,
        )
        .build()
        .expect("Failed to build the Entry mapper")
}

/// Forwards every statement to `inner`, counting them.
struct RoundTrips<'e, Exec> {
    inner: &'e mut Exec,
    count: usize,
}

impl<'e, Exec: Executor> RoundTrips<'e, Exec> {
    fn new(inner: &'e mut Exec) -> Self {
        Self { inner, count: 0 }
    }
}

impl<Exec: Executor> Executor for RoundTrips<'_, Exec> {
    type Driver = Exec::Driver;

    fn driver(&self) -> &Self::Driver {
        self.inner.driver()
    }

    fn run(&mut self, statement: Statement) -> impl Stream<Item = Result<QueryResult>> + Send {
        self.count += 1;
        self.inner.run(statement)
    }
}

static MUTEX: LazyLock<Mutex<()>> = LazyLock::new(|| Mutex::new(()));

pub async fn pagination<Exec: Executor>(executor: &mut Exec) {
    let _lock = MUTEX.lock().await;

    // Setup
    executor
        .execute(Statement::raw(r#"DROP TABLE IF EXISTS "page_entry""#))
        .await
        .expect("Failed to drop the page_entry table");
    executor
        .execute(Statement::raw(indoc! {r#"
            CREATE TABLE "page_entry" (
                "id" INTEGER PRIMARY KEY,
                "label" TEXT
            )
        "#}))
        .await
        .expect("Failed to create the page_entry table");
    let repository = CrudRepository::for_driver(entry_mapper(), executor.driver());

    // Nothing stored yet
    let page = repository
        .find_all_page(executor, PageRequest::of(0, 3).unwrap())
        .await
        .expect("Failed to query an empty page");
    assert!(page.is_empty());
    assert_eq!(page.total_elements(), 0);
    assert_eq!(page.total_pages(), 0);
    assert!(!page.has_next());

    // Nothing to count, nothing to select
    let mut counted = RoundTrips::new(&mut *executor);
    let page = repository
        .find_all_page(&mut counted, PageRequest::of(0, 3).unwrap())
        .await
        .expect("Failed to query an empty page");
    assert!(page.is_empty());
    assert_eq!(counted.count, 1);

    const N: u64 = 7;
    for id in 1..=N as i32 {
        repository
            .insert(
                executor,
                Entry {
                    id,
                    label: Some(format!("entry {id}")),
                },
            )
            .await
            .expect("Failed to insert an entry");
    }

    // Every size and offset, including past the end
    for size in 1..=4u64 {
        for offset in 0..=N + 2 {
            let page = repository
                .find_all_page(executor, PageRequest::at_offset(offset, size).unwrap())
                .await
                .expect("Failed to query a page");
            let expected = size.min(N.saturating_sub(offset));
            assert_eq!(
                page.len() as u64,
                expected,
                "size {size} offset {offset} returned {} entries",
                page.len()
            );
            assert_eq!(page.total_elements(), N);
        }
    }

    // Walking the pages of an ordered query visits every entry once
    let query = Query::new().asc("id");
    let mut request = PageRequest::of(0, 3).unwrap();
    let mut ids = Vec::new();
    loop {
        let page = repository
            .find_page(executor, &query, request)
            .await
            .expect("Failed to query the ordered page");
        assert_eq!(page.total_pages(), 3);
        ids.extend(page.content().iter().map(|v| v.id));
        if !page.has_next() {
            break;
        }
        request = request.next();
    }
    assert_eq!(ids, (1..=N as i32).collect::<Vec<_>>());

    // The count then the select
    let mut counted = RoundTrips::new(&mut *executor);
    let page = repository
        .find_page(&mut counted, &Query::new().asc("id"), PageRequest::of(2, 3).unwrap())
        .await
        .expect("Failed to query the last page");
    assert_eq!(page.content().iter().map(|v| v.id).collect::<Vec<_>>(), [7]);
    assert_eq!(counted.count, 2);

    // A failing select fails the whole call, the count alone is not a page
    let mut counted = RoundTrips::new(&mut *executor);
    crate::silent_logs! {
        let result = repository
            .find_page(
                &mut counted,
                &Query::new().asc("missing"),
                PageRequest::of(0, 3).unwrap(),
            )
            .await;
        assert!(result.is_err(), "Ordering by a missing column must fail");
    };
    assert_eq!(counted.count, 2);

    // A filtered page counts only the matching rows
    let query = Query::new()
        .filter(Condition::greater("id", 2).and(Condition::is_not_null("label")))
        .desc("id");
    let page = repository
        .find_page(executor, &query, PageRequest::of(1, 2).unwrap())
        .await
        .expect("Failed to query the filtered page");
    assert_eq!(page.total_elements(), 5);
    assert_eq!(
        page.content().iter().map(|v| v.id).collect::<Vec<_>>(),
        [5, 4]
    );
    // The shared query is not touched by paging
    assert_eq!(query.limit(), None);
    assert_eq!(query.offset(), None);

    // Nothing matches
    let page = repository
        .find_page(
            executor,
            &Query::from(Condition::is_null("label")),
            PageRequest::of(0, 2).unwrap(),
        )
        .await
        .expect("Failed to query the empty filtered page");
    assert!(page.is_empty());
    assert_eq!(page.total_elements(), 0);
}
