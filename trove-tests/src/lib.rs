mod dynamic_update;
mod field_kinds;
mod item;
mod pagination;
#[cfg(not(feature = "disable-pool"))]
mod pooled;
#[cfg(not(feature = "disable-transactions"))]
mod transaction;
#[cfg(not(feature = "disable-upsert"))]
mod upsert;

pub use dynamic_update::dynamic_update;
pub use field_kinds::field_kinds;
pub use item::item;
pub use pagination::pagination;
#[cfg(not(feature = "disable-pool"))]
pub use pooled::pooled;
#[cfg(not(feature = "disable-transactions"))]
pub use transaction::transaction;
#[cfg(not(feature = "disable-upsert"))]
pub use upsert::upsert;

use log::LevelFilter;
use std::{env, sync::Arc};
use trove::Pool;

pub fn init_logs() {
    let mut logger = env_logger::builder();
    logger
        .is_test(true)
        .format_file(true)
        .format_line_number(true);
    if env::var("RUST_LOG").is_err() {
        logger.filter_level(LevelFilter::Warn);
    }
    let _ = logger.try_init();
}

/// Runs every scenario against connections taken from `pool`.
pub async fn execute_tests<P: Pool>(pool: P) {
    let pool = Arc::new(pool);
    let mut connection = pool
        .acquire()
        .await
        .expect("Could not acquire a connection");
    item(&mut connection).await;
    pagination(&mut connection).await;
    #[cfg(not(feature = "disable-upsert"))]
    upsert(&mut connection).await;
    dynamic_update(&mut connection).await;
    field_kinds(&mut connection).await;
    #[cfg(not(feature = "disable-transactions"))]
    transaction(&mut connection).await;
    pool.release(connection);
    #[cfg(not(feature = "disable-pool"))]
    pooled(pool.clone()).await;
}

#[macro_export]
macro_rules! silent_logs {
    ($($code:tt)+) => {{
        let level = log::max_level();
        log::set_max_level(log::LevelFilter::Off);
        $($code)+
        log::set_max_level(level);
    }};
}
