use crate::{
    AsValue, Connection, Driver, EntityNotFound, Error, Executor, MappingError, Page,
    PageRequest, Pool, Query, Result, RowLabeled, RowMapper, RowsAffected, SqlStatements,
    SqlWriter, Statement, Transaction,
    stream::{StreamExt, TryStreamExt},
};
use anyhow::Context;
use log::Level;
use std::{any, fmt::Debug, pin::pin, sync::Arc};

/// CRUD operations of one entity type, each run on the executor it is handed.
///
/// The executor decides the scope: a plain connection runs every statement on its own,
/// a transaction groups them.
pub struct CrudRepository<ID, E> {
    mapper: RowMapper<ID, E>,
    statements: SqlStatements,
    writer: Arc<dyn SqlWriter>,
}

impl<ID, E> CrudRepository<ID, E>
where
    ID: Debug + Send + Sync,
    E: Send + Sync,
{
    pub fn new(mapper: RowMapper<ID, E>, writer: impl SqlWriter + 'static) -> Self {
        let writer: Arc<dyn SqlWriter> = Arc::new(writer);
        let statements =
            SqlStatements::new(writer.as_ref(), mapper.table_name(), mapper.column_names());
        Self {
            mapper,
            statements,
            writer,
        }
    }

    /// Repository speaking the SQL dialect of `driver`.
    pub fn for_driver<D: Driver>(mapper: RowMapper<ID, E>, driver: &D) -> Self {
        Self::new(mapper, driver.sql_writer())
    }

    pub fn mapper(&self) -> &RowMapper<ID, E> {
        &self.mapper
    }
    pub fn statements(&self) -> &SqlStatements {
        &self.statements
    }
    pub fn writer(&self) -> &dyn SqlWriter {
        self.writer.as_ref()
    }

    fn entity_name() -> &'static str {
        any::type_name::<E>()
    }

    async fn execute<Exec: Executor>(
        &self,
        executor: &mut Exec,
        statement: Statement,
    ) -> Result<RowsAffected> {
        log::debug!("{}", statement);
        executor.execute(statement).await
    }

    async fn fetch_all<Exec: Executor>(
        &self,
        executor: &mut Exec,
        statement: Statement,
    ) -> Result<Vec<E>> {
        log::debug!("{}", statement);
        executor
            .fetch(statement)
            .map(|row| row.and_then(|row| self.mapper.map(row)))
            .try_collect()
            .await
    }

    async fn fetch_first<Exec: Executor>(
        &self,
        executor: &mut Exec,
        statement: Statement,
    ) -> Result<Option<RowLabeled>> {
        log::debug!("{}", statement);
        let mut rows = pin!(executor.fetch(statement));
        rows.try_next().await
    }

    async fn fetch_count<Exec: Executor>(
        &self,
        executor: &mut Exec,
        statement: Statement,
    ) -> Result<u64> {
        let row = self
            .fetch_first(executor, statement)
            .await?
            .ok_or_else(|| Error::msg("The count query returned no row"))?;
        let value = row.values.into_vec().into_iter().next().unwrap_or_default();
        u64::try_from_value(value).context("Unexpected count value")
    }

    /// Upsert: inserts the entity or overwrites the stored row with the same key.
    pub async fn save<Exec: Executor>(&self, executor: &mut Exec, entity: E) -> Result<E> {
        if self.mapper.id(&entity).is_none() {
            return self.insert(executor, entity).await;
        }
        let params = self.mapper.to_params(&entity, true)?;
        self.execute(executor, Statement::new(self.statements.upsert.clone(), params))
            .await?;
        Ok(entity)
    }

    /// Inserts the entity. When the key is generated by the storage and the entity has
    /// none, the key column is left out and the generated key is written back.
    pub async fn insert<Exec: Executor>(&self, executor: &mut Exec, mut entity: E) -> Result<E> {
        let generate = self.mapper.is_pk_autogenerated() && self.mapper.id(&entity).is_none();
        let statement = if generate {
            Statement::new(
                self.statements.auto_id_insert.clone(),
                self.mapper.to_params(&entity, false)?,
            )
        } else {
            Statement::new(
                self.statements.insert.clone(),
                self.mapper.to_params(&entity, true)?,
            )
        };
        let result = self.execute(executor, statement).await?;
        if generate {
            let generated = result.last_affected_id.ok_or_else(|| {
                Error::new(MappingError::new(
                    Self::entity_name(),
                    Some(self.mapper.pk_name()),
                    "The storage did not report a generated key",
                ))
            });
            generated
                .and_then(|v| self.mapper.set_generated_id(&mut entity, v))
                .with_context(|| format!("Can't set id value of entity: {}", Self::entity_name()))
                .inspect_err(|e| log::error!("{:#}", e))?;
        }
        Ok(entity)
    }

    /// Overwrites every non key column of the row addressed by the entity key. Zero matched rows
    /// is not an error.
    pub async fn update<Exec: Executor>(&self, executor: &mut Exec, entity: E) -> Result<E> {
        let params = self.mapper.to_update_params(&entity)?;
        let result = self
            .execute(executor, Statement::new(self.statements.update.clone(), params))
            .await?;
        self.log_unmatched_update(&entity, result.rows_affected);
        Ok(entity)
    }

    /// Updates only the columns whose value is not NULL.
    pub async fn update_dynamic<Exec: Executor>(
        &self,
        executor: &mut Exec,
        entity: E,
    ) -> Result<E> {
        self.update_dynamic_by_query(executor, entity, &Query::new())
            .await
    }

    /// Update by key, further restricted by the condition of `query`.
    pub async fn update_by_query<Exec: Executor>(
        &self,
        executor: &mut Exec,
        entity: E,
        query: &Query,
    ) -> Result<E> {
        let mut sql = String::with_capacity(self.statements.update.len() + 64);
        self.writer.write_update_by_query(
            &mut sql,
            self.mapper.table_name(),
            self.mapper.column_names(),
            query,
        );
        let mut params = self.mapper.to_update_params(&entity)?;
        params.extend(query.condition_params());
        let result = self.execute(executor, Statement::new(sql, params)).await?;
        self.log_unmatched_update(&entity, result.rows_affected);
        Ok(entity)
    }

    pub async fn update_dynamic_by_query<Exec: Executor>(
        &self,
        executor: &mut Exec,
        entity: E,
        query: &Query,
    ) -> Result<E> {
        let columns = self.mapper.to_params(&entity, true)?;
        let mut params = self.mapper.to_dynamic_params(&entity)?;
        if params.len() < 2 {
            log::debug!(
                "Nothing to update for {} with id {:?}",
                Self::entity_name(),
                self.mapper.id(&entity)
            );
            return Ok(entity);
        }
        let mut sql = String::with_capacity(self.statements.update.len() + 64);
        self.writer.write_dynamic_update_by_query(
            &mut sql,
            self.mapper.table_name(),
            self.mapper.column_names(),
            &columns,
            query,
        );
        params.extend(query.condition_params());
        let result = self.execute(executor, Statement::new(sql, params)).await?;
        self.log_unmatched_update(&entity, result.rows_affected);
        Ok(entity)
    }

    fn log_unmatched_update(&self, entity: &E, rows_affected: u64) {
        if rows_affected == 0 {
            log::debug!(
                "Update of {} with id {:?} matched no row",
                Self::entity_name(),
                self.mapper.id(entity)
            );
        }
    }

    /// Deletes the row with key `id`. Anything but exactly one deleted row is
    /// [`EntityNotFound`].
    pub async fn delete<Exec: Executor>(&self, executor: &mut Exec, id: ID) -> Result<()> {
        let statement = Statement::new(
            self.statements.delete.clone(),
            vec![self.mapper.id_value(&id)],
        );
        let result = self.execute(executor, statement).await?;
        if result.rows_affected != 1 {
            let error = Error::new(EntityNotFound::new(Self::entity_name(), &id));
            log::log!(
                if result.rows_affected == 0 {
                    Level::Info
                } else {
                    Level::Error
                },
                "{:#} ({} rows affected)",
                error,
                result.rows_affected
            );
            return Err(error);
        }
        Ok(())
    }

    pub async fn find<Exec: Executor>(&self, executor: &mut Exec, id: &ID) -> Result<Option<E>> {
        let statement = Statement::new(
            self.statements.select_by_id.clone(),
            vec![self.mapper.id_value(id)],
        );
        match self.fetch_first(executor, statement).await? {
            Some(row) => self.mapper.map(row).map(Some),
            None => Ok(None),
        }
    }

    /// First entity matching `query`, a query without a limit is restricted to one row.
    pub async fn find_one<Exec: Executor>(
        &self,
        executor: &mut Exec,
        query: &Query,
    ) -> Result<Option<E>> {
        let query = match query.limit() {
            Some(..) => query.clone(),
            None => query.clone().with_limit(1),
        };
        let statement = self.select_statement(&query);
        match self.fetch_first(executor, statement).await? {
            Some(row) => self.mapper.map(row).map(Some),
            None => Ok(None),
        }
    }

    pub async fn find_all<Exec: Executor>(&self, executor: &mut Exec) -> Result<Vec<E>> {
        self.fetch_all(executor, Statement::raw(self.statements.select.clone()))
            .await
    }

    pub async fn find_all_by<Exec: Executor>(
        &self,
        executor: &mut Exec,
        query: &Query,
    ) -> Result<Vec<E>> {
        self.fetch_all(executor, self.select_statement(query)).await
    }

    /// One page of the entities matching `query`.
    ///
    /// The rows are counted first: when nothing matches, the page is returned without
    /// selecting. Otherwise the rows in the window of `page` are selected with the
    /// ordering of `query`.
    pub async fn find_page<Exec: Executor>(
        &self,
        executor: &mut Exec,
        query: &Query,
        page: PageRequest,
    ) -> Result<Page<E>> {
        let total = self.count(executor, query).await?;
        if total == 0 {
            return Ok(Page::empty(page, 0));
        }
        let content = self.find_all_by(executor, &query.paged(&page)).await?;
        Ok(Page::new(page, total, content))
    }

    pub async fn find_all_page<Exec: Executor>(
        &self,
        executor: &mut Exec,
        page: PageRequest,
    ) -> Result<Page<E>> {
        self.find_page(executor, &Query::new(), page).await
    }

    pub async fn count<Exec: Executor>(&self, executor: &mut Exec, query: &Query) -> Result<u64> {
        let mut sql = self.statements.count.clone();
        self.writer.write_where(&mut sql, query, 0);
        self.fetch_count(executor, Statement::new(sql, query.condition_params()))
            .await
    }

    pub async fn count_all<Exec: Executor>(&self, executor: &mut Exec) -> Result<u64> {
        self.fetch_count(executor, Statement::raw(self.statements.count.clone()))
            .await
    }

    pub async fn exists<Exec: Executor>(&self, executor: &mut Exec, query: &Query) -> Result<bool> {
        let mut sql = self.statements.exists.clone();
        self.writer.write_where(&mut sql, query, 0);
        sql.push_str(" LIMIT 1");
        let statement = Statement::new(sql, query.condition_params());
        Ok(self.fetch_first(executor, statement).await?.is_some())
    }

    pub async fn exists_by_id<Exec: Executor>(&self, executor: &mut Exec, id: &ID) -> Result<bool> {
        let statement = Statement::new(
            self.statements.exists_by_id.clone(),
            vec![self.mapper.id_value(id)],
        );
        Ok(self.fetch_first(executor, statement).await?.is_some())
    }

    fn select_statement(&self, query: &Query) -> Statement {
        let mut sql = self.statements.select.clone();
        self.writer.write_query(&mut sql, query, 0);
        Statement::new(sql, query.params())
    }
}

/// Acquires a connection from the pool, evaluates the future built with it and hands
/// the connection back whatever the outcome.
macro_rules! with_connection {
    ($pool:expr, |$connection:ident| $body:expr) => {{
        let mut $connection = $pool.acquire().await?;
        let result = $body.await;
        $pool.release($connection);
        result
    }};
}

/// Like `with_connection!` but inside a transaction, committed when the body succeeds
/// and rolled back when it fails.
macro_rules! with_transaction {
    ($pool:expr, |$transaction:ident| $body:expr) => {{
        let mut connection = $pool.acquire().await?;
        let result = async {
            let mut $transaction = connection.begin().await?;
            let outcome = $body.await;
            match outcome {
                Ok(value) => {
                    $transaction.commit().await?;
                    Ok::<_, Error>(value)
                }
                Err(error) => {
                    if let Err(e) = $transaction.rollback().await {
                        log::error!("{:#}", e);
                    }
                    Err(error)
                }
            }
        }
        .await;
        $pool.release(connection);
        result
    }};
}

/// Same operations as [`CrudRepository`], each one on a connection taken from the pool
/// and released afterwards.
pub struct PooledRepository<P: Pool, ID, E> {
    pool: Arc<P>,
    repository: CrudRepository<ID, E>,
}

impl<P, ID, E> PooledRepository<P, ID, E>
where
    P: Pool,
    ID: Debug + Send + Sync,
    E: Send + Sync,
{
    pub fn new(pool: Arc<P>, repository: CrudRepository<ID, E>) -> Self {
        Self { pool, repository }
    }

    pub fn pool(&self) -> &P {
        &self.pool
    }
    pub fn repository(&self) -> &CrudRepository<ID, E> {
        &self.repository
    }

    pub async fn save(&self, entity: E) -> Result<E> {
        with_connection!(self.pool, |connection| self
            .repository
            .save(&mut connection, entity))
    }
    pub async fn insert(&self, entity: E) -> Result<E> {
        with_connection!(self.pool, |connection| self
            .repository
            .insert(&mut connection, entity))
    }
    pub async fn update(&self, entity: E) -> Result<E> {
        with_connection!(self.pool, |connection| self
            .repository
            .update(&mut connection, entity))
    }
    pub async fn update_dynamic(&self, entity: E) -> Result<E> {
        with_connection!(self.pool, |connection| self
            .repository
            .update_dynamic(&mut connection, entity))
    }
    pub async fn update_by_query(&self, entity: E, query: &Query) -> Result<E> {
        with_connection!(self.pool, |connection| self
            .repository
            .update_by_query(&mut connection, entity, query))
    }
    pub async fn update_dynamic_by_query(&self, entity: E, query: &Query) -> Result<E> {
        with_connection!(self.pool, |connection| self
            .repository
            .update_dynamic_by_query(&mut connection, entity, query))
    }
    pub async fn delete(&self, id: ID) -> Result<()> {
        with_connection!(self.pool, |connection| self
            .repository
            .delete(&mut connection, id))
    }
    pub async fn find(&self, id: &ID) -> Result<Option<E>> {
        with_connection!(self.pool, |connection| self
            .repository
            .find(&mut connection, id))
    }
    pub async fn find_one(&self, query: &Query) -> Result<Option<E>> {
        with_connection!(self.pool, |connection| self
            .repository
            .find_one(&mut connection, query))
    }
    pub async fn find_all(&self) -> Result<Vec<E>> {
        with_connection!(self.pool, |connection| self
            .repository
            .find_all(&mut connection))
    }
    pub async fn find_all_by(&self, query: &Query) -> Result<Vec<E>> {
        with_connection!(self.pool, |connection| self
            .repository
            .find_all_by(&mut connection, query))
    }
    /// The count and the select run in one transaction, so they see the same rows.
    pub async fn find_page(&self, query: &Query, page: PageRequest) -> Result<Page<E>> {
        with_transaction!(self.pool, |transaction| self
            .repository
            .find_page(&mut transaction, query, page))
    }
    pub async fn find_all_page(&self, page: PageRequest) -> Result<Page<E>> {
        self.find_page(&Query::new(), page).await
    }
    pub async fn count(&self, query: &Query) -> Result<u64> {
        with_connection!(self.pool, |connection| self
            .repository
            .count(&mut connection, query))
    }
    pub async fn count_all(&self) -> Result<u64> {
        with_connection!(self.pool, |connection| self
            .repository
            .count_all(&mut connection))
    }
    pub async fn exists(&self, query: &Query) -> Result<bool> {
        with_connection!(self.pool, |connection| self
            .repository
            .exists(&mut connection, query))
    }
    pub async fn exists_by_id(&self, id: &ID) -> Result<bool> {
        with_connection!(self.pool, |connection| self
            .repository
            .exists_by_id(&mut connection, id))
    }
}
