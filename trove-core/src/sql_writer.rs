use crate::{Direction, Order, Query, Value, possibly_parenthesized, separated_by};
use std::fmt::Write;

/// Renders the parameterized statements used by the repositories.
///
/// In every method taking `columns`, the first column is the primary key. The methods
/// that bind values return the index of the next placeholder, so callers can keep
/// appending fragments. The defaults produce the MySQL dialect: backtick quoted
/// identifiers, `?` placeholders and `ON DUPLICATE KEY UPDATE` upserts.
pub trait SqlWriter: Send + Sync {
    fn as_dyn(&self) -> &dyn SqlWriter;

    fn write_escaped(&self, out: &mut String, value: &str, search: char, replace: &str) {
        let mut position = 0;
        for (i, c) in value.char_indices() {
            if c == search {
                out.push_str(&value[position..i]);
                out.push_str(replace);
                position = i + c.len_utf8();
            }
        }
        out.push_str(&value[position..]);
    }

    fn write_identifier_quoted(&self, out: &mut String, value: &str) {
        out.push('`');
        self.write_escaped(out, value, '`', "``");
        out.push('`');
    }

    /// Placeholder for the parameter at the zero based `index`.
    fn write_placeholder(&self, out: &mut String, _index: usize) {
        out.push('?');
    }

    fn write_column_list(&self, out: &mut String, columns: &[&str]) {
        separated_by(
            out,
            columns,
            |out, v| self.write_identifier_quoted(out, v),
            ",",
        );
    }

    /// `` `a` = ?,`b` = ? ``
    fn write_assignments(&self, out: &mut String, columns: &[&str], index: usize) -> usize {
        let mut index = index;
        separated_by(
            out,
            columns,
            |out, v| {
                self.write_identifier_quoted(out, v);
                out.push_str(" = ");
                self.write_placeholder(out, index);
                index += 1;
            },
            ",",
        );
        index
    }

    /// `` INSERT INTO `t` (`a`,`b`) VALUES (?,?) ``
    fn write_insert(&self, out: &mut String, table: &str, columns: &[&str]) -> usize {
        out.push_str("INSERT INTO ");
        self.write_identifier_quoted(out, table);
        out.push_str(" (");
        self.write_column_list(out, columns);
        out.push_str(") VALUES (");
        let mut index = 0;
        separated_by(
            out,
            columns,
            |out, _| {
                self.write_placeholder(out, index);
                index += 1;
            },
            ",",
        );
        out.push(')');
        index
    }

    /// Insert that overwrites the non key columns of an existing row with the same key.
    fn write_upsert(&self, out: &mut String, table: &str, columns: &[&str]) -> usize {
        let index = self.write_insert(out, table, columns);
        self.write_upsert_fragment(out, columns);
        index
    }

    fn write_upsert_fragment(&self, out: &mut String, columns: &[&str]) {
        out.push_str(" ON DUPLICATE KEY UPDATE ");
        if columns.len() < 2 {
            // Nothing but the key, rewrite it to itself so the statement stays valid.
            if let Some(pk) = columns.first() {
                self.write_identifier_quoted(out, pk);
                out.push_str(" = ");
                self.write_identifier_quoted(out, pk);
            }
            return;
        }
        separated_by(
            out,
            &columns[1..],
            |out, v| {
                self.write_identifier_quoted(out, v);
                out.push_str(" = VALUES(");
                self.write_identifier_quoted(out, v);
                out.push(')');
            },
            ", ",
        );
    }

    /// `` UPDATE `t` SET `b` = ?,`c` = ? WHERE `a` = ? ``, the key is bound last.
    fn write_update(&self, out: &mut String, table: &str, columns: &[&str]) -> usize {
        let Some((pk, rest)) = columns.split_first() else {
            return 0;
        };
        self.write_update_columns(out, table, pk, rest)
    }

    fn write_update_columns(&self, out: &mut String, table: &str, pk: &str, columns: &[&str]) -> usize {
        out.push_str("UPDATE ");
        self.write_identifier_quoted(out, table);
        out.push_str(" SET ");
        let index = self.write_assignments(out, columns, 0);
        out.push_str(" WHERE ");
        self.write_identifier_quoted(out, pk);
        out.push_str(" = ");
        self.write_placeholder(out, index);
        index + 1
    }

    /// Update touching only the columns whose value in `params` is not NULL. `params` is
    /// aligned with `columns`, the key itself is never part of the `SET` list.
    fn write_dynamic_update(
        &self,
        out: &mut String,
        table: &str,
        columns: &[&str],
        params: &[Value],
    ) -> usize {
        let Some((pk, rest)) = columns.split_first() else {
            return 0;
        };
        let present = rest
            .iter()
            .zip(params.iter().skip(1))
            .filter(|(_, v)| !v.is_null())
            .map(|(c, _)| *c)
            .collect::<Vec<_>>();
        self.write_update_columns(out, table, pk, &present)
    }

    /// Update by key further restricted by the condition of `query`.
    fn write_update_by_query(
        &self,
        out: &mut String,
        table: &str,
        columns: &[&str],
        query: &Query,
    ) -> usize {
        let index = self.write_update(out, table, columns);
        self.write_and_condition(out, query, index)
    }

    fn write_dynamic_update_by_query(
        &self,
        out: &mut String,
        table: &str,
        columns: &[&str],
        params: &[Value],
        query: &Query,
    ) -> usize {
        let index = self.write_dynamic_update(out, table, columns, params);
        self.write_and_condition(out, query, index)
    }

    fn write_and_condition(&self, out: &mut String, query: &Query, index: usize) -> usize {
        let Some(condition) = query.condition() else {
            return index;
        };
        out.push_str(" AND ");
        let mut index = index;
        possibly_parenthesized!(
            out,
            condition.is_compound(),
            index = condition.write_sql(self.as_dyn(), out, index)
        );
        index
    }

    /// `` SELECT `a`,`b` FROM `t` ``
    fn write_select(&self, out: &mut String, table: &str, columns: &[&str]) {
        out.push_str("SELECT ");
        self.write_column_list(out, columns);
        out.push_str(" FROM ");
        self.write_identifier_quoted(out, table);
    }

    fn write_select_by_id(&self, out: &mut String, table: &str, columns: &[&str]) -> usize {
        self.write_select(out, table, columns);
        match columns.first() {
            Some(pk) => self.write_where_pk(out, pk, 0),
            None => 0,
        }
    }

    fn write_count(&self, out: &mut String, table: &str) {
        out.push_str("SELECT count(*) FROM ");
        self.write_identifier_quoted(out, table);
    }

    fn write_exists(&self, out: &mut String, table: &str) {
        out.push_str("SELECT 1 FROM ");
        self.write_identifier_quoted(out, table);
    }

    fn write_exists_by_id(&self, out: &mut String, table: &str, pk: &str) -> usize {
        self.write_exists(out, table);
        let index = self.write_where_pk(out, pk, 0);
        out.push_str(" LIMIT 1");
        index
    }

    fn write_delete(&self, out: &mut String, table: &str, pk: &str) -> usize {
        out.push_str("DELETE FROM ");
        self.write_identifier_quoted(out, table);
        self.write_where_pk(out, pk, 0)
    }

    fn write_where_pk(&self, out: &mut String, pk: &str, index: usize) -> usize {
        out.push_str(" WHERE ");
        self.write_identifier_quoted(out, pk);
        out.push_str(" = ");
        self.write_placeholder(out, index);
        index + 1
    }

    fn write_where(&self, out: &mut String, query: &Query, index: usize) -> usize {
        if !query.is_conditional() {
            return index;
        }
        out.push_str(" WHERE ");
        query.write_condition(self.as_dyn(), out, index)
    }

    fn write_order_by(&self, out: &mut String, orders: &[Order]) {
        if orders.is_empty() {
            return;
        }
        out.push_str(" ORDER BY ");
        separated_by(
            out,
            orders,
            |out, v| {
                self.write_identifier_quoted(out, &v.column);
                out.push_str(match v.direction {
                    Direction::Asc => " ASC",
                    Direction::Desc => " DESC",
                });
            },
            ", ",
        );
    }

    fn write_limit_offset(&self, out: &mut String, query: &Query, index: usize) -> usize {
        let mut index = index;
        if query.limit().is_some() {
            out.push_str(" LIMIT ");
            self.write_placeholder(out, index);
            index += 1;
        }
        if query.offset().is_some() {
            out.push_str(" OFFSET ");
            self.write_placeholder(out, index);
            index += 1;
        }
        index
    }

    /// Appends `WHERE`, `ORDER BY`, `LIMIT` and `OFFSET` for `query` to a base statement.
    /// The bound values are `query.params()`.
    fn write_query(&self, out: &mut String, query: &Query, index: usize) -> usize {
        let index = self.write_where(out, query, index);
        self.write_order_by(out, query.orders());
        self.write_limit_offset(out, query, index)
    }
}

/// Writer for the MySQL dialect, the trait defaults.
#[derive(Default, Clone, Copy, Debug)]
pub struct GenericSqlWriter {}

impl GenericSqlWriter {
    pub fn new() -> Self {
        Self {}
    }
}

impl SqlWriter for GenericSqlWriter {
    fn as_dyn(&self) -> &dyn SqlWriter {
        self
    }
}

/// Writer for the PostgreSQL dialect: double quoted identifiers, numbered `$n`
/// placeholders and `ON CONFLICT` upserts.
#[derive(Default, Clone, Copy, Debug)]
pub struct PostgresSqlWriter {}

impl PostgresSqlWriter {
    pub fn new() -> Self {
        Self {}
    }
}

impl SqlWriter for PostgresSqlWriter {
    fn as_dyn(&self) -> &dyn SqlWriter {
        self
    }

    fn write_identifier_quoted(&self, out: &mut String, value: &str) {
        out.push('"');
        self.write_escaped(out, value, '"', r#""""#);
        out.push('"');
    }

    fn write_placeholder(&self, out: &mut String, index: usize) {
        let _ = write!(out, "${}", index + 1);
    }

    fn write_upsert_fragment(&self, out: &mut String, columns: &[&str]) {
        let Some((pk, rest)) = columns.split_first() else {
            return;
        };
        out.push_str(" ON CONFLICT (");
        self.write_identifier_quoted(out, pk);
        out.push(')');
        if rest.is_empty() {
            out.push_str(" DO NOTHING");
            return;
        }
        out.push_str(" DO UPDATE SET ");
        separated_by(
            out,
            rest,
            |out, v| {
                self.write_identifier_quoted(out, v);
                out.push_str(" = EXCLUDED.");
                self.write_identifier_quoted(out, v);
            },
            ", ",
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_quotes_in_identifiers() {
        let mut out = String::new();
        GenericSqlWriter::new().write_identifier_quoted(&mut out, "we`ird");
        assert_eq!(out, "`we``ird`");
        let mut out = String::new();
        PostgresSqlWriter::new().write_identifier_quoted(&mut out, "say \"hi\"");
        assert_eq!(out, r#""say ""hi""""#);
    }

    #[test]
    fn dynamic_update_skips_nulls() {
        let mut out = String::new();
        let next = GenericSqlWriter::new().write_dynamic_update(
            &mut out,
            "item",
            &["id", "name", "price"],
            &[
                Value::Int64(Some(1)),
                Value::Varchar(None),
                Value::Varchar(Some("2.00".into())),
            ],
        );
        assert_eq!(out, "UPDATE `item` SET `price` = ? WHERE `id` = ?");
        assert_eq!(next, 2);
    }
}
