use crate::SqlWriter;

/// The fixed statements of one table, rendered once when a repository is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlStatements {
    pub insert: String,
    /// Insert that leaves the key out, for storage generated keys.
    pub auto_id_insert: String,
    pub upsert: String,
    pub update: String,
    pub select: String,
    pub select_by_id: String,
    pub count: String,
    pub exists: String,
    pub exists_by_id: String,
    pub delete: String,
}

impl SqlStatements {
    /// `columns` starts with the primary key.
    pub fn new(writer: &dyn SqlWriter, table: &str, columns: &[&str]) -> Self {
        let pk = columns.first().copied().unwrap_or_default();
        Self {
            insert: render(|out| {
                writer.write_insert(out, table, columns);
            }),
            auto_id_insert: render(|out| {
                writer.write_insert(out, table, columns.get(1..).unwrap_or_default());
            }),
            upsert: render(|out| {
                writer.write_upsert(out, table, columns);
            }),
            update: render(|out| {
                writer.write_update(out, table, columns);
            }),
            select: render(|out| writer.write_select(out, table, columns)),
            select_by_id: render(|out| {
                writer.write_select_by_id(out, table, columns);
            }),
            count: render(|out| writer.write_count(out, table)),
            exists: render(|out| writer.write_exists(out, table)),
            exists_by_id: render(|out| {
                writer.write_exists_by_id(out, table, pk);
            }),
            delete: render(|out| {
                writer.write_delete(out, table, pk);
            }),
        }
    }
}

fn render(f: impl FnOnce(&mut String)) -> String {
    let mut out = String::with_capacity(128);
    f(&mut out);
    out
}

#[cfg(test)]
mod tests {
    use super::SqlStatements;
    use crate::{GenericSqlWriter, PostgresSqlWriter};

    #[test]
    fn mysql_statements() {
        let statements =
            SqlStatements::new(&GenericSqlWriter::new(), "item", &["id", "name", "price"]);
        assert_eq!(
            statements.insert,
            "INSERT INTO `item` (`id`,`name`,`price`) VALUES (?,?,?)"
        );
        assert_eq!(
            statements.auto_id_insert,
            "INSERT INTO `item` (`name`,`price`) VALUES (?,?)"
        );
        assert_eq!(
            statements.upsert,
            "INSERT INTO `item` (`id`,`name`,`price`) VALUES (?,?,?) ON DUPLICATE KEY UPDATE `name` = VALUES(`name`), `price` = VALUES(`price`)"
        );
        assert_eq!(
            statements.update,
            "UPDATE `item` SET `name` = ?,`price` = ? WHERE `id` = ?"
        );
        assert_eq!(statements.select, "SELECT `id`,`name`,`price` FROM `item`");
        assert_eq!(
            statements.select_by_id,
            "SELECT `id`,`name`,`price` FROM `item` WHERE `id` = ?"
        );
        assert_eq!(statements.count, "SELECT count(*) FROM `item`");
        assert_eq!(statements.exists, "SELECT 1 FROM `item`");
        assert_eq!(
            statements.exists_by_id,
            "SELECT 1 FROM `item` WHERE `id` = ? LIMIT 1"
        );
        assert_eq!(statements.delete, "DELETE FROM `item` WHERE `id` = ?");
    }

    #[test]
    fn postgres_statements() {
        let statements =
            SqlStatements::new(&PostgresSqlWriter::new(), "item", &["id", "name", "price"]);
        assert_eq!(
            statements.update,
            r#"UPDATE "item" SET "name" = $1,"price" = $2 WHERE "id" = $3"#
        );
        assert_eq!(
            statements.upsert,
            r#"INSERT INTO "item" ("id","name","price") VALUES ($1,$2,$3) ON CONFLICT ("id") DO UPDATE SET "name" = EXCLUDED."name", "price" = EXCLUDED."price""#
        );
    }
}
