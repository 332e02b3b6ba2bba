#[cfg(test)]
mod tests {
    use indoc::indoc;
    use rust_decimal::Decimal;
    use trove::{
        Condition, CrudRepository, GenericSqlWriter, PageRequest, PostgresSqlWriter, Query,
        RowMapper, SqlWriter, Value,
    };

    #[derive(Default)]
    struct Product {
        id: Option<i64>,
        name: String,
        price: Decimal,
        stock: Option<i32>,
    }

    fn product_mapper() -> RowMapper<i64, Product> {
        RowMapper::builder("product", Product::default)
            .pk("id", |e: &Product| e.id, |e: &mut Product, id| e.id = Some(id))
            .autogenerated()
            .add_field(
                "name",
                |e: &Product| e.name.clone(),
                |e: &mut Product, v| e.name = v,
            )
            .add_decimal(
                "price",
                |e: &Product| Some(e.price),
                |e: &mut Product, v| e.price = v,
            )
            .add_field(
                "stock",
                |e: &Product| e.stock,
                |e: &mut Product, v| e.stock = v,
            )
            .build()
            .unwrap()
    }

    const WRITER: GenericSqlWriter = GenericSqlWriter {};

    #[test]
    fn repository_statements() {
        let repository = CrudRepository::new(product_mapper(), WRITER);
        let statements = repository.statements();
        assert_eq!(
            statements.insert,
            "INSERT INTO `product` (`id`,`name`,`price`,`stock`) VALUES (?,?,?,?)"
        );
        assert_eq!(
            statements.auto_id_insert,
            "INSERT INTO `product` (`name`,`price`,`stock`) VALUES (?,?,?)"
        );
        assert_eq!(
            statements.upsert,
            indoc! {"
                INSERT INTO `product` (`id`,`name`,`price`,`stock`) VALUES (?,?,?,?) \
                ON DUPLICATE KEY UPDATE `name` = VALUES(`name`), `price` = VALUES(`price`), `stock` = VALUES(`stock`)"
            }
        );
        assert_eq!(
            statements.update,
            "UPDATE `product` SET `name` = ?,`price` = ?,`stock` = ? WHERE `id` = ?"
        );
        assert_eq!(
            statements.select_by_id,
            "SELECT `id`,`name`,`price`,`stock` FROM `product` WHERE `id` = ?"
        );
        assert_eq!(statements.count, "SELECT count(*) FROM `product`");
        assert_eq!(statements.delete, "DELETE FROM `product` WHERE `id` = ?");
    }

    #[test]
    fn composed_select() {
        let query = Query::new()
            .filter(
                Condition::like("name", "%pen%")
                    .or(Condition::is_in("id", [1_i64, 2]))
                    .or(Condition::is_null("stock")),
            )
            .filter(Condition::greater_equal("price", Decimal::new(250, 2)).not())
            .desc("price")
            .asc("name")
            .paged(&PageRequest::of(3, 20).unwrap());
        let mut sql = String::new();
        WRITER.write_select(&mut sql, "product", &["id", "name"]);
        let next = WRITER.write_query(&mut sql, &query, 0);
        assert_eq!(
            sql,
            indoc! {"
                SELECT `id`,`name` FROM `product` \
                WHERE (`name` LIKE ? OR `id` IN (?, ?) OR `stock` IS NULL) AND NOT (`price` >= ?) \
                ORDER BY `price` DESC, `name` ASC \
                LIMIT ? OFFSET ?"
            }
        );
        assert_eq!(next, 6);
        assert_eq!(
            query.params(),
            vec![
                Value::Varchar(Some("%pen%".into())),
                Value::Int64(Some(1)),
                Value::Int64(Some(2)),
                Value::Decimal(Some(Decimal::new(250, 2))),
                Value::UInt64(Some(20)),
                Value::UInt64(Some(60)),
            ]
        );
    }

    #[test]
    fn postgres_numbers_placeholders() {
        let writer = PostgresSqlWriter::new();
        let query = Query::from(Condition::equal("name", "pen").and(Condition::less("stock", 5)))
            .with_limit(10)
            .with_offset(30);
        let mut sql = String::new();
        writer.write_count(&mut sql, "product");
        writer.write_where(&mut sql, &query, 0);
        assert_eq!(
            sql,
            r#"SELECT count(*) FROM "product" WHERE "name" = $1 AND "stock" < $2"#
        );
        let mut sql = String::new();
        writer.write_select(&mut sql, "product", &["id"]);
        writer.write_query(&mut sql, &query, 0);
        assert_eq!(
            sql,
            r#"SELECT "id" FROM "product" WHERE "name" = $1 AND "stock" < $2 LIMIT $3 OFFSET $4"#
        );
    }

    #[test]
    fn update_restricted_by_query() {
        let query = Query::from(Condition::raw("`stock` > ? OR `stock` IS NULL", vec![
            Value::Int32(Some(0)),
        ]));
        let mut sql = String::new();
        let next = WRITER.write_dynamic_update_by_query(
            &mut sql,
            "product",
            &["id", "name", "price", "stock"],
            &[
                Value::Int64(Some(7)),
                Value::Varchar(None),
                Value::Varchar(Some("3.50".into())),
                Value::Int32(None),
            ],
            &query,
        );
        assert_eq!(
            sql,
            "UPDATE `product` SET `price` = ? WHERE `id` = ? AND (`stock` > ? OR `stock` IS NULL)"
        );
        assert_eq!(next, 3);
    }

    #[test]
    fn empty_conditions() {
        let mut sql = String::new();
        WRITER.write_exists(&mut sql, "product");
        WRITER.write_where(&mut sql, &Query::from(Condition::And(vec![])), 0);
        assert_eq!(sql, "SELECT 1 FROM `product` WHERE TRUE");
        let mut sql = String::new();
        WRITER.write_count(&mut sql, "product");
        WRITER.write_where(&mut sql, &Query::from(Condition::is_in("id", Vec::<i64>::new())), 0);
        assert_eq!(sql, "SELECT count(*) FROM `product` WHERE FALSE");
        let mut sql = String::new();
        WRITER.write_count(&mut sql, "product");
        WRITER.write_query(&mut sql, &Query::raw("", vec![]), 0);
        assert_eq!(sql, "SELECT count(*) FROM `product`");
    }
}
