#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;
    use serde::{Deserialize, Serialize};
    use std::{str::FromStr, sync::Arc};
    use time::{Date, Month, PrimitiveDateTime, Time, macros::format_description};
    use trove::{EntityNotFound, Error, ErrorKind, RowLabeled, RowMapper, Value};
    use uuid::Uuid;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Status {
        Open,
        Closed,
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Tags {
        values: Vec<String>,
    }

    #[derive(Debug, Default, PartialEq)]
    struct Ticket {
        id: Option<Uuid>,
        title: String,
        status: Option<Status>,
        amount: Option<Decimal>,
        opened: Option<Date>,
        at: Option<PrimitiveDateTime>,
        tags: Option<Tags>,
    }

    fn ticket_mapper() -> RowMapper<Uuid, Ticket> {
        RowMapper::builder("ticket", Ticket::default)
            .pk_as(
                "id",
                |e: &Ticket| e.id,
                |e: &mut Ticket, v| e.id = Some(v),
                |id: &Uuid| id.to_string(),
                |v: String| Ok(Uuid::parse_str(&v)?),
            )
            .add_field(
                "title",
                |e: &Ticket| e.title.clone(),
                |e: &mut Ticket, v| e.title = v,
            )
            .add_converted(
                "status",
                |e: &Ticket| e.status.as_ref(),
                |e: &mut Ticket, v| e.status = Some(v),
                |v: &Status| matches!(v, Status::Closed),
                |v: bool| Ok(if v { Status::Closed } else { Status::Open }),
            )
            .add_decimal("amount", |e: &Ticket| e.amount, |e: &mut Ticket, v| {
                e.amount = Some(v)
            })
            .add_temporal(
                "opened",
                |e: &Ticket| e.opened,
                |e: &mut Ticket, v| e.opened = Some(v),
                format_description!("[day]/[month]/[year]"),
            )
            .add_timestamp("at", |e: &Ticket| e.at, |e: &mut Ticket, v| e.at = Some(v))
            .add_json(
                "tags",
                |e: &Ticket| e.tags.as_ref(),
                |e: &mut Ticket, v| e.tags = Some(v),
            )
            .build()
            .unwrap()
    }

    fn ticket() -> Ticket {
        let opened = Date::from_calendar_date(2025, Month::March, 9).unwrap();
        Ticket {
            id: Some(Uuid::from_str("7d6e0f7c-2f64-4c43-9b4b-5c2a8f0e1d11").unwrap()),
            title: "Broken link".into(),
            status: Some(Status::Closed),
            amount: Some(Decimal::new(1999, 2)),
            opened: Some(opened),
            at: Some(PrimitiveDateTime::new(
                opened,
                Time::from_hms_milli(8, 30, 0, 250).unwrap(),
            )),
            tags: Some(Tags {
                values: vec!["web".into(), "urgent".into()],
            }),
        }
    }

    #[test]
    fn encodes_every_codec_as_storage_values() {
        let mapper = ticket_mapper();
        assert_eq!(
            mapper.column_names(),
            &["id", "title", "status", "amount", "opened", "at", "tags"]
        );
        let params = mapper.to_params(&ticket(), true).unwrap();
        assert_eq!(
            params,
            vec![
                Value::Varchar(Some("7d6e0f7c-2f64-4c43-9b4b-5c2a8f0e1d11".into())),
                Value::Varchar(Some("Broken link".into())),
                Value::Boolean(Some(true)),
                Value::Varchar(Some("19.99".into())),
                Value::Varchar(Some("09/03/2025".into())),
                Value::Varchar(Some("2025-03-09T08:30:00.25".into())),
                Value::Varchar(Some(r#"{"values":["web","urgent"]}"#.into())),
            ]
        );
        let empty = mapper.to_params(&Ticket::default(), false).unwrap();
        assert_eq!(empty[0], Value::Varchar(Some("".into())));
        assert!(empty[1..].iter().all(Value::is_null));
    }

    #[test]
    fn decodes_rows_by_label_and_by_position() {
        let mapper = ticket_mapper();
        let expected = ticket();
        let params = mapper.to_params(&expected, true).unwrap();

        // Labels in a different order than the columns.
        let mut labels = mapper
            .column_names()
            .iter()
            .map(|v| v.to_string())
            .collect::<Vec<_>>();
        let mut values = params.clone();
        labels.reverse();
        values.reverse();
        let row = RowLabeled::new(labels.into(), values.into());
        assert_eq!(mapper.map(row).unwrap(), expected);

        // Unlabeled rows are read in column order.
        let labels: Arc<[String]> = Arc::new([]);
        let row = RowLabeled::new(labels, params.into());
        assert_eq!(mapper.map(row).unwrap(), expected);
    }

    #[test]
    fn labeled_row_missing_a_column() {
        let mapper = ticket_mapper();
        let params = mapper.to_params(&ticket(), true).unwrap();
        let mut labels = mapper
            .column_names()
            .iter()
            .map(|v| v.to_string())
            .collect::<Vec<_>>();
        labels[3] = "total".into();
        let row = RowLabeled::new(labels.into(), params.into());
        let error = mapper.map(row).unwrap_err();
        assert_eq!(ErrorKind::of(&error), ErrorKind::Mapping);
        let message = format!("{error:#}");
        assert!(message.contains("no value for the column"), "{message}");
        assert!(message.contains("amount"), "{message}");
    }

    #[test]
    fn decodes_native_storage_variants() {
        let mapper = ticket_mapper();
        let expected = ticket();
        let row = RowLabeled::new(
            ["id", "title", "status", "amount", "opened", "at", "tags"]
                .into_iter()
                .map(String::from)
                .collect(),
            [
                Value::Varchar(Some("7d6e0f7c-2f64-4c43-9b4b-5c2a8f0e1d11".into())),
                Value::Varchar(Some("Broken link".into())),
                Value::Int8(Some(1)),
                Value::Decimal(Some(Decimal::new(1999, 2))),
                Value::Date(expected.opened),
                Value::Timestamp(expected.at),
                Value::Json(Some(serde_json::json!({ "values": ["web", "urgent"] }))),
            ]
            .into(),
        );
        assert_eq!(mapper.map(row).unwrap(), expected);
    }

    #[test]
    fn null_columns_keep_factory_values() {
        let mapper = ticket_mapper();
        let row = RowLabeled::new(
            ["id", "title"].into_iter().map(String::from).collect(),
            [Value::Varchar(None), Value::Varchar(Some("Only a title".into()))].into(),
        );
        let error = mapper.map(row).unwrap_err();
        assert_eq!(ErrorKind::of(&error), ErrorKind::Mapping);

        let mut values = vec![Value::Null; 7];
        values[1] = Value::Varchar(Some("Only a title".into()));
        let row = RowLabeled::new(
            mapper.column_names().iter().map(|v| v.to_string()).collect(),
            values.into(),
        );
        let ticket = mapper.map(row).unwrap();
        assert_eq!(ticket.id, None);
        assert_eq!(ticket.title, "Only a title");
        assert_eq!(ticket.tags, None);
    }

    #[test]
    fn reports_bad_columns() {
        let mapper = ticket_mapper();
        let mut values = mapper.to_params(&ticket(), true).unwrap();
        values[4] = Value::Varchar(Some("2025-03-09".into()));
        let row = RowLabeled::new(
            mapper.column_names().iter().map(|v| v.to_string()).collect(),
            values.into(),
        );
        let error = mapper.map(row).unwrap_err();
        assert_eq!(ErrorKind::of(&error), ErrorKind::Mapping);
        let message = format!("{error:#}");
        assert!(message.contains("column opened"), "{message}");
        assert!(message.contains("2025-03-09"), "{message}");

        let mut values = mapper.to_params(&ticket(), true).unwrap();
        values[0] = Value::Varchar(Some("not a uuid".into()));
        let row = RowLabeled::new(
            mapper.column_names().iter().map(|v| v.to_string()).collect(),
            values.into(),
        );
        assert_eq!(
            ErrorKind::of(&mapper.map(row).unwrap_err()),
            ErrorKind::Mapping
        );
    }

    #[test]
    fn long_json_text_is_reported() {
        let mapper = ticket_mapper();
        let mut values = mapper.to_params(&ticket(), true).unwrap();
        values[6] = Value::Varchar(Some(format!("{}é{}", "a".repeat(496), "b".repeat(100))));
        let row = RowLabeled::new(
            mapper.column_names().iter().map(|v| v.to_string()).collect(),
            values.into(),
        );
        let error = mapper.map(row).unwrap_err();
        assert_eq!(ErrorKind::of(&error), ErrorKind::Mapping);
        assert!(format!("{error:#}").contains("column tags"));
    }

    #[test]
    fn not_found_is_classified() {
        let error = Error::new(EntityNotFound::new("Ticket", 5_i64));
        assert_eq!(error.to_string(), "Entity Ticket with id 5 is not found");
        assert_eq!(ErrorKind::of(&error), ErrorKind::NotFound);
        let error = error.context("While deleting");
        assert_eq!(ErrorKind::of(&error), ErrorKind::NotFound);
    }
}
