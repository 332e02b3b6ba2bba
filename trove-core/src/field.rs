use crate::{
    AsValue, DATE_FORMAT, Error, Result, TIME_FORMAT, TIMESTAMP_FORMAT, Value, truncate_long,
};
use anyhow::Context;
use rust_decimal::Decimal;
use serde::{Serialize, de::DeserializeOwned};
use std::{any, fmt, sync::Arc};
use time::{
    Date, OffsetDateTime, PrimitiveDateTime, Time, format_description::well_known::Rfc3339,
    formatting::Formattable, parsing::Parsable,
};
use uuid::Uuid;

pub type FieldGetter<E> = Arc<dyn Fn(&E) -> Result<Value> + Send + Sync>;
pub type FieldSetter<E> = Arc<dyn Fn(&mut E, Value) -> Result<()> + Send + Sync>;

/// One column of an entity: its name, how to read the storage value out of the entity
/// and how to write a storage value back into it.
///
/// Setters are never invoked with a NULL value, the entity keeps whatever the factory
/// produced for that field.
pub struct FieldMapping<E> {
    name: &'static str,
    get: FieldGetter<E>,
    set: FieldSetter<E>,
}

impl<E> Clone for FieldMapping<E> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            get: self.get.clone(),
            set: self.set.clone(),
        }
    }
}

impl<E> fmt::Debug for FieldMapping<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldMapping")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl<E> FieldMapping<E> {
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn get(&self, entity: &E) -> Result<Value> {
        (self.get)(entity)
    }

    /// Writes `value` into the entity, NULL values are skipped.
    pub fn set(&self, entity: &mut E, value: Value) -> Result<()> {
        if value.is_null() {
            return Ok(());
        }
        (self.set)(entity, value)
    }
}

impl<E: 'static> FieldMapping<E> {
    pub fn new<G, S>(name: &'static str, get: G, set: S) -> Self
    where
        G: Fn(&E) -> Result<Value> + Send + Sync + 'static,
        S: Fn(&mut E, Value) -> Result<()> + Send + Sync + 'static,
    {
        Self {
            name,
            get: Arc::new(get),
            set: Arc::new(set),
        }
    }

    /// Field whose Rust type has a direct storage representation.
    pub fn native<T, G, S>(name: &'static str, get: G, set: S) -> Self
    where
        T: AsValue,
        G: Fn(&E) -> T + Send + Sync + 'static,
        S: Fn(&mut E, T) + Send + Sync + 'static,
    {
        Self::new(
            name,
            move |entity| Ok(get(entity).as_value()),
            move |entity, value| {
                set(entity, T::try_from_value(value)?);
                Ok(())
            },
        )
    }

    /// Field stored through a user supplied conversion to the storage type `D`.
    pub fn converted<T, D, G, S, Enc, Dec>(
        name: &'static str,
        get: G,
        set: S,
        encode: Enc,
        decode: Dec,
    ) -> Self
    where
        D: AsValue,
        G: for<'a> Fn(&'a E) -> Option<&'a T> + Send + Sync + 'static,
        S: Fn(&mut E, T) + Send + Sync + 'static,
        Enc: Fn(&T) -> D + Send + Sync + 'static,
        Dec: Fn(D) -> Result<T> + Send + Sync + 'static,
    {
        Self::new(
            name,
            move |entity| {
                Ok(match get(entity) {
                    Some(v) => encode(v).as_value(),
                    None => D::as_empty_value(),
                })
            },
            move |entity, value| {
                set(entity, decode(D::try_from_value(value)?)?);
                Ok(())
            },
        )
    }

    /// Field stored as canonical text, decoded with [`AsValue::try_from_value`] so the
    /// storage may also hand back the native variant.
    fn textual<T, G, S, F>(name: &'static str, get: G, set: S, format: F) -> Self
    where
        T: AsValue,
        G: Fn(&E) -> Option<T> + Send + Sync + 'static,
        S: Fn(&mut E, T) + Send + Sync + 'static,
        F: Fn(&T) -> Result<String> + Send + Sync + 'static,
    {
        Self::new(
            name,
            move |entity| {
                Ok(Value::Varchar(match get(entity) {
                    Some(v) => Some(format(&v)?),
                    None => None,
                }))
            },
            move |entity, value| {
                set(entity, T::try_from_value(value)?);
                Ok(())
            },
        )
    }

    /// UUID stored as its hyphenated text.
    pub fn uuid<G, S>(name: &'static str, get: G, set: S) -> Self
    where
        G: Fn(&E) -> Option<Uuid> + Send + Sync + 'static,
        S: Fn(&mut E, Uuid) + Send + Sync + 'static,
    {
        Self::textual(name, get, set, |v: &Uuid| {
            Ok(v.hyphenated().to_string())
        })
    }

    /// Decimal stored as exact text, the scale is preserved.
    pub fn decimal<G, S>(name: &'static str, get: G, set: S) -> Self
    where
        G: Fn(&E) -> Option<Decimal> + Send + Sync + 'static,
        S: Fn(&mut E, Decimal) + Send + Sync + 'static,
    {
        Self::textual(name, get, set, |v: &Decimal| Ok(v.to_string()))
    }

    /// Date stored as `YYYY-MM-DD`.
    pub fn date<G, S>(name: &'static str, get: G, set: S) -> Self
    where
        G: Fn(&E) -> Option<Date> + Send + Sync + 'static,
        S: Fn(&mut E, Date) + Send + Sync + 'static,
    {
        Self::textual(name, get, set, |v: &Date| Ok(v.format(DATE_FORMAT)?))
    }

    pub fn time<G, S>(name: &'static str, get: G, set: S) -> Self
    where
        G: Fn(&E) -> Option<Time> + Send + Sync + 'static,
        S: Fn(&mut E, Time) + Send + Sync + 'static,
    {
        Self::textual(name, get, set, |v: &Time| Ok(v.format(TIME_FORMAT)?))
    }

    pub fn timestamp<G, S>(name: &'static str, get: G, set: S) -> Self
    where
        G: Fn(&E) -> Option<PrimitiveDateTime> + Send + Sync + 'static,
        S: Fn(&mut E, PrimitiveDateTime) + Send + Sync + 'static,
    {
        Self::textual(name, get, set, |v: &PrimitiveDateTime| {
            Ok(v.format(TIMESTAMP_FORMAT)?)
        })
    }

    /// Timestamp with offset stored as RFC 3339 text.
    pub fn timestamp_with_timezone<G, S>(name: &'static str, get: G, set: S) -> Self
    where
        G: Fn(&E) -> Option<OffsetDateTime> + Send + Sync + 'static,
        S: Fn(&mut E, OffsetDateTime) + Send + Sync + 'static,
    {
        Self::textual(name, get, set, |v: &OffsetDateTime| {
            Ok(v.format(&Rfc3339)?)
        })
    }

    /// Temporal value stored as text with a caller supplied format description.
    pub fn temporal<T, F, G, S>(name: &'static str, get: G, set: S, format: F) -> Self
    where
        T: Temporal,
        F: Formattable + Parsable + Send + Sync + 'static,
        G: Fn(&E) -> Option<T> + Send + Sync + 'static,
        S: Fn(&mut E, T) + Send + Sync + 'static,
    {
        let format = Arc::new(format);
        let parse_format = format.clone();
        Self::new(
            name,
            move |entity| {
                Ok(Value::Varchar(match get(entity) {
                    Some(v) => Some(v.format_with(&*format)?),
                    None => None,
                }))
            },
            move |entity, value| {
                let v = match value {
                    Value::Varchar(Some(text)) => T::parse_with(&text, &*parse_format)?,
                    other => T::try_from_value(other)?,
                };
                set(entity, v);
                Ok(())
            },
        )
    }

    /// Value serialized as JSON text.
    pub fn json<T, G, S>(name: &'static str, get: G, set: S) -> Self
    where
        T: Serialize + DeserializeOwned,
        G: for<'a> Fn(&'a E) -> Option<&'a T> + Send + Sync + 'static,
        S: Fn(&mut E, T) + Send + Sync + 'static,
    {
        Self::new(
            name,
            move |entity| {
                Ok(Value::Varchar(match get(entity) {
                    Some(v) => Some(serde_json::to_string(v).with_context(|| {
                        format!("Cannot serialize {} as JSON", any::type_name::<T>())
                    })?),
                    None => None,
                }))
            },
            move |entity, value| {
                let v: T = match value {
                    Value::Varchar(Some(text)) => {
                        serde_json::from_str(&text).with_context(|| {
                            format!(
                                "Cannot deserialize `{}` as {}",
                                truncate_long!(text),
                                any::type_name::<T>()
                            )
                        })?
                    }
                    Value::Json(Some(json)) => serde_json::from_value(json).with_context(|| {
                        format!("Cannot deserialize JSON as {}", any::type_name::<T>())
                    })?,
                    other => {
                        return Err(Error::msg(format!(
                            "Expected JSON text, found a {} value",
                            other.type_name()
                        )));
                    }
                };
                set(entity, v);
                Ok(())
            },
        )
    }
}

/// Temporal types that can be written and read with an arbitrary format description.
pub trait Temporal: AsValue + Sized {
    fn format_with(&self, format: &(impl Formattable + ?Sized)) -> Result<String>;
    fn parse_with(input: &str, format: &(impl Parsable + ?Sized)) -> Result<Self>;
}

macro_rules! impl_temporal {
    ($($source:ty),+ $(,)?) => {
        $(
            impl Temporal for $source {
                fn format_with(&self, format: &(impl Formattable + ?Sized)) -> Result<String> {
                    Ok(self.format(format)?)
                }
                fn parse_with(input: &str, format: &(impl Parsable + ?Sized)) -> Result<Self> {
                    <$source>::parse(input.trim(), format).with_context(|| {
                        format!(
                            "Cannot parse `{}` as {}",
                            truncate_long!(input),
                            any::type_name::<Self>()
                        )
                    })
                }
            }
        )+
    };
}

impl_temporal!(Date, Time, PrimitiveDateTime, OffsetDateTime);

#[cfg(test)]
mod tests {
    use super::FieldMapping;
    use crate::Value;
    use rust_decimal::Decimal;
    use std::str::FromStr;
    use time::macros::{date, format_description};

    #[derive(Default)]
    struct Invoice {
        number: i32,
        total: Option<Decimal>,
        due: Option<time::Date>,
        tags: Option<Vec<String>>,
    }

    #[test]
    fn null_values_leave_the_factory_default() {
        let field = FieldMapping::<Invoice>::native("number", |e| e.number, |e, v| e.number = v);
        let mut invoice = Invoice {
            number: 7,
            ..Default::default()
        };
        field.set(&mut invoice, Value::Int32(None)).unwrap();
        assert_eq!(invoice.number, 7);
        field.set(&mut invoice, Value::Int64(Some(8))).unwrap();
        assert_eq!(invoice.number, 8);
    }

    #[test]
    fn decimal_keeps_scale() {
        let field =
            FieldMapping::<Invoice>::decimal("total", |e| e.total, |e, v| e.total = Some(v));
        let invoice = Invoice {
            total: Some(Decimal::from_str("10.50").unwrap()),
            ..Default::default()
        };
        assert_eq!(
            field.get(&invoice).unwrap(),
            Value::Varchar(Some("10.50".into()))
        );
        assert_eq!(
            field.get(&Invoice::default()).unwrap(),
            Value::Varchar(None)
        );
    }

    #[test]
    fn custom_temporal_format() {
        let field = FieldMapping::<Invoice>::temporal(
            "due",
            |e| e.due,
            |e, v| e.due = Some(v),
            format_description!("[day]/[month]/[year]"),
        );
        let mut invoice = Invoice {
            due: Some(date!(2025 - 03 - 01)),
            ..Default::default()
        };
        let stored = field.get(&invoice).unwrap();
        assert_eq!(stored, Value::Varchar(Some("01/03/2025".into())));
        invoice.due = None;
        field.set(&mut invoice, stored).unwrap();
        assert_eq!(invoice.due, Some(date!(2025 - 03 - 01)));
        assert!(
            field
                .set(&mut invoice, Value::Varchar(Some("2025-03-01".into())))
                .is_err()
        );
    }

    #[test]
    fn json_accepts_text_and_native() {
        let field = FieldMapping::<Invoice>::json(
            "tags",
            |e| e.tags.as_ref(),
            |e, v| e.tags = Some(v),
        );
        let mut invoice = Invoice::default();
        field
            .set(&mut invoice, Value::Varchar(Some(r#"["a","b"]"#.into())))
            .unwrap();
        assert_eq!(invoice.tags, Some(vec!["a".to_string(), "b".to_string()]));
        field
            .set(&mut invoice, Value::Json(Some(serde_json::json!(["c"]))))
            .unwrap();
        assert_eq!(invoice.tags, Some(vec!["c".to_string()]));
        assert!(field.set(&mut invoice, Value::Int32(Some(1))).is_err());
    }
}
