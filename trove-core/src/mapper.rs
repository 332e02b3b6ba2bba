use crate::{AsValue, Error, FieldMapping, MappingError, Result, RowLabeled, Value};
use anyhow::Context;
use rust_decimal::Decimal;
use serde::{Serialize, de::DeserializeOwned};
use std::{any, borrow::Cow, fmt, mem, sync::Arc};
use time::{
    Date, OffsetDateTime, PrimitiveDateTime, Time, formatting::Formattable, parsing::Parsable,
};
use uuid::Uuid;

/// Storage width of the primary key, used to narrow keys generated by the storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdKind {
    Int8,
    Int16,
    Int32,
    Int64,
    /// Anything else, generated keys are passed through as 64 bit integers.
    Other,
}

impl IdKind {
    pub fn of<S: AsValue>() -> Self {
        match S::as_empty_value() {
            Value::Int8(..) => IdKind::Int8,
            Value::Int16(..) => IdKind::Int16,
            Value::Int32(..) => IdKind::Int32,
            Value::Int64(..) => IdKind::Int64,
            _ => IdKind::Other,
        }
    }

    /// Narrows a generated key, failing when it does not fit.
    pub fn coerce(self, generated: i64) -> Result<Value> {
        let out_of_range = |kind: IdKind| {
            Error::msg(format!(
                "Generated key {generated} does not fit a {kind:?} primary key"
            ))
        };
        Ok(match self {
            IdKind::Int8 => Value::Int8(Some(
                i8::try_from(generated).map_err(|_| out_of_range(self))?,
            )),
            IdKind::Int16 => Value::Int16(Some(
                i16::try_from(generated).map_err(|_| out_of_range(self))?,
            )),
            IdKind::Int32 => Value::Int32(Some(
                i32::try_from(generated).map_err(|_| out_of_range(self))?,
            )),
            IdKind::Int64 | IdKind::Other => Value::Int64(Some(generated)),
        })
    }
}

type KeyGetter<ID, E> = Arc<dyn Fn(&E) -> Option<ID> + Send + Sync>;
type KeySetter<ID, E> = Arc<dyn Fn(&mut E, ID) + Send + Sync>;
type ToStorage<ID> = Arc<dyn Fn(&ID) -> Value + Send + Sync>;
type FromStorage<ID> = Arc<dyn Fn(Value) -> Result<ID> + Send + Sync>;

struct PrimaryKey<ID, E> {
    name: &'static str,
    get: KeyGetter<ID, E>,
    set: KeySetter<ID, E>,
    to_storage: ToStorage<ID>,
    from_storage: FromStorage<ID>,
    kind: IdKind,
    autogenerated: bool,
}

/// Everything needed to move an entity of type `E` with key type `ID` in and out of
/// a table: the table name, the key and the ordered columns.
///
/// The column list always starts with the primary key, followed by the other fields in
/// registration order.
pub struct RowMapper<ID, E> {
    table_name: Cow<'static, str>,
    factory: Box<dyn Fn() -> E + Send + Sync>,
    key: PrimaryKey<ID, E>,
    fields: Box<[FieldMapping<E>]>,
    columns: Box<[&'static str]>,
}

impl<ID, E> fmt::Debug for RowMapper<ID, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RowMapper")
            .field("table_name", &self.table_name)
            .field("columns", &self.columns)
            .field("id_kind", &self.key.kind)
            .field("autogenerated", &self.key.autogenerated)
            .finish()
    }
}

impl<ID: 'static, E: 'static> RowMapper<ID, E> {
    pub fn builder<F>(
        table_name: impl Into<Cow<'static, str>>,
        factory: F,
    ) -> EntityMapperBuilder<ID, E>
    where
        F: Fn() -> E + Send + Sync + 'static,
    {
        EntityMapperBuilder::new(table_name, factory)
    }
}

impl<ID, E> RowMapper<ID, E> {
    pub fn table_name(&self) -> &str {
        &self.table_name
    }
    pub fn pk_name(&self) -> &'static str {
        self.key.name
    }
    pub fn is_pk_autogenerated(&self) -> bool {
        self.key.autogenerated
    }
    pub fn id_kind(&self) -> IdKind {
        self.key.kind
    }
    pub fn column_names(&self) -> &[&'static str] {
        &self.columns
    }
    pub fn fields(&self) -> &[FieldMapping<E>] {
        &self.fields
    }
    pub fn new_entity(&self) -> E {
        (self.factory)()
    }

    pub fn id(&self, entity: &E) -> Option<ID> {
        (self.key.get)(entity)
    }
    /// Storage representation of a key.
    pub fn id_value(&self, id: &ID) -> Value {
        (self.key.to_storage)(id)
    }
    pub fn set_id(&self, entity: &mut E, id: ID) {
        (self.key.set)(entity, id)
    }

    /// Assigns a key generated by the storage, narrowed to the key width and decoded
    /// through the key conversion.
    pub fn set_generated_id(&self, entity: &mut E, generated: i64) -> Result<()> {
        let id = self
            .key
            .kind
            .coerce(generated)
            .and_then(|v| (self.key.from_storage)(v))
            .with_context(|| {
                MappingError::new(
                    any::type_name::<E>(),
                    Some(self.key.name),
                    format!("Can't set id value {generated}"),
                )
            })?;
        (self.key.set)(entity, id);
        Ok(())
    }

    /// Builds an entity from a row. Columns are looked up by label, a row without labels
    /// is read by position in the mapper's column order.
    pub fn map(&self, row: RowLabeled) -> Result<E> {
        let RowLabeled { labels, values } = row;
        let mut values = values.into_vec();
        let mut entity = (self.factory)();
        for (i, field) in self.fields.iter().enumerate() {
            let position = if labels.is_empty() {
                Some(i)
            } else {
                labels.iter().position(|v| v == field.name())
            };
            let Some(value) = position.and_then(|i| values.get_mut(i)) else {
                return Err(Error::new(MappingError::new(
                    any::type_name::<E>(),
                    Some(field.name()),
                    "The row has no value for the column",
                )));
            };
            field
                .set(&mut entity, mem::take(value))
                .with_context(|| {
                    MappingError::new(
                        any::type_name::<E>(),
                        Some(field.name()),
                        "Cannot decode the column",
                    )
                })?;
        }
        Ok(entity)
    }

    /// Column values in column order, the key first when `include_pk` is set.
    pub fn to_params(&self, entity: &E, include_pk: bool) -> Result<Vec<Value>> {
        self.fields
            .iter()
            .skip(if include_pk { 0 } else { 1 })
            .map(|field| {
                field.get(entity).with_context(|| {
                    MappingError::new(
                        any::type_name::<E>(),
                        Some(field.name()),
                        "Cannot encode the field",
                    )
                })
            })
            .collect()
    }

    /// Parameters of the update statement: the non key columns then the key.
    pub fn to_update_params(&self, entity: &E) -> Result<Vec<Value>> {
        let mut params = self.to_params(entity, true)?;
        if !params.is_empty() {
            params.rotate_left(1);
        }
        Ok(params)
    }

    /// Parameters of the dynamic update statement: the non NULL non key columns then the key.
    pub fn to_dynamic_params(&self, entity: &E) -> Result<Vec<Value>> {
        let mut params = self.to_params(entity, true)?.into_iter();
        let Some(pk) = params.next() else {
            return Ok(Vec::new());
        };
        let mut result = params.filter(|v| !v.is_null()).collect::<Vec<_>>();
        result.push(pk);
        Ok(result)
    }
}

/// Collects the key and field registrations of an entity, see [`RowMapper::builder`].
pub struct EntityMapperBuilder<ID, E> {
    table_name: Cow<'static, str>,
    factory: Box<dyn Fn() -> E + Send + Sync>,
    key: Option<(&'static str, KeyGetter<ID, E>, KeySetter<ID, E>)>,
    converter: Option<(ToStorage<ID>, FromStorage<ID>, IdKind)>,
    autogenerated: bool,
    fields: Vec<FieldMapping<E>>,
}

impl<ID: 'static, E: 'static> EntityMapperBuilder<ID, E> {
    pub fn new<F>(table_name: impl Into<Cow<'static, str>>, factory: F) -> Self
    where
        F: Fn() -> E + Send + Sync + 'static,
    {
        Self {
            table_name: table_name.into(),
            factory: Box::new(factory),
            key: None,
            converter: None,
            autogenerated: false,
            fields: Vec::new(),
        }
    }

    /// Registers the primary key, stored with the native representation of `ID`.
    pub fn pk<G, S>(self, name: &'static str, get: G, set: S) -> Self
    where
        ID: AsValue + Clone,
        G: Fn(&E) -> Option<ID> + Send + Sync + 'static,
        S: Fn(&mut E, ID) + Send + Sync + 'static,
    {
        self.pk_as(name, get, set, |id: &ID| id.clone(), Ok)
    }

    /// Registers the primary key stored as `S`, converted on the way in and out.
    pub fn pk_as<St, G, S, Enc, Dec>(
        mut self,
        name: &'static str,
        get: G,
        set: S,
        encode: Enc,
        decode: Dec,
    ) -> Self
    where
        St: AsValue,
        G: Fn(&E) -> Option<ID> + Send + Sync + 'static,
        S: Fn(&mut E, ID) + Send + Sync + 'static,
        Enc: Fn(&ID) -> St + Send + Sync + 'static,
        Dec: Fn(St) -> Result<ID> + Send + Sync + 'static,
    {
        let get: KeyGetter<ID, E> = Arc::new(get);
        let set: KeySetter<ID, E> = Arc::new(set);
        self.key = Some((name, get, set));
        self.pk_converter(encode, decode)
    }

    /// Replaces the conversion between the key and its storage type `St`. The storage
    /// type also decides the width generated keys are narrowed to.
    pub fn pk_converter<St, Enc, Dec>(mut self, encode: Enc, decode: Dec) -> Self
    where
        St: AsValue,
        Enc: Fn(&ID) -> St + Send + Sync + 'static,
        Dec: Fn(St) -> Result<ID> + Send + Sync + 'static,
    {
        let to_storage: ToStorage<ID> = Arc::new(move |id: &ID| encode(id).as_value());
        let from_storage: FromStorage<ID> =
            Arc::new(move |value: Value| decode(St::try_from_value(value)?));
        self.converter = Some((to_storage, from_storage, IdKind::of::<St>()));
        self
    }

    /// The storage generates the key when an entity without one is inserted.
    pub fn autogenerated(mut self) -> Self {
        self.autogenerated = true;
        self
    }

    /// Registers a field, replacing any earlier field with the same column name.
    pub fn add(mut self, field: FieldMapping<E>) -> Self {
        match self.fields.iter_mut().find(|v| v.name() == field.name()) {
            Some(existing) => *existing = field,
            None => self.fields.push(field),
        }
        self
    }

    pub fn add_field<T, G, S>(self, name: &'static str, get: G, set: S) -> Self
    where
        T: AsValue,
        G: Fn(&E) -> T + Send + Sync + 'static,
        S: Fn(&mut E, T) + Send + Sync + 'static,
    {
        self.add(FieldMapping::native(name, get, set))
    }

    pub fn add_converted<T, D, G, S, Enc, Dec>(
        self,
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
        self.add(FieldMapping::converted(name, get, set, encode, decode))
    }

    pub fn add_uuid<G, S>(self, name: &'static str, get: G, set: S) -> Self
    where
        G: Fn(&E) -> Option<Uuid> + Send + Sync + 'static,
        S: Fn(&mut E, Uuid) + Send + Sync + 'static,
    {
        self.add(FieldMapping::uuid(name, get, set))
    }

    pub fn add_decimal<G, S>(self, name: &'static str, get: G, set: S) -> Self
    where
        G: Fn(&E) -> Option<Decimal> + Send + Sync + 'static,
        S: Fn(&mut E, Decimal) + Send + Sync + 'static,
    {
        self.add(FieldMapping::decimal(name, get, set))
    }

    pub fn add_date<G, S>(self, name: &'static str, get: G, set: S) -> Self
    where
        G: Fn(&E) -> Option<Date> + Send + Sync + 'static,
        S: Fn(&mut E, Date) + Send + Sync + 'static,
    {
        self.add(FieldMapping::date(name, get, set))
    }

    pub fn add_time<G, S>(self, name: &'static str, get: G, set: S) -> Self
    where
        G: Fn(&E) -> Option<Time> + Send + Sync + 'static,
        S: Fn(&mut E, Time) + Send + Sync + 'static,
    {
        self.add(FieldMapping::time(name, get, set))
    }

    pub fn add_timestamp<G, S>(self, name: &'static str, get: G, set: S) -> Self
    where
        G: Fn(&E) -> Option<PrimitiveDateTime> + Send + Sync + 'static,
        S: Fn(&mut E, PrimitiveDateTime) + Send + Sync + 'static,
    {
        self.add(FieldMapping::timestamp(name, get, set))
    }

    pub fn add_timestamp_with_timezone<G, S>(self, name: &'static str, get: G, set: S) -> Self
    where
        G: Fn(&E) -> Option<OffsetDateTime> + Send + Sync + 'static,
        S: Fn(&mut E, OffsetDateTime) + Send + Sync + 'static,
    {
        self.add(FieldMapping::timestamp_with_timezone(name, get, set))
    }

    pub fn add_temporal<T, F, G, S>(self, name: &'static str, get: G, set: S, format: F) -> Self
    where
        T: crate::Temporal,
        F: Formattable + Parsable + Send + Sync + 'static,
        G: Fn(&E) -> Option<T> + Send + Sync + 'static,
        S: Fn(&mut E, T) + Send + Sync + 'static,
    {
        self.add(FieldMapping::temporal(name, get, set, format))
    }

    pub fn add_json<T, G, S>(self, name: &'static str, get: G, set: S) -> Self
    where
        T: Serialize + DeserializeOwned,
        G: for<'a> Fn(&'a E) -> Option<&'a T> + Send + Sync + 'static,
        S: Fn(&mut E, T) + Send + Sync + 'static,
    {
        self.add(FieldMapping::json(name, get, set))
    }

    pub fn build(self) -> Result<RowMapper<ID, E>> {
        let entity = any::type_name::<E>();
        let Some((name, get, set)) = self.key else {
            return Err(Error::new(MappingError::new(
                entity,
                None,
                "No primary key was registered",
            )));
        };
        let Some((to_storage, from_storage, kind)) = self.converter else {
            return Err(Error::new(MappingError::new(
                entity,
                Some(name),
                "No storage conversion was registered for the primary key",
            )));
        };
        let key_field = {
            let get = get.clone();
            let set = set.clone();
            let to_storage = to_storage.clone();
            let from_storage = from_storage.clone();
            FieldMapping::new(
                name,
                move |entity| {
                    Ok(match get(entity) {
                        Some(id) => to_storage(&id),
                        None => Value::Null,
                    })
                },
                move |entity, value| {
                    set(entity, from_storage(value)?);
                    Ok(())
                },
            )
        };
        let fields = std::iter::once(key_field)
            .chain(self.fields.into_iter().filter(|v| v.name() != name))
            .collect::<Box<[_]>>();
        let columns: Box<[&'static str]> = fields.iter().map(|v| v.name()).collect();
        log::debug!(
            "Mapped {} to table `{}` with columns {:?}",
            entity,
            self.table_name,
            columns
        );
        Ok(RowMapper {
            table_name: self.table_name,
            factory: self.factory,
            key: PrimaryKey {
                name,
                get,
                set,
                to_storage,
                from_storage,
                kind,
                autogenerated: self.autogenerated,
            },
            fields,
            columns,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;
    use std::str::FromStr;

    #[derive(Debug, Default, Clone, PartialEq)]
    struct Item {
        id: Option<i64>,
        name: String,
        price: Decimal,
    }

    fn item_mapper() -> RowMapper<i64, Item> {
        RowMapper::builder("item", Item::default)
            .pk("id", |e: &Item| e.id, |e, id| e.id = Some(id))
            .autogenerated()
            .add_field("name", |e| e.name.clone(), |e, v| e.name = v)
            .add_decimal("price", |e| Some(e.price), |e, v| e.price = v)
            .build()
            .unwrap()
    }

    #[test]
    fn columns_start_with_the_key() {
        let mapper = item_mapper();
        assert_eq!(mapper.column_names(), &["id", "name", "price"]);
        assert_eq!(mapper.pk_name(), "id");
        assert_eq!(mapper.id_kind(), IdKind::Int64);
        assert!(mapper.is_pk_autogenerated());
    }

    #[test]
    fn update_params_rotate_the_key_last() {
        let mapper = item_mapper();
        let item = Item {
            id: Some(4),
            name: "Pen".into(),
            price: Decimal::from_str("1.50").unwrap(),
        };
        assert_eq!(
            mapper.to_update_params(&item).unwrap(),
            vec![
                Value::Varchar(Some("Pen".into())),
                Value::Varchar(Some("1.50".into())),
                Value::Int64(Some(4)),
            ]
        );
        assert_eq!(mapper.to_params(&item, false).unwrap().len(), 2);
    }

    #[test]
    fn map_by_label_and_report_the_column() {
        let mapper = item_mapper();
        let labels: Arc<[String]> = ["price", "id", "name"].map(String::from).into();
        let row = RowLabeled::new(
            labels.clone(),
            [
                Value::Decimal(Some(Decimal::from_str("2.25").unwrap())),
                Value::Int32(Some(9)),
                Value::Varchar(Some("Ink".into())),
            ]
            .into(),
        );
        let item = mapper.map(row).unwrap();
        assert_eq!(item.id, Some(9));
        assert_eq!(item.name, "Ink");
        assert_eq!(item.price.to_string(), "2.25");

        let row = RowLabeled::new(
            labels,
            [
                Value::Varchar(Some("cheap".into())),
                Value::Int32(Some(9)),
                Value::Varchar(Some("Ink".into())),
            ]
            .into(),
        );
        let error = mapper.map(row).unwrap_err();
        assert_eq!(ErrorKind::of(&error), ErrorKind::Mapping);
        assert!(format!("{error:#}").contains("column price"));
    }

    #[test]
    fn generated_keys_are_narrowed() {
        #[derive(Default)]
        struct Tag {
            id: Option<i16>,
        }
        let mapper = RowMapper::builder("tag", Tag::default)
            .pk("id", |e: &Tag| e.id, |e, id| e.id = Some(id))
            .autogenerated()
            .build()
            .unwrap();
        let mut tag = Tag::default();
        mapper.set_generated_id(&mut tag, 300).unwrap();
        assert_eq!(tag.id, Some(300));
        let error = mapper.set_generated_id(&mut tag, 70_000).unwrap_err();
        assert_eq!(ErrorKind::of(&error), ErrorKind::Mapping);
        assert_eq!(tag.id, Some(300));
    }

    #[test]
    fn converted_key_and_missing_key() {
        #[derive(Default)]
        struct Account {
            id: Option<Uuid>,
        }
        let mapper = RowMapper::builder("account", Account::default)
            .pk("id", |e: &Account| e.id, |e, id| e.id = Some(id))
            .pk_converter(
                |id: &Uuid| id.to_string(),
                |text: String| Ok(Uuid::parse_str(&text)?),
            )
            .build()
            .unwrap();
        let id = Uuid::from_u128(7);
        assert_eq!(mapper.id_value(&id), Value::Varchar(Some(id.to_string())));
        assert_eq!(mapper.id_kind(), IdKind::Other);

        let error = RowMapper::<i64, Account>::builder("account", Account::default)
            .build()
            .unwrap_err();
        assert_eq!(ErrorKind::of(&error), ErrorKind::Mapping);
    }

    #[test]
    fn registering_twice_replaces() {
        let mapper = RowMapper::builder("item", Item::default)
            .pk("id", |e: &Item| e.id, |e, id| e.id = Some(id))
            .add_field("name", |e| e.name.clone(), |e, v| e.name = v)
            .add_decimal("price", |e| Some(e.price), |e, v| e.price = v)
            .add_field("name", |e: &Item| e.name.to_uppercase(), |e, v| e.name = v)
            .build()
            .unwrap();
        assert_eq!(mapper.column_names(), &["id", "name", "price"]);
        let item = Item {
            name: "pen".into(),
            ..Default::default()
        };
        assert_eq!(
            mapper.to_params(&item, false).unwrap()[0],
            Value::Varchar(Some("PEN".into()))
        );
    }
}
