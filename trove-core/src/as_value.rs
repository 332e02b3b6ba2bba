use crate::{Error, Result, Value, truncate_long};
use anyhow::Context;
use rust_decimal::Decimal;
use std::{any, str::FromStr};
use time::{
    Date, OffsetDateTime, PrimitiveDateTime, Time,
    format_description::{BorrowedFormatItem, well_known::Rfc3339},
    macros::format_description,
};
use uuid::Uuid;

/// Canonical text form of a date: `2024-01-31`.
pub const DATE_FORMAT: &[BorrowedFormatItem<'static>] = format_description!("[year]-[month]-[day]");
/// Canonical text form of a time of day: `13:45:07.25`.
pub const TIME_FORMAT: &[BorrowedFormatItem<'static>] =
    format_description!("[hour]:[minute]:[second].[subsecond]");
/// Canonical text form of a timestamp without offset: `2024-01-31T13:45:07.25`.
pub const TIMESTAMP_FORMAT: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond]");

/// Conversion between a Rust type and the dynamically typed [`Value`].
///
/// `try_from_value` accepts the canonical variant of the type, any other variant that
/// converts without loss (integers of another width pass a range check) and a
/// `Value::Varchar` holding the canonical text form, which is handed to `parse`.
///
/// ```rust
/// use trove_core::{AsValue, Value};
/// let v = 42i32.as_value();
/// assert!(matches!(v, Value::Int32(Some(42))));
/// let n: i64 = AsValue::try_from_value(v).unwrap();
/// assert_eq!(n, 42);
/// ```
pub trait AsValue {
    /// Typed NULL for this type.
    fn as_empty_value() -> Value;
    fn as_value(self) -> Value;
    fn try_from_value(value: Value) -> Result<Self>
    where
        Self: Sized;
    /// Parse the canonical text form.
    fn parse(input: impl AsRef<str>) -> Result<Self>
    where
        Self: Sized,
    {
        Err(Error::msg(format!(
            "Cannot parse `{}` as {}",
            truncate_long!(input.as_ref()),
            any::type_name::<Self>()
        )))
    }
}

impl<T: AsValue> From<T> for Value {
    fn from(value: T) -> Self {
        value.as_value()
    }
}

impl From<&'static str> for Value {
    fn from(value: &'static str) -> Self {
        Value::Varchar(Some(value.into()))
    }
}

fn conversion_error<T>(value: &Value) -> Error {
    Error::msg(format!(
        "Cannot convert a {} value to {}",
        value.type_name(),
        any::type_name::<T>()
    ))
}

fn parse_text<T: FromStr>(input: &str) -> Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    input.trim().parse::<T>().with_context(|| {
        format!(
            "Cannot parse `{}` as {}",
            truncate_long!(input),
            any::type_name::<T>()
        )
    })
}

macro_rules! impl_as_value_integer {
    ($source:ty, $destination:path) => {
        impl AsValue for $source {
            fn as_empty_value() -> Value {
                $destination(None)
            }
            fn as_value(self) -> Value {
                $destination(Some(self))
            }
            fn try_from_value(value: Value) -> Result<Self> {
                let wide: i128 = match value {
                    $destination(Some(v)) => return Ok(v),
                    #[allow(unreachable_patterns)]
                    Value::Int8(Some(v)) => v.into(),
                    #[allow(unreachable_patterns)]
                    Value::Int16(Some(v)) => v.into(),
                    #[allow(unreachable_patterns)]
                    Value::Int32(Some(v)) => v.into(),
                    #[allow(unreachable_patterns)]
                    Value::Int64(Some(v)) => v.into(),
                    #[allow(unreachable_patterns)]
                    Value::UInt8(Some(v)) => v.into(),
                    #[allow(unreachable_patterns)]
                    Value::UInt16(Some(v)) => v.into(),
                    #[allow(unreachable_patterns)]
                    Value::UInt32(Some(v)) => v.into(),
                    #[allow(unreachable_patterns)]
                    Value::UInt64(Some(v)) => v.into(),
                    Value::Decimal(Some(v)) if v.fract().is_zero() => {
                        return v.normalize().to_string().parse::<$source>().map_err(|_| {
                            Error::msg(format!(
                                "Value {v} is out of range for {}",
                                any::type_name::<Self>()
                            ))
                        });
                    }
                    Value::Varchar(Some(ref v)) => return Self::parse(v),
                    _ => return Err(conversion_error::<Self>(&value)),
                };
                <$source>::try_from(wide).map_err(|_| {
                    Error::msg(format!(
                        "Value {wide} is out of range for {}",
                        any::type_name::<Self>()
                    ))
                })
            }
            fn parse(input: impl AsRef<str>) -> Result<Self> {
                parse_text(input.as_ref())
            }
        }
    };
}

impl_as_value_integer!(i8, Value::Int8);
impl_as_value_integer!(i16, Value::Int16);
impl_as_value_integer!(i32, Value::Int32);
impl_as_value_integer!(i64, Value::Int64);
impl_as_value_integer!(u8, Value::UInt8);
impl_as_value_integer!(u16, Value::UInt16);
impl_as_value_integer!(u32, Value::UInt32);
impl_as_value_integer!(u64, Value::UInt64);

macro_rules! impl_as_value_float {
    ($source:ty, $destination:path) => {
        impl AsValue for $source {
            fn as_empty_value() -> Value {
                $destination(None)
            }
            fn as_value(self) -> Value {
                $destination(Some(self))
            }
            fn try_from_value(value: Value) -> Result<Self> {
                match value {
                    $destination(Some(v)) => Ok(v),
                    #[allow(unreachable_patterns)]
                    Value::Float32(Some(v)) => Ok(v as _),
                    #[allow(unreachable_patterns)]
                    Value::Float64(Some(v)) => Ok(v as _),
                    Value::Int8(Some(v)) => Ok(v as _),
                    Value::Int16(Some(v)) => Ok(v as _),
                    Value::Int32(Some(v)) => Ok(v as _),
                    Value::Int64(Some(v)) => Ok(v as _),
                    Value::UInt8(Some(v)) => Ok(v as _),
                    Value::UInt16(Some(v)) => Ok(v as _),
                    Value::UInt32(Some(v)) => Ok(v as _),
                    Value::UInt64(Some(v)) => Ok(v as _),
                    Value::Decimal(Some(v)) => Self::parse(v.to_string()),
                    Value::Varchar(Some(ref v)) => Self::parse(v),
                    _ => Err(conversion_error::<Self>(&value)),
                }
            }
            fn parse(input: impl AsRef<str>) -> Result<Self> {
                parse_text(input.as_ref())
            }
        }
    };
}

impl_as_value_float!(f32, Value::Float32);
impl_as_value_float!(f64, Value::Float64);

impl AsValue for bool {
    fn as_empty_value() -> Value {
        Value::Boolean(None)
    }
    fn as_value(self) -> Value {
        Value::Boolean(Some(self))
    }
    fn try_from_value(value: Value) -> Result<Self> {
        match value {
            Value::Boolean(Some(v)) => Ok(v),
            Value::Int8(Some(v)) => Ok(v != 0),
            Value::Int16(Some(v)) => Ok(v != 0),
            Value::Int32(Some(v)) => Ok(v != 0),
            Value::Int64(Some(v)) => Ok(v != 0),
            Value::UInt8(Some(v)) => Ok(v != 0),
            Value::Varchar(Some(ref v)) => Self::parse(v),
            _ => Err(conversion_error::<Self>(&value)),
        }
    }
    fn parse(input: impl AsRef<str>) -> Result<Self> {
        let input = input.as_ref();
        match input.trim() {
            v if v.eq_ignore_ascii_case("true") || v == "1" => Ok(true),
            v if v.eq_ignore_ascii_case("false") || v == "0" => Ok(false),
            _ => Err(Error::msg(format!(
                "Cannot parse `{}` as bool",
                truncate_long!(input)
            ))),
        }
    }
}

impl AsValue for String {
    fn as_empty_value() -> Value {
        Value::Varchar(None)
    }
    fn as_value(self) -> Value {
        Value::Varchar(Some(self))
    }
    fn try_from_value(value: Value) -> Result<Self> {
        match value {
            Value::Varchar(Some(v)) => Ok(v),
            _ => Err(conversion_error::<Self>(&value)),
        }
    }
    fn parse(input: impl AsRef<str>) -> Result<Self> {
        Ok(input.as_ref().to_owned())
    }
}

impl AsValue for Box<[u8]> {
    fn as_empty_value() -> Value {
        Value::Blob(None)
    }
    fn as_value(self) -> Value {
        Value::Blob(Some(self))
    }
    fn try_from_value(value: Value) -> Result<Self> {
        match value {
            Value::Blob(Some(v)) => Ok(v),
            Value::Varchar(Some(v)) => Ok(v.into_bytes().into_boxed_slice()),
            _ => Err(conversion_error::<Self>(&value)),
        }
    }
}

impl AsValue for Decimal {
    fn as_empty_value() -> Value {
        Value::Decimal(None)
    }
    fn as_value(self) -> Value {
        Value::Decimal(Some(self))
    }
    fn try_from_value(value: Value) -> Result<Self> {
        match value {
            Value::Decimal(Some(v)) => Ok(v),
            Value::Int8(Some(v)) => Ok(v.into()),
            Value::Int16(Some(v)) => Ok(v.into()),
            Value::Int32(Some(v)) => Ok(v.into()),
            Value::Int64(Some(v)) => Ok(v.into()),
            Value::UInt8(Some(v)) => Ok(v.into()),
            Value::UInt16(Some(v)) => Ok(v.into()),
            Value::UInt32(Some(v)) => Ok(v.into()),
            Value::UInt64(Some(v)) => Ok(v.into()),
            Value::Float64(Some(v)) => Decimal::try_from(v)
                .with_context(|| format!("Cannot convert {v} to {}", any::type_name::<Self>())),
            Value::Varchar(Some(ref v)) => Self::parse(v),
            _ => Err(conversion_error::<Self>(&value)),
        }
    }
    fn parse(input: impl AsRef<str>) -> Result<Self> {
        let input = input.as_ref();
        Decimal::from_str_exact(input.trim()).with_context(|| {
            format!(
                "Cannot parse `{}` as {}",
                truncate_long!(input),
                any::type_name::<Self>()
            )
        })
    }
}

macro_rules! impl_as_value_temporal {
    ($source:ty, $destination:path, $format:expr) => {
        impl AsValue for $source {
            fn as_empty_value() -> Value {
                $destination(None)
            }
            fn as_value(self) -> Value {
                $destination(Some(self))
            }
            fn try_from_value(value: Value) -> Result<Self> {
                match value {
                    $destination(Some(v)) => Ok(v),
                    Value::Varchar(Some(ref v)) => <Self as AsValue>::parse(v),
                    _ => Err(conversion_error::<Self>(&value)),
                }
            }
            fn parse(input: impl AsRef<str>) -> Result<Self> {
                let input = input.as_ref();
                <$source>::parse(input.trim(), &$format).with_context(|| {
                    format!(
                        "Cannot parse `{}` as {}",
                        truncate_long!(input),
                        any::type_name::<Self>()
                    )
                })
            }
        }
    };
}

impl_as_value_temporal!(Date, Value::Date, DATE_FORMAT);
impl_as_value_temporal!(Time, Value::Time, TIME_FORMAT);
impl_as_value_temporal!(PrimitiveDateTime, Value::Timestamp, TIMESTAMP_FORMAT);
impl_as_value_temporal!(OffsetDateTime, Value::TimestampWithTimezone, Rfc3339);

impl AsValue for Uuid {
    fn as_empty_value() -> Value {
        Value::Uuid(None)
    }
    fn as_value(self) -> Value {
        Value::Uuid(Some(self))
    }
    fn try_from_value(value: Value) -> Result<Self> {
        match value {
            Value::Uuid(Some(v)) => Ok(v),
            Value::Varchar(Some(ref v)) => Self::parse(v),
            Value::Blob(Some(ref v)) => Uuid::from_slice(v).map_err(Into::into),
            _ => Err(conversion_error::<Self>(&value)),
        }
    }
    fn parse(input: impl AsRef<str>) -> Result<Self> {
        parse_text(input.as_ref())
    }
}

impl AsValue for serde_json::Value {
    fn as_empty_value() -> Value {
        Value::Json(None)
    }
    fn as_value(self) -> Value {
        Value::Json(Some(self))
    }
    fn try_from_value(value: Value) -> Result<Self> {
        match value {
            Value::Json(Some(v)) => Ok(v),
            Value::Varchar(Some(ref v)) => Self::parse(v),
            _ => Err(conversion_error::<Self>(&value)),
        }
    }
    fn parse(input: impl AsRef<str>) -> Result<Self> {
        let input = input.as_ref();
        serde_json::from_str(input)
            .with_context(|| format!("Cannot parse `{}` as JSON", truncate_long!(input)))
    }
}

impl<T: AsValue> AsValue for Option<T> {
    fn as_empty_value() -> Value {
        T::as_empty_value()
    }
    fn as_value(self) -> Value {
        match self {
            Some(v) => v.as_value(),
            None => T::as_empty_value(),
        }
    }
    fn try_from_value(value: Value) -> Result<Self> {
        if value.is_null() {
            return Ok(None);
        }
        T::try_from_value(value).map(Some)
    }
    fn parse(input: impl AsRef<str>) -> Result<Self> {
        T::parse(input).map(Some)
    }
}
