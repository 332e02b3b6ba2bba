use crate::Error;
use std::{borrow::Cow, fmt};

/// A delete addressed an id that matched no row (or more than one).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityNotFound {
    pub entity: &'static str,
    pub id: String,
}

impl EntityNotFound {
    pub fn new(entity: &'static str, id: impl fmt::Debug) -> Self {
        Self {
            entity,
            id: format!("{id:?}"),
        }
    }
}

impl fmt::Display for EntityNotFound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Entity {} with id {} is not found", self.entity, self.id)
    }
}

impl std::error::Error for EntityNotFound {}

/// A value could not be moved between an entity field and its storage column.
///
/// It is usually attached as context on top of the conversion error, so
/// [`ErrorKind::of`] still finds it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingError {
    pub entity: &'static str,
    pub column: Option<&'static str>,
    pub message: Cow<'static, str>,
}

impl MappingError {
    pub fn new(
        entity: &'static str,
        column: Option<&'static str>,
        message: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self {
            entity,
            column,
            message: message.into(),
        }
    }
}

impl fmt::Display for MappingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.column {
            Some(column) => write!(f, "{} (entity {}, column {})", self.message, self.entity, column),
            None => write!(f, "{} (entity {})", self.message, self.entity),
        }
    }
}

impl std::error::Error for MappingError {}

/// Coarse classification of the errors surfaced by repositories.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Mapping,
    /// Anything the driver reported: connectivity, constraint violations, bad SQL.
    Storage,
}

impl ErrorKind {
    pub fn of(error: &Error) -> Self {
        if error.downcast_ref::<EntityNotFound>().is_some() {
            ErrorKind::NotFound
        } else if error.downcast_ref::<MappingError>().is_some() {
            ErrorKind::Mapping
        } else {
            ErrorKind::Storage
        }
    }
}
