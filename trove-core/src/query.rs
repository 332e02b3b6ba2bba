use crate::{PageRequest, SqlWriter, Value, possibly_parenthesized, separated_by};
use std::borrow::Cow;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    Like,
}

impl CompareOp {
    pub fn as_sql(&self) -> &'static str {
        match self {
            CompareOp::Equal => "=",
            CompareOp::NotEqual => "!=",
            CompareOp::Less => "<",
            CompareOp::LessEqual => "<=",
            CompareOp::Greater => ">",
            CompareOp::GreaterEqual => ">=",
            CompareOp::Like => "LIKE",
        }
    }
}

/// Filter rendered into a `WHERE` clause. Every value is bound as a parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Compare {
        column: Cow<'static, str>,
        op: CompareOp,
        value: Value,
    },
    IsNull(Cow<'static, str>),
    IsNotNull(Cow<'static, str>),
    In {
        column: Cow<'static, str>,
        values: Vec<Value>,
    },
    And(Vec<Condition>),
    Or(Vec<Condition>),
    Not(Box<Condition>),
    /// Caller supplied SQL fragment, used verbatim. Its placeholders must follow the
    /// dialect of the writer it is rendered with.
    Raw { sql: String, params: Vec<Value> },
}

impl Condition {
    pub fn compare(
        column: impl Into<Cow<'static, str>>,
        op: CompareOp,
        value: impl Into<Value>,
    ) -> Self {
        Condition::Compare {
            column: column.into(),
            op,
            value: value.into(),
        }
    }
    pub fn equal(column: impl Into<Cow<'static, str>>, value: impl Into<Value>) -> Self {
        Self::compare(column, CompareOp::Equal, value)
    }
    pub fn not_equal(column: impl Into<Cow<'static, str>>, value: impl Into<Value>) -> Self {
        Self::compare(column, CompareOp::NotEqual, value)
    }
    pub fn less(column: impl Into<Cow<'static, str>>, value: impl Into<Value>) -> Self {
        Self::compare(column, CompareOp::Less, value)
    }
    pub fn less_equal(column: impl Into<Cow<'static, str>>, value: impl Into<Value>) -> Self {
        Self::compare(column, CompareOp::LessEqual, value)
    }
    pub fn greater(column: impl Into<Cow<'static, str>>, value: impl Into<Value>) -> Self {
        Self::compare(column, CompareOp::Greater, value)
    }
    pub fn greater_equal(column: impl Into<Cow<'static, str>>, value: impl Into<Value>) -> Self {
        Self::compare(column, CompareOp::GreaterEqual, value)
    }
    pub fn like(column: impl Into<Cow<'static, str>>, pattern: impl Into<Value>) -> Self {
        Self::compare(column, CompareOp::Like, pattern)
    }
    pub fn is_null(column: impl Into<Cow<'static, str>>) -> Self {
        Condition::IsNull(column.into())
    }
    pub fn is_not_null(column: impl Into<Cow<'static, str>>) -> Self {
        Condition::IsNotNull(column.into())
    }
    pub fn is_in<V: Into<Value>>(
        column: impl Into<Cow<'static, str>>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        Condition::In {
            column: column.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }
    pub fn raw(sql: impl Into<String>, params: Vec<Value>) -> Self {
        Condition::Raw {
            sql: sql.into(),
            params,
        }
    }

    pub fn and(self, other: Condition) -> Self {
        match self {
            Condition::And(mut conditions) => {
                conditions.push(other);
                Condition::And(conditions)
            }
            this => Condition::And(vec![this, other]),
        }
    }
    pub fn or(self, other: Condition) -> Self {
        match self {
            Condition::Or(mut conditions) => {
                conditions.push(other);
                Condition::Or(conditions)
            }
            this => Condition::Or(vec![this, other]),
        }
    }
    #[allow(clippy::should_implement_trait)]
    pub fn not(self) -> Self {
        Condition::Not(Box::new(self))
    }

    /// Whether the condition needs parentheses when combined with other conditions.
    pub fn is_compound(&self) -> bool {
        matches!(
            self,
            Condition::And(..) | Condition::Or(..) | Condition::Raw { .. }
        )
    }

    /// Writes the condition and returns the index of the next placeholder.
    pub fn write_sql(&self, writer: &dyn SqlWriter, out: &mut String, index: usize) -> usize {
        let mut index = index;
        match self {
            Condition::Compare { column, op, .. } => {
                writer.write_identifier_quoted(out, column);
                out.push(' ');
                out.push_str(op.as_sql());
                out.push(' ');
                writer.write_placeholder(out, index);
                index += 1;
            }
            Condition::IsNull(column) => {
                writer.write_identifier_quoted(out, column);
                out.push_str(" IS NULL");
            }
            Condition::IsNotNull(column) => {
                writer.write_identifier_quoted(out, column);
                out.push_str(" IS NOT NULL");
            }
            Condition::In { column, values } => {
                if values.is_empty() {
                    out.push_str("FALSE");
                } else {
                    writer.write_identifier_quoted(out, column);
                    out.push_str(" IN (");
                    separated_by(
                        out,
                        values,
                        |out, _| {
                            writer.write_placeholder(out, index);
                            index += 1;
                        },
                        ", ",
                    );
                    out.push(')');
                }
            }
            Condition::And(conditions) | Condition::Or(conditions) => {
                let (separator, empty) = if matches!(self, Condition::And(..)) {
                    (" AND ", "TRUE")
                } else {
                    (" OR ", "FALSE")
                };
                if conditions.is_empty() {
                    out.push_str(empty);
                }
                separated_by(
                    out,
                    conditions,
                    |out, v| {
                        possibly_parenthesized!(
                            out,
                            v.is_compound() && conditions.len() > 1,
                            index = v.write_sql(writer, out, index)
                        );
                    },
                    separator,
                );
            }
            Condition::Not(condition) => {
                out.push_str("NOT (");
                index = condition.write_sql(writer, out, index);
                out.push(')');
            }
            Condition::Raw { sql, params } => {
                out.push_str(sql);
                index += params.len();
            }
        }
        index
    }

    /// Values bound by `write_sql`, in placeholder order.
    pub fn params(&self, out: &mut Vec<Value>) {
        match self {
            Condition::Compare { value, .. } => out.push(value.clone()),
            Condition::IsNull(..) | Condition::IsNotNull(..) => {}
            Condition::In { values, .. } => out.extend(values.iter().cloned()),
            Condition::And(conditions) | Condition::Or(conditions) => {
                conditions.iter().for_each(|v| v.params(out))
            }
            Condition::Not(condition) => condition.params(out),
            Condition::Raw { params, .. } => out.extend(params.iter().cloned()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    pub column: Cow<'static, str>,
    pub direction: Direction,
}

impl Order {
    pub fn asc(column: impl Into<Cow<'static, str>>) -> Self {
        Self {
            column: column.into(),
            direction: Direction::Asc,
        }
    }
    pub fn desc(column: impl Into<Cow<'static, str>>) -> Self {
        Self {
            column: column.into(),
            direction: Direction::Desc,
        }
    }
}

/// Selection criteria for the "by query" operations: an optional filter, an ordering and
/// an optional window.
///
/// Without `order_by` the storage decides the row order, so paging over a query with no
/// ordering is only deterministic when the storage happens to be.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    condition: Option<Condition>,
    order_by: Vec<Order>,
    limit: Option<u64>,
    offset: Option<u64>,
}

impl Query {
    pub fn new() -> Self {
        Default::default()
    }

    /// Query with a raw `WHERE` fragment. An empty fragment means no condition.
    pub fn raw(sql: impl Into<String>, params: Vec<Value>) -> Self {
        let sql = sql.into();
        if sql.trim().is_empty() {
            return Self::new();
        }
        Condition::raw(sql, params).into()
    }

    /// Adds a condition, combined with AND to any condition already present.
    pub fn filter(mut self, condition: Condition) -> Self {
        self.condition = Some(match self.condition.take() {
            Some(current) => current.and(condition),
            None => condition,
        });
        self
    }
    pub fn order_by(mut self, order: Order) -> Self {
        self.order_by.push(order);
        self
    }
    pub fn asc(self, column: impl Into<Cow<'static, str>>) -> Self {
        self.order_by(Order::asc(column))
    }
    pub fn desc(self, column: impl Into<Cow<'static, str>>) -> Self {
        self.order_by(Order::desc(column))
    }
    pub fn with_limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }
    pub fn with_offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Copy of this query restricted to the window of `page`. The receiver is untouched.
    pub fn paged(&self, page: &PageRequest) -> Self {
        Self {
            limit: Some(page.size()),
            offset: Some(page.offset()),
            ..self.clone()
        }
    }

    pub fn condition(&self) -> Option<&Condition> {
        self.condition.as_ref()
    }
    pub fn orders(&self) -> &[Order] {
        &self.order_by
    }
    pub fn limit(&self) -> Option<u64> {
        self.limit
    }
    pub fn offset(&self) -> Option<u64> {
        self.offset
    }
    pub fn is_conditional(&self) -> bool {
        self.condition.is_some()
    }

    /// Writes just the condition (no `WHERE` keyword) and returns the next placeholder index.
    pub fn write_condition(&self, writer: &dyn SqlWriter, out: &mut String, index: usize) -> usize {
        match &self.condition {
            Some(condition) => condition.write_sql(writer, out, index),
            None => index,
        }
    }

    /// Parameters of the condition alone.
    pub fn condition_params(&self) -> Vec<Value> {
        let mut params = Vec::new();
        if let Some(condition) = &self.condition {
            condition.params(&mut params);
        }
        params
    }

    /// Every parameter the query binds: condition values, then limit, then offset.
    pub fn params(&self) -> Vec<Value> {
        let mut params = self.condition_params();
        if let Some(limit) = self.limit {
            params.push(Value::UInt64(Some(limit)));
        }
        if let Some(offset) = self.offset {
            params.push(Value::UInt64(Some(offset)));
        }
        params
    }
}

impl From<Condition> for Query {
    fn from(value: Condition) -> Self {
        Query::new().filter(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::GenericSqlWriter;

    #[test]
    fn nested_conditions_are_parenthesized() {
        let condition = Condition::equal("name", "a")
            .or(Condition::equal("name", "b"))
            .and(Condition::greater("price", 10_i64));
        let mut out = String::new();
        let next = condition.write_sql(&GenericSqlWriter::default(), &mut out, 0);
        assert_eq!(out, "(`name` = ? OR `name` = ?) AND `price` > ?");
        assert_eq!(next, 3);
        let mut params = Vec::new();
        condition.params(&mut params);
        assert_eq!(
            params,
            vec![
                Value::Varchar(Some("a".into())),
                Value::Varchar(Some("b".into())),
                Value::Int64(Some(10)),
            ]
        );
    }

    #[test]
    fn in_list_and_empty_in() {
        let writer = GenericSqlWriter::default();
        let mut out = String::new();
        Condition::is_in("id", [1_i64, 2, 3]).write_sql(&writer, &mut out, 0);
        assert_eq!(out, "`id` IN (?, ?, ?)");
        let mut out = String::new();
        Condition::is_in("id", Vec::<i64>::new()).write_sql(&writer, &mut out, 0);
        assert_eq!(out, "FALSE");
    }

    #[test]
    fn paged_copy_leaves_original() {
        let query = Query::from(Condition::is_not_null("name")).asc("name");
        let page = PageRequest::of(2, 10).unwrap();
        let paged = query.paged(&page);
        assert_eq!(query.limit(), None);
        assert_eq!(paged.limit(), Some(10));
        assert_eq!(paged.offset(), Some(20));
        assert_eq!(
            paged.params(),
            vec![Value::UInt64(Some(10)), Value::UInt64(Some(20))]
        );
        assert_eq!(Query::raw("  ", vec![]), Query::new());
    }
}
