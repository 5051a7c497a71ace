//! Documents and the query vocabulary used against collections.

use serde_json::Value;

use aviary_core::error::AviaryError;

/// Body of a document: a JSON object keyed by field name.
pub type Fields = serde_json::Map<String, Value>;

/// A stored document together with its id.
#[derive(Clone, Debug, PartialEq)]
pub struct Document {
    pub id: String,
    pub fields: Fields,
}

impl Document {
    pub fn new(id: impl Into<String>, fields: Fields) -> Self {
        Self {
            id: id.into(),
            fields,
        }
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    pub fn str_field(&self, field: &str) -> Option<&str> {
        self.fields.get(field).and_then(Value::as_str)
    }

    pub fn i64_field(&self, field: &str) -> Option<i64> {
        self.fields.get(field).and_then(Value::as_i64)
    }

    pub fn f64_field(&self, field: &str) -> Option<f64> {
        self.fields.get(field).and_then(Value::as_f64)
    }
}

/// Sort direction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

impl Direction {
    pub(crate) fn as_sql(&self) -> &'static str {
        match self {
            Direction::Ascending => "ASC",
            Direction::Descending => "DESC",
        }
    }
}

/// Ordering on one document field. Ties are broken by document id in the
/// same direction so pagination cursors are stable.
#[derive(Clone, Debug, PartialEq)]
pub struct OrderBy {
    pub field: String,
    pub direction: Direction,
}

impl OrderBy {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: Direction::Ascending,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: Direction::Descending,
        }
    }
}

/// A field filter.
#[derive(Clone, Debug, PartialEq)]
pub enum Predicate {
    Eq(String, Value),
    Gte(String, Value),
    Lte(String, Value),
}

impl Predicate {
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Predicate::Eq(field.into(), value.into())
    }

    pub fn gte(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Predicate::Gte(field.into(), value.into())
    }

    pub fn lte(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Predicate::Lte(field.into(), value.into())
    }

    pub fn field(&self) -> &str {
        match self {
            Predicate::Eq(f, _) | Predicate::Gte(f, _) | Predicate::Lte(f, _) => f,
        }
    }

    pub fn value(&self) -> &Value {
        match self {
            Predicate::Eq(_, v) | Predicate::Gte(_, v) | Predicate::Lte(_, v) => v,
        }
    }

    pub(crate) fn operator(&self) -> &'static str {
        match self {
            Predicate::Eq(..) => "=",
            Predicate::Gte(..) => ">=",
            Predicate::Lte(..) => "<=",
        }
    }
}

/// A collection query: filters, ordering, page size and cursor.
///
/// Without an explicit ordering documents come back ordered by id.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Query {
    pub predicates: Vec<Predicate>,
    pub order_by: Option<OrderBy>,
    pub limit: Option<usize>,
    /// Resume strictly after this document in the query order.
    pub start_after: Option<Document>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.predicates.push(predicate);
        self
    }

    pub fn order_by(mut self, order: OrderBy) -> Self {
        self.order_by = Some(order);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn start_after(mut self, cursor: Document) -> Self {
        self.start_after = Some(cursor);
        self
    }

    /// Reject field names that cannot be embedded in a JSON path.
    pub(crate) fn validate(&self) -> Result<(), AviaryError> {
        for predicate in &self.predicates {
            validate_field(predicate.field())?;
        }
        if let Some(order) = &self.order_by {
            validate_field(&order.field)?;
        }
        Ok(())
    }
}

pub(crate) fn validate_field(name: &str) -> Result<(), AviaryError> {
    let valid = !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(())
    } else {
        Err(AviaryError::InvalidInput(format!(
            "invalid field name: {:?}",
            name
        )))
    }
}
