use crate::core::value::json_to_sql;
use crate::query::pattern::LIKE_ESCAPE;
use crate::storage::schema::{JSON_COLUMN, extract, sql_escape_string};
use rusqlite::types::Value as SqlValue;
use serde_json::Value as JsonValue;

/// Comparison applied by a predicate clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    In,
    NotIn,
    IsNull,
    IsNotNull,
    Like,
    Eq,
    NotEq,
    Gt,
    Gte,
    Lt,
    Lte,
}

impl Operator {
    pub fn as_sql(&self) -> &'static str {
        match self {
            Operator::In => "IN",
            Operator::NotIn => "NOT IN",
            Operator::IsNull => "IS NULL",
            Operator::IsNotNull => "IS NOT NULL",
            Operator::Like => "LIKE",
            Operator::Eq => "=",
            Operator::NotEq => "!=",
            Operator::Gt => ">",
            Operator::Gte => ">=",
            Operator::Lt => "<",
            Operator::Lte => "<=",
        }
    }
}

/// Function wrapped around the extracted value before comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Transform {
    #[default]
    Identity,
    /// `lower(...)`, for case-insensitive text predicates
    Lower,
    /// `json_quote(...)`, canonical JSON text of the stored value
    Json,
    /// `json_array_length(...)`, for list size predicates; 0 for a stored
    /// value that is not a list
    ArrayLength,
}

impl Transform {
    /// Expression compared for `key_path` under this transform.
    pub fn target(&self, key_path: &str) -> String {
        match self {
            Transform::Identity => extract(key_path),
            Transform::Lower => format!("lower({})", extract(key_path)),
            Transform::Json => format!("json_quote({})", extract(key_path)),
            Transform::ArrayLength => format!(
                "json_array_length({}, '$.{}')",
                JSON_COLUMN,
                sql_escape_string(key_path)
            ),
        }
    }
}

/// Right-hand side of a clause; its shape decides the bind arity.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    None,
    Scalar(JsonValue),
    List(Vec<JsonValue>),
}

impl Operand {
    fn placeholders(&self) -> Option<String> {
        match self {
            Operand::None => None,
            Operand::Scalar(_) => Some("?".to_string()),
            Operand::List(values) => Some(format!("({})", vec!["?"; values.len()].join(", "))),
        }
    }

    fn binds(&self) -> Vec<SqlValue> {
        match self {
            Operand::None => Vec::new(),
            Operand::Scalar(value) => vec![json_to_sql(value)],
            Operand::List(values) => values.iter().map(json_to_sql).collect(),
        }
    }
}

/// One predicate over a document key path.
#[derive(Debug, Clone, PartialEq)]
pub struct Clause {
    pub key_path: String,
    pub operator: Operator,
    pub operand: Operand,
    pub transform: Transform,
}

impl Clause {
    pub fn new(key_path: &str, operator: Operator, operand: Operand) -> Self {
        Self {
            key_path: key_path.to_string(),
            operator,
            operand,
            transform: Transform::Identity,
        }
    }

    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }

    /// SQL text of the clause and its bind values, in placeholder order.
    pub fn render(&self) -> (String, Vec<SqlValue>) {
        let target = self.transform.target(&self.key_path);
        let mut sql = match self.operand.placeholders() {
            Some(placeholders) => format!("{} {} {}", target, self.operator.as_sql(), placeholders),
            None => format!("{} {}", target, self.operator.as_sql()),
        };
        if self.operator == Operator::Like {
            sql.push_str(&format!(" ESCAPE '{}'", LIKE_ESCAPE));
        }
        (sql, self.operand.binds())
    }
}
