use crate::error::QueryError;
use crate::types::ParamValue;

/// An ordered sequence of literal SQL fragments interleaved with positional
/// parameter slots.
///
/// Rendering produces a single SQL string with placeholders substituted for
/// parameter positions; `params` yields the value list in matching order.
///
/// # Example
/// ```ignore
/// let query = QueryComponents::new("SELECT id FROM users WHERE name = ")
///     .param("John")
///     .sql(" AND active = ")
///     .param(true);
/// assert_eq!(
///     query.render(|n| format!("${n}")),
///     "SELECT id FROM users WHERE name = $1 AND active = $2",
/// );
/// ```
#[derive(Debug, Clone, Default)]
pub struct QueryComponents {
    parts: Vec<QueryPart>,
}

#[derive(Debug, Clone)]
enum QueryPart {
    Sql(String),
    Param(ParamValue),
}

impl QueryComponents {
    /// Start from a literal SQL fragment.
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            parts: vec![QueryPart::Sql(sql.into())],
        }
    }

    /// Append a literal SQL fragment.
    pub fn sql(mut self, fragment: impl Into<String>) -> Self {
        self.parts.push(QueryPart::Sql(fragment.into()));
        self
    }

    /// Append a positional parameter slot.
    pub fn param(mut self, value: impl Into<ParamValue>) -> Self {
        self.parts.push(QueryPart::Param(value.into()));
        self
    }

    /// Build from a `?`-marker template and an ordered value list. Fails
    /// when the marker and value counts disagree.
    pub fn parameterized(
        template: &str,
        params: Vec<ParamValue>,
    ) -> Result<Self, QueryError> {
        let fragments: Vec<&str> = template.split('?').collect();
        let placeholders = fragments.len() - 1;
        if placeholders != params.len() {
            return Err(QueryError::PlaceholderMismatch {
                placeholders,
                values: params.len(),
            });
        }

        let mut parts = Vec::with_capacity(fragments.len() + params.len());
        let mut values = params.into_iter();
        for (i, fragment) in fragments.iter().enumerate() {
            if i > 0 {
                if let Some(value) = values.next() {
                    parts.push(QueryPart::Param(value));
                }
            }
            if !fragment.is_empty() {
                parts.push(QueryPart::Sql((*fragment).to_string()));
            }
        }
        Ok(Self { parts })
    }

    /// Render the SQL text, calling `naming` with the one-indexed position
    /// of each parameter slot to produce its placeholder.
    pub fn render<F>(&self, mut naming: F) -> String
    where
        F: FnMut(usize) -> String,
    {
        let mut sql = String::with_capacity(256);
        let mut position = 0;
        for part in &self.parts {
            match part {
                QueryPart::Sql(text) => sql.push_str(text),
                QueryPart::Param(_) => {
                    position += 1;
                    sql.push_str(&naming(position));
                }
            }
        }
        sql
    }

    /// The ordered parameter values, matching render order.
    pub fn params(&self) -> Vec<ParamValue> {
        self.parts
            .iter()
            .filter_map(|part| match part {
                QueryPart::Param(value) => Some(value.clone()),
                QueryPart::Sql(_) => None,
            })
            .collect()
    }

    pub fn param_count(&self) -> usize {
        self.parts
            .iter()
            .filter(|part| matches!(part, QueryPart::Param(_)))
            .count()
    }

    pub fn is_parameterless(&self) -> bool {
        self.param_count() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_literal_text_renders_unchanged() {
        let query = QueryComponents::new("SELECT 1");
        assert_eq!(query.render(|n| format!("${n}")), "SELECT 1");
        assert!(query.is_parameterless());
    }

    #[test]
    fn test_placeholders_are_one_indexed_in_order() {
        let query = QueryComponents::new("INSERT INTO t VALUES (")
            .param("a")
            .sql(", ")
            .param(2i32)
            .sql(")");
        assert_eq!(
            query.render(|n| format!("${n}")),
            "INSERT INTO t VALUES ($1, $2)"
        );
        assert_eq!(
            query.params(),
            vec![
                ParamValue::Text("a".to_string()),
                ParamValue::Text("2".to_string()),
            ]
        );
    }

    #[test]
    fn test_naming_strategy_is_pluggable() {
        let query = QueryComponents::new("a = ").param(1i32).sql(" OR b = ").param(2i32);
        assert_eq!(query.render(|n| format!(":p{n}")), "a = :p1 OR b = :p2");
    }

    #[test]
    fn test_parameterized_template() {
        let query = QueryComponents::parameterized(
            "SELECT * FROM t WHERE a = ? AND b = ?",
            vec![ParamValue::Text("x".to_string()), ParamValue::Null],
        )
        .unwrap();
        assert_eq!(
            query.render(|n| format!("${n}")),
            "SELECT * FROM t WHERE a = $1 AND b = $2"
        );
        assert_eq!(query.param_count(), 2);
    }

    #[test]
    fn test_parameterized_mismatch() {
        let err = QueryComponents::parameterized(
            "SELECT * FROM t WHERE a = ?",
            vec![ParamValue::Null, ParamValue::Null],
        )
        .unwrap_err();
        match err {
            QueryError::PlaceholderMismatch {
                placeholders,
                values,
            } => {
                assert_eq!(placeholders, 1);
                assert_eq!(values, 2);
            }
        }
    }

    #[test]
    fn test_null_param_is_not_the_text_null() {
        let query = QueryComponents::new("UPDATE t SET a = ").param(Option::<&str>::None);
        assert_eq!(query.params(), vec![ParamValue::Null]);
    }
}
