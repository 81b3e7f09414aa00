use async_trait::async_trait;
use futures_util::{pin_mut, TryStreamExt};
use tokio_postgres::types::{FromSql, ToSql, Type};
use tokio_postgres::{Client, Config, NoTls, SimpleQueryMessage};
use tracing::warn;

use crate::error::ConnectionError;
use crate::info::ConnectionInfo;
use crate::traits::{ResponseHandle, SessionConnector, SessionDriver};
use crate::types::{ExecStatus, ParamValue, SessionStatus};

/// PostgreSQL connector backed by tokio-postgres.
pub struct TokioPostgresConnector;

#[async_trait]
impl SessionConnector for TokioPostgresConnector {
    async fn connect(
        &self,
        info: &ConnectionInfo,
    ) -> Result<Box<dyn SessionDriver>, ConnectionError> {
        let mut config = Config::new();
        config
            .host(info.host_str())
            .port(info.port_number())
            .dbname(info.database());
        if let Some(user) = info.username_str() {
            config.user(user);
        }
        if let Some(password) = info.password_str() {
            config.password(password);
        }
        if let Some(options) = info.options_str() {
            config.options(options);
        }

        let (client, connection) = config
            .connect(NoTls)
            .await
            .map_err(|e| ConnectionError::ConnectFailed(e.to_string()))?;

        // Spawn the connection handler
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                warn!(target: "pgbridge::driver", error = %e, "connection task ended with error");
            }
        });

        Ok(Box::new(TokioPostgresSession { client }))
    }
}

/// One live tokio-postgres session. Dropping it closes the connection and
/// ends the spawned handler task.
pub struct TokioPostgresSession {
    client: Client,
}

#[async_trait]
impl SessionDriver for TokioPostgresSession {
    fn status(&self) -> SessionStatus {
        if self.client.is_closed() {
            SessionStatus::Bad
        } else {
            SessionStatus::Ok
        }
    }

    async fn exec(&self, sql: &str) -> Result<Box<dyn ResponseHandle>, ConnectionError> {
        match self.client.simple_query(sql).await {
            Ok(messages) => Ok(Box::new(SimpleResponse::from_messages(messages))),
            Err(e) => failed_response(e),
        }
    }

    async fn exec_params(
        &self,
        sql: &str,
        params: &[ParamValue],
    ) -> Result<Box<dyn ResponseHandle>, ConnectionError> {
        // Convert ParamValue params to tokio-postgres compatible types
        let converted: Vec<Box<dyn ToSql + Sync + Send>> =
            params.iter().map(param_to_tosql).collect();
        let param_refs = converted.iter().map(|b| b.as_ref() as &(dyn ToSql + Sync));

        let stream = match self.client.query_raw(sql, param_refs).await {
            Ok(stream) => stream,
            Err(e) => return failed_response(e),
        };
        pin_mut!(stream);

        let mut rows = Vec::new();
        loop {
            match stream.try_next().await {
                Ok(Some(row)) => rows.push(row),
                Ok(None) => break,
                Err(e) => return failed_response(e),
            }
        }
        let affected = stream.rows_affected();

        Ok(Box::new(RowResponse::new(rows, affected)))
    }
}

/// A statement the server rejected still produced a complete response; only
/// transport-level failures surface as connection errors.
fn failed_response(
    err: tokio_postgres::Error,
) -> Result<Box<dyn ResponseHandle>, ConnectionError> {
    match err.as_db_error() {
        Some(db) => Ok(Box::new(ErrorResponse {
            message: db.message().to_string(),
        })),
        None => Err(ConnectionError::Native(err.to_string())),
    }
}

/// Convert a ParamValue to a boxed ToSql trait object. `Null` binds as a
/// true SQL NULL.
fn param_to_tosql(value: &ParamValue) -> Box<dyn ToSql + Sync + Send> {
    match value {
        ParamValue::Null => Box::new(None::<String>),
        ParamValue::Text(s) => Box::new(s.clone()),
        ParamValue::Binary(b) => Box::new(b.clone()),
    }
}

/// Response from the simple query path: cells arrive as server text.
struct SimpleResponse {
    fields: Vec<String>,
    rows: Vec<Vec<Option<Vec<u8>>>>,
    affected: Option<u64>,
    empty: bool,
}

impl SimpleResponse {
    fn from_messages(messages: Vec<SimpleQueryMessage>) -> Self {
        let empty = messages.is_empty();
        let mut fields = Vec::new();
        let mut rows = Vec::new();
        let mut affected = None;
        for message in messages {
            match message {
                SimpleQueryMessage::RowDescription(columns) => {
                    fields = columns.iter().map(|c| c.name().to_string()).collect();
                }
                SimpleQueryMessage::Row(row) => {
                    if fields.is_empty() {
                        fields = row.columns().iter().map(|c| c.name().to_string()).collect();
                    }
                    rows.push(
                        (0..row.len())
                            .map(|i| row.get(i).map(|s| s.as_bytes().to_vec()))
                            .collect(),
                    );
                }
                SimpleQueryMessage::CommandComplete(n) => affected = Some(n),
                _ => {}
            }
        }
        Self {
            fields,
            rows,
            affected,
            empty,
        }
    }
}

impl ResponseHandle for SimpleResponse {
    fn status(&self) -> ExecStatus {
        if self.empty {
            ExecStatus::EmptyQuery
        } else if self.fields.is_empty() {
            ExecStatus::CommandOk
        } else {
            ExecStatus::TuplesOk
        }
    }

    fn error_message(&self) -> Option<String> {
        None
    }

    fn row_count(&self) -> usize {
        self.rows.len()
    }

    fn field_count(&self) -> usize {
        self.fields.len()
    }

    fn field_name(&self, index: usize) -> Option<String> {
        self.fields.get(index).cloned()
    }

    fn is_null(&self, row: usize, column: usize) -> bool {
        self.value(row, column).is_none()
    }

    fn value(&self, row: usize, column: usize) -> Option<Vec<u8>> {
        self.rows
            .get(row)
            .and_then(|r| r.get(column))
            .cloned()
            .flatten()
    }

    fn tuples_affected(&self) -> String {
        self.affected.map(|n| n.to_string()).unwrap_or_default()
    }
}

/// Response from the parameterized path: cells are normalized to their text
/// bytes where the type is recognized, raw bytes otherwise.
struct RowResponse {
    rows: Vec<tokio_postgres::Row>,
    fields: Vec<String>,
    affected: Option<u64>,
}

impl RowResponse {
    fn new(rows: Vec<tokio_postgres::Row>, affected: Option<u64>) -> Self {
        let fields = rows
            .first()
            .map(|row| row.columns().iter().map(|c| c.name().to_string()).collect())
            .unwrap_or_default();
        Self {
            rows,
            fields,
            affected,
        }
    }
}

impl ResponseHandle for RowResponse {
    fn status(&self) -> ExecStatus {
        if self.rows.is_empty() {
            ExecStatus::CommandOk
        } else {
            ExecStatus::TuplesOk
        }
    }

    fn error_message(&self) -> Option<String> {
        None
    }

    fn row_count(&self) -> usize {
        self.rows.len()
    }

    fn field_count(&self) -> usize {
        self.fields.len()
    }

    fn field_name(&self, index: usize) -> Option<String> {
        self.fields.get(index).cloned()
    }

    fn is_null(&self, row: usize, column: usize) -> bool {
        self.value(row, column).is_none()
    }

    fn value(&self, row: usize, column: usize) -> Option<Vec<u8>> {
        self.rows.get(row).and_then(|r| cell_bytes(r, column))
    }

    fn tuples_affected(&self) -> String {
        self.affected.map(|n| n.to_string()).unwrap_or_default()
    }
}

/// A failed statement as a complete response, so the status check surfaces
/// the server message.
struct ErrorResponse {
    message: String,
}

impl ResponseHandle for ErrorResponse {
    fn status(&self) -> ExecStatus {
        ExecStatus::FatalError
    }

    fn error_message(&self) -> Option<String> {
        Some(self.message.clone())
    }

    fn row_count(&self) -> usize {
        0
    }

    fn field_count(&self) -> usize {
        0
    }

    fn field_name(&self, _index: usize) -> Option<String> {
        None
    }

    fn is_null(&self, _row: usize, _column: usize) -> bool {
        true
    }

    fn value(&self, _row: usize, _column: usize) -> Option<Vec<u8>> {
        None
    }

    fn tuples_affected(&self) -> String {
        String::new()
    }
}

/// Convert a row cell at a given index to its text bytes.
fn cell_bytes(row: &tokio_postgres::Row, index: usize) -> Option<Vec<u8>> {
    // Try common types and render each to the server's text form

    if let Ok(v) = row.try_get::<_, Option<i32>>(index) {
        return v.map(|v| v.to_string().into_bytes());
    }

    if let Ok(v) = row.try_get::<_, Option<i64>>(index) {
        return v.map(|v| v.to_string().into_bytes());
    }

    if let Ok(v) = row.try_get::<_, Option<f64>>(index) {
        return v.map(|v| v.to_string().into_bytes());
    }

    if let Ok(v) = row.try_get::<_, Option<bool>>(index) {
        return v.map(|v| if v { b"t".to_vec() } else { b"f".to_vec() });
    }

    if let Ok(v) = row.try_get::<_, Option<String>>(index) {
        return v.map(String::into_bytes);
    }

    if let Ok(v) = row.try_get::<_, Option<Vec<u8>>>(index) {
        return v;
    }

    // Fallback: the wire bytes, whatever the type
    row.try_get::<_, Option<RawCell>>(index)
        .ok()
        .flatten()
        .map(|c| c.0)
}

/// Accepts any column type and keeps the undecoded payload.
struct RawCell(Vec<u8>);

impl<'a> FromSql<'a> for RawCell {
    fn from_sql(
        _ty: &Type,
        raw: &'a [u8],
    ) -> Result<Self, Box<dyn std::error::Error + Sync + Send>> {
        Ok(RawCell(raw.to_vec()))
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BytesMut;
    use tokio_postgres::types::IsNull;

    #[test]
    fn test_null_param_binds_as_sql_null() {
        let param = param_to_tosql(&ParamValue::Null);
        let mut buf = BytesMut::new();
        let result = param.to_sql_checked(&Type::TEXT, &mut buf).unwrap();
        assert!(matches!(result, IsNull::Yes));
        assert!(buf.is_empty());
    }

    #[test]
    fn test_text_param_binds_utf8_bytes() {
        let param = param_to_tosql(&ParamValue::Text("héllo".to_string()));
        let mut buf = BytesMut::new();
        let result = param.to_sql_checked(&Type::TEXT, &mut buf).unwrap();
        assert!(matches!(result, IsNull::No));
        assert_eq!(&buf[..], "héllo".as_bytes());
    }

    #[test]
    fn test_binary_param_binds_raw_bytes() {
        let param = param_to_tosql(&ParamValue::Binary(vec![0, 159, 146]));
        let mut buf = BytesMut::new();
        let result = param.to_sql_checked(&Type::BYTEA, &mut buf).unwrap();
        assert!(matches!(result, IsNull::No));
        assert_eq!(&buf[..], &[0, 159, 146]);
    }

    #[test]
    fn test_empty_simple_response_is_empty_query() {
        let response = SimpleResponse::from_messages(Vec::new());
        assert_eq!(response.status(), ExecStatus::EmptyQuery);
        assert_eq!(response.row_count(), 0);
    }
}
