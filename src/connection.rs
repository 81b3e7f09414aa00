use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use tracing::debug;

use crate::drivers::TokioPostgresConnector;
use crate::error::{ConnectionError, Result};
use crate::info::ConnectionInfo;
use crate::query::QueryComponents;
use crate::traits::{SessionConnector, SessionDriver, StatementObserver};
use crate::types::{QueryResult, SessionStatus};

/// Alias under which `execute_insert_query` reads back the generated key.
const RETURNED_PK: &str = "returned__pk";

/// One session with the database server.
///
/// Construction does no I/O; `open` performs the connect and `close` (or
/// drop) releases the session. Each `execute` awaits the full round trip —
/// the underlying conversation is strictly request/response, so callers
/// serialize their own logical conversations.
pub struct Connection {
    info: ConnectionInfo,
    connector: Arc<dyn SessionConnector>,
    session: Option<Box<dyn SessionDriver>>,
    observer: Option<Arc<dyn StatementObserver>>,
}

impl Connection {
    /// Pure value construction against the bundled tokio-postgres driver.
    pub fn new(info: ConnectionInfo) -> Self {
        Self::with_connector(info, Arc::new(TokioPostgresConnector))
    }

    /// Construct against a custom session connector.
    /// Useful for testing or alternative database drivers.
    pub fn with_connector(info: ConnectionInfo, connector: Arc<dyn SessionConnector>) -> Self {
        Self {
            info,
            connector,
            session: None,
            observer: None,
        }
    }

    /// Install an instrumentation observer. Each rendered statement is
    /// published to it, fire-and-forget, just before execution.
    pub fn set_observer(&mut self, observer: Arc<dyn StatementObserver>) {
        self.observer = Some(observer);
    }

    pub fn info(&self) -> &ConnectionInfo {
        &self.info
    }

    pub fn is_open(&self) -> bool {
        self.session.is_some()
    }

    /// Connect to the server. On failure the connection stays closed and
    /// the driver's error string is surfaced. Re-opening an open
    /// connection replaces the prior session, which is dropped cleanly.
    pub async fn open(&mut self) -> std::result::Result<(), ConnectionError> {
        let session = self.connector.connect(&self.info).await?;
        if self.session.replace(session).is_some() {
            debug!(target: "pgbridge::connection", info = %self.info, "reopened; prior session dropped");
        } else {
            debug!(target: "pgbridge::connection", info = %self.info, "opened");
        }
        Ok(())
    }

    /// Release the session. Safe to call when already closed; dropping the
    /// connection closes it as well.
    pub fn close(&mut self) {
        if self.session.take().is_some() {
            debug!(target: "pgbridge::connection", info = %self.info, "closed");
        }
    }

    /// Current connection status, read through to the driver at the moment
    /// of access. `Bad` when the connection is closed.
    pub fn internal_status(&self) -> SessionStatus {
        self.session
            .as_ref()
            .map(|s| s.status())
            .unwrap_or(SessionStatus::Bad)
    }

    /// Execute a structured query.
    ///
    /// Parameterless queries are issued as their literal text through the
    /// simple query path; otherwise the text is rendered with one-indexed
    /// `$n` placeholders and the ordered parameter values travel alongside,
    /// with `Null` values bound as true SQL NULLs.
    pub async fn execute(&self, query: &QueryComponents) -> Result<QueryResult> {
        let session = self.session.as_ref().ok_or(ConnectionError::NotOpen)?;
        let params = query.params();
        let handle = if params.is_empty() {
            let sql = query.render(|_| String::new());
            self.publish(&sql);
            debug!(target: "pgbridge::connection", %sql, "executing");
            session.exec(&sql).await?
        } else {
            let sql = query.render(|n| format!("${n}"));
            self.publish(&sql);
            debug!(target: "pgbridge::connection", %sql, params = params.len(), "executing");
            session.exec_params(&sql, &params).await?
        };
        Ok(QueryResult::new(handle)?)
    }

    /// Execute an insert statement and read back the generated key for
    /// `pk_field` via an appended `RETURNING` clause.
    pub async fn execute_insert_query<T>(
        &self,
        query: &QueryComponents,
        pk_field: &str,
    ) -> Result<T>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        ensure_identifier(pk_field)?;
        let query = query
            .clone()
            .sql(format!(" RETURNING {pk_field} AS {RETURNED_PK}"));
        let result = self.execute(&query).await?;
        let row = result.row(0).ok_or(ConnectionError::NoRowReturned)?;
        let cell = row
            .get(RETURNED_PK)
            .ok_or(ConnectionError::NoRowReturned)?
            .ok_or_else(|| ConnectionError::PkConversion("returned key is null".to_string()))?;
        let text = std::str::from_utf8(cell)
            .map_err(|e| ConnectionError::PkConversion(e.to_string()))?;
        text.parse::<T>()
            .map_err(|e| ConnectionError::PkConversion(e.to_string()).into())
    }

    /// Issue a `SAVEPOINT` statement.
    pub async fn create_savepoint(&self, name: &str) -> Result<()> {
        self.savepoint_statement("SAVEPOINT", name).await
    }

    /// Issue a `ROLLBACK TO SAVEPOINT` statement.
    pub async fn rollback_to_savepoint(&self, name: &str) -> Result<()> {
        self.savepoint_statement("ROLLBACK TO SAVEPOINT", name).await
    }

    /// Issue a `RELEASE SAVEPOINT` statement.
    pub async fn release_savepoint(&self, name: &str) -> Result<()> {
        self.savepoint_statement("RELEASE SAVEPOINT", name).await
    }

    async fn savepoint_statement(&self, verb: &str, name: &str) -> Result<()> {
        ensure_identifier(name)?;
        let query = QueryComponents::new(format!("{verb} {name}"));
        self.execute(&query).await.map(drop)
    }

    fn publish(&self, sql: &str) {
        if let Some(observer) = &self.observer {
            let observer = Arc::clone(observer);
            let sql = sql.to_string();
            tokio::spawn(async move {
                observer.statement_will_execute(&sql);
            });
        }
    }
}

/// Savepoint and RETURNING-field names are interpolated into SQL text, so
/// they must stay within identifier-safe characters: a leading letter or
/// underscore, then letters, digits, underscores, or `$`.
fn ensure_identifier(name: &str) -> std::result::Result<(), ConnectionError> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(first) => {
            (first.is_ascii_alphabetic() || first == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
        }
        None => false,
    };
    if valid {
        Ok(())
    } else {
        Err(ConnectionError::UnsafeIdentifier(name.to_string()))
    }
}
