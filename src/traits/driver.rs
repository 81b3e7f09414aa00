use async_trait::async_trait;

use crate::error::ConnectionError;
use crate::info::ConnectionInfo;
use crate::types::{ExecStatus, ParamValue, SessionStatus};

/// Trait for establishing database sessions.
/// Connectors are responsible for:
/// - Mapping ConnectionInfo fields to their native connect parameters
/// - Performing the login handshake
/// - Handing back a live session as a trait object
#[async_trait]
pub trait SessionConnector: Send + Sync {
    /// Open one session against the server described by `info`.
    async fn connect(&self, info: &ConnectionInfo)
        -> std::result::Result<Box<dyn SessionDriver>, ConnectionError>;
}

/// One live session with the database server.
///
/// The session is a strictly request/response conversation: each exec call
/// awaits the full round trip. Dropping the session releases the underlying
/// connection.
#[async_trait]
pub trait SessionDriver: Send + Sync {
    /// Current connection status, read through to the driver. Never cached.
    fn status(&self) -> SessionStatus;

    /// Execute a statement with no parameters via the simple query path.
    /// The SQL text is transmitted unchanged.
    async fn exec(
        &self,
        sql: &str,
    ) -> std::result::Result<Box<dyn ResponseHandle>, ConnectionError>;

    /// Execute a statement carrying `$1`-style placeholders with the given
    /// ordered parameter values. `ParamValue::Null` entries must be bound
    /// as SQL NULL.
    async fn exec_params(
        &self,
        sql: &str,
        params: &[ParamValue],
    ) -> std::result::Result<Box<dyn ResponseHandle>, ConnectionError>;
}

impl std::fmt::Debug for dyn SessionDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionDriver").finish_non_exhaustive()
    }
}

/// One completed server response.
///
/// Implementations own whatever native resources back the response; release
/// happens on drop.
pub trait ResponseHandle: Send + Sync {
    /// Execution status reported by the server.
    fn status(&self) -> ExecStatus;

    /// Server error message, when the response carries one.
    fn error_message(&self) -> Option<String>;

    /// Number of rows in the response.
    fn row_count(&self) -> usize;

    /// Number of fields per row.
    fn field_count(&self) -> usize;

    /// Name of the field at `index`, or `None` when the driver cannot
    /// decode it.
    fn field_name(&self, index: usize) -> Option<String>;

    /// Whether the server reported the cell as NULL.
    fn is_null(&self, row: usize, column: usize) -> bool;

    /// Cell payload bytes; `None` for NULL cells and out-of-range positions.
    fn value(&self, row: usize, column: usize) -> Option<Vec<u8>>;

    /// The driver's rows-affected string for a mutating command, empty when
    /// not applicable.
    fn tuples_affected(&self) -> String;
}
