/// Instrumentation hook receiving the text of each statement just before it
/// is handed to the driver.
///
/// Delivery is best-effort from a spawned task; it never delays the execute
/// call, and its ordering relative to the actual driver call is not
/// guaranteed.
pub trait StatementObserver: Send + Sync {
    fn statement_will_execute(&self, sql: &str);
}
