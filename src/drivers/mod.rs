mod tokio_postgres;

pub use self::in_memory_test::{
    InMemoryTestDriver, RecordedQuery, ScriptedResponse, ScriptedResponseBuilder,
};
pub use self::tokio_postgres::{TokioPostgresConnector, TokioPostgresSession};
