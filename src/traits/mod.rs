mod driver;
mod observer;

pub use driver::{ResponseHandle, SessionConnector, SessionDriver};
pub use observer::StatementObserver;
