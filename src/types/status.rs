/// Connection-level status, projected straight from the driver.
///
/// The driver owns all transitions; this layer never advances the state
/// itself. The bundled tokio-postgres driver reports `Ok` or `Bad` only,
/// since its handshake runs internally; other drivers may surface the
/// intermediate states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Ok,
    Bad,
    Started,
    Made,
    AwaitingResponse,
    AuthOk,
    SettingEnvironment,
    SslStartup,
    Needed,
    Unknown,
}

/// Execution status of one completed server response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecStatus {
    EmptyQuery,
    CommandOk,
    TuplesOk,
    CopyOut,
    CopyIn,
    BadResponse,
    NonFatalError,
    FatalError,
    CopyBoth,
    SingleTuple,
    Unknown,
}

impl ExecStatus {
    /// True for every status except `BadResponse` and `FatalError`.
    pub fn successful(self) -> bool {
        !matches!(self, ExecStatus::BadResponse | ExecStatus::FatalError)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_successful_false_for_exactly_bad_response_and_fatal_error() {
        let all = [
            ExecStatus::EmptyQuery,
            ExecStatus::CommandOk,
            ExecStatus::TuplesOk,
            ExecStatus::CopyOut,
            ExecStatus::CopyIn,
            ExecStatus::BadResponse,
            ExecStatus::NonFatalError,
            ExecStatus::FatalError,
            ExecStatus::CopyBoth,
            ExecStatus::SingleTuple,
            ExecStatus::Unknown,
        ];
        for status in all {
            let expected = !matches!(status, ExecStatus::BadResponse | ExecStatus::FatalError);
            assert_eq!(status.successful(), expected, "{:?}", status);
        }
    }
}
