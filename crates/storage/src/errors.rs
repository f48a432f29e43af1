use panic_dashboard_domain::storage::StoreError;
use redis::{ErrorKind, RedisError};

/// Server codes that mean the connection is not authenticated.
const AUTH_CODES: [&str; 2] = ["NOAUTH", "WRONGPASS"];

/// Sorts a redis failure into the categories callers report separately.
pub(crate) fn classify(err: RedisError) -> StoreError {
    let message = err.to_string();
    if err.kind() == ErrorKind::AuthenticationFailed
        || err.code().is_some_and(|code| AUTH_CODES.contains(&code))
    {
        StoreError::Auth(message)
    } else if err.is_connection_refusal()
        || err.is_io_error()
        || err.is_timeout()
        || err.is_connection_dropped()
    {
        StoreError::Connection(message)
    } else {
        StoreError::Other(message)
    }
}
