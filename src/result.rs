//! Outcome of a service call as seen by the UI layer.
use crate::client::ApiError;
use std::future::Future;
use tokio::sync::watch;

/// Every network-backed service returns one of these. The services themselves
/// only ever produce `Success` or `Error`; `Loading` is what a caller shows
/// while the call is still pending (see [`track`]).
#[derive(Debug, Clone, PartialEq)]
#[must_use]
pub enum NetworkResult<T> {
    Success(T),
    Error(String),
    Loading,
}

impl<T> NetworkResult<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, NetworkResult::Success(_))
    }

    pub fn is_error(&self) -> bool {
        matches!(self, NetworkResult::Error(_))
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, NetworkResult::Loading)
    }

    pub fn success(self) -> Option<T> {
        match self {
            NetworkResult::Success(v) => Some(v),
            _ => None,
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            NetworkResult::Error(msg) => Some(msg),
            _ => None,
        }
    }

    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> NetworkResult<U> {
        match self {
            NetworkResult::Success(v) => NetworkResult::Success(f(v)),
            NetworkResult::Error(msg) => NetworkResult::Error(msg),
            NetworkResult::Loading => NetworkResult::Loading,
        }
    }

    pub fn as_ref(&self) -> NetworkResult<&T> {
        match self {
            NetworkResult::Success(v) => NetworkResult::Success(v),
            NetworkResult::Error(msg) => NetworkResult::Error(msg.clone()),
            NetworkResult::Loading => NetworkResult::Loading,
        }
    }
}

impl<T> From<Result<T, ApiError>> for NetworkResult<T> {
    fn from(res: Result<T, ApiError>) -> Self {
        match res {
            Ok(v) => NetworkResult::Success(v),
            Err(e) => NetworkResult::Error(e.to_string()),
        }
    }
}

/// Run `call` on the runtime and expose its progress: the receiver starts at
/// `Loading` and is updated exactly once with the settled result.
pub fn track<T, F>(call: F) -> watch::Receiver<NetworkResult<T>>
where
    T: Send + Sync + 'static,
    F: Future<Output = NetworkResult<T>> + Send + 'static,
{
    let (tx, rx) = watch::channel(NetworkResult::Loading);
    tokio::spawn(async move {
        let outcome = call.await;
        tx.send_replace(outcome);
    });
    rx
}
