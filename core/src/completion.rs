//! The awaitable side of `RequestController::future`.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::sync::oneshot;

use crate::dispatch::Settlement;
use crate::error::Error;

/// Settles once when the request started by `RequestController::future`
/// completes.
///
/// Resolves to the final status when the response is a success response and
/// to `Error::Failed` otherwise. If the controller's strategy is replaced
/// (or the controller dropped) before completion, resolves to
/// `Error::Superseded`.
///
/// The controller stays with the caller, so the response is read from it
/// after the await.
#[derive(Debug)]
pub struct Completion {
    receiver: oneshot::Receiver<Settlement>,
}

impl Completion {
    pub(crate) fn new(receiver: oneshot::Receiver<Settlement>) -> Self {
        Self { receiver }
    }

    /// Non-blocking check. `None` while the request is still running.
    pub fn try_settle(&mut self) -> Option<Result<u16, Error>> {
        match self.receiver.try_recv() {
            Ok(settlement) => Some(settlement),
            Err(oneshot::error::TryRecvError::Empty) => None,
            Err(oneshot::error::TryRecvError::Closed) => Some(Err(Error::Superseded)),
        }
    }
}

impl Future for Completion {
    type Output = Result<u16, Error>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.receiver)
            .poll(cx)
            .map(|received| received.unwrap_or(Err(Error::Superseded)))
    }
}
