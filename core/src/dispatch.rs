//! Completion strategies installed on the controller's notification slot.
//!
//! # Design
//! The controller owns exactly one `Option<Dispatcher<T>>`. Each binder
//! (`on_change`, `on_ready`, `on_outcome`, `future`) builds one variant and
//! replaces whatever was installed before. Every variant classifies through
//! the same `is_completed` / `is_success_response` queries on the controller.

use tokio::sync::oneshot;

use crate::error::Error;
use crate::request::RequestController;
use crate::transport::Transport;

/// A caller-supplied callback. Receives the controller that fired it.
pub type Handler<T> = Box<dyn FnMut(&mut RequestController<T>)>;

/// What a `Completion` settles with: the final status on success, or the
/// failure classification.
pub(crate) type Settlement = Result<u16, Error>;

/// Success / error / finally handlers for `RequestController::on_outcome`.
///
/// ```ignore
/// ctl.on_outcome(
///     Outcome::new()
///         .success(|x| println!("{:?}", x.response_text()))
///         .error(|x| eprintln!("{}", x.error_message())),
/// );
/// ```
pub struct Outcome<T> {
    pub(crate) success: Option<Handler<T>>,
    pub(crate) error: Option<Handler<T>>,
    pub(crate) finally: Option<Handler<T>>,
}

impl<T> Outcome<T> {
    pub fn new() -> Self {
        Self {
            success: None,
            error: None,
            finally: None,
        }
    }

    /// Called on completion when the response is a success response.
    pub fn success<F>(mut self, handler: F) -> Self
    where
        F: FnMut(&mut RequestController<T>) + 'static,
    {
        self.success = Some(Box::new(handler));
        self
    }

    /// Called on completion otherwise.
    pub fn error<F>(mut self, handler: F) -> Self
    where
        F: FnMut(&mut RequestController<T>) + 'static,
    {
        self.error = Some(Box::new(handler));
        self
    }

    /// Called on completion after `success` or `error`.
    pub fn finally<F>(mut self, handler: F) -> Self
    where
        F: FnMut(&mut RequestController<T>) + 'static,
    {
        self.finally = Some(Box::new(handler));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.success.is_none() && self.error.is_none() && self.finally.is_none()
    }
}

impl<T> Default for Outcome<T> {
    fn default() -> Self {
        Self::new()
    }
}

pub(crate) enum Dispatcher<T> {
    Change(Handler<T>),
    Ready(Handler<T>),
    Outcome(Outcome<T>),
    Deferred(Option<oneshot::Sender<Settlement>>),
}

impl<T> Dispatcher<T> {
    pub(crate) fn kind(&self) -> &'static str {
        match self {
            Dispatcher::Change(_) => "change",
            Dispatcher::Ready(_) => "ready",
            Dispatcher::Outcome(_) => "outcome",
            Dispatcher::Deferred(_) => "deferred",
        }
    }
}

impl<T: Transport> Dispatcher<T> {
    pub(crate) fn dispatch(&mut self, ctl: &mut RequestController<T>) {
        match self {
            Dispatcher::Change(handler) => handler(ctl),
            Dispatcher::Ready(handler) => {
                if ctl.is_completed() {
                    handler(ctl);
                }
            }
            Dispatcher::Outcome(outcome) => {
                if !ctl.is_completed() {
                    return;
                }
                let branch = if ctl.is_success_response() {
                    outcome.success.as_mut()
                } else {
                    outcome.error.as_mut()
                };
                if let Some(handler) = branch {
                    handler(ctl);
                }
                if let Some(handler) = outcome.finally.as_mut() {
                    handler(ctl);
                }
            }
            Dispatcher::Deferred(sender) => {
                if !ctl.is_completed() {
                    return;
                }
                let Some(sender) = sender.take() else {
                    return;
                };
                let settlement = if ctl.is_success_response() {
                    Ok(ctl.status())
                } else {
                    Err(Error::Failed {
                        state: ctl.error_state(),
                        status: ctl.status(),
                    })
                };
                // The receiver may already be gone; nobody is waiting then.
                let _ = sender.send(settlement);
            }
        }
    }
}
