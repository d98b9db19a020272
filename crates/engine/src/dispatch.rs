//! Delivery of outcomes to caller-supplied handlers.
//!
//! `dispatch` calls `Handler::handle` once. If the handler returns an error
//! or panics, the cause goes to `Handler::application_error` once. If that
//! fails too, the failure is logged and dropped. Nothing escapes to the
//! caller of `dispatch`.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc;

/// Error type handlers return.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// A defect in handler code, as opposed to a storage failure.
#[derive(Debug, thiserror::Error)]
pub enum HandlerFailure {
    #[error("handler returned an error: {0}")]
    Returned(#[source] BoxError),
    #[error("handler panicked: {0}")]
    Panicked(String),
}

/// Receiver of one operation's outcome.
pub trait Handler<O> {
    /// Consume the outcome. Storage failures arrive here as the outcome's
    /// `Failure` variant.
    fn handle(&mut self, outcome: O) -> Result<(), BoxError>;

    /// Called once when `handle` returned an error or panicked.
    fn application_error(&mut self, failure: HandlerFailure) -> Result<(), BoxError> {
        tracing::error!(error = %failure, "unreported handler failure");
        Ok(())
    }
}

impl<O, H: Handler<O> + ?Sized> Handler<O> for Box<H> {
    fn handle(&mut self, outcome: O) -> Result<(), BoxError> {
        (**self).handle(outcome)
    }

    fn application_error(&mut self, failure: HandlerFailure) -> Result<(), BoxError> {
        (**self).application_error(failure)
    }
}

/// Handler built from a closure, see [`from_fn`].
pub struct FnHandler<F>(F);

/// Use a closure as a handler. Handler failures fall back to the default
/// `application_error`, which logs them.
pub fn from_fn<O, F>(f: F) -> FnHandler<F>
where
    F: FnMut(O) -> Result<(), BoxError>,
{
    FnHandler(f)
}

impl<O, F> Handler<O> for FnHandler<F>
where
    F: FnMut(O) -> Result<(), BoxError>,
{
    fn handle(&mut self, outcome: O) -> Result<(), BoxError> {
        (self.0)(outcome)
    }
}

/// Handler that forwards the outcome over a channel.
pub struct Reply<O> {
    sender: mpsc::Sender<O>,
}

/// A handler plus the receiver its outcome will arrive on.
pub fn reply<O>() -> (Reply<O>, mpsc::Receiver<O>) {
    let (sender, receiver) = mpsc::channel();
    (Reply { sender }, receiver)
}

impl<O> Handler<O> for Reply<O> {
    fn handle(&mut self, outcome: O) -> Result<(), BoxError> {
        self.sender
            .send(outcome)
            .map_err(|_| "reply receiver dropped".into())
    }
}

/// Deliver `outcome` to `handler` with two-tier failure isolation.
pub fn dispatch<O, H>(outcome: O, handler: &mut H)
where
    H: Handler<O> + ?Sized,
{
    let Err(failure) = invoke(|| handler.handle(outcome)) else {
        return;
    };
    tracing::warn!(error = %failure, "handler failed; reporting as application error");
    if let Err(second) = invoke(|| handler.application_error(failure)) {
        tracing::error!(error = %second, "application_error failed; dropping");
    }
}

fn invoke(f: impl FnOnce() -> Result<(), BoxError>) -> Result<(), HandlerFailure> {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(())) => Ok(()),
        Ok(Err(err)) => Err(HandlerFailure::Returned(err)),
        Err(payload) => Err(HandlerFailure::Panicked(panic_message(payload.as_ref()))),
    }
}

/// Best-effort text of a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Records every call; `fail_handle` / `fail_app` choose how it misbehaves.
    #[derive(Default)]
    struct Recorder {
        handled: Vec<u32>,
        app_errors: Vec<String>,
        fail_handle: Option<&'static str>,
        fail_app: Option<&'static str>,
    }

    impl Handler<u32> for Recorder {
        fn handle(&mut self, outcome: u32) -> Result<(), BoxError> {
            self.handled.push(outcome);
            match self.fail_handle {
                Some("error") => Err("boom".into()),
                Some("panic") => panic!("handler exploded"),
                _ => Ok(()),
            }
        }

        fn application_error(&mut self, failure: HandlerFailure) -> Result<(), BoxError> {
            self.app_errors.push(failure.to_string());
            match self.fail_app {
                Some("error") => Err("again".into()),
                Some("panic") => panic!("application_error exploded"),
                _ => Ok(()),
            }
        }
    }

    #[test]
    fn success_skips_application_error() {
        let mut handler = Recorder::default();
        dispatch(7, &mut handler);
        assert_eq!(handler.handled, vec![7]);
        assert!(handler.app_errors.is_empty());
    }

    #[test]
    fn returned_error_goes_to_application_error_once() {
        let mut handler = Recorder {
            fail_handle: Some("error"),
            ..Recorder::default()
        };
        dispatch(1, &mut handler);
        assert_eq!(handler.handled, vec![1]);
        assert_eq!(handler.app_errors, vec!["handler returned an error: boom"]);
    }

    #[test]
    fn panic_goes_to_application_error_once() {
        let mut handler = Recorder {
            fail_handle: Some("panic"),
            ..Recorder::default()
        };
        dispatch(2, &mut handler);
        assert_eq!(handler.handled, vec![2]);
        assert_eq!(handler.app_errors, vec!["handler panicked: handler exploded"]);
    }

    #[test]
    fn failing_application_error_is_contained() {
        for mode in ["error", "panic"] {
            let mut handler = Recorder {
                fail_handle: Some("error"),
                fail_app: Some(mode),
                ..Recorder::default()
            };
            dispatch(3, &mut handler);
            assert_eq!(handler.handled, vec![3]);
            assert_eq!(handler.app_errors.len(), 1);
        }
    }

    #[test]
    fn closure_handler_receives_outcome() {
        let mut seen = Vec::new();
        dispatch(
            5,
            &mut from_fn(|n: u32| {
                seen.push(n);
                Ok(())
            }),
        );
        assert_eq!(seen, vec![5]);
    }

    #[test]
    fn reply_forwards_outcome() {
        let (mut handler, receiver) = reply();
        dispatch(9u32, &mut handler);
        assert_eq!(receiver.recv().unwrap(), 9);
    }

    #[test]
    fn reply_with_dropped_receiver_does_not_panic() {
        let (mut handler, receiver) = reply::<u32>();
        drop(receiver);
        dispatch(9, &mut handler);
    }
}
