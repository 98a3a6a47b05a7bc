use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex};

use may::coroutine;
use may::sync::mpsc;
use serde_json::Value;
use tracing::{debug, error};

use crate::controller::Controller;
use crate::errors::Error;
use crate::runtime_config::RuntimeConfig;
use crate::server::{Request, Response};

/// What an action handed back to the dispatcher.
pub enum ActionReturn {
    /// An immediate value. Rendering side effects have already been
    /// applied to the response.
    Value(Value),
    /// A value still being computed; its eventual resolution decides
    /// success or failure.
    Deferred(mpsc::Receiver<Result<Value, Error>>),
}

impl ActionReturn {
    /// An immediate return with nothing to say.
    #[must_use]
    pub fn none() -> Self {
        ActionReturn::Value(Value::Null)
    }

    #[must_use]
    pub fn value(value: impl Into<Value>) -> Self {
        ActionReturn::Value(value.into())
    }
}

impl std::fmt::Debug for ActionReturn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActionReturn::Value(v) => f.debug_tuple("Value").field(v).finish(),
            ActionReturn::Deferred(_) => f.write_str("Deferred(..)"),
        }
    }
}

/// The unified result of one action invocation: exactly one of success
/// with a result or failure with an error, however the action chose to
/// signal completion.
#[derive(Debug)]
pub enum Outcome {
    Success(Value),
    Failure(Error),
}

/// Continuation handle handed to an action, so callback-style code can
/// signal an error explicitly. An error signaled here wins over any
/// returned value; signaling repeatedly keeps the last error.
#[derive(Clone, Default)]
pub struct Continuation {
    slot: Arc<Mutex<Option<Error>>>,
}

impl Continuation {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Signal a failure.
    pub fn raise(&self, err: Error) {
        let mut slot = self.slot.lock().unwrap_or_else(|e| e.into_inner());
        *slot = Some(err);
    }

    /// Take the signaled error, if any.
    #[must_use]
    pub fn take(&self) -> Option<Error> {
        self.slot.lock().unwrap_or_else(|e| e.into_inner()).take()
    }
}

impl std::fmt::Debug for Continuation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Continuation")
    }
}

/// Run work on a coroutine and return a deferred handle to its result.
///
/// The dispatcher suspends cooperatively on the receiver, so other
/// requests interleave while the work runs. Stack size comes from
/// `SWYD_STACK_SIZE`.
pub fn defer<F>(work: F) -> ActionReturn
where
    F: FnOnce() -> Result<Value, Error> + Send + 'static,
{
    let (tx, rx) = mpsc::channel();
    let stack_size = RuntimeConfig::from_env().stack_size;

    // SAFETY: coroutine::Builder::spawn is unsafe by the may runtime's
    // contract, not this function's logic. The closure is Send + 'static
    // and reports exclusively through the owned channel sender.
    let spawned = unsafe {
        coroutine::Builder::new()
            .stack_size(stack_size)
            .spawn(move || {
                let result = work();
                if tx.send(result).is_err() {
                    debug!("deferred action finished after its request was abandoned");
                }
            })
    };

    if let Err(err) = spawned {
        // The receiver observes the dropped sender and resolves to failure.
        error!(error = %err, stack_size, "failed to spawn deferred action coroutine");
    }

    ActionReturn::Deferred(rx)
}

/// Invoke one action and reconcile every completion convention into a
/// single [`Outcome`].
///
/// A synchronous panic or `Err` lands in the same pending-error slot as a
/// continuation-signaled error; if that slot holds anything after the call
/// returns, the outcome is failure regardless of the returned value.
/// Otherwise a deferred return is awaited and decides the outcome.
pub(crate) fn invoke(
    controller: &dyn Controller,
    resource: &str,
    action: &str,
    req: &mut Request,
    res: &mut Response,
    next: &Continuation,
) -> Outcome {
    let called = panic::catch_unwind(AssertUnwindSafe(|| {
        controller.call(action, req, res, next)
    }));

    let mut pending: Option<Error> = None;
    let returned = match called {
        Ok(Some(Ok(ret))) => Some(ret),
        Ok(Some(Err(err))) => {
            pending = Some(err);
            None
        }
        Ok(None) => {
            // implements() said yes but call() disagreed.
            pending = Some(Error::not_implemented(format!(
                "expecting method for `{resource}.{action}`"
            )));
            None
        }
        Err(panic) => {
            pending = Some(Error::from_panic(panic));
            None
        }
    };

    if let Some(err) = next.take() {
        pending = Some(err);
    }

    match (pending, returned) {
        (Some(err), _) => Outcome::Failure(err),
        (None, Some(ret)) => resolve_return(ret),
        (None, None) => Outcome::Failure(Error::server(format!(
            "action `{resource}.{action}` produced no result"
        ))),
    }
}

/// Resolve a return into an outcome, suspending on deferred values.
pub(crate) fn resolve_return(ret: ActionReturn) -> Outcome {
    match ret {
        ActionReturn::Value(value) => Outcome::Success(value),
        ActionReturn::Deferred(rx) => match rx.recv() {
            Ok(Ok(value)) => Outcome::Success(value),
            Ok(Err(err)) => Outcome::Failure(err),
            Err(_) => Outcome::Failure(Error::server(
                "deferred action dropped its reply channel",
            )),
        },
    }
}
