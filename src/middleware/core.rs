use crate::errors::Error;
use crate::server::{Request, Response};

/// What a pipeline stage decided about the request.
#[derive(Debug)]
pub enum Flow {
    /// Proceed to the next stage.
    Continue,
    /// The stage finalized the response itself; skip the rest of the chain.
    Halt,
    /// Short-circuit to the error renderer.
    Fail(Error),
}

/// One stage of a request pipeline.
///
/// Stages run strictly in resolved order; no stage begins before the
/// previous one returned [`Flow::Continue`]. Stages are shared across
/// concurrent requests, so implementations keep per-request state on the
/// [`Request`]/[`Response`] pair, not on `self`.
pub trait Middleware: Send + Sync {
    fn call(&self, req: &mut Request, res: &mut Response) -> Flow;
}

impl<F> Middleware for F
where
    F: Fn(&mut Request, &mut Response) -> Flow + Send + Sync,
{
    fn call(&self, req: &mut Request, res: &mut Response) -> Flow {
        self(req, res)
    }
}
