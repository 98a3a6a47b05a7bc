use tracing::info;

use super::{Flow, Middleware};
use crate::server::{Request, Response};

/// Logs one structured event per request entering the pipeline.
pub struct RequestLog;

impl Middleware for RequestLog {
    fn call(&self, req: &mut Request, _res: &mut Response) -> Flow {
        info!(
            request_id = %req.id,
            method = %req.method,
            path = %req.path,
            "request received"
        );
        Flow::Continue
    }
}
