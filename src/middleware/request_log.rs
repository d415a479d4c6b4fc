use tracing::info;

use super::{Middleware, Next};
use crate::error::Error;
use crate::request::Request;
use crate::response::Response;

/// Logs every request that reaches it, then continues.
#[derive(Clone, Copy, Debug, Default)]
pub struct RequestLog;

impl Middleware for RequestLog {
    fn handle(&self, req: &mut Request, res: &mut Response, next: Next<'_>) -> Result<(), Error> {
        info!(method = %req.method(), path = req.path(), "request received");
        next.run(req, res)
    }
}
