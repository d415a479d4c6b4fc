//! Unified error type.

use thiserror::Error as ThisError;

/// A boxed error from user code: controller actions, middleware, renderers.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The error type returned by portico's fallible operations.
///
/// A request that matches no route is *not* an error: the dispatcher answers
/// it with a `404` response. This type covers registration failures (an
/// unknown middleware identifier), configuration and listener failures, and
/// whatever a controller action or middleware chooses to return.
///
/// Errors raised while a request is being handled are never swallowed by the
/// pipeline. They travel back out of [`Dispatcher::dispatch`] to the caller,
/// which for the bundled [`Server`] means a logged `500`.
///
/// [`Dispatcher::dispatch`]: crate::Dispatcher::dispatch
/// [`Server`]: crate::Server
#[derive(Debug, ThisError)]
pub enum Error {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("config: {0}")]
    Config(String),

    /// A middleware identifier with no registered factory.
    #[error("unknown middleware `{0}`")]
    UnknownMiddleware(String),

    #[error("unknown method `{0}`")]
    UnknownMethod(String),

    /// `send_template` was called on a response with no renderer installed.
    #[error("no template renderer installed")]
    NoRenderer,

    #[error("template `{name}`: {source}")]
    Template {
        name: String,
        #[source]
        source: BoxError,
    },

    #[error("json: {0}")]
    Json(#[from] serde_json::Error),

    /// A query string or form body that does not fit the requested model.
    #[error("form: {0}")]
    Form(#[from] serde_urlencoded::de::Error),

    /// An application error raised by a controller action or middleware.
    #[error(transparent)]
    Handler(BoxError),
}

impl Error {
    /// Wraps an application error so it can be returned from a handler.
    ///
    /// ```rust
    /// use portico::Error;
    ///
    /// let err = Error::handler("database unavailable");
    /// assert_eq!(err.to_string(), "database unavailable");
    /// ```
    pub fn handler(err: impl Into<BoxError>) -> Self {
        Self::Handler(err.into())
    }
}
