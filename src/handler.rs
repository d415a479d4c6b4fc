//! Controller actions and their type erasure.
//!
//! # How actions are stored
//!
//! A route table holds actions from *different* controller types in one
//! `HashMap`. Each controller declares its actions as plain method pointers,
//! `fn(&C, &mut Request, &mut Response) -> Result<(), Error>`, so the
//! concrete type `C` has to be hidden behind a trait object before the
//! action can sit next to actions of other controllers.
//!
//! ```text
//! fn home(&self, req, res) -> Result<(), Error>   ← user writes this
//!        ↓ Action::new("home", Self::home)
//! Router::register(controller, "/api")           ← Arc::new(controller)
//!        ↓
//! BoundAction { controller: Arc<C>, action }     ← one per action
//!        ↓  stored as HandlerRef { call: Arc<dyn ErasedHandler> }
//! handler.call(req, res)  at request time        ← one vtable dispatch
//! ```
//!
//! All actions of one controller share the same `Arc<C>`: the instance
//! passed to `register` is the instance every request sees.

use std::fmt;
use std::sync::Arc;

use crate::error::Error;
use crate::request::Request;
use crate::response::Response;

/// Signature of a controller action.
pub type ActionFn<C> = fn(&C, &mut Request, &mut Response) -> Result<(), Error>;

trait ErasedHandler: Send + Sync {
    fn call(&self, req: &mut Request, res: &mut Response) -> Result<(), Error>;
}

/// A controller instance paired with one of its actions.
struct BoundAction<C> {
    controller: Arc<C>,
    action: ActionFn<C>,
}

impl<C: Send + Sync> ErasedHandler for BoundAction<C> {
    fn call(&self, req: &mut Request, res: &mut Response) -> Result<(), Error> {
        (self.action)(&*self.controller, req, res)
    }
}

/// The resolved target of a route: which controller, which action.
///
/// Cloning is one atomic increment; every route key an action is declared
/// on shares the same binding.
#[derive(Clone)]
pub struct HandlerRef {
    controller: &'static str,
    action: &'static str,
    call: Arc<dyn ErasedHandler>,
}

impl HandlerRef {
    pub(crate) fn bind<C: Send + Sync + 'static>(
        controller: Arc<C>,
        action_name: &'static str,
        action: ActionFn<C>,
    ) -> Self {
        Self {
            controller: short_type_name::<C>(),
            action: action_name,
            call: Arc::new(BoundAction { controller, action }),
        }
    }

    /// Unqualified type name of the controller, e.g. `"IndexController"`.
    pub fn controller(&self) -> &'static str { self.controller }

    /// Name the action was declared under, e.g. `"home"`.
    pub fn action(&self) -> &'static str { self.action }

    pub(crate) fn call(&self, req: &mut Request, res: &mut Response) -> Result<(), Error> {
        self.call.call(req, res)
    }
}

impl fmt::Debug for HandlerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.controller, self.action)
    }
}

fn short_type_name<C>() -> &'static str {
    let full = std::any::type_name::<C>();
    // Generic controllers keep their parameters; only the path is trimmed.
    let base = full.split('<').next().unwrap_or(full);
    let start = base.rfind("::").map_or(0, |i| i + 2);
    &full[start..]
}
