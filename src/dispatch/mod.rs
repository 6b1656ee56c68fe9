pub mod dispatcher;
pub(crate) mod events;
pub mod middleware;
pub mod outcome;

pub use dispatcher::Dispatcher;
pub use middleware::Middleware;
pub use outcome::{handler_fn, CommandCall, HandlerFailure, HandlerFn, Outcome};
