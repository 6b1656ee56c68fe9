//! Switchboard public prelude (curated stable-intent exports).
//! Import with: `use switchboard::prelude::*;`
//!
//! Items here are considered *stable-intent* prior to 1.0.0. Their shape may
//! still adjust minimally until the first tagged release, but we aim to avoid
//! breaking renames or removals. Exclusions are deliberate.

pub use crate::config::Config;
pub use crate::dispatch::{handler_fn, CommandCall, HandlerFailure, Middleware, Outcome};
pub use crate::metadata::{CommandSpec, Constraint, ParamSpec, ReturnKind, SemanticType};
pub use crate::registry::{HandlerSet, RegistrationError, RoutingTable};
pub use crate::validation::{validate, ValidationResult, Violation};
pub use crate::wire::{ErrorKind, JsonCodec, MessageEnvelope, PayloadKind, WireCodec};
pub use crate::{Server, ServerBuilder, ServerError};
