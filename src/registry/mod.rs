pub mod builder;
pub mod set;
pub mod table;

pub use builder::{RegistrationError, RegistryBuilder};
pub use set::HandlerSet;
pub use table::RoutingTable;
