pub(crate) mod id_generator;
pub(crate) mod session_id_store;
pub(crate) mod session_store;

pub use id_generator::*;
pub use session_id_store::*;
pub use session_store::*;
