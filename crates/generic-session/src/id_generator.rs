mod random_id_generator;
mod uuid_generator;

pub use crate::session_traits::IdGenerator;
pub use random_id_generator::*;
pub use uuid_generator::*;
