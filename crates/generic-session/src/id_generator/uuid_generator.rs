use crate::session_traits::IdGenerator;
use uuid::Uuid;

/// An [`IdGenerator`] implementation that uses UUID v4 to create unique identifiers.
///
/// Ids are rendered in the 32 character simple form (no hyphens), which keeps
/// them cookie friendly.
pub struct UuidGenerator;

impl<T> IdGenerator<T> for UuidGenerator
where
    T: From<String>,
{
    fn generate(&self) -> T {
        T::from(Uuid::new_v4().simple().to_string())
    }
}
