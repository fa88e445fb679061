/// Trait for generating unique identifiers.
///
/// This trait is generic over the target ID type, so the same generator can
/// produce a [`SessionId`](crate::SessionId) or any other `From<String>` id.
///
pub trait IdGenerator<T>: Send + Sync
where
    T: From<String>,
{
    fn generate(&self) -> T;
}
