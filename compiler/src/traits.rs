use crate::error::SchemaError;

/// Source of schema text, keyed by the names imports use
/// (`acme/billing.proto`).
///
/// `Ok(None)` means the name does not exist; `Err` is reserved for failures
/// reading something that does.
pub trait SchemaLoader {
    fn load(&self, name: &str) -> Result<Option<String>, SchemaError>;
}

impl<L: SchemaLoader + ?Sized> SchemaLoader for &L {
    fn load(&self, name: &str) -> Result<Option<String>, SchemaError> {
        (**self).load(name)
    }
}
