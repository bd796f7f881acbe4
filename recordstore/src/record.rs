use serde::Serialize;
use serde::de::DeserializeOwned;
use shared::{Error, Result};
use std::fmt::{Debug, Display};

/// Identifier of a record. Unique within one collection.
pub trait RecordKey: Clone + Debug + Display + Eq + Send + Sync + 'static {
    /// Fresh key for records created without one.
    fn generate() -> Self;

    fn parse(raw: &str) -> Result<Self>;
}

impl RecordKey for String {
    fn generate() -> Self {
        uuid::Uuid::new_v4().to_string()
    }

    fn parse(raw: &str) -> Result<Self> {
        if raw.trim().is_empty() {
            return Err(Error::Validation("key is empty".to_string()));
        }
        Ok(raw.to_string())
    }
}

impl RecordKey for uuid::Uuid {
    fn generate() -> Self {
        uuid::Uuid::new_v4()
    }

    fn parse(raw: &str) -> Result<Self> {
        uuid::Uuid::parse_str(raw)
            .map_err(|e| Error::Validation(format!("invalid uuid key '{}': {}", raw, e)))
    }
}

/// A domain entity stored through [`crate::StandardRepository`].
///
/// The key lives inside the value under `KEY_FIELD` so a fetched record is
/// self-describing.
pub trait Record<K: RecordKey>: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Backend namespace (table, tree, REST collection).
    const COLLECTION: &'static str;

    const KEY_FIELD: &'static str = "id";

    /// `None` until a key has been assigned.
    fn key(&self) -> Option<&K>;

    fn assign_key(&mut self, key: K);

    /// Schema checks beyond what deserialization enforces.
    fn validate(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_keys() {
        let a = String::generate();
        let b = String::generate();
        assert_ne!(a, b);
        assert_eq!(<String as RecordKey>::parse("t1").unwrap(), "t1");
        assert!(matches!(
            <String as RecordKey>::parse("  "),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn test_uuid_keys() {
        let id = <uuid::Uuid as RecordKey>::generate();
        assert_eq!(<uuid::Uuid as RecordKey>::parse(&id.to_string()).unwrap(), id);
        assert!(matches!(
            <uuid::Uuid as RecordKey>::parse("not-a-uuid"),
            Err(Error::Validation(_))
        ));
    }
}
