use std::fmt::{self, Display};

use serde::{Deserialize, Deserializer, Serialize};

/// Identifier of a persisted row.
///
/// Backends hand out either integer or string keys, so the identifier is
/// normalized to its string form. Two ids are equal when their string
/// forms are equal.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct RowId(String);

/// Identifier of a persisted chat turn.
pub type MessageId = RowId;

/// Identifier of a stored denial letter.
pub type LetterId = RowId;

impl RowId {
    /// Creates an id from anything string-like.
    #[inline]
    pub fn new<S: Into<String>>(id: S) -> Self {
        Self(id.into())
    }

    /// Returns the string form of the id.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for RowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RowId {
    #[inline]
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for RowId {
    #[inline]
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<i64> for RowId {
    #[inline]
    fn from(value: i64) -> Self {
        Self(value.to_string())
    }
}

impl<'de> Deserialize<'de> for RowId {
    fn deserialize<D: Deserializer<'de>>(de: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Int(i64),
            Str(String),
        }

        Ok(match Raw::deserialize(de)? {
            Raw::Int(value) => value.into(),
            Raw::Str(value) => value.into(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_mixed_keys() {
        let ids: Vec<RowId> =
            serde_json::from_str(r#"[42, "9b1d-uuid"]"#).unwrap();
        assert_eq!(ids[0], RowId::new("42"));
        assert_eq!(ids[1].as_str(), "9b1d-uuid");
    }

    #[test]
    fn test_serialize_as_string() {
        let id = RowId::from(7_i64);
        assert_eq!(serde_json::to_string(&id).unwrap(), r#""7""#);
    }
}
