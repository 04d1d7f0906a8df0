//! Conversions between serde types and BSON documents.
//!
//! The gateway operations take and return plain [`Document`]s. [`DocumentExt`] moves
//! application types in and out of that representation.

use bson::{Document, de::deserialize_from_document, ser::serialize_to_document};
use serde::{Serialize, de::DeserializeOwned};

use crate::error::GatewayResult;

/// Serialization helpers, implemented for every serde type.
///
/// # Example
///
/// ```ignore
/// #[derive(Serialize, Deserialize)]
/// struct Widget { name: String }
///
/// gateway.insert("widgets", Widget { name: "a".into() }.to_document()?).await?;
/// let widget = gateway
///     .find_one("widgets", doc! { "name": "a" })
///     .await?
///     .map(Widget::from_document)
///     .transpose()?;
/// ```
pub trait DocumentExt: Sized {
    /// Serializes `self` into a BSON document.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Serialization`](crate::error::GatewayError::Serialization) if the
    /// value does not serialize to a document.
    fn to_document(&self) -> GatewayResult<Document>;

    /// Deserializes a value from a BSON document.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Serialization`](crate::error::GatewayError::Serialization) if the
    /// document does not match the type.
    fn from_document(document: Document) -> GatewayResult<Self>;
}

impl<T: Serialize + DeserializeOwned> DocumentExt for T {
    fn to_document(&self) -> GatewayResult<Document> {
        Ok(serialize_to_document(self)?)
    }

    fn from_document(document: Document) -> GatewayResult<Self> {
        Ok(deserialize_from_document(document)?)
    }
}

#[cfg(test)]
mod tests {
    use bson::doc;
    use serde::Deserialize;

    use super::*;
    use crate::error::GatewayError;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Widget {
        name: String,
        count: i32,
    }

    #[test]
    fn serializes_to_a_document() {
        let widget = Widget { name: "a".to_string(), count: 2 };

        assert_eq!(widget.to_document().unwrap(), doc! { "name": "a", "count": 2 });
    }

    #[test]
    fn mismatched_document_is_a_serialization_error() {
        let err = Widget::from_document(doc! { "name": 1 }).unwrap_err();

        assert!(matches!(err, GatewayError::Serialization(_)));
    }
}
