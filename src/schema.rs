//! Request-side description of generated types and their fields.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::naming::validate_identifier;

/// Requested type; `name` becomes the struct identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeSchema {
    pub name: String,
}

impl TypeSchema {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn validate(&self) -> Result<()> {
        validate_identifier(&self.name, "type name")
    }
}

/// Value kind of a field. Unknown kinds fail deserialization.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldKind {
    Int,
    Long,
    Double,
    Bool,
    String,
    Reference,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldSchema {
    pub name: String,
    pub kind: FieldKind,
    /// Full path of the referenced type, only read for [`FieldKind::Reference`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_type: Option<String>,
}

impl FieldSchema {
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            reference_type: None,
        }
    }

    pub fn reference(name: impl Into<String>, reference_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: FieldKind::Reference,
            reference_type: Some(reference_type.into()),
        }
    }

    pub fn validate(&self) -> Result<()> {
        validate_identifier(&self.name, "field name")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ForgeError;

    #[test]
    fn type_schema_requires_identifier() {
        assert!(TypeSchema::new("Employee").validate().is_ok());
        assert!(matches!(
            TypeSchema::new("").validate(),
            Err(ForgeError::Validation(_))
        ));
        assert!(matches!(
            TypeSchema::new("Bad Name").validate(),
            Err(ForgeError::Validation(_))
        ));
    }

    #[test]
    fn field_schema_deserializes_from_request_body() {
        let field: FieldSchema =
            serde_json::from_str(r#"{"name":"Salary","kind":"Double"}"#).unwrap();
        assert_eq!(field, FieldSchema::new("Salary", FieldKind::Double));

        let field: FieldSchema = serde_json::from_str(
            r#"{"name":"Dept","kind":"Reference","referenceType":"models::generated::Department"}"#,
        )
        .unwrap();
        assert_eq!(
            field,
            FieldSchema::reference("Dept", "models::generated::Department")
        );
    }

    #[test]
    fn unknown_kind_is_rejected() {
        let parsed = serde_json::from_str::<FieldSchema>(r#"{"name":"Blob","kind":"Binary"}"#);
        assert!(parsed.is_err());
    }

    #[test]
    fn field_name_must_be_identifier() {
        assert!(FieldSchema::new("Salary", FieldKind::Double).validate().is_ok());
        assert!(matches!(
            FieldSchema::new("type", FieldKind::Int).validate(),
            Err(ForgeError::Validation(_))
        ));
    }
}
