//! Handles describing types that live in loaded modules.

use std::fmt;
use std::sync::Arc;

use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};

use crate::generator::IDENTITY_FIELD;
use crate::loader::{ModuleId, Origin};
use crate::naming::TypePath;

/// Layout of one field as reported by the compiled module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldLayout {
    pub name: String,
    /// `std::any::type_name` of the field type inside the module.
    pub type_name: String,
    pub offset: usize,
}

/// The module a handle was extracted from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ModuleInfo {
    pub id: ModuleId,
    pub generation: u64,
    pub origin: Origin,
}

#[derive(Debug)]
struct TypeInfo {
    full_name: TypePath,
    size: usize,
    align: usize,
    fields: Vec<FieldLayout>,
    module: ModuleInfo,
}

/// A loaded type. Cloning is cheap; identity is module plus full name, so a
/// recompiled type never compares equal to its predecessor.
#[derive(Clone)]
pub struct TypeHandle(Arc<TypeInfo>);

impl TypeHandle {
    pub(crate) fn new(
        full_name: TypePath,
        size: usize,
        align: usize,
        fields: Vec<FieldLayout>,
        module: ModuleInfo,
    ) -> Self {
        Self(Arc::new(TypeInfo {
            full_name,
            size,
            align,
            fields,
            module,
        }))
    }

    pub fn name(&self) -> &str {
        self.0.full_name.name()
    }

    pub fn full_name(&self) -> &TypePath {
        &self.0.full_name
    }

    pub fn size(&self) -> usize {
        self.0.size
    }

    pub fn align(&self) -> usize {
        self.0.align
    }

    pub fn fields(&self) -> &[FieldLayout] {
        &self.0.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldLayout> {
        self.0.fields.iter().find(|f| f.name == name)
    }

    pub fn module(&self) -> ModuleInfo {
        self.0.module
    }

    /// Whether a storage mapper can treat the type as an entity.
    pub fn has_identity(&self) -> bool {
        self.field(IDENTITY_FIELD).is_some()
    }
}

impl PartialEq for TypeHandle {
    fn eq(&self, other: &Self) -> bool {
        self.0.module.id == other.0.module.id && self.0.full_name == other.0.full_name
    }
}

impl Eq for TypeHandle {}

impl fmt::Debug for TypeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeHandle")
            .field("full_name", &self.0.full_name.to_string())
            .field("module", &self.0.module.id)
            .field("generation", &self.0.module.generation)
            .field("fields", &self.0.fields.len())
            .finish()
    }
}

impl Serialize for TypeHandle {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("TypeHandle", 5)?;
        state.serialize_field("fullName", &self.0.full_name)?;
        state.serialize_field("size", &self.0.size)?;
        state.serialize_field("align", &self.0.align)?;
        state.serialize_field("fields", &self.0.fields)?;
        state.serialize_field("module", &self.0.module)?;
        state.end()
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    /// Handle for `full_name` in a fresh fake module.
    pub(crate) fn handle(full_name: &str, generation: u64, origin: Origin) -> TypeHandle {
        let fields = ["id", "name"]
            .iter()
            .enumerate()
            .map(|(i, name)| FieldLayout {
                name: name.to_string(),
                type_name: "u128".into(),
                offset: i * 16,
            })
            .collect();
        TypeHandle::new(
            TypePath::parse(full_name).expect("test path"),
            40,
            16,
            fields,
            ModuleInfo {
                id: ModuleId::fresh(),
                generation,
                origin,
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::testing::handle;
    use super::*;

    #[test]
    fn identity_is_module_and_name() {
        let a = handle("models::generated::Employee", 1, Origin::Dynamic);
        let b = handle("models::generated::Employee", 2, Origin::Dynamic);
        assert_eq!(a, a.clone());
        assert_ne!(a, b);
        assert!(a.has_identity());
        assert_eq!(a.name(), "Employee");
        assert_eq!(a.field("name").map(|f| f.offset), Some(16));
    }

    #[test]
    fn serializes_layout_and_origin() {
        let json = serde_json::to_value(handle("models::generated::Employee", 3, Origin::Dynamic))
            .unwrap();
        assert_eq!(json["fullName"], "models::generated::Employee");
        assert_eq!(json["fields"].as_array().map(Vec::len), Some(2));
        assert_eq!(json["module"]["generation"], 3);
        assert_eq!(json["module"]["origin"], "Dynamic");
    }
}
