use std::fmt;

use check_keyword::CheckKeyword;
use heck::ToSnakeCase;
use proc_macro2::Span;
use serde::{Serialize, Serializer};
use syn::Ident;

use crate::error::{ForgeError, Result};

/// Checks that `name` can be used verbatim as a Rust identifier for a
/// generated type or field.
pub fn validate_identifier(name: &str, what: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(ForgeError::Validation(format!("{what} is required")));
    }
    if name.starts_with("r#") {
        return Err(ForgeError::Validation(format!(
            "{what} `{name}` must not be a raw identifier"
        )));
    }
    if name.is_keyword() || ["crate", "self", "super", "Self", "_"].contains(&name) {
        return Err(ForgeError::Validation(format!(
            "{what} `{name}` is a reserved keyword"
        )));
    }
    syn::parse_str::<Ident>(name)
        .map(drop)
        .map_err(|_| ForgeError::Validation(format!("{what} `{name}` is not a valid identifier")))
}

/// Identifier for a validated name or one read back from parsed source,
/// where keywords appear in raw form.
pub(crate) fn ident(name: &str) -> Ident {
    match name.strip_prefix("r#") {
        Some(raw) => Ident::new_raw(raw, Span::call_site()),
        None => Ident::new(name, Span::call_site()),
    }
}

/// Crate name for one compilation of `type_name`; `tag` keeps it unique.
pub(crate) fn crate_name(type_name: &str, tag: &str) -> String {
    format!("forge_{}_{}", type_name.to_snake_case(), tag)
}

/// A fully-qualified type name, e.g. `models::generated::Employee`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypePath {
    namespace: Vec<String>,
    name: String,
}

impl TypePath {
    pub fn new(namespace: Vec<String>, name: impl Into<String>) -> Self {
        Self {
            namespace,
            name: name.into(),
        }
    }

    /// Parses a `::`-separated path. A leading `crate::` is ignored.
    pub fn parse(path: &str) -> Option<Self> {
        let parsed = syn::parse_str::<syn::Path>(path.trim()).ok()?;
        let mut segments = Vec::with_capacity(parsed.segments.len());
        for segment in parsed.segments {
            if !matches!(segment.arguments, syn::PathArguments::None) {
                return None;
            }
            segments.push(segment.ident.to_string());
        }
        if segments.first().map(String::as_str) == Some("crate") {
            segments.remove(0);
        }
        let name = segments.pop()?;
        Some(Self::new(segments, name))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn namespace(&self) -> &[String] {
        &self.namespace
    }

    /// `crate::`-rooted path usable from anywhere inside a compiled module.
    pub(crate) fn to_crate_path(&self) -> syn::Path {
        let segments = self
            .namespace
            .iter()
            .chain(std::iter::once(&self.name))
            .map(|s| ident(s));
        syn::parse_quote!(crate #(::#segments)*)
    }
}

impl fmt::Display for TypePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for segment in &self.namespace {
            write!(f, "{segment}::")?;
        }
        f.write_str(&self.name)
    }
}

impl Serialize for TypePath {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Parses a namespace such as `models::generated` into its segments.
pub fn parse_namespace(namespace: &str) -> Result<Vec<String>> {
    let namespace = namespace.trim();
    if namespace.is_empty() {
        return Ok(Vec::new());
    }
    let segments: Vec<String> = namespace.split("::").map(|s| s.trim().to_string()).collect();
    for segment in &segments {
        validate_identifier(segment, "namespace segment")
            .map_err(|_| ForgeError::Config(format!("invalid namespace `{namespace}`")))?;
    }
    Ok(segments)
}

#[cfg(test)]
mod tests {
    use super::*;
    use quote::ToTokens;

    #[test]
    fn identifiers_are_validated() {
        assert!(validate_identifier("Employee", "type name").is_ok());
        assert!(validate_identifier("Salary", "field name").is_ok());
        assert!(validate_identifier("snake_case_2", "field name").is_ok());

        for bad in ["", "   ", "1abc", "with space", "a-b", "fn", "struct", "self", "_", "r#Salary", "r#type"] {
            assert!(
                matches!(validate_identifier(bad, "name"), Err(ForgeError::Validation(_))),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn raw_names_from_parsed_source_become_raw_idents() {
        assert_eq!(ident("r#type").to_string(), "r#type");
        assert_eq!(ident("Salary").to_string(), "Salary");

        let path = TypePath::parse("models::r#type::Company").unwrap();
        assert_eq!(path.namespace(), ["models", "r#type"]);
        let tokens = path.to_crate_path().to_token_stream().to_string();
        assert_eq!(tokens, quote::quote!(crate::models::r#type::Company).to_string());
    }

    #[test]
    fn type_path_parses_and_displays() {
        let path = TypePath::parse("models::generated::Employee").unwrap();
        assert_eq!(path.name(), "Employee");
        assert_eq!(path.namespace(), ["models", "generated"]);
        assert_eq!(path.to_string(), "models::generated::Employee");

        let rooted = TypePath::parse("crate::models::generated::Employee").unwrap();
        assert_eq!(rooted, path);

        let bare = TypePath::parse("Employee").unwrap();
        assert!(bare.namespace().is_empty());
        assert_eq!(bare.to_string(), "Employee");
    }

    #[test]
    fn type_path_rejects_garbage() {
        assert!(TypePath::parse("").is_none());
        assert!(TypePath::parse("models.generated.Employee").is_none());
        assert!(TypePath::parse("Vec<u8>").is_none());
    }

    #[test]
    fn crate_path_is_rooted() {
        let path = TypePath::parse("models::generated::Employee").unwrap();
        let tokens = path.to_crate_path().to_token_stream().to_string();
        let expected = quote::quote!(crate::models::generated::Employee).to_string();
        assert_eq!(tokens, expected);
    }

    #[test]
    fn namespaces_parse() {
        assert_eq!(parse_namespace("models::generated").unwrap(), ["models", "generated"]);
        assert!(parse_namespace("").unwrap().is_empty());
        assert!(matches!(parse_namespace("models::fn"), Err(ForgeError::Config(_))));
        assert!(matches!(parse_namespace("models::"), Err(ForgeError::Config(_))));
    }

    #[test]
    fn crate_names_are_snake_case() {
        assert_eq!(crate_name("EmployeeRecord", "abc123"), "forge_employee_record_abc123");
    }
}
