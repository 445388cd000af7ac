// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Minimal model of the served GraphQL schema.
//!
//! The tracer only needs three things from the schema: resolving a declared
//! variable type down to its named type, walking input object fields, and a
//! printed SDL form to hash and publish. Output types are modelled just enough
//! to print them.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::codec::sha256_hex;
use crate::error::SchemaError;

/// Scalars every schema provides without declaring them.
pub const BUILTIN_SCALARS: &[&str] = &["Boolean", "Float", "ID", "Int", "String"];

/// A reference to a type as written in a variable or field declaration.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeRef {
    Named(String),
    List(Box<TypeRef>),
    NonNull(Box<TypeRef>),
}

impl TypeRef {
    /// Reference a named type.
    pub fn named(name: impl Into<String>) -> Self {
        Self::Named(name.into())
    }

    /// Wrap in a list.
    pub fn list(self) -> Self {
        Self::List(Box::new(self))
    }

    /// Wrap in a non-null marker.
    pub fn non_null(self) -> Self {
        Self::NonNull(Box::new(self))
    }

    /// Name of the innermost named type.
    pub fn base_name(&self) -> &str {
        match self {
            Self::Named(name) => name,
            Self::List(inner) | Self::NonNull(inner) => inner.base_name(),
        }
    }

    /// Canonical signature, e.g. `[Status!]!`.
    pub fn signature(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Named(name) => f.write_str(name),
            Self::List(inner) => write!(f, "[{}]", inner),
            Self::NonNull(inner) => write!(f, "{}!", inner),
        }
    }
}

impl FromStr for TypeRef {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parser = TypeRefParser { src: s, pos: 0 };
        let ty = parser.parse_type()?;
        parser.skip_whitespace();
        if parser.pos != s.len() {
            return Err(SchemaError::type_ref(
                s,
                format!("unexpected input at offset {}", parser.pos),
            ));
        }
        Ok(ty)
    }
}

struct TypeRefParser<'a> {
    src: &'a str,
    pos: usize,
}

impl TypeRefParser<'_> {
    fn peek(&self) -> Option<u8> {
        self.src.as_bytes().get(self.pos).copied()
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.peek(), Some(b) if b.is_ascii_whitespace()) {
            self.pos += 1;
        }
    }

    fn parse_type(&mut self) -> Result<TypeRef, SchemaError> {
        self.skip_whitespace();
        let inner = match self.peek() {
            Some(b'[') => {
                self.pos += 1;
                let item = self.parse_type()?;
                self.skip_whitespace();
                if self.peek() != Some(b']') {
                    return Err(SchemaError::type_ref(self.src, "unclosed list"));
                }
                self.pos += 1;
                TypeRef::List(Box::new(item))
            }
            Some(b) if b == b'_' || b.is_ascii_alphabetic() => {
                let start = self.pos;
                while matches!(self.peek(), Some(b) if b == b'_' || b.is_ascii_alphanumeric()) {
                    self.pos += 1;
                }
                TypeRef::Named(self.src[start..self.pos].to_string())
            }
            Some(b) => {
                return Err(SchemaError::type_ref(
                    self.src,
                    format!("unexpected character '{}'", b as char),
                ))
            }
            None => return Err(SchemaError::type_ref(self.src, "unexpected end of input")),
        };

        self.skip_whitespace();
        if self.peek() == Some(b'!') {
            self.pos += 1;
            Ok(TypeRef::NonNull(Box::new(inner)))
        } else {
            Ok(inner)
        }
    }
}

/// An input field or argument declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputValue {
    pub name: String,
    pub ty: TypeRef,
}

impl InputValue {
    pub fn new(name: impl Into<String>, ty: TypeRef) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }
}

/// A field on an object type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDefinition {
    pub name: String,
    pub args: Vec<InputValue>,
    pub ty: TypeRef,
}

impl FieldDefinition {
    pub fn new(name: impl Into<String>, ty: TypeRef) -> Self {
        Self {
            name: name.into(),
            args: Vec::new(),
            ty,
        }
    }

    /// Add an argument.
    pub fn with_arg(mut self, name: impl Into<String>, ty: TypeRef) -> Self {
        self.args.push(InputValue::new(name, ty));
        self
    }
}

/// What kind of named type a definition is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeKind {
    Scalar,
    Enum { values: Vec<String> },
    InputObject { fields: Vec<InputValue> },
    Object { fields: Vec<FieldDefinition> },
}

/// A named type definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedType {
    pub name: String,
    pub kind: TypeKind,
}

impl NamedType {
    /// Whether this is one of the [`BUILTIN_SCALARS`].
    pub fn is_builtin(&self) -> bool {
        matches!(self.kind, TypeKind::Scalar) && BUILTIN_SCALARS.contains(&self.name.as_str())
    }

    fn print(&self, out: &mut String) {
        match &self.kind {
            TypeKind::Scalar => {
                out.push_str("scalar ");
                out.push_str(&self.name);
            }
            TypeKind::Enum { values } => {
                print_block(out, "enum", &self.name, values.iter().map(String::clone));
            }
            TypeKind::InputObject { fields } => {
                print_block(
                    out,
                    "input",
                    &self.name,
                    fields.iter().map(|f| format!("{}: {}", f.name, f.ty)),
                );
            }
            TypeKind::Object { fields } => {
                print_block(
                    out,
                    "type",
                    &self.name,
                    fields.iter().map(|field| {
                        if field.args.is_empty() {
                            format!("{}: {}", field.name, field.ty)
                        } else {
                            let args = field
                                .args
                                .iter()
                                .map(|a| format!("{}: {}", a.name, a.ty))
                                .collect::<Vec<_>>()
                                .join(", ");
                            format!("{}({}): {}", field.name, args, field.ty)
                        }
                    }),
                );
            }
        }
    }
}

fn print_block(out: &mut String, keyword: &str, name: &str, lines: impl Iterator<Item = String>) {
    out.push_str(keyword);
    out.push(' ');
    out.push_str(name);
    out.push_str(" {\n");
    for line in lines {
        out.push_str("  ");
        out.push_str(&line);
        out.push('\n');
    }
    out.push('}');
}

/// The served schema.
#[derive(Debug, Clone)]
pub struct Schema {
    types: BTreeMap<String, NamedType>,
    query_type: String,
    mutation_type: Option<String>,
}

impl Schema {
    /// Start building a schema.
    pub fn builder() -> SchemaBuilder {
        SchemaBuilder::default()
    }

    /// Look up a named type.
    pub fn get(&self, name: &str) -> Option<&NamedType> {
        self.types.get(name)
    }

    /// Resolve a type reference to its innermost named type.
    pub fn resolve(&self, ty: &TypeRef) -> Option<&NamedType> {
        self.get(ty.base_name())
    }

    /// Iterate over all user-defined types in name order.
    pub fn types(&self) -> impl Iterator<Item = &NamedType> {
        self.types.values().filter(|t| !t.is_builtin())
    }

    /// Print the schema as SDL.
    ///
    /// Types are printed in name order and builtin scalars are left out, so
    /// the output (and the hash derived from it) is stable.
    pub fn print(&self) -> String {
        let mut sections = Vec::new();

        let custom_roots = self.query_type != "Query"
            || self.mutation_type.as_deref().is_some_and(|m| m != "Mutation");
        if custom_roots {
            let mut block = format!("schema {{\n  query: {}\n", self.query_type);
            if let Some(mutation) = &self.mutation_type {
                block.push_str(&format!("  mutation: {}\n", mutation));
            }
            block.push('}');
            sections.push(block);
        }

        for ty in self.types() {
            let mut out = String::new();
            ty.print(&mut out);
            sections.push(out);
        }

        sections.join("\n\n")
    }

    /// SHA-256 hex digest of the printed schema.
    pub fn hash(&self) -> String {
        sha256_hex(&self.print())
    }
}

/// Builder for [`Schema`].
#[derive(Debug, Clone)]
pub struct SchemaBuilder {
    types: Vec<NamedType>,
    query_type: String,
    mutation_type: Option<String>,
}

impl Default for SchemaBuilder {
    fn default() -> Self {
        Self {
            types: Vec::new(),
            query_type: "Query".to_string(),
            mutation_type: None,
        }
    }
}

impl SchemaBuilder {
    /// Declare a custom scalar.
    pub fn scalar(mut self, name: impl Into<String>) -> Self {
        self.types.push(NamedType {
            name: name.into(),
            kind: TypeKind::Scalar,
        });
        self
    }

    /// Declare an enum type.
    pub fn enum_type<I, S>(mut self, name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.types.push(NamedType {
            name: name.into(),
            kind: TypeKind::Enum {
                values: values.into_iter().map(Into::into).collect(),
            },
        });
        self
    }

    /// Declare an input object type.
    pub fn input_object(mut self, name: impl Into<String>, fields: Vec<InputValue>) -> Self {
        self.types.push(NamedType {
            name: name.into(),
            kind: TypeKind::InputObject { fields },
        });
        self
    }

    /// Declare an object type.
    pub fn object(mut self, name: impl Into<String>, fields: Vec<FieldDefinition>) -> Self {
        self.types.push(NamedType {
            name: name.into(),
            kind: TypeKind::Object { fields },
        });
        self
    }

    /// Name of the query root type (default `Query`).
    pub fn query_type(mut self, name: impl Into<String>) -> Self {
        self.query_type = name.into();
        self
    }

    /// Name of the mutation root type.
    pub fn mutation_type(mut self, name: impl Into<String>) -> Self {
        self.mutation_type = Some(name.into());
        self
    }

    pub fn build(self) -> Result<Schema, SchemaError> {
        let mut types = BTreeMap::new();
        for name in BUILTIN_SCALARS {
            types.insert(
                name.to_string(),
                NamedType {
                    name: name.to_string(),
                    kind: TypeKind::Scalar,
                },
            );
        }

        for ty in self.types {
            if types.contains_key(&ty.name) {
                return Err(SchemaError::DuplicateType(ty.name));
            }
            types.insert(ty.name.clone(), ty);
        }

        Ok(Schema {
            types,
            query_type: self.query_type,
            mutation_type: self.mutation_type,
        })
    }
}
