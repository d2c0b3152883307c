//! Schema derivation from annotated argument types.
//!
//! An argument type describes itself through [`ToolArgs::shape`], usually via
//! `#[derive(ToolArgs)]`:
//!
//! ```ignore
//! #[derive(Debug, Default, Serialize, Deserialize, ToolArgs)]
//! struct GreetArgs {
//!     #[schema("required,description=Name to greet")]
//!     #[validate("required,min=1")]
//!     name: String,
//!     #[schema("enum=formal,enum=casual,description=Greeting style")]
//!     #[validate("omitempty,oneof=formal casual")]
//!     format: String,
//! }
//! ```
//!
//! The deriver turns that shape into an [`ArgumentDescriptor`], which renders
//! as the JSON object schema advertised to MCP clients.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};
use std::fmt;

use schemars::gen::SchemaGenerator;
use schemars::schema::{InstanceType, Schema, SingleOrVec};
use schemars::JsonSchema;
use serde::Serialize;
use serde_json::{json, Map, Value};
use tracing::debug;

use crate::error::TypeShapeError;
use crate::options::{RequiredDetection, SchemaOptions};

/// JSON object as carried on the wire.
pub type JsonObject = Map<String, Value>;

/// Wire-facing type of a single argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Kind {
    String,
    Integer,
    Number,
    Boolean,
    Array,
    Object,
}

impl Kind {
    /// Infer the kind of a Rust type from its JSON schema.
    ///
    /// `Option<T>` reports the kind of `T`. Anything that does not map to a
    /// single JSON type falls back to [`Kind::String`].
    pub fn of<T: JsonSchema + ?Sized>() -> Kind {
        let mut gen = SchemaGenerator::default();
        let schema = T::json_schema(&mut gen);
        Kind::from_schema(&schema, &gen)
    }

    /// Infer a kind from an already generated schema.
    pub fn from_schema(schema: &Schema, gen: &SchemaGenerator) -> Kind {
        resolve_kind(schema, gen, 2).unwrap_or(Kind::String)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Kind::String => "string",
            Kind::Integer => "integer",
            Kind::Number => "number",
            Kind::Boolean => "boolean",
            Kind::Array => "array",
            Kind::Object => "object",
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn resolve_kind(schema: &Schema, gen: &SchemaGenerator, depth: u8) -> Option<Kind> {
    let Schema::Object(object) = schema else {
        return None;
    };

    if let Some(kind) = object.instance_type.as_ref().and_then(instance_kind) {
        return Some(kind);
    }
    if depth == 0 {
        return None;
    }

    if let Some(reference) = &object.reference {
        let name = reference.rsplit('/').next().unwrap_or(reference);
        if let Some(definition) = gen.definitions().get(name) {
            return resolve_kind(definition, gen, depth - 1);
        }
    }

    let subschemas = object.subschemas.as_ref()?;
    [&subschemas.any_of, &subschemas.one_of, &subschemas.all_of]
        .into_iter()
        .flatten()
        .flatten()
        .filter(|candidate| !is_null_schema(candidate))
        .find_map(|candidate| resolve_kind(candidate, gen, depth - 1))
}

fn instance_kind(instance_type: &SingleOrVec<InstanceType>) -> Option<Kind> {
    match instance_type {
        SingleOrVec::Single(single) => map_instance_type(single),
        SingleOrVec::Vec(types) => types.iter().find_map(map_instance_type),
    }
}

fn map_instance_type(instance_type: &InstanceType) -> Option<Kind> {
    match instance_type {
        InstanceType::String => Some(Kind::String),
        InstanceType::Integer => Some(Kind::Integer),
        InstanceType::Number => Some(Kind::Number),
        InstanceType::Boolean => Some(Kind::Boolean),
        InstanceType::Array => Some(Kind::Array),
        InstanceType::Object => Some(Kind::Object),
        InstanceType::Null => None,
    }
}

fn is_null_schema(schema: &Schema) -> bool {
    matches!(
        schema,
        Schema::Object(object)
            if matches!(&object.instance_type, Some(SingleOrVec::Single(t)) if **t == InstanceType::Null)
    )
}

/// Introspection record for one field of an argument type.
///
/// Produced by `#[derive(ToolArgs)]`, or built by hand for types that cannot
/// use the derive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSpec {
    /// Field name in Rust source.
    pub ident: &'static str,
    /// Key used on the wire. `None` (or `"-"`) hides the field from the schema.
    pub wire_name: Option<&'static str>,
    pub kind: Kind,
    /// Schema annotation, e.g. `"required,description=Age,minimum=0"`.
    pub schema: Option<&'static str>,
    /// Validation annotation, e.g. `"required,gte=0,lte=120"`.
    pub validate: Option<&'static str>,
}

impl FieldSpec {
    pub fn new(ident: &'static str, kind: Kind) -> Self {
        Self {
            ident,
            wire_name: None,
            kind,
            schema: None,
            validate: None,
        }
    }

    pub fn wire_name(mut self, name: &'static str) -> Self {
        self.wire_name = Some(name);
        self
    }

    pub fn schema(mut self, tag: &'static str) -> Self {
        self.schema = Some(tag);
        self
    }

    pub fn validate(mut self, tag: &'static str) -> Self {
        self.validate = Some(tag);
        self
    }

    /// The wire name, unless the field is omitted from the wire.
    pub fn resolved_name(&self) -> Option<&'static str> {
        match self.wire_name {
            None | Some("") | Some("-") => None,
            Some(name) => Some(name),
        }
    }
}

/// Structural shape of an argument type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Shape {
    /// A struct with named fields, in declaration order.
    Record(Vec<FieldSpec>),
    Scalar(Kind),
    Sequence,
    Mapping,
    Enum,
    Tuple,
    Unit,
    /// Free-form JSON such as `serde_json::Value`.
    Dynamic,
}

impl Shape {
    pub fn describe(&self) -> String {
        match self {
            Shape::Record(_) => "struct".to_string(),
            Shape::Scalar(kind) => kind.to_string(),
            Shape::Sequence => "sequence".to_string(),
            Shape::Mapping => "map".to_string(),
            Shape::Enum => "enum".to_string(),
            Shape::Tuple => "tuple struct".to_string(),
            Shape::Unit => "unit struct".to_string(),
            Shape::Dynamic => "dynamic value".to_string(),
        }
    }
}

/// Capability of describing a type's fields to the schema deriver.
///
/// Derive it with `#[derive(ToolArgs)]`. Only [`Shape::Record`] types can be
/// registered as tool arguments; the implementations for scalars and
/// collections exist so that registering one fails with a [`TypeShapeError`]
/// instead of a compile error.
pub trait ToolArgs {
    fn shape() -> Shape;

    fn type_name() -> &'static str {
        std::any::type_name::<Self>()
    }

    /// The decoded value of every wire-facing field, keyed by wire name.
    ///
    /// This is what validation rules are evaluated against. The derive reads
    /// each field directly, so `skip_serializing` and serialize-only renames
    /// do not hide a field. The default serializes the whole value, which
    /// suits hand-written impls whose serialized keys match their wire names.
    fn field_values(&self) -> FieldValues
    where
        Self: Serialize,
    {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => FieldValues::from_object(map),
            Ok(other) => FieldValues::unreadable(format!(
                "{} serialized to {} instead of an object",
                Self::type_name(),
                json_type(&other)
            )),
            Err(e) => FieldValues::unreadable(e.to_string()),
        }
    }
}

/// Field values of one decoded argument instance, as seen by validation.
///
/// A field that could not be serialized keeps its error instead of a value,
/// so validation can report it rather than judge the field absent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldValues {
    values: JsonObject,
    errors: BTreeMap<String, String>,
    unreadable: Option<String>,
}

impl FieldValues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_object(values: JsonObject) -> Self {
        Self {
            values,
            ..Self::default()
        }
    }

    /// No field can be read: every lookup reports `error`.
    pub fn unreadable(error: impl Into<String>) -> Self {
        Self {
            unreadable: Some(error.into()),
            ..Self::default()
        }
    }

    /// Record a field's value, or the error serializing it.
    pub fn insert<T: Serialize + ?Sized>(&mut self, name: &str, value: &T) {
        match serde_json::to_value(value) {
            Ok(value) => {
                self.errors.remove(name);
                self.values.insert(name.to_string(), value);
            }
            Err(e) => {
                self.values.remove(name);
                self.errors.insert(name.to_string(), e.to_string());
            }
        }
    }

    /// The value of `name`, `Ok(None)` if the instance has no such field.
    pub fn lookup(&self, name: &str) -> Result<Option<&Value>, &str> {
        if let Some(error) = self.errors.get(name) {
            return Err(error);
        }
        if let Some(error) = &self.unreadable {
            return Err(error);
        }
        Ok(self.values.get(name))
    }

    pub fn values(&self) -> &JsonObject {
        &self.values
    }

    pub fn into_values(self) -> JsonObject {
        self.values
    }
}

pub(crate) fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

macro_rules! scalar_args {
    ($kind:expr => $($ty:ty),+) => {
        $(impl ToolArgs for $ty {
            fn shape() -> Shape {
                Shape::Scalar($kind)
            }
        })+
    };
}

scalar_args!(Kind::String => String, char);
scalar_args!(Kind::Integer => i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize);
scalar_args!(Kind::Number => f32, f64);
scalar_args!(Kind::Boolean => bool);

impl<T> ToolArgs for Vec<T> {
    fn shape() -> Shape {
        Shape::Sequence
    }
}

impl<T> ToolArgs for VecDeque<T> {
    fn shape() -> Shape {
        Shape::Sequence
    }
}

impl<T, S> ToolArgs for HashSet<T, S> {
    fn shape() -> Shape {
        Shape::Sequence
    }
}

impl<T> ToolArgs for BTreeSet<T> {
    fn shape() -> Shape {
        Shape::Sequence
    }
}

impl<K, V, S> ToolArgs for HashMap<K, V, S> {
    fn shape() -> Shape {
        Shape::Mapping
    }
}

impl<K, V> ToolArgs for BTreeMap<K, V> {
    fn shape() -> Shape {
        Shape::Mapping
    }
}

impl ToolArgs for Value {
    fn shape() -> Shape {
        Shape::Dynamic
    }
}

impl ToolArgs for () {
    fn shape() -> Shape {
        Shape::Unit
    }
}

/// A numeric schema constraint.
///
/// Annotation values that parse as neither an integer nor a float are kept
/// verbatim.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Bound {
    Integer(i64),
    Float(f64),
    Text(String),
}

impl Bound {
    pub fn parse(raw: &str) -> Bound {
        if let Ok(integer) = raw.parse::<i64>() {
            return Bound::Integer(integer);
        }
        match raw.parse::<f64>() {
            Ok(float) if float.is_finite() => Bound::Float(float),
            _ => Bound::Text(raw.to_string()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Constraints {
    /// Allowed values, in annotation order. Duplicates are kept.
    pub enumeration: Vec<String>,
    pub minimum: Option<Bound>,
    pub maximum: Option<Bound>,
    pub min_length: Option<Bound>,
    pub max_length: Option<Bound>,
}

/// Schema of one wire-facing argument.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDescriptor {
    pub name: String,
    pub kind: Kind,
    pub description: Option<String>,
    pub constraints: Constraints,
    pub required: bool,
}

impl FieldDescriptor {
    fn new(name: &str, kind: Kind) -> Self {
        Self {
            name: name.to_string(),
            kind,
            description: None,
            constraints: Constraints::default(),
            required: false,
        }
    }

    /// Render as a JSON schema property.
    pub fn to_property(&self) -> Value {
        let mut property = JsonObject::new();
        property.insert("type".to_string(), json!(self.kind));
        if let Some(description) = &self.description {
            property.insert("description".to_string(), json!(description));
        }

        let constraints = &self.constraints;
        if !constraints.enumeration.is_empty() {
            property.insert("enum".to_string(), json!(constraints.enumeration));
        }
        let bounds = [
            ("minimum", &constraints.minimum),
            ("maximum", &constraints.maximum),
            ("minLength", &constraints.min_length),
            ("maxLength", &constraints.max_length),
        ];
        for (key, bound) in bounds {
            if let Some(bound) = bound {
                property.insert(key.to_string(), json!(bound));
            }
        }

        Value::Object(property)
    }
}

/// Structural description of a tool's input.
#[derive(Debug, Clone, PartialEq)]
pub struct ArgumentDescriptor {
    pub type_name: String,
    pub fields: Vec<FieldDescriptor>,
    /// Required wire names, in first-seen order, without duplicates.
    pub required: Vec<String>,
}

impl ArgumentDescriptor {
    /// Derive the descriptor of `A` with default options.
    pub fn derive<A: ToolArgs>() -> Result<Self, TypeShapeError> {
        Self::derive_with::<A>(&SchemaOptions::default())
    }

    pub fn derive_with<A: ToolArgs>(options: &SchemaOptions) -> Result<Self, TypeShapeError> {
        Self::from_shape(A::type_name(), A::shape(), options)
    }

    pub fn from_shape(
        type_name: &str,
        shape: Shape,
        options: &SchemaOptions,
    ) -> Result<Self, TypeShapeError> {
        let specs = match shape {
            Shape::Record(specs) => specs,
            other => {
                return Err(TypeShapeError {
                    type_name: type_name.to_string(),
                    found: other.describe(),
                })
            }
        };

        let mut fields: Vec<FieldDescriptor> = Vec::with_capacity(specs.len());
        let mut required: Vec<String> = Vec::new();

        for spec in &specs {
            let Some(name) = spec.resolved_name() else {
                continue;
            };

            let mut field = FieldDescriptor::new(name, spec.kind);
            if let Some(tag) = spec.schema {
                apply_schema_tag(tag, &mut field, &mut required);
            }
            if let Some(tag) = spec.validate {
                if mentions_required(tag, options.required_detection) {
                    push_unique(&mut required, name);
                }
            }

            match fields.iter().position(|existing| existing.name == name) {
                Some(index) => fields[index] = field,
                None => fields.push(field),
            }
        }

        for field in &mut fields {
            field.required = required.contains(&field.name);
        }

        debug!(
            "Derived schema for {} with {} properties ({} required)",
            type_name,
            fields.len(),
            required.len()
        );

        Ok(Self {
            type_name: type_name.to_string(),
            fields,
            required,
        })
    }

    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|field| field.name == name)
    }

    /// Render as the object schema advertised to callers.
    pub fn to_json_schema(&self) -> JsonObject {
        let properties: JsonObject = self
            .fields
            .iter()
            .map(|field| (field.name.clone(), field.to_property()))
            .collect();

        let mut schema = JsonObject::new();
        schema.insert("type".to_string(), json!("object"));
        schema.insert("properties".to_string(), Value::Object(properties));
        if !self.required.is_empty() {
            schema.insert("required".to_string(), json!(self.required));
        }
        schema
    }
}

fn apply_schema_tag(tag: &str, field: &mut FieldDescriptor, required: &mut Vec<String>) {
    for token in tag.split(',').map(str::trim) {
        if token == "required" {
            push_unique(required, &field.name);
            continue;
        }

        let Some((key, value)) = token.split_once('=') else {
            continue;
        };
        let constraints = &mut field.constraints;
        match key {
            "description" => field.description = Some(value.to_string()),
            "enum" => constraints.enumeration.push(value.to_string()),
            "minimum" => constraints.minimum = Some(Bound::parse(value)),
            "maximum" => constraints.maximum = Some(Bound::parse(value)),
            "minLength" => constraints.min_length = Some(Bound::parse(value)),
            "maxLength" => constraints.max_length = Some(Bound::parse(value)),
            _ => {}
        }
    }
}

fn mentions_required(tag: &str, detection: RequiredDetection) -> bool {
    match detection {
        RequiredDetection::Substring => tag.contains("required"),
        RequiredDetection::Exact => tag.split(',').any(|rule| rule.trim() == "required"),
    }
}

fn push_unique(list: &mut Vec<String>, name: &str) {
    if !list.iter().any(|existing| existing == name) {
        list.push(name.to_string());
    }
}
