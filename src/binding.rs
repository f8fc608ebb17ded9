//! The Binding Model
//!
//! A compiled schema: a table of [`TypeDescriptor`]s addressed by [`TypeId`], the
//! global element bindings keyed by [`QName`], and the content models the
//! unmarshaller walks. The model is immutable once compiled and is shared between
//! threads behind an `Arc`.
//!
//! The unmarshaller produces [`BoundObject`]s from it: either a direct instance of a
//! model type, or a root-element wrapper around one.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use crate::builtins::{BuiltinType, WhiteSpace, XS_NAMESPACE};
use crate::facets::Facets;
use crate::record::{Schema, SchemaKind, Value};

/// Index of a type descriptor inside its [`BindingModel`]
pub type TypeId = usize;

/// A namespace-qualified name
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct QName {
    #[serde(skip_serializing_if = "Option::is_none")]
    namespace: Option<String>,
    local: String,
}

impl QName {
    pub fn new(namespace: Option<&str>, local: impl Into<String>) -> Self {
        Self {
            namespace: namespace.filter(|ns| !ns.is_empty()).map(str::to_string),
            local: local.into(),
        }
    }

    pub fn local(local: impl Into<String>) -> Self {
        Self::new(None, local)
    }

    pub fn xs(local: &str) -> Self {
        Self::new(Some(XS_NAMESPACE), local)
    }

    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    pub fn local_name(&self) -> &str {
        &self.local
    }

    pub fn matches(&self, namespace: Option<&str>, local: &str) -> bool {
        self.local == local && self.namespace.as_deref() == namespace.filter(|ns| !ns.is_empty())
    }
}

impl fmt::Display for QName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) if ns == XS_NAMESPACE => write!(f, "xs:{}", self.local),
            Some(ns) => write!(f, "{{{}}}{}", ns, self.local),
            None => f.write_str(&self.local),
        }
    }
}

/// What the record mapper can do with an object of a given type
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "capability", content = "detail", rename_all = "lowercase")]
pub enum Mapping {
    /// A simple value of the given record kind
    Scalar(SchemaKind),
    /// A complex value that maps to a struct record
    Composite,
    /// A root-element wrapper around another bound object
    Wrapper,
    /// Cannot be represented as a record
    Unsupported(String),
}

impl Mapping {
    pub fn is_composite(&self) -> bool {
        matches!(self, Mapping::Composite)
    }
}

/// Occurrence bounds of a particle; `max = None` is unbounded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Occurs {
    pub min: u32,
    pub max: Option<u32>,
}

impl Occurs {
    pub const ONCE: Occurs = Occurs {
        min: 1,
        max: Some(1),
    };

    pub fn is_repeating(&self) -> bool {
        self.max.is_none_or(|max| max > 1)
    }
}

/// A content-model particle
#[derive(Debug, Clone, Serialize)]
pub struct Particle {
    pub occurs: Occurs,
    pub term: Term,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Term {
    Element(ElementDecl),
    Sequence { particles: Vec<Particle> },
    Choice { particles: Vec<Particle> },
    All { particles: Vec<Particle> },
    Any(Wildcard),
}

impl Particle {
    /// True when the particle can match an empty run of elements
    pub fn is_nullable(&self) -> bool {
        self.occurs.min == 0 || self.term.is_nullable()
    }

    /// True when an element with this name can start a match of the particle
    pub fn can_start(&self, namespace: Option<&str>, local: &str) -> bool {
        self.occurs.max != Some(0) && self.term.can_start(namespace, local)
    }
}

impl Term {
    pub fn is_nullable(&self) -> bool {
        match self {
            Term::Element(_) | Term::Any(_) => false,
            Term::Sequence { particles } | Term::All { particles } => {
                particles.iter().all(Particle::is_nullable)
            }
            Term::Choice { particles } => {
                particles.is_empty() || particles.iter().any(Particle::is_nullable)
            }
        }
    }

    pub fn can_start(&self, namespace: Option<&str>, local: &str) -> bool {
        match self {
            Term::Element(decl) => decl.name.matches(namespace, local),
            Term::Any(wildcard) => wildcard.allows(namespace),
            Term::Sequence { particles } => {
                for particle in particles {
                    if particle.can_start(namespace, local) {
                        return true;
                    }
                    if !particle.is_nullable() {
                        return false;
                    }
                }
                false
            }
            Term::Choice { particles } | Term::All { particles } => {
                particles.iter().any(|p| p.can_start(namespace, local))
            }
        }
    }

    /// Names of the elements that can start this term, for diagnostics
    pub fn expected_names(&self) -> Vec<String> {
        let mut names = Vec::new();
        self.collect_expected(&mut names);
        names
    }

    fn collect_expected(&self, names: &mut Vec<String>) {
        match self {
            Term::Element(decl) => names.push(decl.name.local_name().to_string()),
            Term::Any(_) => names.push("any element".to_string()),
            Term::Sequence { particles } => {
                for particle in particles {
                    particle.term.collect_expected(names);
                    if !particle.is_nullable() {
                        break;
                    }
                }
            }
            Term::Choice { particles } | Term::All { particles } => {
                for particle in particles {
                    particle.term.collect_expected(names);
                }
            }
        }
    }
}

/// A local or referenced element declaration inside a content model
#[derive(Debug, Clone, Serialize)]
pub struct ElementDecl {
    pub name: QName,
    pub type_id: TypeId,
    pub nillable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fixed: Option<String>,
}

/// Namespace constraint of an `xs:any` / `xs:anyAttribute` wildcard
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Wildcard {
    Any,
    /// Any namespace except the given target namespace (and no namespace)
    Other(Option<String>),
    /// An explicit list; `None` stands for unqualified names
    List(Vec<Option<String>>),
}

impl Wildcard {
    pub fn allows(&self, namespace: Option<&str>) -> bool {
        match self {
            Wildcard::Any => true,
            Wildcard::Other(target) => {
                namespace.is_some() && namespace != target.as_deref()
            }
            Wildcard::List(allowed) => allowed.iter().any(|ns| ns.as_deref() == namespace),
        }
    }
}

/// An attribute use of a complex type
#[derive(Debug, Clone, Serialize)]
pub struct AttributeUse {
    pub name: QName,
    pub type_id: TypeId,
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fixed: Option<String>,
}

/// Variety of a simple type
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SimpleVariety {
    Atomic(BuiltinType),
    List(TypeId),
    Union(Vec<TypeId>),
}

#[derive(Debug, Clone, Serialize)]
pub struct SimpleType {
    pub variety: SimpleVariety,
    #[serde(skip_serializing_if = "Facets::is_empty")]
    pub facets: Facets,
}

impl SimpleType {
    pub fn atomic(builtin: BuiltinType) -> Self {
        Self {
            variety: SimpleVariety::Atomic(builtin),
            facets: Facets::default(),
        }
    }

    pub fn whitespace(&self) -> WhiteSpace {
        self.facets.whitespace().unwrap_or(match &self.variety {
            SimpleVariety::Atomic(builtin) => builtin.whitespace(),
            _ => WhiteSpace::Collapse,
        })
    }

    /// The primitive built-in for atomic types
    pub fn primitive(&self) -> Option<BuiltinType> {
        match &self.variety {
            SimpleVariety::Atomic(builtin) => Some(*builtin),
            _ => None,
        }
    }
}

/// Content type of a complex type
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "content", rename_all = "lowercase")]
pub enum Content {
    Empty,
    Simple { type_id: TypeId },
    Elements { particle: Particle, mixed: bool },
}

/// Where a record field of a complex type takes its value from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldSource {
    Attribute,
    Element,
    Text,
}

/// Key of an attribute's values in a [`BoundComplex`]; elements and text use their field name
pub fn attribute_key(local: &str) -> String {
    format!("@{}", local)
}

/// One record field of a composite type
#[derive(Debug, Clone, Serialize)]
pub struct FieldPlan {
    pub name: String,
    /// Where the unmarshaller put the field's values
    pub key: String,
    pub source: FieldSource,
    pub type_id: TypeId,
    pub repeated: bool,
    pub optional: bool,
    /// Repeated items may be nil
    pub nillable: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ComplexType {
    pub attributes: Vec<AttributeUse>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub any_attribute: Option<Wildcard>,
    pub content: Content,
    /// Record fields in schema order: attributes, then elements, then text
    pub fields: Vec<FieldPlan>,
}

impl ComplexType {
    pub fn attribute(&self, namespace: Option<&str>, local: &str) -> Option<&AttributeUse> {
        self.attributes
            .iter()
            .find(|attribute| attribute.name.matches(namespace, local))
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "variety", rename_all = "lowercase")]
pub enum TypeBody {
    Simple(SimpleType),
    Complex(ComplexType),
    /// `xs:anyType`: any content, never mapped
    AnyType,
}

/// A compiled type definition
#[derive(Debug, Clone, Serialize)]
pub struct TypeDescriptor {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qname: Option<QName>,
    pub anonymous: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doc: Option<String>,
    pub body: TypeBody,
    pub mapping: Mapping,
    #[serde(skip)]
    pub record_schema: Option<std::sync::Arc<Schema>>,
}

impl TypeDescriptor {
    pub fn simple(&self) -> Option<&SimpleType> {
        match &self.body {
            TypeBody::Simple(simple) => Some(simple),
            _ => None,
        }
    }

    pub fn complex(&self) -> Option<&ComplexType> {
        match &self.body {
            TypeBody::Complex(complex) => Some(complex),
            _ => None,
        }
    }
}

/// A global element
#[derive(Debug, Clone, Serialize)]
pub struct ElementBinding {
    pub name: QName,
    pub type_id: TypeId,
    pub nillable: bool,
    /// Bound through a root-element wrapper rather than as a direct instance
    pub wrapped: bool,
}

/// Compiled form of one schema (with its includes and imports)
#[derive(Debug, Clone, Serialize)]
pub struct BindingModel {
    location: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    target_namespace: Option<String>,
    types: Vec<TypeDescriptor>,
    #[serde(skip)]
    named_types: BTreeMap<QName, TypeId>,
    elements: BTreeMap<String, ElementBinding>,
    #[serde(skip)]
    elements_by_name: BTreeMap<QName, String>,
}

impl BindingModel {
    pub(crate) fn new(
        location: String,
        target_namespace: Option<String>,
        types: Vec<TypeDescriptor>,
        elements: Vec<ElementBinding>,
    ) -> Self {
        let named_types = types
            .iter()
            .enumerate()
            .filter_map(|(id, descriptor)| descriptor.qname.clone().map(|qname| (qname, id)))
            .collect();
        let elements_by_name = elements
            .iter()
            .map(|binding| (binding.name.clone(), binding.name.to_string()))
            .collect();
        let elements = elements
            .into_iter()
            .map(|binding| (binding.name.to_string(), binding))
            .collect();
        Self {
            location,
            target_namespace,
            types,
            named_types,
            elements,
            elements_by_name,
        }
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn target_namespace(&self) -> Option<&str> {
        self.target_namespace.as_deref()
    }

    pub fn type_count(&self) -> usize {
        self.types.len()
    }

    pub fn types(&self) -> &[TypeDescriptor] {
        &self.types
    }

    pub fn type_descriptor(&self, id: TypeId) -> &TypeDescriptor {
        &self.types[id]
    }

    pub fn named_type(&self, name: &QName) -> Option<&TypeDescriptor> {
        self.named_types.get(name).map(|id| &self.types[*id])
    }

    pub fn named_type_id(&self, name: &QName) -> Option<TypeId> {
        self.named_types.get(name).copied()
    }

    /// Look a type up by its display name (`Order.Item`, `xs:int`, `{urn:x}Foo`)
    pub fn type_by_name(&self, name: &str) -> Option<&TypeDescriptor> {
        self.types.iter().find(|descriptor| descriptor.name == name)
    }

    pub fn element_count(&self) -> usize {
        self.elements.len()
    }

    pub fn elements(&self) -> impl Iterator<Item = &ElementBinding> {
        self.elements.values()
    }

    pub fn element(&self, namespace: Option<&str>, local: &str) -> Option<&ElementBinding> {
        let key = self.elements_by_name.get(&QName::new(namespace, local))?;
        self.elements.get(key)
    }

    /// Convert a raw lexical value of a simple type into a record value.
    ///
    /// The error is a human-readable reason; the caller adds position and context.
    pub fn parse_simple(&self, type_id: TypeId, raw: &str) -> Result<Value, String> {
        let simple = self.type_descriptor(type_id).simple().ok_or_else(|| {
            format!("{} is not a simple type", self.type_descriptor(type_id).name)
        })?;
        let normalized = simple.whitespace().apply(raw);
        let value = match &simple.variety {
            SimpleVariety::Atomic(builtin) => {
                builtin.parse(&normalized, simple.facets.fraction_digits())?
            }
            SimpleVariety::List(item) => Value::Array(
                normalized
                    .split_ascii_whitespace()
                    .map(|token| self.parse_simple(*item, token))
                    .collect::<Result<Vec<_>, _>>()?,
            ),
            SimpleVariety::Union(members) => {
                let accepted = members
                    .iter()
                    .any(|member| self.parse_simple(*member, &normalized).is_ok());
                if !accepted {
                    let names: Vec<&str> = members
                        .iter()
                        .map(|member| self.type_descriptor(*member).name.as_str())
                        .collect();
                    return Err(format!("value matches none of the member types {:?}", names));
                }
                Value::String(normalized.to_string())
            }
        };
        simple.facets.check(&normalized, &value)?;
        Ok(value)
    }
}

/// Result of unmarshalling one XML document
#[derive(Debug, Clone, PartialEq)]
pub enum BoundObject {
    Instance(BoundInstance),
    Element(RootElement),
}

impl BoundObject {
    pub fn mapping(&self) -> &Mapping {
        match self {
            BoundObject::Instance(instance) => &instance.mapping,
            BoundObject::Element(_) => &Mapping::Wrapper,
        }
    }

    /// Name of the concrete bound type, for diagnostics
    pub fn type_name(&self) -> String {
        match self {
            BoundObject::Instance(instance) => instance.type_name.clone(),
            BoundObject::Element(root) => format!("element wrapper <{}>", root.name),
        }
    }
}

/// A direct instance of a model type
#[derive(Debug, Clone, PartialEq)]
pub struct BoundInstance {
    pub type_id: TypeId,
    pub type_name: String,
    pub mapping: Mapping,
    pub value: BoundValue,
}

/// A root-element wrapper: the element name plus the object it carries
#[derive(Debug, Clone, PartialEq)]
pub struct RootElement {
    pub name: QName,
    pub value: Box<BoundObject>,
}

/// Bound content of an element or attribute
#[derive(Debug, Clone, PartialEq)]
pub enum BoundValue {
    Nil,
    Simple(Value),
    Complex(BoundComplex),
    /// Content of an `xs:anyType` element; accepted but not bound
    Opaque,
}

/// Bound fields of a complex value; attributes are keyed by [`attribute_key`]
#[derive(Debug, Clone, PartialEq)]
pub struct BoundComplex {
    pub type_id: TypeId,
    fields: BTreeMap<String, Vec<BoundValue>>,
}

impl BoundComplex {
    pub fn new(type_id: TypeId) -> Self {
        Self {
            type_id,
            fields: BTreeMap::new(),
        }
    }

    pub fn push(&mut self, field: &str, value: BoundValue) {
        self.fields.entry(field.to_string()).or_default().push(value);
    }

    pub fn field(&self, name: &str) -> &[BoundValue] {
        self.fields.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }
}
