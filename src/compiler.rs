//! Schema compiler
//!
//! Turns an XSD (plus everything it includes or imports) into a [`BindingModel`].
//! Compilation runs in three steps:
//!
//! 1. collect: fetch the root document and, transitively, every `xs:include` and
//!    `xs:import` with a `schemaLocation`, staging each in the compilation workspace;
//! 2. build: register the global components of every document, then compile each
//!    named type and global element (anonymous types are named after their element
//!    path, e.g. `Order.Item`);
//! 3. link: derive the record fields, mapping capability and record schema of every
//!    type. Types whose record schema would be infinite are marked unsupported.

use std::collections::{HashMap, HashSet, VecDeque};
use std::path::Path;
use std::sync::Arc;

use roxmltree::{Document, Node, ParsingOptions};
use tracing::{debug, info, warn};

use crate::binding::{
    AttributeUse, BindingModel, ComplexType, Content, ElementBinding, ElementDecl, FieldPlan,
    FieldSource, Mapping, Occurs, Particle, QName, SimpleType, SimpleVariety, Term, TypeBody,
    TypeDescriptor, TypeId, Wildcard, attribute_key,
};
use crate::bom;
use crate::builtins::{BuiltinType, XS_NAMESPACE};
use crate::error::{Result, TransformError};
use crate::record::{Schema, SchemaKind, StructSchemaBuilder};
use crate::schema_loader::{SchemaDocument, SchemaLoader, SchemaReference};
use crate::workspace::CompilationWorkspace;

/// Compiles schema documents; owns the workspace its artifacts are staged in
pub struct SchemaCompiler {
    loader: SchemaLoader,
    workspace: CompilationWorkspace,
}

impl SchemaCompiler {
    pub async fn new(loader: SchemaLoader, workspace_dir: &Path) -> Result<Self> {
        let workspace = CompilationWorkspace::create(workspace_dir).await?;
        Ok(Self { loader, workspace })
    }

    pub fn loader(&self) -> &SchemaLoader {
        &self.loader
    }

    pub fn workspace(&self) -> &CompilationWorkspace {
        &self.workspace
    }

    /// Compile a root schema document into a binding model
    pub async fn compile(&self, document: SchemaDocument) -> Result<BindingModel> {
        let root_location = document.location().to_string();
        let loaded = self.collect_documents(document).await?;
        debug!(
            location = %root_location,
            documents = loaded.len(),
            "collected schema documents"
        );

        let model = build_model(&root_location, &loaded)?;
        let dump = self.workspace.write_model(&model).await?;

        info!(
            location = %root_location,
            types = model.type_count(),
            elements = model.element_count(),
            path = %dump.display(),
            "compiled schema"
        );
        Ok(model)
    }

    /// Release the workspace; failures are logged
    pub fn close(&self) {
        self.workspace.release();
    }

    async fn collect_documents(&self, root: SchemaDocument) -> Result<Vec<LoadedSchema>> {
        let mut loaded = Vec::new();
        let mut seen = HashSet::new();
        let mut queue = VecDeque::new();
        queue.push_back((root.reference.clone(), Some(root.data), None));

        while let Some((reference, data, chameleon)) = queue.pop_front() {
            if !seen.insert(reference.location.clone()) {
                continue;
            }
            let fetched = match data {
                Some(data) => data,
                None => self.loader.load(&reference).await?.data,
            };
            let data = self
                .workspace
                .stage_document(&reference.location, &fetched)
                .await?;

            let text = bom::decode_bytes(&data)
                .map_err(|e| TransformError::compilation(&reference.location, e.to_string()))?
                .into_owned();
            let directives = scan_directives(&reference.location, &text)?;

            let namespace = directives.target_namespace.clone().or(chameleon.clone());
            for directive in directives.references {
                let child = reference.resolve(&directive.location)?;
                let child_chameleon = match directive.kind {
                    DirectiveKind::Include => namespace.clone(),
                    DirectiveKind::Import => None,
                };
                queue.push_back((child, None, child_chameleon));
            }

            let is_chameleon = directives.target_namespace.is_none() && chameleon.is_some();
            loaded.push(LoadedSchema {
                reference,
                text,
                target_namespace: namespace,
                chameleon: is_chameleon,
            });
        }

        Ok(loaded)
    }
}

/// A collected schema document
struct LoadedSchema {
    reference: SchemaReference,
    text: String,
    target_namespace: Option<String>,
    /// Included without a target namespace; adopts the includer's
    chameleon: bool,
}

enum DirectiveKind {
    Include,
    Import,
}

struct Directive {
    kind: DirectiveKind,
    location: String,
}

struct Directives {
    target_namespace: Option<String>,
    references: Vec<Directive>,
}

fn parsing_options<'input>() -> ParsingOptions<'input> {
    ParsingOptions {
        allow_dtd: true,
        ..ParsingOptions::default()
    }
}

fn parse_schema_document<'t>(location: &str, text: &'t str) -> Result<Document<'t>> {
    let document = Document::parse_with_options(text, parsing_options())
        .map_err(|e| TransformError::compilation(location, format!("malformed schema: {}", e)))?;
    let root = document.root_element();
    if !is_xs(&root, "schema") {
        return Err(TransformError::compilation(
            location,
            format!(
                "root element <{}> is not an XML Schema xs:schema",
                root.tag_name().name()
            ),
        ));
    }
    Ok(document)
}

fn scan_directives(location: &str, text: &str) -> Result<Directives> {
    let document = parse_schema_document(location, text)?;
    let root = document.root_element();
    let references = xs_children(root)
        .filter_map(|child| {
            let kind = match child.tag_name().name() {
                "include" => DirectiveKind::Include,
                "import" => DirectiveKind::Import,
                _ => return None,
            };
            child.attribute("schemaLocation").map(|location| Directive {
                kind,
                location: location.to_string(),
            })
        })
        .collect();
    Ok(Directives {
        target_namespace: root.attribute("targetNamespace").map(str::to_string),
        references,
    })
}

fn is_xs(node: &Node, local: &str) -> bool {
    node.is_element()
        && node.tag_name().namespace() == Some(XS_NAMESPACE)
        && node.tag_name().name() == local
}

/// XSD element children, annotations excluded
fn xs_children<'a, 'input: 'a>(node: Node<'a, 'input>) -> impl Iterator<Item = Node<'a, 'input>> {
    node.children().filter(|child| {
        child.is_element()
            && child.tag_name().namespace() == Some(XS_NAMESPACE)
            && child.tag_name().name() != "annotation"
    })
}

fn documentation(node: Node) -> Option<String> {
    let annotation = node.children().find(|child| is_xs(child, "annotation"))?;
    let text: Vec<String> = annotation
        .children()
        .filter(|child| is_xs(child, "documentation"))
        .map(|doc| {
            doc.descendants()
                .filter(|n| n.is_text())
                .filter_map(|n| n.text())
                .collect::<String>()
                .split_whitespace()
                .collect::<Vec<_>>()
                .join(" ")
        })
        .filter(|text| !text.is_empty())
        .collect();
    if text.is_empty() {
        None
    } else {
        Some(text.join(" "))
    }
}

fn bool_attribute(node: Node, name: &str) -> bool {
    matches!(node.attribute(name).map(str::trim), Some("true") | Some("1"))
}

/// Compile collected documents into a model
fn build_model(root_location: &str, loaded: &[LoadedSchema]) -> Result<BindingModel> {
    let documents = loaded
        .iter()
        .map(|schema| parse_schema_document(&schema.reference.location, &schema.text))
        .collect::<Result<Vec<_>>>()?;

    let mut builder = ModelBuilder::new(loaded, &documents);
    builder.register_builtins();
    builder.register_globals()?;
    builder.build_globals()?;
    builder.finish(root_location)
}

struct DocContext<'d, 'input> {
    location: &'d str,
    root: Node<'d, 'input>,
    target_namespace: Option<&'d str>,
    chameleon: bool,
    element_qualified: bool,
    attribute_qualified: bool,
}

type Component<'d, 'input> = (usize, Node<'d, 'input>);

enum Slot {
    Pending(String),
    Ready(TypeDescriptor),
}

#[derive(Clone)]
struct GlobalElement {
    decl: ElementDecl,
    wrapped: bool,
}

struct ModelBuilder<'d, 'input> {
    docs: Vec<DocContext<'d, 'input>>,
    type_defs: HashMap<QName, Component<'d, 'input>>,
    element_defs: HashMap<QName, Component<'d, 'input>>,
    group_defs: HashMap<QName, Component<'d, 'input>>,
    attribute_group_defs: HashMap<QName, Component<'d, 'input>>,
    attribute_defs: HashMap<QName, Component<'d, 'input>>,
    slots: Vec<Slot>,
    named_ids: HashMap<QName, TypeId>,
    global_elements: HashMap<QName, GlobalElement>,
    element_order: Vec<QName>,
    used_names: HashSet<String>,
    expanding_groups: Vec<QName>,
    expanding_attribute_groups: Vec<QName>,
}

impl<'d, 'input> ModelBuilder<'d, 'input> {
    fn new(loaded: &'d [LoadedSchema], documents: &'d [Document<'input>]) -> Self {
        let docs = loaded
            .iter()
            .zip(documents)
            .map(|(schema, document)| {
                let root = document.root_element();
                DocContext {
                    location: &schema.reference.location,
                    root,
                    target_namespace: schema.target_namespace.as_deref(),
                    chameleon: schema.chameleon,
                    element_qualified: root.attribute("elementFormDefault") == Some("qualified"),
                    attribute_qualified: root.attribute("attributeFormDefault")
                        == Some("qualified"),
                }
            })
            .collect();

        Self {
            docs,
            type_defs: HashMap::new(),
            element_defs: HashMap::new(),
            group_defs: HashMap::new(),
            attribute_group_defs: HashMap::new(),
            attribute_defs: HashMap::new(),
            slots: Vec::new(),
            named_ids: HashMap::new(),
            global_elements: HashMap::new(),
            element_order: Vec::new(),
            used_names: HashSet::new(),
            expanding_groups: Vec::new(),
            expanding_attribute_groups: Vec::new(),
        }
    }

    fn error(&self, doc: usize, node: Node, message: impl AsRef<str>) -> TransformError {
        let position = node.document().text_pos_at(node.range().start);
        TransformError::compilation(
            self.docs[doc].location,
            format!("{} at {}:{}", message.as_ref(), position.row, position.col),
        )
    }

    fn register_builtins(&mut self) {
        let any_type = self.push_ready(TypeDescriptor {
            name: "xs:anyType".to_string(),
            qname: Some(QName::xs("anyType")),
            anonymous: false,
            doc: None,
            body: TypeBody::AnyType,
            mapping: Mapping::Unsupported("is not a supported type".to_string()),
            record_schema: None,
        });
        self.named_ids.insert(QName::xs("anyType"), any_type);

        for builtin in BuiltinType::all() {
            let qname = QName::xs(builtin.local_name());
            let id = self.push_ready(TypeDescriptor {
                name: builtin.display_name(),
                qname: Some(qname.clone()),
                anonymous: false,
                doc: None,
                body: TypeBody::Simple(SimpleType::atomic(*builtin)),
                mapping: Mapping::Scalar(builtin.record_kind(None)),
                record_schema: None,
            });
            self.named_ids.insert(qname, id);
        }

        // the built-in list types refer to their (already registered) item types
        for builtin in BuiltinType::all() {
            if let Some(item) = builtin.list_item() {
                let id = self.named_ids[&QName::xs(builtin.local_name())];
                let item_id = self.named_ids[&QName::xs(item.local_name())];
                if let Slot::Ready(descriptor) = &mut self.slots[id] {
                    descriptor.body = TypeBody::Simple(SimpleType {
                        variety: SimpleVariety::List(item_id),
                        facets: Default::default(),
                    });
                }
            }
        }
    }

    fn push_ready(&mut self, descriptor: TypeDescriptor) -> TypeId {
        self.used_names.insert(descriptor.name.clone());
        self.slots.push(Slot::Ready(descriptor));
        self.slots.len() - 1
    }

    fn push_pending(&mut self, name: String) -> TypeId {
        self.used_names.insert(name.clone());
        self.slots.push(Slot::Pending(name));
        self.slots.len() - 1
    }

    fn fill(&mut self, id: TypeId, descriptor: TypeDescriptor) {
        self.slots[id] = Slot::Ready(descriptor);
    }

    /// A stable, unique name for an anonymous type
    fn anonymous_name(&self, path: &str) -> String {
        if !self.used_names.contains(path) {
            return path.to_string();
        }
        (2..)
            .map(|n| format!("{}#{}", path, n))
            .find(|candidate| !self.used_names.contains(candidate))
            .unwrap_or_else(|| path.to_string())
    }

    fn register_globals(&mut self) -> Result<()> {
        for doc in 0..self.docs.len() {
            let root = self.docs[doc].root;
            let namespace = self.docs[doc].target_namespace;
            for child in xs_children(root) {
                let kind = child.tag_name().name();
                if matches!(kind, "include" | "import" | "notation") {
                    continue;
                }
                let Some(name) = child.attribute("name") else {
                    return Err(self.error(doc, child, format!("global xs:{} has no name", kind)));
                };
                let qname = QName::new(namespace, name);
                let table = match kind {
                    "complexType" | "simpleType" => &mut self.type_defs,
                    "element" => &mut self.element_defs,
                    "group" => &mut self.group_defs,
                    "attributeGroup" => &mut self.attribute_group_defs,
                    "attribute" => &mut self.attribute_defs,
                    other => {
                        return Err(self.error(
                            doc,
                            child,
                            format!("unsupported top-level construct xs:{}", other),
                        ));
                    }
                };
                if table.insert(qname.clone(), (doc, child)).is_some() {
                    return Err(self.error(
                        doc,
                        child,
                        format!("duplicate global xs:{} {}", kind, qname),
                    ));
                }
                if kind == "element" {
                    if child.has_attribute("substitutionGroup") {
                        return Err(self.error(
                            doc,
                            child,
                            format!(
                                "unsupported schema construct: substitutionGroup on element {}",
                                qname
                            ),
                        ));
                    }
                    if bool_attribute(child, "abstract") {
                        return Err(self.error(
                            doc,
                            child,
                            format!("unsupported schema construct: abstract element {}", qname),
                        ));
                    }
                    self.element_order.push(qname);
                }
            }
        }
        Ok(())
    }

    fn build_globals(&mut self) -> Result<()> {
        for doc in 0..self.docs.len() {
            let root = self.docs[doc].root;
            let namespace = self.docs[doc].target_namespace;
            for child in xs_children(root) {
                if let ("complexType" | "simpleType", Some(name)) =
                    (child.tag_name().name(), child.attribute("name"))
                {
                    self.named_type(doc, child, &QName::new(namespace, name))?;
                }
            }
        }
        for name in self.element_order.clone() {
            self.global_element(&name)?;
        }
        Ok(())
    }

    fn resolve_qname(&self, doc: usize, node: Node, value: &str) -> Result<QName> {
        let value = value.trim();
        let (prefix, local) = match value.split_once(':') {
            Some((prefix, local)) => (Some(prefix), local),
            None => (None, value),
        };
        let namespace = node.lookup_namespace_uri(prefix);
        if prefix.is_some() && namespace.is_none() {
            return Err(self.error(
                doc,
                node,
                format!("undeclared namespace prefix in '{}'", value),
            ));
        }
        let context = &self.docs[doc];
        let namespace = match namespace {
            None if context.chameleon => context.target_namespace,
            other => other,
        };
        Ok(QName::new(namespace, local))
    }

    /// Type id of a referenced type, compiling it on first use
    fn type_ref(&mut self, doc: usize, node: Node, value: &str) -> Result<TypeId> {
        let qname = self.resolve_qname(doc, node, value)?;
        if let Some(id) = self.named_ids.get(&qname) {
            return Ok(*id);
        }
        match self.type_defs.get(&qname).copied() {
            Some((def_doc, def_node)) => self.named_type(def_doc, def_node, &qname),
            None if qname.namespace() == Some(XS_NAMESPACE) => Err(self.error(
                doc,
                node,
                format!("unknown built-in type {}", qname),
            )),
            None => Err(self.error(doc, node, format!("unresolved type reference {}", qname))),
        }
    }

    fn named_type(&mut self, doc: usize, node: Node<'d, 'input>, qname: &QName) -> Result<TypeId> {
        if let Some(id) = self.named_ids.get(qname) {
            return Ok(*id);
        }
        let name = qname.to_string();
        let id = self.push_pending(name.clone());
        self.named_ids.insert(qname.clone(), id);

        let body = self.type_body(doc, node, &name)?;
        self.fill(
            id,
            TypeDescriptor {
                name,
                qname: Some(qname.clone()),
                anonymous: false,
                doc: documentation(node),
                body,
                mapping: Mapping::Composite,
                record_schema: None,
            },
        );
        Ok(id)
    }

    fn type_body(&mut self, doc: usize, node: Node<'d, 'input>, name: &str) -> Result<TypeBody> {
        if is_xs(&node, "complexType") {
            Ok(TypeBody::Complex(self.complex_type(doc, node, name)?))
        } else {
            Ok(TypeBody::Simple(self.simple_type(doc, node, name)?))
        }
    }

    /// Register an inline (anonymous) type definition
    fn anonymous_type(&mut self, doc: usize, node: Node<'d, 'input>, path: &str) -> Result<TypeId> {
        let name = self.anonymous_name(path);
        let id = self.push_pending(name.clone());
        self.fill_anonymous(doc, node, id, name)?;
        Ok(id)
    }

    fn fill_anonymous(
        &mut self,
        doc: usize,
        node: Node<'d, 'input>,
        id: TypeId,
        name: String,
    ) -> Result<()> {
        let body = self.type_body(doc, node, &name)?;
        self.fill(
            id,
            TypeDescriptor {
                name,
                qname: None,
                anonymous: true,
                doc: documentation(node),
                body,
                mapping: Mapping::Composite,
                record_schema: None,
            },
        );
        Ok(())
    }

    fn ready(&self, doc: usize, node: Node, id: TypeId) -> Result<&TypeDescriptor> {
        match &self.slots[id] {
            Slot::Ready(descriptor) => Ok(descriptor),
            Slot::Pending(name) => Err(self.error(
                doc,
                node,
                format!("type {} is derived from itself", name),
            )),
        }
    }

    fn simple_base(&self, doc: usize, node: Node, id: TypeId) -> Result<SimpleType> {
        let descriptor = self.ready(doc, node, id)?;
        descriptor.simple().cloned().ok_or_else(|| {
            self.error(
                doc,
                node,
                format!("{} is not a simple type", descriptor.name),
            )
        })
    }

    fn any_type_id(&self) -> TypeId {
        self.named_ids[&QName::xs("anyType")]
    }

    fn builtin_id(&self, builtin: BuiltinType) -> TypeId {
        self.named_ids[&QName::xs(builtin.local_name())]
    }

    // ---- simple types ----

    fn simple_type(&mut self, doc: usize, node: Node<'d, 'input>, name: &str) -> Result<SimpleType> {
        let Some(derivation) = xs_children(node).next() else {
            return Err(self.error(doc, node, format!("simple type {} has no derivation", name)));
        };
        match derivation.tag_name().name() {
            "restriction" => self.simple_restriction(doc, derivation, name),
            "list" => {
                let item = match derivation.attribute("itemType") {
                    Some(item) => self.type_ref(doc, derivation, item)?,
                    None => {
                        let inline = xs_children(derivation)
                            .find(|child| is_xs(child, "simpleType"))
                            .ok_or_else(|| {
                                self.error(doc, derivation, "xs:list needs an item type")
                            })?;
                        self.anonymous_type(doc, inline, &format!("{}.item", name))?
                    }
                };
                self.simple_base(doc, derivation, item)?;
                Ok(SimpleType {
                    variety: SimpleVariety::List(item),
                    facets: Default::default(),
                })
            }
            "union" => {
                let mut members = Vec::new();
                if let Some(types) = derivation.attribute("memberTypes") {
                    for member in types.split_whitespace() {
                        members.push(self.type_ref(doc, derivation, member)?);
                    }
                }
                for (index, inline) in xs_children(derivation)
                    .filter(|child| is_xs(child, "simpleType"))
                    .enumerate()
                {
                    members.push(self.anonymous_type(
                        doc,
                        inline,
                        &format!("{}.member{}", name, index + 1),
                    )?);
                }
                if members.is_empty() {
                    return Err(self.error(doc, derivation, "xs:union has no member types"));
                }
                for member in &members {
                    self.simple_base(doc, derivation, *member)?;
                }
                Ok(SimpleType {
                    variety: SimpleVariety::Union(members),
                    facets: Default::default(),
                })
            }
            other => Err(self.error(
                doc,
                derivation,
                format!("unsupported simple type derivation xs:{}", other),
            )),
        }
    }

    fn simple_restriction(
        &mut self,
        doc: usize,
        restriction: Node<'d, 'input>,
        name: &str,
    ) -> Result<SimpleType> {
        let base = match restriction.attribute("base") {
            Some(base) => {
                let id = self.type_ref(doc, restriction, base)?;
                self.simple_base(doc, restriction, id)?
            }
            None => {
                let inline = xs_children(restriction)
                    .find(|child| is_xs(child, "simpleType"))
                    .ok_or_else(|| self.error(doc, restriction, "xs:restriction needs a base"))?;
                self.simple_type(doc, inline, &format!("{}.base", name))?
            }
        };
        self.apply_facets(doc, restriction, base)
    }

    fn apply_facets(
        &self,
        doc: usize,
        restriction: Node,
        base: SimpleType,
    ) -> Result<SimpleType> {
        let mut specs = Vec::new();
        for facet in xs_children(restriction) {
            let facet_name = facet.tag_name().name();
            if matches!(
                facet_name,
                "simpleType" | "attribute" | "attributeGroup" | "anyAttribute"
                    | "sequence" | "choice" | "all" | "group"
            ) {
                continue;
            }
            let value = facet.attribute("value").ok_or_else(|| {
                self.error(doc, facet, format!("facet xs:{} has no value", facet_name))
            })?;
            specs.push((facet_name.to_string(), value.to_string()));
        }
        if specs.is_empty() {
            return Ok(base);
        }
        let facets = base
            .facets
            .restrict(base.primitive(), &specs)
            .map_err(|reason| self.error(doc, restriction, reason))?;
        Ok(SimpleType {
            variety: base.variety,
            facets,
        })
    }

    // ---- complex types ----

    fn complex_type(
        &mut self,
        doc: usize,
        node: Node<'d, 'input>,
        name: &str,
    ) -> Result<ComplexType> {
        let mixed = bool_attribute(node, "mixed");

        match xs_children(node).next() {
            Some(content) if is_xs(&content, "simpleContent") => {
                self.simple_content(doc, content, name)
            }
            Some(content) if is_xs(&content, "complexContent") => {
                let mixed = match content.attribute("mixed") {
                    Some(_) => bool_attribute(content, "mixed"),
                    None => mixed,
                };
                self.complex_content(doc, content, name, mixed)
            }
            _ => {
                let mut attributes = Vec::new();
                let mut any_attribute = None;
                self.collect_attributes(doc, node, name, &mut attributes, &mut any_attribute)?;
                let particle = self.content_particle(doc, node, name)?;
                Ok(ComplexType {
                    attributes,
                    any_attribute,
                    content: element_content(particle, mixed),
                    fields: Vec::new(),
                })
            }
        }
    }

    fn derivation<'n>(
        &self,
        doc: usize,
        content: Node<'n, 'input>,
    ) -> Result<(Node<'n, 'input>, bool)> {
        let derivation = xs_children(content)
            .find(|child| is_xs(child, "extension") || is_xs(child, "restriction"))
            .ok_or_else(|| self.error(doc, content, "expected xs:extension or xs:restriction"))?;
        Ok((derivation, is_xs(&derivation, "extension")))
    }

    fn simple_content(
        &mut self,
        doc: usize,
        content: Node<'d, 'input>,
        name: &str,
    ) -> Result<ComplexType> {
        let (derivation, is_extension) = self.derivation(doc, content)?;
        let base_attr = derivation
            .attribute("base")
            .ok_or_else(|| self.error(doc, derivation, "derivation has no base"))?;
        let base_id = self.type_ref(doc, derivation, base_attr)?;
        let base = self.ready(doc, derivation, base_id)?.body.clone();

        let (inherited, inherited_any, base_value) = match base {
            TypeBody::Simple(_) => (Vec::new(), None, base_id),
            TypeBody::Complex(ComplexType {
                attributes,
                any_attribute,
                content: Content::Simple { type_id },
                ..
            }) => (attributes, any_attribute, type_id),
            _ => {
                return Err(self.error(
                    doc,
                    derivation,
                    format!("simpleContent base {} has no simple content", base_attr),
                ));
            }
        };

        let value_type = if is_extension {
            base_value
        } else {
            let inline = xs_children(derivation).find(|child| is_xs(child, "simpleType"));
            let restricted_base = match inline {
                Some(inline) => self.simple_type(doc, inline, &format!("{}.value", name))?,
                None => self.simple_base(doc, derivation, base_value)?,
            };
            let restricted = self.apply_facets(doc, derivation, restricted_base)?;
            let value_name = self.anonymous_name(&format!("{}.value", name));
            self.push_ready(TypeDescriptor {
                name: value_name,
                qname: None,
                anonymous: true,
                doc: None,
                body: TypeBody::Simple(restricted),
                mapping: Mapping::Composite,
                record_schema: None,
            })
        };

        let mut own = Vec::new();
        let mut own_any = None;
        let prohibited = self.collect_attributes(doc, derivation, name, &mut own, &mut own_any)?;
        let attributes = merge_attributes(inherited, own, &prohibited, is_extension);

        Ok(ComplexType {
            attributes,
            any_attribute: own_any.or(inherited_any),
            content: Content::Simple {
                type_id: value_type,
            },
            fields: Vec::new(),
        })
    }

    fn complex_content(
        &mut self,
        doc: usize,
        content: Node<'d, 'input>,
        name: &str,
        mixed: bool,
    ) -> Result<ComplexType> {
        let (derivation, is_extension) = self.derivation(doc, content)?;
        let base_attr = derivation
            .attribute("base")
            .ok_or_else(|| self.error(doc, derivation, "derivation has no base"))?;
        let base_id = self.type_ref(doc, derivation, base_attr)?;

        let (inherited, inherited_any, base_particle) = match &self.ready(doc, derivation, base_id)?.body {
            TypeBody::AnyType => (Vec::new(), None, None),
            TypeBody::Complex(base) => {
                let particle = match &base.content {
                    Content::Elements { particle, .. } => Some(particle.clone()),
                    Content::Empty => None,
                    Content::Simple { .. } => {
                        return Err(self.error(
                            doc,
                            derivation,
                            format!("complexContent base {} has simple content", base_attr),
                        ));
                    }
                };
                (base.attributes.clone(), base.any_attribute.clone(), particle)
            }
            TypeBody::Simple(_) => {
                return Err(self.error(
                    doc,
                    derivation,
                    format!("complexContent base {} is a simple type", base_attr),
                ));
            }
        };

        let mut own = Vec::new();
        let mut own_any = None;
        let prohibited = self.collect_attributes(doc, derivation, name, &mut own, &mut own_any)?;
        let own_particle = self.content_particle(doc, derivation, name)?;

        let particle = if is_extension {
            match (base_particle, own_particle) {
                (Some(base), Some(own)) => Some(Particle {
                    occurs: Occurs::ONCE,
                    term: Term::Sequence {
                        particles: vec![base, own],
                    },
                }),
                (base, own) => base.or(own),
            }
        } else {
            own_particle
        };

        Ok(ComplexType {
            attributes: merge_attributes(inherited, own, &prohibited, is_extension),
            any_attribute: own_any.or(inherited_any),
            content: element_content(particle, mixed),
            fields: Vec::new(),
        })
    }

    // ---- attributes ----

    fn collect_attributes(
        &mut self,
        doc: usize,
        parent: Node<'d, 'input>,
        owner: &str,
        attributes: &mut Vec<AttributeUse>,
        any_attribute: &mut Option<Wildcard>,
    ) -> Result<Vec<String>> {
        let mut prohibited = Vec::new();
        for child in xs_children(parent) {
            match child.tag_name().name() {
                "attribute" => {
                    if let Some(attribute) = self.attribute_use(doc, child, owner)? {
                        attributes.retain(|existing| existing.name != attribute.name);
                        attributes.push(attribute);
                    } else if let Some(name) = child.attribute("name").or(child.attribute("ref")) {
                        let local = name.rsplit(':').next().unwrap_or(name);
                        attributes.retain(|existing| existing.name.local_name() != local);
                        prohibited.push(local.to_string());
                    }
                }
                "attributeGroup" => {
                    let reference = child.attribute("ref").ok_or_else(|| {
                        self.error(doc, child, "local xs:attributeGroup needs a ref")
                    })?;
                    let qname = self.resolve_qname(doc, child, reference)?;
                    if self.expanding_attribute_groups.contains(&qname) {
                        return Err(self.error(
                            doc,
                            child,
                            format!("circular attribute group {}", qname),
                        ));
                    }
                    let (group_doc, group) = self
                        .attribute_group_defs
                        .get(&qname)
                        .copied()
                        .ok_or_else(|| {
                            self.error(doc, child, format!("unresolved attribute group {}", qname))
                        })?;
                    self.expanding_attribute_groups.push(qname);
                    let result =
                        self.collect_attributes(group_doc, group, owner, attributes, any_attribute);
                    self.expanding_attribute_groups.pop();
                    prohibited.extend(result?);
                }
                "anyAttribute" => {
                    *any_attribute = Some(self.wildcard(doc, child));
                }
                _ => {}
            }
        }
        Ok(prohibited)
    }

    /// `None` for prohibited uses
    fn attribute_use(
        &mut self,
        doc: usize,
        node: Node<'d, 'input>,
        owner: &str,
    ) -> Result<Option<AttributeUse>> {
        let usage = node.attribute("use").map(str::trim).unwrap_or("optional");
        if usage == "prohibited" {
            return Ok(None);
        }

        let (name, type_id, default, fixed) = if let Some(reference) = node.attribute("ref") {
            let qname = self.resolve_qname(doc, node, reference)?;
            let (def_doc, def) = self.attribute_defs.get(&qname).copied().ok_or_else(|| {
                self.error(doc, node, format!("unresolved attribute reference {}", qname))
            })?;
            let type_id = self.attribute_type(def_doc, def, &format!("@{}", qname.local_name()))?;
            (
                qname,
                type_id,
                def.attribute("default").map(str::to_string),
                def.attribute("fixed").map(str::to_string),
            )
        } else {
            let local = node
                .attribute("name")
                .ok_or_else(|| self.error(doc, node, "xs:attribute needs a name or ref"))?;
            let context = &self.docs[doc];
            let qualified = match node.attribute("form") {
                Some(form) => form == "qualified",
                None => context.attribute_qualified,
            };
            let namespace = if qualified { context.target_namespace } else { None };
            let type_id = self.attribute_type(doc, node, &format!("{}.@{}", owner, local))?;
            (QName::new(namespace, local), type_id, None, None)
        };

        Ok(Some(AttributeUse {
            name,
            type_id,
            required: usage == "required",
            default: node.attribute("default").map(str::to_string).or(default),
            fixed: node.attribute("fixed").map(str::to_string).or(fixed),
        }))
    }

    fn attribute_type(&mut self, doc: usize, node: Node<'d, 'input>, path: &str) -> Result<TypeId> {
        let id = if let Some(type_name) = node.attribute("type") {
            self.type_ref(doc, node, type_name)?
        } else if let Some(inline) = xs_children(node).find(|child| is_xs(child, "simpleType")) {
            self.anonymous_type(doc, inline, path)?
        } else {
            self.builtin_id(BuiltinType::AnySimpleType)
        };
        self.simple_base(doc, node, id)?;
        Ok(id)
    }

    fn wildcard(&self, doc: usize, node: Node) -> Wildcard {
        let target = self.docs[doc].target_namespace;
        match node.attribute("namespace").map(str::trim) {
            None | Some("##any") => Wildcard::Any,
            Some("##other") => Wildcard::Other(target.map(str::to_string)),
            Some(list) => Wildcard::List(
                list.split_whitespace()
                    .map(|entry| match entry {
                        "##targetNamespace" => target.map(str::to_string),
                        "##local" => None,
                        uri => Some(uri.to_string()),
                    })
                    .collect(),
            ),
        }
    }

    // ---- content models ----

    fn content_particle(
        &mut self,
        doc: usize,
        parent: Node<'d, 'input>,
        owner: &str,
    ) -> Result<Option<Particle>> {
        match xs_children(parent).find(|child| {
            matches!(
                child.tag_name().name(),
                "sequence" | "choice" | "all" | "group"
            )
        }) {
            Some(group) => self.particle(doc, group, owner),
            None => Ok(None),
        }
    }

    fn occurs(&self, doc: usize, node: Node) -> Result<Occurs> {
        let parse = |name: &str, value: &str| {
            value.trim().parse::<u32>().map_err(|_| {
                self.error(doc, node, format!("invalid {} value '{}'", name, value))
            })
        };
        let min = match node.attribute("minOccurs") {
            Some(value) => parse("minOccurs", value)?,
            None => 1,
        };
        let max = match node.attribute("maxOccurs").map(str::trim) {
            None => Some(1),
            Some("unbounded") => None,
            Some(value) => Some(parse("maxOccurs", value)?),
        };
        if let Some(max) = max
            && max < min
        {
            return Err(self.error(doc, node, format!("maxOccurs {} is below minOccurs {}", max, min)));
        }
        Ok(Occurs { min, max })
    }

    fn particle(
        &mut self,
        doc: usize,
        node: Node<'d, 'input>,
        owner: &str,
    ) -> Result<Option<Particle>> {
        let occurs = self.occurs(doc, node)?;
        if occurs.max == Some(0) {
            return Ok(None);
        }

        let term = match node.tag_name().name() {
            "element" => Term::Element(self.local_element(doc, node, owner)?),
            "sequence" => Term::Sequence {
                particles: self.particles(doc, node, owner)?,
            },
            "choice" => Term::Choice {
                particles: self.particles(doc, node, owner)?,
            },
            "all" => Term::All {
                particles: self.particles(doc, node, owner)?,
            },
            "any" => Term::Any(self.wildcard(doc, node)),
            "group" => return self.group_reference(doc, node, owner, occurs),
            other => {
                return Err(self.error(
                    doc,
                    node,
                    format!("unsupported content model construct xs:{}", other),
                ));
            }
        };
        Ok(Some(Particle { occurs, term }))
    }

    fn particles(
        &mut self,
        doc: usize,
        node: Node<'d, 'input>,
        owner: &str,
    ) -> Result<Vec<Particle>> {
        let mut particles = Vec::new();
        for child in xs_children(node) {
            if let Some(particle) = self.particle(doc, child, owner)? {
                particles.push(particle);
            }
        }
        Ok(particles)
    }

    fn group_reference(
        &mut self,
        doc: usize,
        node: Node<'d, 'input>,
        owner: &str,
        occurs: Occurs,
    ) -> Result<Option<Particle>> {
        let reference = node
            .attribute("ref")
            .ok_or_else(|| self.error(doc, node, "local xs:group needs a ref"))?;
        let qname = self.resolve_qname(doc, node, reference)?;
        if self.expanding_groups.contains(&qname) {
            return Err(self.error(doc, node, format!("circular model group {}", qname)));
        }
        let (group_doc, group) = self
            .group_defs
            .get(&qname)
            .copied()
            .ok_or_else(|| self.error(doc, node, format!("unresolved model group {}", qname)))?;
        let Some(model) = xs_children(group).next() else {
            return Ok(None);
        };

        self.expanding_groups.push(qname);
        let inner = self.particle(group_doc, model, owner);
        self.expanding_groups.pop();

        Ok(inner?.map(|particle| Particle {
            occurs,
            term: particle.term,
        }))
    }

    fn local_element(
        &mut self,
        doc: usize,
        node: Node<'d, 'input>,
        owner: &str,
    ) -> Result<ElementDecl> {
        if let Some(reference) = node.attribute("ref") {
            let qname = self.resolve_qname(doc, node, reference)?;
            if !self.element_defs.contains_key(&qname) {
                return Err(self.error(
                    doc,
                    node,
                    format!("unresolved element reference {}", qname),
                ));
            }
            return Ok(self.global_element(&qname)?.decl);
        }

        let local = node
            .attribute("name")
            .ok_or_else(|| self.error(doc, node, "xs:element needs a name or ref"))?;
        let context = &self.docs[doc];
        let qualified = match node.attribute("form") {
            Some(form) => form == "qualified",
            None => context.element_qualified,
        };
        let namespace = if qualified { context.target_namespace } else { None };
        let path = format!("{}.{}", owner, local);
        let type_id = self.element_type(doc, node, &path)?;

        Ok(ElementDecl {
            name: QName::new(namespace, local),
            type_id,
            nillable: bool_attribute(node, "nillable"),
            default: node.attribute("default").map(str::to_string),
            fixed: node.attribute("fixed").map(str::to_string),
        })
    }

    fn element_type(&mut self, doc: usize, node: Node<'d, 'input>, path: &str) -> Result<TypeId> {
        if let Some(type_name) = node.attribute("type") {
            return self.type_ref(doc, node, type_name);
        }
        match xs_children(node).find(|child| is_xs(child, "complexType") || is_xs(child, "simpleType")) {
            Some(inline) => self.anonymous_type(doc, inline, path),
            None => Ok(self.any_type_id()),
        }
    }

    fn global_element(&mut self, qname: &QName) -> Result<GlobalElement> {
        if let Some(element) = self.global_elements.get(qname) {
            return Ok(element.clone());
        }
        let Some((doc, node)) = self.element_defs.get(qname).copied() else {
            let location = self.docs.first().map(|d| d.location).unwrap_or_default();
            return Err(TransformError::compilation(
                location,
                format!("unresolved element reference {}", qname),
            ));
        };

        let decl = |type_id: TypeId| ElementDecl {
            name: qname.clone(),
            type_id,
            nillable: bool_attribute(node, "nillable"),
            default: node.attribute("default").map(str::to_string),
            fixed: node.attribute("fixed").map(str::to_string),
        };

        let inline = xs_children(node)
            .find(|child| is_xs(child, "complexType") || is_xs(child, "simpleType"));
        let element = match (node.attribute("type"), inline) {
            (None, Some(inline)) => {
                // registered before its body so recursive references resolve
                let name = self.anonymous_name(qname.local_name());
                let id = self.push_pending(name.clone());
                let element = GlobalElement {
                    decl: decl(id),
                    wrapped: !is_xs(&inline, "complexType"),
                };
                self.global_elements.insert(qname.clone(), element.clone());
                self.fill_anonymous(doc, inline, id, name)?;
                element
            }
            (Some(type_name), _) => GlobalElement {
                decl: decl(self.type_ref(doc, node, type_name)?),
                wrapped: true,
            },
            (None, None) => GlobalElement {
                decl: decl(self.any_type_id()),
                wrapped: true,
            },
        };
        self.global_elements.insert(qname.clone(), element.clone());
        Ok(element)
    }

    // ---- link ----

    fn finish(self, root_location: &str) -> Result<BindingModel> {
        let mut types = Vec::with_capacity(self.slots.len());
        for slot in self.slots {
            match slot {
                Slot::Ready(descriptor) => types.push(descriptor),
                Slot::Pending(name) => {
                    return Err(TransformError::compilation(
                        root_location,
                        format!("type {} was never completed", name),
                    ));
                }
            }
        }

        let field_plans: Vec<std::result::Result<Vec<FieldPlan>, String>> = types
            .iter()
            .map(|descriptor| match &descriptor.body {
                TypeBody::Complex(complex) => plan_fields(complex, &types),
                _ => Ok(Vec::new()),
            })
            .collect();

        let mut conflicts = HashMap::new();
        for (id, plans) in field_plans.into_iter().enumerate() {
            match plans {
                Ok(plans) => {
                    if let TypeBody::Complex(complex) = &mut types[id].body {
                        complex.fields = plans;
                    }
                }
                Err(reason) => {
                    conflicts.insert(id, reason);
                }
            }
        }

        let mut linker = Linker {
            types: &types,
            conflicts: &conflicts,
            states: vec![LinkState::Unvisited; types.len()],
        };
        for id in 0..types.len() {
            linker.link(id);
        }
        let states = linker.states;

        for (descriptor, state) in types.iter_mut().zip(states) {
            match state {
                LinkState::Done(Ok(schema)) => {
                    descriptor.mapping = match &descriptor.body {
                        TypeBody::Complex(_) => Mapping::Composite,
                        _ => Mapping::Scalar(schema.kind().clone()),
                    };
                    descriptor.record_schema = Some(schema);
                }
                LinkState::Done(Err(reason)) => {
                    if descriptor.complex().is_some() {
                        debug!(type_name = %descriptor.name, %reason, "type cannot be mapped to a record");
                    }
                    descriptor.mapping = Mapping::Unsupported(reason);
                    descriptor.record_schema = None;
                }
                LinkState::Unvisited | LinkState::InProgress => {}
            }
        }

        let mut elements = Vec::with_capacity(self.element_order.len());
        for name in &self.element_order {
            if let Some(global) = self.global_elements.get(name) {
                elements.push(ElementBinding {
                    name: global.decl.name.clone(),
                    type_id: global.decl.type_id,
                    nillable: global.decl.nillable,
                    wrapped: global.wrapped,
                });
            }
        }
        if elements.is_empty() {
            warn!(location = root_location, "schema declares no global elements");
        }

        let target_namespace = self
            .docs
            .first()
            .and_then(|doc| doc.target_namespace)
            .map(str::to_string);
        Ok(BindingModel::new(
            root_location.to_string(),
            target_namespace,
            types,
            elements,
        ))
    }
}

fn element_content(particle: Option<Particle>, mixed: bool) -> Content {
    match particle {
        Some(particle) => Content::Elements { particle, mixed },
        None if mixed => Content::Elements {
            particle: Particle {
                occurs: Occurs::ONCE,
                term: Term::Sequence {
                    particles: Vec::new(),
                },
            },
            mixed,
        },
        None => Content::Empty,
    }
}

/// Extension appends to the inherited uses; restriction overrides them by name
/// and drops the prohibited ones
fn merge_attributes(
    inherited: Vec<AttributeUse>,
    own: Vec<AttributeUse>,
    prohibited: &[String],
    is_extension: bool,
) -> Vec<AttributeUse> {
    let mut merged = inherited;
    if !is_extension {
        merged.retain(|attribute| !prohibited.iter().any(|p| p == attribute.name.local_name()));
    }
    for attribute in own {
        if let Some(existing) = merged.iter_mut().find(|a| a.name == attribute.name) {
            if !is_extension {
                *existing = attribute;
            }
        } else {
            merged.push(attribute);
        }
    }
    merged
}

struct Occurrence {
    name: QName,
    type_id: TypeId,
    min: u64,
    max: Option<u64>,
    count: usize,
    nillable: bool,
}

fn multiply(a: Option<u64>, b: Option<u32>) -> Option<u64> {
    Some(a?.saturating_mul(u64::from(b?)))
}

fn collect_occurrences(
    particle: &Particle,
    min: u64,
    max: Option<u64>,
    out: &mut Vec<Occurrence>,
) {
    let min = min.saturating_mul(u64::from(particle.occurs.min));
    let max = multiply(max, particle.occurs.max);
    match &particle.term {
        Term::Element(decl) => {
            if let Some(existing) = out
                .iter_mut()
                .find(|o| o.name.local_name() == decl.name.local_name())
            {
                existing.min = existing.min.saturating_add(min);
                existing.max = existing.max.zip(max).map(|(a, b)| a.saturating_add(b));
                existing.count += 1;
                existing.nillable |= decl.nillable;
                if existing.name != decl.name || existing.type_id != decl.type_id {
                    // marks a conflict; reported by the caller
                    existing.type_id = usize::MAX;
                }
            } else {
                out.push(Occurrence {
                    name: decl.name.clone(),
                    type_id: decl.type_id,
                    min,
                    max,
                    count: 1,
                    nillable: decl.nillable,
                });
            }
        }
        Term::Sequence { particles } | Term::All { particles } => {
            for child in particles {
                collect_occurrences(child, min, max, out);
            }
        }
        Term::Choice { particles } => {
            let branch_min = if particles.len() > 1 { 0 } else { min };
            for child in particles {
                collect_occurrences(child, branch_min, max, out);
            }
        }
        Term::Any(_) => {}
    }
}

/// Record fields of a complex type: attributes, then elements, then the text value
fn plan_fields(
    complex: &ComplexType,
    types: &[TypeDescriptor],
) -> std::result::Result<Vec<FieldPlan>, String> {
    let mut plans: Vec<FieldPlan> = complex
        .attributes
        .iter()
        .map(|attribute| FieldPlan {
            name: attribute.name.local_name().to_string(),
            key: attribute_key(attribute.name.local_name()),
            source: FieldSource::Attribute,
            type_id: attribute.type_id,
            repeated: false,
            optional: !attribute.required
                && attribute.default.is_none()
                && attribute.fixed.is_none(),
            nillable: false,
        })
        .collect();

    match &complex.content {
        Content::Elements { particle, .. } => {
            let mut occurrences = Vec::new();
            collect_occurrences(particle, 1, Some(1), &mut occurrences);
            for occurrence in occurrences {
                if occurrence.type_id == usize::MAX {
                    return Err(format!(
                        "declares element {} more than once with different types",
                        occurrence.name.local_name()
                    ));
                }
                if matches!(types[occurrence.type_id].body, TypeBody::AnyType) {
                    continue;
                }
                let repeated = occurrence.count > 1 || occurrence.max.is_none_or(|max| max > 1);
                plans.push(FieldPlan {
                    name: occurrence.name.local_name().to_string(),
                    key: occurrence.name.local_name().to_string(),
                    source: FieldSource::Element,
                    type_id: occurrence.type_id,
                    repeated,
                    optional: occurrence.min == 0 || (!repeated && occurrence.nillable),
                    nillable: occurrence.nillable,
                });
            }
        }
        Content::Simple { type_id } => plans.push(FieldPlan {
            name: "value".to_string(),
            key: "value".to_string(),
            source: FieldSource::Text,
            type_id: *type_id,
            repeated: false,
            optional: false,
            nillable: false,
        }),
        Content::Empty => {}
    }

    // an attribute sharing its name with a child element or the text becomes `<name>Attribute`
    let content_names: HashSet<String> = plans
        .iter()
        .filter(|plan| plan.source != FieldSource::Attribute)
        .map(|plan| plan.name.clone())
        .collect();
    for plan in plans.iter_mut() {
        if plan.source == FieldSource::Attribute && content_names.contains(&plan.name) {
            plan.name.push_str("Attribute");
        }
    }

    let mut seen = HashSet::new();
    for plan in &plans {
        if !seen.insert(plan.name.as_str()) {
            return Err(format!("has more than one field named {}", plan.name));
        }
    }
    Ok(plans)
}

#[derive(Clone)]
enum LinkState {
    Unvisited,
    InProgress,
    Done(std::result::Result<Arc<Schema>, String>),
}

/// Derives record schemas, detecting types whose schema would be infinite
struct Linker<'a> {
    types: &'a [TypeDescriptor],
    conflicts: &'a HashMap<TypeId, String>,
    states: Vec<LinkState>,
}

impl Linker<'_> {
    fn link(&mut self, id: TypeId) -> std::result::Result<Arc<Schema>, String> {
        match &self.states[id] {
            LinkState::Done(result) => return result.clone(),
            LinkState::InProgress => {
                return Err("has a recursive structure that cannot be represented as a record"
                    .to_string());
            }
            LinkState::Unvisited => {}
        }
        self.states[id] = LinkState::InProgress;
        let result = self.derive(id);
        self.states[id] = LinkState::Done(result.clone());
        result
    }

    fn derive(&mut self, id: TypeId) -> std::result::Result<Arc<Schema>, String> {
        let types = self.types;
        let descriptor = &types[id];
        match &descriptor.body {
            TypeBody::AnyType => Err("is not a supported type".to_string()),
            TypeBody::Simple(simple) => Ok(Arc::new(Schema::new(self.simple_kind(simple)))),
            TypeBody::Complex(complex) => {
                if let Some(reason) = self.conflicts.get(&id) {
                    return Err(reason.clone());
                }
                let mut builder = StructSchemaBuilder::new(descriptor.name.clone());
                if let Some(doc) = &descriptor.doc {
                    builder = builder.doc(doc.clone());
                }
                for plan in &complex.fields {
                    let item = self.link(plan.type_id).map_err(|reason| {
                        format!(
                            "field {} of type {} {}",
                            plan.name, types[plan.type_id].name, reason
                        )
                    })?;
                    let schema = if plan.repeated && plan.nillable {
                        Schema::array(Arc::new((*item).clone().optional()))
                    } else if plan.repeated {
                        Schema::array(item)
                    } else {
                        (*item).clone()
                    };
                    builder = builder
                        .field(plan.name.clone(), schema.with_optional(plan.optional))
                        .map_err(|e| e.to_string())?;
                }
                Ok(Arc::new(builder.build()))
            }
        }
    }

    fn simple_kind(&self, simple: &SimpleType) -> SchemaKind {
        match &simple.variety {
            SimpleVariety::Atomic(builtin) => builtin.record_kind(simple.facets.fraction_digits()),
            SimpleVariety::List(item) => {
                let item_kind = match self.types[*item].simple() {
                    Some(item) => self.simple_kind(item),
                    None => SchemaKind::String,
                };
                SchemaKind::Array {
                    items: Arc::new(Schema::new(item_kind)),
                }
            }
            SimpleVariety::Union(_) => SchemaKind::String,
        }
    }
}

/// Compile schema text directly, without fetching or staging (used by tests)
#[cfg(test)]
pub(crate) fn compile_str(location: &str, text: &str) -> Result<BindingModel> {
    let reference = SchemaReference::parse(location)?;
    let directives = scan_directives(location, text)?;
    let loaded = vec![LoadedSchema {
        reference,
        text: text.to_string(),
        target_namespace: directives.target_namespace,
        chameleon: false,
    }];
    build_model(location, &loaded)
}
