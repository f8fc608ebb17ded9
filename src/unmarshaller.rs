//! Unmarshaller
//!
//! Binds one XML document to a compiled [`BindingModel`]. The document is parsed
//! with `roxmltree` (DTDs rejected), the root element is looked up among the global
//! element bindings, and the element tree is walked against the content models.
//!
//! Matching is greedy with a one-element lookahead on the first set of each particle.
//! That is enough for schemas obeying the Unique Particle Attribution rule, which every
//! valid XSD does.

use std::sync::Arc;

use roxmltree::{Document, Node, ParsingOptions};
use tracing::trace;

use crate::binding::{
    BindingModel, BoundComplex, BoundInstance, BoundObject, BoundValue, ComplexType, Content,
    ElementDecl, Particle, QName, RootElement, Term, TypeBody, TypeId, attribute_key,
};
use crate::bom;
use crate::builtins::XSI_NAMESPACE;
use crate::error::{BindError, BindResult, Position};

/// Binds XML input against one binding model. Cheap to clone and safe to share.
#[derive(Clone)]
pub struct Unmarshaller {
    model: Arc<BindingModel>,
}

/// Element facts needed to bind its content
struct ElementUse<'a> {
    type_id: TypeId,
    nillable: bool,
    default: Option<&'a str>,
    fixed: Option<&'a str>,
}

impl<'a> From<&'a ElementDecl> for ElementUse<'a> {
    fn from(decl: &'a ElementDecl) -> Self {
        Self {
            type_id: decl.type_id,
            nillable: decl.nillable,
            default: decl.default.as_deref(),
            fixed: decl.fixed.as_deref(),
        }
    }
}

fn position(node: Node) -> Position {
    node.document().text_pos_at(node.range().start).into()
}

fn element_name(node: Node) -> String {
    node.tag_name().name().to_string()
}

/// Concatenated character data of an element's direct children
fn text_content(node: Node) -> String {
    node.children()
        .filter(|child| child.is_text())
        .filter_map(|child| child.text())
        .collect()
}

fn child_elements<'a, 'input>(node: Node<'a, 'input>) -> Vec<Node<'a, 'input>> {
    node.children().filter(|child| child.is_element()).collect()
}

fn is_ignored_namespace(namespace: Option<&str>) -> bool {
    matches!(namespace, Some(XSI_NAMESPACE) | Some(roxmltree::NS_XML_URI))
}

impl Unmarshaller {
    pub fn new(model: Arc<BindingModel>) -> Self {
        Self { model }
    }

    pub fn model(&self) -> &Arc<BindingModel> {
        &self.model
    }

    /// Bind decoded text; a leading byte order mark is dropped
    pub fn unmarshal_text(&self, text: &str) -> BindResult<BoundObject> {
        self.unmarshal(bom::strip_text(text))
    }

    /// Bind raw bytes, honoring a BOM or the declared encoding
    pub fn unmarshal_bytes(&self, bytes: &[u8]) -> BindResult<BoundObject> {
        let text = bom::decode_bytes(bytes)?;
        self.unmarshal(&text)
    }

    fn unmarshal(&self, text: &str) -> BindResult<BoundObject> {
        let options = ParsingOptions {
            allow_dtd: false,
            ..ParsingOptions::default()
        };
        let document = Document::parse_with_options(text, options)?;
        let root = document.root_element();
        let tag = root.tag_name();

        let binding = self
            .model
            .element(tag.namespace(), tag.name())
            .ok_or_else(|| BindError::UnknownRoot {
                name: match tag.namespace() {
                    Some(ns) => format!("{{{}}}{}", ns, tag.name()),
                    None => tag.name().to_string(),
                },
                position: position(root),
            })?;

        let element = ElementUse {
            type_id: binding.type_id,
            nillable: binding.nillable,
            default: None,
            fixed: None,
        };
        let value = self.bind_element(root, &element)?;

        let descriptor = self.model.type_descriptor(binding.type_id);
        let instance = BoundObject::Instance(BoundInstance {
            type_id: binding.type_id,
            type_name: descriptor.name.clone(),
            mapping: descriptor.mapping.clone(),
            value,
        });
        trace!(root = %binding.name, wrapped = binding.wrapped, "bound document");

        if binding.wrapped {
            Ok(BoundObject::Element(RootElement {
                name: binding.name.clone(),
                value: Box::new(instance),
            }))
        } else {
            Ok(instance)
        }
    }

    /// Name used for a type in value errors: built-in name for anonymous restrictions
    fn datatype_name(&self, type_id: TypeId) -> String {
        let descriptor = self.model.type_descriptor(type_id);
        match descriptor.simple().and_then(|simple| simple.primitive()) {
            Some(builtin) if descriptor.anonymous => builtin.display_name(),
            _ => descriptor.name.clone(),
        }
    }

    fn parse_value(
        &self,
        type_id: TypeId,
        raw: &str,
        fixed: Option<&str>,
        context: impl FnOnce() -> String,
        at: Position,
    ) -> BindResult<BoundValue> {
        let invalid = |reason: String, context: String| BindError::InvalidValue {
            context,
            datatype: self.datatype_name(type_id),
            value: raw.to_string(),
            reason,
            position: at,
        };
        let value = match self.model.parse_simple(type_id, raw) {
            Ok(value) => value,
            Err(reason) => return Err(invalid(reason, context())),
        };
        if let Some(fixed) = fixed
            && self.model.parse_simple(type_id, fixed).ok().as_ref() != Some(&value)
        {
            return Err(invalid(format!("value must be '{}'", fixed), context()));
        }
        Ok(BoundValue::Simple(value))
    }

    fn bind_element(&self, node: Node, element: &ElementUse) -> BindResult<BoundValue> {
        if let Some(requested) = node.attribute((XSI_NAMESPACE, "type")) {
            self.check_declared_type(node, element.type_id, requested)?;
        }
        if let Some(nil) = node.attribute((XSI_NAMESPACE, "nil"))
            && matches!(nil.trim(), "true" | "1")
        {
            if !element.nillable {
                return Err(BindError::NotNillable {
                    element: element_name(node),
                    position: position(node),
                });
            }
            if let Some(child) = child_elements(node).first() {
                return Err(BindError::UnexpectedElement {
                    parent: element_name(node),
                    name: element_name(*child),
                    position: position(*child),
                });
            }
            return Ok(BoundValue::Nil);
        }

        let descriptor = self.model.type_descriptor(element.type_id);
        match &descriptor.body {
            TypeBody::AnyType => Ok(BoundValue::Opaque),
            TypeBody::Simple(_) => {
                self.reject_children(node)?;
                let text = text_content(node);
                let raw = match (text.is_empty(), element.fixed.or(element.default)) {
                    (true, Some(default)) => default.to_string(),
                    _ => text,
                };
                self.parse_value(
                    element.type_id,
                    &raw,
                    element.fixed,
                    || format!("element <{}>", element_name(node)),
                    position(node),
                )
            }
            TypeBody::Complex(complex) => Ok(BoundValue::Complex(self.bind_complex(
                node,
                element.type_id,
                complex,
            )?)),
        }
    }

    /// `xsi:type` may only restate the declared type of the element
    fn check_declared_type(&self, node: Node, type_id: TypeId, requested: &str) -> BindResult<()> {
        let requested = requested.trim();
        let substitution = |reason: String| BindError::TypeSubstitution {
            element: element_name(node),
            requested: requested.to_string(),
            reason,
            position: position(node),
        };
        let (namespace, local) = match requested.split_once(':') {
            Some((prefix, local)) => {
                let namespace = node
                    .lookup_namespace_uri(Some(prefix))
                    .ok_or_else(|| substitution(format!("undeclared prefix '{}'", prefix)))?;
                (Some(namespace), local)
            }
            None => (node.lookup_namespace_uri(None), requested),
        };

        match self.model.named_type_id(&QName::new(namespace, local)) {
            Some(id) if id == type_id => Ok(()),
            Some(_) => Err(substitution(format!(
                "substituting the declared type {} is not supported",
                self.model.type_descriptor(type_id).name
            ))),
            None => Err(substitution("unknown type".to_string())),
        }
    }

    fn reject_children(&self, node: Node) -> BindResult<()> {
        match child_elements(node).first() {
            Some(child) => Err(BindError::UnexpectedElement {
                parent: element_name(node),
                name: element_name(*child),
                position: position(*child),
            }),
            None => Ok(()),
        }
    }

    fn reject_text(&self, node: Node) -> BindResult<()> {
        let text = node
            .children()
            .find(|child| child.is_text() && child.text().is_some_and(|t| !t.trim().is_empty()));
        match text {
            Some(text) => Err(BindError::UnexpectedText {
                element: element_name(node),
                position: position(text),
            }),
            None => Ok(()),
        }
    }

    fn bind_complex(
        &self,
        node: Node,
        type_id: TypeId,
        complex: &ComplexType,
    ) -> BindResult<BoundComplex> {
        let mut bound = BoundComplex::new(type_id);
        self.bind_attributes(node, complex, &mut bound)?;

        match &complex.content {
            Content::Empty => {
                self.reject_children(node)?;
                self.reject_text(node)?;
            }
            Content::Simple { type_id } => {
                self.reject_children(node)?;
                let value = self.parse_value(
                    *type_id,
                    &text_content(node),
                    None,
                    || format!("content of <{}>", element_name(node)),
                    position(node),
                )?;
                bound.push("value", value);
            }
            Content::Elements { particle, mixed } => {
                if !mixed {
                    self.reject_text(node)?;
                }
                let children = child_elements(node);
                let mut cursor = 0;
                self.match_particle(node, particle, &children, &mut cursor, &mut bound)?;
                if let Some(extra) = children.get(cursor) {
                    return Err(BindError::UnexpectedElement {
                        parent: element_name(node),
                        name: element_name(*extra),
                        position: position(*extra),
                    });
                }
            }
        }
        Ok(bound)
    }

    fn bind_attributes(
        &self,
        node: Node,
        complex: &ComplexType,
        bound: &mut BoundComplex,
    ) -> BindResult<()> {
        for attribute in node.attributes() {
            let namespace = attribute.namespace();
            if is_ignored_namespace(namespace) {
                continue;
            }
            let at: Position = node.document().text_pos_at(attribute.range().start).into();
            match complex.attribute(namespace, attribute.name()) {
                Some(declared) => {
                    let value = self.parse_value(
                        declared.type_id,
                        attribute.value(),
                        declared.fixed.as_deref(),
                        || format!("attribute {}", attribute.name()),
                        at,
                    )?;
                    bound.push(&attribute_key(declared.name.local_name()), value);
                }
                None if complex
                    .any_attribute
                    .as_ref()
                    .is_some_and(|wildcard| wildcard.allows(namespace)) => {}
                None => {
                    return Err(BindError::UndeclaredAttribute {
                        element: element_name(node),
                        name: attribute.name().to_string(),
                        position: at,
                    });
                }
            }
        }

        for declared in &complex.attributes {
            let local = declared.name.local_name();
            let key = attribute_key(local);
            if bound.has_field(&key) {
                continue;
            }
            if declared.required {
                return Err(BindError::MissingAttribute {
                    element: element_name(node),
                    name: local.to_string(),
                    position: position(node),
                });
            }
            if let Some(default) = declared.fixed.as_deref().or(declared.default.as_deref()) {
                let value = self.parse_value(
                    declared.type_id,
                    default,
                    None,
                    || format!("default of attribute {}", local),
                    position(node),
                )?;
                bound.push(&key, value);
            }
        }
        Ok(())
    }

    fn missing(&self, parent: Node, term: &Term, next: Option<&Node>) -> BindError {
        BindError::MissingElement {
            parent: element_name(parent),
            expected: term.expected_names().join(" | "),
            position: position(next.copied().unwrap_or(parent)),
        }
    }

    fn match_particle(
        &self,
        parent: Node,
        particle: &Particle,
        children: &[Node],
        cursor: &mut usize,
        bound: &mut BoundComplex,
    ) -> BindResult<()> {
        let mut count = 0u32;
        loop {
            if particle.occurs.max.is_some_and(|max| count >= max) {
                break;
            }
            let next = children.get(*cursor);
            let starts = next.is_some_and(|child| {
                particle
                    .term
                    .can_start(child.tag_name().namespace(), child.tag_name().name())
            });
            if !starts {
                if count < particle.occurs.min && !particle.term.is_nullable() {
                    return Err(self.missing(parent, &particle.term, next));
                }
                break;
            }

            let before = *cursor;
            self.match_term(parent, &particle.term, children, cursor, bound)?;
            count += 1;
            if *cursor == before {
                break;
            }
        }
        Ok(())
    }

    fn match_term(
        &self,
        parent: Node,
        term: &Term,
        children: &[Node],
        cursor: &mut usize,
        bound: &mut BoundComplex,
    ) -> BindResult<()> {
        match term {
            Term::Element(decl) => {
                let Some(child) = children.get(*cursor) else {
                    return Err(self.missing(parent, term, None));
                };
                let value = self.bind_element(*child, &ElementUse::from(decl))?;
                *cursor += 1;
                if value != BoundValue::Opaque {
                    bound.push(decl.name.local_name(), value);
                }
            }
            Term::Any(_) => {
                *cursor += 1;
            }
            Term::Sequence { particles } => {
                for particle in particles {
                    self.match_particle(parent, particle, children, cursor, bound)?;
                }
            }
            Term::Choice { particles } => {
                let next = children.get(*cursor);
                let branch = next.and_then(|child| {
                    let tag = child.tag_name();
                    particles
                        .iter()
                        .find(|particle| particle.can_start(tag.namespace(), tag.name()))
                });
                match branch {
                    Some(particle) => {
                        self.match_particle(parent, particle, children, cursor, bound)?
                    }
                    None if term.is_nullable() => {}
                    None => return Err(self.missing(parent, term, next)),
                }
            }
            Term::All { particles } => {
                let mut matched = vec![false; particles.len()];
                while let Some(child) = children.get(*cursor) {
                    let tag = child.tag_name();
                    let Some(index) = particles.iter().enumerate().position(|(index, particle)| {
                        !matched[index] && particle.can_start(tag.namespace(), tag.name())
                    }) else {
                        break;
                    };
                    matched[index] = true;
                    self.match_particle(parent, &particles[index], children, cursor, bound)?;
                }
                if let Some(index) = (0..particles.len())
                    .find(|index| !matched[*index] && !particles[*index].is_nullable())
                {
                    return Err(self.missing(parent, &particles[index].term, children.get(*cursor)));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::Mapping;
    use crate::compiler::compile_str;
    use crate::record::Value;

    const ORDER_XSD: &str = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
  <xs:element name="Order">
    <xs:complexType>
      <xs:sequence>
        <xs:element name="Item" maxOccurs="unbounded">
          <xs:complexType>
            <xs:attribute name="qty" type="xs:int" use="required"/>
            <xs:attribute name="unit" type="xs:string" default="each"/>
          </xs:complexType>
        </xs:element>
        <xs:element name="note" type="xs:string" minOccurs="0" nillable="true"/>
        <xs:element name="extra" minOccurs="0"/>
      </xs:sequence>
      <xs:attribute name="id" type="xs:string"/>
    </xs:complexType>
  </xs:element>
  <xs:element name="Total" type="xs:decimal"/>
</xs:schema>"#;

    fn unmarshaller(xsd: &str) -> Unmarshaller {
        Unmarshaller::new(Arc::new(compile_str("test.xsd", xsd).unwrap()))
    }

    fn complex(object: &BoundObject) -> &BoundComplex {
        match object {
            BoundObject::Instance(BoundInstance {
                value: BoundValue::Complex(complex),
                ..
            }) => complex,
            other => panic!("Expected complex instance, got {:?}", other),
        }
    }

    #[test]
    fn test_binds_anonymous_root_as_instance() {
        let bound = unmarshaller(ORDER_XSD)
            .unmarshal_text(r#"<Order id="A1"><Item qty="3"/><Item qty=" 4 "/></Order>"#)
            .unwrap();
        assert_eq!(bound.mapping(), &Mapping::Composite);

        let order = complex(&bound);
        assert_eq!(
            order.field("@id"),
            &[BoundValue::Simple(Value::String("A1".to_string()))]
        );
        let items = order.field("Item");
        assert_eq!(items.len(), 2);
        match &items[1] {
            BoundValue::Complex(item) => {
                assert_eq!(item.field("@qty"), &[BoundValue::Simple(Value::Int32(4))]);
                assert_eq!(
                    item.field("@unit"),
                    &[BoundValue::Simple(Value::String("each".to_string()))]
                );
            }
            other => panic!("Expected complex item, got {:?}", other),
        }
        assert!(!order.has_field("note"));
    }

    #[test]
    fn test_simple_root_is_wrapped() {
        let bound = unmarshaller(ORDER_XSD)
            .unmarshal_text("<Total>12.50</Total>")
            .unwrap();
        match bound {
            BoundObject::Element(root) => {
                assert_eq!(root.name.local_name(), "Total");
                assert!(matches!(
                    root.value.mapping(),
                    Mapping::Scalar(_)
                ));
            }
            other => panic!("Expected wrapper, got {:?}", other),
        }
    }

    #[test]
    fn test_invalid_value_names_datatype() {
        let result = unmarshaller(ORDER_XSD).unmarshal_text(r#"<Order><Item qty="abc"/></Order>"#);
        match result {
            Err(BindError::InvalidValue {
                datatype,
                value,
                context,
                position,
                ..
            }) => {
                assert_eq!(datatype, "xs:int");
                assert_eq!(value, "abc");
                assert_eq!(context, "attribute qty");
                assert_eq!(position.row, 1);
            }
            other => panic!("Expected InvalidValue, got {:?}", other),
        }
    }

    #[test]
    fn test_structural_errors() {
        let u = unmarshaller(ORDER_XSD);

        assert!(matches!(
            u.unmarshal_text("<Order/>"),
            Err(BindError::MissingElement { expected, .. }) if expected == "Item"
        ));
        assert!(matches!(
            u.unmarshal_text(r#"<Order><Item/></Order>"#),
            Err(BindError::MissingAttribute { name, .. }) if name == "qty"
        ));
        assert!(matches!(
            u.unmarshal_text(r#"<Order><Item qty="1"/><Bogus/></Order>"#),
            Err(BindError::UnexpectedElement { name, .. }) if name == "Bogus"
        ));
        assert!(matches!(
            u.unmarshal_text(r#"<Order color="red"><Item qty="1"/></Order>"#),
            Err(BindError::UndeclaredAttribute { name, .. }) if name == "color"
        ));
        assert!(matches!(
            u.unmarshal_text(r#"<Order>text<Item qty="1"/></Order>"#),
            Err(BindError::UnexpectedText { .. })
        ));
        assert!(matches!(
            u.unmarshal_text("<Invoice/>"),
            Err(BindError::UnknownRoot { name, .. }) if name == "Invoice"
        ));
        assert!(matches!(
            u.unmarshal_text("<Order><Item qty='1'/>"),
            Err(BindError::Malformed(_))
        ));
    }

    #[test]
    fn test_nil_and_wildcard_content() {
        let u = unmarshaller(ORDER_XSD);
        let bound = u
            .unmarshal_text(
                r#"<Order xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance" xsi:noNamespaceSchemaLocation="order.xsd">
                     <Item qty="1"/>
                     <note xsi:nil="true"/>
                     <extra><anything goes="here"/></extra>
                   </Order>"#,
            )
            .unwrap();
        let order = complex(&bound);
        assert_eq!(order.field("note"), &[BoundValue::Nil]);
        assert!(!order.has_field("extra"));

        let not_nillable = u.unmarshal_text(
            r#"<Order xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance"><Item xsi:nil="true" qty="1"/></Order>"#,
        );
        assert!(matches!(not_nillable, Err(BindError::NotNillable { .. })));
    }

    #[test]
    fn test_choice_and_all_groups() {
        let xsd = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
          <xs:element name="Contact">
            <xs:complexType>
              <xs:sequence>
                <xs:choice>
                  <xs:element name="email" type="xs:string"/>
                  <xs:element name="phone" type="xs:string"/>
                </xs:choice>
                <xs:element name="name" type="xs:string"/>
              </xs:sequence>
            </xs:complexType>
          </xs:element>
          <xs:element name="Point">
            <xs:complexType>
              <xs:all>
                <xs:element name="x" type="xs:int"/>
                <xs:element name="y" type="xs:int"/>
              </xs:all>
            </xs:complexType>
          </xs:element>
        </xs:schema>"#;
        let u = unmarshaller(xsd);

        let contact = u
            .unmarshal_text("<Contact><phone>555</phone><name>Ann</name></Contact>")
            .unwrap();
        assert!(complex(&contact).has_field("phone"));
        assert!(!complex(&contact).has_field("email"));
        assert!(u.unmarshal_text("<Contact><name>Ann</name></Contact>").is_err());

        let point = u.unmarshal_text("<Point><y>2</y><x>1</x></Point>").unwrap();
        assert_eq!(complex(&point).field("x"), &[BoundValue::Simple(Value::Int32(1))]);
        assert!(matches!(
            u.unmarshal_text("<Point><y>2</y></Point>"),
            Err(BindError::MissingElement { expected, .. }) if expected == "x"
        ));
    }

    #[test]
    fn test_facets_and_simple_content() {
        let xsd = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
          <xs:simpleType name="Code">
            <xs:restriction base="xs:string"><xs:pattern value="[A-Z]{3}"/></xs:restriction>
          </xs:simpleType>
          <xs:element name="Price">
            <xs:complexType>
              <xs:simpleContent>
                <xs:extension base="xs:decimal">
                  <xs:attribute name="currency" type="Code" use="required"/>
                </xs:extension>
              </xs:simpleContent>
            </xs:complexType>
          </xs:element>
        </xs:schema>"#;
        let u = unmarshaller(xsd);

        let price = u
            .unmarshal_text(r#"<Price currency="EUR">9.99</Price>"#)
            .unwrap();
        assert_eq!(complex(&price).field("value").len(), 1);

        match u.unmarshal_text(r#"<Price currency="eur">9.99</Price>"#) {
            Err(BindError::InvalidValue { datatype, .. }) => assert_eq!(datatype, "Code"),
            other => panic!("Expected InvalidValue, got {:?}", other),
        }
        assert!(u.unmarshal_text(r#"<Price currency="EUR">cheap</Price>"#).is_err());
    }

    #[test]
    fn test_xsi_type_must_name_declared_type() {
        let xsd = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema"
            xmlns="urn:shop" targetNamespace="urn:shop" elementFormDefault="qualified">
          <xs:complexType name="Base">
            <xs:sequence><xs:element name="a" type="xs:string"/></xs:sequence>
          </xs:complexType>
          <xs:complexType name="Derived">
            <xs:complexContent><xs:extension base="Base">
              <xs:sequence><xs:element name="b" type="xs:string"/></xs:sequence>
            </xs:extension></xs:complexContent>
          </xs:complexType>
          <xs:element name="item" type="Base"/>
        </xs:schema>"#;
        let u = unmarshaller(xsd);
        let xsi = r#"xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance""#;

        let restated = format!(
            r#"<s:item xmlns:s="urn:shop" {} xsi:type="s:Base"><s:a>x</s:a></s:item>"#,
            xsi
        );
        assert!(u.unmarshal_text(&restated).is_ok());

        let derived = format!(
            r#"<item xmlns="urn:shop" {} xsi:type="Derived"><a>x</a><b>y</b></item>"#,
            xsi
        );
        match u.unmarshal_text(&derived) {
            Err(BindError::TypeSubstitution {
                element,
                requested,
                reason,
                ..
            }) => {
                assert_eq!(element, "item");
                assert_eq!(requested, "Derived");
                assert!(reason.contains("{urn:shop}Base"), "{}", reason);
            }
            other => panic!("Expected TypeSubstitution, got {:?}", other),
        }

        let unknown = format!(r#"<item xmlns="urn:shop" {} xsi:type="Nope"><a>x</a></item>"#, xsi);
        assert!(matches!(
            u.unmarshal_text(&unknown),
            Err(BindError::TypeSubstitution { reason, .. }) if reason == "unknown type"
        ));

        let unbound = format!(r#"<item xmlns="urn:shop" {} xsi:type="q:Base"><a>x</a></item>"#, xsi);
        assert!(matches!(
            u.unmarshal_text(&unbound),
            Err(BindError::TypeSubstitution { reason, .. }) if reason.contains("undeclared prefix")
        ));
    }

    #[test]
    fn test_dtd_is_rejected() {
        let u = unmarshaller(ORDER_XSD);
        let result = u.unmarshal_text(
            r#"<!DOCTYPE Order [<!ENTITY x "y">]><Order><Item qty="1"/></Order>"#,
        );
        assert!(matches!(result, Err(BindError::Malformed(_))));
    }

    #[test]
    fn test_text_and_bytes_paths_agree() {
        let u = unmarshaller(ORDER_XSD);
        let xml = r#"<Order id="A1"><Item qty="3"/></Order>"#;

        let plain = u.unmarshal_text(xml).unwrap();
        let with_bom = u.unmarshal_text(&format!("\u{feff}{}", xml)).unwrap();
        let mut bytes = vec![0xEF, 0xBB, 0xBF];
        bytes.extend_from_slice(xml.as_bytes());
        let from_bytes = u.unmarshal_bytes(&bytes).unwrap();

        assert_eq!(plain, with_bom);
        assert_eq!(plain, from_bytes);
    }
}
