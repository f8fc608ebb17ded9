//! Shared fixtures for the integration tests

#![allow(dead_code)]

pub mod schema_server;

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use from_xml::{FieldSlot, FromXml};
use tempfile::TempDir;

pub const ORDER_XSD: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
  <xs:element name="Order">
    <xs:complexType>
      <xs:sequence>
        <xs:element name="Item">
          <xs:complexType>
            <xs:attribute name="qty" type="xs:int"/>
          </xs:complexType>
        </xs:element>
      </xs:sequence>
      <xs:attribute name="id" type="xs:string"/>
    </xs:complexType>
  </xs:element>
</xs:schema>"#;

/// Named types, so every global element is a wrapper around its payload
pub const SHOP_XSD: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema"
           xmlns:tns="urn:shop" targetNamespace="urn:shop"
           elementFormDefault="qualified">
  <xs:simpleType name="Amount">
    <xs:restriction base="xs:decimal">
      <xs:fractionDigits value="2"/>
    </xs:restriction>
  </xs:simpleType>
  <xs:complexType name="LineType">
    <xs:sequence>
      <xs:element name="sku" type="xs:string"/>
      <xs:element name="price" type="tns:Amount"/>
    </xs:sequence>
    <xs:attribute name="qty" type="xs:int" default="1"/>
  </xs:complexType>
  <xs:complexType name="InvoiceType">
    <xs:sequence>
      <xs:element name="customer" type="xs:string"/>
      <xs:element name="issued" type="xs:date" minOccurs="0"/>
      <xs:element name="line" type="tns:LineType" maxOccurs="unbounded"/>
    </xs:sequence>
    <xs:attribute name="number" type="xs:long" use="required"/>
  </xs:complexType>
  <xs:element name="invoice" type="tns:InvoiceType"/>
  <xs:element name="note" type="xs:string"/>
</xs:schema>"#;

pub const ORDER_XML: &str = r#"<Order id="A1"><Item qty="3"/></Order>"#;

pub const INVOICE_XML: &str = r#"<invoice xmlns="urn:shop" number="42">
  <customer>ACME</customer>
  <issued>2024-02-29</issued>
  <line qty="2"><sku>X-1</sku><price>9.90</price></line>
  <line><sku>X-2</sku><price>0.5</price></line>
</invoice>"#;

/// A temporary directory holding schemas and compilation workspaces
pub struct Fixture {
    pub dir: TempDir,
}

impl Fixture {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("create temp dir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn write(&self, name: &str, content: impl AsRef<[u8]>) -> PathBuf {
        let path = self.path().join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("create fixture dir");
        }
        std::fs::write(&path, content).expect("write fixture");
        path
    }

    pub fn workspace_dir(&self) -> PathBuf {
        self.path().join("workspaces")
    }

    pub fn settings(&self, schema_path: &str) -> HashMap<String, String> {
        HashMap::from([
            ("schema_path".to_string(), schema_path.to_string()),
            (
                "workspace.dir".to_string(),
                self.workspace_dir().display().to_string(),
            ),
        ])
    }

    /// A ready transform for the schema written under `name`
    pub async fn transform(&self, slot: FieldSlot, name: &str, xsd: &str) -> FromXml {
        let schema = self.write(name, xsd);
        let mut transform = FromXml::new(slot);
        transform
            .configure(&self.settings(&schema.display().to_string()))
            .await
            .expect("configure transform");
        transform
    }
}

/// UTF-16LE bytes with a leading byte order mark
pub fn utf16le_with_bom(text: &str) -> Vec<u8> {
    let mut bytes = vec![0xFF, 0xFE];
    for unit in text.encode_utf16() {
        bytes.extend_from_slice(&unit.to_le_bytes());
    }
    bytes
}

/// UTF-8 bytes with a leading byte order mark
pub fn utf8_with_bom(text: &str) -> Vec<u8> {
    let mut bytes = vec![0xEF, 0xBB, 0xBF];
    bytes.extend_from_slice(text.as_bytes());
    bytes
}
