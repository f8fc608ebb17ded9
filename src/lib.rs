//! # from-xml Library
//!
//! Schema-driven conversion of XML payloads into structured records. An XML Schema
//! is compiled once into a binding model; each document is then bound against the
//! model and mapped to a [`StructuredRecord`] whose schema mirrors the XSD types.
//!
//! ```no_run
//! # async fn demo() -> from_xml::Result<()> {
//! use std::collections::HashMap;
//! use from_xml::{FieldInput, FromXml};
//!
//! let mut transform = FromXml::value();
//! let settings = HashMap::from([("schema_path".to_string(), "order.xsd".to_string())]);
//! transform.configure(&settings).await?;
//! let record = transform.transform(FieldInput::Text(r#"<Order id="A1"/>"#))?;
//! println!("{}", serde_json::to_string(record.value()).unwrap_or_default());
//! transform.close();
//! # Ok(())
//! # }
//! ```

pub mod batch;
pub mod binding;
pub mod bom;
pub mod builtins;
pub mod cache;
pub mod cli;
pub mod compiler;
pub mod config;
pub mod error;
pub mod facets;
pub mod file_discovery;
pub mod http_client;
pub mod mapper;
pub mod output;
pub mod record;
pub mod schema_loader;
pub mod transform;
pub mod unmarshaller;
pub mod workspace;

pub use batch::{BatchConverter, ConversionResults, ConversionStatus, FileConversionResult};
pub use binding::{BindingModel, BoundObject, Mapping, QName};
pub use cache::BindingModelCache;
pub use cli::{Cli, OutputFormat, VerbosityLevel};
pub use compiler::SchemaCompiler;
pub use config::{ConfigManager, EnvProvider, FromXmlConfig, SystemEnvProvider};
pub use error::{BindError, ConfigError, Position, Result, TransformError};
pub use file_discovery::{DiscoveryStats, FileDiscovery};
pub use http_client::{AsyncHttpClient, HttpClientConfig};
pub use mapper::RecordMapper;
pub use output::Output;
pub use record::{Schema, SchemaKind, Struct, StructuredRecord, Value};
pub use schema_loader::{SchemaDocument, SchemaFetch, SchemaLoader, SchemaReference, SchemaSourceType};
pub use transform::{FieldInput, FieldSlot, FromXml, HostRecord, HostValue, TransformState};
pub use unmarshaller::Unmarshaller;
pub use workspace::CompilationWorkspace;
