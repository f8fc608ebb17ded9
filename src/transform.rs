//! The transform facade: configure once, then convert one record field per call

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::binding::BindingModel;
use crate::cache::BindingModelCache;
use crate::compiler::SchemaCompiler;
use crate::config::FromXmlConfig;
use crate::error::{Result, TransformError};
use crate::mapper::RecordMapper;
use crate::record::StructuredRecord;
use crate::schema_loader::SchemaLoader;
use crate::unmarshaller::Unmarshaller;

/// Which field of a host record an instance converts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldSlot {
    Key,
    Value,
}

impl fmt::Display for FieldSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldSlot::Key => write!(f, "key"),
            FieldSlot::Value => write!(f, "value"),
        }
    }
}

/// Raw XML handed to [`FromXml::transform`]
#[derive(Debug, Clone, Copy)]
pub enum FieldInput<'a> {
    Text(&'a str),
    Bytes(&'a [u8]),
}

/// Content of one slot of a host record
#[derive(Debug, Clone, PartialEq)]
pub enum HostValue {
    Null,
    Text(String),
    Bytes(Vec<u8>),
    Structured(StructuredRecord),
}

/// A record as the host pipeline sees it
#[derive(Debug, Clone, PartialEq)]
pub struct HostRecord {
    pub topic: String,
    pub partition: Option<i32>,
    pub timestamp: Option<DateTime<Utc>>,
    pub headers: BTreeMap<String, String>,
    pub key: HostValue,
    pub value: HostValue,
}

impl HostRecord {
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            partition: None,
            timestamp: None,
            headers: BTreeMap::new(),
            key: HostValue::Null,
            value: HostValue::Null,
        }
    }

    pub fn with_key(mut self, key: HostValue) -> Self {
        self.key = key;
        self
    }

    pub fn with_value(mut self, value: HostValue) -> Self {
        self.value = value;
        self
    }

    pub fn with_partition(mut self, partition: i32) -> Self {
        self.partition = Some(partition);
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn slot(&self, slot: FieldSlot) -> &HostValue {
        match slot {
            FieldSlot::Key => &self.key,
            FieldSlot::Value => &self.value,
        }
    }

    fn slot_mut(&mut self, slot: FieldSlot) -> &mut HostValue {
        match slot {
            FieldSlot::Key => &mut self.key,
            FieldSlot::Value => &mut self.value,
        }
    }
}

/// Lifecycle of a [`FromXml`] instance
///
/// `Unconfigured -> Compiling -> Ready | Failed`, then `Ready -> Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransformState {
    Unconfigured,
    Compiling,
    Ready,
    Failed,
    Closed,
}

impl fmt::Display for TransformState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransformState::Unconfigured => "unconfigured",
            TransformState::Compiling => "compiling",
            TransformState::Ready => "ready",
            TransformState::Failed => "failed",
            TransformState::Closed => "closed",
        };
        f.write_str(name)
    }
}

struct Pipeline {
    compiler: SchemaCompiler,
    unmarshaller: Unmarshaller,
    mapper: RecordMapper,
}

/// Converts XML in one slot of host records into structured records
///
/// Configuration compiles the schema once; afterwards `transform` and `apply`
/// take `&self` and may run from many threads at the same time.
pub struct FromXml {
    slot: FieldSlot,
    state: TransformState,
    loader: Option<SchemaLoader>,
    pipeline: Option<Pipeline>,
}

impl FromXml {
    pub fn new(slot: FieldSlot) -> Self {
        Self {
            slot,
            state: TransformState::Unconfigured,
            loader: None,
            pipeline: None,
        }
    }

    pub fn key() -> Self {
        Self::new(FieldSlot::Key)
    }

    pub fn value() -> Self {
        Self::new(FieldSlot::Value)
    }

    /// Resolve schemas with `loader` instead of one built from the HTTP settings
    pub fn with_loader(mut self, loader: SchemaLoader) -> Self {
        self.loader = Some(loader);
        self
    }

    pub fn slot(&self) -> FieldSlot {
        self.slot
    }

    pub fn state(&self) -> TransformState {
        self.state
    }

    pub fn model(&self) -> Option<&Arc<BindingModel>> {
        self.pipeline
            .as_ref()
            .map(|pipeline| pipeline.unmarshaller.model())
    }

    /// Configure from the host's settings map
    pub async fn configure(&mut self, settings: &HashMap<String, String>) -> Result<()> {
        self.ensure_unconfigured()?;
        match FromXmlConfig::from_settings(settings) {
            Ok(config) => self.configure_with(config).await,
            Err(e) => {
                self.state = TransformState::Failed;
                Err(e.into())
            }
        }
    }

    /// Resolve and compile the configured schema.
    ///
    /// Any error leaves the instance `Failed`.
    pub async fn configure_with(&mut self, config: FromXmlConfig) -> Result<()> {
        self.ensure_unconfigured()?;
        self.state = TransformState::Compiling;

        match self.build_pipeline(&config).await {
            Ok(pipeline) => {
                info!(
                    slot = %self.slot,
                    location = pipeline.unmarshaller.model().location(),
                    elements = pipeline.unmarshaller.model().element_count(),
                    "transform ready"
                );
                self.pipeline = Some(pipeline);
                self.state = TransformState::Ready;
                Ok(())
            }
            Err(e) => {
                warn!(slot = %self.slot, error = %e, "transform configuration failed");
                self.state = TransformState::Failed;
                Err(e)
            }
        }
    }

    async fn build_pipeline(&self, config: &FromXmlConfig) -> Result<Pipeline> {
        let location = config.schema_location()?;
        let loader = match &self.loader {
            Some(loader) => loader.clone(),
            None => SchemaLoader::with_http_config(config.http_client_config())?,
        };

        let document = loader.load_location(location).await?;
        let compiler = SchemaCompiler::new(loader, &config.workspace.dir).await?;

        let model = if config.binding.cache_enabled {
            let key = BindingModelCache::generate_key(document.location(), &document.data);
            let compiler = &compiler;
            BindingModelCache::global()
                .get_or_compile(key, move || async move {
                    compiler.compile(document).await.map(Arc::new)
                })
                .await?
        } else {
            Arc::new(compiler.compile(document).await?)
        };

        Ok(Pipeline {
            compiler,
            unmarshaller: Unmarshaller::new(model.clone()),
            mapper: RecordMapper::new(model),
        })
    }

    fn ensure_unconfigured(&self) -> Result<()> {
        match self.state {
            TransformState::Unconfigured => Ok(()),
            state => Err(TransformError::NotReady {
                state: format!("cannot configure a {} transform", state),
            }),
        }
    }

    fn ready(&self) -> Result<&Pipeline> {
        match (&self.state, &self.pipeline) {
            (TransformState::Ready, Some(pipeline)) => Ok(pipeline),
            (state, _) => Err(TransformError::NotReady {
                state: state.to_string(),
            }),
        }
    }

    /// Convert one XML payload into a structured record
    pub fn transform(&self, input: FieldInput<'_>) -> Result<StructuredRecord> {
        let pipeline = self.ready()?;
        let bound = match input {
            FieldInput::Text(text) => pipeline.unmarshaller.unmarshal_text(text)?,
            FieldInput::Bytes(bytes) => pipeline.unmarshaller.unmarshal_bytes(bytes)?,
        };
        pipeline.mapper.to_record(&bound)
    }

    /// Replace this instance's slot of `record` with its converted form.
    ///
    /// Topic, partition, timestamp, headers and the other slot are kept as they are.
    pub fn apply(&self, mut record: HostRecord) -> Result<HostRecord> {
        self.ready()?;
        let converted = match record.slot(self.slot) {
            HostValue::Null => return Ok(record),
            HostValue::Text(text) => self.transform(FieldInput::Text(text))?,
            HostValue::Bytes(bytes) => self.transform(FieldInput::Bytes(bytes))?,
            HostValue::Structured(_) => {
                return Err(TransformError::UnsupportedInput {
                    details: format!("record {} is already structured", self.slot),
                });
            }
        };
        *record.slot_mut(self.slot) = HostValue::Structured(converted);
        Ok(record)
    }

    /// Release the compilation workspace. Only the first call does anything.
    pub fn close(&mut self) {
        if let Some(pipeline) = self.pipeline.take() {
            pipeline.compiler.close();
            debug!(slot = %self.slot, "transform closed");
        }
        if self.state != TransformState::Failed {
            self.state = TransformState::Closed;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Value;
    use crate::schema_loader::MockSchemaFetch;
    use std::path::Path;
    use tempfile::TempDir;

    const ORDER_XSD: &str = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
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

    fn settings(schema: &str, workspace: &Path) -> HashMap<String, String> {
        HashMap::from([
            ("schema_path".to_string(), schema.to_string()),
            ("workspace.dir".to_string(), workspace.display().to_string()),
        ])
    }

    async fn ready_transform(dir: &TempDir, slot: FieldSlot) -> FromXml {
        let schema = dir.path().join("order.xsd");
        std::fs::write(&schema, ORDER_XSD).unwrap();
        let mut transform = FromXml::new(slot);
        transform
            .configure(&settings(schema.to_str().unwrap(), &dir.path().join("ws")))
            .await
            .unwrap();
        transform
    }

    #[tokio::test]
    async fn test_transform_text_and_bytes() {
        let dir = TempDir::new().unwrap();
        let transform = ready_transform(&dir, FieldSlot::Value).await;
        assert_eq!(transform.state(), TransformState::Ready);

        let xml = r#"<Order id="A1"><Item qty="3"/></Order>"#;
        let record = transform.transform(FieldInput::Text(xml)).unwrap();
        assert_eq!(record.lookup("id"), Some(&Value::String("A1".to_string())));
        assert_eq!(record.lookup("Item.qty"), Some(&Value::Int32(3)));

        let from_bytes = transform.transform(FieldInput::Bytes(xml.as_bytes())).unwrap();
        assert_eq!(record, from_bytes);
    }

    #[tokio::test]
    async fn test_record_errors_leave_instance_ready() {
        let dir = TempDir::new().unwrap();
        let transform = ready_transform(&dir, FieldSlot::Value).await;

        let err = transform
            .transform(FieldInput::Text(r#"<Order><Item qty="abc"/></Order>"#))
            .unwrap_err();
        assert!(matches!(err, TransformError::XmlParse(_)));
        assert!(err.is_record_error());
        assert_eq!(transform.state(), TransformState::Ready);

        assert!(transform
            .transform(FieldInput::Text(r#"<Order id="A2"><Item qty="1"/></Order>"#))
            .is_ok());
    }

    #[tokio::test]
    async fn test_apply_replaces_only_its_slot() {
        let dir = TempDir::new().unwrap();
        let transform = ready_transform(&dir, FieldSlot::Value).await;
        let timestamp = Utc::now();

        let record = HostRecord::new("orders")
            .with_partition(3)
            .with_timestamp(timestamp)
            .with_header("source", "erp")
            .with_key(HostValue::Text("k-1".to_string()))
            .with_value(HostValue::Text(r#"<Order id="A1"><Item qty="3"/></Order>"#.to_string()));

        let converted = transform.apply(record).unwrap();
        assert_eq!(converted.topic, "orders");
        assert_eq!(converted.partition, Some(3));
        assert_eq!(converted.timestamp, Some(timestamp));
        assert_eq!(converted.headers.get("source").map(String::as_str), Some("erp"));
        assert_eq!(converted.key, HostValue::Text("k-1".to_string()));
        match &converted.value {
            HostValue::Structured(value) => {
                assert_eq!(value.lookup("id"), Some(&Value::String("A1".to_string())));
            }
            other => panic!("Expected structured value, got {:?}", other),
        }

        let again = transform.apply(converted);
        assert!(matches!(again, Err(TransformError::UnsupportedInput { .. })));
    }

    #[tokio::test]
    async fn test_apply_passes_null_slot_through() {
        let dir = TempDir::new().unwrap();
        let transform = ready_transform(&dir, FieldSlot::Key).await;

        let record = HostRecord::new("orders").with_value(HostValue::Bytes(b"not xml".to_vec()));
        let out = transform.apply(record.clone()).unwrap();
        assert_eq!(out, record);
    }

    #[tokio::test]
    async fn test_not_ready_states() {
        let mut transform = FromXml::value();
        assert!(matches!(
            transform.transform(FieldInput::Text("<Order/>")),
            Err(TransformError::NotReady { .. })
        ));

        transform.close();
        transform.close();
        assert_eq!(transform.state(), TransformState::Closed);
        assert!(matches!(
            transform.apply(HostRecord::new("t")),
            Err(TransformError::NotReady { .. })
        ));
    }

    #[tokio::test]
    async fn test_missing_schema_path_fails_configuration() {
        let mut transform = FromXml::value();
        let err = transform.configure(&HashMap::new()).await.unwrap_err();
        assert!(matches!(err, TransformError::Config(_)));
        assert!(err.is_fatal());
        assert_eq!(transform.state(), TransformState::Failed);

        let dir = TempDir::new().unwrap();
        let again = transform
            .configure(&settings("order.xsd", dir.path()))
            .await;
        assert!(matches!(again, Err(TransformError::NotReady { .. })));
    }

    #[tokio::test]
    async fn test_unavailable_schema_fails_configuration() {
        let dir = TempDir::new().unwrap();
        let mut transform = FromXml::value();
        let missing = dir.path().join("missing.xsd");
        let err = transform
            .configure(&settings(missing.to_str().unwrap(), dir.path()))
            .await
            .unwrap_err();
        assert!(matches!(err, TransformError::SchemaUnavailable { .. }));
        assert_eq!(transform.state(), TransformState::Failed);

        transform.close();
        assert_eq!(transform.state(), TransformState::Failed);
    }

    #[tokio::test]
    async fn test_remote_schema_through_loader() {
        let dir = TempDir::new().unwrap();
        let mut fetch = MockSchemaFetch::new();
        fetch
            .expect_fetch()
            .withf(|url| url == "http://schemas.example.com/order.xsd")
            .times(1)
            .returning(|_| Ok(ORDER_XSD.as_bytes().to_vec()));

        let mut transform =
            FromXml::value().with_loader(SchemaLoader::new(std::sync::Arc::new(fetch)));
        let mut map = settings("http://schemas.example.com/order.xsd", dir.path());
        map.insert("binding.cache.enabled".to_string(), "false".to_string());
        transform.configure(&map).await.unwrap();

        let record = transform
            .transform(FieldInput::Text(r#"<Order id="R"><Item qty="7"/></Order>"#))
            .unwrap();
        assert_eq!(record.lookup("Item.qty"), Some(&Value::Int32(7)));
        assert_eq!(
            transform.model().map(|model| model.location()),
            Some("http://schemas.example.com/order.xsd")
        );
    }

    #[tokio::test]
    async fn test_close_releases_workspace_once() {
        let dir = TempDir::new().unwrap();
        let mut transform = ready_transform(&dir, FieldSlot::Value).await;
        let workspace = transform
            .pipeline
            .as_ref()
            .map(|pipeline| pipeline.compiler.workspace().path().to_path_buf())
            .unwrap();
        assert!(workspace.exists());

        transform.close();
        assert!(!workspace.exists());
        assert_eq!(transform.state(), TransformState::Closed);

        transform.close();
        assert_eq!(transform.state(), TransformState::Closed);
    }

    #[tokio::test]
    async fn test_key_and_value_share_cached_model() {
        let dir = TempDir::new().unwrap();
        let key = ready_transform(&dir, FieldSlot::Key).await;
        let value = ready_transform(&dir, FieldSlot::Value).await;

        let (Some(a), Some(b)) = (key.model(), value.model()) else {
            panic!("both transforms should be ready");
        };
        assert!(Arc::ptr_eq(a, b));
    }

    #[test]
    fn test_from_xml_is_sync() {
        fn assert_sync<T: Send + Sync>() {}
        assert_sync::<FromXml>();
    }
}
