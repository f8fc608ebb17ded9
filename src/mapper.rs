//! Record mapper: bound objects to structured records

use std::sync::Arc;

use crate::binding::{BindingModel, BoundComplex, BoundObject, BoundValue, FieldPlan, Mapping};
use crate::error::{Result, TransformError};
use crate::record::{Struct, StructuredRecord, Value};

/// Maps bound objects of one binding model to [`StructuredRecord`]s
#[derive(Clone)]
pub struct RecordMapper {
    model: Arc<BindingModel>,
}

fn unsupported(object: &BoundObject) -> TransformError {
    let reason = match object.mapping() {
        Mapping::Scalar(_) => "does not support record mapping".to_string(),
        Mapping::Unsupported(reason) => reason.clone(),
        Mapping::Composite | Mapping::Wrapper => "is not a supported type".to_string(),
    };
    TransformError::UnsupportedBoundType {
        type_name: object.type_name(),
        reason,
    }
}

impl RecordMapper {
    pub fn new(model: Arc<BindingModel>) -> Self {
        Self { model }
    }

    /// Convert a bound object into a record.
    ///
    /// Composite instances are mapped directly. A root-element wrapper is unwrapped
    /// exactly once; anything else is an [`TransformError::UnsupportedBoundType`].
    pub fn to_record(&self, object: &BoundObject) -> Result<StructuredRecord> {
        let instance = match object {
            BoundObject::Instance(instance) if instance.mapping.is_composite() => instance,
            BoundObject::Element(root) => match root.value.as_ref() {
                BoundObject::Instance(inner) if inner.mapping.is_composite() => inner,
                inner => return Err(unsupported(inner)),
            },
            other => return Err(unsupported(other)),
        };

        match &instance.value {
            BoundValue::Complex(complex) => StructuredRecord::from_struct(self.build_struct(complex)?),
            BoundValue::Nil => Err(TransformError::Data(format!(
                "root {} is nil",
                instance.type_name
            ))),
            other => Err(TransformError::Data(format!(
                "{} carries no complex content: {:?}",
                instance.type_name, other
            ))),
        }
    }

    fn build_struct(&self, complex: &BoundComplex) -> Result<Struct> {
        let descriptor = self.model.type_descriptor(complex.type_id);
        let schema = descriptor.record_schema.clone().ok_or_else(|| {
            TransformError::UnsupportedBoundType {
                type_name: descriptor.name.clone(),
                reason: match &descriptor.mapping {
                    Mapping::Unsupported(reason) => reason.clone(),
                    _ => "has no record schema".to_string(),
                },
            }
        })?;
        let plans: &[FieldPlan] = descriptor
            .complex()
            .map(|complex| complex.fields.as_slice())
            .unwrap_or(&[]);

        let mut record = Struct::new(schema)?;
        for plan in plans {
            let values = complex.field(&plan.key);
            let value = if plan.repeated {
                Value::Array(
                    values
                        .iter()
                        .map(|value| self.convert(value))
                        .collect::<Result<Vec<_>>>()?,
                )
            } else {
                match values.first() {
                    Some(value) => self.convert(value)?,
                    None => Value::Null,
                }
            };
            record.put(&plan.name, value)?;
        }
        Ok(record)
    }

    fn convert(&self, value: &BoundValue) -> Result<Value> {
        Ok(match value {
            BoundValue::Nil | BoundValue::Opaque => Value::Null,
            BoundValue::Simple(value) => value.clone(),
            BoundValue::Complex(complex) => Value::Struct(self.build_struct(complex)?),
        })
    }
}
