//! Type metadata extraction
//!
//! Walks the host's type table once and turns every class into a
//! [`RecordDescriptor`] or [`EnumDescriptor`]. A row that cannot be resolved
//! or described is logged and skipped; only failing to read the table
//! itself aborts extraction.

use tracing::{debug, info, warn};

use mbinbridge_host::{HostError, RuntimeHost};
use mbinbridge_sdk::{names, AssemblyRef, ClassInfo, ClassRef, FieldRef, IntWidth};

use crate::config::CodegenConfig;

use super::types::normalize_type_name;
use super::{BaseTypePolicy, EnumDescriptor, FieldDescriptor, RecordDescriptor, SchemaSet};

/// Extraction settings
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExtractOptions {
    /// Attribute class marking fixed-size fields
    pub size_attribute: String,
    /// Attribute property holding the element count
    pub size_property: String,
    /// Type name prefixes rewritten to `Vec<..>`
    pub list_markers: Vec<String>,
    pub base_type_policy: BaseTypePolicy,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self::from(&CodegenConfig::default())
    }
}

impl From<&CodegenConfig> for ExtractOptions {
    fn from(config: &CodegenConfig) -> Self {
        Self {
            size_attribute: config.size_attribute.clone(),
            size_property: config.size_property.clone(),
            list_markers: config.list_markers.clone(),
            base_type_policy: config.base_type_policy,
        }
    }
}

/// Read every record and enum type defined by `assembly`
#[tracing::instrument(skip_all)]
pub fn extract_schema(
    host: &dyn RuntimeHost,
    assembly: AssemblyRef,
    options: &ExtractOptions,
) -> Result<SchemaSet, HostError> {
    let count = host.type_count(assembly)?;
    info!("Extracting schema from {} type table rows", count);

    let mut schema = SchemaSet::default();
    for index in 0..count {
        let class = match host.type_at(assembly, index) {
            Ok(class) => class,
            Err(e) => {
                warn!("Skipping type table row {}: {}", index, e);
                continue;
            }
        };

        let result = host.class_info(class).and_then(|info| {
            if info.is_enum {
                extract_enum(host, class, &info).map(|e| schema.enums.push(e))
            } else {
                extract_record(host, class, &info, options).map(|r| schema.records.extend(r))
            }
        });
        if let Err(e) = result {
            warn!("Skipping {} (row {}): {}", class, index, e);
        }
    }

    info!(
        "Extracted {} records and {} enums",
        schema.records.len(),
        schema.enums.len()
    );
    Ok(schema)
}

/// Host-side location of a class: outermost namespace and `Outer/Inner` name
fn qualified_name(host: &dyn RuntimeHost, info: &ClassInfo) -> Result<(String, String), HostError> {
    let mut name = info.name.clone();
    let mut namespace = info.namespace.clone();
    let mut nesting = info.nesting;
    while let Some(outer) = nesting {
        let outer_info = host.class_info(outer)?;
        name = format!("{}/{}", outer_info.name, name);
        namespace = outer_info.namespace;
        nesting = outer_info.nesting;
    }
    Ok((namespace, name))
}

fn extract_enum(
    host: &dyn RuntimeHost,
    class: ClassRef,
    info: &ClassInfo,
) -> Result<EnumDescriptor, HostError> {
    let (namespace, enclosing_record) = match info.nesting {
        Some(outer) => {
            let (namespace, outer_name) = qualified_name(host, &host.class_info(outer)?)?;
            (namespace, Some(outer_name))
        }
        None => (info.namespace.clone(), None),
    };

    let mut width = None;
    let mut entries = Vec::new();
    for field in host.class_fields(class)? {
        let field_info = host.field_info(field)?;
        if field_info.name == names::ENUM_BACKING_FIELD {
            width = IntWidth::from_host_name(&field_info.type_name);
            continue;
        }
        match host.field_constant(field)?.and_then(|v| v.as_i64()) {
            Some(value) => entries.push((field_info.name, value)),
            None => debug!("{}.{} is not an enum constant", info.name, field_info.name),
        }
    }

    let underlying_width = width.unwrap_or_else(|| {
        warn!("Enum {} has no integral backing field, assuming i32", info.full_name());
        IntWidth::I32
    });

    debug!(
        "Identified enum {}::{} ({}, {} entries)",
        namespace,
        info.name,
        underlying_width,
        entries.len()
    );
    Ok(EnumDescriptor {
        name: info.name.clone(),
        enclosing_record,
        namespace,
        underlying_width,
        entries,
    })
}

fn extract_record(
    host: &dyn RuntimeHost,
    class: ClassRef,
    info: &ClassInfo,
    options: &ExtractOptions,
) -> Result<Option<RecordDescriptor>, HostError> {
    let (namespace, name) = qualified_name(host, info)?;

    let (base_type_name, base_namespace) = match info.parent {
        Some(parent) => {
            let parent_info = host.class_info(parent)?;
            (Some(parent_info.name), Some(parent_info.namespace))
        }
        None => match options.base_type_policy {
            BaseTypePolicy::Warn => {
                warn!("Class {}::{} does not have a base class, keeping it", namespace, name);
                (None, None)
            }
            BaseTypePolicy::Reject => {
                warn!("Class {}::{} does not have a base class, dropping it", namespace, name);
                return Ok(None);
            }
        },
    };

    let fields = host
        .class_fields(class)?
        .into_iter()
        .map(|field| extract_field(host, field, options))
        .collect::<Result<Vec<_>, _>>()?;

    debug!("Identified record {}::{} ({} fields)", namespace, name, fields.len());
    Ok(Some(RecordDescriptor {
        name,
        namespace,
        base_type_name,
        base_namespace,
        fields,
    }))
}

fn extract_field(
    host: &dyn RuntimeHost,
    field: FieldRef,
    options: &ExtractOptions,
) -> Result<FieldDescriptor, HostError> {
    let info = host.field_info(field)?;

    let fixed_size = host
        .field_attributes(field)?
        .iter()
        .filter(|attr| attr.class_name == options.size_attribute)
        .find_map(|attr| attr.property(&options.size_property))
        .and_then(|size| size.as_i64())
        .and_then(|size| u32::try_from(size).ok())
        .unwrap_or(0);

    // Arrays of enums count as enum fields
    let is_enum = match info.type_class {
        Some(class) => {
            let element = host.array_element_class(class).unwrap_or(class);
            host.class_info(element).map(|c| c.is_enum).unwrap_or(false)
        }
        None => false,
    };

    Ok(FieldDescriptor {
        type_name: normalize_type_name(&info.type_name, &options.list_markers),
        name: info.name,
        is_enum,
        fixed_size,
    })
}
