//! End-to-end binding generation
//!
//! Extract (or load) a schema, render it, order the declarations and write
//! the generated source file.

use std::path::{Path, PathBuf};

use tracing::{info, warn};

use mbinbridge_host::{HostError, HostSession};

use crate::config::CodegenConfig;
use crate::schema::{
    extract_schema, DependencyGraph, EmitOptions, Emitter, ExtractOptions, SchemaError, SchemaSet,
};

/// Generation errors
#[derive(Debug, thiserror::Error)]
pub enum GenerateError {
    #[error(transparent)]
    Host(#[from] HostError),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Summary of one generation run
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GenerateReport {
    /// Records emitted
    pub records: usize,
    /// Enums extracted
    pub enums: usize,
    /// Groups of declarations that reference each other
    pub cycles: Vec<Vec<String>>,
    /// Host type names left without a Rust mapping
    pub unmapped: Vec<String>,
    /// File written
    pub output: PathBuf,
}

/// Extract the session's assembly and write bindings to `output`
#[tracing::instrument(skip(session, config))]
pub fn generate_bindings(
    session: &HostSession,
    config: &CodegenConfig,
    output: &Path,
) -> Result<GenerateReport, GenerateError> {
    let schema = extract_schema(
        session.host(),
        session.assembly(),
        &ExtractOptions::from(config),
    )?;
    write_bindings(&schema, config, output)
}

/// Write bindings for a saved schema snapshot
#[tracing::instrument(skip(config))]
pub fn generate_from_snapshot(
    snapshot: &Path,
    config: &CodegenConfig,
    output: &Path,
) -> Result<GenerateReport, GenerateError> {
    let schema = SchemaSet::load(snapshot)?;
    write_bindings(&schema, config, output)
}

/// Render `schema` to source text
pub fn render(schema: &SchemaSet, config: &CodegenConfig) -> (String, GenerateReport) {
    let emitter = Emitter::new(schema, &EmitOptions::from(config));
    let graph = DependencyGraph::build(emitter.nodes());
    let outcome = graph.sort();
    if outcome.has_cycles() {
        warn!(
            "{} dependency cycles; affected records are emitted in input order",
            outcome.cycles.len()
        );
    }

    let source = emitter.emit(&outcome.order, &graph);
    let report = GenerateReport {
        records: emitter.record_count(),
        enums: emitter.enum_count(),
        cycles: outcome.cycles,
        unmapped: emitter.unmapped().to_vec(),
        output: PathBuf::new(),
    };
    (source, report)
}

fn write_bindings(
    schema: &SchemaSet,
    config: &CodegenConfig,
    output: &Path,
) -> Result<GenerateReport, GenerateError> {
    let (source, mut report) = render(schema, config);

    let io_err = |path: &Path| {
        let path = path.to_path_buf();
        move |source| GenerateError::Io { path, source }
    };
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(io_err(parent))?;
    }
    std::fs::write(output, source).map_err(io_err(output))?;

    info!(
        "Wrote {} records and {} enums to {}",
        report.records,
        report.enums,
        output.display()
    );
    report.output = output.to_path_buf();
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FieldDescriptor, RecordDescriptor};
    use mbinbridge_host::mock::MockHost;
    use mbinbridge_host::SessionLayout;
    use mbinbridge_sdk::{IntWidth, PrimitiveType};
    use tempfile::TempDir;

    fn record(name: &str, fields: &[(&str, &str)]) -> RecordDescriptor {
        RecordDescriptor {
            name: name.to_string(),
            namespace: "libMBIN.NMS.GameComponents".to_string(),
            base_type_name: Some("NMSTemplate".to_string()),
            base_namespace: Some("libMBIN".to_string()),
            fields: fields
                .iter()
                .map(|(name, ty)| FieldDescriptor {
                    name: name.to_string(),
                    type_name: ty.to_string(),
                    is_enum: false,
                    fixed_size: 0,
                })
                .collect(),
        }
    }

    #[test]
    fn test_render_reports_cycles() {
        let schema = SchemaSet {
            records: vec![
                record("A", &[("B", "libMBIN.NMS.GameComponents.B")]),
                record("B", &[("A", "libMBIN.NMS.GameComponents.A")]),
                record("C", &[("Missing", "Some.Unknown")]),
            ],
            enums: Vec::new(),
        };
        let (source, report) = render(&schema, &CodegenConfig::default());

        assert_eq!(report.records, 3);
        assert_eq!(
            report.cycles,
            vec![vec![
                "NMS_GameComponents::A".to_string(),
                "NMS_GameComponents::B".to_string()
            ]]
        );
        assert_eq!(report.unmapped, vec!["Some.Unknown".to_string()]);
        assert!(source.contains("pub struct A {"));
        assert!(source.contains("pub struct B {"));
    }

    #[test]
    fn test_generate_from_snapshot() {
        let temp = TempDir::new().unwrap();
        let snapshot = temp.path().join("schema.json");
        let schema = SchemaSet {
            records: vec![record("GcBiome", &[("Fuel", "System.Single")])],
            enums: Vec::new(),
        };
        schema.save(&snapshot).unwrap();

        let output = temp.path().join("generated/generated_types.rs");
        let report =
            generate_from_snapshot(&snapshot, &CodegenConfig::default(), &output).unwrap();

        assert_eq!(report.output, output);
        assert_eq!(report.records, 1);
        let source = std::fs::read_to_string(&output).unwrap();
        assert!(source.contains("pub mod NMS_GameComponents {"));
        assert!(source.contains("pub Fuel: f32,"));
    }

    #[test]
    fn test_generate_from_missing_snapshot() {
        let temp = TempDir::new().unwrap();
        let result = generate_from_snapshot(
            &temp.path().join("missing.json"),
            &CodegenConfig::default(),
            &temp.path().join("out.rs"),
        );
        assert!(matches!(result, Err(GenerateError::Schema(SchemaError::Io { .. }))));
    }

    #[test]
    fn test_generate_bindings_from_host() {
        let mock = MockHost::new();
        let session =
            HostSession::open(Box::new(mock.clone()), &SessionLayout::new("libMBIN.dll")).unwrap();
        let ns = "libMBIN.NMS.GameComponents";
        let biome_type = mock.define_enum(ns, "GcBiomeType", IntWidth::I32, &[("Lush", 0)]);
        let biome = mock.define_class(ns, "GcBiomeData");
        mock.add_field(biome, "Kind", biome_type);
        mock.add_field(biome, "Fuel", mock.primitive(PrimitiveType::F32));

        let temp = TempDir::new().unwrap();
        let output = temp.path().join("bindings.rs");
        let report = generate_bindings(&session, &CodegenConfig::default(), &output).unwrap();

        assert_eq!(report.records, 1);
        assert!(report.cycles.is_empty());
        let source = std::fs::read_to_string(&output).unwrap();
        assert!(source.contains("pub enum GcBiomeType {"));
        assert!(source.contains("pub struct GcBiomeData {"));
        assert!(source.find("pub enum GcBiomeType").unwrap() < source.find("pub struct GcBiomeData").unwrap());
    }
}
