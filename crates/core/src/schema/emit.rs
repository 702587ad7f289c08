//! Rust code emitter
//!
//! Rendering happens in two steps. [`Emitter::new`] renders every record and
//! top-level enum into a [`GraphNode`] (the text the dependency scan reads),
//! then [`Emitter::emit`] lays the nodes out in sorted order, one `pub mod`
//! per run of equal namespace.

use std::collections::{BTreeSet, HashMap};

use tracing::{debug, warn};

use mbinbridge_sdk::{names, PrimitiveType};

use crate::config::CodegenConfig;

use super::graph::{DependencyGraph, GraphNode};
use super::types::{enum_literal, field_ident, list_element, module_name, type_ident};
use super::{EnumDescriptor, RecordDescriptor, SchemaSet};

const INDENT: &str = "    ";

/// Identifier of the shared root record in generated code
pub const ROOT_RECORD_IDENT: &str = "NMSTemplate";

/// Emission settings
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EmitOptions {
    /// Namespace prefix removed before building module names
    pub strip_namespace_prefix: String,
    pub skip_types: Vec<String>,
    pub skip_namespaces: Vec<String>,
    pub skip_bases: Vec<String>,
    /// Host name of the shared root record
    pub root_record: String,
}

impl Default for EmitOptions {
    fn default() -> Self {
        Self::from(&CodegenConfig::default())
    }
}

impl From<&CodegenConfig> for EmitOptions {
    fn from(config: &CodegenConfig) -> Self {
        Self {
            strip_namespace_prefix: config.strip_namespace_prefix.clone(),
            skip_types: config.skip_types.clone(),
            skip_namespaces: config.skip_namespaces.clone(),
            skip_bases: config.skip_bases.clone(),
            root_record: format!("{}.{}", names::ROOT_NAMESPACE, names::TEMPLATE_CLASS),
        }
    }
}

impl EmitOptions {
    fn skips_record(&self, record: &RecordDescriptor) -> bool {
        record.namespace.is_empty()
            || self.skip_namespaces.contains(&record.namespace)
            || self.skip_types.contains(&record.name)
            || record
                .base_type_name
                .as_ref()
                .is_some_and(|base| self.skip_bases.contains(base))
    }
}

struct RenderedNode {
    module: String,
    node: GraphNode,
}

/// Renders a [`SchemaSet`] into Rust source
pub struct Emitter {
    nodes: Vec<RenderedNode>,
    records: usize,
    enums: usize,
    unmapped: Vec<String>,
}

/// Host name -> Rust path lookup shared by all renderers
struct TypeIndex<'o> {
    paths: HashMap<String, String>,
    options: &'o EmitOptions,
    unmapped: BTreeSet<String>,
}

impl TypeIndex<'_> {
    fn module(&self, namespace: &str) -> String {
        module_name(namespace, &self.options.strip_namespace_prefix)
    }

    /// Qualified Rust path of a record
    fn path_of(&self, record: &RecordDescriptor) -> String {
        format!("{}::{}", self.module(&record.namespace), type_ident(&record.name))
    }

    /// Rust type for a normalised host type name
    ///
    /// Records in `indirect` are held through `Option<Box<_>>` when they would
    /// otherwise be stored by value.
    fn rust_type(
        &mut self,
        type_name: &str,
        fixed_size: u32,
        indirect: &BTreeSet<String>,
    ) -> String {
        if let Some(inner) = list_element(type_name) {
            return format!("Vec<{}>", self.rust_type(inner, 0, &BTreeSet::new()));
        }
        if let Some(element) = type_name.strip_suffix("[]") {
            return if fixed_size > 0 {
                format!("[{}; {fixed_size}]", self.rust_type(element, 0, indirect))
            } else {
                format!("Vec<{}>", self.rust_type(element, 0, &BTreeSet::new()))
            };
        }
        if let Some(primitive) = PrimitiveType::from_host_name(type_name) {
            return match primitive {
                PrimitiveType::String => "String".to_string(),
                other => other.rust_name().to_string(),
            };
        }
        if let Some(path) = self.paths.get(type_name) {
            return if indirect.contains(path) {
                format!("Option<Box<{path}>>")
            } else {
                path.clone()
            };
        }

        if self.unmapped.insert(type_name.to_string()) {
            warn!("No Rust mapping for host type {}, possible missing mapping", type_name);
        }
        match type_name.rsplit_once('.') {
            Some((namespace, name)) => format!("{}::{}", self.module(namespace), type_ident(name)),
            None => type_ident(type_name),
        }
    }
}

impl Emitter {
    /// Render every emitted record and enum of `schema`
    pub fn new(schema: &SchemaSet, options: &EmitOptions) -> Self {
        let emitted: Vec<&RecordDescriptor> = schema
            .records
            .iter()
            .filter(|r| {
                let skip = options.skips_record(r);
                if skip {
                    debug!("Not emitting {}", r.full_name());
                }
                !skip
            })
            .collect();

        let mut index = TypeIndex {
            paths: HashMap::new(),
            options,
            unmapped: BTreeSet::new(),
        };
        index
            .paths
            .insert(options.root_record.clone(), ROOT_RECORD_IDENT.to_string());

        for record in &emitted {
            let path = index.path_of(record);
            index.paths.insert(record.full_name(), path);
        }

        // Nested enums live with their record when it is emitted
        let mut nested: HashMap<String, Vec<&EnumDescriptor>> = HashMap::new();
        let mut standalone: Vec<&EnumDescriptor> = Vec::new();
        for e in schema.enums.iter().filter(|e| !e.namespace.is_empty()) {
            let path = format!("{}::{}", index.module(&e.namespace), enum_ident(e));
            index.paths.insert(e.full_name(), path);

            let owner = e
                .enclosing_record
                .as_ref()
                .map(|record| format!("{}.{}", e.namespace, record))
                .filter(|owner| emitted.iter().any(|r| &r.full_name() == owner));
            match owner {
                Some(owner) => nested.entry(owner).or_default().push(e),
                None => standalone.push(e),
            }
        }

        let mut nodes = Vec::new();
        for e in &standalone {
            let module = index.module(&e.namespace);
            nodes.push(RenderedNode {
                node: GraphNode {
                    name: format!("{}::{}", module, enum_ident(e)),
                    body: render_enum(e),
                    declares: Vec::new(),
                },
                module,
            });
        }
        let records: Vec<(&RecordDescriptor, Vec<&EnumDescriptor>)> = emitted
            .iter()
            .map(|&record| (record, nested.remove(&record.full_name()).unwrap_or_default()))
            .collect();
        let first_record = nodes.len();
        for (record, enums) in &records {
            let own = BTreeSet::from([index.path_of(record)]);
            nodes.push(record_node(record, enums, &own, &mut index));
        }

        // Records on a cycle hold each other by value only through Option<Box<_>>
        let cycles = DependencyGraph::build(nodes.iter().map(|n| &n.node)).cyclic_sets();
        for cycle in cycles {
            debug!("Boxing references within {}", cycle.join(", "));
            let members: BTreeSet<String> = cycle.into_iter().collect();
            for (offset, (record, enums)) in records.iter().enumerate() {
                let node = &mut nodes[first_record + offset];
                if members.contains(&node.node.name) {
                    *node = record_node(record, enums, &members, &mut index);
                }
            }
        }

        // Group namespaces so independent records form as few runs as possible
        nodes.sort_by(|a, b| a.module.cmp(&b.module));

        Self {
            records: emitted.len(),
            enums: schema.enums.len(),
            unmapped: index.unmapped.into_iter().collect(),
            nodes,
        }
    }

    /// Rendered declarations, in input order for the dependency graph
    pub fn nodes(&self) -> impl Iterator<Item = &GraphNode> {
        self.nodes.iter().map(|n| &n.node)
    }

    /// Number of records that will be emitted
    pub fn record_count(&self) -> usize {
        self.records
    }

    pub fn enum_count(&self) -> usize {
        self.enums
    }

    /// Host type names with no Rust mapping
    pub fn unmapped(&self) -> &[String] {
        &self.unmapped
    }

    /// Lay out the nodes in `order` as one source file
    pub fn emit(&self, order: &[String], graph: &DependencyGraph) -> String {
        let by_name: HashMap<&str, &RenderedNode> = self
            .nodes
            .iter()
            .map(|n| (n.node.name.as_str(), n))
            .collect();

        // Maximal runs of equal module in sort order
        let mut runs: Vec<(&str, Vec<&RenderedNode>)> = Vec::new();
        for name in order {
            let Some(&node) = by_name.get(name.as_str()) else {
                warn!("Sorted name {} has no rendered declaration", name);
                continue;
            };
            match runs.last_mut() {
                Some((module, members)) if *module == node.module => members.push(node),
                _ => runs.push((node.module.as_str(), vec![node])),
            }
        }

        let mut seen: HashMap<&str, usize> = HashMap::new();
        let run_names: Vec<String> = runs
            .iter()
            .map(|(module, _)| {
                let count = seen.entry(*module).or_insert(0);
                *count += 1;
                if *count == 1 {
                    module.to_string()
                } else {
                    format!("{module}__{count}")
                }
            })
            .collect();

        let mut out = String::new();
        out.push_str(HEADER);

        for (i, (module, members)) in runs.iter().enumerate() {
            out.push('\n');
            push_line(&mut out, 0, &format!("pub mod {} {{", run_names[i]));
            push_line(&mut out, 1, "use super::*;");
            if run_names[i] == *module {
                // Later runs of this namespace are reachable through the first
                for (later, (other, _)) in run_names.iter().zip(&runs).skip(i + 1) {
                    if other == module {
                        push_line(&mut out, 1, &format!("pub use super::{later}::*;"));
                    }
                }
            }

            for node in members {
                out.push('\n');
                let deps = graph.dependencies(&node.node.name);
                if !deps.is_empty() {
                    push_line(&mut out, 1, &format!("// depends on: {}", deps.join(", ")));
                }
                for line in node.node.body.lines() {
                    push_line(&mut out, 1, line);
                }
            }
            push_line(&mut out, 0, "}");
        }

        debug!("Emitted {} declarations in {} modules", order.len(), runs.len());
        out
    }
}

const HEADER: &str = "\
// Generated by mbingen from the libMBIN type table. Do not edit.
#![allow(non_snake_case, non_camel_case_types, dead_code)]

use mbinbridge_core::{HostEnum, HostRecord};

/// Root of every asset record
#[derive(Debug, Clone, Default, PartialEq, HostRecord)]
#[record(namespace = \"libMBIN\")]
pub struct NMSTemplate {}
";

fn push_line(out: &mut String, depth: usize, line: &str) {
    if !line.is_empty() {
        for _ in 0..depth {
            out.push_str(INDENT);
        }
        out.push_str(line);
    }
    out.push('\n');
}

fn enum_ident(e: &EnumDescriptor) -> String {
    match &e.enclosing_record {
        Some(record) => type_ident(&format!("{record}_{}", e.name)),
        None => type_ident(&e.name),
    }
}

fn render_enum(e: &EnumDescriptor) -> String {
    let mut out = String::new();
    push_line(&mut out, 0, "#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, HostEnum)]");
    push_line(&mut out, 0, &format!("#[repr({})]", e.underlying_width));
    push_line(&mut out, 0, &format!("#[host_enum(name = {:?})]", e.full_name()));
    push_line(&mut out, 0, &format!("pub enum {} {{", enum_ident(e)));

    let mut used: Vec<(String, String)> = Vec::new();
    for (name, value) in &e.entries {
        let literal = enum_literal(e.underlying_width, *value);
        let ident = field_ident(name).ident;
        match used.iter().find(|(i, l)| *l == literal || *i == ident) {
            Some((first, _)) => {
                push_line(&mut out, 1, &format!("// {name} = {literal} (alias of {first})"));
            }
            None => {
                push_line(&mut out, 1, &format!("{ident} = {literal},"));
                used.push((ident, literal));
            }
        }
    }
    if used.is_empty() {
        push_line(&mut out, 1, "Empty = 0,");
    }

    push_line(&mut out, 0, "}");
    out
}

fn record_node(
    record: &RecordDescriptor,
    enums: &[&EnumDescriptor],
    indirect: &BTreeSet<String>,
    index: &mut TypeIndex<'_>,
) -> RenderedNode {
    let module = index.module(&record.namespace);
    RenderedNode {
        node: GraphNode {
            name: index.path_of(record),
            body: render_record(record, enums, indirect, index),
            declares: enums
                .iter()
                .map(|e| format!("{}::{}", module, enum_ident(e)))
                .collect(),
        },
        module,
    }
}

fn render_record(
    record: &RecordDescriptor,
    enums: &[&EnumDescriptor],
    indirect: &BTreeSet<String>,
    index: &mut TypeIndex<'_>,
) -> String {
    let mut out = String::new();
    for e in enums {
        out.push_str(&render_enum(e));
        out.push('\n');
    }

    let ident = type_ident(&record.name);
    push_line(&mut out, 0, "#[derive(Debug, Clone, PartialEq, HostRecord)]");
    if ident == record.name {
        push_line(&mut out, 0, &format!("#[record(namespace = {:?})]", record.namespace));
    } else {
        push_line(
            &mut out,
            0,
            &format!("#[record(namespace = {:?}, class = {:?})]", record.namespace, record.name),
        );
    }
    push_line(&mut out, 0, &format!("pub struct {ident} {{"));

    for field in &record.fields {
        let ty = index.rust_type(&field.type_name, field.fixed_size, indirect);
        if ty == "String" && field.fixed_size > 0 {
            push_line(&mut out, 1, &format!("/// max length: {}", field.fixed_size));
        }
        let name = field_ident(&field.name);
        if name.renamed {
            push_line(&mut out, 1, &format!("#[record(rename = {:?})]", field.name));
        }
        push_line(&mut out, 1, &format!("pub {}: {},", name.ident, ty));
    }

    push_line(&mut out, 0, "}");
    out
}
