//! # CLI Command Implementations
//!
//! This module contains the actual implementations of CLI commands.
//!
//! Every command loads the catalog, resolves names against it and works on a
//! store file. The record-level helpers (`add_record`, `search_records`,
//! `show_record`) take an in-memory store so they can be used without I/O.

use crate::catalog::{catalog, schema};
use meaning_core::{
    ContextNode, ContextValueDictionary, InstanceId, KindId, KindRegistry, MeaningError, NodeId,
    Parser, SerializableStore, describe_path,
    formats::{MAX_PERSISTENCE_PAYLOAD_SIZE, store_from_bytes, store_to_bytes},
    primitives::{DEFAULT_RECORD_NUMBER, MAX_PATH_DEPTH},
};
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

// =============================================================================
// FILE SIZE LIMITS
// =============================================================================

/// Maximum store file size: header plus the largest accepted payload.
const MAX_STORE_FILE_SIZE: u64 = MAX_PERSISTENCE_PAYLOAD_SIZE as u64 + 5;

/// Validate file size before reading.
fn validate_file_size(path: &Path, max_size: u64) -> Result<(), MeaningError> {
    let metadata = std::fs::metadata(path)
        .map_err(|e| MeaningError::IoError(format!("Cannot read file metadata: {}", e)))?;

    if metadata.len() > max_size {
        return Err(MeaningError::IoError(format!(
            "File size {} bytes exceeds maximum allowed {} bytes",
            metadata.len(),
            max_size
        )));
    }
    Ok(())
}

/// Resolve `..` and symlinks, and require a regular file.
fn validate_file_path(path: &Path) -> Result<PathBuf, MeaningError> {
    let canonical = path.canonicalize().map_err(|e| {
        MeaningError::IoError(format!("Invalid file path '{}': {}", path.display(), e))
    })?;

    if !canonical.is_file() {
        return Err(MeaningError::IoError(format!(
            "Path '{}' is not a regular file",
            path.display()
        )));
    }

    Ok(canonical)
}

/// Require an existing parent directory; returns canonical parent + file name.
fn validate_output_path(path: &Path) -> Result<PathBuf, MeaningError> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let canonical_parent = parent.canonicalize().map_err(|e| {
        MeaningError::IoError(format!(
            "Invalid output directory '{}': {}",
            parent.display(),
            e
        ))
    })?;

    if !canonical_parent.is_dir() {
        return Err(MeaningError::IoError(format!(
            "Output directory '{}' is not a valid directory",
            parent.display()
        )));
    }

    let filename = path
        .file_name()
        .ok_or_else(|| MeaningError::IoError("Output path has no filename".to_string()))?;

    Ok(canonical_parent.join(filename))
}

// =============================================================================
// ASSIGNMENTS
// =============================================================================

/// A parsed `Kind.Kind.ValueKind#record=literal` argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    /// Type-path kinds, starting with the schema.
    pub kinds: Vec<KindId>,
    pub record_number: usize,
    pub literal: String,
}

/// Parse one assignment against `schema`.
///
/// The schema name may be omitted from the front of the path.
pub fn parse_assignment(
    registry: &KindRegistry,
    schema: KindId,
    text: &str,
) -> Result<Assignment, MeaningError> {
    let (path, literal) = text.split_once('=').ok_or_else(|| {
        MeaningError::InvalidValuePath(format!("'{}' is not of the form Path=value", text))
    })?;

    let (path, record_number) = match path.rsplit_once('#') {
        Some((path, record)) => {
            let record = record.trim().parse::<usize>().map_err(|_| {
                MeaningError::InvalidValuePath(format!("'{}' is not a record number", record))
            })?;
            (path, record)
        }
        None => (path, DEFAULT_RECORD_NUMBER),
    };

    let mut kinds = path
        .split('.')
        .map(|name| registry.require(name.trim()))
        .collect::<Result<Vec<_>, _>>()?;
    if kinds.first() != Some(&schema) {
        kinds.insert(0, schema);
    }
    if kinds.len() > MAX_PATH_DEPTH {
        return Err(MeaningError::InvalidValuePath(format!(
            "path of {} kinds exceeds the depth limit of {}",
            kinds.len(),
            MAX_PATH_DEPTH
        )));
    }

    Ok(Assignment {
        kinds,
        record_number,
        literal: literal.to_string(),
    })
}

/// Parse a schema and reject it when declarations are missing.
fn parse_schema<'r>(registry: &'r KindRegistry, kind: KindId) -> Result<Parser<'r>, MeaningError> {
    let mut parser = Parser::new(registry);
    parser.parse_kind(kind)?;

    if !parser.are_declarations_valid() {
        let missing: Vec<String> = parser
            .missing_declarations()
            .iter()
            .map(|k| registry.name(*k))
            .collect();
        return Err(MeaningError::DeclarationViolation(format!(
            "{} is missing entity declarations for {}",
            registry.name(kind),
            missing.join(", ")
        )));
    }
    Ok(parser)
}

// =============================================================================
// RECORD OPERATIONS
// =============================================================================

/// Store one record; returns its root instance id.
pub fn add_record(
    store: &ContextValueDictionary,
    registry: &KindRegistry,
    schema_kind: KindId,
    assignments: &[String],
) -> Result<InstanceId, MeaningError> {
    let mut parser = parse_schema(registry, schema_kind)?;
    let mut root = None;

    for text in assignments {
        let assignment = parse_assignment(registry, schema_kind, text)?;
        let value =
            parser.create_value(assignment.literal, assignment.record_number, &assignment.kinds)?;
        root = value.instance_path().first().copied();
        store.add_or_update(value)?;
    }

    let root = root.ok_or_else(|| {
        MeaningError::InvalidValuePath("a record needs at least one assignment".to_string())
    })?;
    tracing::info!(root = %root, schema = %registry.name(schema_kind), "Record stored");
    Ok(root)
}

/// One search result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchHit {
    pub node: u64,
    pub kind: String,
    /// Kind of the root-level record the node belongs to.
    pub record_kind: String,
    /// Instance id of that root-level record.
    pub record: String,
    /// Lookup rendering of the node, when its schema has one.
    pub display: Option<String>,
}

/// Search the store with values addressed in `schema_kind`.
pub fn search_records(
    store: &ContextValueDictionary,
    registry: &KindRegistry,
    schema_kind: KindId,
    assignments: &[String],
) -> Result<Vec<SearchHit>, MeaningError> {
    let mut parser = parse_schema(registry, schema_kind)?;

    let mut query = Vec::with_capacity(assignments.len());
    for text in assignments {
        let assignment = parse_assignment(registry, schema_kind, text)?;
        query.push(parser.create_value(
            assignment.literal,
            assignment.record_number,
            &assignment.kinds,
        )?);
    }

    store
        .search(&query)?
        .into_iter()
        .map(|node| {
            let path = store.get_path(node.id)?;
            let record = path.path.first().map(|p| p.instance).unwrap_or(InstanceId::NIL);
            Ok(SearchHit {
                node: node.id.0,
                kind: registry.name(node.kind),
                record_kind: registry.name(path.kind),
                record: record.to_string(),
                display: render_lookup(store, &parser, &node)?,
            })
        })
        .collect()
}

/// One stored value of a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldValue {
    pub group: String,
    pub label: String,
    pub path: String,
    pub record_number: usize,
    pub value: String,
}

/// A lookup rendered for one node of a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LookupText {
    pub kind: String,
    pub text: String,
}

/// The stored values of one root-level record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordView {
    pub root: String,
    pub schema: String,
    pub values: Vec<FieldValue>,
    pub lookups: Vec<LookupText>,
}

/// Collect the values of record `root`, field by field.
pub fn show_record(
    store: &ContextValueDictionary,
    registry: &KindRegistry,
    root: InstanceId,
) -> Result<RecordView, MeaningError> {
    let schema_kind = store
        .root_kind(root)?
        .ok_or_else(|| MeaningError::InvalidValuePath(format!("no record {}", root)))?;
    let root_id = record_node(store, root)?
        .ok_or_else(|| MeaningError::InvalidValuePath(format!("no record {}", root)))?;
    let root_node = store.node(root_id)?;
    let parser = parse_schema(registry, schema_kind)?;

    let max_record = store
        .get_context_values(root_node.id)?
        .iter()
        .map(|v| v.record_number())
        .max()
        .unwrap_or(DEFAULT_RECORD_NUMBER);

    let mut values = Vec::new();
    for group in parser.groups() {
        for field in group.fields() {
            for record_number in 0..=max_record {
                let Some((node, _)) = store.try_get_context_node(field, root, record_number)?
                else {
                    continue;
                };
                if let Some(value) = node.value {
                    values.push(FieldValue {
                        group: group.name().to_string(),
                        label: field.label().to_string(),
                        path: describe_path(registry, field.path()),
                        record_number,
                        value: value.value().to_string(),
                    });
                }
            }
        }
    }

    let mut lookups = Vec::new();
    for node in record_nodes(store, &root_node)? {
        if let Some(text) = render_lookup(store, &parser, &node)? {
            lookups.push(LookupText {
                kind: registry.name(node.kind),
                text,
            });
        }
    }

    Ok(RecordView {
        root: root.to_string(),
        schema: registry.name(schema_kind),
        values,
        lookups,
    })
}

/// The record's root and every node below it, each once, parents first.
fn record_nodes(
    store: &ContextValueDictionary,
    root: &ContextNode,
) -> Result<Vec<ContextNode>, MeaningError> {
    let mut seen = BTreeSet::from([root.id]);
    let mut nodes = vec![root.clone()];
    let mut frontier = vec![root.id];

    for _ in 0..MAX_PATH_DEPTH {
        let mut next = Vec::new();
        for id in frontier {
            for child in store.children(id)? {
                if child.value.is_none() && seen.insert(child.id) {
                    next.push(child.id);
                    nodes.push(child);
                }
            }
        }
        if next.is_empty() {
            break;
        }
        frontier = next;
    }
    Ok(nodes)
}

fn render_lookup(
    store: &ContextValueDictionary,
    parser: &Parser<'_>,
    node: &ContextNode,
) -> Result<Option<String>, MeaningError> {
    let Some(lookup) = parser.lookup(node.kind) else {
        return Ok(None);
    };
    let values = store.get_context_values(node.id)?;
    Ok(Some(lookup.render(&values, DEFAULT_RECORD_NUMBER)))
}

// =============================================================================
// SCHEMA COMMAND
// =============================================================================

/// Parse a catalog schema and print its layout.
pub fn cmd_schema(name: &str, json_mode: bool) -> Result<(), MeaningError> {
    let registry = catalog()?;
    let kind = schema(&registry, name)?;
    let mut parser = Parser::new(&registry);
    parser.parse_kind(kind)?;

    let missing: Vec<String> = parser
        .missing_declarations()
        .iter()
        .map(|k| registry.name(*k))
        .collect();

    if json_mode {
        let groups: Vec<serde_json::Value> = parser
            .groups()
            .iter()
            .map(|group| {
                serde_json::json!({
                    "name": group.name(),
                    "kind": registry.name(group.kind()),
                    "relationship": group.relationship().map(|r| registry.name(r.relationship())),
                    "fields": group.fields().iter().map(|field| serde_json::json!({
                        "label": field.label(),
                        "path": describe_path(&registry, field.path()),
                    })).collect::<Vec<_>>(),
                })
            })
            .collect();
        let output = serde_json::json!({
            "schema": name,
            "groups": groups,
            "field_count": parser.fields().len(),
            "has_lookup": parser.has_lookup(kind),
            "missing_declarations": missing,
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&output).unwrap_or_default()
        );
        return Ok(());
    }

    println!("Schema {}", name);
    println!("==================");
    for group in parser.groups() {
        match group.relationship() {
            Some(relationship) => println!(
                "{} (via {})",
                group.name(),
                registry.name(relationship.relationship())
            ),
            None => println!("{}", group.name()),
        }
        for field in group.fields() {
            println!(
                "  {:<20} {}",
                field.label(),
                describe_path(&registry, field.path())
            );
        }
    }
    println!();
    println!("Fields: {}", parser.fields().len());
    if missing.is_empty() {
        println!("Declarations: valid");
    } else {
        println!("Missing declarations: {}", missing.join(", "));
    }

    Ok(())
}

// =============================================================================
// ADD COMMAND
// =============================================================================

/// Store one record and save the store.
pub fn cmd_add(
    store_path: &Path,
    json_mode: bool,
    schema_name: &str,
    assignments: &[String],
) -> Result<(), MeaningError> {
    let registry = catalog()?;
    let kind = schema(&registry, schema_name)?;
    let store = load_store(store_path, &registry)?;

    let root = add_record(&store, &registry, kind, assignments)?;
    save_store(&store, &registry, store_path)?;

    if json_mode {
        let output = serde_json::json!({
            "root": root.to_string(),
            "schema": schema_name,
            "values": assignments.len(),
            "node_count": store.node_count()?,
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&output).unwrap_or_default()
        );
    } else {
        println!("Stored {} value(s) as record {}", assignments.len(), root);
    }

    Ok(())
}

// =============================================================================
// SEARCH COMMAND
// =============================================================================

pub fn cmd_search(
    store_path: &Path,
    json_mode: bool,
    schema_name: &str,
    assignments: &[String],
) -> Result<(), MeaningError> {
    let registry = catalog()?;
    let kind = schema(&registry, schema_name)?;
    let store = load_store(store_path, &registry)?;

    let hits = search_records(&store, &registry, kind, assignments)?;

    if json_mode {
        let output = serde_json::json!({
            "count": hits.len(),
            "matches": hits,
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&output).unwrap_or_default()
        );
        return Ok(());
    }

    println!("{} match(es)", hits.len());
    for hit in &hits {
        let display = hit.display.as_deref().unwrap_or("");
        println!(
            "  {:<24} record {} ({}) {}",
            hit.kind, hit.record, hit.record_kind, display
        );
    }

    Ok(())
}

// =============================================================================
// SHOW COMMAND
// =============================================================================

pub fn cmd_show(store_path: &Path, json_mode: bool, root: &str) -> Result<(), MeaningError> {
    let registry = catalog()?;
    let root: InstanceId = root.parse()?;
    let store = load_store(store_path, &registry)?;

    let view = show_record(&store, &registry, root)?;

    if json_mode {
        println!("{}", serde_json::to_string_pretty(&view).unwrap_or_default());
        return Ok(());
    }

    println!("Record {} ({})", view.root, view.schema);
    println!("==================");
    for lookup in &view.lookups {
        println!("{}: {}", lookup.kind, lookup.text);
    }
    if !view.lookups.is_empty() {
        println!();
    }
    let mut group = None;
    for value in &view.values {
        if group != Some(value.group.as_str()) {
            println!("{}", value.group);
            group = Some(value.group.as_str());
        }
        if value.record_number == DEFAULT_RECORD_NUMBER {
            println!("  {:<20} {}", value.label, value.value);
        } else {
            println!("  {:<20} {} (#{})", value.label, value.value, value.record_number);
        }
    }

    Ok(())
}

// =============================================================================
// STATUS COMMAND
// =============================================================================

/// Show store status.
pub fn cmd_status(store_path: &Path, json_mode: bool) -> Result<(), MeaningError> {
    let registry = catalog()?;
    let store = load_store(store_path, &registry)?;

    let node_count = store.node_count()?;
    let kind_count = store.kind_count()?;
    let record_count = store.roots()?.len();

    if json_mode {
        let output = serde_json::json!({
            "store": store_path.to_string_lossy(),
            "exists": store_path.exists(),
            "node_count": node_count,
            "kind_count": kind_count,
            "record_count": record_count,
            "schemas": registry.schemas().count(),
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&output).unwrap_or_default()
        );
        return Ok(());
    }

    println!("Meaning Store Status");
    println!("==================");
    println!("Store:   {:?}", store_path);
    println!();
    println!("Records: {}", record_count);
    println!("Nodes:   {}", node_count);
    println!("Kinds:   {}", kind_count);
    println!("Schemas: {}", registry.schemas().count());

    Ok(())
}

// =============================================================================
// EXPORT COMMAND
// =============================================================================

/// Export the store as JSON.
pub fn cmd_export(store_path: &Path, output: &Path) -> Result<(), MeaningError> {
    let validated_output = validate_output_path(output)?;

    let registry = catalog()?;
    let store = load_store(store_path, &registry)?;
    let serializable = SerializableStore::from_store(&store, &registry)?;
    let data = serde_json::to_vec_pretty(&serializable)
        .map_err(|e| MeaningError::SerializationError(e.to_string()))?;

    std::fs::write(&validated_output, &data)
        .map_err(|e| MeaningError::IoError(format!("Write file: {}", e)))?;

    println!("Exported {} bytes to {:?}", data.len(), validated_output);

    Ok(())
}

// =============================================================================
// INIT COMMAND
// =============================================================================

/// Initialize a new empty store.
pub fn cmd_init(store_path: &Path, force: bool) -> Result<(), MeaningError> {
    if store_path.exists() && !force {
        return Err(MeaningError::IoError(
            "Store already exists. Use --force to overwrite.".to_string(),
        ));
    }

    let registry = catalog()?;
    save_store(&ContextValueDictionary::new(), &registry, store_path)?;
    println!("Initialized new store at {:?}", store_path);

    Ok(())
}

// =============================================================================
// HELPER FUNCTIONS
// =============================================================================

/// Load the store at `store_path`, or an empty store when the file is absent.
pub fn load_store(
    store_path: &Path,
    registry: &KindRegistry,
) -> Result<ContextValueDictionary, MeaningError> {
    if !store_path.exists() {
        return Ok(ContextValueDictionary::new());
    }

    let validated = validate_file_path(store_path)?;
    validate_file_size(&validated, MAX_STORE_FILE_SIZE)?;
    let data = std::fs::read(&validated)
        .map_err(|e| MeaningError::IoError(format!("Read store: {}", e)))?;

    store_from_bytes(&data, registry)
}

/// Write the store to `store_path`.
pub fn save_store(
    store: &ContextValueDictionary,
    registry: &KindRegistry,
    store_path: &Path,
) -> Result<(), MeaningError> {
    let validated = validate_output_path(store_path)?;
    let data = store_to_bytes(store, registry)?;
    std::fs::write(&validated, &data)
        .map_err(|e| MeaningError::IoError(format!("Write store: {}", e)))?;
    tracing::debug!(bytes = data.len(), path = %validated.display(), "Store saved");
    Ok(())
}

/// Node id of the root-level record `root`.
pub fn record_node(
    store: &ContextValueDictionary,
    root: InstanceId,
) -> Result<Option<NodeId>, MeaningError> {
    Ok(store
        .roots()?
        .into_iter()
        .find(|n| n.instance == root)
        .map(|n| n.id))
}
