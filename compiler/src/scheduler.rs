use crate::{
    config::CompilerConfig,
    error::SchemaError,
    gen_rust::{emit_enum, emit_oneof, emit_record, emit_well_known, EmitContext},
    registry::{ResolvedType, SymbolRegistry},
    types::{FieldType, Message, SchemaFile},
    utils::{escape_rust_keyword, to_snake_case},
    well_known::{self, WellKnownType},
};
use log::{debug, info};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

pub const GENERATED_HEADER: &str = "// @generated by protorec. Do not edit.\n";

/// Stem of the aggregate artifact holding every record of a namespace.
pub const AGGREGATE_STEM: &str = "messages";

const SCOPE_IMPORT: &str = "#[allow(unused_imports)]\nuse super::*;\n";

/// One standalone artifact (an enum or a oneof union).
#[derive(Debug)]
struct Artifact {
    code:         String,
    /// Needs the sibling declarations in scope.
    scope_import: bool,
}

/// Everything emitted into one Rust module.
#[derive(Debug, Default)]
struct Namespace {
    sources:   Vec<String>,
    records:   Vec<String>,
    artifacts: BTreeMap<String, Artifact>,
    /// Rust type name to the schema declaration it came from.
    declared:  HashMap<String, String>,
}

/// Collects the files to generate and turns them into a path to content map.
pub struct OutputScheduler<'a> {
    registry:  &'a SymbolRegistry,
    config:    &'a CompilerConfig,
    files:     Vec<&'a SchemaFile>,
    scheduled: HashSet<String>,
}

impl<'a> OutputScheduler<'a> {
    pub fn new(registry: &'a SymbolRegistry, config: &'a CompilerConfig) -> Self {
        OutputScheduler {
            registry,
            config,
            files: Vec::new(),
            scheduled: HashSet::new(),
        }
    }

    /// Queues a file. Returns false if it was already queued.
    pub fn schedule_file(&mut self, file: &'a SchemaFile) -> bool {
        if !self.scheduled.insert(file.name.clone()) {
            return false;
        }
        debug!("scheduled {}", file.name);
        self.files.push(file);
        true
    }

    pub fn scheduled_files(&self) -> impl Iterator<Item = &str> + '_ {
        self.files.iter().map(|f| f.name.as_str())
    }

    /// Emits every scheduled file. Keys are `/`-separated paths relative to
    /// the output root.
    pub fn generate_all(&self) -> Result<BTreeMap<String, String>, SchemaError> {
        let mut namespaces: BTreeMap<Vec<String>, Namespace> = BTreeMap::new();
        namespaces.entry(Vec::new()).or_default();

        for file in &self.files {
            let ctx = EmitContext::new(self.registry, self.config, file);
            let dir = ctx.namespace_dir();
            let namespace_path = self.config.namespace_path(&dir);
            let namespace = namespaces.entry(dir).or_default();
            namespace.sources.push(file.name.clone());

            for message in &file.messages {
                self.emit_message(message, &ctx, &namespace_path, namespace)?;
            }
            for enum_def in &file.enums {
                let name = ctx.type_name(&enum_def.name);
                let origin = qualified(file.package.as_deref(), &enum_def.name);
                declare(namespace, &namespace_path, &name, &origin)?;
                add_artifact(namespace, &namespace_path, &name, emit_enum(enum_def, &ctx), false)?;
            }
        }

        for known in self.collect_well_known() {
            let Some(code) = emit_well_known(known) else {
                continue;
            };
            let dir = self.config.namespace_dir(Some(well_known::NAMESPACE));
            let namespace_path = self.config.namespace_path(&dir);
            let namespace = namespaces.entry(dir).or_default();
            declare(namespace, &namespace_path, known.simple_name(), &known.full_name())?;
            namespace.records.push(code);
        }

        let output = self.assemble(&namespaces)?;
        info!(
            "generated {} artifacts from {} schema files",
            output.len(),
            self.files.len()
        );
        Ok(output)
    }

    fn emit_message(
        &self,
        message: &Message,
        ctx: &EmitContext,
        namespace_path: &str,
        namespace: &mut Namespace,
    ) -> Result<(), SchemaError> {
        let name = ctx.type_name(&message.name);
        let inner = ctx.nested(&message.name);
        declare(namespace, namespace_path, &name, &inner.qualified_scope())?;
        namespace.records.push(emit_record(message, ctx)?);

        for oneof in &message.oneofs {
            let union = inner.oneof_type_name(&oneof.name);
            let origin = format!("{}.{}", inner.qualified_scope(), oneof.name);
            declare(namespace, namespace_path, &union, &origin)?;
            add_artifact(namespace, namespace_path, &union, emit_oneof(oneof, &inner)?, true)?;
        }
        for enum_def in &message.enums {
            let name = inner.type_name(&enum_def.name);
            let origin = format!("{}.{}", inner.qualified_scope(), enum_def.name);
            declare(namespace, namespace_path, &name, &origin)?;
            add_artifact(namespace, namespace_path, &name, emit_enum(enum_def, &inner), false)?;
        }
        for nested in &message.messages {
            self.emit_message(nested, &inner, namespace_path, namespace)?;
        }
        Ok(())
    }

    /// Composite well-known types referenced by any scheduled file.
    fn collect_well_known(&self) -> BTreeSet<WellKnownType> {
        let mut found = BTreeSet::new();
        for file in &self.files {
            let mut scope = Vec::new();
            for message in &file.messages {
                self.scan_message(file, message, &mut scope, &mut found);
            }
        }
        found
    }

    fn scan_message(
        &self,
        file: &SchemaFile,
        message: &Message,
        scope: &mut Vec<String>,
        found: &mut BTreeSet<WellKnownType>,
    ) {
        scope.push(message.name.clone());
        for field in message.all_fields() {
            let name = match &field.type_ {
                FieldType::Named(name) => name,
                FieldType::Map(_, value) => match value.as_ref() {
                    FieldType::Named(name) => name,
                    _ => continue,
                },
                FieldType::Scalar(_) => continue,
            };
            if let Some(ResolvedType::WellKnown(known)) =
                self.registry
                    .resolve_scoped(name, &file.name, file.package.as_deref(), scope)
            {
                if known.is_composite() {
                    found.insert(known);
                }
            }
        }
        for nested in &message.messages {
            self.scan_message(file, nested, scope, found);
        }
        scope.pop();
    }

    fn assemble(
        &self,
        namespaces: &BTreeMap<Vec<String>, Namespace>,
    ) -> Result<BTreeMap<String, String>, SchemaError> {
        // Every ancestor directory needs an index so the tree is mountable.
        let mut children: BTreeMap<Vec<String>, BTreeSet<String>> = BTreeMap::new();
        for dir in namespaces.keys() {
            children.entry(dir.clone()).or_default();
            for depth in 0..dir.len() {
                children
                    .entry(dir[..depth].to_vec())
                    .or_default()
                    .insert(dir[depth].clone());
            }
        }

        let mut output = BTreeMap::new();
        for (dir, modules) in &children {
            let prefix: String = dir.iter().map(|segment| format!("{}/", segment)).collect();
            let mut stems = Vec::new();

            if let Some(namespace) = namespaces.get(dir) {
                if !namespace.records.is_empty() {
                    if modules.contains(AGGREGATE_STEM) {
                        return Err(SchemaError::DuplicateDeclaration {
                            name:      AGGREGATE_STEM.to_string(),
                            namespace: self.config.namespace_path(dir),
                            first:     "a nested package module".to_string(),
                            second:    format!("{}.rs", AGGREGATE_STEM),
                        });
                    }
                    let mut code = GENERATED_HEADER.to_string();
                    for source in &namespace.sources {
                        code.push_str(&format!("// source: {}\n", source));
                    }
                    code.push('\n');
                    code.push_str(SCOPE_IMPORT);
                    for record in &namespace.records {
                        code.push('\n');
                        code.push_str(record);
                    }
                    debug!("emitted {}{}.rs ({} records)", prefix, AGGREGATE_STEM, namespace.records.len());
                    output.insert(format!("{}{}.rs", prefix, AGGREGATE_STEM), code);
                    stems.push(AGGREGATE_STEM.to_string());
                }

                for (stem, artifact) in &namespace.artifacts {
                    if modules.contains(stem) {
                        return Err(SchemaError::DuplicateDeclaration {
                            name:      stem.clone(),
                            namespace: self.config.namespace_path(dir),
                            first:     "a nested package module".to_string(),
                            second:    format!("{}.rs", stem),
                        });
                    }
                    let mut code = GENERATED_HEADER.to_string();
                    code.push('\n');
                    if artifact.scope_import {
                        code.push_str(SCOPE_IMPORT);
                        code.push('\n');
                    }
                    code.push_str(&artifact.code);
                    debug!("emitted {}{}.rs", prefix, stem);
                    output.insert(format!("{}{}.rs", prefix, stem), code);
                    stems.push(stem.clone());
                }
            }

            output.insert(format!("{}mod.rs", prefix), module_index(modules, &stems));
        }
        Ok(output)
    }
}

fn qualified(package: Option<&str>, name: &str) -> String {
    match package {
        Some(package) if !package.is_empty() => format!("{}.{}", package, name),
        _ => name.to_string(),
    }
}

fn declare(
    namespace: &mut Namespace,
    namespace_path: &str,
    name: &str,
    origin: &str,
) -> Result<(), SchemaError> {
    if let Some(first) = namespace.declared.get(name) {
        return Err(SchemaError::DuplicateDeclaration {
            name:      name.to_string(),
            namespace: namespace_path.to_string(),
            first:     first.clone(),
            second:    origin.to_string(),
        });
    }
    namespace.declared.insert(name.to_string(), origin.to_string());
    Ok(())
}

fn add_artifact(
    namespace: &mut Namespace,
    namespace_path: &str,
    type_name: &str,
    code: String,
    scope_import: bool,
) -> Result<(), SchemaError> {
    let stem = escape_rust_keyword(&to_snake_case(type_name));
    if stem == AGGREGATE_STEM || stem == "mod" || namespace.artifacts.contains_key(&stem) {
        return Err(SchemaError::DuplicateDeclaration {
            name:      stem.clone(),
            namespace: namespace_path.to_string(),
            first:     format!("{}.rs", stem),
            second:    type_name.to_string(),
        });
    }
    namespace.artifacts.insert(stem, Artifact { code, scope_import });
    Ok(())
}

fn module_index(children: &BTreeSet<String>, stems: &[String]) -> String {
    let mut code = GENERATED_HEADER.to_string();
    if !children.is_empty() {
        code.push('\n');
        for child in children {
            code.push_str(&format!("pub mod {};\n", child));
        }
    }
    for stem in stems {
        code.push_str(&format!("\nmod {};\npub use self::{}::*;\n", stem, stem));
    }
    code
}
