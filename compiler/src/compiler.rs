use crate::{
    config::CompilerConfig,
    error::SchemaError,
    loader::FsLoader,
    parser::{parse_schema_with, ParseOptions},
    registry::SymbolRegistry,
    scheduler::OutputScheduler,
    traits::SchemaLoader,
    types::SchemaFile,
    well_known,
};
use log::info;
use std::collections::{BTreeMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};

/// One compilation session per call: a fresh registry is built, used and
/// dropped each time.
#[derive(Debug, Clone, Default)]
pub struct Compiler {
    config: CompilerConfig,
}

impl Compiler {
    pub fn new(config: CompilerConfig) -> Self {
        Compiler { config }
    }

    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    /// Compiles files on disk. Imports are looked up on `search_roots`.
    pub fn compile(
        &self,
        inputs: &[PathBuf],
        search_roots: &[PathBuf],
    ) -> Result<BTreeMap<String, String>, SchemaError> {
        let loader = FsLoader::new(search_roots.to_vec());
        let names: Vec<String> = inputs.iter().map(|p| loader.identify(p)).collect();
        self.compile_with_loader(&names, &loader)
    }

    pub fn compile_with_loader<L: SchemaLoader>(
        &self,
        inputs: &[String],
        loader: &L,
    ) -> Result<BTreeMap<String, String>, SchemaError> {
        let registry = self.load_registry(inputs, loader)?;
        self.generate(&registry, inputs)
    }

    /// Pass 1: parses the inputs and everything they import, then registers
    /// all of it. Parse failures of independent files are all reported.
    pub fn load_registry<L: SchemaLoader>(
        &self,
        inputs: &[String],
        loader: &L,
    ) -> Result<SymbolRegistry, SchemaError> {
        self.config.validate()?;
        let options = ParseOptions {
            strict_fields: self.config.strict_fields,
        };

        let mut pending: VecDeque<(String, Option<String>)> =
            inputs.iter().map(|name| (name.clone(), None)).collect();
        let mut seen = HashSet::new();
        let mut parsed: Vec<SchemaFile> = Vec::new();
        let mut errors = Vec::new();

        while let Some((name, importer)) = pending.pop_front() {
            if !seen.insert(name.clone()) {
                continue;
            }
            let text = match loader.load(&name) {
                Ok(Some(text)) => text,
                Ok(None) => {
                    errors.push(match importer {
                        Some(file) => SchemaError::MissingImport { file, import: name },
                        None => SchemaError::MissingInput(name),
                    });
                    continue;
                }
                Err(err) => {
                    errors.push(err);
                    continue;
                }
            };

            match parse_schema_with(&text, &name, &options) {
                Ok(file) => {
                    for import in &file.imports {
                        if !well_known::is_well_known_import(&import.path) {
                            pending.push_back((import.path.clone(), Some(name.clone())));
                        }
                    }
                    parsed.push(file);
                }
                Err(err) => errors.push(err),
            }
        }

        if let Some(err) = SchemaError::collect(errors) {
            return Err(err);
        }
        info!("parsed {} schema files", parsed.len());

        let mut registry = SymbolRegistry::new();
        for file in parsed {
            registry.register_file(file)?;
        }
        Ok(registry)
    }

    /// Pass 2: resolves and emits the inputs, plus their imports when
    /// `include_imports` is set.
    pub fn generate(
        &self,
        registry: &SymbolRegistry,
        inputs: &[String],
    ) -> Result<BTreeMap<String, String>, SchemaError> {
        let roots: Vec<&str> = inputs.iter().map(String::as_str).collect();
        let files = if self.config.include_imports {
            registry.dependency_closure(&roots)
        } else {
            roots.iter().filter_map(|name| registry.file(name)).collect()
        };

        let mut scheduler = OutputScheduler::new(registry, &self.config);
        for file in files {
            scheduler.schedule_file(file);
        }
        scheduler.generate_all()
    }
}

/// Compiles `inputs` with the default configuration.
pub fn compile_protos<P: AsRef<Path>>(
    inputs: &[P],
    search_roots: &[P],
) -> Result<BTreeMap<String, String>, SchemaError> {
    let inputs: Vec<PathBuf> = inputs.iter().map(|p| p.as_ref().to_path_buf()).collect();
    let roots: Vec<PathBuf> = search_roots.iter().map(|p| p.as_ref().to_path_buf()).collect();
    Compiler::default().compile(&inputs, &roots)
}
