use crate::{
    error::SchemaError,
    types::{EnumDef, FieldType, Import, Label, Message, ScalarKind, SchemaFile},
    well_known::{self, WellKnown, WellKnownType},
};
use log::debug;
use std::collections::{HashMap, HashSet, VecDeque};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SymbolKind {
    Message,
    Enum,
}

/// A registered message or enum declaration.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Symbol {
    pub name:    String,
    /// Enclosing message names, outermost first.
    pub parents: Vec<String>,
    pub package: Option<String>,
    pub file:    String,
    pub kind:    SymbolKind,
}

impl Symbol {
    /// `Parent.Name`, without the package.
    pub fn nested_name(&self) -> String {
        let mut parts = self.parents.clone();
        parts.push(self.name.clone());
        parts.join(".")
    }

    /// `package.Parent.Name`
    pub fn full_name(&self) -> String {
        match self.package.as_deref() {
            Some(package) if !package.is_empty() => format!("{}.{}", package, self.nested_name()),
            _ => self.nested_name(),
        }
    }

    /// The scope references made from inside this declaration resolve in.
    pub fn scope(&self) -> Vec<String> {
        let mut scope = self.parents.clone();
        scope.push(self.name.clone());
        scope
    }
}

/// What a type reference resolves to.
#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedType {
    Scalar(ScalarKind),
    /// A `google.protobuf.*Value` wrapper: the scalar, with message wire encoding.
    Wrapper(ScalarKind),
    WellKnown(WellKnownType),
    Message(Symbol),
    Enum(Symbol),
}

impl From<&Symbol> for ResolvedType {
    fn from(symbol: &Symbol) -> Self {
        match symbol.kind {
            SymbolKind::Message => ResolvedType::Message(symbol.clone()),
            SymbolKind::Enum    => ResolvedType::Enum(symbol.clone()),
        }
    }
}

impl From<WellKnown> for ResolvedType {
    fn from(known: WellKnown) -> Self {
        match known {
            WellKnown::Type(t)    => ResolvedType::WellKnown(t),
            WellKnown::Wrapper(k) => ResolvedType::Wrapper(k),
        }
    }
}

/// The global symbol table of one compilation session. Owns every
/// registered file.
#[derive(Debug, Default)]
pub struct SymbolRegistry {
    files:        Vec<SchemaFile>,
    file_index:   HashMap<String, usize>,
    symbols:      HashMap<String, Symbol>,
    file_symbols: HashMap<String, Vec<String>>,
}

impl SymbolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a file and all of its (nested) declarations. Registering the same
    /// file name twice is a no-op. Nothing is changed when validation fails.
    pub fn register_file(&mut self, file: SchemaFile) -> Result<(), SchemaError> {
        if self.file_index.contains_key(&file.name) {
            debug!("{} is already registered", file.name);
            return Ok(());
        }

        let package = file.package.clone().unwrap_or_default();
        for message in &file.messages {
            check_field_numbers(&file.name, &package, message)?;
        }

        let mut new_symbols = Vec::new();
        collect_symbols(&file, &mut new_symbols);

        let mut names = Vec::with_capacity(new_symbols.len());
        let mut seen = HashSet::new();
        for symbol in &new_symbols {
            let full_name = symbol.full_name();
            if let Some(existing) = self.symbols.get(&full_name) {
                return Err(SchemaError::DuplicateSymbol {
                    name:   full_name,
                    first:  existing.file.clone(),
                    second: file.name.clone(),
                });
            }
            if !seen.insert(full_name.clone()) {
                return Err(SchemaError::DuplicateSymbol {
                    name:   full_name,
                    first:  file.name.clone(),
                    second: file.name.clone(),
                });
            }
            names.push(full_name);
        }

        for (full_name, symbol) in names.iter().zip(new_symbols) {
            self.symbols.insert(full_name.clone(), symbol);
        }
        debug!("registered {} ({} declarations)", file.name, names.len());
        self.file_symbols.insert(file.name.clone(), names);
        self.file_index.insert(file.name.clone(), self.files.len());
        self.files.push(file);
        Ok(())
    }

    pub fn file(&self, name: &str) -> Option<&SchemaFile> {
        self.file_index.get(name).map(|&i| &self.files[i])
    }

    pub fn files(&self) -> &[SchemaFile] {
        &self.files
    }

    pub fn symbol(&self, full_name: &str) -> Option<&Symbol> {
        self.symbols.get(full_name)
    }

    /// Declarations of one file in declaration order.
    pub fn symbols_in_file<'r>(&'r self, file: &str) -> impl Iterator<Item = &'r Symbol> + 'r {
        self.file_symbols
            .get(file)
            .into_iter()
            .flatten()
            .filter_map(move |name| self.symbols.get(name))
    }

    /// The symbol of the message at `scope` (outermost first) in `package`.
    pub fn message_symbol(&self, package: Option<&str>, scope: &[String]) -> Option<&Symbol> {
        let nested = scope.join(".");
        let full_name = match package {
            Some(package) if !package.is_empty() => format!("{}.{}", package, nested),
            _ => nested,
        };
        self.symbols
            .get(&full_name)
            .filter(|s| s.kind == SymbolKind::Message)
    }

    pub fn message(&self, symbol: &Symbol) -> Option<&Message> {
        if symbol.kind != SymbolKind::Message {
            return None;
        }
        message_at(self.file(&symbol.file)?, &symbol.scope())
    }

    pub fn enum_def(&self, symbol: &Symbol) -> Option<&EnumDef> {
        if symbol.kind != SymbolKind::Enum {
            return None;
        }
        let file = self.file(&symbol.file)?;
        let enums = if symbol.parents.is_empty() {
            &file.enums
        } else {
            &message_at(file, &symbol.parents)?.enums
        };
        enums.iter().find(|e| e.name == symbol.name)
    }

    pub fn imports_of(&self, file: &str) -> &[Import] {
        self.file(file).map(|f| f.imports.as_slice()).unwrap_or(&[])
    }

    /// `roots` followed by everything they import, transitively, each once.
    /// Well-known imports are not files and are left out.
    pub fn dependency_closure(&self, roots: &[&str]) -> Vec<&SchemaFile> {
        let mut seen = HashSet::new();
        let mut order = Vec::new();
        let mut stack: Vec<String> = roots.iter().rev().map(|r| r.to_string()).collect();

        while let Some(name) = stack.pop() {
            if !seen.insert(name.clone()) {
                continue;
            }
            if let Some(file) = self.file(&name) {
                order.push(file);
                for import in file.imports.iter().rev() {
                    if !well_known::is_well_known_import(&import.path) {
                        stack.push(import.path.clone());
                    }
                }
            }
        }
        order
    }

    /// Resolves a type name referenced from top-level context of a file.
    pub fn resolve_type(
        &self,
        name: &str,
        from_file: &str,
        from_package: Option<&str>,
    ) -> Option<ResolvedType> {
        self.resolve_scoped(name, from_file, from_package, &[])
    }

    /// Resolves a type name referenced from inside the message chain `scope`.
    ///
    /// Order: well-known types, scalar keywords, the referencing package
    /// (innermost enclosing message first, then parent packages), exact
    /// nested names declared in the referencing file, packages of imported files, and
    /// finally the name as a fully qualified key. A leading `.` skips straight
    /// to the qualified lookup.
    pub fn resolve_scoped(
        &self,
        name: &str,
        from_file: &str,
        from_package: Option<&str>,
        scope: &[String],
    ) -> Option<ResolvedType> {
        let (absolute, name) = match name.strip_prefix('.') {
            Some(rest) => (true, rest),
            None => (false, name),
        };

        if well_known::in_namespace(name) {
            return well_known::lookup(name).map(ResolvedType::from);
        }
        if absolute {
            return self.lookup(name);
        }

        if let Some(kind) = ScalarKind::from_keyword(name) {
            return Some(ResolvedType::Scalar(kind));
        }

        for prefix in scope_prefixes(from_package, scope) {
            if let Some(resolved) = self.lookup(&format!("{}.{}", prefix, name)) {
                return Some(resolved);
            }
        }

        if let Some(resolved) = self.lookup_in_file(from_file, name) {
            return Some(resolved);
        }

        for package in self.import_packages(from_file) {
            let candidate = format!("{}.{}", package, name);
            if package == well_known::NAMESPACE {
                if let Some(known) = well_known::lookup(&candidate) {
                    return Some(known.into());
                }
            } else if let Some(resolved) = self.lookup(&candidate) {
                return Some(resolved);
            }
        }

        self.lookup(name)
    }

    /// Whether message `from` contains `to` through singular message or
    /// oneof fields, directly or transitively.
    pub fn reaches(&self, from: &Symbol, to: &Symbol) -> bool {
        let mut visited = HashSet::new();
        self.reaches_inner(from, to, &mut visited)
    }

    fn reaches_inner(&self, from: &Symbol, to: &Symbol, visited: &mut HashSet<String>) -> bool {
        if !visited.insert(from.full_name()) {
            return false;
        }
        let Some(message) = self.message(from) else {
            return false;
        };
        let scope = from.scope();
        for field in message.all_fields() {
            if field.label == Label::Repeated {
                continue;
            }
            let FieldType::Named(name) = &field.type_ else {
                continue;
            };
            if let Some(ResolvedType::Message(target)) =
                self.resolve_scoped(name, &from.file, from.package.as_deref(), &scope)
            {
                if &target == to || self.reaches_inner(&target, to, visited) {
                    return true;
                }
            }
        }
        false
    }

    fn lookup(&self, full_name: &str) -> Option<ResolvedType> {
        self.symbols.get(full_name).map(ResolvedType::from)
    }

    /// A declaration of `file` whose nested name (`Outer.Inner`) is exactly
    /// `name`. Nested types out of the referencing scope never match by their
    /// simple name.
    fn lookup_in_file(&self, file: &str, name: &str) -> Option<ResolvedType> {
        self.symbols_in_file(file)
            .find(|symbol| symbol.nested_name() == name)
            .map(ResolvedType::from)
    }

    /// Packages of the files `file` imports, following `import public`
    /// re-exports, in import order.
    fn import_packages(&self, file: &str) -> Vec<String> {
        let mut packages = Vec::new();
        let mut seen = HashSet::new();
        let mut pending: VecDeque<String> = self
            .imports_of(file)
            .iter()
            .map(|i| i.path.clone())
            .collect();

        while let Some(path) = pending.pop_front() {
            if !seen.insert(path.clone()) {
                continue;
            }
            let package = if well_known::is_well_known_import(&path) {
                Some(well_known::NAMESPACE.to_string())
            } else if let Some(imported) = self.file(&path) {
                for public in imported.imports.iter().filter(|i| i.public) {
                    pending.push_back(public.path.clone());
                }
                imported.package.clone()
            } else {
                None
            };
            if let Some(package) = package.filter(|p| !p.is_empty()) {
                if !packages.contains(&package) {
                    packages.push(package);
                }
            }
        }
        packages
    }
}

fn message_at<'f>(file: &'f SchemaFile, path: &[String]) -> Option<&'f Message> {
    let mut messages = &file.messages;
    let mut found = None;
    for name in path {
        let message = messages.iter().find(|m| &m.name == name)?;
        messages = &message.messages;
        found = Some(message);
    }
    found
}

/// `a.b` + [Outer, Inner] gives `a.b.Outer.Inner`, `a.b.Outer`, `a.b`, `a`.
fn scope_prefixes(package: Option<&str>, scope: &[String]) -> Vec<String> {
    let mut segments: Vec<&str> = package
        .map(|p| p.split('.').filter(|s| !s.is_empty()).collect())
        .unwrap_or_default();
    segments.extend(scope.iter().map(String::as_str));
    (1..=segments.len())
        .rev()
        .map(|len| segments[..len].join("."))
        .collect()
}

fn check_field_numbers(file: &str, scope: &str, message: &Message) -> Result<(), SchemaError> {
    let full_name = if scope.is_empty() {
        message.name.clone()
    } else {
        format!("{}.{}", scope, message.name)
    };

    let mut seen: HashMap<i32, &str> = HashMap::new();
    for field in message.all_fields() {
        if let Some(first) = seen.insert(field.number, &field.name) {
            return Err(SchemaError::DuplicateFieldNumber {
                file:    file.to_string(),
                message: full_name,
                number:  field.number,
                first:   first.to_string(),
                second:  field.name.clone(),
            });
        }
    }

    for nested in &message.messages {
        check_field_numbers(file, &full_name, nested)?;
    }
    Ok(())
}

fn collect_symbols(file: &SchemaFile, out: &mut Vec<Symbol>) {
    fn symbol(file: &SchemaFile, parents: &[String], name: &str, kind: SymbolKind) -> Symbol {
        Symbol {
            name: name.to_string(),
            parents: parents.to_vec(),
            package: file.package.clone(),
            file: file.name.clone(),
            kind,
        }
    }

    fn walk(file: &SchemaFile, parents: &mut Vec<String>, message: &Message, out: &mut Vec<Symbol>) {
        out.push(symbol(file, parents, &message.name, SymbolKind::Message));
        parents.push(message.name.clone());
        for enum_def in &message.enums {
            out.push(symbol(file, parents, &enum_def.name, SymbolKind::Enum));
        }
        for nested in &message.messages {
            walk(file, parents, nested, out);
        }
        parents.pop();
    }

    let mut parents = Vec::new();
    for message in &file.messages {
        walk(file, &mut parents, message, out);
    }
    for enum_def in &file.enums {
        out.push(symbol(file, &parents, &enum_def.name, SymbolKind::Enum));
    }
}
