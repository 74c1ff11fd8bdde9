use crate::{
    error::SchemaError,
    utils::{escape_rust_keyword, to_snake_case},
};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

lazy_static! {
    static ref MODULE_PATH: Regex =
        Regex::new(r"^(crate|self|super|[A-Za-z_][A-Za-z0-9_]*)(::[A-Za-z_][A-Za-z0-9_]*)*$").unwrap();
}

/// How schema packages map onto Rust modules.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NamespaceMode {
    /// Every declaration lives in the base namespace.
    #[default]
    Flat,
    /// `package a.b` lives in `<base>::a::b`.
    Nested,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerConfig {
    pub namespace_mode: NamespaceMode,

    /// Module path the generated `mod.rs` is mounted at.
    pub base_namespace: String,

    /// Also emit declarations of files that are only imported.
    pub include_imports: bool,

    /// Reject malformed field statements instead of skipping them.
    pub strict_fields: bool,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        CompilerConfig {
            namespace_mode:  NamespaceMode::default(),
            base_namespace:  "crate::proto".to_string(),
            include_imports: true,
            strict_fields:   false,
        }
    }
}

impl CompilerConfig {
    pub fn from_json_str(text: &str) -> Result<Self, SchemaError> {
        let config: CompilerConfig = serde_json::from_str(text)
            .map_err(|e| SchemaError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, SchemaError> {
        let text = fs::read_to_string(path.as_ref()).map_err(|source| SchemaError::Io {
            path: path.as_ref().display().to_string(),
            source,
        })?;
        Self::from_json_str(&text)
    }

    pub fn validate(&self) -> Result<(), SchemaError> {
        if !MODULE_PATH.is_match(&self.base_namespace) {
            return Err(SchemaError::Config(format!(
                "base_namespace {:?} is not a Rust module path",
                self.base_namespace
            )));
        }
        Ok(())
    }

    /// Module directory segments for a package (empty in flat mode).
    pub fn namespace_dir(&self, package: Option<&str>) -> Vec<String> {
        match (self.namespace_mode, package) {
            (NamespaceMode::Nested, Some(package)) => package
                .split('.')
                .filter(|s| !s.is_empty())
                .map(|s| escape_rust_keyword(&to_snake_case(s)))
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Full Rust module path for a package.
    pub fn namespace_for(&self, package: Option<&str>) -> String {
        self.namespace_path(&self.namespace_dir(package))
    }

    pub fn namespace_path(&self, dir: &[String]) -> String {
        let mut path = self.base_namespace.clone();
        for segment in dir {
            path.push_str("::");
            path.push_str(segment);
        }
        path
    }
}
