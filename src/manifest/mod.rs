//! TOML interface manifests.
//!
//! A manifest lets a host build step describe interfaces without compiling
//! them:
//!
//! ```toml
//! [options]
//! suggest_bindings = true
//! deny_warnings = false
//!
//! [[interface]]
//! name = "People"
//!
//! [[interface.method]]
//! name = "by_id"
//! query = "start n=node({id}) return n"
//! returns = "single"
//!
//! [[interface.method.param]]
//! name = "id"
//! type = "i64"
//! binding = "id"
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::Deserialize;
use thiserror::Error;

use crate::contract::{InterfaceDecl, MethodDecl, ReturnShape, ValidatorOptions};

/// Errors raised while loading a manifest.
#[derive(Debug, Error)]
pub enum ManifestError {
    /// The file could not be read.
    #[error("failed to read manifest {path}: {source}")]
    Read {
        /// Manifest path.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// The contents are not a valid manifest.
    #[error("failed to parse manifest: {source}")]
    Parse {
        /// Underlying TOML error.
        #[from]
        source: toml::de::Error,
    },
    /// A kind other than `interface` or `concrete`.
    #[error("interface '{interface}' has unknown kind '{kind}'")]
    UnknownKind {
        /// Interface name.
        interface: String,
        /// Offending kind.
        kind: String,
    },
}

/// Manifest-level settings from the `[options]` table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ManifestOptions {
    /// Attach a suggested binding to missing-binding diagnostics.
    pub suggest_bindings: bool,
    /// Treat warnings as errors.
    pub deny_warnings: bool,
}

impl Default for ManifestOptions {
    fn default() -> Self {
        Self {
            suggest_bindings: true,
            deny_warnings: false,
        }
    }
}

impl ManifestOptions {
    /// Validator options derived from these settings.
    pub fn validator(&self) -> ValidatorOptions {
        ValidatorOptions {
            suggest_bindings: self.suggest_bindings,
        }
    }
}

/// A parsed manifest.
#[derive(Clone, Debug, PartialEq)]
pub struct Manifest {
    /// Declared interfaces in file order.
    pub interfaces: Vec<InterfaceDecl>,
    /// Settings from `[options]`.
    pub options: ManifestOptions,
}

impl Manifest {
    /// Reads and parses the manifest at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ManifestError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| ManifestError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        contents.parse()
    }

    /// Total number of declared methods.
    pub fn method_count(&self) -> usize {
        self.interfaces.iter().map(|iface| iface.methods.len()).sum()
    }
}

impl FromStr for Manifest {
    type Err = ManifestError;

    fn from_str(contents: &str) -> Result<Self, Self::Err> {
        let raw: RawManifest = toml::from_str(contents)?;
        let options = ManifestOptions {
            suggest_bindings: raw.options.suggest_bindings.unwrap_or(true),
            deny_warnings: raw.options.deny_warnings.unwrap_or(false),
        };
        let interfaces = raw
            .interfaces
            .into_iter()
            .map(convert_interface)
            .collect::<Result<_, _>>()?;
        Ok(Self {
            interfaces,
            options,
        })
    }
}

fn convert_interface(raw: RawInterface) -> Result<InterfaceDecl, ManifestError> {
    let mut decl = match raw.kind.as_deref().unwrap_or("interface") {
        "interface" => InterfaceDecl::interface(raw.name),
        "concrete" | "struct" => InterfaceDecl::concrete(raw.name),
        other => {
            return Err(ManifestError::UnknownKind {
                interface: raw.name,
                kind: other.to_owned(),
            })
        }
    };
    decl.methods = raw.methods.into_iter().map(convert_method).collect();
    Ok(decl)
}

fn convert_method(raw: RawMethod) -> MethodDecl {
    let mut method = match raw.query {
        Some(query) => MethodDecl::new(raw.name, query),
        None => MethodDecl::unannotated(raw.name),
    };
    if let Some(line) = raw.line {
        method = method.at_line(line);
    }
    if !raw.is_abstract.unwrap_or(true) {
        method = method.with_body();
    }
    for param in raw.params {
        method = method.param(&param.name, &param.ty, param.binding.as_deref());
    }
    match raw.returns {
        Some(returns) => method.returns(ReturnShape::from_name(&returns)),
        None => method,
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawManifest {
    #[serde(default)]
    options: RawOptions,
    #[serde(default, rename = "interface")]
    interfaces: Vec<RawInterface>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawOptions {
    suggest_bindings: Option<bool>,
    deny_warnings: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawInterface {
    name: String,
    kind: Option<String>,
    #[serde(default, rename = "method")]
    methods: Vec<RawMethod>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawMethod {
    name: String,
    query: Option<String>,
    line: Option<u32>,
    #[serde(rename = "abstract")]
    is_abstract: Option<bool>,
    returns: Option<String>,
    #[serde(default, rename = "param")]
    params: Vec<RawParam>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawParam {
    name: String,
    #[serde(rename = "type")]
    ty: String,
    binding: Option<String>,
}
