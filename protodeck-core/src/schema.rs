//! # Schema
//!
//! A [`SchemaRoot`] is the immutable result of loading a `.proto` file together with all of
//! its imports. It wraps the compiled `DescriptorPool` and adds a typed namespace tree, so
//! callers can walk packages, messages, enums and services without any dotted-path string
//! lookups.
//!
//! Schemas are produced by the [`SchemaLoader`], which resolves imports through the
//! [`PathResolver`] before compiling anything.
pub mod loader;
pub mod resolver;

pub use loader::{SchemaError, SchemaLoader};
pub use resolver::{PathResolver, ResolvedImport, SearchRoot, SearchRoots};

use crate::error::{Categorized, ErrorKind};
use prost_reflect::{DescriptorPool, EnumDescriptor, MessageDescriptor, ServiceDescriptor};
use std::path::{Path, PathBuf};

/// Where a file of a loaded schema came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileLocation {
    /// Read from disk.
    Disk(PathBuf),
    /// Schema content handed over in memory, without a backing file.
    Memory,
    /// One of the bundled `google/protobuf` well-known types.
    Bundled,
    /// Resolved to a file that is already part of the load under another name. The alias
    /// re-exports the canonical file through a public import.
    Alias { canonical: String },
}

/// A file that took part in a load, keyed by the name it is imported as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedFile {
    pub name: String,
    pub location: FileLocation,
}

/// An import name that resolved to a different file from a later importer than from the first
/// one. The first file is the one that was loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportConflict {
    pub import: String,
    /// The file whose import was answered with the first copy.
    pub origin: String,
    pub kept: PathBuf,
    pub ignored: PathBuf,
}

/// A node of the namespace tree.
#[derive(Debug, Clone)]
pub enum Node {
    Namespace(Namespace),
    Message(MessageDescriptor),
    Enum(EnumDescriptor),
    Service(ServiceDescriptor),
}

/// A package segment (e.g. `helloworld` in `helloworld.v1`) and the definitions below it.
#[derive(Debug, Clone, Default)]
pub struct Namespace {
    name: String,
    nodes: Vec<Node>,
}

impl Namespace {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            nodes: vec![],
        }
    }

    /// The segment name. Empty for the root namespace.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Child nodes in declaration order.
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    fn child_mut(&mut self, name: &str) -> &mut Namespace {
        let index = match self
            .nodes
            .iter()
            .position(|node| matches!(node, Node::Namespace(ns) if ns.name == name))
        {
            Some(index) => index,
            None => {
                self.nodes.push(Node::Namespace(Namespace::new(name)));
                self.nodes.len() - 1
            }
        };

        match &mut self.nodes[index] {
            Node::Namespace(ns) => ns,
            _ => unreachable!("position() only matches namespace nodes"),
        }
    }
}

/// A generic wrapper for different types of Protobuf descriptors.
///
/// This enum allows a single return type when resolving symbols,
/// regardless of whether the symbol points to a Service, a Message, or an Enum.
#[derive(Debug, Clone)]
pub enum Descriptor {
    MessageDescriptor(MessageDescriptor),
    ServiceDescriptor(ServiceDescriptor),
    EnumDescriptor(EnumDescriptor),
}

impl Descriptor {
    /// Returns the name (e.g.,`MyMessage`) of the inner descriptor
    pub fn name(&self) -> &str {
        match self {
            Descriptor::MessageDescriptor(v) => v.name(),
            Descriptor::ServiceDescriptor(v) => v.name(),
            Descriptor::EnumDescriptor(v) => v.name(),
        }
    }

    /// Returns the full_name (e.g.,`my.package.v1.MyMessage`) of the inner descriptor
    pub fn full_name(&self) -> &str {
        match self {
            Descriptor::MessageDescriptor(v) => v.full_name(),
            Descriptor::ServiceDescriptor(v) => v.full_name(),
            Descriptor::EnumDescriptor(v) => v.full_name(),
        }
    }
}

/// The service requested by name is not part of the schema.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ServiceNotFoundError {
    #[error("Service '{0}' not found")]
    NotFound(String),
    #[error("Service name '{name}' is ambiguous, candidates: {}", candidates.join(", "))]
    Ambiguous {
        name: String,
        candidates: Vec<String>,
    },
}

impl Categorized for ServiceNotFoundError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::ServiceNotFoundError
    }
}

/// A fully loaded and compiled schema.
#[derive(Debug, Clone)]
pub struct SchemaRoot {
    pool: DescriptorPool,
    root_file: String,
    origin: Option<PathBuf>,
    files: Vec<LoadedFile>,
    conflicts: Vec<ImportConflict>,
    tree: Namespace,
}

impl SchemaRoot {
    pub(crate) fn new(
        pool: DescriptorPool,
        root_file: String,
        origin: Option<PathBuf>,
        files: Vec<LoadedFile>,
        conflicts: Vec<ImportConflict>,
    ) -> Self {
        let tree = build_tree(&pool, &root_file);
        Self {
            pool,
            root_file,
            origin,
            files,
            conflicts,
            tree,
        }
    }

    pub fn descriptor_pool(&self) -> &DescriptorPool {
        &self.pool
    }

    /// Import name of the file the load started from.
    pub fn root_file(&self) -> &str {
        &self.root_file
    }

    /// Path of the root file, `None` for schemas loaded from memory.
    pub fn origin(&self) -> Option<&Path> {
        self.origin.as_deref()
    }

    /// Every file of the load in discovery order, root first.
    pub fn files(&self) -> &[LoadedFile] {
        &self.files
    }

    /// Imports that were shadowed by an earlier file of the same name.
    pub fn import_conflicts(&self) -> &[ImportConflict] {
        &self.conflicts
    }

    /// Root of the namespace tree. Definitions of the root file come first.
    pub fn namespace(&self) -> &Namespace {
        &self.tree
    }

    /// Lists all services defined in the schema.
    ///
    /// # Returns
    ///
    /// A list of fully qualified service names (e.g. `helloworld.Greeter`).
    pub fn list_services(&self) -> Vec<String> {
        self.pool
            .services()
            .map(|s| s.full_name().to_string())
            .collect()
    }

    /// Looks up a service by its fully qualified name, falling back to its short name when
    /// exactly one service carries it.
    pub fn find_service(&self, name: &str) -> Result<ServiceDescriptor, ServiceNotFoundError> {
        let name = name.trim_start_matches('.');

        if let Some(service) = self.pool.get_service_by_name(name) {
            return Ok(service);
        }

        let mut matches: Vec<ServiceDescriptor> =
            self.pool.services().filter(|s| s.name() == name).collect();

        match matches.len() {
            0 => Err(ServiceNotFoundError::NotFound(name.to_string())),
            1 => Ok(matches.remove(0)),
            _ => Err(ServiceNotFoundError::Ambiguous {
                name: name.to_string(),
                candidates: matches.iter().map(|s| s.full_name().to_string()).collect(),
            }),
        }
    }

    /// Looks up a specific symbol in the schema.
    ///
    /// # Arguments
    ///
    /// * `symbol` - The fully qualified name (Service, Message, or Enum).
    ///
    /// # Returns
    ///
    /// * `Some(Descriptor)` - The resolved descriptor if found.
    /// * `None` - If the symbol does not exist in the schema.
    pub fn get_descriptor_by_symbol(&self, symbol: &str) -> Option<Descriptor> {
        let symbol = symbol.trim_start_matches('.');

        if let Some(descriptor) = self.pool.get_service_by_name(symbol) {
            return Some(Descriptor::ServiceDescriptor(descriptor));
        }
        if let Some(descriptor) = self.pool.get_message_by_name(symbol) {
            return Some(Descriptor::MessageDescriptor(descriptor));
        }
        if let Some(descriptor) = self.pool.get_enum_by_name(symbol) {
            return Some(Descriptor::EnumDescriptor(descriptor));
        }
        None
    }
}

fn build_tree(pool: &DescriptorPool, root_file: &str) -> Namespace {
    let mut root = Namespace::default();

    let files = pool
        .get_file_by_name(root_file)
        .into_iter()
        .chain(pool.files().filter(|f| f.name() != root_file));

    for file in files {
        let package = file.package_name().to_string();
        let namespace = package
            .split('.')
            .filter(|segment| !segment.is_empty())
            .fold(&mut root, |ns, segment| ns.child_mut(segment));

        namespace.nodes.extend(file.messages().map(Node::Message));
        namespace.nodes.extend(file.enums().map(Node::Enum));
        namespace.nodes.extend(file.services().map(Node::Service));
    }

    root
}
