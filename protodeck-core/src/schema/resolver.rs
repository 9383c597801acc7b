//! # Import Path Resolution
//!
//! Maps an import reference such as `common/types.proto` to the file that should be loaded
//! for it. Candidates are probed in a fixed order and the first existing file wins:
//!
//! 1. The directory of the importing file (the *origin*).
//! 2. Every [`SearchRoot`], in order.
//! 3. Steps 1 and 2 again with `.proto` appended, if the reference has no extension.
//!
//! [`SearchRoots::assemble`] builds the root list with the precedence every load uses:
//! root file directory, user include directories, the root file's parent directory, bundled
//! well-known types, and finally the working directory. A project's own files therefore always
//! shadow the bundled fallbacks.
use std::path::{Path, PathBuf};

const PROTO_EXTENSION: &str = ".proto";

/// Well-known type files bundled with the compiler.
const WELL_KNOWN_TYPES: &[&str] = &[
    "google/protobuf/any.proto",
    "google/protobuf/api.proto",
    "google/protobuf/descriptor.proto",
    "google/protobuf/duration.proto",
    "google/protobuf/empty.proto",
    "google/protobuf/field_mask.proto",
    "google/protobuf/source_context.proto",
    "google/protobuf/struct.proto",
    "google/protobuf/timestamp.proto",
    "google/protobuf/type.proto",
    "google/protobuf/wrappers.proto",
];

/// A place where imports are looked up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchRoot {
    Directory(PathBuf),
    /// The bundled `google/protobuf/*.proto` files.
    WellKnownTypes,
}

/// An ordered list of search roots. Earlier roots take precedence.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchRoots {
    roots: Vec<SearchRoot>,
}

impl SearchRoots {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a directory, skipping duplicates so that a directory keeps its earliest position.
    pub fn push_dir(&mut self, dir: impl Into<PathBuf>) -> &mut Self {
        let root = SearchRoot::Directory(absolute(dir.into()));
        if !self.roots.contains(&root) {
            self.roots.push(root);
        }
        self
    }

    pub fn push_well_known_types(&mut self) -> &mut Self {
        if !self.roots.contains(&SearchRoot::WellKnownTypes) {
            self.roots.push(SearchRoot::WellKnownTypes);
        }
        self
    }

    /// Builds the roots for loading `root_file` (or in-memory content when `None`).
    pub fn assemble(
        root_file: Option<&Path>,
        include_dirs: &[PathBuf],
        well_known_types: bool,
        working_dir: Option<PathBuf>,
    ) -> Self {
        let root_dir = root_file
            .map(|file| absolute(file.to_path_buf()))
            .and_then(|file| file.parent().map(Path::to_path_buf));
        let mut roots = Self::new();

        if let Some(dir) = &root_dir {
            roots.push_dir(dir);
        }
        for dir in include_dirs {
            roots.push_dir(dir);
        }
        // Layouts like `proto/<pkg>/service.proto` import siblings as `<pkg>/types.proto`.
        if let Some(parent) = root_dir.as_deref().and_then(Path::parent) {
            roots.push_dir(parent);
        }
        if well_known_types {
            roots.push_well_known_types();
        }
        if let Some(dir) = working_dir {
            roots.push_dir(dir);
        }

        roots
    }

    pub fn iter(&self) -> impl Iterator<Item = &SearchRoot> {
        self.roots.iter()
    }

    pub fn len(&self) -> usize {
        self.roots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }
}

/// The outcome of a successful resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedImport {
    /// An absolute path of a file on disk.
    File(PathBuf),
    /// A bundled well-known type, by its canonical name.
    Bundled(String),
}

/// Resolves import references against the file system.
#[derive(Debug, Clone, Copy, Default)]
pub struct PathResolver;

impl PathResolver {
    pub fn new() -> Self {
        Self
    }

    /// Resolves `target` as imported from `origin`.
    ///
    /// Returns `None` when no candidate exists; whether that is fatal is up to the caller.
    pub async fn resolve(
        &self,
        origin: Option<&Path>,
        target: &str,
        roots: &SearchRoots,
    ) -> Option<ResolvedImport> {
        if let Some(found) = self.probe(origin, target, roots).await {
            return Some(found);
        }

        if !target.ends_with(PROTO_EXTENSION) {
            let with_extension = format!("{target}{PROTO_EXTENSION}");
            return self.probe(origin, &with_extension, roots).await;
        }

        None
    }

    async fn probe(
        &self,
        origin: Option<&Path>,
        target: &str,
        roots: &SearchRoots,
    ) -> Option<ResolvedImport> {
        if let Some(dir) = origin.and_then(Path::parent) {
            let candidate = absolute(dir.join(target));
            if is_file(&candidate).await {
                return Some(ResolvedImport::File(candidate));
            }
        }

        for root in roots.iter() {
            match root {
                SearchRoot::Directory(dir) => {
                    let candidate = absolute(dir.join(target));
                    if is_file(&candidate).await {
                        return Some(ResolvedImport::File(candidate));
                    }
                }
                SearchRoot::WellKnownTypes => {
                    if WELL_KNOWN_TYPES.contains(&target) {
                        return Some(ResolvedImport::Bundled(target.to_string()));
                    }
                }
            }
        }

        None
    }
}

async fn is_file(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|meta| meta.is_file())
        .unwrap_or(false)
}

fn absolute(path: PathBuf) -> PathBuf {
    std::path::absolute(&path).unwrap_or(path)
}
