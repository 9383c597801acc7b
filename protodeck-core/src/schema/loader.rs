//! # Schema Loader
//!
//! Loads a root `.proto` file (or in-memory content) together with every file it imports,
//! and compiles the lot into a [`SchemaRoot`].
//!
//! Loading happens in two passes:
//!
//! 1. **Resolution (async)**: starting from the root, each file is parsed just enough to list
//!    its imports. Every import is resolved with the [`PathResolver`], using the importing file
//!    as origin, and read from disk. Files are keyed by import name, so a file reached twice is
//!    read once.
//! 2. **Compilation (sync)**: the collected sources are handed to `protox`, which links all
//!    type references. Nothing touches the file system in this pass.
//!
//! When two different import names lead to the same file on disk, the second name becomes an
//! alias that publicly imports the first one. Its definitions are therefore registered once.
use super::resolver::{PathResolver, ResolvedImport, SearchRoots};
use super::{FileLocation, ImportConflict, LoadedFile, SchemaRoot};
use crate::config::Config;
use crate::error::{Categorized, ErrorKind};
use prost_reflect::DescriptorPool;
use protox::file::{ChainFileResolver, File, FileResolver, GoogleFileResolver};
use std::collections::{HashMap, HashSet, VecDeque};
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Import name given to schema content that has no backing file.
pub const IN_MEMORY_FILE_NAME: &str = "inline.proto";

#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("Schema file '{}' not found", .0.display())]
    RootNotFound(PathBuf),
    #[error("Failed to read '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Failed to parse '{file}': {message}")]
    Parse { file: String, message: String },
    #[error("Import '{import}' from '{origin}' was not found in any search root")]
    ImportNotFound { import: String, origin: String },
    #[error("Failed to compile schema: {source}{}", conflict_hint(conflicts))]
    Compile {
        #[source]
        source: protox::Error,
        /// Shadowed imports found while collecting, often the cause of the failure.
        conflicts: Vec<ImportConflict>,
    },
}

fn conflict_hint(conflicts: &[ImportConflict]) -> String {
    conflicts
        .iter()
        .map(|c| {
            format!(
                " (import '{}' from '{}' used '{}', not '{}')",
                c.import,
                c.origin,
                c.kept.display(),
                c.ignored.display()
            )
        })
        .collect()
}

impl Categorized for SchemaError {
    fn kind(&self) -> ErrorKind {
        match self {
            SchemaError::RootNotFound(_) | SchemaError::ImportNotFound { .. } => {
                ErrorKind::ImportResolutionError
            }
            SchemaError::Io { .. } => ErrorKind::IoError,
            SchemaError::Parse { .. } => ErrorKind::ParseError,
            SchemaError::Compile { source, .. } if source.is_file_not_found() => {
                ErrorKind::ImportResolutionError
            }
            SchemaError::Compile { .. } => ErrorKind::ParseError,
        }
    }
}

/// Loads schemas. Holds only settings, so one loader can serve every session.
#[derive(Debug, Clone)]
pub struct SchemaLoader {
    resolver: PathResolver,
    include_dirs: Vec<PathBuf>,
    well_known_types: bool,
    working_dir_fallback: bool,
}

impl Default for SchemaLoader {
    fn default() -> Self {
        Self::new(&Config::default())
    }
}

impl SchemaLoader {
    pub fn new(config: &Config) -> Self {
        Self {
            resolver: PathResolver::new(),
            include_dirs: config.include_dirs.clone(),
            well_known_types: config.well_known_types,
            working_dir_fallback: config.working_dir_fallback,
        }
    }

    /// Loads `path` and everything it imports.
    ///
    /// # Arguments
    ///
    /// * `path` - The root `.proto` file.
    /// * `include_dirs` - Extra search roots, in priority order. They rank below the root
    ///   file's directory and above the configured include directories.
    pub async fn load(
        &self,
        path: impl AsRef<Path>,
        include_dirs: &[PathBuf],
    ) -> Result<SchemaRoot, SchemaError> {
        let path = path.as_ref();
        let canonical = match tokio::fs::canonicalize(path).await {
            Ok(canonical) => canonical,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Err(SchemaError::RootNotFound(path.to_path_buf()));
            }
            Err(source) => {
                return Err(SchemaError::Io {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };

        let source = read_source(&canonical).await?;
        let name = canonical
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| IN_MEMORY_FILE_NAME.to_string());

        let roots = self.search_roots(Some(&canonical), include_dirs);
        debug!(root = %canonical.display(), roots = roots.len(), "Loading schema");

        self.compile(
            SourceFile {
                name,
                path: Some(canonical),
                source,
            },
            roots,
        )
        .await
    }

    /// Loads schema content that has no backing file.
    ///
    /// Imports can only be resolved through the search roots since there is no origin directory.
    pub async fn load_from_content(
        &self,
        content: impl Into<String>,
        include_dirs: &[PathBuf],
    ) -> Result<SchemaRoot, SchemaError> {
        let roots = self.search_roots(None, include_dirs);
        debug!(roots = roots.len(), "Loading in-memory schema");

        self.compile(
            SourceFile {
                name: IN_MEMORY_FILE_NAME.to_string(),
                path: None,
                source: content.into(),
            },
            roots,
        )
        .await
    }

    fn search_roots(&self, root_file: Option<&Path>, include_dirs: &[PathBuf]) -> SearchRoots {
        let include_dirs: Vec<PathBuf> = include_dirs
            .iter()
            .chain(self.include_dirs.iter())
            .cloned()
            .collect();

        let working_dir = if self.working_dir_fallback {
            std::env::current_dir().ok()
        } else {
            None
        };

        SearchRoots::assemble(
            root_file,
            &include_dirs,
            self.well_known_types,
            working_dir,
        )
    }

    async fn compile(
        &self,
        root: SourceFile,
        roots: SearchRoots,
    ) -> Result<SchemaRoot, SchemaError> {
        let root_name = root.name.clone();
        let origin = root.path.clone();

        let Collected {
            sources,
            loaded,
            conflicts,
        } = self.collect(root, &roots).await?;
        let pool = compile_sources(&root_name, sources, self.well_known_types)
            .map_err(|source| SchemaError::Compile {
                source,
                conflicts: conflicts.clone(),
            })?;

        info!(
            root = %root_name,
            files = loaded.len(),
            services = pool.services().count(),
            "Schema loaded"
        );

        Ok(SchemaRoot::new(pool, root_name, origin, loaded, conflicts))
    }

    /// Walks the import graph breadth first, reading every file it reaches exactly once.
    async fn collect(&self, root: SourceFile, roots: &SearchRoots) -> Result<Collected, SchemaError> {
        let mut sources = HashMap::new();
        let mut seen_names = HashSet::from([root.name.clone()]);
        let mut seen_paths: HashMap<PathBuf, String> = HashMap::new();
        let mut resolved_names: HashMap<String, PathBuf> = HashMap::new();
        let mut conflicts = vec![];
        let mut loaded = vec![LoadedFile {
            name: root.name.clone(),
            location: match &root.path {
                Some(path) => FileLocation::Disk(path.clone()),
                None => FileLocation::Memory,
            },
        }];

        if let Some(path) = &root.path {
            seen_paths.insert(path.clone(), root.name.clone());
            resolved_names.insert(root.name.clone(), path.clone());
        }

        let mut pending = VecDeque::from([root]);

        while let Some(file) = pending.pop_front() {
            for import in file.imports()? {
                if !seen_names.insert(import.clone()) {
                    if let Some(first) = resolved_names.get(&import)
                        && let Some(conflict) =
                            self.check_conflict(&file, &import, first, roots).await
                    {
                        conflicts.push(conflict);
                    }
                    continue;
                }

                match self
                    .resolver
                    .resolve(file.path.as_deref(), &import, roots)
                    .await
                {
                    None => {
                        return Err(SchemaError::ImportNotFound {
                            import,
                            origin: file.display_name(),
                        });
                    }
                    Some(ResolvedImport::Bundled(canonical)) if canonical == import => {
                        debug!(import = %import, "Using bundled well-known type");
                        loaded.push(LoadedFile {
                            name: import,
                            location: FileLocation::Bundled,
                        });
                    }
                    Some(ResolvedImport::Bundled(canonical)) => {
                        debug!(import = %import, canonical = %canonical, "Aliasing bundled well-known type");
                        sources.insert(import.clone(), alias_source(&canonical));
                        loaded.push(LoadedFile {
                            name: import,
                            location: FileLocation::Alias { canonical },
                        });
                    }
                    Some(ResolvedImport::File(path)) => {
                        let path = tokio::fs::canonicalize(&path).await.unwrap_or(path);

                        if let Some(canonical) = seen_paths.get(&path) {
                            debug!(import = %import, canonical = %canonical, "Import resolves to an already loaded file");
                            sources.insert(import.clone(), alias_source(canonical));
                            loaded.push(LoadedFile {
                                name: import,
                                location: FileLocation::Alias {
                                    canonical: canonical.clone(),
                                },
                            });
                            continue;
                        }

                        debug!(import = %import, path = %path.display(), "Resolved import");
                        let source = read_source(&path).await?;
                        seen_paths.insert(path.clone(), import.clone());
                        resolved_names.insert(import.clone(), path.clone());
                        loaded.push(LoadedFile {
                            name: import.clone(),
                            location: FileLocation::Disk(path.clone()),
                        });
                        pending.push_back(SourceFile {
                            name: import,
                            path: Some(path),
                            source,
                        });
                    }
                }
            }

            sources.insert(file.name, file.source);
        }

        Ok(Collected {
            sources,
            loaded,
            conflicts,
        })
    }

    /// Checks whether `import`, already collected as `first`, would resolve to a different
    /// file from `file`. The first copy is kept either way.
    async fn check_conflict(
        &self,
        file: &SourceFile,
        import: &str,
        first: &Path,
        roots: &SearchRoots,
    ) -> Option<ImportConflict> {
        let Some(ResolvedImport::File(path)) = self
            .resolver
            .resolve(file.path.as_deref(), import, roots)
            .await
        else {
            return None;
        };

        let path = tokio::fs::canonicalize(&path).await.unwrap_or(path);
        if path.as_path() == first {
            return None;
        }

        warn!(
            import = %import,
            origin = %file.display_name(),
            kept = %first.display(),
            ignored = %path.display(),
            "Import name resolves to different files, keeping the first one"
        );
        Some(ImportConflict {
            import: import.to_string(),
            origin: file.display_name(),
            kept: first.to_path_buf(),
            ignored: path,
        })
    }
}

struct SourceFile {
    name: String,
    path: Option<PathBuf>,
    source: String,
}

impl SourceFile {
    fn imports(&self) -> Result<Vec<String>, SchemaError> {
        let proto =
            protox_parse::parse(&self.name, &self.source).map_err(|err| SchemaError::Parse {
                file: self.display_name(),
                message: err.to_string(),
            })?;
        Ok(proto.dependency)
    }

    fn display_name(&self) -> String {
        match &self.path {
            Some(path) => path.display().to_string(),
            None => self.name.clone(),
        }
    }
}

struct Collected {
    sources: HashMap<String, String>,
    loaded: Vec<LoadedFile>,
    conflicts: Vec<ImportConflict>,
}

/// Serves the sources gathered during resolution to the compiler.
#[derive(Debug)]
struct CollectedFiles {
    sources: HashMap<String, String>,
}

impl FileResolver for CollectedFiles {
    fn open_file(&self, name: &str) -> Result<File, protox::Error> {
        match self.sources.get(name) {
            Some(source) => File::from_source(name, source),
            None => Err(protox::Error::file_not_found(name)),
        }
    }
}

fn compile_sources(
    root_name: &str,
    sources: HashMap<String, String>,
    well_known_types: bool,
) -> Result<DescriptorPool, protox::Error> {
    let mut resolver = ChainFileResolver::new();
    resolver.add(CollectedFiles { sources });
    if well_known_types {
        resolver.add(GoogleFileResolver::new());
    }

    let mut compiler = protox::Compiler::with_file_resolver(resolver);
    compiler.include_imports(true);
    compiler.open_file(root_name)?;

    Ok(compiler.descriptor_pool())
}

fn alias_source(canonical: &str) -> String {
    format!("syntax = \"proto3\";\nimport public \"{canonical}\";\n")
}

async fn read_source(path: &Path) -> Result<String, SchemaError> {
    tokio::fs::read_to_string(path)
        .await
        .map_err(|source| SchemaError::Io {
            path: path.to_path_buf(),
            source,
        })
}
