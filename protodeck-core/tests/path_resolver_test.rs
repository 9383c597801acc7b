use common::write_proto;
use protodeck_core::schema::{PathResolver, ResolvedImport, SearchRoot, SearchRoots};
use std::path::{Path, PathBuf};

mod common;

const TYPES: &str = "syntax = \"proto3\";\nmessage Types {}\n";

struct Layout {
    _dir: tempfile::TempDir,
    origin: PathBuf,
    include: PathBuf,
    working_dir: PathBuf,
}

/// `project/protos/main.proto`, an include dir and a working dir, all below one temp dir.
fn layout() -> Layout {
    let dir = tempfile::tempdir().unwrap();
    let origin = write_proto(dir.path(), "project/protos/main.proto", "syntax = \"proto3\";\n");
    let include = dir.path().join("include");
    let working_dir = dir.path().join("cwd");
    std::fs::create_dir_all(&include).unwrap();
    std::fs::create_dir_all(&working_dir).unwrap();

    Layout {
        _dir: dir,
        origin,
        include,
        working_dir,
    }
}

fn roots_for(layout: &Layout, well_known_types: bool) -> SearchRoots {
    SearchRoots::assemble(
        Some(&layout.origin),
        std::slice::from_ref(&layout.include),
        well_known_types,
        Some(layout.working_dir.clone()),
    )
}

fn origin_dir(layout: &Layout) -> &Path {
    layout.origin.parent().unwrap()
}

#[tokio::test]
async fn test_origin_directory_shadows_every_search_root() {
    let layout = layout();
    let in_origin = write_proto(origin_dir(&layout), "google/protobuf/empty.proto", TYPES);
    write_proto(&layout.include, "google/protobuf/empty.proto", TYPES);
    write_proto(&layout.working_dir, "google/protobuf/empty.proto", TYPES);

    let resolved = PathResolver::new()
        .resolve(
            Some(&layout.origin),
            "google/protobuf/empty.proto",
            &roots_for(&layout, true),
        )
        .await;

    assert_eq!(resolved, Some(ResolvedImport::File(in_origin)));
}

#[tokio::test]
async fn test_precedence_falls_through_in_order() {
    let layout = layout();
    let roots = roots_for(&layout, true);
    let resolver = PathResolver::new();

    let in_cwd = write_proto(&layout.working_dir, "types.proto", TYPES);
    assert_eq!(
        resolver.resolve(Some(&layout.origin), "types.proto", &roots).await,
        Some(ResolvedImport::File(in_cwd))
    );

    let in_include = write_proto(&layout.include, "types.proto", TYPES);
    assert_eq!(
        resolver.resolve(Some(&layout.origin), "types.proto", &roots).await,
        Some(ResolvedImport::File(in_include))
    );

    let in_origin = write_proto(origin_dir(&layout), "types.proto", TYPES);
    assert_eq!(
        resolver.resolve(Some(&layout.origin), "types.proto", &roots).await,
        Some(ResolvedImport::File(in_origin))
    );
}

#[tokio::test]
async fn test_include_dirs_keep_declaration_order() {
    let dir = tempfile::tempdir().unwrap();
    let first = dir.path().join("first");
    let second = dir.path().join("second");
    write_proto(&first, "shared.proto", TYPES);
    let expected = first.join("shared.proto");
    write_proto(&second, "shared.proto", TYPES);

    let roots = SearchRoots::assemble(None, &[first, second], false, None);
    let resolved = PathResolver::new().resolve(None, "shared.proto", &roots).await;

    assert_eq!(resolved, Some(ResolvedImport::File(expected)));
}

#[tokio::test]
async fn test_missing_extension_is_appended() {
    let layout = layout();
    let expected = write_proto(&layout.include, "models/user.proto", TYPES);

    let resolved = PathResolver::new()
        .resolve(Some(&layout.origin), "models/user", &roots_for(&layout, true))
        .await;

    assert_eq!(resolved, Some(ResolvedImport::File(expected)));
}

#[tokio::test]
async fn test_well_known_types_are_bundled() {
    let layout = layout();
    let resolver = PathResolver::new();

    let resolved = resolver
        .resolve(
            Some(&layout.origin),
            "google/protobuf/timestamp.proto",
            &roots_for(&layout, true),
        )
        .await;
    assert_eq!(
        resolved,
        Some(ResolvedImport::Bundled(
            "google/protobuf/timestamp.proto".to_string()
        ))
    );

    let disabled = resolver
        .resolve(
            Some(&layout.origin),
            "google/protobuf/timestamp.proto",
            &roots_for(&layout, false),
        )
        .await;
    assert_eq!(disabled, None);
}

#[tokio::test]
async fn test_project_file_shadows_bundled_well_known_type() {
    let layout = layout();
    let expected = write_proto(&layout.include, "google/protobuf/timestamp.proto", TYPES);

    let resolved = PathResolver::new()
        .resolve(
            Some(&layout.origin),
            "google/protobuf/timestamp.proto",
            &roots_for(&layout, true),
        )
        .await;

    assert_eq!(resolved, Some(ResolvedImport::File(expected)));
}

#[tokio::test]
async fn test_unknown_import_is_not_found() {
    let layout = layout();

    let resolved = PathResolver::new()
        .resolve(
            Some(&layout.origin),
            "does/not/exist.proto",
            &roots_for(&layout, true),
        )
        .await;

    assert_eq!(resolved, None);
}

#[test]
fn test_search_roots_order_and_deduplication() {
    let layout = layout();
    let project = origin_dir(&layout).parent().unwrap().to_path_buf();

    let roots = SearchRoots::assemble(
        Some(&layout.origin),
        &[layout.include.clone(), origin_dir(&layout).to_path_buf()],
        true,
        Some(layout.working_dir.clone()),
    );

    let roots: Vec<SearchRoot> = roots.iter().cloned().collect();
    assert_eq!(
        roots,
        vec![
            SearchRoot::Directory(origin_dir(&layout).to_path_buf()),
            SearchRoot::Directory(layout.include.clone()),
            SearchRoot::Directory(project),
            SearchRoot::WellKnownTypes,
            SearchRoot::Directory(layout.working_dir.clone()),
        ]
    );
}
