//! Association graph construction and path resolution.

#[path = "../common/fixtures.rs"]
mod fixtures;

use datagrid::schema::{AssociationKind, SchemaError};
use datagrid::prelude::*;
use fixtures::registry;

#[test]
fn resolves_single_and_multi_hop_paths() {
    let graph = registry().graph().unwrap();

    let single = graph.resolve_path("post", "author").unwrap();
    assert_eq!(single.len(), 1);
    assert_eq!(single.tail_entity(), "user");

    let nested = graph.resolve_path("post", "comments.author").unwrap();
    assert_eq!(nested.len(), 2);
    assert_eq!(nested.hops[0].to, "comment");
    assert_eq!(nested.tail_entity(), "user");
}

#[test]
fn every_segment_must_be_a_declared_association() {
    let graph = registry().graph().unwrap();

    assert!(matches!(
        graph.resolve_path("post", "profile"),
        Err(SchemaError::UnknownAssociation { .. })
    ));
    // The first hop resolves; the second does not exist on "comment".
    assert!(matches!(
        graph.resolve_path("post", "comments.profile"),
        Err(SchemaError::UnknownAssociation { .. })
    ));
    assert!(matches!(
        graph.resolve_path("ghost", "author"),
        Err(SchemaError::UnknownEntity(_))
    ));
    assert!(matches!(
        graph.resolve_path("post", ""),
        Err(SchemaError::EmptyPath)
    ));
}

#[test]
fn association_lookup_carries_join_keys() {
    let graph = registry().graph().unwrap();
    let author = graph.association_of("post", "author").unwrap();
    match &author.kind {
        AssociationKind::BelongsTo {
            foreign_key,
            owner_key,
        } => {
            assert_eq!(foreign_key, "author_id");
            assert_eq!(owner_key, "id");
        }
        other => panic!("unexpected kind: {other:?}"),
    }
    assert!(graph.association_of("post", "profile").is_none());
}

#[test]
fn dangling_association_target_fails_the_build() {
    let broken = EntityDescriptor::new("orphan", "orphans").belongs_to("owner", "nowhere");
    let result = ModelRegistry::new("secret").register(broken).graph();
    assert!(matches!(result, Err(SchemaError::UnknownTarget { .. })));
}

#[test]
fn tail_entity_shortcut_matches_full_resolution() {
    let graph = registry().graph().unwrap();
    assert_eq!(
        graph.tail_entity_of("post", "comments.author").unwrap(),
        "user"
    );
}
