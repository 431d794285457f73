//! Model token minting and resolution against the allow-list.

#[path = "../common/fixtures.rs"]
mod fixtures;

use datagrid::schema::TokenError;
use datagrid::prelude::*;
use fixtures::registry;

#[test]
fn token_round_trips_to_its_descriptor() {
    let registry = registry();
    let token = registry.token_for("post").unwrap();
    let entity = registry.resolve(&token).unwrap();
    assert_eq!(entity.name, "post");
    assert_eq!(entity.table, "posts");
}

#[test]
fn tokens_are_opaque_not_entity_names() {
    let registry = registry();
    let token = registry.token_for("post").unwrap();
    assert_ne!(token, "post");
    assert!(registry.resolve("post").is_err());
}

#[test]
fn unregistered_entities_get_no_token() {
    let registry = registry();
    assert!(matches!(
        registry.token_for("secret_table"),
        Err(TokenError::UnknownModel(_))
    ));
}

#[test]
fn tampered_tokens_are_rejected() {
    let registry = registry();
    let mut token = registry.token_for("post").unwrap();
    let swapped = if token.ends_with('A') { 'B' } else { 'A' };
    token.pop();
    token.push(swapped);
    assert!(matches!(
        registry.resolve(&token),
        Err(TokenError::BadSignature)
    ));
}

#[test]
fn malformed_tokens_are_rejected() {
    let registry = registry();
    assert!(matches!(
        registry.resolve("no-dot-here"),
        Err(TokenError::Malformed)
    ));
    assert!(matches!(
        registry.resolve("!!!.???"),
        Err(TokenError::Malformed)
    ));
}

#[test]
fn tokens_from_another_secret_do_not_verify() {
    let ours = registry();
    let theirs = ModelRegistry::new("other-secret")
        .register(EntityDescriptor::new("post", "posts"));
    let foreign_token = theirs.token_for("post").unwrap();
    assert!(matches!(
        ours.resolve(&foreign_token),
        Err(TokenError::BadSignature)
    ));
}
