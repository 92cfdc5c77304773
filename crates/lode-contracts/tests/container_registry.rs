//! Container registry and size estimation integration tests

mod common;

use common::{account, Harness};
use lode_contracts::{
    amount_value, ContainerDescriptor, Link, Migration, PutRequest, SessionToken, WindowState, VERSION,
};
use lode_core::constants::config_keys;
use lode_core::{ContainerId, GovError, Notification};
use lode_crypto::{Address, KeyPair};

fn descriptor(owner: &KeyPair, nonce: u8) -> ContainerDescriptor {
    ContainerDescriptor {
        version: 1,
        owner: owner.address(),
        nonce: [nonce; 16],
        basic_acl: 0x1fbf_8cff,
        placement_policy: "REP 2".into(),
        attributes: vec![("Name".into(), "photos".into())],
    }
}

fn put(h: &Harness, request: &PutRequest) -> Result<ContainerId, GovError> {
    let container = h.contracts.container;
    h.as_alphabet(|ctx| container.put(ctx, request))
}

#[test]
fn test_put_get_delete() {
    let h = Harness::new();
    let container = h.contracts.container;
    let owner = account(1);
    let desc = descriptor(&owner, 1);
    let request = PutRequest::signed(&desc, &owner).unwrap();

    let receipt = h
        .invoke(&[h.alphabet_address()], |ctx| container.put(ctx, &request))
        .unwrap();
    let id = receipt.value;
    assert_eq!(id, desc.id().unwrap());
    assert!(receipt.events.iter().any(|e| e.notification
        == Notification::PutSuccess {
            container_id: id,
            public_key: owner.public_key()
        }));

    let record = h.read(|ctx| container.get(ctx, &id)).unwrap();
    assert_eq!(record.decode_descriptor().unwrap(), desc);
    assert_eq!(h.read(|ctx| container.owner(ctx, &id)).unwrap(), owner.address());
    assert_eq!(
        h.read(|ctx| container.list(ctx, Some(&owner.address()))).unwrap(),
        vec![id]
    );
    assert_eq!(h.read(|ctx| container.list(ctx, None)).unwrap(), vec![id]);

    let signature = owner.sign(id.as_bytes());
    h.as_alphabet(|ctx| container.delete(ctx, id, &signature, None))
        .unwrap();
    assert!(matches!(
        h.read(|ctx| container.get(ctx, &id)),
        Err(GovError::NotFound(_))
    ));
    assert!(h.read(|ctx| container.list(ctx, Some(&owner.address()))).unwrap().is_empty());

    let err = h
        .as_alphabet(|ctx| container.delete(ctx, id, &signature, None))
        .unwrap_err();
    assert!(matches!(err, GovError::NotFound(_)));

    // the same descriptor may be registered again
    assert_eq!(put(&h, &request).unwrap(), id);
}

#[test]
fn test_duplicate_put_conflicts() {
    let h = Harness::new();
    let owner = account(1);
    let request = PutRequest::signed(&descriptor(&owner, 1), &owner).unwrap();
    put(&h, &request).unwrap();
    assert!(matches!(put(&h, &request), Err(GovError::Conflict(_))));

    let other = PutRequest::signed(&descriptor(&owner, 2), &owner).unwrap();
    assert!(put(&h, &other).is_ok());
}

#[test]
fn test_put_authorization() {
    let h = Harness::new();
    let container = h.contracts.container;
    let owner = account(1);
    let stranger = account(2);
    let request = PutRequest::signed(&descriptor(&owner, 1), &owner).unwrap();

    // relayed without the alphabet
    let err = h
        .as_account(owner.address(), |ctx| container.put(ctx, &request))
        .unwrap_err();
    assert!(matches!(err, GovError::AuthorizationFailure(_)));

    // signed by a key that is not the owner's
    let forged = PutRequest::signed(&descriptor(&owner, 1), &stranger).unwrap();
    assert!(matches!(put(&h, &forged), Err(GovError::AuthorizationFailure(_))));

    // signature over other bytes
    let mut tampered = request.clone();
    tampered.descriptor = descriptor(&owner, 9).encode().unwrap();
    assert!(matches!(put(&h, &tampered), Err(GovError::AuthorizationFailure(_))));

    let mut garbage = request;
    garbage.descriptor = b"not a descriptor".to_vec();
    garbage.signature = owner.sign(&garbage.descriptor).to_vec();
    assert!(matches!(put(&h, &garbage), Err(GovError::InvalidArgument(_))));
}

#[test]
fn test_delete_needs_owner_signature() {
    let h = Harness::new();
    let container = h.contracts.container;
    let owner = account(1);
    let id = put(&h, &PutRequest::signed(&descriptor(&owner, 1), &owner).unwrap()).unwrap();

    let forged = account(2).sign(id.as_bytes());
    let err = h
        .as_alphabet(|ctx| container.delete(ctx, id, &forged, None))
        .unwrap_err();
    assert!(matches!(err, GovError::AuthorizationFailure(_)));
    assert!(h.read(|ctx| container.get(ctx, &id)).is_ok());
}

#[test]
fn test_creation_fee() {
    let h = Harness::new();
    let owner = account(1);
    h.set_config(config_keys::CONTAINER_FEE, &amount_value(10));
    let request = PutRequest::signed(&descriptor(&owner, 1), &owner).unwrap();

    let err = put(&h, &request).unwrap_err();
    assert_eq!(
        err,
        GovError::InsufficientBalance {
            required: 10,
            available: 0
        }
    );

    h.mint(owner.address(), 15);
    put(&h, &request).unwrap();
    assert_eq!(h.balance_of(&owner.address()), 5);
    assert_eq!(h.balance_of(&h.alphabet_address()), 10);
}

#[test]
fn test_fee_overflow_is_rejected() {
    let h = Harness::new();
    let container = h.contracts.container;
    let owner = account(1);
    h.set_config(config_keys::CONTAINER_FEE, &amount_value(u128::MAX));
    h.set_config(config_keys::CONTAINER_ALIAS_FEE, &amount_value(1));
    h.mint(owner.address(), 100);

    let request = PutRequest::signed(&descriptor(&owner, 1), &owner).unwrap();
    let err = h
        .as_alphabet(|ctx| container.put_named(ctx, &request, "photos", "lode"))
        .unwrap_err();
    assert!(matches!(err, GovError::InvalidArgument(_)));
    assert_eq!(h.balance_of(&owner.address()), 100);
}

#[test]
fn test_update_relinks_collaborators() {
    let h = Harness::new();
    let container = h.contracts.container;
    let owner = account(1);
    h.set_config(config_keys::CONTAINER_FEE, &amount_value(10));
    h.mint(owner.address(), 10);

    let detached = Migration::new(VERSION + 1).relink(Link::Balance, Address::new([0xee; 20]));
    h.as_committee(|ctx| container.update(ctx, &detached)).unwrap();
    let request = PutRequest::signed(&descriptor(&owner, 1), &owner).unwrap();
    let err = put(&h, &request).unwrap_err();
    assert_eq!(
        err,
        GovError::InsufficientBalance {
            required: 10,
            available: 0
        }
    );

    let restored = Migration::new(VERSION + 2).relink(Link::Balance, h.contracts.balance.hash());
    h.as_committee(|ctx| container.update(ctx, &restored)).unwrap();
    put(&h, &request).unwrap();
    assert_eq!(h.balance_of(&owner.address()), 0);
}

#[test]
fn test_put_named() {
    let h = Harness::new();
    let container = h.contracts.container;
    let nns = h.contracts.nns;
    let owner = account(1);
    let rival = account(2);
    h.set_config(config_keys::CONTAINER_FEE, &amount_value(10));
    h.set_config(config_keys::CONTAINER_ALIAS_FEE, &amount_value(3));
    h.mint(owner.address(), 13);
    h.mint(rival.address(), 13);

    let request = PutRequest::signed(&descriptor(&owner, 1), &owner).unwrap();
    let id = h
        .as_alphabet(|ctx| container.put_named(ctx, &request, "photos", ""))
        .unwrap();
    assert_eq!(h.balance_of(&owner.address()), 0);
    let record = h.read(|ctx| nns.resolve(ctx, "photos.lode")).unwrap();
    assert_eq!(record.container, id);
    assert_eq!(record.owner, owner.address());

    let taken = PutRequest::signed(&descriptor(&rival, 1), &rival).unwrap();
    let err = h
        .as_alphabet(|ctx| container.put_named(ctx, &taken, "photos", "lode"))
        .unwrap_err();
    assert!(matches!(err, GovError::Conflict(_)));
    assert_eq!(h.balance_of(&rival.address()), 13);

    let err = h
        .as_alphabet(|ctx| container.put_named(ctx, &taken, "Bad_Name", "lode"))
        .unwrap_err();
    assert!(matches!(err, GovError::InvalidArgument(_)));

    // deleting releases the name
    let signature = owner.sign(id.as_bytes());
    h.as_alphabet(|ctx| container.delete(ctx, id, &signature, None))
        .unwrap();
    assert!(matches!(
        h.read(|ctx| nns.resolve(ctx, "photos.lode")),
        Err(GovError::NotFound(_))
    ));
    h.as_alphabet(|ctx| container.put_named(ctx, &taken, "photos", "lode"))
        .unwrap();
}

#[test]
fn test_session_token_delegation() {
    let h = Harness::new();
    let container = h.contracts.container;
    let owner = account(1);
    let delegate = account(2);
    let desc = descriptor(&owner, 1);

    let token = SessionToken::issue(&owner, owner.address(), delegate.public_key(), None, 1).unwrap();
    let request = PutRequest::signed(&desc, &delegate).unwrap().with_token(token);
    let id = put(&h, &request).unwrap();
    let record = h.read(|ctx| container.get(ctx, &id)).unwrap();
    assert_eq!(record.owner, owner.address());
    assert_eq!(record.creator, delegate.public_key());

    // a creation token does not cover deletion
    let wrong_scope =
        SessionToken::issue(&owner, owner.address(), delegate.public_key(), None, 1).unwrap();
    let signature = delegate.sign(id.as_bytes());
    let err = h
        .as_alphabet(|ctx| container.delete(ctx, id, &signature, Some(&wrong_scope)))
        .unwrap_err();
    assert!(matches!(err, GovError::AuthorizationFailure(_)));

    let scoped =
        SessionToken::issue(&owner, owner.address(), delegate.public_key(), Some(id), 1).unwrap();
    h.advance_epoch();
    h.advance_epoch();
    let err = h
        .as_alphabet(|ctx| container.delete(ctx, id, &signature, Some(&scoped)))
        .unwrap_err();
    assert!(matches!(err, GovError::AuthorizationFailure(_)));

    let fresh =
        SessionToken::issue(&owner, owner.address(), delegate.public_key(), Some(id), 5).unwrap();
    h.as_alphabet(|ctx| container.delete(ctx, id, &signature, Some(&fresh)))
        .unwrap();
}

#[test]
fn test_name_stays_with_its_container() {
    let h = Harness::new();
    let container = h.contracts.container;
    let nns = h.contracts.nns;
    let owner = account(1);
    h.set_config(config_keys::CONTAINER_ALIAS_FEE, &amount_value(3));
    h.mint(owner.address(), 9);

    let first = PutRequest::signed(&descriptor(&owner, 1), &owner).unwrap();
    let first_id = h
        .as_alphabet(|ctx| container.put_named(ctx, &first, "photos", "lode"))
        .unwrap();

    let second = PutRequest::signed(&descriptor(&owner, 2), &owner).unwrap();
    let err = h
        .as_alphabet(|ctx| container.put_named(ctx, &second, "photos", "lode"))
        .unwrap_err();
    assert!(matches!(err, GovError::Conflict(_)));
    assert_eq!(h.balance_of(&owner.address()), 6);

    let signature = owner.sign(first_id.as_bytes());
    h.as_alphabet(|ctx| container.delete(ctx, first_id, &signature, None))
        .unwrap();
    let second_id = h
        .as_alphabet(|ctx| container.put_named(ctx, &second, "photos", "lode"))
        .unwrap();
    assert_eq!(
        h.read(|ctx| nns.resolve(ctx, "photos.lode")).unwrap().container,
        second_id
    );
    let record = h.read(|ctx| container.get(ctx, &second_id)).unwrap();
    assert_eq!(record.name.as_deref(), Some("photos.lode"));
}

#[test]
fn test_delegate_loses_delete_rights_with_its_token() {
    let h = Harness::new();
    let container = h.contracts.container;
    let owner = account(1);
    let delegate = account(2);

    let token = SessionToken::issue(&owner, owner.address(), delegate.public_key(), None, 0).unwrap();
    let request = PutRequest::signed(&descriptor(&owner, 1), &delegate)
        .unwrap()
        .with_token(token);
    let id = put(&h, &request).unwrap();
    h.advance_epoch();
    h.advance_epoch();

    let signature = delegate.sign(id.as_bytes());
    let err = h
        .as_alphabet(|ctx| container.delete(ctx, id, &signature, None))
        .unwrap_err();
    assert!(matches!(err, GovError::AuthorizationFailure(_)));
    assert!(h.read(|ctx| container.get(ctx, &id)).is_ok());

    // the owner acts on a delegate-created container through its own token
    let own = SessionToken::issue(&owner, owner.address(), owner.public_key(), Some(id), 5).unwrap();
    let signature = owner.sign(id.as_bytes());
    h.as_alphabet(|ctx| container.delete(ctx, id, &signature, Some(&own)))
        .unwrap();
    assert!(matches!(
        h.read(|ctx| container.get(ctx, &id)),
        Err(GovError::NotFound(_))
    ));
}

#[test]
fn test_session_token_issuers() {
    let h = Harness::new();
    let owner = account(1);
    let delegate = account(2);
    let stranger = account(3);

    let foreign = SessionToken::issue(&stranger, owner.address(), delegate.public_key(), None, 9).unwrap();
    let request = PutRequest::signed(&descriptor(&owner, 1), &delegate)
        .unwrap()
        .with_token(foreign);
    assert!(matches!(put(&h, &request), Err(GovError::AuthorizationFailure(_))));

    let by_alphabet =
        SessionToken::issue(&h.alphabet[0], owner.address(), delegate.public_key(), None, 9).unwrap();
    let request = PutRequest::signed(&descriptor(&owner, 1), &delegate)
        .unwrap()
        .with_token(by_alphabet);
    assert!(put(&h, &request).is_ok());

    let mut forged =
        SessionToken::issue(&owner, owner.address(), delegate.public_key(), None, 9).unwrap();
    forged.expires_epoch = 1_000;
    let request = PutRequest::signed(&descriptor(&owner, 2), &delegate)
        .unwrap()
        .with_token(forged);
    assert!(matches!(put(&h, &request), Err(GovError::AuthorizationFailure(_))));
}

#[test]
fn test_extended_acl() {
    let h = Harness::new();
    let container = h.contracts.container;
    let owner = account(1);
    let id = put(&h, &PutRequest::signed(&descriptor(&owner, 1), &owner).unwrap()).unwrap();
    assert_eq!(h.read(|ctx| container.eacl(ctx, &id)).unwrap(), None);

    let mut eacl = id.as_bytes().to_vec();
    eacl.extend_from_slice(b"deny read from others");
    let signature = owner.sign(&eacl);

    let forged = account(2);
    let forged_sig = forged.sign(&eacl);
    let err = h
        .as_alphabet(|ctx| container.set_eacl(ctx, &eacl, &forged_sig, forged.public_key(), None))
        .unwrap_err();
    assert!(matches!(err, GovError::AuthorizationFailure(_)));

    let err = h
        .as_alphabet(|ctx| container.set_eacl(ctx, b"short", &signature, owner.public_key(), None))
        .unwrap_err();
    assert!(matches!(err, GovError::InvalidArgument(_)));

    h.as_alphabet(|ctx| container.set_eacl(ctx, &eacl, &signature, owner.public_key(), None))
        .unwrap();
    let stored = h.read(|ctx| container.eacl(ctx, &id)).unwrap().unwrap();
    assert_eq!(stored.eacl, eacl);
    assert_eq!(stored.public_key, owner.public_key());

    let missing = ContainerId::new([7u8; 32]);
    assert!(matches!(
        h.read(|ctx| container.eacl(ctx, &missing)),
        Err(GovError::NotFound(_))
    ));
}

// === Size estimations ===

fn storage_nodes(h: &Harness, count: u8) -> Vec<KeyPair> {
    let nodes: Vec<KeyPair> = (0..count).map(|i| KeyPair::from_seed([60 + i; 32])).collect();
    for node in &nodes {
        h.register_node(node).unwrap();
    }
    h.advance_epoch();
    nodes
}

fn report(h: &Harness, node: &KeyPair, epoch: u64, id: ContainerId, size: u64) -> Result<(), GovError> {
    let container = h.contracts.container;
    h.as_account(node.address(), |ctx| {
        container.put_container_size(ctx, epoch, id, size, node.public_key())
    })
}

#[test]
fn test_estimation_window_lifecycle() {
    let h = Harness::new();
    let container = h.contracts.container;
    let nodes = storage_nodes(&h, 1);
    let id = ContainerId::new([1u8; 32]);

    assert_eq!(
        report(&h, &nodes[0], 1, id, 10),
        Err(GovError::WindowClosed { epoch: 1 })
    );
    assert!(matches!(
        h.as_alphabet(|ctx| container.stop_estimation(ctx, 1)),
        Err(GovError::NotFound(_))
    ));

    h.as_alphabet(|ctx| container.start_estimation(ctx, 1)).unwrap();
    assert_eq!(
        h.read(|ctx| container.estimation_window(ctx, 1)).unwrap(),
        Some(WindowState::Open)
    );
    assert!(matches!(
        h.as_alphabet(|ctx| container.start_estimation(ctx, 1)),
        Err(GovError::Conflict(_))
    ));
    report(&h, &nodes[0], 1, id, 10).unwrap();

    h.as_alphabet(|ctx| container.stop_estimation(ctx, 1)).unwrap();
    assert_eq!(
        report(&h, &nodes[0], 1, ContainerId::new([2u8; 32]), 10),
        Err(GovError::WindowClosed { epoch: 1 })
    );
    assert!(matches!(
        h.as_alphabet(|ctx| container.start_estimation(ctx, 1)),
        Err(GovError::Conflict(_))
    ));

    let err = h.anonymous(|ctx| container.start_estimation(ctx, 2)).unwrap_err();
    assert!(matches!(err, GovError::AuthorizationFailure(_)));
}

#[test]
fn test_reports_are_independent_and_aggregated() {
    let h = Harness::new();
    let container = h.contracts.container;
    let nodes = storage_nodes(&h, 4);
    let id = ContainerId::new([1u8; 32]);
    h.as_alphabet(|ctx| container.start_estimation(ctx, 1)).unwrap();

    report(&h, &nodes[0], 1, id, 300).unwrap();
    report(&h, &nodes[1], 1, id, 100).unwrap();
    report(&h, &nodes[2], 1, id, 200).unwrap();
    let estimation = h.read(|ctx| container.get_container_size(ctx, 1, &id)).unwrap();
    assert_eq!(estimation.reports.len(), 3);
    assert_eq!(estimation.size, 200);

    report(&h, &nodes[3], 1, id, 400).unwrap();
    let estimation = h.read(|ctx| container.get_container_size(ctx, 1, &id)).unwrap();
    assert_eq!(estimation.reports.len(), 4);
    assert_eq!(estimation.size, 200);

    // a second report by the same node is refused, the first one stays
    assert!(matches!(
        report(&h, &nodes[0], 1, id, 1),
        Err(GovError::Conflict(_))
    ));
    let estimation = h.read(|ctx| container.get_container_size(ctx, 1, &id)).unwrap();
    assert!(estimation
        .reports
        .iter()
        .any(|r| r.reporter == nodes[0].public_key() && r.size == 300));

    let other = ContainerId::new([2u8; 32]);
    report(&h, &nodes[0], 1, other, 50).unwrap();
    let all = h.read(|ctx| container.list_container_sizes(ctx, 1)).unwrap();
    assert_eq!(all.len(), 2);
    assert_eq!(all[0].container_id, id);
    assert_eq!(all[1].size, 50);

    assert!(matches!(
        h.read(|ctx| container.get_container_size(ctx, 2, &id)),
        Err(GovError::NotFound(_))
    ));
}

#[test]
fn test_reporter_must_be_in_netmap_and_sign() {
    let h = Harness::new();
    let container = h.contracts.container;
    let nodes = storage_nodes(&h, 1);
    let outsider = KeyPair::from_seed([99u8; 32]);
    let id = ContainerId::new([1u8; 32]);
    h.as_alphabet(|ctx| container.start_estimation(ctx, 1)).unwrap();

    assert!(matches!(
        report(&h, &outsider, 1, id, 10),
        Err(GovError::AuthorizationFailure(_))
    ));

    let reporter = nodes[0].public_key();
    let err = h
        .anonymous(|ctx| container.put_container_size(ctx, 1, id, 10, reporter))
        .unwrap_err();
    assert!(matches!(err, GovError::AuthorizationFailure(_)));
}
