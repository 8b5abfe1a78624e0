//! Integration test: authorization paths and all-or-nothing failures
//!
//! Every hold creation mode, the protected signed path with replay
//! protection, and the token gates. Rejected operations must leave
//! balances, allowances, and nonces exactly as they were.

use std::sync::Arc;

use chrono::Duration;
use ed25519_dalek::{Signer, SigningKey};
use partledger_ledger::{
    AllowanceBook, AuthorizationMode, Clock, InMemoryCollaborators, Ledger, ManualClock,
    NonceRegistry,
};
use partledger_types::*;
use rust_decimal::Decimal;

fn dec(n: i64) -> Decimal {
    Decimal::new(n, 0)
}

struct World {
    ledger: Ledger<InMemoryCollaborators>,
    clock: ManualClock,
    issuer: Address,
}

fn world() -> World {
    let issuer = Address::random();
    let mut collab = InMemoryCollaborators::new();
    collab.grant_role(issuer, Role::Issuer);
    let clock = ManualClock::default();
    let ledger = Ledger::new(LedgerConfig::default(), collab, Arc::new(clock.clone())).unwrap();
    World {
        ledger,
        clock,
        issuer,
    }
}

fn request(w: &World, partition: Partition, amount: i64, escrow: Address) -> HoldRequest {
    HoldRequest {
        partition,
        amount: dec(amount),
        escrow,
        destination: None,
        expiration: w.clock.now() + Duration::minutes(10),
        data: b"settlement-ref".to_vec(),
    }
}

#[test]
fn every_mode_tags_the_hold() {
    let mut w = world();
    let issuer = w.issuer;
    let p = Partition::DEFAULT;
    let holder = Address::random();
    let (spender, operator, controller, escrow) = (
        Address::random(),
        Address::random(),
        Address::random(),
        Address::random(),
    );
    w.ledger.issue(&issuer, p, &holder, dec(100)).unwrap();
    {
        let c = w.ledger.collaborators_mut();
        c.approve(holder, spender, dec(10));
        c.authorize_operator(operator, holder);
        c.grant_role(controller, Role::Controller);
    }

    let req = request(&w, p, 10, escrow);
    let ids = [
        w.ledger.create_hold(&holder, &req).unwrap(),
        w.ledger.create_hold_from(&spender, &holder, &req, &[]).unwrap(),
        w.ledger
            .operator_create_hold(&operator, &holder, &req, b"op")
            .unwrap(),
        w.ledger
            .create_hold_as(&controller, &holder, &req, AuthorizationMode::Controller, &[])
            .unwrap(),
    ];
    let expected = [
        HoldThirdParty::holder(),
        HoldThirdParty::new(ThirdPartyType::ApprovedFrom, spender),
        HoldThirdParty::new(ThirdPartyType::Operator, operator),
        HoldThirdParty::new(ThirdPartyType::Controller, controller),
    ];
    for (id, tag) in ids.iter().zip(expected) {
        let ident = HoldIdentifier::new(p, holder, *id);
        assert_eq!(w.ledger.hold_third_party(ident).unwrap(), tag);
    }
    assert_eq!(ids.map(|h| h.0), [1, 2, 3, 4]);
    assert_eq!(w.ledger.held_amount_for(&holder).unwrap(), dec(40));
    assert_eq!(w.ledger.hold_count_for_by_partition(p, &holder), 4);
    let op_hold = w
        .ledger
        .hold_for_by_partition(HoldIdentifier::new(p, holder, ids[2]))
        .unwrap();
    assert_eq!(op_hold.operator_data, b"op".to_vec());
}

#[test]
fn protected_hold_end_to_end_with_replay() {
    let mut w = world();
    let issuer = w.issuer;
    let p = Partition::from_label("restricted");
    let key = SigningKey::from_bytes(&[11u8; 32]);
    let holder = Address::from_pubkey(key.verifying_key().to_bytes());
    let (submitter, escrow) = (Address::random(), Address::random());

    w.ledger.issue(&issuer, p, &holder, dec(500)).unwrap();
    {
        let c = w.ledger.collaborators_mut();
        c.set_partitions_protected(true);
        c.grant_role(submitter, Role::ProtectedPartitionParticipant(p));
    }

    let auth = ProtectedHoldAuthorization {
        holder,
        hold: request(&w, p, 200, escrow),
        deadline: w.clock.now() + Duration::minutes(1),
        nonce: w.ledger.collaborators().next_nonce(&holder),
    };
    let sig = key.sign(&auth.digest()).to_bytes();

    let id = w.ledger.protected_create_hold(&submitter, &auth, &sig).unwrap();
    assert_eq!(w.ledger.held_amount_for_by_partition(p, &holder).unwrap(), dec(200));

    let replay = w.ledger.protected_create_hold(&submitter, &auth, &sig);
    assert!(matches!(replay, Err(PartledgerError::WrongNonce { .. })));
    assert_eq!(w.ledger.held_amount_for_by_partition(p, &holder).unwrap(), dec(200));

    // A fresh authorization with the next nonce goes through.
    let next = ProtectedHoldAuthorization {
        nonce: 1,
        ..auth.clone()
    };
    let sig2 = key.sign(&next.digest()).to_bytes();
    w.ledger.protected_create_hold(&submitter, &next, &sig2).unwrap();
    assert_eq!(w.ledger.hold_count_for_by_partition(p, &holder), 2);

    w.ledger
        .execute_hold(&escrow, HoldIdentifier::new(p, holder, id), &escrow, dec(200))
        .unwrap();
    assert_eq!(w.ledger.partition_balance(&escrow, p).unwrap().free, dec(200));
}

#[test]
fn tampered_authorization_fails_without_consuming_nonce() {
    let mut w = world();
    let issuer = w.issuer;
    let p = Partition::DEFAULT;
    let key = SigningKey::from_bytes(&[3u8; 32]);
    let holder = Address::from_pubkey(key.verifying_key().to_bytes());
    let submitter = Address::random();
    w.ledger.issue(&issuer, p, &holder, dec(100)).unwrap();
    {
        let c = w.ledger.collaborators_mut();
        c.set_partitions_protected(true);
        c.grant_role(submitter, Role::ProtectedPartitionParticipant(p));
    }

    let signed = ProtectedHoldAuthorization {
        holder,
        hold: request(&w, p, 10, Address::random()),
        deadline: w.clock.now() + Duration::minutes(1),
        nonce: 0,
    };
    let sig = key.sign(&signed.digest()).to_bytes();
    let mut tampered = signed.clone();
    tampered.hold.amount = dec(90);

    assert_eq!(
        w.ledger
            .protected_create_hold(&submitter, &tampered, &sig)
            .unwrap_err(),
        PartledgerError::WrongSignature(holder)
    );
    assert_eq!(w.ledger.collaborators().next_nonce(&holder), 0);
    assert_eq!(w.ledger.partition_balance(&holder, p).unwrap().free, dec(100));
}

#[test]
fn failed_hold_does_not_consume_allowance() {
    let mut w = world();
    let issuer = w.issuer;
    let p = Partition::DEFAULT;
    let (holder, spender) = (Address::random(), Address::random());
    w.ledger.issue(&issuer, p, &holder, dec(50)).unwrap();
    w.ledger.collaborators_mut().approve(holder, spender, dec(100));

    // Allowance suffices but the balance does not.
    let err = w
        .ledger
        .create_hold_from(&spender, &holder, &request(&w, p, 80, Address::random()), &[])
        .unwrap_err();
    assert!(matches!(err, PartledgerError::InsufficientBalance { .. }));
    assert_eq!(w.ledger.collaborators().allowance(&holder, &spender), dec(100));
    assert_eq!(w.ledger.hold_count_for_by_partition(p, &holder), 0);
}

#[test]
fn recovered_holder_cannot_be_encumbered() {
    let mut w = world();
    let issuer = w.issuer;
    let p = Partition::DEFAULT;
    let holder = Address::random();
    w.ledger.issue(&issuer, p, &holder, dec(50)).unwrap();
    w.ledger.collaborators_mut().mark_recovered(holder);

    let req = request(&w, p, 5, Address::random());
    assert_eq!(
        w.ledger.create_hold(&holder, &req).unwrap_err(),
        PartledgerError::WalletRecovered(holder)
    );
    let exp = w.clock.now() + Duration::seconds(5);
    assert_eq!(
        w.ledger.lock(&holder, p, dec(5), &holder, exp).unwrap_err(),
        PartledgerError::WalletRecovered(holder)
    );
}

#[test]
fn recovered_target_cannot_receive_execution() {
    let mut w = world();
    let issuer = w.issuer;
    let p = Partition::DEFAULT;
    let (holder, escrow, target) = (Address::random(), Address::random(), Address::random());
    w.ledger.issue(&issuer, p, &holder, dec(50)).unwrap();
    let id = w
        .ledger
        .create_hold(&holder, &request(&w, p, 5, escrow))
        .unwrap();
    w.ledger.collaborators_mut().mark_recovered(target);
    assert_eq!(
        w.ledger
            .execute_hold(&escrow, HoldIdentifier::new(p, holder, id), &target, dec(5))
            .unwrap_err(),
        PartledgerError::WalletRecovered(target)
    );
    assert_eq!(w.ledger.held_amount_for(&holder).unwrap(), dec(5));
}

#[test]
fn paused_token_blocks_everything_that_moves_value() {
    let mut w = world();
    let issuer = w.issuer;
    let p = Partition::DEFAULT;
    let (holder, escrow) = (Address::random(), Address::random());
    w.ledger.issue(&issuer, p, &holder, dec(50)).unwrap();
    let id = w
        .ledger
        .create_hold(&holder, &request(&w, p, 5, escrow))
        .unwrap();
    let hid = HoldIdentifier::new(p, holder, id);
    let exp = w.clock.now() + Duration::seconds(5);

    w.ledger.collaborators_mut().set_paused(true);
    assert_eq!(
        w.ledger.issue(&issuer, p, &holder, dec(1)).unwrap_err(),
        PartledgerError::TokenIsPaused
    );
    assert_eq!(
        w.ledger.lock(&holder, p, dec(1), &holder, exp).unwrap_err(),
        PartledgerError::TokenIsPaused
    );
    assert_eq!(
        w.ledger.release_hold(&escrow, hid, dec(1)).unwrap_err(),
        PartledgerError::TokenIsPaused
    );
    // Reads still work.
    assert_eq!(w.ledger.balance_of(&holder).unwrap(), dec(50));
}

#[test]
fn controller_can_lock_foreign_balance() {
    let mut w = world();
    let issuer = w.issuer;
    let p = Partition::DEFAULT;
    let (holder, controller) = (Address::random(), Address::random());
    w.ledger.issue(&issuer, p, &holder, dec(50)).unwrap();
    w.ledger
        .collaborators_mut()
        .grant_role(controller, Role::Controller);
    let exp = w.clock.now() + Duration::seconds(5);

    let id = w.ledger.lock(&controller, p, dec(20), &holder, exp).unwrap();
    assert_eq!(w.ledger.locked_amount_for(&holder).unwrap(), dec(20));

    w.clock.advance(Duration::seconds(5));
    assert_eq!(
        w.ledger.release_lock(&controller, p, &holder, id, dec(20)).unwrap(),
        Decimal::ZERO
    );
    assert_eq!(w.ledger.lock_count_for_by_partition(p, &holder), 0);
}

#[test]
fn escrow_check_precedes_amount_checks() {
    let mut w = world();
    let issuer = w.issuer;
    let p = Partition::DEFAULT;
    let (holder, escrow, intruder) = (Address::random(), Address::random(), Address::random());
    w.ledger.issue(&issuer, p, &holder, dec(50)).unwrap();
    let id = w
        .ledger
        .create_hold(&holder, &request(&w, p, 5, escrow))
        .unwrap();
    let err = w
        .ledger
        .release_hold(&intruder, HoldIdentifier::new(p, holder, id), dec(500))
        .unwrap_err();
    assert_eq!(
        err,
        PartledgerError::IsNotEscrow {
            caller: intruder,
            hold_id: id,
        }
    );
    assert_eq!(err.category(), ErrorCategory::Authorization);
}

#[test]
fn holder_mode_is_only_for_the_holder() {
    let mut w = world();
    let issuer = w.issuer;
    let p = Partition::DEFAULT;
    let (victim, stranger) = (Address::random(), Address::random());
    w.ledger.issue(&issuer, p, &victim, dec(1000)).unwrap();

    let mut req = request(&w, p, 1000, stranger);
    req.destination = Some(stranger);
    let err = w
        .ledger
        .create_hold_as(&stranger, &victim, &req, AuthorizationMode::Holder, &[])
        .unwrap_err();
    assert!(matches!(err, PartledgerError::Unauthorized { .. }));
    assert_eq!(err.category(), ErrorCategory::Authorization);

    assert_eq!(w.ledger.hold_count_for_by_partition(p, &victim), 0);
    assert_eq!(w.ledger.partition_balance(&victim, p).unwrap().free, dec(1000));
    assert_eq!(w.ledger.balance_of(&stranger).unwrap(), Decimal::ZERO);
}
