//! End-to-end tests driving every component through the node:
//! locking → voting → staking → minting → fee distribution → snapshots.

use vegov_node::{Component, NodeConfig, NodeError, Protocol};
use vegov_nullables::{NullClock, NullToken};
use vegov_types::{
    Address, Classify, ErrorKind, FungibleToken, MintableToken, Role, Timestamp, DAY, UNIT, WEEK,
    YEAR,
};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

const START: u64 = 2_000 * WEEK;

type Node = Protocol<NullToken, NullClock>;

fn addr(s: &str) -> Address {
    Address::new(s)
}

fn admin() -> Address {
    addr("admin")
}

fn deploy_with(config: &NodeConfig) -> Node {
    let gov = NullToken::with_balances([
        (addr("alice"), 1_000 * UNIT),
        (addr("bob"), 1_000 * UNIT),
        (addr("carol"), 5 * UNIT),
    ]);
    Protocol::new(config, gov, NullToken::new(), NullClock::new(START)).expect("deploy")
}

fn deploy() -> Node {
    let config = NodeConfig {
        enable_metrics: true,
        ..NodeConfig::default()
    };
    deploy_with(&config)
}

fn advance(node: &Node, secs: u64) {
    node.clock().advance(secs);
}

/// One liquidity type and one gauge holding all the weight from next week.
fn single_pool(node: &mut Node) -> Address {
    let pool = addr("pool");
    let t = node.add_type(&admin(), "liquidity", UNIT).unwrap();
    node.add_gauge(&admin(), &pool, t, UNIT).unwrap();
    for user in ["alice", "bob"] {
        node.lp_token_mut(&pool)
            .unwrap()
            .mint(&addr(user), 100 * UNIT)
            .unwrap();
    }
    pool
}

fn within(actual: u128, expected: u128, tolerance: u128) -> bool {
    actual.abs_diff(expected) <= tolerance
}

// ---------------------------------------------------------------------------
// Escrow
// ---------------------------------------------------------------------------

#[test]
fn lock_decays_and_withdraws_in_full() {
    let mut node = deploy();
    let alice = addr("alice");
    let unlock = node.now().plus(3 * YEAR);
    node.create_lock(&alice, 10 * UNIT, unlock).unwrap();

    let week_of_power = 10 * UNIT * u128::from(WEEK) / u128::from(4 * YEAR);
    assert!(within(node.balance_of(&alice), 75 * UNIT / 10, week_of_power));
    assert_eq!(node.total_supply(), node.balance_of(&alice));

    advance(&node, 3 * YEAR / 2);
    assert!(within(node.balance_of(&alice), 375 * UNIT / 100, week_of_power));

    let end = node.state().escrow.locked_end(&alice);
    node.clock().set(end.as_secs());
    assert_eq!(node.balance_of(&alice), 0);
    assert_eq!(node.withdraw(&alice).unwrap(), 10 * UNIT);
    assert_eq!(node.state().token.balance_of(&alice), 1_000 * UNIT);
    assert_eq!(node.total_supply(), 0);
}

#[test]
fn failed_call_leaves_no_trace() {
    let mut node = deploy();
    let carol = addr("carol");
    let before = node.snapshot().unwrap();

    // carol holds only 5 tokens
    let err = node
        .create_lock(&carol, 10 * UNIT, node.now().plus(YEAR))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(node.snapshot().unwrap(), before);
    assert_eq!(node.state().escrow.locked(&carol).amount, 0);

    let metrics = node.metrics().unwrap();
    assert_eq!(metrics.calls_rolled_back.get(), 1);
    assert_eq!(metrics.calls_committed.get(), 0);
}

#[test]
fn supply_reads_ignore_the_checkpoint_bound() {
    let mut config = NodeConfig::default();
    config.params.escrow_checkpoint_weeks = 10;
    config.params.gauge_checkpoint_weeks = 5;
    let mut node = deploy_with(&config);
    let gauge = addr("gauge");
    let t = node.add_type(&admin(), "liquidity", UNIT).unwrap();
    node.add_gauge(&admin(), &gauge, t, 0).unwrap();
    let alice = addr("alice");
    node.create_lock(&alice, 100 * UNIT, node.now().plus(4 * YEAR - WEEK))
        .unwrap();
    node.vote_for_gauge_weights(&alice, &gauge, 10_000).unwrap();

    advance(&node, 50 * WEEK);
    let now = node.now();
    assert_eq!(node.state().escrow.total_supply_at(now), node.balance_of(&alice));

    // the fee distributor freezes the same values
    for _ in 0..3 {
        node.checkpoint_total_supply().unwrap();
    }
    let last_full = Timestamp::new(now.as_secs() - WEEK);
    assert_eq!(
        node.state().distributor.ve_supply(last_full),
        node.state().escrow.balance_of_at(&alice, last_full)
    );

    let read = node.state().controller.gauge_weight(&gauge, now);
    assert!(read > 0);
    while !node.checkpoint_gauge(&gauge).unwrap() {}
    assert_eq!(node.state().controller.gauge_weight(&gauge, now), read);
}

#[test]
fn stale_checkpoint_calls_roll_back_their_catch_up() {
    let mut config = NodeConfig::default();
    config.params.escrow_checkpoint_weeks = 3;
    config.params.gauge_checkpoint_weeks = 3;
    let mut node = deploy_with(&config);
    let pool = single_pool(&mut node);
    let (alice, bob) = (addr("alice"), addr("bob"));
    node.create_lock(&alice, 100 * UNIT, node.now().plus(YEAR))
        .unwrap();
    advance(&node, WEEK);
    node.gauge_deposit(&alice, &pool, 10 * UNIT).unwrap();

    advance(&node, 10 * WEEK);
    let before = node.snapshot().unwrap();
    let err = node
        .create_lock(&bob, 10 * UNIT, node.now().plus(YEAR))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::State);
    assert!(node.gauge_deposit(&bob, &pool, 10 * UNIT).is_err());
    assert!(node
        .mint_many(&alice, &[pool.clone(), pool.clone(), addr("rogue")])
        .is_err());
    assert_eq!(node.snapshot().unwrap(), before);

    while !node.checkpoint_escrow().unwrap() {}
    node.create_lock(&bob, 10 * UNIT, node.now().plus(YEAR))
        .unwrap();
}

// ---------------------------------------------------------------------------
// Gauges and emission
// ---------------------------------------------------------------------------

#[test]
fn type_weights_split_relative_weight() {
    let mut node = deploy();
    let (a, b) = (addr("gauge-a"), addr("gauge-b"));
    let heavy = node.add_type(&admin(), "heavy", 2 * UNIT).unwrap();
    let light = node.add_type(&admin(), "light", UNIT).unwrap();
    node.add_gauge(&admin(), &a, heavy, UNIT).unwrap();
    node.add_gauge(&admin(), &b, light, UNIT).unwrap();

    assert_eq!(node.gauge_relative_weight(&a), 0);
    advance(&node, WEEK);
    assert!(node.checkpoint_gauges().unwrap());
    assert_eq!(node.gauge_relative_weight(&a), 2 * UNIT / 3);
    assert_eq!(node.gauge_relative_weight(&b), UNIT / 3);
    assert_eq!(node.gauge_relative_weight(&addr("nowhere")), 0);
}

#[test]
fn votes_move_weight_between_gauges() {
    let mut node = deploy();
    let (a, b) = (addr("gauge-a"), addr("gauge-b"));
    let t = node.add_type(&admin(), "liquidity", UNIT).unwrap();
    node.add_gauge(&admin(), &a, t, 0).unwrap();
    node.add_gauge(&admin(), &b, t, 0).unwrap();

    let alice = addr("alice");
    node.create_lock(&alice, 100 * UNIT, node.now().plus(4 * YEAR - WEEK))
        .unwrap();
    node.vote_for_gauge_weights(&alice, &a, 7_500).unwrap();
    node.vote_for_gauge_weights(&alice, &b, 2_500).unwrap();
    // re-voting inside the delay is refused
    let err = node.vote_for_gauge_weights(&alice, &a, 5_000).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::State);
    assert_eq!(node.state().controller.vote_user_power(&alice), 10_000);

    advance(&node, WEEK);
    let wa = node.gauge_relative_weight_write(&a).unwrap();
    let wb = node.gauge_relative_weight_write(&b).unwrap();
    assert!(within(wa, 3 * UNIT / 4, UNIT / 1_000_000));
    assert!(within(wb, UNIT / 4, UNIT / 1_000_000));
    assert!(wa + wb <= UNIT);
}

#[test]
fn one_week_of_emission_reaches_the_staker() {
    let mut node = deploy();
    let pool = single_pool(&mut node);
    let alice = addr("alice");

    advance(&node, WEEK);
    node.gauge_deposit(&alice, &pool, 10 * UNIT).unwrap();
    assert_eq!(node.state().lp_tokens[&pool].balance_of(&alice), 90 * UNIT);

    advance(&node, WEEK);
    let claimable = node.claimable_tokens(&pool, &alice).unwrap();
    let paid = node.mint(&alice, &pool).unwrap();
    let expected = node.state().schedule.rate() * u128::from(WEEK);
    assert!(within(paid, expected, 10), "paid {paid}, expected {expected}");
    assert_eq!(claimable, paid);
    assert_eq!(node.state().token.balance_of(&alice), 1_000 * UNIT + paid);
    assert_eq!(node.state().minter.minted(&alice, &pool), paid);
    assert_eq!(node.mint(&alice, &pool).unwrap(), 0);
    assert!(node.metrics().unwrap().rewards_minted.get() > 0.0);
}

#[test]
fn mint_for_needs_approval() {
    let mut node = deploy();
    let pool = single_pool(&mut node);
    let (alice, bot) = (addr("alice"), addr("bot"));
    advance(&node, WEEK);
    node.gauge_deposit(&alice, &pool, 10 * UNIT).unwrap();
    advance(&node, DAY);

    let err = node.mint_for(&bot, &pool, &alice).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Authorization);
    assert!(node.toggle_approve_mint(&alice, &bot).unwrap());
    let paid = node.mint_for(&bot, &pool, &alice).unwrap();
    assert!(paid > 0);
    assert_eq!(node.state().token.balance_of(&alice), 1_000 * UNIT + paid);
    assert_eq!(node.state().token.balance_of(&bot), 0);
}

#[test]
fn mint_many_rejects_unknown_gauge_atomically() {
    let mut node = deploy();
    let pool = single_pool(&mut node);
    let alice = addr("alice");
    advance(&node, WEEK);
    node.gauge_deposit(&alice, &pool, 10 * UNIT).unwrap();
    advance(&node, DAY);

    let err = node
        .mint_many(&alice, &[pool.clone(), addr("rogue")])
        .unwrap_err();
    assert!(matches!(err, NodeError::UnknownGauge(_)));
    assert_eq!(node.state().minter.minted(&alice, &pool), 0);

    let paid = node.mint_many(&alice, &[pool.clone(), pool.clone()]).unwrap();
    assert_eq!(node.state().minter.minted(&alice, &pool), paid);
}

#[test]
fn stake_and_unstake_round_trip() {
    let mut node = deploy();
    let pool = single_pool(&mut node);
    let bob = addr("bob");
    node.gauge_deposit(&bob, &pool, 40 * UNIT).unwrap();
    assert_eq!(node.state().gauges[&pool].total_supply(), 40 * UNIT);
    node.gauge_withdraw(&bob, &pool, 40 * UNIT).unwrap();
    assert_eq!(node.state().lp_tokens[&pool].balance_of(&bob), 100 * UNIT);

    let err = node.gauge_withdraw(&bob, &pool, 1).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
}

#[test]
fn emission_rate_steps_down_after_a_year() {
    let mut node = deploy();
    advance(&node, DAY);
    node.update_mining_parameters().unwrap();
    let first = node.state().schedule.rate();
    assert_eq!(first, node.state().schedule.rate_history().current_rate());

    let err = node.update_mining_parameters().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::State);

    advance(&node, YEAR);
    let next_epoch = node.future_epoch_time_write().unwrap();
    assert!(next_epoch > node.now());
    assert!(node.state().schedule.rate() < first);
}

// ---------------------------------------------------------------------------
// Fees
// ---------------------------------------------------------------------------

fn fund_fees(node: &mut Node, amount: u128) {
    let payer = addr("exchange");
    node.fee_token_mut().mint(&payer, amount).unwrap();
    node.deposit_fees(&payer, amount).unwrap();
}

#[test]
fn fees_follow_voting_power() {
    let mut node = deploy();
    let (alice, bob) = (addr("alice"), addr("bob"));
    let unlock = node.now().plus(4 * YEAR - WEEK);
    node.create_lock(&alice, 300 * UNIT, unlock).unwrap();
    node.create_lock(&bob, 100 * UNIT, unlock).unwrap();

    advance(&node, DAY);
    fund_fees(&mut node, 40 * UNIT);
    node.checkpoint_token(&admin()).unwrap();

    advance(&node, WEEK);
    node.checkpoint_token(&admin()).unwrap();
    let paid = node.claim_many(&[alice.clone(), bob.clone()]).unwrap();
    assert!(paid <= 40 * UNIT);
    assert!(within(node.state().fee_token.balance_of(&alice), 30 * UNIT, 10));
    assert!(within(node.state().fee_token.balance_of(&bob), 10 * UNIT, 10));
    assert_eq!(node.claim(&alice).unwrap(), 0);
}

#[test]
fn lock_at_a_snapshotted_week_start_shares_that_week() {
    let mut node = deploy();
    let (alice, bob) = (addr("alice"), addr("bob"));
    node.create_lock(&alice, 100 * UNIT, node.now().plus(4 * YEAR - WEEK))
        .unwrap();

    advance(&node, WEEK);
    node.checkpoint_total_supply().unwrap();
    node.create_lock(&bob, 100 * UNIT, node.now().plus(4 * YEAR - WEEK))
        .unwrap();
    advance(&node, DAY);
    fund_fees(&mut node, 10 * UNIT);
    node.checkpoint_token(&admin()).unwrap();

    advance(&node, WEEK);
    node.checkpoint_token(&admin()).unwrap();
    let a = node.claim(&alice).unwrap();
    let b = node.claim(&bob).unwrap();
    assert!(a + b <= 10 * UNIT);
    assert!(within(a + b, 10 * UNIT, 10));
    assert!(b > a);
}

#[test]
fn fee_checkpoint_is_owner_gated_until_opened() {
    let mut node = deploy();
    let bob = addr("bob");
    let err = node.checkpoint_token(&bob).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Authorization);
    assert!(node.toggle_allow_checkpoint_token(&admin()).unwrap());
    node.checkpoint_token(&bob).unwrap();
    node.checkpoint_total_supply().unwrap();
}

#[test]
fn killed_distributor_returns_funds() {
    let mut node = deploy();
    let alice = addr("alice");
    node.create_lock(&alice, 100 * UNIT, node.now().plus(YEAR))
        .unwrap();
    fund_fees(&mut node, 25 * UNIT);

    let err = node.kill_fee_distributor(&alice).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Authorization);
    assert_eq!(node.kill_fee_distributor(&admin()).unwrap(), 25 * UNIT);
    assert_eq!(node.state().fee_token.balance_of(&admin()), 25 * UNIT);
    assert!(node.state().distributor.is_killed());
    assert_eq!(node.claim(&alice).unwrap_err().kind(), ErrorKind::State);
}

#[test]
fn stray_tokens_are_recoverable_but_fees_are_not() {
    let mut node = deploy();
    let dist = node.deployment().fee_distributor.clone();
    node.token_mut().mint(&dist, 3 * UNIT).unwrap();
    let governance = node.deployment().governance_token.clone();
    let fee = node.deployment().fee_token.clone();

    assert_eq!(node.recover_balance(&admin(), &governance).unwrap(), 3 * UNIT);
    assert_eq!(node.state().token.balance_of(&admin()), 3 * UNIT);
    let err = node.recover_balance(&admin(), &fee).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    let err = node.recover_balance(&admin(), &addr("unknown")).unwrap_err();
    assert!(matches!(err, NodeError::UnknownToken(_)));
}

// ---------------------------------------------------------------------------
// Roles, configuration and snapshots
// ---------------------------------------------------------------------------

#[test]
fn gauge_ownership_moves_in_two_steps() {
    let mut node = deploy();
    let dao = addr("dao");
    node.commit_role(Component::Gauges, Role::Ownership, &admin(), &dao)
        .unwrap();
    let err = node.add_type(&dao, "liquidity", UNIT).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Authorization);

    node.apply_role(Component::Gauges, Role::Ownership, &dao).unwrap();
    node.add_type(&dao, "liquidity", UNIT).unwrap();
    let err = node.add_type(&admin(), "other", UNIT).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Authorization);

    // other components keep their holder
    node.set_emergency_unlock(&admin(), true).unwrap();
}

#[test]
fn config_file_sets_vote_delay() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("vegov.toml");
    std::fs::write(&path, "[params]\nweight_vote_delay = 3600\n").unwrap();
    let config = NodeConfig::from_toml_file(path.to_str().unwrap()).unwrap();

    let vote_twice = |config: &NodeConfig| -> Result<(), NodeError> {
        let mut node = deploy_with(config);
        let gauge = addr("gauge");
        let t = node.add_type(&admin(), "liquidity", UNIT)?;
        node.add_gauge(&admin(), &gauge, t, UNIT)?;
        let alice = addr("alice");
        node.create_lock(&alice, 10 * UNIT, node.now().plus(YEAR))?;
        node.vote_for_gauge_weights(&alice, &gauge, 5_000)?;
        advance(&node, 2 * 3600);
        node.vote_for_gauge_weights(&alice, &gauge, 10_000)
    };

    vote_twice(&config).unwrap();
    let err = vote_twice(&NodeConfig::default()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::State);
}

#[test]
fn snapshot_restores_identical_state() {
    let mut node = deploy();
    let pool = single_pool(&mut node);
    let alice = addr("alice");
    node.create_lock(&alice, 50 * UNIT, node.now().plus(2 * YEAR))
        .unwrap();
    advance(&node, WEEK);
    node.gauge_deposit(&alice, &pool, 10 * UNIT).unwrap();

    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("state.bin");
    node.save_snapshot(&path).unwrap();

    let clock = NullClock::new(node.now().as_secs());
    let mut restored: Node = Protocol::load_snapshot(&NodeConfig::default(), &path, clock).unwrap();
    assert_eq!(restored.balance_of(&alice), node.balance_of(&alice));
    assert_eq!(restored.snapshot().unwrap(), node.snapshot().unwrap());

    advance(&node, DAY);
    advance(&restored, DAY);
    assert_eq!(restored.mint(&alice, &pool).unwrap(), node.mint(&alice, &pool).unwrap());
}

#[test]
fn configured_snapshot_path_persists_and_reopens() {
    let dir = tempfile::tempdir().expect("temp dir");
    let config = NodeConfig {
        snapshot_path: Some(dir.path().join("state.bin")),
        ..NodeConfig::default()
    };
    let gov = || NullToken::with_balances([(addr("alice"), 1_000 * UNIT)]);

    let mut node: Node = Protocol::open(&config, gov(), NullToken::new(), NullClock::new(START)).unwrap();
    let alice = addr("alice");
    node.create_lock(&alice, 40 * UNIT, node.now().plus(YEAR))
        .unwrap();
    assert!(node.persist().unwrap());
    assert_eq!(node.snapshot_path(), config.snapshot_path.as_deref());

    let reopened: Node = Protocol::open(&config, gov(), NullToken::new(), NullClock::new(START)).unwrap();
    assert_eq!(reopened.state().escrow.locked(&alice).amount, 40 * UNIT);
    assert_eq!(reopened.snapshot().unwrap(), node.snapshot().unwrap());

    assert!(!deploy().persist().unwrap());
}

#[test]
fn corrupt_snapshot_is_rejected() {
    let clock = NullClock::new(START);
    let err = Node::from_snapshot(&NodeConfig::default(), &[1, 2, 3], clock)
        .err()
        .expect("garbage must not decode");
    assert!(matches!(err, NodeError::Snapshot(_)));
    assert_eq!(err.kind(), ErrorKind::Validation);
}

#[test]
fn escrow_checkpoint_is_idempotent() {
    let mut node = deploy();
    let alice = addr("alice");
    node.create_lock(&alice, 10 * UNIT, node.now().plus(YEAR))
        .unwrap();
    advance(&node, 3 * WEEK);
    assert!(node.checkpoint_escrow().unwrap());
    let epoch = node.state().escrow.epoch();
    assert!(node.checkpoint_escrow().unwrap());
    assert_eq!(node.state().escrow.epoch(), epoch);
    let at: Timestamp = node.now();
    assert_eq!(node.state().escrow.total_supply_at(at), node.balance_of(&alice));
}
