//! The Fee Distributor.

use crate::error::FeeError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info};
use vegov_escrow::VotingEscrow;
use vegov_types::{mul_div, Address, AdminRoles, FungibleToken, ProtocolParams, Role, Timestamp, WEEK};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FeeDistributor {
    address: Address,
    /// Address of the token being distributed.
    fee_token: Address,
    params: ProtocolParams,
    roles: AdminRoles,
    emergency_return: Address,
    start_time: Timestamp,
    /// First week without a supply snapshot.
    time_cursor: Timestamp,
    last_token_time: Timestamp,
    token_last_balance: u128,
    tokens_per_week: BTreeMap<Timestamp, u128>,
    ve_supply: BTreeMap<Timestamp, u128>,
    time_cursor_of: BTreeMap<Address, Timestamp>,
    can_checkpoint_token: bool,
    is_killed: bool,
}

impl FeeDistributor {
    pub fn new(
        address: Address,
        fee_token: Address,
        admin: &Address,
        emergency_return: Address,
        params: ProtocolParams,
        start: Timestamp,
    ) -> Self {
        let start_time = start.week_floor();
        Self {
            address,
            fee_token,
            params,
            roles: AdminRoles::new(admin),
            emergency_return,
            start_time,
            time_cursor: start_time,
            last_token_time: start_time,
            token_last_balance: 0,
            tokens_per_week: BTreeMap::new(),
            ve_supply: BTreeMap::new(),
            time_cursor_of: BTreeMap::new(),
            can_checkpoint_token: false,
            is_killed: false,
        }
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    pub fn fee_token(&self) -> &Address {
        &self.fee_token
    }

    pub fn start_time(&self) -> Timestamp {
        self.start_time
    }

    pub fn time_cursor(&self) -> Timestamp {
        self.time_cursor
    }

    pub fn last_token_time(&self) -> Timestamp {
        self.last_token_time
    }

    pub fn token_last_balance(&self) -> u128 {
        self.token_last_balance
    }

    pub fn tokens_per_week(&self, week: Timestamp) -> u128 {
        self.tokens_per_week.get(&week.week_floor()).copied().unwrap_or(0)
    }

    pub fn ve_supply(&self, week: Timestamp) -> u128 {
        self.ve_supply.get(&week.week_floor()).copied().unwrap_or(0)
    }

    /// First week `user` has not yet claimed, if they ever claimed.
    pub fn time_cursor_of(&self, user: &Address) -> Option<Timestamp> {
        self.time_cursor_of.get(user).copied()
    }

    pub fn can_checkpoint_token(&self) -> bool {
        self.can_checkpoint_token
    }

    pub fn is_killed(&self) -> bool {
        self.is_killed
    }

    pub fn roles(&self) -> &AdminRoles {
        &self.roles
    }

    /// Voting power of `user` at `t`, as used for claims.
    pub fn ve_for_at(&self, escrow: &VotingEscrow, user: &Address, t: Timestamp) -> u128 {
        escrow.balance_of_at(user, t)
    }

    // ── Checkpoints ──────────────────────────────────────────────────────

    /// Move fee tokens received since the last checkpoint into the current
    /// week's bucket, then snapshot any missing weekly supplies.
    ///
    /// Allowed for the owner, or anyone while checkpointing is open.
    pub fn checkpoint_token(
        &mut self,
        caller: &Address,
        token: &impl FungibleToken,
        escrow: &VotingEscrow,
        now: Timestamp,
    ) -> Result<(), FeeError> {
        self.ensure_alive()?;
        if !self.can_checkpoint_token && !self.roles.is(Role::Ownership, caller) {
            return Err(FeeError::CheckpointNotAllowed(caller.clone()));
        }
        self.checkpoint_token_balance(token, now)?;
        self.checkpoint_total_supply(escrow, now)
    }

    /// Snapshot the escrow's total supply at every week start strictly
    /// before `now`, at most `fee_checkpoint_weeks` per call. Anyone may call.
    ///
    /// A week start equal to `now` is left for a later call: a lock made in
    /// that same second would otherwise count towards its holder's balance
    /// but not towards the frozen supply.
    pub fn checkpoint_total_supply(&mut self, escrow: &VotingEscrow, now: Timestamp) -> Result<(), FeeError> {
        self.ensure_alive()?;
        let mut t = self.time_cursor;
        for _ in 0..self.params.fee_checkpoint_weeks {
            if t >= now {
                break;
            }
            self.ve_supply.insert(t, escrow.total_supply_at(t));
            t = t.plus(WEEK);
        }
        self.time_cursor = t;
        debug!(time_cursor = %t, "fee supply checkpoint");
        Ok(())
    }

    // ── Claims ───────────────────────────────────────────────────────────

    /// Pay `user` their share of every finished, checkpointed week since
    /// their cursor. Returns the amount paid.
    pub fn claim(
        &mut self,
        user: &Address,
        token: &mut impl FungibleToken,
        escrow: &VotingEscrow,
        now: Timestamp,
    ) -> Result<u128, FeeError> {
        self.ensure_alive()?;
        self.prepare_claim(&*token, escrow, now)?;
        self.pay(user, token, escrow)
    }

    /// Claim for several users; returns the total paid.
    pub fn claim_many(
        &mut self,
        users: &[Address],
        token: &mut impl FungibleToken,
        escrow: &VotingEscrow,
        now: Timestamp,
    ) -> Result<u128, FeeError> {
        self.ensure_alive()?;
        self.prepare_claim(&*token, escrow, now)?;
        let mut total: u128 = 0;
        for user in users {
            let paid = self.pay(user, token, escrow)?;
            total = total.checked_add(paid).ok_or(FeeError::Overflow)?;
        }
        Ok(total)
    }

    // ── Administration ───────────────────────────────────────────────────

    /// Open or close token checkpointing to everyone. Returns the new setting.
    pub fn toggle_allow_checkpoint_token(&mut self, caller: &Address) -> Result<bool, FeeError> {
        self.roles.ensure(Role::Ownership, caller)?;
        self.can_checkpoint_token = !self.can_checkpoint_token;
        info!(open = self.can_checkpoint_token, "fee checkpoint toggled");
        Ok(self.can_checkpoint_token)
    }

    /// Stop the distributor for good and send its whole fee balance to the
    /// emergency return address.
    pub fn kill(&mut self, caller: &Address, token: &mut impl FungibleToken) -> Result<u128, FeeError> {
        self.roles.ensure(Role::Emergency, caller)?;
        self.is_killed = true;
        let balance = token.balance_of(&self.address);
        self.token_last_balance = 0;
        token.transfer(&self.address, &self.emergency_return, balance)?;
        info!(returned = balance, to = %self.emergency_return, "fee distributor killed");
        Ok(balance)
    }

    /// Send a stray token held by the distributor to the emergency return
    /// address.
    pub fn recover_balance(
        &mut self,
        caller: &Address,
        coin: &Address,
        ledger: &mut impl FungibleToken,
    ) -> Result<u128, FeeError> {
        self.roles.ensure(Role::Emergency, caller)?;
        if *coin == self.fee_token {
            return Err(FeeError::CannotRecoverFeeToken);
        }
        let balance = ledger.balance_of(&self.address);
        ledger.transfer(&self.address, &self.emergency_return, balance)?;
        info!(coin = %coin, amount = balance, "stray balance recovered");
        Ok(balance)
    }

    pub fn commit_role(&mut self, role: Role, caller: &Address, new_holder: &Address) -> Result<(), FeeError> {
        self.roles.commit(role, caller, new_holder)?;
        Ok(())
    }

    pub fn apply_role(&mut self, role: Role, caller: &Address) -> Result<(), FeeError> {
        self.roles.apply(role, caller)?;
        Ok(())
    }

    // ── Internals ────────────────────────────────────────────────────────

    fn ensure_alive(&self) -> Result<(), FeeError> {
        if self.is_killed {
            return Err(FeeError::Killed);
        }
        Ok(())
    }

    fn checkpoint_token_balance(&mut self, token: &impl FungibleToken, now: Timestamp) -> Result<(), FeeError> {
        let balance = token.balance_of(&self.address);
        let received = balance.saturating_sub(self.token_last_balance);
        let week = now.week_floor();
        let bucket = self.tokens_per_week.entry(week).or_default();
        *bucket = bucket.checked_add(received).ok_or(FeeError::Overflow)?;
        self.token_last_balance = balance;
        self.last_token_time = now;
        info!(week = %week, received, balance, "fee token checkpoint");
        Ok(())
    }

    /// Catch supply snapshots up and, when open and due, the token bucket.
    fn prepare_claim(
        &mut self,
        token: &impl FungibleToken,
        escrow: &VotingEscrow,
        now: Timestamp,
    ) -> Result<(), FeeError> {
        if now >= self.time_cursor {
            self.checkpoint_total_supply(escrow, now)?;
        }
        let deadline = self.last_token_time.plus(self.params.token_checkpoint_deadline);
        if self.can_checkpoint_token && now > deadline {
            self.checkpoint_token_balance(token, now)?;
        }
        Ok(())
    }

    fn pay(
        &mut self,
        user: &Address,
        token: &mut impl FungibleToken,
        escrow: &VotingEscrow,
    ) -> Result<u128, FeeError> {
        let limit = self.last_token_time.week_floor().min(self.time_cursor);
        let amount = self.accrue_claim(user, escrow, limit)?;
        if amount > 0 {
            self.token_last_balance = self
                .token_last_balance
                .checked_sub(amount)
                .ok_or(FeeError::Overflow)?;
            token.transfer(&self.address, user, amount)?;
            info!(user = %user, amount, "fees claimed");
        }
        Ok(amount)
    }

    /// Sum `user`'s share of each week before `limit`, advancing their cursor.
    fn accrue_claim(&mut self, user: &Address, escrow: &VotingEscrow, limit: Timestamp) -> Result<u128, FeeError> {
        let Some(first) = escrow.user_point(user, 0) else {
            return Ok(0);
        };
        let last_ts = escrow.last_user_point(user).map_or(first.ts, |p| p.ts);
        let mut cursor = match self.time_cursor_of.get(user) {
            Some(c) => *c,
            None => first.ts.week_ceil().max(self.start_time),
        };
        if cursor >= limit {
            return Ok(0);
        }

        let mut total: u128 = 0;
        for _ in 0..self.params.fee_claim_weeks {
            if cursor >= limit {
                break;
            }
            let balance = escrow.balance_of_at(user, cursor);
            if balance == 0 && cursor >= last_ts {
                // no power now and no later lock recorded
                break;
            }
            let supply = self.ve_supply(cursor);
            let tokens = self.tokens_per_week(cursor);
            if balance > 0 && supply > 0 && tokens > 0 {
                let share = mul_div(balance, tokens, supply).ok_or(FeeError::Overflow)?;
                total = total.checked_add(share).ok_or(FeeError::Overflow)?;
            }
            cursor = cursor.plus(WEEK);
        }
        self.time_cursor_of.insert(user.clone(), cursor);
        debug!(user = %user, cursor = %cursor, total, "fee claim accrued");
        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vegov_nullables::token::NullToken;
    use vegov_types::{Classify, ErrorKind, MintableToken, DAY, UNIT, YEAR};

    const START: Timestamp = Timestamp::new(1_500 * WEEK);

    fn addr(s: &str) -> Address {
        Address::new(s)
    }

    struct World {
        escrow: VotingEscrow,
        dist: FeeDistributor,
        gov: NullToken,
        fee: NullToken,
    }

    impl World {
        fn new() -> Self {
            let params = ProtocolParams::default();
            let admin = addr("admin");
            Self {
                escrow: VotingEscrow::new(addr("escrow"), &admin, params.clone(), START),
                dist: FeeDistributor::new(
                    addr("distributor"),
                    addr("fee-token"),
                    &admin,
                    addr("treasury"),
                    params,
                    START,
                ),
                gov: NullToken::with_balances([(addr("alice"), 1_000 * UNIT), (addr("bob"), 1_000 * UNIT)]),
                fee: NullToken::new(),
            }
        }

        fn lock(&mut self, user: &str, amount: u128, now: Timestamp) {
            self.escrow
                .create_lock(&addr(user), amount, now.plus(4 * YEAR - WEEK), &mut self.gov, now)
                .unwrap();
        }

        fn collect(&mut self, amount: u128, now: Timestamp) {
            self.fee.mint(&addr("distributor"), amount).unwrap();
            self.dist
                .checkpoint_token(&addr("admin"), &self.fee, &self.escrow, now)
                .unwrap();
        }

        fn claim(&mut self, user: &str, now: Timestamp) -> u128 {
            self.dist
                .claim(&addr(user), &mut self.fee, &self.escrow, now)
                .unwrap()
        }
    }

    #[test]
    fn sole_locker_takes_whole_week() {
        let mut w = World::new();
        w.lock("alice", 100 * UNIT, START);
        w.collect(100 * UNIT, START.plus(DAY));

        // bucket week is not finished yet
        assert_eq!(w.claim("alice", START.plus(2 * DAY)), 0);

        w.collect(0, START.plus(WEEK + DAY));
        let paid = w.claim("alice", START.plus(WEEK + DAY));
        assert!(paid <= 100 * UNIT && paid > 100 * UNIT - 10);
        assert_eq!(w.fee.balance_of(&addr("alice")), paid);
        assert_eq!(w.claim("alice", START.plus(WEEK + 2 * DAY)), 0);
    }

    #[test]
    fn shares_follow_voting_power() {
        let mut w = World::new();
        w.lock("alice", 300 * UNIT, START);
        w.lock("bob", 100 * UNIT, START);
        w.collect(40 * UNIT, START.plus(DAY));
        w.collect(0, START.plus(WEEK + DAY));
        let a = w.claim("alice", START.plus(WEEK + DAY));
        let b = w.claim("bob", START.plus(WEEK + DAY));
        assert!(a.abs_diff(30 * UNIT) <= 10);
        assert!(b.abs_diff(10 * UNIT) <= 10);
        assert!(a + b <= 40 * UNIT);
    }

    #[test]
    fn weeks_before_lock_pay_nothing() {
        let mut w = World::new();
        w.lock("alice", 100 * UNIT, START);
        w.collect(50 * UNIT, START.plus(DAY));
        w.lock("bob", 100 * UNIT, START.plus(WEEK + DAY));
        w.collect(0, START.plus(2 * WEEK + DAY));
        let now = START.plus(2 * WEEK + DAY);
        assert_eq!(w.claim("bob", now), 0);
        assert!(w.claim("alice", now) > 49 * UNIT);
    }

    #[test]
    fn checkpoint_token_idempotent() {
        let mut w = World::new();
        w.lock("alice", 100 * UNIT, START);
        w.collect(10 * UNIT, START.plus(DAY));
        w.collect(0, START.plus(DAY));
        assert_eq!(w.dist.tokens_per_week(START), 10 * UNIT);
        assert_eq!(w.dist.token_last_balance(), 10 * UNIT);
    }

    #[test]
    fn checkpoint_token_requires_owner_or_toggle() {
        let mut w = World::new();
        let bob = addr("bob");
        let err = w
            .dist
            .checkpoint_token(&bob, &w.fee, &w.escrow, START.plus(DAY))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Authorization);

        let err = w.dist.toggle_allow_checkpoint_token(&bob).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Authorization);
        assert!(w.dist.toggle_allow_checkpoint_token(&addr("admin")).unwrap());
        w.dist
            .checkpoint_token(&bob, &w.fee, &w.escrow, START.plus(DAY))
            .unwrap();
    }

    #[test]
    fn claim_checkpoints_token_when_open() {
        let mut w = World::new();
        w.lock("alice", 100 * UNIT, START);
        w.dist.toggle_allow_checkpoint_token(&addr("admin")).unwrap();
        w.collect(20 * UNIT, START.plus(DAY));
        // no explicit checkpoint in week two: the claim does it
        let paid = w.claim("alice", START.plus(WEEK + 2 * DAY));
        assert!(paid > 20 * UNIT - 10);
        assert_eq!(w.dist.last_token_time(), START.plus(WEEK + 2 * DAY));
    }

    #[test]
    fn supply_snapshots_are_bounded_per_call() {
        let mut w = World::new();
        w.lock("alice", 100 * UNIT, START);
        let later = START.plus(30 * WEEK);
        w.dist.checkpoint_total_supply(&w.escrow, later).unwrap();
        assert_eq!(w.dist.time_cursor(), START.plus(20 * WEEK));
        w.dist.checkpoint_total_supply(&w.escrow, later).unwrap();
        // the week starting exactly now is not frozen yet
        assert_eq!(w.dist.time_cursor(), START.plus(30 * WEEK));
        w.dist.checkpoint_total_supply(&w.escrow, later.plus(1)).unwrap();
        assert_eq!(w.dist.time_cursor(), START.plus(31 * WEEK));
        assert_eq!(w.dist.ve_supply(START.plus(5 * WEEK)), w.escrow.total_supply_at(START.plus(5 * WEEK)));
    }

    #[test]
    fn lock_in_the_second_of_a_week_start_is_in_its_supply() {
        let mut w = World::new();
        w.lock("alice", 100 * UNIT, START);
        let w1 = START.plus(WEEK);
        w.dist.checkpoint_total_supply(&w.escrow, w1).unwrap();
        w.lock("bob", 100 * UNIT, w1);
        w.collect(10 * UNIT, w1.plus(DAY));
        assert_eq!(w.dist.ve_supply(w1), w.escrow.total_supply_at(w1));

        let later = w1.plus(WEEK + DAY);
        w.collect(0, later);
        let a = w.claim("alice", later);
        let b = w.claim("bob", later);
        assert!(a + b <= 10 * UNIT);
        assert!(b > a && a > 4 * UNIT);
        assert_eq!(w.dist.token_last_balance(), 10 * UNIT - a - b);
    }

    #[test]
    fn kill_returns_funds_and_stops_claims() {
        let mut w = World::new();
        w.lock("alice", 100 * UNIT, START);
        w.collect(10 * UNIT, START.plus(DAY));
        let err = w.dist.kill(&addr("bob"), &mut w.fee).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Authorization);

        assert_eq!(w.dist.kill(&addr("admin"), &mut w.fee).unwrap(), 10 * UNIT);
        assert_eq!(w.fee.balance_of(&addr("treasury")), 10 * UNIT);
        let err = w
            .dist
            .claim(&addr("alice"), &mut w.fee, &w.escrow, START.plus(WEEK + DAY))
            .unwrap_err();
        assert!(matches!(err, FeeError::Killed));
        assert_eq!(err.kind(), ErrorKind::State);
    }

    #[test]
    fn recover_balance_skips_fee_token() {
        let mut w = World::new();
        let admin = addr("admin");
        let err = w
            .dist
            .recover_balance(&admin, &addr("fee-token"), &mut w.fee)
            .unwrap_err();
        assert!(matches!(err, FeeError::CannotRecoverFeeToken));

        let mut stray = NullToken::with_balances([(addr("distributor"), 7)]);
        assert_eq!(w.dist.recover_balance(&admin, &addr("stray"), &mut stray).unwrap(), 7);
        assert_eq!(stray.balance_of(&addr("treasury")), 7);
    }

    #[test]
    fn ve_for_at_reads_escrow_history() {
        let mut w = World::new();
        w.lock("alice", 100 * UNIT, START);
        let t = START.plus(3 * WEEK);
        assert_eq!(w.dist.ve_for_at(&w.escrow, &addr("alice"), t), w.escrow.balance_of_at(&addr("alice"), t));
    }
}
