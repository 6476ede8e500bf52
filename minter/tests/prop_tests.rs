use proptest::prelude::*;

use vegov_emission::EmissionSchedule;
use vegov_gauges::GaugeController;
use vegov_minter::{LiquidityGauge, MintContext, Minter};
use vegov_nullables::token::NullToken;
use vegov_types::{Address, FungibleToken, ProtocolParams, Timestamp, DAY, UNIT, WEEK};

const START: Timestamp = Timestamp::new(3_000 * WEEK);

fn user(i: usize) -> Address {
    Address::new(format!("staker-{i}"))
}

proptest! {
    /// Whatever the interleaving of stakes and mints, the minter never pays
    /// more than the schedule has issued.
    #[test]
    fn minted_never_exceeds_issued(
        ops in prop::collection::vec((0usize..3, 1u128..50, 1u64..(3 * DAY), any::<bool>()), 1..30),
    ) {
        let params = ProtocolParams::default();
        let admin = Address::new("admin");
        let gauge_addr = Address::new("gauge");
        let mut controller = GaugeController::new(&admin, params.clone());
        let t = controller.add_type(&admin, "liquidity", 1, START).unwrap();
        controller.add_gauge(&admin, &gauge_addr, t, UNIT, START).unwrap();
        let mut schedule = EmissionSchedule::new(params, START);
        let mut gauge = LiquidityGauge::new(gauge_addr, 500, START);
        let mut lp = NullToken::with_balances((0..3).map(|i| (user(i), 10_000 * UNIT)));
        let mut reward = NullToken::new();
        let mut minter = Minter::new();

        let mut now = START;
        for (who, amount, dt, stake) in ops {
            now = now.plus(dt);
            if stake {
                gauge
                    .deposit(&user(who), amount * UNIT, &mut lp, &mut schedule, &mut controller, now)
                    .unwrap();
            } else {
                let mut ctx = MintContext {
                    schedule: &mut schedule,
                    controller: &mut controller,
                    token: &mut reward,
                    now,
                };
                minter.mint(&user(who), &mut gauge, &mut ctx).unwrap();
            }
        }
        let issued = schedule.available_supply(now).unwrap();
        prop_assert!(reward.total_supply() <= issued);
        prop_assert_eq!(reward.total_supply(), schedule.total_minted());
    }
}
