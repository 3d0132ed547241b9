//! Property-based tests for ledger invariants
//!
//! These tests use proptest to verify critical invariants:
//! - Non-negativity: no sequence of operations drives a balance below zero
//! - Atomic failure: a rejected operation leaves state unchanged
//! - Monotonic unlock: `total_unlocked` never decreases and stays bounded
//! - Audit consistency: a recorded swap matches itself and nothing else

use bridge_core::{
    Address, Amount, BalanceLedger, Bridge, Config, Curve, CurvedCurve, Error, LinearCurve,
    ManualClock, Recorded, SwapAuditor, SwapClaim, SwapId, UnlockCurve, VestingSchedule,
};
use proptest::prelude::*;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

const OWNER: Address = Address::from_bytes([0xaa; 20]);
const RELAYER: Address = Address::from_bytes([0xbb; 20]);

/// Strategy for generating account addresses (a small pool so accounts repeat)
fn account_strategy() -> impl Strategy<Value = Address> {
    (1u64..8).prop_map(Address::from_low_u64)
}

/// Strategy for generating arbitrary addresses
fn address_strategy() -> impl Strategy<Value = Address> {
    any::<[u8; 20]>().prop_map(Address::from_bytes)
}

#[derive(Debug, Clone)]
enum BalanceOp {
    Add(Address, Amount),
    Subtract(Address, Amount),
}

/// Strategy for generating balance operations
fn balance_op_strategy() -> impl Strategy<Value = BalanceOp> {
    prop_oneof![
        (account_strategy(), 0u128..1_000_000).prop_map(|(a, v)| BalanceOp::Add(a, v)),
        (account_strategy(), 0u128..1_000_000).prop_map(|(a, v)| BalanceOp::Subtract(a, v)),
    ]
}

/// Strategy for generating curves with realistic parameters
fn curve_strategy() -> impl Strategy<Value = Curve> {
    prop_oneof![
        (1u128..1_000_000_000_000_000_000_000, 1u64..1_000_000, 1u64..10_000).prop_map(
            |(amount, period, periods)| LinearCurve::new(amount, period, periods)
                .unwrap()
                .into()
        ),
        (1u128..1_000_000_000_000_000_000_000, 1u128..100_000_000)
            .prop_map(|(a, c)| CurvedCurve::new(a, c).unwrap().into()),
    ]
}

/// Strategy for generating swap claims
fn claim_strategy() -> impl Strategy<Value = SwapClaim> {
    (
        address_strategy(),
        "[a-z]{3,10}",
        address_strategy(),
        "[a-z]{3,10}",
        1u128..u128::MAX,
        "0x[0-9a-f]{64}",
    )
        .prop_map(
            |(sender, source_chain, receiver, destination_chain, amount, source_tx)| SwapClaim {
                sender,
                source_chain,
                receiver,
                destination_chain,
                amount,
                source_tx,
                destination_tx: String::new(),
            },
        )
}

/// Ledger where the relayer holds both roles
fn relayer_ledger() -> BalanceLedger {
    let mut ledger = BalanceLedger::new(OWNER);
    ledger.toggle_adder(&OWNER, RELAYER).unwrap();
    ledger.toggle_subtractor(&OWNER, RELAYER).unwrap();
    ledger
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Property: Balances track a model exactly and never go negative;
    /// a failed subtract changes nothing
    #[test]
    fn prop_balances_never_negative(ops in prop::collection::vec(balance_op_strategy(), 1..100)) {
        let mut ledger = relayer_ledger();
        let mut model: HashMap<Address, i128> = HashMap::new();

        for op in ops {
            match op {
                BalanceOp::Add(account, amount) => {
                    ledger.add_value(&RELAYER, account, amount).unwrap();
                    *model.entry(account).or_default() += amount as i128;
                }
                BalanceOp::Subtract(account, amount) => {
                    let before = ledger.user_balance(&account);
                    let expected = model.get(&account).copied().unwrap_or(0) - amount as i128;
                    match ledger.subtract_value(&RELAYER, account, amount) {
                        Ok(balance) => {
                            prop_assert!(expected >= 0);
                            prop_assert_eq!(balance as i128, expected);
                            model.insert(account, expected);
                        }
                        Err(Error::InsufficientBalance { balance, requested, .. }) => {
                            prop_assert!(expected < 0);
                            prop_assert_eq!(balance, before);
                            prop_assert_eq!(requested, amount);
                            prop_assert_eq!(ledger.user_balance(&account), before);
                        }
                        Err(e) => prop_assert!(false, "unexpected error: {}", e),
                    }
                }
            }
        }

        for (account, balance) in model {
            prop_assert_eq!(ledger.user_balance(&account) as i128, balance);
        }
    }

    /// Property: Adding then subtracting the same amount restores the balance
    #[test]
    fn prop_add_subtract_roundtrip(
        account in address_strategy(),
        initial in 0u128..u64::MAX as u128,
        amount in 0u128..u64::MAX as u128,
    ) {
        let mut ledger = relayer_ledger();
        ledger.add_value(&RELAYER, account, initial).unwrap();

        ledger.add_value(&RELAYER, account, amount).unwrap();
        let balance = ledger.subtract_value(&RELAYER, account, amount).unwrap();
        prop_assert_eq!(balance, initial);
    }

    /// Property: Callers without the role are rejected and nothing changes
    #[test]
    fn prop_role_gating(caller in address_strategy(), account in address_strategy(), amount in 1u128..1_000) {
        prop_assume!(caller != RELAYER);
        let mut ledger = relayer_ledger();
        ledger.add_value(&RELAYER, account, 5_000).unwrap();

        let added = ledger.add_value(&caller, account, amount);
        let is_unauthorized = matches!(added, Err(Error::Unauthorized { .. }));
        prop_assert!(is_unauthorized);
        let subtracted = ledger.subtract_value(&caller, account, amount);
        let is_unauthorized = matches!(subtracted, Err(Error::Unauthorized { .. }));
        prop_assert!(is_unauthorized);
        prop_assert_eq!(ledger.user_balance(&account), 5_000);

        prop_assume!(caller != OWNER);
        prop_assert!(ledger.toggle_adder(&caller, caller).is_err());
        prop_assert!(!ledger.is_adder(&caller));
    }

    /// Property: The unlock watermark is monotonic and bounded, whatever
    /// order the clock readings arrive in
    #[test]
    fn prop_unlock_monotonic_and_bounded(
        curve in curve_strategy(),
        start in 0u64..2_000_000_000,
        readings in prop::collection::vec(0u64..4_000_000_000, 1..50),
    ) {
        let mut schedule = VestingSchedule::new(OWNER, curve);
        schedule.start_farming(&OWNER, start).unwrap();

        let mut previous = 0;
        for now in readings {
            let unlocked = schedule.unlock_asset(now).unwrap();
            prop_assert!(unlocked >= previous);
            prop_assert!(unlocked <= schedule.total_locked());
            previous = unlocked;
        }
    }

    /// Property: Curves are non-decreasing in elapsed time and never exceed
    /// their bound
    #[test]
    fn prop_curve_non_decreasing(curve in curve_strategy(), t1 in 0u64..u32::MAX as u64, dt in 0u64..u32::MAX as u64) {
        let early = curve.unlocked_after(t1).unwrap();
        let late = curve.unlocked_after(t1 + dt).unwrap();
        prop_assert!(early <= late);
        prop_assert!(late <= curve.total_locked());
    }

    /// Property: Claims never exceed what was unlocked
    #[test]
    fn prop_claims_bounded_by_unlocked(
        curve in curve_strategy(),
        steps in prop::collection::vec((0u64..10_000_000, any::<u128>()), 1..30),
    ) {
        let mut schedule = VestingSchedule::new(OWNER, curve);
        schedule.start_farming(&OWNER, 0).unwrap();

        let mut now = 0u64;
        for (advance, request) in steps {
            now += advance;
            schedule.unlock_asset(now).unwrap();
            let amount = request % (schedule.claimable() + 1);
            schedule.claim(&OWNER, amount).unwrap();
            prop_assert!(schedule.total_claimed() <= schedule.total_unlocked());
        }

        let too_much = schedule.claimable() + 1;
        let exceeds = matches!(schedule.claim(&OWNER, too_much), Err(Error::ExceedsClaimable { .. }));
        prop_assert!(exceeds);
    }

    /// Property: A recorded claim checks true against itself, and altering
    /// any single checked field is reported as that field
    #[test]
    fn prop_swap_audit_consistency(claim in claim_strategy(), field in 0usize..5) {
        let mut auditor = SwapAuditor::new();
        let id = SwapId::from(Uuid::new_v4());
        prop_assert_eq!(auditor.add_swap(id, claim.clone()).unwrap(), Recorded::New);

        prop_assert!(auditor
            .check_swap(&id, &claim.sender, &claim.source_chain, &claim.receiver, &claim.destination_chain, claim.amount)
            .unwrap());

        let mut altered = claim.clone();
        let name = match field {
            0 => {
                altered.sender = Address::from_bytes(claim.sender.as_bytes().map(|b| !b));
                "sender"
            }
            1 => {
                altered.source_chain.push('x');
                "source_chain"
            }
            2 => {
                altered.receiver = Address::from_bytes(claim.receiver.as_bytes().map(|b| !b));
                "receiver"
            }
            3 => {
                altered.destination_chain.push('x');
                "destination_chain"
            }
            _ => {
                altered.amount = claim.amount - 1;
                "amount"
            }
        };

        let result = auditor.check_swap(
            &id,
            &altered.sender,
            &altered.source_chain,
            &altered.receiver,
            &altered.destination_chain,
            altered.amount,
        );
        match result {
            Err(Error::SwapMismatch { field, .. }) => prop_assert_eq!(field, name),
            other => prop_assert!(false, "expected mismatch on {}, got {:?}", name, other),
        }

        // Conflicting resubmission is rejected and the record is unchanged
        let is_duplicate = matches!(auditor.add_swap(id, altered), Err(Error::DuplicateSwap(_)));
        prop_assert!(is_duplicate);
        prop_assert_eq!(auditor.get_swap(&id), Some(&claim));
    }

    /// Property: Every recorded swap has a verifying inclusion proof
    #[test]
    fn prop_audit_proofs_verify(claims in prop::collection::vec(claim_strategy(), 1..40)) {
        let mut auditor = SwapAuditor::new();
        let ids: Vec<SwapId> = claims
            .into_iter()
            .map(|claim| {
                let id = SwapId::from(Uuid::new_v4());
                auditor.add_swap(id, claim).unwrap();
                id
            })
            .collect();

        let root = auditor.audit_root();
        for id in ids {
            let proof = auditor.audit_proof(&id).unwrap();
            prop_assert!(proof.verify());
            prop_assert_eq!(proof.root, root);
        }
    }
}

#[cfg(test)]
mod integration_tests {
    use super::*;

    const YEAR: u64 = 31_536_000;

    #[tokio::test]
    async fn test_full_bridge_lifecycle() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.data_dir = temp_dir.path().to_path_buf();
        config.owner = OWNER;

        let clock = ManualClock::new(1_700_000_000);
        let bridge = Bridge::open_with_clock(config.clone(), Arc::new(clock.clone()))
            .await
            .unwrap();

        // 1. Grant the relayer both roles
        bridge.toggle_adder(OWNER, RELAYER).await.unwrap();
        bridge.toggle_subtractor(OWNER, RELAYER).await.unwrap();

        // 2. Source chain lock observed: record the swap
        let user = Address::from_low_u64(42);
        let id = SwapId::generate();
        let claim = SwapClaim {
            sender: user,
            source_chain: "ethereum".to_string(),
            receiver: user,
            destination_chain: "bsc".to_string(),
            amount: 1_000,
            source_tx: "0x01".to_string(),
            destination_tx: String::new(),
        };
        assert_eq!(bridge.add_swap(id, claim.clone()).await.unwrap(), Recorded::New);

        // 3. Destination side validates before crediting
        assert!(bridge
            .check_swap(id, user, "ethereum", user, "bsc", 1_000)
            .await
            .unwrap());
        assert_eq!(bridge.add_value(RELAYER, user, 1_000).await.unwrap(), 1_000);

        // 4. A forged amount is refused
        assert!(matches!(
            bridge.check_swap(id, user, "ethereum", user, "bsc", 9_999).await,
            Err(Error::SwapMismatch { field: "amount", .. })
        ));

        // 5. Rewards vest over a year
        let curve: Curve = CurvedCurve::new(26_499_999_999_995, 2_100_000).unwrap().into();
        bridge.register_pool("farm", OWNER, curve).await.unwrap();
        bridge.start_farming("farm", OWNER).await.unwrap();
        clock.advance(YEAR);
        let unlocked = bridge.unlock_asset("farm").await.unwrap();
        assert!(unlocked.to_string().starts_with("1499844"));

        // 6. Withdraw
        assert_eq!(bridge.subtract_value(RELAYER, user, 400).await.unwrap(), 600);
        let root = bridge.audit_root().await.unwrap();
        bridge.shutdown().await.unwrap();

        // 7. Everything survives a restart
        let bridge = Bridge::open_with_clock(config, Arc::new(clock.clone()))
            .await
            .unwrap();
        assert_eq!(bridge.user_balance(user).await.unwrap(), 600);
        assert_eq!(bridge.get_swap(id).await.unwrap(), Some(claim));
        assert_eq!(bridge.audit_root().await.unwrap(), root);
        assert_eq!(bridge.total_unlocked("farm").await.unwrap(), unlocked);
        bridge.shutdown().await.unwrap();
    }
}
