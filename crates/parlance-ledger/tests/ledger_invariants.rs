// SPDX-FileCopyrightText: 2026 Parlance Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Property tests: any sequence of ledger operations keeps the balance
//! non-negative and equal to the sum of its transaction log.

use std::sync::Arc;

use parlance_core::types::UserId;
use parlance_ledger::CreditLedger;
use parlance_test_utils::MemoryStore;
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Op {
    Charge(i64),
    TopUp(i64),
    Refresh,
    Allowance(i64),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => (-2i64..15).prop_map(Op::Charge),
        2 => (1i64..20).prop_map(Op::TopUp),
        1 => Just(Op::Refresh),
        1 => (0i64..30).prop_map(Op::Allowance),
    ]
}

proptest! {
    #[test]
    fn balance_matches_log(initial in 0i64..50, ops in prop::collection::vec(op(), 1..40)) {
        let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
        rt.block_on(async {
            let ledger = CreditLedger::new(Arc::new(MemoryStore::new()));
            let user = UserId("prop".into());
            ledger.initialize(&user, initial).await.unwrap();

            for op in ops {
                let before = ledger.balance(&user).await.unwrap();
                match op {
                    Op::Charge(amount) => {
                        let result = ledger.charge(&user, amount, "turn", None).await;
                        assert_eq!(result.is_ok(), amount > 0 && amount <= before);
                    }
                    Op::TopUp(amount) => {
                        ledger.top_up(&user, amount, "purchase", None).await.unwrap();
                    }
                    Op::Refresh => {
                        ledger.refresh_monthly(&user).await.unwrap();
                    }
                    Op::Allowance(allowance) => {
                        ledger.update_allowance(&user, allowance).await.unwrap();
                    }
                }
                let balance = ledger.verify_balance(&user).await.unwrap();
                assert!(balance >= 0);
            }
        });
    }
}
