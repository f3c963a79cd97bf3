use deposit::common::RecordKey;
use deposit::errors::{DepositError, DepositResult, ErrorKind};
use deposit::store::AdapterKind;
use deposit::transaction::TableSnapshots;
use deposit_int_test::test_util::{ids, run_on_both};
use serde_json::{json, Value};
use std::time::Duration;

fn seed(ctx: &deposit_int_test::test_util::TestContext) -> DepositResult<()> {
    let deposit = ctx.deposit();
    deposit.bulk_put(
        "accounts",
        vec![json!({"id": 1, "balance": 100}), json!({"id": 2, "balance": 50})],
        None,
    )?;
    deposit.put("ledger", json!({"id": "opening", "amount": 150}), None)
}

fn transfer(tx: &mut TableSnapshots, from: i64, to: i64, amount: i64) -> DepositResult<()> {
    let accounts = tx.table_mut("accounts")?;
    let debit = accounts.get_mut(&RecordKey::from(from)).ok_or_else(|| {
        DepositError::new("Unknown source account", ErrorKind::InvalidOperation)
    })?;
    let balance = debit["balance"].as_i64().unwrap_or(0);
    if balance < amount {
        return Err(DepositError::new("Insufficient funds", ErrorKind::InvalidOperation));
    }
    debit["balance"] = json!(balance - amount);

    let credit = accounts.get_mut(&RecordKey::from(to)).ok_or_else(|| {
        DepositError::new("Unknown target account", ErrorKind::InvalidOperation)
    })?;
    let balance = credit["balance"].as_i64().unwrap_or(0);
    credit["balance"] = json!(balance + amount);

    tx.upsert(
        "ledger",
        json!({"id": format!("{}-{}-{}", from, to, amount), "amount": amount}),
    )
}

fn balances(ctx: &deposit_int_test::test_util::TestContext) -> DepositResult<Vec<Value>> {
    Ok(ctx
        .deposit()
        .get_all("accounts")?
        .into_iter()
        .map(|account| account["balance"].clone())
        .collect())
}

#[test]
fn test_transaction_commits_every_table() {
    run_on_both(|ctx| {
        seed(&ctx)?;
        let deposit = ctx.deposit();
        deposit.transaction(&["accounts", "ledger"], |tx| transfer(tx, 1, 2, 30), None)?;

        assert_eq!(balances(&ctx)?, vec![json!(70), json!(80)]);
        assert_eq!(
            ids(&deposit.get_all("ledger")?),
            vec![json!("1-2-30"), json!("opening")]
        );
        Ok(())
    });
}

#[test]
fn test_transaction_returns_callback_value() {
    run_on_both(|ctx| {
        seed(&ctx)?;
        let total = ctx.deposit().transaction(
            &["accounts"],
            |tx| {
                Ok(tx
                    .table("accounts")?
                    .records()
                    .iter()
                    .filter_map(|account| account["balance"].as_i64())
                    .sum::<i64>())
            },
            None,
        )?;
        assert_eq!(total, 150);
        Ok(())
    });
}

#[test]
fn test_failed_callback_leaves_tables_unchanged() {
    run_on_both(|ctx| {
        seed(&ctx)?;
        let deposit = ctx.deposit();
        let before_accounts = deposit.get_all("accounts")?;
        let before_ledger = deposit.get_all("ledger")?;

        let err = deposit
            .transaction(
                &["accounts", "ledger"],
                |tx| {
                    transfer(tx, 1, 2, 40)?;
                    // second transfer overdraws account 2 after the first was staged
                    transfer(tx, 2, 1, 500)
                },
                None,
            )
            .unwrap_err();

        assert_eq!(err.kind(), &ErrorKind::TransactionCallbackFailed);
        assert!(err.message().contains("accounts, ledger"));
        assert_eq!(err.cause().map(|cause| cause.message()), Some("Insufficient funds"));
        assert_eq!(deposit.get_all("accounts")?, before_accounts);
        assert_eq!(deposit.get_all("ledger")?, before_ledger);
        Ok(())
    });
}

#[test]
fn test_transaction_on_undeclared_table() {
    run_on_both(|ctx| {
        let err = ctx
            .deposit()
            .transaction(&["accounts", "orders"], |_| Ok(()), None)
            .unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::TableNotFound);
        Ok(())
    });
}

#[test]
fn test_snapshot_outside_scope_is_rejected() {
    run_on_both(|ctx| {
        let err = ctx
            .deposit()
            .transaction(&["accounts"], |tx| tx.upsert("ledger", json!({"id": 1})), None)
            .unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::TransactionCallbackFailed);
        assert_eq!(err.root_cause().kind(), &ErrorKind::InvalidOperation);
        Ok(())
    });
}

#[test]
fn test_transaction_ttl_applies_to_written_records() {
    run_on_both(|ctx| {
        seed(&ctx)?;
        let deposit = ctx.deposit();
        let clock = ctx.clock();
        deposit.transaction(
            &["ledger"],
            |tx| tx.upsert("ledger", json!({"id": "hold", "amount": 5})),
            Some(Duration::from_secs(30)),
        )?;
        assert_eq!(deposit.count("ledger")?, 2);

        clock.advance(Duration::from_secs(30));
        assert_eq!(deposit.count("ledger")?, 0);
        assert_eq!(deposit.count("accounts")?, 2);
        Ok(())
    });
}

#[test]
fn test_transaction_can_delete_and_clear() {
    run_on_both(|ctx| {
        seed(&ctx)?;
        let deposit = ctx.deposit();
        deposit.transaction(
            &["accounts", "ledger"],
            |tx| {
                tx.remove("accounts", 2)?;
                tx.table_mut("ledger")?.clear();
                Ok(())
            },
            None,
        )?;
        assert_eq!(ids(&deposit.get_all("accounts")?), vec![json!(1)]);
        assert_eq!(deposit.count("ledger")?, 0);
        Ok(())
    });
}

#[test]
fn test_only_indexed_transactions_are_atomic() {
    run_on_both(|ctx| {
        let atomic = ctx.deposit().adapter().supports_atomic_transactions();
        assert_eq!(atomic, ctx.kind() == AdapterKind::Indexed);
        Ok(())
    });
}

#[test]
fn test_backend_abort_is_reported_separately() {
    run_on_both(|ctx| -> DepositResult<()> {
        if ctx.kind() != AdapterKind::Indexed {
            return Ok(());
        }
        seed(&ctx)?;
        let deposit = ctx.deposit();
        let adapter = match deposit.adapter().as_indexed() {
            Some(adapter) => adapter.clone(),
            None => return Ok(()),
        };

        let err = deposit
            .transaction(
                &["accounts"],
                |tx| {
                    tx.upsert("accounts", json!({"id": 3, "balance": 1}))?;
                    adapter.database()?.close();
                    Ok(())
                },
                None,
            )
            .unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::TransactionAborted);
        Ok(())
    });
}

#[test]
fn test_nested_write_on_scoped_table_is_refused() {
    run_on_both(|ctx| -> DepositResult<()> {
        if ctx.kind() != AdapterKind::Indexed {
            return Ok(());
        }
        seed(&ctx)?;
        let deposit = ctx.deposit();
        let inner = deposit.clone();

        let err = deposit
            .transaction(
                &["accounts"],
                |_| inner.put("accounts", json!({"id": 3, "balance": 5}), None),
                None,
            )
            .unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::TransactionCallbackFailed);
        assert_eq!(err.root_cause().kind(), &ErrorKind::InvalidOperation);
        assert_eq!(deposit.count("accounts")?, 2);

        // tables outside the scope stay writable
        deposit.transaction(
            &["accounts"],
            |_| inner.put("ledger", json!({"id": "nested", "amount": 0}), None),
            None,
        )?;
        assert!(deposit.get("ledger", "nested")?.is_some());
        assert_eq!(deposit.count("accounts")?, 2);
        Ok(())
    });
}
