use deposit::common::{Group, RecordKey, SortOrder};
use deposit::errors::{DepositError, ErrorKind};
use deposit::store::AdapterKind;
use deposit_int_test::test_util::{ids, items, run_on_both};
use serde_json::{json, Value};
use std::time::Duration;

/// Groups by `field` with plain vectors, first-seen order.
fn group_manually(data: &[Value], field: &str) -> Vec<Group> {
    let mut groups: Vec<Group> = Vec::new();
    for record in data {
        let key = record.get(field).cloned().unwrap_or(Value::Null);
        match groups.iter_mut().find(|group| group.key == key) {
            Some(group) => group.values.push(record.clone()),
            None => groups.push(Group {
                key,
                values: vec![record.clone()],
            }),
        }
    }
    groups
}

#[test]
fn test_round_trip() {
    run_on_both(|ctx| {
        let deposit = ctx.deposit();
        deposit.put("users", json!({"id": 1, "name": "A"}), None)?;
        assert_eq!(deposit.get("users", 1)?, Some(json!({"id": 1, "name": "A"})));
        Ok(())
    });
}

#[test]
fn test_ttl_with_simulated_clock() {
    run_on_both(|ctx| {
        let deposit = ctx.deposit();
        deposit.put("users", json!({"id": 2, "name": "B"}), Some(Duration::from_secs(10)))?;
        ctx.clock().advance(Duration::from_secs(11));
        assert_eq!(deposit.get("users", 2)?, None);
        assert_eq!(deposit.get_or("users", 2, json!({}))?, json!({}));
        Ok(())
    });
}

#[test]
fn test_order_by_then_limit() {
    run_on_both(|ctx| {
        let deposit = ctx.deposit();
        deposit.bulk_put(
            "items",
            vec![
                json!({"id": 1, "price": 10}),
                json!({"id": 2, "price": 5}),
                json!({"id": 3, "price": 20}),
            ],
            None,
        )?;
        let cheapest = deposit
            .query("items")
            .order_by("price", SortOrder::Ascending)
            .limit(2)
            .to_vec()?;
        assert_eq!(
            cheapest,
            vec![json!({"id": 2, "price": 5}), json!({"id": 1, "price": 10})]
        );
        Ok(())
    });
}

#[test]
fn test_aborted_transfer_changes_nothing() {
    run_on_both(|ctx| {
        let deposit = ctx.deposit();
        deposit.put("accounts", json!({"id": 1, "balance": 100}), None)?;
        deposit.put("ledger", json!({"id": 1, "entries": 0}), None)?;

        let result = deposit.transaction(
            &["accounts", "ledger"],
            |tx| {
                let account = tx
                    .table_mut("accounts")?
                    .get_mut(&RecordKey::from(1))
                    .ok_or_else(|| DepositError::new("missing", ErrorKind::InvalidOperation))?;
                account["balance"] = json!(0);
                tx.upsert("ledger", json!({"id": 2, "amount": 100}))?;
                Err::<(), _>(DepositError::new("interrupted", ErrorKind::InternalError))
            },
            None,
        );

        let err = result.unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::TransactionCallbackFailed);
        assert_eq!(deposit.get_all("accounts")?, vec![json!({"id": 1, "balance": 100})]);
        assert_eq!(deposit.get_all("ledger")?, vec![json!({"id": 1, "entries": 0})]);
        if ctx.kind() == AdapterKind::Indexed {
            assert!(deposit.adapter().supports_atomic_transactions());
        }
        Ok(())
    });
}

#[test]
fn test_group_by_matches_to_grouped() {
    run_on_both(|ctx| {
        let deposit = ctx.deposit();
        deposit.bulk_put("items", items(), None)?;

        let grouped = deposit.query("items").to_grouped("category")?;
        let step: Vec<Group> =
            serde_json::from_value(json!(deposit.query("items").group_by("category").to_vec()?))?;
        let manual = group_manually(&deposit.get_all("items")?, "category");

        assert_eq!(grouped, manual);
        assert_eq!(step, manual);
        assert_eq!(ids(&grouped[0].values), vec![json!(1), json!(3)]);
        Ok(())
    });
}
