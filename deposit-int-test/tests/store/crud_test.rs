use deposit::common::{same_record, RecordKey};
use deposit::errors::{DepositResult, ErrorKind};
use deposit::store::AdapterKind;
use deposit_int_test::test_util::{ids, items, run_on_both};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct User {
    id: u32,
    name: String,
    city: String,
}

#[test]
fn test_put_get_round_trip() {
    run_on_both(|ctx| {
        let deposit = ctx.deposit();
        let record = json!({
            "id": 10,
            "name": "Ada",
            "city": "London",
            "address": {"street": "Main", "zip": "N1"},
            "tags": ["admin", "ops"],
            "active": true,
            "score": 4.5
        });
        deposit.put("users", record.clone(), None)?;
        assert_eq!(deposit.get("users", 10)?, Some(record));
        Ok(())
    });
}

#[test]
fn test_round_trip_with_ttl() {
    run_on_both(|ctx| {
        let deposit = ctx.deposit();
        let record = json!({"id": "s-1", "token": "abc", "scopes": ["read"]});
        deposit.put("users", record.clone(), Some(Duration::from_secs(60)))?;
        let read = deposit.get("users", "s-1")?;
        assert!(read.map(|read| same_record(&read, &record)).unwrap_or(false));
        Ok(())
    });
}

#[test]
fn test_put_replaces_existing_key() {
    run_on_both(|ctx| {
        let deposit = ctx.deposit();
        deposit.put("users", json!({"id": "u1", "name": "Old"}), None)?;
        deposit.put("users", json!({"id": "u1", "name": "New"}), None)?;
        assert_eq!(deposit.count("users")?, 1);
        assert_eq!(deposit.get("users", "u1")?, Some(json!({"id": "u1", "name": "New"})));
        Ok(())
    });
}

#[test]
fn test_numeric_and_text_keys() {
    run_on_both(|ctx| {
        let deposit = ctx.deposit();
        deposit.put("users", json!({"id": 1, "name": "number"}), None)?;
        deposit.put("users", json!({"id": "1", "name": "text"}), None)?;
        match ctx.kind() {
            AdapterKind::Indexed => {
                assert_eq!(deposit.count("users")?, 2);
                assert_eq!(deposit.get("users", 1)?.map(|u| u["name"].clone()), Some(json!("number")));
            }
            // the flat layout keys entries by the printed key
            AdapterKind::Flat => {
                assert_eq!(deposit.count("users")?, 1);
                assert_eq!(deposit.get("users", 1)?.map(|u| u["name"].clone()), Some(json!("text")));
            }
        }
        assert_eq!(deposit.get("users", "1")?.map(|u| u["name"].clone()), Some(json!("text")));
        Ok(())
    });
}

#[test]
fn test_get_or_returns_default() {
    run_on_both(|ctx| {
        let deposit = ctx.deposit();
        let fallback = json!({"id": 0, "name": "guest"});
        assert_eq!(deposit.get_or("users", 404, fallback.clone())?, fallback);
        Ok(())
    });
}

#[test]
fn test_typed_records() {
    run_on_both(|ctx| {
        let deposit = ctx.deposit();
        let users = vec![
            User { id: 1, name: "Ada".into(), city: "London".into() },
            User { id: 2, name: "Linus".into(), city: "Helsinki".into() },
        ];
        for user in &users {
            deposit.put_entity("users", user, None)?;
        }
        let read: Option<User> = deposit.get_as("users", 2)?;
        assert_eq!(read.as_ref(), users.get(1));

        let all: Vec<User> = deposit.query("users").to_vec_of()?;
        assert_eq!(all, users);
        Ok(())
    });
}

#[test]
fn test_bulk_put_and_delete() {
    run_on_both(|ctx| {
        let deposit = ctx.deposit();
        deposit.bulk_put("items", items(), None)?;
        assert_eq!(ids(&deposit.get_all("items")?), vec![json!(1), json!(2), json!(3)]);

        deposit.bulk_delete("items", [1, 3])?;
        assert_eq!(ids(&deposit.get_all("items")?), vec![json!(2)]);

        deposit.delete("items", 2)?;
        deposit.delete("items", 2)?;
        assert_eq!(deposit.count("items")?, 0);
        Ok(())
    });
}

#[test]
fn test_clear_only_touches_one_table() {
    run_on_both(|ctx| {
        let deposit = ctx.deposit();
        deposit.bulk_put("items", items(), None)?;
        deposit.put("users", json!({"id": 1}), None)?;
        deposit.clear("items")?;
        assert_eq!(deposit.count("items")?, 0);
        assert_eq!(deposit.count("users")?, 1);
        Ok(())
    });
}

#[test]
fn test_write_errors() {
    run_on_both(|ctx| {
        let deposit = ctx.deposit();

        let err = deposit.put("users", json!({"name": "no key"}), None).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::MissingPrimaryKey);

        let err = deposit.put("users", json!({"id": {"nested": 1}}), None).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::InvalidKey);

        let err = deposit.put("orders", json!({"id": 1}), None).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::TableNotFound);

        let err = deposit.get_all("orders").unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::TableNotFound);
        Ok(())
    });
}

#[test]
fn test_bulk_put_with_missing_key() {
    run_on_both(|ctx| {
        let deposit = ctx.deposit();
        let err = deposit
            .bulk_put("items", vec![json!({"id": 1}), json!({"price": 3})], None)
            .unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::MissingPrimaryKey);
        // keys are checked before anything is written
        assert_eq!(deposit.count("items")?, 0);
        Ok(())
    });
}

#[test]
fn test_secondary_index_lookup() {
    run_on_both(|ctx| -> DepositResult<()> {
        if ctx.kind() != AdapterKind::Indexed {
            return Ok(());
        }
        let deposit = ctx.deposit();
        deposit.bulk_put("items", items(), None)?;
        let adapter = deposit.adapter().as_indexed().cloned();
        if let Some(adapter) = adapter {
            assert_eq!(adapter.index_names("items")?, vec!["category".to_string()]);
            let tools = adapter.get_all_by_index("items", "category", &RecordKey::from("tools"))?;
            assert_eq!(ids(&tools), vec![json!(1), json!(3)]);

            deposit.delete("items", 1)?;
            let tools = adapter.get_all_by_index("items", "category", &RecordKey::from("tools"))?;
            assert_eq!(ids(&tools), vec![json!(3)]);
        }
        Ok(())
    });
}

#[test]
fn test_closed_store_rejects_operations() {
    run_on_both(|ctx| {
        let deposit = ctx.deposit();
        deposit.put("users", json!({"id": 1}), None)?;
        deposit.close()?;
        assert!(deposit.is_closed());
        for err in [
            deposit.get("users", 1).unwrap_err(),
            deposit.put("users", json!({"id": 2}), None).unwrap_err(),
            deposit.count("users").unwrap_err(),
        ] {
            assert_eq!(err.kind(), &ErrorKind::StoreAlreadyClosed);
        }
        Ok(())
    });
}
