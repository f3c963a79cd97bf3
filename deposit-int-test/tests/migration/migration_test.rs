use deposit::deposit::Deposit;
use deposit::errors::{DepositError, DepositResult, ErrorKind};
use deposit::schema::TableSchema;
use deposit::store::indexed::{migration, IndexedFactory};
use deposit::store::AdapterKind;
use deposit_int_test::test_util::ids;
use serde_json::json;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

fn open_v1(factory: &IndexedFactory) -> DepositResult<Deposit> {
    let deposit = Deposit::builder()
        .namespace("shop")
        .adapter_kind(AdapterKind::Indexed)
        .indexed_factory(factory.clone())
        .table("users", TableSchema::new("id"))
        .open()?;
    deposit.bulk_put(
        "users",
        vec![
            json!({"id": 1, "name": "Ada Lovelace"}),
            json!({"id": 2, "name": "Alan Turing"}),
        ],
        None,
    )?;
    Ok(deposit)
}

#[test]
fn test_upgrade_adds_tables_and_runs_migration() {
    let factory = IndexedFactory::new();
    open_v1(&factory).unwrap().close().unwrap();

    let calls = Arc::new(AtomicU32::new(0));
    let seen = calls.clone();
    let deposit = Deposit::builder()
        .namespace("shop")
        .schema_version(2)
        .adapter_kind(AdapterKind::Indexed)
        .indexed_factory(factory.clone())
        .table("users", TableSchema::new("id").index("last_name"))
        .table("orders", TableSchema::new("order_id").index("user"))
        .migration(migration(move |_db, old, new, tx, _schema| {
            seen.fetch_add(1, Ordering::SeqCst);
            assert_eq!((old, new), (1, 2));
            for (_, mut user) in tx.get_all("users")? {
                let last = user["name"]
                    .as_str()
                    .and_then(|name| name.split_whitespace().last())
                    .unwrap_or_default()
                    .to_string();
                user["last_name"] = json!(last);
                tx.put("users", user)?;
            }
            Ok(())
        }))
        .open()
        .unwrap();

    deposit.connect().unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(factory.version_of("shop"), Some(2));

    let turing = deposit.query("users").equals("last_name", "Turing").to_vec().unwrap();
    assert_eq!(ids(&turing), vec![json!(2)]);

    let adapter = deposit.adapter().as_indexed().cloned().unwrap();
    assert_eq!(adapter.index_names("users").unwrap(), vec!["last_name".to_string()]);
    deposit.put("orders", json!({"order_id": "o-1", "user": 2}), None).unwrap();
    assert_eq!(deposit.count("orders").unwrap(), 1);
    deposit.close().unwrap();
}

#[test]
fn test_reopening_at_same_version_skips_migration() {
    let factory = IndexedFactory::new();
    open_v1(&factory).unwrap().close().unwrap();

    let deposit = Deposit::builder()
        .namespace("shop")
        .adapter_kind(AdapterKind::Indexed)
        .indexed_factory(factory.clone())
        .table("users", TableSchema::new("id"))
        .migration(migration(|_, _, _, _, _| {
            Err(DepositError::new("must not run", ErrorKind::InternalError))
        }))
        .open()
        .unwrap();
    assert_eq!(deposit.count("users").unwrap(), 2);
}

#[test]
fn test_failed_migration_keeps_previous_version() {
    let factory = IndexedFactory::new();
    open_v1(&factory).unwrap().close().unwrap();

    let deposit = Deposit::builder()
        .namespace("shop")
        .schema_version(3)
        .adapter_kind(AdapterKind::Indexed)
        .indexed_factory(factory.clone())
        .table("users", TableSchema::new("id"))
        .table("audit", TableSchema::new("id"))
        .migration(migration(|_, _, _, tx, _| {
            tx.clear("users")?;
            Err(DepositError::new("bad data", ErrorKind::InvalidRecord))
        }))
        .open()
        .unwrap();

    let err = deposit.connect().unwrap_err();
    assert_eq!(err.kind(), &ErrorKind::MigrationError);
    assert_eq!(err.cause().map(|cause| cause.kind()), Some(&ErrorKind::InvalidRecord));
    assert_eq!(factory.version_of("shop"), Some(1));

    let previous = Deposit::builder()
        .namespace("shop")
        .adapter_kind(AdapterKind::Indexed)
        .indexed_factory(factory.clone())
        .table("users", TableSchema::new("id"))
        .open()
        .unwrap();
    assert_eq!(previous.count("users").unwrap(), 2);
}

#[test]
fn test_opening_lower_version_fails() {
    let factory = IndexedFactory::new();
    let deposit = Deposit::builder()
        .namespace("shop")
        .schema_version(5)
        .adapter_kind(AdapterKind::Indexed)
        .indexed_factory(factory.clone())
        .table("users", TableSchema::new("id"))
        .open()
        .unwrap();
    deposit.connect().unwrap();

    let older = Deposit::builder()
        .namespace("shop")
        .schema_version(4)
        .adapter_kind(AdapterKind::Indexed)
        .indexed_factory(factory.clone())
        .table("users", TableSchema::new("id"))
        .open()
        .unwrap();
    let err = older.get_all("users").unwrap_err();
    assert_eq!(err.kind(), &ErrorKind::VersionError);
    assert_eq!(factory.version_of("shop"), Some(5));
}

#[test]
fn test_redundant_indexes_are_not_fatal() {
    let factory = IndexedFactory::new();
    let deposit = Deposit::builder()
        .namespace("redundant")
        .adapter_kind(AdapterKind::Indexed)
        .indexed_factory(factory)
        .table(
            "users",
            TableSchema::new("id").index("city").index("city").index("id"),
        )
        .table("items", TableSchema::new("sku"))
        .open()
        .unwrap();

    deposit.put("users", json!({"id": 1, "city": "Oslo"}), None).unwrap();
    deposit.put("items", json!({"sku": "A"}), None).unwrap();
    assert_eq!(deposit.count("users").unwrap(), 1);
    assert_eq!(deposit.count("items").unwrap(), 1);

    let adapter = deposit.adapter().as_indexed().cloned().unwrap();
    assert_eq!(adapter.index_names("users").unwrap(), vec!["city".to_string()]);
}

#[test]
fn test_deleted_database_starts_empty() {
    let factory = IndexedFactory::new();
    let deposit = open_v1(&factory).unwrap();
    assert!(factory.delete_database("shop"));
    assert!(deposit.get_all("users").is_err());

    let fresh = Deposit::builder()
        .namespace("shop")
        .adapter_kind(AdapterKind::Indexed)
        .indexed_factory(factory.clone())
        .table("users", TableSchema::new("id"))
        .open()
        .unwrap();
    assert_eq!(fresh.count("users").unwrap(), 0);
    assert_eq!(factory.database_names(), vec!["shop".to_string()]);
}
