use deposit::common::RecordKey;
use deposit::store::flat::FlatAdapter;
use deposit::store::{AdapterKind, StorageAdapter};
use deposit_int_test::test_util::{ids, run_on_both};
use serde_json::json;

fn flat(ctx: &deposit_int_test::test_util::TestContext) -> Option<FlatAdapter> {
    match ctx.kind() {
        AdapterKind::Flat => ctx.deposit().adapter().as_flat().cloned(),
        AdapterKind::Indexed => None,
    }
}

#[test]
fn test_corrupted_entry_is_skipped_and_purged() {
    run_on_both(|ctx| {
        let Some(adapter) = flat(&ctx) else {
            return Ok(());
        };
        let deposit = ctx.deposit();
        deposit.put("users", json!({"id": 1, "name": "ok"}), None)?;
        deposit.put("users", json!({"id": 3, "name": "also ok"}), None)?;

        let broken = adapter.entry_key("users", &RecordKey::from(2));
        adapter.store().set_item(&broken, "{not json")?;

        assert_eq!(ids(&deposit.get_all("users")?), vec![json!(1), json!(3)]);
        assert_eq!(adapter.store().get_item(&broken)?, None);
        Ok(())
    });
}

#[test]
fn test_non_object_entry_reads_as_absent() {
    run_on_both(|ctx| {
        let Some(adapter) = flat(&ctx) else {
            return Ok(());
        };
        let deposit = ctx.deposit();
        let key = adapter.entry_key("users", &RecordKey::from("scalar"));
        adapter.store().set_item(&key, "42")?;

        assert_eq!(deposit.get("users", "scalar")?, None);
        assert_eq!(adapter.store().get_item(&key)?, None);
        assert_eq!(adapter.count("users")?, 0);
        Ok(())
    });
}

#[test]
fn test_foreign_entries_are_ignored() {
    run_on_both(|ctx| {
        let Some(adapter) = flat(&ctx) else {
            return Ok(());
        };
        let deposit = ctx.deposit();
        adapter.store().set_item("other-app:1:users:1", "{\"id\":1}")?;

        assert!(deposit.get_all("users")?.is_empty());
        Ok(())
    });
}
