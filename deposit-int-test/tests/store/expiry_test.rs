use deposit_int_test::test_util::{ids, run_on_both};
use serde_json::json;
use std::time::Duration;

#[test]
fn test_record_visible_until_ttl_elapses() {
    run_on_both(|ctx| {
        let deposit = ctx.deposit();
        let clock = ctx.clock();
        deposit.put("users", json!({"id": 1, "name": "temp"}), Some(Duration::from_secs(10)))?;

        clock.advance(Duration::from_millis(9_999));
        assert_eq!(deposit.get("users", 1)?, Some(json!({"id": 1, "name": "temp"})));
        assert_eq!(deposit.count("users")?, 1);

        clock.advance(Duration::from_millis(1));
        assert_eq!(deposit.get("users", 1)?, None);
        assert_eq!(deposit.get_or("users", 1, json!("gone"))?, json!("gone"));
        assert!(deposit.get_all("users")?.is_empty());
        Ok(())
    });
}

#[test]
fn test_expired_records_leave_scans() {
    run_on_both(|ctx| {
        let deposit = ctx.deposit();
        let clock = ctx.clock();
        deposit.put("users", json!({"id": 1}), Some(Duration::from_secs(5)))?;
        deposit.put("users", json!({"id": 2}), None)?;
        deposit.put("users", json!({"id": 3}), Some(Duration::from_secs(60)))?;

        clock.advance(Duration::from_secs(6));
        assert_eq!(ids(&deposit.get_all("users")?), vec![json!(2), json!(3)]);
        assert_eq!(deposit.query("users").count()?, 2);

        // purged entries do not come back when the clock is rewound
        clock.set(deposit_int_test::test_util::CLOCK_START);
        assert_eq!(ids(&deposit.get_all("users")?), vec![json!(2), json!(3)]);
        Ok(())
    });
}

#[test]
fn test_rewrite_without_ttl_clears_expiry() {
    run_on_both(|ctx| {
        let deposit = ctx.deposit();
        let clock = ctx.clock();
        deposit.put("users", json!({"id": 1, "v": 1}), Some(Duration::from_secs(5)))?;
        deposit.put("users", json!({"id": 1, "v": 2}), None)?;

        clock.advance(Duration::from_secs(3600));
        assert_eq!(deposit.get("users", 1)?, Some(json!({"id": 1, "v": 2})));
        Ok(())
    });
}

#[test]
fn test_bulk_put_ttl_applies_to_every_record() {
    run_on_both(|ctx| {
        let deposit = ctx.deposit();
        let clock = ctx.clock();
        deposit.bulk_put(
            "users",
            vec![json!({"id": 1}), json!({"id": 2})],
            Some(Duration::from_secs(1)),
        )?;
        assert_eq!(deposit.count("users")?, 2);
        clock.advance(Duration::from_secs(1));
        assert_eq!(deposit.count("users")?, 0);
        Ok(())
    });
}
