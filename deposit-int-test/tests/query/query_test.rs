use deposit::common::{SortKey, SortOrder};
use deposit::errors::ErrorKind;
use deposit::query::field;
use deposit_int_test::test_util::{ids, items, run_on_both};
use serde_json::{json, Value};
use std::ops::Bound;

fn catalog() -> Vec<Value> {
    vec![
        json!({"id": 1, "name": "Hammer", "category": "tools", "price": 12, "stock": {"count": 4}}),
        json!({"id": 2, "name": "Rake", "category": "garden", "price": 8, "stock": {"count": 0}}),
        json!({"id": 3, "name": "Drill", "category": "tools", "price": 80, "stock": {"count": 2}}),
        json!({"id": 4, "name": "Hose", "category": "garden", "price": 25, "stock": {"count": 9}}),
        json!({"id": 5, "name": "Saw", "category": "tools", "price": 12, "stock": {"count": 1}}),
        json!({"id": 6, "name": "Lamp", "category": "home", "price": 40}),
    ]
}

#[test]
fn test_steps_apply_in_append_order() {
    run_on_both(|ctx| {
        let deposit = ctx.deposit();
        deposit.bulk_put("items", catalog(), None)?;

        let limit_then_offset = deposit.query("items").limit(2).offset(1).to_vec()?;
        let offset_then_limit = deposit.query("items").offset(1).limit(2).to_vec()?;
        assert_eq!(ids(&limit_then_offset), vec![json!(2)]);
        assert_eq!(ids(&offset_then_limit), vec![json!(2), json!(3)]);

        let sorted_then_limited = deposit
            .query("items")
            .order_by("price", SortOrder::Descending)
            .limit(2)
            .to_vec()?;
        let limited_then_sorted = deposit
            .query("items")
            .limit(2)
            .order_by("price", SortOrder::Descending)
            .to_vec()?;
        assert_eq!(ids(&sorted_then_limited), vec![json!(3), json!(6)]);
        assert_eq!(ids(&limited_then_sorted), vec![json!(1), json!(2)]);
        Ok(())
    });
}

#[test]
fn test_order_by_is_stable() {
    run_on_both(|ctx| {
        let deposit = ctx.deposit();
        deposit.bulk_put("items", catalog(), None)?;
        let sorted = deposit.query("items").order_by("price", SortOrder::Ascending).to_vec()?;
        // Hammer and Saw share a price and keep their scan order
        assert_eq!(
            ids(&sorted),
            vec![json!(2), json!(1), json!(5), json!(4), json!(6), json!(3)]
        );

        let multi = deposit
            .query("items")
            .order_by_keys(vec![
                SortKey::new("category", SortOrder::Ascending),
                SortKey::new("price", SortOrder::Descending),
            ])
            .to_vec()?;
        assert_eq!(
            ids(&multi),
            vec![json!(4), json!(2), json!(6), json!(3), json!(1), json!(5)]
        );
        Ok(())
    });
}

#[test]
fn test_filters() {
    run_on_both(|ctx| {
        let deposit = ctx.deposit();
        deposit.bulk_put("items", catalog(), None)?;

        let tools = deposit.query("items").equals("category", "tools").to_vec()?;
        assert_eq!(ids(&tools), vec![json!(1), json!(3), json!(5)]);

        let mid = deposit.query("items").between("price", 12, 40).to_vec()?;
        assert_eq!(ids(&mid), vec![json!(1), json!(4), json!(5), json!(6)]);

        let open_range = deposit
            .query("items")
            .between_with("price", Bound::Excluded(json!(12)), Bound::Unbounded)
            .to_vec()?;
        assert_eq!(ids(&open_range), vec![json!(3), json!(4), json!(6)]);

        let h = deposit.query("items").starts_with("name", "H").to_vec()?;
        assert_eq!(ids(&h), vec![json!(1), json!(4)]);

        let not_tools = deposit
            .query("items")
            .not(field("category").eq("tools"))
            .to_vec()?;
        assert_eq!(ids(&not_tools), vec![json!(2), json!(4), json!(6)]);

        let cheap_or_home = deposit
            .query("items")
            .where_(field("price").lt(10))
            .or(field("category").eq("home"))
            .to_vec()?;
        assert_eq!(ids(&cheap_or_home), vec![json!(2), json!(6)]);

        let cheap_tools = deposit
            .query("items")
            .equals("category", "tools")
            .and(field("price").lte(12))
            .to_vec()?;
        assert_eq!(ids(&cheap_tools), vec![json!(1), json!(5)]);

        let some = deposit.query("items").any_of("id", [2, 6, 99]).to_vec()?;
        assert_eq!(ids(&some), vec![json!(2), json!(6)]);
        Ok(())
    });
}

#[test]
fn test_nested_fields_and_custom_filters() {
    run_on_both(|ctx| {
        let deposit = ctx.deposit();
        deposit.bulk_put("items", catalog(), None)?;

        let in_stock = deposit.query("items").where_(field("stock.count").gt(1)).to_vec()?;
        assert_eq!(ids(&in_stock), vec![json!(1), json!(3), json!(4)]);

        let untracked = deposit
            .query("items")
            .filter(|record| record.get("stock").is_none())
            .to_vec()?;
        assert_eq!(ids(&untracked), vec![json!(6)]);

        let pattern = deposit
            .query("items")
            .where_(field("name").matches("^[HS]a?")?)
            .to_vec()?;
        assert_eq!(ids(&pattern), vec![json!(1), json!(4), json!(5)]);

        let err = field("name").matches("(unclosed").unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::InvalidOperation);
        Ok(())
    });
}

#[test]
fn test_paging_and_reverse() {
    run_on_both(|ctx| {
        let deposit = ctx.deposit();
        deposit.bulk_put("items", catalog(), None)?;

        let second = deposit.query("items").page(2, 4).to_vec()?;
        assert_eq!(ids(&second), vec![json!(5), json!(6)]);

        let first = deposit.query("items").page(0, 2).to_vec()?;
        assert_eq!(ids(&first), vec![json!(1), json!(2)]);

        let beyond = deposit.query("items").page(9, 2).to_vec()?;
        assert!(beyond.is_empty());

        let reversed = deposit.query("items").reverse().limit(2).to_vec()?;
        assert_eq!(ids(&reversed), vec![json!(6), json!(5)]);
        Ok(())
    });
}

#[test]
fn test_modify_changes_results_not_storage() {
    run_on_both(|ctx| {
        let deposit = ctx.deposit();
        deposit.bulk_put("items", items(), None)?;

        let discounted = deposit
            .query("items")
            .modify(|record| {
                let price = record["price"].as_i64().unwrap_or(0);
                record["price"] = json!(price / 2);
            })
            .to_vec()?;
        let prices: Vec<Value> = discounted.iter().map(|r| r["price"].clone()).collect();
        assert_eq!(prices, vec![json!(5), json!(2), json!(10)]);

        assert_eq!(deposit.get("items", 1)?.map(|r| r["price"].clone()), Some(json!(10)));
        Ok(())
    });
}

#[test]
fn test_fuzzy_search() {
    run_on_both(|ctx| {
        let deposit = ctx.deposit();
        deposit.bulk_put("items", catalog(), None)?;

        let hits = deposit.query("items").search("drill").to_vec()?;
        assert_eq!(ids(&hits).first(), Some(&json!(3)));

        let typo = deposit.query("items").search_with("hamer", &["name"], 0.7).to_vec()?;
        assert_eq!(ids(&typo), vec![json!(1)]);

        let by_category = deposit
            .query("items")
            .search_with("garden", &["category"], 1.0)
            .to_vec()?;
        assert_eq!(ids(&by_category), vec![json!(2), json!(4)]);
        Ok(())
    });
}

#[test]
fn test_memoized_results_refresh_on_invalidate() {
    run_on_both(|ctx| {
        let deposit = ctx.deposit();
        deposit.bulk_put("items", items(), None)?;

        let query = deposit.query("items").equals("category", "tools");
        assert_eq!(query.count()?, 2);

        deposit.put("items", json!({"id": 4, "category": "tools", "price": 1}), None)?;
        // the cached snapshot is reused until invalidated
        assert_eq!(query.count()?, 2);
        query.invalidate();
        assert_eq!(query.count()?, 3);

        // a fresh builder always reads the table
        assert_eq!(deposit.query("items").equals("category", "tools").count()?, 3);
        Ok(())
    });
}

#[test]
fn test_query_signature() {
    run_on_both(|ctx| {
        let deposit = ctx.deposit();
        let a = deposit.query("items").equals("category", "tools").limit(3);
        let b = deposit.query("items").equals("category", "tools").limit(3);
        let c = deposit.query("items").limit(3).equals("category", "tools");
        assert_eq!(a.signature(), b.signature());
        assert_ne!(a.signature(), c.signature());
        assert!(a.signature().starts_with("items|"));
        Ok(())
    });
}
