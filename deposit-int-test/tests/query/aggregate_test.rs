use deposit::common::Group;
use deposit_int_test::test_util::{ids, items, run_on_both};
use serde_json::json;

#[test]
fn test_count_first_last() {
    run_on_both(|ctx| {
        let deposit = ctx.deposit();
        assert_eq!(deposit.query("items").count()?, 0);
        assert_eq!(deposit.query("items").first()?, None);
        assert_eq!(deposit.query("items").last()?, None);

        deposit.bulk_put("items", items(), None)?;
        assert_eq!(deposit.query("items").count()?, 3);
        assert_eq!(deposit.query("items").first()?.map(|r| r["id"].clone()), Some(json!(1)));
        assert_eq!(deposit.query("items").last()?.map(|r| r["id"].clone()), Some(json!(3)));
        Ok(())
    });
}

#[test]
fn test_numeric_aggregates() {
    run_on_both(|ctx| {
        let deposit = ctx.deposit();
        assert_eq!(deposit.query("items").average("price")?, 0.0);
        assert_eq!(deposit.query("items").sum("price")?, 0.0);
        assert_eq!(deposit.query("items").min("price")?, None);

        deposit.bulk_put("items", items(), None)?;
        let cheapest = deposit.query("items").min("price")?;
        assert_eq!(cheapest.map(|r| r["id"].clone()), Some(json!(2)));
        let dearest = deposit.query("items").max("price")?;
        assert_eq!(dearest.map(|r| r["id"].clone()), Some(json!(3)));

        deposit.put("items", json!({"id": 4, "price": "n/a", "category": "misc"}), None)?;

        assert_eq!(deposit.query("items").sum("price")?, 35.0);
        assert_eq!(deposit.query("items").average("price")?, 8.75);
        assert_eq!(
            deposit.query("items").equals("category", "tools").average("price")?,
            15.0
        );
        Ok(())
    });
}

#[test]
fn test_group_by_step_matches_to_grouped() {
    run_on_both(|ctx| {
        let deposit = ctx.deposit();
        deposit.bulk_put("items", items(), None)?;

        let grouped = deposit.query("items").to_grouped("category")?;
        assert_eq!(
            grouped,
            vec![
                Group {
                    key: json!("tools"),
                    values: vec![items()[0].clone(), items()[2].clone()],
                },
                Group {
                    key: json!("garden"),
                    values: vec![items()[1].clone()],
                },
            ]
        );

        let as_step = deposit.query("items").group_by("category").to_vec()?;
        let as_groups: Vec<Group> = serde_json::from_value(json!(as_step))?;
        assert_eq!(as_groups, grouped);

        // later steps see the group shape
        let group_count = deposit.query("items").group_by("category").count()?;
        assert_eq!(group_count, 2);
        Ok(())
    });
}

#[test]
fn test_group_missing_field_under_null() {
    run_on_both(|ctx| {
        let deposit = ctx.deposit();
        deposit.bulk_put("items", items(), None)?;
        deposit.put("items", json!({"id": 9}), None)?;

        let grouped = deposit.query("items").to_grouped("category")?;
        let ungrouped = grouped.iter().find(|group| group.key.is_null());
        assert_eq!(ungrouped.map(|group| ids(&group.values)), Some(vec![json!(9)]));
        Ok(())
    });
}

#[test]
fn test_equal_numbers_share_a_group() {
    run_on_both(|ctx| {
        let deposit = ctx.deposit();
        deposit.put("items", json!({"id": 1, "category": 1}), None)?;
        deposit.put("items", json!({"id": 2, "category": 1.0}), None)?;
        deposit.put("items", json!({"id": 3, "category": "1"}), None)?;

        assert_eq!(deposit.query("items").equals("category", 1).count()?, 2);
        let grouped = deposit.query("items").to_grouped("category")?;
        assert_eq!(grouped.len(), 2);
        assert_eq!(ids(&grouped[0].values), vec![json!(1), json!(2)]);
        assert_eq!(deposit.query("items").group_by("category").count()?, 2);
        Ok(())
    });
}
