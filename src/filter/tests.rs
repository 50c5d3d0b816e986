use super::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::json;

fn sensor(ts: f64, value: f64) -> Event {
    Event::sensor(ts, 0, 1, "TempSensor", value)
}

fn switch(ts: f64, state: bool) -> Event {
    Event::actuator(ts, 0, 2, "Switch", state)
}

#[test]
fn test_bool_filter_equals() {
    let filter = Filter::boolean(BoolOperator::Equals, true);
    assert!(filter.satisfies(&switch(1.0, true)));
    assert!(!filter.satisfies(&switch(1.0, false)));
}

#[test]
fn test_bool_filter_not_equals() {
    let filter = Filter::boolean(BoolOperator::NotEquals, true);
    assert!(filter.satisfies(&switch(1.0, false)));
    assert!(!filter.satisfies(&switch(1.0, true)));
}

#[test]
fn test_bool_filter_never_matches_sensor_event() {
    let eq = Filter::boolean(BoolOperator::Equals, false);
    let ne = Filter::boolean(BoolOperator::NotEquals, true);
    for value in [-1.0, 0.0, 1.0, 42.0] {
        assert!(!eq.satisfies(&sensor(1.0, value)));
        assert!(!ne.satisfies(&sensor(1.0, value)));
    }
}

#[test]
fn test_double_value_filter_never_matches_actuator_event() {
    for op in [
        DoubleOperator::Equals,
        DoubleOperator::GreaterThan,
        DoubleOperator::LessThan,
        DoubleOperator::GreaterThanOrEquals,
        DoubleOperator::LessThanOrEquals,
    ] {
        let filter = Filter::double("value", op, -1.0).unwrap();
        assert!(!filter.satisfies(&switch(1.0, true)));
        assert!(!filter.satisfies(&switch(1.0, false)));
    }
}

#[test]
fn test_double_timestamp_filter_matches_actuator_event() {
    let filter = Filter::double("timestamp", DoubleOperator::GreaterThan, 5.0).unwrap();
    assert!(filter.satisfies(&switch(6.0, true)));
    assert!(!filter.satisfies(&switch(5.0, true)));
}

#[test]
fn test_double_operators() {
    let event = sensor(1.0, 20.0);
    let check = |op, v| Filter::double("value", op, v).unwrap().satisfies(&event);

    assert!(check(DoubleOperator::Equals, 20.0));
    assert!(!check(DoubleOperator::Equals, 20.5));
    assert!(check(DoubleOperator::GreaterThan, 19.0));
    assert!(!check(DoubleOperator::GreaterThan, 20.0));
    assert!(check(DoubleOperator::LessThan, 21.0));
    assert!(!check(DoubleOperator::LessThan, 20.0));
    assert!(check(DoubleOperator::GreaterThanOrEquals, 20.0));
    assert!(!check(DoubleOperator::GreaterThanOrEquals, 20.1));
    assert!(check(DoubleOperator::LessThanOrEquals, 20.0));
    assert!(!check(DoubleOperator::LessThanOrEquals, 19.9));
}

#[test]
fn test_field_is_case_insensitive() {
    let filter = Filter::double("VaLuE", DoubleOperator::Equals, 3.0).unwrap();
    assert!(filter.satisfies(&sensor(1.0, 3.0)));

    let filter = Filter::double("TIMESTAMP", DoubleOperator::Equals, 1.0).unwrap();
    assert!(filter.satisfies(&sensor(1.0, 3.0)));
}

#[test]
fn test_invalid_field_fails_construction() {
    let result = DoubleFilter::new("temperature", DoubleOperator::Equals, 1.0);
    assert_eq!(
        result.unwrap_err(),
        FilterError::InvalidField("temperature".to_string())
    );
}

#[test]
fn test_missing_operator_never_matches() {
    let bool_leaf = Filter::Bool(BoolFilter {
        operator: None,
        value: true,
    });
    let double_leaf = Filter::Double(DoubleFilter {
        field: DoubleField::Value,
        operator: None,
        value: 1.0,
    });

    assert!(!bool_leaf.satisfies(&switch(1.0, true)));
    assert!(!double_leaf.satisfies(&sensor(1.0, 1.0)));
}

#[test]
fn test_composite_is_conjunction() {
    let filter = Filter::all(vec![
        Filter::double("value", DoubleOperator::GreaterThan, 10.0).unwrap(),
        Filter::double("value", DoubleOperator::LessThan, 20.0).unwrap(),
        Filter::double("timestamp", DoubleOperator::GreaterThanOrEquals, 100.0).unwrap(),
    ]);

    assert!(filter.satisfies(&sensor(100.0, 15.0)));
    assert!(!filter.satisfies(&sensor(99.0, 15.0)));
    assert!(!filter.satisfies(&sensor(100.0, 25.0)));
    assert!(!filter.satisfies(&sensor(100.0, 5.0)));
}

#[test]
fn test_nested_composite() {
    let inner = Filter::all(vec![Filter::boolean(BoolOperator::Equals, true)]);
    let filter = Filter::all(vec![
        inner,
        Filter::double("timestamp", DoubleOperator::LessThan, 10.0).unwrap(),
    ]);

    assert!(filter.satisfies(&switch(5.0, true)));
    assert!(!filter.satisfies(&switch(15.0, true)));
    assert!(!filter.satisfies(&switch(5.0, false)));
}

#[test]
fn test_empty_composite_matches_everything() {
    let filter = Filter::all(vec![]);
    assert!(filter.satisfies(&sensor(1.0, 1.0)));
    assert!(filter.satisfies(&switch(1.0, false)));
}

#[test]
fn test_composite_equals_and_of_children_randomized() {
    let mut rng = StdRng::seed_from_u64(221);

    let random_leaf = |rng: &mut StdRng| -> Filter {
        match rng.gen_range(0..3) {
            0 => Filter::boolean(
                if rng.gen_bool(0.5) {
                    BoolOperator::Equals
                } else {
                    BoolOperator::NotEquals
                },
                rng.gen_bool(0.5),
            ),
            n => {
                let op = match rng.gen_range(0..5) {
                    0 => DoubleOperator::Equals,
                    1 => DoubleOperator::GreaterThan,
                    2 => DoubleOperator::LessThan,
                    3 => DoubleOperator::GreaterThanOrEquals,
                    _ => DoubleOperator::LessThanOrEquals,
                };
                let field = if n == 1 { "value" } else { "timestamp" };
                Filter::double(field, op, rng.gen_range(0..10) as f64).unwrap()
            }
        }
    };

    for _ in 0..500 {
        let count = rng.gen_range(1..6);
        let children: Vec<Filter> = (0..count).map(|_| random_leaf(&mut rng)).collect();
        let composite = Filter::all(children.clone());

        let ts = rng.gen_range(0..10) as f64;
        let event = if rng.gen_bool(0.5) {
            sensor(ts, rng.gen_range(0..10) as f64)
        } else {
            switch(ts, rng.gen_bool(0.5))
        };

        let expected = children.iter().all(|c| c.satisfies(&event));
        assert_eq!(composite.satisfies(&event), expected);
    }
}

#[test]
fn test_satisfies_all_is_and_reduction() {
    let filter = Filter::double("value", DoubleOperator::GreaterThan, 0.0).unwrap();

    let all_positive = vec![sensor(1.0, 1.0), sensor(2.0, 2.0)];
    let one_negative = vec![sensor(1.0, 1.0), sensor(2.0, -2.0)];

    assert!(filter.satisfies_all(&all_positive));
    assert!(!filter.satisfies_all(&one_negative));
    assert!(filter.satisfies_all(&[]));
}

#[test]
fn test_sift_returns_copy_or_none() {
    let filter = Filter::boolean(BoolOperator::Equals, true);

    let on = switch(1.0, true);
    let sifted = filter.sift(&on).unwrap();
    assert_eq!(sifted, on);
    assert_eq!(sifted.payload, on.payload);

    assert!(filter.sift(&switch(1.0, false)).is_none());
}

#[test]
fn test_sift_all_preserves_order_and_identity() {
    let filter = Filter::double("value", DoubleOperator::GreaterThanOrEquals, 5.0).unwrap();
    let events = vec![
        sensor(1.0, 7.0),
        sensor(2.0, 1.0),
        switch(3.0, true),
        sensor(4.0, 5.0),
    ];

    let kept = filter.sift_all(&events);
    assert_eq!(kept.len(), 2);
    assert!(std::ptr::eq(kept[0], &events[0]));
    assert!(std::ptr::eq(kept[1], &events[3]));
}

#[test]
fn test_filter_deserializes_from_wire() {
    let filter: Filter = serde_json::from_value(json!({
        "kind": "all",
        "filters": [
            {"kind": "double", "field": "Value", "operator": "GREATER_THAN", "value": 10.0},
            {"kind": "bool", "operator": "NOT_EQUALS", "value": false}
        ]
    }))
    .unwrap();

    assert_eq!(
        filter,
        Filter::all(vec![
            Filter::double("value", DoubleOperator::GreaterThan, 10.0).unwrap(),
            Filter::boolean(BoolOperator::NotEquals, false),
        ])
    );
}

#[test]
fn test_filter_with_invalid_field_rejected_on_decode() {
    let result: Result<Filter, _> = serde_json::from_value(json!({
        "kind": "double", "field": "humidity", "operator": "EQUALS", "value": 1.0
    }));
    assert!(result.is_err());
}

#[test]
fn test_decoded_leaf_without_operator_never_matches() {
    let filter: Filter =
        serde_json::from_value(json!({"kind": "double", "field": "value", "value": 1.0})).unwrap();
    assert!(!filter.satisfies(&sensor(1.0, 1.0)));
}
