use super::*;
use crate::entity::{CommandKind, Sensor};
use crate::filter::{BoolOperator, DoubleOperator};

fn reading(ts: f64, entity_id: u32, value: f64) -> Event {
    Event::sensor(ts, 1, entity_id, "TempSensor", value)
}

fn switch_event(ts: f64, entity_id: u32, state: bool) -> Event {
    Event::actuator(ts, 1, entity_id, "Switch", state)
}

fn above(threshold: f64) -> Filter {
    Filter::double("value", DoubleOperator::GreaterThan, threshold).unwrap()
}

#[test]
fn test_new_session_defaults() {
    let session = Session::new(1);
    assert_eq!(session.client_id(), 1);
    assert_eq!(session.max_wait_time(), DEFAULT_MAX_WAIT);
    assert!(session.log_filter().is_none());
    assert!(session.get_all_entities().is_empty());
    assert_eq!(session.most_active_entity(), None);
}

#[test]
fn test_log_event_without_filter() {
    let session = Session::new(1);
    assert!(session.log_event(reading(1.0, 1, 10.0)));
    assert!(session.log_event(reading(2.0, 2, 20.0)));
    assert_eq!(session.logged_events(), 2);
}

#[test]
fn test_log_if_filters_future_events() {
    let session = Session::new(1);
    session.log_if(above(15.0));

    assert!(!session.log_event(reading(1.0, 1, 10.0)));
    assert!(session.log_event(reading(2.0, 2, 20.0)));
    // double leaf on "value" never matches an actuator event
    assert!(!session.log_event(switch_event(3.0, 3, true)));

    assert_eq!(session.read_logs(), vec![2]);
}

#[test]
fn test_read_logs_clears_but_entities_remain() {
    let session = Session::new(1);
    session.log_event(reading(2.0, 7, 1.0));
    session.log_event(reading(1.0, 3, 1.0));

    assert_eq!(session.read_logs(), vec![3, 7]);
    assert!(session.read_logs().is_empty());
    assert_eq!(session.get_all_entities().into_iter().collect::<Vec<_>>(), vec![3, 7]);
}

#[test]
fn test_log_arrived_orders_latest_by_arrival() {
    let session = Session::new(1);
    session.log_arrived(2, reading(1.0, 20, 50.0));
    session.log_arrived(1, reading(9.0, 10, 0.0));

    let actuator = Actuator::registered(5, 1, "Switch", false);
    // latest by arrival is entity 20 with value 50
    assert!(session.set_actuator_state_if(&above(40.0), &actuator).is_applied());
}

#[test]
fn test_analysis_queries() {
    let session = Session::new(1);
    for (ts, id) in [(1.0, 4), (2.0, 4), (3.0, 9), (3.0, 2)] {
        session.log_event(reading(ts, id, 0.0));
    }

    let window: Vec<u32> = session
        .events_in_time_window(TimeWindow::new(2.0, 3.0))
        .iter()
        .map(|e| e.entity_id)
        .collect();
    assert_eq!(window, vec![4, 9, 2]);

    let last: Vec<u32> = session.last_n_events(2).iter().map(|e| e.entity_id).collect();
    assert_eq!(last, vec![4, 9]);

    assert_eq!(session.most_active_entity(), Some(4));
}

#[test]
fn test_set_actuator_requires_registration() {
    let session = Session::new(1);
    session.log_event(reading(1.0, 1, 100.0));

    let foreign = Actuator::registered(5, 2, "Switch", false);
    assert_eq!(
        session.set_actuator_state_if(&above(0.0), &foreign),
        ControlOutcome::NotRegistered
    );
    assert!(!foreign.state());

    let unbound = Actuator::new(6, "Switch", false);
    assert_eq!(
        session.set_actuator_state_if(&above(0.0), &unbound),
        ControlOutcome::NotRegistered
    );
}

#[test]
fn test_set_actuator_follows_filter() {
    let session = Session::new(1);
    let actuator = Actuator::registered(5, 1, "Switch", false);

    assert_eq!(
        session.set_actuator_state_if(&above(0.0), &actuator),
        ControlOutcome::Unsatisfied
    );

    session.log_event(reading(1.0, 1, 10.0));
    assert_eq!(
        session.set_actuator_state_if(&above(50.0), &actuator),
        ControlOutcome::Unsatisfied
    );
    assert!(!actuator.state());

    match session.set_actuator_state_if(&above(5.0), &actuator) {
        ControlOutcome::Applied(command) => {
            assert_eq!(command.command, CommandKind::SetState);
            assert!(command.state);
            assert_eq!(command.client_id, 1);
        }
        other => panic!("Expected Applied, got {:?}", other),
    }
    assert!(actuator.state());
}

#[test]
fn test_toggle_requires_previous_event_from_actuator() {
    let session = Session::new(1);
    let actuator = Actuator::registered(5, 1, "Switch", false);
    session.log_event(reading(1.0, 1, 10.0));

    assert_eq!(
        session.toggle_actuator_state_if(&above(0.0), &actuator),
        ControlOutcome::NeverSeen
    );
    assert!(!actuator.state());
}

#[test]
fn test_toggle_flips_state() {
    let session = Session::new(1);
    let actuator = Actuator::registered(5, 1, "Switch", false);
    let on = Filter::boolean(BoolOperator::Equals, false);

    session.log_event(switch_event(1.0, 5, false));
    match session.toggle_actuator_state_if(&on, &actuator) {
        ControlOutcome::Applied(command) => {
            assert_eq!(command.command, CommandKind::ToggleState);
            assert!(command.state);
        }
        other => panic!("Expected Applied, got {:?}", other),
    }
    assert!(actuator.state());

    // latest event still reports false, so the filter matches again
    assert!(session.toggle_actuator_state_if(&on, &actuator).is_applied());
    assert!(!actuator.state());
}

#[test]
fn test_toggle_unsatisfied_filter() {
    let session = Session::new(1);
    let actuator = Actuator::registered(5, 1, "Switch", true);
    session.log_event(switch_event(1.0, 5, true));
    session.log_event(reading(2.0, 1, 1.0));

    assert_eq!(
        session.toggle_actuator_state_if(&above(10.0), &actuator),
        ControlOutcome::Unsatisfied
    );
    assert!(actuator.state());
}

#[test]
fn test_update_max_wait_time() {
    let session = Session::new(1);
    session.update_max_wait_time(Duration::from_millis(500));
    assert_eq!(session.max_wait_time(), Duration::from_millis(500));
}

#[test]
fn test_predictions_from_history() {
    let session = Session::new(1);
    for (i, v) in [2.0, 1.0, 2.0, 1.0].into_iter().enumerate() {
        session.log_event(reading(i as f64, 3, v));
    }

    assert_eq!(session.predict_next_values(3, 3).unwrap(), vec![2.0, 1.0, 2.0]);

    let timestamps = session.predict_next_timestamps(3, 2).unwrap();
    assert_eq!(timestamps.len(), 2);
    assert!(timestamps[1] > timestamps[0]);
}

#[test]
fn test_predictions_unseen_entity_empty() {
    let session = Session::new(1);
    session.log_event(reading(1.0, 3, 1.0));
    assert!(session.predict_next_values(99, 3).unwrap().is_empty());
    assert!(session.predict_next_timestamps(99, 3).unwrap().is_empty());
}

#[test]
fn test_actuator_values_predicted_as_numbers() {
    let session = Session::new(1);
    session.log_event(switch_event(1.0, 5, true));
    session.log_event(switch_event(2.0, 5, false));
    assert_eq!(session.predict_next_values(5, 3).unwrap(), vec![1.0, 0.0, 1.0]);
}

#[test]
fn test_add_entity() {
    let session = Session::new(1);
    let sensor = Sensor::new(3, "TempSensor");
    assert!(session.add_entity(&sensor));
    assert_eq!(sensor.client_id(), Some(1));

    let taken = Sensor::registered(4, 2, "TempSensor");
    assert!(!session.add_entity(&taken));

    let registered: Vec<u32> = session.registered_entities().into_iter().collect();
    assert_eq!(registered, vec![3]);
}

#[test]
fn test_summary() {
    let session = Session::new(8);
    session.log_event(reading(1.0, 2, 1.0));
    session.log_if(above(0.0));

    let summary = session.summary();
    assert_eq!(summary.client_id, 8);
    assert_eq!(summary.logged_events, 1);
    assert!(summary.log_filter.is_some());
    assert!((summary.max_wait_seconds - 2.0).abs() < 1e-9);
}
