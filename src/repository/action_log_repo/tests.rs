use super::ActionLogRepository;
use crate::db::{ensure_schema, open_sqlite_connection};
use crate::domain::action_log::{ActionLog, ActionType};
use serde_json::json;
use std::sync::{Arc, Mutex};

fn setup_test_repo() -> ActionLogRepository {
    let conn = open_sqlite_connection(":memory:").unwrap();
    ensure_schema(&conn).unwrap();
    ActionLogRepository::new(Arc::new(Mutex::new(conn)))
}

#[test]
fn test_insert_round_trips_payload() {
    let repo = setup_test_repo();
    let log = ActionLog::new(ActionType::FanOut, Some("C007".to_string()), "system")
        .with_payload(&json!({ "created": 2 }))
        .with_detail("fan out C007");

    let id = repo.insert(&log).unwrap();
    let found = repo
        .list_by_batch_code("C007")
        .unwrap()
        .into_iter()
        .find(|l| l.action_id == id)
        .expect("log not found");

    assert_eq!(found.batch_code.as_deref(), Some("C007"));
    assert_eq!(found.action_type, "FanOut");
    assert_eq!(found.payload_json, Some(json!({ "created": 2 })));
    assert_eq!(found.detail.as_deref(), Some("fan out C007"));
}

#[test]
fn test_list_by_batch_code_and_recent() {
    let repo = setup_test_repo();
    repo.insert(&ActionLog::new(ActionType::FanOut, Some("C001".to_string()), "a"))
        .unwrap();
    repo.insert(&ActionLog::new(ActionType::CascadeDelete, Some("C001".to_string()), "a"))
        .unwrap();
    repo.insert(&ActionLog::new(ActionType::RegisterMachine, None, "b"))
        .unwrap();

    assert_eq!(repo.list_by_batch_code("C001").unwrap().len(), 2);
    assert!(repo.list_by_batch_code("C999").unwrap().is_empty());

    let recent = repo.list_recent(2).unwrap();
    assert_eq!(recent.len(), 2);
    assert_eq!(recent[0].action_type, "RegisterMachine");
    assert_eq!(recent[1].action_type, "CascadeDelete");
}
