use damkb_core::repo::workspace_repo::WorkspaceRepository;
use damkb_core::repo::EntityKind;
use damkb_core::service::class_service::{ClassService, NewClass};
use damkb_core::service::visibility::VisibilityManager;
use damkb_core::{open_db_in_memory, AccessLevel, KbError, KbSession, Requester};
use rusqlite::Connection;
use serde_json::{json, Map, Value};

fn setup() -> Connection {
    let mut conn = open_db_in_memory().unwrap();
    let session = KbSession::begin(&mut conn).unwrap();
    {
        let workspaces = session.workspaces();
        for (id, name) in [(1, "Studio"), (2, "Agency"), (3, "Vendor")] {
            workspaces.create_workspace(id, name).unwrap();
        }
        workspaces.add_member(1, "ada").unwrap();
        workspaces.add_member(2, "ada").unwrap();
        workspaces.add_member(2, "bob").unwrap();
    }
    session.commit().unwrap();
    conn
}

fn asset_class(workspaces: Value) -> NewClass {
    NewClass {
        explicit_id: Some("asset".to_string()),
        name: "Asset".to_string(),
        workspaces: Some(workspaces),
        ..NewClass::default()
    }
}

fn patch(workspaces: Value) -> Map<String, Value> {
    let mut patch = Map::new();
    patch.insert("workspaces".to_string(), workspaces);
    patch
}

#[test]
fn root_class_is_shared_with_listed_workspaces() {
    let mut conn = setup();
    let session = KbSession::begin(&mut conn).unwrap();
    let (classes, workspaces) = (session.classes(), session.workspaces());
    let service = ClassService::new(&classes, &workspaces);

    service
        .create_class(
            asset_class(json!({"1": "owner", "2": "read-only"})),
            &Requester::new("ada", 1),
        )
        .unwrap();

    let manager = VisibilityManager::new(&classes, &workspaces);
    assert_eq!(
        manager.access_level("asset", 2).unwrap(),
        Some(AccessLevel::ReadOnly)
    );
    assert_eq!(manager.access_level("asset", 3).unwrap(), None);
    assert_eq!(service.list_classes(2).unwrap().len(), 1);
    assert!(service.list_classes(3).unwrap().is_empty());
    assert!(matches!(
        service.get_class("asset", 3),
        Err(KbError::NotFound { .. })
    ));
}

#[test]
fn submission_must_keep_requester_as_owner() {
    let mut conn = setup();
    let session = KbSession::begin(&mut conn).unwrap();
    let (classes, workspaces) = (session.classes(), session.workspaces());
    let service = ClassService::new(&classes, &workspaces);
    let ada = Requester::new("ada", 1);

    service
        .create_class(asset_class(json!({"1": "owner", "2": "read-write"})), &ada)
        .unwrap();

    let err = service
        .update_class("asset", &patch(json!({"1": "read-write"})), &ada)
        .unwrap_err();
    assert!(matches!(err, KbError::BadRequest(_)));

    let manager = VisibilityManager::new(&classes, &workspaces);
    let current = manager.visibility_of("asset").unwrap();
    assert_eq!(current.get(1), Some(AccessLevel::Owner));
    assert_eq!(current.get(2), Some(AccessLevel::ReadWrite));
}

#[test]
fn malformed_submissions_are_rejected() {
    let mut conn = setup();
    let session = KbSession::begin(&mut conn).unwrap();
    let (classes, workspaces) = (session.classes(), session.workspaces());
    let manager = VisibilityManager::new(&classes, &workspaces);
    let ada = Requester::new("ada", 1);

    assert!(matches!(
        manager.parse_submission(&json!(["1"]), &ada),
        Err(KbError::BadRequest(_))
    ));
    assert!(matches!(
        manager.parse_submission(&json!({"studio": "owner"}), &ada),
        Err(KbError::BadRequest(_))
    ));
    assert!(matches!(
        manager.parse_submission(&json!({"1": "admin"}), &ada),
        Err(KbError::BadRequest(_))
    ));
    assert!(matches!(
        manager.parse_submission(&json!({"1": "owner", "9": "read-only"}), &ada),
        Err(KbError::NotFound { entity: EntityKind::Workspace, ref id }) if id == "9"
    ));
    assert!(matches!(
        manager.parse_submission(&json!({"1": "owner", "3": "read-only"}), &ada),
        Err(KbError::Forbidden(_))
    ));
}

#[test]
fn non_owner_workspaces_patch_is_ignored() {
    let mut conn = setup();
    let session = KbSession::begin(&mut conn).unwrap();
    let (classes, workspaces) = (session.classes(), session.workspaces());
    let service = ClassService::new(&classes, &workspaces);

    service
        .create_class(
            asset_class(json!({"1": "owner", "2": "read-write"})),
            &Requester::new("ada", 1),
        )
        .unwrap();

    let mut body = patch(json!({"2": "owner"}));
    body.insert("notes".to_string(), json!("edited by agency"));
    let chain = service
        .update_class("asset", &body, &Requester::new("bob", 2))
        .unwrap();

    assert_eq!(chain.leaf().notes.as_deref(), Some("edited by agency"));
    assert_eq!(chain.visibility().get(1), Some(AccessLevel::Owner));
    assert_eq!(chain.visibility().get(2), Some(AccessLevel::ReadWrite));
}

#[test]
fn read_only_workspace_cannot_update_or_derive() {
    let mut conn = setup();
    let session = KbSession::begin(&mut conn).unwrap();
    let (classes, workspaces) = (session.classes(), session.workspaces());
    let service = ClassService::new(&classes, &workspaces);
    let bob = Requester::new("bob", 2);

    service
        .create_class(
            asset_class(json!({"1": "owner", "2": "read-only"})),
            &Requester::new("ada", 1),
        )
        .unwrap();

    let mut body = Map::new();
    body.insert("name".to_string(), json!("Renamed"));
    assert!(matches!(
        service.update_class("asset", &body, &bob),
        Err(KbError::Forbidden(_))
    ));

    let derived = NewClass {
        explicit_id: Some("image".to_string()),
        name: "Image".to_string(),
        superclass: Some("asset".to_string()),
        ..NewClass::default()
    };
    assert!(matches!(
        service.create_class(derived, &bob),
        Err(KbError::Forbidden(_))
    ));
}

#[test]
fn replacing_the_map_revokes_omitted_workspaces() {
    let mut conn = setup();
    let session = KbSession::begin(&mut conn).unwrap();
    let (classes, workspaces) = (session.classes(), session.workspaces());
    let service = ClassService::new(&classes, &workspaces);
    let ada = Requester::new("ada", 1);

    service
        .create_class(asset_class(json!({"1": "owner", "2": "read-write"})), &ada)
        .unwrap();
    service
        .create_class(
            NewClass {
                explicit_id: Some("image".to_string()),
                name: "Image".to_string(),
                superclass: Some("asset".to_string()),
                ..NewClass::default()
            },
            &ada,
        )
        .unwrap();
    assert!(service.get_class("image", 2).is_ok());

    service
        .update_class("asset", &patch(json!({"1": "owner"})), &ada)
        .unwrap();

    assert!(matches!(
        service.get_class("asset", 2),
        Err(KbError::NotFound { .. })
    ));
    assert!(matches!(
        service.get_class("image", 2),
        Err(KbError::NotFound { .. })
    ));
}

#[test]
fn derived_class_cannot_hold_its_own_map() {
    let mut conn = setup();
    let session = KbSession::begin(&mut conn).unwrap();
    let (classes, workspaces) = (session.classes(), session.workspaces());
    let service = ClassService::new(&classes, &workspaces);
    let ada = Requester::new("ada", 1);

    service
        .create_class(asset_class(json!({"1": "owner"})), &ada)
        .unwrap();
    service
        .create_class(
            NewClass {
                explicit_id: Some("image".to_string()),
                name: "Image".to_string(),
                superclass: Some("asset".to_string()),
                ..NewClass::default()
            },
            &ada,
        )
        .unwrap();

    let manager = VisibilityManager::new(&classes, &workspaces);
    assert!(matches!(
        manager.set_visibility("image", &json!({"1": "owner"}), &ada),
        Err(KbError::BadRequest(_))
    ));
    assert_eq!(manager.visibility_of("image").unwrap().owners(), vec![1]);
}
