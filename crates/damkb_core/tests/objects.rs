use damkb_core::model::attribute::ValueViolation;
use damkb_core::repo::workspace_repo::WorkspaceRepository;
use damkb_core::repo::EntityKind;
use damkb_core::service::class_service::{ClassService, NewClass};
use damkb_core::service::object_service::{NewObject, ObjectService};
use damkb_core::{
    decode_attribute, open_db_in_memory, AttributeDescriptor, AttributeValue, KbError, KbSession,
    Requester,
};
use rusqlite::Connection;
use serde_json::{json, Map, Value};

fn attr(id: &str, raw: Value) -> AttributeDescriptor {
    decode_attribute(id, &raw).unwrap()
}

fn setup() -> Connection {
    let mut conn = open_db_in_memory().unwrap();
    let session = KbSession::begin(&mut conn).unwrap();
    {
        let workspaces = session.workspaces();
        workspaces.create_workspace(1, "Studio").unwrap();
        workspaces.create_workspace(2, "Agency").unwrap();
        workspaces.add_member(1, "ada").unwrap();
        workspaces.add_member(2, "ada").unwrap();
        workspaces.add_member(2, "bob").unwrap();

        let classes = session.classes();
        let service = ClassService::new(&classes, &workspaces);
        let ada = Requester::new("ada", 1);
        service
            .create_class(
                NewClass {
                    explicit_id: Some("person".to_string()),
                    name: "Person".to_string(),
                    workspaces: Some(json!({"1": "owner", "2": "read-only"})),
                    ..NewClass::default()
                },
                &ada,
            )
            .unwrap();
        service
            .create_class(
                NewClass {
                    explicit_id: Some("asset".to_string()),
                    name: "Asset".to_string(),
                    attributes: vec![
                        attr(
                            "title",
                            json!({"type": "string", "name": "Title", "length": 40, "maybe_empty": false}),
                        ),
                        attr(
                            "rating",
                            json!({"type": "int", "name": "Rating", "min": 0, "max": 5, "default": 3}),
                        ),
                        attr(
                            "author",
                            json!({"type": "objref", "name": "Author", "target_class": "person"}),
                        ),
                    ],
                    workspaces: Some(json!({"1": "owner", "2": "read-only"})),
                    ..NewClass::default()
                },
                &ada,
            )
            .unwrap();
        service
            .create_class(
                NewClass {
                    explicit_id: Some("image".to_string()),
                    name: "Image".to_string(),
                    superclass: Some("asset".to_string()),
                    attributes: vec![attr(
                        "shot_on",
                        json!({"type": "date", "name": "Shot on", "min": "1900-01-01"}),
                    )],
                    ..NewClass::default()
                },
                &ada,
            )
            .unwrap();
    }
    session.commit().unwrap();
    conn
}

fn body(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        other => panic!("expected object body, got {other}"),
    }
}

fn new_object(class_id: &str, id: &str, patch: Value) -> NewObject {
    NewObject {
        class_id: class_id.to_string(),
        explicit_id: Some(id.to_string()),
        patch: body(patch),
    }
}

#[test]
fn created_object_starts_from_defaults() {
    let mut conn = setup();
    let session = KbSession::begin(&mut conn).unwrap();
    let (classes, objects) = (session.classes(), session.objects());
    let service = ObjectService::new(&classes, &objects);

    service
        .create_object(
            new_object(
                "image",
                "img_1",
                json!({"name": "Sunset", "attributes": {"title": "Sunset over pier"}}),
            ),
            &Requester::new("ada", 1),
        )
        .unwrap();

    let stored = service.get_object("img_1", 1).unwrap();
    assert_eq!(stored.class_id, "image");
    assert_eq!(stored.value("rating"), Some(&AttributeValue::Integer(3)));
    assert_eq!(stored.value("author"), Some(&AttributeValue::Null));
    assert_eq!(stored.value("shot_on"), Some(&AttributeValue::Null));
    assert_eq!(
        stored.value("title"),
        Some(&AttributeValue::Text("Sunset over pier".to_string()))
    );
}

#[test]
fn create_requires_name_and_non_nullable_values() {
    let mut conn = setup();
    let session = KbSession::begin(&mut conn).unwrap();
    let (classes, objects) = (session.classes(), session.objects());
    let service = ObjectService::new(&classes, &objects);
    let ada = Requester::new("ada", 1);

    assert!(matches!(
        service.create_object(
            new_object("asset", "a_1", json!({"attributes": {"title": "x"}})),
            &ada
        ),
        Err(KbError::MissingField("name"))
    ));

    let err = service
        .create_object(new_object("asset", "a_1", json!({"name": "Draft"})), &ada)
        .unwrap_err();
    match err {
        KbError::Validation(err) => {
            assert_eq!(err.attribute, "title");
            assert_eq!(err.violation, ValueViolation::NotNullable);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(matches!(
        service.get_object("a_1", 1),
        Err(KbError::NotFound { entity: EntityKind::Object, .. })
    ));
}

#[test]
fn out_of_range_update_leaves_object_untouched() {
    let mut conn = setup();
    let session = KbSession::begin(&mut conn).unwrap();
    let (classes, objects) = (session.classes(), session.objects());
    let service = ObjectService::new(&classes, &objects);
    let ada = Requester::new("ada", 1);

    service
        .create_object(
            new_object("asset", "a_1", json!({"name": "Logo", "attributes": {"title": "Logo"}})),
            &ada,
        )
        .unwrap();

    let err = service
        .update_object(
            "a_1",
            &body(json!({"name": "Logo v2", "attributes": {"title": "Logo v2", "rating": 7}})),
            &ada,
        )
        .unwrap_err();
    assert!(matches!(err, KbError::Validation(ref err) if err.attribute == "rating"));

    let stored = service.get_object("a_1", 1).unwrap();
    assert_eq!(stored.name, "Logo");
    assert_eq!(stored.value("rating"), Some(&AttributeValue::Integer(3)));
    assert_eq!(stored.value("title"), Some(&AttributeValue::Text("Logo".to_string())));
}

#[test]
fn unknown_attribute_key_is_a_validation_error() {
    let mut conn = setup();
    let session = KbSession::begin(&mut conn).unwrap();
    let (classes, objects) = (session.classes(), session.objects());
    let service = ObjectService::new(&classes, &objects);

    let err = service
        .create_object(
            new_object(
                "asset",
                "a_1",
                json!({"name": "Logo", "attributes": {"title": "Logo", "shot_on": "2020-01-01"}}),
            ),
            &Requester::new("ada", 1),
        )
        .unwrap_err();
    match err {
        KbError::Validation(err) => {
            assert_eq!(err.attribute, "shot_on");
            assert_eq!(err.violation, ValueViolation::UnknownAttribute);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn object_reference_must_match_target_class() {
    let mut conn = setup();
    let session = KbSession::begin(&mut conn).unwrap();
    let (classes, objects) = (session.classes(), session.objects());
    let service = ObjectService::new(&classes, &objects);
    let ada = Requester::new("ada", 1);

    service
        .create_object(new_object("person", "p_1", json!({"name": "Grace"})), &ada)
        .unwrap();
    service
        .create_object(
            new_object("asset", "a_1", json!({"name": "Logo", "attributes": {"title": "Logo"}})),
            &ada,
        )
        .unwrap();

    let wrong = service
        .update_object("a_1", &body(json!({"attributes": {"author": "a_1"}})), &ada)
        .unwrap_err();
    assert!(matches!(
        wrong,
        KbError::Validation(ref err)
            if matches!(err.violation, ValueViolation::WrongTargetClass { .. })
    ));

    let missing = service
        .update_object("a_1", &body(json!({"attributes": {"author": "p_404"}})), &ada)
        .unwrap_err();
    assert!(matches!(
        missing,
        KbError::UnknownReference { ref object_id, .. } if object_id == "p_404"
    ));
    assert_eq!(missing.to_string(), "unknown object id reference: p_404");

    let updated = service
        .update_object("a_1", &body(json!({"attributes": {"author": "p_1"}})), &ada)
        .unwrap();
    assert_eq!(
        updated.value("author"),
        Some(&AttributeValue::ObjectRef("p_1".to_string()))
    );
}

#[test]
fn class_listing_includes_descendant_instances() {
    let mut conn = setup();
    let session = KbSession::begin(&mut conn).unwrap();
    let (classes, objects) = (session.classes(), session.objects());
    let service = ObjectService::new(&classes, &objects);
    let ada = Requester::new("ada", 1);

    for (class_id, id) in [("asset", "a_1"), ("image", "i_1"), ("image", "i_2")] {
        service
            .create_object(
                new_object(class_id, id, json!({"name": id, "attributes": {"title": id}})),
                &ada,
            )
            .unwrap();
    }
    service
        .create_object(new_object("person", "p_1", json!({"name": "Grace"})), &ada)
        .unwrap();

    let ids = |found: Vec<damkb_core::KbObject>| -> Vec<String> {
        found.into_iter().map(|object| object.id).collect()
    };
    assert_eq!(
        ids(service.list_objects(1, Some("asset")).unwrap()),
        vec!["a_1", "i_1", "i_2"]
    );
    assert_eq!(
        ids(service.list_objects(1, Some("image")).unwrap()),
        vec!["i_1", "i_2"]
    );
    assert_eq!(service.list_objects(1, None).unwrap().len(), 4);
    assert_eq!(service.list_objects(2, None).unwrap().len(), 4);
}

#[test]
fn read_only_workspace_can_read_but_not_write() {
    let mut conn = setup();
    let session = KbSession::begin(&mut conn).unwrap();
    let (classes, objects) = (session.classes(), session.objects());
    let service = ObjectService::new(&classes, &objects);

    service
        .create_object(
            new_object("asset", "a_1", json!({"name": "Logo", "attributes": {"title": "Logo"}})),
            &Requester::new("ada", 1),
        )
        .unwrap();

    let bob = Requester::new("bob", 2);
    assert_eq!(service.get_object("a_1", 2).unwrap().name, "Logo");
    assert!(matches!(
        service.update_object("a_1", &body(json!({"name": "Hijacked"})), &bob),
        Err(KbError::Forbidden(_))
    ));
    assert!(matches!(
        service.create_object(
            new_object("asset", "a_2", json!({"name": "Other", "attributes": {"title": "x"}})),
            &bob
        ),
        Err(KbError::Forbidden(_))
    ));
}

#[test]
fn explicit_object_id_conflicts() {
    let mut conn = setup();
    let session = KbSession::begin(&mut conn).unwrap();
    let (classes, objects) = (session.classes(), session.objects());
    let service = ObjectService::new(&classes, &objects);
    let ada = Requester::new("ada", 1);

    service
        .create_object(new_object("person", "p_1", json!({"name": "Grace"})), &ada)
        .unwrap();
    assert!(matches!(
        service.create_object(new_object("person", "p_1", json!({"name": "Alan"})), &ada),
        Err(KbError::Conflict { entity: EntityKind::Object, .. })
    ));
    assert_eq!(service.get_object("p_1", 1).unwrap().name, "Grace");
}
