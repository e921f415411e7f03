use axum::http::StatusCode;
use axum_test::TestServer;
use feature_registry::api::{create_router, AppState, SecurityConfig};
use feature_registry::config::Settings;
use feature_registry::db::Database;
use feature_registry::models::*;
use feature_registry::sample;
use feature_registry::sharing::enable_sharing;
use feature_registry::store::FeatureStore;
use feature_registry::templates::TemplateSet;
use serde_json::{json, Value};

const USER: &str = "X-Remote-User";

struct Fixture {
    server: TestServer,
    db: Database,
    reef_team: i64,
}

fn setup_with(security: SecurityConfig) -> Fixture {
    let db = Database::open_memory().expect("Failed to create database");
    db.migrate().expect("Failed to migrate");

    let settings = Settings::new();
    enable_sharing(&db, &settings, Some("Reef Team")).expect("Failed to enable sharing");
    let reef_team = db.get_or_create_group("Reef Team").expect("Failed to create group").id;
    let book_club = db.get_or_create_group("Book Club").expect("Failed to create group").id;

    for name in ["alice", "bob"] {
        let user = db.create_user(name, false).expect("Failed to create user");
        db.add_user_to_group(user.id, reef_team).expect("Failed to join group");
        db.add_user_to_group(user.id, book_club).expect("Failed to join group");
    }
    db.create_user("carol", false).expect("Failed to create user");

    let registry = sample::registry(&settings.url_prefix).expect("Failed to build registry");
    let state = AppState::new(registry, db.clone(), settings, TemplateSet::new());
    let app = create_router(state, security);
    Fixture {
        server: TestServer::new(app).expect("Failed to create test server"),
        db,
        reef_team,
    }
}

fn setup() -> Fixture {
    setup_with(SecurityConfig::disabled())
}

async fn create_feature(f: &Fixture, user: &'static str, slug: &str, name: &str) -> String {
    let response = f
        .server
        .post(&format!("/features/{}/form/", slug))
        .add_header(USER, user)
        .json(&json!({ "name": name }))
        .await;
    response.assert_status(StatusCode::CREATED);
    response.json::<Value>()["uid"]
        .as_str()
        .expect("uid in response")
        .to_string()
}

mod health {
    use super::*;

    #[tokio::test]
    async fn health_endpoint_is_accessible_without_auth() {
        let f = setup_with(SecurityConfig::with_api_key("test-secret-key"));

        let response = f.server.get("/health").await;

        response.assert_status_ok();
    }

    #[tokio::test]
    async fn protected_endpoint_requires_auth() {
        let f = setup_with(SecurityConfig::with_api_key("test-secret-key"));

        let response = f.server.get("/features/workspaces/public.json").await;

        response.assert_status(StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn protected_endpoint_accepts_valid_bearer_token() {
        let f = setup_with(SecurityConfig::with_api_key("test-secret-key"));

        let response = f
            .server
            .get("/features/workspaces/public.json")
            .add_header("Authorization", "Bearer test-secret-key")
            .await;

        response.assert_status_ok();
    }

    #[tokio::test]
    async fn unknown_remote_user_is_rejected() {
        let f = setup();

        let response = f
            .server
            .get("/features/mpa/form/")
            .add_header(USER, "mallory")
            .await;

        response.assert_status(StatusCode::UNAUTHORIZED);
    }
}

mod forms {
    use super::*;

    #[tokio::test]
    async fn create_form_describes_the_class() {
        let f = setup();

        let response = f.server.get("/features/mpa/form/").add_header(USER, "alice").await;

        response.assert_status_ok();
        let form: Value = response.json();
        assert_eq!(form["model"], "marine_mpa");
        assert_eq!(form["form"], "marine.forms.MpaForm");
        assert_eq!(form["template"], "features/form.html");
        assert_eq!(form["action"], "/features/mpa/form/");
        assert!(form.get("instance").is_none());
    }

    #[tokio::test]
    async fn create_form_requires_login() {
        let f = setup();

        let response = f.server.get("/features/mpa/form/").await;

        response.assert_status(StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn unknown_slug_is_not_found() {
        let f = setup();

        let response = f.server.get("/features/kelp/form/").add_header(USER, "alice").await;

        response.assert_status(StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn update_form_is_for_owners_only() {
        let f = setup();
        let uid = create_feature(&f, "alice", "mpa", "Reef").await;

        let response = f
            .server
            .get(&format!("/features/mpa/{}/form/", uid))
            .add_header(USER, "alice")
            .await;
        response.assert_status_ok();
        let form: Value = response.json();
        assert_eq!(form["action"], format!("/features/mpa/{}/form/", uid));
        assert_eq!(form["instance"]["name"], "Reef");

        f.server
            .get(&format!("/features/mpa/{}/form/", uid))
            .add_header(USER, "bob")
            .await
            .assert_status(StatusCode::FORBIDDEN);
    }
}

mod resources {
    use super::*;

    #[tokio::test]
    async fn creates_a_feature_owned_by_the_requester() {
        let f = setup();

        let response = f
            .server
            .post("/features/mpa/form/")
            .add_header(USER, "alice")
            .json(&json!({ "name": "North Reef" }))
            .await;

        response.assert_status(StatusCode::CREATED);
        let doc: InstanceDocument = response.json();
        assert!(doc.uid.starts_with("marine_mpa_"));
        assert_eq!(doc.name, "North Reef");
        assert_eq!(doc.show_template, "features/show.html");
    }

    #[tokio::test]
    async fn rejects_blank_names() {
        let f = setup();

        let response = f
            .server
            .post("/features/mpa/form/")
            .add_header(USER, "alice")
            .json(&json!({ "name": "   " }))
            .await;

        response.assert_status_bad_request();
    }

    #[tokio::test]
    async fn anonymous_users_cannot_create() {
        let f = setup();

        let response = f
            .server
            .post("/features/mpa/form/")
            .json(&json!({ "name": "Reef" }))
            .await;

        response.assert_status(StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn resource_is_visible_once_shared() {
        let f = setup();
        let uid = create_feature(&f, "alice", "mpa", "Reef").await;
        let path = format!("/features/mpa/{}/", uid);

        f.server.get(&path).add_header(USER, "alice").await.assert_status_ok();
        f.server
            .get(&path)
            .add_header(USER, "bob")
            .await
            .assert_status(StatusCode::FORBIDDEN);

        f.server
            .post(&format!("/features/mpa/{}/share/", uid))
            .add_header(USER, "alice")
            .json(&json!({ "groups": [f.reef_team] }))
            .await
            .assert_status_ok();

        f.server.get(&path).add_header(USER, "bob").await.assert_status_ok();
        f.server
            .get(&path)
            .add_header(USER, "carol")
            .await
            .assert_status(StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn uid_must_match_the_slug() {
        let f = setup();
        let uid = create_feature(&f, "alice", "mpa", "Reef").await;

        let response = f
            .server
            .get(&format!("/features/pipeline/{}/", uid))
            .add_header(USER, "alice")
            .await;

        response.assert_status(StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn delete_removes_collection_contents() {
        let f = setup();
        let folder = create_feature(&f, "alice", "folder", "Plans").await;
        let mpa = create_feature(&f, "alice", "mpa", "Reef").await;
        f.server
            .post(&format!("/features/folder/{}/add/{}", folder, mpa))
            .add_header(USER, "alice")
            .await
            .assert_status_ok();

        f.server
            .delete(&format!("/features/folder/{}/", folder))
            .add_header(USER, "bob")
            .await
            .assert_status(StatusCode::FORBIDDEN);

        f.server
            .delete(&format!("/features/folder/{}/", folder))
            .add_header(USER, "alice")
            .await
            .assert_status(StatusCode::NO_CONTENT);

        f.server
            .get(&format!("/features/mpa/{}/", mpa))
            .add_header(USER, "alice")
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }
}

mod sharing {
    use super::*;

    #[tokio::test]
    async fn share_form_lists_available_groups() {
        let f = setup();
        let uid = create_feature(&f, "alice", "shipwreck", "Wreck").await;

        let response = f
            .server
            .get(&format!("/features/shipwreck/{}/share/", uid))
            .add_header(USER, "alice")
            .await;

        response.assert_status_ok();
        let doc: Value = response.json();
        assert_eq!(doc["shared_with"], json!([]));
        let available: Vec<&str> = doc["available"]
            .as_array()
            .unwrap()
            .iter()
            .map(|g| g["name"].as_str().unwrap())
            .collect();
        assert_eq!(available, vec!["Reef Team"]);
    }

    #[tokio::test]
    async fn sharing_through_a_group_without_permission_fails() {
        let f = setup();
        let uid = create_feature(&f, "alice", "shipwreck", "Wreck").await;
        let book_club = f.db.get_or_create_group("Book Club").unwrap().id;

        let response = f
            .server
            .post(&format!("/features/shipwreck/{}/share/", uid))
            .add_header(USER, "alice")
            .json(&json!({ "groups": [book_club] }))
            .await;

        response.assert_status_bad_request();
        assert!(response.text().contains("Book Club"));
    }

    #[tokio::test]
    async fn only_owners_share() {
        let f = setup();
        let uid = create_feature(&f, "alice", "shipwreck", "Wreck").await;

        let response = f
            .server
            .post(&format!("/features/shipwreck/{}/share/", uid))
            .add_header(USER, "bob")
            .json(&json!({ "groups": [f.reef_team] }))
            .await;

        response.assert_status(StatusCode::FORBIDDEN);
    }
}

mod collections {
    use super::*;

    #[tokio::test]
    async fn adds_and_removes_children() {
        let f = setup();
        let array = create_feature(&f, "alice", "array", "North").await;
        let mpa = create_feature(&f, "alice", "mpa", "Reef").await;

        let response = f
            .server
            .post(&format!("/features/array/{}/add/{}", array, mpa))
            .add_header(USER, "alice")
            .await;
        response.assert_status_ok();
        let members: Value = response.json();
        assert_eq!(members["children"], json!([mpa]));

        let response = f
            .server
            .post(&format!("/features/array/{}/remove/{}", array, mpa))
            .add_header(USER, "alice")
            .await;
        response.assert_status_ok();
        assert_eq!(response.json::<Value>()["children"], json!([]));
    }

    #[tokio::test]
    async fn rejects_children_of_the_wrong_class() {
        let f = setup();
        let array = create_feature(&f, "alice", "array", "North").await;
        let pipeline = create_feature(&f, "alice", "pipeline", "Main line").await;

        let response = f
            .server
            .post(&format!("/features/array/{}/add/{}", array, pipeline))
            .add_header(USER, "alice")
            .await;

        response.assert_status_bad_request();
    }

    #[tokio::test]
    async fn rejected_batch_moves_nothing() {
        let f = setup();
        let array = create_feature(&f, "alice", "array", "North").await;
        let mpa = create_feature(&f, "alice", "mpa", "Reef").await;
        let pipeline = create_feature(&f, "alice", "pipeline", "Main line").await;

        f.server
            .post(&format!("/features/array/{}/add/{},{}", array, mpa, pipeline))
            .add_header(USER, "alice")
            .await
            .assert_status_bad_request();

        let (model_uid, pk) = parse_uid(&mpa).expect("valid uid");
        let reef = f
            .db
            .get_instance(model_uid, pk)
            .expect("Failed to load")
            .expect("instance exists");
        assert_eq!(reef.collection, None);
        assert!(f.db.children_of(&array).expect("Failed to list").is_empty());
    }

    #[tokio::test]
    async fn rejects_containment_cycles() {
        let f = setup();
        let outer = create_feature(&f, "alice", "folder", "Outer").await;
        let inner = create_feature(&f, "alice", "folder", "Inner").await;

        f.server
            .post(&format!("/features/folder/{}/add/{}", outer, inner))
            .add_header(USER, "alice")
            .await
            .assert_status_ok();

        f.server
            .post(&format!("/features/folder/{}/add/{}", inner, outer))
            .add_header(USER, "alice")
            .await
            .assert_status_bad_request();

        f.server
            .post(&format!("/features/folder/{}/add/{}", outer, outer))
            .add_header(USER, "alice")
            .await
            .assert_status_bad_request();
    }

    #[tokio::test]
    async fn features_are_not_collections() {
        let f = setup();
        let mpa = create_feature(&f, "alice", "mpa", "Reef").await;
        let other = create_feature(&f, "alice", "mpa", "Shoal").await;

        let response = f
            .server
            .post(&format!("/features/mpa/{}/add/{}", mpa, other))
            .add_header(USER, "alice")
            .await;

        response.assert_status(StatusCode::NOT_FOUND);
    }
}

mod links {
    use super::*;

    #[tokio::test]
    async fn exports_geojson_as_an_attachment() {
        let f = setup();
        let uid = create_feature(&f, "alice", "mpa", "Reef").await;

        let response = f
            .server
            .get(&format!("/features/generic-links/links/geojson/{}/", uid))
            .add_header(USER, "alice")
            .await;

        response.assert_status_ok();
        let headers = response.headers();
        assert_eq!(headers["content-type"], "application/json");
        assert_eq!(headers["content-disposition"], "attachment; filename=\"reef.geojson\"");
        let doc: Value = response.json();
        assert_eq!(doc["features"][0]["properties"]["name"], "Reef");
    }

    #[tokio::test]
    async fn rejects_the_wrong_method() {
        let f = setup();
        let uid = create_feature(&f, "alice", "mpa", "Reef").await;

        let response = f
            .server
            .get(&format!("/features/generic-links/links/copy/{}/", uid))
            .add_header(USER, "alice")
            .await;

        response.assert_status(StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn kmz_is_not_implemented() {
        let f = setup();
        let uid = create_feature(&f, "alice", "mpa", "Reef").await;

        let response = f
            .server
            .get(&format!("/features/generic-links/links/kmz/{}/", uid))
            .add_header(USER, "alice")
            .await;

        response.assert_status(StatusCode::NOT_IMPLEMENTED);
    }

    #[tokio::test]
    async fn copy_needs_a_viewable_feature() {
        let f = setup();
        let uid = create_feature(&f, "alice", "mpa", "Reef").await;
        let path = format!("/features/generic-links/links/copy/{}/", uid);

        f.server
            .post(&path)
            .add_header(USER, "bob")
            .await
            .assert_status(StatusCode::FORBIDDEN);

        f.server
            .post(&format!("/features/mpa/{}/share/", uid))
            .add_header(USER, "alice")
            .json(&json!({ "groups": [f.reef_team] }))
            .await
            .assert_status_ok();

        let response = f.server.post(&path).add_header(USER, "bob").await;
        response.assert_status(StatusCode::CREATED);
        let copied = response.json::<Value>()["copied"][0].as_str().unwrap().to_string();
        let (model_uid, pk) = parse_uid(&copied).unwrap();
        let copy = f.db.get_instance(model_uid, pk).unwrap().unwrap();
        assert_eq!(copy.name, "Reef (copy)");
    }

    #[tokio::test]
    async fn delete_is_for_owners_only() {
        let f = setup();
        let uid = create_feature(&f, "alice", "mpa", "Reef").await;
        let path = format!("/features/generic-links/links/delete/{}/", uid);

        f.server
            .delete(&path)
            .add_header(USER, "bob")
            .await
            .assert_status(StatusCode::FORBIDDEN);

        let response = f.server.delete(&path).add_header(USER, "alice").await;
        response.assert_status_ok();
        assert_eq!(response.json::<Value>()["deleted"], json!([uid]));
    }

    #[tokio::test]
    async fn single_select_links_take_one_feature() {
        let f = setup();
        let first = create_feature(&f, "alice", "mpa", "Reef").await;
        let second = create_feature(&f, "alice", "mpa", "Shoal").await;

        let response = f
            .server
            .get(&format!("/features/mpa/links/habitat-report/{},{}/", first, second))
            .add_header(USER, "alice")
            .await;

        response.assert_status_bad_request();
    }

    #[tokio::test]
    async fn unknown_links_are_not_found() {
        let f = setup();
        let uid = create_feature(&f, "alice", "mpa", "Reef").await;

        let response = f
            .server
            .get(&format!("/features/mpa/links/teleport/{}/", uid))
            .add_header(USER, "alice")
            .await;

        response.assert_status(StatusCode::NOT_FOUND);
    }
}

mod workspaces {
    use super::*;

    #[tokio::test]
    async fn public_workspace_has_no_edit_links() {
        let f = setup();

        let response = f.server.get("/features/workspaces/public.json").await;

        response.assert_status_ok();
        let doc: Value = response.json();
        let mpa = &doc["feature-classes"][0];
        assert_eq!(mpa["id"], "marine_mpa");
        assert!(mpa["link-relations"].get("create").is_none());
        assert!(mpa["link-relations"].get("edit").is_none());
        let generic = doc["generic-links"].as_array().unwrap();
        assert!(generic.iter().all(|l| l["rel"] != "edit"));
    }

    #[tokio::test]
    async fn owner_workspace_offers_create_templates() {
        let f = setup();

        let response = f
            .server
            .get("/features/workspaces/alice/owner.json")
            .add_header(USER, "alice")
            .await;

        response.assert_status_ok();
        let doc: Value = response.json();
        assert_eq!(
            doc["feature-classes"][0]["link-relations"]["create"]["uri-template"],
            "/features/mpa/form/"
        );
    }

    #[tokio::test]
    async fn workspace_can_be_limited_to_models() {
        let f = setup();

        let response = f
            .server
            .get("/features/workspaces/alice/shared.json")
            .add_query_param("models", "marine_folder,marine_array")
            .add_header(USER, "alice")
            .await;

        response.assert_status_ok();
        let doc: Value = response.json();
        assert_eq!(doc["feature-classes"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn other_users_workspaces_are_forbidden() {
        let f = setup();

        f.server
            .get("/features/workspaces/alice/owner.json")
            .add_header(USER, "bob")
            .await
            .assert_status(StatusCode::FORBIDDEN);

        f.server
            .get("/features/workspaces/alice/owner.json")
            .await
            .assert_status(StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn feature_tree_css_has_one_rule_per_icon() {
        let f = setup();

        let response = f.server.get("/features/feature_tree.css").await;

        response.assert_status_ok();
        let css = response.text();
        assert!(css.contains("li.marine_mpa > a > .jstree-icon"));
        assert!(!css.contains("marine_shipwreck"));
    }
}
