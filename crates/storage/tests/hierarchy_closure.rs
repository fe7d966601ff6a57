use oc_storage::{CreateAgentRequest, SqliteStore, UpdateAgentRequest};
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

fn temp_storage_dir(label: &str) -> PathBuf {
    let mut path = std::env::temp_dir();
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock should be monotonic enough for tests")
        .as_nanos();
    path.push(format!("orgcore-{label}-{}-{nanos}", std::process::id()));
    std::fs::create_dir_all(&path).expect("temp storage dir must be creatable");
    path
}

fn agent(id: &str, role: &str, reporting_to: Option<&str>) -> CreateAgentRequest {
    CreateAgentRequest {
        id: id.to_string(),
        role: role.to_string(),
        display_name: id.to_string(),
        reporting_to: reporting_to.map(str::to_string),
        created_by: None,
        main_goal: None,
        config_path: None,
    }
}

fn seed_chain(store: &mut SqliteStore) {
    store
        .create_agent(agent("ceo-001", "ceo", None))
        .expect("root agent should be created");
    store
        .create_agent(agent("cto-001", "cto", Some("ceo-001")))
        .expect("cto should be created under the ceo");
    store
        .create_agent(agent("dev-001", "dev", Some("cto-001")))
        .expect("dev should be created under the cto");
}

#[test]
fn closure_rows_follow_the_reporting_chain() {
    let dir = temp_storage_dir("closure-chain");
    let mut store = SqliteStore::open(&dir).expect("fresh storage should open");
    seed_chain(&mut store);

    let rows = store
        .get_agent_closure("dev-001")
        .expect("dev closure should read");
    assert_eq!(rows.len(), 3, "dev must have self + two ancestors");

    assert_eq!(rows[0].ancestor_id, "dev-001");
    assert_eq!(rows[0].depth, 0);
    assert_eq!(rows[0].path, "dev");

    assert_eq!(rows[1].ancestor_id, "cto-001");
    assert_eq!(rows[1].depth, 1);
    assert_eq!(rows[1].path, "cto/dev");

    assert_eq!(rows[2].ancestor_id, "ceo-001");
    assert_eq!(rows[2].depth, 2);
    assert_eq!(rows[2].path, "ceo/cto/dev");
}

#[test]
fn reparent_prunes_and_rebuilds_the_ancestor_chain() {
    let dir = temp_storage_dir("reparent-direct");
    let mut store = SqliteStore::open(&dir).expect("fresh storage should open");
    seed_chain(&mut store);

    store
        .update_agent(
            "dev-001",
            UpdateAgentRequest {
                reporting_to: Some(Some("ceo-001".to_string())),
                ..Default::default()
            },
        )
        .expect("dev should reparent to the ceo");

    let rows = store
        .get_agent_closure("dev-001")
        .expect("dev closure should read");
    assert_eq!(rows.len(), 2, "exactly self + ceo must remain");
    assert_eq!(rows[0].depth, 0);
    assert_eq!(rows[1].ancestor_id, "ceo-001");
    assert_eq!(rows[1].depth, 1);
    assert_eq!(rows[1].path, "ceo/dev");
}

#[test]
fn reparent_cascades_through_every_descendant() {
    let dir = temp_storage_dir("reparent-cascade");
    let mut store = SqliteStore::open(&dir).expect("fresh storage should open");
    seed_chain(&mut store);
    store
        .create_agent(agent("jr-001", "jr", Some("dev-001")))
        .expect("jr should be created under the dev");

    store
        .update_agent(
            "dev-001",
            UpdateAgentRequest {
                reporting_to: Some(Some("ceo-001".to_string())),
                ..Default::default()
            },
        )
        .expect("dev should reparent to the ceo");

    let rows = store
        .get_agent_closure("jr-001")
        .expect("jr closure should read");
    assert_eq!(rows.len(), 3, "jr must lose the cto ancestor");
    assert_eq!(rows[1].ancestor_id, "dev-001");
    assert_eq!(rows[1].path, "dev/jr");
    assert_eq!(rows[2].ancestor_id, "ceo-001");
    assert_eq!(rows[2].depth, 2);
    assert_eq!(rows[2].path, "ceo/dev/jr");
}

#[test]
fn reparent_to_null_creates_a_new_root() {
    let dir = temp_storage_dir("reparent-null");
    let mut store = SqliteStore::open(&dir).expect("fresh storage should open");
    seed_chain(&mut store);

    store
        .update_agent(
            "dev-001",
            UpdateAgentRequest {
                reporting_to: Some(None),
                ..Default::default()
            },
        )
        .expect("dev should detach into a new root");

    let rows = store
        .get_agent_closure("dev-001")
        .expect("dev closure should read");
    assert_eq!(rows.len(), 1, "only the self row must remain");
    assert_eq!(rows[0].depth, 0);
    assert_eq!(rows[0].path, "dev");
}

#[test]
fn role_change_rewrites_descendant_paths() {
    let dir = temp_storage_dir("role-change");
    let mut store = SqliteStore::open(&dir).expect("fresh storage should open");
    seed_chain(&mut store);

    store
        .update_agent(
            "cto-001",
            UpdateAgentRequest {
                role: Some("vp".to_string()),
                ..Default::default()
            },
        )
        .expect("cto role should update");

    let rows = store
        .get_agent_closure("dev-001")
        .expect("dev closure should read");
    assert_eq!(rows[1].path, "vp/dev");
    assert_eq!(rows[2].path, "ceo/vp/dev");
}

#[test]
fn reporting_cycles_are_rejected() {
    let dir = temp_storage_dir("cycle-guard");
    let mut store = SqliteStore::open(&dir).expect("fresh storage should open");
    seed_chain(&mut store);

    let err = store
        .update_agent(
            "ceo-001",
            UpdateAgentRequest {
                reporting_to: Some(Some("dev-001".to_string())),
                ..Default::default()
            },
        )
        .expect_err("reparenting under a descendant must fail");
    assert_eq!(err.code(), "HIERARCHY_CYCLE");

    let err = store
        .update_agent(
            "cto-001",
            UpdateAgentRequest {
                reporting_to: Some(Some("cto-001".to_string())),
                ..Default::default()
            },
        )
        .expect_err("self-reporting must fail");
    assert_eq!(err.code(), "HIERARCHY_CYCLE");
}

#[test]
fn malformed_and_duplicate_ids_are_rejected() {
    let dir = temp_storage_dir("id-validation");
    let mut store = SqliteStore::open(&dir).expect("fresh storage should open");

    for bad in ["", "x", "-abc", "abc-", "Upper", "under_score"] {
        let err = store
            .create_agent(agent(bad, "worker", None))
            .expect_err("malformed id must be rejected");
        assert_eq!(err.code(), "INVALID_INPUT", "{bad:?} must not validate");
    }

    store
        .create_agent(agent("ceo-001", "ceo", None))
        .expect("root agent should be created");
    let err = store
        .create_agent(agent("ceo-001", "ceo", None))
        .expect_err("duplicate id must be rejected");
    assert_eq!(err.code(), "ALREADY_EXISTS");

    let err = store
        .create_agent(agent("lost-001", "dev", Some("ghost-001")))
        .expect_err("unknown manager must be rejected");
    assert_eq!(err.code(), "NOT_FOUND");
}

#[test]
fn subordinates_list_in_breadth_order() {
    let dir = temp_storage_dir("subordinates");
    let mut store = SqliteStore::open(&dir).expect("fresh storage should open");
    store
        .create_agent(agent("ceo-001", "ceo", None))
        .expect("root agent should be created");
    store
        .create_agent(agent("mgr-b", "mgr", Some("ceo-001")))
        .expect("mgr-b should be created");
    store
        .create_agent(agent("mgr-a", "mgr", Some("ceo-001")))
        .expect("mgr-a should be created");
    store
        .create_agent(agent("dev-001", "dev", Some("mgr-b")))
        .expect("dev should be created");

    let subordinates = store
        .get_subordinates("ceo-001")
        .expect("subordinates should list");
    let ids: Vec<&str> = subordinates.iter().map(|a| a.id.as_str()).collect();
    assert_eq!(
        ids,
        vec!["mgr-a", "mgr-b", "dev-001"],
        "depth first, then display name within a depth"
    );

    let err = store
        .get_subordinates("ghost-001")
        .expect_err("unknown manager must be rejected");
    assert_eq!(err.code(), "NOT_FOUND");
}

#[test]
fn org_chart_orders_by_root_path() {
    let dir = temp_storage_dir("org-chart");
    let mut store = SqliteStore::open(&dir).expect("fresh storage should open");
    seed_chain(&mut store);

    let chart = store.get_org_chart().expect("org chart should read");
    let entries: Vec<(&str, i64, &str)> = chart
        .iter()
        .map(|entry| (entry.agent.id.as_str(), entry.depth, entry.path.as_str()))
        .collect();
    assert_eq!(
        entries,
        vec![
            ("ceo-001", 0, "ceo"),
            ("cto-001", 1, "ceo/cto"),
            ("dev-001", 2, "ceo/cto/dev"),
        ]
    );
}

#[test]
fn repeated_reparenting_keeps_one_row_per_ancestor() {
    let dir = temp_storage_dir("reparent-invariant");
    let mut store = SqliteStore::open(&dir).expect("fresh storage should open");
    seed_chain(&mut store);
    store
        .create_agent(agent("ops-001", "ops", Some("ceo-001")))
        .expect("ops should be created under the ceo");

    // Bounce dev between managers a few times; after each move its
    // closure must hold exactly one row per true ancestor.
    for manager in ["ceo-001", "ops-001", "cto-001", "ops-001"] {
        store
            .update_agent(
                "dev-001",
                UpdateAgentRequest {
                    reporting_to: Some(Some(manager.to_string())),
                    ..Default::default()
                },
            )
            .expect("reparent should succeed");

        let rows = store
            .get_agent_closure("dev-001")
            .expect("closure should read");
        let mut ancestors: Vec<&str> = rows.iter().map(|r| r.ancestor_id.as_str()).collect();
        ancestors.sort_unstable();
        ancestors.dedup();
        assert_eq!(
            ancestors.len(),
            rows.len(),
            "no duplicate ancestor rows after moving under {manager}"
        );
        assert_eq!(rows[0].depth, 0, "self row must survive every move");
        let direct = rows.iter().find(|r| r.depth == 1).expect("direct manager row");
        assert_eq!(direct.ancestor_id, manager);
    }
}

#[test]
fn fired_agents_accept_no_updates_and_no_direct_fired_status() {
    let dir = temp_storage_dir("update-guards");
    let mut store = SqliteStore::open(&dir).expect("fresh storage should open");
    seed_chain(&mut store);

    let err = store
        .update_agent(
            "dev-001",
            UpdateAgentRequest {
                status: Some("fired".to_string()),
                ..Default::default()
            },
        )
        .expect_err("fired must not be settable through update_agent");
    assert_eq!(err.code(), "FORBIDDEN");

    let updated = store
        .update_agent(
            "dev-001",
            UpdateAgentRequest {
                status: Some("paused".to_string()),
                ..Default::default()
            },
        )
        .expect("pausing should succeed");
    assert_eq!(updated.status, "paused");

    let err = store
        .update_agent("dev-001", UpdateAgentRequest::default())
        .expect_err("empty updates must be rejected");
    assert_eq!(err.code(), "INVALID_INPUT");
}

#[test]
fn execution_counters_accumulate() {
    let dir = temp_storage_dir("execution-counters");
    let mut store = SqliteStore::open(&dir).expect("fresh storage should open");
    store
        .create_agent(agent("ceo-001", "ceo", None))
        .expect("root agent should be created");

    store
        .record_agent_execution("ceo-001", 2.5)
        .expect("first execution should record");
    let row = store
        .record_agent_execution("ceo-001", 1.5)
        .expect("second execution should record");

    assert_eq!(row.total_executions, 2);
    assert!((row.total_runtime_minutes - 4.0).abs() < f64::EPSILON);
    assert!(row.last_execution_at.is_some());
}
