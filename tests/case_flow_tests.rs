mod mocks;

use mocks::{json_response, status_response, ScriptedTransport};
use serde_json::json;
use std::fs;
use std::sync::Arc;
use tempfile::TempDir;

use caseflow::{
    discover_case_files, CaseRunner, FixtureLookup, HelperRegistry, RunSummary, VariableStore,
};

fn runner_with(
    dir: &TempDir,
    transport: Arc<ScriptedTransport>,
    lookup: Option<Arc<FixtureLookup>>,
) -> (CaseRunner, Arc<VariableStore>) {
    let store_path = dir.path().join("extract.yaml");
    let store = Arc::new(VariableStore::new(&store_path));
    let registry = Arc::new(HelperRegistry::with_builtins(
        &store_path,
        dir.path().join("config.yaml"),
    ));
    let lookup = lookup.map(|l| l as Arc<dyn caseflow::DatabaseLookup>);
    let runner = CaseRunner::assemble(store.clone(), registry, transport, lookup);
    (runner, store)
}

fn write_case_file(dir: &TempDir, name: &str, content: &str) {
    let cases = dir.path().join("cases");
    fs::create_dir_all(&cases).unwrap();
    fs::write(cases.join(name), content).unwrap();
}

fn case_files(dir: &TempDir) -> Vec<std::path::PathBuf> {
    discover_case_files(&dir.path().join("cases")).unwrap()
}

#[tokio::test]
async fn test_login_flow_with_token_propagation() {
    let dir = TempDir::new().unwrap();
    write_case_file(
        &dir,
        "login_flow.yaml",
        r#"
- feature: auth
  story: login
  title: obtain token
  request:
    method: post
    url: /api/login
    json:
      user: admin
      password: secret
  extract:
    access_token: [json, $.data.token, 0]
  validate:
    equals:
      status ok: [200, status_code]
- feature: auth
  story: profile
  title: fetch profile with token
  request:
    method: get
    url: /api/me
    headers:
      Authorization: Bearer ${read_yaml(access_token)}
  validate:
    contains:
      greeting present: [welcome, text]
"#,
    );

    let transport = Arc::new(ScriptedTransport::new(vec![
        json_response(r#"{"data": {"token": "tok-abc"}, "code": 0}"#),
        json_response(r#"{"msg": "welcome back admin"}"#),
    ]));
    let (runner, store) = runner_with(&dir, transport.clone(), None);

    let summary = runner.run_files(&case_files(&dir)).await.unwrap();
    assert_eq!(summary, RunSummary { passed: 2, failed: 0, skipped: 0 });
    assert_eq!(store.get("access_token"), Some(json!("tok-abc")));

    let sent = transport.requests();
    assert_eq!(
        sent[1].headers.get("Authorization"),
        Some(&"Bearer tok-abc".to_string())
    );
}

#[tokio::test]
async fn test_parametrized_file_runs_one_case_per_row() {
    let dir = TempDir::new().unwrap();
    write_case_file(
        &dir,
        "ddt_login.yaml",
        r#"
- feature: auth
  story: login
  title: login as $ddt{user}
  request:
    method: post
    url: /api/login
    json:
      user: $ddt{user}
      pin: $ddt{pin}
  parametrize:
    - [user, pin]
    - [alice, '0001']
    - [bob, '0002']
    - [carol, '0003']
"#,
    );

    let transport = Arc::new(ScriptedTransport::new(vec![
        json_response("{}"),
        json_response("{}"),
        json_response("{}"),
    ]));
    let (runner, _store) = runner_with(&dir, transport.clone(), None);

    let summary = runner.run_files(&case_files(&dir)).await.unwrap();
    assert_eq!(summary.passed, 3);

    let sent = transport.requests();
    assert_eq!(sent.len(), 3);
    assert_eq!(sent[0].json.as_ref().unwrap()["user"], json!("alice"));
    // digit-string parameters survive reparsing as strings
    assert_eq!(sent[2].json.as_ref().unwrap()["pin"], json!("0003"));
}

#[tokio::test]
async fn test_db_assertion_through_lookup_collaborator() {
    let dir = TempDir::new().unwrap();
    write_case_file(
        &dir,
        "db_check.yaml",
        r#"
- feature: users
  story: create
  title: created user is visible in the response
  request:
    method: post
    url: /api/users
    json:
      name: alice
  validate:
    db_contains:
      name persisted: [select name from users order by id desc limit 1, text]
"#,
    );

    let lookup = Arc::new(FixtureLookup::new().with_row(
        "select name from users order by id desc limit 1",
        json!("alice"),
    ));
    let transport = Arc::new(ScriptedTransport::new(vec![json_response(
        r#"{"msg": "user alice created"}"#,
    )]));
    let (runner, _store) = runner_with(&dir, transport, Some(lookup));

    let summary = runner.run_files(&case_files(&dir)).await.unwrap();
    assert_eq!(summary, RunSummary { passed: 1, failed: 0, skipped: 0 });
}

#[tokio::test]
async fn test_assertion_failure_fails_case_and_skips_rest_of_flow() {
    let dir = TempDir::new().unwrap();
    write_case_file(
        &dir,
        "failing_flow.yaml",
        r#"
- feature: orders
  story: checkout
  title: wrong status expectation
  request:
    method: get
    url: /api/orders
  validate:
    equals:
      expects created: [201, status_code]
- feature: orders
  story: checkout
  title: never reached
  request:
    method: get
    url: /api/orders/1
"#,
    );

    let transport = Arc::new(ScriptedTransport::new(vec![
        status_response(200, "{}"),
        status_response(200, "{}"),
    ]));
    let (runner, _store) = runner_with(&dir, transport.clone(), None);

    let summary = runner.run_files(&case_files(&dir)).await.unwrap();
    assert_eq!(summary, RunSummary { passed: 0, failed: 1, skipped: 1 });
    assert_eq!(transport.requests().len(), 1);
}

#[tokio::test]
async fn test_store_is_cleared_once_per_run() {
    let dir = TempDir::new().unwrap();
    write_case_file(
        &dir,
        "extracting.yaml",
        r#"
- feature: f
  story: s
  title: extract id
  request:
    method: get
    url: /api/item
  extract:
    item_id: [json, $.id, 0]
"#,
    );

    let (runner, store) = runner_with(
        &dir,
        Arc::new(ScriptedTransport::new(vec![json_response(r#"{"id": 7}"#)])),
        None,
    );
    // stale value from a previous run must not survive the flush
    store.clear().unwrap();
    store.set("stale", json!("old")).unwrap();

    let summary = runner.run_files(&case_files(&dir)).await.unwrap();
    assert_eq!(summary.passed, 1);
    assert_eq!(store.get("stale"), None);
    assert_eq!(store.get("item_id"), Some(json!(7)));
}

#[tokio::test]
async fn test_unparseable_case_file_counts_as_failure() {
    let dir = TempDir::new().unwrap();
    write_case_file(&dir, "broken.yaml", "feature: not-a-list\n");

    let (runner, _store) = runner_with(
        &dir,
        Arc::new(ScriptedTransport::new(vec![])),
        None,
    );
    let summary = runner.run_files(&case_files(&dir)).await.unwrap();
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.passed, 0);
}

#[tokio::test]
async fn test_helper_expressions_resolve_inside_request_payload() {
    let dir = TempDir::new().unwrap();
    write_case_file(
        &dir,
        "helpers.yaml",
        r#"
- feature: f
  story: s
  title: computed payload
  request:
    method: post
    url: /api/sum
    json:
      total: ${add(40,2)}
      digest: ${md5(hello)}
"#,
    );

    let transport = Arc::new(ScriptedTransport::new(vec![json_response("{}")]));
    let (runner, _store) = runner_with(&dir, transport.clone(), None);

    let summary = runner.run_files(&case_files(&dir)).await.unwrap();
    assert_eq!(summary.passed, 1);

    let body = transport.requests()[0].json.clone().unwrap();
    assert_eq!(body["total"], json!(42));
    assert_eq!(body["digest"], json!("5d41402abc4b2a76b9719d911017c592"));
}
