//! HTTP integration tests: bind a real listener, drive it with `reqwest`.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::{net::SocketAddr, path::Path, sync::Arc};

use bookledger_bridge::{
    BridgeConfig, GatewayError, Identity, LedgerBridge, MemoryNetwork, MemoryWallet,
    testutil::{StubGateway, test_bridge},
};
use bookledger_server::{AppState, development_network, serve};
use serde_json::{Value, json};
use tokio::sync::oneshot;

struct TestServer {
    addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn start(bridge: LedgerBridge, pages_dir: &Path) -> Self {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("local addr");
        let (tx, rx) = oneshot::channel();
        let state = AppState::new(Arc::new(bridge), pages_dir);
        let handle = tokio::spawn(async move {
            serve(listener, state, async {
                let _ = rx.await;
            })
            .await
            .expect("serve");
        });
        Self { addr, shutdown: Some(tx), handle }
    }

    fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    async fn stop(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        self.handle.await.expect("server task");
    }
}

fn pages() -> tempfile::TempDir {
    let dir = tempfile::tempdir().expect("tempdir");
    std::fs::write(dir.path().join("index.html"), "<h1>index</h1>").unwrap();
    std::fs::write(dir.path().join("querybook.html"), "<h1>query</h1>").unwrap();
    dir
}

fn create_form(library: &str) -> [(&'static str, String); 5] {
    [
        ("bookname", "B1".to_owned()),
        ("author", "A1".to_owned()),
        ("publisher", "P1".to_owned()),
        ("location", "L1".to_owned()),
        ("library", library.to_owned()),
    ]
}

#[tokio::test]
async fn query_returns_wrapped_record() {
    let dir = pages();
    let gateway =
        StubGateway::new().with_evaluate_response(r#"{"bookName":"B1","location":"L1"}"#);
    let server = TestServer::start(test_bridge(&gateway), dir.path()).await;

    let resp = reqwest::Client::new()
        .post(server.url("/api/querybook/"))
        .form(&[("bookname", "B1"), ("location", "L1")])
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body, json!({"response": {"bookName": "B1", "location": "L1"}}));
    assert_eq!(gateway.invocations()[0].args, vec!["B1", "L1"]);
    server.stop().await;
}

#[tokio::test]
async fn create_returns_acknowledgement() {
    let dir = pages();
    let gateway = StubGateway::new();
    let server = TestServer::start(test_bridge(&gateway), dir.path()).await;

    let resp = reqwest::Client::new()
        .post(server.url("/api/createbook"))
        .form(&create_form("Lib1"))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body, json!({"response": "Transaction has been submitted"}));
    assert_eq!(gateway.invocations()[0].args, vec!["B1", "A1", "P1", "L1", "Lib1"]);
    assert_eq!(gateway.connects(), gateway.disconnects());
    server.stop().await;
}

#[tokio::test]
async fn ledger_failure_is_bad_request_with_message() {
    let dir = pages();
    let gateway = StubGateway::new().fail_submit(GatewayError::Endorsement {
        message: "policy not satisfied".into(),
    });
    let server = TestServer::start(test_bridge(&gateway), dir.path()).await;

    let resp = reqwest::Client::new()
        .post(server.url("/api/createbook/"))
        .form(&create_form("Lib1"))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body, json!("policy not satisfied"));
    server.stop().await;
}

#[tokio::test]
async fn panicking_ledger_client_still_gets_a_reply() {
    let dir = pages();
    let gateway = StubGateway::new().panic_on_invoke("peer client bug");
    let server = TestServer::start(test_bridge(&gateway), dir.path()).await;

    let resp = reqwest::Client::new()
        .post(server.url("/api/querybook/"))
        .form(&[("bookname", "B1"), ("location", "L1")])
        .send()
        .await
        .expect("server must answer even when the ledger client panics");

    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body, json!("ledger client panicked: peer client bug"));
    assert_eq!(gateway.connects(), gateway.disconnects());
    server.stop().await;
}

#[tokio::test]
async fn missing_identity_is_bad_request() {
    let dir = pages();
    let gateway = StubGateway::new();
    let bridge = LedgerBridge::new(
        BridgeConfig::default(),
        Arc::new(MemoryWallet::new()),
        Arc::new(gateway.clone()),
    );
    let server = TestServer::start(bridge, dir.path()).await;

    let resp = reqwest::Client::new()
        .post(server.url("/api/querybook"))
        .form(&[("bookname", "B1"), ("location", "L1")])
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body, json!("An identity for the user \"user1\" does not exist in the wallet"));
    assert_eq!(gateway.connects(), 0);
    server.stop().await;
}

#[tokio::test]
async fn missing_form_field_never_reaches_bridge() {
    let dir = pages();
    let gateway = StubGateway::new();
    let server = TestServer::start(test_bridge(&gateway), dir.path()).await;

    let resp = reqwest::Client::new()
        .post(server.url("/api/querybook/"))
        .form(&[("bookname", "B1")])
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 400);
    assert_eq!(gateway.connects(), 0);
    server.stop().await;
}

#[tokio::test]
async fn pages_are_served_and_missing_page_is_404() {
    let dir = pages();
    let server = TestServer::start(test_bridge(&StubGateway::new()), dir.path()).await;
    let client = reqwest::Client::new();

    let index = client.get(server.url("/")).send().await.unwrap();
    assert_eq!(index.status(), 200);
    assert_eq!(index.text().await.unwrap(), "<h1>index</h1>");

    let query = client.get(server.url("/api/querybook")).send().await.unwrap();
    assert_eq!(query.status(), 200);

    let create = client.get(server.url("/api/createbook")).send().await.unwrap();
    assert_eq!(create.status(), 404);
    server.stop().await;
}

#[tokio::test]
async fn healthz_reports_ok() {
    let dir = pages();
    let server = TestServer::start(test_bridge(&StubGateway::new()), dir.path()).await;

    let body: Value =
        reqwest::get(server.url("/healthz")).await.unwrap().json().await.unwrap();

    assert_eq!(body, json!({"status": "ok"}));
    server.stop().await;
}

#[tokio::test]
async fn development_network_round_trip() {
    let dir = pages();
    let network = MemoryNetwork::default().with_channel("mychannel");
    let wallet = MemoryWallet::with_identities([Identity::new("user1", "Org1MSP", "cert")]);
    let bridge = LedgerBridge::new(BridgeConfig::default(), Arc::new(wallet), Arc::new(network));
    let server = TestServer::start(bridge, dir.path()).await;
    let client = reqwest::Client::new();

    for library in ["Lib1", "Lib2"] {
        let resp =
            client.post(server.url("/api/createbook/")).form(&create_form(library)).send().await.unwrap();
        assert_eq!(resp.status(), 200);
    }

    let resp = client
        .post(server.url("/api/querybook/"))
        .form(&[("bookname", "B1"), ("location", "L1")])
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    let books = body["response"].as_array().expect("array of books");
    assert_eq!(books.len(), 2);
    assert_eq!(books[0]["library"], "Lib1");
    server.stop().await;
}

#[tokio::test]
async fn seeded_development_network_serves_sample_catalog() {
    let dir = pages();
    let config = BridgeConfig::default();
    let network = development_network(&config, true).unwrap();
    let wallet = MemoryWallet::with_identities([Identity::new("user1", "Org1MSP", "cert")]);
    let bridge = LedgerBridge::new(config, Arc::new(wallet), Arc::new(network));
    let server = TestServer::start(bridge, dir.path()).await;

    let resp = reqwest::Client::new()
        .post(server.url("/api/querybook/"))
        .form(&[("bookname", "연금술사"), ("location", "고양시")])
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    let books = body["response"].as_array().expect("array of books");
    assert_eq!(books.len(), 9);
    assert_eq!(books[0]["author"], "파울로 코엘료");
    server.stop().await;
}
