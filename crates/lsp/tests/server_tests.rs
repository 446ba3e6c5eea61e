//! Protocol-level tests over an in-memory connection.

use std::collections::VecDeque;
use std::path::Path;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use bsl_lsp::SETTINGS_SECTION;
use lsp_server::{Connection, Message, Notification, Request, RequestId, Response};
use serde_json::{json, Value};

const TIMEOUT: Duration = Duration::from_secs(10);
const MODULE_URI: &str = "file:///project/src/Module.bsl";
const MODULE: &str = "Процедура Тест()\n\tА=1;\nКонецПроцедуры\n";

struct TestClient {
    connection: Connection,
    server: Option<JoinHandle<anyhow::Result<()>>>,
    pending: VecDeque<Notification>,
    next_id: i32,
}

impl TestClient {
    fn start() -> Self {
        Self::start_in(None)
    }

    fn start_in(root: Option<&Path>) -> Self {
        let (server, connection) = Connection::memory();
        let handle = std::thread::spawn(move || bsl_lsp::serve(&server));
        let mut client = Self {
            connection,
            server: Some(handle),
            pending: VecDeque::new(),
            next_id: 0,
        };

        let folders = root.map(|root| {
            let uri = url::Url::from_directory_path(root).unwrap();
            json!([{ "uri": uri.as_str(), "name": "project" }])
        });
        let result = client.request(
            "initialize",
            json!({ "capabilities": {}, "workspaceFolders": folders }),
        );
        assert_eq!(result["serverInfo"]["name"], "bsl-language-server");
        client.notify("initialized", json!({}));
        client
    }

    fn send(&self, message: Message) {
        self.connection.sender.send(message).unwrap();
    }

    fn notify(&self, method: &str, params: Value) {
        self.send(Message::Notification(Notification::new(method.to_string(), params)));
    }

    fn request_raw(&mut self, method: &str, params: Value) -> Response {
        self.next_id += 1;
        let id = RequestId::from(self.next_id);
        self.send(Message::Request(Request::new(id.clone(), method.to_string(), params)));
        loop {
            match self.recv() {
                Message::Response(response) if response.id == id => return response,
                Message::Notification(notification) => self.pending.push_back(notification),
                other => panic!("unexpected message {other:?}"),
            }
        }
    }

    fn request(&mut self, method: &str, params: Value) -> Value {
        let response = self.request_raw(method, params);
        assert!(response.error.is_none(), "{method} failed: {:?}", response.error);
        response.result.unwrap_or(Value::Null)
    }

    fn recv(&self) -> Message {
        self.connection
            .receiver
            .recv_timeout(TIMEOUT)
            .expect("server did not answer in time")
    }

    /// Next notification matching `method` and `filter`, skipping others.
    fn notification(&mut self, method: &str, filter: impl Fn(&Value) -> bool) -> Value {
        if let Some(index) = self
            .pending
            .iter()
            .position(|n| n.method == method && filter(&n.params))
        {
            let found = self.pending.remove(index).unwrap();
            self.pending.drain(..index);
            return found.params;
        }
        self.pending.clear();

        let deadline = Instant::now() + TIMEOUT;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let message = self
                .connection
                .receiver
                .recv_timeout(remaining)
                .unwrap_or_else(|_| panic!("no {method} notification"));
            if let Message::Notification(notification) = message {
                if notification.method == method && filter(&notification.params) {
                    return notification.params;
                }
            }
        }
    }

    fn diagnostics(&mut self, uri: &str, version: Option<i32>) -> Vec<Value> {
        let params = self.notification("textDocument/publishDiagnostics", |params| {
            params["uri"] == uri && params.get("version").and_then(Value::as_i64) == version.map(i64::from)
        });
        params["diagnostics"].as_array().cloned().unwrap_or_default()
    }

    fn open(&self, uri: &str, version: i32, text: &str) {
        self.notify(
            "textDocument/didOpen",
            json!({ "textDocument": {
                "uri": uri, "languageId": "bsl", "version": version, "text": text
            }}),
        );
    }

    fn shutdown(mut self) {
        self.request("shutdown", Value::Null);
        self.notify("exit", Value::Null);
        if let Some(server) = self.server.take() {
            server.join().unwrap().unwrap();
        }
    }
}

fn codes(diagnostics: &[Value]) -> Vec<&str> {
    diagnostics
        .iter()
        .filter_map(|d| d["code"].as_str())
        .collect()
}

#[test]
fn test_initialize_advertises_capabilities() {
    let (server, connection) = Connection::memory();
    let handle = std::thread::spawn(move || bsl_lsp::serve(&server));
    connection
        .sender
        .send(Message::Request(Request::new(
            RequestId::from(1),
            "initialize".to_string(),
            json!({ "capabilities": {} }),
        )))
        .unwrap();
    let Message::Response(response) = connection.receiver.recv_timeout(TIMEOUT).unwrap() else {
        panic!("expected the initialize response");
    };
    let result = response.result.unwrap();
    assert_eq!(result["capabilities"]["textDocumentSync"]["change"], 2);
    assert_eq!(result["capabilities"]["documentSymbolProvider"], true);
    assert_eq!(result["capabilities"]["codeActionProvider"]["codeActionKinds"], json!(["quickfix"]));

    // Never sending `initialized` ends the session
    drop(connection);
    let _ = handle.join().unwrap();
}

#[test]
fn test_open_publishes_with_client_version() {
    let mut client = TestClient::start();
    client.open(MODULE_URI, 5, MODULE);

    let diagnostics = client.diagnostics(MODULE_URI, Some(5));
    let missing_space = diagnostics
        .iter()
        .find(|d| d["code"] == "MissingSpace")
        .unwrap();
    assert_eq!(missing_space["source"], "bsl");
    assert_eq!(
        missing_space["range"],
        json!({ "start": { "line": 1, "character": 2 }, "end": { "line": 1, "character": 3 } })
    );
    assert_eq!(missing_space["data"]["rule"], "MissingSpace");
    assert_eq!(missing_space["data"]["anchor"], "=");
    client.shutdown();
}

#[test]
fn test_incremental_change_republishes() {
    let mut client = TestClient::start();
    client.open(MODULE_URI, 1, MODULE);
    assert!(codes(&client.diagnostics(MODULE_URI, Some(1))).contains(&"MissingSpace"));

    client.notify(
        "textDocument/didChange",
        json!({
            "textDocument": { "uri": MODULE_URI, "version": 2 },
            "contentChanges": [{
                "range": { "start": { "line": 1, "character": 2 }, "end": { "line": 1, "character": 3 } },
                "text": " = "
            }]
        }),
    );
    assert!(!codes(&client.diagnostics(MODULE_URI, Some(2))).contains(&"MissingSpace"));

    let symbols = client.request(
        "textDocument/documentSymbol",
        json!({ "textDocument": { "uri": MODULE_URI } }),
    );
    assert_eq!(symbols[0]["name"], "Тест");
    assert_eq!(symbols[0]["kind"], 6);
    client.shutdown();
}

#[test]
fn test_code_action_offers_quick_fix_until_stale() {
    let mut client = TestClient::start();
    client.open(MODULE_URI, 1, MODULE);
    let diagnostics = client.diagnostics(MODULE_URI, Some(1));
    let missing_space = diagnostics
        .iter()
        .find(|d| d["code"] == "MissingSpace")
        .cloned()
        .unwrap();

    let params = json!({
        "textDocument": { "uri": MODULE_URI },
        "range": missing_space["range"],
        "context": { "diagnostics": [missing_space] }
    });
    let actions = client.request("textDocument/codeAction", params.clone());
    assert_eq!(actions[0]["title"], "Add missing spaces");
    assert_eq!(actions[0]["kind"], "quickfix");
    let edits = &actions[0]["edit"]["changes"][MODULE_URI];
    assert_eq!(edits.as_array().map(Vec::len), Some(2));

    // Replace the whole line: the diagnostic range now covers other text
    client.notify(
        "textDocument/didChange",
        json!({
            "textDocument": { "uri": MODULE_URI, "version": 2 },
            "contentChanges": [{ "text": "Процедура Тест()\n\tБ = 2;\nКонецПроцедуры\n" }]
        }),
    );
    client.diagnostics(MODULE_URI, Some(2));
    let actions = client.request("textDocument/codeAction", params);
    assert_eq!(actions, json!([]));
    client.shutdown();
}

#[test]
fn test_close_clears_diagnostics() {
    let mut client = TestClient::start();
    client.open(MODULE_URI, 1, MODULE);
    client.diagnostics(MODULE_URI, Some(1));

    client.notify(
        "textDocument/didClose",
        json!({ "textDocument": { "uri": MODULE_URI } }),
    );
    assert!(client.diagnostics(MODULE_URI, None).is_empty());

    let symbols = client.request(
        "textDocument/documentSymbol",
        json!({ "textDocument": { "uri": MODULE_URI } }),
    );
    assert_eq!(symbols, Value::Null);
    client.shutdown();
}

#[test]
fn test_configuration_change_reanalyzes_open_documents() {
    let mut client = TestClient::start();
    client.open(MODULE_URI, 1, MODULE);
    assert!(codes(&client.diagnostics(MODULE_URI, Some(1))).contains(&"MissingSpace"));

    client.notify(
        "workspace/didChangeConfiguration",
        json!({ "settings": { SETTINGS_SECTION: {
            "diagnostics": { "rules": { "MissingSpace": false } }
        }}}),
    );
    assert!(!codes(&client.diagnostics(MODULE_URI, Some(1))).contains(&"MissingSpace"));
    client.shutdown();
}

#[test]
fn test_workspace_config_file_is_loaded() {
    let root = tempfile::tempdir().unwrap();
    std::fs::write(
        root.path().join(".bsl-language-server.json"),
        r#"{ "diagnostics": { "rules": { "MissingSpace": false, "MisingSpace": "warn" } } }"#,
    )
    .unwrap();

    let mut client = TestClient::start_in(Some(root.path()));
    let message = client.notification("window/showMessage", |_| true);
    assert_eq!(
        message["message"],
        "Unknown rule 'MisingSpace'. Did you mean 'MissingSpace'?"
    );

    client.open(MODULE_URI, 1, MODULE);
    assert!(!codes(&client.diagnostics(MODULE_URI, Some(1))).contains(&"MissingSpace"));
    client.shutdown();
}

#[test]
fn test_unknown_request_is_rejected() {
    let mut client = TestClient::start();
    let response = client.request_raw("textDocument/hover", json!({}));
    let error = response.error.unwrap();
    assert_eq!(error.code, lsp_server::ErrorCode::MethodNotFound as i32);
    client.shutdown();
}

#[test]
fn test_changes_to_unopened_documents_are_ignored() {
    let mut client = TestClient::start();
    client.notify(
        "textDocument/didChange",
        json!({
            "textDocument": { "uri": MODULE_URI, "version": 2 },
            "contentChanges": [{ "text": "А=1;" }]
        }),
    );
    client.open(MODULE_URI, 3, "А = 1;");
    assert!(!codes(&client.diagnostics(MODULE_URI, Some(3))).contains(&"MissingSpace"));
    client.shutdown();
}
