//! Shared fixtures for the pipeline integration tests.
#![allow(dead_code)]

use folio::source::SourceError;
use folio::store::InMemoryTemplateStore;
use folio::{ReportConnection, ReportService};
use serde_json::{json, Value};
use std::io::{Cursor, Read};

/// The canonical user-list report: title, embedded query, three columns.
pub const USER_LIST: &str = r#"
<report name="user-list" title="Registered users">
    <query>SELECT id, login, name FROM app_user ORDER BY id</query>
    <column field="id" header="Id" width="60" align="right"/>
    <column field="login" header="Login" width="140"/>
    <column field="name" header="Name" width="220"/>
</report>
"#;

pub fn service() -> ReportService<InMemoryTemplateStore> {
    let _ = env_logger::builder().is_test(true).try_init();

    let store = InMemoryTemplateStore::new();
    store
        .add("user-list", USER_LIST.as_bytes().to_vec())
        .unwrap();
    store
        .add("broken", b"<report name=\"broken\"></report>".to_vec())
        .unwrap();
    ReportService::new(store)
}

pub fn users() -> Vec<Value> {
    vec![
        json!({"id": 1, "login": "ada", "name": "Ada Lovelace"}),
        json!({"id": 2, "login": "grace", "name": "Grace Hopper"}),
        json!({"id": 3, "login": "mary", "name": "Mary Jackson"}),
    ]
}

/// A caller-owned connection stub; records every query it serves.
pub struct StubConnection {
    pub rows: Vec<Value>,
    pub queries: Vec<String>,
}

impl StubConnection {
    pub fn with_rows(rows: Vec<Value>) -> Self {
        Self {
            rows,
            queries: vec![],
        }
    }
}

impl ReportConnection for StubConnection {
    fn query(&mut self, sql: &str) -> Result<Vec<Value>, SourceError> {
        self.queries.push(sql.to_string());
        Ok(self.rows.clone())
    }
}

/// A connection whose query always fails.
pub struct DeadConnection;

impl ReportConnection for DeadConnection {
    fn query(&mut self, _sql: &str) -> Result<Vec<Value>, SourceError> {
        Err(SourceError::Connection("connection refused".to_string()))
    }
}

/// Read one part out of an OOXML package.
pub fn read_part(bytes: &[u8], name: &str) -> String {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes.to_vec())).unwrap();
    let mut part = archive.by_name(name).unwrap();
    let mut content = String::new();
    part.read_to_string(&mut content).unwrap();
    content
}
