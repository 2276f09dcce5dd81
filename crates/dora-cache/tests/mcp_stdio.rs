//! Drive `dora-cache mcp` over stdio like an MCP client would.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};

use anyhow::{Context, Result, anyhow};
use assert_cmd::cargo::CommandCargoExt;
use serde_json::{Map, Value, json};
use tempfile::TempDir;

struct McpHarness {
    child: Child,
    stdin: Option<ChildStdin>,
    stdout: BufReader<ChildStdout>,
    next_id: i64,
}

enum Response {
    Result(Value),
    Error(Value),
}

impl McpHarness {
    fn spawn(workdir: &TempDir) -> Result<Self> {
        let mut cmd = Command::cargo_bin("dora-cache")?;
        cmd.arg("--workdir")
            .arg(workdir.path())
            .arg("--db")
            .arg(workdir.path().join("cache").join("dora_memory.db"))
            .arg("mcp")
            .env_remove("MEMORY_CACHE_ENABLED")
            .env_remove("MEMORY_CACHE_PATH")
            .env_remove("MEMORY_CACHE_TTL_DAYS")
            .env_remove("MEMORY_CACHE_MAX_SIZE_MB")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null());
        let mut child = cmd.spawn().context("failed to spawn dora-cache mcp")?;
        let stdin = child.stdin.take().ok_or_else(|| anyhow!("failed to capture stdin"))?;
        let stdout = child.stdout.take().ok_or_else(|| anyhow!("failed to capture stdout"))?;
        Ok(Self {
            child,
            stdin: Some(stdin),
            stdout: BufReader::new(stdout),
            next_id: 1,
        })
    }

    fn initialize(&mut self) -> Result<Value> {
        let params = json!({
            "protocolVersion": "2024-11-05",
            "capabilities": {},
            "clientInfo": {"name": "dora-cache-e2e", "version": "0.1.0"}
        });
        match self.request("initialize", Some(params))? {
            Response::Result(info) => {
                self.send(&json!({"jsonrpc": "2.0", "method": "notifications/initialized"}))?;
                Ok(info)
            }
            Response::Error(err) => Err(anyhow!("initialize failed: {err}")),
        }
    }

    fn call_tool(&mut self, name: &str, arguments: Value) -> Result<Response> {
        self.request("tools/call", Some(json!({"name": name, "arguments": arguments})))
    }

    /// Call a tool that must succeed and decode its JSON text payload.
    fn call_json(&mut self, name: &str, arguments: Value) -> Result<Value> {
        match self.call_tool(name, arguments)? {
            Response::Result(result) => {
                let text = result["content"][0]["text"]
                    .as_str()
                    .ok_or_else(|| anyhow!("{name} returned no text content: {result}"))?;
                Ok(serde_json::from_str(text)?)
            }
            Response::Error(err) => Err(anyhow!("{name} failed: {err}")),
        }
    }

    fn request(&mut self, method: &str, params: Option<Value>) -> Result<Response> {
        let id = self.next_id;
        self.next_id += 1;
        let mut message = Map::new();
        message.insert("jsonrpc".into(), Value::String("2.0".into()));
        message.insert("id".into(), Value::Number(id.into()));
        message.insert("method".into(), Value::String(method.into()));
        if let Some(params) = params {
            message.insert("params".into(), params);
        }
        self.send(&Value::Object(message))?;

        loop {
            let value = self.recv()?;
            if value.get("id").and_then(Value::as_i64) != Some(id) {
                continue;
            }
            if let Some(result) = value.get("result") {
                return Ok(Response::Result(result.clone()));
            }
            if let Some(error) = value.get("error") {
                return Ok(Response::Error(error.clone()));
            }
        }
    }

    fn send(&mut self, payload: &Value) -> Result<()> {
        let stdin = self.stdin.as_mut().ok_or_else(|| anyhow!("stdin already closed"))?;
        let serialized = serde_json::to_string(payload)?;
        stdin.write_all(serialized.as_bytes())?;
        stdin.write_all(b"\n")?;
        stdin.flush()?;
        Ok(())
    }

    fn recv(&mut self) -> Result<Value> {
        let mut line = String::new();
        loop {
            line.clear();
            let read = self.stdout.read_line(&mut line).context("failed to read server output")?;
            if read == 0 {
                return Err(anyhow!("server closed stdout"));
            }
            let trimmed = line.trim();
            if !trimmed.is_empty() {
                return serde_json::from_str(trimmed).with_context(|| format!("invalid json from server: {trimmed}"));
            }
        }
    }

    fn close(mut self) -> Result<()> {
        drop(self.stdin.take());
        self.child.wait()?;
        Ok(())
    }
}

fn jazz_night() -> Value {
    json!({
        "name": "Jazz Night",
        "start_date": "2025-07-01",
        "location": "Blue Note",
        "description": "Late set"
    })
}

#[test]
fn cache_tools_round_trip_over_stdio() -> Result<()> {
    let workdir = TempDir::with_prefix("dora-cache-e2e-")?;
    let mut server = McpHarness::spawn(&workdir)?;

    let info = server.initialize()?;
    assert_eq!(info["serverInfo"]["name"], "dora-cache");

    let tools = match server.request("tools/list", Some(json!({})))? {
        Response::Result(list) => list,
        Response::Error(err) => return Err(anyhow!("tools/list failed: {err}")),
    };
    let mut names: Vec<_> = tools["tools"]
        .as_array()
        .expect("tool array")
        .iter()
        .filter_map(|tool| tool["name"].as_str())
        .collect();
    names.sort_unstable();
    assert_eq!(
        names,
        ["cache_stats", "check_event", "clear_cache", "get_event", "list_events", "store_event"]
    );

    assert_eq!(
        server.call_json("check_event", json!({"event_data": jazz_night()}))?,
        json!({"exists": false})
    );

    let stored = server.call_json(
        "store_event",
        json!({
            "event_data": jazz_night(),
            "classification": {"size": "medium", "importance": "local"},
            "notifications": [{"language": "en", "text": "Jazz tonight"}],
            "processing_time_ms": 850
        }),
    )?;
    assert_eq!(stored, json!({"event_id": "223a84de573a8468"}));

    let mut rewritten = jazz_night();
    rewritten["description"] = json!("Different blurb");
    assert_eq!(
        server.call_json("check_event", json!({"event_data": rewritten.clone()}))?,
        json!({"exists": true})
    );

    let entry = server.call_json("get_event", json!({"event_data": rewritten}))?;
    assert_eq!(entry["classification"]["size"], "medium");
    assert_eq!(entry["hit_count"], 0);

    let stats = server.call_json("cache_stats", json!({}))?;
    assert_eq!(stats["total_entries"], 1);
    assert_eq!(stats["cache_hits"], 1);

    let listed = server.call_json("list_events", json!({}))?;
    assert_eq!(listed[0]["hit_count"], 1);

    assert_eq!(
        server.call_json("clear_cache", json!({}))?,
        json!({"deleted_entries": 1})
    );

    match server.call_tool("check_event", json!({"event_data": "Jazz Night"}))? {
        Response::Error(err) => assert!(err["message"].as_str().unwrap_or_default().contains("event_data")),
        Response::Result(result) => return Err(anyhow!("malformed payload accepted: {result}")),
    }

    server.close()
}
