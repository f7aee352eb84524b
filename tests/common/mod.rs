//! Shared test infrastructure for integration tests.
//!
//! `MockOllama` serves `/api/version`, `/api/tags`, and `/api/generate` on a
//! loopback port, one request per connection, and counts generate calls.

use std::io::{BufRead, BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Output, Stdio};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use tempfile::TempDir;

pub struct MockOllama {
    pub port: u16,
    generate_calls: Arc<AtomicUsize>,
    prompts: Arc<Mutex<Vec<String>>>,
}

impl MockOllama {
    pub fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind mock server");
        let port = listener.local_addr().expect("local addr").port();
        let generate_calls = Arc::new(AtomicUsize::new(0));
        let prompts = Arc::new(Mutex::new(Vec::new()));
        let calls = Arc::clone(&generate_calls);
        let seen = Arc::clone(&prompts);
        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(stream) = stream else { continue };
                handle(stream, &calls, &seen);
            }
        });
        Self {
            port,
            generate_calls,
            prompts,
        }
    }

    pub fn generate_calls(&self) -> usize {
        self.generate_calls.load(Ordering::SeqCst)
    }

    /// Prompts received so far.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().expect("prompts lock").clone()
    }
}

fn handle(mut stream: TcpStream, calls: &AtomicUsize, prompts: &Mutex<Vec<String>>) {
    let mut reader = BufReader::new(stream.try_clone().expect("clone stream"));
    let mut request_line = String::new();
    if reader.read_line(&mut request_line).is_err() {
        return;
    }
    let mut content_length = 0usize;
    loop {
        let mut line = String::new();
        if reader.read_line(&mut line).unwrap_or(0) == 0 {
            break;
        }
        let line = line.trim_end();
        if line.is_empty() {
            break;
        }
        if let Some((name, value)) = line.split_once(':') {
            if name.eq_ignore_ascii_case("content-length") {
                content_length = value.trim().parse().unwrap_or(0);
            }
        }
    }
    let mut body = vec![0u8; content_length];
    if reader.read_exact(&mut body).is_err() {
        return;
    }

    let path = request_line.split_whitespace().nth(1).unwrap_or("");
    let (status, payload) = match path {
        "/api/version" => ("200 OK", serde_json::json!({"version": "0.0.0-mock"})),
        "/api/tags" => (
            "200 OK",
            serde_json::json!({"models": [{"name": "mock-model"}, {"name": "other:7b"}]}),
        ),
        "/api/generate" => {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            let request: serde_json::Value =
                serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null);
            let prompt = request["prompt"].as_str().unwrap_or("").to_string();
            prompts.lock().expect("prompts lock").push(prompt);
            (
                "200 OK",
                serde_json::json!({
                    "model": request["model"],
                    "response": format!("mock answer {n}"),
                    "done": true
                }),
            )
        }
        _ => ("404 Not Found", serde_json::json!({"error": "not found"})),
    };
    let body = payload.to_string();
    let response = format!(
        "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    );
    let _ = stream.write_all(response.as_bytes());
    let _ = stream.flush();
}

/// The mock lives on loopback; an inherited proxy would intercept it.
const PROXY_VARS: &[&str] = &[
    "HTTP_PROXY",
    "http_proxy",
    "HTTPS_PROXY",
    "https_proxy",
    "ALL_PROXY",
    "all_proxy",
];

/// A listener that never accepts: connections complete in the backlog and
/// requests wait forever for a reply.
pub fn silent_listener() -> TcpListener {
    TcpListener::bind("127.0.0.1:0").expect("bind silent listener")
}

/// A loopback port with nothing listening on it.
pub fn closed_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().expect("local addr").port();
    drop(listener);
    port
}

/// Temporary case directory plus an isolated settings file.
pub struct Workspace {
    pub root: TempDir,
    pub case_dir: PathBuf,
    pub config: PathBuf,
}

impl Workspace {
    pub fn create() -> Self {
        let root = tempfile::tempdir().expect("tempdir");
        let case_dir = root.path().join("case");
        std::fs::create_dir(&case_dir).expect("create case dir");
        let config = root.path().join("config").join("config.json");
        Self {
            root,
            case_dir,
            config,
        }
    }

    pub fn write_document(&self, name: &str, text: &str) {
        std::fs::write(self.case_dir.join(name), text).expect("write document");
    }

    pub fn write_questions(&self, questions: &[&str]) -> PathBuf {
        let path = self.root.path().join("questions.md");
        let mut text = String::from("# Questions\n\n");
        for (idx, question) in questions.iter().enumerate() {
            text.push_str(&format!("{}. {}\n", idx + 1, question));
        }
        std::fs::write(&path, text).expect("write questions");
        path
    }

    /// Run docket against `port` with this workspace's settings file.
    pub fn docket(&self, port: u16, args: &[&str]) -> Output {
        self.docket_command(port, args).output().expect("run docket")
    }

    /// Start docket in the background with piped output.
    pub fn spawn_docket(&self, port: u16, args: &[&str]) -> Child {
        self.docket_command(port, args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .expect("spawn docket")
    }

    fn docket_command(&self, port: u16, args: &[&str]) -> Command {
        let port = port.to_string();
        let mut command = Command::new(env!("CARGO_BIN_EXE_docket"));
        for var in PROXY_VARS {
            command.env_remove(var);
        }
        command
            .env("DOCKET_CONFIG", &self.config)
            .env_remove("DOCKET_LOG")
            .args(["--ollama-host", "127.0.0.1", "--ollama-port", port.as_str()])
            .args(args);
        command
    }

    /// Run directories created inside the case directory for `sanitized`.
    pub fn run_dirs(&self, sanitized: &str) -> Vec<PathBuf> {
        let suffix = format!("_{sanitized}");
        let mut dirs: Vec<PathBuf> = std::fs::read_dir(&self.case_dir)
            .expect("read case dir")
            .filter_map(|entry| entry.ok().map(|entry| entry.path()))
            .filter(|path| path.is_dir())
            .filter(|path| {
                path.file_name()
                    .and_then(|name| name.to_str())
                    .is_some_and(|name| name.ends_with(&suffix))
            })
            .collect();
        dirs.sort();
        dirs
    }
}

pub fn path_str(path: &Path) -> &str {
    path.to_str().expect("utf-8 path")
}

pub fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

pub fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}
