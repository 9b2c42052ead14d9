use std::collections::HashSet;
use std::sync::{Arc, Mutex, mpsc};
use std::thread;
use std::time::Duration;

use serde_json::Value;

pub const STUB_API_KEY: &str = "sk-stub";

#[allow(dead_code)]
#[derive(Debug, Clone, Copy)]
pub enum SummaryBehavior {
    /// Every request gets a valid completion.
    Summarize,
    /// Every request gets an error envelope with no choices.
    Reject,
    /// The first request for a given text fails; later ones succeed.
    FailOncePerText,
}

pub struct SummaryStub {
    pub base_url: String,
    received: Arc<Mutex<Vec<String>>>,
    shutdown_tx: Option<mpsc::Sender<()>>,
    handle: Option<thread::JoinHandle<()>>,
}

impl SummaryStub {
    pub fn spawn(behavior: SummaryBehavior) -> Self {
        let server = tiny_http::Server::http("127.0.0.1:0").expect("start summary stub server");
        let addr = server.server_addr();
        let base_url = format!("http://{addr}/v1");

        let received = Arc::new(Mutex::new(Vec::new()));
        let received_in_thread = Arc::clone(&received);
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();

        let handle = thread::spawn(move || {
            let mut seen = HashSet::new();
            loop {
                if shutdown_rx.try_recv().is_ok() {
                    break;
                }

                let mut request = match server.recv_timeout(Duration::from_millis(50)) {
                    Ok(Some(req)) => req,
                    Ok(None) => continue,
                    Err(_) => break,
                };

                if request.method() != &tiny_http::Method::Post
                    || request.url() != "/v1/chat/completions"
                {
                    let _ = request.respond(
                        tiny_http::Response::from_string("not found").with_status_code(404),
                    );
                    continue;
                }

                let authorized = request.headers().iter().any(|header| {
                    header.field.equiv("Authorization")
                        && header.value.as_str() == format!("Bearer {STUB_API_KEY}")
                });
                if !authorized {
                    respond_json(
                        request,
                        401,
                        serde_json::json!({ "code": 20015, "message": "invalid api key" }),
                    );
                    continue;
                }

                let mut body = String::new();
                if request.as_reader().read_to_string(&mut body).is_err() {
                    let _ = request.respond(
                        tiny_http::Response::from_string("invalid request body")
                            .with_status_code(400),
                    );
                    continue;
                }
                let parsed: Value = match serde_json::from_str(&body) {
                    Ok(value) => value,
                    Err(_) => {
                        let _ = request.respond(
                            tiny_http::Response::from_string("invalid json").with_status_code(400),
                        );
                        continue;
                    }
                };

                let Some(text) = parsed
                    .get("messages")
                    .and_then(|v| v.as_array())
                    .and_then(|messages| {
                        messages
                            .iter()
                            .rev()
                            .find(|m| m.get("role").and_then(|r| r.as_str()) == Some("user"))
                    })
                    .and_then(|m| m.get("content"))
                    .and_then(|c| c.as_str())
                    .map(str::to_owned)
                else {
                    let _ = request.respond(
                        tiny_http::Response::from_string("missing user message")
                            .with_status_code(400),
                    );
                    continue;
                };
                received_in_thread
                    .lock()
                    .expect("lock received texts")
                    .push(text.clone());

                let succeed = match behavior {
                    SummaryBehavior::Summarize => true,
                    SummaryBehavior::Reject => false,
                    SummaryBehavior::FailOncePerText => !seen.insert(text.clone()),
                };

                if succeed {
                    respond_json(
                        request,
                        200,
                        serde_json::json!({
                            "id": "chatcmpl-stub",
                            "object": "chat.completion",
                            "model": parsed.get("model").cloned().unwrap_or(Value::String("stub-model".to_owned())),
                            "choices": [
                                {
                                    "index": 0,
                                    "message": {
                                        "role": "assistant",
                                        "content": format!("stub summary ({} chars)", text.chars().count())
                                    },
                                    "finish_reason": "stop"
                                }
                            ]
                        }),
                    );
                } else {
                    respond_json(
                        request,
                        503,
                        serde_json::json!({ "code": 50505, "message": "model service overloaded" }),
                    );
                }
            }
        });

        Self {
            base_url,
            received,
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
        }
    }

    /// User texts received so far, in arrival order.
    #[allow(dead_code)]
    pub fn received(&self) -> Vec<String> {
        self.received.lock().expect("lock received texts").clone()
    }
}

impl Drop for SummaryStub {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn respond_json(request: tiny_http::Request, status: u16, body: Value) {
    let header = tiny_http::Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..])
        .expect("build header");
    let response = tiny_http::Response::from_string(body.to_string())
        .with_status_code(status)
        .with_header(header);
    let _ = request.respond(response);
}
