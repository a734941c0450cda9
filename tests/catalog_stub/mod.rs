use std::collections::VecDeque;
use std::sync::{Arc, Mutex, mpsc};
use std::thread;
use std::time::Duration;

/// One-off response served instead of the generated catalog page.
#[allow(dead_code)]
#[derive(Debug, Clone)]
pub enum Reply {
    Status { status: u16, body: String },
    Body(String),
}

#[allow(dead_code)]
#[derive(Debug, Clone)]
pub struct Recorded {
    pub url: String,
    pub referer: Option<String>,
    pub user_agent: Option<String>,
}

#[allow(dead_code)]
impl Recorded {
    pub fn query(&self, key: &str) -> Option<String> {
        let (_, query) = self.url.split_once('?')?;
        url::form_urlencoded::parse(query.as_bytes())
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.into_owned())
    }
}

/// Stand-in for the catalog host, serving `total` generated books.
pub struct CatalogStub {
    pub base_url: String,
    requests: Arc<Mutex<Vec<Recorded>>>,
    replies: Arc<Mutex<VecDeque<Reply>>>,
    shutdown_tx: Option<mpsc::Sender<()>>,
    handle: Option<thread::JoinHandle<()>>,
}

#[allow(dead_code)]
impl CatalogStub {
    pub fn spawn(total: u64) -> Self {
        let server = tiny_http::Server::http("127.0.0.1:0").expect("start catalog stub server");
        let addr = server.server_addr();
        let base_url = format!("http://{addr}");

        let requests = Arc::new(Mutex::new(Vec::new()));
        let replies = Arc::new(Mutex::new(VecDeque::new()));
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();

        let thread_requests = Arc::clone(&requests);
        let thread_replies = Arc::clone(&replies);
        let handle = thread::spawn(move || {
            loop {
                if shutdown_rx.try_recv().is_ok() {
                    break;
                }

                let request = match server.recv_timeout(Duration::from_millis(50)) {
                    Ok(Some(req)) => req,
                    Ok(None) => continue,
                    Err(_) => break,
                };

                let header = |name: &str| {
                    request
                        .headers()
                        .iter()
                        .find(|h| h.field.as_str().as_str().eq_ignore_ascii_case(name))
                        .map(|h| h.value.as_str().to_owned())
                };
                let recorded = Recorded {
                    url: request.url().to_owned(),
                    referer: header("Referer"),
                    user_agent: header("User-Agent"),
                };
                thread_requests.lock().unwrap().push(recorded.clone());

                let path = recorded.url.split('?').next().unwrap_or("").to_owned();
                if path.starts_with("/localPic/") {
                    let content_type =
                        tiny_http::Header::from_bytes(&b"Content-Type"[..], &b"image/png"[..])
                            .expect("build header");
                    let _ = request.respond(
                        tiny_http::Response::from_data(b"PNGDATA".to_vec())
                            .with_header(content_type),
                    );
                    continue;
                }
                if path != "/book/searchByPage" {
                    let _ = request.respond(
                        tiny_http::Response::from_string("not found").with_status_code(404),
                    );
                    continue;
                }

                let (status, body) = match thread_replies.lock().unwrap().pop_front() {
                    Some(Reply::Status { status, body }) => (status, body),
                    Some(Reply::Body(body)) => (200, body),
                    None => (200, page_body(&recorded, total)),
                };
                let json =
                    tiny_http::Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..])
                        .expect("build header");
                let _ = request.respond(
                    tiny_http::Response::from_string(body)
                        .with_status_code(status)
                        .with_header(json),
                );
            }
        });

        Self {
            base_url,
            requests,
            replies,
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
        }
    }

    pub fn push_reply(&self, reply: Reply) {
        self.replies.lock().unwrap().push_back(reply);
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().unwrap().clone()
    }

    pub fn search_requests(&self) -> Vec<Recorded> {
        self.requests()
            .into_iter()
            .filter(|r| r.url.starts_with("/book/searchByPage"))
            .collect()
    }
}

impl Drop for CatalogStub {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

/// Catalog page for the request's `curr`/`limit`, numbers sent as strings
/// the way the real catalog does.
fn page_body(request: &Recorded, total: u64) -> String {
    let curr: u64 = request.query("curr").and_then(|v| v.parse().ok()).unwrap_or(1);
    let limit: u64 = request.query("limit").and_then(|v| v.parse().ok()).unwrap_or(20);
    let keyword = request.query("keyword").unwrap_or_default();
    let start = (curr - 1) * limit;
    let end = (start + limit).min(total);

    let list = (start..end)
        .map(|i| {
            serde_json::json!({
                "id": i,
                "bookName": format!("{keyword} book {i}"),
                "authorName": "author",
                "tag": "百合,校园",
                "wordCount": 120000,
                "bookStatus": "1",
                "crawlSourceName": "stub",
                "lastIndexUpdateTime": "2024-01-01 00:00:00",
            })
        })
        .collect::<Vec<_>>();

    serde_json::json!({
        "code": "200",
        "msg": "success",
        "data": {
            "pageNum": curr.to_string(),
            "pageSize": limit.to_string(),
            "total": total.to_string(),
            "list": list,
        }
    })
    .to_string()
}

#[allow(dead_code)]
pub fn business_error(code: &str, msg: &str) -> Reply {
    Reply::Body(serde_json::json!({ "code": code, "msg": msg, "data": null }).to_string())
}
