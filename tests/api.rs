use serde_json::{Value, json};
use skillswap_live::{
    api::SkillSwapApi,
    config::ApiConfig,
    counters::CountSource,
    error::SkillSwapError,
    types::CounterKind,
};
use std::{
    sync::{Arc, Mutex},
    time::Duration,
};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpListener,
};
use url::Url;

#[derive(Debug, Clone)]
struct Seen {
    method: String,
    path: String,
    body: Option<Value>,
}

/// Answers every request with `status` and `body`, recording what it saw.
async fn serve(status: u16, body: Value) -> (Url, Arc<Mutex<Vec<Seen>>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let log = seen.clone();

    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                return;
            };
            let mut raw = Vec::new();
            let mut buf = [0u8; 4096];
            let (head, rest) = loop {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break (String::new(), Vec::new());
                }
                raw.extend_from_slice(&buf[..n]);
                if let Some(end) = raw.windows(4).position(|w| w == b"\r\n\r\n") {
                    let head = String::from_utf8_lossy(&raw[..end]).to_string();
                    break (head, raw[end + 4..].to_vec());
                }
            };
            if head.is_empty() {
                continue;
            }

            let content_length = head
                .lines()
                .filter_map(|line| line.split_once(':'))
                .find(|(name, _)| name.eq_ignore_ascii_case("content-length"))
                .and_then(|(_, value)| value.trim().parse::<usize>().ok())
                .unwrap_or(0);
            let mut payload = rest;
            while payload.len() < content_length {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                payload.extend_from_slice(&buf[..n]);
            }

            let mut request_line = head.lines().next().unwrap_or_default().split(' ');
            log.lock().unwrap().push(Seen {
                method: request_line.next().unwrap_or_default().to_string(),
                path: request_line.next().unwrap_or_default().to_string(),
                body: serde_json::from_slice(&payload).ok(),
            });

            let text = body.to_string();
            let response = format!(
                "HTTP/1.1 {} Status\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status,
                text.len(),
                text
            );
            let _ = socket.write_all(response.as_bytes()).await;
            let _ = socket.shutdown().await;
        }
    });

    let base = Url::parse(&format!("http://{}/app/", addr)).unwrap();
    (base, seen)
}

fn api(base_url: Url) -> SkillSwapApi {
    SkillSwapApi::new(&ApiConfig {
        base_url,
        timeout: Duration::from_secs(5),
    })
    .unwrap()
}

#[tokio::test]
async fn counts_come_from_the_count_endpoints() {
    let (base, seen) = serve(200, json!({ "count": 4 })).await;
    let api = api(base);

    assert_eq!(api.count(CounterKind::Pending).await.unwrap(), 4);
    assert_eq!(api.fetch_count(CounterKind::Active).await.unwrap(), 4);

    let seen = seen.lock().unwrap();
    assert_eq!(seen[0].method, "GET");
    assert_eq!(seen[0].path, "/app/api/swaps/pending-count");
    assert_eq!(seen[1].path, "/app/api/swaps/active-count");
}

#[tokio::test]
async fn error_status_is_reported() {
    let (base, _) = serve(500, json!({ "error": "boom" })).await;
    let err = api(base).count(CounterKind::Pending).await.unwrap_err();
    assert!(matches!(
        err,
        SkillSwapError::UnexpectedStatus { status: 500, .. }
    ));
}

#[tokio::test]
async fn skill_search_posts_the_query() {
    let (base, seen) = serve(200, json!({ "skills": ["Rust", "Ruby"] })).await;
    let api = api(base);

    let skills = api.search_skills(" Ru ").await.unwrap();
    assert_eq!(skills, vec!["Rust", "Ruby"]);

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].method, "POST");
    assert_eq!(seen[0].path, "/app/api/skills/search");
    assert_eq!(seen[0].body, Some(json!({ "search": "Ru" })));
}

#[tokio::test]
async fn short_queries_and_bad_emails_skip_the_request() {
    let (base, seen) = serve(200, json!({ "skills": ["never"] })).await;
    let api = api(base);

    assert!(api.search_skills("R").await.unwrap().is_empty());
    assert!(api.search_skills("").await.unwrap().is_empty());
    assert_eq!(api.check_email("").await.unwrap(), None);
    assert_eq!(api.check_email("not-an-email").await.unwrap(), None);
    assert!(seen.lock().unwrap().is_empty());
}

#[tokio::test]
async fn email_availability() {
    let (base, seen) = serve(
        200,
        json!({ "available": false, "message": "Email already registered" }),
    )
    .await;

    let result = api(base)
        .check_email("ada@example.com")
        .await
        .unwrap()
        .expect("checked");
    assert!(!result.available);
    assert_eq!(result.message, "Email already registered");

    let seen = seen.lock().unwrap();
    assert_eq!(seen[0].path, "/app/api/check-email");
    assert_eq!(seen[0].body, Some(json!({ "email": "ada@example.com" })));
}
