//! Paginated GET requests with rate-limit retry
//!
//! GitHub list endpoints return one page per request and point at the next
//! page through the `Link` response header. Exhausted quotas come back as a
//! 403 with `X-RateLimit-Remaining: 0` (primary limit) or a 429 (secondary
//! limit); both are slept out and the same request is sent again.

use std::time::Duration;

use chrono::Utc;
use reqwest::header::{HeaderMap, LINK, RETRY_AFTER};
use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

use crate::{Error, GitHubClient, Result};

/// Wait applied to a 429 that carries no usable timing headers
const DEFAULT_SECONDARY_WAIT: Duration = Duration::from_secs(60);

impl GitHubClient {
    /// Fetch every page of a list endpoint
    ///
    /// `per_page` and `params` are only sent with the first request; later
    /// pages follow the `rel="next"` URL verbatim.
    pub(crate) async fn paginate<T: DeserializeOwned>(
        &self,
        mut url: Url,
        params: &[(&str, &str)],
    ) -> Result<Vec<T>> {
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("per_page", &self.options().per_page.to_string());
            for (key, value) in params {
                query.append_pair(key, value);
            }
        }

        let mut items = Vec::new();
        let mut next = Some(url);
        let mut pages = 0usize;

        while let Some(url) = next.take() {
            let response = self.get_with_retry(&url).await?;

            let link = response
                .headers()
                .get(LINK)
                .and_then(|v| v.to_str().ok())
                .map(str::to_owned);

            let body: Value = response.json().await?;
            items.extend(page_items::<T>(body)?);
            pages += 1;

            next = match link.as_deref().and_then(next_link) {
                Some(href) => Some(Url::parse(href)?),
                None => None,
            };
        }

        debug!(pages, count = items.len(), "Fetched paginated results");
        Ok(items)
    }

    /// Fetch a single JSON document
    pub(crate) async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T> {
        let response = self.get_with_retry(&url).await?;
        let body: Value = response.json().await?;
        serde_json::from_value(body)
            .map_err(|e| Error::Parse(format!("Unexpected response from {}: {}", url, e)))
    }

    /// GET a URL, sleeping through rate-limit responses
    async fn get_with_retry(&self, url: &Url) -> Result<Response> {
        let options = self.options();
        let mut retries = 0u32;

        loop {
            let response = self.http().get(url.clone()).send().await?;
            let status = response.status();

            if let Some(wait) = rate_limit_wait(status, response.headers(), Utc::now().timestamp())
            {
                if retries >= options.rate_limit_retries {
                    return Err(Error::RateLimited(format!(
                        "gave up on {} after {} retries",
                        url, retries
                    )));
                }
                retries += 1;

                let wait = wait.min(options.max_rate_limit_wait);
                warn!(
                    wait_secs = wait.as_secs(),
                    attempt = retries,
                    "GitHub rate limit reached, sleeping"
                );
                tokio::time::sleep(wait).await;
                continue;
            }

            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(Error::Http {
                    status: status.as_u16(),
                    url: url.to_string(),
                    body,
                });
            }

            return Ok(response);
        }
    }
}

/// Extract the list items from one page body
///
/// Most endpoints return a JSON array; search-style endpoints wrap the list
/// in an object under `items`.
pub(crate) fn page_items<T: DeserializeOwned>(body: Value) -> Result<Vec<T>> {
    let raw = match body {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove("items") {
            Some(Value::Array(items)) => items,
            _ => Vec::new(),
        },
        _ => Vec::new(),
    };

    raw.into_iter()
        .map(|item| {
            serde_json::from_value(item)
                .map_err(|e| Error::Parse(format!("Unexpected list item: {}", e)))
        })
        .collect()
}

/// Find the `rel="next"` target in a `Link` header
pub(crate) fn next_link(header: &str) -> Option<&str> {
    header
        .split(',')
        .map(str::trim)
        .find(|part| part.contains("rel=\"next\""))
        .and_then(|part| {
            let start = part.find('<')? + 1;
            let end = start + part[start..].find('>')?;
            Some(&part[start..end])
        })
}

/// How long to sleep before retrying, if the response is a rate-limit rejection
pub(crate) fn rate_limit_wait(status: StatusCode, headers: &HeaderMap, now: i64) -> Option<Duration> {
    let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());
    let exhausted = header("x-ratelimit-remaining") == Some("0");
    let until_reset = || {
        let reset: i64 = header("x-ratelimit-reset")
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(0);
        Duration::from_secs((reset - now).max(1) as u64)
    };

    match status {
        StatusCode::FORBIDDEN if exhausted => Some(until_reset()),
        StatusCode::TOO_MANY_REQUESTS => {
            let retry_after = headers
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok());
            match retry_after {
                Some(secs) => Some(Duration::from_secs(secs.max(1))),
                None if exhausted => Some(until_reset()),
                None => Some(DEFAULT_SECONDARY_WAIT),
            }
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Item {
        id: u64,
    }

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_static(*value));
        }
        map
    }

    #[test]
    fn test_next_link() {
        let header = r#"<https://api.github.com/repositories/1/pulls?page=2>; rel="next", <https://api.github.com/repositories/1/pulls?page=5>; rel="last""#;
        assert_eq!(
            next_link(header),
            Some("https://api.github.com/repositories/1/pulls?page=2")
        );
    }

    #[test]
    fn test_next_link_last_page() {
        let header = r#"<https://api.github.com/repositories/1/pulls?page=1>; rel="prev", <https://api.github.com/repositories/1/pulls?page=1>; rel="first""#;
        assert_eq!(next_link(header), None);
        assert_eq!(next_link(""), None);
    }

    #[test]
    fn test_page_items_array() {
        let items: Vec<Item> = page_items(json!([{"id": 1}, {"id": 2}])).unwrap();
        assert_eq!(items, vec![Item { id: 1 }, Item { id: 2 }]);
    }

    #[test]
    fn test_page_items_object() {
        let items: Vec<Item> =
            page_items(json!({"total_count": 1, "items": [{"id": 7}]})).unwrap();
        assert_eq!(items, vec![Item { id: 7 }]);

        let items: Vec<Item> = page_items(json!({"message": "nothing"})).unwrap();
        assert!(items.is_empty());
    }

    #[test]
    fn test_page_items_bad_item() {
        let result: Result<Vec<Item>> = page_items(json!([{"id": "one"}]));
        assert!(matches!(result, Err(Error::Parse(_))));
    }

    #[test]
    fn test_primary_rate_limit_waits_until_reset() {
        let h = headers(&[
            ("x-ratelimit-remaining", "0"),
            ("x-ratelimit-reset", "1000"),
        ]);
        assert_eq!(
            rate_limit_wait(StatusCode::FORBIDDEN, &h, 940),
            Some(Duration::from_secs(60))
        );
        // reset already passed: still wait at least one second
        assert_eq!(
            rate_limit_wait(StatusCode::FORBIDDEN, &h, 2000),
            Some(Duration::from_secs(1))
        );
    }

    #[test]
    fn test_forbidden_with_quota_left_is_not_rate_limit() {
        let h = headers(&[("x-ratelimit-remaining", "12")]);
        assert_eq!(rate_limit_wait(StatusCode::FORBIDDEN, &h, 0), None);
        assert_eq!(rate_limit_wait(StatusCode::FORBIDDEN, &HeaderMap::new(), 0), None);
    }

    #[test]
    fn test_secondary_rate_limit() {
        let h = headers(&[("retry-after", "30")]);
        assert_eq!(
            rate_limit_wait(StatusCode::TOO_MANY_REQUESTS, &h, 0),
            Some(Duration::from_secs(30))
        );
        assert_eq!(
            rate_limit_wait(StatusCode::TOO_MANY_REQUESTS, &HeaderMap::new(), 0),
            Some(DEFAULT_SECONDARY_WAIT)
        );
    }

    #[test]
    fn test_success_is_not_rate_limit() {
        let h = headers(&[("x-ratelimit-remaining", "0")]);
        assert_eq!(rate_limit_wait(StatusCode::OK, &h, 0), None);
    }

    mod server {
        use super::*;
        use crate::GitHubOptions;
        use std::io::{BufRead, BufReader, Write};
        use std::net::TcpListener;
        use std::sync::{Arc, Mutex};

        /// Serve one canned response per connection and record request lines
        fn serve<F>(responses: F) -> (String, Arc<Mutex<Vec<String>>>)
        where
            F: FnOnce(&str) -> Vec<String>,
        {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            let base = format!("http://{}", listener.local_addr().unwrap());
            let responses = responses(&base);
            let seen = Arc::new(Mutex::new(Vec::new()));
            let log = Arc::clone(&seen);

            std::thread::spawn(move || {
                for response in responses {
                    let (mut stream, _) = listener.accept().unwrap();
                    let mut reader = BufReader::new(stream.try_clone().unwrap());

                    let mut request_line = String::new();
                    reader.read_line(&mut request_line).unwrap();
                    loop {
                        let mut header = String::new();
                        if reader.read_line(&mut header).unwrap() == 0 || header == "\r\n" {
                            break;
                        }
                    }

                    log.lock().unwrap().push(request_line.trim_end().to_string());
                    stream.write_all(response.as_bytes()).unwrap();
                }
            });

            (base, seen)
        }

        fn response(status: &str, headers: &[(&str, String)], body: &str) -> String {
            let mut out = format!(
                "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n",
                status,
                body.len()
            );
            for (name, value) in headers {
                out.push_str(&format!("{}: {}\r\n", name, value));
            }
            out.push_str("\r\n");
            out.push_str(body);
            out
        }

        fn client(base: &str) -> GitHubClient {
            let options = GitHubOptions {
                api_url: base.to_string(),
                per_page: 100,
                rate_limit_retries: 1,
                max_rate_limit_wait: Duration::from_millis(10),
            };
            GitHubClient::with_options("ghp_test", "acme", "widgets", options).unwrap()
        }

        fn pulls_url(client: &GitHubClient) -> Url {
            client.endpoint(&["repos", "acme", "widgets", "pulls"]).unwrap()
        }

        #[tokio::test]
        async fn test_paginate_follows_next_link_verbatim() {
            let (base, seen) = serve(|base| {
                vec![
                    response(
                        "200 OK",
                        &[(
                            "Link",
                            format!("<{}/repositories/9/pulls?page=2>; rel=\"next\"", base),
                        )],
                        r#"[{"id": 1}, {"id": 2}]"#,
                    ),
                    response("200 OK", &[], r#"[{"id": 3}]"#),
                ]
            });
            let client = client(&base);

            let items: Vec<Item> = client
                .paginate(pulls_url(&client), &[("state", "all")])
                .await
                .unwrap();

            assert_eq!(items, vec![Item { id: 1 }, Item { id: 2 }, Item { id: 3 }]);
            assert_eq!(
                *seen.lock().unwrap(),
                vec![
                    "GET /repos/acme/widgets/pulls?per_page=100&state=all HTTP/1.1".to_string(),
                    "GET /repositories/9/pulls?page=2 HTTP/1.1".to_string(),
                ]
            );
        }

        #[tokio::test]
        async fn test_rate_limit_wait_is_capped_and_retried() {
            let reset = (Utc::now().timestamp() + 3600).to_string();
            let (base, seen) = serve(|_| {
                vec![
                    response(
                        "403 Forbidden",
                        &[
                            ("X-RateLimit-Remaining", "0".to_string()),
                            ("X-RateLimit-Reset", reset),
                        ],
                        r#"{"message": "API rate limit exceeded"}"#,
                    ),
                    response("200 OK", &[], r#"[{"id": 5}]"#),
                ]
            });
            let client = client(&base);

            let items: Vec<Item> = tokio::time::timeout(
                Duration::from_secs(5),
                client.paginate(pulls_url(&client), &[]),
            )
            .await
            .expect("wait should be capped")
            .unwrap();

            assert_eq!(items, vec![Item { id: 5 }]);
            assert_eq!(seen.lock().unwrap().len(), 2);
        }

        #[tokio::test]
        async fn test_rate_limit_retries_exhausted() {
            let (base, seen) = serve(|_| {
                vec![
                    response("429 Too Many Requests", &[("Retry-After", "1".to_string())], "{}"),
                    response("429 Too Many Requests", &[("Retry-After", "1".to_string())], "{}"),
                ]
            });
            let client = client(&base);

            let err = client
                .paginate::<Item>(pulls_url(&client), &[])
                .await
                .unwrap_err();

            assert!(matches!(err, Error::RateLimited(_)));
            assert_eq!(seen.lock().unwrap().len(), 2);
        }

        #[tokio::test]
        async fn test_forbidden_with_quota_left_is_http_error() {
            let (base, _seen) = serve(|_| {
                vec![response(
                    "403 Forbidden",
                    &[("X-RateLimit-Remaining", "12".to_string())],
                    r#"{"message": "Resource not accessible"}"#,
                )]
            });
            let client = client(&base);

            let err = client
                .get_json::<Item>(pulls_url(&client))
                .await
                .unwrap_err();

            match err {
                Error::Http { status, body, .. } => {
                    assert_eq!(status, 403);
                    assert!(body.contains("Resource not accessible"));
                }
                other => panic!("unexpected error: {:?}", other),
            }
        }
    }
}
