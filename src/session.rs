// Per-provider HTTP sessions
// Every adapter owns one session; cookies and headers never cross providers.

use async_trait::async_trait;
use reqwest::cookie::Jar;
use reqwest::header::{HeaderMap, HeaderValue, REFERER, USER_AGENT};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

use crate::error::RequestError;

const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 6.1; WOW64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/40.0.2214.91 Safari/537.36";

pub type FormFields = Vec<(String, String)>;

#[derive(Debug, Clone)]
pub struct HttpResponse {
    // Final URL after redirects
    pub url: Url,
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn ensure_success(self) -> Result<Self, RequestError> {
        if (200..300).contains(&self.status) {
            Ok(self)
        } else {
            Err(RequestError::Status {
                status: self.status,
                url: self.url.to_string(),
            })
        }
    }

    pub fn query_param(&self, name: &str) -> Option<String> {
        self.url
            .query_pairs()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.into_owned())
    }
}

#[async_trait]
pub trait HttpSession: Send + Sync {
    async fn post_form(
        &self,
        url: &str,
        fields: &FormFields,
        cookies: &[(&str, &str)],
    ) -> Result<HttpResponse, RequestError>;

    async fn get(&self, url: &str, query: &[(&str, &str)]) -> Result<HttpResponse, RequestError>;
}

// reqwest-backed session with its own cookie jar
pub struct ReqwestSession {
    client: reqwest::Client,
    cookies: Arc<Jar>,
}

impl ReqwestSession {
    pub fn new(referer: &str, timeout: Duration) -> Result<Self, RequestError> {
        Self::with_builder(reqwest::Client::builder(), referer, timeout)
    }

    fn with_builder(
        builder: reqwest::ClientBuilder,
        referer: &str,
        timeout: Duration,
    ) -> Result<Self, RequestError> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(BROWSER_USER_AGENT));
        headers.insert(
            REFERER,
            HeaderValue::from_str(referer).map_err(|e| RequestError::Transport(e.to_string()))?,
        );

        let cookies = Arc::new(Jar::default());
        let client = builder
            .cookie_provider(cookies.clone())
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| RequestError::Transport(e.to_string()))?;

        Ok(Self { client, cookies })
    }

    async fn read(response: reqwest::Response) -> Result<HttpResponse, RequestError> {
        let url = response.url().clone();
        let status = response.status().as_u16();
        let body = response.text().await.map_err(transport_error)?;
        Ok(HttpResponse { url, status, body })
    }
}

fn transport_error(err: reqwest::Error) -> RequestError {
    RequestError::Transport(err.to_string())
}

#[async_trait]
impl HttpSession for ReqwestSession {
    // Explicit cookies go into the jar, so they travel with whatever the
    // provider has set so far instead of replacing it.
    async fn post_form(
        &self,
        url: &str,
        fields: &FormFields,
        cookies: &[(&str, &str)],
    ) -> Result<HttpResponse, RequestError> {
        if !cookies.is_empty() {
            let target = Url::parse(url).map_err(|e| RequestError::Transport(e.to_string()))?;
            for (name, value) in cookies {
                self.cookies.add_cookie_str(&format!("{}={}", name, value), &target);
            }
        }

        let response = self
            .client
            .post(url)
            .form(fields)
            .send()
            .await
            .map_err(transport_error)?;
        Self::read(response).await
    }

    async fn get(&self, url: &str, query: &[(&str, &str)]) -> Result<HttpResponse, RequestError> {
        let response = self
            .client
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(transport_error)?;
        Self::read(response).await
    }
}


#[cfg(test)]
mod tests {
    use super::mock_session::*;
    use super::*;
    use parking_lot::Mutex;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    const SESSION_COOKIE: &str = "ASP.NET_SessionId=abc123";

    // Answers every request on `listener` and records its head; the first
    // answer sets a session cookie.
    async fn serve(listener: TcpListener, heads: Arc<Mutex<Vec<String>>>) {
        while let Ok((mut stream, _)) = listener.accept().await {
            let mut raw = Vec::new();
            let mut buf = [0u8; 4096];
            let head = loop {
                let n = stream.read(&mut buf).await.unwrap_or(0);
                raw.extend_from_slice(&buf[..n]);
                let text = String::from_utf8_lossy(&raw).to_string();
                if let Some(end) = text.find("\r\n\r\n") {
                    let length = text[..end]
                        .lines()
                        .find_map(|line| {
                            let (name, value) = line.split_once(':')?;
                            name.eq_ignore_ascii_case("content-length")
                                .then(|| value.trim().parse::<usize>().ok())
                                .flatten()
                        })
                        .unwrap_or(0);
                    if raw.len() >= end + 4 + length || n == 0 {
                        break text[..end].to_string();
                    }
                } else if n == 0 {
                    break text;
                }
            };

            let set_cookie = {
                let mut heads = heads.lock();
                heads.push(head);
                if heads.len() == 1 {
                    format!("Set-Cookie: {}; Path=/\r\n", SESSION_COOKIE)
                } else {
                    String::new()
                }
            };
            let reply = format!(
                "HTTP/1.1 200 OK\r\n{}Content-Length: 2\r\nConnection: close\r\n\r\nok",
                set_cookie
            );
            let _ = stream.write_all(reply.as_bytes()).await;
            let _ = stream.shutdown().await;
        }
    }

    fn cookie_line(head: &str) -> String {
        head.lines()
            .find(|line| line.to_ascii_lowercase().starts_with("cookie:"))
            .unwrap_or_default()
            .to_string()
    }

    #[tokio::test]
    async fn test_explicit_cookies_keep_session_cookies() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/Booking/OneWaySearch", listener.local_addr().unwrap());
        let heads = Arc::new(Mutex::new(Vec::new()));
        tokio::spawn(serve(listener, heads.clone()));

        let session = ReqwestSession::with_builder(
            reqwest::Client::builder().no_proxy(),
            &url,
            Duration::from_secs(5),
        )
        .unwrap();
        let fields = vec![("From".to_string(), "SFO".to_string())];
        let flag = [("AspxAutoDetectCookieSupport", "1")];

        for _ in 0..2 {
            let resp = session.post_form(&url, &fields, &flag).await.unwrap();
            assert_eq!(resp.body, "ok");
        }

        let heads = heads.lock().clone();
        assert_eq!(heads.len(), 2);
        assert!(cookie_line(&heads[0]).contains("AspxAutoDetectCookieSupport=1"));
        assert!(!cookie_line(&heads[0]).contains(SESSION_COOKIE));

        let second = cookie_line(&heads[1]);
        assert!(second.contains("AspxAutoDetectCookieSupport=1"), "{}", second);
        assert!(second.contains(SESSION_COOKIE), "{}", second);
    }

    #[test]
    fn test_ensure_success_rejects_error_status() {
        let ok = ok_response("https://example.com/search", "<html></html>");
        assert!(ok.ensure_success().is_ok());

        let err = response("https://example.com/search", 502, "").ensure_success().unwrap_err();
        assert_eq!(
            err,
            RequestError::Status {
                status: 502,
                url: "https://example.com/search".to_string(),
            }
        );
    }

    #[test]
    fn test_query_param_reads_redirect_target() {
        let resp = ok_response(
            "https://book.jetblue.com/B6/webqtrip.html?_flowExecutionKey=e1s1&other=x%20y",
            "",
        );
        assert_eq!(resp.query_param("_flowExecutionKey").as_deref(), Some("e1s1"));
        assert_eq!(resp.query_param("other").as_deref(), Some("x y"));
        assert_eq!(resp.query_param("missing"), None);
    }

    #[test]
    fn test_reqwest_session_builds() {
        let session = ReqwestSession::new(
            "https://www.southwest.com/flight/select-flight.html",
            Duration::from_secs(5),
        );
        assert!(session.is_ok());
    }

    #[tokio::test]
    async fn test_mock_session_records_requests() {
        let session = MockSession::with_body("<p>ok</p>");
        let fields = vec![("origin".to_string(), "SFO".to_string())];

        let resp = session
            .post_form("https://example.com/a", &fields, &[("flag", "1")])
            .await
            .unwrap();
        assert_eq!(resp.body, "<p>ok</p>");
        session.get("https://example.com/b", &[("k", "v")]).await.unwrap();

        let requests = session.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].method, Method::Post);
        assert_eq!(requests[0].param("origin"), Some("SFO"));
        assert_eq!(requests[0].cookies, vec![("flag".to_string(), "1".to_string())]);
        assert_eq!(requests[1].method, Method::Get);
        assert_eq!(requests[1].param("k"), Some("v"));
    }
}
