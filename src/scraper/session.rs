//! Session context and the login handshake.

use crate::config::Credentials;
use crate::scraper::http_client::HttpClient;
use crate::scraper::parsers::parse_xsrf_token;
use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::{error, info, warn};

/// Per-run state every network call reads and updates.
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    token: Option<String>,
    last_request_failed: bool,
}

impl SessionState {
    /// Anti-forgery token scraped from the base page, if any.
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn set_token(&mut self, token: impl Into<String>) {
        self.token = Some(token.into());
    }

    pub fn last_request_failed(&self) -> bool {
        self.last_request_failed
    }

    pub(crate) fn mark_failed(&mut self) {
        self.last_request_failed = true;
    }

    pub(crate) fn clear_failure(&mut self) {
        self.last_request_failed = false;
    }

    /// Token as a form value; an absent token is sent empty.
    pub(crate) fn token_field(&self) -> String {
        self.token.clone().unwrap_or_default()
    }
}

// ── Login ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginChannel {
    Email,
    Phone,
}

impl LoginChannel {
    pub fn for_account(account: &str) -> Self {
        if account.contains('@') {
            LoginChannel::Email
        } else {
            LoginChannel::Phone
        }
    }

    /// Path segment of the login endpoint, also the name of the account form field.
    pub fn field(self) -> &'static str {
        match self {
            LoginChannel::Email => "email",
            LoginChannel::Phone => "phone_num",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginOutcome {
    Success,
    Rejected { code: i64, message: String },
    MissingCredentials,
}

impl LoginOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, LoginOutcome::Success)
    }
}

// e.g. {"r":0, "msg": "登陆成功"}
#[derive(Debug, Deserialize)]
struct LoginReply {
    r: i64,
    #[serde(default)]
    msg: serde_json::Value,
}

pub struct SessionManager {
    base_url: String,
}

impl SessionManager {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Scrape the anti-forgery token from the base page into `session`.
    ///
    /// Never fails: a missing token is logged and surfaces later as a
    /// rejected login. Returns whether a token was stored.
    pub async fn initialize_token(&self, client: &HttpClient, session: &mut SessionState) -> bool {
        let url = format!("{}/", self.base_url);
        let token = match client.fetch(session, &url).await {
            Ok((_, doc)) => parse_xsrf_token(&doc),
            Err(e) => {
                error!("fail to init xsrf: {}", e);
                return false;
            }
        };

        match token {
            Some(token) => {
                session.set_token(token);
                true
            }
            None => {
                error!("fail to init xsrf: no _xsrf input on {}", url);
                false
            }
        }
    }

    /// Log in with `credentials`. Call `initialize_token` first.
    pub async fn login(
        &self,
        client: &HttpClient,
        session: &mut SessionState,
        credentials: &Credentials,
    ) -> Result<LoginOutcome> {
        if credentials.is_empty() {
            warn!("No account configured, skipping login");
            return Ok(LoginOutcome::MissingCredentials);
        }

        let channel = LoginChannel::for_account(&credentials.account);
        let url = format!("{}/login/{}", self.base_url, channel.field());
        let form = [
            ("remember_me", "true".to_string()),
            ("password", credentials.password.clone()),
            ("_xsrf", session.token_field()),
            (channel.field(), credentials.account.clone()),
        ];

        let body = client
            .submit(session, &url, &form)
            .await
            .with_context(|| format!("Login request to {} failed", url))?;
        let reply: LoginReply =
            serde_json::from_str(&body).context("Unexpected login response")?;

        if reply.r == 0 {
            info!("Logged in via {}", channel.field());
            Ok(LoginOutcome::Success)
        } else {
            let message = match reply.msg {
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            };
            warn!("Login rejected (r={}): {}", reply.r, message);
            Ok(LoginOutcome::Rejected {
                code: reply.r,
                message,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScraperConfig;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client() -> HttpClient {
        HttpClient::new(&ScraperConfig {
            max_attempts: 2,
            retry_backoff_secs: 0,
            ..ScraperConfig::default()
        })
        .unwrap()
    }

    fn creds(account: &str) -> Credentials {
        Credentials {
            account: account.to_string(),
            password: "secret".to_string(),
        }
    }

    #[test]
    fn channel_follows_account_shape() {
        assert_eq!(LoginChannel::for_account("a@b.com"), LoginChannel::Email);
        assert_eq!(LoginChannel::for_account("13800000000"), LoginChannel::Phone);
        assert_eq!(LoginChannel::Email.field(), "email");
        assert_eq!(LoginChannel::Phone.field(), "phone_num");
    }

    #[tokio::test]
    async fn token_is_scraped_from_base_page() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"<html><form><input type="hidden" name="_xsrf" value="abc123"/></form></html>"#,
            ))
            .mount(&server)
            .await;

        let mut session = SessionState::default();
        let manager = SessionManager::new(&server.uri());
        assert!(manager.initialize_token(&client(), &mut session).await);
        assert_eq!(session.token(), Some("abc123"));
    }

    #[tokio::test]
    async fn missing_token_or_dead_server_is_not_fatal() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html></html>"))
            .mount(&server)
            .await;

        let mut session = SessionState::default();
        assert!(!SessionManager::new(&server.uri())
            .initialize_token(&client(), &mut session)
            .await);
        assert_eq!(session.token(), None);

        let dead = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&dead)
            .await;
        assert!(!SessionManager::new(&dead.uri())
            .initialize_token(&client(), &mut session)
            .await);
        assert_eq!(session.token(), None);
    }

    #[tokio::test]
    async fn email_login_posts_to_email_endpoint() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/login/email"))
            .and(body_string_contains("email=a%40b.com"))
            .and(body_string_contains("remember_me=true"))
            .and(body_string_contains("_xsrf=tok"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"r":0,"msg":"ok"}"#))
            .expect(1)
            .mount(&server)
            .await;

        let mut session = SessionState::default();
        session.set_token("tok");
        let outcome = SessionManager::new(&server.uri())
            .login(&client(), &mut session, &creds("a@b.com"))
            .await
            .unwrap();

        assert!(outcome.is_success());
    }

    #[tokio::test]
    async fn phone_login_reports_rejection() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/login/phone_num"))
            .and(body_string_contains("phone_num=13800000000"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string(r#"{"r":1,"msg":"bad password"}"#),
            )
            .expect(1)
            .mount(&server)
            .await;

        let mut session = SessionState::default();
        let outcome = SessionManager::new(&server.uri())
            .login(&client(), &mut session, &creds("13800000000"))
            .await
            .unwrap();

        assert_eq!(
            outcome,
            LoginOutcome::Rejected {
                code: 1,
                message: "bad password".to_string()
            }
        );
    }

    #[tokio::test]
    async fn empty_account_never_reaches_the_server() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let mut session = SessionState::default();
        let outcome = SessionManager::new(&server.uri())
            .login(&client(), &mut session, &Credentials::default())
            .await
            .unwrap();

        assert_eq!(outcome, LoginOutcome::MissingCredentials);
        assert!(!outcome.is_success());
    }
}
