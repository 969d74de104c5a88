use std::fmt;

use log::{debug, info};
use reqwest::StatusCode;
use reqwest::blocking::{Client, Response};
use reqwest::header::AUTHORIZATION;
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;

use crate::config::{Credentials, HTTP_TIMEOUT};

const MAX_ERROR_BODY: usize = 512;

#[derive(Debug, Error)]
pub(crate) enum AuthError {
    #[error("http request failed")]
    Http(#[from] reqwest::Error),

    #[error("unexpected status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("invalid response body")]
    Json(#[from] serde_json::Error),

    #[error("response has no {0:?}")]
    MissingField(&'static str),

    #[error("not logged in")]
    NotLoggedIn,
}

/// Quote token и (опционально) адрес DXLink, выданные REST API
#[derive(Clone, PartialEq, Eq)]
pub(crate) struct QuoteToken {
    pub(crate) token: String,
    pub(crate) dxlink_url: Option<String>,
}

impl fmt::Debug for QuoteToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QuoteToken")
            .field("token", &"<redacted>")
            .field("dxlink_url", &self.dxlink_url)
            .finish()
    }
}

#[derive(Deserialize)]
struct Envelope<T> {
    data: Option<T>,
}

#[derive(Deserialize)]
struct SessionData {
    #[serde(rename = "session-token")]
    session_token: Option<String>,
}

#[derive(Deserialize)]
struct QuoteTokenData {
    token: Option<String>,
    #[serde(rename = "dxlink-url")]
    dxlink_url: Option<String>,
}

/// REST-сессия: логин, выпуск quote token, выход.
///
/// Живёт только в клиенте, протокол DXLink о ней не знает.
pub(crate) struct ApiSession {
    client: Client,
    base_url: String,
    session_token: Option<String>,
}

impl ApiSession {
    pub(crate) fn new(base_url: &str) -> Result<Self, AuthError> {
        let client = Client::builder()
            .timeout(HTTP_TIMEOUT)
            .user_agent(concat!("dxfeed-client/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            session_token: None,
        })
    }

    /// POST /sessions, ждём 201
    pub(crate) fn login(&mut self, credentials: &Credentials) -> Result<(), AuthError> {
        let body = json!({
            "login": credentials.login,
            "password": credentials.password,
            "remember-me": true,
        });

        let resp = self.client.post(self.url("/sessions")).json(&body).send()?;
        let text = expect_status(resp, &[StatusCode::CREATED])?;

        self.session_token = Some(parse_session_token(&text)?);
        info!("api session opened for {}", credentials.login);
        Ok(())
    }

    /// GET /api-quote-tokens, ждём 200
    pub(crate) fn quote_token(&self) -> Result<QuoteToken, AuthError> {
        let session = self.session_token.as_deref().ok_or(AuthError::NotLoggedIn)?;

        let resp = self
            .client
            .get(self.url("/api-quote-tokens"))
            .header(AUTHORIZATION, session)
            .send()?;
        let text = expect_status(resp, &[StatusCode::OK])?;

        let token = parse_quote_token(&text)?;
        debug!("quote token issued, dxlink url: {:?}", token.dxlink_url);
        Ok(token)
    }

    /// DELETE /sessions, 200 или 204. Без открытой сессии ничего не делает.
    pub(crate) fn close(&mut self) -> Result<(), AuthError> {
        let Some(session) = self.session_token.take() else {
            return Ok(());
        };

        let resp = self
            .client
            .delete(self.url("/sessions"))
            .header(AUTHORIZATION, session)
            .send()?;
        expect_status(resp, &[StatusCode::OK, StatusCode::NO_CONTENT])?;

        info!("api session closed");
        Ok(())
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

fn expect_status(resp: Response, ok: &[StatusCode]) -> Result<String, AuthError> {
    let status = resp.status();
    let body = resp.text()?;

    if ok.contains(&status) {
        return Ok(body);
    }

    Err(AuthError::Status {
        status: status.as_u16(),
        body: truncate(body),
    })
}

fn truncate(mut body: String) -> String {
    if body.len() > MAX_ERROR_BODY {
        let mut cut = MAX_ERROR_BODY;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        body.truncate(cut);
        body.push_str("...");
    }
    body
}

fn parse_session_token(body: &str) -> Result<String, AuthError> {
    let envelope: Envelope<SessionData> = serde_json::from_str(body)?;

    envelope
        .data
        .ok_or(AuthError::MissingField("data"))?
        .session_token
        .ok_or(AuthError::MissingField("session-token"))
}

fn parse_quote_token(body: &str) -> Result<QuoteToken, AuthError> {
    let envelope: Envelope<QuoteTokenData> = serde_json::from_str(body)?;
    let data = envelope.data.ok_or(AuthError::MissingField("data"))?;

    Ok(QuoteToken {
        token: data.token.ok_or(AuthError::MissingField("token"))?,
        dxlink_url: data.dxlink_url,
    })
}
