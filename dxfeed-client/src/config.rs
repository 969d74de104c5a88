use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

pub(crate) const DEFAULT_WS_URL: &str = "wss://tasty-openapi-ws.dxfeed.com/realtime";
pub(crate) const DEFAULT_API_URL: &str = "https://api.tastyworks.com";
pub(crate) const DEFAULT_CHANNEL: u32 = 3;

/// Таймаут чтения сокета: шаг цикла, между шагами проверяем shutdown и keepalive
pub(crate) const SOCKET_TICK: Duration = Duration::from_millis(200);

/// TCP connect к одному адресу
pub(crate) const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// TLS + WebSocket upgrade целиком; таймаут записи сокета на всю сессию
pub(crate) const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Сколько ждём ответный Close от сервера после своего
pub(crate) const CLOSE_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

pub(crate) const EVENT_CHANNEL_CAPACITY: usize = 1024;

pub(crate) const HTTP_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Error)]
pub(crate) enum ConfigError {
    #[error("failed to read credentials file: {path:?}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid credentials file: {path:?}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("credentials field {field:?} is empty")]
    Empty { field: &'static str },
}

/// Значение из файла учётных данных: строка или массив (берём первый элемент)
#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl OneOrMany {
    fn into_first(self) -> Option<String> {
        match self {
            OneOrMany::One(s) => Some(s),
            OneOrMany::Many(v) => v.into_iter().next(),
        }
    }
}

#[derive(Deserialize)]
struct RawCredentials {
    user: OneOrMany,
    pw: OneOrMany,
}

/// Логин и пароль для REST-сессии
#[derive(Clone, PartialEq, Eq)]
pub(crate) struct Credentials {
    pub(crate) login: String,
    pub(crate) password: String,
}

// пароль в логи не попадает
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("login", &self.login)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl Credentials {
    /// Читает `{"user": ..., "pw": ...}` из файла
    pub(crate) fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        let raw = fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            source: e,
        })?;

        Self::parse(&raw).map_err(|e| match e {
            ParseFailure::Json(source) => ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            },
            ParseFailure::Empty(field) => ConfigError::Empty { field },
        })
    }

    fn parse(raw: &str) -> Result<Self, ParseFailure> {
        let raw: RawCredentials = serde_json::from_str(raw).map_err(ParseFailure::Json)?;

        let login = non_empty(raw.user.into_first(), "user")?;
        let password = non_empty(raw.pw.into_first(), "pw")?;

        Ok(Self { login, password })
    }
}

enum ParseFailure {
    Json(serde_json::Error),
    Empty(&'static str),
}

fn non_empty(value: Option<String>, field: &'static str) -> Result<String, ParseFailure> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(ParseFailure::Empty(field)),
    }
}
