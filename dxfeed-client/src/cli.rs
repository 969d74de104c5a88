use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{ArgGroup, Parser};

use crate::config::{DEFAULT_API_URL, DEFAULT_CHANNEL};

/// dxFeed client - подписка на котировки Quote через DXLink WebSocket.
///
/// Quote token берётся из --token или выпускается через REST-сессию
/// по --credentials. Клиент завершается, когда по каждому символу
/// пришла хотя бы одна котировка.
#[derive(Parser, Debug, Clone)]
#[command(name = "dxfeed-client", version, about)]
#[command(
    group(
        ArgGroup::new("symbols_source")
            .required(true)
            .args(["symbols_file", "symbols"])
    )
)]
pub(crate) struct Args {
    /// WebSocket URL DXLink. По умолчанию берётся из ответа api-quote-tokens
    /// или из встроенного значения
    #[arg(long)]
    pub(crate) url: Option<String>,

    /// Номер канала FEED
    #[arg(long, default_value_t = DEFAULT_CHANNEL, value_parser = clap::value_parser!(u32).range(1..))]
    pub(crate) channel: u32,

    /// Файл символов (по одному на строку). Нельзя вместе с --symbols
    #[arg(long, conflicts_with = "symbols")]
    pub(crate) symbols_file: Option<PathBuf>,

    /// Список символов строкой, например: "/6EZ24:XCME,SPY"
    /// Нельзя вместе с --symbols-file
    #[arg(long, conflicts_with = "symbols_file")]
    pub(crate) symbols: Option<String>,

    /// Готовый quote token
    #[arg(long, env = "DXFEED_TOKEN", hide_env_values = true)]
    pub(crate) token: Option<String>,

    /// JSON-файл с логином и паролем для REST-сессии
    #[arg(long, env = "DXFEED_CREDENTIALS")]
    pub(crate) credentials: Option<PathBuf>,

    /// Базовый URL REST API
    #[arg(long, default_value = DEFAULT_API_URL)]
    pub(crate) api_url: String,

    /// Не слать KEEPALIVE
    #[arg(long)]
    pub(crate) no_keepalive: bool,

    /// Печатать котировки как JSON (по объекту на строку)
    #[arg(long)]
    pub(crate) json: bool,
}

/// Откуда брать quote token
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum TokenSource {
    /// передан напрямую
    Token(String),
    /// выпустить через REST по файлу учётных данных
    Credentials(PathBuf),
}

impl Args {
    /// Валидация аргументов (файлы существуют, есть источник токена и т.д.)
    pub(crate) fn validate(&self) -> Result<()> {
        if let Some(path) = &self.symbols_file {
            let md = std::fs::metadata(path)
                .with_context(|| format!("symbols file not found: {:?}", path))?;
            if !md.is_file() {
                bail!("--symbols-file must point to a file: {:?}", path);
            }
        }

        if let Some(url) = &self.url {
            if !(url.starts_with("ws://") || url.starts_with("wss://")) {
                bail!("--url must start with ws:// or wss:// (got: {url})");
            }
        }

        if self.token.as_deref().is_some_and(|t| t.trim().is_empty()) {
            bail!("--token is empty");
        }

        if self.token.is_none() && self.credentials.is_none() {
            bail!("either --token (DXFEED_TOKEN) or --credentials (DXFEED_CREDENTIALS) must be provided");
        }

        Ok(())
    }

    /// Токен важнее файла учётных данных
    pub(crate) fn token_source(&self) -> Option<TokenSource> {
        match (&self.token, &self.credentials) {
            (Some(token), _) => Some(TokenSource::Token(token.clone())),
            (None, Some(path)) => Some(TokenSource::Credentials(path.clone())),
            (None, None) => None,
        }
    }

    pub(crate) fn keepalive(&self) -> bool {
        !self.no_keepalive
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> std::result::Result<Args, clap::Error> {
        Args::try_parse_from(std::iter::once("dxfeed-client").chain(args.iter().copied()))
    }

    #[test]
    fn defaults() {
        let args = parse(&["--symbols", "SPY", "--token", "t"]).unwrap();
        assert_eq!(args.channel, DEFAULT_CHANNEL);
        assert_eq!(args.api_url, DEFAULT_API_URL);
        assert!(args.url.is_none());
        assert!(args.keepalive());
        assert!(!args.json);
        args.validate().unwrap();
    }

    #[test]
    fn symbols_source_is_required_and_exclusive() {
        assert!(parse(&["--token", "t"]).is_err());
        assert!(parse(&["--symbols", "SPY", "--symbols-file", "s.txt", "--token", "t"]).is_err());
    }

    #[test]
    fn channel_zero_is_rejected() {
        assert!(parse(&["--symbols", "SPY", "--channel", "0"]).is_err());
        let args = parse(&["--symbols", "SPY", "--channel", "7"]).unwrap();
        assert_eq!(args.channel, 7);
    }

    #[test]
    fn token_wins_over_credentials() {
        let args = parse(&["--symbols", "SPY", "--token", "t", "--credentials", "c.json"]).unwrap();
        assert_eq!(args.token_source(), Some(TokenSource::Token("t".into())));

        let args = parse(&["--symbols", "SPY", "--credentials", "c.json"]).unwrap();
        assert_eq!(
            args.token_source(),
            Some(TokenSource::Credentials(PathBuf::from("c.json")))
        );
    }

    #[test]
    fn validate_rejects_bad_input() {
        let mut args = parse(&["--symbols", "SPY", "--token", "t"]).unwrap();

        args.url = Some("https://example.com".into());
        assert!(args.validate().is_err());
        args.url = Some("wss://example.com/realtime".into());
        args.validate().unwrap();

        args.token = Some("  ".into());
        assert!(args.validate().is_err());

        args.token = None;
        args.credentials = None;
        assert!(args.validate().is_err());
    }

    #[test]
    fn validate_checks_symbols_file() {
        let mut args = parse(&["--symbols-file", "/definitely/missing.txt", "--token", "t"]).unwrap();
        assert!(args.validate().is_err());

        let dir = tempfile::tempdir().unwrap();
        args.symbols_file = Some(dir.path().to_path_buf());
        assert!(args.validate().is_err());
    }
}
