//! Точка входа `dxfeed-client`.
//!
//! Жизненный цикл:
//! - парсинг CLI и загрузка списка символов
//! - quote token: из `--token` или через REST-сессию по `--credentials`
//! - поток сессии DXLink: WebSocket, рукопожатие, подписка, приём FEED_DATA
//! - главный поток печатает котировки, пока не придёт итог сессии
//! - корректная остановка по `Ctrl+C`

mod auth;
mod cli;
mod config;
mod feed;
mod observer;
mod output;
mod symbols;
mod transport;

use std::sync::{Arc, atomic::AtomicBool, atomic::Ordering};
use std::thread;

use anyhow::{Context, bail};
use clap::Parser;
use log::{info, warn};

use dxfeed_core::{FailureReason, KEEPALIVE_INTERVAL, SessionOutcome};

use crate::auth::ApiSession;
use crate::cli::TokenSource;
use crate::config::{Credentials, DEFAULT_WS_URL, EVENT_CHANNEL_CAPACITY};
use crate::feed::FeedOptions;

/// Токен для DXLink и REST-сессия, которую надо закрыть в конце
struct Authorized {
    token: String,
    dxlink_url: Option<String>,
    api: Option<ApiSession>,
}

fn main() -> anyhow::Result<()> {
    // Логи через RUST_LOG=info/trace
    env_logger::init();

    let shutdown = Arc::new(AtomicBool::new(false));

    // Ctrl+C => ставим shutdown=true
    {
        let shutdown = shutdown.clone();
        ctrlc::set_handler(move || {
            shutdown.store(true, Ordering::Relaxed);
            info!("shutting down...");
        })?;
    }

    let args = cli::Args::parse();
    args.validate()?;

    let symbols = symbols::load_symbols(&args)?;

    let Some(source) = args.token_source() else {
        bail!("no quote token source");
    };
    let mut authorized = authorize(source, &args.api_url)?;

    let url = args
        .url
        .clone()
        .or(authorized.dxlink_url.take())
        .unwrap_or_else(|| DEFAULT_WS_URL.to_string());

    info!(
        "Starting dxfeed-client: url={}, channel={}, symbols={}",
        url,
        args.channel,
        symbols.join(",")
    );

    let opts = FeedOptions {
        url,
        token: authorized.token.clone(),
        channel: args.channel,
        symbols,
        keepalive: args.keepalive().then_some(KEEPALIVE_INTERVAL),
    };

    let (tx, rx) = crossbeam_channel::bounded(EVENT_CHANNEL_CAPACITY);
    let feed_thread = {
        let shutdown = shutdown.clone();
        thread::spawn(move || feed::run_feed(opts, tx, shutdown))
    };

    let printed = output::print_events(rx, args.json);

    // если печать сломалась, сессию надо остановить
    shutdown.store(true, Ordering::Relaxed);
    if feed_thread.join().is_err() {
        warn!("feed thread panicked");
    }

    if let Some(api) = authorized.api.as_mut() {
        if let Err(e) = api.close() {
            warn!("failed to close api session: {e}");
        }
    }

    match printed? {
        Some(SessionOutcome::Completed) => {
            info!("all symbols received");
            Ok(())
        }
        Some(SessionOutcome::Failed {
            reason: FailureReason::Cancelled,
            ..
        }) => {
            info!("cancelled");
            Ok(())
        }
        Some(SessionOutcome::Failed { reason, last_state }) => {
            bail!("feed failed in state {last_state}: {reason}")
        }
        None => bail!("feed ended without an outcome"),
    }
}

fn authorize(source: TokenSource, api_url: &str) -> anyhow::Result<Authorized> {
    let path = match source {
        TokenSource::Token(token) => {
            return Ok(Authorized {
                token,
                dxlink_url: None,
                api: None,
            });
        }
        TokenSource::Credentials(path) => path,
    };

    let credentials = Credentials::load(&path)?;
    let mut api = ApiSession::new(api_url)?;
    api.login(&credentials).context("login failed")?;

    match api.quote_token() {
        Ok(quote) => Ok(Authorized {
            token: quote.token,
            dxlink_url: quote.dxlink_url,
            api: Some(api),
        }),
        Err(e) => {
            if let Err(close_err) = api.close() {
                warn!("failed to close api session: {close_err}");
            }
            Err(anyhow::Error::new(e).context("failed to obtain quote token"))
        }
    }
}
