use std::fmt;
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use std::time::{Duration, Instant};

use crossbeam_channel::Sender;
use log::{debug, error, info};
use tungstenite::Message;

use dxfeed_core::{
    FailureReason, FeedListener, FeedSession, ProtocolState, QuoteRecord, SessionConfig,
    SessionOutcome,
};

use crate::config::{CLOSE_DRAIN_TIMEOUT, SOCKET_TICK};
use crate::observer::LogObserver;
use crate::transport::{ConnectError, WsTransport, is_tick};

/// Что поток сессии отдаёт главному потоку
#[derive(Debug)]
pub(crate) enum FeedEvent {
    Quote(QuoteRecord),
    Finished(SessionOutcome),
}

/// Мост FeedListener -> crossbeam-канал
pub(crate) struct ChannelListener {
    tx: Sender<FeedEvent>,
}

impl ChannelListener {
    pub(crate) fn new(tx: Sender<FeedEvent>) -> Self {
        Self { tx }
    }
}

impl FeedListener for ChannelListener {
    fn on_quote(&mut self, quote: QuoteRecord) {
        if self.tx.send(FeedEvent::Quote(quote)).is_err() {
            debug!("event receiver is gone, quote dropped");
        }
    }

    fn on_finished(&mut self, outcome: SessionOutcome) {
        if self.tx.send(FeedEvent::Finished(outcome)).is_err() {
            debug!("event receiver is gone, outcome dropped");
        }
    }
}

#[derive(Clone)]
pub(crate) struct FeedOptions {
    pub(crate) url: String,
    pub(crate) token: String,
    pub(crate) channel: u32,
    pub(crate) symbols: Vec<String>,
    /// `None`: KEEPALIVE не шлём
    pub(crate) keepalive: Option<Duration>,
}

impl fmt::Debug for FeedOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FeedOptions")
            .field("url", &self.url)
            .field("token", &"<redacted>")
            .field("channel", &self.channel)
            .field("symbols", &self.symbols)
            .field("keepalive", &self.keepalive)
            .finish()
    }
}

/// I/O-цикл одной сессии. Возвращается, когда сессия в терминальном состоянии;
/// итог уже отправлен в `events`.
pub(crate) fn run_feed(opts: FeedOptions, events: Sender<FeedEvent>, shutdown: Arc<AtomicBool>) {
    let transport = match WsTransport::connect(&opts.url, &opts.token, SOCKET_TICK, &shutdown) {
        Ok(t) => t,
        Err(e) => {
            let reason = match e {
                ConnectError::Cancelled => {
                    info!("connect to {} cancelled", opts.url);
                    FailureReason::Cancelled
                }
                ConnectError::Failed(e) => {
                    error!("connect to {} failed: {e:#}", opts.url);
                    FailureReason::TransportFailed(format!("{e:#}"))
                }
            };
            let outcome = SessionOutcome::Failed {
                reason,
                last_state: ProtocolState::Connecting,
            };
            if events.send(FeedEvent::Finished(outcome)).is_err() {
                debug!("event receiver is gone, outcome dropped");
            }
            return;
        }
    };
    info!("connected to {}", opts.url);

    let config = SessionConfig {
        channel: opts.channel,
        token: opts.token,
        symbols: opts.symbols,
    };
    let mut session = FeedSession::new(config, transport, ChannelListener::new(events))
        .with_observer(LogObserver);

    // ошибка отправки уже перевела сессию в Failed, цикл ниже не начнётся
    if let Err(e) = session.on_open() {
        error!("failed to start session: {e}");
    }

    let mut next_keepalive = opts.keepalive.map(|every| Instant::now() + every);

    while !session.is_finished() {
        if shutdown.load(Ordering::Relaxed) {
            info!("cancelling feed session...");
            session.cancel();
            break;
        }

        if let (Some(every), Some(due)) = (opts.keepalive, next_keepalive) {
            if Instant::now() >= due {
                if let Err(e) = session.send_keepalive() {
                    error!("keepalive failed: {e}");
                }
                next_keepalive = Some(Instant::now() + every);
            }
        }

        match session.transport_mut().read() {
            Ok(Message::Text(text)) => {
                // битые кадры уже залогировал LogObserver
                if let Err(e) = session.on_message(&text) {
                    if e.is_fatal() {
                        error!("session failed: {e}");
                    }
                }
            }
            Ok(Message::Close(frame)) => {
                info!("server closed connection: {frame:?}");
                session.on_close();
            }
            // ping/pong tungstenite обрабатывает сам, binary протокол не использует
            Ok(_) => {}
            Err(tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed) => {
                session.on_close();
            }
            Err(tungstenite::Error::Io(e)) if is_tick(&e) => {
                // просто "тик" цикла
                continue;
            }
            Err(e) => {
                error!("websocket error: {e}");
                session.on_fail(e.to_string());
            }
        }
    }

    session.transport_mut().drain_close(CLOSE_DRAIN_TIMEOUT);
    info!("feed session finished in state {}", session.state());
}
