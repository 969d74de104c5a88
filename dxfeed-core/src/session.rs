use std::fmt;

use serde_json::Value;

use crate::constants::COMPACT_DATA_FORMAT;
use crate::error::{SessionError, TransportError};
use crate::protocol::{self, AuthStatus, ControlMessage};
use crate::subscription::SubscriptionTracker;
use crate::traits::{FeedListener, IgnoreReason, NoopObserver, SessionObserver, Transport};
use crate::wire::decode_quotes;

/// Состояние протокола на одном соединении
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProtocolState {
    /// ждём открытия транспорта
    Connecting,
    /// SETUP отправлен, ждём AUTH_STATE
    AwaitingAuthState,
    /// AUTH отправлен
    Authenticating,
    /// CHANNEL_REQUEST отправлен
    AwaitingChannel,
    /// канал открыт (промежуточное)
    ChannelOpen,
    /// FEED_SETUP отправлен
    AwaitingFeedConfig,
    /// FEED_SUBSCRIPTION отправлен, идут данные
    Subscribed,
    /// все символы получены
    Complete,
    /// сессия завершилась неудачей
    Failed,
}

impl ProtocolState {
    /// Терминальное состояние: дальше переходов нет
    pub fn is_terminal(self) -> bool {
        matches!(self, ProtocolState::Complete | ProtocolState::Failed)
    }
}

impl fmt::Display for ProtocolState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Причина неудачного завершения
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    /// транспорт закрылся
    TransportClosed,
    /// транспорт сообщил об ошибке
    TransportFailed(String),
    /// не удалось отправить сообщение
    SendFailed(String),
    /// остановлено вызывающей стороной
    Cancelled,
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::TransportClosed => write!(f, "transport closed"),
            FailureReason::TransportFailed(reason) => write!(f, "transport failed: {reason}"),
            FailureReason::SendFailed(reason) => write!(f, "send failed: {reason}"),
            FailureReason::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Итог сессии
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOutcome {
    /// по всем символам пришли данные
    Completed,
    /// сессия прервана
    Failed {
        /// причина
        reason: FailureReason,
        /// последнее состояние перед отказом
        last_state: ProtocolState,
    },
}

/// Параметры сессии, фиксированные на всё время её жизни
#[derive(Clone)]
pub struct SessionConfig {
    /// номер канала, который запрашивает клиент
    pub channel: u32,
    /// quote token от внешнего auth-коллаборатора
    pub token: String,
    /// символы для подписки
    pub symbols: Vec<String>,
}

impl fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionConfig")
            .field("channel", &self.channel)
            .field("token", &"<redacted>")
            .field("symbols", &self.symbols)
            .finish()
    }
}

/// Машина состояний протокола.
///
/// SETUP -> AUTH -> CHANNEL_REQUEST -> FEED_SETUP -> FEED_SUBSCRIPTION -> FEED_DATA*.
/// Каждая отправка разрешена только из своего состояния; сообщения для чужого
/// канала и сообщения не к месту игнорируются без смены состояния.
///
/// Сессия не блокируется и не держит таймеров: её дёргает транспорт, по одному
/// событию за раз.
pub struct FeedSession<T, L, O = NoopObserver> {
    channel: u32,
    token: String,
    state: ProtocolState,
    tracker: SubscriptionTracker,
    transport: T,
    listener: L,
    observer: O,
    close_requested: bool,
}

impl<T: Transport, L: FeedListener> FeedSession<T, L> {
    /// Новая сессия в состоянии `Connecting`
    pub fn new(config: SessionConfig, transport: T, listener: L) -> Self {
        Self {
            channel: config.channel,
            token: config.token,
            state: ProtocolState::Connecting,
            tracker: SubscriptionTracker::new(config.symbols),
            transport,
            listener,
            observer: NoopObserver,
            close_requested: false,
        }
    }
}

impl<T: Transport, L: FeedListener, O: SessionObserver> FeedSession<T, L, O> {
    /// Подключает наблюдателя
    pub fn with_observer<O2: SessionObserver>(self, observer: O2) -> FeedSession<T, L, O2> {
        FeedSession {
            channel: self.channel,
            token: self.token,
            state: self.state,
            tracker: self.tracker,
            transport: self.transport,
            listener: self.listener,
            observer,
            close_requested: self.close_requested,
        }
    }

    /// Текущее состояние
    pub fn state(&self) -> ProtocolState {
        self.state
    }

    /// Сессия в терминальном состоянии
    pub fn is_finished(&self) -> bool {
        self.state.is_terminal()
    }

    /// Номер канала сессии
    pub fn channel(&self) -> u32 {
        self.channel
    }

    /// Трекер подписки
    pub fn tracker(&self) -> &SubscriptionTracker {
        &self.tracker
    }

    /// Транспорт
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Транспорт (для чтения входящих кадров владельцем цикла)
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Получатель результатов
    pub fn listener(&self) -> &L {
        &self.listener
    }

    /// Наблюдатель
    pub fn observer(&self) -> &O {
        &self.observer
    }

    /// Транспорт открыт: отправляем SETUP
    pub fn on_open(&mut self) -> Result<(), SessionError> {
        if self.state != ProtocolState::Connecting {
            self.observer
                .on_ignored("OPEN", self.state, &IgnoreReason::UnexpectedForState);
            return Ok(());
        }

        self.send(&ControlMessage::Setup)?;
        self.transition(ProtocolState::AwaitingAuthState);
        Ok(())
    }

    /// Входящий текстовый кадр.
    ///
    /// `Err(SessionError::Decode)`: кадр битый, сессия продолжает работу.
    /// `Err(SessionError::Transport)`: ответ не ушёл, сессия уже в `Failed`.
    pub fn on_message(&mut self, text: &str) -> Result<(), SessionError> {
        if self.state.is_terminal() {
            self.observer
                .on_ignored("FRAME", self.state, &IgnoreReason::SessionFinished);
            return Ok(());
        }

        let msg = match protocol::decode(text) {
            Ok(msg) => msg,
            Err(e) => {
                self.observer.on_decode_error(&e, text);
                return Err(e.into());
            }
        };

        self.dispatch(msg, text)
    }

    /// Транспорт закрылся
    pub fn on_close(&mut self) {
        if self.state.is_terminal() {
            self.observer
                .on_ignored("CLOSE", self.state, &IgnoreReason::SessionFinished);
            return;
        }
        self.fail(FailureReason::TransportClosed);
    }

    /// Транспорт сообщил об ошибке
    pub fn on_fail(&mut self, reason: impl Into<String>) {
        if self.state.is_terminal() {
            self.observer
                .on_ignored("FAIL", self.state, &IgnoreReason::SessionFinished);
            return;
        }
        self.fail(FailureReason::TransportFailed(reason.into()));
    }

    /// Остановка по запросу вызывающей стороны, из любого состояния
    pub fn cancel(&mut self) {
        if !self.state.is_terminal() {
            self.fail(FailureReason::Cancelled);
        }
    }

    /// Отправить KEEPALIVE, если соединение уже установлено и сессия жива.
    /// Когда и как часто: решает владелец транспорта.
    pub fn send_keepalive(&mut self) -> Result<(), SessionError> {
        if self.state == ProtocolState::Connecting || self.state.is_terminal() {
            return Ok(());
        }
        self.send(&ControlMessage::Keepalive)
    }

    fn dispatch(&mut self, msg: ControlMessage, raw: &str) -> Result<(), SessionError> {
        use ProtocolState as S;

        if let Some(actual) = msg.channel() {
            if actual != self.channel {
                let reason = IgnoreReason::ChannelMismatch {
                    expected: self.channel,
                    actual,
                };
                self.ignore(&msg, reason);
                return Ok(());
            }
        }

        match (self.state, msg) {
            (
                S::AwaitingAuthState,
                ControlMessage::AuthState {
                    state: AuthStatus::Unauthorized,
                },
            ) => {
                let auth = ControlMessage::Auth {
                    token: self.token.clone(),
                };
                self.send(&auth)?;
                self.transition(S::Authenticating);
            }
            (
                S::AwaitingAuthState | S::Authenticating,
                ControlMessage::AuthState {
                    state: AuthStatus::Authorized,
                },
            ) => {
                self.send(&ControlMessage::channel_request(self.channel))?;
                self.transition(S::AwaitingChannel);
            }
            (S::AwaitingChannel, ControlMessage::ChannelOpened { .. }) => {
                self.transition(S::ChannelOpen);
                self.send(&ControlMessage::feed_setup(self.channel))?;
                self.transition(S::AwaitingFeedConfig);
            }
            (S::AwaitingFeedConfig, ControlMessage::FeedConfig { data_format, .. }) => {
                if let Some(fmt) = data_format.as_deref() {
                    if fmt != COMPACT_DATA_FORMAT {
                        self.observer.on_unexpected_format(fmt);
                    }
                }

                let subscription =
                    ControlMessage::feed_subscription(self.channel, self.tracker.symbols());
                self.send(&subscription)?;
                self.transition(S::Subscribed);

                if self.tracker.is_complete() {
                    self.finish(SessionOutcome::Completed);
                }
            }
            (
                S::Subscribed,
                ControlMessage::FeedData {
                    event_type,
                    records,
                    ..
                },
            ) => {
                return self.on_feed_data(&event_type, &records, raw);
            }
            (_, ControlMessage::Error { error, message }) => {
                self.observer.on_server_error(&error, &message);
            }
            (
                _,
                msg @ (ControlMessage::Setup
                | ControlMessage::Keepalive
                | ControlMessage::Unknown { .. }),
            ) => {
                self.ignore(&msg, IgnoreReason::NotActionable);
            }
            (_, msg) => {
                self.ignore(&msg, IgnoreReason::UnexpectedForState);
            }
        }

        Ok(())
    }

    fn on_feed_data(
        &mut self,
        event_type: &str,
        records: &[Value],
        raw: &str,
    ) -> Result<(), SessionError> {
        let quotes = match decode_quotes(event_type, records) {
            Ok(quotes) => quotes,
            Err(e) => {
                self.observer.on_decode_error(&e, raw);
                return Err(e.into());
            }
        };

        // битая запись не мешает остальным записям кадра
        let mut first_error = None;
        for item in quotes {
            match item {
                Ok(quote) => {
                    self.tracker.mark_received(quote.symbol());
                    self.listener.on_quote(quote);
                }
                Err(e) => {
                    self.observer.on_decode_error(&e, raw);
                    first_error.get_or_insert(e);
                }
            }
        }

        if self.tracker.is_complete() {
            self.finish(SessionOutcome::Completed);
        }

        match first_error {
            Some(e) => Err(e.into()),
            None => Ok(()),
        }
    }

    fn send(&mut self, msg: &ControlMessage) -> Result<(), SessionError> {
        let text = protocol::encode(msg);

        if let Err(e) = self.transport.send(&text) {
            let reason = match &e {
                TransportError::Closed => FailureReason::TransportClosed,
                TransportError::Send(reason) => FailureReason::SendFailed(reason.clone()),
            };
            self.fail(reason);
            return Err(e.into());
        }

        self.observer.on_sent(msg.kind());
        Ok(())
    }

    fn ignore(&mut self, msg: &ControlMessage, reason: IgnoreReason) {
        self.observer.on_ignored(msg.kind(), self.state, &reason);
    }

    fn transition(&mut self, to: ProtocolState) {
        let from = self.state;
        self.state = to;
        self.observer.on_transition(from, to);
    }

    fn fail(&mut self, reason: FailureReason) {
        let last_state = self.state;
        self.finish(SessionOutcome::Failed { reason, last_state });
    }

    fn finish(&mut self, outcome: SessionOutcome) {
        if self.state.is_terminal() {
            return;
        }

        let to = match outcome {
            SessionOutcome::Completed => ProtocolState::Complete,
            SessionOutcome::Failed { .. } => ProtocolState::Failed,
        };
        self.transition(to);
        self.listener.on_finished(outcome);
        self.request_close();
    }

    fn request_close(&mut self) {
        if !self.close_requested {
            self.close_requested = true;
            self.transport.close();
        }
    }
}
