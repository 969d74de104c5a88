use crate::error::{DecodeError, TransportError};
use crate::session::{ProtocolState, SessionOutcome};
use crate::types::QuoteRecord;

/// Исходящая сторона соединения.
///
/// Сессия: единственный источник исходящего текста на этом соединении.
pub trait Transport {
    /// Отправить текстовый кадр
    fn send(&mut self, text: &str) -> Result<(), TransportError>;

    /// Попросить транспорт закрыться. Сессия вызывает это не более одного раза.
    fn close(&mut self);
}

/// Получатель результатов сессии
pub trait FeedListener {
    /// Очередная декодированная котировка
    fn on_quote(&mut self, quote: QuoteRecord);

    /// Итог сессии, приходит ровно один раз
    fn on_finished(&mut self, outcome: SessionOutcome);
}

/// Почему входящее сообщение было проигнорировано
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IgnoreReason {
    /// Сообщение для чужого канала
    ChannelMismatch {
        /// наш канал
        expected: u32,
        /// канал из сообщения
        actual: u32,
    },
    /// Сообщение валидно, но не ожидается в текущем состоянии
    UnexpectedForState,
    /// Сообщение, на которое сессия не реагирует (SETUP, KEEPALIVE, неизвестный тип)
    NotActionable,
    /// Сессия уже завершена
    SessionFinished,
}

/// Наблюдатель за внутренними событиями сессии (логирование, метрики).
///
/// Все методы по умолчанию ничего не делают.
pub trait SessionObserver {
    /// Смена состояния
    fn on_transition(&mut self, _from: ProtocolState, _to: ProtocolState) {}

    /// Отправлено управляющее сообщение (только тип, без содержимого)
    fn on_sent(&mut self, _kind: &'static str) {}

    /// Сообщение проигнорировано
    fn on_ignored(&mut self, _kind: &str, _state: ProtocolState, _reason: &IgnoreReason) {}

    /// Не удалось разобрать кадр или запись
    fn on_decode_error(&mut self, _error: &DecodeError, _raw: &str) {}

    /// Сервер прислал ERROR
    fn on_server_error(&mut self, _error: &str, _message: &str) {}

    /// Сервер подтвердил не тот формат данных, который мы просили
    fn on_unexpected_format(&mut self, _format: &str) {}
}

/// Наблюдатель, который ничего не делает
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl SessionObserver for NoopObserver {}
