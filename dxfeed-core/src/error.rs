use thiserror::Error;

/// Ошибка разбора одного входящего сообщения.
/// Не фатальна: сессия остаётся в текущем состоянии.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DecodeError {
    /// Сообщение не является корректным JSON-объектом ожидаемой формы
    #[error("malformed message: {0}")]
    Malformed(String),

    /// Нет обязательного поля
    #[error("missing field: {0}")]
    MissingField(&'static str),

    /// Длина компактного массива не кратна ширине записи
    #[error("truncated record: {len} values is not a multiple of {width}")]
    TruncatedRecord {
        /// сколько значений пришло
        len: usize,
        /// ширина записи
        width: usize,
    },

    /// Числовое поле не парсится как f64
    #[error("invalid numeric value for {field}: {value}")]
    InvalidNumeric {
        /// имя поля из acceptEventFields
        field: &'static str,
        /// сырое значение
        value: String,
    },

    /// Пришёл тип события, для которого нет декодера
    #[error("unsupported event type: {0}")]
    UnsupportedEventType(String),
}

/// Ошибки транспорта. Всегда фатальны для сессии.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// Соединение уже закрыто
    #[error("transport closed")]
    Closed,

    /// Не удалось отправить кадр
    #[error("send failed: {0}")]
    Send(String),
}

/// Ошибки, которые возвращают обработчики событий сессии
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SessionError {
    /// Битое сообщение: сообщили наблюдателю, сессия продолжает работу
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// Транспорт отказал: сессия переведена в Failed
    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl SessionError {
    /// Завершила ли ошибка сессию
    pub fn is_fatal(&self) -> bool {
        matches!(self, SessionError::Transport(_))
    }
}
