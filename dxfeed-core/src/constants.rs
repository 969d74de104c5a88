use std::time::Duration;

/// Служебный канал соединения (SETUP, AUTH, KEEPALIVE)
pub const CONNECTION_CHANNEL: u32 = 0;

/// Версия клиента, которую сообщаем серверу в SETUP
pub const CLIENT_VERSION: &str = "0.1-DXF-JS/0.3.0";

/// Через сколько секунд тишины сервер считает клиента "мёртвым"
pub const KEEPALIVE_TIMEOUT_S: u32 = 15;

/// Какой таймаут тишины со стороны сервера принимает клиент
pub const ACCEPT_KEEPALIVE_TIMEOUT_S: u32 = 20;

/// Интервал KEEPALIVE, если клиент решил его слать (меньше KEEPALIVE_TIMEOUT_S)
pub const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(10);

/// Сервис, который запрашиваем в CHANNEL_REQUEST
pub const FEED_SERVICE: &str = "FEED";

/// Тип контракта канала
pub const FEED_CONTRACT: &str = "AUTO";

/// acceptAggregationPeriod в FEED_SETUP, секунды
pub const AGGREGATION_PERIOD_S: f64 = 0.1;

/// Компактный (позиционный) формат данных
pub const COMPACT_DATA_FORMAT: &str = "COMPACT";

/// Тип события котировки
pub const QUOTE_EVENT_TYPE: &str = "Quote";

/// Поля Quote, объявляемые в FEED_SETUP.
/// Порядок задаёт раскладку компактной записи в FEED_DATA.
pub const QUOTE_FIELDS: [&str; 6] = [
    "eventType",
    "eventSymbol",
    "bidPrice",
    "askPrice",
    "bidSize",
    "askSize",
];

/// Ширина одной компактной записи Quote
pub const QUOTE_RECORD_WIDTH: usize = QUOTE_FIELDS.len();
