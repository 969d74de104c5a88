use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::constants::{
    ACCEPT_KEEPALIVE_TIMEOUT_S, AGGREGATION_PERIOD_S, CLIENT_VERSION, COMPACT_DATA_FORMAT,
    CONNECTION_CHANNEL, FEED_CONTRACT, FEED_SERVICE, KEEPALIVE_TIMEOUT_S, QUOTE_EVENT_TYPE,
    QUOTE_FIELDS,
};
use crate::error::DecodeError;

/// Состояние авторизации из AUTH_STATE
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthStatus {
    /// нужно прислать AUTH
    Unauthorized,
    /// токен принят
    Authorized,
}

impl AuthStatus {
    fn as_wire(self) -> &'static str {
        match self {
            AuthStatus::Unauthorized => "UNAUTHORIZED",
            AuthStatus::Authorized => "AUTHORIZED",
        }
    }
}

/// Параметры CHANNEL_REQUEST
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelParams {
    /// тип контракта (AUTO, TICKER, HISTORY, STREAM)
    pub contract: String,
}

impl Default for ChannelParams {
    fn default() -> Self {
        Self {
            contract: FEED_CONTRACT.to_string(),
        }
    }
}

/// Управляющее сообщение протокола (в обе стороны)
#[derive(Debug, Clone, PartialEq)]
pub enum ControlMessage {
    /// SETUP: параметры протокола фиксированы, см. `constants`
    Setup,
    /// AUTH_STATE от сервера
    AuthState {
        /// текущее состояние
        state: AuthStatus,
    },
    /// AUTH с quote token
    Auth {
        /// bearer token
        token: String,
    },
    /// CHANNEL_REQUEST
    ChannelRequest {
        /// номер канала, выбранный клиентом
        channel: u32,
        /// сервис (FEED)
        service: String,
        /// параметры канала
        params: ChannelParams,
    },
    /// CHANNEL_OPENED
    ChannelOpened {
        /// номер канала
        channel: u32,
    },
    /// FEED_SETUP: какие поля Quote мы принимаем
    FeedSetup {
        /// номер канала
        channel: u32,
        /// поля Quote в порядке компактной записи
        accepted_fields: Vec<String>,
    },
    /// FEED_CONFIG: сервер подтвердил настройку канала
    FeedConfig {
        /// номер канала
        channel: u32,
        /// подтверждённый формат данных, если сервер его прислал
        data_format: Option<String>,
    },
    /// FEED_SUBSCRIPTION
    FeedSubscription {
        /// номер канала
        channel: u32,
        /// заменить ли предыдущую подписку
        reset: bool,
        /// символы (каждый как {type: "Quote", symbol})
        symbols: Vec<String>,
    },
    /// FEED_DATA в компактном формате: ["Quote", [...плоский массив...]]
    FeedData {
        /// номер канала
        channel: u32,
        /// тип события
        event_type: String,
        /// плоский массив значений
        records: Vec<Value>,
    },
    /// KEEPALIVE
    Keepalive,
    /// ERROR от сервера
    Error {
        /// код ошибки
        error: String,
        /// описание
        message: String,
    },
    /// Неизвестный тип: не ошибка, просто не обрабатываем
    Unknown {
        /// сырой текст сообщения
        raw: String,
    },
}

impl ControlMessage {
    /// CHANNEL_REQUEST на сервис FEED с контрактом AUTO
    pub fn channel_request(channel: u32) -> Self {
        ControlMessage::ChannelRequest {
            channel,
            service: FEED_SERVICE.to_string(),
            params: ChannelParams::default(),
        }
    }

    /// FEED_SETUP с фиксированным набором полей Quote
    pub fn feed_setup(channel: u32) -> Self {
        ControlMessage::FeedSetup {
            channel,
            accepted_fields: QUOTE_FIELDS.iter().map(|f| f.to_string()).collect(),
        }
    }

    /// FEED_SUBSCRIPTION с reset=true на весь набор символов
    pub fn feed_subscription<I, S>(channel: u32, symbols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ControlMessage::FeedSubscription {
            channel,
            reset: true,
            symbols: symbols.into_iter().map(Into::into).collect(),
        }
    }

    /// Значение поля `type` на проводе
    pub fn kind(&self) -> &'static str {
        match self {
            ControlMessage::Setup => "SETUP",
            ControlMessage::AuthState { .. } => "AUTH_STATE",
            ControlMessage::Auth { .. } => "AUTH",
            ControlMessage::ChannelRequest { .. } => "CHANNEL_REQUEST",
            ControlMessage::ChannelOpened { .. } => "CHANNEL_OPENED",
            ControlMessage::FeedSetup { .. } => "FEED_SETUP",
            ControlMessage::FeedConfig { .. } => "FEED_CONFIG",
            ControlMessage::FeedSubscription { .. } => "FEED_SUBSCRIPTION",
            ControlMessage::FeedData { .. } => "FEED_DATA",
            ControlMessage::Keepalive => "KEEPALIVE",
            ControlMessage::Error { .. } => "ERROR",
            ControlMessage::Unknown { .. } => "UNKNOWN",
        }
    }

    /// Номер канала для сообщений, привязанных к каналу.
    /// Для сообщений уровня соединения: `None`.
    pub fn channel(&self) -> Option<u32> {
        match self {
            ControlMessage::ChannelRequest { channel, .. }
            | ControlMessage::ChannelOpened { channel }
            | ControlMessage::FeedSetup { channel, .. }
            | ControlMessage::FeedConfig { channel, .. }
            | ControlMessage::FeedSubscription { channel, .. }
            | ControlMessage::FeedData { channel, .. } => Some(*channel),
            _ => None,
        }
    }
}

/// Кодирует сообщение в JSON-текст кадра
pub fn encode(msg: &ControlMessage) -> String {
    let value = match msg {
        ControlMessage::Setup => json!({
            "type": "SETUP",
            "channel": CONNECTION_CHANNEL,
            "version": CLIENT_VERSION,
            "keepaliveTimeout": KEEPALIVE_TIMEOUT_S,
            "acceptKeepaliveTimeout": ACCEPT_KEEPALIVE_TIMEOUT_S,
        }),
        ControlMessage::AuthState { state } => json!({
            "type": "AUTH_STATE",
            "channel": CONNECTION_CHANNEL,
            "state": state.as_wire(),
        }),
        ControlMessage::Auth { token } => json!({
            "type": "AUTH",
            "channel": CONNECTION_CHANNEL,
            "token": token,
        }),
        ControlMessage::ChannelRequest {
            channel,
            service,
            params,
        } => json!({
            "type": "CHANNEL_REQUEST",
            "channel": channel,
            "service": service,
            "parameters": params,
        }),
        ControlMessage::ChannelOpened { channel } => json!({
            "type": "CHANNEL_OPENED",
            "channel": channel,
        }),
        ControlMessage::FeedSetup {
            channel,
            accepted_fields,
        } => json!({
            "type": "FEED_SETUP",
            "channel": channel,
            "acceptAggregationPeriod": AGGREGATION_PERIOD_S,
            "acceptDataFormat": COMPACT_DATA_FORMAT,
            "acceptEventFields": { QUOTE_EVENT_TYPE: accepted_fields },
        }),
        ControlMessage::FeedConfig {
            channel,
            data_format,
        } => {
            let mut v = json!({ "type": "FEED_CONFIG", "channel": channel });
            if let Some(fmt) = data_format {
                v["dataFormat"] = json!(fmt);
            }
            v
        }
        ControlMessage::FeedSubscription {
            channel,
            reset,
            symbols,
        } => {
            let add: Vec<Value> = symbols
                .iter()
                .map(|s| json!({ "type": QUOTE_EVENT_TYPE, "symbol": s }))
                .collect();
            json!({
                "type": "FEED_SUBSCRIPTION",
                "channel": channel,
                "reset": reset,
                "add": add,
            })
        }
        ControlMessage::FeedData {
            channel,
            event_type,
            records,
        } => json!({
            "type": "FEED_DATA",
            "channel": channel,
            "data": [event_type, records],
        }),
        ControlMessage::Keepalive => json!({
            "type": "KEEPALIVE",
            "channel": CONNECTION_CHANNEL,
        }),
        ControlMessage::Error { error, message } => json!({
            "type": "ERROR",
            "channel": CONNECTION_CHANNEL,
            "error": error,
            "message": message,
        }),
        // неизвестное сообщение отдаём как было
        ControlMessage::Unknown { raw } => return raw.clone(),
    };

    value.to_string()
}

/// Разбирает текст кадра в управляющее сообщение
pub fn decode(text: &str) -> Result<ControlMessage, DecodeError> {
    let value: Value =
        serde_json::from_str(text).map_err(|e| DecodeError::Malformed(e.to_string()))?;

    let Value::Object(mut obj) = value else {
        return Err(DecodeError::Malformed("expected a JSON object".into()));
    };

    let kind = str_field(&obj, "type")?.to_string();

    let msg = match kind.as_str() {
        "SETUP" => ControlMessage::Setup,
        "AUTH_STATE" => {
            let state = match str_field(&obj, "state")? {
                "UNAUTHORIZED" => AuthStatus::Unauthorized,
                "AUTHORIZED" => AuthStatus::Authorized,
                other => {
                    return Err(DecodeError::Malformed(format!("unknown auth state: {other}")));
                }
            };
            ControlMessage::AuthState { state }
        }
        "AUTH" => ControlMessage::Auth {
            token: str_field(&obj, "token")?.to_string(),
        },
        "CHANNEL_REQUEST" => {
            let channel = channel_field(&obj)?;
            let service = str_field(&obj, "service")?.to_string();
            let params = match obj.remove("parameters") {
                Some(v) => serde_json::from_value(v)
                    .map_err(|e| DecodeError::Malformed(format!("parameters: {e}")))?,
                None => ChannelParams::default(),
            };
            ControlMessage::ChannelRequest {
                channel,
                service,
                params,
            }
        }
        "CHANNEL_OPENED" => ControlMessage::ChannelOpened {
            channel: channel_field(&obj)?,
        },
        "FEED_SETUP" => {
            let channel = channel_field(&obj)?;
            let accepted_fields = obj
                .get("acceptEventFields")
                .and_then(|f| f.get(QUOTE_EVENT_TYPE))
                .map(string_list)
                .transpose()?
                .unwrap_or_default();
            ControlMessage::FeedSetup {
                channel,
                accepted_fields,
            }
        }
        "FEED_CONFIG" => ControlMessage::FeedConfig {
            channel: channel_field(&obj)?,
            data_format: obj
                .get("dataFormat")
                .and_then(Value::as_str)
                .map(str::to_string),
        },
        "FEED_SUBSCRIPTION" => {
            let channel = channel_field(&obj)?;
            let reset = obj.get("reset").and_then(Value::as_bool).unwrap_or(false);
            let symbols = match obj.get("add") {
                Some(Value::Array(items)) => items
                    .iter()
                    .map(|it| {
                        it.get("symbol")
                            .and_then(Value::as_str)
                            .map(str::to_string)
                            .ok_or(DecodeError::MissingField("symbol"))
                    })
                    .collect::<Result<Vec<_>, _>>()?,
                Some(_) => return Err(DecodeError::Malformed("add must be an array".into())),
                None => Vec::new(),
            };
            ControlMessage::FeedSubscription {
                channel,
                reset,
                symbols,
            }
        }
        "FEED_DATA" => {
            let channel = channel_field(&obj)?;
            let data = obj.remove("data").ok_or(DecodeError::MissingField("data"))?;
            let (event_type, records) = split_compact_data(data)?;
            ControlMessage::FeedData {
                channel,
                event_type,
                records,
            }
        }
        "KEEPALIVE" => ControlMessage::Keepalive,
        "ERROR" => ControlMessage::Error {
            error: opt_str(&obj, "error"),
            message: opt_str(&obj, "message"),
        },
        _ => ControlMessage::Unknown {
            raw: text.to_string(),
        },
    };

    Ok(msg)
}

fn str_field<'a>(obj: &'a Map<String, Value>, name: &'static str) -> Result<&'a str, DecodeError> {
    obj.get(name)
        .ok_or(DecodeError::MissingField(name))?
        .as_str()
        .ok_or_else(|| DecodeError::Malformed(format!("{name} must be a string")))
}

fn opt_str(obj: &Map<String, Value>, name: &str) -> String {
    obj.get(name)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn channel_field(obj: &Map<String, Value>) -> Result<u32, DecodeError> {
    let raw = obj.get("channel").ok_or(DecodeError::MissingField("channel"))?;
    raw.as_u64()
        .and_then(|n| u32::try_from(n).ok())
        .ok_or_else(|| DecodeError::Malformed(format!("invalid channel: {raw}")))
}

fn string_list(value: &Value) -> Result<Vec<String>, DecodeError> {
    let Value::Array(items) = value else {
        return Err(DecodeError::Malformed("expected an array of strings".into()));
    };
    items
        .iter()
        .map(|v| {
            v.as_str()
                .map(str::to_string)
                .ok_or_else(|| DecodeError::Malformed("expected an array of strings".into()))
        })
        .collect()
}

/// `data` в компактном формате: [eventType, [v0, v1, ...]]
fn split_compact_data(data: Value) -> Result<(String, Vec<Value>), DecodeError> {
    let Value::Array(parts) = data else {
        return Err(DecodeError::Malformed("data must be an array".into()));
    };

    let mut it = parts.into_iter();
    match (it.next(), it.next(), it.next()) {
        (Some(Value::String(event_type)), Some(Value::Array(records)), None) => {
            Ok((event_type, records))
        }
        _ => Err(DecodeError::Malformed(
            "data must be [eventType, [values...]]".into(),
        )),
    }
}
