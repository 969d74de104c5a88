//! # dxfeed-core
//!
//! Протокол DXLink (dxFeed поверх WebSocket) для потока котировок Quote.
//!
//! Этот крейт содержит:
//!
//! - [`protocol`]: управляющие сообщения и их JSON-кодек
//! - [`wire`]: декодирование компактного (позиционного) массива FEED_DATA
//! - [`session`]: машина состояний протокола на одном соединении
//! - [`subscription`]: учёт символов, по которым уже пришли данные
//! - [`symbols`]: синтаксис символов dxFeed, чтение списка из текста/файла
//! - [`traits`]: швы между сессией и внешним миром (транспорт, получатель, наблюдатель)
//! - [`types`]: доменные типы
//! - [`error`]: типы ошибок
//!
//! ## Пример: кодек управляющих сообщений
//!
//! ```rust
//! use dxfeed_core::protocol::{decode, encode, AuthStatus, ControlMessage};
//!
//! let msg = decode(r#"{"type":"AUTH_STATE","channel":0,"state":"UNAUTHORIZED"}"#).unwrap();
//! assert_eq!(msg, ControlMessage::AuthState { state: AuthStatus::Unauthorized });
//!
//! let text = encode(&ControlMessage::channel_request(3));
//! assert!(text.contains(r#""service":"FEED""#));
//! ```
//!
//! ## Пример: компактные записи Quote
//!
//! ```rust
//! use dxfeed_core::wire::decode_quotes;
//! use serde_json::json;
//!
//! let data = json!(["Quote", "/6EZ24:XCME", 1.2345, 1.2350, 5.0, 7.0]);
//! let records = data.as_array().unwrap();
//!
//! let quotes: Vec<_> = decode_quotes("Quote", records)
//!     .unwrap()
//!     .collect::<Result<_, _>>()
//!     .unwrap();
//! assert_eq!(quotes[0].symbol(), "/6EZ24:XCME");
//! assert!((quotes[0].mid_price() - 1.23475).abs() < 1e-12);
//! ```
//!
//! ## Пример: сессия без сети
//!
//! ```rust
//! use dxfeed_core::{
//!     FeedListener, FeedSession, ProtocolState, QuoteRecord, SessionConfig, SessionOutcome,
//!     Transport, TransportError,
//! };
//!
//! #[derive(Default)]
//! struct Outbox(Vec<String>);
//!
//! impl Transport for Outbox {
//!     fn send(&mut self, text: &str) -> Result<(), TransportError> {
//!         self.0.push(text.to_string());
//!         Ok(())
//!     }
//!     fn close(&mut self) {}
//! }
//!
//! #[derive(Default)]
//! struct Collect(Vec<QuoteRecord>, Option<SessionOutcome>);
//!
//! impl FeedListener for Collect {
//!     fn on_quote(&mut self, q: QuoteRecord) { self.0.push(q); }
//!     fn on_finished(&mut self, o: SessionOutcome) { self.1 = Some(o); }
//! }
//!
//! let config = SessionConfig { channel: 3, token: "t".into(), symbols: vec!["SPY".into()] };
//! let mut s = FeedSession::new(config, Outbox::default(), Collect::default());
//!
//! s.on_open().unwrap();
//! s.on_message(r#"{"type":"AUTH_STATE","channel":0,"state":"AUTHORIZED"}"#).unwrap();
//! s.on_message(r#"{"type":"CHANNEL_OPENED","channel":3}"#).unwrap();
//! s.on_message(r#"{"type":"FEED_CONFIG","channel":3,"dataFormat":"COMPACT"}"#).unwrap();
//! s.on_message(r#"{"type":"FEED_DATA","channel":3,"data":["Quote",["Quote","SPY",1,2,3,4]]}"#).unwrap();
//!
//! assert_eq!(s.state(), ProtocolState::Complete);
//! assert_eq!(s.listener().1, Some(SessionOutcome::Completed));
//! ```
//!
//! ## Дизайн
//!
//! Сессия не знает ни про сокеты, ни про потоки: её дёргают событиями
//! (`on_open`, `on_message`, `on_close`), а отправляет она через [`Transport`].
//! Поэтому весь протокол тестируется без сети, а I/O-цикл живёт в клиенте.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

/// Управляющие сообщения DXLink и JSON-кодек.
pub mod protocol;

/// Машина состояний протокола.
pub mod session;

/// Учёт подписанных символов.
pub mod subscription;

/// Чтение/нормализация списка символов из текста и файлов.
pub mod symbols;

/// Трейты-швы: транспорт, получатель котировок, наблюдатель.
pub mod traits;

/// Доменные типы (котировка).
pub mod types;

/// Декодирование компактного формата FEED_DATA.
pub mod wire;

/// Ошибки `dxfeed-core`.
pub mod error;

/// Константы протокола
pub mod constants;
pub use constants::KEEPALIVE_INTERVAL;

// --- Re-exports (публичный фасад API) ---

pub use crate::error::{DecodeError, SessionError, TransportError};
pub use crate::protocol::ControlMessage;
pub use crate::session::{FailureReason, FeedSession, ProtocolState, SessionConfig, SessionOutcome};
pub use crate::subscription::SubscriptionTracker;
pub use crate::traits::{FeedListener, IgnoreReason, NoopObserver, SessionObserver, Transport};
pub use crate::types::QuoteRecord;
