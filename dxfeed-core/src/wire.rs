use std::iter::FusedIterator;
use std::slice::ChunksExact;

use serde_json::Value;

use crate::constants::{QUOTE_EVENT_TYPE, QUOTE_RECORD_WIDTH};
use crate::error::DecodeError;
use crate::types::QuoteRecord;

/// Декодирует компактный массив FEED_DATA в котировки.
///
/// Массив режется на непересекающиеся окна по [`QUOTE_RECORD_WIDTH`] значений,
/// порядок полей совпадает с `QUOTE_FIELDS`. Если длина не кратна ширине записи,
/// не декодируется ни одна запись.
///
/// Итератор ленивый и одноразовый: каждая запись разбирается при `next()`.
pub fn decode_quotes<'a>(
    event_type: &str,
    records: &'a [Value],
) -> Result<QuoteIter<'a>, DecodeError> {
    if event_type != QUOTE_EVENT_TYPE {
        return Err(DecodeError::UnsupportedEventType(event_type.to_string()));
    }

    if records.len() % QUOTE_RECORD_WIDTH != 0 {
        return Err(DecodeError::TruncatedRecord {
            len: records.len(),
            width: QUOTE_RECORD_WIDTH,
        });
    }

    Ok(QuoteIter {
        windows: records.chunks_exact(QUOTE_RECORD_WIDTH),
    })
}

/// Ленивая последовательность котировок одного FEED_DATA
#[derive(Debug)]
pub struct QuoteIter<'a> {
    windows: ChunksExact<'a, Value>,
}

impl Iterator for QuoteIter<'_> {
    type Item = Result<QuoteRecord, DecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.windows.next().map(decode_record)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.windows.size_hint()
    }
}

impl ExactSizeIterator for QuoteIter<'_> {}

impl FusedIterator for QuoteIter<'_> {}

fn decode_record(window: &[Value]) -> Result<QuoteRecord, DecodeError> {
    let [event_type, symbol, bid_price, ask_price, bid_size, ask_size]: &[Value;
         QUOTE_RECORD_WIDTH] = window.try_into().map_err(|_| DecodeError::TruncatedRecord {
        len: window.len(),
        width: QUOTE_RECORD_WIDTH,
    })?;

    // тип события повторяется в каждой записи и должен совпадать с заявленным
    if event_type.as_str() != Some(QUOTE_EVENT_TYPE) {
        return Err(DecodeError::Malformed(format!(
            "eventType must be {QUOTE_EVENT_TYPE}: {event_type}"
        )));
    }

    let symbol = symbol
        .as_str()
        .ok_or_else(|| DecodeError::Malformed(format!("eventSymbol must be a string: {symbol}")))?;

    Ok(QuoteRecord::new(
        symbol,
        numeric(bid_price, "bidPrice")?,
        numeric(ask_price, "askPrice")?,
        numeric(bid_size, "bidSize")?,
        numeric(ask_size, "askSize")?,
    ))
}

/// Число может прийти как JSON number или строкой ("NaN", "Infinity", "1.5")
fn numeric(value: &Value, field: &'static str) -> Result<f64, DecodeError> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };

    parsed.ok_or_else(|| DecodeError::InvalidNumeric {
        field,
        value: value.to_string(),
    })
}
