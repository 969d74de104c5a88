use log::{debug, trace, warn};

use dxfeed_core::constants::COMPACT_DATA_FORMAT;
use dxfeed_core::{DecodeError, IgnoreReason, ProtocolState, SessionObserver};

const RAW_PREVIEW_CHARS: usize = 200;

/// Пишет события сессии в `log`. Содержимое исходящих сообщений не логируется:
/// в AUTH лежит токен.
#[derive(Debug, Default)]
pub(crate) struct LogObserver;

impl SessionObserver for LogObserver {
    fn on_transition(&mut self, from: ProtocolState, to: ProtocolState) {
        debug!("state {from} -> {to}");
    }

    fn on_sent(&mut self, kind: &'static str) {
        trace!("-> {kind}");
    }

    fn on_ignored(&mut self, kind: &str, state: ProtocolState, reason: &IgnoreReason) {
        match reason {
            IgnoreReason::ChannelMismatch { expected, actual } => {
                debug!("ignored {kind} for channel {actual}, ours is {expected}");
            }
            IgnoreReason::UnexpectedForState => debug!("ignored {kind} in state {state}"),
            IgnoreReason::NotActionable | IgnoreReason::SessionFinished => {
                trace!("ignored {kind} in state {state}")
            }
        }
    }

    fn on_decode_error(&mut self, error: &DecodeError, raw: &str) {
        warn!("bad frame: {error}; raw: {}", preview(raw));
    }

    fn on_server_error(&mut self, error: &str, message: &str) {
        warn!("server error {error}: {message}");
    }

    fn on_unexpected_format(&mut self, format: &str) {
        warn!("server confirmed data format {format}, expected {COMPACT_DATA_FORMAT}");
    }
}

fn preview(raw: &str) -> String {
    let mut chars = raw.chars();
    let head: String = chars.by_ref().take(RAW_PREVIEW_CHARS).collect();
    if chars.next().is_some() {
        format!("{head}...")
    } else {
        head
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preview_keeps_short_frames() {
        assert_eq!(preview(r#"{"type":"X"}"#), r#"{"type":"X"}"#);
    }

    #[test]
    fn preview_cuts_long_frames_on_char_boundary() {
        let raw = "ж".repeat(RAW_PREVIEW_CHARS + 10);
        let p = preview(&raw);
        assert!(p.ends_with("..."));
        assert_eq!(p.chars().count(), RAW_PREVIEW_CHARS + 3);
    }
}
