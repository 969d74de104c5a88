use std::io::{self, Write};

use crossbeam_channel::Receiver;

use dxfeed_core::SessionOutcome;

use crate::feed::FeedEvent;

/// Печатает котировки в stdout, пока не придёт итог сессии
pub(crate) fn print_events(rx: Receiver<FeedEvent>, json: bool) -> anyhow::Result<Option<SessionOutcome>> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    write_events(rx, &mut out, json)
}

/// `None`: поток событий оборвался без итога (поток сессии упал)
pub(crate) fn write_events<W: Write>(
    events: impl IntoIterator<Item = FeedEvent>,
    out: &mut W,
    json: bool,
) -> anyhow::Result<Option<SessionOutcome>> {
    for event in events {
        match event {
            FeedEvent::Quote(quote) => {
                if json {
                    serde_json::to_writer(&mut *out, &quote)?;
                    writeln!(out)?;
                } else {
                    writeln!(out, "{quote}")?;
                }
                out.flush()?;
            }
            FeedEvent::Finished(outcome) => return Ok(Some(outcome)),
        }
    }

    Ok(None)
}
