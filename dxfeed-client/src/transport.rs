use std::io;
use std::net::{TcpStream, ToSocketAddrs};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use anyhow::{Context, anyhow};
use log::{debug, trace};
use thiserror::Error;
use tungstenite::client::IntoClientRequest;
use tungstenite::handshake::HandshakeError;
use tungstenite::handshake::client::{Request, Response};
use tungstenite::http::HeaderValue;
use tungstenite::http::header::AUTHORIZATION;
use tungstenite::stream::MaybeTlsStream;
use tungstenite::{Message, WebSocket};

use dxfeed_core::{Transport, TransportError};

use crate::config::{CONNECT_TIMEOUT, HANDSHAKE_TIMEOUT};

type Stream = MaybeTlsStream<TcpStream>;

#[derive(Debug, Error)]
pub(crate) enum ConnectError {
    /// shutdown пришёл раньше, чем закончилось рукопожатие
    #[error("connect cancelled")]
    Cancelled,

    #[error(transparent)]
    Failed(#[from] anyhow::Error),
}

/// Блокирующий WebSocket (ws:// или wss:// через native-tls).
///
/// Чтение с таймаутом `tick`: `read()` регулярно возвращает WouldBlock/TimedOut,
/// чтобы цикл мог проверить shutdown и keepalive.
pub(crate) struct WsTransport {
    ws: WebSocket<Stream>,
}

impl WsTransport {
    /// TCP, TLS и upgrade с заголовком Authorization: <token>.
    ///
    /// Таймаут чтения `tick` ставится до рукопожатия: каждый тик проверяем
    /// `shutdown` и общий дедлайн [`HANDSHAKE_TIMEOUT`].
    pub(crate) fn connect(
        url: &str,
        token: &str,
        tick: Duration,
        shutdown: &AtomicBool,
    ) -> Result<Self, ConnectError> {
        let mut request = url
            .into_client_request()
            .with_context(|| format!("invalid websocket url: {url}"))?;

        let auth = HeaderValue::from_str(token).context("token is not a valid header value")?;
        request.headers_mut().insert(AUTHORIZATION, auth);

        let uri = request.uri();
        let secure = match uri.scheme_str() {
            Some("wss") => true,
            Some("ws") => false,
            other => return Err(anyhow!("unsupported url scheme {other:?}: {url}").into()),
        };
        let host = uri
            .host()
            .map(|h| h.trim_start_matches('[').trim_end_matches(']').to_string())
            .ok_or_else(|| anyhow!("url has no host: {url}"))?;
        let port = uri.port_u16().unwrap_or(if secure { 443 } else { 80 });

        let tcp = open_tcp(&host, port, shutdown)?;
        tcp.set_read_timeout(Some(tick))
            .context("failed to set socket read timeout")?;
        tcp.set_write_timeout(Some(HANDSHAKE_TIMEOUT))
            .context("failed to set socket write timeout")?;
        tcp.set_nodelay(true).context("failed to set TCP_NODELAY")?;

        let deadline = Instant::now() + HANDSHAKE_TIMEOUT;
        let stream = if secure {
            MaybeTlsStream::NativeTls(tls_handshake(&host, tcp, deadline, shutdown)?)
        } else {
            MaybeTlsStream::Plain(tcp)
        };

        let (ws, response) = ws_handshake(request, stream, deadline, shutdown)?;
        debug!("websocket handshake done: status={}", response.status());

        Ok(Self { ws })
    }

    /// Следующий кадр. Io(WouldBlock|TimedOut) означает "тик", не ошибку.
    pub(crate) fn read(&mut self) -> tungstenite::Result<Message> {
        self.ws.read()
    }

    /// Дочитываем до ответного Close (или до таймаута), чтобы закрытие было чистым
    pub(crate) fn drain_close(&mut self, timeout: Duration) {
        let deadline = Instant::now() + timeout;

        while Instant::now() < deadline {
            match self.ws.read() {
                Ok(msg) => trace!("frame after close: {msg:?}"),
                Err(tungstenite::Error::Io(e)) if is_tick(&e) => continue,
                Err(_) => return,
            }
        }

        debug!("close handshake not finished in {timeout:?}");
    }
}

impl Transport for WsTransport {
    fn send(&mut self, text: &str) -> Result<(), TransportError> {
        match self.ws.send(Message::Text(text.to_string())) {
            Ok(()) => Ok(()),
            Err(tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed) => {
                Err(TransportError::Closed)
            }
            Err(e) => Err(TransportError::Send(e.to_string())),
        }
    }

    fn close(&mut self) {
        if let Err(e) = self.ws.close(None) {
            debug!("websocket close: {e}");
        }
        // ошибки flush после close неинтересны: соединение всё равно уходит
        let _ = self.ws.flush();
    }
}

/// Таймаут чтения: просто "тик" цикла
pub(crate) fn is_tick(e: &io::Error) -> bool {
    matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut)
}

/// Перебираем адреса хоста, каждый с [`CONNECT_TIMEOUT`]
fn open_tcp(host: &str, port: u16, shutdown: &AtomicBool) -> Result<TcpStream, ConnectError> {
    ensure_running(shutdown)?;

    let addrs = (host, port)
        .to_socket_addrs()
        .with_context(|| format!("failed to resolve {host}:{port}"))?;

    let mut last_err = None;
    for addr in addrs {
        ensure_running(shutdown)?;
        match TcpStream::connect_timeout(&addr, CONNECT_TIMEOUT) {
            Ok(stream) => return Ok(stream),
            Err(e) => {
                debug!("tcp connect to {addr} failed: {e}");
                last_err = Some(e);
            }
        }
    }

    let err = match last_err {
        Some(e) => anyhow::Error::new(e).context(format!("failed to connect to {host}:{port}")),
        None => anyhow!("{host}:{port} resolved to no addresses"),
    };
    Err(err.into())
}

fn tls_handshake(
    domain: &str,
    tcp: TcpStream,
    deadline: Instant,
    shutdown: &AtomicBool,
) -> Result<native_tls::TlsStream<TcpStream>, ConnectError> {
    let connector = native_tls::TlsConnector::new().context("failed to init TLS connector")?;

    let mut attempt = connector.connect(domain, tcp);
    loop {
        match attempt {
            Ok(stream) => return Ok(stream),
            Err(native_tls::HandshakeError::Failure(e)) => {
                return Err(anyhow::Error::new(e)
                    .context(format!("TLS handshake with {domain} failed"))
                    .into());
            }
            Err(native_tls::HandshakeError::WouldBlock(mid)) => {
                ensure_in_time(deadline, shutdown)?;
                attempt = mid.handshake();
            }
        }
    }
}

fn ws_handshake(
    request: Request,
    stream: Stream,
    deadline: Instant,
    shutdown: &AtomicBool,
) -> Result<(WebSocket<Stream>, Response), ConnectError> {
    let mut attempt = tungstenite::client(request, stream);
    loop {
        match attempt {
            Ok(done) => return Ok(done),
            Err(HandshakeError::Failure(e)) => {
                return Err(anyhow::Error::new(e)
                    .context("websocket handshake failed")
                    .into());
            }
            Err(HandshakeError::Interrupted(mid)) => {
                ensure_in_time(deadline, shutdown)?;
                attempt = mid.handshake();
            }
        }
    }
}

fn ensure_running(shutdown: &AtomicBool) -> Result<(), ConnectError> {
    if shutdown.load(Ordering::Relaxed) {
        return Err(ConnectError::Cancelled);
    }
    Ok(())
}

fn ensure_in_time(deadline: Instant, shutdown: &AtomicBool) -> Result<(), ConnectError> {
    ensure_running(shutdown)?;
    if Instant::now() >= deadline {
        return Err(anyhow!("handshake timed out after {HANDSHAKE_TIMEOUT:?}").into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;
    use std::sync::{Arc, mpsc};
    use std::thread;
    use tungstenite::handshake::server::{ErrorResponse, Request, Response};

    const TICK: Duration = Duration::from_millis(50);

    fn connect(url: &str, token: &str) -> Result<WsTransport, ConnectError> {
        WsTransport::connect(url, token, TICK, &AtomicBool::new(false))
    }

    fn connect_err(url: &str, token: &str) -> ConnectError {
        match connect(url, token) {
            Ok(_) => panic!("connect to {url} must fail"),
            Err(e) => e,
        }
    }

    fn read_text(t: &mut WsTransport) -> String {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            match t.read() {
                Ok(Message::Text(text)) => return text,
                Ok(_) => continue,
                Err(tungstenite::Error::Io(e)) if is_tick(&e) => continue,
                Err(e) => panic!("read failed: {e}"),
            }
        }
        panic!("no text frame in time");
    }

    #[test]
    fn connect_sends_token_and_round_trips_text() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let (auth_tx, auth_rx) = mpsc::channel();

        let server = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut ws = tungstenite::accept_hdr(
                stream,
                |req: &Request, resp: Response| -> Result<Response, ErrorResponse> {
                    let auth = req
                        .headers()
                        .get(AUTHORIZATION)
                        .and_then(|v| v.to_str().ok())
                        .map(str::to_string);
                    auth_tx.send(auth).unwrap();
                    Ok(resp)
                },
            )
            .unwrap();

            // эхо одного кадра, потом ждём закрытия
            let msg = ws.read().unwrap();
            ws.send(msg).unwrap();
            loop {
                match ws.read() {
                    Ok(_) => continue,
                    Err(_) => break,
                }
            }
        });

        let mut t = connect(&format!("ws://{addr}/realtime"), "quote-token").unwrap();
        assert_eq!(auth_rx.recv().unwrap().as_deref(), Some("quote-token"));

        t.send(r#"{"type":"KEEPALIVE","channel":0}"#).unwrap();
        assert_eq!(read_text(&mut t), r#"{"type":"KEEPALIVE","channel":0}"#);

        t.close();
        t.drain_close(Duration::from_secs(2));
        server.join().unwrap();

        assert!(t.send("late").is_err());
    }

    #[test]
    fn read_times_out_as_tick() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let server = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut ws = tungstenite::accept(stream).unwrap();
            while ws.read().is_ok() {}
        });

        let mut t = connect(&format!("ws://{addr}"), "t").unwrap();
        match t.read() {
            Err(tungstenite::Error::Io(e)) => assert!(is_tick(&e)),
            other => panic!("expected a read timeout, got {other:?}"),
        }

        t.close();
        t.drain_close(Duration::from_secs(2));
        server.join().unwrap();
    }

    #[test]
    fn invalid_url_and_refused_connection() {
        assert!(matches!(connect_err("not a url", "t"), ConnectError::Failed(_)));
        let err = connect_err("http://127.0.0.1:1/realtime", "t");
        assert!(format!("{err:#}").contains("scheme"), "{err:#}");

        // порт заняли и сразу освободили
        let port = TcpListener::bind("127.0.0.1:0").unwrap().local_addr().unwrap().port();
        let err = connect_err(&format!("ws://127.0.0.1:{port}"), "t");
        assert!(format!("{err:#}").contains("failed to connect"), "{err:#}");
    }

    #[test]
    fn token_with_newline_is_rejected() {
        let err = connect_err("ws://127.0.0.1:1", "bad\ntoken");
        assert!(format!("{err:#}").contains("header value"), "{err:#}");
    }

    #[test]
    fn silent_server_handshake_is_cancelled_by_shutdown() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        // принимает TCP и молчит: upgrade-ответа не будет
        let server = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            thread::sleep(Duration::from_secs(3));
            drop(stream);
        });

        let shutdown = Arc::new(AtomicBool::new(false));
        {
            let shutdown = shutdown.clone();
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(300));
                shutdown.store(true, Ordering::Relaxed);
            });
        }

        let started = Instant::now();
        let res = WsTransport::connect(&format!("ws://{addr}/realtime"), "t", TICK, &shutdown);

        assert!(matches!(res, Err(ConnectError::Cancelled)));
        assert!(started.elapsed() < Duration::from_secs(2), "{:?}", started.elapsed());
        server.join().unwrap();
    }

    #[test]
    fn shutdown_before_connect_skips_network() {
        let res = WsTransport::connect("ws://127.0.0.1:1", "t", TICK, &AtomicBool::new(true));
        assert!(matches!(res, Err(ConnectError::Cancelled)));
    }
}
