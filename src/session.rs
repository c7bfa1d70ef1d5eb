// session.rs
// A session is single-use: Idle -> Connecting -> Authenticated -> Streaming ->
// Closed, with Closed reachable from any state once a start was attempted.
// No token means the session stays Idle and never touches the network.
// There is no reconnect; once closed, the caller builds a new session.

use crate::codec::SubscriptionRequest;
use crate::config::FeedConfig;
use crate::processor::{FrameOutcome, FrameProcessor};
use crate::snapshot::TelemetrySnapshot;
use crate::stats::SessionStats;
use crate::token::TokenSupplier;
use crate::view::ViewSink;
use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::select;
use tokio::sync::Notify;
use tokio::time::{interval_at, Duration, Instant};
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::{connect_async, tungstenite, WebSocketStream};
use tracing::{debug, error, info, trace, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Connecting,
    Authenticated,
    Streaming,
    Closed,
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("websocket transport failed: {0}")]
    Transport(#[from] tungstenite::Error),
    #[error("session cannot be started from state {0:?}")]
    AlreadyStarted(SessionState),
    #[error("encoding subscription request: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("latency histogram setup failed: {0:?}")]
    Stats(hdrhistogram::CreationError),
}

/// Requests an orderly close of a running session from another task.
#[derive(Clone)]
pub struct ShutdownHandle(Arc<Notify>);

impl ShutdownHandle {
    pub fn shutdown(&self) {
        self.0.notify_one();
    }
}

pub struct StreamSession<V> {
    feed: FeedConfig,
    state: SessionState,
    processor: FrameProcessor<V>,
    shutdown: Arc<Notify>,
}

impl<V: ViewSink> StreamSession<V> {
    pub fn new(feed: FeedConfig, view: V) -> Result<Self, SessionError> {
        Ok(Self {
            feed,
            state: SessionState::Idle,
            processor: FrameProcessor::new(view).map_err(SessionError::Stats)?,
            shutdown: Arc::new(Notify::new()),
        })
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn snapshot(&self) -> &TelemetrySnapshot {
        self.processor.snapshot()
    }

    pub fn stats(&self) -> &SessionStats {
        self.processor.stats()
    }

    pub fn view(&self) -> &V {
        self.processor.view()
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle(self.shutdown.clone())
    }

    /// Resolves a token, connects, subscribes and streams until the feed
    /// closes or shutdown is requested.
    ///
    /// Returns `Ok` when no token was available (the session stays `Idle`)
    /// and on an orderly close, including a shutdown requested while the
    /// token lookup or the handshake is still pending. Transport failures end
    /// the session in `Closed` and are returned.
    pub async fn start<T>(&mut self, tokens: &T) -> Result<(), SessionError>
    where
        T: TokenSupplier + ?Sized,
    {
        if self.state != SessionState::Idle {
            return Err(SessionError::AlreadyStarted(self.state));
        }

        // shutdown is honoured while waiting on the token source or the handshake
        let shutdown = self.shutdown.clone();

        let lookup = select! {
            _ = shutdown.notified() => {
                info!("shutdown requested before connecting");
                self.transition(SessionState::Closed);
                return Ok(());
            }
            lookup = tokens.token() => lookup,
        };
        let token = match lookup {
            Ok(Some(token)) => token,
            Ok(None) => {
                info!("no auth token available, not connecting");
                return Ok(());
            }
            Err(e) => {
                warn!(error = %e, "token lookup failed, not connecting");
                return Ok(());
            }
        };

        self.transition(SessionState::Connecting);
        let url = self.feed.url.clone();
        info!(url = %url, "connecting to telemetry feed");
        let connected = select! {
            _ = shutdown.notified() => {
                info!("shutdown requested while connecting");
                self.transition(SessionState::Closed);
                return Ok(());
            }
            connected = connect_async(url.as_str()) => connected,
        };
        let ws = match connected {
            Ok((ws, _)) => ws,
            Err(e) => {
                error!(error = %e, "could not open telemetry feed");
                self.transition(SessionState::Closed);
                return Err(e.into());
            }
        };

        let result = self.stream(ws, &token).await;
        if let Err(e) = &result {
            error!(error = %e, "telemetry feed failed");
        }
        self.transition(SessionState::Closed);
        info!(stats = ?self.stats().summary(), "telemetry session closed");
        result
    }

    // The socket halves are dropped on every return path, which releases the
    // connection.
    async fn stream<S>(&mut self, ws: WebSocketStream<S>, token: &str) -> Result<(), SessionError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let (mut write, mut read) = ws.split();

        self.transition(SessionState::Authenticated);
        let request = SubscriptionRequest::for_feed(&self.feed, token).encode()?;
        write.send(Message::Text(request.into())).await?;
        info!(
            entity_id = %self.feed.entity_id,
            cmd_id = self.feed.subscription_cmd_id,
            "subscription request sent"
        );

        let period = Duration::from_secs(self.feed.ping_interval_secs.max(1));
        let mut keepalive = interval_at(Instant::now() + period, period);
        let shutdown = self.shutdown.clone();

        loop {
            select! {
                _ = shutdown.notified() => {
                    info!("shutdown requested, closing telemetry feed");
                    let _ = write.send(Message::Close(None)).await;
                    let _ = write.close().await;
                    return Ok(());
                }
                _ = keepalive.tick() => {
                    write.send(Message::Ping(Bytes::new())).await?;
                    trace!("ping sent");
                }
                msg = read.next() => match msg {
                    Some(Ok(Message::Text(text))) => self.on_frame(text.as_str()),
                    Some(Ok(Message::Ping(payload))) => write.send(Message::Pong(payload)).await?,
                    Some(Ok(Message::Close(frame))) => {
                        info!(?frame, "telemetry feed closed by server");
                        return Ok(());
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => return Err(e.into()),
                    None => {
                        info!("telemetry feed ended");
                        return Ok(());
                    }
                }
            }
        }
    }

    fn on_frame(&mut self, text: &str) {
        trace!(frame = text, "frame received");
        if !matches!(
            self.state,
            SessionState::Authenticated | SessionState::Streaming
        ) {
            debug!(state = ?self.state, "ignoring frame outside of a live session");
            return;
        }
        if let FrameOutcome::Merged(_) = self.processor.process(text) {
            self.transition(SessionState::Streaming);
        }
    }

    fn transition(&mut self, next: SessionState) {
        if self.state == next || self.state == SessionState::Closed {
            return;
        }
        debug!(from = ?self.state, to = ?next, "session state");
        self.state = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconcile::MergeReport;
    use crate::token::StaticToken;

    #[derive(Default)]
    struct Counting(usize);

    impl ViewSink for Counting {
        fn render(&mut self, _snapshot: &TelemetrySnapshot, _report: &MergeReport) {
            self.0 += 1;
        }
    }

    fn feed(url: &str) -> FeedConfig {
        FeedConfig {
            url: url.to_string(),
            ..FeedConfig::default()
        }
    }

    #[tokio::test]
    async fn no_token_stays_idle_without_connecting() {
        // nothing listens on port 1, so any attempt would surface as an error
        let mut session = StreamSession::new(feed("ws://127.0.0.1:1"), Counting::default()).unwrap();
        session.start(&StaticToken::none()).await.unwrap();
        assert_eq!(session.state(), SessionState::Idle);
        assert_eq!(session.stats().frames_received, 0);
    }

    #[tokio::test]
    async fn connect_failure_closes_session() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let mut session =
            StreamSession::new(feed(&format!("ws://{addr}")), Counting::default()).unwrap();
        let err = session.start(&StaticToken::new("t")).await.unwrap_err();
        assert!(matches!(err, SessionError::Transport(_)));
        assert_eq!(session.state(), SessionState::Closed);
    }

    struct NeverAnswers;

    #[async_trait::async_trait]
    impl TokenSupplier for NeverAnswers {
        async fn token(&self) -> Result<Option<String>, crate::token::TokenError> {
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn shutdown_interrupts_a_pending_token_lookup() {
        let mut session = StreamSession::new(feed("ws://127.0.0.1:1"), Counting::default()).unwrap();
        session.shutdown_handle().shutdown();
        tokio::time::timeout(Duration::from_secs(5), session.start(&NeverAnswers))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(session.state(), SessionState::Closed);
    }

    #[tokio::test]
    async fn closed_session_cannot_restart() {
        let mut session = StreamSession::new(feed("ws://127.0.0.1:1"), Counting::default()).unwrap();
        session.state = SessionState::Closed;
        let err = session.start(&StaticToken::new("t")).await.unwrap_err();
        assert!(matches!(err, SessionError::AlreadyStarted(SessionState::Closed)));
    }

    #[test]
    fn first_frame_moves_to_streaming() {
        let mut session = StreamSession::new(FeedConfig::default(), Counting::default()).unwrap();
        session.transition(SessionState::Connecting);
        session.transition(SessionState::Authenticated);

        session.on_frame("not json");
        assert_eq!(session.state(), SessionState::Authenticated);

        session.on_frame(r#"{"data":{"hoistTime":[{"1":"80"}]}}"#);
        assert_eq!(session.state(), SessionState::Streaming);
        assert_eq!(session.snapshot().hoist_time, 80.0);
        assert_eq!(session.view().0, 1);
    }

    #[test]
    fn frames_are_ignored_when_not_connected() {
        let mut session = StreamSession::new(FeedConfig::default(), Counting::default()).unwrap();
        session.on_frame(r#"{"data":{"hoistTime":[{"1":"80"}]}}"#);
        assert_eq!(session.snapshot().hoist_time, 55.0);
        assert_eq!(session.state(), SessionState::Idle);
    }

    #[test]
    fn closed_is_terminal() {
        let mut session = StreamSession::new(FeedConfig::default(), Counting::default()).unwrap();
        session.transition(SessionState::Closed);
        session.transition(SessionState::Streaming);
        assert_eq!(session.state(), SessionState::Closed);
    }
}
