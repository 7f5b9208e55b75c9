//! Realtime session protocol
//!
//! One reader and one writer per connection. The writer owns the outbound
//! half of the socket and is the only place frames are produced: the hello
//! greeting, replay pages, replies to control frames, keep-alive pings and
//! live events from the broker all funnel through it, so they never
//! interleave. The reader parses control frames and forwards whatever needs
//! a write to the writer.
//!
//! ```text
//!  client ──frames──▶ reader ──WriterCommand──▶ writer ──frames──▶ client
//!                                                  ▲
//!                     broker ──RealtimeEvent───────┘
//! ```

use axum::extract::ws::Message;
use futures::{Sink, SinkExt, Stream, StreamExt};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use beacon_server_domain::realtime::{RealtimeEvent, SubscriptionFilter};
use beacon_server_infrastructure::realtime::{
    RealtimeBroker, RealtimeMetrics, SESSION_SUBSCRIBER_BUFFER,
};
use beacon_shared::realtime::{ClientAction, ClientCommand, ServerMessage};

use super::session::{ConnectionSession, SessionError, SessionState};
use crate::mappers::event_message;

/// Events fetched per replay page
pub const REPLAY_PAGE_SIZE: i64 = 400;
pub const PING_INTERVAL: Duration = Duration::from_secs(20);
pub const WRITE_TIMEOUT: Duration = Duration::from_secs(10);
pub const READ_IDLE_TIMEOUT: Duration = Duration::from_secs(45);
/// Largest inbound message accepted from a client
pub const MAX_MESSAGE_SIZE: usize = 1 << 20;

const CONTROL_CHANNEL_CAPACITY: usize = 16;

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub replay_page_size: i64,
    pub ping_interval: Duration,
    pub write_timeout: Duration,
    pub read_idle_timeout: Duration,
    pub subscriber_buffer: usize,
    pub max_message_size: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            replay_page_size: REPLAY_PAGE_SIZE,
            ping_interval: PING_INTERVAL,
            write_timeout: WRITE_TIMEOUT,
            read_idle_timeout: READ_IDLE_TIMEOUT,
            subscriber_buffer: SESSION_SUBSCRIBER_BUFFER,
            max_message_size: MAX_MESSAGE_SIZE,
        }
    }
}

#[derive(Debug)]
enum WriterCommand {
    Reply(ServerMessage),
    Replay { generation: u64 },
}

/// Drive one connection until either side gives up or `shutdown` fires.
///
/// The broker subscription is taken before the first replay so nothing
/// published while the backlog is streaming is lost; duplicates are removed
/// by the writer's monotonic delivery check.
#[tracing::instrument(skip_all, fields(session_id = %session.id()))]
pub async fn run_session<W, R, WE, RE>(
    sink: W,
    stream: R,
    session: Arc<ConnectionSession>,
    broker: RealtimeBroker,
    config: SessionConfig,
    shutdown: CancellationToken,
) where
    W: Sink<Message, Error = WE> + Unpin + Send + 'static,
    WE: fmt::Display + Send + 'static,
    R: Stream<Item = Result<Message, RE>> + Unpin + Send,
    RE: fmt::Display,
{
    let started = Instant::now();
    let metrics = broker.metrics().clone();
    metrics.session_opened();

    let (events, subscription) = broker.subscribe(config.subscriber_buffer);
    let token = shutdown.child_token();
    let (commands_tx, commands_rx) = mpsc::channel(CONTROL_CHANNEL_CAPACITY);

    info!(
        user_id = %session.principal().user_id,
        last_event_id = session.watermark(),
        "Realtime session opened"
    );

    let writer = SessionWriter {
        sink,
        session: session.clone(),
        config: config.clone(),
        metrics: metrics.clone(),
        last_delivered: session.watermark(),
    };
    let writer_task = tokio::spawn(writer.run(events, commands_rx, token.clone()));

    let read_result = read_loop(stream, &session, &commands_tx, &config, &token).await;
    token.cancel();
    drop(commands_tx);

    let write_result = match writer_task.await {
        Ok(result) => result,
        Err(e) => Err(SessionError::Transport(format!("writer task failed: {}", e))),
    };

    subscription.detach();
    session.transition(SessionState::Closed);
    metrics.session_closed(started.elapsed().as_secs_f64());

    match (read_result, write_result) {
        (Err(e), _) | (_, Err(e)) => {
            info!(error = %e, duration = ?started.elapsed(), "Realtime session closed")
        }
        _ => info!(duration = ?started.elapsed(), "Realtime session closed"),
    }
}

async fn read_loop<R, RE>(
    mut stream: R,
    session: &ConnectionSession,
    commands: &mpsc::Sender<WriterCommand>,
    config: &SessionConfig,
    token: &CancellationToken,
) -> Result<(), SessionError>
where
    R: Stream<Item = Result<Message, RE>> + Unpin,
    RE: fmt::Display,
{
    loop {
        // Any inbound frame, pongs included, refreshes the idle deadline.
        let next = tokio::select! {
            _ = token.cancelled() => return Ok(()),
            next = tokio::time::timeout(config.read_idle_timeout, stream.next()) => next,
        };

        let frame = match next {
            Err(_) => return Err(SessionError::ReadTimeout),
            Ok(None) => return Ok(()),
            Ok(Some(Err(e))) => return Err(SessionError::Transport(e.to_string())),
            Ok(Some(Ok(frame))) => frame,
        };

        let payload: &[u8] = match &frame {
            Message::Text(text) => text.as_str().as_bytes(),
            Message::Binary(data) => data,
            Message::Close(_) => {
                debug!(session_id = %session.id(), "Client initiated close");
                return Ok(());
            }
            Message::Ping(_) | Message::Pong(_) => continue,
        };
        if payload.len() > config.max_message_size {
            return Err(SessionError::MessageTooLarge(payload.len()));
        }

        if let Some(command) = handle_control_frame(session, payload) {
            tokio::select! {
                _ = token.cancelled() => return Ok(()),
                sent = commands.send(command) => {
                    if sent.is_err() {
                        return Ok(());
                    }
                }
            }
        }
    }
}

/// Apply one inbound control frame to the session.
///
/// Returns the work the writer has to do, if any.
fn handle_control_frame(session: &ConnectionSession, payload: &[u8]) -> Option<WriterCommand> {
    let command: ClientCommand = match serde_json::from_slice(payload) {
        Ok(command) => command,
        Err(e) => {
            debug!(session_id = %session.id(), error = %e, "Invalid control frame");
            return Some(WriterCommand::Reply(ServerMessage::invalid_argument(
                "invalid message payload",
            )));
        }
    };

    match command.action() {
        ClientAction::Ack => {
            if let Some(id) = command.cursor() {
                session.advance_watermark(id);
            }
            None
        }
        ClientAction::Subscribe => {
            let cursor = command.cursor();
            session.replace_filter(SubscriptionFilter {
                topics: command.topics,
                project_id: command.project_id,
                run_id: command.run_id,
                task_id: command.task_id,
            });
            if let Some(id) = cursor {
                session.advance_watermark(id);
            }
            let generation = session.bump_replay_generation();
            debug!(session_id = %session.id(), generation, "Subscription replaced");
            Some(WriterCommand::Replay { generation })
        }
        ClientAction::Unsupported(kind) => {
            debug!(session_id = %session.id(), kind = %kind, "Unsupported control frame");
            Some(WriterCommand::Reply(ServerMessage::invalid_argument(
                "unsupported message type",
            )))
        }
    }
}

struct SessionWriter<W> {
    sink: W,
    session: Arc<ConnectionSession>,
    config: SessionConfig,
    metrics: RealtimeMetrics,
    /// Highest event id written on this connection
    last_delivered: i64,
}

impl<W, WE> SessionWriter<W>
where
    W: Sink<Message, Error = WE> + Unpin,
    WE: fmt::Display,
{
    async fn run(
        mut self,
        mut events: mpsc::Receiver<RealtimeEvent>,
        mut commands: mpsc::Receiver<WriterCommand>,
        token: CancellationToken,
    ) -> Result<(), SessionError> {
        let result = self.drive(&mut events, &mut commands, &token).await;
        token.cancel();
        if result.is_ok() {
            let _ = tokio::time::timeout(self.config.write_timeout, self.sink.close()).await;
        }
        result
    }

    async fn drive(
        &mut self,
        events: &mut mpsc::Receiver<RealtimeEvent>,
        commands: &mut mpsc::Receiver<WriterCommand>,
        token: &CancellationToken,
    ) -> Result<(), SessionError> {
        self.send(&ServerMessage::hello(self.session.watermark()))
            .await?;

        let generation = self.session.replay_generation();
        self.replay(generation, token).await?;
        self.session.transition(SessionState::Streaming);

        let mut ping = tokio::time::interval_at(
            tokio::time::Instant::now() + self.config.ping_interval,
            self.config.ping_interval,
        );

        loop {
            tokio::select! {
                _ = token.cancelled() => return Ok(()),
                command = commands.recv() => match command {
                    None => return Ok(()),
                    Some(WriterCommand::Reply(message)) => self.send(&message).await?,
                    Some(WriterCommand::Replay { generation }) => {
                        let completed = self.replay(generation, token).await?;
                        self.session.transition(SessionState::Streaming);
                        if completed {
                            self.send(&ServerMessage::subscribed(self.session.watermark()))
                                .await?;
                        }
                    }
                },
                _ = ping.tick() => self.send_frame(Message::Ping(Default::default())).await?,
                event = events.recv() => match event {
                    None => return Err(SessionError::SubscriptionClosed),
                    Some(event) => self.deliver_live(&event).await?,
                },
            }
        }
    }

    /// Stream the backlog after the current watermark.
    ///
    /// Returns `false` when a newer subscribe superseded this pass.
    async fn replay(
        &mut self,
        generation: u64,
        token: &CancellationToken,
    ) -> Result<bool, SessionError> {
        self.session.transition(SessionState::Replaying);
        let repository = self.session.repository();
        let page_size = self.config.replay_page_size;
        let mut cursor = self.session.watermark();
        let mut replayed = 0u64;

        loop {
            if token.is_cancelled() {
                return Ok(false);
            }
            if self.session.replay_generation() != generation {
                debug!(session_id = %self.session.id(), generation, "Replay superseded");
                self.metrics.record_replayed(replayed);
                return Ok(false);
            }

            let page = repository
                .list_after_id(cursor, page_size)
                .await
                .map_err(|e| SessionError::Replay(e.to_string()))?;
            let fetched = page.len();

            for event in &page {
                cursor = cursor.max(event.id);
                if event.id <= self.last_delivered {
                    continue;
                }
                if self.session.accepts(event).await {
                    self.write_event(event).await?;
                    replayed += 1;
                }
            }

            if (fetched as i64) < page_size {
                break;
            }
        }

        self.metrics.record_replayed(replayed);
        debug!(session_id = %self.session.id(), replayed, cursor, "Replay completed");
        Ok(true)
    }

    async fn deliver_live(&mut self, event: &RealtimeEvent) -> Result<(), SessionError> {
        if event.id <= self.last_delivered {
            return Ok(());
        }
        if !self.session.accepts(event).await {
            return Ok(());
        }
        self.write_event(event).await?;
        self.metrics.record_delivered();
        Ok(())
    }

    async fn write_event(&mut self, event: &RealtimeEvent) -> Result<(), SessionError> {
        self.send(&event_message(event)).await?;
        self.last_delivered = event.id;
        self.session.advance_watermark(event.id);
        Ok(())
    }

    async fn send(&mut self, message: &ServerMessage) -> Result<(), SessionError> {
        let text = serde_json::to_string(message)?;
        self.send_frame(Message::Text(text.into())).await
    }

    async fn send_frame(&mut self, frame: Message) -> Result<(), SessionError> {
        match tokio::time::timeout(self.config.write_timeout, self.sink.send(frame)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => {
                warn!(session_id = %self.session.id(), error = %e, "Realtime write failed");
                Err(SessionError::Transport(e.to_string()))
            }
            Err(_) => Err(SessionError::WriteTimeout),
        }
    }
}
