//! Connection lifecycle for one order book stream
//!
//! A single driver task owns the transport, the live stream, the reconnect
//! bookkeeping and the callback slots. [`FeedHandle`] talks to it over an
//! ordered command channel, so callbacks never run concurrently and a
//! `disconnect()` is always observed before any later timer fires. A
//! handshake in flight is just another branch of the driver loop, so a
//! `disconnect()` or `shutdown()` drops it without waiting for the timeout.

use std::future::{pending, Future};
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, sleep_until, timeout, Instant, Interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};
use tsim_config::FeedConfig;
use tsim_model::Orderbook;

use crate::error::FeedError;
use crate::metrics::FeedMetrics;
use crate::policy::{HeartbeatPolicy, ReconnectPolicy};
use crate::traits::{FeedStream, Transport};

pub type MessageCallback = Box<dyn FnMut(Orderbook) + Send>;
pub type LifecycleCallback = Box<dyn FnMut() + Send>;
pub type ErrorCallback = Box<dyn FnMut(String) + Send>;

type PendingOpen<S> = Pin<Box<dyn Future<Output = Result<S, FeedError>> + Send>>;

pub const PARSE_ERROR: &str = "Failed to parse server message";
pub const EXHAUSTED_ERROR: &str =
    "Maximum reconnection attempts reached. Call connect() to try again.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Idle,
    Connecting,
    Open,
    Closing,
}

enum Command {
    Connect,
    Disconnect,
    OnMessage(MessageCallback),
    OnConnect(LifecycleCallback),
    OnDisconnect(LifecycleCallback),
    OnError(ErrorCallback),
    Shutdown,
}

/// Builder for the connection driver.
pub struct FeedManager<T: Transport> {
    name: String,
    url: String,
    transport: T,
    reconnect: ReconnectPolicy,
    heartbeat: HeartbeatPolicy,
    connect_timeout: Duration,
}

impl<T: Transport> FeedManager<T> {
    pub fn new(name: impl Into<String>, url: impl Into<String>, transport: T) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            transport,
            reconnect: ReconnectPolicy::default(),
            heartbeat: HeartbeatPolicy::default(),
            connect_timeout: Duration::from_secs(10),
        }
    }

    pub fn from_config(config: &FeedConfig, transport: T) -> Self {
        Self::new(
            format!("{}:{}", config.exchange, config.symbol),
            config.endpoint.clone(),
            transport,
        )
        .with_reconnect(ReconnectPolicy::from(&config.reconnect))
        .with_heartbeat(HeartbeatPolicy::from(&config.heartbeat))
        .with_connect_timeout(config.connect_timeout())
    }

    pub fn with_reconnect(mut self, policy: ReconnectPolicy) -> Self {
        self.reconnect = policy;
        self
    }

    pub fn with_heartbeat(mut self, policy: HeartbeatPolicy) -> Self {
        self.heartbeat = policy;
        self
    }

    pub fn with_connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.connect_timeout = connect_timeout;
        self
    }

    /// Start the driver task. Nothing connects until [`FeedHandle::connect`].
    pub fn spawn(self) -> (FeedHandle, JoinHandle<()>) {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(ConnectionState::Idle);

        let driver = Driver {
            metrics: FeedMetrics::new(self.name.as_str()),
            name: self.name,
            url: self.url,
            transport: Arc::new(self.transport),
            reconnect: self.reconnect,
            heartbeat: self.heartbeat,
            connect_timeout: self.connect_timeout,
            state_tx,
            stream: None,
            handshake: None,
            heartbeat_timer: None,
            attempts: 0,
            intentional_close: false,
            reconnect_at: None,
            last_message: Instant::now(),
            callbacks: Callbacks::default(),
        };

        let task = tokio::spawn(driver.run(cmd_rx));
        let handle = FeedHandle {
            commands: cmd_tx,
            state: state_rx,
        };
        (handle, task)
    }
}

/// Cheap, cloneable control surface of a running feed.
#[derive(Clone)]
pub struct FeedHandle {
    commands: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<ConnectionState>,
}

impl FeedHandle {
    /// Open the connection. No-op while open or connecting.
    pub fn connect(&self) {
        self.send(Command::Connect);
    }

    /// Close on purpose, abandoning any handshake in flight and any pending
    /// reconnect.
    pub fn disconnect(&self) {
        self.send(Command::Disconnect);
    }

    /// Replace the message callback
    pub fn on_message(&self, callback: impl FnMut(Orderbook) + Send + 'static) {
        self.send(Command::OnMessage(Box::new(callback)));
    }

    pub fn on_connect(&self, callback: impl FnMut() + Send + 'static) {
        self.send(Command::OnConnect(Box::new(callback)));
    }

    pub fn on_disconnect(&self, callback: impl FnMut() + Send + 'static) {
        self.send(Command::OnDisconnect(Box::new(callback)));
    }

    pub fn on_error(&self, callback: impl FnMut(String) + Send + 'static) {
        self.send(Command::OnError(Box::new(callback)));
    }

    /// Close the connection and stop the driver task.
    pub fn shutdown(&self) {
        self.send(Command::Shutdown);
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    pub fn is_open(&self) -> bool {
        self.state() == ConnectionState::Open
    }

    /// Subscribe to state transitions
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }

    fn send(&self, command: Command) {
        if self.commands.send(command).is_err() {
            debug!("Feed driver stopped, command dropped");
        }
    }
}

#[derive(Default)]
struct Callbacks {
    message: Option<MessageCallback>,
    connect: Option<LifecycleCallback>,
    disconnect: Option<LifecycleCallback>,
    error: Option<ErrorCallback>,
}

impl Callbacks {
    fn message(&mut self, book: Orderbook) {
        if let Some(cb) = self.message.as_mut() {
            cb(book);
        }
    }

    fn connect(&mut self) {
        if let Some(cb) = self.connect.as_mut() {
            cb();
        }
    }

    fn disconnect(&mut self) {
        if let Some(cb) = self.disconnect.as_mut() {
            cb();
        }
    }

    fn error(&mut self, message: String) {
        if let Some(cb) = self.error.as_mut() {
            cb(message);
        }
    }
}

struct Driver<T: Transport> {
    name: String,
    url: String,
    transport: Arc<T>,
    reconnect: ReconnectPolicy,
    heartbeat: HeartbeatPolicy,
    connect_timeout: Duration,
    state_tx: watch::Sender<ConnectionState>,
    stream: Option<T::Stream>,
    /// Present only while connecting
    handshake: Option<PendingOpen<T::Stream>>,
    /// Present only while the connection is open
    heartbeat_timer: Option<Interval>,
    /// Retries used in the current failure cycle
    attempts: u32,
    intentional_close: bool,
    reconnect_at: Option<Instant>,
    last_message: Instant,
    callbacks: Callbacks,
    metrics: FeedMetrics,
}

impl<T: Transport> Driver<T> {
    async fn run(mut self, mut commands: mpsc::UnboundedReceiver<Command>) {
        let backoff_ms: Vec<u64> = self
            .reconnect
            .schedule()
            .iter()
            .map(|d| d.as_millis() as u64)
            .collect();
        info!(feed = %self.name, url = %self.url, ?backoff_ms, "Feed driver started");

        loop {
            let reconnect_at = self.reconnect_at;
            tokio::select! {
                command = commands.recv() => match command {
                    Some(Command::Shutdown) | None => break,
                    Some(command) => self.handle_command(command).await,
                },
                result = handshake_done(&mut self.handshake) => {
                    self.handshake = None;
                    self.on_open(result);
                }
                frame = next_frame(&mut self.stream) => self.handle_frame(frame).await,
                _ = heartbeat_tick(&mut self.heartbeat_timer) => self.check_staleness().await,
                _ = reconnect_due(reconnect_at) => {
                    self.reconnect_at = None;
                    self.open();
                }
            }
        }

        self.intentional_close = true;
        self.reconnect_at = None;
        if self.handshake.take().is_some() {
            info!(feed = %self.name, "Connection attempt abandoned on shutdown");
        }
        self.close_stream().await;
        info!(feed = %self.name, "Feed driver stopped");
    }

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::Connect => {
                if self.stream.is_some() || self.handshake.is_some() {
                    debug!(feed = %self.name, "Already connected, ignoring connect()");
                    return;
                }
                self.intentional_close = false;
                self.reconnect_at = None;
                self.attempts = 0;
                self.open();
            }
            Command::Disconnect => {
                self.intentional_close = true;
                if self.reconnect_at.take().is_some() {
                    info!(feed = %self.name, "Pending reconnect cancelled");
                }
                if self.handshake.take().is_some() {
                    info!(feed = %self.name, "Connection attempt abandoned");
                }
                self.close_stream().await;
            }
            Command::OnMessage(cb) => self.callbacks.message = Some(cb),
            Command::OnConnect(cb) => self.callbacks.connect = Some(cb),
            Command::OnDisconnect(cb) => self.callbacks.disconnect = Some(cb),
            Command::OnError(cb) => self.callbacks.error = Some(cb),
            Command::Shutdown => {}
        }
    }

    /// Start a handshake; the driver loop completes it in [`Self::on_open`].
    fn open(&mut self) {
        self.set_state(ConnectionState::Connecting);
        info!(feed = %self.name, url = %self.url, attempt = self.attempts, "Connecting to feed");

        let transport = Arc::clone(&self.transport);
        let url = self.url.clone();
        let limit = self.connect_timeout;
        self.handshake = Some(Box::pin(async move {
            match timeout(limit, transport.open(&url)).await {
                Ok(result) => result,
                Err(_) => Err(FeedError::Timeout(limit)),
            }
        }));
    }

    fn on_open(&mut self, result: Result<T::Stream, FeedError>) {
        match result {
            Ok(stream) => {
                self.stream = Some(stream);
                self.attempts = 0;
                self.last_message = Instant::now();
                let mut timer = interval_at(
                    Instant::now() + self.heartbeat.interval,
                    self.heartbeat.interval,
                );
                timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
                self.heartbeat_timer = Some(timer);
                self.set_state(ConnectionState::Open);
                self.metrics.set_connected();
                info!(feed = %self.name, "Feed connected");
                self.callbacks.connect();
            }
            Err(e) => {
                self.set_state(ConnectionState::Idle);
                error!(feed = %self.name, error = %e, "Failed to establish WebSocket connection");
                self.notify_error(format!("Failed to establish WebSocket connection: {}", e));
                self.schedule_reconnect();
            }
        }
    }

    async fn handle_frame(&mut self, frame: Result<Option<String>, FeedError>) {
        match frame {
            Ok(Some(text)) => {
                self.last_message = Instant::now();
                self.metrics
                    .set_last_message(chrono::Utc::now().timestamp_millis() as f64 / 1000.0);
                match Orderbook::from_json(&text) {
                    Ok(book) => {
                        self.metrics.inc_decoded();
                        self.callbacks.message(book);
                    }
                    Err(e) => {
                        self.metrics.inc_decode_error();
                        warn!(feed = %self.name, error = %e, len = text.len(), "Dropping undecodable message");
                        self.notify_error(PARSE_ERROR.to_string());
                    }
                }
            }
            Ok(None) => {
                info!(feed = %self.name, "Feed closed by peer");
                self.stream = None;
                self.after_close();
            }
            Err(e) => {
                warn!(feed = %self.name, error = %e, "Feed transport error");
                self.notify_error(format!(
                    "WebSocket connection error: {}. Attempting to reconnect...",
                    e
                ));
                self.close_stream().await;
            }
        }
    }

    async fn check_staleness(&mut self) {
        let silent = self.last_message.elapsed();
        self.metrics.set_idle_seconds(silent.as_secs_f64());
        if silent <= self.heartbeat.stale_after {
            return;
        }

        warn!(
            feed = %self.name,
            silent_secs = silent.as_secs_f64(),
            "No messages within heartbeat window, restarting connection"
        );
        self.metrics.inc_stale_restart();
        self.notify_error(format!(
            "No messages received for {} seconds, attempting to reconnect...",
            self.heartbeat.stale_after.as_secs()
        ));
        self.restart().await;
    }

    /// Deliberate close-and-reopen: skips the backoff timer, keeps the
    /// attempt counter.
    async fn restart(&mut self) {
        self.intentional_close = true;
        self.close_stream().await;
        self.intentional_close = false;
        self.reconnect_at = None;
        self.open();
    }

    /// Close the live stream, if any, and run the close bookkeeping.
    async fn close_stream(&mut self) {
        let Some(mut stream) = self.stream.take() else {
            self.set_state(ConnectionState::Idle);
            return;
        };
        self.set_state(ConnectionState::Closing);
        if let Err(e) = stream.close().await {
            debug!(feed = %self.name, error = %e, "Error while closing feed stream");
        }
        self.after_close();
    }

    fn after_close(&mut self) {
        self.heartbeat_timer = None;
        self.set_state(ConnectionState::Idle);
        self.metrics.set_disconnected();
        self.callbacks.disconnect();
        self.schedule_reconnect();
    }

    fn schedule_reconnect(&mut self) {
        if self.intentional_close {
            return;
        }
        if self.attempts >= self.reconnect.max_attempts {
            error!(
                feed = %self.name,
                max_attempts = self.reconnect.max_attempts,
                "Reconnect attempts exhausted"
            );
            self.metrics.inc_reconnect_exhausted();
            self.notify_error(EXHAUSTED_ERROR.to_string());
            return;
        }

        self.attempts += 1;
        let delay = self.reconnect.delay_for(self.attempts);
        info!(
            feed = %self.name,
            attempt = self.attempts,
            max_attempts = self.reconnect.max_attempts,
            delay_ms = delay.as_millis() as u64,
            "Scheduling reconnect"
        );
        self.metrics.inc_reconnect_attempt();
        self.notify_error(format!(
            "Attempting to reconnect in {} seconds (attempt {} of {})",
            delay.as_secs_f64(),
            self.attempts,
            self.reconnect.max_attempts
        ));
        self.reconnect_at = Some(Instant::now() + delay);
    }

    fn notify_error(&mut self, message: String) {
        self.callbacks.error(message);
    }

    fn set_state(&mut self, state: ConnectionState) {
        self.state_tx.send_replace(state);
    }
}

async fn handshake_done<S>(handshake: &mut Option<PendingOpen<S>>) -> Result<S, FeedError> {
    match handshake {
        Some(handshake) => handshake.as_mut().await,
        None => pending().await,
    }
}

async fn next_frame<S: FeedStream>(stream: &mut Option<S>) -> Result<Option<String>, FeedError> {
    match stream {
        Some(stream) => stream.recv().await,
        None => pending().await,
    }
}

async fn heartbeat_tick(timer: &mut Option<Interval>) {
    match timer {
        Some(timer) => {
            timer.tick().await;
        }
        None => pending().await,
    }
}

async fn reconnect_due(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => pending().await,
    }
}
