//! Event loop around the coordinator
//!
//! Feed callbacks and consumer writes are funneled into one ordered channel.
//! A single task applies them to the [`Coordinator`] and publishes a fresh
//! [`SimulatorView`] after each one; readers only ever see the watch channel.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info};
use tsim_feed::FeedHandle;
use tsim_model::{InputError, Orderbook, SimulationInputs, SimulationOutputs};

use crate::coordinator::{Coordinator, SimulatorView};

#[derive(Error, Debug, PartialEq)]
pub enum ServiceError {
    #[error(transparent)]
    InvalidInputs(#[from] InputError),

    #[error("simulator service stopped")]
    Stopped,
}

enum Event {
    Book(Orderbook),
    Connected,
    Disconnected,
    Notice(String),
    SetInputs(SimulationInputs, oneshot::Sender<Result<(), InputError>>),
    Shutdown,
}

pub struct SimulatorService;

impl SimulatorService {
    /// Hook the coordinator to the feed and start the event task.
    pub fn spawn(coordinator: Coordinator, feed: FeedHandle) -> (SimulatorHandle, JoinHandle<()>) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (view_tx, view_rx) = watch::channel(coordinator.view());

        let tx = events_tx.clone();
        feed.on_message(move |book| {
            let _ = tx.send(Event::Book(book));
        });
        let tx = events_tx.clone();
        feed.on_connect(move || {
            let _ = tx.send(Event::Connected);
        });
        let tx = events_tx.clone();
        feed.on_disconnect(move || {
            let _ = tx.send(Event::Disconnected);
        });
        let tx = events_tx.clone();
        feed.on_error(move |message| {
            let _ = tx.send(Event::Notice(message));
        });

        let task = tokio::spawn(run(coordinator, events_rx, view_tx));
        let handle = SimulatorHandle {
            events: events_tx,
            view: view_rx,
            feed,
        };
        (handle, task)
    }
}

async fn run(
    mut coordinator: Coordinator,
    mut events: mpsc::UnboundedReceiver<Event>,
    view: watch::Sender<SimulatorView>,
) {
    info!("Simulator service started");
    while let Some(event) = events.recv().await {
        let mut reply = None;
        match event {
            Event::Book(book) => coordinator.on_orderbook(book),
            Event::Connected => coordinator.on_connect(),
            Event::Disconnected => coordinator.on_disconnect(),
            Event::Notice(message) => coordinator.on_status(message),
            Event::SetInputs(inputs, tx) => reply = Some((coordinator.set_inputs(inputs), tx)),
            Event::Shutdown => break,
        }
        view.send_replace(coordinator.view());

        // answer only after the new view is visible
        if let Some((result, tx)) = reply {
            let _ = tx.send(result);
        }
    }
    info!("Simulator service stopped");
}

/// Consumer-facing accessors. Cloning is cheap; every clone reads the same
/// published view.
#[derive(Clone)]
pub struct SimulatorHandle {
    events: mpsc::UnboundedSender<Event>,
    view: watch::Receiver<SimulatorView>,
    feed: FeedHandle,
}

impl SimulatorHandle {
    pub fn current_orderbook(&self) -> Option<Arc<Orderbook>> {
        self.view.borrow().orderbook.clone()
    }

    pub fn current_outputs(&self) -> SimulationOutputs {
        self.view.borrow().outputs.clone()
    }

    pub fn current_inputs(&self) -> SimulationInputs {
        self.view.borrow().inputs.clone()
    }

    /// Validate and apply new inputs. Returns once the recomputed view has
    /// been published.
    pub async fn set_inputs(&self, inputs: SimulationInputs) -> Result<(), ServiceError> {
        // fail fast without a round trip
        inputs.validate()?;
        let (tx, rx) = oneshot::channel();
        self.events
            .send(Event::SetInputs(inputs, tx))
            .map_err(|_| ServiceError::Stopped)?;
        rx.await.map_err(|_| ServiceError::Stopped)??;
        Ok(())
    }

    pub fn is_connected(&self) -> bool {
        self.view.borrow().connected
    }

    pub fn status(&self) -> String {
        self.view.borrow().status.clone()
    }

    pub fn view(&self) -> SimulatorView {
        self.view.borrow().clone()
    }

    /// Subscribe to every published view
    pub fn subscribe(&self) -> watch::Receiver<SimulatorView> {
        self.view.clone()
    }

    pub fn feed(&self) -> &FeedHandle {
        &self.feed
    }

    pub fn connect(&self) {
        self.feed.connect();
    }

    pub fn disconnect(&self) {
        self.feed.disconnect();
    }

    /// Stop the feed driver and the event task.
    pub fn shutdown(&self) {
        self.feed.shutdown();
        if self.events.send(Event::Shutdown).is_err() {
            debug!("Simulator service already stopped");
        }
    }
}
