//! Single-owner simulation state
//!
//! The coordinator holds the latest book, the current inputs and the last
//! valid outputs. It is plain synchronous state; the service task owns it and
//! feeds it events one at a time.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, trace};
use tsim_model::{CostModel, InputError, Orderbook, SimulationInputs, SimulationOutputs};

use crate::latency::{elapsed_ms, now_tsc};
use crate::metrics;

pub const STATUS_CONNECTED: &str = "Connected";
pub const STATUS_DISCONNECTED: &str = "Disconnected";

/// Read-only snapshot published to consumers after every event.
#[derive(Debug, Clone)]
pub struct SimulatorView {
    pub orderbook: Option<Arc<Orderbook>>,
    pub inputs: SimulationInputs,
    pub outputs: SimulationOutputs,
    pub connected: bool,
    pub status: String,
    /// Time between the two most recent books, 0 until a second one arrives
    pub message_interval_ms: f64,
    pub books_received: u64,
    pub updated_at: Option<DateTime<Utc>>,
}

pub struct Coordinator {
    model: CostModel,
    orderbook: Option<Arc<Orderbook>>,
    inputs: SimulationInputs,
    outputs: SimulationOutputs,
    connected: bool,
    status: String,
    last_book_tsc: Option<u64>,
    message_interval_ms: f64,
    books_received: u64,
    updated_at: Option<DateTime<Utc>>,
}

impl Coordinator {
    pub fn new(model: CostModel, inputs: SimulationInputs) -> Self {
        Self {
            model,
            orderbook: None,
            inputs,
            outputs: SimulationOutputs::default(),
            connected: false,
            status: STATUS_DISCONNECTED.to_string(),
            last_book_tsc: None,
            message_interval_ms: 0.0,
            books_received: 0,
            updated_at: None,
        }
    }

    /// Replace the book and recompute.
    pub fn on_orderbook(&mut self, book: Orderbook) {
        let now = now_tsc();
        if let Some(previous) = self.last_book_tsc {
            self.message_interval_ms = elapsed_ms(previous, now);
        }
        self.last_book_tsc = Some(now);
        self.books_received += 1;
        self.orderbook = Some(Arc::new(book));
        self.touch();
        self.recompute();
    }

    /// Validate and store new inputs, then recompute. Invalid inputs leave
    /// every piece of state untouched.
    pub fn set_inputs(&mut self, inputs: SimulationInputs) -> Result<(), InputError> {
        inputs.validate()?;
        debug!(
            asset = %inputs.asset,
            quantity = inputs.quantity,
            volatility = inputs.volatility,
            fee_tier = inputs.fee_tier.as_str(),
            "Simulation inputs updated"
        );
        self.inputs = inputs;
        self.touch();
        self.recompute();
        Ok(())
    }

    pub fn on_connect(&mut self) {
        self.connected = true;
        self.status = STATUS_CONNECTED.to_string();
        self.touch();
    }

    /// Drop the book but keep the last good outputs on display.
    pub fn on_disconnect(&mut self) {
        self.connected = false;
        self.status = STATUS_DISCONNECTED.to_string();
        self.orderbook = None;
        self.last_book_tsc = None;
        self.touch();
    }

    /// Latest human-readable feed notice
    pub fn on_status(&mut self, message: String) {
        self.status = message;
        self.touch();
    }

    /// Run the cost model against the current book and inputs.
    ///
    /// Returns `false` and keeps the previous outputs unless both sides of the
    /// book are populated.
    pub fn recompute(&mut self) -> bool {
        let Some(book) = self.orderbook.as_ref().filter(|b| b.has_two_sided_market()) else {
            metrics::record_skipped();
            return false;
        };

        let start = now_tsc();
        let estimate = self.model.estimate(book, &self.inputs);
        let latency_ms = elapsed_ms(start, now_tsc());

        self.outputs = SimulationOutputs::from_estimate(estimate, latency_ms, book.timestamp.clone());
        metrics::record_recompute(latency_ms);
        trace!(net_cost = self.outputs.net_cost, latency_ms, "Recomputed trade costs");
        true
    }

    pub fn orderbook(&self) -> Option<Arc<Orderbook>> {
        self.orderbook.clone()
    }

    pub fn inputs(&self) -> &SimulationInputs {
        &self.inputs
    }

    pub fn outputs(&self) -> &SimulationOutputs {
        &self.outputs
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn view(&self) -> SimulatorView {
        SimulatorView {
            orderbook: self.orderbook.clone(),
            inputs: self.inputs.clone(),
            outputs: self.outputs.clone(),
            connected: self.connected,
            status: self.status.clone(),
            message_interval_ms: self.message_interval_ms,
            books_received: self.books_received,
            updated_at: self.updated_at,
        }
    }

    fn touch(&mut self) {
        self.updated_at = Some(Utc::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tsim_model::{CostParams, FeeTier, Level};

    fn level(price: &str, size: &str) -> Level {
        Level::new(price.parse().unwrap(), size.parse().unwrap())
    }

    fn book(timestamp: &str, asks: Vec<Level>, bids: Vec<Level>) -> Orderbook {
        Orderbook {
            timestamp: timestamp.to_string(),
            exchange: "OKX".to_string(),
            symbol: "BTC-USDT-SWAP".to_string(),
            asks,
            bids,
        }
    }

    fn two_sided(timestamp: &str) -> Orderbook {
        book(
            timestamp,
            vec![level("100", "1"), level("101", "2")],
            vec![level("99", "1"), level("98", "2")],
        )
    }

    fn coordinator() -> Coordinator {
        Coordinator::new(CostModel::new(CostParams::default()), SimulationInputs::default())
    }

    #[test]
    fn test_initial_state() {
        let coord = coordinator();
        assert!(coord.orderbook().is_none());
        assert_eq!(coord.outputs(), &SimulationOutputs::default());
        assert!(!coord.is_connected());
        assert_eq!(coord.status(), STATUS_DISCONNECTED);
    }

    #[test]
    fn test_book_triggers_recompute() {
        let mut coord = coordinator();
        let snapshot = two_sided("2025-05-04T10:39:13Z");
        coord.on_orderbook(snapshot.clone());

        let expected = CostModel::new(CostParams::default())
            .estimate(&snapshot, &SimulationInputs::default());
        let outputs = coord.outputs();
        assert_eq!(outputs.expected_fees, expected.fees);
        assert_eq!(outputs.expected_slippage, expected.slippage);
        assert_eq!(outputs.net_cost, expected.net_cost);
        assert_eq!(outputs.timestamp, "2025-05-04T10:39:13Z");
        assert!(outputs.internal_latency_ms >= 0.0);
        assert_eq!(coord.view().books_received, 1);
    }

    #[test]
    fn test_one_sided_book_keeps_last_outputs() {
        let mut coord = coordinator();
        coord.on_orderbook(two_sided("t1"));
        let valid = coord.outputs().clone();

        coord.on_orderbook(book("t2", vec![level("100", "1")], vec![]));

        assert_eq!(coord.outputs(), &valid);
        assert_eq!(coord.orderbook().unwrap().timestamp, "t2");
        assert!(!coord.recompute());
    }

    #[test]
    fn test_recompute_without_book_is_skipped() {
        let mut coord = coordinator();
        assert!(!coord.recompute());
        assert_eq!(coord.outputs(), &SimulationOutputs::default());
    }

    #[test]
    fn test_set_inputs_recomputes() {
        let mut coord = coordinator();
        coord.on_orderbook(two_sided("t1"));
        let before = coord.outputs().expected_fees;

        let inputs = SimulationInputs {
            quantity: 1000.0,
            fee_tier: FeeTier::Vip5,
            ..Default::default()
        };
        coord.set_inputs(inputs.clone()).unwrap();

        assert_eq!(coord.inputs(), &inputs);
        assert_ne!(coord.outputs().expected_fees, before);
        assert_eq!(coord.outputs().timestamp, "t1");
    }

    #[test]
    fn test_invalid_inputs_are_rejected() {
        let mut coord = coordinator();
        coord.on_orderbook(two_sided("t1"));
        let outputs = coord.outputs().clone();

        let bad = SimulationInputs {
            quantity: -5.0,
            ..Default::default()
        };
        assert_eq!(coord.set_inputs(bad), Err(InputError::Quantity(-5.0)));
        assert_eq!(coord.inputs(), &SimulationInputs::default());
        assert_eq!(coord.outputs(), &outputs);
    }

    #[test]
    fn test_connectivity_and_status() {
        let mut coord = coordinator();
        coord.on_connect();
        assert!(coord.is_connected());
        assert_eq!(coord.status(), STATUS_CONNECTED);

        coord.on_status("Attempting to reconnect in 1 seconds (attempt 1 of 5)".to_string());
        assert!(coord.is_connected());
        assert!(coord.status().starts_with("Attempting to reconnect"));

        coord.on_disconnect();
        assert!(!coord.is_connected());
        assert!(coord.view().updated_at.is_some());
    }

    #[test]
    fn test_disconnect_discards_book_keeps_outputs() {
        let mut coord = coordinator();
        coord.on_connect();
        coord.on_orderbook(two_sided("t1"));
        let outputs = coord.outputs().clone();
        assert!(outputs.net_cost > 0.0);

        coord.on_disconnect();
        assert!(coord.view().orderbook.is_none());
        assert_eq!(coord.outputs(), &outputs);

        // nothing to recompute against until the next book
        let inputs = SimulationInputs {
            quantity: 500.0,
            ..Default::default()
        };
        coord.set_inputs(inputs.clone()).unwrap();
        assert_eq!(coord.outputs(), &outputs);
        assert_eq!(coord.view().inputs, inputs);

        // the first book after reconnecting starts a fresh interval
        coord.on_connect();
        coord.on_orderbook(two_sided("t2"));
        assert_eq!(coord.view().message_interval_ms, 0.0);
        assert_eq!(coord.outputs().timestamp, "t2");
    }

    #[test]
    fn test_message_interval_tracks_second_book() {
        let mut coord = coordinator();
        coord.on_orderbook(two_sided("t1"));
        assert_eq!(coord.view().message_interval_ms, 0.0);

        std::thread::sleep(std::time::Duration::from_millis(3));
        coord.on_orderbook(two_sided("t2"));
        assert!(coord.view().message_interval_ms >= 2.0);
    }

    #[test]
    fn test_view_shares_book() {
        let mut coord = coordinator();
        coord.on_orderbook(two_sided("t1"));
        let view = coord.view();
        assert!(Arc::ptr_eq(
            view.orderbook.as_ref().unwrap(),
            coord.orderbook.as_ref().unwrap()
        ));
    }
}
