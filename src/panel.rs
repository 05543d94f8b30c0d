// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Pricing Simulation Panel - Panel
//
// One operator's panel: the configuration, the client and the last list of
// validation errors. Nothing here is shared between panels.

use std::cell::RefCell;

use tracing::debug;

use crate::builder::{self, ValidationError};
use crate::client::{
    ClientStatus, Detached, EngineReply, RunOutcome, RunTicket, SimulationClient, Transport,
    TransportError,
};
use crate::config::{ConfigError, FieldPath, PackageId, PanelConfig};
use crate::types::{Mode, SimulationRequest};

#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    #[error("{} field(s) need attention", .0.len())]
    Invalid(Vec<ValidationError>),
    #[error("could not encode request: {0}")]
    Encode(#[from] serde_json::Error),
}

/// A started run whose body the host will deliver itself.
#[derive(Debug, Clone)]
pub struct PreparedRun {
    pub ticket: RunTicket,
    pub body: Vec<u8>,
}

pub struct PricingPanel<T = Detached> {
    transport: T,
    config: RefCell<PanelConfig>,
    client: SimulationClient,
    errors: RefCell<Vec<ValidationError>>,
}

impl Default for PricingPanel<Detached> {
    fn default() -> Self {
        Self::new(Detached)
    }
}

impl<T: Transport> PricingPanel<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            config: RefCell::new(PanelConfig::defaults()),
            client: SimulationClient::new(),
            errors: RefCell::new(Vec::new()),
        }
    }

    /// Snapshot of the current configuration.
    pub fn config(&self) -> PanelConfig {
        self.config.borrow().clone()
    }

    pub fn update(&self, f: impl FnOnce(&PanelConfig) -> PanelConfig) {
        let next = f(&self.config.borrow());
        *self.config.borrow_mut() = next;
    }

    pub fn try_update(
        &self,
        f: impl FnOnce(&PanelConfig) -> Result<PanelConfig, ConfigError>,
    ) -> Result<(), ConfigError> {
        let next = f(&self.config.borrow())?;
        *self.config.borrow_mut() = next;
        Ok(())
    }

    pub fn set_field(&self, key: &str, value: &str) -> Result<(), ConfigError> {
        let path = FieldPath::parse(key)?;
        self.try_update(|cfg| cfg.set_field(&path, value))
    }

    /// Append a package and return its id.
    pub fn add_package(&self) -> PackageId {
        self.update(PanelConfig::add_package);
        let cfg = self.config.borrow();
        cfg.packages().last().map_or(PackageId(0), |p| p.id)
    }

    pub fn remove_package(&self, index: usize) -> Result<(), ConfigError> {
        self.try_update(|cfg| cfg.remove_package(index))
    }

    pub fn set_mode(&self, mode: Mode) {
        self.update(|cfg| cfg.set_mode(mode));
    }

    pub fn build_request(&self) -> Result<SimulationRequest, Vec<ValidationError>> {
        builder::build(&self.config.borrow())
    }

    /// Errors from the last submission attempt.
    pub fn validation_errors(&self) -> Vec<ValidationError> {
        self.errors.borrow().clone()
    }

    pub fn status(&self) -> ClientStatus {
        self.client.status()
    }

    pub fn client(&self) -> &SimulationClient {
        &self.client
    }

    /// Validate and store the outcome. A rejected configuration never reaches
    /// the transport and clears any earlier failure banner.
    fn validate(&self) -> Result<SimulationRequest, Vec<ValidationError>> {
        let built = self.build_request();
        match &built {
            Ok(_) => self.errors.borrow_mut().clear(),
            Err(errors) => {
                debug!(count = errors.len(), "submission blocked");
                *self.errors.borrow_mut() = errors.clone();
                self.client.dismiss_failure();
            }
        }
        built
    }

    /// Validate, then run through this panel's transport.
    pub async fn submit(&self) -> Result<RunOutcome, Vec<ValidationError>> {
        let request = self.validate()?;
        Ok(self.client.run(&self.transport, &request).await)
    }

    /// Validate and start a run whose body the host delivers. Finish it with
    /// [`complete`](Self::complete).
    pub fn prepare(&self) -> Result<PreparedRun, SubmitError> {
        let request = self.validate().map_err(SubmitError::Invalid)?;
        let body = request.to_body()?;
        let ticket = self.client.begin(&request);
        Ok(PreparedRun { ticket, body })
    }

    pub fn complete(&self, sequence: u64, reply: Result<EngineReply, TransportError>) -> RunOutcome {
        self.client.resolve_sequence(sequence, reply)
    }

    /// Back to a fresh default configuration with an idle client. Any pending
    /// run is abandoned.
    pub fn reset(&self) {
        *self.config.borrow_mut() = PanelConfig::defaults();
        self.errors.borrow_mut().clear();
        self.client.cancel();
        debug!("panel reset");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::ValidationReason;
    use std::cell::Cell;

    /// Counts calls and answers every one with the same canned body.
    struct Canned {
        calls: Cell<usize>,
        reply: EngineReply,
    }

    impl Canned {
        fn new(profit: f64) -> Self {
            let body = serde_json::json!({
                "expected_profit": profit,
                "variance": 0.0,
                "confidence_interval": { "lower": profit, "upper": profit },
                "risk_adjusted_profit": profit
            });
            Self {
                calls: Cell::new(0),
                reply: EngineReply::ok(body.to_string()),
            }
        }
    }

    impl Transport for Canned {
        async fn post(&self, _operation: Mode, _body: Vec<u8>) -> Result<EngineReply, TransportError> {
            self.calls.set(self.calls.get() + 1);
            Ok(self.reply.clone())
        }
    }

    #[tokio::test]
    async fn test_submit_success() {
        let panel = PricingPanel::new(Canned::new(5.0));
        let outcome = panel.submit().await.unwrap();
        assert!(matches!(outcome, RunOutcome::Success(_)));
        assert_eq!(panel.status().view().unwrap().result.expected_profit, 5.0);
        assert!(panel.validation_errors().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_submit_makes_no_call() {
        let panel = PricingPanel::new(Canned::new(5.0));
        panel.set_mode(Mode::Optimize);
        panel.set_field("price_min", "500").unwrap();
        panel.set_field("price_max", "10").unwrap();

        let errors = panel.submit().await.unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "price_range");
        assert_eq!(errors[0].reason, ValidationReason::InvertedRange);
        assert_eq!(panel.transport.calls.get(), 0);
        assert_eq!(panel.validation_errors(), errors);
        assert_eq!(panel.status(), ClientStatus::Idle);
    }

    #[test]
    fn test_failed_run_leaves_config_resubmittable() {
        let panel = PricingPanel::default();
        panel.set_field("beta_price", "0.08").unwrap();
        let before = panel.config();

        let run = panel.prepare().unwrap();
        panel.complete(run.ticket.sequence, Err(TransportError("offline".into())));
        assert!(panel.status().failure().is_some());
        assert_eq!(panel.config(), before);
        assert!(panel.prepare().is_ok());
    }

    #[test]
    fn test_validation_failure_dismisses_banner() {
        let panel = PricingPanel::default();
        let run = panel.prepare().unwrap();
        panel.complete(run.ticket.sequence, Err(TransportError("offline".into())));
        assert!(panel.status().failure().is_some());

        panel.set_field("N0", "").unwrap();
        assert!(matches!(panel.prepare(), Err(SubmitError::Invalid(_))));
        assert_eq!(panel.status(), ClientStatus::Idle);
    }

    #[test]
    fn test_reset_is_idempotent() {
        let panel = PricingPanel::default();
        panel.set_mode(Mode::Optimize);
        panel.add_package();
        panel.set_field("seed", "7").unwrap();
        let pending = panel.prepare().unwrap();

        panel.reset();
        assert_eq!(panel.config(), PanelConfig::defaults());
        assert_eq!(panel.status(), ClientStatus::Idle);
        assert!(panel.validation_errors().is_empty());

        // A reply for the abandoned run cannot resurrect it.
        let late = panel.complete(pending.ticket.sequence, Ok(EngineReply::ok("{}")));
        assert_eq!(late, RunOutcome::Discarded);

        panel.reset();
        assert_eq!(panel.config(), PanelConfig::defaults());
        assert_eq!(panel.status(), ClientStatus::Idle);
    }

    #[test]
    fn test_portfolio_edits() {
        let panel = PricingPanel::default();
        let id = panel.add_package();
        assert_eq!(id, PackageId(1));
        panel.set_field(&format!("packages[{}].label", id), "Night").unwrap();
        assert_eq!(panel.config().packages()[1].label, "Night");

        panel.remove_package(1).unwrap();
        assert!(panel.remove_package(0).is_err());
        assert_eq!(panel.config().packages().len(), 1);
        assert!(matches!(panel.set_field("nope", "1"), Err(ConfigError::UnknownField(_))));
    }
}
