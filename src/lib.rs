// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Pricing Simulation Panel

pub mod types;
pub mod shares;
pub mod config;
pub mod builder;
pub mod client;
pub mod adapter;
pub mod chart;
pub mod panel;

// Native transports
#[cfg(not(target_arch = "wasm32"))]
pub mod http;
#[cfg(not(target_arch = "wasm32"))]
pub mod synthetic;

pub use types::*;
pub use adapter::{normalize, AdapterError};
pub use builder::{build, ValidationError, ValidationReason};
pub use chart::PlotFrame;
pub use client::{
    ClientError, ClientStatus, Detached, EngineReply, RunOutcome, RunTicket, SimulationClient,
    Transport, TransportError,
};
pub use config::{ConfigError, FieldPath, PackageId, PanelConfig};
pub use panel::{PreparedRun, PricingPanel, SubmitError};

use serde::Serialize;
use wasm_bindgen::prelude::*;

#[cfg(target_arch = "wasm32")]
#[wasm_bindgen]
extern "C" {
    #[wasm_bindgen(js_namespace = console)]
    fn log(s: &str);
}

fn report(msg: &str) {
    #[cfg(target_arch = "wasm32")]
    log(msg);
    #[cfg(not(target_arch = "wasm32"))]
    tracing::info!("{}", msg);
}

fn to_js<T: Serialize + ?Sized>(value: &T) -> JsValue {
    serde_wasm_bindgen::to_value(value).unwrap_or(JsValue::NULL)
}

// ─── WASM Interface ──────────────────────────────────────────────────────────

#[derive(Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
enum Submission {
    Started {
        sequence: u64,
        mode: Mode,
        operation: &'static str,
        body: String,
    },
    Invalid {
        errors: Vec<ValidationError>,
    },
    Failed {
        message: String,
    },
}

/// Browser-facing panel. The page performs the fetch: `prepare_submit`
/// hands out the body and sequence number, `complete_submit` hands the reply
/// back, and stale replies are dropped on this side.
#[wasm_bindgen]
pub struct WasmPanel {
    inner: PricingPanel,
}

impl Default for WasmPanel {
    fn default() -> Self {
        Self::new()
    }
}

#[wasm_bindgen]
impl WasmPanel {
    #[wasm_bindgen(constructor)]
    pub fn new() -> Self {
        #[cfg(target_arch = "wasm32")]
        std::panic::set_hook(Box::new(console_error_panic_hook::hook));

        Self { inner: PricingPanel::default() }
    }

    // ── Configuration ──────────────────────────────────────────────────────

    pub fn config(&self) -> JsValue {
        to_js(&self.inner.config())
    }

    pub fn set_field(&self, key: &str, value: &str) -> Result<(), JsError> {
        Ok(self.inner.set_field(key, value)?)
    }

    /// Appends a package and returns its id.
    pub fn add_package(&self) -> u32 {
        self.inner.add_package().0
    }

    pub fn remove_package(&self, index: usize) -> Result<(), JsError> {
        Ok(self.inner.remove_package(index)?)
    }

    pub fn set_mode(&self, mode: &str) -> Result<(), JsError> {
        let mode = Mode::parse(mode).ok_or_else(|| JsError::new("mode must be simulate or optimize"))?;
        self.inner.set_mode(mode);
        Ok(())
    }

    pub fn validation_errors(&self) -> JsValue {
        to_js(&self.inner.validation_errors())
    }

    pub fn reset(&self) {
        self.inner.reset();
    }

    // ── Runs ───────────────────────────────────────────────────────────────

    pub fn prepare_submit(&self) -> JsValue {
        let submission = match self.inner.prepare() {
            Ok(run) => Submission::Started {
                sequence: run.ticket.sequence,
                mode: run.ticket.mode,
                operation: run.ticket.operation,
                body: String::from_utf8_lossy(&run.body).into_owned(),
            },
            Err(SubmitError::Invalid(errors)) => Submission::Invalid { errors },
            Err(e) => Submission::Failed { message: e.to_string() },
        };
        to_js(&submission)
    }

    /// Hand back the engine's reply for `sequence`.
    pub fn complete_submit(&self, sequence: u64, status: u16, body: &str) -> JsValue {
        let reply = EngineReply { status, body: body.as_bytes().to_vec() };
        self.finish(sequence, Ok(reply))
    }

    /// The fetch for `sequence` never produced a reply.
    pub fn fail_submit(&self, sequence: u64, message: &str) -> JsValue {
        self.finish(sequence, Err(TransportError(message.to_string())))
    }

    pub fn cancel(&self) {
        self.inner.client().cancel();
    }

    pub fn dismiss_failure(&self) {
        self.inner.client().dismiss_failure();
    }

    pub fn status(&self) -> JsValue {
        to_js(&self.inner.status())
    }

    // ── Chart data ─────────────────────────────────────────────────────────

    pub fn summary(&self) -> JsValue {
        self.with_view(|v| chart::summary_metrics(&v.result))
    }

    pub fn histogram(&self, width: f64, height: f64) -> JsValue {
        let frame = PlotFrame::new(width, height);
        self.with_view(|v| {
            chart::histogram_layout(&v.result.profit_hist_bins, &v.result.profit_hist_counts, frame)
        })
    }

    pub fn convergence(&self, width: f64, height: f64) -> JsValue {
        let frame = PlotFrame::new(width, height);
        self.with_view(|v| {
            let points = chart::convergence_curve(&v.result.convergence_data, frame);
            CurveJs { path: chart::curve_path(&points, frame), points }
        })
    }

    /// Best-so-far curve of the search; null outside optimize results.
    pub fn search_convergence(&self, width: f64, height: f64) -> JsValue {
        let frame = PlotFrame::new(width, height);
        self.with_view(|v| {
            v.trace.as_ref().map(|t| {
                let points = chart::convergence_curve(&t.convergence, frame);
                CurveJs { path: chart::curve_path(&points, frame), points }
            })
        })
    }

    pub fn sensitivity(&self) -> JsValue {
        self.with_view(|v| chart::sensitivity_bars(&v.result.sensitivity))
    }

    pub fn scatter(&self) -> JsValue {
        self.with_view(|v| {
            v.trace
                .as_ref()
                .map(|t| chart::scatter_points(t, Some(v.result.expected_profit)))
        })
    }

    pub fn periods(&self, width: f64, height: f64) -> JsValue {
        let frame = PlotFrame::new(width, height);
        self.with_view(|v| chart::period_breakdown(&v.result.period_profits, frame))
    }

    pub fn offers(&self) -> JsValue {
        self.with_view(|v| chart::offer_ranking(&v.result.offers))
    }
}

#[derive(Serialize)]
struct CurveJs {
    points: Vec<chart::CurvePoint>,
    path: String,
}

impl WasmPanel {
    fn finish(&self, sequence: u64, reply: Result<EngineReply, TransportError>) -> JsValue {
        let outcome = self.inner.complete(sequence, reply);
        match &outcome {
            RunOutcome::Discarded => report(&format!("run #{} superseded; reply dropped", sequence)),
            RunOutcome::Failed(msg) => report(&format!("run #{} failed: {}", sequence, msg)),
            RunOutcome::Success(_) => {}
        }
        to_js(&outcome)
    }

    fn with_view<R: Serialize>(&self, f: impl FnOnce(&CanonicalView) -> R) -> JsValue {
        let status = self.inner.status();
        match status.view() {
            Some(view) => to_js(&f(view.as_ref())),
            None => JsValue::NULL,
        }
    }
}
