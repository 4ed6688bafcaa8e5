//! Orchestrator for one bridge session
//!
//! Handles:
//! - Validating the plan and recording rollback state before any mutation
//! - Running setup in a fixed order, stopping at the first failure
//! - Parking until a termination signal arrives
//! - Tearing everything down exactly once, in reverse order

use crate::capture::{CaptureSupervisor, StopReport};
use crate::error::{Error, Result};
use crate::lifecycle::plan::{MacChoice, Plan};
use crate::lifecycle::session::{Finalizer, SessionState, SpoofRecord};
use crate::lifecycle::signals::Termination;
use crate::lifecycle::state::{Lifecycle, Phase};
use crate::network::bridge::BridgeController;
use crate::network::inventory::Inventory;
use crate::network::link::LinkControl;
use crate::network::mac::{self, MacManager};
use std::fmt;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Setup steps in the order they run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetupStep {
    ClearPrevious,
    DetachMembers,
    CreateBridge,
    AttachMembers,
    BridgeUp,
    AssignAddress,
    SpoofMac,
    StartCaptures,
}

impl fmt::Display for SetupStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SetupStep::ClearPrevious => "clear previous bridge",
            SetupStep::DetachMembers => "detach members from old masters",
            SetupStep::CreateBridge => "create bridge",
            SetupStep::AttachMembers => "attach members",
            SetupStep::BridgeUp => "bring bridge up",
            SetupStep::AssignAddress => "assign bridge address",
            SetupStep::SpoofMac => "spoof hardware address",
            SetupStep::StartCaptures => "start captures",
        };
        write!(f, "{}", s)
    }
}

/// Outcome of each teardown step
#[derive(Debug)]
pub struct TeardownReport {
    /// One entry per capture session that was running
    pub captures: Vec<StopReport>,
    /// Restoring the original MAC, if it had been touched
    pub mac: Option<Result<()>>,
    /// Deleting the bridge
    pub bridge: Result<()>,
}

impl TeardownReport {
    fn empty() -> Self {
        Self {
            captures: Vec::new(),
            mac: None,
            bridge: Ok(()),
        }
    }

    /// Whether every step completed without error
    pub fn is_clean(&self) -> bool {
        self.captures
            .iter()
            .all(|c| matches!(&c.result, Ok(outcome) if outcome.is_clean()))
            && !matches!(self.mac, Some(Err(_)))
            && self.bridge.is_ok()
    }
}

/// Drives one session from configuration to termination
pub struct Orchestrator<L: LinkControl> {
    links: L,
    supervisor: CaptureSupervisor,
    lifecycle: Lifecycle,
    finalizer: Finalizer,
    plan: Option<Plan>,
    state: Option<SessionState>,
    /// Setup steps that were started, successful or not
    reached: Vec<SetupStep>,
}

impl<L: LinkControl> Orchestrator<L> {
    pub fn new(links: L, supervisor: CaptureSupervisor) -> Self {
        Self {
            links,
            supervisor,
            lifecycle: Lifecycle::new(),
            finalizer: Finalizer::new(),
            plan: None,
            state: None,
            reached: Vec::new(),
        }
    }

    pub fn phase(&self) -> Phase {
        self.lifecycle.phase()
    }

    pub fn state(&self) -> Option<&SessionState> {
        self.state.as_ref()
    }

    /// Steps started so far
    #[cfg(test)]
    pub fn reached(&self) -> &[SetupStep] {
        &self.reached
    }

    /// Enter Configuring: validate the plan and write the rollback record
    ///
    /// Only reads from the host; a failure here leaves nothing to undo.
    pub fn configure(&mut self, plan: Plan) -> Result<()> {
        self.lifecycle
            .configure()
            .map_err(|e| Error::Lifecycle(format!("configure from {}: {:?}", self.phase(), e)))?;

        plan.validate()?;

        let inventory = Inventory::scan(&self.links)?;
        inventory.lookup(&plan.first)?;
        inventory.lookup(&plan.second)?;
        for capture in &plan.captures {
            if capture.interface != plan.bridge {
                inventory.lookup(&capture.interface)?;
            }
        }

        let spoof = match plan.spoof_interface() {
            None => None,
            Some(iface) => {
                let original = MacManager::new(&self.links).read(iface)?;
                let replacement = match plan.mac {
                    MacChoice::Fixed(fixed) => fixed,
                    _ => mac::generate(),
                };
                info!(
                    interface = iface,
                    original = %original,
                    replacement = %replacement,
                    "hardware address will be replaced"
                );
                Some(SpoofRecord {
                    interface: iface.to_string(),
                    original,
                    replacement,
                })
            }
        };

        self.state = Some(SessionState::new(plan.bridge.clone(), spoof));
        self.plan = Some(plan);
        Ok(())
    }

    /// Apply the plan and enter Running
    ///
    /// On failure forward progress stops, teardown runs immediately, and the
    /// error that stopped setup is returned.
    pub fn setup(&mut self) -> Result<()> {
        if self.phase() != Phase::Configuring || self.state.is_none() {
            return Err(Error::Lifecycle(format!("setup while {}", self.phase())));
        }

        match self.apply_plan() {
            Ok(()) => {
                self.lifecycle
                    .run()
                    .map_err(|e| Error::Lifecycle(format!("run: {:?}", e)))?;
                info!("bridge session running");
                Ok(())
            }
            Err(e) => {
                let step = self.reached.last().copied();
                error!(step = ?step, error = %e, "setup failed, rolling back");
                self.teardown();
                Err(e)
            }
        }
    }

    fn apply_plan(&mut self) -> Result<()> {
        let plan = self
            .plan
            .as_ref()
            .ok_or_else(|| Error::Lifecycle("setup without a plan".to_string()))?;
        let state = self
            .state
            .as_mut()
            .ok_or_else(|| Error::Lifecycle("setup without session state".to_string()))?;
        let reached = &mut self.reached;
        let bridges = BridgeController::new(&self.links);
        let macs = MacManager::new(&self.links);

        let mut begin = |step: SetupStep| {
            info!(step = %step, "setup");
            reached.push(step);
        };

        begin(SetupStep::ClearPrevious);
        bridges.ensure_absent(&plan.bridge)?;

        begin(SetupStep::DetachMembers);
        bridges.detach_from_any_master(&plan.first)?;
        bridges.detach_from_any_master(&plan.second)?;

        begin(SetupStep::CreateBridge);
        bridges.create(&plan.bridge)?;

        begin(SetupStep::AttachMembers);
        bridges.attach(&plan.bridge, &plan.first)?;
        bridges.attach(&plan.bridge, &plan.second)?;

        begin(SetupStep::BridgeUp);
        bridges.bring_up(&plan.bridge)?;

        if let Some(address) = &plan.address {
            begin(SetupStep::AssignAddress);
            bridges.assign_address(&plan.bridge, address)?;
        }

        if let Some(spoof) = state.spoof().cloned() {
            begin(SetupStep::SpoofMac);
            macs.apply(&spoof.interface, &spoof.replacement)?;
        }

        if !plan.captures.is_empty() {
            begin(SetupStep::StartCaptures);
            for request in &plan.captures {
                let session = self.supervisor.start(request.clone())?;
                state.push_capture(session);
            }
        }

        Ok(())
    }

    /// Park until the first termination signal, then tear down
    ///
    /// Deliveries that queued up behind the first are drained and ignored.
    pub async fn wait_for_termination(
        &mut self,
        signals: &mut mpsc::UnboundedReceiver<Termination>,
    ) -> Option<TeardownReport> {
        if self.phase() != Phase::Running {
            return None;
        }

        match signals.recv().await {
            Some(reason) => info!(signal = %reason, "termination requested"),
            None => warn!("signal channel closed, shutting down"),
        }

        let report = self.teardown();

        while let Ok(extra) = signals.try_recv() {
            debug!(signal = %extra, "teardown already done, ignoring");
        }

        report
    }

    /// Undo the session: stop captures, restore the MAC, delete the bridge
    ///
    /// Runs at most once; later calls return `None`. Every step is attempted
    /// even when an earlier one fails.
    pub fn teardown(&mut self) -> Option<TeardownReport> {
        if !self.finalizer.fire() {
            debug!("teardown already ran");
            return None;
        }

        if self.phase() == Phase::Idle {
            return Some(TeardownReport::empty());
        }
        if let Err(e) = self.lifecycle.teardown() {
            warn!(error = ?e, "unexpected lifecycle state at teardown");
        }

        let Some(state) = self.state.as_mut() else {
            let _ = self.lifecycle.terminate();
            return Some(TeardownReport::empty());
        };
        info!(bridge = state.bridge(), "tearing down");

        let captures = self.supervisor.stop_all(state.take_captures());

        let mac = if self.reached.contains(&SetupStep::SpoofMac) {
            state.spoof().map(|spoof| {
                info!(
                    interface = %spoof.interface,
                    mac = %spoof.original,
                    "restoring hardware address"
                );
                let result = MacManager::new(&self.links).apply(&spoof.interface, &spoof.original);
                if let Err(e) = &result {
                    warn!(
                        interface = %spoof.interface,
                        error = %e,
                        "failed to restore hardware address"
                    );
                }
                result
            })
        } else {
            None
        };

        // A bridge of this name is only ours once setup began
        let bridge = if self.reached.is_empty() {
            Ok(())
        } else {
            let result = BridgeController::new(&self.links).destroy(state.bridge());
            if let Err(e) = &result {
                warn!(bridge = state.bridge(), error = %e, "failed to delete bridge");
            }
            result
        };

        if let Err(e) = self.lifecycle.terminate() {
            warn!(error = ?e, "unexpected lifecycle state after teardown");
        }

        let report = TeardownReport {
            captures,
            mac,
            bridge,
        };
        if report.is_clean() {
            info!("teardown complete");
        } else {
            warn!("teardown finished with errors");
        }
        Some(report)
    }
}

impl<L: LinkControl> Drop for Orchestrator<L> {
    fn drop(&mut self) {
        if matches!(self.phase(), Phase::Configuring | Phase::Running) {
            self.teardown();
        }
    }
}
