//! Lifecycle state machine
//!
//! Type-safe state machine for the bridge session using the state-machines crate.
//! Uses dynamic dispatch mode so the orchestrator can drive it from runtime events.

use state_machines::state_machine;

state_machine! {
    name: LifecycleMachine,
    dynamic: true,
    initial: Idle,
    states: [Idle, Configuring, Running, TearingDown, Terminated],
    events {
        configure {
            transition: { from: Idle, to: Configuring }
        }
        run {
            transition: { from: Configuring, to: Running }
        }
        teardown {
            transition: { from: [Configuring, Running], to: TearingDown }
        }
        terminate {
            transition: { from: TearingDown, to: Terminated }
        }
    }
}

/// Simple state enum for external use
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Configuring,
    Running,
    TearingDown,
    Terminated,
}

impl Phase {
    /// Parse phase from the machine's state name
    pub fn from_name(s: &str) -> Self {
        match s {
            "Configuring" => Phase::Configuring,
            "Running" => Phase::Running,
            "TearingDown" => Phase::TearingDown,
            "Terminated" => Phase::Terminated,
            _ => Phase::Idle,
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Phase::Idle => "idle",
            Phase::Configuring => "configuring",
            Phase::Running => "running",
            Phase::TearingDown => "tearing down",
            Phase::Terminated => "terminated",
        };
        write!(f, "{}", s)
    }
}

/// Lifecycle state wrapper around the dynamic machine
pub struct Lifecycle {
    machine: DynamicLifecycleMachine<()>,
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl Lifecycle {
    pub fn new() -> Self {
        Self {
            machine: LifecycleMachine::new(()).into_dynamic(),
        }
    }

    pub fn phase(&self) -> Phase {
        Phase::from_name(self.machine.current_state())
    }

    pub fn configure(&mut self) -> Result<(), state_machines::DynamicError> {
        self.machine.handle(LifecycleMachineEvent::Configure)
    }

    pub fn run(&mut self) -> Result<(), state_machines::DynamicError> {
        self.machine.handle(LifecycleMachineEvent::Run)
    }

    pub fn teardown(&mut self) -> Result<(), state_machines::DynamicError> {
        self.machine.handle(LifecycleMachineEvent::Teardown)
    }

    pub fn terminate(&mut self) -> Result<(), state_machines::DynamicError> {
        self.machine.handle(LifecycleMachineEvent::Terminate)
    }
}
