//! Function-pointer finite state machine engine for the ignition sequence.
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  StateTable                                                       │
//! │  ┌──────────┬──────────┬─────────┬──────────────┬──────────────┐  │
//! │  │ Phase    │ on_enter │ on_exit │ on_input     │ on_poll      │  │
//! │  ├──────────┼──────────┼─────────┼──────────────┼──────────────┤  │
//! │  │ Off      │ fn(ctx)  │ -       │ fn->Option<> │ -            │  │
//! │  │ On       │ fn(ctx)  │ -       │ fn->Option<> │ -            │  │
//! │  │ Glow     │ fn(ctx)  │ -       │ fn->Option<> │ fn->Option<> │  │
//! │  │ Start    │ fn(ctx)  │ fn(ctx) │ fn->Option<> │ fn->Option<> │  │
//! │  │ ...      │          │         │              │              │  │
//! │  └──────────┴──────────┴─────────┴──────────────┴──────────────┘  │
//! └───────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Each tick, in order:
//!
//! 1. key OFF forces the `Off` phase (highest priority);
//! 2. a pending emergency stop is consumed;
//! 3. a pending lights toggle is consumed;
//! 4. `on_input` runs if the input signature (phase, key, hold) differs
//!    from the one seen on the previous tick;
//! 5. `on_poll` runs for the (possibly new) current phase;
//! 6. glow expiry is enforced regardless of phase.
//!
//! Handlers are plain functions of `&mut FsmContext`.  They write relay
//! effects into `ctx.relays`; nothing here touches hardware.

pub mod context;
pub mod states;

use context::{FsmContext, KeyPosition};
use log::info;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Phase identity
// ---------------------------------------------------------------------------

/// Canonical engine phase.
/// Must stay in sync with the table built in [`states::build_state_table`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum EnginePhase {
    Off = 0,
    On = 1,
    Glow = 2,
    Start = 3,
    Running = 4,
    LowOilPressure = 5,
    HighTemperature = 6,
    Error = 7,
}

impl EnginePhase {
    /// Total number of phases, used to size the table array.
    pub const COUNT: usize = 8;

    pub const ALL: [Self; Self::COUNT] = [
        Self::Off,
        Self::On,
        Self::Glow,
        Self::Start,
        Self::Running,
        Self::LowOilPressure,
        Self::HighTemperature,
        Self::Error,
    ];

    /// Convert a table index back to `EnginePhase`.  Out-of-range indices
    /// assert in debug builds and fall back to `Error`.
    pub fn from_index(idx: usize) -> Self {
        match Self::ALL.get(idx) {
            Some(p) => *p,
            None => {
                debug_assert!(false, "invalid phase index: {idx}");
                Self::Error
            }
        }
    }

    /// Symbolic name used in status reports and logs.
    pub fn name(self) -> &'static str {
        match self {
            Self::Off => "OFF",
            Self::On => "ON",
            Self::Glow => "GLOW",
            Self::Start => "START",
            Self::Running => "RUNNING",
            Self::LowOilPressure => "LOW_OIL_PRESSURE",
            Self::HighTemperature => "HIGH_TEMPERATURE",
            Self::Error => "ERROR",
        }
    }

    /// Non-fatal alert or critical error phase.
    pub fn is_alert(self) -> bool {
        matches!(
            self,
            Self::LowOilPressure | Self::HighTemperature | Self::Error
        )
    }
}

// ---------------------------------------------------------------------------
// Function-pointer type aliases
// ---------------------------------------------------------------------------

/// Signature for `on_enter` and `on_exit` actions.
pub type StateActionFn = fn(&mut FsmContext);

/// Signature for input and poll handlers.
/// Returns `Some(next)` to trigger a transition, or `None` to stay.
pub type StateUpdateFn = fn(&mut FsmContext) -> Option<EnginePhase>;

// ---------------------------------------------------------------------------
// State descriptor (one row in the table)
// ---------------------------------------------------------------------------

/// Static descriptor for a single phase.
pub struct StateDescriptor {
    pub id: EnginePhase,
    pub name: &'static str,
    pub on_enter: Option<StateActionFn>,
    pub on_exit: Option<StateActionFn>,
    /// Key-driven transitions; run only when the input signature changed.
    pub on_input: StateUpdateFn,
    /// Time-driven checks; run every tick.
    pub on_poll: Option<StateUpdateFn>,
}

/// The inputs whose change triggers key-driven re-evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct InputSignature {
    phase: EnginePhase,
    key: KeyPosition,
    start_held: bool,
}

// ---------------------------------------------------------------------------
// FSM engine
// ---------------------------------------------------------------------------

pub struct Fsm {
    /// Fixed-size table indexed by `EnginePhase as usize`.
    table: [StateDescriptor; EnginePhase::COUNT],
    /// Index of the current phase.
    current: usize,
    tick_count: u64,
    /// Signature evaluated on the previous tick.
    last_seen: Option<InputSignature>,
}

impl Fsm {
    pub fn new(table: [StateDescriptor; EnginePhase::COUNT], initial: EnginePhase) -> Self {
        Self {
            table,
            current: initial as usize,
            tick_count: 0,
            last_seen: None,
        }
    }

    /// Run the initial `on_enter` for the starting phase.
    /// Call once after construction, before the first `tick()`.
    pub fn start(&mut self, ctx: &mut FsmContext) {
        info!("FSM starting in phase: {}", self.table[self.current].name);
        if let Some(enter) = self.table[self.current].on_enter {
            enter(ctx);
        }
    }

    /// Advance the machine by one evaluation at `ctx.now`.
    pub fn tick(&mut self, ctx: &mut FsmContext) {
        self.tick_count += 1;

        // 1. Key OFF overrides everything, including pending edge flags.
        if ctx.key == KeyPosition::Off {
            ctx.emergency_stop = false;
            ctx.lights_toggles = 0;
            self.force_transition(EnginePhase::Off, ctx);
            states::off_baseline(ctx);
        }

        // 2. Emergency stop.
        if core::mem::take(&mut ctx.emergency_stop) {
            if let Some(next) = states::emergency_stop(ctx, self.current_state()) {
                self.force_transition(next, ctx);
            }
        }

        // 3. Lights toggle; an even number of presses cancels out.
        if core::mem::take(&mut ctx.lights_toggles) % 2 == 1 {
            states::toggle_lights(ctx, self.current_state());
        }

        // 4. Key-driven dispatch on change.
        let sig = InputSignature {
            phase: self.current_state(),
            key: ctx.key,
            start_held: ctx.start_held,
        };
        ctx.inputs_changed = self.last_seen != Some(sig);
        self.last_seen = Some(sig);
        if ctx.inputs_changed {
            if let Some(next) = (self.table[self.current].on_input)(ctx) {
                self.transition(next, ctx);
            }
        }

        // 5. Time-driven checks for whatever phase we are in now.
        if let Some(poll) = self.table[self.current].on_poll {
            if let Some(next) = poll(ctx) {
                self.transition(next, ctx);
            }
        }

        // 6. Glow expiry holds in every phase.
        states::expire_glow(ctx);
    }

    /// Force an immediate transition (override start, low-battery policy,
    /// bench commands).  No-op if already in `next`.
    pub fn force_transition(&mut self, next: EnginePhase, ctx: &mut FsmContext) {
        if next as usize != self.current {
            self.transition(next, ctx);
        }
    }

    /// Return to the boot baseline: phase OFF, key OFF, everything idle.
    pub fn reset(&mut self, ctx: &mut FsmContext) {
        ctx.key = KeyPosition::Off;
        ctx.start_held = false;
        ctx.emergency_stop = false;
        ctx.lights_toggles = 0;
        self.force_transition(EnginePhase::Off, ctx);
        // Re-run the OFF entry even if we were already there.
        states::off_baseline(ctx);
        self.last_seen = None;
    }

    pub fn current_state(&self) -> EnginePhase {
        EnginePhase::from_index(self.current)
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    // -----------------------------------------------------------------------
    // Internal
    // -----------------------------------------------------------------------

    fn transition(&mut self, next_id: EnginePhase, ctx: &mut FsmContext) {
        let next_idx = next_id as usize;

        info!(
            "FSM transition: {} -> {}",
            self.table[self.current].name, self.table[next_idx].name
        );

        if let Some(exit) = self.table[self.current].on_exit {
            exit(ctx);
        }

        self.current = next_idx;

        if let Some(enter) = self.table[self.current].on_enter {
            enter(ctx);
        }
    }
}
