//! Shared sensor machinery: the [`Sensor`] capability set, trace bookkeeping,
//! the uniform noise model and the single-slot read cache.

use crate::config::SensorNode;
use crate::engine::{BodyId, PhysicsEngine, TraceShape};
use crate::error::{BindingError, EngineError};
use tracing::trace;

/// Largest raw reading of an analog channel (12-bit ADC).
pub const ANALOG_MAX: u16 = 4095;

/// State every sensor carries: its debug trace, mode flags and noise source.
#[derive(Debug)]
pub struct SensorBase {
    name: String,
    trace: BodyId,
    visible: bool,
    realistic: bool,
    noisy: bool,
    disposed: bool,
    rng: fastrand::Rng,
}

impl SensorBase {
    /// Resolves the parent link of `node` and creates its (hidden) trace.
    pub fn attach(
        engine: &mut dyn PhysicsEngine,
        node: &SensorNode,
        shape: TraceShape,
    ) -> Result<Self, BindingError> {
        let parent = engine
            .resolve_link(&node.parent_link)
            .ok_or_else(|| BindingError::MissingLink(node.parent_link.clone()))?;
        let trace = engine
            .create_trace(parent, node.origin, shape)
            .map_err(|source| BindingError::Geometry {
                node: node.name.clone(),
                source,
            })?;

        let rng = match node.noise_seed {
            Some(seed) => fastrand::Rng::with_seed(seed),
            None => fastrand::Rng::new(),
        };

        Ok(Self {
            name: node.name.clone(),
            trace,
            visible: false,
            realistic: false,
            noisy: false,
            disposed: false,
            rng,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn realistic(&self) -> bool {
        self.realistic
    }

    /// The engine body of this sensor's debug geometry.
    pub fn trace(&self) -> BodyId {
        self.trace
    }

    /// A uniform offset in `[-radius, radius)`, or zero when noise is off.
    ///
    /// Callers subtract the offset from the clean reading.
    pub fn noise_offset(&mut self, radius: f64) -> f64 {
        if !self.noisy {
            return 0.0;
        }
        (radius * self.rng.f64() * 2.0).floor() - radius
    }
}

/// A simulated sensor.
///
/// Implementors provide [`get_value`](Sensor::get_value) and access to their
/// [`SensorBase`]; the flag handling is shared.
pub trait Sensor: std::fmt::Debug {
    type Output: Copy;

    fn base(&self) -> &SensorBase;

    fn base_mut(&mut self) -> &mut SensorBase;

    /// Measures the scene now.
    fn get_value(&mut self, engine: &mut dyn PhysicsEngine) -> Result<Self::Output, EngineError>;

    fn visible(&self) -> bool {
        self.base().visible
    }

    /// Shows or hides the debug trace. The reading is unaffected.
    fn set_visible(&mut self, engine: &mut dyn PhysicsEngine, visible: bool) {
        let base = self.base_mut();
        if base.disposed || base.visible == visible {
            return;
        }
        base.visible = visible;
        engine.set_trace_visible(base.trace, visible);
    }

    fn realistic(&self) -> bool {
        self.base().realistic
    }

    fn set_realistic(&mut self, realistic: bool) {
        self.base_mut().realistic = realistic;
    }

    fn noisy(&self) -> bool {
        self.base().noisy
    }

    fn set_noisy(&mut self, noisy: bool) {
        self.base_mut().noisy = noisy;
    }

    /// Releases the trace. Further calls are no-ops.
    fn dispose(&mut self, engine: &mut dyn PhysicsEngine) {
        let base = self.base_mut();
        if base.disposed {
            return;
        }
        base.disposed = true;
        trace!(sensor = %base.name, trace = base.trace, "disposing sensor trace");
        engine.dispose_trace(base.trace);
    }
}

/// Where a [`ReadCache`] is in its read cycle.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ReadState<T> {
    /// No read outstanding.
    Idle,
    /// A read was issued and has not resolved.
    Pending,
    /// A read resolved; its value is adopted on the next poll.
    Ready(T),
}

/// Coalesces sensor reads to at most one outstanding read.
///
/// The reported value is the last *adopted* read, so readings lag the scene
/// by at least one poll.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ReadCache<T> {
    state: ReadState<T>,
    latest: T,
}

impl<T: Copy> ReadCache<T> {
    /// A cache that reports `initial` until the first read is adopted.
    pub fn new(initial: T) -> Self {
        Self {
            state: ReadState::Idle,
            latest: initial,
        }
    }

    pub fn state(&self) -> ReadState<T> {
        self.state
    }

    /// The value to report this tick.
    pub fn latest(&self) -> T {
        self.latest
    }

    /// Adopts a resolved read. Returns whether a new read may be issued.
    pub fn poll(&mut self) -> bool {
        match self.state {
            ReadState::Idle => true,
            ReadState::Pending => false,
            ReadState::Ready(value) => {
                self.latest = value;
                self.state = ReadState::Idle;
                true
            }
        }
    }

    /// Marks a read as outstanding.
    pub fn issue(&mut self) {
        self.state = ReadState::Pending;
    }

    /// Completes the outstanding read.
    pub fn resolve(&mut self, value: T) {
        if matches!(self.state, ReadState::Pending) {
            self.state = ReadState::Ready(value);
        }
    }

    /// Drops the outstanding read so the next poll issues a fresh one.
    pub fn abandon(&mut self) {
        if matches!(self.state, ReadState::Pending) {
            self.state = ReadState::Idle;
        }
    }

    /// Runs one poll/issue cycle with a synchronous read and returns the value
    /// to report this tick.
    pub fn step<E>(&mut self, read: impl FnOnce() -> Result<T, E>) -> Result<T, E> {
        if self.poll() {
            self.issue();
            match read() {
                Ok(value) => self.resolve(value),
                Err(err) => {
                    self.abandon();
                    return Err(err);
                }
            }
        }
        Ok(self.latest)
    }
}
