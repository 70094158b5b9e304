//! # Simulated Host
//!
//! This crate provides an in-process implementation of every `hal` trait.
//!
//! ## Purpose
//!
//! The simulated host allows testing the platform layer without a window
//! system or sound card:
//! - Runs under `cargo test`
//! - Deterministic (audio periods advance only on [`SimulatedHost::tick`])
//! - Inspectable (presented frames, sink contents and capture state are
//!   all accessible)
//!
//! ## Philosophy
//!
//! **Testability is a first-class design constraint.**
//!
//! This is not a "toy" or "mock" - it's a full implementation of the host
//! backend contract that happens to run in-process. The event stream is
//! genuinely shared: a [`SimHostHandle`] can inject events from another
//! thread while the display thread blocks in `wait_event`.

pub mod audio;
pub mod display;
pub mod fault_injection;

use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex, MutexGuard};

use fault_injection::FaultInjector;
use hal::{EventSource, HostError, HostEvent, SampleFormat, UserEvent};

pub use audio::{SimSink, SinkMode};
pub use display::PresentedFrame;

/// Simulated host parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimHostConfig {
    /// Usable display size
    pub display_bounds: (u32, u32),
    /// Content size the host picks when a resizable surface is requested
    pub native_content: Option<(u32, u32)>,
    /// Surface rows are padded to a multiple of this many pixels
    pub stride_align: usize,
    /// Formats the sink can open without conversion
    pub exact_formats: Vec<SampleFormat>,
    /// Period the host imposes on stream sinks
    pub stream_frame_samples: Option<u32>,
}

impl Default for SimHostConfig {
    fn default() -> Self {
        Self {
            display_bounds: (1920, 1080),
            native_content: None,
            stride_align: 1,
            exact_formats: vec![SampleFormat::S16],
            stream_frame_samples: None,
        }
    }
}

impl SimHostConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_display_bounds(mut self, width: u32, height: u32) -> Self {
        self.display_bounds = (width, height);
        self
    }

    pub fn with_native_content(mut self, width: u32, height: u32) -> Self {
        self.native_content = Some((width, height));
        self
    }

    pub fn with_stride_align(mut self, align: usize) -> Self {
        self.stride_align = align.max(1);
        self
    }

    pub fn with_exact_formats(mut self, formats: Vec<SampleFormat>) -> Self {
        self.exact_formats = formats;
        self
    }

    pub fn with_stream_frame_samples(mut self, samples: u32) -> Self {
        self.stream_frame_samples = Some(samples);
        self
    }
}

#[derive(Debug, Default)]
struct EventState {
    events: VecDeque<HostEvent>,
    closed: bool,
}

#[derive(Debug, Default)]
struct SharedEvents {
    state: Mutex<EventState>,
    ready: Condvar,
}

impl SharedEvents {
    fn lock(&self) -> MutexGuard<'_, EventState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn push(&self, event: HostEvent) {
        self.lock().events.push_back(event);
        self.ready.notify_all();
    }
}

/// Cloneable, `Send` handle for injecting host events
///
/// Models the window system delivering input from outside the display thread.
#[derive(Debug, Clone)]
pub struct SimHostHandle {
    shared: Arc<SharedEvents>,
}

impl SimHostHandle {
    /// Appends one event to the host stream
    pub fn inject(&self, event: HostEvent) {
        self.shared.push(event);
    }

    /// Appends events in order
    pub fn inject_all(&self, events: impl IntoIterator<Item = HostEvent>) {
        let mut state = self.shared.lock();
        state.events.extend(events);
        drop(state);
        self.shared.ready.notify_all();
    }

    /// Closes the stream; a blocked or later `wait_event` on an empty
    /// stream reports [`HostError::Disconnected`]
    pub fn close(&self) {
        self.shared.lock().closed = true;
        self.shared.ready.notify_all();
    }

    /// Number of events not yet pumped
    pub fn pending(&self) -> usize {
        self.shared.lock().events.len()
    }
}

/// In-process host backend
pub struct SimulatedHost {
    config: SimHostConfig,
    shared: Arc<SharedEvents>,
    relative_pointer: bool,
    relative_transitions: usize,
    pub(crate) display: display::SimDisplay,
    pub(crate) audio: audio::SimAudio,
    pub(crate) faults: FaultInjector,
}

impl SimulatedHost {
    /// Creates a host with the given parameters
    pub fn new(config: SimHostConfig) -> Self {
        Self {
            display: display::SimDisplay::new(&config),
            audio: audio::SimAudio::new(),
            config,
            shared: Arc::new(SharedEvents::default()),
            relative_pointer: false,
            relative_transitions: 0,
            faults: FaultInjector::default(),
        }
    }

    /// Sets the fault injector for this host
    pub fn with_fault_injector(mut self, injector: FaultInjector) -> Self {
        self.faults = injector;
        self
    }

    /// Returns the host parameters
    pub fn config(&self) -> &SimHostConfig {
        &self.config
    }

    /// Returns an injection handle sharing this host's event stream
    pub fn handle(&self) -> SimHostHandle {
        SimHostHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Appends one event to the host stream
    pub fn inject(&self, event: HostEvent) {
        self.shared.push(event);
    }

    /// Returns true if relative pointer capture is engaged
    pub fn relative_pointer(&self) -> bool {
        self.relative_pointer
    }

    /// Number of times capture actually changed state
    pub fn relative_transitions(&self) -> usize {
        self.relative_transitions
    }

    /// Number of events not yet pumped
    pub fn pending(&self) -> usize {
        self.shared.lock().events.len()
    }
}

impl Default for SimulatedHost {
    fn default() -> Self {
        Self::new(SimHostConfig::default())
    }
}

impl EventSource for SimulatedHost {
    fn poll_event(&mut self) -> Option<HostEvent> {
        self.shared.lock().events.pop_front()
    }

    fn has_pending(&self) -> bool {
        !self.shared.lock().events.is_empty()
    }

    fn wait_event(&mut self) -> Result<(), HostError> {
        let drained_is_closed = self.faults.disconnect_when_drained();
        let mut state = self.shared.lock();
        loop {
            if !state.events.is_empty() {
                return Ok(());
            }
            if state.closed || drained_is_closed {
                return Err(HostError::Disconnected);
            }
            state = self
                .shared
                .ready
                .wait(state)
                .unwrap_or_else(|poisoned| poisoned.into_inner());
        }
    }

    fn push_user_event(&mut self, event: UserEvent) -> Result<(), HostError> {
        self.shared.push(HostEvent::User(event));
        Ok(())
    }

    fn set_relative_pointer(&mut self, enabled: bool) -> Result<(), HostError> {
        if self.relative_pointer != enabled {
            self.relative_pointer = enabled;
            self.relative_transitions += 1;
            log::debug!("relative pointer {}", if enabled { "engaged" } else { "released" });
        }
        Ok(())
    }
}
