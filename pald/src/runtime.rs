//! # Daemon Runtime
//!
//! The event loop that drives the demo application.
//!
//! Each step:
//! 1. Feeds the script to the host until the next `wait`
//! 2. Drains the event queue, collecting Frame buffers
//! 3. Draws and submits the collected frames, which posts the next ones
//!
//! Frames are submitted after the drain, so a step always terminates: the
//! next Frame event only becomes pending once this step is over.

use core_types::Cap;
use hal::SampleFormat;
use input_types::{InputEvent, InputOpts, KeyCode};
use pal::framebuffer::PALETTE_BYTES;
use pal::{AudioOptions, EventPayload, EventRecord, FrameBufferOpts, Pal, PalConfig, PalError};
use serde::Serialize;
use sim_host::SimulatedHost;
use thiserror::Error;

use crate::script::{HostScript, HostScriptError, ScriptStep};

/// Milliseconds of script time per step
pub const FRAME_MS: u64 = 16;

const BEEP_RATE: u32 = 22_050;
const BEEP_SAMPLES: u32 = 512;

/// Daemon error types
#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("Platform error: {0}")]
    Pal(#[from] PalError),

    #[error("Script error: {0}")]
    Script(#[from] HostScriptError),
}

/// Daemon configuration
#[derive(Debug, Clone)]
pub struct DaemonConfig {
    pub pal: PalConfig,
    /// Host event script text
    pub script: Option<String>,
    /// Maximum steps to run (0 = unlimited)
    pub max_steps: usize,
    /// Stop once the script has been replayed
    pub exit_on_idle: bool,
    /// Requested content size
    pub width: u32,
    pub height: u32,
    pub double_buffer: bool,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            pal: PalConfig::default(),
            script: None,
            max_steps: 0,
            exit_on_idle: true,
            width: 64,
            height: 48,
            double_buffer: true,
        }
    }
}

/// What the demo saw
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DemoStats {
    pub steps: usize,
    pub frames: u64,
    pub syncs: u64,
    pub sizes: u64,
    pub dirty: u64,
    pub keys: u64,
    pub pointer_moves: u64,
    pub buttons: u64,
    pub touches: u64,
    pub beeps: u64,
    /// Palette rotation chosen with the arrow keys
    pub shift: u8,
    pub quit: bool,
}

/// Runs the palette demo against a simulated host
pub struct DaemonRuntime {
    config: DaemonConfig,
    pal: Pal<SimulatedHost>,
    queue: Cap,
    beep: Cap,
    script: Option<HostScript>,
    wait_steps: u64,
    stats: DemoStats,
}

impl DaemonRuntime {
    /// Creates the runtime and sets up the demo's devices
    pub fn new(config: DaemonConfig) -> Result<Self, DaemonError> {
        let script = config
            .script
            .as_deref()
            .map(HostScript::from_text)
            .transpose()?;

        let mut pal = Pal::new(SimulatedHost::default(), config.pal.clone())?;
        let queue = pal.queue_new(config.pal.min_queue_pow2)?;
        let fb = Cap::FRAMEBUFFER;

        pal.input_subscribe(
            Cap::INPUT,
            InputOpts::KEY | InputOpts::BUTTON | InputOpts::POINTER | InputOpts::TOUCH,
            queue,
        )?;

        let palette = pal.buffer_create(PALETTE_BYTES, 0)?;
        for (i, entry) in pal.buffer_data_mut(palette)?.chunks_exact_mut(4).enumerate() {
            entry.copy_from_slice(&rainbow(i as u8).to_le_bytes());
        }
        pal.framebuffer_set_palette(fb, palette)?;
        pal.buffer_destroy(palette)?;

        pal.framebuffer_set_title(fb, "pald palette demo")?;
        let mut opts = FrameBufferOpts::PALETTE | FrameBufferOpts::SEND_SYNC;
        if config.double_buffer {
            opts |= FrameBufferOpts::DOUBLE_BUFFER;
        }
        pal.framebuffer_create(fb, opts, config.width, config.height, 8, queue)?;

        let audio = AudioOptions::new().with_format(SampleFormat::S16);
        pal.audio_create(Cap::AUDIO, queue, audio, 1, BEEP_RATE, BEEP_SAMPLES)?;
        let beep = pal.buffer_create(BEEP_SAMPLES as usize * 2, 0)?;
        for (i, sample) in pal.buffer_data_mut(beep)?.chunks_exact_mut(2).enumerate() {
            let level: i16 = if (i / 25) % 2 == 0 { 6000 } else { -6000 };
            sample.copy_from_slice(&level.to_le_bytes());
        }

        log::info!(
            "demo up: {}x{} content, {} buffer(s)",
            config.width,
            config.height,
            pal.framebuffer(fb)?.buffers().len()
        );

        Ok(Self {
            config,
            pal,
            queue,
            beep,
            script,
            wait_steps: 0,
            stats: DemoStats::default(),
        })
    }

    pub fn pal(&self) -> &Pal<SimulatedHost> {
        &self.pal
    }

    pub fn pal_mut(&mut self) -> &mut Pal<SimulatedHost> {
        &mut self.pal
    }

    pub fn stats(&self) -> &DemoStats {
        &self.stats
    }

    pub fn step_count(&self) -> usize {
        self.stats.steps
    }

    /// The queue every demo device delivers into
    pub fn queue(&self) -> Cap {
        self.queue
    }

    /// Runs until quit, the step limit, or the end of the script
    pub fn run(&mut self) -> Result<DemoStats, DaemonError> {
        loop {
            if self.config.max_steps > 0 && self.stats.steps >= self.config.max_steps {
                log::info!("step limit {} reached", self.config.max_steps);
                break;
            }
            if !self.step()? {
                log::info!("quit requested");
                break;
            }
            if self.config.exit_on_idle && self.script_finished() {
                log::debug!("script replayed");
                break;
            }
        }
        Ok(self.stats.clone())
    }

    /// Runs one step; returns false once the application quit
    pub fn step(&mut self) -> Result<bool, DaemonError> {
        if self.stats.quit {
            return Ok(false);
        }
        self.feed_script();
        let frames = self.drain()?;
        for buffer in frames {
            self.draw(buffer)?;
            self.pal.framebuffer_submit(Cap::FRAMEBUFFER, buffer)?;
            self.stats.frames += 1;
        }
        self.stats.steps += 1;
        Ok(!self.stats.quit)
    }

    fn script_finished(&self) -> bool {
        self.wait_steps == 0 && self.script.as_ref().map_or(true, |s| !s.has_more())
    }

    fn feed_script(&mut self) {
        if self.wait_steps > 0 {
            self.wait_steps -= 1;
            return;
        }
        let Some(script) = self.script.as_mut() else {
            return;
        };
        while let Some(step) = script.next_step() {
            match step {
                ScriptStep::Event(event) => self.pal.host().inject(event),
                ScriptStep::Wait(ms) => {
                    self.wait_steps = ms.div_ceil(FRAME_MS);
                    break;
                }
            }
        }
    }

    /// Handles every pending record; returns the Frame buffers received
    fn drain(&mut self) -> Result<Vec<Cap>, DaemonError> {
        let mut frames = Vec::new();
        loop {
            match self.pal.queue_read(self.queue)? {
                Some(record) => {
                    self.pal.queue_advance(self.queue)?;
                    if let Some(buffer) = self.handle(record)? {
                        frames.push(buffer);
                    }
                }
                None if self.pal.queue_empty(self.queue)? => break,
                None => {}
            }
        }
        Ok(frames)
    }

    fn handle(&mut self, record: EventRecord) -> Result<Option<Cap>, DaemonError> {
        match record.payload {
            EventPayload::Quit => self.stats.quit = true,
            EventPayload::Frame { buffer, .. } => return Ok(Some(buffer)),
            EventPayload::Sync { .. } => self.stats.syncs += 1,
            EventPayload::Size { width, height } => {
                log::info!("content size {}x{}", width, height);
                self.stats.sizes += 1;
            }
            EventPayload::Dirty => self.stats.dirty += 1,
            EventPayload::Input(event) => self.handle_input(event)?,
            EventPayload::AudioFrame { .. } => {}
        }
        Ok(None)
    }

    fn handle_input(&mut self, event: InputEvent) -> Result<(), DaemonError> {
        match event {
            InputEvent::KeyDown(key) => {
                self.stats.keys += 1;
                match key.keycode {
                    KeyCode::ESCAPE => self.stats.quit = true,
                    KeyCode::RIGHT_ARROW => self.stats.shift = self.stats.shift.wrapping_add(8),
                    KeyCode::LEFT_ARROW => self.stats.shift = self.stats.shift.wrapping_sub(8),
                    _ => {}
                }
            }
            InputEvent::PointerMove(_) => self.stats.pointer_moves += 1,
            InputEvent::ButtonDown(_) => {
                self.stats.buttons += 1;
                self.beep()?;
            }
            InputEvent::TouchBegin(_) | InputEvent::TouchMove(_) | InputEvent::TouchEnd(_) => {
                self.stats.touches += 1;
            }
            InputEvent::KeyUp(_) | InputEvent::ButtonUp(_) => {}
        }
        Ok(())
    }

    fn beep(&mut self) -> Result<(), DaemonError> {
        match self.pal.audio_submit(Cap::AUDIO, self.beep) {
            Ok(()) => {
                self.stats.beeps += 1;
                Ok(())
            }
            Err(PalError::AudioBacklog { queued, limit }) => {
                log::debug!("beep skipped: {} of {} bytes queued", queued, limit);
                Ok(())
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Diagonal bands of palette indices, rotated by the frame count
    fn draw(&mut self, buffer: Cap) -> Result<(), DaemonError> {
        let Some((width, _)) = self.pal.framebuffer(Cap::FRAMEBUFFER)?.content_size() else {
            return Err(PalError::NotConfigured(Cap::FRAMEBUFFER).into());
        };
        let width = width.max(1) as usize;
        let offset = self.stats.shift.wrapping_add(self.stats.frames as u8);
        for (i, pixel) in self.pal.buffer_data_mut(buffer)?.iter_mut().enumerate() {
            let (x, y) = (i % width, i / width);
            *pixel = ((x + y) as u8).wrapping_add(offset);
        }
        Ok(())
    }
}

/// Opaque hue ramp for index `i`
fn rainbow(i: u8) -> u32 {
    let phase = i / 43;
    let t = (i % 43) as u32 * 6;
    let (r, g, b) = match phase {
        0 => (255, t, 0),
        1 => (255 - t, 255, 0),
        2 => (0, 255, t),
        3 => (0, 255 - t, 255),
        4 => (t, 0, 255),
        _ => (255, 0, 255 - t),
    };
    0xFF00_0000 | (r << 16) | (g << 8) | b
}

#[cfg(test)]
mod tests {
    use super::*;
    use pal::Owner;

    fn runtime(script: &str) -> DaemonRuntime {
        DaemonRuntime::new(DaemonConfig {
            script: Some(script.to_string()),
            ..DaemonConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn test_rainbow_is_opaque() {
        for i in 0..=255u8 {
            assert_eq!(rainbow(i) >> 24, 0xFF);
        }
        assert_eq!(rainbow(0), 0xFFFF_0000);
    }

    #[test]
    fn test_quit_stops_run() {
        let mut rt = runtime("wait 32ms\nquit");
        let stats = rt.run().unwrap();
        assert!(stats.quit);
        assert!(stats.frames >= 1);
        assert!(!rt.step().unwrap());
    }

    #[test]
    fn test_frames_presented_with_palette() {
        let mut rt = DaemonRuntime::new(DaemonConfig {
            max_steps: 5,
            exit_on_idle: false,
            ..DaemonConfig::default()
        })
        .unwrap();
        let stats = rt.run().unwrap();
        assert_eq!(stats.steps, 5);
        assert_eq!(stats.frames, 5);
        // every submit after the first produces a Sync seen on the next step
        assert_eq!(stats.syncs, 4);
        assert_eq!(rt.pal().host().frames_presented(), 5);

        let frame = rt.pal().host().last_frame().unwrap();
        let fb = rt.pal().framebuffer(Cap::FRAMEBUFFER).unwrap();
        // fifth frame: bands rotated by 4
        assert_eq!(frame.pixel(0, 0), fb.palette()[4]);
    }

    #[test]
    fn test_input_reaches_demo() {
        let mut rt = runtime("focus in\nmove 2 1\nRight\nclick 1\ntouch down 0 1 1\nexpose");
        let stats = rt.run().unwrap();
        assert_eq!(stats.keys, 1);
        assert_eq!(stats.shift, 8);
        assert_eq!(stats.pointer_moves, 1);
        assert_eq!(stats.buttons, 1);
        assert_eq!(stats.beeps, 1);
        assert_eq!(stats.touches, 1);
        assert_eq!(stats.dirty, 1);
        assert!(!stats.quit);
        assert!(rt.pal().audio_queued_bytes(Cap::AUDIO).unwrap() > 0);
    }

    #[test]
    fn test_escape_quits() {
        let stats = runtime("Escape\na").run().unwrap();
        assert!(stats.quit);
    }

    #[test]
    fn test_buffers_return_to_device() {
        let mut rt = runtime("wait 64ms");
        rt.run().unwrap();
        let fb = rt.pal().framebuffer(Cap::FRAMEBUFFER).unwrap();
        assert_eq!(fb.buffers().len(), 2);
        for &buffer in fb.buffers() {
            assert_eq!(rt.pal().buffer_owner(buffer).unwrap(), Owner::Device);
        }
    }

    #[test]
    fn test_bad_script_rejected() {
        let result = DaemonRuntime::new(DaemonConfig {
            script: Some("jump".to_string()),
            ..DaemonConfig::default()
        });
        assert!(matches!(result, Err(DaemonError::Script(_))));
    }
}
