//! # Audio Protocol
//!
//! A device attaches exactly one host sink, in one of two modes chosen at
//! creation:
//!
//! - **Push**: [`Pal::audio_submit`] copies PCM into the host queue; the
//!   application keeps its buffer. The first submission starts playback.
//! - **Pull**: the device owns one period-sized stream buffer. When the host
//!   needs data, the buffer reaches the application in an Audio Frame event;
//!   submitting it fills the host period and hands the buffer back.
//!
//! ## Backpressure
//!
//! Push submissions are checked against `audio_high_water_bytes`; a
//! submission that would take the host backlog past it is rejected with
//! [`PalError::AudioBacklog`] and nothing is queued.

use core_types::Cap;
use hal::{AudioSpec, HostBackend, SampleFormat, SinkId};
use serde::{Deserialize, Serialize};

use crate::buffer::{Buffer, Owner};
use crate::error::PalError;
use crate::resource::{Device, Resource};
use crate::{Pal, PalResult};

/// Sink format request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AudioOptions {
    pub format: SampleFormat,
    /// Demand the exact format, no host conversion
    pub no_fmt_conversion: bool,
}

impl AudioOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_format(mut self, format: SampleFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_no_fmt_conversion(mut self, exact: bool) -> Self {
        self.no_fmt_conversion = exact;
        self
    }
}

/// How PCM reaches the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AudioMode {
    Push,
    Pull,
}

#[derive(Debug)]
struct Attachment {
    mode: AudioMode,
    sink: SinkId,
    spec: AudioSpec,
    queue: Cap,
    playing: bool,
    stream_buffer: Option<Cap>,
}

/// Where a host pull request can go
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StreamPull {
    /// No pull stream is attached to the sink
    Closed,
    /// The application has not submitted the last period yet
    Held { device: Cap, buffer: Cap },
    /// The stream buffer is free to hand out
    Ready {
        device: Cap,
        buffer: Cap,
        period_ms: u32,
    },
}

/// Audio device state
#[derive(Debug, Default)]
pub struct AudioDevice {
    attachment: Option<Attachment>,
}

impl AudioDevice {
    pub fn mode(&self) -> Option<AudioMode> {
        self.attachment.as_ref().map(|a| a.mode)
    }

    /// The spec the host granted
    pub fn spec(&self) -> Option<&AudioSpec> {
        self.attachment.as_ref().map(|a| &a.spec)
    }

    pub fn sink(&self) -> Option<SinkId> {
        self.attachment.as_ref().map(|a| a.sink)
    }

    /// Queue receiving this device's events
    pub fn queue(&self) -> Option<Cap> {
        self.attachment.as_ref().map(|a| a.queue)
    }

    pub fn is_playing(&self) -> bool {
        self.attachment.as_ref().is_some_and(|a| a.playing)
    }

    /// The pull-mode stream buffer
    pub fn stream_buffer(&self) -> Option<Cap> {
        self.attachment.as_ref().and_then(|a| a.stream_buffer)
    }
}

impl<H: HostBackend> Pal<H> {
    /// Returns the audio device named by `audio`
    pub fn audio(&self, audio: Cap) -> PalResult<&AudioDevice> {
        self.audio_ref(audio)
    }

    /// Opens a push-mode sink, paused until the first submission
    pub fn audio_create(
        &mut self,
        audio: Cap,
        queue: Cap,
        opts: AudioOptions,
        channels: u16,
        sample_rate: u32,
        frame_samples: u32,
    ) -> PalResult<()> {
        let spec = self.audio_prepare(audio, queue, opts, channels, sample_rate, frame_samples)?;
        let (sink, obtained) = self.host.open_sink(&spec, opts.no_fmt_conversion)?;
        self.audio_mut(audio)?.attachment = Some(Attachment {
            mode: AudioMode::Push,
            sink,
            spec: obtained,
            queue,
            playing: false,
            stream_buffer: None,
        });
        log::debug!(
            "{} push sink: {} ch, {} Hz, {:?}",
            audio,
            obtained.channels,
            obtained.sample_rate,
            obtained.format
        );
        Ok(())
    }

    /// Opens a pull-mode stream, stopped until [`Pal::audio_start`]
    ///
    /// Returns the stream buffer, sized to one granted period. It belongs to
    /// the device until an Audio Frame event hands it over.
    pub fn audio_create_stream(
        &mut self,
        audio: Cap,
        queue: Cap,
        opts: AudioOptions,
        channels: u16,
        sample_rate: u32,
        frame_samples: u32,
    ) -> PalResult<Cap> {
        let spec = self.audio_prepare(audio, queue, opts, channels, sample_rate, frame_samples)?;
        let (sink, obtained) = self.host.open_stream(&spec, opts.no_fmt_conversion)?;
        let buffer = match self.allocate(Resource::Buffer(Buffer::for_device(
            obtained.period_bytes(),
            audio,
        ))) {
            Ok(buffer) => buffer,
            Err(err) => {
                // do not leave a sink nobody can reach
                self.host.close_sink(sink)?;
                return Err(err);
            }
        };
        self.audio_mut(audio)?.attachment = Some(Attachment {
            mode: AudioMode::Pull,
            sink,
            spec: obtained,
            queue,
            playing: false,
            stream_buffer: Some(buffer),
        });
        if obtained.frame_samples != frame_samples {
            log::debug!(
                "{} stream period {} samples, {} requested",
                audio,
                obtained.frame_samples,
                frame_samples
            );
        }
        Ok(buffer)
    }

    /// Push mode: copies the buffer's PCM into the host queue
    ///
    /// Pull mode: fills the pending host period from the stream buffer and
    /// returns the buffer to the device.
    pub fn audio_submit(&mut self, audio: Cap, buffer: Cap) -> PalResult<()> {
        let (mode, sink, playing, stream_buffer) = {
            let a = self.attachment(audio)?;
            (a.mode, a.sink, a.playing, a.stream_buffer)
        };
        match mode {
            AudioMode::Push => {
                let len = self.app_buffer(buffer)?.len();
                if let Some(limit) = self.config.audio_high_water_bytes {
                    let queued = self.host.queued_bytes(sink)? + len;
                    if queued > limit {
                        log::warn!("{} backlog {} bytes over limit {}", audio, queued, limit);
                        return Err(PalError::AudioBacklog { queued, limit });
                    }
                }
                let pcm = match self.table.resolve(buffer) {
                    Ok(Resource::Buffer(b)) => b.bytes(),
                    _ => return Err(PalError::InvalidCapability(buffer)),
                };
                self.host.queue_audio(sink, pcm)?;
                if !playing {
                    self.host.set_paused(sink, false)?;
                    if let Some(a) = self.audio_mut(audio)?.attachment.as_mut() {
                        a.playing = true;
                    }
                }
                Ok(())
            }
            AudioMode::Pull => {
                if stream_buffer != Some(buffer) {
                    return Err(PalError::NotDeviceBuffer {
                        device: audio,
                        buffer,
                    });
                }
                self.app_buffer(buffer)?;
                let pcm = match self.table.resolve(buffer) {
                    Ok(Resource::Buffer(b)) => b.bytes(),
                    _ => return Err(PalError::InvalidCapability(buffer)),
                };
                self.host.fill_stream(sink, pcm)?;
                self.transfer(buffer, Owner::Device)
            }
        }
    }

    /// Starts pull-mode playback
    pub fn audio_start(&mut self, audio: Cap) -> PalResult<()> {
        self.audio_set_playing(audio, true)
    }

    /// Stops pull-mode playback
    pub fn audio_stop(&mut self, audio: Cap) -> PalResult<()> {
        self.audio_set_playing(audio, false)
    }

    /// Sample frames per period, as granted by the host
    pub fn audio_frame_count(&self, audio: Cap) -> PalResult<u32> {
        Ok(self.attachment(audio)?.spec.frame_samples)
    }

    /// Bytes submitted but not yet played (push mode)
    pub fn audio_queued_bytes(&self, audio: Cap) -> PalResult<usize> {
        let a = self.attachment(audio)?;
        if a.mode != AudioMode::Push {
            return Err(PalError::ModeMismatch(audio));
        }
        Ok(self.host.queued_bytes(a.sink)?)
    }

    /// Closes the sink and detaches it, freeing the device for a new one
    pub fn audio_close(&mut self, audio: Cap) -> PalResult<()> {
        let Some(attachment) = self.audio_mut(audio)?.attachment.take() else {
            return Err(PalError::NotConfigured(audio));
        };
        if let Some(buffer) = attachment.stream_buffer {
            self.release(buffer)?;
        }
        self.host.close_sink(attachment.sink)?;
        log::debug!("{} closed", audio);
        Ok(())
    }

    /// Queue bound to an audio device
    pub(crate) fn audio_queue(&self, audio: Cap) -> Option<Cap> {
        self.audio_ref(audio).ok().and_then(AudioDevice::queue)
    }

    /// Looks up the pull stream feeding `sink`
    pub(crate) fn stream_for_sink(&self, sink: SinkId) -> StreamPull {
        let found = self.table.iter().find_map(|(cap, resource)| match resource {
            Resource::Device(Device::Audio(device)) => {
                let a = device.attachment.as_ref()?;
                let buffer = a.stream_buffer?;
                (a.sink == sink && a.mode == AudioMode::Pull)
                    .then(|| (cap, buffer, a.spec.period_ms()))
            }
            _ => None,
        });
        let Some((device, buffer, period_ms)) = found else {
            return StreamPull::Closed;
        };
        if self
            .buffer_ref(buffer)
            .is_ok_and(|b| b.owner() == Owner::Device)
        {
            StreamPull::Ready {
                device,
                buffer,
                period_ms,
            }
        } else {
            StreamPull::Held { device, buffer }
        }
    }

    /// Hands the stream buffer to the application after its Audio Frame
    /// event was queued
    pub(crate) fn stream_delivered(&mut self, buffer: Cap) -> PalResult<()> {
        self.transfer(buffer, Owner::App)
    }

    fn attachment(&self, audio: Cap) -> PalResult<&Attachment> {
        self.audio_ref(audio)?
            .attachment
            .as_ref()
            .ok_or(PalError::NotConfigured(audio))
    }

    fn audio_prepare(
        &self,
        audio: Cap,
        queue: Cap,
        opts: AudioOptions,
        channels: u16,
        sample_rate: u32,
        frame_samples: u32,
    ) -> PalResult<AudioSpec> {
        if self.audio_ref(audio)?.attachment.is_some() {
            return Err(PalError::StreamAlreadyAttached(audio));
        }
        self.queue_ref(queue)?;
        Ok(AudioSpec::new(channels, sample_rate, frame_samples).with_format(opts.format))
    }

    fn audio_set_playing(&mut self, audio: Cap, playing: bool) -> PalResult<()> {
        let a = self.attachment(audio)?;
        if a.mode != AudioMode::Pull {
            return Err(PalError::ModeMismatch(audio));
        }
        let sink = a.sink;
        self.host.set_paused(sink, !playing)?;
        if let Some(a) = self.audio_mut(audio)?.attachment.as_mut() {
            a.playing = playing;
        }
        Ok(())
    }
}
