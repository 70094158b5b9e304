//! Simulated audio sinks
//!
//! Queued sinks hold submitted PCM until [`SimulatedHost::tick`] plays one
//! period of it. Stream sinks post an `AudioPull` user event per period and
//! record whatever the platform layer fills in.

use std::collections::{BTreeMap, VecDeque};

use hal::{AudioBackend, AudioSpec, EventSource, HostError, SinkId, UserEvent};

use crate::SimulatedHost;

/// How a sink receives PCM
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkMode {
    Queued,
    Stream,
}

/// One open sink
#[derive(Debug, Clone)]
pub struct SimSink {
    spec: AudioSpec,
    mode: SinkMode,
    paused: bool,
    unpause_count: usize,
    queued: VecDeque<u8>,
    played: Vec<u8>,
    pull_outstanding: bool,
    periods_filled: u64,
}

impl SimSink {
    fn new(spec: AudioSpec, mode: SinkMode) -> Self {
        Self {
            spec,
            mode,
            paused: true,
            unpause_count: 0,
            queued: VecDeque::new(),
            played: Vec::new(),
            pull_outstanding: false,
            periods_filled: 0,
        }
    }

    /// The spec the sink was opened with
    pub fn spec(&self) -> &AudioSpec {
        &self.spec
    }

    pub fn mode(&self) -> SinkMode {
        self.mode
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Number of paused to playing transitions
    pub fn unpause_count(&self) -> usize {
        self.unpause_count
    }

    /// Bytes waiting to be played
    pub fn queued_len(&self) -> usize {
        self.queued.len()
    }

    /// Everything played so far, in order
    pub fn played(&self) -> &[u8] {
        &self.played
    }

    /// Stream periods filled so far
    pub fn periods_filled(&self) -> u64 {
        self.periods_filled
    }
}

#[derive(Debug, Default)]
pub(crate) struct SimAudio {
    sinks: BTreeMap<SinkId, SimSink>,
    next_id: u32,
}

impl SimAudio {
    pub(crate) fn new() -> Self {
        Self {
            sinks: BTreeMap::new(),
            next_id: 1,
        }
    }

    fn sink_mut(&mut self, sink: SinkId) -> Result<&mut SimSink, HostError> {
        self.sinks.get_mut(&sink).ok_or(HostError::UnknownSink(sink.0))
    }
}

impl SimulatedHost {
    /// Returns an open sink
    pub fn sink(&self, sink: SinkId) -> Option<&SimSink> {
        self.audio.sinks.get(&sink)
    }

    /// Number of open sinks
    pub fn sink_count(&self) -> usize {
        self.audio.sinks.len()
    }

    /// Advances audio by one host period
    ///
    /// Playing queued sinks consume up to one period of PCM. Playing stream
    /// sinks without an unanswered request get an `AudioPull` event. Returns
    /// the number of pulls posted.
    pub fn tick(&mut self) -> usize {
        let mut pulls = Vec::new();
        for (id, sink) in self.audio.sinks.iter_mut() {
            if sink.paused {
                continue;
            }
            match sink.mode {
                SinkMode::Queued => {
                    let n = sink.spec.period_bytes().min(sink.queued.len());
                    let chunk: Vec<u8> = sink.queued.drain(..n).collect();
                    sink.played.extend_from_slice(&chunk);
                }
                SinkMode::Stream => {
                    if !sink.pull_outstanding {
                        sink.pull_outstanding = true;
                        pulls.push(*id);
                    }
                }
            }
        }
        for sink in &pulls {
            // the simulated stream cannot refuse a user event
            let _ = self.push_user_event(UserEvent::AudioPull { sink: *sink });
        }
        pulls.len()
    }

    fn open(&mut self, spec: &AudioSpec, exact: bool, mode: SinkMode) -> Result<(SinkId, AudioSpec), HostError> {
        if self.faults.should_fail_audio_open() {
            return Err(HostError::AudioOpenFailed("injected fault".to_string()));
        }
        if spec.channels == 0 || spec.sample_rate == 0 {
            return Err(HostError::AudioOpenFailed(format!(
                "{} channels at {} Hz",
                spec.channels, spec.sample_rate
            )));
        }
        if exact && !self.config().exact_formats.contains(&spec.format) {
            return Err(HostError::FormatUnavailable);
        }

        let mut obtained = *spec;
        if mode == SinkMode::Stream {
            if let Some(samples) = self.config().stream_frame_samples {
                obtained.frame_samples = samples;
            }
        }

        let id = SinkId(self.audio.next_id);
        self.audio.next_id += 1;
        self.audio.sinks.insert(id, SimSink::new(obtained, mode));
        log::debug!(
            "opened {:?} sink {} ({} ch, {} Hz, {:?})",
            mode,
            id.0,
            obtained.channels,
            obtained.sample_rate,
            obtained.format
        );
        Ok((id, obtained))
    }
}

impl AudioBackend for SimulatedHost {
    fn open_sink(&mut self, spec: &AudioSpec, exact: bool) -> Result<(SinkId, AudioSpec), HostError> {
        self.open(spec, exact, SinkMode::Queued)
    }

    fn open_stream(
        &mut self,
        spec: &AudioSpec,
        exact: bool,
    ) -> Result<(SinkId, AudioSpec), HostError> {
        self.open(spec, exact, SinkMode::Stream)
    }

    fn queue_audio(&mut self, sink: SinkId, pcm: &[u8]) -> Result<(), HostError> {
        if self.faults.should_fail_queue_audio() {
            return Err(HostError::Backend("queue append failed".to_string()));
        }
        let sink = self.audio.sink_mut(sink)?;
        if sink.mode != SinkMode::Queued {
            return Err(HostError::Backend("not a queued sink".to_string()));
        }
        sink.queued.extend(pcm.iter().copied());
        Ok(())
    }

    fn queued_bytes(&self, sink: SinkId) -> Result<usize, HostError> {
        self.audio
            .sinks
            .get(&sink)
            .map(SimSink::queued_len)
            .ok_or(HostError::UnknownSink(sink.0))
    }

    fn fill_stream(&mut self, sink: SinkId, pcm: &[u8]) -> Result<(), HostError> {
        let sink = self.audio.sink_mut(sink)?;
        if sink.mode != SinkMode::Stream {
            return Err(HostError::Backend("not a stream sink".to_string()));
        }
        // one period exactly: truncate or pad with silence
        let period = sink.spec.period_bytes();
        let take = pcm.len().min(period);
        sink.played.extend_from_slice(&pcm[..take]);
        sink.played.resize(sink.played.len() + (period - take), 0);
        sink.pull_outstanding = false;
        sink.periods_filled += 1;
        Ok(())
    }

    fn set_paused(&mut self, sink: SinkId, paused: bool) -> Result<(), HostError> {
        let sink = self.audio.sink_mut(sink)?;
        if sink.paused && !paused {
            sink.unpause_count += 1;
        }
        sink.paused = paused;
        Ok(())
    }

    fn close_sink(&mut self, sink: SinkId) -> Result<(), HostError> {
        self.audio
            .sinks
            .remove(&sink)
            .map(|_| ())
            .ok_or(HostError::UnknownSink(sink.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fault_injection::{FaultInjector, FaultPlan, HostFault};
    use crate::SimHostConfig;
    use hal::{HostEvent, SampleFormat};

    fn spec() -> AudioSpec {
        AudioSpec::new(1, 8_000, 4)
    }

    #[test]
    fn test_queued_sink_plays_after_unpause() {
        let mut host = SimulatedHost::default();
        let (sink, obtained) = host.open_sink(&spec(), false).unwrap();
        assert_eq!(obtained, spec());

        host.queue_audio(sink, &[1, 2, 3, 4, 5, 6, 7, 8, 9, 10]).unwrap();
        assert_eq!(host.queued_bytes(sink), Ok(10));

        // paused: nothing plays
        host.tick();
        assert_eq!(host.queued_bytes(sink), Ok(10));

        host.set_paused(sink, false).unwrap();
        host.tick();
        assert_eq!(host.queued_bytes(sink), Ok(2));
        host.tick();
        host.tick();
        assert_eq!(host.sink(sink).unwrap().played(), &[1, 2, 3, 4, 5, 6, 7, 8, 9, 10]);
        assert_eq!(host.sink(sink).unwrap().unpause_count(), 1);
    }

    #[test]
    fn test_stream_posts_one_pull_per_answer() {
        let mut host = SimulatedHost::default();
        let (sink, obtained) = host.open_stream(&spec(), false).unwrap();
        host.set_paused(sink, false).unwrap();

        assert_eq!(host.tick(), 1);
        assert_eq!(host.tick(), 0);
        assert_eq!(
            host.poll_event(),
            Some(HostEvent::User(UserEvent::AudioPull { sink }))
        );

        host.fill_stream(sink, &[9; 3]).unwrap();
        let played = host.sink(sink).unwrap().played().to_vec();
        assert_eq!(played.len(), obtained.period_bytes());
        assert_eq!(played, vec![9, 9, 9, 0, 0, 0, 0, 0]);
        assert_eq!(host.tick(), 1);
    }

    #[test]
    fn test_stream_period_override() {
        let config = SimHostConfig::new().with_stream_frame_samples(256);
        let mut host = SimulatedHost::new(config);
        let (_, obtained) = host.open_stream(&spec(), false).unwrap();
        assert_eq!(obtained.frame_samples, 256);
        let (_, queued) = host.open_sink(&spec(), false).unwrap();
        assert_eq!(queued.frame_samples, 4);
    }

    #[test]
    fn test_exact_format() {
        let mut host = SimulatedHost::default();
        let u8_spec = spec().with_format(SampleFormat::U8);
        assert_eq!(host.open_sink(&u8_spec, true), Err(HostError::FormatUnavailable));
        assert!(host.open_sink(&u8_spec, false).is_ok());
        assert!(host.open_sink(&spec(), true).is_ok());
    }

    #[test]
    fn test_mode_mismatch_and_unknown_sink() {
        let mut host = SimulatedHost::default();
        let (queued, _) = host.open_sink(&spec(), false).unwrap();
        let (stream, _) = host.open_stream(&spec(), false).unwrap();
        assert!(host.fill_stream(queued, &[0; 8]).is_err());
        assert!(host.queue_audio(stream, &[0; 8]).is_err());

        host.close_sink(queued).unwrap();
        assert_eq!(host.queued_bytes(queued), Err(HostError::UnknownSink(queued.0)));
        assert_eq!(host.sink_count(), 1);
    }

    #[test]
    fn test_audio_faults() {
        let plan = FaultPlan::new()
            .with_fault(HostFault::FailAudioOpen { count: 1 })
            .with_fault(HostFault::FailQueueAudio { count: 1 });
        let mut host = SimulatedHost::default().with_fault_injector(FaultInjector::new(plan));
        assert!(matches!(
            host.open_sink(&spec(), false),
            Err(HostError::AudioOpenFailed(_))
        ));
        let (sink, _) = host.open_sink(&spec(), false).unwrap();
        assert!(host.queue_audio(sink, &[1]).is_err());
        assert!(host.queue_audio(sink, &[1]).is_ok());
    }
}
