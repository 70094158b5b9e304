//! Audio Integration Tests
//!
//! Push and pull playback driven through the simulated host's period clock.

use core_types::Cap;
use hal::{HostError, HostEvent, WindowEvent};
use pal::{
    AudioMode, AudioOptions, EventPayload, FrameBufferOpts, Owner, Pal, PalConfig, PalError,
};
use sim_host::fault_injection::{FaultInjector, FaultPlan, HostFault};
use sim_host::{SimHostConfig, SimulatedHost};
use tests_pal::{next_record, test_pal, test_pal_with};

fn pcm(pal: &mut Pal<SimulatedHost>, bytes: &[u8]) -> Cap {
    let buffer = pal.buffer_create(bytes.len(), 0).unwrap();
    pal.buffer_data_mut(buffer).unwrap().copy_from_slice(bytes);
    buffer
}

/// 8 kHz mono streams granted 80-sample periods: 160 bytes, 10 ms
fn stream_pal() -> Pal<SimulatedHost> {
    let host = SimulatedHost::new(SimHostConfig::new().with_stream_frame_samples(80));
    test_pal_with(host, PalConfig::default())
}

#[test]
fn test_push_playback_drains_per_period() {
    let mut pal = test_pal();
    let q = pal.queue_new(12).unwrap();
    pal.audio_create(Cap::AUDIO, q, AudioOptions::new(), 1, 8000, 4)
        .unwrap();
    assert_eq!(pal.audio(Cap::AUDIO).unwrap().mode(), Some(AudioMode::Push));
    assert!(!pal.audio(Cap::AUDIO).unwrap().is_playing());

    let bytes: Vec<u8> = (0..20).collect();
    let buffer = pcm(&mut pal, &bytes);
    pal.audio_submit(Cap::AUDIO, buffer).unwrap();
    assert!(pal.audio(Cap::AUDIO).unwrap().is_playing());

    // one period is 4 samples of 16-bit mono
    assert_eq!(pal.host_mut().tick(), 0);
    assert_eq!(pal.audio_queued_bytes(Cap::AUDIO).unwrap(), 12);
    pal.host_mut().tick();
    pal.host_mut().tick();
    assert_eq!(pal.audio_queued_bytes(Cap::AUDIO).unwrap(), 0);

    let sink = pal.audio(Cap::AUDIO).unwrap().sink().unwrap();
    assert_eq!(pal.host().sink(sink).unwrap().played(), bytes.as_slice());
}

#[test]
fn test_pull_stream_delivers_to_bound_queue() {
    let mut pal = stream_pal();
    let audio_q = pal.queue_new(12).unwrap();
    let main_q = pal.queue_new(12).unwrap();
    let buffer = pal
        .audio_create_stream(Cap::AUDIO, audio_q, AudioOptions::new(), 1, 8000, 256)
        .unwrap();
    assert_eq!(pal.audio_frame_count(Cap::AUDIO).unwrap(), 80);
    assert_eq!(pal.audio(Cap::AUDIO).unwrap().stream_buffer(), Some(buffer));
    assert_eq!(pal.buffer_owner(buffer).unwrap(), Owner::Device);

    // stopped streams are never asked for data
    assert_eq!(pal.host_mut().tick(), 0);
    pal.audio_start(Cap::AUDIO).unwrap();

    for period in 0..3u8 {
        assert_eq!(pal.host_mut().tick(), 1);
        // an unanswered request is not repeated
        assert_eq!(pal.host_mut().tick(), 0);

        assert_eq!(pal.queue_read(main_q).unwrap(), None);
        let record = next_record(&mut pal, audio_q).unwrap().unwrap();
        assert_eq!(record.cap, Cap::AUDIO);
        assert_eq!(record.payload, EventPayload::AudioFrame { dt_ms: 10, buffer });
        assert_eq!(pal.buffer_owner(buffer).unwrap(), Owner::App);

        pal.buffer_data_mut(buffer).unwrap().fill(period + 1);
        pal.audio_submit(Cap::AUDIO, buffer).unwrap();
        assert_eq!(pal.buffer_owner(buffer).unwrap(), Owner::Device);
    }

    let sink = pal.audio(Cap::AUDIO).unwrap().sink().unwrap();
    let host_sink = pal.host().sink(sink).unwrap();
    assert_eq!(host_sink.periods_filled(), 3);
    assert_eq!(host_sink.played().len(), 480);
    assert!(host_sink.played()[320..].iter().all(|&b| b == 3));

    let transfers = pal.audit().unwrap().transfers_for(buffer);
    assert_eq!(transfers.len(), 6);
}

#[test]
fn test_pull_rejects_foreign_buffer() {
    let mut pal = stream_pal();
    let q = pal.queue_new(12).unwrap();
    pal.audio_create_stream(Cap::AUDIO, q, AudioOptions::new(), 1, 8000, 80)
        .unwrap();
    let other = pcm(&mut pal, &[0; 160]);
    assert!(matches!(
        pal.audio_submit(Cap::AUDIO, other),
        Err(PalError::NotDeviceBuffer { .. })
    ));
}

#[test]
fn test_pull_after_close_is_dropped() {
    let mut pal = stream_pal();
    let q = pal.queue_new(12).unwrap();
    let buffer = pal
        .audio_create_stream(Cap::AUDIO, q, AudioOptions::new(), 1, 8000, 80)
        .unwrap();
    pal.audio_start(Cap::AUDIO).unwrap();
    assert_eq!(pal.host_mut().tick(), 1);
    pal.audio_close(Cap::AUDIO).unwrap();

    assert_eq!(pal.queue_read(q).unwrap(), None);
    assert!(pal.queue_empty(q).unwrap());
    assert!(matches!(pal.buffer_owner(buffer), Err(PalError::InvalidCapability(_))));
    assert_eq!(pal.host().sink_count(), 0);
    assert!(matches!(pal.audio_close(Cap::AUDIO), Err(PalError::NotConfigured(_))));
}

#[test]
fn test_open_failure_leaves_device_free() {
    let plan = FaultPlan::new().with_fault(HostFault::FailAudioOpen { count: 1 });
    let host = SimulatedHost::default().with_fault_injector(FaultInjector::new(plan));
    let mut pal = test_pal_with(host, PalConfig::default());
    let q = pal.queue_new(12).unwrap();

    assert!(matches!(
        pal.audio_create(Cap::AUDIO, q, AudioOptions::new(), 2, 44100, 512),
        Err(PalError::Host(HostError::AudioOpenFailed(_)))
    ));
    assert!(pal.audio(Cap::AUDIO).unwrap().mode().is_none());
    pal.audio_create(Cap::AUDIO, q, AudioOptions::new(), 2, 44100, 512)
        .unwrap();
    assert_eq!(pal.audio_frame_count(Cap::AUDIO).unwrap(), 512);
}

#[test]
fn test_failed_queue_append_keeps_sink_paused() {
    let plan = FaultPlan::new().with_fault(HostFault::FailQueueAudio { count: 1 });
    let host = SimulatedHost::default().with_fault_injector(FaultInjector::new(plan));
    let mut pal = test_pal_with(host, PalConfig::default());
    let q = pal.queue_new(12).unwrap();
    pal.audio_create(Cap::AUDIO, q, AudioOptions::new(), 1, 8000, 4)
        .unwrap();
    let sink = pal.audio(Cap::AUDIO).unwrap().sink().unwrap();
    let buffer = pcm(&mut pal, &[5; 8]);

    assert!(matches!(
        pal.audio_submit(Cap::AUDIO, buffer),
        Err(PalError::Host(HostError::Backend(_)))
    ));
    assert!(pal.host().sink(sink).unwrap().is_paused());

    pal.audio_submit(Cap::AUDIO, buffer).unwrap();
    assert_eq!(pal.host().sink(sink).unwrap().unpause_count(), 1);
    assert_eq!(pal.audio_queued_bytes(Cap::AUDIO).unwrap(), 8);
}

#[test]
fn test_bad_stream_parameters() {
    let mut pal = test_pal();
    let q = pal.queue_new(12).unwrap();
    assert!(matches!(
        pal.audio_create(Cap::AUDIO, q, AudioOptions::new(), 0, 44100, 512),
        Err(PalError::Host(HostError::AudioOpenFailed(_)))
    ));
    let buffer = pal.buffer_create(8, 0).unwrap();
    assert!(matches!(
        pal.audio_create(Cap::AUDIO, buffer, AudioOptions::new(), 2, 44100, 512),
        Err(PalError::WrongResource { .. })
    ));
    assert!(pal.audio(Cap::AUDIO).unwrap().mode().is_none());
}

#[test]
fn test_pull_survives_full_queue() {
    let mut pal = stream_pal();
    let main = pal.queue_new(12).unwrap();
    let shared = pal.queue_new(12).unwrap();
    let buffer = pal
        .audio_create_stream(Cap::AUDIO, shared, AudioOptions::new(), 1, 8000, 80)
        .unwrap();
    pal.framebuffer_create(Cap::FRAMEBUFFER, FrameBufferOpts::empty(), 4, 4, 8, shared)
        .unwrap();

    // framebuffer traffic fills the queue the stream is bound to
    loop {
        pal.host().inject(HostEvent::Window(WindowEvent::Exposed));
        if let Err(err) = pal.queue_read(main) {
            assert!(matches!(err, PalError::QueueFull { queue, .. } if queue == shared));
            break;
        }
    }

    pal.audio_start(Cap::AUDIO).unwrap();
    assert_eq!(pal.host_mut().tick(), 1);
    assert_eq!(pal.queue_read(main).unwrap(), None);
    assert_eq!(pal.buffer_owner(buffer).unwrap(), Owner::Device);
    // the request is still unanswered, the host does not repeat it
    assert_eq!(pal.host_mut().tick(), 0);

    let record = loop {
        match next_record(&mut pal, shared).unwrap() {
            Some(record) if record.cap == Cap::AUDIO => break record,
            Some(_) => {}
            None => panic!("audio frame lost"),
        }
    };
    assert_eq!(record.payload, EventPayload::AudioFrame { dt_ms: 10, buffer });
    assert_eq!(pal.buffer_owner(buffer).unwrap(), Owner::App);

    pal.buffer_data_mut(buffer).unwrap().fill(7);
    pal.audio_submit(Cap::AUDIO, buffer).unwrap();
    let sink = pal.audio(Cap::AUDIO).unwrap().sink().unwrap();
    assert_eq!(pal.host().sink(sink).unwrap().played(), &[7u8; 160][..]);
}
