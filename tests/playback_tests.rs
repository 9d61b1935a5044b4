mod common;

use base64::Engine as _;
use common::{MockSpeaker, SpeakerLog, WAIT, next_event, wait_until};
use gemini_live_rt::{AudioChunk, Blob, EventSink, PcmFormat, PlaybackDriver, PlaybackState, UiEvent};
use std::sync::Arc;
use std::time::Duration;

fn chunk(pcm: &[u8]) -> AudioChunk {
    AudioChunk::new(Blob {
        mime_type: "audio/pcm;rate=24000".to_string(),
        data: base64::engine::general_purpose::STANDARD.encode(pcm),
    })
}

fn driver(speaker: &MockSpeaker) -> (PlaybackDriver, gemini_live_rt::UiEvents) {
    let (sink, events) = EventSink::channel();
    let driver = PlaybackDriver::spawn(Arc::new(speaker.clone()), PcmFormat::playback_default(), sink);
    (driver, events)
}

async fn settle(driver: &PlaybackDriver) {
    tokio::time::timeout(WAIT, driver.wait_until_idle())
        .await
        .expect("playback never went idle");
}

#[tokio::test(start_paused = true)]
async fn chunks_play_in_order_through_one_handle() {
    let speaker = MockSpeaker::with_delays(Duration::from_millis(20), Duration::from_millis(5));
    let (playback, _events) = driver(&speaker);

    playback.enqueue(chunk(b"A"));
    playback.enqueue(chunk(b"B"));
    playback.enqueue(chunk(b"C"));
    settle(&playback).await;

    assert_eq!(
        speaker.log(),
        vec![
            SpeakerLog::Open(1),
            SpeakerLog::Write(1, b"A".to_vec()),
            SpeakerLog::Write(1, b"B".to_vec()),
            SpeakerLog::Write(1, b"C".to_vec()),
            SpeakerLog::Finish(1),
            SpeakerLog::Closed(1),
        ]
    );
    assert_eq!(speaker.overlaps(), 0);

    let status = playback.status();
    assert_eq!(status.state, PlaybackState::Idle);
    assert_eq!(status.queued, 0);
    assert!(!status.handle_open);
    assert_eq!(status.chunks_written, 3);
}

#[tokio::test(start_paused = true)]
async fn chunks_enqueued_mid_write_never_overlap() {
    let speaker = MockSpeaker::with_delays(Duration::from_millis(30), Duration::ZERO);
    let (playback, _events) = driver(&speaker);

    for i in 0..5u8 {
        playback.enqueue(chunk(&[i]));
        tokio::time::sleep(Duration::from_millis(7)).await;
    }
    settle(&playback).await;

    assert_eq!(speaker.writes(), (0..5u8).map(|i| vec![i]).collect::<Vec<_>>());
    assert_eq!(speaker.overlaps(), 0);
}

#[tokio::test(start_paused = true)]
async fn interrupt_drops_queued_chunks_but_keeps_later_ones() {
    let speaker = MockSpeaker::with_delays(Duration::from_millis(50), Duration::ZERO);
    let (playback, _events) = driver(&speaker);

    playback.enqueue(chunk(b"A"));
    playback.enqueue(chunk(b"B"));
    playback.enqueue(chunk(b"C"));
    wait_until(|| !speaker.writes().is_empty()).await;

    playback.interrupt();
    playback.enqueue(chunk(b"D"));
    settle(&playback).await;

    assert_eq!(speaker.writes(), vec![b"A".to_vec(), b"D".to_vec()]);
    assert_eq!(
        speaker.log().last(),
        Some(&SpeakerLog::Closed(1)),
        "handle ends gracefully after an interrupt"
    );
}

#[tokio::test(start_paused = true)]
async fn interrupt_with_nothing_following_ends_the_stream() {
    let speaker = MockSpeaker::with_delays(Duration::from_millis(50), Duration::ZERO);
    let (playback, _events) = driver(&speaker);

    playback.enqueue(chunk(b"A"));
    playback.enqueue(chunk(b"B"));
    wait_until(|| !speaker.writes().is_empty()).await;
    playback.interrupt();
    settle(&playback).await;

    assert_eq!(
        speaker.log(),
        vec![
            SpeakerLog::Open(1),
            SpeakerLog::Write(1, b"A".to_vec()),
            SpeakerLog::Finish(1),
            SpeakerLog::Closed(1),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn chunk_arriving_while_stream_ends_gets_a_new_handle() {
    let speaker = MockSpeaker::with_delays(Duration::ZERO, Duration::from_millis(40));
    let (playback, _events) = driver(&speaker);

    playback.enqueue(chunk(b"A"));
    wait_until(|| speaker.log().contains(&SpeakerLog::Finish(1))).await;
    assert_eq!(playback.subscribe().borrow().state, PlaybackState::EndingStream);

    playback.enqueue(chunk(b"B"));
    settle(&playback).await;

    assert_eq!(
        speaker.log(),
        vec![
            SpeakerLog::Open(1),
            SpeakerLog::Write(1, b"A".to_vec()),
            SpeakerLog::Finish(1),
            SpeakerLog::Closed(1),
            SpeakerLog::Open(2),
            SpeakerLog::Write(2, b"B".to_vec()),
            SpeakerLog::Finish(2),
            SpeakerLog::Closed(2),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn reset_aborts_the_handle_mid_write() {
    let speaker = MockSpeaker::with_delays(Duration::from_millis(100), Duration::ZERO);
    let (playback, _events) = driver(&speaker);

    playback.enqueue(chunk(b"A"));
    playback.enqueue(chunk(b"B"));
    wait_until(|| !speaker.writes().is_empty()).await;
    playback.reset();
    settle(&playback).await;

    assert_eq!(
        speaker.log(),
        vec![SpeakerLog::Open(1), SpeakerLog::Write(1, b"A".to_vec()), SpeakerLog::Abort(1)]
    );
    assert!(!playback.status().handle_open);
}

#[tokio::test(start_paused = true)]
async fn open_failure_reports_and_drops_the_queue() {
    let speaker = MockSpeaker::default();
    speaker.fail_open();
    let (playback, mut events) = driver(&speaker);

    playback.enqueue(chunk(b"A"));
    playback.enqueue(chunk(b"B"));

    match next_event(&mut events).await {
        UiEvent::HelperError { error } => assert!(error.contains("no output device"), "{error}"),
        other => panic!("unexpected event {other:?}"),
    }
    settle(&playback).await;
    assert!(speaker.writes().is_empty());
    assert_eq!(playback.status().queued, 0);
}

#[tokio::test(start_paused = true)]
async fn undecodable_chunk_is_skipped() {
    let speaker = MockSpeaker::default();
    let (playback, _events) = driver(&speaker);

    playback.enqueue(AudioChunk::new(Blob {
        mime_type: "audio/pcm;rate=24000".to_string(),
        data: "%%%".to_string(),
    }));
    playback.enqueue(chunk(b"ok"));
    settle(&playback).await;

    assert_eq!(speaker.writes(), vec![b"ok".to_vec()]);
}

#[tokio::test(start_paused = true)]
async fn undecodable_last_chunk_still_ends_the_stream() {
    let speaker = MockSpeaker::with_delays(Duration::from_millis(10), Duration::ZERO);
    let (playback, _events) = driver(&speaker);

    playback.enqueue(chunk(b"A"));
    playback.enqueue(AudioChunk::new(Blob {
        mime_type: "audio/pcm;rate=24000".to_string(),
        data: "%%%".to_string(),
    }));
    settle(&playback).await;

    assert_eq!(
        speaker.log(),
        vec![
            SpeakerLog::Open(1),
            SpeakerLog::Write(1, b"A".to_vec()),
            SpeakerLog::Finish(1),
            SpeakerLog::Closed(1),
        ]
    );
}
