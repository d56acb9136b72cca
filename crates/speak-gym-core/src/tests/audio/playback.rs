use crate::{
    CoreError, CoreResult,
    audio::{AudioOutput, Clip, PlaybackEvent, PlaybackQueue, wav},
    tests::support::{FakeOutput, silent_wav, zero_rate_wav},
};

use std::{
    panic::Location,
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use error_location::ErrorLocation;
use tokio::{sync::broadcast, time::timeout};

async fn wait_for(
    events: &mut broadcast::Receiver<PlaybackEvent>,
    wanted: impl Fn(&PlaybackEvent) -> bool,
) -> Vec<PlaybackEvent> {
    let mut seen = Vec::new();
    timeout(Duration::from_secs(5), async {
        loop {
            let event = events.recv().await.unwrap();
            let done = wanted(&event);
            seen.push(event);
            if done {
                break;
            }
        }
    })
    .await
    .unwrap();
    seen
}

/// WHAT: Clips play one at a time in enqueue order
/// WHY: Overlapping tutor audio is unintelligible
#[tokio::test]
async fn given_three_clips_when_enqueued_back_to_back_then_played_fifo_without_overlap() {
    // Given: An idle queue and three clips
    let output = FakeOutput::new(Duration::from_millis(20));
    let queue = PlaybackQueue::spawn(output.clone());
    let mut events = queue.subscribe();
    let clips = [silent_wav(), silent_wav(), silent_wav()];

    // When: Enqueuing all three at once
    for clip in &clips {
        queue.enqueue(clip.clone()).unwrap();
    }
    wait_for(&mut events, |e| *e == PlaybackEvent::Idle).await;

    // Then: Played in order, never concurrently
    let ids: Vec<_> = clips.iter().map(|c| c.id()).collect();
    assert_eq!(output.started(), ids);
    assert_eq!(output.finished(), ids);
    assert_eq!(output.max_playing(), 1);

    queue.shutdown().await;
}

/// WHAT: A failing clip is skipped and the next one still plays
/// WHY: One bad clip must not stall the queue
#[tokio::test]
async fn given_failing_clip_when_playing_then_queue_advances() {
    // Given: Two clips, the first undecodable
    let output = FakeOutput::new(Duration::from_millis(5));
    let queue = PlaybackQueue::spawn(output.clone());
    let mut events = queue.subscribe();
    let (bad, good) = (silent_wav(), silent_wav());
    output.fail(&bad);

    // When: Enqueuing both
    queue.enqueue(bad.clone()).unwrap();
    queue.enqueue(good.clone()).unwrap();
    let seen = wait_for(&mut events, |e| *e == PlaybackEvent::Idle).await;

    // Then: Failure reported, second clip finished
    assert!(seen.iter().any(|e| matches!(
        e,
        PlaybackEvent::Failed { clip_id, .. } if *clip_id == bad.id()
    )));
    assert_eq!(output.finished(), vec![good.id()]);

    queue.shutdown().await;
}

/// WHAT: stop_all halts the current clip and drops the pending ones
/// WHY: Replaying feedback must not wait behind stale audio
#[tokio::test]
async fn given_playing_queue_when_stop_all_then_current_interrupted_and_pending_discarded() {
    // Given: One long clip playing, two waiting
    let output = FakeOutput::new(Duration::from_secs(30));
    let queue = PlaybackQueue::spawn(output.clone());
    let mut events = queue.subscribe();
    let clips = [silent_wav(), silent_wav(), silent_wav()];
    for clip in &clips {
        queue.enqueue(clip.clone()).unwrap();
    }
    wait_for(&mut events, |e| matches!(e, PlaybackEvent::Started { .. })).await;

    // When: Stopping everything
    queue.stop_all().unwrap();
    let seen = wait_for(&mut events, |e| *e == PlaybackEvent::Idle).await;

    // Then: First interrupted, two discarded, nothing playing
    assert!(seen.contains(&PlaybackEvent::Interrupted {
        clip_id: clips[0].id()
    }));
    assert!(seen.contains(&PlaybackEvent::Stopped { discarded: 2 }));
    assert_eq!(output.started(), vec![clips[0].id()]);
    assert_eq!(output.playing(), 0);

    queue.shutdown().await;
}

/// WHAT: A clip enqueued right after stop_all still plays
/// WHY: Commands are applied in order, so replay works immediately
#[tokio::test]
async fn given_stop_all_then_enqueue_when_processed_then_new_clip_plays() {
    // Given: A long clip playing
    let output = FakeOutput::new(Duration::from_millis(10));
    let queue = PlaybackQueue::spawn(output.clone());
    let mut events = queue.subscribe();
    let old = silent_wav();
    queue.enqueue(old.clone()).unwrap();

    // When: stop_all immediately followed by enqueue
    let fresh = silent_wav();
    queue.stop_all().unwrap();
    queue.enqueue(fresh.clone()).unwrap();
    wait_for(&mut events, |e| {
        *e == PlaybackEvent::Finished {
            clip_id: fresh.id(),
        }
    })
    .await;

    // Then: The fresh clip played to the end
    assert!(output.finished().contains(&fresh.id()));
    assert_eq!(output.max_playing(), 1);

    queue.shutdown().await;
}

/// Speaker that decodes each clip and waits out its length, like the device
/// backend does.
#[derive(Default)]
struct DecodingOutput {
    played: Mutex<Vec<uuid::Uuid>>,
}

#[async_trait]
impl AudioOutput for DecodingOutput {
    async fn play(&self, clip: &Clip) -> CoreResult<()> {
        let pcm = wav::decode(clip.bytes()).map_err(|e| CoreError::PlaybackFailure {
            clip_id: clip.id(),
            reason: e.to_string(),
            location: ErrorLocation::from(Location::caller()),
        })?;
        tokio::time::sleep(pcm.duration()).await;
        self.played.lock().unwrap().push(clip.id());
        Ok(())
    }
}

/// WHAT: A synthesized clip whose header claims 0 Hz fails and the queue
/// keeps playing
/// WHY: One malformed synthesis reply must not take the playback task down
#[tokio::test]
async fn given_zero_rate_clip_when_decoded_for_playback_then_skipped_and_queue_survives() {
    // Given: A decoding speaker, a broken clip and a good one
    let output = Arc::new(DecodingOutput::default());
    let queue = PlaybackQueue::spawn(output.clone());
    let mut events = queue.subscribe();
    let (broken, good) = (zero_rate_wav(), silent_wav());

    // When
    queue.enqueue(broken.clone()).unwrap();
    queue.enqueue(good.clone()).unwrap();
    let seen = wait_for(&mut events, |e| *e == PlaybackEvent::Idle).await;

    // Then: Broken clip reported, good clip played, queue still accepts work
    assert!(seen.iter().any(|e| matches!(
        e,
        PlaybackEvent::Failed { clip_id, .. } if *clip_id == broken.id()
    )));
    assert_eq!(*output.played.lock().unwrap(), vec![good.id()]);

    let later = silent_wav();
    queue.enqueue(later.clone()).unwrap();
    wait_for(&mut events, |e| {
        *e == PlaybackEvent::Finished {
            clip_id: later.id(),
        }
    })
    .await;

    queue.shutdown().await;
}
