mod common;

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use common::*;
use objscope::detection::DetectionAdapter;
use objscope::driver::{DriverEvent, DriverState};
use objscope::error::DetectError;
use objscope::render::PALETTE;

#[tokio::test]
async fn pause_discards_the_in_flight_result() -> anyhow::Result<()> {
    let (model, mut gate) = GatedModel::new(pets());
    let ctx = context(adapter(model));
    let (mut driver, mut rx) = ctx.driver();

    let first = driver.start(MemorySource::endless(100, 100).boxed()).await?;
    let stale = first.epoch();
    first.spawn();

    gate.wait_started().await;
    driver.pause()?;
    gate.release(1);

    assert_quiet(&mut rx, Duration::from_millis(150)).await;
    assert_eq!(driver.state(), DriverState::Paused);
    assert!(!driver.is_current(stale));

    // A resumed loop publishes under its own epoch.
    let resumed = driver.resume()?;
    let epoch = resumed.epoch();
    resumed.spawn();
    gate.wait_started().await;
    gate.release(1);

    match next_event(&mut rx).await {
        DriverEvent::Frame(output) => {
            assert_eq!(output.epoch, epoch);
            assert_eq!(output.batch.len(), 3);
        }
        other => panic!("expected a frame, got {other:?}"),
    }
    Ok(())
}

#[tokio::test]
async fn stop_discards_the_in_flight_result_and_closes_the_source() -> anyhow::Result<()> {
    let (model, mut gate) = GatedModel::new(pets());
    let ctx = context(adapter(model));
    let (mut driver, mut rx) = ctx.driver();

    let source = MemorySource::endless(32, 32);
    let closed = source.closed.clone();
    driver.start(source.boxed()).await?.spawn();

    gate.wait_started().await;
    driver.stop();
    gate.release(1);

    assert_quiet(&mut rx, Duration::from_millis(150)).await;
    assert_eq!(driver.state(), DriverState::Stopped);
    assert!(closed.load(Ordering::SeqCst));
    Ok(())
}

#[tokio::test]
async fn denied_camera_leaves_the_driver_idle() {
    let ctx = context(adapter(ScriptedModel::always(pets())));
    let (mut driver, mut rx) = ctx.driver();
    let before = driver.epoch();

    let err = driver
        .start(MemorySource::failing_open("Permission denied").boxed())
        .await
        .err()
        .expect("start should fail");

    match err {
        DetectError::SourceAcquisition(message) => assert!(message.contains("Permission denied")),
        other => panic!("expected an acquisition error, got {other:?}"),
    }
    assert_eq!(driver.state(), DriverState::Idle);
    assert_eq!(driver.epoch(), before);
    assert!(driver.last_error().is_some());
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn frame_errors_do_not_halt_the_loop() -> anyhow::Result<()> {
    let model = Arc::new(ScriptedModel::scripted(vec![Err("tensor shape".into())], pets()));
    let adapter = Arc::new(DetectionAdapter::new(ReadyLoader::shared(model.clone())));
    let ctx = context(adapter);
    let (mut driver, mut rx) = ctx.driver();

    // The first source read fails, then the first detection fails.
    let source = MemorySource::endless(100, 100).with_error_at(0);
    driver.start(source.boxed()).await?.spawn();

    match next_event(&mut rx).await {
        DriverEvent::Frame(output) => assert_eq!(output.batch.len(), 3),
        other => panic!("expected a frame, got {other:?}"),
    }
    assert!(model.calls.load(Ordering::SeqCst) >= 2);
    assert_eq!(driver.state(), DriverState::Running);
    driver.stop();
    Ok(())
}

#[tokio::test]
async fn source_end_stops_the_driver() -> anyhow::Result<()> {
    let ctx = context(adapter(ScriptedModel::always(pets())));
    let (mut driver, mut rx) = ctx.driver();
    let run = driver.start(MemorySource::frames(3, 64, 48).boxed()).await?;
    let epoch = run.epoch();
    run.spawn();

    let mut frames = 0;
    loop {
        match next_event(&mut rx).await {
            DriverEvent::Frame(output) => {
                assert_eq!(output.epoch, epoch);
                assert_eq!(output.overlay.dimensions(), (64, 48));
                frames += 1;
            }
            DriverEvent::Ended { epoch: ended } => {
                assert_eq!(ended, epoch);
                break;
            }
            DriverEvent::Failed { error, .. } => panic!("unexpected failure: {error}"),
        }
    }
    assert_eq!(frames, 3);
    assert_eq!(driver.state(), DriverState::Stopped);

    // A stopped driver can be started again.
    let again = driver.start(MemorySource::frames(1, 8, 8).boxed()).await?;
    assert!(again.epoch() > epoch);
    Ok(())
}

#[tokio::test]
async fn overlay_draws_boxes_in_palette_order() -> anyhow::Result<()> {
    let ctx = context(adapter(ScriptedModel::always(pets())));
    let (mut driver, mut rx) = ctx.driver();
    driver.start(MemorySource::frames(1, 100, 100).boxed()).await?.spawn();

    let DriverEvent::Frame(output) = next_event(&mut rx).await else {
        panic!("expected a frame");
    };
    let first = PALETTE[0].rgba();
    let second = PALETTE[1].rgba();
    // Top edge of the first box, left edge of the second.
    assert_eq!(*output.overlay.get_pixel(20, 30), first);
    assert_eq!(*output.overlay.get_pixel(60, 45), second);
    // Away from every box the overlay stays transparent.
    assert_eq!(output.overlay.get_pixel(95, 5).0[3], 0);
    Ok(())
}

#[tokio::test]
async fn model_load_failure_is_reported_once() -> anyhow::Result<()> {
    let loader = ReadyLoader::new(ScriptedModel::always(pets())).failing_first(1);
    let loads = loader.loads.clone();
    let ctx = context(Arc::new(DetectionAdapter::new(loader)));
    let (mut driver, mut rx) = ctx.driver();
    driver.start(MemorySource::endless(16, 16).boxed()).await?.spawn();

    match next_event(&mut rx).await {
        DriverEvent::Failed { error, .. } => assert!(matches!(error, DetectError::ModelLoad(_))),
        other => panic!("expected a failure, got {other:?}"),
    }
    assert_eq!(driver.state(), DriverState::Stopped);
    assert_quiet(&mut rx, Duration::from_millis(50)).await;
    assert_eq!(loads.load(Ordering::SeqCst), 1);

    // An explicit retry loads again and playback works.
    driver.start(MemorySource::frames(1, 16, 16).boxed()).await?.spawn();
    assert!(matches!(next_event(&mut rx).await, DriverEvent::Frame(_)));
    assert_eq!(loads.load(Ordering::SeqCst), 2);
    Ok(())
}
