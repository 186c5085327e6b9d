use crate::*;

#[tokio::test]
async fn test_interrupted_transfer_is_flushed() -> Result<()> {
    let dir = ScratchDir::new("interrupted");
    let output = dir.path().join("received.bin");
    let receiver = TestReceiver::start(&output, 0).await?;
    let sender = TestSender::connect(receiver.addr).await?;

    sender.send_acked(&Chunk::new(0, &b"kept "[..])).await?;
    sender.send_acked(&Chunk::new(1, &b"also kept"[..])).await?;
    // Chunk 2 never arrives, so chunk 3 stays buffered and is lost.
    sender.send_acked(&Chunk::new(3, &b"stranded"[..])).await?;
    assert!(!output.exists());

    let summary = receiver.stop().await?;
    assert_eq!(summary.partial_bytes, Some(14));
    assert_eq!(std::fs::read(&output)?, b"kept also kept");
    Ok(())
}

#[tokio::test]
async fn test_idle_shutdown_writes_nothing() -> Result<()> {
    let dir = ScratchDir::new("idle");
    let output = dir.path().join("received.bin");
    let receiver = TestReceiver::start(&output, 0).await?;

    let summary = receiver.stop().await?;
    assert_eq!(summary.partial_bytes, None);
    assert_eq!(summary.stats.datagrams, 0);
    assert!(!output.exists());
    Ok(())
}

#[tokio::test]
async fn test_shutdown_after_eof_does_not_rewrite() -> Result<()> {
    let dir = ScratchDir::new("after-eof");
    let output = dir.path().join("received.bin");
    let receiver = TestReceiver::start(&output, 0).await?;
    let sender = TestSender::connect(receiver.addr).await?;

    sender.send_acked(&Chunk::new(0, &b"complete"[..])).await?;
    sender.send_acked(&Chunk::eof()).await?;

    let summary = receiver.stop().await?;
    assert_eq!(summary.partial_bytes, None);
    assert_eq!(summary.stats.files_written, 1);
    assert_eq!(std::fs::read(&output)?, b"complete");
    Ok(())
}

#[tokio::test]
async fn test_unwritable_output_fails_the_flush() -> Result<()> {
    let dir = ScratchDir::new("unwritable");
    std::fs::create_dir_all(dir.path())?;
    let blocker = dir.path().join("blocker");
    std::fs::write(&blocker, b"a file, not a directory")?;

    let receiver = TestReceiver::start(&blocker.join("received.bin"), 0).await?;
    let sender = TestSender::connect(receiver.addr).await?;
    sender.send_acked(&Chunk::new(0, &b"doomed"[..])).await?;

    let err = receiver
        .stop()
        .await
        .expect_err("flush into a file path must fail");
    assert!(format!("{err:#}").contains("failed to create output dir"));
    Ok(())
}
