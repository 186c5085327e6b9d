use crate::*;
use std::collections::BTreeSet;

// ── Fault injection ─────────────────────────────────────────────────────────

/// Which transmissions a lossy sender sabotages.
///
/// Faults apply to the first transmission of a chunk only; retransmissions
/// always go out, so every transfer eventually completes.
#[derive(Clone, Copy)]
pub struct FaultPlan {
    /// Drop the first transmission of every Nth chunk. 0 = never.
    pub drop_every: usize,
    /// Send every Nth chunk twice. 0 = never.
    pub duplicate_every: usize,
}

impl FaultPlan {
    fn drops(&self, index: usize) -> bool {
        self.drop_every != 0 && index % self.drop_every == 0
    }

    fn duplicates(&self, index: usize) -> bool {
        self.duplicate_every != 0 && index % self.duplicate_every == 0
    }
}

/// Send `chunks` in windows of `window`, each window in reverse order,
/// injecting `plan` faults and retransmitting whatever is not acked.
/// Returns how many retransmissions were needed.
pub async fn send_lossy(
    sender: &TestSender,
    chunks: &[Chunk],
    window: usize,
    plan: FaultPlan,
) -> Result<usize> {
    let mut retransmissions = 0;

    for batch in chunks.chunks(window) {
        let mut pending: BTreeSet<u32> = batch.iter().map(|c| c.sequence).collect();

        for chunk in batch.iter().rev() {
            let index = chunk.sequence as usize;
            if plan.drops(index) {
                continue;
            }
            sender.send(chunk).await?;
            if plan.duplicates(index) {
                sender.send(chunk).await?;
            }
        }

        let mut rounds = 0;
        while !pending.is_empty() {
            match sender.recv_ack(SILENCE).await? {
                Some(seq) => {
                    pending.remove(&seq);
                }
                None => {
                    rounds += 1;
                    if rounds > 10 {
                        bail!("gave up with {} chunks unacknowledged", pending.len());
                    }
                    for &seq in &pending {
                        sender.send(&chunks[seq as usize]).await?;
                        retransmissions += 1;
                    }
                }
            }
        }
    }

    // Swallow late acks for duplicates so the caller starts clean.
    while sender.recv_ack(SILENCE).await?.is_some() {}

    Ok(retransmissions)
}

// ── Tests ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_transfer_survives_loss_and_duplication() -> Result<()> {
    let dir = ScratchDir::new("lossy");
    let output = dir.path().join("received.bin");
    let receiver = TestReceiver::start(&output, 0).await?;
    let sender = TestSender::connect(receiver.addr).await?;

    let data = sample_file(40 * 256);
    let chunks = chunks_of(&data, 256);
    let plan = FaultPlan {
        drop_every: 3,
        duplicate_every: 5,
    };

    let retransmissions = send_lossy(&sender, &chunks, 8, plan).await?;
    assert!(retransmissions > 0, "plan should have forced retransmissions");
    sender.send_acked(&Chunk::eof()).await?;

    assert_eq!(std::fs::read(&output)?, data);

    let summary = receiver.stop().await?;
    assert!(summary.stats.duplicates() > 0);
    assert_eq!(
        summary.stats.accepted + summary.stats.drained,
        chunks.len() as u64
    );
    Ok(())
}

#[tokio::test]
async fn test_reorder_window_defers_far_chunks() -> Result<()> {
    let dir = ScratchDir::new("window");
    let output = dir.path().join("received.bin");
    let receiver = TestReceiver::start(&output, 4).await?;
    let sender = TestSender::connect(receiver.addr).await?;

    let data = sample_file(12 * 64);
    let chunks = chunks_of(&data, 64);

    // Too far ahead: silently refused, so the sender has to come back for it.
    sender.send(&chunks[10]).await?;
    assert_eq!(sender.recv_ack(SILENCE).await?, None);

    // Windows of 4 always fit, even in reverse.
    let retransmissions = send_lossy(
        &sender,
        &chunks,
        4,
        FaultPlan {
            drop_every: 0,
            duplicate_every: 0,
        },
    )
    .await?;
    assert_eq!(retransmissions, 0);
    sender.send_acked(&Chunk::eof()).await?;

    assert_eq!(std::fs::read(&output)?, data);

    let summary = receiver.stop().await?;
    assert_eq!(summary.stats.beyond_window, 1);
    Ok(())
}
