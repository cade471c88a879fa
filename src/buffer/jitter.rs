//! Ingress Jitter Buffer: a fixed-cadence reclocking queue that smooths
//! variable packet arrival into a steady 20 ms output cadence.
//!
//! Oblivious to RTP sequence numbers — the caller is assumed to hand frames
//! in arrival order already. Reordering is not corrected here.

use std::{collections::VecDeque, sync::Arc, time::Duration};

use tokio::{sync::Notify, time::Instant};

use crate::constants::FRAME_INTERVAL;

/// Plain reclocking queue: the data structure and overflow policy, with no
/// notion of wall-clock pacing. The pacing loop lives in [`run`].
pub struct JitterBuffer {
    queue: VecDeque<Vec<u8>>,
    max_frames: usize,
    dropped: u64,
}

impl JitterBuffer {
    /// Creates an empty buffer with the given maximum depth.
    pub fn new(max_frames: usize) -> Self {
        Self {
            queue: VecDeque::new(),
            max_frames,
            dropped: 0,
        }
    }

    /// Appends a frame, dropping the oldest queued frame first if the
    /// buffer is already at capacity.
    pub fn push(&mut self, frame: Vec<u8>) {
        if self.queue.len() >= self.max_frames {
            self.queue.pop_front();
            self.dropped += 1;
            tracing::warn!(dropped_total = self.dropped, "jitter buffer overflow, dropping oldest frame");
        }
        self.queue.push_back(frame);
    }

    /// Removes and returns the oldest queued frame, if any.
    pub fn pop(&mut self) -> Option<Vec<u8>> {
        self.queue.pop_front()
    }

    /// Current number of queued frames.
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Whether the buffer currently holds no frames.
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Total frames dropped to overflow since creation.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Removes and returns every queued frame, oldest first, leaving the
    /// buffer empty. Used on shutdown to flush.
    pub fn drain_all(&mut self) -> Vec<Vec<u8>> {
        self.queue.drain(..).collect()
    }
}

/// Runs the jitter buffer's emission loop until `cancel` is notified or
/// `input` disconnects and drains empty.
///
/// `target` is the depth (in wall-clock time) the buffer tries to maintain
/// before it starts emitting; `max_frames` is the hard cap enforced by
/// [`JitterBuffer::push`]. On cancellation, remaining frames are flushed to
/// `output` before returning.
pub async fn run(
    target: Duration,
    max_frames: usize,
    input: flume::Receiver<Vec<u8>>,
    output: flume::Sender<Vec<u8>>,
    cancel: Arc<Notify>,
) {
    let target_frames =
        ((target.as_millis() / FRAME_INTERVAL.as_millis().max(1)) as usize).max(1);
    let mut buf = JitterBuffer::new(max_frames);
    let mut last_emit = Instant::now();

    loop {
        while let Ok(frame) = input.try_recv() {
            buf.push(frame);
        }

        let depth = buf.len();
        let sleep_for = if depth >= target_frames {
            let elapsed = last_emit.elapsed();
            if let Some(frame) = buf.pop() {
                if output.send_async(frame).await.is_err() {
                    return;
                }
            }
            last_emit = Instant::now();
            FRAME_INTERVAL.saturating_sub(elapsed)
        } else if depth >= 1 {
            FRAME_INTERVAL / 2
        } else {
            FRAME_INTERVAL
        };

        tokio::select! {
            _ = tokio::time::sleep(sleep_for) => {}
            _ = cancel.notified() => {
                for frame in buf.drain_all() {
                    if output.send_async(frame).await.is_err() {
                        break;
                    }
                }
                return;
            }
        }

        if input.is_disconnected() {
            while let Ok(frame) = input.try_recv() {
                buf.push(frame);
            }
            for frame in buf.drain_all() {
                if output.send_async(frame).await.is_err() {
                    break;
                }
            }
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preserves_fifo_order() {
        let mut buf = JitterBuffer::new(10);
        for i in 0..5u8 {
            buf.push(vec![i]);
        }
        let mut out = Vec::new();
        while let Some(f) = buf.pop() {
            out.push(f[0]);
        }
        assert_eq!(out, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn overflow_drops_oldest() {
        let mut buf = JitterBuffer::new(3);
        for i in 1..=5u8 {
            buf.push(vec![i]);
        }
        assert_eq!(buf.dropped(), 2);
        let remaining: Vec<u8> = buf.drain_all().into_iter().map(|f| f[0]).collect();
        assert_eq!(remaining, vec![3, 4, 5]);
    }

    #[tokio::test(start_paused = true)]
    async fn emits_at_steady_cadence() {
        let (tx_in, rx_in) = flume::bounded(200);
        let (tx_out, rx_out) = flume::bounded(200);
        let cancel = Arc::new(Notify::new());

        for i in 0..4u8 {
            tx_in.send(vec![i; 320]).unwrap();
        }

        let cancel_clone = cancel.clone();
        let handle = tokio::spawn(run(
            Duration::from_millis(40),
            200,
            rx_in,
            tx_out,
            cancel_clone,
        ));

        let first = rx_out.recv_async().await.unwrap();
        assert_eq!(first[0], 0);

        cancel.notify_waiters();
        let _ = handle.await;

        let mut rest = vec![first[0]];
        while let Ok(f) = rx_out.try_recv() {
            rest.push(f[0]);
        }
        assert_eq!(rest, vec![0, 1, 2, 3]);
    }
}
