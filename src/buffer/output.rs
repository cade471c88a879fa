//! Egress Output Buffer: reframes arbitrary-length PCM16 chunks produced by
//! the dialog client into exact 20 ms frames for the paced RTP sender.

use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
    time::Duration,
};

use tokio::{sync::Notify, time::Instant};

use crate::constants::{FRAME_INTERVAL, TELEPHONY_PCM_FRAME_BYTES};

/// Byte-accumulator reframer plus its bounded input queue.
///
/// Locked briefly and synchronously by both the emission loop ([`run`]) and
/// a session's barge-in handling (via [`OutputBuffer::clear`]); never held
/// across an `.await`.
pub struct OutputBuffer {
    accumulator: VecDeque<u8>,
    pending: VecDeque<Vec<u8>>,
    max_chunks: usize,
    dropped: u64,
}

impl OutputBuffer {
    /// Creates an empty buffer with the given maximum pending-chunk depth.
    pub fn new(max_chunks: usize) -> Self {
        Self {
            accumulator: VecDeque::new(),
            pending: VecDeque::new(),
            max_chunks,
            dropped: 0,
        }
    }

    /// Queues a chunk, dropping the oldest pending chunk first if at
    /// capacity.
    pub fn push_chunk(&mut self, chunk: Vec<u8>) {
        if self.pending.len() >= self.max_chunks {
            self.pending.pop_front();
            self.dropped += 1;
            tracing::warn!(dropped_total = self.dropped, "output buffer overflow, dropping oldest chunk");
        }
        self.pending.push_back(chunk);
    }

    fn absorb_pending(&mut self) {
        while let Some(chunk) = self.pending.pop_front() {
            self.accumulator.extend(chunk);
        }
    }

    /// Pulls a full `frame_bytes`-sized frame out of the accumulator,
    /// absorbing any pending chunks first. Returns `None` if fewer than
    /// `frame_bytes` bytes are available.
    pub fn try_take_frame(&mut self, frame_bytes: usize) -> Option<Vec<u8>> {
        self.absorb_pending();
        if self.accumulator.len() >= frame_bytes {
            Some(self.accumulator.drain(..frame_bytes).collect())
        } else {
            None
        }
    }

    /// Whether there is any queued or accumulated audio at all.
    pub fn has_pending(&mut self) -> bool {
        self.absorb_pending();
        !self.accumulator.is_empty()
    }

    /// Number of whole `frame_bytes`-sized frames currently available,
    /// without consuming them.
    pub fn available_frames(&mut self, frame_bytes: usize) -> usize {
        self.absorb_pending();
        self.accumulator.len() / frame_bytes
    }

    /// Total chunks dropped to overflow since creation.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Drains every full frame currently available, discarding any
    /// sub-frame tail. Used on shutdown flush.
    pub fn flush_full_frames(&mut self, frame_bytes: usize) -> Vec<Vec<u8>> {
        self.absorb_pending();
        let mut frames = Vec::new();
        while self.accumulator.len() >= frame_bytes {
            frames.push(self.accumulator.drain(..frame_bytes).collect());
        }
        self.accumulator.clear();
        frames
    }

    /// Drops all pending chunks, the accumulator, and any sub-frame tail.
    /// Used to implement "interrupt egress" on barge-in.
    pub fn clear(&mut self) {
        self.pending.clear();
        self.accumulator.clear();
    }
}

/// Runs the output buffer's emission loop until `cancel` is notified or
/// `input` disconnects and drains empty.
///
/// `buffer` is shared with the owning session so that barge-in handling can
/// call [`OutputBuffer::clear`] concurrently. `target` is the depth (in
/// wall-clock time) the buffer tries to build up before it starts emitting,
/// mirroring the jitter buffer's own target-depth gate.
pub async fn run(
    buffer: Arc<Mutex<OutputBuffer>>,
    target: Duration,
    input: flume::Receiver<Vec<u8>>,
    output: flume::Sender<Vec<u8>>,
    cancel: Arc<Notify>,
) {
    let target_frames =
        ((target.as_millis() / FRAME_INTERVAL.as_millis().max(1)) as usize).max(1);
    let mut last_emit = Instant::now();

    loop {
        while let Ok(chunk) = input.try_recv() {
            buffer.lock().expect("output buffer mutex poisoned").push_chunk(chunk);
        }

        let depth = buffer
            .lock()
            .expect("output buffer mutex poisoned")
            .available_frames(TELEPHONY_PCM_FRAME_BYTES);

        let sleep_for = if depth >= target_frames {
            let elapsed = last_emit.elapsed();
            let frame = buffer
                .lock()
                .expect("output buffer mutex poisoned")
                .try_take_frame(TELEPHONY_PCM_FRAME_BYTES);
            if let Some(frame) = frame {
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
                let frames = buffer
                    .lock()
                    .expect("output buffer mutex poisoned")
                    .flush_full_frames(TELEPHONY_PCM_FRAME_BYTES);
                for frame in frames {
                    if output.send_async(frame).await.is_err() {
                        break;
                    }
                }
                return;
            }
        }

        if input.is_disconnected() {
            while let Ok(chunk) = input.try_recv() {
                buffer.lock().expect("output buffer mutex poisoned").push_chunk(chunk);
            }
            let frames = buffer
                .lock()
                .expect("output buffer mutex poisoned")
                .flush_full_frames(TELEPHONY_PCM_FRAME_BYTES);
            for frame in frames {
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
    fn reframes_arbitrary_chunks_into_exact_frames() {
        let mut buf = OutputBuffer::new(200);
        buf.push_chunk(vec![0xAA; 100]);
        buf.push_chunk(vec![0xBB; 500]);
        let mut frames = Vec::new();
        while let Some(f) = buf.try_take_frame(320) {
            frames.push(f);
        }
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].len(), 320);
        assert!(buf.has_pending());
    }

    #[test]
    fn overflow_drops_oldest_chunk() {
        let mut buf = OutputBuffer::new(2);
        buf.push_chunk(vec![1; 10]);
        buf.push_chunk(vec![2; 10]);
        buf.push_chunk(vec![3; 10]);
        assert_eq!(buf.dropped(), 1);
        let frame = buf.try_take_frame(20).expect("two chunks of 10 bytes");
        assert_eq!(&frame[..10], &[2u8; 10]);
        assert_eq!(&frame[10..], &[3u8; 10]);
    }

    #[test]
    fn flush_discards_sub_frame_tail() {
        let mut buf = OutputBuffer::new(200);
        buf.push_chunk(vec![0xAA; 960]);
        buf.push_chunk(vec![0xBB; 100]);
        let frames = buf.flush_full_frames(320);
        assert_eq!(frames.len(), 3);
        assert!(!buf.has_pending());
    }

    #[test]
    fn clear_drops_everything() {
        let mut buf = OutputBuffer::new(200);
        buf.push_chunk(vec![0xAA; 9600]);
        buf.clear();
        assert!(!buf.has_pending());
        assert!(buf.try_take_frame(320).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn emits_ten_frames_at_steady_cadence_for_one_burst() {
        let (tx_in, rx_in) = flume::bounded(200);
        let (tx_out, rx_out) = flume::bounded(200);
        let shared = Arc::new(Mutex::new(OutputBuffer::new(200)));
        let cancel = Arc::new(Notify::new());

        tx_in.send(vec![0x11u8; 9600]).unwrap();

        let cancel_clone = cancel.clone();
        let handle = tokio::spawn(run(shared, Duration::from_millis(20), rx_in, tx_out, cancel_clone));

        let mut count = 0;
        for _ in 0..10 {
            let frame = rx_out.recv_async().await.unwrap();
            assert_eq!(frame.len(), 320);
            count += 1;
        }
        assert_eq!(count, 10);

        cancel.notify_waiters();
        let _ = handle.await;
    }
}
