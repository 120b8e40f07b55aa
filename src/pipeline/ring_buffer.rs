//! Lock-free single-producer/single-consumer ring buffer for audio frames.
//!
//! This is the only state shared between the emulator thread and the host
//! audio thread, so it has to be wait-free on both sides:
//!   - The producer WRITES interleaved frames (never blocks, never resizes)
//!   - The consumer READS interleaved frames (never blocks, returns short)
//!   - NO MUTEX is ever involved — atomic read/write positions only
//!
//! Capacity is always a power of two so position arithmetic is a mask, and
//! one slot stays reserved to distinguish full from empty:
//! `available_read + available_write == capacity - 1` at all times.

use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

/// Keeps the two atomic positions on distinct cache lines so the producer
/// and consumer cores don't false-share.
#[repr(align(64))]
struct CacheAligned<T>(T);

/// Counters maintained by the ring for observability.
///
/// `total_written`/`overruns` are updated by the producer role,
/// `total_read`/`underruns` by the consumer role. Reads from the other side
/// may be stale but are never torn.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RingStats {
    /// Frames successfully written.
    pub total_written: u64,
    /// Frames successfully read.
    pub total_read: u64,
    /// Writes rejected because the ring was too full.
    pub overruns: u64,
    /// Reads that found less data than requested (including empty reads).
    pub underruns: u64,
}

struct RingCore<T> {
    write_pos: CacheAligned<AtomicUsize>,
    read_pos: CacheAligned<AtomicUsize>,
    buffer: Box<[UnsafeCell<T>]>,
    /// Capacity in frames; always a power of two.
    capacity: usize,
    /// `capacity - 1`, for masked position arithmetic.
    mask: usize,
    channels: usize,
    total_written: AtomicU64,
    total_read: AtomicU64,
    overruns: AtomicU64,
    underruns: AtomicU64,
}

// Safety: the buffer interior is only touched through the atomic positions.
// The producer writes only slots in [write_pos, write_pos + n) before
// publishing write_pos with Release; the consumer reads only slots in
// [read_pos, write_pos) after an Acquire load of write_pos. Each position
// has exactly one writer, so the usual data-race rules reduce to the
// Acquire/Release pairing on the positions.
unsafe impl<T: Send> Sync for RingCore<T> {}

impl<T: Copy> RingCore<T> {
    fn available_read(&self) -> usize {
        let w = self.write_pos.0.load(Ordering::Acquire);
        let r = self.read_pos.0.load(Ordering::Acquire);
        w.wrapping_sub(r) & self.mask
    }

    fn available_write(&self) -> usize {
        let w = self.write_pos.0.load(Ordering::Acquire);
        let r = self.read_pos.0.load(Ordering::Acquire);
        r.wrapping_sub(w).wrapping_sub(1) & self.mask
    }

    fn fill_fraction(&self) -> f32 {
        self.available_read() as f32 / self.capacity as f32
    }

    fn stats(&self) -> RingStats {
        RingStats {
            total_written: self.total_written.load(Ordering::Relaxed),
            total_read: self.total_read.load(Ordering::Relaxed),
            overruns: self.overruns.load(Ordering::Relaxed),
            underruns: self.underruns.load(Ordering::Relaxed),
        }
    }

    fn reset_stats(&self) {
        self.total_written.store(0, Ordering::Relaxed);
        self.total_read.store(0, Ordering::Relaxed);
        self.overruns.store(0, Ordering::Relaxed);
        self.underruns.store(0, Ordering::Relaxed);
    }
}

/// Creates an SPSC ring for interleaved frames of `T`.
///
/// `capacity_frames` is rounded up to the next power of two (at least 1).
/// The backing buffer holds `capacity × channels` samples, zero-initialised.
///
/// Returns the producer and consumer halves. Each half is `Send`, so the
/// two roles can live on different threads; neither half can be cloned, so
/// the single-producer/single-consumer discipline is enforced by ownership.
///
/// # Panics
///
/// Panics if `channels` is zero.
pub fn spsc_ring<T: Copy + Default + Send>(
    capacity_frames: usize,
    channels: usize,
) -> (RingProducer<T>, RingConsumer<T>) {
    assert!(channels > 0, "ring requires at least one channel");
    let capacity = capacity_frames.max(1).next_power_of_two();

    let buffer = (0..capacity * channels)
        .map(|_| UnsafeCell::new(T::default()))
        .collect::<Vec<_>>()
        .into_boxed_slice();

    let core = Arc::new(RingCore {
        write_pos: CacheAligned(AtomicUsize::new(0)),
        read_pos: CacheAligned(AtomicUsize::new(0)),
        buffer,
        capacity,
        mask: capacity - 1,
        channels,
        total_written: AtomicU64::new(0),
        total_read: AtomicU64::new(0),
        overruns: AtomicU64::new(0),
        underruns: AtomicU64::new(0),
    });

    (
        RingProducer {
            core: Arc::clone(&core),
        },
        RingConsumer { core },
    )
}

/// The writing half of an SPSC ring.
pub struct RingProducer<T> {
    core: Arc<RingCore<T>>,
}

impl<T: Copy> RingProducer<T> {
    /// Appends `src.len() / channels` interleaved frames.
    ///
    /// All-or-nothing: if the ring cannot hold the whole slice, nothing is
    /// written, `overruns` is incremented, and `false` is returned. The
    /// caller decides the overflow policy (drop oldest, drop newest, ...).
    pub fn write(&mut self, src: &[T]) -> bool {
        let core = &*self.core;
        debug_assert_eq!(src.len() % core.channels, 0, "partial frame write");
        let frames = src.len() / core.channels;
        if frames == 0 {
            return true;
        }

        let w = core.write_pos.0.load(Ordering::Relaxed);
        let r = core.read_pos.0.load(Ordering::Acquire);
        let available = r.wrapping_sub(w).wrapping_sub(1) & core.mask;

        if frames > available {
            core.overruns.fetch_add(1, Ordering::Relaxed);
            return false;
        }

        for i in 0..frames {
            let base = ((w + i) & core.mask) * core.channels;
            for ch in 0..core.channels {
                // Safety: slots in [w, w + frames) are outside the region
                // the consumer may read until write_pos is published below.
                unsafe {
                    *core.buffer[base + ch].get() = src[i * core.channels + ch];
                }
            }
        }

        core.write_pos
            .0
            .store((w + frames) & core.mask, Ordering::Release);
        core.total_written.fetch_add(frames as u64, Ordering::Relaxed);
        true
    }

    /// Frames that can currently be written.
    pub fn available_write(&self) -> usize {
        self.core.available_write()
    }

    /// Frames that can currently be read by the consumer half.
    pub fn available_read(&self) -> usize {
        self.core.available_read()
    }

    /// Ring occupancy in `[0, 1]`.
    pub fn fill_fraction(&self) -> f32 {
        self.core.fill_fraction()
    }

    /// Capacity in frames (a power of two).
    pub fn capacity(&self) -> usize {
        self.core.capacity
    }

    /// Current ring counters.
    pub fn stats(&self) -> RingStats {
        self.core.stats()
    }

    /// Zeroes the ring counters.
    pub fn reset_stats(&self) {
        self.core.reset_stats();
    }
}

/// The reading half of an SPSC ring.
pub struct RingConsumer<T> {
    core: Arc<RingCore<T>>,
}

impl<T: Copy> RingConsumer<T> {
    /// Copies up to `dst.len() / channels` interleaved frames into `dst`.
    ///
    /// Returns the number of frames actually read. An empty ring counts one
    /// underrun and returns 0; a non-empty short read also counts one
    /// underrun. Never blocks.
    pub fn read(&mut self, dst: &mut [T]) -> usize {
        let core = &*self.core;
        debug_assert_eq!(dst.len() % core.channels, 0, "partial frame read");
        let frames = dst.len() / core.channels;
        if frames == 0 {
            return 0;
        }

        let w = core.write_pos.0.load(Ordering::Acquire);
        let r = core.read_pos.0.load(Ordering::Relaxed);
        let available = w.wrapping_sub(r) & core.mask;

        if available == 0 {
            core.underruns.fetch_add(1, Ordering::Relaxed);
            return 0;
        }

        let to_read = frames.min(available);
        for i in 0..to_read {
            let base = ((r + i) & core.mask) * core.channels;
            for ch in 0..core.channels {
                // Safety: slots in [r, w) were published by the producer's
                // Release store observed by the Acquire load above.
                dst[i * core.channels + ch] = unsafe { *core.buffer[base + ch].get() };
            }
        }

        core.read_pos
            .0
            .store((r + to_read) & core.mask, Ordering::Release);
        core.total_read.fetch_add(to_read as u64, Ordering::Relaxed);

        if to_read < frames {
            core.underruns.fetch_add(1, Ordering::Relaxed);
        }

        to_read
    }

    /// Frames that can currently be read.
    pub fn available_read(&self) -> usize {
        self.core.available_read()
    }

    /// Frames that can currently be written by the producer half.
    pub fn available_write(&self) -> usize {
        self.core.available_write()
    }

    /// Ring occupancy in `[0, 1]`.
    pub fn fill_fraction(&self) -> f32 {
        self.core.fill_fraction()
    }

    /// Capacity in frames (a power of two).
    pub fn capacity(&self) -> usize {
        self.core.capacity
    }

    /// Current ring counters.
    pub fn stats(&self) -> RingStats {
        self.core.stats()
    }

    /// Zeroes the ring counters.
    pub fn reset_stats(&self) {
        self.core.reset_stats();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capacity_rounds_to_power_of_two() {
        let (producer, _consumer) = spsc_ring::<i16>(480, 2);
        assert_eq!(producer.capacity(), 512);

        let (producer, _consumer) = spsc_ring::<f32>(1, 2);
        assert_eq!(producer.capacity(), 1);

        let (producer, _consumer) = spsc_ring::<f32>(0, 1);
        assert_eq!(producer.capacity(), 1);

        let (producer, _consumer) = spsc_ring::<f32>(2048, 2);
        assert_eq!(producer.capacity(), 2048);
    }

    #[test]
    fn test_fifo_order() {
        let (mut producer, mut consumer) = spsc_ring::<i16>(8, 2);

        assert!(producer.write(&[1, 2, 3, 4]));
        assert!(producer.write(&[5, 6]));

        let mut out = [0i16; 6];
        assert_eq!(consumer.read(&mut out), 3);
        assert_eq!(out, [1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn test_available_sum_invariant() {
        let (mut producer, mut consumer) = spsc_ring::<i16>(16, 1);
        let capacity = producer.capacity();

        assert_eq!(
            producer.available_read() + producer.available_write(),
            capacity - 1
        );

        assert!(producer.write(&[1, 2, 3, 4, 5]));
        assert_eq!(
            producer.available_read() + producer.available_write(),
            capacity - 1
        );

        let mut out = [0i16; 2];
        assert_eq!(consumer.read(&mut out), 2);
        assert_eq!(
            producer.available_read() + producer.available_write(),
            capacity - 1
        );
    }

    #[test]
    fn test_overrun_leaves_state_unchanged() {
        let (mut producer, mut consumer) = spsc_ring::<i16>(4, 1);
        // Capacity 4, one slot reserved: 3 usable frames.
        assert!(producer.write(&[10, 20, 30]));
        assert_eq!(producer.available_write(), 0);

        let before = producer.stats();
        assert!(!producer.write(&[40]));
        let after = producer.stats();

        assert_eq!(after.overruns, before.overruns + 1);
        assert_eq!(after.total_written, before.total_written);
        assert_eq!(producer.available_read(), 3);

        // Prior contents are untouched.
        let mut out = [0i16; 3];
        assert_eq!(consumer.read(&mut out), 3);
        assert_eq!(out, [10, 20, 30]);
    }

    #[test]
    fn test_empty_read_counts_underrun() {
        let (_producer, mut consumer) = spsc_ring::<f32>(8, 2);
        let mut out = [0.0f32; 4];
        assert_eq!(consumer.read(&mut out), 0);
        assert_eq!(consumer.stats().underruns, 1);
    }

    #[test]
    fn test_short_read_counts_underrun() {
        let (mut producer, mut consumer) = spsc_ring::<i16>(8, 1);
        assert!(producer.write(&[1, 2]));

        let mut out = [0i16; 5];
        assert_eq!(consumer.read(&mut out), 2);
        assert_eq!(out[..2], [1, 2]);
        assert_eq!(consumer.stats().underruns, 1);
    }

    #[test]
    fn test_full_read_does_not_count_underrun() {
        let (mut producer, mut consumer) = spsc_ring::<i16>(8, 1);
        assert!(producer.write(&[1, 2, 3]));

        let mut out = [0i16; 3];
        assert_eq!(consumer.read(&mut out), 3);
        assert_eq!(consumer.stats().underruns, 0);
    }

    #[test]
    fn test_wraparound_preserves_frames() {
        let (mut producer, mut consumer) = spsc_ring::<i16>(4, 2);
        let mut next = 0i16;
        let mut expected = 0i16;

        // Push/pop enough frames to wrap the positions several times.
        for _ in 0..40 {
            let frame = [next, next + 1];
            assert!(producer.write(&frame));
            next += 2;

            let mut out = [0i16; 2];
            assert_eq!(consumer.read(&mut out), 1);
            assert_eq!(out, [expected, expected + 1]);
            expected += 2;
        }
    }

    #[test]
    fn test_fill_fraction() {
        let (mut producer, _consumer) = spsc_ring::<f32>(8, 1);
        assert_eq!(producer.fill_fraction(), 0.0);
        assert!(producer.write(&[0.0; 4]));
        assert!((producer.fill_fraction() - 0.5).abs() < f32::EPSILON);
    }

    #[test]
    fn test_reset_stats() {
        let (mut producer, mut consumer) = spsc_ring::<i16>(4, 1);
        producer.write(&[1, 2, 3]);
        let mut out = [0i16; 3];
        consumer.read(&mut out);

        producer.reset_stats();
        assert_eq!(producer.stats(), RingStats::default());
        assert_eq!(consumer.stats(), RingStats::default());
    }

    #[test]
    fn test_cross_thread_transfer() {
        let (mut producer, mut consumer) = spsc_ring::<i16>(64, 2);
        const FRAMES: i16 = 10_000;

        let writer = std::thread::spawn(move || {
            let mut n = 0i16;
            while n < FRAMES {
                if producer.write(&[n, -n]) {
                    n += 1;
                } else {
                    std::thread::yield_now();
                }
            }
        });

        let mut received = Vec::new();
        let mut buf = [0i16; 32];
        while received.len() < FRAMES as usize {
            let got = consumer.read(&mut buf);
            for frame in buf[..got * 2].chunks_exact(2) {
                received.push([frame[0], frame[1]]);
            }
            if got == 0 {
                std::thread::yield_now();
            }
        }
        writer.join().unwrap();

        // The concatenation of reads is exactly the sequence of writes.
        for (i, frame) in received.iter().enumerate() {
            let n = i as i16;
            assert_eq!(*frame, [n, -n]);
        }
    }
}
