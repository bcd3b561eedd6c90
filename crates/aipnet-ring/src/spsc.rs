use std::mem::size_of;
use std::sync::atomic::{AtomicU32, Ordering};

use crate::region::{CACHE_LINE, Region};

/// Ring header: head/tail counters on separate cache lines so producer and
/// consumer never false-share.
#[repr(C, align(64))]
struct RingHeader {
    /// Producer cursor. Written only by the producer, read by the consumer.
    head: AtomicU32,
    _pad_head: [u8; CACHE_LINE - size_of::<AtomicU32>()],
    /// Consumer cursor. Written only by the consumer, read by the producer.
    tail: AtomicU32,
    _pad_tail: [u8; CACHE_LINE - size_of::<AtomicU32>()],
}

const _: () = assert!(size_of::<RingHeader>() == 2 * CACHE_LINE);

/// A fixed-size slot handed out by [`reserve`](SpscRing::reserve) /
/// [`peek`](SpscRing::peek). Exposes the raw bytes of one ring element.
#[derive(Debug)]
pub struct Slot<'a> {
    bytes: &'a mut [u8],
}

impl<'a> Slot<'a> {
    #[inline]
    pub fn as_mut(&mut self) -> &mut [u8] {
        self.bytes
    }

    #[inline]
    pub fn as_ref(&self) -> &[u8] {
        self.bytes
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Error returned by [`SpscRing::reserve`] / [`SpscRing::peek`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RingError {
    /// The ring has no free slot (producer side).
    Full,
    /// The ring has no committed element to observe (consumer side).
    Empty,
}

impl std::fmt::Display for RingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RingError::Full => write!(f, "ring buffer full"),
            RingError::Empty => write!(f, "ring buffer empty"),
        }
    }
}

impl std::error::Error for RingError {}

/// A lock-free single-producer/single-consumer ring buffer of `num_slots`
/// fixed-size, cache-line-aligned slots.
///
/// No heap allocation happens after construction: `reserve`/`commit` and
/// `peek`/`release` only move atomics and hand out slices into the
/// pre-allocated [`Region`].
pub struct SpscRing {
    region: Region,
    num_slots: u32,
    slot_size: u32,
    mask: u32,
}

const HEADER_OFFSET: usize = 0;

impl SpscRing {
    /// Construct a ring of `num_slots` slots (must be a power of two) of
    /// `slot_size` bytes each.
    ///
    /// # Panics
    ///
    /// Panics if `num_slots` is not a power of two, or is zero.
    pub fn new(num_slots: u32, slot_size: u32) -> Self {
        assert!(num_slots.is_power_of_two(), "num_slots must be power of two");
        assert!(num_slots > 0, "num_slots must be non-zero");
        let slots_offset = HEADER_OFFSET + size_of::<RingHeader>();
        let total = slots_offset + (num_slots as usize) * (slot_size as usize);
        let region = Region::new(total);
        // SAFETY: header lives at offset 0, region is freshly allocated and exclusively owned.
        let header = unsafe { &*(region.offset(HEADER_OFFSET) as *const RingHeader) };
        header.head.store(0, Ordering::Relaxed);
        header.tail.store(0, Ordering::Relaxed);
        Self {
            region,
            num_slots,
            slot_size,
            mask: num_slots - 1,
        }
    }

    #[inline]
    fn header(&self) -> &RingHeader {
        unsafe { &*(self.region.offset(HEADER_OFFSET) as *const RingHeader) }
    }

    #[inline]
    fn slot_offset(&self, index: u32) -> usize {
        size_of::<RingHeader>() + (index & self.mask) as usize * self.slot_size as usize
    }

    /// Ring capacity in slots.
    #[inline]
    pub fn capacity(&self) -> u32 {
        self.num_slots
    }

    /// Size in bytes of each slot.
    #[inline]
    pub fn slot_size(&self) -> u32 {
        self.slot_size
    }

    /// Occupancy: number of committed, unreleased slots.
    #[inline]
    pub fn len(&self) -> u32 {
        let header = self.header();
        let head = header.head.load(Ordering::Acquire);
        let tail = header.tail.load(Ordering::Acquire);
        head.wrapping_sub(tail)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Producer side: reserve the next free slot without publishing it.
    ///
    /// Returns [`RingError::Full`] if `head - tail == num_slots`.
    pub fn reserve(&self) -> Result<(u32, Slot<'_>), RingError> {
        let header = self.header();
        let head = header.head.load(Ordering::Relaxed);
        let tail = header.tail.load(Ordering::Acquire);
        if head.wrapping_sub(tail) >= self.num_slots {
            return Err(RingError::Full);
        }
        let offset = self.slot_offset(head);
        let bytes = unsafe { self.region.slice_mut(offset, self.slot_size as usize) };
        Ok((head, Slot { bytes }))
    }

    /// Producer side: publish the slot reserved as `seq` (the value returned
    /// by [`reserve`](Self::reserve)), making it visible to the consumer.
    pub fn commit(&self, seq: u32) {
        let header = self.header();
        debug_assert_eq!(header.head.load(Ordering::Relaxed), seq);
        header.head.store(seq.wrapping_add(1), Ordering::Release);
    }

    /// Consumer side: observe the oldest committed, unreleased slot without
    /// removing it from the ring.
    ///
    /// Returns [`RingError::Empty`] if `head == tail`.
    pub fn peek(&self) -> Result<(u32, Slot<'_>), RingError> {
        let header = self.header();
        let tail = header.tail.load(Ordering::Relaxed);
        let head = header.head.load(Ordering::Acquire);
        if head == tail {
            return Err(RingError::Empty);
        }
        let offset = self.slot_offset(tail);
        let bytes = unsafe { self.region.slice_mut(offset, self.slot_size as usize) };
        Ok((tail, Slot { bytes }))
    }

    /// Consumer side: release the slot observed as `seq` (the value returned
    /// by [`peek`](Self::peek)), returning ownership to the producer.
    pub fn release(&self, seq: u32) {
        let header = self.header();
        debug_assert_eq!(header.tail.load(Ordering::Relaxed), seq);
        header.tail.store(seq.wrapping_add(1), Ordering::Release);
    }
}

unsafe impl Send for SpscRing {}
unsafe impl Sync for SpscRing {}
