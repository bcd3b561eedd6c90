//! Hierarchical timer wheel (spec §4.16): O(1) insertion and expiry, driving
//! retransmission timers, keepalive emission, idle timeout, and PR-mode
//! feedback intervals. Cancellation is O(1) via a stored back-pointer.

use std::collections::HashMap;
use std::time::{Duration, Instant};

const WHEEL_BITS: u32 = 6;
const SLOTS_PER_LEVEL: usize = 1 << WHEEL_BITS; // 64
const SLOT_MASK: u64 = (SLOTS_PER_LEVEL as u64) - 1;
const NUM_LEVELS: usize = 4;

pub type TimerId = u64;

struct Entry<T> {
    id: TimerId,
    expiry_tick: u64,
    payload: T,
}

fn level_slot(tick: u64, level: usize) -> usize {
    ((tick >> (WHEEL_BITS as usize * level)) & SLOT_MASK) as usize
}

/// Hierarchical timer wheel. One tick = `tick_duration`. An entry's delay
/// determines which level it starts in; on each wheel wraparound, the level
/// above cascades its current slot down a level (classic cascading wheel).
pub struct TimerWheel<T> {
    tick_duration: Duration,
    current_tick: u64,
    last_advance: Instant,
    levels: [Vec<Vec<Entry<T>>>; NUM_LEVELS],
    index: HashMap<TimerId, (usize, usize)>,
    next_id: TimerId,
}

impl<T> TimerWheel<T> {
    pub fn new(tick_duration: Duration) -> Self {
        Self {
            tick_duration,
            current_tick: 0,
            last_advance: Instant::now(),
            levels: std::array::from_fn(|_| (0..SLOTS_PER_LEVEL).map(|_| Vec::new()).collect()),
            index: HashMap::new(),
            next_id: 1,
        }
    }

    fn level_for_delay(delay_ticks: u64) -> usize {
        for level in 0..NUM_LEVELS {
            let capacity = 1u64 << (WHEEL_BITS as usize * (level + 1));
            if delay_ticks < capacity {
                return level;
            }
        }
        NUM_LEVELS - 1
    }

    /// Schedule `payload` to fire after `delay`, rounded up to whole ticks.
    pub fn insert(&mut self, delay: Duration, payload: T) -> TimerId {
        let delay_ticks = ((delay.as_nanos() + self.tick_duration.as_nanos() - 1) / self.tick_duration.as_nanos().max(1))
            .max(1) as u64;
        let expiry_tick = self.current_tick + delay_ticks;
        let level = Self::level_for_delay(delay_ticks);
        let slot = level_slot(expiry_tick, level);

        let id = self.next_id;
        self.next_id += 1;
        self.levels[level][slot].push(Entry { id, expiry_tick, payload });
        self.index.insert(id, (level, slot));
        id
    }

    /// Cancel a timer before it fires. Returns `true` if it was still pending.
    pub fn cancel(&mut self, id: TimerId) -> bool {
        let Some((level, slot)) = self.index.remove(&id) else {
            return false;
        };
        let bucket = &mut self.levels[level][slot];
        if let Some(pos) = bucket.iter().position(|e| e.id == id) {
            bucket.remove(pos);
            true
        } else {
            false
        }
    }

    /// Move every entry in level `level`'s current slot down into
    /// `level - 1`, re-slotted by its absolute expiry tick.
    fn cascade(&mut self, level: usize) {
        if level == 0 || level >= NUM_LEVELS {
            return;
        }
        let slot = level_slot(self.current_tick, level);
        let entries = std::mem::take(&mut self.levels[level][slot]);
        let target_level = level - 1;
        for entry in entries {
            self.index.remove(&entry.id);
            let target_slot = level_slot(entry.expiry_tick, target_level);
            let id = entry.id;
            self.levels[target_level][target_slot].push(entry);
            self.index.insert(id, (target_level, target_slot));
        }
    }

    /// Advance by one tick, firing (and returning, in insertion order) any
    /// payloads whose expiry has arrived.
    pub fn tick(&mut self) -> Vec<T> {
        self.current_tick += 1;

        if level_slot(self.current_tick, 0) == 0 {
            for level in 1..NUM_LEVELS {
                self.cascade(level);
                if level_slot(self.current_tick, level) != 0 {
                    break;
                }
            }
        }

        let slot = level_slot(self.current_tick, 0);
        let due = std::mem::take(&mut self.levels[0][slot]);
        due.into_iter()
            .map(|e| {
                self.index.remove(&e.id);
                e.payload
            })
            .collect()
    }

    /// Advance ticks to catch up with wall-clock `now`, returning all fired payloads in order.
    pub fn advance_to(&mut self, now: Instant) -> Vec<T> {
        let mut fired = Vec::new();
        while now.saturating_duration_since(self.last_advance) >= self.tick_duration {
            fired.extend(self.tick());
            self.last_advance += self.tick_duration;
        }
        fired
    }

    pub fn pending_count(&self) -> usize {
        self.index.len()
    }

    pub fn tick_duration(&self) -> Duration {
        self.tick_duration
    }
}
