//! Duplicate suppression for the relay flood.
//!
//! Two 256-slot bitmaps indexed by checksum, one per minute parity. `mark`
//! writes the slot of the current and the next minute; each minute rollover
//! clears the slot of the minute being left. A checksum therefore stays
//! suppressed until its second-next minute boundary, without timestamps.

use crate::minute;

const SLOTS: usize = 256;

#[derive(Debug, Clone)]
pub struct DuplicateFilter {
    /// Minute the table was last ticked to. None until the first tick.
    tracked: Option<u8>,
    table: [[bool; SLOTS]; 2],
}

impl Default for DuplicateFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl DuplicateFilter {
    pub fn new() -> Self {
        Self {
            tracked: None,
            table: [[false; SLOTS]; 2],
        }
    }

    pub fn tracked_minute(&self) -> Option<u8> {
        self.tracked
    }

    /// Record `checksum` as seen in `minute` and the minute after it.
    pub fn mark(&mut self, minute: u8, checksum: u8) {
        let h = usize::from(checksum);
        self.table[slot(minute)][h] = true;
        self.table[slot(minute::next(minute))][h] = true;
    }

    /// Has `checksum` been seen within the window covering `minute`?
    pub fn test(&self, minute: u8, checksum: u8) -> bool {
        self.table[slot(minute)][usize::from(checksum)]
    }

    /// Adopt a new clock minute, clearing the slot of the minute being left.
    /// A jump of more than one minute clears both slots.
    pub fn tick(&mut self, minute: u8) {
        match self.tracked {
            Some(previous) if previous == minute => return,
            Some(previous) if minute::next(previous) == minute => {
                self.table[slot(previous)] = [false; SLOTS];
            }
            Some(previous) => {
                tracing::debug!(previous, minute, "clock skipped, flushing duplicate table");
                self.table = [[false; SLOTS]; 2];
            }
            None => {}
        }
        self.tracked = Some(minute);
    }
}

fn slot(minute: u8) -> usize {
    usize::from(minute & 0x01)
}
