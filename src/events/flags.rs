use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{BitOr, BitOrAssign};

/// Transaction-control flags carried by every indexed event.
///
/// Only the five lowest bits are interpreted by this engine; the remaining
/// bits are preserved but ignored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventFlags(u32);

impl EventFlags {
    /// More events of this transaction are coming; do not finalize yet.
    pub const TX_PENDING: EventFlags = EventFlags(0x01);
    /// The index carried by this event is deleted.
    pub const REMOVE_EVENT: EventFlags = EventFlags(0x02);
    /// Starts a fresh full-state replacement for this source.
    pub const SNAPSHOT_BEGIN: EventFlags = EventFlags(0x04);
    /// The snapshot completes normally.
    pub const SNAPSHOT_END: EventFlags = EventFlags(0x08);
    /// The snapshot completes but was truncated upstream.
    pub const SNAPSHOT_SNIP: EventFlags = EventFlags(0x10);

    /// No flags set.
    pub const fn empty() -> Self {
        EventFlags(0)
    }

    /// Reconstruct flags from a raw 32-bit mask.
    pub const fn from_bits(bits: u32) -> Self {
        EventFlags(bits)
    }

    /// The raw 32-bit mask.
    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Whether every bit of `other` is set in `self`.
    pub const fn contains(self, other: EventFlags) -> bool {
        self.0 & other.0 == other.0
    }

    /// Whether the event closes an open snapshot (END and SNIP are
    /// equivalent for reassembly purposes).
    pub const fn completes_snapshot(self) -> bool {
        self.0 & (Self::SNAPSHOT_END.0 | Self::SNAPSHOT_SNIP.0) != 0
    }
}

impl BitOr for EventFlags {
    type Output = EventFlags;

    fn bitor(self, rhs: EventFlags) -> EventFlags {
        EventFlags(self.0 | rhs.0)
    }
}

impl BitOrAssign for EventFlags {
    fn bitor_assign(&mut self, rhs: EventFlags) {
        self.0 |= rhs.0;
    }
}

impl fmt::Display for EventFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return write!(f, "(none)");
        }
        let names = [
            (Self::TX_PENDING, "TX_PENDING"),
            (Self::REMOVE_EVENT, "REMOVE_EVENT"),
            (Self::SNAPSHOT_BEGIN, "SNAPSHOT_BEGIN"),
            (Self::SNAPSHOT_END, "SNAPSHOT_END"),
            (Self::SNAPSHOT_SNIP, "SNAPSHOT_SNIP"),
        ];
        let mut first = true;
        for (flag, name) in names {
            if self.contains(flag) {
                if !first {
                    write!(f, "|")?;
                }
                write!(f, "{}", name)?;
                first = false;
            }
        }
        let unknown = self.0 & !0x1f;
        if unknown != 0 {
            if !first {
                write!(f, "|")?;
            }
            write!(f, "{:#x}", unknown)?;
        }
        Ok(())
    }
}
