//! Query status word.
//!
//! High bits carry the outcome (`SUCCESS`, `FAILURE`, `IN_PROGRESS`); low bits
//! carry detail flags that may accompany any outcome.  Slot diagnostics keep
//! the full word; selection logic only looks at success vs failure.

use std::fmt;
use std::ops::{BitOr, BitOrAssign};

#[derive(Copy, Clone, PartialEq, Eq, Hash, Default)]
pub struct QueryStatus(pub u32);

impl QueryStatus {
    pub const FAILURE:          QueryStatus = QueryStatus(1 << 31);
    pub const SUCCESS:          QueryStatus = QueryStatus(1 << 30);
    pub const IN_PROGRESS:      QueryStatus = QueryStatus(1 << 29);

    // ── Detail bits ───────────────────────────────────────────────────────
    pub const INVALID_PARAM:    QueryStatus = QueryStatus(1 << 3);
    /// The output buffer filled up; the result is truncated.
    pub const BUFFER_TOO_SMALL: QueryStatus = QueryStatus(1 << 4);
    /// The search ran out of nodes; the result is the best found so far.
    pub const OUT_OF_NODES:     QueryStatus = QueryStatus(1 << 5);
    /// The destination was not reached; the result ends near it.
    pub const PARTIAL_RESULT:   QueryStatus = QueryStatus(1 << 6);
    /// The mesh changed between search slices.
    pub const STALE_MESH:       QueryStatus = QueryStatus(1 << 7);

    const DETAIL_MASK: u32 = 0x00ff_ffff;

    #[inline]
    pub fn is_success(self) -> bool {
        self.0 & Self::SUCCESS.0 != 0
    }

    #[inline]
    pub fn is_failure(self) -> bool {
        self.0 & Self::FAILURE.0 != 0
    }

    #[inline]
    pub fn is_in_progress(self) -> bool {
        self.0 & Self::IN_PROGRESS.0 != 0
    }

    /// `true` if every bit of `flag` is set.
    #[inline]
    pub fn contains(self, flag: QueryStatus) -> bool {
        self.0 & flag.0 == flag.0
    }

    pub fn detail(self) -> QueryStatus {
        QueryStatus(self.0 & Self::DETAIL_MASK)
    }
}

impl BitOr for QueryStatus {
    type Output = QueryStatus;
    fn bitor(self, rhs: QueryStatus) -> QueryStatus {
        QueryStatus(self.0 | rhs.0)
    }
}

impl BitOrAssign for QueryStatus {
    fn bitor_assign(&mut self, rhs: QueryStatus) {
        self.0 |= rhs.0;
    }
}

impl fmt::Debug for QueryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const NAMES: [(QueryStatus, &str); 8] = [
            (QueryStatus::FAILURE, "FAILURE"),
            (QueryStatus::SUCCESS, "SUCCESS"),
            (QueryStatus::IN_PROGRESS, "IN_PROGRESS"),
            (QueryStatus::INVALID_PARAM, "INVALID_PARAM"),
            (QueryStatus::BUFFER_TOO_SMALL, "BUFFER_TOO_SMALL"),
            (QueryStatus::OUT_OF_NODES, "OUT_OF_NODES"),
            (QueryStatus::PARTIAL_RESULT, "PARTIAL_RESULT"),
            (QueryStatus::STALE_MESH, "STALE_MESH"),
        ];
        let mut first = true;
        for (flag, name) in NAMES {
            if self.contains(flag) {
                if !first {
                    f.write_str(" | ")?;
                }
                f.write_str(name)?;
                first = false;
            }
        }
        if first {
            f.write_str("EMPTY")?;
        }
        Ok(())
    }
}
