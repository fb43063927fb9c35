//! Partition windows and partition list parsing

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub type PartitionId = u32;

/// A set of partitions submitted together in one enumeration request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PartitionWindow {
    /// Contiguous ids `[start, start + len)`
    Range { start: PartitionId, len: u32 },
    /// Explicit ascending ids
    Explicit(Vec<PartitionId>),
}

impl PartitionWindow {
    pub fn range(start: PartitionId, len: u32) -> Self {
        PartitionWindow::Range {
            start,
            len: len.max(1),
        }
    }

    /// Number of partitions in the window
    pub fn len(&self) -> usize {
        match self {
            PartitionWindow::Range { len, .. } => *len as usize,
            PartitionWindow::Explicit(ids) => ids.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Highest partition id the window touches
    pub fn max_id(&self) -> Option<u64> {
        match self {
            PartitionWindow::Range { len: 0, .. } => None,
            PartitionWindow::Range { start, len } => {
                Some(u64::from(*start) + u64::from(*len) - 1)
            }
            PartitionWindow::Explicit(ids) => ids.last().map(|id| u64::from(*id)),
        }
    }

    pub fn contains(&self, id: PartitionId) -> bool {
        match self {
            PartitionWindow::Range { start, len } => {
                id >= *start && u64::from(id) < u64::from(*start) + u64::from(*len)
            }
            PartitionWindow::Explicit(ids) => ids.binary_search(&id).is_ok(),
        }
    }

    /// Partition ids in ascending order
    ///
    /// Range windows may reach past `u32::MAX`; those ids are not yielded.
    pub fn ids(&self) -> Box<dyn Iterator<Item = PartitionId> + Send + '_> {
        match self {
            PartitionWindow::Range { start, len } => {
                let end = (u64::from(*start) + u64::from(*len)).min(u64::from(u32::MAX) + 1);
                Box::new((u64::from(*start)..end).map(|id| id as PartitionId))
            }
            PartitionWindow::Explicit(ids) => Box::new(ids.iter().copied()),
        }
    }

    /// True when every id of the window is below `partition_count`
    pub fn fits(&self, partition_count: u32) -> bool {
        match self.max_id() {
            Some(max) => max < u64::from(partition_count),
            None => true,
        }
    }
}

impl fmt::Display for PartitionWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PartitionWindow::Range { start, len } => {
                write!(f, "[{}, {})", start, u64::from(*start) + u64::from(*len))
            }
            PartitionWindow::Explicit(ids) => {
                write!(f, "{{")?;
                for (i, id) in ids.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", id)?;
                }
                write!(f, "}}")
            }
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Invalid partition list \"{0}\"")]
pub struct PartitionListError(pub String);

/// Most partition ids a single list may name
pub const MAX_LISTED_PARTITIONS: usize = 65_536;

/// De-duplicated, sorted set of partition ids parsed from `0,3,5-9`
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PartitionList(BTreeSet<PartitionId>);

impl PartitionList {
    pub fn new(ids: impl IntoIterator<Item = PartitionId>) -> Self {
        Self(ids.into_iter().collect())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = PartitionId> + '_ {
        self.0.iter().copied()
    }
}

impl FromStr for PartitionList {
    type Err = PartitionListError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || PartitionListError(s.to_string());
        let mut ids = BTreeSet::new();

        for part in s.split(',') {
            let part = part.trim();
            match part.find('-') {
                // a leading '-' is a negative number, not a range
                Some(pos) if pos > 0 => {
                    let (lo, hi) = part.split_at(pos);
                    let hi = &hi[1..];
                    if hi.contains('-') {
                        return Err(invalid());
                    }
                    let lo: PartitionId = lo.trim().parse().map_err(|_| invalid())?;
                    let hi: PartitionId = hi.trim().parse().map_err(|_| invalid())?;
                    if hi < lo {
                        return Err(invalid());
                    }
                    let fresh = u64::from(hi - lo) + 1 - ids.range(lo..=hi).count() as u64;
                    if ids.len() as u64 + fresh > MAX_LISTED_PARTITIONS as u64 {
                        return Err(invalid());
                    }
                    ids.extend(lo..=hi);
                }
                _ => {
                    let id: PartitionId = part.parse().map_err(|_| invalid())?;
                    ids.insert(id);
                    if ids.len() > MAX_LISTED_PARTITIONS {
                        return Err(invalid());
                    }
                }
            }
        }

        Ok(Self(ids))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_single_ids_and_ranges() {
        let list: PartitionList = "5,0,3-4,4".parse().unwrap();
        assert_eq!(list.iter().collect::<Vec<_>>(), vec![0, 3, 4, 5]);
    }

    #[test]
    fn test_parse_rejects_bad_lists() {
        for bad in ["", "a", "1,,2", "5-3", "1-2-3", "-1", "1-", "3-x"] {
            assert!(bad.parse::<PartitionList>().is_err(), "accepted {:?}", bad);
        }
    }

    #[test]
    fn test_parse_error_message() {
        let err = "9-1".parse::<PartitionList>().unwrap_err();
        assert_eq!(err.to_string(), "Invalid partition list \"9-1\"");
    }

    #[test]
    fn test_parse_bounds_listed_ids() {
        let err = "0-4000000000".parse::<PartitionList>().unwrap_err();
        assert_eq!(err, PartitionListError("0-4000000000".to_string()));
        assert!(format!("0-{}", u32::MAX).parse::<PartitionList>().is_err());

        let widest = format!("0-{}", MAX_LISTED_PARTITIONS - 1);
        assert_eq!(widest.parse::<PartitionList>().unwrap().len(), MAX_LISTED_PARTITIONS);

        // overlapping ranges only count their distinct ids
        let overlapping = format!("{},0-10", widest);
        assert!(overlapping.parse::<PartitionList>().is_ok());
        let past = format!("{},{}", widest, MAX_LISTED_PARTITIONS);
        assert!(past.parse::<PartitionList>().is_err());
    }

    #[test]
    fn test_range_window() {
        let window = PartitionWindow::range(4, 4);
        assert_eq!(window.len(), 4);
        assert_eq!(window.ids().collect::<Vec<_>>(), vec![4, 5, 6, 7]);
        assert!(window.contains(7));
        assert!(!window.contains(8));
        assert!(window.fits(8));
        assert!(!window.fits(7));
        assert_eq!(window.to_string(), "[4, 8)");
    }

    #[test]
    fn test_range_window_never_empty() {
        assert_eq!(PartitionWindow::range(0, 0).len(), 1);
    }

    #[test]
    fn test_range_window_near_u32_max() {
        let window = PartitionWindow::range(u32::MAX, 4);
        assert_eq!(window.ids().collect::<Vec<_>>(), vec![u32::MAX]);
        assert!(!window.fits(u32::MAX));
    }

    #[test]
    fn test_explicit_window() {
        let window = PartitionWindow::Explicit(vec![1, 3, 5]);
        assert_eq!(window.len(), 3);
        assert!(window.contains(3));
        assert!(!window.contains(2));
        assert_eq!(window.max_id(), Some(5));
        assert_eq!(window.to_string(), "{1, 3, 5}");
    }
}
