use crate::types::Notification;
use std::collections::VecDeque;
use std::fmt;
use std::num::NonZeroUsize;
use std::str::FromStr;

/// What to do with a delivery that arrives when the buffer is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverflowPolicy {
    /// Evict the oldest uncollected notification to make room.
    #[default]
    DropOldest,
    /// Keep the buffer as is and discard the incoming notification.
    DropNewest,
}

impl FromStr for OverflowPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "drop-oldest" | "drop_oldest" => Ok(Self::DropOldest),
            "drop-newest" | "drop_newest" => Ok(Self::DropNewest),
            other => Err(format!(
                "unknown overflow policy '{other}' (expected drop-oldest or drop-newest)"
            )),
        }
    }
}

impl fmt::Display for OverflowPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DropOldest => f.write_str("drop-oldest"),
            Self::DropNewest => f.write_str("drop-newest"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    Stored,
    /// Stored, after evicting the oldest entry.
    StoredDroppingOldest,
    /// Buffer was full and the policy discarded the incoming entry.
    Discarded,
}

/// Bounded FIFO of uncollected notifications for a single endpoint.
///
/// `len() <= capacity()` holds after every call; the capacity is non-zero so
/// the bound can always be honoured.
#[derive(Debug)]
pub struct NotificationBuffer {
    items: VecDeque<Notification>,
    capacity: NonZeroUsize,
    policy: OverflowPolicy,
}

impl NotificationBuffer {
    pub fn new(capacity: NonZeroUsize, policy: OverflowPolicy) -> Self {
        Self {
            items: VecDeque::new(),
            capacity,
            policy,
        }
    }

    pub fn append(&mut self, notification: Notification) -> AppendOutcome {
        if self.items.len() < self.capacity.get() {
            self.items.push_back(notification);
            return AppendOutcome::Stored;
        }
        match self.policy {
            OverflowPolicy::DropOldest => {
                self.items.pop_front();
                self.items.push_back(notification);
                AppendOutcome::StoredDroppingOldest
            }
            OverflowPolicy::DropNewest => AppendOutcome::Discarded,
        }
    }

    /// Returns everything buffered, oldest first, leaving the buffer empty.
    pub fn drain_all(&mut self) -> Vec<Notification> {
        std::mem::take(&mut self.items).into()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn note(body: &str) -> Notification {
        Notification::new(Utc::now(), body.as_bytes().to_vec())
    }

    fn bodies(items: &[Notification]) -> Vec<String> {
        items
            .iter()
            .map(|n| String::from_utf8_lossy(&n.body).into_owned())
            .collect()
    }

    fn buffer(capacity: usize, policy: OverflowPolicy) -> NotificationBuffer {
        NotificationBuffer::new(NonZeroUsize::new(capacity).unwrap(), policy)
    }

    #[test]
    fn drain_returns_insertion_order_then_empty() {
        let mut buf = buffer(3, OverflowPolicy::DropOldest);
        for b in ["p1", "p2", "p3"] {
            assert_eq!(buf.append(note(b)), AppendOutcome::Stored);
        }
        assert_eq!(buf.len(), 3);

        assert_eq!(bodies(&buf.drain_all()), ["p1", "p2", "p3"]);
        assert!(buf.is_empty());
        assert!(buf.drain_all().is_empty());
    }

    #[test]
    fn overflow_drops_oldest() {
        let mut buf = buffer(3, OverflowPolicy::DropOldest);
        for b in ["p1", "p2", "p3"] {
            buf.append(note(b));
        }
        assert_eq!(buf.append(note("p4")), AppendOutcome::StoredDroppingOldest);
        assert_eq!(buf.len(), 3);
        assert_eq!(bodies(&buf.drain_all()), ["p2", "p3", "p4"]);
    }

    #[test]
    fn overflow_drop_newest_keeps_existing() {
        let mut buf = buffer(2, OverflowPolicy::DropNewest);
        buf.append(note("p1"));
        buf.append(note("p2"));
        assert_eq!(buf.append(note("p3")), AppendOutcome::Discarded);
        assert_eq!(bodies(&buf.drain_all()), ["p1", "p2"]);

        // Collecting frees room again.
        assert_eq!(buf.append(note("p4")), AppendOutcome::Stored);
        assert_eq!(bodies(&buf.drain_all()), ["p4"]);
    }

    #[test]
    fn never_exceeds_capacity() {
        let mut buf = buffer(5, OverflowPolicy::DropOldest);
        for i in 0..57 {
            buf.append(note(&i.to_string()));
            assert!(buf.len() <= buf.capacity());
        }
        assert_eq!(bodies(&buf.drain_all()), ["52", "53", "54", "55", "56"]);
    }

    #[test]
    fn parses_policy_names() {
        assert_eq!("drop-oldest".parse::<OverflowPolicy>(), Ok(OverflowPolicy::DropOldest));
        assert_eq!(" Drop_Newest ".parse::<OverflowPolicy>(), Ok(OverflowPolicy::DropNewest));
        assert!("reject".parse::<OverflowPolicy>().is_err());
        assert_eq!(OverflowPolicy::DropNewest.to_string(), "drop-newest");
    }
}
