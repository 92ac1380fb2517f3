/*!
Input descriptors and the pending-input queue.

A data interface answers polls with [`InputDescriptor`]s, one per archive
file. The [`InputQueue`] holds descriptors between the poll that discovered
them and the moment the stream opens a reader on them, sorted by file time
with RIB dumps ordered ahead of updates at equal times.
*/
use crate::record::DumpType;
use std::collections::VecDeque;

/// Immutable description of one archive file awaiting open.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct InputDescriptor {
    /// Local path or URL of the dump file.
    pub path: String,
    pub dump_type: DumpType,
    pub collector: String,
    pub project: String,
    /// Nominal dump time of the file.
    pub file_time: u32,
    /// Time of the first record worth scanning, `>= file_time`.
    pub scan_time: u32,
}

impl InputDescriptor {
    /// Queue and merge ordering key: file time first, RIB before UPDATES.
    pub(crate) fn order_key(&self) -> (u32, DumpType) {
        (self.file_time, self.dump_type)
    }
}

/// Ordered batch of inputs pending open, drained front-to-back.
#[derive(Debug, Default)]
pub(crate) struct InputQueue {
    queue: VecDeque<InputDescriptor>,
}

impl InputQueue {
    pub(crate) fn new() -> InputQueue {
        InputQueue::default()
    }

    /// Insert keeping the queue sorted by ordering key. Equal keys keep
    /// insertion order, so a backend returning RIB then UPDATES for one
    /// collector keeps the RIB in front.
    pub(crate) fn push(&mut self, input: InputDescriptor) {
        let key = input.order_key();
        let pos = self.queue.partition_point(|queued| queued.order_key() <= key);
        self.queue.insert(pos, input);
    }

    pub(crate) fn pop(&mut self) -> Option<InputDescriptor> {
        self.queue.pop_front()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub(crate) fn len(&self) -> usize {
        self.queue.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(collector: &str, dump_type: DumpType, file_time: u32) -> InputDescriptor {
        InputDescriptor {
            path: format!("/archive/{}.{}.mrt", collector, file_time),
            dump_type,
            collector: collector.to_string(),
            project: "test-project".to_string(),
            file_time,
            scan_time: file_time,
        }
    }

    #[test]
    fn test_queue_orders_by_file_time() {
        let mut queue = InputQueue::new();
        queue.push(input("rrc00", DumpType::Updates, 300));
        queue.push(input("rrc00", DumpType::Updates, 100));
        queue.push(input("rrc00", DumpType::Updates, 200));

        let times: Vec<u32> = std::iter::from_fn(|| queue.pop())
            .map(|i| i.file_time)
            .collect();
        assert_eq!(times, vec![100, 200, 300]);
    }

    #[test]
    fn test_rib_opens_before_updates_at_equal_time() {
        let mut queue = InputQueue::new();
        queue.push(input("rrc00", DumpType::Updates, 100));
        queue.push(input("rrc00", DumpType::Rib, 100));

        assert_eq!(queue.len(), 2);
        assert_eq!(queue.pop().unwrap().dump_type, DumpType::Rib);
        assert_eq!(queue.pop().unwrap().dump_type, DumpType::Updates);
        assert!(queue.is_empty());
    }
}
