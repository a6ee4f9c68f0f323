use proptest::prelude::*;

use mergequeue::engine::PriorityJobQueue;
use mergequeue::types::{AcceptedJob, JobId, MergeJob};

proptest! {
    // Whatever the arrival order, and with any subset of pops handed back,
    // the queue drains in (priority, arrival) order.
    #[test]
    fn drains_in_priority_then_arrival_order(
        priorities in proptest::collection::vec(0u32..5, 1..40),
        requeue_mask in proptest::collection::vec(any::<bool>(), 40),
    ) {
        let queue = PriorityJobQueue::new(priorities.len());
        for (seq, priority) in priorities.iter().enumerate() {
            let job = MergeJob::new(seq as u64 + 1, *priority);
            queue.push(AcceptedJob { id: JobId(seq as u64), job }).unwrap();
        }

        // Pop a prefix and hand some of it back.
        let popped: Vec<_> = (0..priorities.len() / 2).filter_map(|_| queue.pop()).collect();
        let mut kept = Vec::new();
        for (job, requeue) in popped.into_iter().zip(requeue_mask.iter()) {
            if *requeue {
                queue.requeue(job);
            } else {
                kept.push(job.id);
            }
        }

        let mut drained = Vec::new();
        while let Some(job) = queue.pop() {
            drained.push((job.job.priority, job.id));
        }

        let mut expected: Vec<_> = priorities
            .iter()
            .enumerate()
            .map(|(seq, p)| (*p, JobId(seq as u64)))
            .filter(|(_, id)| !kept.contains(id))
            .collect();
        expected.sort();

        prop_assert_eq!(drained, expected);
        prop_assert_eq!(queue.in_flight(), priorities.len());
    }
}
