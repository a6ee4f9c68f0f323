use std::time::Duration;

use proptest::prelude::*;

use mergequeue::MergeQueueConfig;
use mergequeue::errors::MergeQueueError;

fn duration_ms() -> impl Strategy<Value = Duration> {
    (0u64..5_000).prop_map(Duration::from_millis)
}

proptest! {
    #[test]
    fn construction_succeeds_iff_all_fields_positive(
        max_queue_size in 0usize..1_000,
        max_concurrent_jobs in 0usize..64,
        processing_interval in duration_ms(),
        rate_limit_requests in 0u32..1_000,
        rate_limit_interval in duration_ms(),
    ) {
        let all_positive = max_queue_size > 0
            && max_concurrent_jobs > 0
            && !processing_interval.is_zero()
            && rate_limit_requests > 0
            && !rate_limit_interval.is_zero();

        let result = MergeQueueConfig::new(
            max_queue_size,
            max_concurrent_jobs,
            processing_interval,
            rate_limit_requests,
            rate_limit_interval,
        );

        match result {
            Ok(cfg) => {
                prop_assert!(all_positive);
                prop_assert_eq!(cfg.max_queue_size(), max_queue_size);
                prop_assert_eq!(cfg.max_concurrent_jobs(), max_concurrent_jobs);
                prop_assert_eq!(cfg.processing_interval(), processing_interval);
                prop_assert_eq!(cfg.rate_limit_requests(), rate_limit_requests);
                prop_assert_eq!(cfg.rate_limit_interval(), rate_limit_interval);
            }
            Err(MergeQueueError::InvalidConfig(_)) => prop_assert!(!all_positive),
            Err(other) => prop_assert!(false, "unexpected error: {}", other),
        }
    }
}
