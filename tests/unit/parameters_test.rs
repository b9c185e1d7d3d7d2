//! Tests for schedule parameter builders

use metered_admission::core::{build_collection, build_single, ScheduleParameters, SIZE_UNKNOWABLE};
use rand::Rng;

#[test]
fn test_random_known_sizes_pin_both_bounds() {
    let mut rng = rand::rng();
    for _ in 0..1000 {
        let size: u64 = rng.random_range(1..SIZE_UNKNOWABLE);
        let params = build_single(Some(size));
        assert!(!params.resumable);
        assert_eq!(params.size_minimum, Some(size));
        assert_eq!(params.size_maximum, Some(size));
    }
}

#[test]
fn test_unknowable_size() {
    let params = build_single(Some(SIZE_UNKNOWABLE));
    assert_eq!(params, ScheduleParameters::default());
}

#[test]
fn test_random_collections_have_no_bounds() {
    let mut rng = rand::rng();
    for len in 0..50 {
        let sizes: Vec<Option<u64>> = (0..len)
            .map(|_| rng.random_bool(0.8).then(|| rng.random::<u64>()))
            .collect();
        assert_eq!(build_collection(&sizes), ScheduleParameters::default());
    }
}

#[test]
fn test_parameters_roundtrip_through_wire_format() {
    let json = r#"{"resumable":false,"size-minimum":7,"size-maximum":7}"#;
    let params: ScheduleParameters = serde_json::from_str(json).unwrap();
    assert_eq!(params, build_single(Some(7)));
    assert_eq!(params.to_string(), json);
}
