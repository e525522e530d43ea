//! Tests for interval partitioning and identifier lists

use chrono::{Duration, NaiveDate, NaiveDateTime};
use rand::Rng;
use resource_harvester::core::{partition, partition_dates, HarvestError};

fn at(y: i32, m: u32, d: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(y, m, d).unwrap().and_hms_opt(0, 0, 0).unwrap()
}

#[test]
fn test_ten_days_in_two() {
    let parts = partition_dates(
        NaiveDate::from_ymd_opt(2015, 5, 1).unwrap(),
        NaiveDate::from_ymd_opt(2015, 5, 11).unwrap(),
        2,
    )
    .unwrap();

    assert_eq!(parts.len(), 2);
    assert_eq!((parts[0].start, parts[0].end), (at(2015, 5, 1), at(2015, 5, 6)));
    assert_eq!((parts[1].start, parts[1].end), (at(2015, 5, 6), at(2015, 5, 11)));
}

#[test]
fn test_random_partitions_cover_range() {
    let mut rng = rand::rng();
    let origin = at(2015, 5, 1);

    for _ in 0..200 {
        let begin = origin + Duration::milliseconds(rng.random_range(0..1_000_000_000));
        let end = begin + Duration::milliseconds(rng.random_range(1..5_000_000_000));
        let n = rng.random_range(1..=1000usize);
        let total = (end - begin).num_milliseconds();

        let parts = match partition(begin, end, n) {
            Ok(parts) => parts,
            Err(HarvestError::InvalidRange(_)) => {
                assert!(n as i64 > total);
                continue;
            }
            Err(e) => panic!("unexpected error {e}"),
        };

        assert_eq!(parts.len(), n);
        assert_eq!(parts[0].start, begin);
        assert_eq!(parts[n - 1].end, end);
        for pair in parts.windows(2) {
            assert_eq!(pair[0].end, pair[1].start);
        }
        let widths: Vec<i64> = parts.iter().map(|p| p.width().num_milliseconds()).collect();
        let min = widths.iter().min().unwrap();
        let max = widths.iter().max().unwrap();
        assert!(*min > 0);
        assert!(max - min <= 1);
    }
}

#[test]
fn test_invalid_partitions() {
    let begin = at(2020, 1, 1);
    let end = at(2020, 1, 2);
    assert!(matches!(partition(begin, end, 0), Err(HarvestError::InvalidRange(_))));
    assert!(matches!(partition(end, begin, 3), Err(HarvestError::InvalidRange(_))));
    assert!(matches!(partition(begin, begin, 3), Err(HarvestError::InvalidRange(_))));
}

#[test]
fn test_default_discovery_range_splits_into_1000() {
    let parts = partition_dates(
        NaiveDate::from_ymd_opt(2015, 5, 1).unwrap(),
        NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
        1000,
    )
    .unwrap();
    assert_eq!(parts.len(), 1000);
    assert!(parts.iter().all(|p| p.width() > Duration::hours(78)));
}
