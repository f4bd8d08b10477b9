#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use crate::time_bucket::Granularity;

    #[test]
    fn encodes_each_granularity() {
        let instant = Utc.with_ymd_and_hms(2024, 1, 10, 10, 35, 7).unwrap();

        assert_eq!(Granularity::Month.bucket(instant), 202401);
        assert_eq!(Granularity::Day.bucket(instant), 20240110);
        assert_eq!(Granularity::Hour.bucket(instant), 2024011010);
        assert_eq!(Granularity::Minute.bucket(instant), 202401101035);
        assert_eq!(Granularity::Second.bucket(instant), 20240110103507);
    }

    #[test]
    fn window_start_decodes_buckets() {
        assert_eq!(
            Granularity::Hour.window_start(2024011010),
            Some(Utc.with_ymd_and_hms(2024, 1, 10, 10, 0, 0).unwrap())
        );
        assert_eq!(
            Granularity::Month.window_start(202402),
            Some(Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap())
        );
        assert_eq!(Granularity::Day.window_start(20241301), None);
        assert_eq!(Granularity::Minute.window_start(202401101061), None);
    }

    #[test]
    fn floor_truncates_to_window() {
        let instant = Utc.with_ymd_and_hms(2024, 3, 31, 23, 59, 59).unwrap();
        assert_eq!(
            Granularity::Month.floor(instant),
            Some(Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap())
        );
    }

    #[test]
    fn retention_range_ends_on_the_cutoff_day() {
        // Three days before 2024-01-10, inclusive up to the last millisecond.
        let end = Utc
            .with_ymd_and_hms(2024, 1, 8, 0, 0, 0)
            .unwrap()
            .timestamp_millis()
            - 1;

        assert_eq!(
            Granularity::Day.resolve_range(0, end),
            Some((19700101, 20240107))
        );
        assert_eq!(
            Granularity::Hour.resolve_range(0, end),
            Some((1970010100, 2024010723))
        );
        assert_eq!(
            Granularity::Minute.resolve_range(0, end),
            Some((197001010000, 202401072359))
        );
        // January is still running, so only complete months go.
        assert_eq!(
            Granularity::Month.resolve_range(0, end),
            Some((197001, 202312))
        );
    }

    #[test]
    fn range_without_complete_window_resolves_to_none() {
        let start = Utc
            .with_ymd_and_hms(2024, 1, 10, 0, 0, 0)
            .unwrap()
            .timestamp_millis();
        assert_eq!(Granularity::Day.resolve_range(start, start + 1_000), None);
    }

    #[test]
    fn names_round_trip_through_from_str() {
        for granularity in Granularity::ALL {
            assert_eq!(granularity.name().parse::<Granularity>(), Ok(granularity));
        }
        assert!("week".parse::<Granularity>().is_err());
        assert_eq!(
            Granularity::Minute.table_name("application_alarm_list"),
            "minute_application_alarm_list"
        );
    }
}
