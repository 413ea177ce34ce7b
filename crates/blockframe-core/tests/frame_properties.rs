#![allow(missing_docs)]

mod common;

use blockframe_core::{Owner, PeriodError, Profile, RangeBound, StoreError, Value};
use common::{SETUPS, TestResult, floats, hourly, row_count, setup};

#[test]
fn unwritten_periods_read_as_default() -> TestResult {
    for &(profile, multi) in SETUPS {
        let config = hourly(24)?;
        let db = setup(profile, multi, &config)?;
        let frame = db.frame(&config, &Owner::new(1, "Meter"))?;

        assert_eq!(frame.get_at(0)?, Value::Float(0.0));
        assert_eq!(frame.get_at(1_000_000)?, Value::Float(0.0));
        let seq = frame.get_range(100, 200, RangeBound::Exclusive)?;
        assert_eq!(seq.len(), 100);
        assert!(seq.non_default().is_empty());
        assert_eq!(row_count(&db, "loads")?, 0);
    }
    Ok(())
}

#[test]
fn writes_round_trip() -> TestResult {
    for &(profile, multi) in SETUPS {
        let config = hourly(24)?;
        let db = setup(profile, multi, &config)?;
        let frame = db.frame(&config, &Owner::new(1, "Meter"))?;

        // 20..70 spans three blocks, the first and last partially.
        let values: Vec<Value> = (0..50).map(|i| Value::Float(i as f64 * 0.1 + 1.0)).collect();
        frame.set_range(20, 70, &values)?;
        let seq = frame.get_range(20, 70, RangeBound::Exclusive)?;
        assert_eq!(seq.round(6), values.iter().map(|v| v.round(6)).collect::<Vec<_>>());
        assert_eq!(row_count(&db, "loads")?, 3, "{profile}");
    }
    Ok(())
}

#[test]
fn repeated_writes_are_idempotent() -> TestResult {
    for &(profile, multi) in SETUPS {
        let config = hourly(24)?;
        let db = setup(profile, multi, &config)?;
        let frame = db.frame(&config, &Owner::new(1, "Meter"))?;

        let values = floats(&[1.0, 2.0, 3.0, 4.0]);
        frame.set_range(22, 26, &values)?;
        let first = frame.get_range(0, 48, RangeBound::Exclusive)?;
        frame.set_range(22, 26, &values)?;
        let second = frame.get_range(0, 48, RangeBound::Exclusive)?;
        assert_eq!(first, second);
        assert_eq!(row_count(&db, "loads")?, 2);
    }
    Ok(())
}

#[test]
fn partial_writes_keep_untouched_slots() -> TestResult {
    for &(profile, multi) in SETUPS {
        let config = hourly(24)?;
        let db = setup(profile, multi, &config)?;
        let frame = db.frame(&config, &Owner::new(1, "Meter"))?;

        let full: Vec<Value> = (0..24).map(|i| Value::Float(i as f64)).collect();
        frame.set_range(24, 48, &full)?;
        frame.set_range(30, 33, &floats(&[-1.0, -2.0, -3.0]))?;

        let seq = frame.get_range(24, 48, RangeBound::Exclusive)?;
        for (i, value) in seq.iter().enumerate() {
            let expected = match i {
                6 => Value::Float(-1.0),
                7 => Value::Float(-2.0),
                8 => Value::Float(-3.0),
                _ => Value::Float(i as f64),
            };
            assert_eq!(value, &expected, "{profile} multi={multi} slot {i}");
        }
    }
    Ok(())
}

#[test]
fn owners_do_not_see_each_other() -> TestResult {
    let config = hourly(24)?;
    let db = setup(Profile::RowMerge, true, &config)?;
    let a = db.frame(&config, &Owner::new(1, "Meter"))?;
    let b = db.frame(&config, &Owner::new(1, "Plant"))?;
    let c = db.frame(&config, &Owner::new(2, "Meter"))?;

    a.set_at(5, 1.0)?;
    b.set_at(5, 2.0)?;
    assert_eq!(a.get_at(5)?, Value::Float(1.0));
    assert_eq!(b.get_at(5)?, Value::Float(2.0));
    assert_eq!(c.get_at(5)?, Value::Float(0.0));
    Ok(())
}

#[test]
fn reversed_exclusive_ranges_are_rejected() -> TestResult {
    let config = hourly(24)?;
    let db = setup(Profile::RowMerge, true, &config)?;
    let frame = db.frame(&config, &Owner::new(1, "Meter"))?;

    for (start, end) in [(1, 0), (10, 3), (48, 47), (1000, 0)] {
        let err = frame.get_range(start, end, RangeBound::Exclusive).unwrap_err();
        assert!(err.is_range_error(), "{start}..{end}: {err}");
    }
    Ok(())
}

#[test]
fn range_lengths() -> TestResult {
    let config = hourly(24)?;
    let db = setup(Profile::RowMerge, true, &config)?;
    let frame = db.frame(&config, &Owner::new(1, "Meter"))?;

    for (a, b) in [(0, 0), (3, 3), (0, 1), (5, 29), (23, 73)] {
        assert_eq!(frame.get_range(a, b, RangeBound::Exclusive)?.len() as i64, b - a);
        assert_eq!(frame.get_range(a, b, RangeBound::Inclusive)?.len() as i64, b - a + 1);
    }
    Ok(())
}

#[test]
fn schema_mismatches_are_reported_before_writing() -> TestResult {
    let config = hourly(24)?;
    let db = setup(Profile::RowMerge, true, &config)?;
    let frame = db.frame(&config, &Owner::new(1, "Meter"))?;

    let err = frame.set_range(0, 3, &floats(&[1.0])).unwrap_err();
    assert!(matches!(err, StoreError::ValueCount { expected: 3, actual: 1 }));

    let err = frame.set_range(0, 1, &[Value::from("high")]).unwrap_err();
    assert!(err.is_schema_mismatch());

    let err = frame.delete_periods(5, 24).unwrap_err();
    assert!(matches!(err, StoreError::UnalignedDelete { .. }));

    assert_eq!(row_count(&db, "loads")?, 0);
    Ok(())
}

#[test]
fn negative_periods_are_rejected() -> TestResult {
    let config = hourly(24)?;
    let db = setup(Profile::RowMerge, true, &config)?;
    let frame = db.frame(&config, &Owner::new(1, "Meter"))?;

    assert!(matches!(
        frame.get_range(-5, 3, RangeBound::Exclusive),
        Err(StoreError::Period { .. })
    ));
    assert!(matches!(frame.set_at(-1, 1.0), Err(StoreError::Period { .. })));
    Ok(())
}

#[test]
fn periods_near_the_integer_limit_fail_cleanly() -> TestResult {
    for &(profile, multi) in SETUPS {
        let config = hourly(24)?;
        let db = setup(profile, multi, &config)?;
        let frame = db.frame(&config, &Owner::new(1, "Meter"))?;

        let err = frame
            .get_range(i64::MAX - 2, i64::MAX - 1, RangeBound::Exclusive)
            .unwrap_err();
        assert!(
            matches!(err, StoreError::Period { source: PeriodError::OutOfRange { .. } }),
            "{profile}: {err}"
        );
        assert!(frame.get_at(i64::MAX - 1).is_err());
        assert!(frame.set_at(i64::MAX - 1, 1.0).is_err());
        assert_eq!(row_count(&db, "loads")?, 0);
    }
    Ok(())
}

#[test]
fn whole_block_delete() -> TestResult {
    for &(profile, multi) in SETUPS {
        let config = hourly(24)?;
        let db = setup(profile, multi, &config)?;
        let frame = db.frame(&config, &Owner::new(1, "Meter"))?;

        frame.set_range(20, 48, &floats(&[7.0; 28]))?;
        assert_eq!(row_count(&db, "loads")?, 2);

        frame.delete_periods(24, 48)?;
        assert_eq!(row_count(&db, "loads")?, 1);
        assert_eq!(frame.get_at(23)?, Value::Float(7.0));
        assert_eq!(frame.get_at(30)?, Value::Float(0.0));
        // Block 2 never existed; deleting it is a no-op.
        frame.delete_periods(48, 72)?;
        assert_eq!(row_count(&db, "loads")?, 1);
    }
    Ok(())
}

#[test]
fn timestamp_forms() -> TestResult {
    let config = hourly(24)?;
    let db = setup(Profile::Upsert, false, &config)?;
    let frame = db.frame(&config, &Owner::new(3, "Meter"))?;

    frame.set_from("2020-02-29 22:00", &floats(&[1.0, 2.0, 3.0]))?;
    assert_eq!(frame.get_at_time("2020-03-01T00:00:00Z")?, Value::Float(3.0));
    let seq = frame.get_between("2020-02-29 22:00", "2020-03-01 01:00", RangeBound::Exclusive)?;
    assert_eq!(seq, floats(&[1.0, 2.0, 3.0]));
    assert_eq!(seq.start(), frame.period("2020-02-29T22:00")?);
    Ok(())
}
