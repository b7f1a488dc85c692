//! Row-handler stop property for `query_many`.

use crate::common::*;
use proptest::prelude::*;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// A handler failing on row `k` sees exactly rows 1..=k, the error comes
    /// back unchanged and the result set is closed.
    #[test]
    fn handler_failure_stops_iteration(rows in 0i64..20, fail_at in proptest::option::of(1i64..20), scoped in any::<bool>()) {
        let (pool, locker) = setup();
        script_numbers(&pool, "SELECT n FROM t", rows);
        let ctx = if scoped { request().1 } else { Context::background() };

        let mut seen = Vec::new();
        let result = locker.query_many(
            &ctx,
            |row| {
                let n = row.get::<i64>(0)?;
                seen.push(n);
                if Some(n) == fail_at {
                    return Err(Error::handler(format!("row {}", n)));
                }
                Ok(())
            },
            "SELECT n FROM t",
            &[],
        );

        match fail_at.filter(|k| *k <= rows) {
            Some(k) => {
                let err = result.unwrap_err();
                prop_assert_eq!(err.to_string(), format!("row handler failed: row {}", k));
                prop_assert_eq!(seen, (1..=k).collect::<Vec<_>>());
            }
            None => {
                prop_assert_eq!(result.unwrap(), rows as usize);
                prop_assert_eq!(seen.len(), rows as usize);
            }
        }
        prop_assert_eq!(pool.open_result_sets(), 0);
    }
}
