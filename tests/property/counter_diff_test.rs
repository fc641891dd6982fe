//! Property-based tests for counter comparison and snapshot policies.

use proptest::prelude::*;

use ticketwatch::managers::monitor::{diff_counters, next_snapshot};
use ticketwatch::types::counters::{Category, CounterSnapshot, Reading};
use ticketwatch::types::settings::MissingFieldPolicy;

fn reading() -> impl Strategy<Value = Reading> {
    prop_oneof![
        4 => (0u64..1000).prop_map(Reading::Count),
        1 => Just(Reading::Unreadable),
    ]
}

fn snapshot() -> impl Strategy<Value = CounterSnapshot> {
    (reading(), reading(), reading()).prop_map(|(d, s, w)| CounterSnapshot::new(d, s, w))
}

fn policy() -> impl Strategy<Value = MissingFieldPolicy> {
    prop_oneof![
        Just(MissingFieldPolicy::StoreUnreadable),
        Just(MissingFieldPolicy::KeepPrevious),
    ]
}

fn as_number(reading: Reading) -> u64 {
    reading.count().unwrap_or(0)
}

proptest! {
    /// An alert fires exactly for readable counters strictly above the
    /// stored value, where a stored unreadable value counts as zero.
    #[test]
    fn alerts_match_strict_increases(previous in snapshot(), current in snapshot()) {
        let alerts = diff_counters(&previous, &current);
        let alerted: Vec<Category> = alerts.iter().map(|a| a.category).collect();

        for category in Category::ALL {
            let expected = match current.get(category) {
                Reading::Count(n) => n > as_number(previous.get(category)),
                Reading::Unreadable => false,
            };
            prop_assert_eq!(alerted.contains(&category), expected, "{:?}", category);
        }
    }

    /// Alerts carry the fresh value and follow danger, success, warning order.
    #[test]
    fn alerts_carry_new_value_in_order(previous in snapshot(), current in snapshot()) {
        let alerts = diff_counters(&previous, &current);
        prop_assert!(alerts.len() <= 3);
        let positions: Vec<usize> = alerts
            .iter()
            .map(|a| Category::ALL.iter().position(|c| *c == a.category).unwrap())
            .collect();
        prop_assert!(positions.windows(2).all(|w| w[0] < w[1]));
        for alert in &alerts {
            prop_assert_eq!(Reading::Count(alert.new_value), current.get(alert.category));
            prop_assert_eq!(alert.sound_file.as_str(), alert.category.sound_file());
        }
    }

    /// Seeing the same values twice never alerts.
    #[test]
    fn repeated_reading_is_quiet(current in snapshot()) {
        let stored = next_snapshot(MissingFieldPolicy::StoreUnreadable, &current, &current);
        prop_assert!(diff_counters(&stored, &current).is_empty());
    }

    /// After persisting, the same page never alerts again, whatever the policy.
    #[test]
    fn persisted_snapshot_absorbs_alerts(
        policy in policy(),
        previous in snapshot(),
        current in snapshot(),
    ) {
        let stored = next_snapshot(policy, &previous, &current);
        prop_assert!(diff_counters(&stored, &current).is_empty());
    }

    /// Keep-previous only differs from the fresh reading where it was unreadable.
    #[test]
    fn keep_previous_replaces_only_unreadable(previous in snapshot(), current in snapshot()) {
        let kept = next_snapshot(MissingFieldPolicy::KeepPrevious, &previous, &current);
        for category in Category::ALL {
            let expected = match current.get(category) {
                Reading::Unreadable => previous.get(category),
                fresh => fresh,
            };
            prop_assert_eq!(kept.get(category), expected);
        }
        prop_assert_eq!(
            next_snapshot(MissingFieldPolicy::StoreUnreadable, &previous, &current),
            current
        );
    }

    /// Plain decimal text scrapes to the same count, whatever the padding.
    #[test]
    fn decimal_text_parses(n in 0u64..10_000_000, pad in "[ \t]{0,3}") {
        let text = format!("{}{}{}", pad, n, pad);
        prop_assert_eq!(Reading::from_scraped(Some(&text)), Reading::Count(n));
    }

    /// Text containing letters is never a count, unless it is a radix literal.
    #[test]
    fn text_with_letters_is_unreadable(text in "[1-9]{0,3}[a-df-zA-DF-Z][0-9a-z]{0,3}") {
        prop_assert_eq!(Reading::from_scraped(Some(&text)), Reading::Unreadable);
    }

    /// Hex text scrapes to the count it spells.
    #[test]
    fn hex_text_parses(n in 0u64..u64::MAX, upper in any::<bool>()) {
        let text = if upper { format!("0X{:X}", n) } else { format!("0x{:x}", n) };
        prop_assert_eq!(Reading::from_scraped(Some(&text)), Reading::Count(n));
    }
}
