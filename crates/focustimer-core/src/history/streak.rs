use chrono::{Days, NaiveDate};

/// Number of consecutive days with at least one session, ending today.
///
/// A day that has not produced a session yet does not break the streak: if
/// `today` is missing but yesterday is present, counting starts from
/// yesterday. Duplicate and future dates are ignored.
pub fn current_streak(dates: &[NaiveDate], today: NaiveDate) -> u32 {
    let mut days: Vec<NaiveDate> = dates.iter().copied().filter(|d| *d <= today).collect();
    days.sort_unstable_by(|a, b| b.cmp(a));
    days.dedup();

    let Some(&latest) = days.first() else {
        return 0;
    };
    let yesterday = today.checked_sub_days(Days::new(1));
    if latest != today && Some(latest) != yesterday {
        return 0;
    }

    let mut streak = 0;
    let mut expected = Some(latest);
    for day in days {
        if Some(day) != expected {
            break;
        }
        streak += 1;
        expected = day.checked_sub_days(Days::new(1));
    }
    streak
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(offset: u64) -> NaiveDate {
        today().checked_sub_days(Days::new(offset)).unwrap()
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 14).unwrap()
    }

    #[test]
    fn three_consecutive_days() {
        assert_eq!(current_streak(&[day(0), day(1), day(2)], today()), 3);
    }

    #[test]
    fn gap_breaks_the_streak() {
        assert_eq!(current_streak(&[day(0), day(2)], today()), 1);
    }

    #[test]
    fn empty_history_has_no_streak() {
        assert_eq!(current_streak(&[], today()), 0);
    }

    #[test]
    fn yesterday_keeps_streak_alive() {
        assert_eq!(current_streak(&[day(1), day(2), day(4)], today()), 2);
    }

    #[test]
    fn stale_history_has_no_streak() {
        assert_eq!(current_streak(&[day(2), day(3)], today()), 0);
    }

    #[test]
    fn order_duplicates_and_future_days_are_ignored() {
        let future = today().checked_add_days(Days::new(1)).unwrap();
        let dates = [day(1), future, day(0), day(1), day(0)];
        assert_eq!(current_streak(&dates, today()), 2);
    }

    #[test]
    fn streak_crosses_month_boundary() {
        let today = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap();
        let dates = [
            today,
            NaiveDate::from_ymd_opt(2025, 2, 28).unwrap(),
            NaiveDate::from_ymd_opt(2025, 2, 27).unwrap(),
        ];
        assert_eq!(current_streak(&dates, today), 3);
    }
}
