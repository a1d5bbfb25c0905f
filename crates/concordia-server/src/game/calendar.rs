use crate::config::CalendarConfig;

/// Calendar year of a turn. Turn 1 is `start_year`; year 0 is skipped unless
/// the calendar has one.
pub fn year_for_turn(calendar: &CalendarConfig, turn: u32) -> i32 {
    let elapsed = i64::from(turn.saturating_sub(1));
    let year = i64::from(calendar.start_year) + elapsed * i64::from(calendar.year_step);
    let year = year.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32;
    if year == 0 && !calendar.year_zero {
        1
    } else {
        year
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn steps_once_per_turn() {
        let calendar = CalendarConfig::default();
        assert_eq!(year_for_turn(&calendar, 1), -4000);
        assert_eq!(year_for_turn(&calendar, 2), -3950);
        assert_eq!(year_for_turn(&calendar, 81), 1);
        assert_eq!(year_for_turn(&calendar, 82), 50);
    }

    #[test]
    fn year_zero_when_enabled() {
        let calendar = CalendarConfig {
            year_zero: true,
            ..CalendarConfig::default()
        };
        assert_eq!(year_for_turn(&calendar, 81), 0);
    }
}
