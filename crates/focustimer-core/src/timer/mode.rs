use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimerMode {
    Focus,
    ShortBreak,
    LongBreak,
}

impl TimerMode {
    pub fn is_break(self) -> bool {
        matches!(self, TimerMode::ShortBreak | TimerMode::LongBreak)
    }

    pub fn label(self) -> &'static str {
        match self {
            TimerMode::Focus => "Focus",
            TimerMode::ShortBreak => "Short break",
            TimerMode::LongBreak => "Long break",
        }
    }

    /// Stable identifier used in the database and on the command line.
    pub fn as_str(self) -> &'static str {
        match self {
            TimerMode::Focus => "focus",
            TimerMode::ShortBreak => "short_break",
            TimerMode::LongBreak => "long_break",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "focus" => Some(TimerMode::Focus),
            "short_break" | "short" => Some(TimerMode::ShortBreak),
            "long_break" | "long" => Some(TimerMode::LongBreak),
            _ => None,
        }
    }
}

impl std::fmt::Display for TimerMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Configured length of each mode, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Durations {
    pub focus_secs: u64,
    pub short_break_secs: u64,
    pub long_break_secs: u64,
}

impl Durations {
    /// Build from minute values.
    ///
    /// Uses saturating arithmetic so absurd inputs cannot overflow.
    pub fn from_minutes(focus: u64, short_break: u64, long_break: u64) -> Self {
        Self {
            focus_secs: focus.saturating_mul(60),
            short_break_secs: short_break.saturating_mul(60),
            long_break_secs: long_break.saturating_mul(60),
        }
    }

    pub fn for_mode(&self, mode: TimerMode) -> u64 {
        match mode {
            TimerMode::Focus => self.focus_secs,
            TimerMode::ShortBreak => self.short_break_secs,
            TimerMode::LongBreak => self.long_break_secs,
        }
    }
}

impl Default for Durations {
    fn default() -> Self {
        Self::from_minutes(25, 5, 15)
    }
}

/// Mode that follows `current`, and the updated cycle counter.
///
/// `completed_focus` counts focus intervals finished in the current cycle.
/// Finishing a focus interval leads to a short break, except when the count
/// reaches a multiple of `cycle_length`: then a long break follows and the
/// counter goes back to 0. Every break leads back to focus.
pub fn next_mode(current: TimerMode, completed_focus: u32, cycle_length: u32) -> (TimerMode, u32) {
    let cycle_length = cycle_length.max(1);
    match current {
        TimerMode::Focus => {
            let completed = completed_focus.saturating_add(1);
            if completed % cycle_length == 0 {
                (TimerMode::LongBreak, 0)
            } else {
                (TimerMode::ShortBreak, completed)
            }
        }
        TimerMode::ShortBreak | TimerMode::LongBreak => (TimerMode::Focus, completed_focus),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_durations_are_classic_pomodoro() {
        let d = Durations::default();
        assert_eq!(d.for_mode(TimerMode::Focus), 25 * 60);
        assert_eq!(d.for_mode(TimerMode::ShortBreak), 5 * 60);
        assert_eq!(d.for_mode(TimerMode::LongBreak), 15 * 60);
    }

    #[test]
    fn four_focus_cycle_walks_the_round_robin() {
        let mut mode = TimerMode::Focus;
        let mut counter = 0;
        let mut seen = Vec::new();
        for _ in 0..8 {
            let (next, c) = next_mode(mode, counter, 4);
            mode = next;
            counter = c;
            seen.push(mode);
        }
        assert_eq!(
            seen,
            vec![
                TimerMode::ShortBreak,
                TimerMode::Focus,
                TimerMode::ShortBreak,
                TimerMode::Focus,
                TimerMode::ShortBreak,
                TimerMode::Focus,
                TimerMode::LongBreak,
                TimerMode::Focus,
            ]
        );
        assert_eq!(counter, 0);
    }

    #[test]
    fn cycle_of_one_always_takes_long_break() {
        assert_eq!(next_mode(TimerMode::Focus, 0, 1), (TimerMode::LongBreak, 0));
        assert_eq!(next_mode(TimerMode::Focus, 0, 0), (TimerMode::LongBreak, 0));
    }

    #[test]
    fn breaks_keep_the_counter() {
        assert_eq!(next_mode(TimerMode::ShortBreak, 2, 4), (TimerMode::Focus, 2));
        assert_eq!(next_mode(TimerMode::LongBreak, 0, 4), (TimerMode::Focus, 0));
    }

    #[test]
    fn parse_accepts_cli_spellings() {
        assert_eq!(TimerMode::parse("short-break"), Some(TimerMode::ShortBreak));
        assert_eq!(TimerMode::parse("LONG"), Some(TimerMode::LongBreak));
        assert_eq!(TimerMode::parse("nap"), None);
    }
}
