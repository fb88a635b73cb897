use once_cell::sync::Lazy;
use std::env;

/// Configuration constants for the bot

/// Path to the SQLite database file
/// Read once at startup from DATABASE_PATH environment variable
/// Defaults to data/euro2024.db (the data/ directory is created on startup)
pub static DATABASE_PATH: Lazy<String> =
    Lazy::new(|| env::var("DATABASE_PATH").unwrap_or_else(|_| "data/euro2024.db".to_string()));

/// Path to the log file
/// Read from LOG_FILE_PATH environment variable
pub static LOG_FILE_PATH: Lazy<String> =
    Lazy::new(|| env::var("LOG_FILE_PATH").unwrap_or_else(|_| "matchvote.log".to_string()));

/// Format of `matches.match_date` values in the database
pub const DATE_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Format of `votes.vote_date` values in the database (calendar day)
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Human-facing date format used in the match list
pub const DISPLAY_DATE_FORMAT: &str = "%d.%m.%Y %H:%M";

/// Voting window configuration
pub mod voting {
    /// Voting opens this many days before kickoff and closes at kickoff
    pub const WINDOW_DAYS: i64 = 5;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn date_formats_round_trip() {
        let dt = chrono::NaiveDateTime::parse_from_str("2024-06-14 18:00:00", DATE_TIME_FORMAT)
            .unwrap();
        assert_eq!(dt.format(DATE_TIME_FORMAT).to_string(), "2024-06-14 18:00:00");
        assert_eq!(dt.format(DISPLAY_DATE_FORMAT).to_string(), "14.06.2024 18:00");
        assert_eq!(dt.date().format(DATE_FORMAT).to_string(), "2024-06-14");
    }
}
