//! Voting flow: match selection, eligibility checks and vote recording.
//!
//! The three steps are independent request/response pairs; the selection
//! state travels in the callback payload, not in a conversation session.
//! Payloads are `"{match_id}"` for match selection and `"{match_id}_{outcome}"`
//! for outcome selection, where the outcome is a team name or the `draw`
//! sentinel. Anything that does not decode is answered with a user-visible
//! format error instead of being trusted.

use chrono::{Duration, NaiveDate, NaiveDateTime};

use crate::core::config;
use crate::core::error::{AppError, AppResult};
use crate::flows::{Button, Reply};
use crate::storage::db::{self, DbConnection};

/// Outcome sentinel stored for a drawn result, distinct from any team name.
pub const DRAW_SENTINEL: &str = "draw";

/// Localized label the sentinel renders as.
pub const DRAW_LABEL: &str = "Ничья";

const ALREADY_VOTED: &str = "Ты уже проголосовал за этот матч сегодня.";

/// Fallback names used when the voter has no registration record.
const UNKNOWN_FIRST_NAME: &str = "Неизвестный";
const UNKNOWN_LAST_NAME: &str = "пользователь";

/// Identity of the voter, as delivered by the transport.
#[derive(Debug, Clone)]
pub struct Voter {
    pub user_id: i64,
    pub username: Option<String>,
}

/// Renders a stored outcome: the draw sentinel becomes its localized label,
/// any other value (a team name) is rendered verbatim.
pub fn render_outcome(vote: &str) -> &str {
    if vote == DRAW_SENTINEL {
        DRAW_LABEL
    } else {
        vote
    }
}

/// Encodes a match-selection payload.
pub fn match_payload(match_id: i64) -> String {
    match_id.to_string()
}

/// Encodes an outcome-selection payload.
pub fn outcome_payload(match_id: i64, outcome: &str) -> String {
    format!("{}_{}", match_id, outcome)
}

/// Decodes a match-selection payload. `None` for anything non-numeric.
pub fn parse_match_payload(data: &str) -> Option<i64> {
    data.parse::<i64>().ok()
}

/// Decodes an outcome-selection payload. `None` when the separator is
/// missing, the id is non-numeric or the outcome is empty.
pub fn parse_outcome_payload(data: &str) -> Option<(i64, &str)> {
    let (id, outcome) = data.split_once('_')?;
    let match_id = id.parse::<i64>().ok()?;
    if outcome.is_empty() {
        return None;
    }
    Some((match_id, outcome))
}

fn parse_match_datetime(raw: &str) -> AppResult<NaiveDateTime> {
    NaiveDateTime::parse_from_str(raw, config::DATE_TIME_FORMAT)
        .map_err(|e| AppError::Validation(format!("Некорректная дата матча '{}': {}", raw, e)))
}

/// Step 1 (`/vote`): lists matches scheduled for today.
///
/// Distinguishes an empty match table from a day without games. Matches with
/// an unparseable date are skipped from the day filter (they still count as
/// existing matches).
pub fn start(conn: &DbConnection, today: NaiveDate) -> AppResult<Reply> {
    let matches = db::get_all_matches(conn)?;
    if matches.is_empty() {
        return Ok(Reply::text("Матчи не найдены."));
    }

    let mut buttons = Vec::new();
    for m in &matches {
        match parse_match_datetime(&m.match_date) {
            Ok(dt) if dt.date() == today => {
                buttons.push(vec![Button::new(
                    format!("{} vs {}", m.team1, m.team2),
                    match_payload(m.match_id),
                )]);
            }
            Ok(_) => {}
            Err(e) => log::warn!("Матч {} пропущен: {}", m.match_id, e),
        }
    }

    if buttons.is_empty() {
        return Ok(Reply::text("Сегодня нет игр."));
    }
    Ok(Reply::with_buttons("Выбери матч для голосования:", buttons))
}

/// Step 2: match selected, re-validate and offer the three outcomes.
///
/// Rejections (already voted, match missing, window closed) are idempotent
/// replies without a write.
pub fn select_match(
    conn: &DbConnection,
    user_id: i64,
    data: &str,
    now: NaiveDateTime,
) -> AppResult<Reply> {
    let Some(match_id) = parse_match_payload(data) else {
        return Ok(Reply::text("Некорректный формат данных."));
    };

    let today = now.date().format(config::DATE_FORMAT).to_string();
    if db::has_voted_on(conn, user_id, match_id, &today)? {
        return Ok(Reply::text(ALREADY_VOTED));
    }

    let Some(m) = db::get_match(conn, match_id)? else {
        return Ok(Reply::text("Матч не найден."));
    };

    let match_dt = parse_match_datetime(&m.match_date)?;
    if !voting_window_open(now, match_dt) {
        return Ok(Reply::text("Голосование для этого матча недоступно."));
    }

    let buttons = vec![
        vec![Button::new(m.team1.clone(), outcome_payload(match_id, &m.team1))],
        vec![Button::new(m.team2.clone(), outcome_payload(match_id, &m.team2))],
        vec![Button::new(DRAW_LABEL, outcome_payload(match_id, DRAW_SENTINEL))],
    ];
    Ok(Reply::with_buttons("Выбери результат матча:", buttons))
}

/// Voting is open from five days before kickoff up to (but excluding) kickoff.
fn voting_window_open(now: NaiveDateTime, match_dt: NaiveDateTime) -> bool {
    now >= match_dt - Duration::days(config::voting::WINDOW_DAYS) && now < match_dt
}

/// Step 3: outcome selected, re-check the duplicate rule and append the vote.
///
/// The duplicate check is repeated here because step 2 and step 3 are not
/// atomic against concurrent submissions; the unique index on
/// (user_id, match_id, vote_date) catches whatever slips between the check
/// and the write.
pub fn record_vote(
    conn: &DbConnection,
    voter: &Voter,
    data: &str,
    now: NaiveDateTime,
) -> AppResult<Reply> {
    let Some((match_id, outcome)) = parse_outcome_payload(data) else {
        return Ok(Reply::text("Некорректный формат данных."));
    };

    let today = now.date().format(config::DATE_FORMAT).to_string();
    if db::has_voted_on(conn, voter.user_id, match_id, &today)? {
        return Ok(Reply::text(ALREADY_VOTED));
    }

    let (first_name, last_name) = match db::get_user(conn, voter.user_id)? {
        Some(user) => (
            user.first_name.unwrap_or_else(|| UNKNOWN_FIRST_NAME.to_string()),
            user.last_name.unwrap_or_else(|| UNKNOWN_LAST_NAME.to_string()),
        ),
        None => (UNKNOWN_FIRST_NAME.to_string(), UNKNOWN_LAST_NAME.to_string()),
    };

    match db::insert_vote(
        conn,
        voter.user_id,
        match_id,
        outcome,
        voter.username.as_deref(),
        &first_name,
        &last_name,
        &today,
    ) {
        Ok(true) => Ok(Reply::text(format!("Ты выбрал: {}", render_outcome(outcome)))),
        Ok(false) => Ok(Reply::text(ALREADY_VOTED)),
        Err(e) => {
            log::error!("Ошибка записи голоса в базу данных: {}", e);
            Ok(Reply::text("Не удалось сохранить голос. Попробуй позже."))
        }
    }
}
