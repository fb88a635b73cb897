//! Read-only reporting: standings, teams, matches and voting results.
//!
//! Everything here is stateless except the user-scoped result lookup, which
//! asks for a "имя фамилия" line and terminates after one response.

use chrono::NaiveDateTime;
use std::fmt::Write as _;

use crate::core::config;
use crate::core::error::AppResult;
use crate::flows::voting::render_outcome;
use crate::flows::{Button, ConversationState, Reply, Sessions};
use crate::storage::db::{self, DbConnection};

/// Callback payload of the aggregate-results menu button.
pub const ALL_RESULTS_CALLBACK: &str = "all_results";
/// Callback payload of the per-user results menu button.
pub const USER_RESULTS_CALLBACK: &str = "user_results";

/// `/standings`: the table grouped by group name, order as returned by the
/// store (group name, then points descending), numbered within each group.
pub fn standings(conn: &DbConnection) -> AppResult<Reply> {
    let rows = db::get_standings(conn)?;
    if rows.is_empty() {
        return Ok(Reply::text("Турнирная таблица пуста."));
    }

    let mut text = String::from("Турнирная таблица:\n\n");
    let mut current_group: Option<&str> = None;
    let mut position = 0;
    for row in &rows {
        if current_group != Some(row.group_name.as_str()) {
            if current_group.is_some() {
                text.push('\n');
            }
            let _ = writeln!(text, "Группа {}", row.group_name);
            current_group = Some(row.group_name.as_str());
            position = 0;
        }
        position += 1;
        let _ = writeln!(text, "{}. {}: {} очков", position, row.team, row.points);
    }
    Ok(Reply::text(text))
}

/// `/teams`: one team per line.
pub fn teams(conn: &DbConnection) -> AppResult<Reply> {
    let teams = db::get_teams(conn)?;
    if teams.is_empty() {
        return Ok(Reply::text("Список команд пуст."));
    }

    let mut text = String::from("Список команд:\n\n");
    for team in &teams {
        let _ = writeln!(text, "{}", team);
    }
    Ok(Reply::text(text))
}

/// `/matches`: every match with its kickoff in local display format.
pub fn matches(conn: &DbConnection) -> AppResult<Reply> {
    let matches = db::get_all_matches(conn)?;
    if matches.is_empty() {
        return Ok(Reply::text("Список матчей пуст."));
    }

    let mut text = String::from("Список матчей:\n\n");
    for m in &matches {
        let when = match NaiveDateTime::parse_from_str(&m.match_date, config::DATE_TIME_FORMAT) {
            Ok(dt) => dt.format(config::DISPLAY_DATE_FORMAT).to_string(),
            // Raw value is still more useful than dropping the row
            Err(_) => m.match_date.clone(),
        };
        let _ = writeln!(text, "{} vs {} ({})", m.team1, m.team2, when);
    }
    Ok(Reply::text(text))
}

/// `/results`: menu with the two result views.
pub fn results_menu() -> Reply {
    Reply::with_buttons(
        "Выберите опцию:",
        vec![
            vec![Button::new("Общие результаты", ALL_RESULTS_CALLBACK)],
            vec![Button::new("Результаты по пользователю", USER_RESULTS_CALLBACK)],
        ],
    )
}

/// Aggregate results: every vote joined to its match.
pub fn all_results(conn: &DbConnection) -> AppResult<Reply> {
    let votes = db::get_votes_with_matches(conn)?;
    if votes.is_empty() {
        return Ok(Reply::text("Результаты голосования отсутствуют."));
    }

    let mut text = String::from("Результаты голосования:\n\n");
    for v in &votes {
        let user_name = match (&v.first_name, &v.last_name) {
            (Some(first), Some(last)) if !first.is_empty() && !last.is_empty() => {
                format!("{} {}", first, last)
            }
            _ => "Неизвестный пользователь".to_string(),
        };
        let _ = writeln!(
            text,
            "Матч: {} vs {}, Голос: {}, Пользователь: {}",
            v.team1,
            v.team2,
            render_outcome(&v.vote),
            user_name
        );
    }
    Ok(Reply::text(text))
}

/// Entry trigger of the user-results sub-flow: prompt for the name.
pub fn user_results_start(sessions: &Sessions, chat_id: i64) -> Reply {
    sessions.insert(chat_id, ConversationState::AwaitingResultsName);
    Reply::text("Нужно ввести имя и фамилию для просмотра голосов:")
}

/// Terminal step of the user-results sub-flow.
///
/// The input splits on the first whitespace into first/last name; text with
/// no space means an empty last name. Matching is exact string equality on
/// the pair, so namesakes are indistinguishable.
pub fn user_results(
    sessions: &Sessions,
    conn: &DbConnection,
    chat_id: i64,
    text: &str,
) -> AppResult<Reply> {
    sessions.remove(&chat_id);

    let full_name = text.trim();
    let (first_name, last_name) = match full_name.split_once(' ') {
        Some((first, last)) => (first, last),
        None => (full_name, ""),
    };

    let votes = db::get_user_votes(conn, first_name, last_name)?;
    if votes.is_empty() {
        return Ok(Reply::text(format!(
            "Голосования пользователя {} {} не найдены.",
            first_name, last_name
        )));
    }

    let mut text = format!(
        "Результаты голосования пользователя {} {}:\n\n",
        first_name, last_name
    );
    for v in &votes {
        let _ = writeln!(
            text,
            "Матч: {} vs {}, Голос: {}",
            v.team1,
            v.team2,
            render_outcome(&v.vote)
        );
    }
    Ok(Reply::text(text))
}
