//! End-to-end flow tests over a real SQLite file: registration, voting and
//! the result listings working against the same store.

use chrono::NaiveDateTime;
use pretty_assertions::assert_eq;
use tempfile::TempDir;

use matchvote::flows::registration::{self, Registrant};
use matchvote::flows::results;
use matchvote::flows::voting::{self, Voter};
use matchvote::flows::Sessions;
use matchvote::storage::db;
use matchvote::storage::{create_pool, get_connection, DbPool};

fn test_pool() -> (TempDir, DbPool) {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("test.sqlite");
    let pool = create_pool(path.to_str().unwrap()).unwrap();
    (dir, pool)
}

fn at(s: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()
}

#[test]
fn register_vote_and_read_back_results() {
    let (_dir, pool) = test_pool();
    let conn = get_connection(&pool).unwrap();
    let sessions = Sessions::new();

    // Registration: two-step conversation ending in an upsert
    let chat_id = 1;
    registration::start(&sessions, chat_id);
    registration::on_first_name(&sessions, chat_id, "Иван");
    let registrant = Registrant {
        user_id: 1,
        username: Some("ivan".to_string()),
    };
    let reply =
        registration::on_last_name(&sessions, &conn, chat_id, &registrant, "Иван", "Иванов")
            .unwrap();
    assert_eq!(reply.text, "Спасибо, Иван Иванов! Теперь ты в игре!");

    // A match today at 18:00; voting happens at 15:00
    let match_id = db::insert_match(&conn, "A", "B", "2024-06-14 18:00:00").unwrap();
    let now = at("2024-06-14 15:00:00");

    let reply = voting::start(&conn, now.date()).unwrap();
    assert_eq!(reply.text, "Выбери матч для голосования:");
    let match_data = reply.buttons[0][0].data.clone();

    let reply = voting::select_match(&conn, 1, &match_data, now).unwrap();
    assert_eq!(reply.text, "Выбери результат матча:");
    let draw_data = reply.buttons[2][0].data.clone();
    assert_eq!(draw_data, format!("{}_draw", match_id));

    let voter = Voter {
        user_id: 1,
        username: Some("ivan".to_string()),
    };
    let reply = voting::record_vote(&conn, &voter, &draw_data, now).unwrap();
    assert_eq!(reply.text, "Ты выбрал: Ничья");

    // Same day, both steps now answer idempotently without a second row
    let reply = voting::select_match(&conn, 1, &match_data, now).unwrap();
    assert_eq!(reply.text, "Ты уже проголосовал за этот матч сегодня.");
    let reply = voting::record_vote(&conn, &voter, &draw_data, now).unwrap();
    assert_eq!(reply.text, "Ты уже проголосовал за этот матч сегодня.");

    // Aggregate listing renders the draw sentinel and the denormalized name
    let text = results::all_results(&conn).unwrap().text;
    assert_eq!(
        text,
        "Результаты голосования:\n\nМатч: A vs B, Голос: Ничья, Пользователь: Иван Иванов\n"
    );

    // User-scoped listing goes through the name prompt
    let reply = results::user_results_start(&sessions, chat_id);
    assert_eq!(reply.text, "Нужно ввести имя и фамилию для просмотра голосов:");
    let reply = results::user_results(&sessions, &conn, chat_id, "Иван Иванов").unwrap();
    assert_eq!(
        reply.text,
        "Результаты голосования пользователя Иван Иванов:\n\nМатч: A vs B, Голос: Ничья\n"
    );
}

#[test]
fn unregistered_voter_is_recorded_as_unknown() {
    let (_dir, pool) = test_pool();
    let conn = get_connection(&pool).unwrap();

    let match_id = db::insert_match(&conn, "A", "B", "2024-06-14 18:00:00").unwrap();
    let voter = Voter {
        user_id: 77,
        username: None,
    };
    let reply = voting::record_vote(
        &conn,
        &voter,
        &format!("{}_A", match_id),
        at("2024-06-14 15:00:00"),
    )
    .unwrap();
    assert_eq!(reply.text, "Ты выбрал: A");

    let text = results::all_results(&conn).unwrap().text;
    assert_eq!(
        text,
        "Результаты голосования:\n\nМатч: A vs B, Голос: A, Пользователь: Неизвестный пользователь\n"
    );
}

#[test]
fn voting_window_spans_five_days_before_kickoff() {
    let (_dir, pool) = test_pool();
    let conn = get_connection(&pool).unwrap();

    let match_id = db::insert_match(&conn, "A", "B", "2024-06-14 18:00:00").unwrap();
    let data = match_id.to_string();

    // Exactly five days before kickoff: accepted
    let reply = voting::select_match(&conn, 1, &data, at("2024-06-09 18:00:00")).unwrap();
    assert_eq!(reply.text, "Выбери результат матча:");

    // One second before the window opens: rejected
    let reply = voting::select_match(&conn, 2, &data, at("2024-06-09 17:59:59")).unwrap();
    assert_eq!(reply.text, "Голосование для этого матча недоступно.");

    // Exactly at kickoff: rejected
    let reply = voting::select_match(&conn, 3, &data, at("2024-06-14 18:00:00")).unwrap();
    assert_eq!(reply.text, "Голосование для этого матча недоступно.");

    // No vote rows were written by any rejection
    let count: i64 = conn
        .query_row("SELECT COUNT(*) FROM votes", [], |row| row.get(0))
        .unwrap();
    assert_eq!(count, 0);
}

#[test]
fn revote_is_allowed_on_a_later_day() {
    let (_dir, pool) = test_pool();
    let conn = get_connection(&pool).unwrap();

    // Kickoff two days out so both days fall inside the window
    let match_id = db::insert_match(&conn, "A", "B", "2024-06-16 18:00:00").unwrap();
    let voter = Voter {
        user_id: 1,
        username: None,
    };
    let data = format!("{}_B", match_id);

    let reply = voting::record_vote(&conn, &voter, &data, at("2024-06-14 12:00:00")).unwrap();
    assert_eq!(reply.text, "Ты выбрал: B");

    let reply = voting::record_vote(&conn, &voter, &data, at("2024-06-15 12:00:00")).unwrap();
    assert_eq!(reply.text, "Ты выбрал: B");

    let count: i64 = conn
        .query_row("SELECT COUNT(*) FROM votes", [], |row| row.get(0))
        .unwrap();
    assert_eq!(count, 2);
}
