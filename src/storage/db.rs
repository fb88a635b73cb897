use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Result;

use crate::core::error::{AppError, AppResult};

/// Структура, представляющая пользователя в базе данных.
#[derive(Debug, Clone)]
pub struct User {
    /// Telegram ID пользователя
    pub user_id: i64,
    /// Имя пользователя (username) в Telegram, если доступно
    pub username: Option<String>,
    /// Имя, введенное при регистрации
    pub first_name: Option<String>,
    /// Фамилия, введенная при регистрации
    pub last_name: Option<String>,
}

/// Структура, представляющая матч турнира.
#[derive(Debug, Clone)]
pub struct Match {
    /// ID матча (назначается при создании)
    pub match_id: i64,
    /// Первая команда
    pub team1: String,
    /// Вторая команда
    pub team2: String,
    /// Дата и время матча в формате "YYYY-MM-DD HH:MM:SS"
    pub match_date: String,
}

/// Строка турнирной таблицы.
#[derive(Debug, Clone)]
pub struct StandingRow {
    pub team: String,
    pub points: i64,
    pub group_name: String,
}

/// Голос вместе с данными матча (для общего отчета).
#[derive(Debug, Clone)]
pub struct VoteWithMatch {
    pub team1: String,
    pub team2: String,
    pub vote: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

/// Голос пользователя вместе с данными матча (для отчета по пользователю).
#[derive(Debug, Clone)]
pub struct UserVote {
    pub team1: String,
    pub team2: String,
    pub vote: String,
}

pub type DbPool = Pool<SqliteConnectionManager>;
pub type DbConnection = PooledConnection<SqliteConnectionManager>;

/// Create a new database connection pool
///
/// Initializes a connection pool with up to 10 connections and runs schema
/// migrations. A schema failure here is fatal for the whole process, so it is
/// propagated instead of being swallowed.
///
/// # Arguments
///
/// * `database_path` - Path to SQLite database file
pub fn create_pool(database_path: &str) -> AppResult<DbPool> {
    let manager = SqliteConnectionManager::file(database_path);
    let pool = Pool::builder()
        .max_size(10) // Maximum 10 connections in the pool
        .build(manager)
        .map_err(AppError::DatabasePool)?;

    let conn = pool.get().map_err(AppError::DatabasePool)?;
    init_schema(&conn)?;

    Ok(pool)
}

/// Get a connection from the pool
///
/// The connection is automatically returned to the pool when dropped.
pub fn get_connection(pool: &DbPool) -> Result<DbConnection, r2d2::Error> {
    pool.get()
}

/// Создает таблицы и индексы, а также добавляет недостающие столбцы
/// при обновлении со старой схемы.
fn init_schema(conn: &rusqlite::Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS users (
            user_id INTEGER PRIMARY KEY,
            username TEXT,
            first_name TEXT,
            last_name TEXT
        )",
        [],
    )?;
    conn.execute(
        "CREATE TABLE IF NOT EXISTS standings (
            team TEXT PRIMARY KEY,
            points INTEGER,
            group_name TEXT
        )",
        [],
    )?;
    conn.execute(
        "CREATE TABLE IF NOT EXISTS matches (
            match_id INTEGER PRIMARY KEY AUTOINCREMENT,
            team1 TEXT,
            team2 TEXT,
            match_date TEXT
        )",
        [],
    )?;
    conn.execute(
        "CREATE TABLE IF NOT EXISTS votes (
            user_id INTEGER,
            match_id INTEGER,
            vote TEXT,
            username TEXT,
            first_name TEXT,
            last_name TEXT,
            vote_date TEXT
        )",
        [],
    )?;

    // Старые базы могли быть созданы без колонок имени/фамилии
    add_missing_column(conn, "users", "first_name", "TEXT")?;
    add_missing_column(conn, "users", "last_name", "TEXT")?;
    add_missing_column(conn, "votes", "first_name", "TEXT")?;
    add_missing_column(conn, "votes", "last_name", "TEXT")?;
    add_missing_column(conn, "votes", "vote_date", "TEXT")?;
    add_missing_column(conn, "standings", "group_name", "TEXT")?;

    // Один голос на (пользователь, матч, день); закрывает гонку между
    // проверкой дубликата и записью при параллельной отправке.
    conn.execute(
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_votes_user_match_day
         ON votes(user_id, match_id, vote_date)",
        [],
    )?;

    Ok(())
}

/// Добавляет столбец в таблицу, если его еще нет.
fn add_missing_column(
    conn: &rusqlite::Connection,
    table: &str,
    column: &str,
    column_type: &str,
) -> Result<()> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", table))?;
    let rows = stmt.query_map([], |row| row.get::<_, String>(1))?;

    let mut columns = Vec::new();
    for row in rows {
        columns.push(row?);
    }

    if !columns.iter().any(|c| c == column) {
        log::info!("Adding missing column: {} to {} table", column, table);
        conn.execute(
            &format!("ALTER TABLE {} ADD COLUMN {} {}", table, column, column_type),
            [],
        )?;
    }
    Ok(())
}

/// Создает или перезаписывает пользователя (имя и фамилия перезаписываются
/// при каждой повторной регистрации, история не хранится).
///
/// # Arguments
///
/// * `conn` - Соединение с базой данных
/// * `user_id` - Telegram ID пользователя
/// * `username` - Имя пользователя (опционально)
/// * `first_name` - Имя
/// * `last_name` - Фамилия
pub fn upsert_user(
    conn: &DbConnection,
    user_id: i64,
    username: Option<&str>,
    first_name: &str,
    last_name: &str,
) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO users (user_id, username, first_name, last_name) VALUES (?1, ?2, ?3, ?4)",
        &[
            &user_id as &dyn rusqlite::ToSql,
            &username as &dyn rusqlite::ToSql,
            &first_name as &dyn rusqlite::ToSql,
            &last_name as &dyn rusqlite::ToSql,
        ],
    )?;
    Ok(())
}

/// Получает пользователя из базы данных по Telegram ID.
///
/// # Returns
///
/// Возвращает `Ok(Some(User))` если пользователь найден, `Ok(None)` если не найден,
/// или ошибку базы данных.
pub fn get_user(conn: &DbConnection, user_id: i64) -> Result<Option<User>> {
    let mut stmt =
        conn.prepare("SELECT user_id, username, first_name, last_name FROM users WHERE user_id = ?")?;
    let mut rows = stmt.query(&[&user_id as &dyn rusqlite::ToSql])?;

    if let Some(row) = rows.next()? {
        Ok(Some(User {
            user_id: row.get(0)?,
            username: row.get(1)?,
            first_name: row.get(2)?,
            last_name: row.get(3)?,
        }))
    } else {
        Ok(None)
    }
}

/// Получает список всех матчей.
pub fn get_all_matches(conn: &DbConnection) -> Result<Vec<Match>> {
    let mut stmt = conn.prepare("SELECT match_id, team1, team2, match_date FROM matches")?;
    let rows = stmt.query_map([], |row| {
        Ok(Match {
            match_id: row.get(0)?,
            team1: row.get(1)?,
            team2: row.get(2)?,
            match_date: row.get(3)?,
        })
    })?;

    let mut matches = Vec::new();
    for row in rows {
        matches.push(row?);
    }
    Ok(matches)
}

/// Получает матч по ID.
pub fn get_match(conn: &DbConnection, match_id: i64) -> Result<Option<Match>> {
    let mut stmt =
        conn.prepare("SELECT match_id, team1, team2, match_date FROM matches WHERE match_id = ?")?;
    let mut rows = stmt.query(&[&match_id as &dyn rusqlite::ToSql])?;

    if let Some(row) = rows.next()? {
        Ok(Some(Match {
            match_id: row.get(0)?,
            team1: row.get(1)?,
            team2: row.get(2)?,
            match_date: row.get(3)?,
        }))
    } else {
        Ok(None)
    }
}

/// Проверяет, голосовал ли пользователь за этот матч в указанный день.
///
/// # Arguments
///
/// * `vote_date` - Календарный день в формате "YYYY-MM-DD"
pub fn has_voted_on(
    conn: &DbConnection,
    user_id: i64,
    match_id: i64,
    vote_date: &str,
) -> Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM votes WHERE user_id = ?1 AND match_id = ?2 AND vote_date = ?3",
        &[
            &user_id as &dyn rusqlite::ToSql,
            &match_id as &dyn rusqlite::ToSql,
            &vote_date as &dyn rusqlite::ToSql,
        ],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

/// Записывает голос. Данные пользователя денормализуются в строку голоса
/// на момент голосования.
///
/// # Returns
///
/// Возвращает `Ok(true)` если голос записан, `Ok(false)` если уникальный
/// индекс отклонил повторный голос за тот же день (гонка при параллельной
/// отправке), или ошибку базы данных.
#[allow(clippy::too_many_arguments)]
pub fn insert_vote(
    conn: &DbConnection,
    user_id: i64,
    match_id: i64,
    vote: &str,
    username: Option<&str>,
    first_name: &str,
    last_name: &str,
    vote_date: &str,
) -> Result<bool> {
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO votes (user_id, username, first_name, last_name, match_id, vote, vote_date)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        &[
            &user_id as &dyn rusqlite::ToSql,
            &username as &dyn rusqlite::ToSql,
            &first_name as &dyn rusqlite::ToSql,
            &last_name as &dyn rusqlite::ToSql,
            &match_id as &dyn rusqlite::ToSql,
            &vote as &dyn rusqlite::ToSql,
            &vote_date as &dyn rusqlite::ToSql,
        ],
    )?;
    Ok(inserted > 0)
}

/// Получает турнирную таблицу, отсортированную по группе и очкам.
pub fn get_standings(conn: &DbConnection) -> Result<Vec<StandingRow>> {
    let mut stmt = conn
        .prepare("SELECT team, points, group_name FROM standings ORDER BY group_name, points DESC")?;
    let rows = stmt.query_map([], |row| {
        Ok(StandingRow {
            team: row.get(0)?,
            points: row.get(1)?,
            group_name: row.get(2)?,
        })
    })?;

    let mut standings = Vec::new();
    for row in rows {
        standings.push(row?);
    }
    Ok(standings)
}

/// Получает список команд (team — первичный ключ таблицы standings).
pub fn get_teams(conn: &DbConnection) -> Result<Vec<String>> {
    let mut stmt = conn.prepare("SELECT team FROM standings")?;
    let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;

    let mut teams = Vec::new();
    for row in rows {
        teams.push(row?);
    }
    Ok(teams)
}

/// Получает все голоса вместе с данными матчей (общий отчет).
pub fn get_votes_with_matches(conn: &DbConnection) -> Result<Vec<VoteWithMatch>> {
    let mut stmt = conn.prepare(
        "SELECT m.team1, m.team2, v.vote, v.first_name, v.last_name
         FROM votes v
         JOIN matches m ON v.match_id = m.match_id",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok(VoteWithMatch {
            team1: row.get(0)?,
            team2: row.get(1)?,
            vote: row.get(2)?,
            first_name: row.get(3)?,
            last_name: row.get(4)?,
        })
    })?;

    let mut votes = Vec::new();
    for row in rows {
        votes.push(row?);
    }
    Ok(votes)
}

/// Получает голоса пользователя по точному совпадению имени и фамилии.
///
/// Совпадение по паре (имя, фамилия) неоднозначно для тезок — это
/// документированное ограничение, записи всех совпавших пользователей
/// попадают в один список.
pub fn get_user_votes(conn: &DbConnection, first_name: &str, last_name: &str) -> Result<Vec<UserVote>> {
    let mut stmt = conn.prepare(
        "SELECT m.team1, m.team2, v.vote
         FROM votes v
         JOIN matches m ON v.match_id = m.match_id
         JOIN users u ON v.user_id = u.user_id
         WHERE u.first_name = ?1 AND u.last_name = ?2",
    )?;
    let rows = stmt.query_map(
        &[
            &first_name as &dyn rusqlite::ToSql,
            &last_name as &dyn rusqlite::ToSql,
        ],
        |row| {
            Ok(UserVote {
                team1: row.get(0)?,
                team2: row.get(1)?,
                vote: row.get(2)?,
            })
        },
    )?;

    let mut votes = Vec::new();
    for row in rows {
        votes.push(row?);
    }
    Ok(votes)
}

/// Добавляет матч (используется загрузчиком данных и тестами;
/// бот сам матчи не создает).
pub fn insert_match(conn: &DbConnection, team1: &str, team2: &str, match_date: &str) -> Result<i64> {
    conn.execute(
        "INSERT INTO matches (team1, team2, match_date) VALUES (?1, ?2, ?3)",
        &[
            &team1 as &dyn rusqlite::ToSql,
            &team2 as &dyn rusqlite::ToSql,
            &match_date as &dyn rusqlite::ToSql,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Добавляет или обновляет строку турнирной таблицы (загрузчик данных и тесты).
pub fn upsert_standing(conn: &DbConnection, team: &str, points: i64, group_name: &str) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO standings (team, points, group_name) VALUES (?1, ?2, ?3)",
        &[
            &team as &dyn rusqlite::ToSql,
            &points as &dyn rusqlite::ToSql,
            &group_name as &dyn rusqlite::ToSql,
        ],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use tempfile::NamedTempFile;

    fn test_pool() -> (NamedTempFile, DbPool) {
        let file = NamedTempFile::new().unwrap();
        let pool = create_pool(file.path().to_str().unwrap()).unwrap();
        (file, pool)
    }

    #[test]
    fn schema_is_idempotent() {
        let file = NamedTempFile::new().unwrap();
        let path = file.path().to_str().unwrap();
        let _ = create_pool(path).unwrap();
        // Second pool over the same file re-runs migration without errors
        let pool = create_pool(path).unwrap();
        let conn = get_connection(&pool).unwrap();
        assert!(get_all_matches(&conn).unwrap().is_empty());
    }

    #[test]
    fn upsert_user_overwrites_without_duplicating() {
        let (_file, pool) = test_pool();
        let conn = get_connection(&pool).unwrap();

        upsert_user(&conn, 42, Some("ivan"), "Иван", "Иванов").unwrap();
        upsert_user(&conn, 42, Some("ivan"), "Пётр", "Петров").unwrap();

        let user = get_user(&conn, 42).unwrap().unwrap();
        assert_eq!(user.first_name.as_deref(), Some("Пётр"));
        assert_eq!(user.last_name.as_deref(), Some("Петров"));

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn insert_vote_rejects_same_day_duplicate() {
        let (_file, pool) = test_pool();
        let conn = get_connection(&pool).unwrap();

        let match_id = insert_match(&conn, "A", "B", "2024-06-14 18:00:00").unwrap();

        assert!(insert_vote(&conn, 1, match_id, "A", None, "Иван", "Иванов", "2024-06-14").unwrap());
        // Unique index swallows the duplicate instead of erroring
        assert!(!insert_vote(&conn, 1, match_id, "B", None, "Иван", "Иванов", "2024-06-14").unwrap());
        // A later day is a fresh vote
        assert!(insert_vote(&conn, 1, match_id, "B", None, "Иван", "Иванов", "2024-06-15").unwrap());

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM votes", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 2);
    }

    #[test]
    fn standings_ordered_by_group_then_points() {
        let (_file, pool) = test_pool();
        let conn = get_connection(&pool).unwrap();

        upsert_standing(&conn, "Италия", 4, "B").unwrap();
        upsert_standing(&conn, "Испания", 6, "B").unwrap();
        upsert_standing(&conn, "Германия", 7, "A").unwrap();

        let rows = get_standings(&conn).unwrap();
        let order: Vec<(&str, i64)> = rows.iter().map(|r| (r.team.as_str(), r.points)).collect();
        assert_eq!(
            order,
            vec![("Германия", 7), ("Испания", 6), ("Италия", 4)]
        );
    }

    #[test]
    fn user_votes_filtered_by_exact_name() {
        let (_file, pool) = test_pool();
        let conn = get_connection(&pool).unwrap();

        upsert_user(&conn, 1, None, "Иван", "Иванов").unwrap();
        upsert_user(&conn, 2, None, "Пётр", "Петров").unwrap();
        let m = insert_match(&conn, "A", "B", "2024-06-14 18:00:00").unwrap();
        insert_vote(&conn, 1, m, "A", None, "Иван", "Иванов", "2024-06-14").unwrap();
        insert_vote(&conn, 2, m, "draw", None, "Пётр", "Петров", "2024-06-14").unwrap();

        let votes = get_user_votes(&conn, "Иван", "Иванов").unwrap();
        assert_eq!(votes.len(), 1);
        assert_eq!(votes[0].vote, "A");

        assert!(get_user_votes(&conn, "Иван", "Петров").unwrap().is_empty());
    }
}
