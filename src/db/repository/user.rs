use std::str::FromStr;

use rusqlite::{params, Connection, OptionalExtension};

use crate::db::DatabaseError;
use crate::models::enums::Role;
use crate::models::*;

pub fn insert_user(
    conn: &Connection,
    username: &str,
    full_name: &str,
    role: Role,
) -> Result<i64, DatabaseError> {
    conn.execute(
        "INSERT INTO users (username, full_name, role, is_active) VALUES (?1, ?2, ?3, 1)",
        params![username, full_name, role.as_str()],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn set_user_active(conn: &Connection, id: i64, active: bool) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "UPDATE users SET is_active = ?2 WHERE id = ?1",
        params![id, active as i32],
    )?;
    if changed == 0 {
        return Err(DatabaseError::not_found("User", id));
    }
    Ok(())
}

type UserRow = (i64, String, String, String, i32);

fn user_from_row(row: UserRow) -> Result<User, DatabaseError> {
    let (id, username, full_name, role, is_active) = row;
    Ok(User {
        id,
        username,
        full_name,
        role: Role::from_str(&role)?,
        is_active: is_active != 0,
    })
}

pub fn get_user(conn: &Connection, id: i64) -> Result<Option<User>, DatabaseError> {
    let row: Option<UserRow> = conn
        .query_row(
            "SELECT id, username, full_name, role, is_active FROM users WHERE id = ?1",
            params![id],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?)),
        )
        .optional()?;
    row.map(user_from_row).transpose()
}

pub fn find_user_by_username(
    conn: &Connection,
    username: &str,
) -> Result<Option<User>, DatabaseError> {
    let row: Option<UserRow> = conn
        .query_row(
            "SELECT id, username, full_name, role, is_active FROM users WHERE username = ?1",
            params![username],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?)),
        )
        .optional()?;
    row.map(user_from_row).transpose()
}

/// Active users holding the given role, ordered by name.
pub fn list_users_by_role(conn: &Connection, role: Role) -> Result<Vec<User>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, username, full_name, role, is_active FROM users
         WHERE role = ?1 AND is_active = 1 ORDER BY full_name ASC, id ASC",
    )?;
    let rows = stmt
        .query_map(params![role.as_str()], |row| {
            Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
        })?
        .collect::<Result<Vec<UserRow>, _>>()?;
    rows.into_iter().map(user_from_row).collect()
}
