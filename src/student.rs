use std::fmt;
use std::str::FromStr;

use argon2::{
    Argon2, PasswordVerifier,
    password_hash::{PasswordHash, PasswordHasher, SaltString, rand_core::OsRng},
};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use utoipa::ToSchema;

use crate::error::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Student,
    Teacher,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Teacher => "teacher",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "student" => Ok(Role::Student),
            "teacher" => Ok(Role::Teacher),
            other => Err(Error::UnknownRole(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct StudentInfo {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub role: Role,
}

#[derive(Debug, sqlx::FromRow)]
struct StudentRow {
    id: i64,
    name: String,
    email: String,
    role: String,
}

impl TryFrom<StudentRow> for StudentInfo {
    type Error = Error;

    fn try_from(row: StudentRow) -> Result<Self, Self::Error> {
        Ok(StudentInfo {
            id: row.id,
            name: row.name,
            email: row.email,
            role: row.role.parse()?,
        })
    }
}

pub async fn get_student_list(database: &SqlitePool) -> anyhow::Result<Vec<StudentInfo>> {
    let rows =
        sqlx::query_as::<_, StudentRow>("SELECT id, name, email, role FROM student ORDER BY id")
            .fetch_all(database)
            .await?;
    rows.into_iter()
        .map(|row| Ok(StudentInfo::try_from(row)?))
        .collect()
}

pub async fn get_student_info(database: &SqlitePool, id: i64) -> anyhow::Result<StudentInfo> {
    let row =
        sqlx::query_as::<_, StudentRow>("SELECT id, name, email, role FROM student WHERE id = ?")
            .bind(id)
            .fetch_optional(database)
            .await?
            .ok_or(Error::NotFound("student"))?;
    Ok(row.try_into()?)
}

pub async fn create_student(
    database: &SqlitePool,
    name: String,
    email: String,
    password: String,
    role: Role,
) -> anyhow::Result<i64> {
    let salt = SaltString::generate(&mut OsRng);
    let password_hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("Failed to hash password: {}", e))?
        .to_string();
    let result = sqlx::query("INSERT INTO student (name, email, password, role) VALUES (?, ?, ?, ?)")
        .bind(&name)
        .bind(&email)
        .bind(&password_hash)
        .bind(role.as_str())
        .execute(database)
        .await?;
    Ok(result.last_insert_rowid())
}

#[derive(Debug, sqlx::FromRow)]
struct CredentialRow {
    id: i64,
    name: String,
    email: String,
    role: String,
    password: String,
}

pub async fn login(
    database: &SqlitePool,
    email: String,
    password: String,
) -> anyhow::Result<StudentInfo> {
    let row = sqlx::query_as::<_, CredentialRow>(
        "SELECT id, name, email, role, password FROM student WHERE email = ?",
    )
    .bind(&email)
    .fetch_optional(database)
    .await?
    .ok_or(Error::NotFound("student"))?;
    let parsed_hash = PasswordHash::new(&row.password)
        .map_err(|e| anyhow::anyhow!("Failed to parse password hash: {}", e))?;
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|e| anyhow::anyhow!("Failed to verify password: {}", e))?;
    Ok(StudentInfo {
        id: row.id,
        name: row.name,
        email: row.email,
        role: row.role.parse()?,
    })
}
