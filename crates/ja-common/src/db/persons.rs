use once_cell::sync::Lazy;
use tokio_postgres::Row;
use tokio_postgres::types::ToSql;
use tracing::{debug, info, instrument};

use crate::api::person::{NewPerson, PersonDto, PersonUpdate, Role};
use crate::db::util::TimedClientExt;
use crate::db::{PgPool, db_error};
use crate::password::{PasswordHashError, hash_password, verify_password};
use crate::validation::{is_alphanumeric, is_email};

db_error!(PersonStorageError {
    #[error("invalid input: {0}")]
    Validation(String),
    #[error("{0}")]
    Hashing(#[from] PasswordHashError),
});

const PERSON_COLUMNS: &str = "person_id, name, surname, pnr, email, username, role_id";

/// Verified when the username is unknown so both login failure paths cost
/// one Argon2 evaluation.
static DUMMY_HASH: Lazy<Option<String>> =
    Lazy::new(|| hash_password("no-such-user-placeholder").ok());

fn row_to_person(row: &Row) -> Result<PersonDto, PersonStorageError> {
    let role_id: i32 = row.try_get("role_id")?;
    let role = Role::from_id(role_id).ok_or_else(|| {
        PersonStorageError::integrity(format!("person has unknown role_id {role_id}"))
    })?;

    Ok(PersonDto {
        person_id: row.try_get("person_id")?,
        name: row.try_get("name")?,
        surname: row.try_get("surname")?,
        pnr: row.try_get("pnr")?,
        email: row.try_get("email")?,
        username: row.try_get("username")?,
        role,
    })
}

fn require_email(email: &str) -> Result<(), PersonStorageError> {
    if is_email(email) {
        Ok(())
    } else {
        Err(PersonStorageError::Validation(format!(
            "malformed email address: {email}"
        )))
    }
}

fn require_username(username: &str) -> Result<(), PersonStorageError> {
    if is_alphanumeric(username) {
        Ok(())
    } else {
        Err(PersonStorageError::Validation(
            "username must be alphanumeric".into(),
        ))
    }
}

fn require_profile_fields(
    name: &str,
    surname: &str,
    email: &str,
    username: &str,
) -> Result<(), PersonStorageError> {
    if name.trim().is_empty() || surname.trim().is_empty() {
        return Err(PersonStorageError::Validation(
            "name and surname are required".into(),
        ));
    }
    require_email(email)?;
    require_username(username)
}

async fn find_by(
    pool: &PgPool,
    column: &'static str,
    value: &(dyn ToSql + Sync),
) -> Result<Option<PersonDto>, PersonStorageError> {
    let client = pool.get().await?;
    let query = format!("SELECT {PERSON_COLUMNS} FROM recruit.person WHERE {column} = $1");

    let row = client
        .timed_query_opt(query.as_str(), &[value], "find_person")
        .await?;
    row.map(|r| row_to_person(&r)).transpose()
}

#[instrument(skip(pool))]
pub async fn find_person_by_id(
    pool: &PgPool,
    person_id: i32,
) -> Result<Option<PersonDto>, PersonStorageError> {
    find_by(pool, "person_id", &person_id)
        .await
        .map_err(|err| err.during("find_person_by_id"))
}

#[instrument(skip(pool))]
pub async fn find_person_by_email(
    pool: &PgPool,
    email: &str,
) -> Result<Option<PersonDto>, PersonStorageError> {
    require_email(email)?;
    find_by(pool, "email", &email)
        .await
        .map_err(|err| err.during("find_person_by_email"))
}

#[instrument(skip(pool))]
pub async fn find_person_by_username(
    pool: &PgPool,
    username: &str,
) -> Result<Option<PersonDto>, PersonStorageError> {
    require_username(username)?;
    find_by(pool, "username", &username)
        .await
        .map_err(|err| err.during("find_person_by_username"))
}

/// Registers a new applicant. A role supplied by the caller is ignored.
#[instrument(skip(pool, person), fields(username = %person.username))]
pub async fn create_person(
    pool: &PgPool,
    person: &NewPerson,
) -> Result<PersonDto, PersonStorageError> {
    require_profile_fields(
        &person.name,
        &person.surname,
        &person.email,
        &person.username,
    )?;
    if person.password.is_empty() {
        return Err(PersonStorageError::Validation(
            "password must not be empty".into(),
        ));
    }
    if person.role.is_some_and(|role| role != Role::Applicant) {
        debug!("ignoring caller-supplied role on registration");
    }

    let password_hash = hash_password(&person.password)?;
    let created = insert_person(pool, person, &password_hash)
        .await
        .map_err(|err| err.during("create_person"))?;

    info!(person_id = created.person_id, "person registered");
    Ok(created)
}

async fn insert_person(
    pool: &PgPool,
    person: &NewPerson,
    password_hash: &str,
) -> Result<PersonDto, PersonStorageError> {
    let client = pool.get().await?;
    let stmt = client
        .prepare_cached(
            "INSERT INTO recruit.person (name, surname, pnr, email, password, role_id, username)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             RETURNING person_id, name, surname, pnr, email, username, role_id",
        )
        .await?;

    let row = client
        .timed_query_one(
            &stmt,
            &[
                &person.name,
                &person.surname,
                &person.pnr,
                &person.email,
                &password_hash,
                &Role::Applicant.id(),
                &person.username,
            ],
            "insert_person",
        )
        .await?;

    row_to_person(&row)
}

async fn update_person_row(
    pool: &PgPool,
    person_id: i32,
    update: &PersonUpdate,
) -> Result<Option<PersonDto>, PersonStorageError> {
    let client = pool.get().await?;
    let row = client
        .timed_query_opt(
            "UPDATE recruit.person
             SET name = $1, surname = $2, pnr = $3, email = $4, username = $5
             WHERE person_id = $6
             RETURNING person_id, name, surname, pnr, email, username, role_id",
            &[
                &update.name,
                &update.surname,
                &update.pnr,
                &update.email,
                &update.username,
                &person_id,
            ],
            "update_person",
        )
        .await?;

    row.map(|r| row_to_person(&r)).transpose()
}

async fn store_password_hash(
    pool: &PgPool,
    email: &str,
    password_hash: &str,
) -> Result<u64, PersonStorageError> {
    let client = pool.get().await?;
    let rows = client
        .timed_execute(
            "UPDATE recruit.person SET password = $1 WHERE email = $2",
            &[&password_hash, &email],
            "set_password_by_email",
        )
        .await?;

    Ok(rows)
}

async fn fetch_login_row(pool: &PgPool, username: &str) -> Result<Option<Row>, PersonStorageError> {
    let client = pool.get().await?;
    let query = format!("SELECT {PERSON_COLUMNS}, password FROM recruit.person WHERE username = $1");
    let row = client
        .timed_query_opt(query.as_str(), &[&username], "login")
        .await?;

    Ok(row)
}

/// Overwrites the mutable profile fields. `None` when no such person exists.
#[instrument(skip(pool, update))]
pub async fn update_person(
    pool: &PgPool,
    person_id: i32,
    update: &PersonUpdate,
) -> Result<Option<PersonDto>, PersonStorageError> {
    require_profile_fields(
        &update.name,
        &update.surname,
        &update.email,
        &update.username,
    )?;

    let updated = update_person_row(pool, person_id, update)
        .await
        .map_err(|err| err.during("update_person"))?;

    if updated.is_some() {
        info!(person_id, "person profile updated");
    }
    Ok(updated)
}

/// Stores a fresh hash for the person with this email. Returns whether a row
/// was changed.
#[instrument(skip(pool, password))]
pub async fn set_password_by_email(
    pool: &PgPool,
    email: &str,
    password: &str,
) -> Result<bool, PersonStorageError> {
    require_email(email)?;
    if password.is_empty() {
        return Err(PersonStorageError::Validation(
            "password must not be empty".into(),
        ));
    }

    let password_hash = hash_password(password)?;
    let rows = store_password_hash(pool, email, &password_hash)
        .await
        .map_err(|err| err.during("set_password_by_email"))?;

    if rows == 1 {
        info!("password updated");
    }
    Ok(rows == 1)
}

/// Checks a username/password pair. Unknown users, wrong passwords and
/// persons without a stored password all yield `None`.
#[instrument(skip(pool, password))]
pub async fn login(
    pool: &PgPool,
    username: &str,
    password: &str,
) -> Result<Option<PersonDto>, PersonStorageError> {
    require_username(username)?;

    let row = fetch_login_row(pool, username)
        .await
        .map_err(|err| err.during("login"))?;

    let Some(row) = row else {
        if let Some(dummy) = DUMMY_HASH.as_deref() {
            let _ = verify_password(password, dummy);
        }
        debug!("login rejected: unknown username");
        return Ok(None);
    };

    let stored: Option<String> = row
        .try_get("password")
        .map_err(|err| PersonStorageError::from(err).during("login"))?;
    let verified = stored
        .as_deref()
        .is_some_and(|hash| verify_password(password, hash));

    if !verified {
        debug!("login rejected: credential mismatch");
        return Ok(None);
    }

    row_to_person(&row)
        .map(Some)
        .map_err(|err| err.during("login"))
}
