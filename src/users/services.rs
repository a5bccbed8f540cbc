use lazy_static::lazy_static;
use regex::Regex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{
    dto::{CreateUserRequest, UpdateUserRequest, UpdateMode},
    repo::UserRepo,
    repo_types::{NewUser, User, UserChanges},
};
use crate::{
    auth::password::{hash_password, verify_password},
    config::SuperuserSeed,
    error::{ApiError, ApiResult, FieldErrors},
};

pub const MAX_NAME_LEN: usize = 150;

pub const REQUIRED_MSG: &str = "This field is required.";
pub const BLANK_MSG: &str = "This field may not be blank.";
pub const USERNAME_CHARSET_MSG: &str =
    "Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters.";

fn too_long_msg() -> String {
    format!("Ensure this field has no more than {MAX_NAME_LEN} characters.")
}

pub(crate) fn is_valid_username(username: &str) -> bool {
    lazy_static! {
        static ref USERNAME_RE: Regex = Regex::new(r"^[\w.@+-]+$").unwrap();
    }
    USERNAME_RE.is_match(username)
}

fn push(errors: &mut FieldErrors, field: &str, msg: impl Into<String>) {
    errors.entry(field.to_string()).or_default().push(msg.into());
}

/// Trims and checks a username. Returns it only if it is acceptable.
fn clean_username(raw: &str, errors: &mut FieldErrors) -> Option<String> {
    let v = raw.trim();
    if v.is_empty() {
        push(errors, "username", BLANK_MSG);
        return None;
    }
    let before = errors.get("username").map_or(0, Vec::len);
    if v.chars().count() > MAX_NAME_LEN {
        push(errors, "username", too_long_msg());
    }
    if !is_valid_username(v) {
        push(errors, "username", USERNAME_CHARSET_MSG);
    }
    (errors.get("username").map_or(0, Vec::len) == before).then(|| v.to_string())
}

fn clean_password(raw: &str, errors: &mut FieldErrors) -> Option<String> {
    if raw.trim().is_empty() {
        push(errors, "password", BLANK_MSG);
        return None;
    }
    Some(raw.to_string())
}

fn clean_name(field: &str, raw: &str, errors: &mut FieldErrors) -> Option<String> {
    let v = raw.trim();
    if v.chars().count() > MAX_NAME_LEN {
        push(errors, field, too_long_msg());
        return None;
    }
    Some(v.to_string())
}

fn hash(plain: &str) -> ApiResult<String> {
    Ok(hash_password(plain)?)
}

pub async fn create_user(repo: &dyn UserRepo, req: CreateUserRequest) -> ApiResult<User> {
    let mut errors = FieldErrors::new();

    let username = match req.username.as_deref() {
        Some(v) => clean_username(v, &mut errors),
        None => {
            push(&mut errors, "username", REQUIRED_MSG);
            None
        }
    };
    let password = match req.password.as_deref() {
        Some(v) => clean_password(v, &mut errors),
        None => {
            push(&mut errors, "password", REQUIRED_MSG);
            None
        }
    };
    let first_name = clean_name("first_name", req.first_name.as_deref().unwrap_or(""), &mut errors);
    let last_name = clean_name("last_name", req.last_name.as_deref().unwrap_or(""), &mut errors);

    let (Some(username), Some(password), Some(first_name), Some(last_name), true) =
        (username, password, first_name, last_name, errors.is_empty())
    else {
        warn!(fields = ?errors.keys().collect::<Vec<_>>(), "create user rejected");
        return Err(ApiError::Validation(errors));
    };

    if repo.find_by_username(&username).await?.is_some() {
        warn!(%username, "username already registered");
        return Err(ApiError::DuplicateUser);
    }

    let user = repo
        .insert(NewUser {
            username,
            password_hash: hash(&password)?,
            first_name,
            last_name,
            is_superuser: false,
        })
        .await?;

    info!(user_id = %user.id, username = %user.username, "user created");
    Ok(user)
}

pub async fn get_user(repo: &dyn UserRepo, id: Uuid) -> ApiResult<User> {
    repo.find_by_id(id).await?.ok_or(ApiError::NotFound)
}

/// Applies an update to an account. Callers must have passed the access gate.
pub async fn update_user(
    repo: &dyn UserRepo,
    id: Uuid,
    req: UpdateUserRequest,
    mode: UpdateMode,
) -> ApiResult<User> {
    let mut errors = FieldErrors::new();
    let mut changes = UserChanges::default();

    if mode == UpdateMode::Full {
        for (field, present) in [
            ("username", req.username.is_some()),
            ("first_name", req.first_name.is_some()),
            ("last_name", req.last_name.is_some()),
        ] {
            if !present {
                push(&mut errors, field, REQUIRED_MSG);
            }
        }
    }

    if let Some(v) = req.username.as_deref() {
        changes.username = clean_username(v, &mut errors);
    }
    if let Some(v) = req.first_name.as_deref() {
        changes.first_name = clean_name("first_name", v, &mut errors);
    }
    if let Some(v) = req.last_name.as_deref() {
        changes.last_name = clean_name("last_name", v, &mut errors);
    }
    let password = req
        .password
        .as_deref()
        .and_then(|v| clean_password(v, &mut errors));

    if !errors.is_empty() {
        warn!(user_id = %id, fields = ?errors.keys().collect::<Vec<_>>(), "update user rejected");
        return Err(ApiError::Validation(errors));
    }

    if let Some(p) = password {
        changes.password_hash = Some(hash(&p)?);
    }

    if changes.is_empty() {
        debug!(user_id = %id, "empty update");
        return get_user(repo, id).await;
    }

    let user = repo.update(id, changes).await?.ok_or(ApiError::NotFound)?;
    info!(user_id = %user.id, ?mode, "user updated");
    Ok(user)
}

/// Removes an account for good. Callers must have passed the access gate.
pub async fn delete_user(repo: &dyn UserRepo, id: Uuid) -> ApiResult<()> {
    if !repo.delete(id).await? {
        return Err(ApiError::NotFound);
    }
    info!(user_id = %id, "user deleted");
    Ok(())
}

/// Checks a username/password pair. `None` means the credentials are wrong.
pub async fn authenticate(
    repo: &dyn UserRepo,
    username: &str,
    password: &str,
) -> ApiResult<Option<User>> {
    let Some(user) = repo.find_by_username(username.trim()).await? else {
        warn!(%username, "login unknown username");
        return Ok(None);
    };
    if !verify_password(password, &user.password_hash)? {
        warn!(user_id = %user.id, "login invalid password");
        return Ok(None);
    }
    Ok(Some(user))
}

/// Creates the configured superuser unless the username is already taken.
pub async fn ensure_superuser(repo: &dyn UserRepo, seed: &SuperuserSeed) -> anyhow::Result<()> {
    let mut errors = FieldErrors::new();
    let username = clean_username(&seed.username, &mut errors);
    let password = clean_password(&seed.password, &mut errors);
    let (Some(username), Some(password)) = (username, password) else {
        anyhow::bail!("invalid superuser credentials: {errors:?}");
    };

    if repo.find_by_username(&username).await?.is_some() {
        info!(%username, "superuser already present");
        return Ok(());
    }

    let user = repo
        .insert(NewUser {
            username,
            password_hash: hash_password(&password)?,
            first_name: String::new(),
            last_name: String::new(),
            is_superuser: true,
        })
        .await?;
    info!(user_id = %user.id, username = %user.username, "superuser created");
    Ok(())
}
