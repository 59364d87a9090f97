use super::ApiError;

pub fn validate_username(username: &str) -> Result<&str, ApiError> {
    let len = username.chars().count();
    if !(3..=50).contains(&len) {
        return Err(ApiError::validation(
            "Username must be between 3 and 50 characters",
        ));
    }
    Ok(username)
}

pub fn validate_password(password: &str) -> Result<&str, ApiError> {
    if password.chars().count() < 6 {
        return Err(ApiError::validation(
            "Password must be at least 6 characters",
        ));
    }
    Ok(password)
}

/// Custom invite code strings stay permissive on purpose, only a length cap
/// protects the unique index.
pub fn validate_invite_code(code: &str) -> Result<&str, ApiError> {
    if code.is_empty() {
        return Err(ApiError::validation("Invite code cannot be empty"));
    }
    if code.len() > 64 {
        return Err(ApiError::validation(
            "Invite code must be 64 characters or less",
        ));
    }
    Ok(code)
}

pub fn validate_uses(uses: i32) -> Result<i32, ApiError> {
    if uses < 1 {
        return Err(ApiError::validation("Uses must be at least 1"));
    }
    Ok(uses)
}

pub fn validate_limit(limit: u64) -> Result<u64, ApiError> {
    const MAX_LIMIT: u64 = 1000;
    const MIN_LIMIT: u64 = 1;

    if !(MIN_LIMIT..=MAX_LIMIT).contains(&limit) {
        return Err(ApiError::validation(format!(
            "Invalid limit: {}. Limit must be between {} and {}",
            limit, MIN_LIMIT, MAX_LIMIT
        )));
    }
    Ok(limit)
}
