//! Utility functions

use std::time::Duration;

use uuid::Uuid;

use crate::{
    Error, Result, DEAD_LETTER_SUFFIX, MAX_CONTAINER_NAME_LENGTH, MAX_PATH_LENGTH,
    MAX_QUEUE_NAME_LENGTH, MIN_CONTAINER_NAME_LENGTH, TRIGGER_QUEUE_PREFIX,
};

/// Generate a unique message ID
pub fn generate_message_id() -> String {
    Uuid::new_v4().to_string()
}

/// Validate a container name: 3-63 chars of lowercase letters, digits and
/// single hyphens, starting and ending with a letter or digit
pub fn validate_container_name(name: &str) -> Result<()> {
    if name.len() < MIN_CONTAINER_NAME_LENGTH || name.len() > MAX_CONTAINER_NAME_LENGTH {
        return Err(Error::InvalidContainerName(format!(
            "'{}' must be between {} and {} characters",
            name, MIN_CONTAINER_NAME_LENGTH, MAX_CONTAINER_NAME_LENGTH
        )));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    {
        return Err(Error::InvalidContainerName(format!(
            "'{}' may only contain lowercase letters, digits and hyphens",
            name
        )));
    }
    if name.starts_with('-') || name.ends_with('-') || name.contains("--") {
        return Err(Error::InvalidContainerName(format!(
            "'{}' must start and end with a letter or digit and not contain '--'",
            name
        )));
    }
    Ok(())
}

/// Validate an object path
pub fn validate_object_path(path: &str) -> Result<()> {
    if path.is_empty() || path.len() > MAX_PATH_LENGTH {
        return Err(Error::InvalidPath(format!(
            "path length must be between 1 and {}",
            MAX_PATH_LENGTH
        )));
    }
    if path.starts_with('/') || path.split('/').any(|s| s == ".." || s == ".") {
        return Err(Error::InvalidPath(path.to_string()));
    }
    Ok(())
}

/// Queue names follow container naming rules
pub fn validate_queue_name(name: &str) -> Result<()> {
    if name.len() > MAX_QUEUE_NAME_LENGTH {
        return Err(Error::InvalidQueueName(name.to_string()));
    }
    validate_container_name(name).map_err(|_| Error::InvalidQueueName(name.to_string()))
}

/// Lowercase a host id and replace anything outside `[a-z0-9-]`
pub fn sanitize_host_id(raw: &str) -> String {
    let mut id: String = raw
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect();
    while id.contains("--") {
        id = id.replace("--", "-");
    }
    let id = id.trim_matches('-');
    let max = MAX_QUEUE_NAME_LENGTH - TRIGGER_QUEUE_PREFIX.len();
    let id = if id.len() > max { &id[..max] } else { id };
    id.trim_end_matches('-').to_string()
}

/// Name of the per-host queue carrying blob trigger messages
pub fn host_trigger_queue_name(host_id: &str) -> String {
    format!("{}{}", TRIGGER_QUEUE_PREFIX, host_id)
}

/// Name of the dead-letter queue paired with a queue
pub fn dead_letter_queue_name(queue_name: &str) -> String {
    format!("{}{}", queue_name, DEAD_LETTER_SUFFIX)
}

/// Opaque receipt key for one function watching one object
///
/// Every segment but the trailing path is escaped, so distinct tuples never
/// share a key.
pub fn receipt_key(host_id: &str, function_id: &str, container: &str, path: &str) -> String {
    format!(
        "{}/{}/{}/{}",
        escape_key_segment(host_id),
        escape_key_segment(function_id),
        escape_key_segment(container),
        path
    )
}

fn escape_key_segment(segment: &str) -> String {
    segment.replace('%', "%25").replace('/', "%2F")
}

/// `base * 2^(attempt-1)`, capped at `max`; attempt 0 yields zero
pub fn exponential_backoff(base: Duration, max: Duration, attempt: u32) -> Duration {
    if attempt == 0 {
        return Duration::ZERO;
    }
    let factor = 1u32.checked_shl(attempt - 1).unwrap_or(u32::MAX);
    base.checked_mul(factor).unwrap_or(max).min(max)
}
