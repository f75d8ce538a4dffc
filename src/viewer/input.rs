//! User input validation

use url::Url;

use crate::error::InputError;

/// Check a feed address typed by the user
///
/// Surrounding whitespace is ignored. The address must parse as a URL with
/// the `rtsp` scheme and a host. Returns the trimmed address.
pub fn validate_feed_address(input: &str) -> Result<String, InputError> {
    let trimmed = input.trim();
    let invalid = || InputError::InvalidFeedAddress(trimmed.to_owned());

    let url = Url::parse(trimmed).map_err(|_| invalid())?;
    if url.scheme() != "rtsp" || url.host_str().map_or(true, str::is_empty) {
        return Err(invalid());
    }

    Ok(trimmed.to_owned())
}

/// Title given to a newly added feed
pub fn feed_title(existing_streams: usize) -> String {
    format!("Camera {}", existing_streams + 1)
}
