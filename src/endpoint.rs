//! Request URLs built from a configured API base and raw path segments

use reqwest::Url;

use crate::error::SyncError;

/// Parse a configured API base. It must be able to carry path segments.
pub fn parse_base(api_base: &str) -> Result<Url, SyncError> {
    let url = Url::parse(api_base)
        .map_err(|e| SyncError::ConfigError(format!("Invalid API base '{}': {}", api_base, e)))?;
    if url.cannot_be_a_base() {
        return Err(SyncError::ConfigError(format!(
            "API base '{}' cannot carry a path",
            api_base
        )));
    }
    Ok(url)
}

/// Append `segments` to `base`, percent-encoding each one so reserved
/// characters never leak into the query or fragment.
pub fn join_segments<'a>(base: &Url, segments: impl IntoIterator<Item = &'a str>) -> Url {
    let mut url = base.clone();
    // Only fails for cannot-be-a-base URLs, which parse_base rejects
    if let Ok(mut path) = url.path_segments_mut() {
        path.pop_if_empty().extend(segments);
    }
    url
}
