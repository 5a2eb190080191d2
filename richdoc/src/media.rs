//! Validation of author-supplied link, image and video addresses.

use url::Url;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UrlError {
    #[error("`{0}` is not a valid http(s) URL")]
    Invalid(String),
    #[error("`{0}` is not a YouTube video URL")]
    NotAVideo(String),
}

const YOUTUBE_HOSTS: &[&str] = &[
    "youtube.com",
    "www.youtube.com",
    "m.youtube.com",
    "music.youtube.com",
    "youtu.be",
    "www.youtu.be",
    "youtube-nocookie.com",
    "www.youtube-nocookie.com",
];

/// Parse an absolute `http`/`https` URL.
pub fn parse_web_url(input: &str) -> Result<Url, UrlError> {
    let url = Url::parse(input.trim()).map_err(|_| UrlError::Invalid(input.to_string()))?;
    match url.scheme() {
        "http" | "https" if url.host_str().is_some() => Ok(url),
        _ => Err(UrlError::Invalid(input.to_string())),
    }
}

/// Link targets may also be `mailto:` addresses.
pub fn parse_link_url(input: &str) -> Result<Url, UrlError> {
    match Url::parse(input.trim()) {
        Ok(url) if url.scheme() == "mailto" && !url.path().is_empty() => Ok(url),
        _ => parse_web_url(input),
    }
}

/// Validate a YouTube watch, short or embed URL and return its video id.
pub fn youtube_video_id(input: &str) -> Result<String, UrlError> {
    let url = parse_web_url(input)?;
    let not_video = || UrlError::NotAVideo(input.to_string());

    let host = url.host_str().ok_or_else(not_video)?.to_ascii_lowercase();
    if !YOUTUBE_HOSTS.contains(&host.as_str()) {
        return Err(not_video());
    }

    let segments: Vec<&str> = url
        .path_segments()
        .map(|s| s.filter(|seg| !seg.is_empty()).collect())
        .unwrap_or_default();

    let id = if host.ends_with("youtu.be") {
        segments.first().map(|s| s.to_string())
    } else {
        match segments.as_slice() {
            ["watch"] => url
                .query_pairs()
                .find(|(k, _)| k == "v")
                .map(|(_, v)| v.into_owned()),
            ["embed" | "shorts" | "live" | "v", id, ..] => Some(id.to_string()),
            _ => None,
        }
    };

    match id {
        Some(id) if is_video_id(&id) => Ok(id),
        _ => Err(not_video()),
    }
}

/// The player URL for an embed, keeping a start offset given as `t` or `start`.
pub fn youtube_embed_url(input: &str) -> Option<String> {
    let id = youtube_video_id(input).ok()?;
    let start = Url::parse(input.trim()).ok().and_then(|url| {
        url.query_pairs()
            .find(|(k, _)| k == "t" || k == "start")
            .and_then(|(_, v)| v.trim_end_matches('s').parse::<u32>().ok())
    });
    Some(match start {
        Some(secs) => format!("https://www.youtube.com/embed/{}?start={}", id, secs),
        None => format!("https://www.youtube.com/embed/{}", id),
    })
}

fn is_video_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= 64
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// A CSS color safe to place in a style attribute: `#rgb`, `#rrggbb`,
/// `#rrggbbaa` or a bare color keyword.
pub fn is_safe_color(color: &str) -> bool {
    if let Some(hex) = color.strip_prefix('#') {
        matches!(hex.len(), 3 | 4 | 6 | 8) && hex.chars().all(|c| c.is_ascii_hexdigit())
    } else {
        !color.is_empty() && color.len() <= 32 && color.chars().all(|c| c.is_ascii_alphabetic())
    }
}
