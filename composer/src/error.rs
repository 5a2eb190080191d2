use richdoc::media::UrlError;

/// Why an editing command was rejected. A rejected command never touches
/// the document.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EditError {
    #[error("`{0}` is not a valid URL")]
    InvalidUrl(String),

    #[error("`{0}` is not a YouTube video URL")]
    NotAVideoUrl(String),

    #[error("{what} cannot be placed inside a code block")]
    NotInCodeBlock { what: &'static str },

    #[error("no text block at path {0:?}")]
    InvalidPosition(Vec<usize>),

    #[error("unknown key `{0}`")]
    UnknownKey(String),
}

impl From<UrlError> for EditError {
    fn from(err: UrlError) -> Self {
        match err {
            UrlError::Invalid(url) => EditError::InvalidUrl(url),
            UrlError::NotAVideo(url) => EditError::NotAVideoUrl(url),
        }
    }
}
