#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("quiz attempt already submitted")]
    AlreadySubmitted,
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("unknown content type: {0}")]
    UnknownContentType(String),
    #[error("unknown progress status: {0}")]
    UnknownProgressStatus(String),
    #[error("unknown difficulty: {0}")]
    UnknownDifficulty(String),
    #[error("unknown role: {0}")]
    UnknownRole(String),
}
