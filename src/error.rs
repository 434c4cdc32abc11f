use thiserror::Error;

/// Errors surfaced by the stores and the chapter reader.
///
/// Pagination and the typing engine are total over string input and never
/// produce one of these.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid setting `{name}`: must be greater than zero")]
    InvalidSetting { name: &'static str },

    #[error("chapter has no typeable content")]
    EmptyChapter,

    #[error("page {0} does not exist")]
    PageOutOfRange(usize),

    #[error("chunk {chunk_id} is not on page {page_number}")]
    ChunkNotOnPage { page_number: usize, chunk_id: u32 },

    #[error("progress store error: {0}")]
    Store(#[from] rusqlite::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
