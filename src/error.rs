use std::io;
use std::path::PathBuf;

use pdf::error::PdfError;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Raised by the PDF parser: malformed document, broken xref, bad stream.
    #[error("failed to parse PDF: {0}")]
    Pdf(#[from] PdfError),

    #[error("failed to read {}: {source}", path.display())]
    Read { path: PathBuf, source: io::Error },

    #[error("failed to write {}: {source}", path.display())]
    Write { path: PathBuf, source: io::Error },
}
