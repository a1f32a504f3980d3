//! Command line entry point: `extract_pdf <input.pdf> <output.txt>`.

use std::ffi::OsString;
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use log::debug;

use crate::{extract_text, Error, Result};

pub const USAGE: &str = "Usage: extract_pdf.py <input.pdf> <output.txt>";

/// Run the extractor on the process arguments, program name included.
///
/// Missing arguments print [`USAGE`] and yield a failure code without touching
/// the filesystem. Positional arguments past the second are ignored. Read,
/// parse and write failures are returned as errors; a partially written output
/// file is left in place.
pub fn run<I>(args: I) -> Result<ExitCode>
where
    I: IntoIterator,
    I::Item: Into<OsString>,
{
    let mut args = args.into_iter().skip(1).map(Into::into);
    let (input, output) = match (args.next(), args.next()) {
        (Some(input), Some(output)) => (PathBuf::from(input), PathBuf::from(output)),
        _ => {
            println!("{}", USAGE);
            return Ok(ExitCode::FAILURE);
        }
    };
    debug!("extracting {} into {}", input.display(), output.display());

    let text = extract_text(&input)?;
    fs::write(&output, &text).map_err(|source| Error::Write {
        path: output.clone(),
        source,
    })?;

    println!("Wrote {} chars to {}", text.chars().count(), output.display());
    Ok(ExitCode::SUCCESS)
}
