use std::path::PathBuf;

/// Loads the nearest `.env` file, if there is one, into the process
/// environment and returns its path.
///
/// Runs before logging is set up, so a malformed file is reported on stderr.
pub fn load_dotenv() -> Option<PathBuf> {
    match dotenvy::dotenv() {
        Ok(path) => Some(path),
        Err(e) if e.not_found() => None,
        Err(e) => {
            eprintln!("ignoring malformed `.env` file: {e}");
            None
        }
    }
}
