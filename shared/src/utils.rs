use std::error::Error;
use std::path::PathBuf;

pub type BoxError = Box<dyn Error + Send + Sync>;

pub type BoxResult<T> = Result<T, BoxError>;

pub fn expand_home(path: &str) -> PathBuf {
    if path == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    } else if let Some(rest) = path.strip_prefix("~/").or_else(|| path.strip_prefix("~\\")) {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}
