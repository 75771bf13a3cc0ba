pub mod csv;
pub mod json;

use std::fmt;
use std::fs::create_dir_all;
use std::path::Path;

#[derive(Debug)]
pub enum IOError {
    CannotWrite(String, String),
    CannotSerialize(String, String),
    CannotRead(String, String),
    CannotDeserialize(String, String),
}

impl fmt::Display for IOError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IOError::CannotWrite(what, why) => write!(f, "Couldn't write to {}: {}", what, why),
            IOError::CannotSerialize(what, why) => {
                write!(f, "Couldn't serialize to {}: {}", what, why)
            }
            IOError::CannotRead(what, why) => write!(f, "Couldn't read from {}: {}", what, why),
            IOError::CannotDeserialize(what, why) => {
                write!(f, "Couldn't deserialize from {}: {}", what, why)
            }
        }
    }
}
impl std::error::Error for IOError {}

fn ensure_parent_folder_exists(file_path: &Path) -> Result<(), IOError> {
    let display: String = file_path.display().to_string();

    let parent = match file_path.parent() {
        None => return Err(IOError::CannotWrite(display, String::from("Not a file."))),
        Some(p) => p,
    };
    create_dir_all(parent).map_err(|why| IOError::CannotWrite(display, why.to_string()))
}
