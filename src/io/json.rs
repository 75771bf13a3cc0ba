use std::{
    fs::OpenOptions,
    io::{BufReader, BufWriter},
    path::Path,
};

use serde::{de::DeserializeOwned, Serialize};

use super::{ensure_parent_folder_exists, IOError};

/// Serialize the given object as pretty-printed json to the given file,
/// creating missing parent folders and replacing existing content.
pub fn write_json_to_file<T: Serialize>(file_path: &Path, object: &T) -> Result<(), IOError> {
    ensure_parent_folder_exists(file_path)?;

    let display: String = file_path.display().to_string();

    let file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(file_path)
        .map_err(|why| IOError::CannotWrite(display.clone(), why.to_string()))?;

    serde_json::to_writer_pretty(BufWriter::new(file), object)
        .map_err(|why| IOError::CannotSerialize(display, why.to_string()))
}

/// Deserialize an object from the json content of the given file.
pub fn read_json_from_file<T: DeserializeOwned>(file_path: &Path) -> Result<T, IOError> {
    let display: String = file_path.display().to_string();

    let file = OpenOptions::new()
        .read(true)
        .open(file_path)
        .map_err(|why| IOError::CannotRead(display.clone(), why.to_string()))?;

    serde_json::from_reader(BufReader::new(file))
        .map_err(|why| IOError::CannotDeserialize(display, why.to_string()))
}
