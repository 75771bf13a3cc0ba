use std::{fs::OpenOptions, io::ErrorKind, path::Path};

use serde::Serialize;

use super::{ensure_parent_folder_exists, IOError};

/// Append a record to a csv file.
///
/// A fresh file gets a header row derived from the record's fields; when
/// appending to an existing file the header is assumed to be present
/// already and is skipped.
pub fn append_to_file<T: Serialize>(file_path: impl AsRef<Path>, record: &T) -> Result<(), IOError> {
    let file_path = file_path.as_ref();
    ensure_parent_folder_exists(file_path)?;

    let display: String = file_path.display().to_string();

    let mut writer = match OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(file_path)
    {
        Ok(file) => csv::WriterBuilder::new().has_headers(true).from_writer(file),
        Err(why) if why.kind() == ErrorKind::AlreadyExists => {
            let file = OpenOptions::new()
                .append(true)
                .open(file_path)
                .map_err(|why| IOError::CannotWrite(display.clone(), why.to_string()))?;
            csv::WriterBuilder::new().has_headers(false).from_writer(file)
        }
        Err(why) => return Err(IOError::CannotWrite(display, why.to_string())),
    };

    writer
        .serialize(record)
        .map_err(|why| IOError::CannotSerialize(display.clone(), why.to_string()))?;
    writer
        .flush()
        .map_err(|why| IOError::CannotWrite(display, why.to_string()))
}
