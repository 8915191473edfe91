//! Reading and writing the JSON files passed between the pipeline steps.
//!
//! Files are written next to their destination and renamed into place, so a reader never sees a
//! half written file. Two writers racing on the same destination is still undefined.
use crate::error::{SolarMapError, SolarMapResult};
use log::debug;
use serde::{de::DeserializeOwned, Serialize};
use std::{
    fs::{self, File},
    io::{BufReader, BufWriter, Write},
    path::{Path, PathBuf},
};

/// Serialize `value` as pretty printed JSON and atomically replace the file at `path`.
pub(crate) fn write_json_atomically<T, P>(path: P, value: &T) -> SolarMapResult<()>
where
    T: Serialize,
    P: AsRef<Path>,
{
    let path = path.as_ref();

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let tmp_path = temporary_path_for(path);
    let result = write_json(&tmp_path, value)
        .and_then(|_| fs::rename(&tmp_path, path).map_err(SolarMapError::from));

    if result.is_err() {
        let _ = fs::remove_file(&tmp_path);
    } else {
        debug!("wrote {}", path.display());
    }

    result
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> SolarMapResult<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, value)?;
    writer.write_all(b"\n")?;

    let file = writer.into_inner().map_err(|err| err.into_error())?;
    file.sync_all()?;

    Ok(())
}

fn temporary_path_for(path: &Path) -> PathBuf {
    let mut fname = path
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_default();
    fname.push(format!(".{}.tmp", std::process::id()));

    path.with_file_name(fname)
}

/// Load a JSON file, `what` and `hint` describe the file if it doesn't exist.
pub(crate) fn read_json<T, P>(path: P, what: &'static str, hint: &'static str) -> SolarMapResult<T>
where
    T: DeserializeOwned,
    P: AsRef<Path>,
{
    let path = path.as_ref();

    if !path.is_file() {
        return Err(SolarMapError::MissingInput {
            what,
            path: path.to_path_buf(),
            hint,
        });
    }

    let reader = BufReader::new(File::open(path)?);
    Ok(serde_json::from_reader(reader)?)
}
