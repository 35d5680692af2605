//! JSON file helpers. Errors name the offending path.

use std::ffi::OsStr;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use serde::de::DeserializeOwned;
use serde::Serialize;

pub fn read_json<D: DeserializeOwned>(path: impl AsRef<Path>) -> Result<D, anyhow::Error> {
    let path = path.as_ref();
    let file = File::open(path).with_context(|| format!("cannot open {}", path.display()))?;
    serde_json::from_reader(BufReader::new(file)).with_context(|| format!("malformed JSON in {}", path.display()))
}

/// Pretty-printed.
pub fn write_json(path: impl AsRef<Path>, value: &impl Serialize) -> Result<(), anyhow::Error> {
    let path = path.as_ref();
    let mut writer = BufWriter::new(File::create(path).with_context(|| format!("cannot create {}", path.display()))?);
    serde_json::to_writer_pretty(&mut writer, value)?;
    writer.flush().with_context(|| format!("cannot write {}", path.display()))
}

pub trait ReadJsonFile: Sized {
    fn read_json_file(path: impl AsRef<Path>) -> Result<Self, anyhow::Error>;
}

impl<D: DeserializeOwned> ReadJsonFile for D {
    fn read_json_file(path: impl AsRef<Path>) -> Result<Self, anyhow::Error> {
        read_json(path)
    }
}

/// Files under `root` (descending into subdirectories) with the given `extension`, in sorted
/// order. A `root` naming a single matching file yields just that file.
pub fn find_files(root: impl AsRef<Path>, extension: &str) -> Result<Vec<PathBuf>, anyhow::Error> {
    let extension = OsStr::new(extension);
    let mut pending = vec![root.as_ref().to_path_buf()];
    let mut matched = vec![];
    while let Some(path) = pending.pop() {
        if path.is_dir() {
            let entries = fs::read_dir(&path).with_context(|| format!("cannot list {}", path.display()))?;
            for entry in entries {
                pending.push(entry?.path());
            }
        } else if !path.exists() {
            bail!("{} does not exist", path.display());
        } else if path.extension() == Some(extension) {
            matched.push(path);
        }
    }
    matched.sort();
    Ok(matched)
}
