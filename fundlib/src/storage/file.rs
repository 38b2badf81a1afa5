//! Файловое хранилище: `<dir>/<key>.json` на каждый ключ.

use crate::{
    error::{LedgerError, Result},
    traits::Store,
};
use serde_json::Value;
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Создаёт каталог, если его нет.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl Store for FileStore {
    fn get(&self, key: &str) -> Result<Option<Value>> {
        let file = match File::open(self.path(key)) {
            Ok(f) => f,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let value = serde_json::from_reader(BufReader::new(file))?;
        Ok(Some(value))
    }

    fn set(&mut self, key: &str, value: &Value) -> Result<()> {
        // пишем во временный файл и переименовываем, чтобы не оставить обрывок
        let path = self.path(key);
        let tmp = path.with_extension("json.tmp");
        write_then_rename(&tmp, &path, value).map_err(|e| {
            let _ = fs::remove_file(&tmp);
            LedgerError::Persistence(format!("{}: {e}", path.display()))
        })
    }
}

fn write_then_rename(tmp: &Path, path: &Path, value: &Value) -> io::Result<()> {
    let mut w = BufWriter::new(File::create(tmp)?);
    serde_json::to_writer_pretty(&mut w, value)?;
    w.flush()?;
    drop(w);
    fs::rename(tmp, path)
}
