use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use regsynth_core::{DATASET_META_FILE, Table, TabularDataset};
use tracing::info;

use crate::errors::GenerationError;

/// Files written for one dataset.
#[derive(Debug, Clone)]
pub struct DatasetFiles {
    pub dir: PathBuf,
    pub meta_path: PathBuf,
    pub table_paths: Vec<PathBuf>,
    pub bytes_written: u64,
}

/// Write `dataset.json` plus one `<table>.csv` per table into `dir`.
pub fn write_dataset(dir: &Path, dataset: &TabularDataset) -> Result<DatasetFiles, GenerationError> {
    std::fs::create_dir_all(dir)?;

    let meta_path = dir.join(DATASET_META_FILE);
    let meta_bytes = serde_json::to_vec_pretty(&dataset.meta)?;
    std::fs::write(&meta_path, &meta_bytes)?;
    let mut bytes_written = meta_bytes.len() as u64;

    let mut table_paths = Vec::with_capacity(dataset.tables.len());
    for table in dataset.tables.values() {
        let path = dir.join(format!("{}.csv", table.name));
        bytes_written += write_table_csv(&path, table)?;
        table_paths.push(path);
    }

    info!(dir = %dir.display(), tables = table_paths.len(), bytes = bytes_written, "dataset written");

    Ok(DatasetFiles {
        dir: dir.to_path_buf(),
        meta_path,
        table_paths,
        bytes_written,
    })
}

/// Write a table as CSV in its declared column order.
pub fn write_table_csv(path: &Path, table: &Table) -> Result<u64, csv::Error> {
    let writer = BufWriter::new(File::create(path).map_err(csv::Error::from)?);
    let counting = CountingWriter::new(writer);
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(counting);

    writer.write_record(&table.columns)?;

    for row in &table.rows {
        let record: Vec<String> = row.iter().map(|value| value.to_csv()).collect();
        writer.write_record(&record)?;
    }

    writer.flush()?;
    let counting = writer.into_inner().map_err(|err| err.into_error())?;
    Ok(counting.bytes_written())
}

struct CountingWriter<W: Write> {
    inner: W,
    bytes: u64,
}

impl<W: Write> CountingWriter<W> {
    fn new(inner: W) -> Self {
        Self { inner, bytes: 0 }
    }

    fn bytes_written(&self) -> u64 {
        self.bytes
    }
}

impl<W: Write> Write for CountingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let size = self.inner.write(buf)?;
        self.bytes = self.bytes.saturating_add(size as u64);
        Ok(size)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}
