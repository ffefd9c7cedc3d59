// Reader and writer that pick bsig or CSV by file extension

use crate::core::delimited::{CsvOptions, CsvReader, CsvWriter};
use crate::core::error::{BsigError, Result};
use crate::core::format::SignalArray;
use crate::core::reader::{BsigReader, ReaderOptions};
use crate::core::writer::{BsigWriter, WriterConfig};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Bsig,
    Csv,
}

impl FileKind {
    /// `.bsig`, `.bin` and `.tstp` are bsig, `.csv` is CSV; case is ignored.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "bsig" | "bin" | "tstp" => Some(FileKind::Bsig),
            "csv" => Some(FileKind::Csv),
            _ => None,
        }
    }
}

pub enum SignalReader {
    Bsig(BsigReader<BufReader<File>>),
    Csv(CsvReader),
}

impl SignalReader {
    /// Files without a bsig extension are read as delimited text.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with(path, ReaderOptions::default(), CsvOptions::default())
    }

    pub fn open_with<P: AsRef<Path>>(
        path: P,
        options: ReaderOptions,
        csv: CsvOptions,
    ) -> Result<Self> {
        let path = path.as_ref();
        match FileKind::from_path(path) {
            Some(FileKind::Bsig) => Ok(SignalReader::Bsig(BsigReader::open_with(path, options)?)),
            _ => Ok(SignalReader::Csv(CsvReader::open(path, csv)?)),
        }
    }

    pub fn kind(&self) -> FileKind {
        match self {
            SignalReader::Bsig(_) => FileKind::Bsig,
            SignalReader::Csv(_) => FileKind::Csv,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            SignalReader::Bsig(r) => r.len(),
            SignalReader::Csv(r) => r.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn signal_names(&self) -> Vec<&str> {
        match self {
            SignalReader::Bsig(r) => r.list_signal_names(),
            SignalReader::Csv(r) => r.signal_names(),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        match self {
            SignalReader::Bsig(r) => r.contains(name),
            SignalReader::Csv(r) => r.contains(name),
        }
    }

    pub fn signal_length(&self, name: &str) -> Result<usize> {
        match self {
            SignalReader::Bsig(r) => r.signal_length(name),
            SignalReader::Csv(r) => r.signal_length(name),
        }
    }

    pub fn read(&self, name: &str) -> Result<SignalArray> {
        match self {
            SignalReader::Bsig(r) => r.read(name),
            SignalReader::Csv(r) => r.read(name),
        }
    }

    pub fn read_range(&self, name: &str, offset: i64, count: Option<usize>) -> Result<SignalArray> {
        match self {
            SignalReader::Bsig(r) => r.read_range(name, offset, count),
            SignalReader::Csv(r) => r.read_range(name, offset, count),
        }
    }
}

pub enum SignalWriter {
    Bsig(BsigWriter<BufWriter<File>>),
    Csv(CsvWriter<BufWriter<File>>),
}

impl SignalWriter {
    pub fn create<P: AsRef<Path>>(path: P, config: WriterConfig) -> Result<Self> {
        Self::create_with(path, config, CsvOptions::default())
    }

    /// An extension that is neither bsig nor CSV fails with
    /// `UnsupportedFileType` before the file is created.
    pub fn create_with<P: AsRef<Path>>(
        path: P,
        config: WriterConfig,
        csv: CsvOptions,
    ) -> Result<Self> {
        let path = path.as_ref();
        match FileKind::from_path(path) {
            Some(FileKind::Bsig) => Ok(SignalWriter::Bsig(BsigWriter::create(path, config)?)),
            Some(FileKind::Csv) => Ok(SignalWriter::Csv(CsvWriter::create(path, csv)?)),
            None => Err(BsigError::UnsupportedFileType(path.display().to_string())),
        }
    }

    pub fn kind(&self) -> FileKind {
        match self {
            SignalWriter::Bsig(_) => FileKind::Bsig,
            SignalWriter::Csv(_) => FileKind::Csv,
        }
    }

    pub fn signal_names(&self) -> Vec<&str> {
        match self {
            SignalWriter::Bsig(w) => w.signal_names(),
            SignalWriter::Csv(w) => w.signal_names(),
        }
    }

    pub fn is_closed(&self) -> bool {
        match self {
            SignalWriter::Bsig(w) => w.is_closed(),
            SignalWriter::Csv(w) => w.is_closed(),
        }
    }

    pub fn append(&mut self, name: &str, signal: impl Into<SignalArray>) -> Result<()> {
        let signal = signal.into();
        match self {
            SignalWriter::Bsig(w) => w.append_signal(name, &signal),
            SignalWriter::Csv(w) => w.append_signal(name, &signal),
        }
    }

    pub fn close(&mut self) -> Result<()> {
        match self {
            SignalWriter::Bsig(w) => w.close(),
            SignalWriter::Csv(w) => w.close(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_file_kind_from_extension() {
        assert_eq!(FileKind::from_path(Path::new("a.bsig")), Some(FileKind::Bsig));
        assert_eq!(FileKind::from_path(Path::new("a.BIN")), Some(FileKind::Bsig));
        assert_eq!(FileKind::from_path(Path::new("x/a.tstp")), Some(FileKind::Bsig));
        assert_eq!(FileKind::from_path(Path::new("a.Csv")), Some(FileKind::Csv));
        assert_eq!(FileKind::from_path(Path::new("a.txt")), None);
        assert_eq!(FileKind::from_path(Path::new("noext")), None);
    }

    #[test]
    fn test_write_and_read_both_kinds() {
        let dir = TempDir::new().unwrap();
        for file in ["rec.bsig", "rec.csv"] {
            let path = dir.path().join(file);
            let mut writer = SignalWriter::create(&path, WriterConfig::default()).unwrap();
            writer.append("Time stamp", vec![0i64, 40_000, 80_000]).unwrap();
            writer.append("speed", vec![1.5f64, 2.5, -3.5]).unwrap();
            assert_eq!(writer.signal_names(), vec!["Time stamp", "speed"]);
            writer.close().unwrap();
            assert!(writer.is_closed());

            let reader = SignalReader::open(&path).unwrap();
            assert_eq!(reader.kind(), writer.kind());
            assert_eq!(reader.signal_names(), vec!["Time stamp", "speed"]);
            assert_eq!(reader.signal_length("speed").unwrap(), 3);
            let ts = reader.read("Time stamp").unwrap();
            assert_eq!(ts.as_slice::<i64>().unwrap(), &[0, 40_000, 80_000]);
            let tail = reader.read_range("speed", -2, None).unwrap();
            assert_eq!(tail.as_slice::<f64>().unwrap(), &[2.5, -3.5]);
        }
    }

    #[test]
    fn test_unknown_extension() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("rec.mf4");
        assert!(matches!(
            SignalWriter::create(&path, WriterConfig::default()),
            Err(BsigError::UnsupportedFileType(_))
        ));
        assert!(!path.exists());

        // anything that is not bsig is parsed as delimited text
        let txt = dir.path().join("rec.txt");
        std::fs::write(&txt, "a;b\n1;2\n").unwrap();
        let reader = SignalReader::open(&txt).unwrap();
        assert_eq!(reader.kind(), FileKind::Csv);
        assert_eq!(reader.read("b").unwrap().as_slice::<i64>().unwrap(), &[2]);
    }
}
