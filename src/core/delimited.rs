// Delimited text (CSV) reader and writer

use crate::core::error::{BsigError, Result};
use crate::core::format::{with_values, SignalArray, Values};
use crate::core::reader::sample_window;
use csv::{ReaderBuilder, StringRecord, Trim, WriterBuilder};
use std::collections::HashSet;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;
use tracing::{debug, info, warn};

const DELIMITERS: [u8; 4] = [b';', b',', b'\t', b' '];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CsvOptions {
    pub delimiter: u8,
    /// Lines before the header row.
    pub skip_lines: usize,
    /// Lines between the header row and the first data row.
    pub skip_data_lines: usize,
}

impl Default for CsvOptions {
    fn default() -> Self {
        Self {
            delimiter: b';',
            skip_lines: 0,
            skip_data_lines: 0,
        }
    }
}

impl CsvOptions {
    /// Anything but `;`, `,`, tab or space falls back to `;`.
    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = if DELIMITERS.contains(&delimiter) {
            delimiter
        } else {
            debug!("Unsupported CSV delimiter {:?}, using ';'", delimiter as char);
            b';'
        };
        self
    }

    pub fn with_skip_lines(mut self, skip_lines: usize) -> Self {
        self.skip_lines = skip_lines;
        self
    }

    pub fn with_skip_data_lines(mut self, skip_data_lines: usize) -> Self {
        self.skip_data_lines = skip_data_lines;
        self
    }
}

enum Cell {
    Int(i64),
    Float(f64),
}

fn parse_cell(cell: &str) -> Option<Cell> {
    let digits = cell.strip_prefix(|c: char| c == '-' || c == '+').unwrap_or(cell);
    if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) {
        if let Ok(v) = cell.parse::<i64>() {
            return Some(Cell::Int(v));
        }
    }
    // MSVC spelling of infinity
    let upper = cell.to_ascii_uppercase();
    if upper.strip_prefix('+').unwrap_or(&upper).starts_with("1.#INF") {
        return Some(Cell::Float(f64::INFINITY));
    }
    if upper.starts_with("-1.#INF") {
        return Some(Cell::Float(f64::NEG_INFINITY));
    }
    cell.parse::<f64>().ok().map(Cell::Float)
}

struct Column {
    name: String,
    field: usize,
    cells: Vec<Cell>,
    float: bool,
}

impl Column {
    fn into_values(self) -> Values {
        if self.float {
            Values::F64(
                self.cells
                    .into_iter()
                    .map(|c| match c {
                        Cell::Int(v) => v as f64,
                        Cell::Float(v) => v,
                    })
                    .collect(),
            )
        } else {
            Values::I64(
                self.cells
                    .into_iter()
                    .map(|c| match c {
                        Cell::Int(v) => v,
                        Cell::Float(v) => v as i64,
                    })
                    .collect(),
            )
        }
    }
}

/// Column-per-signal text file, parsed completely on open.
///
/// The header row names the signals. A column holding only integers reads
/// as `int64`, any other numeric column as `float64`.
#[derive(Debug)]
pub struct CsvReader {
    names: Vec<String>,
    columns: Vec<Values>,
}

impl CsvReader {
    pub fn open<P: AsRef<Path>>(path: P, options: CsvOptions) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        let reader = Self::from_reader(BufReader::new(file), options)?;
        info!(
            "Opened CSV {} with {} signals",
            path.as_ref().display(),
            reader.len()
        );
        Ok(reader)
    }

    pub fn from_reader<R: Read>(source: R, options: CsvOptions) -> Result<Self> {
        let mut records = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .trim(Trim::All)
            .delimiter(options.delimiter)
            .from_reader(source)
            .into_records();

        for _ in 0..options.skip_lines {
            if records.next().transpose()?.is_none() {
                return Ok(Self::empty());
            }
        }
        let Some(header) = records.next().transpose()? else {
            return Ok(Self::empty());
        };

        // empty header fields have no signal behind them
        let mut columns: Vec<Column> = header
            .iter()
            .enumerate()
            .filter(|(_, name)| !name.is_empty())
            .map(|(field, name)| Column {
                name: name.to_string(),
                field,
                cells: Vec::new(),
                float: false,
            })
            .collect();

        for _ in 0..options.skip_data_lines {
            if records.next().transpose()?.is_none() {
                break;
            }
        }

        for record in records {
            let record = record?;
            for column in &mut columns {
                let cell = parse_field(&record, column)?;
                column.float |= matches!(cell, Cell::Float(_));
                column.cells.push(cell);
            }
        }

        let names = columns.iter().map(|c| c.name.clone()).collect();
        let columns = columns.into_iter().map(Column::into_values).collect();
        Ok(Self { names, columns })
    }

    fn empty() -> Self {
        Self {
            names: Vec::new(),
            columns: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn signal_names(&self) -> Vec<&str> {
        self.names.iter().map(String::as_str).collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    /// Every column has the same number of rows.
    pub fn signal_length(&self, name: &str) -> Result<usize> {
        Ok(self.column(name)?.len())
    }

    pub fn read(&self, name: &str) -> Result<SignalArray> {
        Ok(SignalArray::scalar(self.column(name)?.clone()))
    }

    /// Same offset rules as `BsigReader::read_range`.
    pub fn read_range(&self, name: &str, offset: i64, count: Option<usize>) -> Result<SignalArray> {
        let values = self.column(name)?;
        let window = sample_window(name, offset, count, values.len())?;
        Ok(SignalArray::scalar(values.slice(window.start, window.end)))
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    fn column(&self, name: &str) -> Result<&Values> {
        self.position(name)
            .map(|idx| &self.columns[idx])
            .ok_or_else(|| BsigError::UnknownSignal(name.to_string()))
    }
}

fn parse_field(record: &StringRecord, column: &Column) -> Result<Cell> {
    let line = record.position().map_or(0, |p| p.line());
    let field = record.get(column.field).ok_or_else(|| {
        BsigError::InvalidShape(format!(
            "line {} has {} fields, column {} needs {}",
            line,
            record.len(),
            column.name,
            column.field + 1
        ))
    })?;
    parse_cell(field).ok_or_else(|| {
        BsigError::UnsupportedDtype(format!(
            "line {}, column {}: {:?} is not a number",
            line, column.name, field
        ))
    })
}

/// Collects scalar signals of equal length and writes them as columns on
/// `close`.
pub struct CsvWriter<W: Write> {
    sink: Option<W>,
    options: CsvOptions,
    names: HashSet<String>,
    signals: Vec<(String, Values)>,
    rows: Option<usize>,
    closed: bool,
}

impl CsvWriter<BufWriter<File>> {
    pub fn create<P: AsRef<Path>>(path: P, options: CsvOptions) -> Result<Self> {
        let file = File::create(path.as_ref())?;
        info!("Creating CSV {}", path.as_ref().display());
        Ok(Self::new(BufWriter::new(file), options))
    }
}

impl<W: Write> CsvWriter<W> {
    pub fn new(sink: W, options: CsvOptions) -> Self {
        Self {
            sink: Some(sink),
            options,
            names: HashSet::new(),
            signals: Vec::new(),
            rows: None,
            closed: false,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Names appended so far, in column order.
    pub fn signal_names(&self) -> Vec<&str> {
        self.signals.iter().map(|(n, _)| n.as_str()).collect()
    }

    pub fn append(&mut self, name: &str, signal: impl Into<SignalArray>) -> Result<()> {
        let signal = signal.into();
        self.append_signal(name, &signal)
    }

    pub fn append_signal(&mut self, name: &str, signal: &SignalArray) -> Result<()> {
        if self.closed {
            return Err(BsigError::WriterClosed);
        }
        if name.is_empty() {
            return Err(BsigError::InvalidSignalName(name.to_string()));
        }
        if self.names.contains(name) {
            return Err(BsigError::DuplicateSignal(name.to_string()));
        }
        if signal.is_array() {
            return Err(BsigError::InvalidShape(format!(
                "{} has {} elements per sample, CSV columns hold one",
                name,
                signal.array_length()
            )));
        }
        let rows = signal.sample_count();
        match self.rows {
            Some(expected) if expected != rows => {
                return Err(BsigError::InvalidShape(format!(
                    "{} has {} samples, earlier columns have {}",
                    name, rows, expected
                )))
            }
            _ => self.rows = Some(rows),
        }

        self.names.insert(name.to_string());
        self.signals.push((name.to_string(), signal.values().clone()));
        Ok(())
    }

    /// Writes the header and all rows. Nothing is written without signals.
    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Err(BsigError::WriterClosed);
        }
        self.closed = true;
        let sink = self.sink.as_mut().ok_or(BsigError::WriterClosed)?;
        if self.signals.is_empty() {
            sink.flush()?;
            return Ok(());
        }

        let mut out = WriterBuilder::new()
            .delimiter(self.options.delimiter)
            .from_writer(sink);
        out.write_record(self.signals.iter().map(|(name, _)| name.as_str()))?;
        let rows = self.rows.unwrap_or(0);
        for row in 0..rows {
            out.write_record(
                self.signals
                    .iter()
                    .map(|(_, values)| with_values!(values, v => v[row].to_string())),
            )?;
        }
        out.flush()?;

        info!(
            "Closed CSV with {} signals, {} rows",
            self.signals.len(),
            rows
        );
        Ok(())
    }

    /// Closes the file if still open and hands back the sink.
    pub fn finish(mut self) -> Result<W> {
        if !self.closed {
            self.close()?;
        }
        self.sink.take().ok_or(BsigError::WriterClosed)
    }
}

impl<W: Write> Drop for CsvWriter<W> {
    fn drop(&mut self) {
        if self.sink.is_some() && !self.closed && !self.signals.is_empty() {
            warn!(
                "CSV writer dropped before close, {} signals not written",
                self.signals.len()
            );
        }
    }
}
