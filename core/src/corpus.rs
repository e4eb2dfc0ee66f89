//! Streaming Matrix Market encoding of the corpus: one matrix row per
//! document, column `term_id + 1`, value = raw term count.

use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Lines, Seek, SeekFrom, Write};
use std::path::Path;

use crate::error::IndexError;
use crate::index::{SparseVector, TermId};

const BANNER: &str = "%%MatrixMarket matrix coordinate real general";
const SIZE_LINE_WIDTH: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CorpusHeader {
    pub rows: usize,
    pub cols: usize,
    pub nnz: u64,
}

/// Appends rows in emission order; the size line is patched in on `finish`.
pub struct CorpusWriter {
    out: BufWriter<File>,
    size_line_at: u64,
    cols: usize,
    rows: usize,
    nnz: u64,
}

impl CorpusWriter {
    pub fn create<P: AsRef<Path>>(path: P, cols: usize) -> io::Result<Self> {
        let mut out = BufWriter::new(File::create(path)?);
        writeln!(out, "{BANNER}")?;
        let size_line_at = (BANNER.len() + 1) as u64;
        writeln!(out, "{:width$}", "", width = SIZE_LINE_WIDTH)?;
        Ok(Self { out, size_line_at, cols, rows: 0, nnz: 0 })
    }

    /// Write one document row and return its 0-based row index.
    pub fn write_row(&mut self, vector: &SparseVector) -> io::Result<usize> {
        let row = self.rows;
        for &(tid, count) in vector {
            if tid as usize >= self.cols {
                return Err(io::Error::new(io::ErrorKind::InvalidInput, format!("term id {tid} outside {} columns", self.cols)));
            }
            writeln!(self.out, "{} {} {}", row + 1, tid as usize + 1, count)?;
            self.nnz += 1;
        }
        self.rows += 1;
        Ok(row)
    }

    pub fn rows(&self) -> usize { self.rows }

    pub fn finish(mut self) -> io::Result<CorpusHeader> {
        self.out.flush()?;
        let header = CorpusHeader { rows: self.rows, cols: self.cols, nnz: self.nnz };
        let mut file = self.out.into_inner().map_err(|e| e.into_error())?;
        file.seek(SeekFrom::Start(self.size_line_at))?;
        let size = format!("{} {} {}", header.rows, header.cols, header.nnz);
        write!(file, "{size:width$}", width = SIZE_LINE_WIDTH)?;
        file.sync_all()?;
        Ok(header)
    }
}

/// Lazily yields corpus rows (empty rows included) and validates structure:
/// rows ascending, columns strictly ascending within a row, entry count
/// matching the header.
pub struct CorpusReader<R: BufRead> {
    lines: Lines<R>,
    header: CorpusHeader,
    next_row: usize,
    pending: Option<(usize, TermId, u32)>,
    seen: u64,
    line_no: usize,
    done: bool,
}

impl CorpusReader<BufReader<File>> {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, IndexError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => IndexError::Missing { artifact: "corpus", path: path.to_path_buf() },
            _ => IndexError::Io(e),
        })?;
        Self::new(BufReader::new(file))
    }
}

impl<R: BufRead> CorpusReader<R> {
    pub fn new(reader: R) -> Result<Self, IndexError> {
        let mut lines = reader.lines();
        let banner = lines.next().transpose()?.unwrap_or_default();
        if !banner.starts_with("%%MatrixMarket matrix coordinate") {
            return Err(IndexError::Corrupt("corpus is not a Matrix Market coordinate file".into()));
        }
        let mut line_no = 1;
        let size_line = loop {
            line_no += 1;
            match lines.next().transpose()? {
                Some(l) if l.starts_with('%') => continue,
                Some(l) => break l,
                None => return Err(IndexError::Corrupt("corpus size line missing".into())),
            }
        };
        let fields: Vec<&str> = size_line.split_whitespace().collect();
        let header = match fields.as_slice() {
            [rows, cols, nnz] => CorpusHeader {
                rows: parse_field(rows, line_no)?,
                cols: parse_field(cols, line_no)?,
                nnz: parse_field(nnz, line_no)?,
            },
            _ => return Err(IndexError::Corrupt(format!("corpus size line {line_no} malformed: {size_line:?}"))),
        };
        Ok(Self { lines, header, next_row: 0, pending: None, seen: 0, line_no, done: false })
    }

    pub fn header(&self) -> CorpusHeader { self.header }

    fn take_entry(&mut self) -> Result<Option<(usize, TermId, u32)>, IndexError> {
        if let Some(entry) = self.pending.take() {
            return Ok(Some(entry));
        }
        loop {
            let line = match self.lines.next().transpose()? {
                Some(line) => line,
                None => return Ok(None),
            };
            self.line_no += 1;
            let line = line.trim();
            if line.is_empty() || line.starts_with('%') { continue; }
            let fields: Vec<&str> = line.split_whitespace().collect();
            let [row, col, value] = fields.as_slice() else {
                return Err(IndexError::Corrupt(format!("corpus line {} malformed: {line:?}", self.line_no)));
            };
            let row: usize = parse_field(row, self.line_no)?;
            let col: usize = parse_field(col, self.line_no)?;
            let count = parse_count(value, self.line_no)?;
            if row == 0 || col == 0 || col > self.header.cols {
                return Err(IndexError::Corrupt(format!("corpus line {} has out-of-range indices", self.line_no)));
            }
            self.seen += 1;
            return Ok(Some((row - 1, (col - 1) as TermId, count)));
        }
    }

    fn fail(&mut self, err: IndexError) -> Option<Result<SparseVector, IndexError>> {
        self.done = true;
        Some(Err(err))
    }
}

impl<R: BufRead> Iterator for CorpusReader<R> {
    type Item = Result<SparseVector, IndexError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done { return None; }
        if self.next_row >= self.header.rows {
            self.done = true;
            return match self.take_entry() {
                Err(e) => Some(Err(e)),
                Ok(Some((row, _, _))) => Some(Err(IndexError::Corrupt(format!(
                    "corpus entry for row {} but header declares {} rows", row + 1, self.header.rows
                )))),
                Ok(None) if self.seen != self.header.nnz => Some(Err(IndexError::Corrupt(format!(
                    "corpus has {} entries but header declares {}", self.seen, self.header.nnz
                )))),
                Ok(None) => None,
            };
        }
        let row = self.next_row;
        self.next_row += 1;
        let mut vector: SparseVector = Vec::new();
        loop {
            let (entry_row, tid, count) = match self.take_entry() {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => return self.fail(e),
            };
            if entry_row < row {
                return self.fail(IndexError::Corrupt(format!("corpus rows out of order at line {}", self.line_no)));
            }
            if entry_row > row {
                self.pending = Some((entry_row, tid, count));
                break;
            }
            if matches!(vector.last(), Some(&(last, _)) if tid <= last) {
                return self.fail(IndexError::Corrupt(format!("corpus row {} is not sorted by term id", row + 1)));
            }
            vector.push((tid, count));
        }
        Some(Ok(vector))
    }
}

fn parse_field<T: std::str::FromStr>(s: &str, line_no: usize) -> Result<T, IndexError> {
    s.parse().map_err(|_| IndexError::Corrupt(format!("corpus line {line_no}: bad number {s:?}")))
}

// Counts are written as integers; accept integral floats from other writers.
fn parse_count(s: &str, line_no: usize) -> Result<u32, IndexError> {
    if let Ok(n) = s.parse::<u32>() {
        return Ok(n);
    }
    match s.parse::<f64>() {
        Ok(f) if f >= 0.0 && f.fract() == 0.0 && f <= u32::MAX as f64 => Ok(f as u32),
        _ => Err(IndexError::Corrupt(format!("corpus line {line_no}: bad count {s:?}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use tempfile::tempdir;

    #[test]
    fn written_rows_read_back_in_order_with_empty_rows() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("corpus.mm");
        let rows: Vec<SparseVector> = vec![vec![(0, 2), (3, 1)], vec![], vec![(1, 5)]];
        let mut w = CorpusWriter::create(&path, 4).unwrap();
        for r in &rows {
            w.write_row(r).unwrap();
        }
        let header = w.finish().unwrap();
        assert_eq!(header, CorpusHeader { rows: 3, cols: 4, nnz: 3 });

        let reader = CorpusReader::open(&path).unwrap();
        assert_eq!(reader.header(), header);
        let back: Vec<SparseVector> = reader.collect::<Result<_, _>>().unwrap();
        assert_eq!(back, rows);
    }

    #[test]
    fn truncated_body_is_detected() {
        let text = format!("{BANNER}\n2 3 3\n1 1 1\n1 2 1\n");
        let rows: Result<Vec<_>, _> = CorpusReader::new(Cursor::new(text)).unwrap().collect();
        assert!(matches!(rows, Err(IndexError::Corrupt(_))));
    }

    #[test]
    fn unpatched_size_line_is_corrupt() {
        let text = format!("{BANNER}\n{:50}\n1 1 1\n", "");
        assert!(matches!(CorpusReader::new(Cursor::new(text)), Err(IndexError::Corrupt(_))));
    }

    #[test]
    fn unsorted_row_is_corrupt() {
        let text = format!("{BANNER}\n1 3 2\n1 2 1\n1 1 1\n");
        let rows: Result<Vec<_>, _> = CorpusReader::new(Cursor::new(text)).unwrap().collect();
        assert!(matches!(rows, Err(IndexError::Corrupt(_))));
    }

    #[test]
    fn float_counts_are_accepted() {
        let text = format!("{BANNER}\n1 2 1\n1 2 3.0\n");
        let rows: Vec<SparseVector> = CorpusReader::new(Cursor::new(text)).unwrap().collect::<Result<_, _>>().unwrap();
        assert_eq!(rows, vec![vec![(1, 3)]]);
    }

    #[test]
    fn writer_rejects_ids_beyond_columns() {
        let dir = tempdir().unwrap();
        let mut w = CorpusWriter::create(dir.path().join("c.mm"), 2).unwrap();
        assert!(w.write_row(&vec![(2, 1)]).is_err());
    }
}
