// ============================================================
// Layer 4 — Example Reader
// ============================================================
// Streams a tab-separated file line by line and turns each
// line into a typed example through the TsvRecord trait.
//
// The reader itself is lazy (an Iterator), but training needs
// the dataset length up front to size the learning-rate
// schedule, so the use cases call load_examples() which
// materialises everything into a Vec before training starts.

use std::{
    fs::File,
    io::{BufRead, BufReader, Lines},
    marker::PhantomData,
    path::{Path, PathBuf},
};

use thiserror::Error;

use crate::domain::traits::{RecordError, TsvRecord};

/// Field delimiter of every dataset file
pub const DELIMITER: char = '\t';

#[derive(Debug, Error)]
pub enum ReadError {
    #[error("cannot open dataset '{path}': {source}")]
    Open {
        path:   PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error while reading line {line}: {source}")]
    Io {
        line:   usize,
        #[source]
        source: std::io::Error,
    },

    #[error("line {line}: expected {expected} tab-separated fields, found {found}")]
    FieldCount {
        line:     usize,
        expected: usize,
        found:    usize,
    },

    #[error("line {line}: {source}")]
    Record {
        line:   usize,
        #[source]
        source: RecordError,
    },
}

/// Lazy line-by-line reader over a dataset file.
pub struct TsvReader<T> {
    lines:   Lines<BufReader<File>>,
    line_no: usize,
    _record: PhantomData<T>,
}

impl<T: TsvRecord> TsvReader<T> {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ReadError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| ReadError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self {
            lines:   BufReader::new(file).lines(),
            line_no: 0,
            _record: PhantomData,
        })
    }
}

impl<T: TsvRecord> Iterator for TsvReader<T> {
    type Item = Result<T, ReadError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let line = self.lines.next()?;
            self.line_no += 1;

            let line = match line {
                Ok(l) => l,
                Err(source) => return Some(Err(ReadError::Io { line: self.line_no, source })),
            };

            // Blank lines (usually a trailing newline) are not examples
            if line.trim().is_empty() {
                continue;
            }
            return Some(parse_line(&line, self.line_no));
        }
    }
}

/// Parse one line into a record, numbering errors with `line_no` (1-based).
pub fn parse_line<T: TsvRecord>(line: &str, line_no: usize) -> Result<T, ReadError> {
    let line   = line.trim_end_matches(['\r', '\n']);
    let fields: Vec<&str> = line.split(DELIMITER).collect();

    if fields.len() != T::FIELDS {
        return Err(ReadError::FieldCount {
            line:     line_no,
            expected: T::FIELDS,
            found:    fields.len(),
        });
    }

    T::from_fields(&fields).map_err(|source| ReadError::Record { line: line_no, source })
}

/// Read the whole file into memory, failing on the first bad line.
pub fn load_examples<T: TsvRecord>(path: impl AsRef<Path>) -> Result<Vec<T>, ReadError> {
    let path     = path.as_ref();
    let examples = TsvReader::<T>::open(path)?.collect::<Result<Vec<_>, _>>()?;
    tracing::debug!("Read {} examples from '{}'", examples.len(), path.display());
    Ok(examples)
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::example::{PairExample, TripletExample};
    use std::io::Write;

    fn write_tmp(content: &str) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(content.as_bytes()).unwrap();
        f
    }

    #[test]
    fn test_reads_pairs_in_file_order() {
        let f = write_tmp("q one\tdoc one\t1\nq two\tdoc two\t0\n");
        let examples: Vec<PairExample> = load_examples(f.path()).unwrap();

        assert_eq!(examples.len(), 2);
        assert_eq!(examples[0], PairExample::new("q one", "doc one", 1));
        assert_eq!(examples[1], PairExample::new("q two", "doc two", 0));
    }

    #[test]
    fn test_reads_triplets_and_strips_crlf() {
        let f = write_tmp("query\tgood title\tbad title\r\n");
        let examples: Vec<TripletExample> = load_examples(f.path()).unwrap();
        assert_eq!(examples, vec![TripletExample::new("query", "good title", "bad title")]);
    }

    #[test]
    fn test_blank_lines_are_skipped() {
        let f = write_tmp("a\tb\t1\n\n   \nc\td\t0\n");
        let examples: Vec<PairExample> = load_examples(f.path()).unwrap();
        assert_eq!(examples.len(), 2);
    }

    #[test]
    fn test_wrong_field_count_is_a_format_error() {
        let f   = write_tmp("a\tb\t1\nonly\ttwo\n");
        let err = load_examples::<PairExample>(f.path()).unwrap_err();
        match err {
            ReadError::FieldCount { line, expected, found } => {
                assert_eq!((line, expected, found), (2, 3, 2));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_bad_label_reports_line() {
        let f   = write_tmp("a\tb\tyes\n");
        let err = load_examples::<PairExample>(f.path()).unwrap_err();
        assert!(matches!(err, ReadError::Record { line: 1, .. }));
    }

    #[test]
    fn test_missing_file() {
        let err = load_examples::<PairExample>("/definitely/not/here.tsv").unwrap_err();
        assert!(matches!(err, ReadError::Open { .. }));
    }

    #[test]
    fn test_reader_is_lazy() {
        // The second line is broken, but taking only the first never sees it
        let f = write_tmp("a\tb\t1\nbroken\n");
        let first: Vec<_> = TsvReader::<PairExample>::open(f.path())
            .unwrap()
            .take(1)
            .collect();
        assert!(first[0].is_ok());
    }
}
