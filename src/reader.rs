use std::fs::File;
use std::io::{self, Read};

use camino::Utf8Path;
use flate2::read::MultiGzDecoder;
use gb_io::reader::SeqReader;
use gb_io::seq::Seq;

use crate::error::CompositionError;
use crate::progress::Task;

/// Reports every chunk pulled from the underlying reader to a progress task.
pub struct TrackedReader<'t, R> {
    inner: R,
    task: &'t Task<'t>,
}

impl<'t, R: Read> TrackedReader<'t, R> {
    pub fn new(inner: R, task: &'t Task<'t>) -> Self {
        Self { inner, task }
    }
}

impl<R: Read> Read for TrackedReader<'_, R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let read = self.inner.read(buf)?;
        self.task.advance(read as u64);
        Ok(read)
    }
}

/// Lazy, single-pass sequence of GenBank records read from one archive.
pub struct RecordStream<'t> {
    label: String,
    records: SeqReader<Box<dyn Read + 't>>,
}

impl<'t> RecordStream<'t> {
    pub fn from_reader<R: Read + 't>(reader: R, label: impl Into<String>) -> Self {
        let reader: Box<dyn Read + 't> = Box::new(reader);
        Self {
            label: label.into(),
            records: SeqReader::new(reader),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }
}

impl Iterator for RecordStream<'_> {
    type Item = Result<Seq, CompositionError>;

    fn next(&mut self) -> Option<Self::Item> {
        let record = self.records.next()?;
        Some(record.map_err(|err| CompositionError::RecordParse {
            path: self.label.clone(),
            message: err.to_string(),
        }))
    }
}

pub fn archive_size(path: &Utf8Path) -> Result<u64, CompositionError> {
    std::fs::metadata(path.as_std_path())
        .map(|meta| meta.len())
        .map_err(|err| CompositionError::Filesystem(format!("stat {path}: {err}")))
}

/// Opens a record archive for streaming. Gzip archives (`.gz`) are
/// decompressed on the fly; progress is counted on the bytes read from disk.
pub fn open_archive<'t>(
    path: &Utf8Path,
    task: &'t Task<'t>,
) -> Result<RecordStream<'t>, CompositionError> {
    let file = File::open(path.as_std_path())
        .map_err(|err| CompositionError::Filesystem(format!("open archive {path}: {err}")))?;
    let tracked = TrackedReader::new(file, task);
    if path.extension() == Some("gz") {
        Ok(RecordStream::from_reader(
            MultiGzDecoder::new(tracked),
            path.as_str(),
        ))
    } else {
        Ok(RecordStream::from_reader(tracked, path.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::sync::Mutex;

    use camino::Utf8PathBuf;
    use flate2::Compression;
    use flate2::write::GzEncoder;

    use super::*;
    use crate::progress::{ProgressEvent, ProgressSink, ProgressUnit};

    #[derive(Default)]
    struct ByteCounter {
        bytes: Mutex<u64>,
    }

    impl ProgressSink for ByteCounter {
        fn event(&self, event: ProgressEvent) {
            if let ProgressEvent::TaskAdvanced { amount, .. } = event {
                *self.bytes.lock().unwrap() += amount;
            }
        }
    }

    const RECORD: &str = "\
LOCUS       A.1                       30 bp    DNA     linear   UNK 01-JAN-1980
DEFINITION  test record.
FEATURES             Location/Qualifiers
     CDS             1..30
                     /locus_tag=\"gene1\"
                     /translation=\"MKV\"
ORIGIN
        1 atgaaagtta aaaaaaaaaa aaaaaaaaaa
//
";

    #[test]
    fn tracked_reader_counts_bytes() {
        let sink = ByteCounter::default();
        let task = Task::start(&sink, "read", ProgressUnit::Bytes, None);
        let mut reader = TrackedReader::new(RECORD.as_bytes(), &task);
        let mut buffer = Vec::new();
        reader.read_to_end(&mut buffer).unwrap();
        assert_eq!(buffer.len(), RECORD.len());
        assert_eq!(*sink.bytes.lock().unwrap(), RECORD.len() as u64);
    }

    #[test]
    fn opens_plain_and_gzip_archives() {
        let temp = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();

        let plain = root.join("clusters.gbk");
        std::fs::write(plain.as_std_path(), RECORD.repeat(2)).unwrap();

        let gzipped = root.join("clusters.gbk.gz");
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(RECORD.repeat(3).as_bytes()).unwrap();
        std::fs::write(gzipped.as_std_path(), encoder.finish().unwrap()).unwrap();

        let sink = ByteCounter::default();
        let task = Task::start(&sink, "read", ProgressUnit::Bytes, None);
        let names = open_archive(&plain, &task)
            .unwrap()
            .map(|record| record.unwrap().name.unwrap())
            .collect::<Vec<_>>();
        assert_eq!(names, vec!["A.1", "A.1"]);

        let count = open_archive(&gzipped, &task).unwrap().count();
        assert_eq!(count, 3);

        let expected = archive_size(&plain).unwrap() + archive_size(&gzipped).unwrap();
        assert_eq!(*sink.bytes.lock().unwrap(), expected);
    }
}
