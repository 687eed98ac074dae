//! Minimal writer for NumPy `.npz` archives holding a sparse CSR matrix in
//! the layout `scipy.sparse.save_npz` produces, so `scipy.sparse.load_npz`
//! reads it back directly.

use std::io::{Seek, Write};

use zip::CompressionMethod;
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

use crate::error::CompositionError;
use crate::matrix::CsrMatrix;

const NPY_MAGIC: &[u8] = b"\x93NUMPY";
const NPY_ALIGN: usize = 64;

/// Element type of a stored array, as a NumPy dtype descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Dtype {
    I4,
    I8,
    F8,
    S3,
}

impl Dtype {
    fn descr(self) -> &'static str {
        match self {
            Dtype::I4 => "<i4",
            Dtype::I8 => "<i8",
            Dtype::F8 => "<f8",
            Dtype::S3 => "|S3",
        }
    }
}

/// Writes `matrix` as a compressed `.npz` archive with the `indices`,
/// `indptr`, `format`, `shape` and `data` members.
pub fn write_csr<W: Write + Seek>(writer: W, matrix: &CsrMatrix) -> Result<W, CompositionError> {
    let indices = to_i32(&matrix.indices, "column index")?;
    let indptr = to_i32(&matrix.indptr, "row pointer")?;
    let shape = [matrix.rows as i64, matrix.cols as i64];

    let mut arrays: Vec<(&str, Vec<u8>)> = Vec::with_capacity(5);
    arrays.push((
        "indices.npy",
        npy(Dtype::I4, &[indices.len()], indices.iter().flat_map(|v| v.to_le_bytes())),
    ));
    arrays.push((
        "indptr.npy",
        npy(Dtype::I4, &[indptr.len()], indptr.iter().flat_map(|v| v.to_le_bytes())),
    ));
    arrays.push(("format.npy", npy(Dtype::S3, &[], b"csr".iter().copied())));
    arrays.push((
        "shape.npy",
        npy(Dtype::I8, &[2], shape.iter().flat_map(|v| v.to_le_bytes())),
    ));
    arrays.push((
        "data.npy",
        npy(Dtype::F8, &[matrix.data.len()], matrix.data.iter().flat_map(|v| v.to_le_bytes())),
    ));

    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut zip = ZipWriter::new(writer);
    for (name, bytes) in arrays {
        zip.start_file(name, options)
            .map_err(|err| CompositionError::Filesystem(err.to_string()))?;
        zip.write_all(&bytes)
            .map_err(|err| CompositionError::Filesystem(err.to_string()))?;
    }
    zip.finish()
        .map_err(|err| CompositionError::Filesystem(err.to_string()))
}

fn to_i32(values: &[usize], what: &str) -> Result<Vec<i32>, CompositionError> {
    values
        .iter()
        .map(|&value| {
            i32::try_from(value).map_err(|_| {
                CompositionError::Filesystem(format!("{what} {value} does not fit in int32"))
            })
        })
        .collect()
}

/// Serializes one array in NPY format version 1.0.
fn npy(dtype: Dtype, shape: &[usize], payload: impl Iterator<Item = u8>) -> Vec<u8> {
    let shape = match shape {
        [] => "()".to_string(),
        [len] => format!("({len},)"),
        dims => format!(
            "({})",
            dims.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
        ),
    };
    let mut header = format!(
        "{{'descr': '{}', 'fortran_order': False, 'shape': {shape}, }}",
        dtype.descr()
    );
    // magic (6) + version (2) + header length (2) + header, newline included
    let unpadded = NPY_MAGIC.len() + 4 + header.len() + 1;
    let padding = (NPY_ALIGN - unpadded % NPY_ALIGN) % NPY_ALIGN;
    header.extend(std::iter::repeat_n(' ', padding));
    header.push('\n');

    let mut bytes = Vec::with_capacity(NPY_MAGIC.len() + 4 + header.len());
    bytes.extend_from_slice(NPY_MAGIC);
    bytes.extend_from_slice(&[1, 0]);
    bytes.extend_from_slice(&(header.len() as u16).to_le_bytes());
    bytes.extend_from_slice(header.as_bytes());
    bytes.extend(payload);
    bytes
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::io::{Cursor, Read};

    use zip::ZipArchive;

    use super::*;

    fn member(archive: &mut ZipArchive<Cursor<Vec<u8>>>, name: &str) -> Vec<u8> {
        let mut file = archive.by_name(name).unwrap();
        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes).unwrap();
        bytes
    }

    fn split_header(bytes: &[u8]) -> (&str, &[u8]) {
        let len = u16::from_le_bytes([bytes[8], bytes[9]]) as usize;
        let header = std::str::from_utf8(&bytes[10..10 + len]).unwrap();
        (header, &bytes[10 + len..])
    }

    #[test]
    fn header_is_aligned_and_newline_terminated() {
        let bytes = npy(Dtype::I8, &[2], [0u8; 16].into_iter());
        assert_eq!(&bytes[..6], NPY_MAGIC);
        assert_eq!(&bytes[6..8], &[1, 0]);
        let (header, payload) = split_header(&bytes);
        assert_eq!((10 + header.len()) % 64, 0);
        assert!(header.ends_with('\n'));
        assert!(header.starts_with("{'descr': '<i8', 'fortran_order': False, 'shape': (2,), }"));
        assert_eq!(payload.len(), 16);
    }

    #[test]
    fn writes_scipy_csr_members() {
        let rows = vec![
            BTreeMap::from([(0, 1.0)]),
            BTreeMap::new(),
            BTreeMap::from([(1, 2.0), (2, 3.0)]),
        ];
        let matrix = CsrMatrix::from_rows(3, &rows);
        let cursor = write_csr(Cursor::new(Vec::new()), &matrix).unwrap();
        let mut archive = ZipArchive::new(Cursor::new(cursor.into_inner())).unwrap();

        let mut names: Vec<_> = archive.file_names().map(String::from).collect();
        names.sort();
        assert_eq!(
            names,
            vec!["data.npy", "format.npy", "indices.npy", "indptr.npy", "shape.npy"]
        );

        let format = member(&mut archive, "format.npy");
        let (header, payload) = split_header(&format);
        assert!(header.contains("'descr': '|S3'"));
        assert!(header.contains("'shape': ()"));
        assert_eq!(payload, b"csr");

        let indptr = member(&mut archive, "indptr.npy");
        let (header, payload) = split_header(&indptr);
        assert!(header.contains("'descr': '<i4'"));
        let values: Vec<i32> = payload
            .chunks_exact(4)
            .map(|chunk| i32::from_le_bytes(chunk.try_into().unwrap()))
            .collect();
        assert_eq!(values, vec![0, 1, 1, 3]);

        let shape = member(&mut archive, "shape.npy");
        let (_, payload) = split_header(&shape);
        let values: Vec<i64> = payload
            .chunks_exact(8)
            .map(|chunk| i64::from_le_bytes(chunk.try_into().unwrap()))
            .collect();
        assert_eq!(values, vec![3, 3]);

        let data = member(&mut archive, "data.npy");
        let (header, payload) = split_header(&data);
        assert!(header.contains("'shape': (3,)"));
        let values: Vec<f64> = payload
            .chunks_exact(8)
            .map(|chunk| f64::from_le_bytes(chunk.try_into().unwrap()))
            .collect();
        assert_eq!(values, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn empty_matrix_is_valid() {
        let matrix = CsrMatrix::from_rows(0, &[]);
        let cursor = write_csr(Cursor::new(Vec::new()), &matrix).unwrap();
        let mut archive = ZipArchive::new(Cursor::new(cursor.into_inner())).unwrap();
        let indices = member(&mut archive, "indices.npy");
        let (header, payload) = split_header(&indices);
        assert!(header.contains("'shape': (0,)"));
        assert!(payload.is_empty());
    }
}
