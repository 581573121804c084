//! NumPy `.npy` (format version 1.0) reader and writer for little-endian
//! `f64` arrays in C order.
//!
//! ```text
//! \x93NUMPY | 1 0 | header_len (u16 LE) | {'descr': '<f8', ...} ␠…␠\n | data
//! ```
//!
//! The header is padded with spaces so that the data starts on a 64-byte
//! boundary.

use std::io::{self, Read, Write};

const MAGIC: &[u8; 6] = b"\x93NUMPY";
const PREAMBLE_LEN: usize = 10;
const ALIGNMENT: usize = 64;

fn invalid(msg: impl Into<String>) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, msg.into())
}

/// Write `data` with the given `shape`.
pub fn write_f64<W: Write>(mut writer: W, shape: &[usize], data: &[f64]) -> io::Result<()> {
    let expected: usize = shape.iter().product();
    if expected != data.len() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("shape {shape:?} needs {expected} values, got {}", data.len()),
        ));
    }

    let shape_text = match shape {
        [single] => format!("({single},)"),
        dims => format!(
            "({})",
            dims.iter()
                .map(|d| d.to_string())
                .collect::<Vec<_>>()
                .join(", ")
        ),
    };
    let mut header = format!("{{'descr': '<f8', 'fortran_order': False, 'shape': {shape_text}, }}");
    let unpadded = PREAMBLE_LEN + header.len() + 1;
    let padding = (ALIGNMENT - unpadded % ALIGNMENT) % ALIGNMENT;
    header.push_str(&" ".repeat(padding));
    header.push('\n');
    let header_len = u16::try_from(header.len())
        .map_err(|_| invalid("npy header exceeds 65535 bytes"))?;

    writer.write_all(MAGIC)?;
    writer.write_all(&[1, 0])?;
    writer.write_all(&header_len.to_le_bytes())?;
    writer.write_all(header.as_bytes())?;
    for v in data {
        writer.write_all(&v.to_le_bytes())?;
    }
    writer.flush()
}

/// Read an array written by [`write_f64`] (or by NumPy for a C-ordered
/// `<f8` array), returning its shape and values.
pub fn read_f64<R: Read>(mut reader: R) -> io::Result<(Vec<usize>, Vec<f64>)> {
    let mut preamble = [0u8; PREAMBLE_LEN];
    reader.read_exact(&mut preamble)?;
    if &preamble[..6] != MAGIC {
        return Err(invalid("not an npy file"));
    }
    if preamble[6] != 1 {
        return Err(invalid(format!(
            "unsupported npy version {}.{}",
            preamble[6], preamble[7]
        )));
    }
    let header_len = u16::from_le_bytes([preamble[8], preamble[9]]) as usize;
    let mut header = vec![0u8; header_len];
    reader.read_exact(&mut header)?;
    let header = std::str::from_utf8(&header).map_err(|_| invalid("npy header is not text"))?;

    let descr = dict_value(header, "descr").ok_or_else(|| invalid("npy header lacks descr"))?;
    if descr.trim_matches('\'') != "<f8" {
        return Err(invalid(format!("unsupported dtype {descr}, expected '<f8'")));
    }
    let fortran = dict_value(header, "fortran_order")
        .ok_or_else(|| invalid("npy header lacks fortran_order"))?;
    if fortran != "False" {
        return Err(invalid("Fortran-ordered arrays are not supported"));
    }
    let shape = parse_shape(header)?;

    let count: usize = shape.iter().product();
    let mut bytes = vec![0u8; count * 8];
    reader.read_exact(&mut bytes)?;
    let data = bytes
        .chunks_exact(8)
        .map(|chunk| {
            let mut le = [0u8; 8];
            le.copy_from_slice(chunk);
            f64::from_le_bytes(le)
        })
        .collect();
    Ok((shape, data))
}

/// Scalar value of `'key': value` in the header dict.
fn dict_value<'a>(header: &'a str, key: &str) -> Option<&'a str> {
    let pattern = format!("'{key}':");
    let start = header.find(&pattern)? + pattern.len();
    let rest = header[start..].trim_start();
    let end = rest.find([',', '}'])?;
    Some(rest[..end].trim())
}

fn parse_shape(header: &str) -> io::Result<Vec<usize>> {
    let start = header
        .find("'shape':")
        .ok_or_else(|| invalid("npy header lacks shape"))?;
    let rest = &header[start..];
    let open = rest.find('(').ok_or_else(|| invalid("malformed npy shape"))?;
    let close = rest.find(')').ok_or_else(|| invalid("malformed npy shape"))?;
    if close < open {
        return Err(invalid("malformed npy shape"));
    }
    rest[open + 1..close]
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<usize>()
                .map_err(|_| invalid(format!("malformed npy dimension '{s}'")))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(shape: &[usize], data: &[f64]) -> Vec<u8> {
        let mut buf = Vec::new();
        write_f64(&mut buf, shape, data).unwrap();
        buf
    }

    #[test]
    fn test_round_trip_three_dimensions() {
        let data: Vec<f64> = (0..24).map(|i| i as f64 * 0.5 - 3.0).collect();
        let buf = encode(&[2, 3, 4], &data);
        let (shape, back) = read_f64(buf.as_slice()).unwrap();
        assert_eq!(shape, vec![2, 3, 4]);
        assert_eq!(back, data);
    }

    #[test]
    fn test_header_layout() {
        let buf = encode(&[5], &[1.0; 5]);
        assert_eq!(&buf[..6], MAGIC);
        assert_eq!(buf[6..8], [1, 0]);
        let header_len = u16::from_le_bytes([buf[8], buf[9]]) as usize;
        assert_eq!((PREAMBLE_LEN + header_len) % ALIGNMENT, 0);
        let header = std::str::from_utf8(&buf[10..10 + header_len]).unwrap();
        assert!(header.contains("'shape': (5,)"));
        assert!(header.ends_with('\n'));
        assert_eq!(buf.len(), PREAMBLE_LEN + header_len + 5 * 8);
    }

    #[test]
    fn test_special_values_survive() {
        let data = [f64::NAN, f64::INFINITY, -0.0, f64::MIN_POSITIVE];
        let (_, back) = read_f64(encode(&[4], &data).as_slice()).unwrap();
        assert!(back[0].is_nan());
        assert_eq!(back[1], f64::INFINITY);
        assert_eq!(back[2].to_bits(), (-0.0f64).to_bits());
        assert_eq!(back[3], f64::MIN_POSITIVE);
    }

    #[test]
    fn test_rejects_bad_input() {
        assert!(write_f64(Vec::new(), &[2, 2], &[1.0; 3]).is_err());

        let mut buf = encode(&[1], &[1.0]);
        buf[0] = b'X';
        assert!(read_f64(buf.as_slice()).is_err());

        let buf = encode(&[1], &[1.0]);
        let text = String::from_utf8_lossy(&buf[10..]).replace("<f8", "<f4");
        let mut tampered = buf[..10].to_vec();
        tampered.extend_from_slice(text.as_bytes());
        assert!(read_f64(tampered.as_slice()).is_err());

        let truncated = &encode(&[3], &[1.0, 2.0, 3.0])[..70];
        assert!(read_f64(truncated).is_err());
    }

    #[test]
    fn test_parse_shape_forms() {
        assert_eq!(parse_shape("{'shape': (), }").unwrap(), Vec::<usize>::new());
        assert_eq!(parse_shape("{'shape': (7,), }").unwrap(), vec![7]);
        assert_eq!(parse_shape("{'shape': (4, 1000, 23), }").unwrap(), vec![4, 1000, 23]);
        assert!(parse_shape("{'shape': (a,), }").is_err());
    }
}
