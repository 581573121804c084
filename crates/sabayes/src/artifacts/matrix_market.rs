//! Matrix Market `coordinate real general` codec for the spatial weights.

use std::io::{self, BufRead, Write};

use sabayes_core::SpatialWeights;

const BANNER: &str = "%%MatrixMarket matrix coordinate real general";

fn invalid(msg: impl Into<String>) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, msg.into())
}

/// Write every stored entry of `weights`, one-based, row-major.
pub fn write_weights<W: Write>(mut writer: W, weights: &SpatialWeights) -> io::Result<()> {
    writeln!(writer, "{BANNER}")?;
    writeln!(writer, "% row-standardized k-nearest-neighbour weights")?;
    writeln!(writer, "{} {} {}", weights.n(), weights.n(), weights.nnz())?;
    for (i, j, w) in weights.triplets() {
        writeln!(writer, "{} {} {}", i + 1, j + 1, w)?;
    }
    writer.flush()
}

/// Read a square coordinate matrix as `(n, triplets)` with zero-based
/// indices.
pub fn read_weights<R: BufRead>(reader: R) -> io::Result<(usize, Vec<(usize, usize, f64)>)> {
    let mut lines = reader.lines();

    let banner = lines.next().ok_or_else(|| invalid("empty Matrix Market file"))??;
    let tokens: Vec<String> = banner.split_whitespace().map(str::to_lowercase).collect();
    if tokens != ["%%matrixmarket", "matrix", "coordinate", "real", "general"] {
        return Err(invalid(format!("unsupported Matrix Market banner '{banner}'")));
    }

    let mut size = None;
    for line in lines.by_ref() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('%') {
            continue;
        }
        size = Some(parse_numbers::<usize>(line, 3)?);
        break;
    }
    let size = size.ok_or_else(|| invalid("Matrix Market file has no size line"))?;
    let (rows, cols, nnz) = (size[0], size[1], size[2]);
    if rows != cols {
        return Err(invalid(format!("weights must be square, got {rows}×{cols}")));
    }

    let mut triplets = Vec::with_capacity(nnz);
    for line in lines {
        let line = line?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('%') {
            continue;
        }
        let mut fields = line.split_whitespace();
        let (Some(i), Some(j), Some(v), None) =
            (fields.next(), fields.next(), fields.next(), fields.next())
        else {
            return Err(invalid(format!("malformed entry '{line}'")));
        };
        let i: usize = i.parse().map_err(|_| invalid(format!("bad row index '{i}'")))?;
        let j: usize = j.parse().map_err(|_| invalid(format!("bad column index '{j}'")))?;
        let v: f64 = v.parse().map_err(|_| invalid(format!("bad value '{v}'")))?;
        if i == 0 || j == 0 || i > rows || j > cols {
            return Err(invalid(format!("entry ({i}, {j}) outside a {rows}×{cols} matrix")));
        }
        triplets.push((i - 1, j - 1, v));
    }
    if triplets.len() != nnz {
        return Err(invalid(format!(
            "expected {nnz} entries, found {}",
            triplets.len()
        )));
    }
    Ok((rows, triplets))
}

fn parse_numbers<T: std::str::FromStr>(line: &str, count: usize) -> io::Result<Vec<T>> {
    let values: Vec<T> = line
        .split_whitespace()
        .map(|s| s.parse::<T>().map_err(|_| invalid(format!("bad number '{s}'"))))
        .collect::<io::Result<_>>()?;
    if values.len() != count {
        return Err(invalid(format!("expected {count} numbers in '{line}'")));
    }
    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sabayes_core::{Coordinates, KnnGraph};

    fn weights() -> SpatialWeights {
        let coords = Coordinates::new(1, vec![0.0, 1.0, 3.0, 7.0, 8.0]).unwrap();
        SpatialWeights::from_graph(&KnnGraph::build(&coords, 2, None).unwrap(), true)
    }

    #[test]
    fn test_written_layout() {
        let w = weights();
        let mut buf = Vec::new();
        write_weights(&mut buf, &w).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some(BANNER));
        assert!(lines.next().unwrap().starts_with('%'));
        assert_eq!(lines.next(), Some(format!("5 5 {}", w.nnz()).as_str()));
        assert_eq!(lines.count(), w.nnz());
    }

    #[test]
    fn test_reload_reproduces_weights() {
        let w = weights();
        let mut buf = Vec::new();
        write_weights(&mut buf, &w).unwrap();
        let (n, triplets) = read_weights(buf.as_slice()).unwrap();
        let back = SpatialWeights::from_triplets(n, triplets).unwrap();
        assert_eq!(back, w);
    }

    #[test]
    fn test_rejects_malformed_files() {
        let cases = [
            "",
            "%%MatrixMarket matrix array real general\n2 2\n",
            "%%MatrixMarket matrix coordinate real general\n2 3 0\n",
            "%%MatrixMarket matrix coordinate real general\n2 2 1\n3 1 1.0\n",
            "%%MatrixMarket matrix coordinate real general\n2 2 2\n1 2 1.0\n",
            "%%MatrixMarket matrix coordinate real general\n2 2 1\n1 2 x\n",
        ];
        for case in cases {
            assert!(read_weights(case.as_bytes()).is_err(), "accepted {case:?}");
        }
    }

    #[test]
    fn test_comments_and_isolated_rows() {
        let text = "%%MatrixMarket matrix coordinate real general\n% c\n3 3 2\n1 2 1\n% mid\n2 1 1\n";
        let (n, triplets) = read_weights(text.as_bytes()).unwrap();
        assert_eq!(n, 3);
        assert_eq!(triplets, vec![(0, 1, 1.0), (1, 0, 1.0)]);
    }
}
