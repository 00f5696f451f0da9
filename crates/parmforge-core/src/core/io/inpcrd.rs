use super::format::{FieldKind, FortranFormat, parse_real};
use super::traits::AmberFile;
use std::io::{self, BufRead};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum InpcrdError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Parse error on line {line}: {reason}")]
    Parse { line: usize, reason: String },
    #[error("Inconsistent data: {0}")]
    Inconsistency(String),
}

/// Box lengths (Å) and angles (degrees) from the last line of a restart file.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoxDimensions {
    pub lengths: [f64; 3],
    pub angles: [f64; 3],
}

/// Contents of an AMBER restart / coordinate file (inpcrd, rst7).
#[derive(Debug, Clone, PartialEq)]
pub struct RestartRecord {
    pub title: String,
    pub time: Option<f64>,
    /// Positions in Å.
    pub positions: Vec<[f64; 3]>,
    pub velocities: Option<Vec<[f64; 3]>>,
    pub box_dimensions: Option<BoxDimensions>,
}

impl RestartRecord {
    pub fn atom_count(&self) -> usize {
        self.positions.len()
    }
}

const COORDINATE_FORMAT: FortranFormat = FortranFormat {
    per_line: 6,
    kind: FieldKind::Real,
    width: 12,
};

fn triples(values: &[f64]) -> Vec<[f64; 3]> {
    values.chunks_exact(3).map(|c| [c[0], c[1], c[2]]).collect()
}

pub struct InpcrdFile;

impl AmberFile for InpcrdFile {
    type Record = RestartRecord;
    type Error = InpcrdError;

    fn read_from(reader: &mut impl BufRead) -> Result<RestartRecord, InpcrdError> {
        let mut lines = reader.lines();

        let title = lines
            .next()
            .transpose()?
            .ok_or_else(|| InpcrdError::Inconsistency("file is empty".into()))?
            .trim()
            .to_string();

        let header = lines.next().transpose()?.ok_or_else(|| InpcrdError::Parse {
            line: 2,
            reason: "missing atom count line".into(),
        })?;
        let mut tokens = header.split_whitespace();
        let atom_count: usize = tokens
            .next()
            .and_then(|t| t.parse().ok())
            .ok_or_else(|| InpcrdError::Parse {
                line: 2,
                reason: format!("invalid atom count in '{}'", header.trim()),
            })?;
        let time = tokens.next().and_then(parse_real);

        let mut rows: Vec<Vec<f64>> = Vec::new();
        for (offset, line) in lines.enumerate() {
            let line = line?;
            let row = COORDINATE_FORMAT
                .fields(&line)
                .into_iter()
                .map(|field| {
                    parse_real(field).ok_or_else(|| InpcrdError::Parse {
                        line: offset + 3,
                        reason: format!("invalid coordinate '{field}'"),
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;
            if !row.is_empty() {
                rows.push(row);
            }
        }

        let coordinate_len = atom_count.checked_mul(3).ok_or_else(|| InpcrdError::Parse {
            line: 2,
            reason: format!("atom count {atom_count} is too large"),
        })?;
        let block_lines = coordinate_len.div_ceil(COORDINATE_FORMAT.per_line);
        if rows.len() < block_lines {
            return Err(InpcrdError::Inconsistency(format!(
                "expected {coordinate_len} coordinates for {atom_count} atoms, found {}",
                rows.iter().map(Vec::len).sum::<usize>()
            )));
        }
        let (coordinate_rows, rest) = rows.split_at(block_lines);
        let coordinates = coordinate_rows.concat();
        if coordinates.len() != coordinate_len {
            return Err(InpcrdError::Inconsistency(format!(
                "expected {coordinate_len} coordinates for {atom_count} atoms, found {}",
                coordinates.len()
            )));
        }

        // Velocities fill whole lines like the coordinates; the box is one
        // final line of 3 or 6 values.
        let is_velocity_block = |block: &[Vec<f64>]| {
            block.len() == block_lines && block.iter().map(Vec::len).sum::<usize>() == coordinate_len
        };
        let is_box_line = |row: &[f64]| matches!(row.len(), 3 | 6);
        let (velocities, box_values): (Option<Vec<f64>>, &[f64]) = match rest {
            [] => (None, &[]),
            _ if is_velocity_block(rest) => (Some(rest.concat()), &[]),
            [block @ .., last] if is_velocity_block(block) && is_box_line(last.as_slice()) => {
                (Some(block.concat()), last.as_slice())
            }
            [last] if is_box_line(last.as_slice()) => (None, last.as_slice()),
            _ => {
                let n: usize = rest.iter().map(Vec::len).sum();
                return Err(InpcrdError::Inconsistency(format!(
                    "{n} trailing values after coordinates do not form velocities or a box"
                )));
            }
        };

        let box_dimensions = match box_values {
            [a, b, c] => Some(BoxDimensions {
                lengths: [*a, *b, *c],
                angles: [90.0; 3],
            }),
            [a, b, c, alpha, beta, gamma] => Some(BoxDimensions {
                lengths: [*a, *b, *c],
                angles: [*alpha, *beta, *gamma],
            }),
            _ => None,
        };

        Ok(RestartRecord {
            title,
            time,
            positions: triples(&coordinates),
            velocities: velocities.as_deref().map(triples),
            box_dimensions,
        })
    }
}
