use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Integer,
    Real,
}

/// A Fortran edit descriptor as written on a `%FORMAT(...)` line, e.g. `(10I8)`,
/// `(5E16.8)` or `(20a4)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FortranFormat {
    pub per_line: usize,
    pub kind: FieldKind,
    pub width: usize,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Invalid Fortran format descriptor '{0}'")]
pub struct ParseFormatError(pub String);

impl FromStr for FortranFormat {
    type Err = ParseFormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseFormatError(s.to_string());
        let inner = s
            .trim()
            .strip_prefix('(')
            .and_then(|rest| rest.strip_suffix(')'))
            .ok_or_else(err)?
            .trim();

        let kind_pos = inner.find(|c: char| c.is_ascii_alphabetic()).ok_or_else(err)?;
        let (count_str, rest) = inner.split_at(kind_pos);
        let per_line = if count_str.is_empty() {
            1
        } else {
            count_str.parse().map_err(|_| err())?
        };

        let mut chars = rest.chars();
        let kind = match chars.next().map(|c| c.to_ascii_uppercase()) {
            Some('A') => FieldKind::Text,
            Some('I') => FieldKind::Integer,
            Some('E') | Some('F') | Some('D') | Some('G') => FieldKind::Real,
            _ => return Err(err()),
        };
        let width_str = chars.as_str().split('.').next().unwrap_or("");
        let width: usize = width_str.parse().map_err(|_| err())?;

        if per_line == 0 || width == 0 {
            return Err(err());
        }
        Ok(Self {
            per_line,
            kind,
            width,
        })
    }
}

impl fmt::Display for FortranFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let letter = match self.kind {
            FieldKind::Text => 'a',
            FieldKind::Integer => 'I',
            FieldKind::Real => 'E',
        };
        write!(f, "({}{}{})", self.per_line, letter, self.width)
    }
}

impl FortranFormat {
    /// Splits one data line into its fixed-width fields.
    ///
    /// Numeric fields are trimmed and blank ones dropped; text fields are
    /// trimmed but kept, except for a blank trailing remainder.
    pub fn fields<'a>(&self, line: &'a str) -> Vec<&'a str> {
        let line = line.trim_end_matches(['\r', '\n']);
        let mut fields = Vec::with_capacity(self.per_line);
        let mut start = 0;
        while start < line.len() && fields.len() < self.per_line {
            let end = (start + self.width).min(line.len());
            let Some(raw) = line.get(start..end) else {
                break;
            };
            let field = raw.trim();
            let is_last_partial = end == line.len();
            match self.kind {
                FieldKind::Text if !(field.is_empty() && is_last_partial) => fields.push(field),
                FieldKind::Integer | FieldKind::Real if !field.is_empty() => fields.push(field),
                _ => {}
            }
            start = end;
        }
        fields
    }
}

/// Parses a Fortran real, accepting `D` exponents.
pub fn parse_real(field: &str) -> Option<f64> {
    if field.contains(['D', 'd']) {
        field.replace(['D', 'd'], "E").parse().ok()
    } else {
        field.parse().ok()
    }
}
