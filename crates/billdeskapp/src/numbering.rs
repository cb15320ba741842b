//! Human-readable document numbers: `INV-001`, `REC-042`, `WAY-1000`.
//!
//! The numeric part is zero padded to the configured width but never
//! truncated, so `999` and `1000` format as `INV-999` and `INV-1000` with a
//! width of 3.

use crate::model::DocumentType;

pub const DEFAULT_PAD_WIDTH: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NumberFormat {
    pad_width: usize,
}

impl Default for NumberFormat {
    fn default() -> Self {
        Self {
            pad_width: DEFAULT_PAD_WIDTH,
        }
    }
}

impl NumberFormat {
    /// A width of 0 is treated as unset and falls back to [`DEFAULT_PAD_WIDTH`].
    pub fn new(pad_width: usize) -> Self {
        if pad_width == 0 {
            Self::default()
        } else {
            Self { pad_width }
        }
    }

    pub fn pad_width(&self) -> usize {
        self.pad_width
    }

    pub fn format(&self, doc_type: DocumentType, value: u64) -> String {
        format!(
            "{}-{:0width$}",
            doc_type.prefix(),
            value,
            width = self.pad_width
        )
    }

    /// Inverse of [`NumberFormat::format`]. Accepts any digit count, since
    /// numbers issued under a different pad width must still be recognised.
    pub fn parse(&self, number: &str) -> Option<(DocumentType, u64)> {
        let (prefix, digits) = number.split_once('-')?;
        let doc_type = DocumentType::from_prefix(prefix)?;
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        digits.parse().ok().map(|value| (doc_type, value))
    }
}
