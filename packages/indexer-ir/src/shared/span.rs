use serde::{Deserialize, Serialize};

/// A 1-indexed, inclusive line range within a source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineSpan {
    pub start: usize,
    pub end: usize,
}

impl LineSpan {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn single(line: usize) -> Self {
        Self {
            start: line,
            end: line,
        }
    }

    pub fn line_count(&self) -> usize {
        self.end.saturating_sub(self.start) + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_count_inclusive() {
        assert_eq!(LineSpan::new(3, 5).line_count(), 3);
        assert_eq!(LineSpan::single(7).line_count(), 1);
    }
}
