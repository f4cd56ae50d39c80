use std::path::{Path, PathBuf};

/// Sequential output file names: `<dir>/<prefix><N>.png`, N from 0.
///
/// The index only advances on [`OutputNamer::advance`], so a failed save
/// does not leave a gap.
#[derive(Debug, Clone)]
pub struct OutputNamer {
    dir: PathBuf,
    prefix: String,
    next: u64,
}

impl OutputNamer {
    pub fn new(dir: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            prefix: prefix.into(),
            next: 0,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Index the next file will get.
    #[inline]
    pub fn next_index(&self) -> u64 {
        self.next
    }

    pub fn path_for(&self, index: u64) -> PathBuf {
        self.dir.join(format!("{}{index}.png", self.prefix))
    }

    /// Path for the next file, without consuming the index.
    pub fn peek(&self) -> PathBuf {
        self.path_for(self.next)
    }

    pub fn advance(&mut self) {
        self.next += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_are_sequential_without_padding() {
        let mut namer = OutputNamer::new("out", "output_");
        assert_eq!(namer.peek(), Path::new("out/output_0.png"));
        assert_eq!(namer.peek(), Path::new("out/output_0.png"));
        namer.advance();
        namer.advance();
        assert_eq!(namer.peek(), Path::new("out/output_2.png"));
        assert_eq!(namer.path_for(10), Path::new("out/output_10.png"));
    }
}
