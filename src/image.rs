//! Loadable binary images.
//!
//! An image is a text file holding one 16-character line of `0`/`1` per word, most
//! significant bit first. The first line is the load origin, the rest are consecutive words.

use std::fmt;
use std::path::Path;

use crate::bits::word_to_bin;
use crate::state::{Machine, DEVICE_SPACE};

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Image {
    pub origin: u16,
    pub words: Vec<u16>,
}

/// Error reading or installing an image. Memory is never modified when one is returned.
#[derive(Debug)]
pub enum LoadError {
    Io(std::io::Error),
    Empty,
    /// 1-based line number.
    Format { line: usize },
    OutOfRange { origin: u16, len: usize },
}

impl std::error::Error for LoadError {}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(error) => write!(f, "File error: {error}"),
            Self::Empty => write!(f, "Format error: image has no origin line"),
            Self::Format { line } => write!(
                f,
                "Format error at line {line}: expected 16 binary digits"
            ),
            Self::OutOfRange { origin, len } => write!(
                f,
                "Illegal memory space: {len} word(s) at 0x{origin:04x} reach past 0x{DEVICE_SPACE:04x}"
            ),
        }
    }
}

impl From<std::io::Error> for LoadError {
    fn from(error: std::io::Error) -> Self {
        Self::Io(error)
    }
}

fn bin_to_word(line: &str) -> Option<u16> {
    if line.len() != 16 {
        return None;
    }
    let mut word = 0u16;
    for ch in line.chars() {
        word <<= 1;
        match ch {
            '0' => (),
            '1' => word |= 1,
            _ => return None,
        }
    }
    Some(word)
}

impl Image {
    pub fn new(origin: u16, words: Vec<u16>) -> Self {
        Self { origin, words }
    }

    pub fn parse(text: &str) -> Result<Self, LoadError> {
        // Trailing blank lines are common in hand-edited files
        let lines: Vec<&str> = text.lines().collect();
        let end = lines
            .iter()
            .rposition(|line| !line.is_empty())
            .ok_or(LoadError::Empty)?;

        let mut words = lines[..=end]
            .iter()
            .enumerate()
            .map(|(i, line)| bin_to_word(line).ok_or(LoadError::Format { line: i + 1 }));

        let origin = words.next().ok_or(LoadError::Empty)??;
        let words = words.collect::<Result<Vec<_>, _>>()?;
        Ok(Self { origin, words })
    }

    pub fn read(path: impl AsRef<Path>) -> Result<Self, LoadError> {
        let text = std::fs::read_to_string(path)?;
        Self::parse(&text)
    }

    /// Address one past the last word.
    pub fn end(&self) -> usize {
        self.origin as usize + self.words.len()
    }

    /// Copy words into memory, only if every word lands below the device page.
    pub fn load_into(&self, machine: &mut Machine) -> Result<(), LoadError> {
        if self.end() > DEVICE_SPACE as usize {
            return Err(LoadError::OutOfRange {
                origin: self.origin,
                len: self.words.len(),
            });
        }
        let start = self.origin as usize;
        machine.mem[start..self.end()].copy_from_slice(&self.words);
        Ok(())
    }

    /// Render in the loadable text format, one line per word including the origin.
    pub fn to_text(&self) -> String {
        let mut text = String::with_capacity((self.words.len() + 1) * 17);
        for word in std::iter::once(self.origin).chain(self.words.iter().copied()) {
            text.push_str(&word_to_bin(word));
            text.push('\n');
        }
        text
    }

    pub fn write(&self, path: impl AsRef<Path>) -> Result<(), LoadError> {
        std::fs::write(path, self.to_text())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_origin_and_words() {
        let image = Image::parse("0011000000000000\n0001000000100001\r\n1111000000100101\n\n").unwrap();
        assert_eq!(image.origin, 0x3000);
        assert_eq!(image.words, vec![0x1021, 0xF025]);
        assert_eq!(Image::parse(&image.to_text()).unwrap(), image);
    }

    #[test]
    fn rejects_bad_characters() {
        let error = Image::parse("0011000000000000\n00010000002000a1\n").unwrap_err();
        assert!(matches!(error, LoadError::Format { line: 2 }));
        let error = Image::parse("0011000000000000\n000100\n").unwrap_err();
        assert!(matches!(error, LoadError::Format { line: 2 }));
        let error = Image::parse("0011000000000000 \n0001000000100001\t\n").unwrap_err();
        assert!(matches!(error, LoadError::Format { line: 1 }));
        let image = Image::parse("0011000000000000\r\n0001000000100001\r\n\n").unwrap();
        assert_eq!(image.words, vec![0x1021]);
        assert!(matches!(Image::parse("\n\n").unwrap_err(), LoadError::Empty));
    }

    #[test]
    fn out_of_range_leaves_memory_untouched() {
        let mut machine = Machine::new();
        let image = Image::new(0xFDFE, vec![0x1111, 0x2222, 0x3333]);
        let error = image.load_into(&mut machine).unwrap_err();
        assert!(matches!(error, LoadError::OutOfRange { origin: 0xFDFE, len: 3 }));
        assert_eq!(machine.mem(0xFDFE), 0);
        assert_eq!(machine.mem(0xFDFF), 0);

        // Exactly filling user memory is allowed
        let image = Image::new(0xFDFE, vec![0x1111, 0x2222]);
        image.load_into(&mut machine).unwrap();
        assert_eq!(machine.mem(0xFDFF), 0x2222);
    }
}
