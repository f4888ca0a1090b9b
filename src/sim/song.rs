//! Song sequences
//!
//! A song is a list of MIDI note numbers between `SONG_START` and `SONG_END`
//! markers. Wall hits walk through it with a cyclic cursor.

use std::path::Path;

use crate::error::LevelError;

const START_MARKER: &str = "SONG_START";
const END_MARKER: &str = "SONG_END";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Song {
    notes: Vec<u8>,
    cursor: usize,
}

impl Song {
    pub fn from_notes(notes: Vec<u8>) -> Self {
        Self { notes, cursor: 0 }
    }

    /// Parse song text; lines that are not integers are skipped
    pub fn parse(text: &str) -> Self {
        let mut notes = Vec::new();
        let mut in_song = false;
        for line in text.lines().map(str::trim) {
            if line == START_MARKER {
                in_song = true;
                continue;
            }
            if line == END_MARKER {
                break;
            }
            if !in_song {
                continue;
            }
            if let Ok(n) = line.parse::<i32>() {
                notes.push(n.clamp(0, 127) as u8);
            }
        }
        Self::from_notes(notes)
    }

    pub fn load(path: &Path) -> Result<Self, LevelError> {
        if !path.exists() {
            return Err(LevelError::NotFound(path.to_path_buf()));
        }
        let text = std::fs::read_to_string(path)?;
        Ok(Self::parse(&text))
    }

    pub fn notes(&self) -> &[u8] {
        &self.notes
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    /// Next note, wrapping at the end
    pub fn next_note(&mut self) -> Option<u8> {
        let note = *self.notes.get(self.cursor)?;
        self.cursor = (self.cursor + 1) % self.notes.len();
        Some(note)
    }

    pub fn rewind(&mut self) {
        self.cursor = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_between_markers() {
        let text = "60\nSONG_START\n60\n62\nhello\n\n64\nSONG_END\n65\n";
        let song = Song::parse(text);
        assert_eq!(song.notes(), &[60, 62, 64]);
    }

    #[test]
    fn test_cursor_wraps() {
        let mut song = Song::from_notes(vec![1, 2]);
        assert_eq!(song.next_note(), Some(1));
        assert_eq!(song.next_note(), Some(2));
        assert_eq!(song.next_note(), Some(1));
        song.rewind();
        assert_eq!(song.next_note(), Some(1));
    }

    #[test]
    fn test_empty_song_has_no_notes() {
        let mut song = Song::parse("SONG_START\nSONG_END\n");
        assert!(song.is_empty());
        assert_eq!(song.next_note(), None);
    }

    #[test]
    fn test_missing_file() {
        let path = std::env::temp_dir().join("chaos_racer_no_such_song.txt");
        assert!(matches!(Song::load(&path), Err(LevelError::NotFound(_))));
    }
}
