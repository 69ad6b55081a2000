//! Separator detection for chunking

use unicode_segmentation::UnicodeSegmentation;

/// Separator granularities, coarsest first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SeparatorLevel {
    /// Blank line between paragraphs
    Paragraph = 0,
    /// Single line break
    Line = 1,
    /// Unicode sentence boundary
    Sentence = 2,
    /// Start of a word after whitespace
    Whitespace = 3,
    /// Any character (always succeeds)
    Character = 4,
}

impl SeparatorLevel {
    /// The next finer level, or `None` at character level
    pub fn finer(self) -> Option<Self> {
        match self {
            SeparatorLevel::Paragraph => Some(SeparatorLevel::Line),
            SeparatorLevel::Line => Some(SeparatorLevel::Sentence),
            SeparatorLevel::Sentence => Some(SeparatorLevel::Whitespace),
            SeparatorLevel::Whitespace => Some(SeparatorLevel::Character),
            SeparatorLevel::Character => None,
        }
    }
}

/// Character-indexed view over a text with precomputed break positions.
///
/// All positions are character offsets. Break positions are strictly inside
/// the text (never 0 or `len`), sorted and unique.
#[derive(Debug)]
pub struct TextIndex<'a> {
    text: &'a str,
    /// Byte offset of every char, plus `text.len()` as sentinel
    byte_offsets: Vec<usize>,
    paragraphs: Vec<usize>,
    lines: Vec<usize>,
    sentences: Vec<usize>,
    words: Vec<usize>,
}

impl<'a> TextIndex<'a> {
    pub fn new(text: &'a str) -> Self {
        let mut byte_offsets: Vec<usize> = text.char_indices().map(|(i, _)| i).collect();
        byte_offsets.push(text.len());

        let mut index = Self {
            text,
            byte_offsets,
            paragraphs: Vec::new(),
            lines: Vec::new(),
            sentences: Vec::new(),
            words: Vec::new(),
        };

        let paragraphs: Vec<usize> = text
            .match_indices("\n\n")
            .map(|(i, sep)| index.char_at_byte(i + sep.len()))
            .collect();
        let lines: Vec<usize> = text
            .match_indices('\n')
            .map(|(i, _)| index.char_at_byte(i + 1))
            .collect();
        let sentences: Vec<usize> = text
            .split_sentence_bound_indices()
            .map(|(i, _)| index.char_at_byte(i))
            .collect();

        let mut words = Vec::new();
        let mut prev_ws = false;
        for (pos, c) in text.chars().enumerate() {
            let ws = c.is_whitespace();
            if prev_ws && !ws {
                words.push(pos);
            }
            prev_ws = ws;
        }

        index.paragraphs = index.interior(paragraphs);
        index.lines = index.interior(lines);
        index.sentences = index.interior(sentences);
        index.words = index.interior(words);
        index
    }

    /// Number of characters in the text
    pub fn len(&self) -> usize {
        self.byte_offsets.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Slice by character offsets
    pub fn slice(&self, start: usize, end: usize) -> &'a str {
        &self.text[self.byte_offsets[start]..self.byte_offsets[end]]
    }

    /// Break positions of `level` strictly inside `(start, end)`
    pub fn breaks_within(&self, level: SeparatorLevel, start: usize, end: usize) -> Vec<usize> {
        if level == SeparatorLevel::Character {
            return ((start + 1)..end).collect();
        }
        let positions = self.positions(level);
        let from = positions.partition_point(|&p| p <= start);
        let to = positions.partition_point(|&p| p < end);
        positions[from..to].to_vec()
    }

    /// Word starts in the window `[start, end]`, earliest first
    pub fn word_starts_between(&self, start: usize, end: usize) -> &[usize] {
        let from = self.words.partition_point(|&p| p < start);
        let to = self.words.partition_point(|&p| p <= end);
        &self.words[from..to]
    }

    fn positions(&self, level: SeparatorLevel) -> &[usize] {
        match level {
            SeparatorLevel::Paragraph => &self.paragraphs,
            SeparatorLevel::Line => &self.lines,
            SeparatorLevel::Sentence => &self.sentences,
            SeparatorLevel::Whitespace | SeparatorLevel::Character => &self.words,
        }
    }

    fn char_at_byte(&self, byte: usize) -> usize {
        // Separators always end on a char boundary
        self.byte_offsets.partition_point(|&b| b < byte)
    }

    fn interior(&self, mut positions: Vec<usize>) -> Vec<usize> {
        let len = self.len();
        positions.retain(|&p| p > 0 && p < len);
        positions.sort_unstable();
        positions.dedup();
        positions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_ordering() {
        assert!(SeparatorLevel::Paragraph < SeparatorLevel::Line);
        assert!(SeparatorLevel::Sentence < SeparatorLevel::Whitespace);
        assert_eq!(SeparatorLevel::Character.finer(), None);
        assert_eq!(
            SeparatorLevel::Paragraph.finer(),
            Some(SeparatorLevel::Line)
        );
    }

    #[test]
    fn test_paragraph_and_line_breaks() {
        let index = TextIndex::new("one\n\ntwo\nthree");
        assert_eq!(index.breaks_within(SeparatorLevel::Paragraph, 0, index.len()), vec![5]);
        assert_eq!(
            index.breaks_within(SeparatorLevel::Line, 0, index.len()),
            vec![4, 5, 9]
        );
    }

    #[test]
    fn test_sentence_breaks() {
        let index = TextIndex::new("First one. Second one. Third.");
        let breaks = index.breaks_within(SeparatorLevel::Sentence, 0, index.len());
        assert_eq!(breaks, vec![11, 23]);
    }

    #[test]
    fn test_multibyte_offsets_are_chars() {
        let index = TextIndex::new("héllo wörld");
        assert_eq!(index.len(), 11);
        assert_eq!(index.breaks_within(SeparatorLevel::Whitespace, 0, 11), vec![6]);
        assert_eq!(index.slice(6, 11), "wörld");
    }

    #[test]
    fn test_character_level_covers_every_position() {
        let index = TextIndex::new("abcd");
        assert_eq!(index.breaks_within(SeparatorLevel::Character, 0, 4), vec![1, 2, 3]);
        assert_eq!(index.breaks_within(SeparatorLevel::Character, 1, 3), vec![2]);
    }
}
