//! Line-level Markdown structure shared by the index, the analyzers and the
//! lint rules: where the frontmatter block is, which lines are fenced code,
//! and conversions between char columns, byte offsets and client columns.

/// Position of a `---` delimited frontmatter block.
///
/// Line numbers are 0-based. `end` is the line of the closing delimiter, or
/// `None` when the block was never closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrontmatterBlock {
    pub start: usize,
    pub end: Option<usize>,
}

impl FrontmatterBlock {
    /// Whether `line` lies strictly between the delimiters. An unclosed block
    /// extends to the end of the document.
    pub fn contains_line(&self, line: usize) -> bool {
        line > self.start && self.end.map_or(true, |end| line < end)
    }

    /// Whether `line` is part of the block, delimiters included.
    pub fn covers_line(&self, line: usize) -> bool {
        line >= self.start && self.end.map_or(true, |end| line <= end)
    }
}

fn is_delimiter(line: &str) -> bool {
    line.trim_end() == "---"
}

/// Finds the frontmatter block. It must open on the first line.
pub fn locate_frontmatter(text: &str) -> Option<FrontmatterBlock> {
    let mut lines = text.lines();
    if !is_delimiter(lines.next()?.trim_start_matches('\u{feff}')) {
        return None;
    }

    let end = lines.position(is_delimiter).map(|offset| offset + 1);

    Some(FrontmatterBlock { start: 0, end })
}

fn fence_marker(line: &str) -> Option<&'static str> {
    let trimmed = line.trim_start();
    if trimmed.starts_with("```") {
        Some("```")
    } else if trimmed.starts_with("~~~") {
        Some("~~~")
    } else {
        None
    }
}

/// Iterates over `(line number, line)` for lines that hold prose: not in the
/// frontmatter and not inside fenced code blocks. Fence lines themselves are
/// skipped too.
pub fn content_lines(text: &str) -> impl Iterator<Item = (usize, &str)> {
    let frontmatter = locate_frontmatter(text);
    let mut open_fence: Option<&'static str> = None;

    text.lines().enumerate().filter(move |(line_nr, line)| {
        if frontmatter.is_some_and(|block| block.covers_line(*line_nr)) {
            return false;
        }

        match (open_fence, fence_marker(line)) {
            (Some(open), Some(marker)) if open == marker => {
                open_fence = None;
                false
            }
            (Some(_), _) => false,
            (None, Some(marker)) => {
                open_fence = Some(marker);
                false
            }
            (None, None) => true,
        }
    })
}

/// Byte offset of char column `column`, clamped to the end of the line.
pub fn byte_offset(line: &str, column: usize) -> usize {
    line.char_indices()
        .nth(column)
        .map(|(offset, _)| offset)
        .unwrap_or(line.len())
}

/// Char column of byte offset `offset`.
pub fn char_column(line: &str, offset: usize) -> usize {
    line[..offset.min(line.len())].chars().count()
}

/// The text of `line` up to char column `column`.
pub fn text_before(line: &str, column: usize) -> &str {
    &line[..byte_offset(line, column)]
}

/// How the client counts `Position::character`. Analysis always works in
/// chars, so client columns are converted at the protocol boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PositionEncoding {
    #[default]
    Utf16,
    Utf32,
}

impl PositionEncoding {
    /// Char column of client column `character` on `line`. A column inside
    /// a surrogate pair moves to the next char.
    pub fn char_column(self, line: &str, character: u32) -> usize {
        let character = character as usize;
        match self {
            PositionEncoding::Utf32 => character,
            PositionEncoding::Utf16 => {
                let mut units = 0;
                for (column, ch) in line.chars().enumerate() {
                    if units >= character {
                        return column;
                    }
                    units += ch.len_utf16();
                }
                line.chars().count()
            }
        }
    }

    /// Client column of char column `column` on `line`.
    pub fn client_column(self, line: &str, column: usize) -> u32 {
        match self {
            PositionEncoding::Utf32 => column as u32,
            PositionEncoding::Utf16 => line
                .chars()
                .take(column)
                .map(char::len_utf16)
                .sum::<usize>() as u32,
        }
    }
}
