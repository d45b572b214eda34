//! Markdown chunking bounded by a max chunk length (spec §4.3 step 2).

const DEFAULT_MAX_CHUNK_CHARS: usize = 1800;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub text: String,
    pub index: usize,
}

pub struct MarkdownChunker {
    max_chunk_chars: usize,
}

impl Default for MarkdownChunker {
    fn default() -> Self {
        Self { max_chunk_chars: DEFAULT_MAX_CHUNK_CHARS }
    }
}

impl MarkdownChunker {
    pub fn with_max_chars(max_chunk_chars: usize) -> Self {
        Self { max_chunk_chars }
    }

    /// Splits on blank-line paragraph boundaries, then greedily packs
    /// paragraphs into chunks up to `max_chunk_chars`. A single paragraph
    /// longer than the limit becomes its own oversized chunk rather than
    /// being cut mid-sentence.
    pub fn chunk(&self, markdown: &str) -> Vec<Chunk> {
        let paragraphs: Vec<&str> =
            markdown.split("\n\n").map(str::trim).filter(|p| !p.is_empty()).collect();

        if paragraphs.is_empty() {
            return Vec::new();
        }

        let mut chunks = Vec::new();
        let mut current = String::new();

        for paragraph in paragraphs {
            let would_be = if current.is_empty() {
                paragraph.len()
            } else {
                current.len() + 2 + paragraph.len()
            };

            if would_be > self.max_chunk_chars && !current.is_empty() {
                chunks.push(std::mem::take(&mut current));
            }

            if current.is_empty() {
                current.push_str(paragraph);
            } else {
                current.push_str("\n\n");
                current.push_str(paragraph);
            }
        }
        if !current.is_empty() {
            chunks.push(current);
        }

        chunks
            .into_iter()
            .enumerate()
            .map(|(index, text)| Chunk { text, index })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_short_paragraph_is_one_chunk() {
        let chunker = MarkdownChunker::default();
        let chunks = chunker.chunk("Hello world.");
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].index, 0);
    }

    #[test]
    fn packs_paragraphs_up_to_the_limit() {
        let chunker = MarkdownChunker::with_max_chars(20);
        let markdown = "one two\n\nthree four\n\nfive six seven eight";
        let chunks = chunker.chunk(markdown);
        assert!(chunks.len() >= 2, "should split once the cap is exceeded");
        for chunk in &chunks {
            assert!(!chunk.text.is_empty());
        }
    }

    #[test]
    fn oversized_single_paragraph_is_not_split() {
        let chunker = MarkdownChunker::with_max_chars(10);
        let long = "a".repeat(50);
        let chunks = chunker.chunk(&long);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, long);
    }

    #[test]
    fn empty_input_yields_no_chunks() {
        let chunker = MarkdownChunker::default();
        assert!(chunker.chunk("   \n\n  ").is_empty());
    }
}
