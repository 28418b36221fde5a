use unicode_segmentation::UnicodeSegmentation;

/// Rough words-per-token ratio for English prose
const WORDS_PER_TOKEN: f64 = 0.75;

/// A slice of the source document sent as one completion request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub index: usize,
    pub text: String,
    pub word_count: usize,
}

/// Sliding-window splitter over Unicode words.
///
/// Chunks are cut from the original text at word boundaries, so markdown
/// formatting inside a chunk survives. Consecutive chunks share `overlap`
/// words.
#[derive(Debug, Clone)]
pub struct Chunker {
    window: usize,
    overlap: usize,
}

impl Chunker {
    pub fn new(chunk_token_threshold: usize, overlap_rate: f64) -> Self {
        let window = ((chunk_token_threshold as f64) * WORDS_PER_TOKEN).floor() as usize;
        let window = window.max(1);
        let overlap = ((window as f64) * overlap_rate.clamp(0.0, 0.5)).floor() as usize;
        // overlap must stay below the window or the split never advances
        let overlap = overlap.min(window - 1);
        Chunker { window, overlap }
    }

    pub fn window(&self) -> usize {
        self.window
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }

    pub fn chunk(&self, text: &str) -> Vec<Chunk> {
        if text.trim().is_empty() {
            return Vec::new();
        }

        let words: Vec<(usize, &str)> = text.unicode_word_indices().collect();
        let total = words.len();

        if total <= self.window {
            return vec![Chunk {
                index: 0,
                text: text.trim().to_string(),
                word_count: total,
            }];
        }

        let mut chunks = Vec::new();
        let mut start = 0;
        loop {
            let end = (start + self.window).min(total);
            // markup between two words travels with the following chunk
            let byte_start = if start == 0 {
                0
            } else {
                word_end(words[start - 1])
            };
            let byte_end = if end == total {
                text.len()
            } else {
                word_end(words[end - 1])
            };

            chunks.push(Chunk {
                index: chunks.len(),
                text: text[byte_start..byte_end].trim().to_string(),
                word_count: end - start,
            });

            if end == total {
                break;
            }
            start = end - self.overlap;
        }

        chunks
    }
}

fn word_end((offset, word): (usize, &str)) -> usize {
    offset + word.len()
}
