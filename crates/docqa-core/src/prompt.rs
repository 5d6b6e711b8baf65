//! Prompt assembly under a context budget.
//!
//! Layout: instruction preamble, retrieved passages in the order given
//! (separated by [`CHUNK_DELIMITER`]), then the question. When the whole
//! thing does not fit, trailing passages go first since retrieval hands
//! them over best-first.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::Chunk;

pub const CHUNK_DELIMITER: &str = "\n\n---\n\n";

const PREAMBLE: &str = "You are an assistant that answers questions using documents provided by the user.\n\
Instructions:\n\
- Use only the information in the document excerpts below.\n\
- If the excerpts do not contain the answer, say that you could not find it in the documents.\n\
- Be precise and objective.\n\
- Cite the source file name when possible.";

const NO_CONTEXT: &str = "No relevant document excerpts were found.";

/// How prompt size is counted against the budget.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TextMeasure {
    #[default]
    Chars,
    /// Rough token estimate: whitespace-separated words / 0.75.
    ApproxTokens,
}

impl TextMeasure {
    pub fn measure(&self, text: &str) -> usize {
        match self {
            Self::Chars => text.chars().count(),
            Self::ApproxTokens => {
                let words = text.split_whitespace().count();
                (words as f32 / 0.75).ceil() as usize
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptConfig {
    pub budget: usize,
    pub measure: TextMeasure,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self { budget: 6000, measure: TextMeasure::Chars }
    }
}

/// An assembled prompt and how many of the offered chunks made it in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub text: String,
    pub chunks_used: usize,
}

impl AsRef<str> for Prompt {
    fn as_ref(&self) -> &str {
        &self.text
    }
}

#[derive(Debug, Clone, Default)]
pub struct PromptAssembler {
    config: PromptConfig,
}

impl PromptAssembler {
    pub fn new(config: PromptConfig) -> Self {
        Self { config }
    }

    pub fn budget(&self) -> usize {
        self.config.budget
    }

    pub fn size_of(&self, text: &str) -> usize {
        self.config.measure.measure(text)
    }

    /// Builds the largest prompt that fits, keeping a prefix of `chunks`.
    pub fn assemble(&self, question: &str, chunks: &[Chunk]) -> Result<Prompt> {
        let budget = self.config.budget;
        for n in (0..=chunks.len()).rev() {
            let text = render(question, &chunks[..n]);
            let size = self.size_of(&text);
            if size <= budget {
                if n < chunks.len() {
                    tracing::debug!(kept = n, dropped = chunks.len() - n, size, budget, "trimmed context to fit budget");
                }
                return Ok(Prompt { text, chunks_used: n });
            }
        }
        Err(Error::PromptTooLarge { size: self.size_of(&render(question, &[])), budget })
    }
}

fn render(question: &str, chunks: &[Chunk]) -> String {
    let mut out = String::from(PREAMBLE);
    out.push_str("\n\nDocument excerpts:\n\n");
    if chunks.is_empty() {
        out.push_str(NO_CONTEXT);
    } else {
        let passages: Vec<String> = chunks
            .iter()
            .map(|c| format!("[{} #{}]\n{}", c.source, c.index, c.content))
            .collect();
        out.push_str(&passages.join(CHUNK_DELIMITER));
    }
    out.push_str("\n\nQuestion: ");
    out.push_str(question.trim());
    out.push_str("\n\nAnswer:");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DocumentFormat;

    fn chunk(index: usize, content: &str) -> Chunk {
        Chunk {
            id: format!("d:{index}"),
            doc_id: "d".into(),
            source: "notes.txt".into(),
            format: DocumentFormat::Text,
            index,
            total: 2,
            overlap: 0,
            content: content.into(),
        }
    }

    fn assembler(budget: usize) -> PromptAssembler {
        PromptAssembler::new(PromptConfig { budget, measure: TextMeasure::Chars })
    }

    #[test]
    fn includes_chunks_verbatim_in_order_then_question() {
        let a = assembler(10_000);
        let chunks = [chunk(0, "The capital of Brazil is Brasília."), chunk(1, "Rio is on the coast.")];
        let p = a.assemble("What is the capital of Brazil?", &chunks).unwrap();
        assert_eq!(p.chunks_used, 2);
        let first = p.text.find("The capital of Brazil is Brasília.").unwrap();
        let second = p.text.find("Rio is on the coast.").unwrap();
        let question = p.text.find("What is the capital of Brazil?").unwrap();
        assert!(first < second && second < question);
        assert!(p.text.contains(CHUNK_DELIMITER));
    }

    #[test]
    fn drops_low_relevance_tail_first() {
        let c1 = chunk(0, &"a".repeat(200));
        let c2 = chunk(1, &"b".repeat(200));
        let q = "question?";
        let fits_one = assembler(usize::MAX).size_of(&render(q, &[c1.clone()]));
        let a = assembler(fits_one + 10);
        let p = a.assemble(q, &[c1.clone(), c2]).unwrap();
        assert_eq!(p.chunks_used, 1);
        assert!(p.text.contains(&c1.content));
        assert!(!p.text.contains("bbbb"));
        assert!(a.size_of(&p.text) <= a.budget());
    }

    #[test]
    fn never_exceeds_budget() {
        let chunks: Vec<Chunk> = (0..8).map(|i| chunk(i, &"word ".repeat(20 * (i + 1)))).collect();
        let floor = assembler(usize::MAX).size_of(&render("q", &[]));
        for budget in (floor..floor + 4000).step_by(97) {
            let a = assembler(budget);
            let p = a.assemble("q", &chunks).unwrap();
            assert!(a.size_of(&p.text) <= budget, "budget {budget}");
        }
    }

    #[test]
    fn too_small_for_question_alone() {
        let a = assembler(10);
        let err = a.assemble("What is the capital of Brazil?", &[chunk(0, "x")]).unwrap_err();
        assert!(matches!(err, Error::PromptTooLarge { budget: 10, .. }));
    }

    #[test]
    fn approx_tokens_budget_is_respected() {
        let a = PromptAssembler::new(PromptConfig { budget: 120, measure: TextMeasure::ApproxTokens });
        let chunks: Vec<Chunk> = (0..5).map(|i| chunk(i, &"token ".repeat(30))).collect();
        let p = a.assemble("how many tokens?", &chunks).unwrap();
        assert!(p.chunks_used < chunks.len());
        assert!(TextMeasure::ApproxTokens.measure(&p.text) <= 120);
    }
}
