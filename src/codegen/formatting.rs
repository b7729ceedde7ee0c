//! Notebook block model and rendering.

/// Token that prefixes every comment asking a human to check the generated code.
pub const REVIEW_MARKER: &str = "MANUAL-REVIEW";

const NOTEBOOK_HEADER: &str = "# Databricks notebook source";
const CELL_SEPARATOR: &str = "# COMMAND ----------";

/// Collapses every run of whitespace, line breaks included, into one space.
pub fn single_line(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Renders a review comment line.
pub fn review_comment(reason: &str) -> String {
    // Multi-line reasons would escape the comment.
    format!("# {}: {}", REVIEW_MARKER, single_line(reason))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    Markdown(Vec<String>),
    Code(Vec<String>),
}

impl Block {
    fn render(&self, out: &mut String) {
        match self {
            Block::Markdown(lines) => {
                out.push_str("# MAGIC %md\n");
                // Every physical line needs its own MAGIC prefix.
                for line in lines.iter().flat_map(|l| l.split('\n')) {
                    let line = line.trim_end_matches('\r');
                    if line.is_empty() {
                        out.push_str("# MAGIC\n");
                    } else {
                        out.push_str("# MAGIC ");
                        out.push_str(line);
                        out.push('\n');
                    }
                }
            }
            Block::Code(lines) => {
                for line in lines {
                    out.push_str(line);
                    out.push('\n');
                }
            }
        }
    }
}

/// An ordered list of cells.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Notebook {
    blocks: Vec<Block>,
}

impl Notebook {
    pub fn push(&mut self, block: Block) {
        self.blocks.push(block);
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        out.push_str(NOTEBOOK_HEADER);
        out.push('\n');
        for (i, block) in self.blocks.iter().enumerate() {
            if i > 0 {
                out.push('\n');
                out.push_str(CELL_SEPARATOR);
                out.push_str("\n\n");
            }
            block.render(&mut out);
        }
        out
    }
}
