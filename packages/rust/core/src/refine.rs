//! Chunk refinement chain.
//!
//! A fixed, ordered sequence of completion passes applied to one chunk's
//! text, each pass feeding the next. The passes are data, not control
//! flow, so adding, removing, or reordering them never touches the
//! orchestration. Modes:
//!
//! - `disabled` — chain skipped, text passes through untouched;
//! - `sample` — the chain runs as the identity, keeping pipeline runs
//!   deterministic without a live model;
//! - `model` — every pass issues a completion request; any failed pass
//!   aborts refinement for the chunk.

use tracing::{debug, instrument};

use docqa_shared::config::RefineMode;
use docqa_shared::Result;

use crate::completion::CompletionClient;

/// One named refinement pass. `{text}` in the template is replaced with
/// the previous pass's output.
pub struct RefinePass {
    pub name: &'static str,
    pub template: &'static str,
}

/// The refinement chain, in execution order.
pub const REFINE_PASSES: &[RefinePass] = &[
    RefinePass {
        name: "summarize",
        template: "Summarize the following documentation excerpt, keeping every \
                   technical detail intact:\n\n{text}",
    },
    RefinePass {
        name: "rewrite",
        template: "Rewrite the following text for clarity and a formal tone, \
                   preserving its meaning:\n\n{text}",
    },
    RefinePass {
        name: "gap-check",
        template: "Identify context a reader would be missing in the following \
                   text and restate the text with that context filled in:\n\n{text}",
    },
    RefinePass {
        name: "deduplicate",
        template: "Remove redundant or repeated content from the following text, \
                   keeping everything said only once:\n\n{text}",
    },
    RefinePass {
        name: "augment",
        template: "Add the domain knowledge a newcomer would need to understand \
                   the following text, staying strictly factual:\n\n{text}",
    },
];

/// Applies the refinement chain to chunk texts according to the configured
/// mode.
pub struct Refiner {
    mode: RefineMode,
    client: Option<CompletionClient>,
}

impl Refiner {
    /// Build a refiner. `client` is only consulted in `model` mode.
    pub fn new(mode: RefineMode, client: Option<CompletionClient>) -> Self {
        Self { mode, client }
    }

    /// Run the chain over one chunk's text.
    #[instrument(skip_all, fields(mode = ?self.mode, len = text.len()))]
    pub async fn refine(&self, text: &str) -> Result<String> {
        match self.mode {
            RefineMode::Disabled | RefineMode::Sample => Ok(text.to_string()),
            RefineMode::Model => self.run_chain(text).await,
        }
    }

    async fn run_chain(&self, text: &str) -> Result<String> {
        let client = self.client.as_ref().ok_or_else(|| {
            docqa_shared::DocqaError::config("refine mode is `model` but no completion client is configured")
        })?;

        let mut current = text.to_string();
        for pass in REFINE_PASSES {
            debug!(pass = pass.name, "running refinement pass");
            let prompt = pass.template.replace("{text}", &current);
            current = client.complete(&prompt).await?.require_answer()?;
        }
        Ok(current)
    }
}
