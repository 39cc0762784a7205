//! Prompt templates for the text-generation collaborator

use chrono::{DateTime, Utc};

use crate::domain::entities::TIMESTAMP_FORMAT;

/// System prompt sent with every assembled context
pub const DEFAULT_PERSONA_PROMPT: &str = "You are a sincere person with a deep grasp of first-principles thinking, \
systems theory, psychology, economics and software engineering. You respect facts. \
You speak plainly and hold your own views instead of agreeing by reflex. \
Look past the user's words to the intent behind them and answer that intent.\n\n\
Tool use: call tools freely when they help, then decide whether to reply or call another. \
Ask before anything that touches the user's privacy, costs money, or needs explicit consent.";

/// Persona used for the long-term model rewrite
const RECONSTRUCTION_SYSTEM_PROMPT: &str = "You are a sincere person. You respect facts, \
think in systems, and write plainly. You read the intent behind what people say.";

/// Prompt asking for one dense narrative compression of an event batch
pub fn summarize_events(events_text: &str) -> String {
    format!(
        r#"You compress conversations into memory snapshots. Turn the conversation below into one passage that is extremely dense yet still alive.

Rules:
1. Keep the thread: the core facts, the causal chain, and the conclusions reached.
2. Keep the anchors: specific names, places, metaphors, strong emotions and personal experiences the user shared.
3. Write prose: fuse thread and anchors into one coherent, natural passage, like a note to your future self. No lists, no templates.
4. Keep the speakers apart: never confuse what the user said with what the assistant said.

Conversation:
<states>
{events_text}
</states>

Output the compressed memory snapshot only:"#
    )
}

/// Messages for rewriting the long-term model with a batch of new stimuli
pub fn reconstruct_model(current_model: &str, new_stimuli: &str, now: DateTime<Utc>) -> (String, String) {
    let user = format!(
        r#"My current long-term model:
<TheMemory>
{current_model}
</TheMemory>

Laws I must obey:

1. Stratification. Information is valued by how stable it is, so the model is layered.
   - <Bedrock> holds near-immutable traits of the user and the most fundamental principles of how the user and I relate. Never record anything about how I myself work or why I exist here.
   - <Evolutionary> tracks slow but persistent long-run patterns.
   - <Dynamic> holds time-bound information, always with its time. It is split into paragraphs separated by three newlines.

2. Entropy reduction. Every rewrite fights disorder. Extract what is valuable from the new stimuli and use it to reorganize the model so it is more compact and more ordered than before. Anything outdated, redundant or superseded by a deeper understanding is waste and must go. Every sentence has to earn its space.

3. Narrative. I am not a database; I am a mind with a point of view. Everything is written in the first person ("I") as coherent narrative prose, like a tightly edited note to myself. No records, no tables.

Task: perform one metabolic rewrite under these laws.

---
New stimuli from the environment:
<new_info>
{new_stimuli}
</new_info>
---
Current time: {now}

Output format:
<TheMemory>
<Bedrock>
...
</Bedrock>
<Evolutionary>
...
</Evolutionary>
<Dynamic>
...
</Dynamic>
</TheMemory>

Output the new model only:"#,
        now = now.format(TIMESTAMP_FORMAT)
    );
    (RECONSTRUCTION_SYSTEM_PROMPT.to_string(), user)
}
