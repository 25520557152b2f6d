use serde::Deserialize;

/// One line of an append-only transcript file. Only `assistant` and `human`
/// lines carry data this crate cares about; everything else is skipped.
#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
#[serde(rename_all = "lowercase")]
pub(crate) enum TranscriptLine {
    Assistant(AssistantLine),
    Human(HumanLine),
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AssistantLine {
    pub message: AssistantMessage,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AssistantMessage {
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub usage: Option<RawUsage>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawUsage {
    #[serde(default)]
    pub input_tokens: u64,
    #[serde(default)]
    pub output_tokens: u64,
    #[serde(default)]
    pub cache_read_input_tokens: u64,
    #[serde(default)]
    pub cache_creation_input_tokens: u64,
}

#[derive(Debug, Deserialize)]
pub(crate) struct HumanLine {
    pub message: HumanMessage,
}

#[derive(Debug, Deserialize)]
pub(crate) struct HumanMessage {
    pub content: HumanContent,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum HumanContent {
    Text(String),
    Blocks(Vec<serde_json::Value>),
}

impl HumanContent {
    pub fn as_text(&self) -> String {
        match self {
            HumanContent::Text(s) => s.clone(),
            HumanContent::Blocks(blocks) => blocks
                .iter()
                .filter_map(|b| b.get("text").and_then(|t| t.as_str()))
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }
}
