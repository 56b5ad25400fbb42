//! Garbage detection: a yes/no question, then a description when the answer
//! is yes.

use tracing::info;

use super::vision::{ChatMessage, Sampling, VisionClient};
use crate::acquisition::CapturedImage;
use crate::error::PanelResult;

pub const CLASSIFY_PROMPT: &str = "DO YOU CLASSIFY THIS AS GARBAGE YES OR NO";
pub const DESCRIBE_PROMPT: &str = "DESCRIBE THE GARBAGE IN THE IMAGE";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GarbageVerdict {
    pub is_garbage: bool,
    /// The model's reply to the yes/no question.
    pub classification: String,
    /// Follow-up description, only requested for garbage.
    pub description: Option<String>,
}

/// A reply counts as garbage when it contains "yes" anywhere.
pub fn is_garbage(reply: &str) -> bool {
    reply.to_lowercase().contains("yes")
}

pub async fn classify(client: &VisionClient, image: &CapturedImage) -> PanelResult<GarbageVerdict> {
    let url = client.prepare_image(image)?;
    let question = ChatMessage::user_with_image(CLASSIFY_PROMPT, url);

    let classification = client
        .complete(std::slice::from_ref(&question), Sampling::new(0.5))
        .await?;
    let garbage = is_garbage(&classification);
    info!(is_garbage = garbage, "garbage classified");

    let description = if garbage {
        let conversation = [
            question,
            ChatMessage::assistant(classification.clone()),
            ChatMessage::user(DESCRIBE_PROMPT),
        ];
        Some(client.complete(&conversation, Sampling::new(0.7)).await?)
    } else {
        None
    };

    Ok(GarbageVerdict {
        is_garbage: garbage,
        classification,
        description,
    })
}
