//! Expiry date extraction from product photos.

use tracing::info;

use super::vision::{Sampling, VisionClient};
use crate::acquisition::CapturedImage;
use crate::error::PanelResult;

pub const DEFAULT_PROMPT: &str = "Analyze the provided image or text and identify the expiry date. \
Return the expiry date in a standard format (e.g., MM/DD/YYYY or DD-MM-YYYY) if present. \
If no expiry date is found, indicate that it is not available or unclear. \
Ignore any irrelevant dates or numbers that do not explicitly relate to an expiration.";

/// Ask for the expiry date. A blank `prompt` uses [`DEFAULT_PROMPT`].
pub async fn read_expiry(
    client: &VisionClient,
    image: &CapturedImage,
    prompt: Option<&str>,
) -> PanelResult<String> {
    let prompt = prompt
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .unwrap_or(DEFAULT_PROMPT);
    let answer = client.ask(prompt, image, Sampling::new(0.7)).await?;
    info!(chars = answer.len(), "expiry date read");
    Ok(answer)
}
