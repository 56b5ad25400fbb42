//! General object and food recognition.

use tracing::{info, warn};

use super::payload_seed;
use super::vision::{Sampling, VisionClient};
use crate::acquisition::CapturedImage;

pub const PROMPT: &str = "Analyze this image and tell me what you see. \
Please identify all objects and food items visible in the image, and describe their condition.";

const SIMULATED_NOTE: &str = "(Note: This is a simulated response since API connection failed. \
Please check your API key or connection.)";

const SIMULATED_DESCRIPTIONS: [&str; 4] = [
    "I can see a plate with what appears to be leftover pasta with tomato sauce. There are also some \
vegetables on the side, likely broccoli and carrots. The food looks partially eaten but still fresh.",
    "This image shows several food items on a kitchen counter. I can see fresh fruits including apples \
and bananas. There's also what appears to be a loaf of bread that's starting to look slightly stale \
around the edges.",
    "The image contains a bowl of soup or stew with visible vegetables and meat pieces. It appears to be \
freshly prepared and steaming. Next to it is a glass of water and some cutlery.",
    "I can see what looks like food waste in a bin. There are vegetable peels, some bread crusts, and \
what appears to be leftover rice. This would be classified as organic waste suitable for composting.",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recognition {
    pub description: String,
    pub simulated: bool,
}

pub fn simulate(image: &CapturedImage) -> Recognition {
    let idx = (payload_seed(image.data_uri()) % SIMULATED_DESCRIPTIONS.len() as u64) as usize;
    Recognition {
        description: format!("{}\n\n{}", SIMULATED_DESCRIPTIONS[idx], SIMULATED_NOTE),
        simulated: true,
    }
}

/// Describe `image`, simulating when the vision backend is unavailable.
pub async fn describe(client: &VisionClient, image: &CapturedImage) -> Recognition {
    let sampling = Sampling::new(0.5).with_top_p(1.0);
    match client.ask(PROMPT, image, sampling).await {
        Ok(description) => {
            info!(chars = description.len(), "image described");
            Recognition {
                description,
                simulated: false,
            }
        }
        Err(e) => {
            warn!(error = %e, "recognition failed, simulating");
            simulate(image)
        }
    }
}
