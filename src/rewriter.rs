//! Caption rewriting through a text-generation backend.

use async_trait::async_trait;
use tracing::{error, info, warn};

use crate::gemini::{GeminiClient, GeminiError};

/// Anything that can turn a prompt into a single blob of text.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, GeminiError>;
}

#[async_trait]
impl TextGenerator for GeminiClient {
    async fn generate(&self, prompt: &str) -> Result<String, GeminiError> {
        self.generate_text(prompt).await
    }
}

pub fn improvement_prompt(caption: &str) -> String {
    format!(
        r#"You are a professional content editor. Please improve the following text to make it:
- Clear and easy to understand
- Logically structured
- Engaging but professional
- Include relevant emojis (2-4 maximum, don't flood with emojis)
- Maintain the original meaning and key information
- Keep it concise but informative

Original text: "{caption}"

Please provide only the improved version without any explanations or additional text."#
    )
}

pub struct CaptionRewriter<G> {
    generator: G,
}

impl<G: TextGenerator> CaptionRewriter<G> {
    pub fn new(generator: G) -> Self {
        Self { generator }
    }

    /// Returns the improved caption, or `original` unchanged if generation
    /// fails for any reason.
    pub async fn rewrite(&self, original: &str) -> String {
        let prompt = improvement_prompt(original);

        match self.generator.generate(&prompt).await {
            Ok(text) => {
                let improved = text.trim();
                if improved.is_empty() {
                    warn!("Generator returned blank text, keeping original caption");
                    return original.to_string();
                }
                info!("✨ Caption improved successfully");
                improved.to_string()
            }
            Err(e) => {
                error!("❌ Error generating improved caption: {e}");
                original.to_string()
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::Mutex;

    /// Generator that replays a canned answer and records every prompt.
    pub struct FakeGenerator {
        answer: Result<String, String>,
        prompts: Mutex<Vec<String>>,
    }

    impl FakeGenerator {
        pub fn answering(text: &str) -> Self {
            Self { answer: Ok(text.to_string()), prompts: Mutex::new(Vec::new()) }
        }

        pub fn failing(message: &str) -> Self {
            Self { answer: Err(message.to_string()), prompts: Mutex::new(Vec::new()) }
        }

        pub fn prompts(&self) -> Vec<String> {
            self.prompts.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl TextGenerator for FakeGenerator {
        async fn generate(&self, prompt: &str) -> Result<String, GeminiError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            self.answer.clone().map_err(GeminiError::Http)
        }
    }

    #[async_trait]
    impl<G: TextGenerator> TextGenerator for std::sync::Arc<G> {
        async fn generate(&self, prompt: &str) -> Result<String, GeminiError> {
            (**self).generate(prompt).await
        }
    }
}
