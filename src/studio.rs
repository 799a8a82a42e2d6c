use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn, error};

use crate::gemini::{preview, ContentRequest, GenerationConfig, GenerativeBackend, Modality, Part};
use crate::models::{Captions, EncodedImagePart, GeneratedPosts, ProductDetails};
use crate::prompts::{caption_prompt, caption_schema, visual_prompt, RECOGNITION_PROMPT};

#[derive(Debug, Error, PartialEq)]
pub enum StudioError {
    #[error("no product image provided")]
    NoImages,
    #[error("caption generation failed: {0}")]
    Generation(String),
}

/// Orchestrates recognition, captions and the visual post over a backend.
pub struct PostStudio {
    backend: Arc<dyn GenerativeBackend>,
    text_model: String,
    image_model: String,
}

impl PostStudio {
    pub fn new(backend: Arc<dyn GenerativeBackend>, text_model: impl Into<String>, image_model: impl Into<String>) -> Self {
        Self { backend, text_model: text_model.into(), image_model: image_model.into() }
    }

    /// Best-effort product name for the first image. Never fails: any
    /// problem yields an empty string.
    pub async fn recognize_product(&self, images: &[EncodedImagePart]) -> String {
        let Some(first) = images.first() else {
            return String::new();
        };
        let request = ContentRequest {
            model: self.text_model.clone(),
            parts: vec![Part::image(first), Part::text(RECOGNITION_PROMPT)],
            generation_config: None,
        };
        match self.backend.generate_content(request).await {
            Ok(response) => {
                let name = response.text().map(|t| t.trim().to_string()).unwrap_or_default();
                info!("🔎 Recognized product: {:?}", name);
                name
            }
            Err(e) => {
                warn!("⚠️ Product recognition failed: {}", e);
                String::new()
            }
        }
    }

    pub async fn generate_captions(&self, images: &[EncodedImagePart], details: &ProductDetails) -> Result<Captions, StudioError> {
        let mut parts: Vec<Part> = images.iter().map(Part::image).collect();
        parts.push(Part::text(caption_prompt(details)));

        let request = ContentRequest {
            model: self.text_model.clone(),
            parts,
            generation_config: Some(GenerationConfig {
                response_mime_type: Some("application/json".into()),
                response_schema: Some(caption_schema()),
                ..Default::default()
            }),
        };

        let response = self.backend.generate_content(request).await
            .map_err(|e| StudioError::Generation(e.to_string()))?;
        let text = response.text()
            .ok_or_else(|| StudioError::Generation("no text in caption response".into()))?;
        let json_text = text.trim();

        serde_json::from_str::<Captions>(json_text).map_err(|e| {
            error!("❌ Caption response was not the expected JSON ({}): {}", e, preview(json_text));
            StudioError::Generation(format!("malformed caption JSON: {}", e))
        })
    }

    /// Generates the square promotional image as a data URI. Failures and
    /// responses without an image yield `None`.
    pub async fn generate_visual_post(
        &self,
        images: &[EncodedImagePart],
        logo: Option<&EncodedImagePart>,
        details: &ProductDetails,
    ) -> Option<String> {
        let mut parts: Vec<Part> = images.iter().map(Part::image).collect();
        if let Some(logo) = logo {
            parts.push(Part::image(logo));
        }
        parts.push(Part::text(visual_prompt(details, logo.is_some())));

        let request = ContentRequest {
            model: self.image_model.clone(),
            parts,
            generation_config: Some(GenerationConfig {
                response_modalities: Some(vec![Modality::Image]),
                ..Default::default()
            }),
        };

        match self.backend.generate_content(request).await {
            Ok(response) => match response.first_part_image() {
                Some(image) => {
                    let uri = image.to_data_uri();
                    info!("🖼️ Visual post generated: {}", preview(&uri));
                    Some(uri)
                }
                None => {
                    warn!("⚠️ No image data found in visual post response");
                    None
                }
            },
            Err(e) => {
                warn!("⚠️ Visual post generation failed: {}", e);
                None
            }
        }
    }

    /// One generation cycle: captions and visual run concurrently. Only a
    /// caption failure fails the cycle.
    pub async fn generate_all(
        &self,
        images: &[EncodedImagePart],
        logo: Option<&EncodedImagePart>,
        details: &ProductDetails,
    ) -> Result<GeneratedPosts, StudioError> {
        if images.is_empty() {
            return Err(StudioError::NoImages);
        }

        info!(
            "🚀 Generating posts from {} image(s){}",
            images.len(),
            if logo.is_some() { " with logo" } else { "" }
        );

        let (captions, visual_post_url) = tokio::join!(
            self.generate_captions(images, details),
            self.generate_visual_post(images, logo, details)
        );

        let captions = captions.map_err(|e| {
            error!("❌ Failed to generate posts: {}", e);
            e
        })?;

        info!("✅ Posts generated (visual: {})", visual_post_url.is_some());
        Ok(GeneratedPosts::new(captions, visual_post_url))
    }
}
