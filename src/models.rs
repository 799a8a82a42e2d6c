use serde::{Serialize, Deserialize};
use chrono::{DateTime, Utc};
use uuid::Uuid;
use thiserror::Error;

/// Free-text details entered alongside the photos. Absent fields are empty
/// strings, never null.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ProductDetails {
    pub product_name: String,
    pub price: String,
    pub target_audience: String,
    pub promotion: String,
    pub style: String,
}

/// An image in the transport form the backend expects (Gemini `inlineData`).
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct EncodedImagePart {
    #[serde(rename = "mimeType")]
    pub mime_type: String,
    pub data: String,
}

impl EncodedImagePart {
    pub fn to_data_uri(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.data)
    }
}

/// The structured caption payload. Every field is required when parsing.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Captions {
    pub instagram: String,
    pub facebook: String,
    pub twitter: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedPosts {
    pub instagram: String,
    pub facebook: String,
    pub twitter: String,
    pub visual_post_url: Option<String>,
}

impl GeneratedPosts {
    pub fn new(captions: Captions, visual_post_url: Option<String>) -> Self {
        Self {
            instagram: captions.instagram,
            facebook: captions.facebook,
            twitter: captions.twitter,
            visual_post_url,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct RecognizedProduct {
    pub product_name: String,
}

#[derive(Debug, Error, PartialEq)]
pub enum DraftError {
    #[error("a generation is already running for this draft")]
    AlreadyGenerating,
    #[error("no product image provided")]
    NoImages,
    #[error("image index {0} out of range")]
    NoSuchImage(usize),
}

/// Inputs captured from a draft at submit time.
#[derive(Debug, Clone)]
pub struct GenerationInput {
    pub images: Vec<EncodedImagePart>,
    pub logo: Option<EncodedImagePart>,
    pub details: ProductDetails,
}

/// Server-side working state for one user session: uploads, details and the
/// outcome of the last generation cycle.
#[derive(Debug, Clone)]
pub struct Draft {
    pub id: Uuid,
    pub images: Vec<EncodedImagePart>,
    pub logo: Option<EncodedImagePart>,
    pub details: ProductDetails,
    pub result: Option<GeneratedPosts>,
    pub error: Option<String>,
    pub generating: bool,
    /// Ticket of the recognition whose result may still be applied.
    pub pending_recognition: Option<u64>,
    recognition_seq: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Draft {
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            images: Vec::new(),
            logo: None,
            details: ProductDetails::default(),
            result: None,
            error: None,
            generating: false,
            pending_recognition: None,
            recognition_seq: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Appends images and clears any previous outcome. When the set was
    /// empty beforehand, returns the ticket for the product recognition that
    /// should run on the first image.
    pub fn add_images(&mut self, parts: Vec<EncodedImagePart>) -> Option<u64> {
        if parts.is_empty() {
            return None;
        }
        let was_empty = self.images.is_empty();
        self.images.extend(parts);
        self.result = None;
        self.error = None;
        self.touch();
        if !was_empty {
            return None;
        }
        self.recognition_seq += 1;
        self.pending_recognition = Some(self.recognition_seq);
        Some(self.recognition_seq)
    }

    /// Removing the last image also forgets the product name.
    pub fn remove_image(&mut self, index: usize) -> Result<EncodedImagePart, DraftError> {
        if index >= self.images.len() {
            return Err(DraftError::NoSuchImage(index));
        }
        let removed = self.images.remove(index);
        if self.images.is_empty() {
            self.details.product_name.clear();
            self.pending_recognition = None;
        }
        self.touch();
        Ok(removed)
    }

    pub fn set_logo(&mut self, logo: EncodedImagePart) {
        self.logo = Some(logo);
        self.touch();
    }

    pub fn clear_logo(&mut self) -> Option<EncodedImagePart> {
        self.touch();
        self.logo.take()
    }

    /// Explicit details win over any recognition still in flight.
    pub fn set_details(&mut self, details: ProductDetails) {
        self.details = details;
        self.pending_recognition = None;
        self.result = None;
        self.error = None;
        self.touch();
    }

    /// Applies a recognition result only if its ticket is still current.
    /// Returns whether the name was taken.
    pub fn apply_recognized_name(&mut self, ticket: u64, name: String) -> bool {
        if self.pending_recognition != Some(ticket) {
            return false;
        }
        self.pending_recognition = None;
        if name.is_empty() {
            return false;
        }
        self.details.product_name = name;
        self.touch();
        true
    }

    /// Marks the draft busy and snapshots its inputs. The previous result and
    /// error are cleared and are not restored if the cycle fails.
    pub fn begin_generation(&mut self) -> Result<GenerationInput, DraftError> {
        if self.generating {
            return Err(DraftError::AlreadyGenerating);
        }
        if self.images.is_empty() {
            return Err(DraftError::NoImages);
        }
        self.generating = true;
        self.result = None;
        self.error = None;
        self.touch();
        Ok(GenerationInput {
            images: self.images.clone(),
            logo: self.logo.clone(),
            details: self.details.clone(),
        })
    }

    pub fn finish_generation(&mut self, outcome: Result<GeneratedPosts, String>) {
        self.generating = false;
        match outcome {
            Ok(posts) => self.result = Some(posts),
            Err(message) => self.error = Some(message),
        }
        self.touch();
    }

    pub fn view(&self) -> DraftView {
        DraftView {
            id: self.id,
            images: self.images.iter().map(ImageSummary::from).collect(),
            logo: self.logo.as_ref().map(ImageSummary::from),
            details: self.details.clone(),
            result: self.result.clone(),
            error: self.error.clone(),
            generating: self.generating,
            recognizing: self.pending_recognition.is_some(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

impl Default for Draft {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ImageSummary {
    pub mime_type: String,
    pub encoded_len: usize,
}

impl From<&EncodedImagePart> for ImageSummary {
    fn from(part: &EncodedImagePart) -> Self {
        Self { mime_type: part.mime_type.clone(), encoded_len: part.data.len() }
    }
}

/// What clients see of a draft. Image payloads are summarized, not echoed.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct DraftView {
    pub id: Uuid,
    pub images: Vec<ImageSummary>,
    pub logo: Option<ImageSummary>,
    pub details: ProductDetails,
    pub result: Option<GeneratedPosts>,
    pub error: Option<String>,
    pub generating: bool,
    pub recognizing: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn part(data: &str) -> EncodedImagePart {
        EncodedImagePart { mime_type: "image/png".into(), data: data.into() }
    }

    fn posts() -> GeneratedPosts {
        GeneratedPosts {
            instagram: "ig".into(),
            facebook: "fb".into(),
            twitter: "tw".into(),
            visual_post_url: None,
        }
    }

    #[test]
    fn details_deserialize_missing_fields_as_empty() {
        let details: ProductDetails = serde_json::from_str(r#"{"productName":"Tênis X"}"#).unwrap();
        assert_eq!(details.product_name, "Tênis X");
        assert_eq!(details.price, "");
        assert_eq!(details.style, "");
    }

    #[test]
    fn generated_posts_serialize_null_visual() {
        let json = serde_json::to_value(posts()).unwrap();
        assert_eq!(json["visualPostUrl"], serde_json::Value::Null);
        assert_eq!(json["instagram"], "ig");
    }

    #[test]
    fn captions_require_every_field() {
        let err = serde_json::from_str::<Captions>(r#"{"instagram":"a","facebook":"b"}"#);
        assert!(err.is_err());
        let ok: Captions = serde_json::from_str(r#"{"instagram":"","facebook":"","twitter":""}"#).unwrap();
        assert_eq!(ok.twitter, "");
    }

    #[test]
    fn recognition_triggers_only_on_first_images() {
        let mut draft = Draft::new();
        assert_eq!(draft.add_images(vec![]), None);
        assert_eq!(draft.add_images(vec![part("a")]), Some(1));
        assert_eq!(draft.add_images(vec![part("b"), part("c")]), None);
        assert_eq!(draft.images.len(), 3);
        assert!(draft.view().recognizing);
    }

    #[test]
    fn emptying_the_set_clears_name_and_rearms_recognition() {
        let mut draft = Draft::new();
        let ticket = draft.add_images(vec![part("a"), part("b")]).unwrap();
        assert!(draft.apply_recognized_name(ticket, "Tênis X".into()));
        assert!(!draft.view().recognizing);

        draft.remove_image(0).unwrap();
        assert_eq!(draft.details.product_name, "Tênis X");
        draft.remove_image(0).unwrap();
        assert_eq!(draft.details.product_name, "");
        assert_eq!(draft.remove_image(0), Err(DraftError::NoSuchImage(0)));

        assert!(draft.add_images(vec![part("c")]).is_some());
    }

    #[test]
    fn recognized_name_is_dropped_when_images_are_gone() {
        let mut draft = Draft::new();
        let ticket = draft.add_images(vec![part("a")]).unwrap();
        draft.remove_image(0).unwrap();
        assert!(!draft.apply_recognized_name(ticket, "Ghost".into()));
        assert_eq!(draft.details.product_name, "");
    }

    #[test]
    fn stale_recognition_for_a_removed_image_is_ignored() {
        let mut draft = Draft::new();
        let first = draft.add_images(vec![part("a")]).unwrap();
        draft.remove_image(0).unwrap();
        let second = draft.add_images(vec![part("b")]).unwrap();
        assert_ne!(first, second);

        assert!(draft.apply_recognized_name(second, "Produto B".into()));
        assert!(!draft.apply_recognized_name(first, "Produto A".into()));
        assert_eq!(draft.details.product_name, "Produto B");
    }

    #[test]
    fn details_edited_during_recognition_are_kept() {
        let mut draft = Draft::new();
        let ticket = draft.add_images(vec![part("a")]).unwrap();
        draft.set_details(ProductDetails { product_name: "Meu nome".into(), ..Default::default() });

        assert!(!draft.apply_recognized_name(ticket, "Tênis X".into()));
        assert_eq!(draft.details.product_name, "Meu nome");
        assert!(!draft.view().recognizing);
    }

    #[test]
    fn empty_recognition_keeps_existing_name() {
        let mut draft = Draft::new();
        let ticket = draft.add_images(vec![part("a")]).unwrap();
        assert!(!draft.apply_recognized_name(ticket, String::new()));
        assert!(draft.pending_recognition.is_none());
    }

    #[test]
    fn generation_is_single_flight_and_clears_previous_outcome() {
        let mut draft = Draft::new();
        assert_eq!(draft.begin_generation().unwrap_err(), DraftError::NoImages);

        draft.add_images(vec![part("a")]);
        draft.set_logo(part("logo"));
        let input = draft.begin_generation().unwrap();
        assert_eq!(input.images.len(), 1);
        assert_eq!(input.logo, Some(part("logo")));
        assert_eq!(draft.begin_generation().unwrap_err(), DraftError::AlreadyGenerating);

        draft.finish_generation(Ok(posts()));
        assert_eq!(draft.result, Some(posts()));
        assert!(!draft.generating);

        draft.begin_generation().unwrap();
        assert_eq!(draft.result, None);
        draft.finish_generation(Err("failed".into()));
        assert_eq!(draft.result, None);
        assert_eq!(draft.error.as_deref(), Some("failed"));
    }

    #[test]
    fn replacing_logo_drops_the_old_one() {
        let mut draft = Draft::new();
        draft.set_logo(part("old"));
        draft.set_logo(part("new"));
        assert_eq!(draft.clear_logo(), Some(part("new")));
        assert_eq!(draft.clear_logo(), None);
    }

    #[test]
    fn view_summarizes_images() {
        let mut draft = Draft::new();
        draft.add_images(vec![part("abcd")]);
        let view = draft.view();
        assert_eq!(view.images, vec![ImageSummary { mime_type: "image/png".into(), encoded_len: 4 }]);
        assert!(view.logo.is_none());
    }

    #[test]
    fn data_uri_format() {
        assert_eq!(part("QUJD").to_data_uri(), "data:image/png;base64,QUJD");
    }
}
