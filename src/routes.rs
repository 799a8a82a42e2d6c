use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, Path, State, multipart::Field},
    http::StatusCode,
    routing::{delete, get, post, put},
};
use std::{collections::HashMap, sync::Arc};
use parking_lot::RwLock;
use uuid::Uuid;

use crate::{
    encoder::{encode_all, encode_one, EncodeError, Upload},
    error::{AppError, AppResult, GENERATION_FAILED_MESSAGE},
    models::{Draft, DraftView, GeneratedPosts, GenerationInput, ProductDetails, RecognizedProduct},
    studio::{PostStudio, StudioError},
};

#[derive(Clone)]
pub struct AppState {
    pub drafts: Arc<RwLock<HashMap<Uuid, Draft>>>,
    pub studio: Arc<PostStudio>,
}

impl AppState {
    pub fn new(studio: PostStudio) -> Self {
        Self { drafts: Arc::default(), studio: Arc::new(studio) }
    }
}

pub fn router(state: AppState, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/posts", post(generate_posts))
        .route("/api/recognize", post(recognize_product))
        .route("/api/drafts", post(create_draft))
        .route("/api/drafts/:id", get(get_draft).delete(delete_draft))
        .route("/api/drafts/:id/images", post(add_images))
        .route("/api/drafts/:id/images/:index", delete(remove_image))
        .route("/api/drafts/:id/logo", put(set_logo).delete(remove_logo))
        .route("/api/drafts/:id/details", put(set_details))
        .route("/api/drafts/:id/generate", post(generate_draft))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}

// --- Multipart form ---

/// Files and fields of an upload form. Product images arrive as `images`
/// (or `image`), the logo as `logo`, details as their camelCase names.
#[derive(Debug, Default)]
struct PostForm {
    images: Vec<Upload>,
    logo: Option<Upload>,
    details: ProductDetails,
}

async fn read_upload(field: Field<'_>) -> Result<Upload, EncodeError> {
    let name = field.file_name().unwrap_or("upload").to_string();
    let declared_mime = field.content_type().map(str::to_string);
    let bytes = field.bytes().await.map_err(|e| EncodeError::Read(e.to_string()))?;
    Ok(Upload { name, declared_mime, bytes })
}

async fn read_text(field: Field<'_>) -> AppResult<String> {
    field.text().await.map_err(|e| AppError::BadRequest(e.to_string()))
}

async fn read_form(mut multipart: Multipart) -> AppResult<PostForm> {
    let mut form = PostForm::default();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "images" | "image" => form.images.push(read_upload(field).await?),
            "logo" => form.logo = Some(read_upload(field).await?),
            "productName" => form.details.product_name = read_text(field).await?,
            "price" => form.details.price = read_text(field).await?,
            "targetAudience" => form.details.target_audience = read_text(field).await?,
            "promotion" => form.details.promotion = read_text(field).await?,
            "style" => form.details.style = read_text(field).await?,
            other => tracing::debug!("Ignoring unknown form field {:?}", other),
        }
    }
    Ok(form)
}

// --- Stateless endpoints ---

pub async fn generate_posts(State(state): State<AppState>, multipart: Multipart) -> AppResult<Json<GeneratedPosts>> {
    let form = read_form(multipart).await?;
    if form.images.is_empty() {
        return Err(StudioError::NoImages.into());
    }
    let images = encode_all(form.images).await?;
    let logo = match form.logo {
        Some(upload) => Some(encode_one(upload).await?),
        None => None,
    };

    let posts = state.studio.generate_all(&images, logo.as_ref(), &form.details).await?;
    Ok(Json(posts))
}

pub async fn recognize_product(State(state): State<AppState>, multipart: Multipart) -> AppResult<Json<RecognizedProduct>> {
    let form = read_form(multipart).await?;
    let Some(first) = form.images.into_iter().next() else {
        return Ok(Json(RecognizedProduct::default()));
    };
    let image = encode_one(first).await?;
    let product_name = state.studio.recognize_product(std::slice::from_ref(&image)).await;
    Ok(Json(RecognizedProduct { product_name }))
}

// --- Drafts ---

fn with_draft<T>(state: &AppState, id: Uuid, f: impl FnOnce(&mut Draft) -> AppResult<T>) -> AppResult<T> {
    let mut guard = state.drafts.write();
    let draft = guard.get_mut(&id).ok_or(AppError::NotFound)?;
    f(draft)
}

pub async fn create_draft(State(state): State<AppState>) -> (StatusCode, Json<DraftView>) {
    let draft = Draft::new();
    let view = draft.view();
    state.drafts.write().insert(draft.id, draft);
    tracing::info!("📝 Created draft {}", view.id);
    (StatusCode::CREATED, Json(view))
}

pub async fn get_draft(Path(id): Path<Uuid>, State(state): State<AppState>) -> AppResult<Json<DraftView>> {
    let view = state.drafts.read().get(&id).map(Draft::view);
    view.map(Json).ok_or(AppError::NotFound)
}

/// Drops the draft together with every upload it owns.
pub async fn delete_draft(Path(id): Path<Uuid>, State(state): State<AppState>) -> AppResult<StatusCode> {
    let removed = state.drafts.write().remove(&id).ok_or(AppError::NotFound)?;
    tracing::info!("🗑️ Deleted draft {} ({} image(s) released)", id, removed.images.len());
    Ok(StatusCode::NO_CONTENT)
}

pub async fn add_images(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    multipart: Multipart,
) -> AppResult<Json<DraftView>> {
    let form = read_form(multipart).await?;
    if form.images.is_empty() {
        return Err(AppError::BadRequest("no images in upload".into()));
    }
    let parts = encode_all(form.images).await?;

    let recognition = with_draft(&state, id, |draft| {
        let ticket = draft.add_images(parts);
        Ok(ticket.zip(draft.images.first().cloned()))
    })?;

    if let Some((ticket, image)) = recognition {
        tracing::info!("🔎 Recognizing product for draft {}", id);
        let name = state.studio.recognize_product(std::slice::from_ref(&image)).await;
        // The draft may have been deleted, emptied or edited while recognition ran.
        if let Some(draft) = state.drafts.write().get_mut(&id) {
            if !draft.apply_recognized_name(ticket, name) {
                tracing::debug!("Discarded recognition {} for draft {}", ticket, id);
            }
        }
    }

    get_draft(Path(id), State(state)).await
}

pub async fn remove_image(
    Path((id, index)): Path<(Uuid, usize)>,
    State(state): State<AppState>,
) -> AppResult<Json<DraftView>> {
    with_draft(&state, id, |draft| {
        draft.remove_image(index)?;
        Ok(Json(draft.view()))
    })
}

pub async fn set_logo(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    multipart: Multipart,
) -> AppResult<Json<DraftView>> {
    let form = read_form(multipart).await?;
    let upload = form
        .logo
        .or_else(|| form.images.into_iter().next())
        .ok_or_else(|| AppError::BadRequest("no logo in upload".into()))?;
    let logo = encode_one(upload).await?;
    with_draft(&state, id, |draft| {
        draft.set_logo(logo);
        Ok(Json(draft.view()))
    })
}

pub async fn remove_logo(Path(id): Path<Uuid>, State(state): State<AppState>) -> AppResult<Json<DraftView>> {
    with_draft(&state, id, |draft| {
        draft.clear_logo();
        Ok(Json(draft.view()))
    })
}

pub async fn set_details(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Json(details): Json<ProductDetails>,
) -> AppResult<Json<DraftView>> {
    with_draft(&state, id, |draft| {
        draft.set_details(details);
        Ok(Json(draft.view()))
    })
}

pub async fn generate_draft(Path(id): Path<Uuid>, State(state): State<AppState>) -> AppResult<Json<GeneratedPosts>> {
    let input = with_draft(&state, id, |draft| Ok(draft.begin_generation()?))?;

    tracing::info!("🚀 Generation cycle started for draft {}", id);
    // The cycle owns its task so it completes even if the client goes away.
    let cycle = tokio::spawn(run_cycle(state.clone(), id, input));
    match cycle.await {
        Ok(result) => Ok(Json(result?)),
        Err(e) => {
            if let Some(draft) = state.drafts.write().get_mut(&id) {
                draft.finish_generation(Err(GENERATION_FAILED_MESSAGE.to_string()));
            }
            Err(StudioError::Generation(format!("generation task failed: {}", e)).into())
        }
    }
}

async fn run_cycle(state: AppState, id: Uuid, input: GenerationInput) -> Result<GeneratedPosts, StudioError> {
    let result = state
        .studio
        .generate_all(&input.images, input.logo.as_ref(), &input.details)
        .await;

    let outcome = match &result {
        Ok(posts) => Ok(posts.clone()),
        Err(_) => Err(GENERATION_FAILED_MESSAGE.to_string()),
    };
    if let Some(draft) = state.drafts.write().get_mut(&id) {
        draft.finish_generation(outcome);
    }
    result
}
