//! Asset loading: fetching bytes and turning them into models and textures.
//!
//! The [`AssetLoader`] fetches the model first and the texture second, exactly
//! once, through an [`AssetSource`]. [`HttpSource`] is the transport the
//! hosts use; tests plug in an in-memory source instead.

use std::sync::Arc;

use crate::{
    config::ViewerConfig,
    data_structures::{model::ModelAsset, texture::TextureAsset},
    error::{Result, ViewerError},
};

pub mod animation;
pub mod gltf;
pub mod texture;

/// Where asset bytes come from.
#[allow(async_fn_in_trait)]
pub trait AssetSource {
    /// Fetches the full contents behind `url`.
    async fn fetch(&self, url: &str) -> Result<Vec<u8>>;
}

/// Fetches absolute `http(s)` URLs over the network and relative names from
/// the `assets` directory (native) or `<origin>/assets/` (web).
#[derive(Clone, Debug, Default)]
pub struct HttpSource;

impl AssetSource for HttpSource {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        load_binary(url).await
    }
}

#[cfg(target_arch = "wasm32")]
fn format_url(file_name: &str) -> Result<reqwest::Url> {
    let window = web_sys::window().ok_or_else(|| ViewerError::fetch(file_name, "no window"))?;
    let origin = window
        .location()
        .origin()
        .map_err(|_| ViewerError::fetch(file_name, "page origin unavailable"))?;
    let base = reqwest::Url::parse(&format!("{origin}/assets/"))
        .map_err(|e| ViewerError::fetch(file_name, e))?;
    base.join(file_name).map_err(|e| ViewerError::fetch(file_name, e))
}

fn is_remote(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

async fn fetch_remote(url: &str) -> Result<Vec<u8>> {
    let response = reqwest::get(url)
        .await
        .and_then(|response| response.error_for_status())
        .map_err(|e| ViewerError::fetch(url, e))?;
    let bytes = response.bytes().await.map_err(|e| ViewerError::fetch(url, e))?;
    Ok(bytes.to_vec())
}

pub async fn load_binary(file_name: &str) -> Result<Vec<u8>> {
    if is_remote(file_name) {
        return fetch_remote(file_name).await;
    }
    #[cfg(target_arch = "wasm32")]
    let data = {
        let url = format_url(file_name)?;
        fetch_remote(url.as_str()).await?
    };
    #[cfg(not(target_arch = "wasm32"))]
    let data = {
        let path = std::path::Path::new("./").join("assets").join(file_name);
        tokio::fs::read(&path)
            .await
            .map_err(|e| ViewerError::fetch(file_name, e))?
    };

    Ok(data)
}

/// The resolved result of a load: the model and the texture meant for it.
#[derive(Debug)]
pub struct LoadedAssets {
    pub model: ModelAsset,
    pub texture: Arc<TextureAsset>,
}

/// Loads one model and one texture.
///
/// `load` consumes the loader, so each URL is fetched at most once. There is
/// no cache and no retry; the first failure is returned.
#[derive(Debug)]
pub struct AssetLoader<S> {
    source: S,
    model_url: String,
    texture_url: String,
}

impl<S: AssetSource> AssetLoader<S> {
    pub fn new(source: S, model_url: impl Into<String>, texture_url: impl Into<String>) -> Self {
        Self {
            source,
            model_url: model_url.into(),
            texture_url: texture_url.into(),
        }
    }

    pub fn from_config(source: S, config: &ViewerConfig) -> Self {
        Self::new(source, &config.model_url, &config.texture_url)
    }

    /// Fetches the model, then the texture.
    pub async fn load(self) -> Result<LoadedAssets> {
        log::info!("loading model {}", self.model_url);
        let model = gltf::load_model_gltf(&self.source, &self.model_url).await?;

        log::info!("loading texture {}", self.texture_url);
        let bytes = self.source.fetch(&self.texture_url).await?;
        let texture = texture::decode_texture(&bytes, &self.texture_url)?;

        Ok(LoadedAssets {
            model,
            texture: Arc::new(texture),
        })
    }
}
