use prodquery_core::config::EmbeddingSettings;
use prodquery_core::traits::Embedder;
use prodquery_embed::get_default_embedder;

fn main() -> anyhow::Result<()> {
    let embedder = get_default_embedder(&EmbeddingSettings::default())?;
    let texts = vec!["Router X supports WiFi 6".to_string(), "Battery Y lasts 10 hours".to_string()];
    let embs = embedder.embed_batch(&texts)?;
    println!("model={} B={} dim={}", embedder.model_id(), embs.len(), embedder.dim());
    Ok(())
}
