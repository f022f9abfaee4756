use prodquery_core::traits::Embedder;
use prodquery_core::Error;
use prodquery_embed::FakeEmbedder;

fn norm(v: &[f32]) -> f32 { v.iter().map(|x| x * x).sum::<f32>().sqrt() }

#[test]
fn fake_embedder_shapes_and_determinism() {
    let embedder = FakeEmbedder::new(384);
    let texts = vec!["hello world".to_string(), "hello world".to_string()];
    let embs = embedder.embed_batch(&texts).expect("embed_batch");
    assert_eq!(embs.len(), 2);
    let v1 = &embs[0];
    let v2 = &embs[1];

    assert_eq!(v1.len(), 384, "embedding dim is 384");
    assert_eq!(embedder.dim(), 384);
    assert_eq!(embedder.model_id(), "fake:xxh64:d384");

    assert!((norm(v1) - 1.0).abs() <= 1e-3, "vector is L2-normalized (norm={})", norm(v1));

    for (a, b) in v1.iter().zip(v2.iter()) { assert!((a - b).abs() <= 1e-6); }
}

#[test]
fn batch_matches_one_at_a_time() {
    let embedder = FakeEmbedder::new(128);
    let texts: Vec<String> = ["Router X supports WiFi 6", "Battery Y lasts 10 hours", "Router X price is $99"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    let batch = embedder.embed_batch(&texts).expect("batch");
    for (text, expected) in texts.iter().zip(batch.iter()) {
        let single = embedder.embed_batch(std::slice::from_ref(text)).expect("single");
        assert_eq!(&single[0], expected);
    }
}

#[test]
fn one_bad_input_fails_the_whole_batch() {
    let embedder = FakeEmbedder::new(32);
    let texts = vec!["fine text".to_string(), "   ".to_string(), "more text".to_string()];
    let err = embedder.embed_batch(&texts).unwrap_err();
    assert!(matches!(err, Error::Encoding(_)), "got {err:?}");
}

#[test]
fn empty_batch_is_empty() {
    let embedder = FakeEmbedder::new(32);
    assert!(embedder.embed_batch(&[]).expect("empty").is_empty());
}

#[test]
fn shared_tokens_bring_texts_closer() {
    let embedder = FakeEmbedder::new(384);
    let texts: Vec<String> = ["How long does Battery Y last?", "Battery Y lasts 10 hours", "Router X supports WiFi 6"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    let e = embedder.embed_batch(&texts).expect("batch");
    let dot = |a: &[f32], b: &[f32]| a.iter().zip(b).map(|(x, y)| x * y).sum::<f32>();
    assert!(dot(&e[0], &e[1]) > dot(&e[0], &e[2]));
}

/// Needs a real checkpoint; run with
/// `APP_MODEL_DIR=/path/to/all-MiniLM-L6-v2 cargo test -p prodquery-embed -- --ignored`
#[ignore]
#[test]
fn bert_embedder_is_normalized_and_batch_consistent() {
    use prodquery_core::config::EmbeddingSettings;
    use prodquery_embed::BertEmbedder;

    let embedder = BertEmbedder::from_settings(&EmbeddingSettings::default()).expect("model");
    let texts = vec!["Router X supports WiFi 6".to_string(), "Battery Y lasts 10 hours and charges fast".to_string()];
    let batch = embedder.embed_batch(&texts).expect("batch");
    assert_eq!(batch.len(), 2);
    for (text, v) in texts.iter().zip(&batch) {
        assert_eq!(v.len(), embedder.dim());
        assert!((norm(v) - 1.0).abs() <= 1e-3);
        let single = embedder.embed_batch(std::slice::from_ref(text)).expect("single");
        for (a, b) in single[0].iter().zip(v) { assert!((a - b).abs() <= 1e-4); }
    }
}
