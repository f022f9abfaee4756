use candle_core::{Device, Tensor};
use tokenizers::Tokenizer;

use prodquery_core::{Error, Result};

/// Tokenize a batch, truncating each input to `max_len` tokens and padding
/// every row to the longest one with `pad_id`. Returns `(input_ids, attention_mask)`,
/// both `[B, T]` u32 tensors on `device`.
pub fn tokenize_batch(
    tokenizer: &Tokenizer,
    texts: &[String],
    max_len: usize,
    pad_id: u32,
    device: &Device,
) -> Result<(Tensor, Tensor)> {
    let mut rows = Vec::with_capacity(texts.len());
    for (i, text) in texts.iter().enumerate() {
        let enc = tokenizer
            .encode(text.as_str(), true)
            .map_err(|e| Error::Encoding(format!("tokenization failed for input {i}: {e}")))?;
        let mut ids = enc.get_ids().to_vec();
        let mut mask = enc.get_attention_mask().to_vec();
        if ids.len() > max_len { ids.truncate(max_len); mask.truncate(max_len); }
        if ids.is_empty() || mask.iter().all(|&m| m == 0) {
            return Err(Error::Encoding(format!("input {i} produced no tokens")));
        }
        rows.push((ids, mask));
    }
    let width = rows.iter().map(|(ids, _)| ids.len()).max().unwrap_or(0);
    let mut flat_ids = Vec::with_capacity(rows.len() * width);
    let mut flat_mask = Vec::with_capacity(rows.len() * width);
    for (ids, mask) in rows {
        let pad = width - ids.len();
        flat_ids.extend(ids);
        flat_ids.extend(std::iter::repeat(pad_id).take(pad));
        flat_mask.extend(mask);
        flat_mask.extend(std::iter::repeat(0u32).take(pad));
    }
    let to_err = |e: candle_core::Error| Error::Encoding(e.to_string());
    let input_ids = Tensor::from_vec(flat_ids, (texts.len(), width), device).map_err(to_err)?;
    let attention_mask = Tensor::from_vec(flat_mask, (texts.len(), width), device).map_err(to_err)?;
    Ok((input_ids, attention_mask))
}
