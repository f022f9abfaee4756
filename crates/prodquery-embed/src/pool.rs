use candle_core::{DType, Result, Tensor, D};

/// Mean of the token states selected by `attention_mask`, L2-normalized per row.
///
/// `hidden` is `[B, T, H]`, `attention_mask` is `[B, T]` (any numeric dtype);
/// the result is `[B, H]`. Rows with no unmasked token come out as zeros.
pub fn masked_mean_l2(hidden: &Tensor, attention_mask: &Tensor) -> Result<Tensor> {
    let (_batch, _tokens, _hidden_dim) = hidden.dims3()?;
    let weights = attention_mask.to_device(hidden.device())?.to_dtype(hidden.dtype())?;

    let summed = hidden.broadcast_mul(&weights.unsqueeze(D::Minus1)?)?.sum(1)?;
    let counts = weights.sum_keepdim(1)?.maximum(1.0)?;
    let mean = summed.broadcast_div(&counts)?;
    l2_normalize(&mean)
}

fn l2_normalize(rows: &Tensor) -> Result<Tensor> {
    let eps = if rows.dtype() == DType::F16 { 1e-6 } else { 1e-12 };
    let norms = rows.sqr()?.sum_keepdim(D::Minus1)?.sqrt()?.affine(1.0, eps)?;
    rows.broadcast_div(&norms)
}
