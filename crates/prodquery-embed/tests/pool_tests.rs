use candle_core::{Device, Tensor};
use prodquery_embed::masked_mean_l2;

fn rows(t: &Tensor) -> Vec<Vec<f32>> { t.to_vec2().unwrap() }

fn close(a: &[f32], b: &[f32]) -> bool { a.iter().zip(b).all(|(x, y)| (x - y).abs() < 1e-5) }

#[test]
fn masked_tokens_do_not_contribute() {
    let dev = Device::Cpu;
    // One sequence of three tokens, the last one is padding.
    let hidden = Tensor::from_slice(&[3.0f32, 0.0, 1.0, 4.0, 100.0, -100.0], (1, 3, 2), &dev).unwrap();
    let mask = Tensor::from_slice(&[1u32, 1, 0], (1, 3), &dev).unwrap();
    let out = rows(&masked_mean_l2(&hidden, &mask).unwrap());
    // Mean of [3, 0] and [1, 4] is [2, 2]; normalized to [1/sqrt2, 1/sqrt2].
    let h = std::f32::consts::FRAC_1_SQRT_2;
    assert!(close(&out[0], &[h, h]), "{:?}", out[0]);
}

#[test]
fn padding_does_not_change_rows() {
    let dev = Device::Cpu;
    // Row 0 has two real tokens, row 1 one real token plus padding.
    let hidden = Tensor::from_slice(&[1.0f32, 0.0, 3.0, 0.0, 0.0, 2.0, 9.0, 9.0], (2, 2, 2), &dev).unwrap();
    let mask = Tensor::from_slice(&[1u32, 1, 1, 0], (2, 2), &dev).unwrap();
    let out = rows(&masked_mean_l2(&hidden, &mask).unwrap());
    assert!(close(&out[0], &[1.0, 0.0]));
    assert!(close(&out[1], &[0.0, 1.0]));
}

#[test]
fn output_rows_have_unit_norm() {
    let dev = Device::Cpu;
    let hidden = Tensor::from_slice(&[0.5f32, -1.5, 2.0, 7.0, 0.1, 0.2], (1, 2, 3), &dev).unwrap();
    let mask = Tensor::from_slice(&[1u32, 1], (1, 2), &dev).unwrap();
    let out = rows(&masked_mean_l2(&hidden, &mask).unwrap());
    let norm: f32 = out[0].iter().map(|x| x * x).sum::<f32>().sqrt();
    assert!((norm - 1.0).abs() < 1e-5);
}
