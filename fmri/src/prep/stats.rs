//! 一维样本的描述统计量。

/// 算术平均值。空样本返回`None`。
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// 线性插值分位数（与numpy默认的`linear`方法一致）。`q`取值于\[0, 1\]；空样本返回`None`。
pub fn quantile(values: &[f64], q: f64) -> Option<f64> {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    quantile_sorted(&sorted, q)
}

/// 对已经升序排列的样本计算线性插值分位数。
pub fn quantile_sorted(sorted: &[f64], q: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let q = q.clamp(0.0, 1.0);
    let h = (sorted.len() - 1) as f64 * q;
    let lo = h.floor() as usize;
    let hi = h.ceil() as usize;
    let frac = h - lo as f64;
    Some(sorted[lo] + frac * (sorted[hi] - sorted[lo]))
}

/// 中位数；偶数个样本时取中间两个数的平均值。
#[inline]
pub fn median(values: &[f64]) -> Option<f64> {
    quantile(values, 0.5)
}

/// 最大值；空样本返回`None`。
pub fn max(values: &[f64]) -> Option<f64> {
    values.iter().copied().reduce(f64::max)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quantile_matches_linear_interpolation() {
        let v = [4.0, 1.0, 3.0, 2.0];
        // h = 3 * 0.25 = 0.75 -> 1 + 0.75 * (2 - 1)
        assert!((quantile(&v, 0.25).unwrap() - 1.75).abs() < 1e-12);
        assert!((quantile(&v, 0.75).unwrap() - 3.25).abs() < 1e-12);
        assert_eq!(quantile(&v, 0.0), Some(1.0));
        assert_eq!(quantile(&v, 1.0), Some(4.0));
    }

    #[test]
    fn test_median_even_and_odd() {
        assert_eq!(median(&[3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(median(&[4.0, 1.0, 3.0, 2.0]), Some(2.5));
        assert_eq!(median(&[7.0]), Some(7.0));
    }

    #[test]
    fn test_empty_samples() {
        assert_eq!(mean(&[]), None);
        assert_eq!(median(&[]), None);
        assert_eq!(max(&[]), None);
    }
}
