//! Information-theoretic measures.

/// Shannon entropy in bits over the frequency distribution of the values.
///
/// Returns 0 when there is at most one distinct finite value.
pub fn shannon_entropy(values: &[f64]) -> f64 {
    let mut counts: Vec<(f64, usize)> = Vec::new();
    let mut total = 0usize;
    for v in values.iter().copied().filter(|v| v.is_finite()) {
        let v = if v == 0.0 { 0.0 } else { v };
        total += 1;
        match counts.iter_mut().find(|(seen, _)| *seen == v) {
            Some((_, c)) => *c += 1,
            None => counts.push((v, 1)),
        }
    }
    if counts.len() <= 1 {
        return 0.0;
    }

    let total = total as f64;
    let h: f64 = counts
        .iter()
        .map(|(_, c)| {
            let p = *c as f64 / total;
            -p * p.log2()
        })
        .sum();
    h.max(0.0)
}
