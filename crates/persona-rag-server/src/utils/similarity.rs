use crate::utils::error::IndexError;

/// Cosine similarity between a query vector and a stored chunk vector.
/// Higher is more relevant; the result is clamped to [-1.0, 1.0].
pub fn cosine_similarity(query: &[f32], stored: &[f32]) -> Result<f32, IndexError> {
    if query.len() != stored.len() {
        return Err(IndexError::DimensionMismatch {
            expected: stored.len(),
            actual: query.len(),
        });
    }

    let (dot, norm_q, norm_s) = query.iter().zip(stored).fold(
        (0.0f32, 0.0f32, 0.0f32),
        |(dot, nq, ns), (q, s)| (dot + q * s, nq + q * q, ns + s * s),
    );

    // Zero vectors carry no direction
    if norm_q == 0.0 || norm_s == 0.0 {
        return Ok(0.0);
    }

    Ok((dot / (norm_q.sqrt() * norm_s.sqrt())).clamp(-1.0, 1.0))
}
