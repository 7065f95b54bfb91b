use super::detrend::DetrendMode;
use super::error::FilterError;
use super::filter::FilterSpec;
use super::stream::Stream;

/// Detrend and filter a stream without touching the input.
///
/// Returns `(raw, filtered)`: `raw` is the input with every detrend mode applied to each
/// segment in order; `filtered` is `raw` with every filter applied in order. Both keep the
/// input's segment layout, timing and sample counts.
pub fn preprocess(
    stream: &Stream,
    detrend: &[DetrendMode],
    filters: &[FilterSpec],
) -> Result<(Stream, Stream), FilterError> {
    let mut raw = stream.clone();
    for segment in raw.segments_mut() {
        for mode in detrend.iter() {
            mode.apply(&mut segment.samples);
        }
    }

    let mut filtered = raw.clone();
    for segment in filtered.segments_mut() {
        for filter in filters.iter() {
            filter.apply(&mut segment.samples, segment.sample_rate)?;
        }
    }
    if !filters.is_empty() {
        spdlog::debug!(
            "Applied {} filter(s) to {} segment(s)",
            filters.len(),
            filtered.len()
        );
    }

    Ok((raw, filtered))
}
