use fxhash::FxHashMap;
use time::{Date, Duration, OffsetDateTime, Time};

use super::channel_id::ChannelId;

// Fractions of a sample below this are treated as timing noise when locating samples
const SAMPLE_TOLERANCE: f64 = 1.0e-3;

/// Midnight UTC at the start of a given date
pub fn start_of_day(date: Date) -> OffsetDateTime {
    date.with_time(Time::MIDNIGHT).assume_utc()
}

/// Seconds elapsed from `from` to `to` (negative if `to` is earlier)
pub fn seconds_between(from: OffsetDateTime, to: OffsetDateTime) -> f64 {
    (to - from).as_seconds_f64()
}

/// Shift a timestamp by a (possibly fractional) number of seconds
pub fn offset_seconds(time: OffsetDateTime, seconds: f64) -> OffsetDateTime {
    time + Duration::seconds_f64(seconds)
}

/// A single contiguous, gap-free run of samples for one channel
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    pub id: ChannelId,
    pub sample_rate: f64,
    pub start: OffsetDateTime,
    pub samples: Vec<f64>,
}

impl Segment {
    pub fn new(id: ChannelId, sample_rate: f64, start: OffsetDateTime, samples: Vec<f64>) -> Self {
        Segment {
            id,
            sample_rate,
            start,
            samples,
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Timestamp of sample `index`
    pub fn time_of(&self, index: usize) -> OffsetDateTime {
        offset_seconds(self.start, index as f64 / self.sample_rate)
    }

    /// Timestamp of the last sample (equal to start for a single sample segment)
    pub fn end(&self) -> OffsetDateTime {
        self.time_of(self.samples.len().saturating_sub(1))
    }

    /// Timestamp one sample period past the last sample
    pub fn end_exclusive(&self) -> OffsetDateTime {
        self.time_of(self.samples.len())
    }

    /// Sample times in seconds relative to `reference`
    pub fn times_from(&self, reference: OffsetDateTime) -> impl Iterator<Item = f64> + '_ {
        let offset = seconds_between(reference, self.start);
        (0..self.samples.len()).map(move |idx| offset + idx as f64 / self.sample_rate)
    }

    pub fn max_abs(&self) -> f64 {
        self.samples.iter().fold(0.0, |max, s| f64::max(max, s.abs()))
    }

    /// Position of `time` measured in samples from this segment's start
    fn sample_position(&self, time: OffsetDateTime) -> f64 {
        seconds_between(self.start, time) * self.sample_rate
    }

    /// Copy of the samples falling in the half-open window `[start, end)`.
    ///
    /// Returns None when no sample lies inside the window.
    pub fn trimmed(&self, start: OffsetDateTime, end: OffsetDateTime) -> Option<Segment> {
        let n_samples = self.samples.len() as f64;
        let first = (self.sample_position(start) - SAMPLE_TOLERANCE)
            .ceil()
            .clamp(0.0, n_samples) as usize;
        let last = (self.sample_position(end) - SAMPLE_TOLERANCE)
            .ceil()
            .clamp(0.0, n_samples) as usize;
        if first >= last {
            return None;
        }
        Some(Segment {
            id: self.id.clone(),
            sample_rate: self.sample_rate,
            start: self.time_of(first),
            samples: self.samples[first..last].to_vec(),
        })
    }

    /// Try to extend this segment with a later segment of the same channel.
    ///
    /// Succeeds when `other` starts at or before the sample following this segment's last
    /// sample. Samples of `other` that overlap this segment are discarded, so the data
    /// already held here always wins. Returns false (and leaves self untouched) for
    /// different channels or rates, for segments starting earlier than this one, and for gaps.
    pub fn try_absorb(&mut self, other: &Segment) -> bool {
        if self.id != other.id || self.sample_rate != other.sample_rate {
            return false;
        }
        let position = self.sample_position(other.start);
        let n_samples = self.samples.len() as f64;
        if position < -0.5 || position > n_samples + 0.5 {
            return false;
        }
        let overlap = (n_samples - position.round()).max(0.0) as usize;
        if overlap < other.samples.len() {
            self.samples.extend_from_slice(&other.samples[overlap..]);
        }
        true
    }
}

/// An ordered collection of segments, possibly for several channels and possibly with gaps.
///
/// This is the waveform series handed between the archive reader, the preprocessor and the
/// renderer. After [`Stream::merge`] segments are ordered by channel then start time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Stream {
    segments: Vec<Segment>,
}

impl Stream {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, segment: Segment) {
        if !segment.is_empty() {
            self.segments.push(segment);
        }
    }

    pub fn extend<I: IntoIterator<Item = Segment>>(&mut self, segments: I) {
        for segment in segments {
            self.push(segment);
        }
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn segments_mut(&mut self) -> &mut [Segment] {
        &mut self.segments
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Segment> {
        self.segments.iter()
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn total_samples(&self) -> usize {
        self.segments.iter().map(|s| s.len()).sum()
    }

    pub fn max_abs(&self) -> f64 {
        self.segments
            .iter()
            .fold(0.0, |max, s| f64::max(max, s.max_abs()))
    }

    /// Distinct channel ids in the stream, sorted
    pub fn channel_ids(&self) -> Vec<ChannelId> {
        let mut ids: Vec<ChannelId> = self.segments.iter().map(|s| s.id.clone()).collect();
        ids.sort();
        ids.dedup();
        ids
    }

    /// Merge contiguous and overlapping segments of each channel.
    ///
    /// Segments are grouped by channel and sample rate, then ordered by start time. Where two
    /// segments overlap, the earlier-starting segment keeps its samples; ties in start time
    /// go to the segment that was pushed first. Gaps are kept as separate segments.
    pub fn merge(&mut self) {
        let mut groups: FxHashMap<(ChannelId, u64), Vec<Segment>> = FxHashMap::default();
        for segment in self.segments.drain(..) {
            groups
                .entry((segment.id.clone(), segment.sample_rate.to_bits()))
                .or_default()
                .push(segment);
        }

        let mut merged: Vec<Segment> = Vec::new();
        for (_, mut group) in groups {
            // Stable sort, so equal start times keep load order
            group.sort_by(|a, b| a.start.cmp(&b.start));
            let mut group_iter = group.into_iter();
            let Some(mut current) = group_iter.next() else {
                continue;
            };
            for segment in group_iter {
                if !current.try_absorb(&segment) {
                    merged.push(std::mem::replace(&mut current, segment));
                }
            }
            merged.push(current);
        }

        merged.sort_by(|a, b| {
            a.id.cmp(&b.id)
                .then(a.start.cmp(&b.start))
                .then(a.sample_rate.total_cmp(&b.sample_rate))
        });
        self.segments = merged;
    }

    /// Trim every segment to the half-open window `[start, end)`, dropping emptied segments
    pub fn trim(&mut self, start: OffsetDateTime, end: OffsetDateTime) {
        self.segments = self
            .segments
            .iter()
            .filter_map(|s| s.trimmed(start, end))
            .collect();
    }

    /// Copy of the stream restricted to the half-open window `[start, end)`
    pub fn slice(&self, start: OffsetDateTime, end: OffsetDateTime) -> Stream {
        Stream {
            segments: self
                .segments
                .iter()
                .filter_map(|s| s.trimmed(start, end))
                .collect(),
        }
    }

    /// Copy of the stream holding only channels whose component code matches
    pub fn select_component(&self, component: char) -> Stream {
        let wanted = component.to_ascii_uppercase();
        Stream {
            segments: self
                .segments
                .iter()
                .filter(|s| s.id.component().map(|c| c.to_ascii_uppercase()) == Some(wanted))
                .cloned()
                .collect(),
        }
    }
}

impl FromIterator<Segment> for Stream {
    fn from_iter<I: IntoIterator<Item = Segment>>(iter: I) -> Self {
        let mut stream = Stream::new();
        stream.extend(iter);
        stream
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn id(channel: &str) -> ChannelId {
        ChannelId::new("XX", "TEST", "", channel)
    }

    fn ramp(start: OffsetDateTime, first: usize, count: usize) -> Segment {
        Segment::new(
            id("HHZ"),
            1.0,
            start,
            (first..first + count).map(|v| v as f64).collect(),
        )
    }

    #[test]
    fn test_overlapping_halves_merge_without_duplicates() {
        let midnight = datetime!(2024-03-10 00:00 UTC);
        // [00:00, 12:05) and [12:00, 24:00) at 1 Hz
        let first = ramp(midnight, 0, 12 * 3600 + 300);
        let second = ramp(datetime!(2024-03-10 12:00 UTC), 12 * 3600, 12 * 3600);
        let mut stream: Stream = vec![first, second].into_iter().collect();
        stream.merge();

        assert_eq!(stream.len(), 1);
        let merged = &stream.segments()[0];
        assert_eq!(merged.start, midnight);
        assert_eq!(merged.len(), 86_400);
        assert_eq!(merged.end_exclusive(), datetime!(2024-03-11 00:00 UTC));
        assert!(merged
            .samples
            .iter()
            .enumerate()
            .all(|(idx, v)| *v == idx as f64));
    }

    #[test]
    fn test_overlap_prefers_earlier_start() {
        let midnight = datetime!(2024-03-10 00:00 UTC);
        let early = Segment::new(id("HHZ"), 1.0, midnight, vec![1.0; 10]);
        let late = Segment::new(
            id("HHZ"),
            1.0,
            datetime!(2024-03-10 00:00:05 UTC),
            vec![2.0; 10],
        );
        // Load the later segment first; start time still decides
        let mut stream: Stream = vec![late, early].into_iter().collect();
        stream.merge();
        let merged = &stream.segments()[0];
        assert_eq!(merged.len(), 15);
        assert_eq!(&merged.samples[..10], &[1.0; 10]);
        assert_eq!(&merged.samples[10..], &[2.0; 5]);
    }

    #[test]
    fn test_equal_start_prefers_first_loaded() {
        let midnight = datetime!(2024-03-10 00:00 UTC);
        let a = Segment::new(id("HHZ"), 1.0, midnight, vec![1.0; 5]);
        let b = Segment::new(id("HHZ"), 1.0, midnight, vec![2.0; 8]);
        let mut stream: Stream = vec![a, b].into_iter().collect();
        stream.merge();
        assert_eq!(
            stream.segments()[0].samples,
            vec![1.0, 1.0, 1.0, 1.0, 1.0, 2.0, 2.0, 2.0]
        );
    }

    #[test]
    fn test_merge_is_order_independent_without_overlap() {
        let midnight = datetime!(2024-03-10 00:00 UTC);
        let pieces = vec![
            ramp(midnight, 0, 100),
            ramp(datetime!(2024-03-10 00:01:40 UTC), 100, 100),
            ramp(datetime!(2024-03-10 00:10:00 UTC), 600, 50),
        ];
        let mut forward: Stream = pieces.clone().into_iter().collect();
        let mut backward: Stream = pieces.into_iter().rev().collect();
        forward.merge();
        backward.merge();
        assert_eq!(forward, backward);
        // The gap before 00:10 is preserved
        assert_eq!(forward.len(), 2);
        assert_eq!(forward.segments()[0].len(), 200);
    }

    #[test]
    fn test_channels_and_rates_never_merge() {
        let midnight = datetime!(2024-03-10 00:00 UTC);
        let z = Segment::new(id("HHZ"), 1.0, midnight, vec![0.0; 10]);
        let n = Segment::new(id("HHN"), 1.0, midnight, vec![0.0; 10]);
        let z_fast = Segment::new(id("HHZ"), 2.0, midnight, vec![0.0; 10]);
        let mut stream: Stream = vec![z, n, z_fast].into_iter().collect();
        stream.merge();
        assert_eq!(stream.len(), 3);
        assert_eq!(stream.channel_ids().len(), 2);
    }

    #[test]
    fn test_trim_is_half_open_and_idempotent() {
        let midnight = datetime!(2024-03-10 00:00 UTC);
        let mut stream: Stream = vec![ramp(datetime!(2024-03-09 23:00 UTC), 0, 3 * 3600)]
            .into_iter()
            .collect();
        let end = datetime!(2024-03-10 01:00 UTC);
        stream.trim(midnight, end);
        let trimmed = stream.clone();
        assert_eq!(trimmed.segments()[0].start, midnight);
        assert_eq!(trimmed.segments()[0].len(), 3600);
        assert_eq!(trimmed.segments()[0].end(), datetime!(2024-03-10 00:59:59 UTC));

        stream.trim(midnight, end);
        assert_eq!(stream, trimmed);
    }

    #[test]
    fn test_trim_outside_window_empties_stream() {
        let mut stream: Stream = vec![ramp(datetime!(2024-03-08 00:00 UTC), 0, 60)]
            .into_iter()
            .collect();
        stream.trim(
            datetime!(2024-03-10 00:00 UTC),
            datetime!(2024-03-11 00:00 UTC),
        );
        assert!(stream.is_empty());
    }

    #[test]
    fn test_select_component() {
        let midnight = datetime!(2024-03-10 00:00 UTC);
        let stream: Stream = vec![
            Segment::new(id("HHZ"), 1.0, midnight, vec![0.0; 3]),
            Segment::new(id("HHE"), 1.0, midnight, vec![0.0; 3]),
        ]
        .into_iter()
        .collect();
        let z = stream.select_component('z');
        assert_eq!(z.len(), 1);
        assert_eq!(z.segments()[0].id.channel, "HHZ");
        assert!(stream.select_component('1').is_empty());
    }
}
