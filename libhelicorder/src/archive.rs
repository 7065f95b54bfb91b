use std::path::{Path, PathBuf};

use super::error::ArchiveError;
use super::mseed_file::MseedFile;
use super::path_resolver::{resolve, ArchiveQuery};
use super::stream::{offset_seconds, start_of_day, Segment, Stream};

/// The set of files matched by one day's glob pattern, in lexicographic order
#[derive(Debug, Clone, Default)]
pub struct DayFiles {
    pub pattern: String,
    pub files: Vec<PathBuf>,
}

/// Expand every day pattern of `query` against `archive`.
///
/// Unreadable directory entries are logged and skipped; a pattern matching nothing yields an
/// empty file list.
pub fn find_files(
    query: &ArchiveQuery,
    archive: &Path,
    template: &str,
) -> Result<Vec<DayFiles>, ArchiveError> {
    let mut days = Vec::new();
    for pattern in resolve(query, template)? {
        let full_pattern = archive.join(&pattern);
        let full_pattern = full_pattern
            .to_str()
            .ok_or_else(|| ArchiveError::BadPatternPath(full_pattern.clone()))?;
        let mut files: Vec<PathBuf> = Vec::new();
        for entry in glob::glob(full_pattern)? {
            match entry {
                Ok(path) if path.is_file() => files.push(path),
                Ok(_) => (),
                Err(e) => spdlog::warn!("Skipping unreadable archive entry: {e}"),
            }
        }
        files.sort();
        days.push(DayFiles { pattern, files });
    }
    Ok(days)
}

/// Segments parsed from a list of files, with the files that parsed and their total size
#[derive(Debug, Default)]
struct FilesRead {
    segments: Vec<Segment>,
    n_files: usize,
    total_bytes: usize,
}

/// Parse every file in `paths`, logging and skipping the ones that fail
fn read_files(paths: &[PathBuf]) -> FilesRead {
    let mut read = FilesRead::default();
    for path in paths.iter() {
        let parsed = MseedFile::new(path)
            .and_then(|mut file| Ok((file.size_bytes(), file.read_segments()?)));
        match parsed {
            Ok((bytes, segments)) => {
                read.n_files += 1;
                read.total_bytes += bytes;
                read.segments.extend(segments);
            }
            Err(e) => spdlog::warn!("Skipping {}: {e}", path.to_string_lossy()),
        }
    }
    read
}

/// Load, merge and trim the data requested by `query`.
///
/// Trimming uses whole-day boundaries: the returned stream covers
/// `[midnight(start) - pre_pad, midnight(end) + post_pad)`. A file that fails to parse is
/// logged and skipped. An archive with no matching data yields an empty stream, not an error.
pub fn load(query: &ArchiveQuery, archive: &Path, template: &str) -> Result<Stream, ArchiveError> {
    let mut stream = Stream::new();
    let mut total_bytes: usize = 0;
    let mut n_files = 0;
    for day in find_files(query, archive, template)? {
        spdlog::debug!("Pattern {} matched {} file(s)", day.pattern, day.files.len());
        let read = read_files(&day.files);
        n_files += read.n_files;
        total_bytes += read.total_bytes;
        stream.extend(read.segments);
    }
    spdlog::info!(
        "Read {} file(s) totalling {} from the archive",
        n_files,
        human_bytes::human_bytes(total_bytes as f64)
    );

    if stream.is_empty() {
        return Ok(stream);
    }

    let n_fragments = stream.len();
    stream.merge();
    spdlog::debug!(
        "Merged {} fragment(s) into {} segment(s) holding {} sample(s)",
        n_fragments,
        stream.len(),
        stream.total_samples()
    );
    for segment in stream.iter() {
        spdlog::debug!("{}: {} to {}", segment.id, segment.start, segment.end_exclusive());
    }

    let window_start = offset_seconds(start_of_day(query.start.date()), -query.pre_pad);
    let window_end = offset_seconds(start_of_day(query.end.date()), query.post_pad);
    stream.trim(window_start, window_end);
    Ok(stream)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel_id::ChannelId;
    use crate::mseed_record::{write_segment, Encoding};
    use time::macros::datetime;
    use time::OffsetDateTime;

    const TEMPLATE: &str = "{year}/{network}/{station}/{channels}.D/{network}.{station}.{location}.{channels}.D.{year}.{jday:03d}*";

    fn query(start: OffsetDateTime, end: OffsetDateTime) -> ArchiveQuery {
        ArchiveQuery {
            network: String::from("XX"),
            station: String::from("ABC"),
            location: String::from(""),
            channels: String::from("HHZ"),
            start,
            end,
            pre_pad: 0.0,
            post_pad: 0.0,
        }
    }

    fn write_day_file(root: &Path, name: &str, segment: &Segment) {
        let dir = root.join(format!(
            "{}/XX/ABC/HHZ.D",
            segment.start.year()
        ));
        std::fs::create_dir_all(&dir).unwrap();
        let mut file = std::fs::File::create(dir.join(name)).unwrap();
        write_segment(&mut file, segment, Encoding::Int32, 12).unwrap();
    }

    fn hhz(start: OffsetDateTime, samples: Vec<f64>) -> Segment {
        Segment::new(ChannelId::new("XX", "ABC", "", "HHZ"), 1.0, start, samples)
    }

    #[test]
    fn test_empty_archive_gives_empty_stream() {
        let dir = tempfile::tempdir().unwrap();
        let stream = load(
            &query(datetime!(2024-03-10 00:00 UTC), datetime!(2024-03-11 00:00 UTC)),
            dir.path(),
            TEMPLATE,
        )
        .unwrap();
        assert!(stream.is_empty());
    }

    #[test]
    fn test_day_files_are_merged_and_trimmed_to_the_day() {
        let dir = tempfile::tempdir().unwrap();
        // Previous day spills 10 minutes past midnight, next day file starts a little early
        write_day_file(
            dir.path(),
            "XX.ABC..HHZ.D.2024.069",
            &hhz(datetime!(2024-03-09 23:00 UTC), vec![1.0; 4200]),
        );
        write_day_file(
            dir.path(),
            "XX.ABC..HHZ.D.2024.070",
            &hhz(datetime!(2024-03-10 00:05 UTC), vec![2.0; 86_400 - 300]),
        );
        write_day_file(
            dir.path(),
            "XX.ABC..HHZ.D.2024.071",
            &hhz(datetime!(2024-03-11 00:00 UTC), vec![3.0; 600]),
        );

        let stream = load(
            &query(datetime!(2024-03-10 00:00 UTC), datetime!(2024-03-11 00:00 UTC)),
            dir.path(),
            TEMPLATE,
        )
        .unwrap();

        // Only the 070 and 071 patterns are read; the 069 file is outside the query days
        assert_eq!(stream.len(), 1);
        let day = &stream.segments()[0];
        assert_eq!(day.start, datetime!(2024-03-10 00:05 UTC));
        assert_eq!(day.end_exclusive(), datetime!(2024-03-11 00:00 UTC));
        assert!(day.samples.iter().all(|v| *v == 2.0));
    }

    #[test]
    fn test_pre_pad_reads_previous_day() {
        let dir = tempfile::tempdir().unwrap();
        write_day_file(
            dir.path(),
            "XX.ABC..HHZ.D.2024.069",
            &hhz(datetime!(2024-03-09 23:00 UTC), vec![1.0; 3600]),
        );
        write_day_file(
            dir.path(),
            "XX.ABC..HHZ.D.2024.070",
            &hhz(datetime!(2024-03-10 00:00 UTC), vec![2.0; 3600]),
        );
        let mut q = query(datetime!(2024-03-10 00:00 UTC), datetime!(2024-03-11 00:00 UTC));
        q.pre_pad = 600.0;
        let stream = load(&q, dir.path(), TEMPLATE).unwrap();
        assert_eq!(stream.len(), 1);
        let seg = &stream.segments()[0];
        assert_eq!(seg.start, datetime!(2024-03-09 23:50 UTC));
        assert_eq!(seg.len(), 600 + 3600);
    }

    #[test]
    fn test_malformed_file_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        write_day_file(
            dir.path(),
            "XX.ABC..HHZ.D.2024.070",
            &hhz(datetime!(2024-03-10 06:00 UTC), vec![5.0; 120]),
        );
        let junk = dir.path().join("2024/XX/ABC/HHZ.D/XX.ABC..HHZ.D.2024.070.corrupt");
        std::fs::write(&junk, b"definitely not a miniSEED record, just some bytes").unwrap();

        let stream = load(
            &query(datetime!(2024-03-10 00:00 UTC), datetime!(2024-03-11 00:00 UTC)),
            dir.path(),
            TEMPLATE,
        )
        .unwrap();
        assert_eq!(stream.len(), 1);
        assert_eq!(stream.total_samples(), 120);
    }

    #[test]
    fn test_only_parsed_files_are_counted() {
        let dir = tempfile::tempdir().unwrap();
        write_day_file(
            dir.path(),
            "XX.ABC..HHZ.D.2024.070",
            &hhz(datetime!(2024-03-10 06:00 UTC), vec![5.0; 120]),
        );
        let good = dir.path().join("2024/XX/ABC/HHZ.D/XX.ABC..HHZ.D.2024.070");
        let junk = dir.path().join("junk.mseed");
        std::fs::write(&junk, vec![b'?'; 8192]).unwrap();
        let missing = dir.path().join("missing.mseed");

        let read = read_files(&[junk, good.clone(), missing]);
        assert_eq!(read.n_files, 1);
        assert_eq!(
            read.total_bytes as u64,
            std::fs::metadata(&good).unwrap().len()
        );
        assert_eq!(read.segments.len(), 1);
    }

    #[test]
    fn test_file_listing_is_sorted() {
        let dir = tempfile::tempdir().unwrap();
        for suffix in ["c", "a", "b"] {
            write_day_file(
                dir.path(),
                &format!("XX.ABC..HHZ.D.2024.070.{suffix}"),
                &hhz(datetime!(2024-03-10 06:00 UTC), vec![0.0; 10]),
            );
        }
        let days = find_files(
            &query(datetime!(2024-03-10 00:00 UTC), datetime!(2024-03-10 12:00 UTC)),
            dir.path(),
            TEMPLATE,
        )
        .unwrap();
        assert_eq!(days.len(), 1);
        let names: Vec<String> = days[0]
            .files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(
            names,
            vec![
                "XX.ABC..HHZ.D.2024.070.a",
                "XX.ABC..HHZ.D.2024.070.b",
                "XX.ABC..HHZ.D.2024.070.c"
            ]
        );
    }
}
