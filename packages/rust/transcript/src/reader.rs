//! Delimited transcript files (TSV/CSV) and transcript directory discovery.
//!
//! The header row names the columns; common aliases are accepted
//! case-insensitively. Tab is the delimiter for `.tsv`/`.txt`, comma for `.csv`.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tracing::{debug, info, instrument};

use recap_shared::{MeetingId, RecapError, Result};

use crate::{ParsedMeeting, RawRow, build_timeline};

/// File extensions treated as transcripts.
const TRANSCRIPT_EXTENSIONS: [&str; 3] = ["tsv", "csv", "txt"];

/// Accepted header names per logical column.
const SPEAKER_ALIASES: &[&str] = &["speaker", "speaker_id", "participant", "agent"];
const START_ALIASES: &[&str] = &["start_time", "start", "startseconds", "start_seconds"];
const END_ALIASES: &[&str] = &["end_time", "end", "endseconds", "end_seconds"];
const TEXT_ALIASES: &[&str] = &["text", "transcript", "utterance", "content", "dialogue"];

/// A transcript discovered on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptFile {
    pub meeting_id: MeetingId,
    pub path: PathBuf,
}

/// Column positions resolved from the header row.
#[derive(Debug, Clone, Copy)]
struct ColumnMap {
    speaker: usize,
    start: usize,
    end: usize,
    text: usize,
}

impl ColumnMap {
    fn from_header(fields: &[String]) -> Result<Self> {
        let find = |aliases: &[&str]| {
            fields
                .iter()
                .position(|f| aliases.contains(&f.trim().to_lowercase().as_str()))
        };

        let speaker = find(SPEAKER_ALIASES);
        let start = find(START_ALIASES);
        let end = find(END_ALIASES);
        let text = find(TEXT_ALIASES);

        match (speaker, start, end, text) {
            (Some(speaker), Some(start), Some(end), Some(text)) => Ok(Self {
                speaker,
                start,
                end,
                text,
            }),
            _ => {
                let missing: Vec<&str> = [
                    ("end_time", end),
                    ("speaker", speaker),
                    ("start_time", start),
                    ("text", text),
                ]
                .iter()
                .filter(|(_, idx)| idx.is_none())
                .map(|(name, _)| *name)
                .collect();
                Err(RecapError::parse(format!(
                    "transcript is missing required columns: {}",
                    missing.join(", ")
                )))
            }
        }
    }
}

/// Pick the field delimiter from the file extension.
pub fn delimiter_for(path: &Path) -> char {
    match extension_of(path).as_deref() {
        Some("csv") => ',',
        _ => '\t',
    }
}

/// Parse delimited transcript content into raw rows.
///
/// Line numbers are 1-based with the header on its own line; a record whose
/// quoted field spans several lines keeps the line it starts on. Blank lines
/// are skipped; rows shorter than the header yield absent fields.
pub fn parse_table(content: &str, delimiter: char) -> Result<Vec<RawRow>> {
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);
    let mut records = split_records(content, delimiter).into_iter();

    let Some(header) = records.next() else {
        return Err(RecapError::parse("transcript is empty"));
    };
    let columns = ColumnMap::from_header(&header.fields)?;

    let rows = records
        .map(|record| {
            let field = |i: usize| record.fields.get(i).cloned();
            RawRow {
                line: record.line,
                speaker: field(columns.speaker),
                start: field(columns.start).unwrap_or_default(),
                end: field(columns.end).unwrap_or_default(),
                text: field(columns.text).unwrap_or_default(),
            }
        })
        .collect();

    Ok(rows)
}

/// One logical record and the line it starts on.
#[derive(Debug, Clone, PartialEq)]
struct Record {
    line: usize,
    fields: Vec<String>,
}

/// Split content into records, honoring double-quoted fields with `""`
/// escapes. Line breaks inside quotes belong to the field.
fn split_records(content: &str, delimiter: char) -> Vec<Record> {
    let mut records = Vec::new();
    let mut fields: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut blank = true;
    let mut line = 1;
    let mut record_line = 1;
    let mut chars = content.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\r' if chars.peek() == Some(&'\n') => {}
            '"' if in_quotes => {
                if chars.peek() == Some(&'"') {
                    current.push('"');
                    chars.next();
                } else {
                    in_quotes = false;
                }
            }
            '"' if current.trim().is_empty() => {
                current.clear();
                in_quotes = true;
                blank = false;
            }
            '\n' if in_quotes => {
                current.push('\n');
                line += 1;
            }
            '\n' => {
                fields.push(std::mem::take(&mut current));
                if !blank {
                    records.push(Record {
                        line: record_line,
                        fields: std::mem::take(&mut fields),
                    });
                }
                fields.clear();
                blank = true;
                line += 1;
                record_line = line;
            }
            c if c == delimiter && !in_quotes => {
                fields.push(std::mem::take(&mut current));
            }
            c => {
                blank &= c.is_whitespace();
                current.push(c);
            }
        }
    }

    if in_quotes {
        debug!(line = record_line, "unterminated quoted field at end of input");
    }
    if !blank {
        fields.push(current);
        records.push(Record {
            line: record_line,
            fields,
        });
    }
    records
}

/// Read raw rows from a transcript file.
pub fn read_rows(path: &Path) -> Result<Vec<RawRow>> {
    let content = std::fs::read_to_string(path).map_err(|e| RecapError::io(path, e))?;
    parse_table(&content, delimiter_for(path)).map_err(|e| match e {
        RecapError::Parse { message } => {
            RecapError::parse(format!("{}: {message}", path.display()))
        }
        other => other,
    })
}

/// Read a transcript file and build its timeline.
#[instrument(skip_all, fields(meeting = %file.meeting_id))]
pub fn read_transcript(file: &TranscriptFile) -> Result<ParsedMeeting> {
    let rows = read_rows(&file.path)?;
    debug!(path = %file.path.display(), rows = rows.len(), "read transcript rows");
    Ok(build_timeline(file.meeting_id.clone(), rows))
}

/// Find all transcripts under `root`, sorted by path.
///
/// The meeting id is the file stem; when two files share a stem, the later
/// one is keyed by its relative path (extension included) instead, with a
/// numeric suffix if even that is taken. Ids are unique case-insensitively,
/// since each becomes an output file name.
#[instrument(skip_all, fields(root = %root.display()))]
pub fn discover_transcripts(root: &Path) -> Result<Vec<TranscriptFile>> {
    if !root.is_dir() {
        return Err(RecapError::io(
            root,
            std::io::Error::new(std::io::ErrorKind::NotFound, "input directory not found"),
        ));
    }

    let mut paths = Vec::new();
    walk(root, &mut paths)?;
    paths.sort();

    let mut used: HashSet<String> = HashSet::new();
    let mut files = Vec::with_capacity(paths.len());

    for path in paths {
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();

        let mut id = if is_used(&used, &stem) {
            path.strip_prefix(root)
                .unwrap_or(&path)
                .components()
                .map(|c| c.as_os_str().to_string_lossy().to_string())
                .collect::<Vec<_>>()
                .join("-")
        } else {
            stem
        };
        if is_used(&used, &id) {
            let base = id.clone();
            let mut n = 2;
            while is_used(&used, &id) {
                id = format!("{base}-{n}");
                n += 1;
            }
        }
        used.insert(id.to_lowercase());

        files.push(TranscriptFile {
            meeting_id: MeetingId::new(id),
            path,
        });
    }

    if files.is_empty() {
        return Err(RecapError::parse(format!(
            "no transcripts found in {}; expected .tsv, .csv or .txt files",
            root.display()
        )));
    }

    info!(count = files.len(), "transcripts discovered");
    Ok(files)
}

fn walk(dir: &Path, out: &mut Vec<PathBuf>) -> Result<()> {
    let entries = std::fs::read_dir(dir).map_err(|e| RecapError::io(dir, e))?;
    for entry in entries {
        let path = entry.map_err(|e| RecapError::io(dir, e))?.path();
        if path.is_dir() {
            walk(&path, out)?;
        } else if extension_of(&path)
            .is_some_and(|ext| TRANSCRIPT_EXTENSIONS.contains(&ext.as_str()))
        {
            out.push(path);
        }
    }
    Ok(())
}

fn is_used(used: &HashSet<String>, id: &str) -> bool {
    used.contains(&id.to_lowercase())
}

fn extension_of(path: &Path) -> Option<String> {
    path.extension().map(|e| e.to_string_lossy().to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "recap-reader-test-{}",
            uuid::Uuid::now_v7()
        ));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn parses_tsv_with_aliases() {
        let content = "Participant\tStart\tEnd\tTranscript\nalice\t0\t2.5\tHello there\nbob\t00:00:03\t00:00:04\tHi\n";
        let rows = parse_table(content, '\t').unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].speaker.as_deref(), Some("alice"));
        assert_eq!(rows[0].line, 2);
        assert_eq!(rows[1].start, "00:00:03");
        assert_eq!(rows[1].text, "Hi");
    }

    #[test]
    fn columns_may_be_reordered() {
        let content = "text,end_time,speaker,start_time\n\"Send it, please\",4,Bob,1\n";
        let rows = parse_table(content, ',').unwrap();
        assert_eq!(rows[0].text, "Send it, please");
        assert_eq!(rows[0].speaker.as_deref(), Some("Bob"));
        assert_eq!(rows[0].start, "1");
        assert_eq!(rows[0].end, "4");
    }

    #[test]
    fn quoted_field_escapes() {
        let records = split_records(r#"a,"say ""hi""",c"#, ',');
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].fields, vec!["a", r#"say "hi""#, "c"]);
    }

    #[test]
    fn quoted_field_may_span_lines() {
        let content = "speaker,start,end,text\r\n\
                       Alice,0,2,\"We need to send\r\nthe design doc\"\r\n\
                       Bob,3,4,Sure\r\n";
        let rows = parse_table(content, ',').unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].text, "We need to send\nthe design doc");
        assert_eq!(rows[0].line, 2);
        assert_eq!(rows[1].speaker.as_deref(), Some("Bob"));
        assert_eq!(rows[1].line, 4);

        let parsed = build_timeline(MeetingId::new("m"), rows);
        assert!(parsed.diagnostics.is_empty());
        assert_eq!(
            parsed.timeline.utterances[0].text,
            "We need to send the design doc"
        );
    }

    #[test]
    fn short_rows_yield_absent_fields() {
        let content = "speaker\tstart\tend\ttext\n\n\t1\t2\tblank speaker\nonly-speaker\n";
        let rows = parse_table(content, '\t').unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].line, 3);
        assert_eq!(rows[0].speaker.as_deref(), Some(""));
        assert_eq!(rows[1].speaker.as_deref(), Some("only-speaker"));
        assert_eq!(rows[1].text, "");
    }

    #[test]
    fn missing_columns_is_parse_error() {
        let err = parse_table("speaker\tstart\ttext\n", '\t').unwrap_err();
        assert!(err.to_string().contains("end_time"));
        assert!(parse_table("", '\t').is_err());
    }

    #[test]
    fn delimiter_by_extension() {
        assert_eq!(delimiter_for(Path::new("a/b.CSV")), ',');
        assert_eq!(delimiter_for(Path::new("a/b.tsv")), '\t');
        assert_eq!(delimiter_for(Path::new("a/b.txt")), '\t');
    }

    #[test]
    fn discovers_sorted_and_disambiguates_stems() {
        let tmp = temp_dir();
        std::fs::create_dir_all(tmp.join("nested")).unwrap();
        std::fs::write(tmp.join("b.tsv"), "speaker\tstart\tend\ttext\n").unwrap();
        std::fs::write(tmp.join("a.csv"), "speaker,start,end,text\n").unwrap();
        std::fs::write(tmp.join("nested/b.txt"), "speaker\tstart\tend\ttext\n").unwrap();
        std::fs::write(tmp.join("notes.md"), "ignored").unwrap();

        let files = discover_transcripts(&tmp).unwrap();
        let ids: Vec<&str> = files.iter().map(|f| f.meeting_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "nested-b.txt"]);

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn same_stem_different_extension_gets_distinct_ids() {
        let tmp = temp_dir();
        std::fs::create_dir_all(tmp.join("a")).unwrap();
        std::fs::create_dir_all(tmp.join("x")).unwrap();
        for name in [
            "m.csv",
            "m.tsv",
            "b.tsv",
            "a/x-b.tsv.tsv",
            "x/b.tsv",
            "Notes.tsv",
            "notes.csv",
        ] {
            std::fs::write(tmp.join(name), "speaker\tstart\tend\ttext\n").unwrap();
        }

        let files = discover_transcripts(&tmp).unwrap();
        assert_eq!(files.len(), 7);
        let unique: HashSet<String> = files
            .iter()
            .map(|f| f.meeting_id.as_str().to_lowercase())
            .collect();
        assert_eq!(unique.len(), files.len());

        let id_of = |name: &str| {
            files
                .iter()
                .find(|f| f.path.ends_with(name))
                .map(|f| f.meeting_id.as_str().to_string())
                .unwrap()
        };
        assert_eq!(id_of("m.csv"), "m");
        assert_eq!(id_of("m.tsv"), "m.tsv");
        assert_eq!(id_of("x-b.tsv.tsv"), "x-b.tsv");
        assert_eq!(id_of("x/b.tsv"), "x-b.tsv-2");
        assert_eq!(id_of("Notes.tsv"), "Notes");
        assert_eq!(id_of("notes.csv"), "notes.csv");

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn empty_directory_is_an_error() {
        let tmp = temp_dir();
        let err = discover_transcripts(&tmp).unwrap_err();
        assert!(err.to_string().contains("no transcripts found"));
        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn read_transcript_builds_timeline() {
        let tmp = temp_dir();
        let path = tmp.join("m1.tsv");
        std::fs::write(
            &path,
            "speaker\tstart\tend\ttext\nbob\t5\t6\tlater\nalice\t1\t2\tearlier\n",
        )
        .unwrap();

        let file = TranscriptFile {
            meeting_id: MeetingId::new("m1"),
            path,
        };
        let parsed = read_transcript(&file).unwrap();
        assert_eq!(parsed.timeline.utterances[0].speaker, "Alice");
        assert_eq!(parsed.timeline.utterances[0].line, 3);

        let _ = std::fs::remove_dir_all(&tmp);
    }
}
