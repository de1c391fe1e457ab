use regex_lite::Regex;
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

use crate::error::{Result, RigError};
use crate::process::{ProcessRunner, ToolCommand};
use crate::tools::{ToolKind, ToolLocator};

const HEADER_PATTERN: &str = r"^\s*-+\s+(.+?)\s+-+\s*$";
const ENTRY_PATTERN: &str = r"^\s*([^:]+?)\s*:\s*(.*)$";

/// One `Key : Value` pair from the tag reader.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetadataItem {
    pub key: String,
    pub value: String,
}

/// A titled group of tags, e.g. `ID3` or `QuickTime`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetadataSection {
    pub title: String,
    pub items: Vec<MetadataItem>,
}

impl MetadataSection {
    /// Case-insensitive key lookup within this section
    pub fn get(&self, key: &str) -> Option<&str> {
        self.items
            .iter()
            .find(|item| item.key.eq_ignore_ascii_case(key))
            .map(|item| item.value.as_str())
    }
}

/// Parse grouped tag-reader output. Headers look like `---- Group ----`,
/// entries like `Key : Value` (split at the first colon). Anything before the
/// first header and lines of neither shape are skipped.
pub fn parse_sections(text: &str) -> Vec<MetadataSection> {
    let (Ok(header), Ok(entry)) = (Regex::new(HEADER_PATTERN), Regex::new(ENTRY_PATTERN)) else {
        return Vec::new();
    };

    let mut sections: Vec<MetadataSection> = Vec::new();
    for line in text.lines() {
        let line = line.trim_end_matches('\r');

        if let Some(caps) = header.captures(line) {
            sections.push(MetadataSection {
                title: caps[1].to_string(),
                items: Vec::new(),
            });
            continue;
        }

        let Some(current) = sections.last_mut() else {
            continue;
        };
        if let Some(caps) = entry.captures(line) {
            current.items.push(MetadataItem {
                key: caps[1].to_string(),
                value: caps[2].trim_end().to_string(),
            });
        }
    }

    sections
}

/// First value whose key matches (case-insensitively) one of `keys`. Keys are
/// tried in priority order; for each key, sections are searched in order.
pub fn lookup<'a>(sections: &'a [MetadataSection], keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .find_map(|key| sections.iter().find_map(|section| section.get(key)))
}

/// Logical tag fields shown to a user, independent of the tagging scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagField {
    Title,
    Artist,
    Album,
    Year,
    Genre,
    Comment,
}

impl TagField {
    pub const ALL: [TagField; 6] = [
        TagField::Title,
        TagField::Artist,
        TagField::Album,
        TagField::Year,
        TagField::Genre,
        TagField::Comment,
    ];

    /// Real tag names that feed this field, highest priority first
    pub fn candidates(self) -> &'static [&'static str] {
        match self {
            TagField::Title => &["Title"],
            TagField::Artist => &["Artist", "AlbumArtist"],
            TagField::Album => &["Album"],
            TagField::Year => &["Year", "Date"],
            TagField::Genre => &["Genre"],
            TagField::Comment => &["Comment", "Description"],
        }
    }

    /// Metadata key the transcoder writes this field under
    pub fn transcoder_key(self) -> &'static str {
        match self {
            TagField::Title => "title",
            TagField::Artist => "artist",
            TagField::Album => "album",
            TagField::Year => "date",
            TagField::Genre => "genre",
            TagField::Comment => "comment",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            TagField::Title => "Title",
            TagField::Artist => "Artist",
            TagField::Album => "Album",
            TagField::Year => "Year",
            TagField::Genre => "Genre",
            TagField::Comment => "Comment",
        }
    }
}

/// The editable tag summary of one file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MediaTags {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub year: Option<String>,
    pub genre: Option<String>,
    pub comment: Option<String>,
}

impl MediaTags {
    pub fn from_sections(sections: &[MetadataSection]) -> Self {
        let mut tags = Self::default();
        for field in TagField::ALL {
            tags.set(field, lookup(sections, field.candidates()).map(str::to_string));
        }
        tags
    }

    pub fn get(&self, field: TagField) -> Option<&str> {
        match field {
            TagField::Title => self.title.as_deref(),
            TagField::Artist => self.artist.as_deref(),
            TagField::Album => self.album.as_deref(),
            TagField::Year => self.year.as_deref(),
            TagField::Genre => self.genre.as_deref(),
            TagField::Comment => self.comment.as_deref(),
        }
    }

    pub fn set(&mut self, field: TagField, value: Option<String>) {
        let slot = match field {
            TagField::Title => &mut self.title,
            TagField::Artist => &mut self.artist,
            TagField::Album => &mut self.album,
            TagField::Year => &mut self.year,
            TagField::Genre => &mut self.genre,
            TagField::Comment => &mut self.comment,
        };
        *slot = value;
    }

    pub fn is_empty(&self) -> bool {
        TagField::ALL.iter().all(|&field| self.get(field).is_none())
    }

    /// `-metadata key=value` pairs for every present field
    pub fn metadata_args(&self) -> Vec<String> {
        TagField::ALL
            .iter()
            .filter_map(|&field| {
                self.get(field)
                    .map(|value| format!("{}={}", field.transcoder_key(), value))
            })
            .flat_map(|pair| ["-metadata".to_string(), pair])
            .collect()
    }
}

/// Reads grouped tags through the tag-reader tool.
pub struct TagReader {
    locator: ToolLocator,
    runner: Arc<dyn ProcessRunner>,
}

impl TagReader {
    pub fn new(locator: ToolLocator, runner: Arc<dyn ProcessRunner>) -> Self {
        Self { locator, runner }
    }

    pub fn is_available(&self) -> bool {
        self.locator.is_available(ToolKind::TagReader)
    }

    pub async fn read(&self, path: &Path) -> Result<Vec<MetadataSection>> {
        let program = self.locator.require(ToolKind::TagReader)?;
        if !path.exists() {
            return Err(RigError::FileNotFound(path.display().to_string()));
        }

        info!("Reading tags from {}", path.display());
        let command = ToolCommand::new(program, "Tag read")
            .args(["-g", "-s"])
            .path_arg(path);
        let output = self.runner.capture(command).await?;

        if !output.success() {
            return Err(RigError::NonZeroExit {
                program: ToolKind::TagReader.to_string(),
                code: output.code,
            });
        }

        let sections = parse_sections(&output.stdout);
        if sections.is_empty() && !output.stdout.trim().is_empty() {
            return Err(RigError::MalformedOutput(
                "tag reader output contained no groups".to_string(),
            ));
        }

        debug!("Read {} tag groups", sections.len());
        Ok(sections)
    }
}
