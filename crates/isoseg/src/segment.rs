//! Segment records produced by the scanner.
//!
//! A segment is a contiguous byte range of the disc image with a type tag and,
//! for compressed WAD blocks, a description of the payload found inside.
//!
//! Records flagged with `error` by the scanner are kept as [`MalformedRecord`]
//! so downstream code can count them without being able to read any other
//! field.

use serde::de::Deserializer;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Type tag of a compressed WAD container.
pub const WAD_TAG: &str = "wad";

/// Type tag of the embedded texture format.
pub const IMAGE_TAG: &str = "fip";

/// Format of a segment as found on disc.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SegmentKind {
    /// Compressed container, decoded by the external decompressor
    Wad,
    /// Already decoded data with the given format tag
    Raw(String),
}

impl SegmentKind {
    /// Map a scanner type tag to a kind.
    pub fn from_tag(tag: &str) -> Self {
        if tag == WAD_TAG {
            Self::Wad
        } else {
            Self::Raw(tag.to_string())
        }
    }

    /// The scanner type tag.
    pub fn tag(&self) -> &str {
        match self {
            Self::Wad => WAD_TAG,
            Self::Raw(tag) => tag,
        }
    }
}

impl fmt::Display for SegmentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Payload description nested inside a WAD segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompressedData {
    /// Format of the payload once decompressed
    pub kind: String,
    /// Length of the compressed payload on disc
    pub compressed_size: u64,
}

/// A well-formed segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    /// Absolute byte offset into the image
    pub offset: u64,
    /// Length of the raw region on disc
    pub size: u64,
    /// Container or raw format
    pub kind: SegmentKind,
    /// Nested payload description, only ever set for [`SegmentKind::Wad`]
    pub compressed: Option<CompressedData>,
}

impl Segment {
    /// Create an uncompressed segment.
    pub fn raw(offset: u64, size: u64, tag: impl Into<String>) -> Self {
        Self {
            offset,
            size,
            kind: SegmentKind::Raw(tag.into()),
            compressed: None,
        }
    }

    /// Create a compressed segment, optionally describing its payload.
    pub fn wad(offset: u64, size: u64, compressed: Option<CompressedData>) -> Self {
        Self {
            offset,
            size,
            kind: SegmentKind::Wad,
            compressed,
        }
    }

    /// Whether the segment is a compressed container.
    pub fn is_wad(&self) -> bool {
        self.kind == SegmentKind::Wad
    }

    /// The format of the data once any container is unwrapped.
    ///
    /// For a WAD this is the nested type (if the scanner recognised one),
    /// otherwise the segment's own tag.
    pub fn inner_kind(&self) -> Option<&str> {
        match &self.kind {
            SegmentKind::Wad => self.compressed.as_ref().map(|c| c.kind.as_str()),
            SegmentKind::Raw(tag) => Some(tag),
        }
    }

    /// Whether the inner data is an embedded texture that can be converted.
    pub fn has_image_payload(&self) -> bool {
        self.inner_kind() == Some(IMAGE_TAG)
    }

    /// Compressed texture blocks are the only segments the shuffler touches.
    pub fn is_swappable(&self) -> bool {
        self.is_wad() && self.has_image_payload()
    }

    /// Compressed payload length, if the segment carries nested data.
    pub fn compressed_size(&self) -> Option<u64> {
        self.compressed.as_ref().map(|c| c.compressed_size)
    }
}

/// A record the scanner flagged as unscannable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MalformedRecord {
    /// Offset, when the scanner reported one
    pub offset: Option<u64>,
    /// Scanner message, when it was a string
    pub reason: Option<String>,
}

/// One line of the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogEntry {
    /// A usable segment
    Segment(Segment),
    /// A record carrying the `error` marker
    Malformed(MalformedRecord),
}

impl CatalogEntry {
    /// The segment, if the record is usable.
    pub fn as_segment(&self) -> Option<&Segment> {
        match self {
            Self::Segment(segment) => Some(segment),
            Self::Malformed(_) => None,
        }
    }

    /// Whether the scanner flagged this record.
    pub fn is_malformed(&self) -> bool {
        matches!(self, Self::Malformed(_))
    }
}

/// Wraps any value in `Some`, so `"error": null` still marks a record.
fn marker<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

/// Nested object as emitted by the scanner.
#[derive(Debug, Default, Deserialize, Serialize)]
pub(crate) struct RawCompressedData {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compressed_size: Option<u64>,
}

/// One JSON line as emitted by the scanner, before validation.
#[derive(Debug, Default, Deserialize, Serialize)]
pub(crate) struct RawRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compressed_size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compressed_data: Option<RawCompressedData>,
    #[serde(default, deserialize_with = "marker", skip_serializing)]
    pub error: Option<Value>,
}

impl RawRecord {
    /// Validate the record into a catalog entry.
    ///
    /// Returns the missing piece on failure; the caller attaches the line.
    pub(crate) fn into_entry(self) -> Result<CatalogEntry, String> {
        if let Some(marker) = self.error {
            return Ok(CatalogEntry::Malformed(MalformedRecord {
                offset: self.offset,
                reason: marker.as_str().map(str::to_string),
            }));
        }

        let offset = self.offset.ok_or("missing offset")?;
        let tag = self.kind.ok_or("missing type")?;
        let kind = SegmentKind::from_tag(&tag);

        match kind {
            SegmentKind::Wad => {
                let outer_compressed = self.compressed_size;
                let compressed = match self.compressed_data {
                    Some(nested) => match nested.kind {
                        Some(inner) => {
                            let compressed_size = nested
                                .compressed_size
                                .or(outer_compressed)
                                .or(self.size)
                                .ok_or("wad record has no compressed_size")?;
                            Some(CompressedData {
                                kind: inner,
                                compressed_size,
                            })
                        }
                        None => None,
                    },
                    None => None,
                };
                let size = self
                    .size
                    .or(outer_compressed)
                    .or_else(|| compressed.as_ref().map(|c| c.compressed_size))
                    .ok_or("wad record has neither size nor compressed_size")?;
                Ok(CatalogEntry::Segment(Segment::wad(offset, size, compressed)))
            }
            SegmentKind::Raw(_) => {
                let size = self.size.ok_or("missing size")?;
                Ok(CatalogEntry::Segment(Segment {
                    offset,
                    size,
                    kind,
                    compressed: None,
                }))
            }
        }
    }
}

impl From<&Segment> for RawRecord {
    fn from(segment: &Segment) -> Self {
        Self {
            offset: Some(segment.offset),
            size: Some(segment.size),
            kind: Some(segment.kind.tag().to_string()),
            compressed_size: None,
            compressed_data: segment.compressed.as_ref().map(|c| RawCompressedData {
                kind: Some(c.kind.clone()),
                compressed_size: Some(c.compressed_size),
            }),
            error: None,
        }
    }
}

impl Segment {
    /// Render the segment as a scanner-format JSON line.
    ///
    /// # Errors
    ///
    /// Returns the serializer error if the record cannot be encoded.
    pub fn to_json_line(&self) -> serde_json::Result<String> {
        serde_json::to_string(&RawRecord::from(self))
    }
}
