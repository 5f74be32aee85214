use crate::error::{ErrorKind, Result};
use derive_more::Display;
use std::ops::Range;
use std::str::FromStr;

pub const LINK_NSID: &str = "app.bsky.richtext.facet#link";
pub const MENTION_NSID: &str = "app.bsky.richtext.facet#mention";
pub const TAG_NSID: &str = "app.bsky.richtext.facet#tag";

/// Byte range into the post text, end exclusive.
///
/// Offsets count UTF-8 bytes, not characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize), serde(rename_all = "camelCase"))]
pub struct ByteSlice {
    pub byte_start: usize,
    pub byte_end: usize,
}

impl ByteSlice {
    pub fn range(&self) -> Range<usize> {
        self.byte_start..self.byte_end
    }
}

impl From<Range<usize>> for ByteSlice {
    fn from(range: Range<usize>) -> Self {
        Self { byte_start: range.start, byte_end: range.end }
    }
}

/// An annotation over a span of the post text.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Facet {
    pub index: ByteSlice,
    pub features: Vec<Feature>,
}

impl Facet {
    pub fn new(range: Range<usize>, feature: Feature) -> Self {
        Self { index: range.into(), features: vec![feature] }
    }

    pub fn link(range: Range<usize>, uri: impl Into<String>) -> Self {
        Self::new(range, Feature::Link { uri: uri.into() })
    }

    pub fn tag(range: Range<usize>, tag: impl Into<String>) -> Self {
        Self::new(range, Feature::Tag { tag: tag.into() })
    }
}

/// What a facet means. Only the kinds the encoder emits are representable.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize), serde(tag = "$type"))]
pub enum Feature {
    #[cfg_attr(feature = "serde", serde(rename = "app.bsky.richtext.facet#link"))]
    Link { uri: String },
    /// Tag text without the leading `#`.
    #[cfg_attr(feature = "serde", serde(rename = "app.bsky.richtext.facet#tag"))]
    Tag { tag: String },
}

impl Feature {
    /// Build a feature of `kind` carrying `value`.
    ///
    /// Fails with [`UnsupportedFeature`](ErrorKind::UnsupportedFeature) for
    /// mentions: those need a resolved DID, which the encoder never has.
    pub fn of_kind(kind: FeatureKind, value: impl Into<String>) -> Result<Self> {
        match kind {
            FeatureKind::Link => Ok(Self::Link { uri: value.into() }),
            FeatureKind::Tag => Ok(Self::Tag { tag: value.into() }),
            FeatureKind::Mention => exn::bail!(ErrorKind::UnsupportedFeature(kind.to_string())),
        }
    }

    pub fn kind(&self) -> FeatureKind {
        match self {
            Self::Link { .. } => FeatureKind::Link,
            Self::Tag { .. } => FeatureKind::Tag,
        }
    }
}

/// Facet feature kinds by their lexicon identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display)]
pub enum FeatureKind {
    #[default]
    #[display("{}", LINK_NSID)]
    Link,
    #[display("{}", MENTION_NSID)]
    Mention,
    #[display("{}", TAG_NSID)]
    Tag,
}

impl FromStr for FeatureKind {
    type Err = crate::error::Error;

    /// Accepts the full lexicon identifier or the short name after `#`.
    fn from_str(s: &str) -> Result<Self> {
        match s.rsplit_once('#').map_or(s, |(_, short)| short) {
            "link" => Ok(Self::Link),
            "mention" => Ok(Self::Mention),
            "tag" => Ok(Self::Tag),
            _ => exn::bail!(ErrorKind::UnsupportedFeature(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("link", FeatureKind::Link)]
    #[case("app.bsky.richtext.facet#tag", FeatureKind::Tag)]
    #[case("app.bsky.richtext.facet#mention", FeatureKind::Mention)]
    fn test_parse_kind(#[case] input: &str, #[case] expected: FeatureKind) {
        assert_eq!(input.parse::<FeatureKind>().unwrap(), expected);
    }

    #[test]
    fn test_unknown_kind_rejected() {
        let err = "app.bsky.richtext.facet#bold".parse::<FeatureKind>().unwrap_err();
        assert!(matches!(&*err, ErrorKind::UnsupportedFeature(s) if s.ends_with("#bold")));
    }

    #[test]
    fn test_mention_fails_loudly() {
        let err = Feature::of_kind(FeatureKind::Mention, "did:plc:abc").unwrap_err();
        assert_eq!(*err, ErrorKind::UnsupportedFeature(MENTION_NSID.to_string()));
    }

    #[test]
    fn test_of_kind() {
        assert_eq!(Feature::of_kind(FeatureKind::Tag, "go").unwrap(), Feature::Tag { tag: "go".to_string() });
        assert_eq!(Feature::of_kind(FeatureKind::Link, "https://x").unwrap().kind(), FeatureKind::Link);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_wire_shape() {
        let facets = [Facet::link(0..6, "https://github.com/user/repo"), Facet::tag(10..13, "go")];
        let json = serde_json::to_value(facets).unwrap();
        assert_eq!(
            json,
            serde_json::json!([
                {
                    "index": { "byteStart": 0, "byteEnd": 6 },
                    "features": [{ "$type": "app.bsky.richtext.facet#link", "uri": "https://github.com/user/repo" }],
                },
                {
                    "index": { "byteStart": 10, "byteEnd": 13 },
                    "features": [{ "$type": "app.bsky.richtext.facet#tag", "tag": "go" }],
                },
            ])
        );
    }

    #[cfg(feature = "serde")]
    #[rstest]
    #[case(Feature::Link { uri: "https://github.com/user/repo".to_string() })]
    #[case(Feature::Tag { tag: "go".to_string() })]
    fn test_type_matches_kind(#[case] feature: Feature) {
        let json = serde_json::to_value(&feature).unwrap();
        assert_eq!(json["$type"], feature.kind().to_string());
    }

    #[test]
    fn test_kind_display() {
        assert_eq!(FeatureKind::Link.to_string(), LINK_NSID);
        assert_eq!(FeatureKind::Mention.to_string(), MENTION_NSID);
        assert_eq!(FeatureKind::Tag.to_string(), TAG_NSID);
    }
}
