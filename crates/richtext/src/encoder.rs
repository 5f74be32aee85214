use crate::draft::PostDraft;
use crate::error::{ErrorKind, Result};
use crate::facet::{Facet, Feature, FeatureKind};
use tracing::instrument;

/// Hard limit on post text, in bytes.
pub const MAX_POST_BYTES: usize = 300;
/// Kept free at the end of every post.
const RESERVED_BYTES: usize = 3;
const DESCRIPTION_MAX_BYTES: usize = 150;
const DESCRIPTION_CUT_BYTES: usize = 147;
const ELLIPSIS: &str = "...";
const BLOCK_SEPARATOR: &str = "\n\n";
const PROFILE_BASE_URL: &str = "https://github.com/";

/// Where the stargazer count goes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "kebab-case")
)]
pub enum StargazerPlacement {
    /// Right after the title and author: `title by @a (12 ⭐)`.
    #[default]
    BeforeDescription,
    /// After the description, before the hashtags.
    AfterDescription,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EncoderOptions {
    pub stargazers: StargazerPlacement,
    /// How the author handle is annotated. Only links are supported.
    pub author_feature: FeatureKind,
}

/// Post text and its facets, ready to go into a record.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct EncodedPost {
    pub text: String,
    pub facets: Vec<Facet>,
}

/// Assemble the post text for `draft` and annotate it.
///
/// The layout is
///
/// ```text
/// <title> by <author> (<stargazers>)
///
/// <description>
///
/// <#hashtags>
/// ```
///
/// with every optional part dropped when absent. The title is a link to the
/// project URL and the author a link to their GitHub profile. Each hashtag
/// gets a tag facet. All facet offsets are UTF-8 byte offsets into the
/// returned text.
///
/// The description is the only part that gets shortened: whitespace is
/// collapsed, anything over 150 bytes is cut to 147 bytes plus `...`, and it
/// shrinks further (or disappears) when the rest of the post leaves less
/// room. Everything else is the caller's to keep short; a post that still
/// ends up over [`MAX_POST_BYTES`] is an error, never silently truncated.
///
/// # Examples
///
/// ```
/// use ossky_richtext::{EncoderOptions, PostDraft, encode};
///
/// let draft = PostDraft::new("ossky", "https://github.com/user/ossky").with_hashtags("#rust");
/// let post = encode(&draft, &EncoderOptions::default()).unwrap();
/// assert_eq!(post.text, "ossky\n\n#rust");
/// assert_eq!(post.facets.len(), 2);
/// ```
#[instrument(level = "debug", skip_all, fields(title = %draft.title))]
pub fn encode(draft: &PostDraft, options: &EncoderOptions) -> Result<EncodedPost> {
    if draft.title.is_empty() {
        exn::bail!(ErrorKind::MissingField("title"));
    }
    if draft.url.is_empty() {
        exn::bail!(ErrorKind::MissingField("url"));
    }

    let mut text = draft.title.clone();
    let mut facets = vec![Facet::link(0..text.len(), draft.url.as_str())];

    if let Some(author) = draft.author() {
        let feature = match options.author_feature {
            FeatureKind::Tag => exn::bail!(ErrorKind::UnsupportedFeature(FeatureKind::Tag.to_string())),
            kind => Feature::of_kind(kind, profile_url(author))?,
        };
        text.push_str(" by ");
        let start = text.len();
        text.push_str(author);
        facets.push(Facet::new(start..text.len(), feature));
    }

    let stargazers = draft.stargazers().map(|count| format!(" ({count})"));
    let tokens: Vec<&str> = draft.hashtags().map(|tags| tags.split_whitespace().collect()).unwrap_or_default();
    let hashtags = tokens.join(" ");

    let mut tail = 0;
    match (&stargazers, options.stargazers) {
        (Some(suffix), StargazerPlacement::BeforeDescription) => text.push_str(suffix),
        (Some(suffix), StargazerPlacement::AfterDescription) => tail += suffix.len(),
        (None, _) => {},
    }
    if !hashtags.is_empty() {
        tail += BLOCK_SEPARATOR.len() + hashtags.len();
    }

    let budget = MAX_POST_BYTES - RESERVED_BYTES;
    if text.len() < budget {
        let room = budget.saturating_sub(text.len() + BLOCK_SEPARATOR.len() + tail);
        if let Some(description) = description_block(&draft.description, room) {
            text.push_str(BLOCK_SEPARATOR);
            text.push_str(&description);
        }
    }

    if let (Some(suffix), StargazerPlacement::AfterDescription) = (&stargazers, options.stargazers) {
        text.push_str(suffix);
    }

    if !hashtags.is_empty() {
        text.push_str(BLOCK_SEPARATOR);
        // Tokens are rejoined with single spaces above, so walking a cursor
        // lands exactly on each one.
        let mut cursor = text.len();
        text.push_str(&hashtags);
        for token in tokens {
            let tag = token.trim_start_matches('#');
            if !tag.is_empty() {
                facets.push(Facet::tag(cursor..cursor + token.len(), tag));
            }
            cursor += token.len() + 1;
        }
    }

    if text.len() > MAX_POST_BYTES {
        exn::bail!(ErrorKind::TooLong { length: text.len(), limit: MAX_POST_BYTES });
    }
    tracing::debug!(length = text.len(), facets = facets.len(), "Encoded post");
    Ok(EncodedPost { text, facets })
}

fn profile_url(author: &str) -> String {
    format!("{PROFILE_BASE_URL}{}", author.strip_prefix('@').unwrap_or(author))
}

/// Whitespace-collapsed description that fits in `room` bytes, or `None` if
/// there is nothing worth showing.
fn description_block(description: &str, room: usize) -> Option<String> {
    let normalized = description.split_whitespace().collect::<Vec<_>>().join(" ");
    if normalized.is_empty() {
        return None;
    }
    if normalized.len() <= DESCRIPTION_MAX_BYTES && normalized.len() <= room {
        return Some(normalized);
    }
    let cut = floor_char_boundary(&normalized, DESCRIPTION_CUT_BYTES.min(room.checked_sub(ELLIPSIS.len())?));
    if cut == 0 {
        return None;
    }
    Some(format!("{}{ELLIPSIS}", &normalized[..cut]))
}

fn floor_char_boundary(s: &str, index: usize) -> usize {
    if index >= s.len() {
        return s.len();
    }
    (0..=index).rev().find(|&i| s.is_char_boundary(i)).unwrap_or(0)
}
