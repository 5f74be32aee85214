//! The step between discovery and publishing.

use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use ossky_bluesky::Publish;
use ossky_bluesky::error::ErrorKind as PublishErrorKind;
use ossky_discovery::{Content, ContentProvider};
use ossky_richtext::error::ErrorKind as EncodeErrorKind;
use ossky_richtext::{EncoderOptions, PostDraft, encode};

const AUTHOR_MARKER: &str = "Author: @";
const STAR: char = '⭐';

/// Ask `provider` for one project and hand it to `publisher`.
///
/// Provider failures are logged here and come back as
/// [`ErrorKind::CouldNotContent`]. A project that cannot be turned into a
/// post, or that Bluesky refuses as malformed, is [`ErrorKind::Rejected`].
/// Any other publisher error means the session is unusable.
pub async fn publish_next(provider: &dyn ContentProvider, publisher: &dyn Publish) -> Result<()> {
    let content = match provider.content_to_publish().await {
        Ok(Some(content)) => content,
        Ok(None) => {
            tracing::debug!("Nothing found");
            return Ok(());
        },
        Err(e) => {
            tracing::error!(error = ?e, "Error fetching content");
            exn::bail!(ErrorKind::CouldNotContent);
        },
    };
    let draft = fit(draft(content)).inspect_err(|e| tracing::warn!(error = ?e, "Project does not fit in a post; skipping"))?;
    match publisher.post(&draft).await {
        Ok(()) => Ok(()),
        Err(e) if matches!(&*e, PublishErrorKind::Encode | PublishErrorKind::Malformed { .. }) => {
            tracing::warn!(title = %draft.title, "Post refused; skipping project");
            Err(e).or_raise(|| ErrorKind::Rejected)
        },
        Err(e) => Err(e).or_raise(|| ErrorKind::Publish),
    }
}

/// Drop hashtags from the end until `draft` encodes.
///
/// Post length does not depend on the encoder options, so the defaults stand
/// in for whatever the publisher uses.
fn fit(mut draft: PostDraft) -> Result<PostDraft> {
    loop {
        let err = match encode(&draft, &EncoderOptions::default()) {
            Ok(_) => return Ok(draft),
            Err(err) => err,
        };
        let too_long = matches!(&*err, EncodeErrorKind::TooLong { .. });
        let Some(hashtags) = draft.hashtags.as_deref().filter(|_| too_long) else {
            return Err(err).or_raise(|| ErrorKind::Rejected);
        };
        let shorter = hashtags.trim_end().rsplit_once(char::is_whitespace).map(|(rest, _)| rest.trim_end().to_string());
        tracing::debug!(error = ?err, hashtags = ?shorter, "Dropping a hashtag");
        draft.hashtags = shorter;
    }
}

/// Pick the author, stargazer and hashtag lines out of the extra data.
pub fn draft(content: Content) -> PostDraft {
    let mut draft = PostDraft::new(content.title, content.url).with_description(content.subtitle);
    for line in &content.extra_data {
        if line.contains(AUTHOR_MARKER) {
            draft = draft.with_author(line.replacen("Author: ", "", 1));
        }
        if line.contains('#') {
            draft = draft.with_hashtags(line.trim());
        } else if line.contains(STAR) {
            draft = draft.with_stargazers(line.as_str());
        }
    }
    draft
}
