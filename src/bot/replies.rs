//! Texto de las respuestas del bot.

use crate::{
    audio::EnqueueOutcome,
    jukebox::{PlayError, PlayOutcome},
    track::TrackDescriptor,
};

/// The queue listing stops growing once it passes this many bytes.
pub const QUEUE_LISTING_LIMIT: usize = 1800;

pub const NOT_IN_VOICE: &str = "You must be in a voice channel";
pub const GUILD_NOT_CACHED: &str = "Guild not cached";
pub const JOIN_FAILED: &str = "You must be in a voice channel.";
pub const JOINING_VOICE: &str = "Joining voice channel...";
pub const STOPPED: &str = "⏹ Stopped playback.";
pub const PONG: &str = "Pong!";

pub fn play_status(outcome: &PlayOutcome) -> String {
    if outcome.from_cache {
        format!("♻️ Using cached: **{}**", outcome.track.title)
    } else {
        format!("⬇️ Downloaded: **{}**", outcome.track.title)
    }
}

/// Channel notice for a track that has to wait behind others.
pub fn queued_notice(outcome: &PlayOutcome) -> Option<String> {
    match outcome.enqueue {
        EnqueueOutcome::Queued { position } if position > 1 => Some(format!(
            "✅ Queued: **{}** (position {})",
            outcome.track.title, position
        )),
        _ => None,
    }
}

pub fn play_error(error: &PlayError) -> String {
    match error {
        PlayError::Resolution { .. } => "Could not find a video for your query.".to_string(),
        PlayError::DownloadIncomplete { title, .. } => format!("Download failed for **{title}**."),
    }
}

pub fn skip(skipped: bool) -> &'static str {
    if skipped {
        "⏭ Skipped."
    } else {
        "Nothing playing."
    }
}

pub fn queue_listing(tracks: &[TrackDescriptor]) -> String {
    if tracks.is_empty() {
        return "Queue is empty.".to_string();
    }

    let mut listing = String::from("🎵 **Queue:**\n");
    for (i, track) in tracks.iter().enumerate() {
        listing.push_str(&format!("{}. {}\n", i + 1, track.title));
        if listing.len() > QUEUE_LISTING_LIMIT {
            break;
        }
    }
    listing
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::SourceError;
    use pretty_assertions::assert_eq;

    fn outcome(from_cache: bool, enqueue: EnqueueOutcome) -> PlayOutcome {
        PlayOutcome {
            track: TrackDescriptor::new("Song", "https://yt/song", "/songs/Song.mp3"),
            from_cache,
            enqueue,
        }
    }

    #[test]
    fn test_play_status() {
        assert_eq!(play_status(&outcome(true, EnqueueOutcome::Started)), "♻️ Using cached: **Song**");
        assert_eq!(play_status(&outcome(false, EnqueueOutcome::Started)), "⬇️ Downloaded: **Song**");
    }

    #[test]
    fn test_queued_notice_only_past_first_position() {
        assert_eq!(queued_notice(&outcome(false, EnqueueOutcome::Started)), None);
        assert_eq!(queued_notice(&outcome(false, EnqueueOutcome::Queued { position: 1 })), None);
        assert_eq!(
            queued_notice(&outcome(false, EnqueueOutcome::Queued { position: 3 })).as_deref(),
            Some("✅ Queued: **Song** (position 3)")
        );
    }

    #[test]
    fn test_play_errors() {
        let not_found = PlayError::Resolution {
            query: "q".to_string(),
            source: SourceError::NotFound("q".to_string()),
        };
        assert_eq!(play_error(&not_found), "Could not find a video for your query.");

        let incomplete = PlayError::DownloadIncomplete {
            title: "Song".to_string(),
            path: "/songs/Song.mp3".into(),
        };
        assert_eq!(play_error(&incomplete), "Download failed for **Song**.");
    }

    #[test]
    fn test_skip_replies() {
        assert_eq!(skip(true), "⏭ Skipped.");
        assert_eq!(skip(false), "Nothing playing.");
    }

    #[test]
    fn test_queue_listing() {
        assert_eq!(queue_listing(&[]), "Queue is empty.");

        let tracks = vec![
            TrackDescriptor::new("First", "", "/a.mp3"),
            TrackDescriptor::new("Second", "", "/b.mp3"),
        ];
        assert_eq!(queue_listing(&tracks), "🎵 **Queue:**\n1. First\n2. Second\n");
    }

    #[test]
    fn test_queue_listing_is_truncated() {
        let tracks: Vec<_> = (0..200)
            .map(|i| TrackDescriptor::new(format!("A fairly long song title number {i}"), "", "/x.mp3"))
            .collect();

        let listing = queue_listing(&tracks);
        let lines = listing.lines().count() - 1;

        assert!(lines < tracks.len());
        assert!(listing.len() > QUEUE_LISTING_LIMIT);
        // la línea que cruza el límite se conserva entera
        assert!(listing.len() < QUEUE_LISTING_LIMIT + 60);
        assert!(listing.ends_with('\n'));
    }
}
