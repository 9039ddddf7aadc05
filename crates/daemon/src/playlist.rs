//! Playlist sequencing for the RTMP playout daemon.
//!
//! Produces the next video to play under one of four traversal modes and
//! reports when a full pass over the playlist completes.

use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

/// Error type for playlist construction
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PlaylistError {
    /// The video list was empty
    #[error("Playlist must contain at least one video")]
    Empty,
}

/// One video in a playlist
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoRef {
    /// Absolute path to the media file
    pub path: PathBuf,
    /// Display filename reported to the state store
    pub file_name: String,
}

impl VideoRef {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_else(|| path.to_string_lossy().to_string());
        Self { path, file_name }
    }
}

/// Playlist traversal mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayMode {
    /// Traverse front-to-back once
    PlayOnce,
    /// Traverse front-to-back, restarting from the top indefinitely
    Loop,
    /// Shuffle once at start, then traverse once
    Shuffle,
    /// Shuffle once at start; reshuffle after each completed pass
    ShuffleLoop,
}

impl PlayMode {
    /// Whether traversal restarts after a completed pass
    pub fn is_looping(&self) -> bool {
        matches!(self, PlayMode::Loop | PlayMode::ShuffleLoop)
    }
}

impl std::fmt::Display for PlayMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlayMode::PlayOnce => write!(f, "play_once"),
            PlayMode::Loop => write!(f, "loop"),
            PlayMode::Shuffle => write!(f, "shuffle"),
            PlayMode::ShuffleLoop => write!(f, "shuffle_loop"),
        }
    }
}

impl FromStr for PlayMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "play_once" | "play-once" | "once" => Ok(PlayMode::PlayOnce),
            "loop" => Ok(PlayMode::Loop),
            "shuffle" => Ok(PlayMode::Shuffle),
            "shuffle_loop" | "shuffle-loop" => Ok(PlayMode::ShuffleLoop),
            other => Err(format!("Unknown play mode: {}", other)),
        }
    }
}

/// Forward-only playlist traversal under one mode.
///
/// `next()` hands out the video at the current position and advances. The
/// caller decides when to call it: retrying a failed segment means simply not
/// asking for the next video yet.
#[derive(Debug)]
pub struct PlaylistSequencer {
    videos: Vec<VideoRef>,
    mode: PlayMode,
    index: usize,
}

impl PlaylistSequencer {
    /// Create a sequencer over a non-empty video list.
    ///
    /// Shuffle and ShuffleLoop apply one Fisher-Yates shuffle up front.
    pub fn new(mut videos: Vec<VideoRef>, mode: PlayMode) -> Result<Self, PlaylistError> {
        if videos.is_empty() {
            return Err(PlaylistError::Empty);
        }

        if matches!(mode, PlayMode::Shuffle | PlayMode::ShuffleLoop) {
            videos.shuffle(&mut rand::thread_rng());
        }

        Ok(Self {
            videos,
            mode,
            index: 0,
        })
    }

    /// Number of videos in the playlist
    pub fn len(&self) -> usize {
        self.videos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.videos.is_empty()
    }

    /// Zero-based position of the video `next()` will return. Always in
    /// range under a looping mode; equals `len()` once a non-looping
    /// traversal is exhausted.
    pub fn position(&self) -> usize {
        self.index
    }

    /// Produce the next video and whether it is the last of the current pass.
    ///
    /// Returns None once traversal is exhausted under PlayOnce/Shuffle. Under
    /// Loop the pass restarts from the top; under ShuffleLoop each new pass is
    /// a fresh independent permutation of the same elements. Wrapping happens
    /// as part of the pass-ending call, so `position()` never dangles past
    /// the end between segments.
    pub fn next(&mut self) -> Option<(VideoRef, bool)> {
        if self.index >= self.videos.len() {
            return None;
        }

        let video = self.videos[self.index].clone();
        let last_of_pass = self.index + 1 == self.videos.len();
        self.index += 1;

        if last_of_pass && self.mode.is_looping() {
            if self.mode == PlayMode::ShuffleLoop {
                self.videos.shuffle(&mut rand::thread_rng());
            }
            self.index = 0;
        }

        Some((video, last_of_pass))
    }

    /// The current pass's ordering; ShuffleLoop rewrites this between passes
    pub fn current_order(&self) -> &[VideoRef] {
        &self.videos
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn make_videos(names: &[&str]) -> Vec<VideoRef> {
        names
            .iter()
            .map(|name| VideoRef::new(format!("/videos/{}", name)))
            .collect()
    }

    #[test]
    fn test_empty_playlist_rejected() {
        let result = PlaylistSequencer::new(vec![], PlayMode::Loop);
        assert_eq!(result.err(), Some(PlaylistError::Empty));
    }

    // list=[a.mp4, b.mp4], mode=PLAY_ONCE -> a (not last), b (last), end
    #[test]
    fn test_play_once_scenario() {
        let mut seq =
            PlaylistSequencer::new(make_videos(&["a.mp4", "b.mp4"]), PlayMode::PlayOnce)
                .expect("non-empty");

        let (first, last) = seq.next().expect("first video");
        assert_eq!(first.file_name, "a.mp4");
        assert!(!last);

        let (second, last) = seq.next().expect("second video");
        assert_eq!(second.file_name, "b.mp4");
        assert!(last);

        assert!(seq.next().is_none());
        assert!(seq.next().is_none());
    }

    #[test]
    fn test_loop_restarts_from_front() {
        let mut seq = PlaylistSequencer::new(make_videos(&["a.mp4", "b.mp4"]), PlayMode::Loop)
            .expect("non-empty");

        let names: Vec<String> = (0..6)
            .map(|_| seq.next().expect("loop never ends").0.file_name)
            .collect();
        assert_eq!(names, vec!["a.mp4", "b.mp4", "a.mp4", "b.mp4", "a.mp4", "b.mp4"]);
    }

    #[test]
    fn test_single_video_loop_marks_every_segment_last() {
        let mut seq =
            PlaylistSequencer::new(make_videos(&["only.mp4"]), PlayMode::Loop).expect("non-empty");

        for _ in 0..4 {
            let (video, last) = seq.next().expect("loop never ends");
            assert_eq!(video.file_name, "only.mp4");
            assert!(last);
        }
    }

    #[test]
    fn test_shuffle_preserves_elements_and_ends() {
        let videos = make_videos(&["a.mp4", "b.mp4", "c.mp4", "d.mp4"]);
        let mut seq = PlaylistSequencer::new(videos.clone(), PlayMode::Shuffle).expect("non-empty");

        let mut played: Vec<String> = Vec::new();
        while let Some((video, _)) = seq.next() {
            played.push(video.file_name);
        }

        let mut expected: Vec<String> = videos.into_iter().map(|v| v.file_name).collect();
        played.sort();
        expected.sort();
        assert_eq!(played, expected);
    }

    // Consecutive SHUFFLE_LOOP passes are permutations of the same multiset.
    #[test]
    fn test_shuffle_loop_passes_same_multiset() {
        let videos = make_videos(&["a.mp4", "b.mp4", "c.mp4", "d.mp4", "e.mp4"]);
        let n = videos.len();
        let mut seq = PlaylistSequencer::new(videos, PlayMode::ShuffleLoop).expect("non-empty");

        let mut first_pass: Vec<String> = Vec::new();
        let mut second_pass: Vec<String> = Vec::new();
        for _ in 0..n {
            first_pass.push(seq.next().expect("looping").0.file_name);
        }
        for _ in 0..n {
            second_pass.push(seq.next().expect("looping").0.file_name);
        }

        assert_eq!(first_pass.len(), n);
        assert_eq!(second_pass.len(), n);

        let mut a = first_pass.clone();
        let mut b = second_pass.clone();
        a.sort();
        b.sort();
        assert_eq!(a, b);
    }

    // position() always names the index about to play, including right
    // after a pass boundary, so callers can record it per segment.
    #[test]
    fn test_loop_position_wraps_with_next() {
        let mut seq = PlaylistSequencer::new(make_videos(&["a.mp4", "b.mp4"]), PlayMode::Loop)
            .expect("non-empty");

        for _ in 0..6 {
            let before = seq.position();
            assert!(before < seq.len());
            let (video, _) = seq.next().expect("loop never ends");
            assert_eq!(seq.current_order()[before], video);
        }
        assert_eq!(seq.position(), 0);
    }

    #[test]
    fn test_video_ref_file_name_from_path() {
        let video = VideoRef::new("/media/library/clip one.mp4");
        assert_eq!(video.file_name, "clip one.mp4");
    }

    #[test]
    fn test_play_mode_from_str() {
        assert_eq!("loop".parse::<PlayMode>(), Ok(PlayMode::Loop));
        assert_eq!("shuffle-loop".parse::<PlayMode>(), Ok(PlayMode::ShuffleLoop));
        assert_eq!("PLAY_ONCE".parse::<PlayMode>(), Ok(PlayMode::PlayOnce));
        assert!("random".parse::<PlayMode>().is_err());
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        // For any non-empty list under LOOP, next() always returns a value.
        #[test]
        fn prop_loop_never_ends(
            len in 1usize..20,
            draws in 1usize..200,
        ) {
            let videos: Vec<VideoRef> = (0..len)
                .map(|i| VideoRef::new(format!("/videos/v{}.mp4", i)))
                .collect();
            let mut seq = PlaylistSequencer::new(videos, PlayMode::Loop).unwrap();

            for _ in 0..draws {
                prop_assert!(seq.next().is_some());
            }
        }

        // last_of_pass fires exactly once per pass, at the pass boundary.
        #[test]
        fn prop_last_of_pass_every_len_draws(
            len in 1usize..12,
            passes in 1usize..6,
        ) {
            let videos: Vec<VideoRef> = (0..len)
                .map(|i| VideoRef::new(format!("/videos/v{}.mp4", i)))
                .collect();
            let mut seq = PlaylistSequencer::new(videos, PlayMode::ShuffleLoop).unwrap();

            for _ in 0..passes {
                for position in 0..len {
                    prop_assert!(seq.position() < len);
                    let (_, last) = seq.next().unwrap();
                    prop_assert_eq!(last, position + 1 == len);
                }
            }
        }

        // PlayOnce yields exactly len videos, then end forever.
        #[test]
        fn prop_play_once_exhausts_after_len(len in 1usize..20) {
            let videos: Vec<VideoRef> = (0..len)
                .map(|i| VideoRef::new(format!("/videos/v{}.mp4", i)))
                .collect();
            let mut seq = PlaylistSequencer::new(videos, PlayMode::PlayOnce).unwrap();

            for _ in 0..len {
                prop_assert!(seq.next().is_some());
            }
            prop_assert!(seq.next().is_none());
            prop_assert!(seq.next().is_none());
        }
    }
}
