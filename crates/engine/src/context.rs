use serde::{Deserialize, Serialize};
use std::fmt::Write;

use crate::transcript::AlignedTranscript;
use crate::visual::{FrameStats, VisualContext};

pub const CLIP_SEPARATOR: &str = "\n----------\n";

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ContextError {
    #[error("description for second {found} found at position {position}")]
    OutOfOrder { position: usize, found: u32 },
    #[error("clip {clip_id}: {descriptions} descriptions, {stats} stats, {transcript} transcript slots")]
    LengthMismatch {
        clip_id: String,
        descriptions: usize,
        stats: usize,
        transcript: usize,
    },
}

/// Per-second multi-modal context of one clip. The three per-second
/// sequences are indexed by clip-absolute second and always have equal
/// length.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClipContext {
    pub clip_id: String,
    pub media_id: String,
    /// Position of the clip on the timeline, in seconds.
    pub start_offset: f64,
    /// Source duration in seconds.
    pub duration: f64,
    pub per_second_descriptions: Vec<String>,
    pub per_second_stats: Vec<FrameStats>,
    pub per_second_transcript: Vec<String>,
}

impl ClipContext {
    /// Merge sampler output with the aligned transcript. Transcript text is
    /// placed at its absolute second; seconds it does not cover stay empty.
    pub fn assemble(
        clip_id: impl Into<String>,
        media_id: impl Into<String>,
        start_offset: f64,
        duration: f64,
        visual: VisualContext,
        transcript: &AlignedTranscript,
    ) -> Result<Self, ContextError> {
        let clip_id = clip_id.into();
        if visual.descriptions.len() != visual.stats.len() {
            return Err(ContextError::LengthMismatch {
                clip_id,
                descriptions: visual.descriptions.len(),
                stats: visual.stats.len(),
                transcript: transcript.len(),
            });
        }
        for (position, description) in visual.descriptions.iter().enumerate() {
            if description.second as usize != position {
                return Err(ContextError::OutOfOrder {
                    position,
                    found: description.second,
                });
            }
        }

        let per_second_transcript = (0..visual.len())
            .map(|second| transcript.at_second(second).to_string())
            .collect();

        Ok(ClipContext {
            clip_id,
            media_id: media_id.into(),
            start_offset,
            duration,
            per_second_descriptions: visual.descriptions.into_iter().map(|d| d.text).collect(),
            per_second_stats: visual.stats,
            per_second_transcript,
        })
    }

    pub fn seconds(&self) -> usize {
        self.per_second_descriptions.len()
    }

    /// Check the equal-length invariant on contexts that arrived from outside.
    pub fn validate(&self) -> Result<(), ContextError> {
        let n = self.per_second_descriptions.len();
        if self.per_second_stats.len() != n || self.per_second_transcript.len() != n {
            return Err(ContextError::LengthMismatch {
                clip_id: self.clip_id.clone(),
                descriptions: n,
                stats: self.per_second_stats.len(),
                transcript: self.per_second_transcript.len(),
            });
        }
        Ok(())
    }

    fn render_into(&self, out: &mut String) {
        let _ = writeln!(
            out,
            "clip {} | media {} | start {:.2}s | duration {:.2}s",
            self.clip_id, self.media_id, self.start_offset, self.duration
        );
        for second in 0..self.seconds() {
            let stats = &self.per_second_stats[second];
            let _ = write!(
                out,
                "second {}: visual: {} | brightness {:.1}, saturation {:.1}, contrast {:.1}, rgb ({:.1}, {:.1}, {:.1})",
                second + 1,
                self.per_second_descriptions[second],
                stats.brightness,
                stats.saturation,
                stats.contrast,
                stats.rgb_means.red,
                stats.rgb_means.green,
                stats.rgb_means.blue,
            );
            let _ = write!(
                out,
                ", cast (a {:+.1}, b {:+.1})",
                stats.color_cast.a, stats.color_cast.b
            );
            if stats.grayscale {
                out.push_str(", grayscale");
            }
            let speech = &self.per_second_transcript[second];
            if !speech.is_empty() {
                let _ = write!(out, " | speech: \"{}\"", speech);
            }
            out.push('\n');
        }
    }
}

/// Render clip contexts into one text block for a reasoning prompt.
/// Seconds are 1-indexed within each clip.
pub fn render_context(clips: &[ClipContext]) -> String {
    let mut out = String::new();
    for (i, clip) in clips.iter().enumerate() {
        if i > 0 {
            out.push_str(CLIP_SEPARATOR);
        }
        clip.render_into(&mut out);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transcript::{align_transcript, TranscriptWord};
    use crate::visual::{Frame, FrameDescription};
    use assert_matches::assert_matches;

    fn visual(seconds: u32) -> VisualContext {
        let stats = FrameStats::from_frame(&Frame::solid(2, 2, [10, 20, 30]));
        VisualContext {
            descriptions: (0..seconds)
                .map(|second| FrameDescription { second, text: format!("shot {second}") })
                .collect(),
            stats: vec![stats; seconds as usize],
        }
    }

    fn clip(id: &str, seconds: u32, words: &[TranscriptWord]) -> ClipContext {
        let transcript = align_transcript(seconds as usize, words);
        ClipContext::assemble(id, "media-1", 4.0, seconds as f64, visual(seconds), &transcript)
            .unwrap()
    }

    #[test]
    fn assemble_places_transcript_at_absolute_seconds() {
        let words = vec![
            TranscriptWord { text: "intro".into(), start: 0.2, end: 0.8 },
            TranscriptWord { text: "middle".into(), start: 2.1, end: 2.9 },
            TranscriptWord { text: "outro".into(), start: 4.1, end: 4.9 },
        ];
        let ctx = clip("c1", 5, &words);
        assert_eq!(ctx.per_second_descriptions.len(), 5);
        assert_eq!(ctx.per_second_stats.len(), 5);
        assert_eq!(ctx.per_second_transcript, vec!["", "", "middle", "", ""]);
        assert!(ctx.validate().is_ok());
    }

    #[test]
    fn assemble_rejects_unsorted_descriptions() {
        let mut v = visual(3);
        v.descriptions.swap(0, 2);
        let result = ClipContext::assemble("c", "m", 0.0, 3.0, v, &AlignedTranscript::default());
        assert_matches!(result, Err(ContextError::OutOfOrder { position: 0, found: 2 }));
    }

    #[test]
    fn validate_catches_mismatched_lengths() {
        let mut ctx = clip("c1", 3, &[]);
        ctx.per_second_transcript.pop();
        assert_matches!(ctx.validate(), Err(ContextError::LengthMismatch { transcript: 2, .. }));
    }

    #[test]
    fn render_is_one_indexed_and_annotated() {
        let text = render_context(&[clip("c1", 2, &[])]);
        assert!(text.starts_with("clip c1 | media media-1 | start 4.00s | duration 2.00s\n"));
        assert!(text.contains("second 1: visual: shot 0"));
        assert!(text.contains("second 2: visual: shot 1"));
        assert!(!text.contains("second 0:"));
        assert!(!text.contains("speech"));
        // the fixture frame is (10, 20, 30), a cool blue cast
        assert!(text.contains(", cast (a "));
        assert!(text.contains(", b -"));
    }

    #[test]
    fn render_separates_clips() {
        let text = render_context(&[clip("a", 1, &[]), clip("b", 1, &[])]);
        let parts: Vec<_> = text.split(CLIP_SEPARATOR).collect();
        assert_eq!(parts.len(), 2);
        assert!(parts[0].starts_with("clip a"));
        assert!(parts[1].starts_with("clip b"));
    }

    #[test]
    fn render_includes_speech() {
        let words = vec![TranscriptWord { text: "hey".into(), start: 1.0, end: 1.5 }];
        let text = render_context(&[clip("c", 3, &words)]);
        assert!(text.contains("second 2: visual: shot 1"));
        assert!(text.contains("| speech: \"hey\""));
    }
}
