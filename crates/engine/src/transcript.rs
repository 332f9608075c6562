use serde::{Deserialize, Serialize};

/// One recognized word with its timing in seconds, `[start, end)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptWord {
    pub text: String,
    pub start: f64,
    pub end: f64,
}

/// Output of the transcription service for one media file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Transcript {
    pub duration: f64,
    pub words: Vec<TranscriptWord>,
}

impl Transcript {
    /// Whole seconds covered by the transcript, rounded up.
    pub fn duration_seconds(&self) -> usize {
        if self.duration.is_finite() && self.duration > 0.0 {
            self.duration.ceil() as usize
        } else {
            0
        }
    }
}

/// Seconds in `0..duration` whose `[s, s + 1)` window intersects the word.
fn covered_seconds(word: &TranscriptWord, duration: usize) -> std::ops::Range<usize> {
    if !word.start.is_finite() || !word.end.is_finite() || word.start < 0.0 {
        return 0..0;
    }
    let first = word.start.floor() as usize;
    let last = if word.end <= word.start {
        // zero-length words count as a point
        first + 1
    } else {
        word.end.ceil() as usize
    };
    first.min(duration)..last.min(duration)
}

/// Bucket words into whole-second slots, each rendered as one space-joined
/// string. A word lands in every second its interval overlaps.
pub fn bucket_words(duration: usize, words: &[TranscriptWord]) -> Vec<String> {
    let mut buckets: Vec<Vec<&str>> = vec![Vec::new(); duration];
    for word in words {
        for second in covered_seconds(word, duration) {
            buckets[second].push(word.text.as_str());
        }
    }
    buckets.into_iter().map(|words| words.join(" ")).collect()
}

/// Transcript buckets with the first and last second dropped.
///
/// `buckets[k]` holds the text of clip second `k + 1`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlignedTranscript {
    pub buckets: Vec<String>,
}

impl AlignedTranscript {
    pub const FIRST_SECOND: usize = 1;

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Text spoken during clip-absolute `second`, or `""` outside the
    /// aligned range.
    pub fn at_second(&self, second: usize) -> &str {
        second
            .checked_sub(Self::FIRST_SECOND)
            .and_then(|k| self.buckets.get(k))
            .map(String::as_str)
            .unwrap_or("")
    }
}

/// Bucket `words` over `duration` seconds and trim the unreliable first and
/// last second. The result has `duration - 2` entries, or none when
/// `duration <= 2`.
pub fn align_transcript(duration: usize, words: &[TranscriptWord]) -> AlignedTranscript {
    if duration <= 2 {
        return AlignedTranscript::default();
    }
    let mut buckets = bucket_words(duration, words);
    buckets.pop();
    buckets.remove(0);
    AlignedTranscript { buckets }
}
