pub mod sampler;

use engine::transcript::{align_transcript, AlignedTranscript};
use engine::visual::VisualContext;
use engine::ClipContext;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::{CoreError, CoreResult};
use crate::llm::{FrameDescriber, Transcriber};
use crate::media::compute_file_checksum;
use crate::media::ffmpeg::{sample_dimensions, FFmpegWrapper, MediaInfo};
use sampler::sample_video;

/// One clip to preprocess.
#[derive(Debug, Clone)]
pub struct ClipSource {
    pub path: PathBuf,
    pub clip_id: String,
    /// Timeline position of the clip, in seconds.
    pub start_offset: f64,
}

/// Turns a video file into its per-second `ClipContext`.
pub struct Preprocessor {
    describer: Arc<dyn FrameDescriber>,
    transcriber: Arc<dyn Transcriber>,
    describe_concurrency: usize,
    sample_width: u32,
    cache_dir: PathBuf,
}

impl Preprocessor {
    pub fn new(
        describer: Arc<dyn FrameDescriber>,
        transcriber: Arc<dyn Transcriber>,
        describe_concurrency: usize,
        sample_width: u32,
        cache_dir: PathBuf,
    ) -> Self {
        Preprocessor {
            describer,
            transcriber,
            describe_concurrency,
            sample_width,
            cache_dir,
        }
    }

    pub async fn preprocess(
        &self,
        clip: &ClipSource,
        cancel: &CancellationToken,
    ) -> CoreResult<ClipContext> {
        let info = FFmpegWrapper::probe(&clip.path).await?;
        let media_id = compute_file_checksum(&clip.path).await?;
        info!(
            clip_id = %clip.clip_id,
            duration = info.duration_seconds,
            fps = info.frame_rate,
            has_audio = info.has_audio,
            "preprocessing clip"
        );

        let (visual, transcript) = futures::try_join!(
            self.sample(&clip.path, &info, cancel),
            self.transcribe(&clip.path, &media_id, &info),
        )?;

        let context = ClipContext::assemble(
            clip.clip_id.clone(),
            media_id,
            clip.start_offset,
            info.duration_seconds,
            visual,
            &transcript,
        )?;
        info!(clip_id = %clip.clip_id, seconds = context.seconds(), "clip context ready");
        Ok(context)
    }

    async fn sample(
        &self,
        path: &Path,
        info: &MediaInfo,
        cancel: &CancellationToken,
    ) -> CoreResult<VisualContext> {
        let (width, height) = sample_dimensions(info, self.sample_width);
        let mut reader = FFmpegWrapper::open_frames(path, info.frame_rate, width, height)?;
        sample_video(
            &mut reader,
            info.duration_seconds,
            self.describer.clone(),
            self.describe_concurrency,
            cancel,
        )
        .await
    }

    /// Per-request WAV location. Clips cut from one source share a media id,
    /// so the name also carries a fresh uuid.
    fn scratch_audio_path(&self, media_id: &str) -> PathBuf {
        self.cache_dir
            .join(format!("{media_id}-{}.wav", uuid::Uuid::new_v4()))
    }

    async fn transcribe(
        &self,
        path: &Path,
        media_id: &str,
        info: &MediaInfo,
    ) -> CoreResult<AlignedTranscript> {
        if !info.has_audio {
            return Ok(AlignedTranscript::default());
        }
        let audio_path = self.scratch_audio_path(media_id);
        FFmpegWrapper::extract_audio(path, &audio_path).await?;

        let result = self.transcriber.transcribe(&audio_path).await;
        if let Err(e) = tokio::fs::remove_file(&audio_path).await {
            warn!(path = %audio_path.display(), error = %e, "could not remove extracted audio");
        }
        let transcript = result?;
        Ok(align_transcript(transcript.duration_seconds(), &transcript.words))
    }
}

/// Validate contexts that came back from a client before rendering them.
pub fn validate_contexts(clips: &[ClipContext]) -> CoreResult<()> {
    for clip in clips {
        clip.validate().map_err(CoreError::InvalidContext)?;
    }
    Ok(())
}
