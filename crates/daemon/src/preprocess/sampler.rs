use async_trait::async_trait;
use engine::visual::{Frame, FrameDescription, FrameStats, SampledFrame, VisualContext};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{CoreError, CoreResult};
use crate::llm::FrameDescriber;

/// A sequential decoder. Frames come out in presentation order.
#[async_trait]
pub trait FrameSource: Send {
    /// Nominal frames per second.
    fn frame_rate(&self) -> f64;

    /// The next decoded frame, or `None` at end of stream.
    async fn next_frame(&mut self) -> CoreResult<Option<Frame>>;
}

/// Sample one frame per whole second of `source` and describe each.
///
/// Decoding stays sequential; stats are computed inline while descriptions
/// run on at most `max_concurrency` tasks. Every description is joined before
/// returning and the result is ordered by second, whatever order the calls
/// finished in. Any failure or cancellation aborts the outstanding calls.
pub async fn sample_video<S: FrameSource + ?Sized>(
    source: &mut S,
    duration_seconds: f64,
    describer: Arc<dyn FrameDescriber>,
    max_concurrency: usize,
    cancel: &CancellationToken,
) -> CoreResult<VisualContext> {
    let rate = source.frame_rate().round();
    if !rate.is_finite() || rate < 1.0 {
        return Err(CoreError::SourceUnreadable(format!(
            "unusable frame rate {}",
            source.frame_rate()
        )));
    }
    let rate = rate as u64;
    let target = if duration_seconds.is_finite() && duration_seconds > 0.0 {
        duration_seconds.floor() as u64
    } else {
        0
    };

    let pool = Arc::new(Semaphore::new(max_concurrency.max(1)));
    let mut pending: JoinSet<CoreResult<FrameDescription>> = JoinSet::new();
    let mut stats = Vec::with_capacity(target as usize);
    let mut frame_count: u64 = 0;

    while (stats.len() as u64) < target {
        let frame = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(CoreError::Cancelled),
            frame = source.next_frame() => frame?,
        };
        let Some(frame) = frame else {
            break;
        };

        if frame_count % rate == 0 {
            let second = (frame_count / rate) as u32;
            stats.push(FrameStats::from_frame(&frame));

            let permit = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(CoreError::Cancelled),
                permit = pool.clone().acquire_owned() => permit
                    .map_err(|_| CoreError::Internal("describe pool closed".to_string()))?,
            };
            let describer = describer.clone();
            pending.spawn(async move {
                let _permit = permit;
                let sampled = SampledFrame { second, frame };
                let text = describer.describe(&sampled).await?;
                Ok(FrameDescription { second, text })
            });
            debug!(second, "frame sampled");
        }
        frame_count += 1;
    }

    if (stats.len() as u64) < target {
        warn!(
            sampled = stats.len(),
            expected = target,
            "source ended before its reported duration, context will be short"
        );
    }

    let mut descriptions = Vec::with_capacity(stats.len());
    loop {
        let joined = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(CoreError::Cancelled),
            joined = pending.join_next() => joined,
        };
        match joined {
            None => break,
            Some(Ok(result)) => descriptions.push(result?),
            Some(Err(e)) => return Err(CoreError::Internal(format!("describe task failed: {e}"))),
        }
    }
    descriptions.sort_by_key(|d| d.second);

    info!(seconds = stats.len(), frames = frame_count, "video sampled");
    Ok(VisualContext {
        descriptions,
        stats,
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Frames whose grey level encodes their index.
    pub(crate) struct SyntheticSource {
        pub rate: f64,
        pub total: u64,
        pub next: u64,
    }

    impl SyntheticSource {
        pub(crate) fn new(rate: f64, total: u64) -> Self {
            SyntheticSource { rate, total, next: 0 }
        }
    }

    #[async_trait]
    impl FrameSource for SyntheticSource {
        fn frame_rate(&self) -> f64 {
            self.rate
        }

        async fn next_frame(&mut self) -> CoreResult<Option<Frame>> {
            if self.next >= self.total {
                return Ok(None);
            }
            let level = (self.next % 256) as u8;
            self.next += 1;
            Ok(Some(Frame::solid(4, 4, [level, level, level])))
        }
    }

    /// Later seconds finish first, and tracks peak concurrency.
    pub(crate) struct SlowDescriber {
        pub in_flight: AtomicUsize,
        pub peak: AtomicUsize,
        pub fail_at: Option<u32>,
    }

    impl SlowDescriber {
        pub(crate) fn new() -> Self {
            SlowDescriber {
                in_flight: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
                fail_at: None,
            }
        }
    }

    #[async_trait]
    impl FrameDescriber for SlowDescriber {
        async fn describe(&self, frame: &SampledFrame) -> CoreResult<String> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            let delay = 40u64.saturating_sub(frame.second as u64 * 5);
            tokio::time::sleep(Duration::from_millis(delay)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            if self.fail_at == Some(frame.second) {
                return Err(CoreError::DescribeUnavailable("vision model down".into()));
            }
            Ok(format!("level {}", frame.frame.data[0]))
        }
    }

    #[tokio::test]
    async fn one_sample_per_second_in_order() {
        let mut source = SyntheticSource::new(10.0, 75);
        let describer = Arc::new(SlowDescriber::new());
        let visual = sample_video(&mut source, 7.5, describer, 8, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(visual.descriptions.len(), 7);
        assert_eq!(visual.stats.len(), 7);
        for (i, description) in visual.descriptions.iter().enumerate() {
            assert_eq!(description.second as usize, i);
            // frame index i * 10 is the first of second i
            assert_eq!(description.text, format!("level {}", i * 10));
            assert!((visual.stats[i].brightness - (i * 10) as f64).abs() < 0.01);
        }
    }

    #[tokio::test]
    async fn frame_rate_is_rounded() {
        let mut source = SyntheticSource::new(29.97, 95);
        let visual = sample_video(
            &mut source,
            3.1,
            Arc::new(SlowDescriber::new()),
            4,
            &CancellationToken::new(),
        )
        .await
        .unwrap();
        let texts: Vec<_> = visual.descriptions.iter().map(|d| d.text.as_str()).collect();
        assert_eq!(texts, vec!["level 0", "level 30", "level 60"]);
    }

    #[tokio::test]
    async fn pool_bounds_concurrency() {
        let mut source = SyntheticSource::new(2.0, 40);
        let describer = Arc::new(SlowDescriber::new());
        sample_video(&mut source, 20.0, describer.clone(), 3, &CancellationToken::new())
            .await
            .unwrap();
        assert!(describer.peak.load(Ordering::SeqCst) <= 3);
        assert!(describer.peak.load(Ordering::SeqCst) >= 2);
    }

    #[tokio::test]
    async fn describe_failure_fails_the_whole_call() {
        let mut source = SyntheticSource::new(5.0, 50);
        let describer = Arc::new(SlowDescriber {
            fail_at: Some(4),
            ..SlowDescriber::new()
        });
        let result = sample_video(&mut source, 10.0, describer, 4, &CancellationToken::new()).await;
        assert_matches!(result, Err(CoreError::DescribeUnavailable(_)));
    }

    #[tokio::test]
    async fn zero_frame_rate_is_unreadable() {
        let mut source = SyntheticSource::new(0.0, 10);
        let result = sample_video(
            &mut source,
            1.0,
            Arc::new(SlowDescriber::new()),
            1,
            &CancellationToken::new(),
        )
        .await;
        assert_matches!(result, Err(CoreError::SourceUnreadable(_)));
    }

    #[tokio::test]
    async fn short_stream_keeps_sequences_parallel() {
        let mut source = SyntheticSource::new(10.0, 25);
        let visual = sample_video(
            &mut source,
            9.0,
            Arc::new(SlowDescriber::new()),
            2,
            &CancellationToken::new(),
        )
        .await
        .unwrap();
        assert_eq!(visual.descriptions.len(), 3);
        assert_eq!(visual.stats.len(), 3);
    }

    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn short_stream_warns_with_both_counts() {
        let logs = CapturedLogs::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::WARN)
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let mut source = SyntheticSource::new(10.0, 25);
        sample_video(
            &mut source,
            9.0,
            Arc::new(SlowDescriber::new()),
            2,
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        let output = String::from_utf8(logs.0.lock().unwrap().clone()).unwrap();
        assert!(output.contains("WARN"), "{output}");
        assert!(output.contains("sampled=3"), "{output}");
        assert!(output.contains("expected=9"), "{output}");
    }

    #[tokio::test]
    async fn cancellation_aborts() {
        let mut source = SyntheticSource::new(1.0, 100);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result =
            sample_video(&mut source, 100.0, Arc::new(SlowDescriber::new()), 2, &cancel).await;
        assert_matches!(result, Err(CoreError::Cancelled));
    }
}
