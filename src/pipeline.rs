use crate::actuation::{Actuator, ActuatorLink, ServoCommand};
use crate::capture::CaptureSource;
use crate::classify::{ClassCounts, Classification, ContourClassifier, Detection, SizeClass};
use crate::error::LinkError;
use crate::output::{annotate, OutputSink};
use crate::segmentation::Segmenter;
use anyhow::{Context, Result};
use image::RgbImage;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Frames between stats log lines
const STATS_INTERVAL: u64 = 30;

/// Read-only snapshot of one processed frame
#[derive(Debug, Clone)]
pub struct FrameReport {
    pub frame_index: u64,
    /// Dominant class of this frame
    pub dominant: Option<SizeClass>,
    /// Histogram of this frame
    pub counts: ClassCounts,
    /// Histogram since start
    pub totals: ClassCounts,
    pub detected: bool,
    pub detections: Vec<Detection>,
    /// Last class actuated
    pub state: Option<SizeClass>,
    /// Most recent command sent, from this or any earlier frame
    pub last_command: Option<ServoCommand>,
    /// Command sent while processing this frame
    pub sent: Option<ServoCommand>,
    pub acknowledgement: Option<String>,
    pub link_open: bool,
}

/// Everything that persists between frames
pub struct SortingContext<L: ActuatorLink> {
    segmenter: Box<dyn Segmenter>,
    classifier: ContourClassifier,
    actuator: Actuator,
    link: L,
    totals: ClassCounts,
    frames: u64,
}

impl<L: ActuatorLink> SortingContext<L> {
    pub fn new(segmenter: Box<dyn Segmenter>, link: L) -> Self {
        Self {
            segmenter,
            classifier: ContourClassifier::new(),
            actuator: Actuator::new(),
            link,
            totals: ClassCounts::default(),
            frames: 0,
        }
    }

    pub fn link(&self) -> &L {
        &self.link
    }

    pub fn totals(&self) -> ClassCounts {
        self.totals
    }

    /// Segment a frame and classify its contours
    pub fn analyze(&self, frame: &RgbImage) -> Classification {
        let mask = self.segmenter.segment(frame);
        self.classifier.classify_mask(&mask)
    }

    /// Update the actuation state from one frame's classification, sending a
    /// command when the dominant class changed
    pub fn apply(&mut self, classification: Classification) -> Result<FrameReport, LinkError> {
        self.frames += 1;
        self.totals += classification.counts;

        let sent = self.actuator.update(classification.dominant);
        let acknowledgement = match sent {
            Some(command) => self.link.send(command)?,
            None => None,
        };

        let report = FrameReport {
            frame_index: self.frames,
            dominant: classification.dominant,
            counts: classification.counts,
            totals: self.totals,
            detected: classification.detected,
            detections: classification.detections,
            state: self.actuator.state(),
            last_command: self.actuator.last_command(),
            sent,
            acknowledgement,
            link_open: self.link.is_open(),
        };

        tracing::debug!(
            "Frame {}: detected={}, dominant={}, counts={}/{}/{}, state={}",
            report.frame_index,
            report.detected,
            report.dominant.map_or("NONE", SizeClass::label),
            report.counts.small,
            report.counts.medium,
            report.counts.large,
            report.state.map_or("NONE", SizeClass::label)
        );

        Ok(report)
    }

    pub fn process(&mut self, frame: &RgbImage) -> Result<FrameReport, LinkError> {
        let classification = self.analyze(frame);
        self.apply(classification)
    }
}

/// Outcome of a finished run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub frames: u64,
    pub commands: u64,
    pub totals: ClassCounts,
}

/// Process frames until the source ends, `stop` is raised, or `max_frames`
/// frames were handled (0 = no limit)
///
/// Any capture or link failure ends the loop with an error.
pub fn run_pipeline<C, L>(
    capture: &mut C,
    context: &mut SortingContext<L>,
    mut preview: Option<&mut dyn OutputSink>,
    stop: &AtomicBool,
    max_frames: u64,
) -> Result<RunSummary>
where
    C: CaptureSource + ?Sized,
    L: ActuatorLink,
{
    let mut frame_count = 0u64;
    let mut commands = 0u64;
    let mut total_capture_time = Duration::ZERO;
    let mut total_analyze_time = Duration::ZERO;
    let mut total_actuate_time = Duration::ZERO;

    tracing::info!("Starting sorting loop");
    tracing::info!("Press Ctrl+C to stop");

    loop {
        if stop.load(Ordering::SeqCst) {
            tracing::info!("Stop requested");
            break;
        }
        if max_frames > 0 && frame_count >= max_frames {
            tracing::info!("Reached frame limit ({})", max_frames);
            break;
        }

        // Capture frame
        let capture_start = Instant::now();
        let Some(frame) = capture
            .capture_frame()
            .context("Failed to capture frame")?
        else {
            tracing::info!("End of video stream");
            break;
        };
        total_capture_time += capture_start.elapsed();

        // Segment and classify
        let analyze_start = Instant::now();
        let classification = context.analyze(&frame);
        total_analyze_time += analyze_start.elapsed();

        // Actuate
        let actuate_start = Instant::now();
        let report = context
            .apply(classification)
            .context("Failed to drive servos")?;
        total_actuate_time += actuate_start.elapsed();
        if report.sent.is_some() {
            commands += 1;
        }

        if let Some(sink) = preview.as_deref_mut() {
            let mut annotated = frame;
            annotate(&mut annotated, &report.detections);
            if let Err(e) = sink.write_frame(&annotated) {
                tracing::warn!("Preview write failed: {:#}", e);
            }
        }

        frame_count += 1;

        // Log stats every 30 frames
        if frame_count % STATS_INTERVAL == 0 {
            let avg = |total: Duration| total.as_secs_f64() * 1000.0 / frame_count as f64;
            let (capture_ms, analyze_ms, actuate_ms) = (
                avg(total_capture_time),
                avg(total_analyze_time),
                avg(total_actuate_time),
            );
            let total_ms = capture_ms + analyze_ms + actuate_ms;
            let totals = context.totals();

            tracing::info!(
                "Frame {}: capture={:.1}ms, analyze={:.1}ms, actuate={:.1}ms, fps={:.1}, sorted small={} medium={} large={}, link={}",
                frame_count,
                capture_ms,
                analyze_ms,
                actuate_ms,
                1000.0 / total_ms,
                totals.small,
                totals.medium,
                totals.large,
                if report.link_open { "ON" } else { "OFF" }
            );
        }
    }

    Ok(RunSummary {
        frames: frame_count,
        commands,
        totals: context.totals(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segmentation::ColorSegmenter;
    use anyhow::bail;
    use image::Rgb;
    use std::cell::{Cell, RefCell};
    use std::collections::VecDeque;
    use std::rc::Rc;

    const FRAME_SIDE: u32 = 400;

    /// Frame with one green square of `side` pixels, 0 for an empty frame
    fn frame(side: u32) -> RgbImage {
        let range = 20..20 + side;
        RgbImage::from_fn(FRAME_SIDE, FRAME_SIDE, |x, y| {
            if range.contains(&x) && range.contains(&y) {
                Rgb([40, 200, 40])
            } else {
                Rgb([70, 60, 60])
            }
        })
    }

    // traced square areas: 150^2 small, 300^2 medium, 350^2 large
    const SMALL: u32 = 151;
    const MEDIUM: u32 = 301;
    const LARGE: u32 = 351;

    enum Step {
        Frame(RgbImage),
        Fail,
    }

    struct ScriptedCapture {
        steps: VecDeque<Step>,
    }

    impl ScriptedCapture {
        fn new(steps: Vec<Step>) -> Self {
            Self {
                steps: steps.into(),
            }
        }

        fn frames(sides: &[u32]) -> Self {
            Self::new(sides.iter().map(|&s| Step::Frame(frame(s))).collect())
        }

        fn remaining(&self) -> usize {
            self.steps.len()
        }
    }

    impl CaptureSource for ScriptedCapture {
        fn capture_frame(&mut self) -> Result<Option<RgbImage>> {
            match self.steps.pop_front() {
                Some(Step::Frame(frame)) => Ok(Some(frame)),
                Some(Step::Fail) => bail!("camera unplugged"),
                None => Ok(None),
            }
        }

        fn resolution(&self) -> (u32, u32) {
            (FRAME_SIDE, FRAME_SIDE)
        }
    }

    #[derive(Default)]
    struct RecordingLink {
        sent: Rc<RefCell<Vec<ServoCommand>>>,
        released: Rc<Cell<bool>>,
        fail: bool,
    }

    impl ActuatorLink for RecordingLink {
        fn send(&mut self, command: ServoCommand) -> Result<Option<String>, LinkError> {
            if self.fail {
                return Err(LinkError::Closed);
            }
            self.sent.borrow_mut().push(command);
            Ok(Some(format!("ok {command}")))
        }

        fn is_open(&self) -> bool {
            !self.fail
        }
    }

    impl Drop for RecordingLink {
        fn drop(&mut self) {
            self.released.set(true);
        }
    }

    #[derive(Default)]
    struct CountingSink {
        frames: usize,
    }

    impl OutputSink for CountingSink {
        fn write_frame(&mut self, _frame: &RgbImage) -> Result<()> {
            self.frames += 1;
            Ok(())
        }

        fn resolution(&self) -> (u32, u32) {
            (FRAME_SIDE, FRAME_SIDE)
        }
    }

    fn context(link: RecordingLink) -> SortingContext<RecordingLink> {
        SortingContext::new(Box::new(ColorSegmenter::default()), link)
    }

    fn cmd(a: u16, b: u16) -> ServoCommand {
        ServoCommand::new(a, b).unwrap()
    }

    #[test]
    fn test_frames_drive_edge_triggered_commands() {
        let link = RecordingLink::default();
        let sent = link.sent.clone();
        let mut ctx = context(link);
        let mut capture = ScriptedCapture::frames(&[SMALL, SMALL, MEDIUM, 0, MEDIUM, LARGE]);

        let summary = run_pipeline(&mut capture, &mut ctx, None, &AtomicBool::new(false), 0).unwrap();

        assert_eq!(*sent.borrow(), vec![cmd(180, 180), cmd(180, 90), cmd(90, 180)]);
        assert_eq!(summary.frames, 6);
        assert_eq!(summary.commands, 3);
        assert_eq!(summary.totals, ClassCounts { small: 2, medium: 2, large: 1 });
    }

    #[test]
    fn test_report_snapshot() {
        let mut ctx = context(RecordingLink::default());

        let report = ctx.process(&frame(MEDIUM)).unwrap();
        assert_eq!(report.frame_index, 1);
        assert_eq!(report.dominant, Some(SizeClass::Medium));
        assert!(report.detected);
        assert_eq!(report.counts.medium, 1);
        assert_eq!(report.sent, Some(cmd(180, 90)));
        assert_eq!(report.acknowledgement.as_deref(), Some("ok 180,90"));
        assert!(report.link_open);

        let empty = ctx.process(&frame(0)).unwrap();
        assert_eq!(empty.dominant, None);
        assert!(!empty.detected);
        assert_eq!(empty.counts, ClassCounts::default());
        assert_eq!(empty.state, Some(SizeClass::Medium));
        assert_eq!(empty.last_command, Some(cmd(180, 90)));
        assert_eq!(empty.sent, None);
        assert_eq!(empty.totals.medium, 1);
    }

    #[test]
    fn test_gap_sized_object_is_detected_but_not_actuated() {
        let link = RecordingLink::default();
        let sent = link.sent.clone();
        let mut ctx = context(link);

        // 80^2 = 6400 lies between the noise floor and the small band
        let report = ctx.process(&frame(81)).unwrap();
        assert!(report.detected);
        assert_eq!(report.dominant, None);
        assert_eq!(report.detections.len(), 1);
        assert!(sent.borrow().is_empty());
    }

    #[test]
    fn test_stop_flag_prevents_processing() {
        let link = RecordingLink::default();
        let sent = link.sent.clone();
        let mut ctx = context(link);
        let mut capture = ScriptedCapture::frames(&[SMALL]);

        let summary = run_pipeline(&mut capture, &mut ctx, None, &AtomicBool::new(true), 0).unwrap();
        assert_eq!(summary.frames, 0);
        assert_eq!(capture.remaining(), 1);
        assert!(sent.borrow().is_empty());
    }

    #[test]
    fn test_frame_limit() {
        let mut ctx = context(RecordingLink::default());
        let mut capture = ScriptedCapture::frames(&[SMALL, LARGE, SMALL]);

        let summary = run_pipeline(&mut capture, &mut ctx, None, &AtomicBool::new(false), 2).unwrap();
        assert_eq!(summary.frames, 2);
        assert_eq!(capture.remaining(), 1);
    }

    #[test]
    fn test_capture_failure_ends_loop_and_releases_link() {
        let link = RecordingLink::default();
        let released = link.released.clone();
        let sent = link.sent.clone();
        let mut capture = ScriptedCapture::new(vec![
            Step::Frame(frame(SMALL)),
            Step::Fail,
            Step::Frame(frame(LARGE)),
        ]);

        {
            let mut ctx = context(link);
            let result = run_pipeline(&mut capture, &mut ctx, None, &AtomicBool::new(false), 0);
            assert!(result.is_err());
        }

        assert!(released.get());
        assert_eq!(*sent.borrow(), vec![cmd(180, 180)]);
        assert_eq!(capture.remaining(), 1);
    }

    #[test]
    fn test_link_failure_is_fatal() {
        let mut link = RecordingLink::default();
        link.fail = true;
        let mut ctx = context(link);
        let mut capture = ScriptedCapture::frames(&[0, SMALL, MEDIUM]);

        let err = run_pipeline(&mut capture, &mut ctx, None, &AtomicBool::new(false), 0).unwrap_err();
        assert!(format!("{err:#}").contains("Failed to drive servos"));
        assert_eq!(capture.remaining(), 1);
    }

    #[test]
    fn test_preview_receives_every_frame() {
        let mut ctx = context(RecordingLink::default());
        let mut capture = ScriptedCapture::frames(&[SMALL, 0, LARGE]);
        let mut sink = CountingSink::default();

        run_pipeline(
            &mut capture,
            &mut ctx,
            Some(&mut sink as &mut dyn OutputSink),
            &AtomicBool::new(false),
            0,
        )
        .unwrap();
        assert_eq!(sink.frames, 3);
    }
}
