//! Per-frame driver: time uniform, camera damping, render, reschedule.

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use anyhow::Result;

use crate::context::WaterContext;
use crate::render::SceneRenderer;
use crate::uniforms::{self, UniformValue};

/// Monotonic seconds since the clock was first read.
pub trait Clock {
    fn elapsed_secs(&mut self) -> f32;
}

/// Asks the host to run the next iteration on its next display refresh.
pub trait FrameScheduler {
    fn request_frame(&mut self);
}

/// Wall clock that starts on its first read.
#[derive(Debug, Default)]
pub struct MonotonicClock {
    #[cfg(not(target_arch = "wasm32"))]
    start: Option<std::time::Instant>,
    #[cfg(target_arch = "wasm32")]
    start: Option<f64>,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(not(target_arch = "wasm32"))]
impl Clock for MonotonicClock {
    fn elapsed_secs(&mut self) -> f32 {
        let start = *self.start.get_or_insert_with(std::time::Instant::now);
        start.elapsed().as_secs_f32()
    }
}

#[cfg(target_arch = "wasm32")]
impl Clock for MonotonicClock {
    fn elapsed_secs(&mut self) -> f32 {
        let now = web_sys::window()
            .and_then(|window| window.performance())
            .map(|performance| performance.now())
            .unwrap_or(0.0);
        let start = *self.start.get_or_insert(now);
        ((now - start) / 1000.0).max(0.0) as f32
    }
}

/// Shared flag that ends the loop after the current iteration.
#[derive(Debug, Clone, Default)]
pub struct StopHandle(Rc<Cell<bool>>);

impl StopHandle {
    pub fn stop(&self) {
        self.0.set(true);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.get()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Idle,
    Running,
    Stopped,
}

/// One reporting window of frame work, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameReport {
    pub mean_ms: f32,
    pub min_ms: f32,
    pub max_ms: f32,
    pub frames: u32,
}

impl fmt::Display for FrameReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "frame {:.2} ms (min {:.2}, max {:.2}) over {} frames",
            self.mean_ms, self.min_ms, self.max_ms, self.frames
        )
    }
}

/// Time spent between `begin` and `end` of each frame, summarized once per second.
#[derive(Debug, Default)]
pub struct FrameStats {
    started: Option<f32>,
    window_start: Option<f32>,
    frames: u32,
    total: f32,
    min: f32,
    max: f32,
    latest: Option<FrameReport>,
}

impl FrameStats {
    const REPORT_INTERVAL: f32 = 1.0;

    pub fn begin(&mut self, now: f32) {
        self.started = Some(now);
        self.window_start.get_or_insert(now);
    }

    /// Closes the frame opened by `begin`. Returns the report when a window completed.
    pub fn end(&mut self, now: f32) -> Option<FrameReport> {
        let started = self.started.take()?;
        let work = (now - started).max(0.0);
        if self.frames == 0 {
            self.min = work;
            self.max = work;
        } else {
            self.min = self.min.min(work);
            self.max = self.max.max(work);
        }
        self.total += work;
        self.frames += 1;

        let window_start = self.window_start?;
        if now - window_start < Self::REPORT_INTERVAL {
            return None;
        }
        let report = FrameReport {
            mean_ms: self.total / self.frames as f32 * 1000.0,
            min_ms: self.min * 1000.0,
            max_ms: self.max * 1000.0,
            frames: self.frames,
        };
        log::debug!("{report}");
        self.window_start = Some(now);
        self.frames = 0;
        self.total = 0.0;
        self.latest = Some(report);
        Some(report)
    }

    /// Most recent completed window.
    pub fn latest(&self) -> Option<FrameReport> {
        self.latest
    }
}

pub struct FrameLoop<C: Clock> {
    clock: C,
    state: LoopState,
    stats: FrameStats,
    stop: StopHandle,
}

impl<C: Clock> FrameLoop<C> {
    pub fn new(clock: C) -> Self {
        Self {
            clock,
            state: LoopState::Idle,
            stats: FrameStats::default(),
            stop: StopHandle::default(),
        }
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    pub fn stats(&self) -> &FrameStats {
        &self.stats
    }

    /// Runs one iteration. The next one is requested only after rendering
    /// returns, and never once the stop handle has fired.
    pub fn tick(
        &mut self,
        ctx: &mut WaterContext,
        renderer: &mut impl SceneRenderer,
        scheduler: &mut impl FrameScheduler,
    ) -> Result<()> {
        if self.state == LoopState::Stopped {
            return Ok(());
        }
        self.state = LoopState::Running;

        let elapsed = self.clock.elapsed_secs();
        ctx.uniforms
            .set(uniforms::TIME, UniformValue::Float(elapsed))?;
        self.stats.begin(elapsed);
        ctx.controls.update(&mut ctx.scene.camera);
        renderer.render(&ctx.scene, &ctx.uniforms)?;
        self.stats.end(self.clock.elapsed_secs());

        if self.stop.is_stopped() {
            log::info!("frame loop stopped");
            self.state = LoopState::Stopped;
        } else {
            scheduler.request_frame();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::WaterScene;
    use crate::uniforms::UniformStore;
    use crate::viewport::StaticViewport;
    use std::collections::VecDeque;

    struct ScriptedClock(VecDeque<f32>);

    impl Clock for ScriptedClock {
        fn elapsed_secs(&mut self) -> f32 {
            self.0.pop_front().unwrap_or(f32::NAN)
        }
    }

    #[derive(Default)]
    struct RecordingRenderer {
        times: Vec<f32>,
    }

    impl SceneRenderer for RecordingRenderer {
        fn render(&mut self, _scene: &WaterScene, uniforms: &UniformStore) -> Result<()> {
            self.times.push(uniforms.float(uniforms::TIME)?);
            Ok(())
        }
    }

    #[derive(Default)]
    struct CountingScheduler(usize);

    impl FrameScheduler for CountingScheduler {
        fn request_frame(&mut self) {
            self.0 += 1;
        }
    }

    fn context() -> WaterContext {
        WaterContext::assemble(&StaticViewport::new(800, 600, 1.0)).unwrap()
    }

    #[test]
    fn time_uniform_follows_clock_readings() {
        let mut ctx = context();
        let clock = ScriptedClock(VecDeque::from([0.0, 0.001, 0.016, 0.017, 0.033, 0.034]));
        let mut frames = FrameLoop::new(clock);
        let mut renderer = RecordingRenderer::default();
        let mut scheduler = CountingScheduler::default();
        assert_eq!(frames.state(), LoopState::Idle);

        for _ in 0..3 {
            frames.tick(&mut ctx, &mut renderer, &mut scheduler).unwrap();
        }

        assert_eq!(renderer.times, vec![0.0, 0.016, 0.033]);
        assert!(renderer.times.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(scheduler.0, 3);
        assert_eq!(frames.state(), LoopState::Running);
        assert_eq!(ctx.uniforms.float(uniforms::TIME).unwrap(), 0.033);
    }

    #[test]
    fn stop_prevents_rescheduling() {
        let mut ctx = context();
        let mut frames = FrameLoop::new(ScriptedClock(VecDeque::from([0.0, 0.01, 0.5, 0.51])));
        let mut renderer = RecordingRenderer::default();
        let mut scheduler = CountingScheduler::default();

        frames.tick(&mut ctx, &mut renderer, &mut scheduler).unwrap();
        frames.stop_handle().stop();
        frames.tick(&mut ctx, &mut renderer, &mut scheduler).unwrap();
        frames.tick(&mut ctx, &mut renderer, &mut scheduler).unwrap();

        assert_eq!(scheduler.0, 1);
        assert_eq!(renderer.times.len(), 2);
        assert_eq!(frames.state(), LoopState::Stopped);
    }

    #[test]
    fn damping_keeps_settling_between_frames() {
        let mut ctx = context();
        ctx.controls.rotate(glam::Vec2::new(120.0, 0.0), 600.0);
        let mut frames = FrameLoop::new(ScriptedClock(VecDeque::from([0.0, 0.001, 0.016, 0.017])));
        let mut renderer = RecordingRenderer::default();
        let mut scheduler = CountingScheduler::default();

        frames.tick(&mut ctx, &mut renderer, &mut scheduler).unwrap();
        let first = ctx.scene.camera.position;
        frames.tick(&mut ctx, &mut renderer, &mut scheduler).unwrap();
        assert_ne!(ctx.scene.camera.position, first);
    }

    #[test]
    fn stats_report_once_per_second() {
        let mut stats = FrameStats::default();
        let mut reports = 0;
        for frame in 0..=130 {
            let start = frame as f32 / 60.0;
            stats.begin(start);
            if stats.end(start + 0.002).is_some() {
                reports += 1;
            }
        }
        assert_eq!(reports, 2);
        assert!(stats.latest().is_some());
    }

    #[test]
    fn stats_measure_work_not_frame_spacing() {
        let mut ctx = context();
        let clock = ScriptedClock(VecDeque::from([0.0, 0.004, 0.5, 0.504, 1.0, 1.004]));
        let mut frames = FrameLoop::new(clock);
        let mut renderer = RecordingRenderer::default();
        let mut scheduler = CountingScheduler::default();

        for _ in 0..3 {
            frames.tick(&mut ctx, &mut renderer, &mut scheduler).unwrap();
        }

        let report = frames.stats().latest().unwrap();
        assert_eq!(report.frames, 3);
        assert!((report.mean_ms - 4.0).abs() < 0.01, "{report}");
        assert!(report.max_ms < 5.0);
        assert_eq!(renderer.times, vec![0.0, 0.5, 1.0]);
    }

    #[test]
    fn end_without_begin_is_ignored() {
        let mut stats = FrameStats::default();
        assert_eq!(stats.end(2.0), None);
        assert_eq!(stats.latest(), None);
    }
}
