use std::time::Duration;

/// Frame rate and primary ray throughput averaged over the last full second.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FrameRate {
    pub fps: f32,
    pub mrays_per_second: f32,
}

impl FrameRate {
    /// One primary ray per pixel.
    pub fn new(frames: u32, elapsed: Duration, width: u32, height: u32) -> Self {
        let seconds = elapsed.as_secs_f32();
        if seconds <= 0.0 {
            return Self::default();
        }
        let fps = frames as f32 / seconds;

        Self {
            fps,
            mrays_per_second: width as f32 * height as f32 * fps / 1e6,
        }
    }

    pub fn summary(&self, api_label: &str) -> String {
        format!(
            "{api_label} FPS: {:.2}     ~Million Primary Rays/s: {:.2}",
            self.fps, self.mrays_per_second
        )
    }

    pub fn window_title(&self, app_name: &str, api_label: &str, gpu_name: &str) -> String {
        format!("{app_name} {}  GPU: {gpu_name}", self.summary(api_label))
    }
}

#[derive(Debug)]
pub struct FrameStats {
    // we collect gpu timings the frame after it was computed
    // so we keep frame times for the two last frames
    previous_frame_time: Duration,
    pub frame_time: Duration,
    pub cpu_time: Duration,
    pub gpu_time: Duration,
    pub frame_time_ms_log: Queue<f32>,
    pub cpu_time_ms_log: Queue<f32>,
    pub gpu_time_ms_log: Queue<f32>,
    pub total_frame_count: u64,
    frame_count: u32,
    timer: Duration,
    pub rate: FrameRate,
}

impl Default for FrameStats {
    fn default() -> Self {
        Self {
            previous_frame_time: Default::default(),
            frame_time: Default::default(),
            cpu_time: Default::default(),
            gpu_time: Default::default(),
            frame_time_ms_log: Queue::new(FrameStats::MAX_LOG_SIZE),
            cpu_time_ms_log: Queue::new(FrameStats::MAX_LOG_SIZE),
            gpu_time_ms_log: Queue::new(FrameStats::MAX_LOG_SIZE),
            total_frame_count: 0,
            frame_count: 0,
            timer: Duration::ZERO,
            rate: FrameRate::default(),
        }
    }
}

impl FrameStats {
    const ONE_SEC: Duration = Duration::from_secs(1);
    const MAX_LOG_SIZE: usize = 1000;

    /// Counts one frame rendered at `width` x `height`.
    ///
    /// Returns true when a full second elapsed and [`FrameStats::rate`] was refreshed.
    pub fn tick(&mut self, width: u32, height: u32) -> bool {
        self.cpu_time = self.previous_frame_time.saturating_sub(self.gpu_time);

        self.frame_time_ms_log
            .push(self.previous_frame_time.as_secs_f32() * 1000.0);
        self.cpu_time_ms_log.push(self.cpu_time.as_secs_f32() * 1000.0);
        self.gpu_time_ms_log.push(self.gpu_time.as_secs_f32() * 1000.0);

        self.total_frame_count += 1;
        self.frame_count += 1;
        self.timer += self.frame_time;

        if self.timer < FrameStats::ONE_SEC {
            return false;
        }

        self.rate = FrameRate::new(self.frame_count, self.timer, width, height);
        self.frame_count = 0;
        self.timer = Duration::ZERO;
        true
    }

    pub fn set_frame_time(&mut self, frame_time: Duration) {
        self.previous_frame_time = self.frame_time;
        self.frame_time = frame_time;
    }

    pub fn set_gpu_time(&mut self, gpu_time: Duration) {
        self.gpu_time = gpu_time;
    }
}

/// Fixed size log, dropping the oldest value once full.
#[derive(Debug)]
pub struct Queue<T>(Vec<T>, usize);

impl<T> Queue<T> {
    pub fn new(max_size: usize) -> Self {
        Self(Vec::with_capacity(max_size), max_size)
    }

    pub fn push(&mut self, value: T) {
        if self.0.len() == self.1 {
            self.0.remove(0);
        }
        self.0.push(value);
    }

    pub fn values(&self) -> &[T] {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rays_per_second_from_resolution() {
        let rate = FrameRate::new(60, Duration::from_secs(1), 1280, 720);

        assert!((rate.fps - 60.0).abs() < 1e-4);
        assert!((rate.mrays_per_second - 55.296).abs() < 1e-3);
    }

    #[test]
    fn rate_normalizes_to_exact_second() {
        let rate = FrameRate::new(30, Duration::from_millis(1500), 100, 100);
        assert!((rate.fps - 20.0).abs() < 1e-4);
    }

    #[test]
    fn zero_elapsed_gives_empty_rate() {
        assert_eq!(
            FrameRate::new(10, Duration::ZERO, 100, 100),
            FrameRate::default()
        );
    }

    #[test]
    fn rate_updates_once_per_second() {
        let mut stats = FrameStats::default();
        stats.set_frame_time(Duration::from_millis(250));

        assert!(!stats.tick(1000, 1000));
        assert!(!stats.tick(1000, 1000));
        assert!(!stats.tick(1000, 1000));
        assert!(stats.tick(1000, 1000));

        assert!((stats.rate.fps - 4.0).abs() < 1e-4);
        assert!((stats.rate.mrays_per_second - 4.0).abs() < 1e-4);
        assert!(!stats.tick(1000, 1000));
        assert_eq!(stats.total_frame_count, 5);
    }

    #[test]
    fn summary_formats_two_decimals() {
        let rate = FrameRate {
            fps: 59.996,
            mrays_per_second: 12.3456,
        };

        assert_eq!(
            rate.summary("(DXR)"),
            "(DXR) FPS: 60.00     ~Million Primary Rays/s: 12.35"
        );
        assert!(rate
            .window_title("Demo", "(FL)", "Test GPU")
            .ends_with("GPU: Test GPU"));
    }

    #[test]
    fn queue_drops_oldest() {
        let mut queue = Queue::new(2);
        queue.push(1);
        queue.push(2);
        queue.push(3);
        assert_eq!(queue.values(), &[2, 3]);
    }
}
