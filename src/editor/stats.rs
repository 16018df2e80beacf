use serde::Serialize;

/// Rolling frame statistics shown by the stats overlay.
#[derive(Debug, Default, Clone, Serialize)]
pub struct FrameStats {
    pub frames: u64,
    pub total_time: f32,
    pub average_frame_time: f32,
    pub last_frame_time: f32,
    pub fps: f32,
}

impl FrameStats {
    pub fn record(&mut self, delta_seconds: f32) {
        self.frames += 1;
        self.total_time += delta_seconds;
        self.average_frame_time = self.total_time / self.frames as f32;
        self.last_frame_time = delta_seconds;

        if delta_seconds > 0.000_1 {
            let instantaneous = 1.0 / delta_seconds;
            self.fps = if self.fps == 0.0 {
                instantaneous
            } else {
                let alpha = 0.2;
                self.fps * (1.0 - alpha) + instantaneous * alpha
            };
        }
    }

    pub fn summary(&self) -> String {
        format!(
            "{:.0} fps ({:.2} ms avg, {} frames)",
            self.fps,
            self.average_frame_time * 1000.0,
            self.frames
        )
    }
}
