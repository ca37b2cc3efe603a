use std::time::{Duration, Instant};
use tracing::info;

/// 流程各阶段的累计计时器。
#[derive(Clone, Debug)]
pub struct StageTimer {
    stages: Vec<(String, Duration)>,
    since: Instant,
}

impl StageTimer {
    /// 初始化计时器，并视为已经调用一次`self.start()`。
    #[inline]
    pub fn new() -> Self {
        Self {
            stages: Vec::new(),
            since: Instant::now(),
        }
    }

    /// 开始计时一个阶段。
    #[inline]
    pub fn start(&mut self) {
        self.since = Instant::now();
    }

    /// 结束当前阶段，记录并输出其耗时。上一次调用必须是`self.start()`，否则时间计算值无意义。
    pub fn finish(&mut self, stage: &str) -> Duration {
        let elapsed = self.since.elapsed();
        info!("阶段`{stage}`耗时 {:.2}s", elapsed.as_secs_f64());
        self.stages.push((stage.to_owned(), elapsed));
        elapsed
    }

    /// 已记录的阶段及耗时，按完成顺序排列。
    #[inline]
    pub fn stages(&self) -> &[(String, Duration)] {
        &self.stages
    }

    /// 所有阶段的总耗时（以毫秒为单位）。
    #[inline]
    pub fn get_total_ms(&self) -> u64 {
        self.stages.iter().map(|(_, d)| *d).sum::<Duration>().as_millis() as u64
    }
}

impl Default for StageTimer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::StageTimer;

    #[test]
    fn test_stages_in_order() {
        let mut timer = StageTimer::new();
        timer.start();
        timer.finish("concat");
        timer.start();
        timer.finish("moco");
        let names: Vec<&str> = timer.stages().iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, ["concat", "moco"]);
    }
}
