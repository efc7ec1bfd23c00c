// 安装进度回调与节流

/// 安装过程的回调接口，由界面层实现
pub trait InstallListener: Send + Sync {
    /// 总体进度（0-100）和当前步骤说明
    fn progress_changed(&self, percent: u8, message: &str);

    /// 一行日志
    fn log_message(&self, message: &str);
}

/// 什么都不做的监听器
pub struct NoopListener;

impl InstallListener for NoopListener {
    fn progress_changed(&self, _percent: u8, _message: &str) {}

    fn log_message(&self, _message: &str) {}
}

/// 下载进度节流：只有整数百分比增加时才放行
///
/// 跨多个下载源共用同一个实例，后一个源从零开始时不会让进度倒退。
#[derive(Debug, Default)]
pub struct ProgressThrottle {
    last: Option<u8>,
}

impl ProgressThrottle {
    pub fn new() -> Self {
        Self::default()
    }

    /// 返回需要上报的百分比，总大小未知时始终为 None
    pub fn update(&mut self, transferred: u64, total: Option<u64>) -> Option<u8> {
        let total = total.filter(|t| *t > 0)?;
        let percent = (u128::from(transferred) * 100 / u128::from(total)).min(100) as u8;
        match self.last {
            Some(last) if percent <= last => None,
            _ => {
                self.last = Some(percent);
                Some(percent)
            }
        }
    }

    pub fn last(&self) -> Option<u8> {
        self.last
    }
}

/// 把阶段内进度映射到总体进度区间 `[start, end]`
pub fn scale_percent(start: u8, end: u8, percent: u8) -> u8 {
    let span = u16::from(end.saturating_sub(start));
    start + (span * u16::from(percent.min(100)) / 100) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_increasing_percent_is_reported() {
        let mut throttle = ProgressThrottle::new();
        let total = Some(1000);
        let reported: Vec<u8> = [0, 1, 5, 10, 10, 9, 150, 999, 1000, 2000]
            .into_iter()
            .filter_map(|t| throttle.update(t, total))
            .collect();
        assert_eq!(reported, vec![0, 1, 15, 99, 100]);
    }

    #[test]
    fn test_reported_sequence_is_monotonic_and_bounded() {
        let mut throttle = ProgressThrottle::new();
        let total = Some(7_777);
        let mut seen = Vec::new();
        // 第二个源从零开始，不应该出现倒退
        let transfers = (0..=7_777).step_by(13).chain((0..=9_000).step_by(17));
        for t in transfers {
            if let Some(p) = throttle.update(t, total) {
                seen.push(p);
            }
        }
        assert!(seen.windows(2).all(|w| w[0] < w[1]));
        assert!(seen.iter().all(|p| *p <= 100));
        assert_eq!(seen.last(), Some(&100));
    }

    #[test]
    fn test_unknown_total_reports_nothing() {
        let mut throttle = ProgressThrottle::new();
        assert_eq!(throttle.update(10, None), None);
        assert_eq!(throttle.update(10, Some(0)), None);
        assert_eq!(throttle.last(), None);
    }

    #[test]
    fn test_scale_percent() {
        assert_eq!(scale_percent(5, 85, 0), 5);
        assert_eq!(scale_percent(5, 85, 50), 45);
        assert_eq!(scale_percent(5, 85, 100), 85);
        assert_eq!(scale_percent(5, 85, 200), 85);
    }
}
