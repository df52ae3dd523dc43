//! 执行器平滑原语
//!
//! - 转向限速：单拍转向变化量不超过 `limit`
//! - 松手保持（ease-out）：输入归零后继续保持最后的非零值若干拍，避免执行器突变

/// 单拍转向限速
///
/// ```
/// use simbridge_control::steer_rate_limit;
///
/// assert_eq!(steer_rate_limit(0.0, 5.0, 0.5), 0.5);
/// assert_eq!(steer_rate_limit(0.0, -5.0, 0.5), -0.5);
/// assert_eq!(steer_rate_limit(2.0, 2.3, 0.5), 2.3);
/// ```
#[inline]
pub fn steer_rate_limit(old: f64, new: f64, limit: f64) -> f64 {
    if new > old + limit {
        old + limit
    } else if new < old - limit {
        old - limit
    } else {
        new
    }
}

/// 单通道松手保持
///
/// 输入 `(fresh, prev, counter)`，返回 `(resolved, counter)`：
///
/// | 条件 | 输出 |
/// |------|------|
/// | `fresh != 0` | `(fresh, repeat)` |
/// | `fresh == 0`，`prev != 0`，`counter > 0` | `(prev, counter - 1)` |
/// | `fresh == 0`，`prev != 0`，`counter == 0` | `(0, repeat)` |
/// | `fresh == 0`，`prev == 0` | `(0, counter)` |
#[inline]
pub fn ease_out(fresh: f64, prev: f64, counter: u32, repeat: u32) -> (f64, u32) {
    if fresh != 0.0 {
        (fresh, repeat)
    } else if prev != 0.0 {
        if counter > 0 {
            (prev, counter - 1)
        } else {
            (0.0, repeat)
        }
    } else {
        (0.0, counter)
    }
}

/// 带状态的松手保持通道
///
/// `held` 即上一拍的输出值（保持期间不变，到期归零）。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EaseOut {
    pub held: f64,
    pub counter: u32,
    repeat: u32,
}

impl EaseOut {
    pub fn new(repeat: u32) -> Self {
        Self {
            held: 0.0,
            counter: repeat,
            repeat,
        }
    }

    pub fn repeat(&self) -> u32 {
        self.repeat
    }

    /// 本拍输出
    pub fn resolve(&mut self, fresh: f64) -> f64 {
        let (resolved, counter) = ease_out(fresh, self.held, self.counter, self.repeat);
        self.held = resolved;
        self.counter = counter;
        resolved
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ease_out_table() {
        assert_eq!(ease_out(0.3, 0.0, 2, 5), (0.3, 5));
        assert_eq!(ease_out(0.0, 0.3, 2, 5), (0.3, 1));
        assert_eq!(ease_out(0.0, 0.3, 0, 5), (0.0, 5));
        assert_eq!(ease_out(0.0, 0.0, 3, 5), (0.0, 3));
        assert_eq!(ease_out(0.0, -40.0, 1, 5), (-40.0, 0));
    }

    #[test]
    fn test_hold_then_release() {
        let mut ch = EaseOut::new(5);
        assert_eq!(ch.resolve(0.35), 0.35);

        let outputs: Vec<f64> = (0..8).map(|_| ch.resolve(0.0)).collect();
        assert_eq!(outputs, vec![0.35, 0.35, 0.35, 0.35, 0.35, 0.0, 0.0, 0.0]);
        assert_eq!(ch.counter, 5);
    }

    #[test]
    fn test_fresh_input_resets_counter() {
        let mut ch = EaseOut::new(5);
        ch.resolve(1.0);
        ch.resolve(0.0);
        ch.resolve(0.0);
        assert_eq!(ch.counter, 3);

        ch.resolve(0.5);
        assert_eq!(ch.counter, 5);
        assert_eq!(ch.held, 0.5);
    }

    #[test]
    fn test_rate_limit_examples() {
        assert_eq!(steer_rate_limit(0.0, 0.5, 0.5), 0.5);
        assert_eq!(steer_rate_limit(10.0, 9.2, 0.5), 9.5);
        assert_eq!(steer_rate_limit(-3.0, -3.0, 0.5), -3.0);
    }
}
