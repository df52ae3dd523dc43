//! 控制仲裁属性测试

use proptest::prelude::*;
use simbridge_control::config::ControlConfig;
use simbridge_control::*;
use simbridge_driver::ActuatorTarget;

proptest! {
    /// 单拍变化不超过上限，方向与目标一致
    #[test]
    fn rate_limiter_bounds(old in -1000.0f64..1000.0, new in -1000.0f64..1000.0) {
        let out = steer_rate_limit(old, new, 0.5);
        prop_assert!((out - old).abs() <= 0.5 + 1e-9);
        if new > old {
            prop_assert!(out >= old);
        } else if new < old {
            prop_assert!(out <= old);
        } else {
            prop_assert_eq!(out, old);
        }
    }

    /// 反复逼近最终到达目标
    #[test]
    fn rate_limiter_converges(old in -50.0f64..50.0, new in -50.0f64..50.0) {
        let mut value = old;
        for _ in 0..250 {
            value = steer_rate_limit(value, new, 0.5);
        }
        prop_assert!((value - new).abs() < 1e-9);
    }

    /// 松手保持：非零值保持恰好 `repeat` 拍后归零
    #[test]
    fn ease_out_holds_for_repeat_ticks(v in prop_oneof![-1.0f64..-0.01, 0.01f64..1.0], repeat in 0u32..12) {
        let mut ch = EaseOut::new(repeat);
        prop_assert_eq!(ch.resolve(v), v);

        for _ in 0..repeat {
            prop_assert_eq!(ch.resolve(0.0), v);
        }
        prop_assert_eq!(ch.resolve(0.0), 0.0);
        prop_assert_eq!(ch.counter, repeat);
        prop_assert_eq!(ch.resolve(0.0), 0.0);
    }

    /// 任意实际转角下，下发的转向比例都在 [-1, 1]
    #[test]
    fn steer_ratio_always_clipped(
        actual in -1e6f64..1e6,
        max_steer in 0.0f64..90.0,
        target in -1e3f64..1e3,
        engaged in any::<bool>(),
    ) {
        let mut arb = ControlArbiter::new(ControlConfig::default());
        if engaged {
            arb.step(Some(ManualCommand::CruiseUp), actual, None, max_steer);
        }
        let out = arb.step(
            None,
            actual,
            Some(ActuatorTarget { accel: 0.0, steering_angle_deg: target }),
            max_steer,
        );
        prop_assert!(out.control.steer.is_finite());
        prop_assert!((-1.0..=1.0).contains(&out.control.steer));
    }

    /// 接管时油门和刹车互斥且都在 [0, 1]
    #[test]
    fn engaged_pedals_exclusive(accel in -20.0f64..20.0) {
        let mut arb = ControlArbiter::new(ControlConfig::default());
        arb.step(Some(ManualCommand::CruiseDown), 0.0, None, 70.0);
        let out = arb.step(None, 0.0, Some(ActuatorTarget { accel, steering_angle_deg: 0.0 }), 70.0);

        prop_assert!((0.0..=1.0).contains(&out.resolved.throttle));
        prop_assert!((0.0..=1.0).contains(&out.resolved.brake));
        prop_assert!(out.resolved.throttle == 0.0 || out.resolved.brake == 0.0);
    }

    /// 命令语法：数值命令经 Display 往返不变
    #[test]
    fn numeric_commands_round_trip(v in -10.0f64..10.0, which in 0usize..3) {
        let cmd = match which {
            0 => ManualCommand::Steer(v),
            1 => ManualCommand::Throttle(v),
            _ => ManualCommand::Brake(v),
        };
        prop_assert_eq!(cmd.to_string().parse::<ManualCommand>().unwrap(), cmd);
    }
}
