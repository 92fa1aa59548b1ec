//! 消息格式化模块 - 把设备状态渲染成 Telegram HTML 消息
//!
//! 消息布局固定：粗体标题 + `<pre>` 对齐的明细。时间点按显示时区计算，
//! 时长统一为 `H:MM:SS`。

use crate::model::{DeviceState, PrintState};
use crate::watcher::TransitionKind;
use chrono::{DateTime, Duration, TimeZone};
use std::fmt::Display;

/// 消息格式化器
#[derive(Debug, Clone, Copy, Default)]
pub struct MessageFormatter;

impl MessageFormatter {
    pub fn new() -> Self {
        Self
    }

    /// 通知标题（未转义）
    pub fn headline(device_id: &str, kind: TransitionKind) -> String {
        match kind {
            TransitionKind::JobStarted | TransitionKind::JobEnded | TransitionKind::SteadyPrinting => {
                format!("Printjob {} on {}", kind.label(), device_id)
            }
            TransitionKind::Cooldown | TransitionKind::CooldownEnded | TransitionKind::NoEvent => {
                format!("Printer {} {}", device_id, kind.label())
            }
        }
    }

    /// 渲染完整的 HTML 消息
    pub fn render<Tz>(
        &self,
        device_id: &str,
        state: &DeviceState,
        kind: TransitionKind,
        now: &DateTime<Tz>,
    ) -> String
    where
        Tz: TimeZone,
        Tz::Offset: Display,
    {
        let completion = if state.still_printing == 0 {
            "unknown".to_string()
        } else {
            format!(
                "{} ({} from now)",
                clock(now, seconds(state.still_printing)),
                format_duration(state.still_printing)
            )
        };

        let start = format!(
            "{} ({} ago)",
            clock(now, -seconds(state.already_printed)),
            format_duration(state.already_printed)
        );

        let rows: [(&str, String); 7] = [
            ("Printjob:", escape_html(&state.job_name)),
            ("Z-Height:", escape_html(&state.z_height.to_string())),
            ("Percentage complete:", format!("{:.1}", state.progress * 100.0)),
            ("Completion time:", completion),
            ("Start time:", start),
            (
                "Nozzle temperature:",
                format!("{} / {}", state.temperature.nozzle, state.target_temperature.nozzle),
            ),
            (
                "Bed temperature:",
                format!("{} / {}", state.temperature.bed, state.target_temperature.bed),
            ),
        ];

        let mut body = format!(
            "<b>{}</b>\n<pre>\n",
            escape_html(&Self::headline(device_id, kind))
        );
        for (label, value) in rows {
            body.push_str(&format!("{:<21}{}\n", label, value));
        }
        body.push_str("</pre>");
        body
    }

    /// 单行状态（显示屏用）
    ///
    /// 打印中显示剩余时间，冷却中显示热床温度，状态未知时为空串。
    pub fn status_line(device_id: &str, state: &DeviceState) -> String {
        match state.print_state {
            PrintState::Printing => {
                let minutes = state.still_printing / 60;
                format!("{}:P {}:{:02}", device_id, minutes / 60, minutes % 60)
            }
            PrintState::Idle if state.in_cooldown() => {
                format!("{}:CD {}", device_id, state.temperature.bed)
            }
            PrintState::Idle => format!("{}: idle", device_id),
            PrintState::Unknown => String::new(),
        }
    }
}

/// 秒数格式化为 `H:MM:SS`，小时不补零也不封顶
pub fn format_duration(total_secs: u64) -> String {
    let secs = total_secs % 60;
    let minutes = total_secs / 60;
    format!("{}:{:02}:{:02}", minutes / 60, minutes % 60, secs)
}

/// 转义 HTML 特殊字符
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

fn seconds(secs: u64) -> Duration {
    Duration::seconds(i64::try_from(secs).unwrap_or(i64::MAX).min(i64::MAX / 1000))
}

fn clock<Tz>(now: &DateTime<Tz>, offset: Duration) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    match now.clone().checked_add_signed(offset) {
        Some(t) => t.format("%H:%M").to_string(),
        None => "--:--".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Temperatures, ZHeight};
    use chrono::{TimeZone, Utc};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    fn printing_state() -> DeviceState {
        DeviceState {
            print_state: PrintState::Printing,
            temperature: Temperatures { bed: 60.0, nozzle: 215.0 },
            target_temperature: Temperatures { bed: 60.0, nozzle: 215.0 },
            z_height: ZHeight::Millimetres(1.2),
            full_job_time: 7200,
            already_printed: 1800,
            still_printing: 5400,
            progress: 0.25,
            job_name: "benchy.gcode".to_string(),
            cooldown_deadline: None,
        }
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(0), "0:00:00");
        assert_eq!(format_duration(59), "0:00:59");
        assert_eq!(format_duration(3661), "1:01:01");
        assert_eq!(format_duration(90_000), "25:00:00");
    }

    #[test]
    fn test_headlines() {
        assert_eq!(
            MessageFormatter::headline("mk4", TransitionKind::JobStarted),
            "Printjob started on mk4"
        );
        assert_eq!(
            MessageFormatter::headline("mk4", TransitionKind::JobEnded),
            "Printjob ended on mk4"
        );
        assert_eq!(
            MessageFormatter::headline("mk4", TransitionKind::SteadyPrinting),
            "Printjob in progress on mk4"
        );
        assert_eq!(
            MessageFormatter::headline("mk4", TransitionKind::Cooldown),
            "Printer mk4 cooling down"
        );
        assert_eq!(
            MessageFormatter::headline("mk4", TransitionKind::CooldownEnded),
            "Printer mk4 final cool down"
        );
    }

    #[test]
    fn test_render_printing() {
        let text = MessageFormatter::new().render(
            "mk4",
            &printing_state(),
            TransitionKind::SteadyPrinting,
            &now(),
        );

        assert!(text.starts_with("<b>Printjob in progress on mk4</b>\n<pre>\n"));
        assert!(text.ends_with("</pre>"));
        assert!(text.contains("Printjob:            benchy.gcode\n"));
        assert!(text.contains("Z-Height:            1.2\n"));
        assert!(text.contains("Percentage complete: 25.0\n"));
        assert!(text.contains("Completion time:     13:30 (1:30:00 from now)\n"));
        assert!(text.contains("Start time:          11:30 (0:30:00 ago)\n"));
        assert!(text.contains("Nozzle temperature:  215 / 215\n"));
        assert!(text.contains("Bed temperature:     60 / 60\n"));
    }

    #[test]
    fn test_render_unknown_completion() {
        let mut state = printing_state();
        state.still_printing = 0;
        let text = MessageFormatter::new().render("mk4", &state, TransitionKind::JobEnded, &now());
        assert!(text.contains("Completion time:     unknown\n"));
    }

    #[test]
    fn test_render_escapes_job_name() {
        let mut state = printing_state();
        state.job_name = "<b>&evil</b>".to_string();
        let text = MessageFormatter::new().render("mk4", &state, TransitionKind::JobStarted, &now());
        assert!(text.contains("&lt;b&gt;&amp;evil&lt;/b&gt;"));
        assert!(!text.contains("<b>&evil"));
    }

    #[test]
    fn test_status_line() {
        let printing = printing_state();
        assert_eq!(MessageFormatter::status_line("mk4", &printing), "mk4:P 1:30");

        let mut cooling = DeviceState::default();
        cooling.temperature.bed = 48.5;
        cooling.cooldown_deadline = Some(now());
        assert_eq!(MessageFormatter::status_line("mk4", &cooling), "mk4:CD 48.5");

        assert_eq!(MessageFormatter::status_line("mk4", &DeviceState::default()), "mk4: idle");
        assert_eq!(MessageFormatter::status_line("mk4", &DeviceState::unknown()), "");
    }
}
