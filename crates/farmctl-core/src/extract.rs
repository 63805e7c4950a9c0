//! Action templates for the agent's free-text log lines.
//!
//! Collaborators that predate [`ActionPerformed`] only report what they did
//! through log text such as `[12:00:01] [农场] 收获15 种植15`. The tables here
//! recover counter increments from those lines. Extraction is best-effort:
//! a line that matches nothing yields no actions and is not an error.

use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::stats::{ActionKind, ActionPerformed};

pub const TAG_FARM: &str = "农场";
pub const TAG_FRIEND: &str = "好友";
pub const TAG_WAREHOUSE: &str = "仓库";
pub const TAG_TASK: &str = "任务";

const HELP_MARKER: &str = "帮忙";
const CLAIM_MARKER: &str = "领取";

static RE_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[([^\]]+)\]\s*\[([^\]]+)\]\s*(.+)").expect("valid regex"));

static RE_SELL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"出售\s*(\d+)\s*种.*?(\d+)\s*个.*?(\d+)\s*金币").expect("valid regex")
});

// Shared by the farm and friend tags. The fertilize pattern captures a
// progress fraction; only its numerator is counted.
static COUNT_TEMPLATES: LazyLock<Vec<(ActionKind, Regex)>> = LazyLock::new(|| {
    [
        (ActionKind::Harvest, r"收获(\d+)"),
        (ActionKind::Plant, r"种植(\d+)"),
        (ActionKind::Water, r"浇水(\d+)"),
        (ActionKind::Weed, r"除草(\d+)"),
        (ActionKind::PestTreatment, r"除虫(\d+)"),
        (ActionKind::Fertilize, r"施肥.*?(\d+)/(\d+)"),
        (ActionKind::Steal, r"偷(\d+)"),
    ]
    .into_iter()
    .map(|(kind, pattern)| (kind, Regex::new(pattern).expect("valid regex")))
    .collect()
});

/// A log line split into its category tag and message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogLine {
    pub level: String,
    pub tag: String,
    pub message: String,
}

impl LogLine {
    #[must_use]
    pub fn new(
        level: impl Into<String>,
        tag: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            level: level.into(),
            tag: tag.into(),
            message: message.into(),
        }
    }

    /// Parse the legacy `[time] [tag] message` text form.
    ///
    /// Returns `None` when the line carries no bracketed tag.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        let caps = RE_LINE.captures(raw)?;
        Some(Self::new("INFO", &caps[2], &caps[3]))
    }
}

fn quantity(caps: &Captures<'_>, group: usize, fallback: u64) -> u64 {
    caps.get(group)
        .and_then(|m| m.as_str().parse().ok())
        .unwrap_or(fallback)
}

/// Actions recognized in `line`, in template order.
#[must_use]
pub fn extract_actions(line: &LogLine) -> Vec<ActionPerformed> {
    let mut actions = Vec::new();
    let message = line.message.as_str();

    match line.tag.as_str() {
        TAG_FARM | TAG_FRIEND => {
            for (kind, pattern) in COUNT_TEMPLATES.iter() {
                if let Some(caps) = pattern.captures(message) {
                    actions.push(ActionPerformed::new(*kind, quantity(&caps, 1, 1)));
                }
            }
            if line.tag == TAG_FRIEND && message.contains(HELP_MARKER) {
                actions.push(ActionPerformed::new(ActionKind::Help, 1));
            }
        }
        TAG_WAREHOUSE => {
            if let Some(caps) = RE_SELL.captures(message) {
                actions.push(ActionPerformed::new(ActionKind::Sell, quantity(&caps, 1, 1)));
                actions.push(ActionPerformed::new(ActionKind::SellGold, quantity(&caps, 3, 0)));
            }
        }
        TAG_TASK if message.contains(CLAIM_MARKER) => {
            actions.push(ActionPerformed::new(ActionKind::TaskClaim, 1));
        }
        _ => {}
    }

    actions
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(actions: &[ActionPerformed]) -> Vec<(ActionKind, u64)> {
        actions.iter().map(|a| (a.kind, a.quantity)).collect()
    }

    #[test]
    fn test_parse_legacy_line() {
        let line = LogLine::parse("[2024][仓库] 出售 3 种 水果 12 个 获得 450 金币").unwrap();
        assert_eq!(line.tag, "仓库");
        assert_eq!(line.message, "出售 3 种 水果 12 个 获得 450 金币");
        assert!(LogLine::parse("no tag here").is_none());
    }

    #[test]
    fn test_sell_summary() {
        let line = LogLine::new("INFO", TAG_WAREHOUSE, "出售 3 种 水果 12 个 获得 450 金币");
        assert_eq!(
            kinds(&extract_actions(&line)),
            [(ActionKind::Sell, 3), (ActionKind::SellGold, 450)]
        );
    }

    #[test]
    fn test_farm_line_with_several_markers() {
        let line = LogLine::new("INFO", TAG_FARM, "收获15 种植15 浇水3 除草2 除虫1");
        assert_eq!(
            kinds(&extract_actions(&line)),
            [
                (ActionKind::Harvest, 15),
                (ActionKind::Plant, 15),
                (ActionKind::Water, 3),
                (ActionKind::Weed, 2),
                (ActionKind::PestTreatment, 1),
            ]
        );
    }

    #[test]
    fn test_fertilize_counts_numerator() {
        let line = LogLine::new("INFO", TAG_FARM, "施肥 进度 3/5");
        assert_eq!(kinds(&extract_actions(&line)), [(ActionKind::Fertilize, 3)]);
    }

    #[test]
    fn test_friend_steal_and_help() {
        let line = LogLine::new("INFO", TAG_FRIEND, "小明: 偷4 帮忙除草1");
        assert_eq!(
            kinds(&extract_actions(&line)),
            [
                (ActionKind::Weed, 1),
                (ActionKind::Steal, 4),
                (ActionKind::Help, 1),
            ]
        );
    }

    #[test]
    fn test_help_marker_only_counts_for_friend_tag() {
        let line = LogLine::new("INFO", TAG_FARM, "帮忙");
        assert!(extract_actions(&line).is_empty());
    }

    #[test]
    fn test_task_claim() {
        let line = LogLine::new("INFO", TAG_TASK, "领取 每日签到 奖励");
        assert_eq!(kinds(&extract_actions(&line)), [(ActionKind::TaskClaim, 1)]);

        let line = LogLine::new("INFO", TAG_TASK, "任务列表已刷新");
        assert!(extract_actions(&line).is_empty());
    }

    #[test]
    fn test_unrecognized_lines_yield_nothing() {
        for line in [
            LogLine::new("INFO", "网页", "服务器启动"),
            LogLine::new("INFO", TAG_FARM, "土地状态正常"),
            LogLine::new("WARN", TAG_WAREHOUSE, "出售失败"),
        ] {
            assert!(extract_actions(&line).is_empty(), "{line:?}");
        }
    }

    #[test]
    fn test_oversized_quantity_falls_back() {
        let line = LogLine::new("INFO", TAG_FARM, "收获99999999999999999999999");
        assert_eq!(kinds(&extract_actions(&line)), [(ActionKind::Harvest, 1)]);
    }
}
