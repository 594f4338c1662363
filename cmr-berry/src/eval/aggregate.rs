//! 两级指标聚合: 切片 → 受试者均值 → 队列统计量.

use super::metrics::Metrics;
use crate::data::normalize::median;
use std::io::{self, Write};

/// 求一组指标的逐项均值.
///
/// `scores` 必须非空, 否则程序 panic.
pub fn mean_of(scores: &[Metrics]) -> Metrics {
    assert!(!scores.is_empty(), "空序列没有均值");

    let n = scores.len() as f64;
    let mut acc = Metrics::default();
    for s in scores {
        acc.dice += s.dice;
        acc.accuracy += s.accuracy;
        acc.precision += s.precision;
        acc.recall += s.recall;
    }
    Metrics {
        dice: acc.dice / n,
        accuracy: acc.accuracy / n,
        precision: acc.precision / n,
        recall: acc.recall / n,
    }
}

/// 逐项总体标准差 (ddof = 0).
fn std_of(scores: &[Metrics], mean: &Metrics) -> Metrics {
    let n = scores.len() as f64;
    let mut acc = Metrics::default();
    for s in scores {
        acc.dice += (s.dice - mean.dice).powi(2);
        acc.accuracy += (s.accuracy - mean.accuracy).powi(2);
        acc.precision += (s.precision - mean.precision).powi(2);
        acc.recall += (s.recall - mean.recall).powi(2);
    }
    Metrics {
        dice: (acc.dice / n).sqrt(),
        accuracy: (acc.accuracy / n).sqrt(),
        precision: (acc.precision / n).sqrt(),
        recall: (acc.recall / n).sqrt(),
    }
}

/// 逐项中位数. 偶数个受试者时取中间两数平均.
fn median_of(scores: &[Metrics]) -> Metrics {
    Metrics {
        dice: median(scores.iter().map(|s| s.dice).collect()),
        accuracy: median(scores.iter().map(|s| s.accuracy).collect()),
        precision: median(scores.iter().map(|s| s.precision).collect()),
        recall: median(scores.iter().map(|s| s.recall).collect()),
    }
}

/// 队列级评估摘要.
///
/// 聚合口径: 每个受试者的得分是其全部切片得分的均值,
/// 队列统计量 (mean/median/std) 再在受试者得分序列上计算.
#[derive(Clone, Debug)]
pub struct CohortSummary {
    /// 受试者个数.
    pub subjects: usize,

    /// 受试者得分均值.
    pub mean: Metrics,

    /// 受试者得分中位数.
    pub median: Metrics,

    /// 受试者得分总体标准差.
    pub std: Metrics,
}

impl CohortSummary {
    /// 从受试者得分序列计算摘要. 序列为空时返回 `None`.
    pub fn from_subject_scores(scores: &[Metrics]) -> Option<Self> {
        if scores.is_empty() {
            return None;
        }
        let mean = mean_of(scores);
        Some(Self {
            subjects: scores.len(),
            std: std_of(scores, &mean),
            median: median_of(scores),
            mean,
        })
    }

    /// 将摘要写进 `w` 中. 指标以百分数呈现, 保留两位小数.
    pub fn describe_into<W: Write>(&self, w: &mut W) -> io::Result<()> {
        const S4: &str = "    ";

        #[inline]
        fn pct(v: f64) -> String {
            format!("{:.2}", v * 100.0)
        }

        writeln!(w, "Subjects evaluated: {}", self.subjects)?;
        writeln!(w, "Mean Values:")?;
        writeln!(w, "{S4}DI is: {} + {}", pct(self.mean.dice), pct(self.std.dice))?;
        writeln!(
            w,
            "{S4}Acc. is: {} + {}",
            pct(self.mean.accuracy),
            pct(self.std.accuracy)
        )?;
        writeln!(
            w,
            "{S4}Precision is: {} + {}",
            pct(self.mean.precision),
            pct(self.std.precision)
        )?;
        writeln!(
            w,
            "{S4}Recall is: {} + {}",
            pct(self.mean.recall),
            pct(self.std.recall)
        )?;
        writeln!(w, "Median Values:")?;
        writeln!(
            w,
            "{S4}DI is: {} + {}",
            pct(self.median.dice),
            pct(self.std.dice)
        )?;
        writeln!(
            w,
            "{S4}Acc. is: {} + {}",
            pct(self.median.accuracy),
            pct(self.std.accuracy)
        )?;
        writeln!(
            w,
            "{S4}Precision is: {} + {}",
            pct(self.median.precision),
            pct(self.std.precision)
        )?;
        write!(
            w,
            "{S4}Recall is: {} + {}",
            pct(self.median.recall),
            pct(self.std.recall)
        )?;
        Ok(())
    }
}
