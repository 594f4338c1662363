//! 运行结果.

use cmr_berry::eval::CohortSummary;
use cmr_berry::model::TrainOutcome;

/// 单次流水线运行的最终结果.
pub struct RunResult {
    train: TrainOutcome,
    summary: Option<CohortSummary>,
}

impl RunResult {
    /// 仅完成训练张量移交的结果 (预测归档尚未回流).
    pub fn train_only(train: TrainOutcome) -> Self {
        Self {
            train,
            summary: None,
        }
    }

    /// 移交 + 评估均完成的结果.
    pub fn full(train: TrainOutcome, summary: CohortSummary) -> Self {
        Self {
            train,
            summary: Some(summary),
        }
    }

    /// 分析运行结果.
    pub fn analyze(&self) {
        utils::sep();
        println!("Training tensors: {}", self.train.artifact.display());
        if let Some(loss) = self.train.final_loss {
            println!("Final loss: {loss:.6}");
        }
        utils::sep();

        match &self.summary {
            Some(s) => {
                let mut buf = Vec::with_capacity(512);
                s.describe_into(&mut buf).unwrap();
                println!("{}", std::str::from_utf8(&buf).unwrap());
            }
            None => println!("Evaluation skipped: prediction archive not found."),
        }
        utils::sep();
    }
}
