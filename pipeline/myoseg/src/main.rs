//! 心肌分割单次运行流水线.
//!
//! 1. 按排序位置配对 LGE 与掩膜目录, 前 18 个受试者为训练集, 后 16 个为测试集;
//! 2. 组装训练张量并移交外部训练器;
//! 3. 若预测概率归档已回流, 则清理预测/真值掩膜并汇总四项指标.

mod result;
mod runner;

fn main() {
    simple_logger::SimpleLogger::new()
        .with_level(log::LevelFilter::Info)
        .init()
        .expect("日志初始化失败");

    runner::run().analyze();
}
