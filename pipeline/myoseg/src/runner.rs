//! 程序运行函数.

use crate::result::RunResult;
use cmr_berry::dataset::{assemble_cohort, NpzArchive};
use cmr_berry::eval::{evaluate_cohort, EvalError, EvalParams};
use cmr_berry::model::{ModelError, ModelTrainer, NpzHandoff, UnetConfig};
use cmr_berry::prelude::*;
use ndarray::Axis;
use std::env;
use std::fs;
use std::num::NonZeroUsize;
use std::path::Path;
use utils::loader;

/// 实际运行.
pub fn run() -> RunResult {
    let split = loader::cohort_from_env_or_home().expect("Loading dataset config error");
    let norm = utils::lge_normalizer();
    let canvas = utils::unet_canvas();

    // 训练张量移交.
    let train_batch = assemble_cohort(split.train_loader(), &norm, canvas, AssembleMode::Train)
        .expect("Assembling training set error");
    log::info!("训练集: {} 对切片", train_batch.len());

    let mut handoff = NpzHandoff::new(loader::export_path_from_env_or_home());
    let outcome = handoff
        .train(&train_batch, &UnetConfig::default())
        .expect("Exporting training tensors error");

    // 预测归档尚未回流时只做移交.
    let pred_path = loader::predictions_path_from_env_or_home();
    if !pred_path.is_file() {
        log::warn!("未找到预测归档 {}, 跳过评估", pred_path.display());
        return RunResult::train_only(outcome);
    }

    let workers = NonZeroUsize::new(utils::cpus().clamp(1, 64)).unwrap();
    let archive = NpzArchive::new(workers, &pred_path).expect("Opening prediction archive error");

    // 为落盘检查保留清理后的预测掩膜 (压缩存储).
    let mut retained: Vec<(u32, Vec<cmr_berry::CompactMaskSlice>)> = Vec::new();

    let summary = evaluate_cohort(
        split.test_loader(),
        |idx| {
            archive.probability_by_num_dot_npy(idx).map_err(|e| {
                EvalError::Model(ModelError::Backend(format!("读取概率归档失败: {e:?}")))
            })
        },
        &norm,
        canvas,
        &EvalParams::default(),
        |idx, ev| {
            let compact = ev
                .pred_volume
                .axis_iter(Axis(0))
                .map(|s| OwnedMaskSlice::from_raw(s.to_owned()).compress())
                .collect();
            retained.push((idx, compact));
        },
    )
    .expect("Evaluation error");

    if let Ok(dir) = env::var("MYOSEG_DUMP_DIR") {
        dump_inspection(&split, &norm, &retained, Path::new(&dir));
    }

    RunResult::full(outcome, summary)
}

/// 将清理后的预测掩膜与第一个测试受试者的归一化切片写成 PNG, 供人工检查.
fn dump_inspection(
    split: &CohortSplit,
    norm: &ClipNormalizer,
    retained: &[(u32, Vec<cmr_berry::CompactMaskSlice>)],
    dir: &Path,
) {
    if let Err(e) = fs::create_dir_all(dir) {
        log::warn!("创建检查目录 {} 失败: {e}", dir.display());
        return;
    }

    for (idx, slices) in retained {
        for (k, compact) in slices.iter().enumerate() {
            let owned = compact.clone().decompress();
            let path = dir.join(format!("pred-{idx}-{k:03}.png"));
            if let Err(e) = owned.as_immut().save(&path) {
                log::warn!("写出 {} 失败: {e}", path.display());
            }
        }
    }

    // 第一个测试受试者的归一化 LGE 切片.
    if let Some((idx, Ok(mut data))) = split.test_loader().next() {
        data.scan.par_normalize_all(norm);
        for (k, sli) in data.scan.slice_iter().enumerate() {
            let path = dir.join(format!("lge-{idx}-{k:03}.png"));
            if let Err(e) = sli.save(&path) {
                log::warn!("写出 {} 失败: {e}", path.display());
            }
        }
    }
}
