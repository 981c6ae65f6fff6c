// ==========================================
// 演示数据: C007 / Mít sấy
// ==========================================
// 两台机台（M1 运行、M2 保养）+ 一个原料批次，随后分发并录入 M1 成品重量
// 用法: seed_demo_batch [db_path]
// ==========================================

use anyhow::Context;
use chrono::NaiveDate;

use production_tracking::app::{get_default_db_path, AppState};
use production_tracking::domain::{BatchState, MachineStatus, NewMaterialBatch, WeightPatch};
use production_tracking::engine::FinishedProductPatch;
use production_tracking::logging;

const OPERATOR: &str = "seed";
const BATCH_CODE: &str = "C007";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init();

    let db_path = std::env::args().nth(1).unwrap_or_else(get_default_db_path);
    let state = AppState::new(db_path.clone())
        .map_err(anyhow::Error::msg)
        .context("无法初始化AppState")?;
    let master = &state.master_data_api;
    let production = &state.production_api;

    for (code, name, status) in [
        ("M01", "M1", MachineStatus::Running),
        ("M02", "M2", MachineStatus::Maintenance),
    ] {
        if master.find_machine_by_name(name)?.is_none() {
            master.register_machine(code, name, status, OPERATOR)?;
        }
    }

    let process_time = NaiveDate::from_ymd_opt(2026, 10, 1)
        .and_then(|d| d.and_hms_opt(8, 0, 0))
        .context("非法的加工时间")?;

    if master.find_material_batch(BATCH_CODE, &process_time)?.is_none() {
        master
            .register_material_batch(
                &NewMaterialBatch {
                    batch_code: Some(BATCH_CODE.to_string()),
                    process_time: Some(process_time),
                    goods_name: "Mít sấy".to_string(),
                    input_weight_kg: 250.0,
                    soak_time_min: 30.0,
                    soak_temperature_c: 40.0,
                    ..Default::default()
                },
                OPERATOR,
            )
            .await?;
    }

    if production.batch_state(BATCH_CODE)? == BatchState::FannedOut {
        println!("批次 {} 已分发，跳过: {}", BATCH_CODE, db_path);
        return Ok(());
    }

    let report = production.fan_out(BATCH_CODE, process_time, OPERATOR).await?;
    tracing::info!(
        operations = report.operations.len(),
        finished_products = report.finished_products.len(),
        quality_evaluations = report.quality_evaluations.len(),
        "演示批次已分发"
    );

    let m1 = master
        .find_machine_by_name("M1")?
        .context("机台 M1 不存在")?;
    if let Some(product) = report
        .finished_products
        .iter()
        .find(|p| p.machine_id == m1.machine_id)
    {
        let outcome = production.update_finished_product(
            &product.finished_product_id,
            &FinishedProductPatch {
                weights: WeightPatch {
                    grade_a: Some(80.0),
                    grade_b: Some(20.0),
                    ..Default::default()
                },
                notes: None,
            },
            OPERATOR,
        )?;
        tracing::info!(
            total_weight_kg = outcome.record.total_weight_kg,
            grade_a_pct = outcome.record.percentages.grade_a,
            grade_b_pct = outcome.record.percentages.grade_b,
            propagated = outcome.propagated,
            "M1 成品重量已录入"
        );
    }

    println!("演示数据已写入: {}", db_path);
    Ok(())
}
