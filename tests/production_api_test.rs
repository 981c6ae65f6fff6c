// ==========================================
// 生产业务端到端测试
// ==========================================
// 场景: 原料 C007「Mít sấy」→ 分发到 M1/M2 → 录入 M1 产出 → 评价镜像
// 另含: 主数据登记、批次号自动生成、操作留痕
// ==========================================


use production_tracking::api::ApiError;
use production_tracking::domain::{ActionType, MachineStatus, NewMaterialBatch, WeightPatch};
use production_tracking::engine::FinishedProductPatch;
use test_helpers::*;

#[tokio::test]
async fn test_c007_full_scenario() {
    let env = TestEnv::new().expect("无法创建测试环境");
    let (m1, m2) = env.seed_machines();
    let material = env.register_material("C007", "Mít sấy").await;
    let api = &env.state.production_api;

    // 分发
    let report = api
        .fan_out("C007", material.process_time, OPERATOR)
        .await
        .expect("分发失败");
    assert_eq!(report.operations.len(), 2);
    assert_eq!(report.finished_products.len(), 2);
    assert_eq!(report.quality_evaluations.len(), 2);

    // 操作记录快照分发时刻的机台状态
    let m1_op = report
        .operations
        .iter()
        .find(|op| op.machine_id == m1.machine_id)
        .expect("缺少 M1 操作记录");
    assert_eq!(m1_op.machine_status, MachineStatus::Running);
    let m2_op = report
        .operations
        .iter()
        .find(|op| op.machine_id == m2.machine_id)
        .expect("缺少 M2 操作记录");
    assert_eq!(m2_op.machine_status, MachineStatus::Maintenance);

    // 成品记录继承品名，重量为 0
    for product in &report.finished_products {
        assert_eq!(product.goods_name, "Mít sấy");
        assert_eq!(product.total_weight_kg, 0.0);
        assert_eq!(product.material_batch_id.as_deref(), Some(material.material_batch_id.as_str()));
    }

    // M1 产出 A:80 B:20
    let m1_product = report
        .finished_products
        .iter()
        .find(|p| p.machine_id == m1.machine_id)
        .expect("缺少 M1 成品记录");
    let outcome = api
        .update_finished_product(
            &m1_product.finished_product_id,
            &FinishedProductPatch {
                weights: WeightPatch {
                    grade_a: Some(80.0),
                    grade_b: Some(20.0),
                    ..Default::default()
                },
                notes: None,
            },
            OPERATOR,
        )
        .expect("录入产出失败");

    assert_close(outcome.record.total_weight_kg, 100.0);
    assert_close(outcome.record.percentages.grade_a, 80.0);
    assert_close(outcome.record.percentages.grade_b, 20.0);
    assert_eq!(outcome.propagated, 1);

    // 评价镜像
    let evaluations = api.list_quality_evaluations("C007").unwrap();
    assert_eq!(evaluations.len(), 2);
    let m1_eval = evaluations
        .iter()
        .find(|e| e.machine_id.as_deref() == Some(m1.machine_id.as_str()))
        .expect("缺少 M1 评价");
    assert_close(m1_eval.percentages.grade_a, 80.0);
    assert_close(m1_eval.percentages.grade_b, 20.0);
    assert_eq!(m1_eval.goods_name.as_deref(), Some("Mít sấy"));

    let m2_eval = evaluations
        .iter()
        .find(|e| e.machine_id.as_deref() == Some(m2.machine_id.as_str()))
        .expect("缺少 M2 评价");
    assert_eq!(m2_eval.percentages.sum(), 0.0);

    // M2 的操作记录保留分发时刻的机台状态
    env.state
        .master_data_api
        .update_machine_status(&m2.machine_id, MachineStatus::Running, OPERATOR)
        .expect("更新机台状态失败");
    let m2_op = api
        .list_operations("C007")
        .unwrap()
        .into_iter()
        .find(|op| op.machine_id == m2.machine_id)
        .expect("缺少 M2 操作记录");
    assert_eq!(m2_op.machine_status, MachineStatus::Maintenance);
}

#[tokio::test]
async fn test_action_logs_record_batch_writes() {
    let env = TestEnv::new().expect("无法创建测试环境");
    env.seed_machines();
    env.register_material("C007", "Mít sấy").await;
    let api = &env.state.production_api;

    let report = api.fan_out("C007", process_time(), OPERATOR).await.unwrap();
    api.update_finished_product(
        &report.finished_products[0].finished_product_id,
        &FinishedProductPatch {
            weights: WeightPatch {
                grade_a: Some(1.0),
                ..Default::default()
            },
            notes: None,
        },
        OPERATOR,
    )
    .unwrap();

    let logs = api.list_action_logs("C007").expect("查询留痕失败");
    let types: Vec<&str> = logs.iter().map(|l| l.action_type.as_str()).collect();
    assert_eq!(
        types,
        vec![
            ActionType::UpdateFinishedProduct.as_str(),
            ActionType::FanOut.as_str(),
            ActionType::RegisterMaterialBatch.as_str(),
        ]
    );
    assert!(logs.iter().all(|l| l.actor == OPERATOR));

    let fan_out_log = &logs[1];
    let payload = fan_out_log.payload_json.as_ref().expect("分发日志缺少 payload");
    assert_eq!(payload["operations"], 2);
    assert_eq!(payload["orphan_policy"], "REJECT");
}

#[tokio::test]
async fn test_register_material_batch_generates_code() {
    let env = TestEnv::new().expect("无法创建测试环境");
    let master = &env.state.master_data_api;

    // 人工占用 C001，自动生成时跳过
    env.register_material("C001", "Mít sấy").await;

    let generated = master
        .register_material_batch(
            &NewMaterialBatch {
                batch_code: None,
                process_time: Some(process_time()),
                goods_name: "Chuối sấy".to_string(),
                input_weight_kg: 80.0,
                ..Default::default()
            },
            OPERATOR,
        )
        .await
        .expect("自动生成批次号失败");
    assert_eq!(generated.batch_code, "C002");

    let found = master
        .find_material_batch("C002", &process_time())
        .unwrap()
        .expect("按 (批次号, 加工时间) 查询失败");
    assert_eq!(found.material_batch_id, generated.material_batch_id);
    assert_eq!(found.goods_name, "Chuối sấy");
}

#[tokio::test]
async fn test_register_material_batch_rejects_duplicate_key() {
    let env = TestEnv::new().expect("无法创建测试环境");
    env.register_material("C007", "Mít sấy").await;

    let err = env
        .state
        .master_data_api
        .register_material_batch(
            &NewMaterialBatch {
                batch_code: Some("C007".to_string()),
                process_time: Some(process_time()),
                goods_name: "Mít sấy".to_string(),
                input_weight_kg: 10.0,
                ..Default::default()
            },
            OPERATOR,
        )
        .await
        .expect_err("同一 (批次号, 加工时间) 不能重复登记");
    assert!(matches!(err, ApiError::ConcurrencyConflict(_)), "实际错误: {:?}", err);
}

#[test]
fn test_register_machine_validation_and_uniqueness() {
    let env = TestEnv::new().expect("无法创建测试环境");
    let master = &env.state.master_data_api;
    env.seed_machines();

    let err = master
        .register_machine(" ", "M9", MachineStatus::Running, OPERATOR)
        .expect_err("空编码应被拒绝");
    assert!(matches!(err, ApiError::InvalidInput(_)));

    let err = master
        .register_machine("M1-B", "M1", MachineStatus::Running, OPERATOR)
        .expect_err("机台名称重复应被拒绝");
    assert!(matches!(err, ApiError::ConcurrencyConflict(_)), "实际错误: {:?}", err);

    let machines = master.list_machines().unwrap();
    assert_eq!(machines.len(), 2);
    let m2 = master.find_machine_by_name("M2").unwrap().expect("缺少 M2");
    assert_eq!(m2.status, MachineStatus::Maintenance);
}
