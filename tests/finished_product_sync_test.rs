// ==========================================
// 成品产出追踪与百分比下推集成测试
// ==========================================
// 测试范围:
// 1. 总重/百分比派生（含总重为 0）
// 2. 重量更新 → 关联评价百分比同步
// 3. 新建成品记录的校验
// 4. 手工重推（数据漂移后恢复）
// 5. 下推失败回滚、单条删除
// ==========================================


use production_tracking::api::ApiError;
use production_tracking::domain::WeightPatch;
use production_tracking::engine::{CreateFinishedProductRequest, FinishedProductPatch};
use test_helpers::*;

fn weights(a: f64, b: f64, c: f64) -> WeightPatch {
    WeightPatch {
        grade_a: Some(a),
        grade_b: Some(b),
        grade_c: Some(c),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_update_recomputes_total_and_percentages() {
    let env = TestEnv::new().expect("无法创建测试环境");
    env.seed_machines();
    env.register_material("C007", "Mít sấy").await;
    let api = &env.state.production_api;
    let report = api.fan_out("C007", process_time(), OPERATOR).await.unwrap();
    let product_id = report.finished_products[0].finished_product_id.clone();

    let outcome = api
        .update_finished_product(
            &product_id,
            &FinishedProductPatch {
                weights: weights(30.0, 15.0, 5.0),
                notes: None,
            },
            OPERATOR,
        )
        .expect("更新失败");

    let record = &outcome.record;
    assert_close(record.total_weight_kg, 50.0);
    assert_close(record.percentages.grade_a, 60.0);
    assert_close(record.percentages.grade_b, 30.0);
    assert_close(record.percentages.grade_c, 10.0);
    assert_close(record.percentages.wet, 0.0);
    assert_close(record.percentages.sum(), 100.0);
    assert_eq!(outcome.propagated, 1);

    let stored = api.get_finished_product(&product_id).unwrap();
    assert_close(stored.total_weight_kg, 50.0);
    assert_eq!(stored.percentages, record.percentages);
}

#[tokio::test]
async fn test_update_keeps_unsupplied_weights() {
    let env = TestEnv::new().expect("无法创建测试环境");
    env.seed_machines();
    env.register_material("C008", "Mít sấy").await;
    let api = &env.state.production_api;
    let report = api.fan_out("C008", process_time(), OPERATOR).await.unwrap();
    let product_id = report.finished_products[0].finished_product_id.clone();

    api.update_finished_product(
        &product_id,
        &FinishedProductPatch {
            weights: weights(40.0, 40.0, 20.0),
            notes: None,
        },
        OPERATOR,
    )
    .unwrap();

    let outcome = api
        .update_finished_product(
            &product_id,
            &FinishedProductPatch {
                weights: WeightPatch {
                    wet: Some(100.0),
                    ..Default::default()
                },
                notes: Some("ẩm".to_string()),
            },
            OPERATOR,
        )
        .unwrap();

    assert_eq!(outcome.record.weights.grade_a, 40.0);
    assert_eq!(outcome.record.weights.wet, 100.0);
    assert_close(outcome.record.total_weight_kg, 200.0);
    assert_close(outcome.record.percentages.wet, 50.0);
    assert_eq!(outcome.record.notes.as_deref(), Some("ẩm"));
}

#[tokio::test]
async fn test_zero_total_yields_zero_percentages() {
    let env = TestEnv::new().expect("无法创建测试环境");
    env.seed_machines();
    env.register_material("C009", "Mít sấy").await;
    let api = &env.state.production_api;
    let report = api.fan_out("C009", process_time(), OPERATOR).await.unwrap();
    let product_id = report.finished_products[0].finished_product_id.clone();

    let outcome = api
        .update_finished_product(
            &product_id,
            &FinishedProductPatch {
                weights: weights(0.0, 0.0, 0.0),
                notes: None,
            },
            OPERATOR,
        )
        .unwrap();

    assert_eq!(outcome.record.total_weight_kg, 0.0);
    assert!(outcome
        .record
        .percentages
        .as_array()
        .iter()
        .all(|p| *p == 0.0 && p.is_finite()));
}

#[tokio::test]
async fn test_update_propagates_to_linked_evaluation() {
    let env = TestEnv::new().expect("无法创建测试环境");
    env.seed_machines();
    env.register_material("C010", "Mít sấy").await;
    let api = &env.state.production_api;
    let report = api.fan_out("C010", process_time(), OPERATOR).await.unwrap();
    let product_id = report.finished_products[0].finished_product_id.clone();
    let evaluation_id = report
        .quality_evaluations
        .iter()
        .find(|e| e.finished_product_id.as_deref() == Some(product_id.as_str()))
        .map(|e| e.quality_evaluation_id.clone())
        .expect("缺少关联评价");

    let outcome = api
        .update_finished_product(
            &product_id,
            &FinishedProductPatch {
                weights: weights(25.0, 25.0, 50.0),
                notes: None,
            },
            OPERATOR,
        )
        .unwrap();

    let evaluation = api.get_quality_evaluation(&evaluation_id).unwrap();
    assert_eq!(evaluation.percentages, outcome.record.percentages);
    assert_close(evaluation.percentages.grade_c, 50.0);

    // 另一台机台的评价不受影响
    let other = report
        .quality_evaluations
        .iter()
        .find(|e| e.quality_evaluation_id != evaluation_id)
        .expect("缺少第二条评价");
    let other = api.get_quality_evaluation(&other.quality_evaluation_id).unwrap();
    assert_eq!(other.percentages.sum(), 0.0);
}

#[tokio::test]
async fn test_update_without_evaluation_reports_zero_propagated() {
    let env = TestEnv::new().expect("无法创建测试环境");
    let (m1, _) = env.seed_machines();
    let api = &env.state.production_api;

    let product = api
        .create_finished_product(
            &CreateFinishedProductRequest {
                batch_code: "C011".to_string(),
                process_time: Some(process_time()),
                goods_name: "Mít sấy".to_string(),
                machine_id: m1.machine_id.clone(),
                weights: Some(WeightPatch::default()),
                ..Default::default()
            },
            OPERATOR,
        )
        .expect("创建失败");

    let outcome = api
        .update_finished_product(
            &product.finished_product_id,
            &FinishedProductPatch {
                weights: weights(10.0, 0.0, 0.0),
                notes: None,
            },
            OPERATOR,
        )
        .unwrap();
    assert_eq!(outcome.propagated, 0);
    assert_close(outcome.record.percentages.grade_a, 100.0);
}

#[tokio::test]
async fn test_resync_restores_evaluation_percentages() {
    let env = TestEnv::new().expect("无法创建测试环境");
    env.seed_machines();
    env.register_material("C012", "Mít sấy").await;
    let api = &env.state.production_api;
    let report = api.fan_out("C012", process_time(), OPERATOR).await.unwrap();
    let product_id = report.finished_products[0].finished_product_id.clone();

    let updated = api
        .update_finished_product(
            &product_id,
            &FinishedProductPatch {
                weights: weights(60.0, 40.0, 0.0),
                notes: None,
            },
            OPERATOR,
        )
        .unwrap();

    // 绕过引擎改写评价，制造漂移
    env.exec_sql(&format!(
        "UPDATE quality_evaluation SET grade_a_pct = 0, grade_b_pct = 0 WHERE finished_product_id = '{}'",
        product_id
    ));
    let evaluation_id = api
        .list_quality_evaluations("C012")
        .unwrap()
        .into_iter()
        .find(|e| e.finished_product_id.as_deref() == Some(product_id.as_str()))
        .map(|e| e.quality_evaluation_id)
        .expect("缺少关联评价");
    let drifted = api.get_quality_evaluation(&evaluation_id).unwrap();
    assert_eq!(drifted.percentages.grade_a, 0.0);

    let outcome = api.resync_quality(&product_id, OPERATOR).expect("重推失败");
    assert_eq!(outcome.propagated, 1);

    let restored = api.get_quality_evaluation(&evaluation_id).unwrap();
    assert_eq!(restored.percentages, updated.record.percentages);
    assert_close(restored.percentages.grade_a, 60.0);
    assert_close(restored.percentages.grade_b, 40.0);

    let err = api
        .resync_quality("missing", OPERATOR)
        .expect_err("未知成品应返回 NotFound");
    assert!(matches!(err, ApiError::NotFound(_)));
}

#[tokio::test]
async fn test_failed_propagation_rolls_back_weight_update() {
    let env = TestEnv::new().expect("无法创建测试环境");
    env.seed_machines();
    env.register_material("C015", "Mít sấy").await;
    let api = &env.state.production_api;
    let report = api.fan_out("C015", process_time(), OPERATOR).await.unwrap();
    let product_id = report.finished_products[0].finished_product_id.clone();

    env.exec_sql(
        "CREATE TRIGGER block_evaluation_sync BEFORE UPDATE OF grade_a_pct ON quality_evaluation
         BEGIN SELECT RAISE(ABORT, 'sync blocked'); END;",
    );

    let err = api
        .update_finished_product(
            &product_id,
            &FinishedProductPatch {
                weights: weights(80.0, 20.0, 0.0),
                notes: None,
            },
            OPERATOR,
        )
        .expect_err("下推失败时更新应整体失败");
    match err {
        ApiError::SyncFailure(msg) => assert!(msg.contains(&product_id), "错误信息应包含成品ID: {}", msg),
        other => panic!("期望 SyncFailure，实际 {:?}", other),
    }

    // 重量更新随事务回滚
    let stored = api.get_finished_product(&product_id).unwrap();
    assert_eq!(stored.total_weight_kg, 0.0);
    assert_eq!(stored.weights.grade_a, 0.0);

    env.exec_sql("DROP TRIGGER block_evaluation_sync;");
    let outcome = api
        .update_finished_product(
            &product_id,
            &FinishedProductPatch {
                weights: weights(80.0, 20.0, 0.0),
                notes: None,
            },
            OPERATOR,
        )
        .expect("移除触发器后更新应成功");
    assert_eq!(outcome.propagated, 1);
}

#[tokio::test]
async fn test_create_rejects_unknown_material_batch() {
    let env = TestEnv::new().expect("无法创建测试环境");
    let (m1, _) = env.seed_machines();
    let api = &env.state.production_api;

    let err = api
        .create_finished_product(
            &CreateFinishedProductRequest {
                batch_code: "C016".to_string(),
                process_time: Some(process_time()),
                goods_name: "Mít sấy".to_string(),
                machine_id: m1.machine_id.clone(),
                material_batch_id: Some("no-such-material".to_string()),
                weights: Some(WeightPatch::default()),
                notes: None,
            },
            OPERATOR,
        )
        .expect_err("未知原料批次应被拒绝");
    match err {
        ApiError::ReferenceNotFound(msg) => assert!(msg.contains("MaterialBatch"), "实际信息: {}", msg),
        other => panic!("期望 ReferenceNotFound，实际 {:?}", other),
    }

    let material = env.register_material("C016", "Mít sấy").await;
    let product = api
        .create_finished_product(
            &CreateFinishedProductRequest {
                batch_code: "C016".to_string(),
                process_time: Some(process_time()),
                goods_name: "Mít sấy".to_string(),
                machine_id: m1.machine_id.clone(),
                material_batch_id: Some(material.material_batch_id.clone()),
                weights: Some(WeightPatch::default()),
                notes: None,
            },
            OPERATOR,
        )
        .expect("已登记的原料批次应可关联");
    assert_eq!(product.material_batch_id, Some(material.material_batch_id));
}

#[tokio::test]
async fn test_delete_single_product_unlinks_evaluation() {
    let env = TestEnv::new().expect("无法创建测试环境");
    env.seed_machines();
    env.register_material("C017", "Mít sấy").await;
    let api = &env.state.production_api;
    let report = api.fan_out("C017", process_time(), OPERATOR).await.unwrap();
    let product_id = report.finished_products[0].finished_product_id.clone();

    let deleted = api
        .delete_finished_product(&product_id, OPERATOR)
        .expect("删除成品记录失败");
    assert_eq!(deleted.finished_product_id, product_id);

    let products = api.list_finished_products("C017").unwrap();
    assert_eq!(products.len(), 1);
    assert!(products.iter().all(|p| p.finished_product_id != product_id));

    // 评价保留在批次下，但不再关联成品
    let evaluations = api.list_quality_evaluations("C017").unwrap();
    assert_eq!(evaluations.len(), 2);
    assert_eq!(
        evaluations.iter().filter(|e| e.finished_product_id.is_none()).count(),
        1
    );

    let err = api
        .delete_finished_product(&product_id, OPERATOR)
        .expect_err("重复删除应返回 NotFound");
    assert!(matches!(err, ApiError::NotFound(_)));

    // 批次级联删除仍覆盖已解除关联的评价
    let cascade = api.delete_by_batch_code("C017", OPERATOR).unwrap();
    assert_eq!(cascade.quality_evaluations, 2);
    assert_eq!(cascade.finished_products, 1);
}

#[test]
fn test_create_validates_required_fields_and_machine() {
    let env = TestEnv::new().expect("无法创建测试环境");
    env.seed_machines();
    let api = &env.state.production_api;

    let err = api
        .create_finished_product(
            &CreateFinishedProductRequest {
                batch_code: "C013".to_string(),
                machine_id: "whatever".to_string(),
                ..Default::default()
            },
            OPERATOR,
        )
        .expect_err("缺少必填字段应被拒绝");
    match err {
        ApiError::ValidationError(msg) => {
            assert!(msg.contains("process_time"));
            assert!(msg.contains("goods_name"));
            assert!(msg.contains("weights"));
        }
        other => panic!("期望 ValidationError，实际 {:?}", other),
    }

    let err = api
        .create_finished_product(
            &CreateFinishedProductRequest {
                batch_code: "C013".to_string(),
                process_time: Some(process_time()),
                goods_name: "Mít sấy".to_string(),
                machine_id: "no-such-machine".to_string(),
                weights: Some(WeightPatch::default()),
                ..Default::default()
            },
            OPERATOR,
        )
        .expect_err("未知机台应被拒绝");
    assert!(matches!(err, ApiError::ReferenceNotFound(_)), "实际错误: {:?}", err);
}

#[test]
fn test_update_rejects_negative_weight() {
    let env = TestEnv::new().expect("无法创建测试环境");
    let (m1, _) = env.seed_machines();
    let api = &env.state.production_api;
    let product = api
        .create_finished_product(
            &CreateFinishedProductRequest {
                batch_code: "C014".to_string(),
                process_time: Some(process_time()),
                goods_name: "Mít sấy".to_string(),
                machine_id: m1.machine_id.clone(),
                weights: Some(weights(10.0, 0.0, 0.0)),
                ..Default::default()
            },
            OPERATOR,
        )
        .unwrap();

    let err = api
        .update_finished_product(
            &product.finished_product_id,
            &FinishedProductPatch {
                weights: WeightPatch {
                    reject: Some(-1.0),
                    ..Default::default()
                },
                notes: None,
            },
            OPERATOR,
        )
        .expect_err("负重量应被拒绝");
    assert!(matches!(err, ApiError::ValidationError(_)));

    let stored = api.get_finished_product(&product.finished_product_id).unwrap();
    assert_close(stored.total_weight_kg, 10.0);
}
