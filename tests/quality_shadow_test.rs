// ==========================================
// 质量评价镜像集成测试
// ==========================================
// 测试范围:
// 1. 关联成品: 百分比取自成品，忽略请求值
// 2. 未关联: batch_code 必填，百分比范围校验
// 3. 更新: 感官字段合并
// ==========================================


use production_tracking::api::ApiError;
use production_tracking::domain::{SensoryFields, WeightPatch, YieldPercentages};
use production_tracking::engine::{
    CreateFinishedProductRequest, CreateQualityEvaluationRequest, QualityEvaluationPatch,
};
use test_helpers::*;

fn create_product(env: &TestEnv, machine_id: &str, batch_code: &str) -> String {
    env.state
        .production_api
        .create_finished_product(
            &CreateFinishedProductRequest {
                batch_code: batch_code.to_string(),
                process_time: Some(process_time()),
                goods_name: "Mít sấy".to_string(),
                machine_id: machine_id.to_string(),
                weights: Some(WeightPatch {
                    grade_a: Some(75.0),
                    grade_b: Some(25.0),
                    ..Default::default()
                }),
                ..Default::default()
            },
            OPERATOR,
        )
        .expect("创建成品失败")
        .finished_product_id
}

#[test]
fn test_linked_evaluation_ignores_payload_percentages() {
    let env = TestEnv::new().expect("无法创建测试环境");
    let (m1, _) = env.seed_machines();
    let product_id = create_product(&env, &m1.machine_id, "Q001");

    let record = env
        .state
        .production_api
        .create_quality_evaluation(
            &CreateQualityEvaluationRequest {
                finished_product_id: Some(product_id.clone()),
                percentages: YieldPercentages {
                    grade_a: 1.0,
                    wet: 99.0,
                    ..Default::default()
                },
                sensory: SensoryFields {
                    color: Some("vàng".to_string()),
                    ..Default::default()
                },
                ..Default::default()
            },
            OPERATOR,
        )
        .expect("创建评价失败");

    assert_eq!(record.finished_product_id.as_deref(), Some(product_id.as_str()));
    assert_eq!(record.batch_code, "Q001");
    assert_eq!(record.machine_id.as_deref(), Some(m1.machine_id.as_str()));
    assert_close(record.percentages.grade_a, 75.0);
    assert_close(record.percentages.grade_b, 25.0);
    assert_eq!(record.percentages.wet, 0.0);
    assert_eq!(record.sensory.color.as_deref(), Some("vàng"));
}

#[test]
fn test_linked_evaluation_requires_existing_product() {
    let env = TestEnv::new().expect("无法创建测试环境");

    let err = env
        .state
        .production_api
        .create_quality_evaluation(
            &CreateQualityEvaluationRequest {
                finished_product_id: Some("ghost".to_string()),
                ..Default::default()
            },
            OPERATOR,
        )
        .expect_err("未知成品应被拒绝");
    assert!(matches!(err, ApiError::ReferenceNotFound(_)), "实际错误: {:?}", err);
}

#[test]
fn test_second_linked_evaluation_is_rejected() {
    let env = TestEnv::new().expect("无法创建测试环境");
    let (m1, _) = env.seed_machines();
    let product_id = create_product(&env, &m1.machine_id, "Q004");
    let api = &env.state.production_api;

    let request = CreateQualityEvaluationRequest {
        finished_product_id: Some(product_id.clone()),
        ..Default::default()
    };
    api.create_quality_evaluation(&request, OPERATOR)
        .expect("首条评价创建失败");

    let err = api
        .create_quality_evaluation(&request, OPERATOR)
        .expect_err("同一成品不能关联两条评价");
    match err {
        ApiError::ValidationError(msg) => assert!(msg.contains(&product_id), "实际信息: {}", msg),
        other => panic!("期望 ValidationError，实际 {:?}", other),
    }
    assert_eq!(api.list_quality_evaluations("Q004").unwrap().len(), 1);
}

#[test]
fn test_standalone_evaluation_requires_batch_code() {
    let env = TestEnv::new().expect("无法创建测试环境");
    let api = &env.state.production_api;

    let err = api
        .create_quality_evaluation(&CreateQualityEvaluationRequest::default(), OPERATOR)
        .expect_err("缺少 batch_code 应被拒绝");
    assert!(matches!(err, ApiError::ValidationError(_)));

    let err = api
        .create_quality_evaluation(
            &CreateQualityEvaluationRequest {
                batch_code: Some("Q002".to_string()),
                percentages: YieldPercentages {
                    grade_a: 120.0,
                    ..Default::default()
                },
                ..Default::default()
            },
            OPERATOR,
        )
        .expect_err("百分比超出范围应被拒绝");
    assert!(matches!(err, ApiError::ValidationError(_)));

    let record = api
        .create_quality_evaluation(
            &CreateQualityEvaluationRequest {
                batch_code: Some("Q002".to_string()),
                percentages: YieldPercentages {
                    grade_a: 70.0,
                    grade_c: 30.0,
                    ..Default::default()
                },
                evaluator: Some("Hoa".to_string()),
                ..Default::default()
            },
            OPERATOR,
        )
        .expect("创建独立评价失败");
    assert!(record.finished_product_id.is_none());
    assert_eq!(record.percentages.grade_c, 30.0);
    assert_eq!(api.list_quality_evaluations("Q002").unwrap().len(), 1);
}

#[test]
fn test_update_merges_sensory_fields() {
    let env = TestEnv::new().expect("无法创建测试环境");
    let (m1, _) = env.seed_machines();
    let product_id = create_product(&env, &m1.machine_id, "Q003");
    let api = &env.state.production_api;

    let created = api
        .create_quality_evaluation(
            &CreateQualityEvaluationRequest {
                finished_product_id: Some(product_id),
                sensory: SensoryFields {
                    color: Some("vàng".to_string()),
                    aroma: Some("thơm".to_string()),
                    ..Default::default()
                },
                ..Default::default()
            },
            OPERATOR,
        )
        .unwrap();

    let updated = api
        .update_quality_evaluation(
            &created.quality_evaluation_id,
            &QualityEvaluationPatch {
                percentages: Some(YieldPercentages {
                    grade_a: 5.0,
                    ..Default::default()
                }),
                sensory: SensoryFields {
                    aroma: Some("rất thơm".to_string()),
                    crispness: Some("giòn".to_string()),
                    ..Default::default()
                },
                evaluator: Some("Minh".to_string()),
            },
            OPERATOR,
        )
        .expect("更新评价失败");

    assert_eq!(updated.sensory.color.as_deref(), Some("vàng"));
    assert_eq!(updated.sensory.aroma.as_deref(), Some("rất thơm"));
    assert_eq!(updated.sensory.crispness.as_deref(), Some("giòn"));
    assert_eq!(updated.evaluator.as_deref(), Some("Minh"));
    // 已关联成品，请求中的百分比被忽略
    assert_close(updated.percentages.grade_a, 75.0);

    let stored = api.get_quality_evaluation(&created.quality_evaluation_id).unwrap();
    assert_eq!(stored.sensory, updated.sensory);
}

#[test]
fn test_update_unknown_evaluation_is_not_found() {
    let env = TestEnv::new().expect("无法创建测试环境");
    let err = env
        .state
        .production_api
        .update_quality_evaluation("ghost", &QualityEvaluationPatch::default(), OPERATOR)
        .expect_err("未知评价应返回 NotFound");
    assert!(matches!(err, ApiError::NotFound(_)));
}
