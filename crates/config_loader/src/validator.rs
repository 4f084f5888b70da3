//! 配置校验模块
//!
//! 校验规则：
//! - 两种深度模式互斥
//! - 数据流不重复
//! - 至少启用一个数据流
//! - consent_poll_ms > 0
//! - reference_frame 非空
//! - 录制开启时 root 非空

use std::collections::HashSet;

use contracts::{CaptureBlueprint, ContractError, SensorKind};

/// 校验 CaptureBlueprint 配置
///
/// 返回第一个遇到的错误，或 Ok(())。
pub fn validate(blueprint: &CaptureBlueprint) -> Result<(), ContractError> {
    validate_depth_exclusivity(blueprint)?;
    validate_unique_streams(blueprint)?;
    validate_any_stream(blueprint)?;
    validate_engine(blueprint)?;
    validate_recording(blueprint)?;
    Ok(())
}

/// 校验深度模式互斥
fn validate_depth_exclusivity(blueprint: &CaptureBlueprint) -> Result<(), ContractError> {
    let sensors = &blueprint.streams.sensors;
    if sensors.contains(&SensorKind::DepthLongThrow) && sensors.contains(&SensorKind::DepthAhat) {
        return Err(ContractError::config_validation(
            "streams.sensors",
            "depth_long_throw and depth_ahat are mutually exclusive",
        ));
    }
    Ok(())
}

/// 校验数据流唯一性
fn validate_unique_streams(blueprint: &CaptureBlueprint) -> Result<(), ContractError> {
    let mut seen = HashSet::new();
    for kind in &blueprint.streams.sensors {
        if !seen.insert(*kind) {
            return Err(ContractError::config_validation(
                format!("streams.sensors[{}]", kind.friendly_name()),
                "duplicate stream",
            ));
        }
    }
    Ok(())
}

fn validate_any_stream(blueprint: &CaptureBlueprint) -> Result<(), ContractError> {
    if !blueprint.has_any_stream() {
        return Err(ContractError::config_validation(
            "streams",
            "at least one sensor or the video stream must be enabled",
        ));
    }
    Ok(())
}

/// 校验引擎参数
fn validate_engine(blueprint: &CaptureBlueprint) -> Result<(), ContractError> {
    let engine = &blueprint.engine;
    if engine.consent_poll_ms == 0 {
        return Err(ContractError::config_validation(
            "engine.consent_poll_ms",
            "consent_poll_ms must be > 0",
        ));
    }
    if engine.reference_frame.trim().is_empty() {
        return Err(ContractError::config_validation(
            "engine.reference_frame",
            "reference frame name cannot be empty",
        ));
    }
    Ok(())
}

fn validate_recording(blueprint: &CaptureBlueprint) -> Result<(), ContractError> {
    let recording = &blueprint.recording;
    if recording.enabled && recording.root.as_os_str().is_empty() {
        return Err(ContractError::config_validation(
            "recording.root",
            "recording root cannot be empty when recording is enabled",
        ));
    }
    Ok(())
}
