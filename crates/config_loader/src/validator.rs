//! 配置校验模块
//!
//! 校验规则：
//! - 数值范围 (`validator` derive)：tolerance > 0、timer_period >= 1、数据源参数
//! - tolerance 为有限值
//! - 数据源数量不超过对应时间线数量
//! - 时间线名称唯一
//!
//! 非致命问题通过 [`collect_warnings`] 报告，负延迟由 [`normalize`] 归零。

use std::collections::HashSet;
use std::fmt;

use contracts::{ContractError, SessionBlueprint, TimelineId, TimelineKind};
use serde::Serialize;
use validator::Validate;

/// 非致命配置问题
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfigWarning {
    pub field: String,
    pub message: String,
}

impl ConfigWarning {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// 校验 SessionBlueprint 配置
///
/// 返回第一个遇到的错误，或 Ok(())。
pub fn validate(blueprint: &SessionBlueprint) -> Result<(), ContractError> {
    validate_ranges(blueprint)?;
    validate_tolerance(blueprint)?;
    validate_sources(blueprint)?;
    validate_timeline_names(blueprint)?;
    Ok(())
}

/// 校验数值范围
fn validate_ranges(blueprint: &SessionBlueprint) -> Result<(), ContractError> {
    blueprint.validate().map_err(|errors| {
        let field = errors
            .errors()
            .keys()
            .min()
            .map(|key| key.to_string())
            .unwrap_or_else(|| "blueprint".to_string());
        ContractError::config_validation(field, errors.to_string())
    })
}

/// 校验 tolerance 为有限值
fn validate_tolerance(blueprint: &SessionBlueprint) -> Result<(), ContractError> {
    let tolerance = blueprint.synchronizer.tolerance;
    if !tolerance.is_finite() {
        return Err(ContractError::config_validation(
            "synchronizer.tolerance",
            format!("tolerance must be finite, got {tolerance}"),
        ));
    }
    Ok(())
}

/// 校验数据源与时间线对应关系
fn validate_sources(blueprint: &SessionBlueprint) -> Result<(), ContractError> {
    let sync = &blueprint.synchronizer;
    let checks = [
        ("frame_sources", blueprint.frame_sources.len(), TimelineKind::Frame),
        ("matrix_sources", blueprint.matrix_sources.len(), TimelineKind::Matrix),
    ];

    for (field, sources, kind) in checks {
        let declared = sync.timelines(kind).len();
        if sources > declared {
            return Err(ContractError::config_validation(
                field,
                format!("{sources} sources declared for {declared} {kind} timelines"),
            ));
        }
    }
    Ok(())
}

/// 校验时间线名称唯一 (全局)
fn validate_timeline_names(blueprint: &SessionBlueprint) -> Result<(), ContractError> {
    let sync = &blueprint.synchronizer;
    let mut seen = HashSet::new();

    for kind in [TimelineKind::Frame, TimelineKind::Matrix] {
        for (index, timeline) in sync.timelines(kind).iter().enumerate() {
            let Some(name) = &timeline.name else {
                continue;
            };
            if !seen.insert(name.as_str()) {
                return Err(ContractError::config_validation(
                    format!("synchronizer.{kind}_timelines[{index}].name"),
                    format!("duplicate timeline name '{name}'"),
                ));
            }
        }
    }
    Ok(())
}

/// 收集非致命问题
pub fn collect_warnings(blueprint: &SessionBlueprint) -> Vec<ConfigWarning> {
    let sync = &blueprint.synchronizer;
    let mut warnings = Vec::new();

    for kind in [TimelineKind::Frame, TimelineKind::Matrix] {
        let timelines = sync.timelines(kind);

        for (index, timeline) in timelines.iter().enumerate() {
            if timeline.delay < 0 {
                warnings.push(ConfigWarning::new(
                    format!("synchronizer.{kind}_timelines[{index}].delay"),
                    format!("negative delay {} will be clamped to 0", timeline.delay),
                ));
            }
        }

        for (slot, output) in sync.outputs(kind).iter().enumerate() {
            let field = format!("synchronizer.{kind}_outputs[{slot}]");
            if output.timeline_index >= timelines.len() {
                warnings.push(ConfigWarning::new(
                    field,
                    format!(
                        "bound to undeclared {} (only {} declared), it will never synchronize",
                        TimelineId::new(kind, output.timeline_index),
                        timelines.len()
                    ),
                ));
                continue;
            }

            let elements = source_elements(blueprint, kind, output.timeline_index);
            if let Some(elements) = elements.filter(|&n| output.element_index >= n) {
                warnings.push(ConfigWarning::new(
                    field,
                    format!(
                        "element {} is never produced by its source ({elements} elements)",
                        output.element_index
                    ),
                ));
            }
        }
    }

    let unfed = [
        (TimelineKind::Frame, blueprint.frame_sources.len()),
        (TimelineKind::Matrix, blueprint.matrix_sources.len()),
    ];
    for (kind, sources) in unfed {
        for index in sources..sync.timelines(kind).len() {
            warnings.push(ConfigWarning::new(
                format!("{kind}_sources"),
                format!("{} has no source and stays empty", sync.timeline_label(TimelineId::new(kind, index))),
            ));
        }
    }

    warnings
}

fn source_elements(blueprint: &SessionBlueprint, kind: TimelineKind, index: usize) -> Option<usize> {
    match kind {
        TimelineKind::Frame => blueprint.frame_sources.get(index).map(|s| s.source.elements),
        TimelineKind::Matrix => blueprint.matrix_sources.get(index).map(|s| s.source.elements),
    }
}

/// 归一化：负延迟归零
pub fn normalize(blueprint: &mut SessionBlueprint) {
    let sync = &mut blueprint.synchronizer;
    for timeline in sync
        .frame_timelines
        .iter_mut()
        .chain(sync.matrix_timelines.iter_mut())
    {
        timeline.delay = timeline.delay.max(0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{
        FrameSourceConfig, MatrixSourceConfig, OutputSlotConfig, SynchronizerConfig,
        TimelineConfig,
    };

    fn named(name: &str) -> TimelineConfig {
        TimelineConfig {
            name: Some(name.into()),
            delay: 0,
        }
    }

    fn minimal_blueprint() -> SessionBlueprint {
        SessionBlueprint {
            synchronizer: SynchronizerConfig {
                frame_timelines: vec![named("video")],
                matrix_timelines: vec![named("probe")],
                frame_outputs: vec![OutputSlotConfig {
                    timeline_index: 0,
                    element_index: 0,
                    notify_on_change: true,
                }],
                matrix_outputs: vec![OutputSlotConfig::default()],
                ..Default::default()
            },
            frame_sources: vec![FrameSourceConfig::default()],
            matrix_sources: vec![MatrixSourceConfig::default()],
            ..Default::default()
        }
    }

    #[test]
    fn test_valid_config() {
        let bp = minimal_blueprint();
        assert!(validate(&bp).is_ok());
        assert!(collect_warnings(&bp).is_empty());
    }

    #[test]
    fn test_non_positive_tolerance() {
        let mut bp = minimal_blueprint();
        bp.synchronizer.tolerance = 0.0;
        let err = validate(&bp).unwrap_err().to_string();
        assert!(err.contains("synchronizer"), "got: {err}");
    }

    #[test]
    fn test_infinite_tolerance() {
        let mut bp = minimal_blueprint();
        bp.synchronizer.tolerance = f64::INFINITY;
        let err = validate(&bp).unwrap_err().to_string();
        assert!(err.contains("finite"), "got: {err}");
    }

    #[test]
    fn test_zero_timer_period() {
        let mut bp = minimal_blueprint();
        bp.synchronizer.timer_period = 0;
        assert!(validate(&bp).is_err());
    }

    #[test]
    fn test_invalid_source_frequency() {
        let mut bp = minimal_blueprint();
        bp.frame_sources[0].source.frequency_hz = -5.0;
        let err = validate(&bp).unwrap_err().to_string();
        assert!(err.contains("frame_sources"), "got: {err}");
    }

    #[test]
    fn test_too_many_sources() {
        let mut bp = minimal_blueprint();
        bp.matrix_sources.push(MatrixSourceConfig::default());
        let err = validate(&bp).unwrap_err().to_string();
        assert!(err.contains("2 sources declared for 1 matrix timelines"), "got: {err}");
    }

    #[test]
    fn test_duplicate_timeline_name() {
        let mut bp = minimal_blueprint();
        bp.synchronizer.matrix_timelines[0] = named("video");
        let err = validate(&bp).unwrap_err().to_string();
        assert!(err.contains("duplicate timeline name"), "got: {err}");
    }

    #[test]
    fn test_warnings() {
        let mut bp = minimal_blueprint();
        bp.synchronizer.frame_timelines[0].delay = -10;
        bp.synchronizer.matrix_outputs[0].timeline_index = 4;
        bp.synchronizer.frame_outputs[0].element_index = 3;
        bp.synchronizer.frame_timelines.push(TimelineConfig::default());

        let warnings = collect_warnings(&bp);
        let text: Vec<String> = warnings.iter().map(ToString::to_string).collect();

        assert_eq!(warnings.len(), 4, "got: {text:?}");
        assert!(text[0].contains("clamped"));
        assert!(text[1].contains("never produced"));
        assert!(text[2].contains("undeclared matrix4"));
        assert!(text[3].contains("frame1 has no source"));
    }

    #[test]
    fn test_normalize_clamps_delays() {
        let mut bp = minimal_blueprint();
        bp.synchronizer.frame_timelines[0].delay = -10;
        bp.synchronizer.matrix_timelines[0].delay = 30;

        normalize(&mut bp);

        assert_eq!(bp.synchronizer.frame_timelines[0].delay, 0);
        assert_eq!(bp.synchronizer.matrix_timelines[0].delay, 30);
    }
}
