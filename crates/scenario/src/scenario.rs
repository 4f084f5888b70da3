//! StreamScenario 核心实现
//!
//! 枚举传感器、请求一次授权，并为每个启用的传感器创建一个引擎。

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::Arc;

use contracts::{
    ArchiveFactory, ConsentSignal, ContractError, PoseLocator, ReferenceFrame, SensorDevice,
    SensorKind,
};
use stream_engine::{SensorEngineConfig, SensorStreamEngine, TimeConverter};
use tracing::{error, info, instrument, warn};

use crate::error::{Result, ScenarioError};

/// 传感器注册表与录制扇出
///
/// 授权信号由场景持有，并以克隆句柄的形式交给每个引擎。
pub struct StreamScenario {
    device: Arc<dyn SensorDevice>,
    locator: Arc<dyn PoseLocator>,
    archive_factory: Arc<dyn ArchiveFactory>,
    consent: ConsentSignal,
    converter: TimeConverter,
    config: SensorEngineConfig,
    engines: BTreeMap<SensorKind, SensorStreamEngine>,
}

impl StreamScenario {
    /// 创建场景；时间换算以设备当前时钟为锚点
    pub fn new(
        device: Arc<dyn SensorDevice>,
        locator: Arc<dyn PoseLocator>,
        archive_factory: Arc<dyn ArchiveFactory>,
        config: SensorEngineConfig,
    ) -> Self {
        let converter = TimeConverter::calibrate(device.clock_ticks());
        Self {
            device,
            locator,
            archive_factory,
            consent: ConsentSignal::new(),
            converter,
            config,
            engines: BTreeMap::new(),
        }
    }

    /// 检查深度模式互斥
    pub fn check_selection(enabled: &BTreeSet<SensorKind>) -> Result<()> {
        if enabled.contains(&SensorKind::DepthLongThrow) && enabled.contains(&SensorKind::DepthAhat) {
            return Err(ScenarioError::configuration(
                "depth_long_throw and depth_ahat are mutually exclusive",
            ));
        }
        Ok(())
    }

    /// 枚举传感器、请求授权并注册启用的引擎
    ///
    /// # 原子性保证
    /// 任一传感器打开失败时，已打开的句柄全部释放，注册表保持为空。
    #[instrument(
        name = "scenario_initialize_sensors",
        skip(self, enabled),
        fields(enabled = enabled.len())
    )]
    pub fn initialize_sensors(&mut self, enabled: &BTreeSet<SensorKind>) -> Result<()> {
        Self::check_selection(enabled)?;
        if !self.engines.is_empty() {
            return Err(ScenarioError::configuration("sensors already initialized"));
        }

        let descriptors = self.device.enumerate()?;
        if let Some(missing) = enabled
            .iter()
            .find(|kind| !descriptors.iter().any(|d| d.kind == **kind))
        {
            return Err(ContractError::SensorNotFound {
                sensor: missing.friendly_name().to_string(),
            }
            .into());
        }

        self.device.request_consent(self.consent.clone());

        let mut engines = BTreeMap::new();
        for descriptor in descriptors.iter().filter(|d| enabled.contains(&d.kind)) {
            let handle = match self.device.open(descriptor) {
                Ok(handle) => handle,
                Err(e) => {
                    warn!(
                        sensor = %descriptor.kind,
                        error = %e,
                        opened = engines.len(),
                        "sensor open failed, releasing opened sensors"
                    );
                    return Err(e.into());
                }
            };
            let engine = SensorStreamEngine::new(
                handle,
                Arc::clone(&self.locator),
                self.consent.clone(),
                self.converter,
                self.config.clone(),
            );
            info!(sensor = %descriptor.kind, "sensor registered");
            engines.insert(descriptor.kind, engine);
        }

        self.engines = engines;
        info!(sensors = self.engines.len(), "scenario initialized");
        Ok(())
    }

    pub fn consent(&self) -> &ConsentSignal {
        &self.consent
    }

    pub fn converter(&self) -> TimeConverter {
        self.converter
    }

    pub fn kinds(&self) -> impl Iterator<Item = SensorKind> + '_ {
        self.engines.keys().copied()
    }

    pub fn is_registered(&self, kind: SensorKind) -> bool {
        self.engines.contains_key(&kind)
    }

    pub fn engine(&self, kind: SensorKind) -> Result<&SensorStreamEngine> {
        self.engines
            .get(&kind)
            .ok_or(ScenarioError::UnregisteredSensor { sensor: kind })
    }

    /// 注册的深度引擎（最多一个）
    pub fn depth_engine(&self) -> Option<&SensorStreamEngine> {
        self.engines
            .iter()
            .find(|(kind, _)| kind.is_depth())
            .map(|(_, engine)| engine)
    }

    /// 为每个引擎设置世界坐标系与归档目录，然后启动
    ///
    /// 失败时已启动的引擎会被停止。
    #[instrument(name = "scenario_start_recording", skip(self))]
    pub fn start_recording(&self, folder: Option<&Path>, world: ReferenceFrame) -> Result<()> {
        for (kind, engine) in &self.engines {
            engine.set_world_frame(world.clone());
            let prepared = engine.set_storage_folder(folder, self.archive_factory.as_ref());
            if let Err(e) = prepared {
                error!(sensor = %kind, error = %e, "archive setup failed, rolling back");
                self.rollback();
                return Err(e.into());
            }
            if !engine.start() {
                warn!(sensor = %kind, "engine was already running");
            }
        }
        info!(engines = self.engines.len(), "recording started");
        Ok(())
    }

    /// 停止所有引擎，然后写出标定与位姿文件并关闭归档
    ///
    /// 每个引擎都会处理；返回第一个错误。
    #[instrument(name = "scenario_stop_recording", skip(self))]
    pub fn stop_recording(&self) -> Result<()> {
        for engine in self.engines.values() {
            engine.stop();
        }
        let mut first_error = None;
        for (kind, engine) in &self.engines {
            if let Err(e) = engine.finalize_storage() {
                error!(sensor = %kind, error = %e, "finalize failed");
                first_error.get_or_insert(ScenarioError::from(e));
            }
        }
        info!("recording stopped");
        first_error.map_or(Ok(()), Err)
    }

    fn rollback(&self) {
        for engine in self.engines.values() {
            engine.stop();
        }
        for (kind, engine) in &self.engines {
            if let Err(e) = engine.finalize_storage() {
                warn!(sensor = %kind, error = %e, "rollback finalize failed");
            }
        }
    }
}
