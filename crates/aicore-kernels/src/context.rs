//! Build context shared by the kernel builders.

use std::sync::Arc;

use aicore_common::{AicoreError, KernelError, KernelRegistry, SocConfig};

use crate::cores::{CorePool, CorePoolConfig};

/// Target platform, registry of built kernels and the worker pool that
/// launches run on.
#[derive(Debug)]
pub struct KernelContext {
    soc: SocConfig,
    registry: KernelRegistry,
    pool: Option<Arc<CorePool>>,
}

impl KernelContext {
    /// Validates `soc` up front; builders rely on its budget arithmetic.
    pub fn new(soc: SocConfig) -> Result<Self, AicoreError> {
        soc.validate().map_err(|e| AicoreError::Config(e.to_string()))?;
        Ok(Self { soc, registry: KernelRegistry::new(), pool: None })
    }

    pub fn soc(&self) -> &SocConfig {
        &self.soc
    }

    pub fn registry(&self) -> &KernelRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut KernelRegistry {
        &mut self.registry
    }

    /// Shared pool sized for the platform's core count.
    pub fn pool(&mut self) -> Result<Arc<CorePool>, KernelError> {
        if let Some(pool) = &self.pool {
            return Ok(Arc::clone(pool));
        }
        let pool = CorePool::new(CorePoolConfig::for_units(self.soc.core_num))
            .map_err(|e| KernelError::ExecutionFailed { reason: format!("worker pool: {e}") })?;
        let pool = Arc::new(pool);
        self.pool = Some(Arc::clone(&pool));
        Ok(pool)
    }
}
