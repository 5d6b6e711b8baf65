use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use docqa_core::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    Ingesting,
    Querying,
}

impl PipelineState {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => Self::Ingesting,
            2 => Self::Querying,
            _ => Self::Idle,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            Self::Idle => 0,
            Self::Ingesting => 1,
            Self::Querying => 2,
        }
    }
}

/// Read-only view of the pipeline state, shareable with progress displays.
#[derive(Debug, Clone, Default)]
pub struct StateWatch(Arc<AtomicU8>);

impl StateWatch {
    pub fn get(&self) -> PipelineState {
        PipelineState::from_u8(self.0.load(Ordering::Acquire))
    }

    /// Moves from `Idle` to `next`; the returned guard moves back on drop.
    pub(crate) fn enter(&self, next: PipelineState) -> Result<StateGuard> {
        self.0
            .compare_exchange(PipelineState::Idle.as_u8(), next.as_u8(), Ordering::AcqRel, Ordering::Acquire)
            .map_err(|cur| Error::InvalidArgument(format!("pipeline busy ({:?})", PipelineState::from_u8(cur))))?;
        Ok(StateGuard(Arc::clone(&self.0)))
    }
}

pub(crate) struct StateGuard(Arc<AtomicU8>);

impl Drop for StateGuard {
    fn drop(&mut self) {
        self.0.store(PipelineState::Idle.as_u8(), Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guard_restores_idle() {
        let watch = StateWatch::default();
        {
            let _g = watch.enter(PipelineState::Ingesting).unwrap();
            assert_eq!(watch.get(), PipelineState::Ingesting);
            assert!(watch.enter(PipelineState::Querying).is_err());
        }
        assert_eq!(watch.get(), PipelineState::Idle);
    }
}
