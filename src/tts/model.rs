use tracing::{debug, info};

use crate::error::{Result, DubError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ModelState {
    Unloaded,
    Ready,
    Released,
}

/// Lifecycle of the voice model behind a synthesizer.
///
/// Synthesis is only allowed between `mark_ready` and `release`.
#[derive(Debug, Clone)]
pub struct SynthesisModel {
    name: String,
    state: ModelState,
}

impl SynthesisModel {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: ModelState::Unloaded,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mark_ready(&mut self) {
        info!("Synthesis model ready: {}", self.name);
        self.state = ModelState::Ready;
    }

    pub fn release(&mut self) {
        if self.state == ModelState::Ready {
            debug!("Releasing synthesis model {}", self.name);
        }
        self.state = ModelState::Released;
    }

    pub fn is_ready(&self) -> bool {
        self.state == ModelState::Ready
    }

    pub fn ensure_ready(&self) -> Result<()> {
        if self.is_ready() {
            Ok(())
        } else {
            Err(DubError::ModelNotInitialized)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unacquired_model_is_rejected() {
        let model = SynthesisModel::new("thorsten");
        assert!(matches!(model.ensure_ready(), Err(DubError::ModelNotInitialized)));
    }

    #[test]
    fn test_released_model_is_rejected() {
        let mut model = SynthesisModel::new("thorsten");
        model.mark_ready();
        assert!(model.ensure_ready().is_ok());

        model.release();
        assert!(!model.is_ready());
        assert!(matches!(model.ensure_ready(), Err(DubError::ModelNotInitialized)));
    }
}
